pub mod cors;
pub mod in_flight;
pub mod logging;

pub use cors::*;
pub use in_flight::*;
pub use logging::*;

pub mod limits;
pub mod upload;

pub use limits::*;
pub use upload::*;

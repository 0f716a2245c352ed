pub mod chunk_handler;
pub mod health_handler;
pub mod proposal_handler;
pub mod system_handler;
pub mod upload_handler;

pub use chunk_handler::*;
pub use health_handler::*;
pub use proposal_handler::*;
pub use system_handler::*;
pub use upload_handler::*;

pub mod backend_service;
pub mod chunk_session_service;

pub use backend_service::*;
pub use chunk_session_service::*;

pub mod models;
pub mod protocol;
pub mod timestamp;

pub use models::*;
pub use protocol::*;

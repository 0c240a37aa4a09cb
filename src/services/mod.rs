pub mod claim_service;
pub mod history_service;
pub mod user_service;

pub use claim_service::*;
pub use history_service::*;
pub use user_service::*;

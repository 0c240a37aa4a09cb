pub mod health;
pub mod history;
pub mod user;

pub use health::health_config;
pub use history::history_config;
pub use user::user_config;

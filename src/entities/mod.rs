pub mod history;
pub mod users;

pub use history as history_entity;
pub use users as user_entity;

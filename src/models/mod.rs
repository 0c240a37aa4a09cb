pub mod history;
pub mod pagination;
pub mod user;

pub use history::*;
pub use pagination::*;
pub use user::*;

pub mod models;
pub mod pool;
pub mod repository;

pub use pool::{connect, DbPool};
pub use repository::Repository;

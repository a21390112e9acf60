pub mod error;
pub mod rate_limit;

pub use error::ApiError;
pub use rate_limit::RateLimiter;

mod auth;
mod rate_limit;
mod request_log;

pub use auth::auth_middleware;
pub use rate_limit::{RateLimiter, rate_limit};
pub use request_log::{REQUEST_ID, log_requests};

pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, internal_token_middleware, Claims};
pub use rate_limit::rate_limit_middleware;

pub mod breaker;
pub mod retry;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use retry::{RetryPolicy, with_retry};

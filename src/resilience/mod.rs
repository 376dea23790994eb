//! Failure isolation: per-key circuit breakers and the global cooldown.

pub mod breaker;
pub mod cooldown;

pub use breaker::{Admission, BreakerRegistry, CircuitBreakerState, CircuitState, Clock};
pub use cooldown::{CooldownSite, CooldownWindow};

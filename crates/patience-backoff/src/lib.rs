//! The backoff strategy family for `patience`: ten delay
//! curves behind a single tagged [`Strategy`] enum, dispatched by `match`
//! rather than trait objects so the driver can hold one concrete type
//! regardless of which strategy the user picked.

mod adaptive;
mod diophantine;
mod error;
mod http_aware;
mod simple;
mod strategy;

pub use adaptive::Adaptive;
pub use diophantine::Diophantine;
pub use error::BackoffConfigError;
pub use http_aware::HttpAware;
pub use simple::{DecorrelatedJitter, Exponential, Fibonacci, Fixed, FullJitter, Linear, Polynomial};
pub use strategy::Strategy;

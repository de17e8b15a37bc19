//! Middleware combinators (spec.md §4.4): `Middleware` implementations that
//! wrap other `Middleware` values to produce composed behavior. Each is
//! itself just another `Middleware`, so they nest and slot into a
//! `ChainBuilder` like any ordinary middleware.

pub mod conditional;
pub mod group;
pub mod parallel;
pub mod retry;
pub mod timeout;

pub use conditional::Conditional;
pub use group::Group;
pub use parallel::{Parallel, ParallelPolicy, ParallelStrategy};
pub use retry::{DelayStrategy, Retry};
pub use timeout::Timeout;

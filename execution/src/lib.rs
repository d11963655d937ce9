//! Helpers shared by the runtimes executing federated computations.

mod errors;
mod unwrap;

pub use errors::{ExecutionErr, Result, RetryableError, is_retryable_error};
pub use unwrap::{HostValue, unwrap};

use std::{
    any::Any,
    error::Error,
    fmt::{self, Display},
};

use log::debug;

/// A transient failure, the computation may succeed if invoked again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryableError {
    message: String,
}

impl RetryableError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for RetryableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retryable: {}", self.message)
    }
}

impl Error for RetryableError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionErr {
    Retryable(RetryableError),
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, ExecutionErr>;

impl ExecutionErr {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutionErr::Retryable(_))
    }
}

impl Display for ExecutionErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionErr::Retryable(e) => write!(f, "{e}"),
            ExecutionErr::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl Error for ExecutionErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExecutionErr::Retryable(e) => Some(e),
            ExecutionErr::Fatal(_) => None,
        }
    }
}

impl From<RetryableError> for ExecutionErr {
    fn from(value: RetryableError) -> Self {
        ExecutionErr::Retryable(value)
    }
}

/// Whether `value` signals a transient failure.
///
/// Recognizes a `RetryableError`, an `ExecutionErr::Retryable` and either of them boxed as
/// a `dyn Error`. Every other value, errors of other kinds included, is not retryable.
///
/// # Arguments
/// * `value` - Anything raised or returned by an execution.
pub fn is_retryable_error(value: &dyn Any) -> bool {
    let retryable = if value.is::<RetryableError>() {
        true
    } else if let Some(err) = value.downcast_ref::<ExecutionErr>() {
        err.is_retryable()
    } else if let Some(err) = value.downcast_ref::<Box<dyn Error + Send + Sync>>() {
        is_retryable_dyn(err.as_ref())
    } else if let Some(err) = value.downcast_ref::<Box<dyn Error>>() {
        is_retryable_dyn(err.as_ref())
    } else {
        false
    };

    if retryable {
        debug!("classified error as retryable");
    }

    retryable
}

fn is_retryable_dyn(err: &(dyn Error + 'static)) -> bool {
    err.is::<RetryableError>()
        || err
            .downcast_ref::<ExecutionErr>()
            .is_some_and(ExecutionErr::is_retryable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        let err = RetryableError::new("connection reset");
        assert!(is_retryable_error(&err));
        assert!(is_retryable_error(&ExecutionErr::from(err.clone())));

        let boxed: Box<dyn Error + Send + Sync> = Box::new(err);
        assert!(is_retryable_error(&boxed));
    }

    #[test]
    fn fatal_is_not_retryable() {
        let fatal = ExecutionErr::Fatal("bad input".to_string());
        assert!(!is_retryable_error(&fatal));
        assert!(fatal.source().is_none());

        let boxed: Box<dyn Error> = Box::new(fatal);
        assert!(!is_retryable_error(&boxed));
    }

    #[test]
    fn display() {
        let err = ExecutionErr::from(RetryableError::new("timeout"));
        assert_eq!(err.to_string(), "retryable: timeout");
    }
}

use std::fmt;

/// The error cases for recording a measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Neither a value nor a computation to time was supplied.
    MissingValue {
        /// Metric the caller tried to record.
        name: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue { name } => write!(f, "no value provided for `{name}`"),
        }
    }
}

impl std::error::Error for Error {}

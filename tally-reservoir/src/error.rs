use std::fmt;

/// The error cases for a [`crate::Reservoir`] percentile query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// No value has been inserted into the reservoir.
    EmptySample,
    /// The requested percentile is outside `(0, 100]`.
    InvalidPercentile(f64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySample => f.write_str("percentile queried on an empty sample"),
            Self::InvalidPercentile(p) => write!(f, "percentile {p} is outside (0, 100]"),
        }
    }
}

impl std::error::Error for Error {}

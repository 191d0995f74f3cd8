use std::fmt;

#[derive(Debug)]
pub enum MetricsError {
    /// Descriptor rejected by the registry (bad name, duplicate, ...).
    Register(prometheus::Error),
    /// Text exposition failed.
    Encode(String),
}

impl fmt::Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsError::Register(e) => write!(f, "metric registration failed: {e}"),
            MetricsError::Encode(msg) => write!(f, "metric encoding failed: {msg}"),
        }
    }
}

impl std::error::Error for MetricsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetricsError::Register(e) => Some(e),
            MetricsError::Encode(_) => None,
        }
    }
}

impl From<prometheus::Error> for MetricsError {
    fn from(e: prometheus::Error) -> Self {
        MetricsError::Register(e)
    }
}

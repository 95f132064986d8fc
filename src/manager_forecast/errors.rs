use thiserror::Error;

/// Failure of a single HTTP call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("http request error: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether the failure is of timeout class
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

impl From<ureq::Error> for TransportError {
    fn from(e: ureq::Error) -> TransportError {
        match e {
            ureq::Error::Timeout(t) => TransportError::Timeout(t.to_string()),
            ureq::Error::StatusCode(code) => TransportError::Status(code),
            e => TransportError::Request(e.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("forecast fetch failed after {attempts} attempt(s): {source}")]
    FetchFailure { attempts: u32, source: TransportError },
    #[error("forecast document error: {0}")]
    Document(String),
}

impl From<serde_json::Error> for ForecastError {
    fn from(e: serde_json::Error) -> ForecastError {
        ForecastError::Document(e.to_string())
    }
}

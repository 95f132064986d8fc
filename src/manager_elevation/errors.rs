use thiserror::Error;

#[derive(Error, Debug)]
#[error("error in communication with elevation service: {0}")]
pub struct ElevationError(pub String);
impl From<serde_json::Error> for ElevationError {
    fn from(e: serde_json::Error) -> ElevationError {
        ElevationError(format!("json document error: {}", e))
    }
}
impl From<ureq::Error> for ElevationError {
    fn from(e: ureq::Error) -> ElevationError {
        ElevationError(format!("http request error: {}", e))
    }
}

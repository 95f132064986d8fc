use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file error: {0}")]
    File(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
impl From<&str> for ConfigError {
    fn from(e: &str) -> Self {
        ConfigError::Invalid(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("report file error: {0}")]
    File(#[from] std::io::Error),
    #[error("report document error: {0}")]
    Document(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("log file error: {0}")]
    File(#[from] std::io::Error),
    #[error("logger config error: {0}")]
    Config(#[from] log4rs::config::runtime::ConfigErrors),
    #[error("logger already set: {0}")]
    SetLogger(#[from] log::SetLoggerError),
}

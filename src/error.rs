use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Docker returned no stats for container {0}")]
    EmptyStats(String),

    #[error("Registry request failed: {0}")]
    Registry(#[from] reqwest::Error),

    #[error("Registry rejected registration ({status}): {body}")]
    RegistryRejected { status: u16, body: String },

    #[error("Service registration failed after {attempts} attempt(s): {source}")]
    RegistrationFailed {
        attempts: u32,
        source: Box<ExporterError>,
    },

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ExporterError>;

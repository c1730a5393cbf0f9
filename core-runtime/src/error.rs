use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is missing or malformed. Aborts the run before any rule executes.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

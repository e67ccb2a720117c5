//! Error types for the slide rendering pipeline

use thiserror::Error;

/// Result type alias for rendering operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, filling or rendering slides
#[derive(Error, Debug)]
pub enum Error {
    /// No stored template exists for the requested style key
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The slide did not name a layout
    #[error("layout_style is required")]
    MissingLayoutStyle,

    /// A carousel was submitted without slides
    #[error("slides array is required and must not be empty")]
    EmptyCarousel,

    /// Content did not finish loading within the bound
    #[error("Render timed out after {0}ms")]
    RenderTimeout(u64),

    /// The rendering engine could not be started
    #[error("Rendering session unavailable: {0}")]
    SessionUnavailable(String),

    /// Failed to render or capture content
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

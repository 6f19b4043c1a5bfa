/// Convenience result type used across vismix.
pub type MixResult<T> = Result<T, MixError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Nothing in the tick path returns these; per the engine's reliability
/// contract the tick loop degrades to a black frame and an out-of-band
/// [`MixEvent`](crate::MixEvent) instead. Errors surface from construction,
/// configuration and asset loading, which all happen outside the tick.
#[derive(thiserror::Error, Debug)]
pub enum MixError {
    /// Invalid user-provided configuration or command data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while loading or decoding external assets (stills, sequences).
    #[error("asset error: {0}")]
    Asset(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MixError {
    /// Build a [`MixError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MixError::Asset`] value.
    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }
}

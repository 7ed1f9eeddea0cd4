use {
    std::path::PathBuf,
    thiserror::Error,
};


/// Domain errors of the SAC toolkit.
///
/// Tensor failures are surfaced as [`candle_core::Error`] and everything is
/// eventually propagated through [`anyhow::Result`].
#[derive(Debug, Error)]
pub enum SacError {
    /// Sampling was attempted with fewer transitions than requested.
    #[error("cannot sample {requested} transitions from a buffer holding {available}")]
    InsufficientData {
        requested: usize,
        available: usize,
    },

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A weights file required for loading does not exist.
    #[error("missing checkpoint file: {0:?}")]
    MissingCheckpoint(PathBuf),

    /// The parameter store of a network could not be accessed.
    #[error("parameter store is poisoned")]
    PoisonedParameters,
}

use thiserror::Error;

/// Fatal driver errors raised before or during a render
#[derive(Debug, Error)]
pub enum DriverError {
    /// A halt condition was required but none was configured (check error log)
    #[error("missing halt condition (check error log)")]
    MissingHaltCondition,

    /// Scene export / session construction failed
    #[error("session setup failed: {0}")]
    SessionSetup(#[source] anyhow::Error),

    /// The engine refused to start the session
    #[error("session start failed: {0}")]
    SessionStart(#[source] anyhow::Error),

    /// The engine refused to read back the combined image
    #[error("combined image readback failed: {0}")]
    CombinedRead(#[source] anyhow::Error),

    /// The host never declared a "Combined" pass for this layer
    #[error("layer \"{0}\" has no Combined pass")]
    MissingCombinedPass(String),
}

/// Recoverable per-channel failure - caught at channel granularity,
/// logged, never aborts the frame
#[derive(Debug, Error)]
#[error("channel {channel}: {source}")]
pub struct ChannelReadError {
    /// Buffer key of the channel that failed (includes group index for
    /// index-disambiguated channels)
    pub channel: String,
    #[source]
    pub source: anyhow::Error,
}

impl ChannelReadError {
    pub fn new(channel: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            channel: channel.into(),
            source,
        }
    }
}

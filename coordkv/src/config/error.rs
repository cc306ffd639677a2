use anyerror::AnyError;

/// Error variants related to configuration.
#[derive(Debug, Clone, thiserror::Error)]
#[derive(PartialEq, Eq)]
pub enum ConfigError {
    /// Failed to parse configuration from command-line arguments.
    #[error("ParseError: {source} while parsing ({args:?})")]
    ParseError {
        /// The underlying parse error.
        source: AnyError,
        /// The arguments that failed to parse.
        args: Vec<String>,
    },

    /// The seed endpoint can not be parsed into a base address.
    #[error("invalid endpoint {invalid:?}: {reason}")]
    InvalidEndpoint {
        /// The endpoint string provided.
        invalid: String,
        /// The reason for the parse failure.
        reason: String,
    },

    /// The protocol version must be a single, non-empty path segment.
    #[error("protocol version must be a non-empty path segment, got {invalid:?}")]
    InvalidProtocolVersion {
        /// The protocol version provided.
        invalid: String,
    },

    /// A timeout option is set to 0.
    #[error("{name} must be > 0")]
    ZeroTimeout {
        /// Name of the offending option.
        name: &'static str,
    },

    /// `max_redirects` is set to 0, which would reject every redirect.
    #[error("max_redirects must be > 0 when set")]
    MaxRedirectsIs0,
}

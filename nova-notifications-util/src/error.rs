/// Reasons an inbound notification request is rejected.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// `title` or `content` is missing or empty.
    #[error("missing title or content")]
    Validation,
    /// The payload is not valid JSON of the expected shape.
    #[error("invalid JSON: {0}")]
    Protocol(#[from] serde_json::Error),
    /// A shared key is configured and the datagram's key does not match it.
    #[error("shared key mismatch")]
    Auth,
    /// The datagram was broadcast by this very instance.
    #[error("loopback broadcast from this instance")]
    Loopback,
}

impl IngestError {
    /// Message returned to HTTP callers.
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation => String::from("Bad request: missing title or content field"),
            Self::Protocol(_) => String::from("Bad request: invalid JSON"),
            Self::Auth => String::from("Unauthorized"),
            Self::Loopback => String::from("Ignored"),
        }
    }
}

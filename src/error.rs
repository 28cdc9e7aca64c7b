/// Error taxonomy for the SIP transaction core.
///
/// Nothing here is retried internally; the single digest challenge/response
/// cycle in the client is the only second attempt the core ever makes.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SipError {
    /// No datagram arrived within the receive deadline.
    #[error("timeout waiting for SIP response")]
    Timeout,

    /// Socket-level bind/send/receive failure.
    #[error("SIP transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A 401/407 challenge that lacks the realm or nonce we need to answer it.
    #[error("401/407 challenge missing realm or nonce")]
    AuthChallengeMissingFields,

    /// A status code the flow logic does not recognize. Carries the raw
    /// status line for caller diagnostics.
    #[error("unexpected SIP status {status}: {line}")]
    UnexpectedStatus { status: u16, line: String },

    /// ACK/BYE requested before any response supplied a To tag.
    #[error("dialog has no To tag yet; cannot build in-dialog request")]
    MissingDialogState,

    /// Datagram that does not parse as a SIP response at all.
    #[error("malformed SIP response: {line:?}")]
    MalformedResponse { line: String },
}

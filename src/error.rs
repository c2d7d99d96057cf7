//! The error taxonomy from the design: one variant per fatal category plus
//! the single non-fatal one (cleanup failures, which are logged, not raised).

/// A named X extension, used only for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionName {
    Composite,
    Shape,
    Render,
    Damage,
    XFixes,
}

impl std::fmt::Display for ExtensionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExtensionName::Composite => "Composite",
            ExtensionName::Shape => "Shape",
            ExtensionName::Render => "Render",
            ExtensionName::Damage => "Damage",
            ExtensionName::XFixes => "XFixes",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error("failed to connect to X display: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),

    #[error("{extension} is missing, or its version {got:?} does not satisfy the required minimum {required:?}")]
    ExtensionVersion {
        extension: ExtensionName,
        required: (u32, u32),
        got: Option<(u32, u32)>,
    },

    #[error("expected a reply but the connection returned an event or error instead")]
    ReplyShapeMismatch,

    #[error("server reply for {request} did not fit the read buffer")]
    BufferOverflow { request: &'static str },

    #[error("server reported a protocol error: {0:?}")]
    ServerError(x11rb::protocol::ErrorKind),

    #[error("model inconsistency: {0}")]
    ModelInconsistency(String),

    #[error("X connection error: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),

    #[error("X request failed: {0}")]
    ReplyError(#[from] x11rb::errors::ReplyError),

    #[error("X request could not be completed: {0}")]
    ReplyOrIdError(#[from] x11rb::errors::ReplyOrIdError),
}

/// Category 7: resource-cleanup failures during shutdown. These are always
/// logged, never propagated — a cleanup error must not mask the error (if
/// any) that triggered shutdown in the first place.
pub fn log_cleanup_error(what: &str, err: impl std::fmt::Display) {
    tracing::warn!(target: "compman", step = what, error = %err, "cleanup step failed, continuing");
}

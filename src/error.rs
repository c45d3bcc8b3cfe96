use thiserror::Error;

/// Errors returned by [`Engine`](crate::engine::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be set up. Everything created so far has been
    /// released.
    ///
    /// Covers invalid configuration, a missing tokio runtime and a
    /// multiplexer that refused its notifiers. Creating an engine on a
    /// runtime thread outside a [`LocalSet`](tokio::task::LocalSet) is a
    /// usage error: tokio offers no way to detect it up front, and
    /// [`Engine::new`](crate::engine::Engine::new) panics instead.
    #[error("engine construction failed: {0}")]
    Construction(String),
    /// The multiplexer refused a new transfer. Nothing was retained.
    #[error("transfer registration failed: {0}")]
    Registration(#[from] MultiplexerError),
    /// The engine has been shut down.
    #[error("engine is shut down")]
    ShutDown,
}

/// Errors reported by a [`Multiplexer`](crate::multi::Multiplexer).
#[derive(Debug, Error)]
pub enum MultiplexerError {
    /// libcurl multi interface error.
    #[error("curl multi: {0}")]
    Multi(#[from] curl::MultiError),
    /// libcurl easy handle error.
    #[error("curl: {0}")]
    Easy(#[from] curl::Error),
    /// Any other multiplexer failure.
    #[error("{0}")]
    Other(String),
}

/// Non-success outcome of a single transfer.
///
/// Delivered through the transfer's [`Completion`](crate::engine::Completion),
/// never returned from an engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The transfer engine finished the transfer with an error code.
    #[error("{message} (code {code})")]
    Curl { code: i32, message: String },
    /// The finished transfer could not be detached from the multiplexer.
    #[error("detach failed: {0}")]
    Detach(String),
    /// The engine stopped before the transfer completed.
    #[error("engine shut down before the transfer completed")]
    EngineShutdown,
}

impl From<curl::Error> for TransferError {
    fn from(err: curl::Error) -> Self {
        TransferError::Curl {
            code: err.code() as i32,
            message: err.description().to_string(),
        }
    }
}

//! Error types for accelerator driver operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, ProcStarError>;

/// Closed taxonomy the benchmark driver dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any hardware access; never retried.
    Configuration,
    /// The board transport reported a failed read or write.
    Transfer,
    /// Protocol used out of order, or a board could not be opened.
    State,
    /// An optional poll bound was exhausted.
    Timeout,
}

/// Errors that can occur while driving an accelerator
#[derive(Debug, Error)]
pub enum ProcStarError {
    /// Kernel longer than the hardware pipeline
    #[error("Kernel of {len} coefficients exceeds hardware maximum of {max}")]
    KernelTooLarge {
        /// Requested kernel length
        len: usize,
        /// Hardware maximum
        max: usize,
    },

    /// Other configuration rejected before touching the board
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// Reason for rejection
        reason: String,
    },

    /// Host buffer smaller than the word-rounded transfer
    #[error("Buffer too small: transfer needs {needed} words, buffer holds {available}")]
    BufferTooSmall {
        /// Words the transfer moves
        needed: usize,
        /// Words the buffer provides
        available: usize,
    },

    /// Data transfer failed
    #[error("Transfer failed: {reason}")]
    TransferFailed {
        /// Reason for failure
        reason: String,
    },

    /// Board file not found at the expected path
    #[error("Board not found: {path}")]
    BoardNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// I/O error while opening or mapping the board
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Protocol is in the wrong state for the requested operation
    #[error("Invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },

    /// Done flag not observed within the configured poll bound
    #[error("Accelerator did not finish after {polls} polls")]
    Timeout {
        /// Polls performed
        polls: u64,
    },
}

impl ProcStarError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a transfer failed error
    pub fn transfer_failed(reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            reason: reason.into(),
        }
    }

    /// Create a board not found error
    pub fn board_not_found(path: impl Into<PathBuf>) -> Self {
        Self::BoardNotFound { path: path.into() }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Which class of failure this is.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::KernelTooLarge { .. }
            | Self::Configuration { .. }
            | Self::BufferTooSmall { .. } => ErrorKind::Configuration,
            Self::TransferFailed { .. } => ErrorKind::Transfer,
            Self::BoardNotFound { .. } | Self::Io { .. } | Self::InvalidState { .. } => {
                ErrorKind::State
            }
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// True for errors raised before any hardware access.
    pub const fn is_configuration(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration)
    }
}

use thiserror::Error;

use crate::metadata::identity::MemberId;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most failures of the external collaborators (decoder, documentation provider) never reach
/// the caller of [`crate::analysis::ExceptionFinder::analyze`]: they are absorbed at the call
/// site that triggered them and degrade only that edge of the call graph. The variants below
/// are what those collaborators report, and what the few operations that can actually fail
/// (loading a program image, building a body, a cancelled pass) return.
///
/// # Error Categories
///
/// ## Analysis Errors
/// - [`Error::Cancelled`] - The cooperative cancellation token fired during a pass
/// - [`Error::RecursionLimit`] - A type hierarchy walk exceeded the maximum depth
/// - [`Error::LockError`] - Thread synchronization failure
///
/// ## Collaborator Errors
/// - [`Error::MemberNotFound`] - The decoder does not know the requested member
/// - [`Error::TypeNotFound`] - The decoder does not know the requested type
/// - [`Error::Documentation`] - A documentation source could not be read
///
/// ## Input Errors
/// - [`Error::Malformed`] - Corrupted or inconsistent program description
/// - [`Error::InvalidMnemonic`], [`Error::DuplicateLabel`], [`Error::UndefinedLabel`] -
///   Problems while assembling a method body
/// - [`Error::FileError`], [`Error::Json`], [`Error::Xml`] - I/O and format errors
///
/// # Examples
///
/// ```rust
/// use throwscope::Error;
///
/// fn describe(result: throwscope::Result<()>) -> &'static str {
///     match result {
///         Ok(()) => "complete",
///         Err(Error::Cancelled) => "loading",
///         Err(_) => "failed",
///     }
/// }
/// # let _ = describe(Ok(()));
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The analysis pass was cancelled through its [`crate::CancellationToken`].
    ///
    /// Results touched by the pass are left in a non-complete state and must be
    /// treated as unknown, not as empty.
    #[error("Analysis was cancelled")]
    Cancelled,

    /// The input is damaged and could not be processed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The decoder has no member with the given identity.
    #[error("Failed to find member - {0}")]
    MemberNotFound(MemberId),

    /// The decoder has no type with the given full name.
    #[error("Failed to find type - {0}")]
    TypeNotFound(String),

    /// An instruction mnemonic is not a known CIL opcode.
    #[error("Invalid instruction mnemonic - {0}")]
    InvalidMnemonic(String),

    /// A label was defined twice while assembling a method body.
    #[error("Duplicate label - {0}")]
    DuplicateLabel(String),

    /// A branch or region refers to a label that was never defined.
    #[error("Undefined label - {0}")]
    UndefinedLabel(String),

    /// Recursion limit reached.
    ///
    /// Base-type walks are bounded so that a cyclic hierarchy reported by a broken decoder
    /// cannot hang the analysis. The associated value shows the limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Failed to lock target.
    ///
    /// This error occurs when a mutex or rwlock guarding the analysis state was poisoned
    /// by a panicking thread.
    #[error("Failed to lock target")]
    LockError,

    /// A documentation source could not be read or interpreted.
    #[error("Documentation error - {0}")]
    Documentation(String),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error while reading a JSON program image.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// Error while reading an XML documentation file.
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),
}

impl Error {
    /// Returns `true` if this error only means "the pass did not finish".
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing_error::{SpanTrace, SpanTraceStatus};

/* 📖 # Why a custom error type and not use anyhow/eyre/thiserror etc?

- Callers need to branch on the failure category (NotFound vs AlreadyExists vs StaleHandle),
  so the categories are part of the public API
- No dependencies to compile and integrate
- More transparency into error handling logic
 */

/// Error variants that can occur in sysobj operations.
/// Each variant represents a specific error category with its associated context.
#[derive(Debug)]
pub enum ErrorKind {
    /// A FIND-mode handle was requested for a path that does not exist
    NotFound { path: PathBuf },

    /// A CREATE-mode handle was requested for an existing path, or a rename target is taken
    AlreadyExists { path: PathBuf },

    /// Malformed child name, parent that is not a directory, or wrong entry kind
    InvalidArgument { message: String },

    /// Removal of a protected handle, or parent access on the root
    PermissionDenied { path: PathBuf, reason: String },

    /// The backing path of a handle no longer exists
    StaleHandle { path: PathBuf },

    /// A bounded wait expired
    Timeout { path: PathBuf, waited: Duration },

    /// Native file system operation failed
    FileError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Catch-all for other errors with a message
    Message { message: String },
}

/* 📖 # Why separate ErrorKind and SysobjError?
ErrorKind carries the structural variant callers match on.
SysobjError wraps it with context strings, an optional cause and the span trace captured
at construction time, so context can be attached during propagation without nesting
strings inside the kind.
*/

/// Error type wrapping ErrorKind with context, cause and span trace.
pub struct SysobjError {
    kind: ErrorKind,
    context: Vec<String>,
    cause: Option<Box<SysobjError>>,
    span_trace: SpanTrace,
}

impl SysobjError {
    /// Creates a new error from an ErrorKind, capturing the current span trace.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: vec![],
            cause: None,
            span_trace: SpanTrace::capture(),
        }
    }

    /// Creates a `Message` error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message {
            message: message.into(),
        })
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::new(ErrorKind::NotFound { path: path.into() })
    }

    pub fn already_exists(path: impl Into<PathBuf>) -> Self {
        Self::new(ErrorKind::AlreadyExists { path: path.into() })
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument {
            message: message.into(),
        })
    }

    pub fn permission_denied(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied {
            path: path.into(),
            reason: reason.into(),
        })
    }

    pub fn stale_handle(path: impl Into<PathBuf>) -> Self {
        Self::new(ErrorKind::StaleHandle { path: path.into() })
    }

    pub fn timeout(path: impl Into<PathBuf>, waited: Duration) -> Self {
        Self::new(ErrorKind::Timeout {
            path: path.into(),
            waited,
        })
    }

    /// Wraps a native I/O failure for the given path.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::new(ErrorKind::FileError {
            path: path.into(),
            source,
        })
    }

    /// Attaches context to an error.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attaches context using lazy evaluation.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.context.push(f());
        self
    }

    /// Records the error that caused this one.
    pub fn caused_by(mut self, cause: SysobjError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns a reference to the underlying ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn get_context(&self) -> &[String] {
        &self.context
    }

    pub fn cause(&self) -> Option<&SysobjError> {
        self.cause.as_deref()
    }

    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// Returns the innermost error in the chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    fn kind_description(&self) -> String {
        match &self.kind {
            ErrorKind::NotFound { path } => format!("Not found: {}", path.display()),
            ErrorKind::AlreadyExists { path } => format!("Already exists: {}", path.display()),
            ErrorKind::InvalidArgument { message } => format!("Invalid argument: {}", message),
            ErrorKind::PermissionDenied { path, reason } => {
                format!("Permission denied for {}: {}", path.display(), reason)
            }
            ErrorKind::StaleHandle { path } => {
                format!("Stale handle, backing path is gone: {}", path.display())
            }
            ErrorKind::Timeout { path, waited } => format!(
                "Timed out after {}ms waiting for {}",
                waited.as_millis(),
                path.display()
            ),
            ErrorKind::FileError { path, source } => {
                format!("File error at {}: {}", path.display(), source)
            }
            ErrorKind::Message { message } => message.clone(),
        }
    }

    fn tree_lines(&self, lines: &mut Vec<String>, indent: &str) {
        let mut items: Vec<(String, Option<&SysobjError>)> =
            self.context.iter().map(|ctx| (ctx.clone(), None)).collect();
        if let Some(cause) = &self.cause {
            items.push((format!("cause: {}", cause.kind_description()), Some(cause)));
        }
        let count = items.len();
        for (index, (text, cause)) in items.into_iter().enumerate() {
            let last = index + 1 == count;
            let branch = if last { "└─ " } else { "├─ " };
            lines.push(format!("{}{}{}", indent, branch, text));
            if let Some(cause) = cause {
                let nested = format!("{}{}", indent, if last { "   " } else { "│  " });
                cause.tree_lines(lines, &nested);
            }
        }
    }
}

impl From<ErrorKind> for SysobjError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl StdError for SysobjError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::FileError { source, .. } => Some(source),
            _ => self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static)),
        }
    }
}

impl fmt::Display for SysobjError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display context first if present
        for (i, ctx) in self.context.iter().enumerate() {
            if i == 0 {
                write!(f, "{}", ctx)?;
            } else {
                write!(f, ": {}", ctx)?;
            }
        }

        if !self.context.is_empty() {
            write!(f, ": ")?;
        }

        write!(f, "{}", self.kind_description())
    }
}

/* 📖 # Why a custom Debug impl?
`{:?}` on an error usually ends up in logs or test failure output. Rendering the message,
its context and the cause chain as a small tree, followed by the span trace, keeps the
diagnosis readable without scrolling through nested struct dumps.
*/
impl fmt::Debug for SysobjError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = vec![self.kind_description()];
        self.tree_lines(&mut lines, "");
        write!(f, "{}", lines.join("\n"))?;
        if self.span_trace.status() == SpanTraceStatus::CAPTURED {
            write!(f, "\nTrace: {}", self.span_trace)?;
        }
        Ok(())
    }
}

/* 📖 # Why use Box<SysobjError> in the result type?

Boxing the error reduces the size of the result type, making it more efficient to return in the common case.

*/

/// Standard result type for sysobj operations.
pub type SysobjResult<T> = std::result::Result<T, Box<SysobjError>>;

/// Extension trait for attaching context to Results.
pub trait ResultExt<T> {
    /// Attaches context to an error, consuming and re-wrapping it.
    fn context(self, context: impl Into<String>) -> SysobjResult<T>;

    /// Attaches context using lazy evaluation.
    /// Context is only evaluated if the result is an error.
    fn with_context<F>(self, f: F) -> SysobjResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for SysobjResult<T> {
    fn context(self, context: impl Into<String>) -> SysobjResult<T> {
        self.map_err(|err| Box::new(err.context(context)))
    }

    fn with_context<F>(self, f: F) -> SysobjResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| Box::new(err.with_context(f)))
    }
}

/// Builds a boxed `Message` error from a format string.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        Box::new($crate::error::SysobjError::message(format!($($arg)*)))
    };
}

/// Returns early with a boxed `Message` error.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::err!($($arg)*))
    };
}

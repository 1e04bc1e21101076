//! Errors generated by the compiler framework.
//!
//! The wait-state analysis itself never produces these: its input is a
//! finished program and contract violations inside the analysis panic. Errors
//! come from the framework around it (pass registration, pass plans, option
//! parsing) and from the validation pass.

/// Convenience wrapper to represent success or meaningful compiler error.
pub type WaitcntResult<T> = std::result::Result<T, Error>;

/// Errors generated by the compiler
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
    post_msg: Option<String>,
}

#[derive(Clone, Debug, thiserror::Error)]
enum ErrorKind {
    /// The program violates a structural invariant of the IR.
    #[error("Malformed Program: {0}")]
    MalformedProgram(String),
    /// The program does not satisfy an assumption made by a pass.
    #[error("Pass Assumption Violated: {0}")]
    PassAssumption(String),
    /// An option handed to a pass could not be used.
    #[error("Invalid Option: {0}")]
    InvalidOption(String),
    /// A failure while writing output.
    #[error("Write Error: {0}")]
    WriteError(String),
    /// Miscellaneous error message
    #[error("{0}")]
    Misc(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(post) = &self.post_msg {
            write!(f, "\n{post}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for Error {}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            post_msg: None,
        }
    }

    /// Attach a note that is printed after the main message.
    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn malformed_program<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::MalformedProgram(msg.to_string()))
    }

    pub fn pass_assumption<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::PassAssumption(msg.to_string()))
    }

    pub fn invalid_option<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidOption(msg.to_string()))
    }

    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::WriteError(msg.to_string()))
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Misc(msg.to_string()))
    }

    /// The message of this error without the trailing note.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::write_error(format!("IO Error: {e}"))
    }
}

impl From<std::fmt::Error> for Error {
    fn from(e: std::fmt::Error) -> Self {
        Error::write_error(format!("Format Error: {e}"))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Tokenization failed at line {line}: {message}")]
    TokenizeError { message: String, line: usize },

    #[error("Syntax error at line {line}: {message}")]
    SyntaxError { message: String, line: usize },

    #[error("Invalid VM init parameters: {0}")]
    InvalidInitParam(#[from] serde_json::Error),
}

impl Error {
    /// Line in the script source the error points at, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::TokenizeError { line, .. } | Error::SyntaxError { line, .. } => Some(*line),
            Error::InvalidInitParam(_) => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Error::TokenizeError { message, .. } | Error::SyntaxError { message, .. } => message.clone(),
            Error::InvalidInitParam(e) => e.to_string(),
        }
    }
}

#[macro_export]
macro_rules! raise_syntax_error {
    ($line:expr, $msg:expr) => {
        $crate::Error::SyntaxError {
            message: $msg.to_string(),
            line: $line,
        }
    };
}

#[macro_export]
macro_rules! raise_tokenize_error {
    ($line:expr, $msg:expr) => {
        $crate::Error::TokenizeError {
            message: $msg.to_string(),
            line: $line,
        }
    };
}

//! Domain error types.

/// What made a formula file unloadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// No token pattern matched the input.
    Lex,
    /// Malformed statement or expression.
    Syntax,
    /// Function name not in the builtin set.
    UnknownFunction,
    /// Builtin called with the wrong number of arguments.
    BadArity,
}

/// A formula-load error with position information. Fatal to the whole run:
/// a broken rule file must never partially screen.
#[derive(Debug, Clone, thiserror::Error)]
#[error("formula error at position {position}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
        }
    }

    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let prefix_width = input
            .chars()
            .scan(0usize, |bytes, ch| {
                *bytes += ch.len_utf8();
                Some(*bytes)
            })
            .take_while(|&b| b <= self.position)
            .count();
        let caret = " ".repeat(prefix_width) + "^";
        format!("{input}\n{caret}\n{err}", err = self)
    }
}

/// Per-instrument evaluation error. Caught at the orchestrator boundary,
/// logged, tallied, and never fatal to the batch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("undefined symbol: {0}")]
    UndefinedSymbol(String),

    #[error("invalid arguments to {function}: {reason}")]
    InvalidArguments { function: String, reason: String },
}

/// Top-level error type for tdxscreen.
#[derive(Debug, thiserror::Error)]
pub enum ScreenerError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    FormulaParse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("no trading data for {code} as of {trade_date}")]
    NoData { code: String, trade_date: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ScreenerError> for std::process::ExitCode {
    fn from(err: &ScreenerError) -> Self {
        let code: u8 = match err {
            ScreenerError::Io(_) => 1,
            ScreenerError::ConfigParse { .. }
            | ScreenerError::ConfigMissing { .. }
            | ScreenerError::ConfigInvalid { .. } => 2,
            ScreenerError::Database { .. } => 3,
            ScreenerError::FormulaParse(_) | ScreenerError::Eval(_) => 4,
            ScreenerError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

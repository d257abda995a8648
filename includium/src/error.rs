//! Error taxonomy and the `file:line[:col]` diagnostic type used throughout
//! the engine: a struct carrying a [`PreprocessErrorKind`] plus builder
//! methods (`with_column`, `with_source_line`) for attaching caret-rendered
//! source context.

use std::fmt;
use std::rc::Rc;

/// The taxonomy of errors the engine can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreprocessErrorKind {
    /// Malformed number, unterminated literal, stray character.
    Lexical,
    /// Malformed `#include`, misplaced conditional directive, unterminated
    /// conditional, bad `#define`/`#line`.
    MalformedDirective,
    /// Wrong macro argument count, invalid `##` placement, duplicate
    /// parameter names.
    MacroArgMismatch,
    /// `#if`/`#elif` expression syntax error or evaluation fault.
    Evaluator,
    /// Conditional-stack misuse: unmatched `#else`/`#elif`/`#endif`, or
    /// unterminated `#if` at end of file.
    Conditional,
    /// Include target could not be found or opened.
    IncludeNotFound,
    /// Macro expansion recursion limit exceeded.
    RecursionLimitExceeded,
    /// `#error` directive encountered.
    UserError,
    /// I/O failure (file open/read/write).
    Io,
    /// Anything not covered above.
    Other,
}

impl fmt::Display for PreprocessErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lexical => "lexical error",
            Self::MalformedDirective => "malformed directive",
            Self::MacroArgMismatch => "macro argument mismatch",
            Self::Evaluator => "expression error",
            Self::Conditional => "conditional compilation error",
            Self::IncludeNotFound => "include not found",
            Self::RecursionLimitExceeded => "recursion limit exceeded",
            Self::UserError => "#error",
            Self::Io => "I/O error",
            Self::Other => "error",
        };
        f.write_str(s)
    }
}

/// A single diagnostic, with enough context to render as
/// `file:line[:col]: message`, optionally followed by the offending source
/// line and a `^` caret.
#[derive(Clone, Debug)]
pub struct PreprocessError {
    /// The error's category.
    pub kind: PreprocessErrorKind,
    /// File the error occurred in.
    pub file: Rc<str>,
    /// 1-based line.
    pub line: u32,
    /// 1-based column, if known.
    pub column: Option<usize>,
    /// The offending source line's text, if available, for caret rendering.
    pub source_line: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl PreprocessError {
    fn new(kind: PreprocessErrorKind, file: Rc<str>, line: u32, message: impl Into<String>) -> Self {
        Self { kind, file, line, column: None, source_line: None, message: message.into() }
    }

    /// `#define`/`#undef`/`#line`/`#include` syntax errors.
    #[must_use]
    pub fn malformed_directive(file: Rc<str>, line: u32, directive: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::MalformedDirective, file, line, directive)
    }

    /// Unmatched or unterminated conditional directives.
    #[must_use]
    pub fn conditional_error(file: Rc<str>, line: u32, message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::Conditional, file, line, message)
    }

    /// An `#include` target that could not be located.
    #[must_use]
    pub fn include_not_found(file: Rc<str>, line: u32, target: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::IncludeNotFound, file, line, target)
    }

    /// A macro invocation with the wrong number of arguments, or a
    /// definition-time `##`/duplicate-parameter violation.
    #[must_use]
    pub fn macro_arg_mismatch(file: Rc<str>, line: u32, message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::MacroArgMismatch, file, line, message)
    }

    /// A syntax error or fault inside a `#if`/`#elif` expression.
    #[must_use]
    pub fn evaluator_error(file: Rc<str>, line: u32, message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::Evaluator, file, line, message)
    }

    /// Macro recursion depth exceeded `recursion_limit`.
    #[must_use]
    pub fn recursion_limit_exceeded(file: Rc<str>, line: u32, message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::RecursionLimitExceeded, file, line, message)
    }

    /// A user `#error` directive.
    #[must_use]
    pub fn user_error(file: Rc<str>, line: u32, message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::UserError, file, line, message)
    }

    /// Catch-all for diagnostics not covered by a more specific constructor.
    #[must_use]
    pub fn other(file: Rc<str>, line: u32, message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::Other, file, line, message)
    }

    /// Attach a 1-based column.
    #[must_use]
    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    /// Attach the offending source line's text, for caret rendering.
    #[must_use]
    pub fn with_source_line(mut self, line_text: impl Into<String>) -> Self {
        self.source_line = Some(line_text.into());
        self
    }
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(col) => write!(f, "{}:{}:{}: {}", self.file, self.line, col, self.message)?,
            None => write!(f, "{}:{}: {}", self.file, self.line, self.message)?,
        }
        if let Some(src) = &self.source_line {
            writeln!(f)?;
            write!(f, "    {src}")?;
            if let Some(col) = self.column {
                writeln!(f)?;
                write!(f, "    {}^", " ".repeat(col.saturating_sub(1)))?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for PreprocessError {}

impl From<std::io::Error> for PreprocessError {
    fn from(err: std::io::Error) -> Self {
        PreprocessError::new(PreprocessErrorKind::Io, Rc::from(""), 0, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_column() {
        let e = PreprocessError::malformed_directive(Rc::from("a.c"), 3, "bad #define");
        assert_eq!(e.to_string(), "a.c:3: bad #define");
    }

    #[test]
    fn display_with_column_and_caret() {
        let e = PreprocessError::evaluator_error(Rc::from("a.c"), 3, "division by zero")
            .with_column(5)
            .with_source_line("#if 1 / 0");
        let rendered = e.to_string();
        assert!(rendered.contains("a.c:3:5: division by zero"));
        assert!(rendered.contains("#if 1 / 0"));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::other("boom");
        let e: PreprocessError = io_err.into();
        assert_eq!(e.kind, PreprocessErrorKind::Io);
    }
}

//! Preprocessing tokens and the handful of character-classification helpers
//! the lexer and expander share.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Check if a character can start an identifier (letter or underscore).
pub const fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Check if a character can continue an identifier (letter, digit, or underscore).
pub const fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// The syntactic category of a preprocessing token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// An identifier, which may or may not name a macro.
    Identifier,
    /// A preprocessing number (wider than a C numeric literal; see C99 6.4.8).
    Number,
    /// A string literal, including surrounding quotes.
    StringLiteral,
    /// A character literal, including surrounding quotes.
    CharLiteral,
    /// Horizontal whitespace (spaces and tabs), collapsed to one token per run.
    Whitespace,
    /// A newline.
    Newline,
    /// A backslash-newline line continuation that survived to this stage
    /// (only possible when line splicing was performed lazily by the caller;
    /// the default pipeline removes these before lexing).
    LineContinuation,
    /// A block comment `/* ... */`.
    BlockComment,
    /// A line comment `// ...`.
    LineComment,
    /// The stringize operator `#` at the start of a directive line or inside
    /// a macro replacement list.
    Hash,
    /// The token-paste operator `##`.
    HashHash,
    /// Any other single- or multi-character punctuator/operator.
    Punctuator,
    /// Anything the lexer could not classify; reported through the error hook
    /// but still emitted so recovery can continue.
    Unknown,
}

/// A single preprocessing token.
///
/// `expanded_from` records which macro names have already contributed this
/// token to the current expansion; it is the mechanism that prevents a macro
/// from recursively re-expanding itself (C99 6.10.3.4).
#[derive(Clone, Debug)]
pub struct Token {
    /// The syntactic category.
    pub kind: TokenKind,
    /// The token's literal text, as it should appear in output (operators,
    /// identifiers, numbers) or including delimiters (strings, chars).
    pub text: String,
    /// Path of the file this token's location is reported against.
    pub source: Rc<str>,
    /// 1-based source line.
    pub line: u32,
    /// Macro names whose expansion already produced this token.
    pub expanded_from: BTreeSet<Rc<str>>,
}

impl Token {
    /// Build a new token at a given source location.
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, source: Rc<str>, line: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            source,
            line,
            expanded_from: BTreeSet::new(),
        }
    }

    /// True if this token is whitespace, a newline, or a comment: it carries
    /// no semantic weight for macro lookup or argument parsing.
    #[must_use]
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace
                | TokenKind::Newline
                | TokenKind::LineContinuation
                | TokenKind::BlockComment
                | TokenKind::LineComment
        )
    }

    /// True if this identifier token has already been expanded as the named
    /// macro somewhere in its ancestry.
    #[must_use]
    pub fn has_expanded_from(&self, macro_name: &str) -> bool {
        self.expanded_from.contains(macro_name)
    }

    /// Return a clone of this token tagged with an additional entry in
    /// `expanded_from`, and relocated to the given invocation site. Used when
    /// splicing a macro's replacement list into the output: every produced
    /// token inherits the invoking token's location plus the new mask entry.
    #[must_use]
    pub fn retagged(&self, macro_name: &Rc<str>, invocation_source: &Rc<str>, invocation_line: u32) -> Self {
        let mut t = self.clone();
        t.expanded_from.insert(Rc::clone(macro_name));
        t.source = Rc::clone(invocation_source);
        t.line = invocation_line;
        t
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Render a token sequence back to text with no whitespace normalisation
/// beyond simple concatenation. Used for stringize and for debug output; the
/// writer (`crate::writer`) applies the full whitespace-collapse rules.
#[must_use]
pub fn tokens_to_string(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: TokenKind, text: &str) -> Token {
        Token::new(kind, text, Rc::from("test.c"), 1)
    }

    #[test]
    fn identifier_classification() {
        assert!(is_identifier_start('_'));
        assert!(is_identifier_start('a'));
        assert!(!is_identifier_start('1'));
        assert!(is_identifier_continue('1'));
    }

    #[test]
    fn trivia_detection() {
        assert!(tok(TokenKind::Whitespace, " ").is_trivia());
        assert!(tok(TokenKind::LineComment, "// x").is_trivia());
        assert!(!tok(TokenKind::Identifier, "x").is_trivia());
    }

    #[test]
    fn retagging_adds_mask_and_moves_location() {
        let base = tok(TokenKind::Identifier, "x");
        let name: Rc<str> = Rc::from("X");
        let invoker: Rc<str> = Rc::from("caller.c");
        let retagged = base.retagged(&name, &invoker, 42);
        assert!(retagged.has_expanded_from("X"));
        assert_eq!(retagged.line, 42);
        assert_eq!(&*retagged.source, "caller.c");
    }

    #[test]
    fn tokens_to_string_concatenates() {
        let toks = vec![tok(TokenKind::Identifier, "a"), tok(TokenKind::Punctuator, "+"), tok(TokenKind::Identifier, "b")];
        assert_eq!(tokens_to_string(&toks), "a+b");
    }
}

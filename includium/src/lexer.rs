//! Text-to-token lexing: trigraph replacement, line splicing, and
//! tokenisation into the rich [`Token`] stream the rest of the engine
//! operates on.
//!
//! Character-by-character scanning producing [`TokenKind`]-tagged tokens
//! carrying source/line attribution, with trigraph/splice handling folded
//! in ahead of the scan so downstream line numbers stay correct (see
//! `DESIGN.md`'s open-question decision on this).

use crate::token::{is_identifier_continue, is_identifier_start, Token, TokenKind};
use std::rc::Rc;

/// C99 Annex trigraph substitution table.
const TRIGRAPHS: &[(&str, char)] = &[
    ("??=", '#'),
    ("??/", '\\'),
    ("??'", '^'),
    ("??(", '['),
    ("??)", ']'),
    ("??!", '|'),
    ("??<", '{'),
    ("??>", '}'),
    ("??-", '~'),
];

/// Replace trigraph sequences with their single-character equivalents.
/// Line numbers are unaffected since trigraphs never contain a newline.
#[must_use]
pub fn replace_trigraphs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    'outer: while i < bytes.len() {
        if bytes[i] == b'?' && i + 2 < bytes.len() {
            for (pat, repl) in TRIGRAPHS {
                if input[i..].starts_with(pat) {
                    out.push(*repl);
                    i += pat.len();
                    continue 'outer;
                }
            }
        }
        let ch = input[i..].chars().next().unwrap_or('?');
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Normalise `\r\n` to `\n` ahead of lexing, since nothing downstream needs
/// to distinguish them. Trigraph replacement is applied first by the caller
/// ([`replace_trigraphs`]); line splicing itself happens during [`tokenize`]
/// as a `LineContinuation` trivia token rather than as text surgery, so that
/// every token's line number stays exact without a separate delta map.
#[must_use]
pub fn normalize_newlines(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// Tokenize a whole translation unit's text (after trigraph replacement and
/// newline normalisation have already been applied by the caller, typically
/// [`crate::driver`]) into a flat token stream, tagging every token with
/// `source` and its 1-based line number. A backslash immediately followed by
/// optional horizontal whitespace and a newline is recognised here as a
/// single `LineContinuation` token (trivia, skipped by the expander and
/// directive processor, deleted by the writer) rather than spliced out of
/// the text beforehand.
#[must_use]
pub fn tokenize(input: &str, source: &Rc<str>) -> Vec<Token> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut line: u32 = 1;

    macro_rules! push {
        ($kind:expr, $text:expr) => {
            tokens.push(Token::new($kind, $text, Rc::clone(source), line))
        };
    }

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                push!(TokenKind::Newline, "\n");
                line += 1;
                i += 1;
            }
            ' ' | '\t' => {
                let start = i;
                while i < chars.len() && (chars[i] == ' ' || chars[i] == '\t') {
                    i += 1;
                }
                push!(TokenKind::Whitespace, chars[start..i].iter().collect::<String>());
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                let start = i;
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                push!(TokenKind::LineComment, chars[start..i].iter().collect::<String>());
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = i;
                i += 2;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        i += 2;
                        closed = true;
                        break;
                    }
                    i += 1;
                }
                let _ = closed; // unterminated block comments are tolerated rather than erroring.
                push!(TokenKind::BlockComment, chars[start..i].iter().collect::<String>());
            }
            '"' => {
                let text = scan_quoted(&chars, i, '"');
                push!(TokenKind::StringLiteral, text.clone());
                i += text.chars().count();
            }
            '\'' => {
                let text = scan_quoted(&chars, i, '\'');
                push!(TokenKind::CharLiteral, text.clone());
                i += text.chars().count();
            }
            c if is_identifier_start(c) => {
                let start = i;
                while i < chars.len() && is_identifier_continue(chars[i]) {
                    i += 1;
                }
                push!(TokenKind::Identifier, chars[start..i].iter().collect::<String>());
            }
            c if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let d = chars[i];
                    if d.is_ascii_alphanumeric() || d == '.' {
                        if (d == 'e' || d == 'E' || d == 'p' || d == 'P')
                            && matches!(chars.get(i + 1), Some('+') | Some('-'))
                        {
                            i += 2;
                            continue;
                        }
                        i += 1;
                    } else if d == '\'' && chars.get(i + 1).is_some_and(|n| n.is_ascii_alphanumeric()) {
                        // digit separator, e.g. 1'000 in some dialects.
                        i += 1;
                    } else {
                        break;
                    }
                }
                push!(TokenKind::Number, chars[start..i].iter().collect::<String>());
            }
            '\\' if is_line_continuation(&chars, i) => {
                let start = i;
                i += 1;
                while matches!(chars.get(i), Some(' ') | Some('\t')) {
                    i += 1;
                }
                i += 1; // the newline itself.
                push!(TokenKind::LineContinuation, chars[start..i].iter().collect::<String>());
                line += 1;
            }
            '#' if chars.get(i + 1) == Some(&'#') => {
                push!(TokenKind::HashHash, "##");
                i += 2;
            }
            '#' => {
                push!(TokenKind::Hash, "#");
                i += 1;
            }
            _ => {
                let (text, len) = scan_punctuator(&chars, i);
                push!(TokenKind::Punctuator, text);
                i += len;
            }
        }
    }

    tokens
}

/// Scan a quoted literal (string or char), honoring backslash escapes.
/// Returns the literal's full text (including delimiters). An unterminated
/// literal stops right before the line's `\n`, leaving that character
/// unconsumed so the caller's ordinary newline handling accounts for it
/// exactly once.
fn scan_quoted(chars: &[char], start: usize, quote: char) -> String {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                i += 2;
            }
            c if c == quote => {
                i += 1;
                break;
            }
            '\n' => {
                break; // unterminated literal: stop at end of line, tolerated.
            }
            _ => i += 1,
        }
    }
    chars[start..i].iter().collect()
}

/// Multi-character punctuators recognised by the C grammar, longest first so
/// greedy matching picks the right one.
const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "...", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "::",
];

fn is_line_continuation(chars: &[char], i: usize) -> bool {
    let mut j = i + 1;
    while matches!(chars.get(j), Some(' ') | Some('\t')) {
        j += 1;
    }
    chars.get(j) == Some(&'\n')
}

fn scan_punctuator(chars: &[char], i: usize) -> (String, usize) {
    for p in PUNCTUATORS {
        let plen = p.chars().count();
        if i + plen <= chars.len() && chars[i..i + plen].iter().collect::<String>() == *p {
            return (p.to_string(), plen);
        }
    }
    (chars[i].to_string(), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> Rc<str> {
        Rc::from("t.c")
    }

    #[test]
    fn trigraphs_are_replaced() {
        assert_eq!(replace_trigraphs("??="), "#");
        assert_eq!(replace_trigraphs("a??(b??)"), "a[b]");
    }

    #[test]
    fn line_continuation_is_trivia_and_advances_line() {
        let toks = tokenize("a\\\nb", &src());
        assert_eq!(toks[0].text, "a");
        assert!(toks[1].is_trivia());
        assert_eq!(toks[1].kind, TokenKind::LineContinuation);
        assert_eq!(toks[2].line, 2);
        assert_eq!(toks[2].text, "b");
    }

    #[test]
    fn tokenizes_identifiers_and_numbers() {
        let toks = tokenize("foo 123 0x1p+3", &src());
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Whitespace,
                TokenKind::Number,
                TokenKind::Whitespace,
                TokenKind::Number
            ]
        );
        assert_eq!(toks[4].text, "0x1p+3");
    }

    #[test]
    fn hash_hash_is_its_own_token() {
        let toks = tokenize("a ## b", &src());
        assert!(toks.iter().any(|t| t.kind == TokenKind::HashHash && t.text == "##"));
    }

    #[test]
    fn string_and_char_literals_honor_escapes() {
        let toks = tokenize(r#""a\"b" 'c'"#, &src());
        assert_eq!(toks[0].kind, TokenKind::StringLiteral);
        assert_eq!(toks[0].text, r#""a\"b""#);
    }

    #[test]
    fn comments_are_single_tokens() {
        let toks = tokenize("x /* c */ y // trailing\n", &src());
        assert!(toks.iter().any(|t| t.kind == TokenKind::BlockComment));
        assert!(toks.iter().any(|t| t.kind == TokenKind::LineComment));
    }

    #[test]
    fn multi_char_punctuators_prefer_longest_match() {
        let toks = tokenize("a <<= b", &src());
        assert!(toks.iter().any(|t| t.text == "<<="));
    }
}

//! Output serialization: collapsing trivia according to the configured
//! compression level and emitting `#line` markers across file/line jumps.
//! Tracks the last-emitted file/line; a same-file gap of up to
//! `blank_line_threshold` lines is closed with literal blank lines instead
//! of a marker, and only a larger gap (or a file change) earns one.

use crate::config::CompressLevel;
use crate::context::PreprocessorContext;
use crate::token::{Token, TokenKind};
use std::fmt::Write as _;
use std::rc::Rc;

/// Serialize an expanded token stream to output text, inserting `#line`
/// markers as configured and applying the compression level.
#[must_use]
pub fn write(ctx: &PreprocessorContext, tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut last_source: Option<Rc<str>> = None;
    let mut last_line: u32 = 0;
    let mut at_line_start = true;

    for tok in tokens {
        if tok.kind == TokenKind::Newline {
            out.push('\n');
            at_line_start = true;
            last_line += 1;
            continue;
        }

        if at_line_start {
            match marker_decision(ctx.blank_line_threshold, &last_source, last_line, tok) {
                MarkerDecision::Marker => {
                    if let Some(prefix) = &ctx.line_directive_prefix {
                        let _ = writeln!(out, "{prefix} {} \"{}\"", tok.line, tok.source);
                    }
                }
                MarkerDecision::CatchUp(blanks) => {
                    for _ in 0..blanks {
                        out.push('\n');
                    }
                }
                MarkerDecision::Contiguous => {}
            }
            last_source = Some(Rc::clone(&tok.source));
            last_line = tok.line;
        }
        at_line_start = false;

        match tok.kind {
            TokenKind::LineContinuation => continue,
            TokenKind::BlockComment | TokenKind::LineComment if !ctx.passthru_comments => continue,
            TokenKind::Whitespace => push_whitespace(&mut out, ctx.compress),
            _ => out.push_str(&tok.text),
        }
    }

    match ctx.compress {
        CompressLevel::None => out,
        CompressLevel::Moderate => collapse_blank_lines(&out, 2),
        CompressLevel::Aggressive => collapse_blank_lines(&out, 1),
    }
}

/// What the writer should do to reconcile the previous emitted position
/// with `tok`'s actual source position.
enum MarkerDecision {
    /// Emit a `#line` marker (file changed, backward jump, or the gap is
    /// larger than the configured threshold).
    Marker,
    /// Close a small forward gap within the same file with this many
    /// literal blank lines.
    CatchUp(u32),
    /// `tok` follows directly; nothing to reconcile.
    Contiguous,
}

fn marker_decision(blank_line_threshold: u32, last_source: &Option<Rc<str>>, last_line: u32, tok: &Token) -> MarkerDecision {
    let Some(src) = last_source else {
        return MarkerDecision::Marker;
    };
    if *src != tok.source || tok.line <= last_line {
        return MarkerDecision::Marker;
    }
    let gap = tok.line - last_line - 1;
    if gap == 0 {
        MarkerDecision::Contiguous
    } else if gap > blank_line_threshold {
        MarkerDecision::Marker
    } else {
        MarkerDecision::CatchUp(gap)
    }
}

fn push_whitespace(out: &mut String, compress: CompressLevel) {
    match compress {
        CompressLevel::None => out.push(' '),
        CompressLevel::Moderate | CompressLevel::Aggressive => {
            if !out.ends_with(' ') && !out.ends_with('\n') {
                out.push(' ');
            }
        }
    }
}

/// Collapse runs of more than `max_consecutive` blank lines down to exactly
/// that many.
fn collapse_blank_lines(text: &str, max_consecutive: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n');
        if trimmed.trim().is_empty() {
            blank_run += 1;
            if blank_run > max_consecutive {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessorConfig;

    fn tok(kind: TokenKind, text: &str, source: &Rc<str>, line: u32) -> Token {
        Token::new(kind, text, Rc::clone(source), line)
    }

    #[test]
    fn writes_plain_tokens_with_line_markers_on_jump() {
        let ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        let src: Rc<str> = Rc::from("a.c");
        let tokens = vec![
            tok(TokenKind::Identifier, "x", &src, 5),
            tok(TokenKind::Newline, "\n", &src, 5),
        ];
        let out = write(&ctx, &tokens);
        assert!(out.contains("#line 5 \"a.c\""));
        assert!(out.contains('x'));
    }

    #[test]
    fn small_gap_is_closed_with_blank_lines_not_a_marker() {
        let mut cfg = PreprocessorConfig::for_linux();
        cfg.line_directive_prefix = None;
        let ctx = PreprocessorContext::new(cfg);
        let src: Rc<str> = Rc::from("a.c");
        let tokens = vec![
            tok(TokenKind::Identifier, "x", &src, 1),
            tok(TokenKind::Newline, "\n", &src, 1),
            tok(TokenKind::Identifier, "y", &src, 4),
        ];
        let out = write(&ctx, &tokens);
        assert_eq!(out, "x\n\ny");
    }

    #[test]
    fn gap_past_threshold_still_emits_a_marker() {
        let ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        let src: Rc<str> = Rc::from("a.c");
        let tokens = vec![
            tok(TokenKind::Identifier, "x", &src, 1),
            tok(TokenKind::Newline, "\n", &src, 1),
            tok(TokenKind::Identifier, "y", &src, 20),
        ];
        let out = write(&ctx, &tokens);
        assert!(out.contains("#line 20 \"a.c\""));
    }

    #[test]
    fn no_marker_when_line_directive_prefix_is_none() {
        let mut cfg = PreprocessorConfig::for_linux();
        cfg.line_directive_prefix = None;
        let ctx = PreprocessorContext::new(cfg);
        let src: Rc<str> = Rc::from("a.c");
        let tokens = vec![tok(TokenKind::Identifier, "x", &src, 1)];
        let out = write(&ctx, &tokens);
        assert_eq!(out, "x");
    }

    #[test]
    fn aggressive_compress_collapses_blank_lines() {
        let mut cfg = PreprocessorConfig::for_linux();
        cfg.compress = crate::config::CompressLevel::Aggressive;
        let ctx = PreprocessorContext::new(cfg);
        let src: Rc<str> = Rc::from("a.c");
        let tokens = vec![
            tok(TokenKind::Identifier, "x", &src, 1),
            tok(TokenKind::Newline, "\n", &src, 1),
            tok(TokenKind::Newline, "\n", &src, 2),
            tok(TokenKind::Newline, "\n", &src, 3),
            tok(TokenKind::Identifier, "y", &src, 4),
        ];
        let out = write(&ctx, &tokens);
        assert!(!out.contains("\n\n\n"));
    }
}

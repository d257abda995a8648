//! Macro expansion: the rescanning algorithm of C99 6.10.3, including
//! argument collection, stringize, token paste with re-lex-and-split-back,
//! and per-token self-reference inhibition (see `DESIGN.md` for why masking
//! is per-token rather than a single global set of disabled names).

use crate::context::PreprocessorContext;
use crate::macro_def::{Macro, Patch};
use crate::token::{Token, TokenKind};
use std::rc::Rc;

/// Expand a full token list (typically one logical, already-spliced line)
/// against the current macro table. `currently_expanding` is the set of
/// macro names whose replacement we are already inside of on this call
/// stack; callers at the top level pass an empty set.
pub fn expand(ctx: &mut PreprocessorContext, tokens: &[Token]) -> Vec<Token> {
    expand_inner(ctx, tokens, &[])
}

fn expand_inner(ctx: &mut PreprocessorContext, tokens: &[Token], currently_expanding: &[Rc<str>]) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];

        if tok.kind != TokenKind::Identifier {
            out.push(tok.clone());
            i += 1;
            continue;
        }

        if let Some(builtin) = expand_builtin(ctx, tok) {
            out.push(builtin);
            i += 1;
            continue;
        }

        if tok.has_expanded_from(&tok.text) || currently_expanding.iter().any(|m| **m == *tok.text) {
            out.push(tok.clone());
            i += 1;
            continue;
        }

        let Some(makro) = ctx.macros.get(&tok.text).cloned() else {
            out.push(tok.clone());
            i += 1;
            continue;
        };

        if !makro.is_function_like() {
            let name: Rc<str> = Rc::clone(&makro.name);
            let mut nested = currently_expanding.to_vec();
            nested.push(Rc::clone(&name));
            let replacement = retag_all(&makro.replacement, &name, &tok.source, tok.line);
            let expanded = expand_inner(ctx, &replacement, &nested);
            if ctx.insert_adjacency_space {
                maybe_insert_adjacency_space(&mut out, &expanded, tokens.get(i + 1));
            }
            out.extend(expanded);
            i += 1;
            continue;
        }

        // Function-like: only an invocation if the next significant token is `(`.
        let mut j = i + 1;
        while tokens.get(j).is_some_and(Token::is_trivia) {
            j += 1;
        }
        if tokens.get(j).map(|t| t.text.as_str()) != Some("(") {
            out.push(tok.clone());
            i += 1;
            continue;
        }

        let Some((args, end)) = collect_arguments(tokens, j) else {
            out.push(tok.clone());
            i += 1;
            continue;
        };

        if !arity_matches(&makro, args.len()) {
            ctx.report_error(format!(
                "macro \"{}\" requires {} arguments, but {} given",
                makro.name,
                makro.arity(),
                args.len()
            ));
            out.push(tok.clone());
            i += 1;
            continue;
        }

        let name: Rc<str> = Rc::clone(&makro.name);
        let mut nested = currently_expanding.to_vec();
        nested.push(Rc::clone(&name));

        let expanded_args: Vec<Vec<Token>> = args.iter().map(|a| expand_inner(ctx, a, &nested)).collect();

        let substituted = substitute(&makro, &args, &expanded_args);
        let pasted = apply_token_pasting(&substituted);
        let retagged = retag_all(&pasted, &name, &tok.source, tok.line);
        let expanded = expand_inner(ctx, &retagged, &nested);

        if ctx.insert_adjacency_space {
            maybe_insert_adjacency_space(&mut out, &expanded, tokens.get(end + 1));
        }
        out.extend(expanded);
        i = end + 1;
    }
    out
}

/// If the just-produced expansion ends in an identifier and the original
/// stream's next token is also an identifier, GCC/clang insert a space at
/// the seam so the two do not visually merge. Callers gate this on
/// `ctx.insert_adjacency_space`.
fn maybe_insert_adjacency_space(out: &mut Vec<Token>, expanded: &[Token], next_original: Option<&Token>) {
    let Some(last) = expanded.last() else { return };
    let Some(next) = next_original else { return };
    if last.kind == TokenKind::Identifier && next.kind == TokenKind::Identifier {
        out.push(Token::new(TokenKind::Whitespace, " ", Rc::clone(&last.source), last.line));
    }
}

fn retag_all(tokens: &[Token], name: &Rc<str>, invocation_source: &Rc<str>, invocation_line: u32) -> Vec<Token> {
    tokens.iter().map(|t| t.retagged(name, invocation_source, invocation_line)).collect()
}

fn arity_matches(makro: &Macro, given: usize) -> bool {
    let arity = makro.arity();
    if makro.variadic {
        given >= arity
    } else {
        given == arity
    }
}

/// Collect comma-separated, paren-nesting-aware arguments starting at the
/// index of the opening `(`. Returns the argument token lists (trivia
/// trimmed from each end) and the index of the matching `)`.
fn collect_arguments(tokens: &[Token], open_paren: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut depth = 0usize;
    let mut args: Vec<Vec<Token>> = vec![Vec::new()];
    let mut i = open_paren;
    loop {
        let tok = tokens.get(i)?;
        match tok.text.as_str() {
            "(" => {
                depth += 1;
                if depth > 1 {
                    args.last_mut().unwrap().push(tok.clone());
                }
            }
            ")" => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                args.last_mut().unwrap().push(tok.clone());
            }
            "," if depth == 1 => {
                args.push(Vec::new());
            }
            _ => {
                args.last_mut().unwrap().push(tok.clone());
            }
        }
        i += 1;
    }
    // A single empty argument list, e.g. `F()`, means zero arguments, not one.
    if args.len() == 1 && args[0].iter().all(Token::is_trivia) {
        args[0].clear();
    }
    for arg in &mut args {
        trim_trivia(arg);
    }
    Some((args, i))
}

fn trim_trivia(tokens: &mut Vec<Token>) {
    while tokens.first().is_some_and(Token::is_trivia) {
        tokens.remove(0);
    }
    while tokens.last().is_some_and(Token::is_trivia) {
        tokens.pop();
    }
}

/// Walk the macro's replacement list applying its pre-computed patches:
/// stringize, paste-operand (raw argument), or ordinary expand (expanded
/// argument). `__VA_ARGS__`'s swallow-comma rule elides the preceding comma
/// when the variadic argument list is empty.
fn substitute(makro: &Macro, raw_args: &[Vec<Token>], expanded_args: &[Vec<Token>]) -> Vec<Token> {
    let patch_at: std::collections::HashMap<usize, Patch> = makro.patches.iter().cloned().collect();
    let swallow: std::collections::HashSet<usize> = makro.var_comma_patches.iter().copied().collect();

    let variadic_empty = makro.variadic && raw_args.get(makro.arity()).is_none_or(Vec::is_empty);

    let mut out = Vec::new();
    for (i, tok) in makro.replacement.iter().enumerate() {
        if swallow.contains(&i) && variadic_empty {
            continue;
        }
        match patch_at.get(&i) {
            Some(Patch::Stringize(arg_idx)) => {
                out.push(stringize(raw_args.get(*arg_idx).map(Vec::as_slice).unwrap_or(&[]), tok));
            }
            Some(Patch::PasteOperand(arg_idx)) => {
                out.extend(raw_args.get(*arg_idx).cloned().unwrap_or_default());
            }
            Some(Patch::Expand(arg_idx)) => {
                out.extend(expanded_args.get(*arg_idx).cloned().unwrap_or_default());
            }
            None => out.push(tok.clone()),
        }
    }
    out
}

/// Build the string-literal token for `# arg`: collapse internal whitespace
/// runs to a single space, escape backslashes and double quotes, and
/// surround with `"`.
fn stringize(arg: &[Token], template: &Token) -> Token {
    let mut text = String::from("\"");
    let mut prev_was_space = false;
    for t in arg {
        if t.is_trivia() {
            if !prev_was_space && !text.ends_with('"') {
                text.push(' ');
                prev_was_space = true;
            }
            continue;
        }
        prev_was_space = false;
        if matches!(t.kind, TokenKind::StringLiteral | TokenKind::CharLiteral) {
            for c in t.text.chars() {
                if c == '"' || c == '\\' {
                    text.push('\\');
                }
                text.push(c);
            }
        } else {
            text.push_str(&t.text);
        }
    }
    if text.ends_with(' ') {
        text.pop();
    }
    text.push('"');
    Token::new(TokenKind::StringLiteral, text, Rc::clone(&template.source), template.line)
}

/// Apply `##` token pasting: every `HashHash` token (with surrounding
/// whitespace already absent from its neighbours in the substituted stream)
/// concatenates its immediate non-trivia neighbours, re-lexes the result,
/// and splits back to the original two tokens if the paste does not yield a
/// single valid token.
fn apply_token_pasting(tokens: &[Token]) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].kind == TokenKind::HashHash {
            // Find the previous non-trivia token already in `out`.
            let mut prev_idx = out.len();
            while prev_idx > 0 && out[prev_idx - 1].is_trivia() {
                prev_idx -= 1;
            }
            // Find the next non-trivia token ahead in `tokens`.
            let mut next = i + 1;
            while tokens.get(next).is_some_and(Token::is_trivia) {
                next += 1;
            }
            if prev_idx == 0 || next >= tokens.len() {
                // `##` at an operand boundary with nothing to paste; drop it
                // (definition-time validation should already forbid this at
                // the ends of a replacement list).
                i += 1;
                continue;
            }
            let left = out[prev_idx - 1].clone();
            let right = tokens[next].clone();
            out.truncate(prev_idx - 1);
            out.push(paste_pair(&left, &right));
            i = next + 1;
        } else {
            out.push(tokens[i].clone());
            i += 1;
        }
    }
    out
}

fn paste_pair(left: &Token, right: &Token) -> Token {
    if left.text.is_empty() {
        return right.clone();
    }
    if right.text.is_empty() {
        return left.clone();
    }
    let combined = format!("{}{}", left.text, right.text);
    let relexed = crate::lexer::tokenize(&combined, &left.source);
    let significant: Vec<&Token> = relexed.iter().filter(|t| !t.is_trivia()).collect();
    if significant.len() == 1 {
        let mut t = significant[0].clone();
        t.line = left.line;
        t
    } else {
        // Not a single valid token: split back into the two originals,
        // per C99 6.10.3.3p3 this is undefined behaviour, but the common
        // and useful recovery is to keep both tokens un-merged.
        Token::new(TokenKind::Unknown, combined, Rc::clone(&left.source), left.line)
    }
}

/// Expand a dynamic built-in (`__LINE__`, `__FILE__`, `__DATE__`, `__TIME__`,
/// `__COUNTER__`) if `tok` names one; `None` otherwise, meaning normal table
/// lookup should proceed.
fn expand_builtin(ctx: &mut PreprocessorContext, tok: &Token) -> Option<Token> {
    let text = match tok.text.as_str() {
        "__LINE__" => tok.line.to_string(),
        "__FILE__" => format!("\"{}\"", tok.source),
        "__DATE__" => format!("\"{}\"", ctx.build_date),
        "__TIME__" => format!("\"{}\"", ctx.build_time),
        "__COUNTER__" => {
            let v = ctx.counter;
            ctx.counter += 1;
            v.to_string()
        }
        _ => return None,
    };
    let kind = if tok.text == "__FILE__" || tok.text == "__DATE__" || tok.text == "__TIME__" {
        TokenKind::StringLiteral
    } else {
        TokenKind::Number
    };
    Some(Token::new(kind, text, Rc::clone(&tok.source), tok.line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessorConfig;

    fn line(ctx: &mut PreprocessorContext, src: &str) -> Vec<Token> {
        let source: Rc<str> = Rc::from("t.c");
        let toks = crate::lexer::tokenize(src, &source);
        expand(ctx, &toks)
    }

    fn text_of(tokens: &[Token]) -> String {
        crate::token::tokens_to_string(tokens)
    }

    fn ctx() -> PreprocessorContext {
        PreprocessorContext::new(PreprocessorConfig::for_linux())
    }

    #[test]
    fn object_like_self_reference_does_not_loop() {
        let mut c = ctx();
        c.define_macro("A", None, false, "A").unwrap();
        let out = line(&mut c, "A");
        assert_eq!(text_of(&out), "A");
    }

    #[test]
    fn function_like_basic_expansion() {
        let mut c = ctx();
        c.define_macro("SQ", Some(vec!["x".to_string()]), false, "((x)*(x))").unwrap();
        let out = line(&mut c, "SQ(3)");
        assert_eq!(text_of(&out), "((3)*(3))");
    }

    #[test]
    fn stringize_operator() {
        let mut c = ctx();
        c.define_macro("mkstr", Some(vec!["a".to_string()]), false, "#a").unwrap();
        let out = line(&mut c, "mkstr(x y)");
        assert_eq!(text_of(&out), "\"x y\"");
    }

    #[test]
    fn token_paste_builds_identifier() {
        let mut c = ctx();
        c.define_macro("glue", Some(vec!["a".to_string(), "b".to_string()]), false, "a##b").unwrap();
        let out = line(&mut c, "glue(foo, bar)");
        assert_eq!(text_of(&out), "foobar");
    }

    #[test]
    fn swallow_comma_elides_on_empty_variadic() {
        let mut c = ctx();
        c.define_macro(
            "LOG",
            Some(vec!["fmt".to_string(), "__VA_ARGS__".to_string()]),
            true,
            "printf(fmt, ##__VA_ARGS__)",
        )
        .unwrap();
        let out = line(&mut c, "LOG(\"hi\")");
        assert_eq!(text_of(&out), "printf(\"hi\")");

        let out2 = line(&mut c, "LOG(\"%d\", 42)");
        assert_eq!(text_of(&out2), "printf(\"%d\", 42)");
    }

    #[test]
    fn builtin_line_and_file() {
        let mut c = ctx();
        let source: Rc<str> = Rc::from("my.c");
        let toks = crate::lexer::tokenize("__LINE__ __FILE__", &source);
        let out = expand(&mut c, &toks);
        assert_eq!(out[0].text, "1");
        assert_eq!(out[2].text, "\"my.c\"");
    }
}

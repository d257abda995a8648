//! Directive dispatch and the conditional-compilation if-stack.
//!
//! The if-stack is modeled as [`IfFrame`], adding passthru/rewritten
//! semantics for conditionals whose controlling expression could not be
//! fully evaluated.

use crate::config::IncludeKind;
use crate::context::PreprocessorContext;
use crate::hooks::OutputDirective;
use crate::token::{Token, TokenKind};
use std::rc::Rc;

/// One entry of the conditional-compilation if-stack (§3).
#[derive(Clone, Debug)]
pub struct IfFrame {
    /// Does the surrounding scope permit output in the current branch?
    pub enabled: bool,
    /// Has any branch of this conditional been taken yet?
    pub iftrigger: bool,
    /// Is this conditional being emitted verbatim because its controlling
    /// expression could not be fully evaluated?
    pub passthru: bool,
    /// Did we emit a transformed `#if` line, and so owe a matching `#endif`?
    pub rewritten: bool,
    /// Original directive tokens, kept for unterminated-conditional
    /// diagnostics.
    pub start_tokens: Vec<Token>,
}

/// Per-file bookkeeping for automatic `#pragma once` detection: a file
/// qualifies if its entire non-whitespace body is a single
/// `#ifndef G` / `#define G` / ... / `#endif` span.
#[derive(Default)]
struct GuardTracker {
    at_front_of_file: bool,
    candidate: Option<String>,
    disqualified: bool,
    guard_depth_is_one: bool,
    guard_closed: bool,
}

/// Process one file's token stream: dispatch directives, expand macro
/// lines, and recurse into `#include`s. Returns the fully expanded token
/// stream for this file (with included files' tokens spliced in place).
pub fn process(ctx: &mut PreprocessorContext, source: Rc<str>, input: &str) -> Vec<Token> {
    let replaced = crate::lexer::replace_trigraphs(&crate::lexer::normalize_newlines(input));
    let tokens = crate::lexer::tokenize(&replaced, &source);
    let lines = split_lines(&tokens);

    let mut out = Vec::new();
    let mut if_stack: Vec<IfFrame> = Vec::new();
    let mut guard = GuardTracker { at_front_of_file: true, ..Default::default() };

    for line_tokens in lines {
        ctx.current_file = Rc::clone(&source);
        if let Some(first) = line_tokens.iter().find(|t| !t.is_trivia()) {
            ctx.current_line = first.line;
        }

        let enabled = if_stack.iter().all(|f| f.enabled);
        let directive = directive_name(&line_tokens);

        match &directive {
            Some(name) => {
                guard.disqualify_if_not_guard_shape(name, if_stack.len());
                dispatch(ctx, name, &line_tokens, &mut if_stack, &mut out, &source, &mut guard);
                guard.at_front_of_file = false;
            }
            None if enabled => {
                if if_stack.is_empty() && !only_trivia(&line_tokens) {
                    guard.disqualified = true;
                }
                if !only_trivia(&line_tokens) {
                    guard.at_front_of_file = false;
                }
                let expanded = crate::expander::expand(ctx, &line_tokens);
                out.extend(filter_comments(ctx, expanded));
            }
            None => {
                // suppressed branch: nothing emitted, guard status unaffected.
            }
        }
    }

    if !if_stack.is_empty() {
        ctx.report_error("unterminated conditional directive (missing #endif)");
    }

    if !ctx.disable_auto_pragma_once {
        if let Some(name) = guard.candidate.take() {
            if !guard.disqualified {
                ctx.included_once.insert(canonical_or_raw(&source));
                if let Some(hook) = ctx.hooks.on_include_guard_seen.clone() {
                    hook(&name, &source);
                }
            }
        }
    }

    out
}

fn canonical_or_raw(source: &str) -> String {
    std::path::Path::new(source)
        .canonicalize()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| source.to_string())
}

fn only_trivia(tokens: &[Token]) -> bool {
    tokens.iter().all(Token::is_trivia)
}

fn filter_comments(ctx: &PreprocessorContext, tokens: Vec<Token>) -> Vec<Token> {
    if let Some(hook) = &ctx.hooks.on_comment {
        for t in &tokens {
            match t.kind {
                TokenKind::BlockComment => hook(&t.text, true),
                TokenKind::LineComment => hook(&t.text, false),
                _ => {}
            }
        }
    }
    if ctx.passthru_comments {
        return tokens;
    }
    tokens
        .into_iter()
        .filter(|t| !matches!(t.kind, TokenKind::BlockComment | TokenKind::LineComment))
        .collect()
}

/// Split a flat token stream (including `Newline` tokens) into per-logical-
/// line slices. `LineContinuation` tokens do not end a line; `Newline`
/// tokens do, and are included at the end of their line.
fn split_lines(tokens: &[Token]) -> Vec<Vec<Token>> {
    let mut lines = Vec::new();
    let mut current = Vec::new();
    for tok in tokens {
        let is_break = tok.kind == TokenKind::Newline;
        current.push(tok.clone());
        if is_break {
            lines.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn directive_name(line_tokens: &[Token]) -> Option<String> {
    let mut sig = line_tokens.iter().filter(|t| !t.is_trivia());
    let first = sig.next()?;
    if first.kind != TokenKind::Hash {
        return None;
    }
    let name = sig.next()?;
    if name.kind == TokenKind::Identifier {
        Some(name.text.clone())
    } else {
        Some(String::new())
    }
}

/// Tokens after the directive name, trivia-trimmed, for the directive's
/// argument handling.
fn directive_args(line_tokens: &[Token]) -> Vec<Token> {
    let mut sig_indices = line_tokens.iter().enumerate().filter(|(_, t)| !t.is_trivia());
    sig_indices.next(); // '#'
    let Some((name_idx, _)) = sig_indices.next() else {
        return Vec::new();
    };
    let rest: Vec<Token> = line_tokens[name_idx + 1..]
        .iter()
        .filter(|t| t.kind != TokenKind::Newline)
        .cloned()
        .collect();
    let mut rest = rest;
    while rest.first().is_some_and(Token::is_trivia) {
        rest.remove(0);
    }
    while rest.last().is_some_and(Token::is_trivia) {
        rest.pop();
    }
    rest
}

impl GuardTracker {
    fn disqualify_if_not_guard_shape(&mut self, directive: &str, depth: usize) {
        if self.at_front_of_file && depth == 0 && (directive == "ifndef") {
            self.guard_depth_is_one = true;
            return;
        }
        if self.guard_depth_is_one && depth == 1 && directive == "define" && self.candidate.is_none() {
            return;
        }
        if self.guard_depth_is_one && depth == 1 && directive == "endif" && !self.guard_closed {
            self.guard_closed = true;
            return;
        }
        if self.guard_closed && depth == 0 {
            // anything at top level after the guard's own #endif disqualifies
            // the file from auto-pragma-once treatment.
            self.disqualified = true;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch(
    ctx: &mut PreprocessorContext,
    name: &str,
    line_tokens: &[Token],
    if_stack: &mut Vec<IfFrame>,
    out: &mut Vec<Token>,
    source: &Rc<str>,
    guard: &mut GuardTracker,
) {
    let enabled_before = if_stack.iter().all(|f| f.enabled);
    let args = directive_args(line_tokens);

    if let Some(action) = ctx.hooks.directive_action(name, &args.iter().map(|t| t.text.clone()).collect::<Vec<_>>()) {
        match action {
            OutputDirective::IgnoreAndPassThrough => {
                if enabled_before {
                    out.extend(line_tokens.iter().cloned());
                }
                return;
            }
            OutputDirective::IgnoreAndRemove => return,
            OutputDirective::ExecuteAndEmit | OutputDirective::ExecuteAndRemove => {}
        }
    }

    match name {
        "define" if enabled_before => {
            if ctx.never_define.contains(first_token_text(&args).unwrap_or_default().as_str()) {
                out.extend(line_tokens.iter().cloned());
                return;
            }
            handle_define(ctx, &args);
            if ctx.passthru_defines {
                out.extend(line_tokens.iter().cloned());
            }
            if guard.guard_depth_is_one && if_stack.len() == 1 && guard.candidate.is_none() {
                guard.candidate = first_token_text(&args);
            }
        }
        "undef" if enabled_before => {
            if let Some(n) = first_token_text(&args) {
                if ctx.never_define.contains(&n) {
                    out.extend(line_tokens.iter().cloned());
                    return;
                }
                ctx.undef(&n);
            }
            if ctx.passthru_defines {
                out.extend(line_tokens.iter().cloned());
            }
        }
        "include" | "include_next" if enabled_before => {
            handle_include(ctx, &args, name == "include_next", out, line_tokens);
        }
        "ifdef" | "ifndef" => {
            handle_ifdef(ctx, name, &args, if_stack, enabled_before, out);
        }
        "if" => {
            handle_if(ctx, &args, if_stack, enabled_before, out, line_tokens);
        }
        "elif" => {
            handle_elif(ctx, &args, if_stack, out, line_tokens);
        }
        "else" => {
            handle_else(ctx, if_stack, out, line_tokens);
        }
        "endif" => {
            handle_endif(ctx, if_stack, out, line_tokens);
        }
        "line" if enabled_before => handle_line(ctx, &args),
        "pragma" if enabled_before => handle_pragma(ctx, &args, source),
        "error" if enabled_before => {
            let msg = crate::token::tokens_to_string(&args);
            ctx.errors.push(crate::error::PreprocessError::user_error(Rc::clone(source), ctx.current_line, msg));
        }
        "warning" if enabled_before => {
            let msg = crate::token::tokens_to_string(&args);
            if let Some(handler) = ctx.warning_handler.clone() {
                handler(&msg);
            }
        }
        _ if enabled_before => {
            let names: Vec<String> = args.iter().map(|t| t.text.clone()).collect();
            match ctx.hooks.unknown_directive_action(name, &names) {
                OutputDirective::IgnoreAndPassThrough | OutputDirective::ExecuteAndEmit => {
                    out.extend(line_tokens.iter().cloned());
                }
                _ => {}
            }
        }
        _ => {}
    }
}

fn first_token_text(tokens: &[Token]) -> Option<String> {
    tokens.iter().find(|t| !t.is_trivia()).map(|t| t.text.clone())
}

fn handle_define(ctx: &mut PreprocessorContext, args: &[Token]) {
    let Some(name_pos) = args.iter().position(|t| !t.is_trivia()) else {
        ctx.report_error("#define requires a macro name");
        return;
    };
    let name = args[name_pos].text.clone();
    let after_name = &args[name_pos + 1..];

    if after_name.first().map(|t| t.text.as_str()) == Some("(") && !after_name.first().is_some_and(Token::is_trivia) {
        let close = after_name.iter().position(|t| t.text == ")");
        let Some(close) = close else {
            ctx.report_error("malformed function-like macro parameter list");
            return;
        };
        let param_tokens = &after_name[1..close];
        let mut params = Vec::new();
        let mut variadic = false;
        for chunk in param_tokens.split(|t| t.text == ",") {
            let sig: Vec<&Token> = chunk.iter().filter(|t| !t.is_trivia()).collect();
            if sig.is_empty() {
                continue;
            }
            if sig.len() == 1 && sig[0].text == "..." {
                variadic = true;
                params.push("__VA_ARGS__".to_string());
            } else if let Some(last) = sig.last() {
                if last.text == "..." {
                    variadic = true;
                    let pname = sig.first().map(|t| t.text.clone()).unwrap_or_else(|| "__VA_ARGS__".to_string());
                    params.push(pname);
                } else {
                    params.push(sig[0].text.clone());
                }
            }
        }
        let body = after_name[close + 1..].to_vec();
        let body = trim_trivia_owned(body);
        if let Err(e) = ctx.define_macro(&name, Some(params), variadic, &crate::token::tokens_to_string(&body)) {
            ctx.errors.push(e);
        }
    } else {
        let body = trim_trivia_owned(after_name.to_vec());
        if let Err(e) = ctx.define_macro(&name, None, false, &crate::token::tokens_to_string(&body)) {
            ctx.errors.push(e);
        }
    }
}

fn trim_trivia_owned(mut tokens: Vec<Token>) -> Vec<Token> {
    while tokens.first().is_some_and(Token::is_trivia) {
        tokens.remove(0);
    }
    while tokens.last().is_some_and(Token::is_trivia) {
        tokens.pop();
    }
    tokens
}

fn handle_include(ctx: &mut PreprocessorContext, args: &[Token], is_next: bool, out: &mut Vec<Token>, line_tokens: &[Token]) {
    let raw = crate::token::tokens_to_string(args);
    let raw = if raw.starts_with('<') || raw.starts_with('"') {
        raw
    } else {
        let expanded = crate::expander::expand(ctx, args);
        crate::token::tokens_to_string(&expanded)
    };
    let Some((target, kind)) = crate::include::split_include_text(&raw) else {
        ctx.errors.push(crate::error::PreprocessError::malformed_directive(
            Rc::clone(&ctx.current_file),
            ctx.current_line,
            format!("malformed #include: {raw}"),
        ));
        return;
    };

    let skip_past = if is_next { ctx.include_stack.last().cloned() } else { None };
    let resolved = crate::include::resolve(ctx, &target, kind.clone(), skip_past.as_deref());

    match resolved {
        Some(r) => {
            if ctx.included_once.contains(&r.canonical) {
                return;
            }
            if ctx.include_stack.len() >= ctx.recursion_limit {
                ctx.errors.push(crate::error::PreprocessError::recursion_limit_exceeded(
                    Rc::clone(&ctx.current_file),
                    ctx.current_line,
                    "include depth exceeded",
                ));
                return;
            }
            let echo_verbatim = ctx
                .passthru_includes
                .as_deref()
                .and_then(|pat| regex::Regex::new(pat).ok())
                .is_some_and(|re| re.is_match(&target));
            if echo_verbatim {
                out.extend(line_tokens.iter().cloned());
            }
            ctx.include_stack.push(r.canonical.clone());
            let nested = process(ctx, Rc::from(target.as_str()), &r.contents);
            ctx.include_stack.pop();
            out.extend(nested);
        }
        None => {
            if ctx.passthru_unfound_includes {
                out.extend(line_tokens.iter().cloned());
            } else {
                let pass = ctx
                    .hooks
                    .on_include_not_found
                    .clone()
                    .map(|h| h(&target, kind, &crate::config::IncludeContext { include_stack: ctx.include_stack.clone(), include_dirs: ctx.include_dirs.clone() }))
                    .unwrap_or(false);
                ctx.errors.push(crate::error::PreprocessError::include_not_found(Rc::clone(&ctx.current_file), ctx.current_line, target));
                if pass {
                    out.extend(line_tokens.iter().cloned());
                }
            }
        }
    }
}

fn handle_ifdef(
    ctx: &mut PreprocessorContext,
    name: &str,
    args: &[Token],
    if_stack: &mut Vec<IfFrame>,
    outer_enabled: bool,
    out: &mut Vec<Token>,
) {
    let macro_name = first_token_text(args).unwrap_or_default();
    if !outer_enabled {
        if_stack.push(IfFrame { enabled: false, iftrigger: true, passthru: false, rewritten: false, start_tokens: args.to_vec() });
        return;
    }
    let decision = ctx.hooks.on_defined.clone().and_then(|h| h(&macro_name));
    let defined = match decision {
        Some(crate::hooks::DefinedDecision::Value(v)) => v,
        Some(crate::hooks::DefinedDecision::PassThrough) => {
            if_stack.push(IfFrame { enabled: true, iftrigger: true, passthru: true, rewritten: true, start_tokens: args.to_vec() });
            out.push(Token::new(TokenKind::Hash, "#", Rc::clone(&ctx.current_file), ctx.current_line));
            out.push(Token::new(TokenKind::Identifier, name, Rc::clone(&ctx.current_file), ctx.current_line));
            out.push(Token::new(TokenKind::Whitespace, " ", Rc::clone(&ctx.current_file), ctx.current_line));
            out.extend(args.iter().cloned());
            out.push(Token::new(TokenKind::Newline, "\n", Rc::clone(&ctx.current_file), ctx.current_line));
            return;
        }
        None => ctx.is_defined(&macro_name),
    };
    let value = if name == "ifdef" { defined } else { !defined };
    if_stack.push(IfFrame { enabled: value, iftrigger: value, passthru: false, rewritten: false, start_tokens: args.to_vec() });
}

fn handle_if(ctx: &mut PreprocessorContext, args: &[Token], if_stack: &mut Vec<IfFrame>, outer_enabled: bool, out: &mut Vec<Token>, line_tokens: &[Token]) {
    if !outer_enabled {
        if_stack.push(IfFrame { enabled: false, iftrigger: true, passthru: false, rewritten: false, start_tokens: args.to_vec() });
        return;
    }
    let expanded = crate::expander::expand(ctx, args);
    let result = crate::evaluator::evaluate(ctx, &expanded);
    if result.partial {
        if_stack.push(IfFrame { enabled: true, iftrigger: true, passthru: true, rewritten: true, start_tokens: args.to_vec() });
        out.push(Token::new(TokenKind::Hash, "#", Rc::clone(&ctx.current_file), ctx.current_line));
        out.push(Token::new(TokenKind::Identifier, "if", Rc::clone(&ctx.current_file), ctx.current_line));
        out.push(Token::new(TokenKind::Whitespace, " ", Rc::clone(&ctx.current_file), ctx.current_line));
        out.extend(expanded);
        out.push(Token::new(TokenKind::Newline, "\n", Rc::clone(&ctx.current_file), ctx.current_line));
    } else {
        let enabled = result.value.truthy();
        if_stack.push(IfFrame { enabled, iftrigger: enabled, passthru: false, rewritten: false, start_tokens: line_tokens.to_vec() });
    }
}

fn handle_elif(ctx: &mut PreprocessorContext, args: &[Token], if_stack: &mut Vec<IfFrame>, out: &mut Vec<Token>, _line_tokens: &[Token]) {
    let Some(frame) = if_stack.last_mut() else {
        ctx.report_error("#elif without matching #if");
        return;
    };
    let parent_enabled = true; // caller guarantees this frame is the innermost.
    if frame.passthru {
        out.push(Token::new(TokenKind::Hash, "#", Rc::clone(&ctx.current_file), ctx.current_line));
        out.push(Token::new(TokenKind::Identifier, "elif", Rc::clone(&ctx.current_file), ctx.current_line));
        out.push(Token::new(TokenKind::Whitespace, " ", Rc::clone(&ctx.current_file), ctx.current_line));
        out.extend(args.iter().cloned());
        out.push(Token::new(TokenKind::Newline, "\n", Rc::clone(&ctx.current_file), ctx.current_line));
        return;
    }
    if frame.iftrigger {
        frame.enabled = false;
        return;
    }
    let expanded = crate::expander::expand(ctx, args);
    let result = crate::evaluator::evaluate(ctx, &expanded);
    if result.partial {
        frame.passthru = true;
        frame.rewritten = true;
        frame.enabled = parent_enabled;
        out.push(Token::new(TokenKind::Hash, "#", Rc::clone(&ctx.current_file), ctx.current_line));
        out.push(Token::new(TokenKind::Identifier, "if", Rc::clone(&ctx.current_file), ctx.current_line));
        out.push(Token::new(TokenKind::Whitespace, " ", Rc::clone(&ctx.current_file), ctx.current_line));
        out.extend(expanded);
        out.push(Token::new(TokenKind::Newline, "\n", Rc::clone(&ctx.current_file), ctx.current_line));
    } else {
        frame.enabled = result.value.truthy();
        frame.iftrigger = frame.enabled;
    }
}

fn handle_else(ctx: &mut PreprocessorContext, if_stack: &mut Vec<IfFrame>, out: &mut Vec<Token>, _line_tokens: &[Token]) {
    let Some(frame) = if_stack.last_mut() else {
        ctx.report_error("#else without matching #if");
        return;
    };
    if frame.passthru {
        out.push(Token::new(TokenKind::Hash, "#", Rc::clone(&ctx.current_file), ctx.current_line));
        out.push(Token::new(TokenKind::Identifier, "else", Rc::clone(&ctx.current_file), ctx.current_line));
        out.push(Token::new(TokenKind::Newline, "\n", Rc::clone(&ctx.current_file), ctx.current_line));
        return;
    }
    frame.enabled = !frame.iftrigger;
    frame.iftrigger = true;
}

fn handle_endif(ctx: &mut PreprocessorContext, if_stack: &mut Vec<IfFrame>, out: &mut Vec<Token>, _line_tokens: &[Token]) {
    let Some(frame) = if_stack.pop() else {
        ctx.report_error("#endif without matching #if");
        return;
    };
    if frame.rewritten {
        out.push(Token::new(TokenKind::Hash, "#", Rc::clone(&ctx.current_file), ctx.current_line));
        out.push(Token::new(TokenKind::Identifier, "endif", Rc::clone(&ctx.current_file), ctx.current_line));
        out.push(Token::new(TokenKind::Newline, "\n", Rc::clone(&ctx.current_file), ctx.current_line));
    }
}

fn handle_line(ctx: &mut PreprocessorContext, args: &[Token]) {
    let expanded = crate::expander::expand(ctx, args);
    let sig: Vec<&Token> = expanded.iter().filter(|t| !t.is_trivia()).collect();
    let Some(num_tok) = sig.first() else {
        ctx.report_error("#line requires a line number");
        return;
    };
    let Ok(num) = num_tok.text.parse::<u32>() else {
        ctx.report_error(format!("invalid #line number '{}'", num_tok.text));
        return;
    };
    ctx.current_line = num;
    if let Some(file_tok) = sig.get(1) {
        if file_tok.kind == TokenKind::StringLiteral {
            ctx.current_file = Rc::from(file_tok.text.trim_matches('"'));
        }
    }
}

fn handle_pragma(ctx: &mut PreprocessorContext, args: &[Token], source: &Rc<str>) {
    let text = crate::token::tokens_to_string(args);
    if text.trim() == "once" {
        ctx.included_once.insert(canonical_or_raw(source));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessorConfig;

    fn run(src: &str) -> String {
        let mut ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        let out = process(&mut ctx, Rc::from("t.c"), src);
        crate::token::tokens_to_string(&out)
    }

    #[test]
    fn simple_object_macro_expands() {
        let out = run("#define PI 3\nint x = PI;\n");
        assert!(out.contains("int x = 3;"));
    }

    #[test]
    fn ifdef_suppresses_disabled_branch() {
        let out = run("#ifdef FOO\nbad\n#else\ngood\n#endif\n");
        assert!(out.contains("good"));
        assert!(!out.contains("bad"));
    }

    #[test]
    fn nested_if_elif_else() {
        let out = run("#if 0\na\n#elif 1\nb\n#else\nc\n#endif\n");
        assert!(out.contains('b'));
        assert!(!out.contains('a'));
        assert!(!out.contains('c'));
    }

    #[test]
    fn unterminated_conditional_is_reported() {
        let mut ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        process(&mut ctx, Rc::from("t.c"), "#if 1\nx\n");
        assert!(ctx.error_count() > 0);
    }

    #[test]
    fn passthru_unknown_exprs_rewrites_if() {
        let mut cfg = PreprocessorConfig::for_linux();
        cfg.passthru_unknown_exprs = true;
        let mut ctx = PreprocessorContext::new(cfg);
        let out = process(&mut ctx, Rc::from("t.c"), "#if FOO\nA\n#else\nB\n#endif\n");
        let text = crate::token::tokens_to_string(&out);
        assert!(text.contains("#if"));
        assert!(text.contains('A'));
        assert!(text.contains('B'));
    }
}

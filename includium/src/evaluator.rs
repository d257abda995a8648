//! The `#if`/`#elif` constant-expression evaluator: a classic
//! precedence-climbing recursive-descent parser over an already
//! macro-expanded token stream, producing a bounded [`Value`], with a
//! `defined()`/`__has_include()` pre-pass ahead of the arithmetic grammar.

use crate::context::PreprocessorContext;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// Outcome of evaluating a `#if`/`#elif` expression.
pub struct EvalResult {
    /// The computed value (meaningless if `partial` is true).
    pub value: Value,
    /// True if some part of the expression could not be resolved and the
    /// caller should pass the directive through instead of acting on
    /// `value`.
    pub partial: bool,
}

/// Replace every `defined X` / `defined(X)` occurrence with a `1`/`0` number
/// token, and every `__has_include(...)`/`__has_include_next(...)` with the
/// result of a search-only include resolution. Returns the rewritten token
/// list and whether any `defined()` deferred to [`crate::hooks::DefinedDecision::PassThrough`];
/// does not itself evaluate arithmetic.
fn prepass(ctx: &mut PreprocessorContext, tokens: &[Token]) -> (Vec<Token>, bool) {
    let significant: Vec<&Token> = tokens.iter().filter(|t| !t.is_trivia()).collect();
    let mut out = Vec::new();
    let mut partial = false;
    let mut i = 0;
    while i < significant.len() {
        let tok = significant[i];
        if tok.kind == TokenKind::Identifier && tok.text == "defined" {
            let (name, consumed) = if significant.get(i + 1).map(|t| t.text.as_str()) == Some("(") {
                let name = significant.get(i + 2).map(|t| t.text.clone()).unwrap_or_default();
                (name, 4)
            } else {
                let name = significant.get(i + 1).map(|t| t.text.clone()).unwrap_or_default();
                (name, 2)
            };
            let decision = ctx.hooks.on_defined.clone().and_then(|h| h(&name));
            let defined = match decision {
                Some(crate::hooks::DefinedDecision::Value(v)) => v,
                Some(crate::hooks::DefinedDecision::PassThrough) => {
                    partial = true;
                    false
                }
                None => ctx.is_defined(&name),
            };
            out.push(Token::new(
                TokenKind::Number,
                if defined { "1" } else { "0" },
                std::rc::Rc::clone(&tok.source),
                tok.line,
            ));
            i += consumed;
            continue;
        }
        if tok.kind == TokenKind::Identifier && (tok.text == "__has_include" || tok.text == "__has_include_next") {
            if significant.get(i + 1).map(|t| t.text.as_str()) == Some("(") {
                let mut j = i + 2;
                let mut target = String::new();
                while significant.get(j).map(|t| t.text.as_str()) != Some(")") && j < significant.len() {
                    target.push_str(&significant[j].text);
                    j += 1;
                }
                let found = crate::include::has_include(ctx, &target);
                out.push(Token::new(TokenKind::Number, if found { "1" } else { "0" }, std::rc::Rc::clone(&tok.source), tok.line));
                i = j + 1;
                continue;
            }
        }
        out.push((*tok).clone());
        i += 1;
    }
    (out, partial)
}

/// Evaluate a `#if`/`#elif` expression (already macro-expanded by the
/// caller). Applies the `defined`/`__has_include` pre-pass first.
pub fn evaluate(ctx: &mut PreprocessorContext, tokens: &[Token]) -> EvalResult {
    let (rewritten, defined_partial) = prepass(ctx, tokens);
    let mut parser = Parser { ctx, tokens: &rewritten, pos: 0, partial: defined_partial };
    let value = parser.parse_comma();
    let partial = parser.partial;
    EvalResult { value, partial }
}

struct Parser<'a> {
    ctx: &'a mut PreprocessorContext,
    tokens: &'a [Token],
    pos: usize,
    partial: bool,
}

impl Parser<'_> {
    fn peek_text(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(|t| t.text.as_str())
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.peek_text() == Some(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_comma(&mut self) -> Value {
        let mut v = self.parse_conditional();
        while self.eat(",") {
            v = self.parse_conditional();
        }
        v
    }

    fn parse_conditional(&mut self) -> Value {
        let cond = self.parse_logical_or();
        if self.eat("?") {
            let if_true = self.parse_comma();
            if !self.eat(":") {
                self.ctx.report_error("expected ':' in conditional expression");
                return Value::fault("malformed conditional");
            }
            let if_false = self.parse_conditional();
            return Value::select(&cond, &if_true, &if_false);
        }
        cond
    }

    fn parse_logical_or(&mut self) -> Value {
        let mut lhs = self.parse_logical_and();
        while self.eat("||") {
            if lhs.truthy() {
                // Short-circuit: parse and discard the RHS to keep position
                // in sync, but never surface a fault it contains.
                let _ = self.parse_logical_and();
                lhs = Value::signed(1);
            } else {
                let rhs = self.parse_logical_and();
                lhs = Value::signed(i64::from(rhs.truthy()));
            }
        }
        lhs
    }

    fn parse_logical_and(&mut self) -> Value {
        let mut lhs = self.parse_bitor();
        while self.eat("&&") {
            if !lhs.truthy() {
                let _ = self.parse_bitor();
                lhs = Value::signed(0);
            } else {
                let rhs = self.parse_bitor();
                lhs = Value::signed(i64::from(rhs.truthy()));
            }
        }
        lhs
    }

    fn parse_bitor(&mut self) -> Value {
        let mut lhs = self.parse_bitxor();
        while self.peek_text() == Some("|") {
            self.advance();
            let rhs = self.parse_bitxor();
            lhs = lhs.bitor(&rhs);
        }
        lhs
    }

    fn parse_bitxor(&mut self) -> Value {
        let mut lhs = self.parse_bitand();
        while self.eat("^") {
            let rhs = self.parse_bitand();
            lhs = lhs.bitxor(&rhs);
        }
        lhs
    }

    fn parse_bitand(&mut self) -> Value {
        let mut lhs = self.parse_equality();
        while self.peek_text() == Some("&") {
            self.advance();
            let rhs = self.parse_equality();
            lhs = lhs.bitand(&rhs);
        }
        lhs
    }

    fn parse_equality(&mut self) -> Value {
        let mut lhs = self.parse_relational();
        loop {
            if self.eat("==") {
                let rhs = self.parse_relational();
                lhs = lhs.eq(&rhs);
            } else if self.eat("!=") {
                let rhs = self.parse_relational();
                lhs = lhs.ne(&rhs);
            } else {
                break;
            }
        }
        lhs
    }

    fn parse_relational(&mut self) -> Value {
        let mut lhs = self.parse_shift();
        loop {
            match self.peek_text() {
                Some("<=") => {
                    self.advance();
                    let rhs = self.parse_shift();
                    lhs = lhs.le(&rhs);
                }
                Some(">=") => {
                    self.advance();
                    let rhs = self.parse_shift();
                    lhs = lhs.ge(&rhs);
                }
                Some("<") => {
                    self.advance();
                    let rhs = self.parse_shift();
                    lhs = lhs.lt(&rhs);
                }
                Some(">") => {
                    self.advance();
                    let rhs = self.parse_shift();
                    lhs = lhs.gt(&rhs);
                }
                _ => break,
            }
        }
        lhs
    }

    fn parse_shift(&mut self) -> Value {
        let mut lhs = self.parse_additive();
        loop {
            if self.eat("<<") {
                let rhs = self.parse_additive();
                lhs = lhs.shl(&rhs);
            } else if self.eat(">>") {
                let rhs = self.parse_additive();
                lhs = lhs.shr(&rhs);
            } else {
                break;
            }
        }
        lhs
    }

    fn parse_additive(&mut self) -> Value {
        let mut lhs = self.parse_multiplicative();
        loop {
            match self.peek_text() {
                Some("+") => {
                    self.advance();
                    let rhs = self.parse_multiplicative();
                    lhs = lhs.add(&rhs);
                }
                Some("-") => {
                    self.advance();
                    let rhs = self.parse_multiplicative();
                    lhs = lhs.sub(&rhs);
                }
                _ => break,
            }
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Value {
        let mut lhs = self.parse_unary();
        loop {
            match self.peek_text() {
                Some("*") => {
                    self.advance();
                    let rhs = self.parse_unary();
                    lhs = lhs.mul(&rhs);
                }
                Some("/") => {
                    self.advance();
                    let rhs = self.parse_unary();
                    lhs = lhs.div(&rhs);
                }
                Some("%") => {
                    self.advance();
                    let rhs = self.parse_unary();
                    lhs = lhs.rem(&rhs);
                }
                _ => break,
            }
        }
        lhs
    }

    fn parse_unary(&mut self) -> Value {
        match self.peek_text() {
            Some("+") => {
                self.advance();
                self.parse_unary()
            }
            Some("-") => {
                self.advance();
                self.parse_unary().neg()
            }
            Some("!") => {
                self.advance();
                self.parse_unary().not()
            }
            Some("~") => {
                self.advance();
                self.parse_unary().bitnot()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Value {
        let Some(tok) = self.tokens.get(self.pos).cloned() else {
            self.ctx.report_error("unexpected end of expression");
            return Value::fault("unexpected end of expression");
        };
        match tok.kind {
            TokenKind::Number => {
                self.pos += 1;
                parse_numeric_literal(&tok.text)
            }
            TokenKind::CharLiteral => {
                self.pos += 1;
                parse_char_literal(&tok.text)
            }
            TokenKind::Identifier => {
                self.pos += 1;
                // Function-call-like form: IDENT(args)
                if self.peek_text() == Some("(") {
                    self.advance();
                    let mut args = Vec::new();
                    let mut depth = 1usize;
                    let mut current = String::new();
                    while depth > 0 {
                        let Some(t) = self.advance() else { break };
                        match t.text.as_str() {
                            "(" => {
                                depth += 1;
                                current.push_str(&t.text);
                            }
                            ")" => {
                                depth -= 1;
                                if depth > 0 {
                                    current.push_str(&t.text);
                                }
                            }
                            "," if depth == 1 => {
                                args.push(std::mem::take(&mut current));
                            }
                            _ => current.push_str(&t.text),
                        }
                    }
                    if !current.is_empty() || !args.is_empty() {
                        args.push(current);
                    }
                    if let Some(hook) = self.ctx.hooks.on_unknown_function.clone() {
                        if let Some(v) = hook(&tok.text, &args) {
                            return Value::signed(v);
                        }
                    }
                    self.partial = true;
                    return Value::signed(0);
                }
                if let Some(hook) = self.ctx.hooks.on_unknown_identifier.clone() {
                    if let Some(v) = hook(&tok.text) {
                        return Value::signed(v);
                    }
                }
                if self.ctx.passthru_unknown_exprs {
                    self.partial = true;
                }
                Value::signed(0)
            }
            _ if tok.text == "(" => {
                self.pos += 1;
                let v = self.parse_comma();
                if !self.eat(")") {
                    self.ctx.report_error("expected ')'");
                }
                v
            }
            _ => {
                self.pos += 1;
                self.ctx.report_error(format!("unexpected token '{}' in expression", tok.text));
                Value::fault("syntax error")
            }
        }
    }
}

/// Parse an integer literal honoring `u`/`U`/`l`/`L`/`ll`/`LL` suffixes in
/// any case, and hex/octal/decimal bases.
fn parse_numeric_literal(text: &str) -> Value {
    let mut s = text;
    let mut unsigned = false;
    while let Some(last) = s.chars().last() {
        match last.to_ascii_lowercase() {
            'u' => {
                unsigned = true;
                s = &s[..s.len() - 1];
            }
            'l' => {
                s = &s[..s.len() - 1];
            }
            _ => break,
        }
    }
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') && s.chars().all(|c| c.is_digit(8)) {
        u64::from_str_radix(&s[1..], 8)
    } else {
        s.parse::<u64>()
    };
    match parsed {
        Ok(v) if unsigned || v > i64::MAX as u64 => Value::unsigned(v),
        Ok(v) => Value::signed(v as i64),
        Err(_) => Value::fault(format!("invalid numeric literal '{text}'")),
    }
}

/// Parse a (possibly `L`-prefixed) character literal into its integer code,
/// honoring the narrow C escape sequences.
fn parse_char_literal(text: &str) -> Value {
    let inner = text.trim_start_matches('L');
    let inner = inner.trim_matches('\'');
    let mut chars = inner.chars();
    let code = match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => b'\n' as i64,
            Some('t') => b'\t' as i64,
            Some('r') => b'\r' as i64,
            Some('0') => 0,
            Some('\\') => b'\\' as i64,
            Some('\'') => b'\'' as i64,
            Some('"') => b'"' as i64,
            Some(other) => other as i64,
            None => 0,
        },
        Some(c) => c as i64,
        None => 0,
    };
    Value::signed(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessorConfig;
    use std::rc::Rc;

    fn eval(src: &str) -> EvalResult {
        let mut ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        let toks = crate::lexer::tokenize(src, &Rc::from("t.c"));
        evaluate(&mut ctx, &toks)
    }

    #[test]
    fn unsigned_max_equals_negative_one() {
        let r = eval("18446744073709551615U == -1");
        assert!(r.value.truthy());
    }

    #[test]
    fn unsigned_comparison_makes_negative_one_huge() {
        let r = eval("-1 >= 0U");
        assert!(!r.value.truthy());
    }

    #[test]
    fn short_circuit_and_absorbs_division_fault() {
        let r = eval("0 && 10 / 0");
        assert!(!r.partial);
        assert!(!r.value.truthy());
    }

    #[test]
    fn ternary_promotes_unsigned() {
        let r = eval("1 ? -1 : 0U");
        assert!(r.value.is_unsigned());
    }

    #[test]
    fn precedence_matches_c() {
        let r = eval("1 + 2 * 3 == 7");
        assert!(r.value.truthy());
    }

    #[test]
    fn defined_prepass_resolves_macro_presence() {
        let mut ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        ctx.define_macro("FOO", None, false, "1").unwrap();
        let toks = crate::lexer::tokenize("defined(FOO) && !defined(BAR)", &Rc::from("t.c"));
        let r = evaluate(&mut ctx, &toks);
        assert!(r.value.truthy());
    }
}

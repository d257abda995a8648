//! The macro table entry type and the patch side-tables computed once at
//! definition time, used to drive argument substitution during expansion.

use crate::token::Token;
use std::rc::Rc;

/// What to do with a single position in a macro's replacement list when
/// substituting arguments. Computed once, at `#define` time, by
/// [`Macro::prescan`] rather than re-derived on every expansion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Patch {
    /// Ordinary parameter reference: substitute the argument's *expanded*
    /// form.
    Expand(usize),
    /// Parameter reference adjacent to `##`: substitute the argument's
    /// *unexpanded* token sequence.
    PasteOperand(usize),
    /// `#` immediately followed by this parameter: substitute a single
    /// string-literal token built from the argument's unexpanded text.
    Stringize(usize),
}

/// A macro definition: either object-like (`parameters.is_none()`) or
/// function-like.
#[derive(Clone, Debug)]
pub struct Macro {
    /// The macro's name.
    pub name: Rc<str>,
    /// Parameter names, in order, for function-like macros; `None` for
    /// object-like macros.
    pub parameters: Option<Vec<String>>,
    /// Whether the last parameter is a variadic `__VA_ARGS__` accumulator.
    pub variadic: bool,
    /// The replacement token list, as written (not yet substituted).
    pub replacement: Rc<Vec<Token>>,
    /// Per-position patches, indexed in the same order as `replacement`,
    /// restricted to the positions that are parameter references.
    pub patches: Vec<(usize, Patch)>,
    /// Index, within `replacement`, of every `,` immediately followed
    /// (modulo whitespace) by `## __VA_ARGS__`: the "swallow comma" rule
    /// elides this comma when the variadic argument is empty.
    pub var_comma_patches: Vec<usize>,
    /// File this macro was defined in; `None` for compiler/target built-ins.
    pub source: Option<Rc<str>>,
    /// Line this macro was defined on; `None` for built-ins.
    pub line: Option<u32>,
    /// True for the compiler/target/sizeof predefinitions. The dynamic
    /// built-ins (`__LINE__` and friends) are not stored in the table at
    /// all; they are checked for by name before table lookup.
    pub is_builtin: bool,
}

impl Macro {
    /// Build an object-like macro and compute its patches.
    #[must_use]
    pub fn object_like(name: impl Into<Rc<str>>, replacement: Vec<Token>) -> Self {
        let mut m = Self {
            name: name.into(),
            parameters: None,
            variadic: false,
            replacement: Rc::new(replacement),
            patches: Vec::new(),
            var_comma_patches: Vec::new(),
            source: None,
            line: None,
            is_builtin: false,
        };
        m.prescan();
        m
    }

    /// Build a function-like macro and compute its patches.
    #[must_use]
    pub fn function_like(
        name: impl Into<Rc<str>>,
        parameters: Vec<String>,
        variadic: bool,
        replacement: Vec<Token>,
    ) -> Self {
        let mut m = Self {
            name: name.into(),
            parameters: Some(parameters),
            variadic,
            replacement: Rc::new(replacement),
            patches: Vec::new(),
            var_comma_patches: Vec::new(),
            source: None,
            line: None,
            is_builtin: false,
        };
        m.prescan();
        m
    }

    /// Arity: number of named parameters (excludes the variadic slot).
    #[must_use]
    pub fn arity(&self) -> usize {
        match &self.parameters {
            Some(params) if self.variadic => params.len().saturating_sub(1),
            Some(params) => params.len(),
            None => 0,
        }
    }

    /// True if this is a function-like macro.
    #[must_use]
    pub fn is_function_like(&self) -> bool {
        self.parameters.is_some()
    }

    /// Index of a parameter by name, if any (includes `__VA_ARGS__` for
    /// variadic macros, even though it is not itself in the parameter list).
    fn parameter_index(&self, name: &str) -> Option<usize> {
        let params = self.parameters.as_ref()?;
        if self.variadic && name == "__VA_ARGS__" {
            return Some(params.len() - 1);
        }
        params.iter().position(|p| p == name)
    }

    /// Populate `patches` and `var_comma_patches` by walking the replacement
    /// list once: for each occurrence of a parameter name, classify it as a
    /// plain expand, a paste operand (preceded or followed by `##`), or a
    /// stringize operand (preceded by a lone `#`), and separately record
    /// every comma that precedes `## __VA_ARGS__` for the swallow-comma rule.
    fn prescan(&mut self) {
        self.patches.clear();
        self.var_comma_patches.clear();
        if self.parameters.is_none() {
            return;
        }
        let toks = Rc::clone(&self.replacement);
        let significant: Vec<usize> = (0..toks.len()).filter(|&i| !toks[i].is_trivia()).collect();

        for (pos_in_sig, &i) in significant.iter().enumerate() {
            let tok = &toks[i];
            if tok.kind != crate::token::TokenKind::Identifier {
                continue;
            }
            let Some(param_idx) = self.parameter_index(&tok.text) else {
                continue;
            };

            let prev_sig = pos_in_sig.checked_sub(1).map(|j| significant[j]);
            let next_sig = significant.get(pos_in_sig + 1).copied();

            let preceded_by_paste = prev_sig.is_some_and(|j| toks[j].text == "##");
            let followed_by_paste = next_sig.is_some_and(|j| toks[j].text == "##");
            let preceded_by_hash = prev_sig.is_some_and(|j| toks[j].text == "#");

            let patch = if preceded_by_hash {
                Patch::Stringize(param_idx)
            } else if preceded_by_paste || followed_by_paste {
                Patch::PasteOperand(param_idx)
            } else {
                Patch::Expand(param_idx)
            };
            self.patches.push((i, patch));
        }

        if self.variadic {
            for (pos_in_sig, &i) in significant.iter().enumerate() {
                if toks[i].text != "," {
                    continue;
                }
                // Look for `## __VA_ARGS__` immediately following this comma.
                let Some(&hh) = significant.get(pos_in_sig + 1) else {
                    continue;
                };
                if toks[hh].text != "##" {
                    continue;
                }
                let Some(&va) = significant.get(pos_in_sig + 2) else {
                    continue;
                };
                if toks[va].kind == crate::token::TokenKind::Identifier && toks[va].text == "__VA_ARGS__" {
                    self.var_comma_patches.push(i);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;
    use std::rc::Rc as StdRc;

    fn ident(text: &str) -> Token {
        Token::new(TokenKind::Identifier, text, StdRc::from("t.c"), 1)
    }
    fn punct(text: &str) -> Token {
        Token::new(TokenKind::Punctuator, text, StdRc::from("t.c"), 1)
    }
    fn ws() -> Token {
        Token::new(TokenKind::Whitespace, " ", StdRc::from("t.c"), 1)
    }

    #[test]
    fn object_like_has_no_patches() {
        let m = Macro::object_like("PI", vec![Token::new(TokenKind::Number, "3.14", StdRc::from("t.c"), 1)]);
        assert!(m.patches.is_empty());
        assert!(!m.is_function_like());
    }

    #[test]
    fn plain_parameter_is_expand_patch() {
        // #define f(a) (a)
        let repl = vec![punct("("), ident("a"), punct(")")];
        let m = Macro::function_like("f", vec!["a".to_string()], false, repl);
        assert_eq!(m.patches, vec![(1, Patch::Expand(0))]);
    }

    #[test]
    fn stringize_and_paste_classification() {
        // #define mkstr(a) # a
        let repl = vec![punct("#"), ws(), ident("a")];
        let m = Macro::function_like("mkstr", vec!["a".to_string()], false, repl);
        assert_eq!(m.patches, vec![(2, Patch::Stringize(0))]);

        // #define glue(a,b) a ## b
        let repl2 = vec![ident("a"), ws(), punct("##"), ws(), ident("b")];
        let m2 = Macro::function_like("glue", vec!["a".to_string(), "b".to_string()], false, repl2);
        assert_eq!(m2.patches, vec![(0, Patch::PasteOperand(0)), (4, Patch::PasteOperand(1))]);
    }

    #[test]
    fn swallow_comma_patch_detected() {
        // #define LOG(fmt, ...) printf(fmt, ## __VA_ARGS__)
        let repl = vec![
            ident("printf"),
            punct("("),
            ident("fmt"),
            punct(","),
            ws(),
            punct("##"),
            ws(),
            ident("__VA_ARGS__"),
            punct(")"),
        ];
        let m = Macro::function_like("LOG", vec!["fmt".to_string(), "__VA_ARGS__".to_string()], true, repl);
        assert_eq!(m.var_comma_patches, vec![3]);
        assert_eq!(m.arity(), 1);
    }
}

//! Public API driver: wires [`PreprocessorContext`] to [`directive::process`]
//! and [`writer::write`], and exposes the crate's top-level, file-oriented
//! convenience entry points. Directive dispatch, expression evaluation, and
//! token substitution live in `directive.rs`/`evaluator.rs`/`expander.rs`;
//! this is the thin orchestration layer plus the configuration/macro-table
//! accessors.

use crate::config::{IncludeContext, IncludeKind, PreprocessorConfig};
use crate::context::PreprocessorContext;
use crate::error::PreprocessError;
use crate::macro_def::Macro;
use std::collections::HashMap;
use std::rc::Rc;

/// The result of preprocessing one translation unit: the output text plus
/// every diagnostic accumulated along the way (processing never aborts
/// partway through; see `error.rs`).
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// The fully preprocessed, serialized output text.
    pub text: String,
    /// Diagnostics accumulated during processing, in emission order.
    pub errors: Vec<PreprocessError>,
}

impl ProcessOutput {
    /// True if no errors were accumulated.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Public API driver for C preprocessing.
pub struct PreprocessorDriver {
    context: PreprocessorContext,
}

impl Default for PreprocessorDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessorDriver {
    /// Create a new preprocessor instance with default (Linux/GCC) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self { context: PreprocessorContext::new(PreprocessorConfig::for_linux()) }
    }

    /// Create a preprocessor with the given configuration.
    #[must_use]
    pub fn with_config(config: PreprocessorConfig) -> Self {
        Self { context: PreprocessorContext::new(config) }
    }

    /// Add a custom include resolver function.
    #[must_use]
    pub fn with_include_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, IncludeKind, &IncludeContext) -> Option<String> + 'static,
    {
        self.context.include_resolver = Some(Rc::new(f));
        self
    }

    /// Set the maximum recursion depth for macro expansion and nested includes.
    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.context.recursion_limit = limit;
    }

    /// Set the current file name for error reporting and `__FILE__`.
    pub fn set_current_file(&mut self, file: impl Into<Rc<str>>) {
        self.context.current_file = file.into();
    }

    /// Define a preprocessor macro directly, bypassing `#define` parsing.
    pub fn define(&mut self, name: &str, params: Option<Vec<String>>, body: &str, is_variadic: bool) {
        let _ = self.context.define_macro(name, params, is_variadic, body);
    }

    /// Remove a macro definition.
    pub fn undef(&mut self, name: &str) {
        self.context.undef(name);
    }

    /// Borrow the defined macros.
    #[must_use]
    pub fn get_macros(&self) -> &HashMap<String, Macro> {
        self.context.get_macros()
    }

    /// Check if a macro is defined.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.context.is_defined(name)
    }

    /// Process the input C code, returning the output text plus any
    /// diagnostics accumulated along the way. Never aborts partway through.
    pub fn process(&mut self, input: &str) -> ProcessOutput {
        let source = Rc::clone(&self.context.current_file);
        let tokens = crate::directive::process(&mut self.context, source, input);
        let text = crate::writer::write(&self.context, &tokens);
        ProcessOutput { text, errors: std::mem::take(&mut self.context.errors) }
    }

    /// Process the input, returning `Err` with the first accumulated
    /// diagnostic if processing was not clean. Convenience wrapper around
    /// [`Self::process`] for callers that want `?`-based error propagation.
    ///
    /// # Errors
    /// Returns the first `PreprocessError` accumulated during processing.
    pub fn try_process(&mut self, input: &str) -> Result<String, PreprocessError> {
        let output = self.process(input);
        match output.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(output.text),
        }
    }
}

/// Re-export as `Preprocessor` for an ergonomic top-level name.
pub use PreprocessorDriver as Preprocessor;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_object_macro() {
        let mut pp = Preprocessor::new();
        let out = pp.try_process("#define PI 3\nfloat x = PI;\n").unwrap();
        assert!(out.contains('3'));
    }

    #[test]
    fn function_like_macro() {
        let mut pp = Preprocessor::new();
        let out = pp.try_process("#define ADD(a, b) ((a)+(b))\nint z = ADD(1, 2);\n").unwrap();
        assert!(out.contains("((1)+(2))"));
    }

    #[test]
    fn include_example() {
        let mut pp = Preprocessor::new().with_include_resolver(|p, _kind, _ctx| {
            if p == "inc.h" {
                Some("#define FOO 42\n".to_string())
            } else {
                None
            }
        });
        let out = pp.try_process("#include \"inc.h\"\nint x = FOO;\n").unwrap();
        assert!(out.contains("42"));
    }

    #[test]
    fn error_directive_accumulates_without_aborting() {
        let mut pp = Preprocessor::new();
        let output = pp.process("#if 0\n#else\n#error boom\n#endif\nint x;\n");
        assert!(!output.is_clean());
        assert!(output.text.contains("int x;"));
    }

    #[test]
    fn undef_then_use_leaves_identifier_untouched() {
        let mut pp = Preprocessor::new();
        let out = pp.try_process("#define FOO 1\n#undef FOO\nint x = FOO;\n").unwrap();
        assert!(out.contains("int x = FOO;"));
    }
}

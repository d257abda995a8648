//! Engine-instance-local mutable state: the macro table, the include-once
//! set, error accumulation, and the compiler/target macro predefinitions.
//! The predefined target/compiler/intrinsic/sizeof macro families are
//! ambient enrichment with no conformance requirement to satisfy beyond
//! "looks like what a real compiler predefines"; the conditional-compilation
//! if-stack itself lives in `directive::IfFrame`, and macro construction
//! goes through `crate::lexer`/`crate::macro_def::Macro`.

use crate::config::{Compiler, CompressLevel, IncludeResolver, PreprocessorConfig, Target, WarningHandler};
use crate::error::PreprocessError;
use crate::hooks::Hooks;
use crate::macro_def::Macro;
use std::collections::HashMap;
use std::collections::HashSet;
use std::rc::Rc;

/// Engine-instance-local mutable state threaded through lexing, expansion,
/// directive processing, and inclusion.
pub struct PreprocessorContext {
    /// Defined macros, keyed by name.
    pub macros: HashMap<String, Macro>,
    /// Absolute paths for which re-inclusion must be suppressed (via
    /// explicit `#pragma once` or automatic include-guard detection).
    pub included_once: HashSet<String>,
    /// Stack of currently-open include paths, outermost first.
    pub include_stack: Vec<String>,
    /// Current file name, used for `__FILE__` and diagnostics.
    pub current_file: Rc<str>,
    /// Current line, used for `#line`-adjusted diagnostics.
    pub current_line: u32,
    /// Maximum recursion depth for macro expansion and nested includes.
    pub recursion_limit: usize,
    /// Compiler dialect, retained for diagnostics and re-predefinition.
    pub compiler: Compiler,
    /// The hook surface.
    pub hooks: Hooks,
    /// `__DATE__`'s value, captured once at context creation rather than
    /// recomputed on every expansion.
    pub build_date: String,
    /// `__TIME__`'s value, captured once at context creation.
    pub build_time: String,
    /// `__COUNTER__`'s next value.
    pub counter: u64,
    /// Errors accumulated so far (never aborts processing; see `error.rs`).
    pub errors: Vec<PreprocessError>,
    /// Custom include file resolver, consulted before the default
    /// filesystem resolver.
    pub include_resolver: Option<IncludeResolver>,
    /// Optional `#warning` handler.
    pub warning_handler: Option<WarningHandler>,
    /// User include search directories, in order.
    pub include_dirs: Vec<String>,
    /// Macro names that may never be `#define`d/`#undef`ed by the input.
    pub never_define: HashSet<String>,
    /// Treat unresolved identifiers in constant expressions as partial
    /// (pass the directive through) instead of as zero.
    pub passthru_unknown_exprs: bool,
    /// Emit `#define`/`#undef` verbatim even when executed.
    pub passthru_defines: bool,
    /// Emit `#include` verbatim when the target cannot be found, instead of
    /// erroring.
    pub passthru_unfound_includes: bool,
    /// Keep comments in the output.
    pub passthru_comments: bool,
    /// Emit `#include` verbatim *and* process it, for includes whose target
    /// matches this regex pattern.
    pub passthru_includes: Option<String>,
    /// Disable automatic `#pragma once` inference from include guards.
    pub disable_auto_pragma_once: bool,
    /// Prefix for emitted line markers; `None` disables line-marker output.
    pub line_directive_prefix: Option<String>,
    /// Largest same-file line gap closed with blank lines instead of a
    /// marker.
    pub blank_line_threshold: u32,
    /// Writer whitespace-aggressiveness level.
    pub compress: CompressLevel,
    /// GCC/clang-compatible space insertion after a function-like macro
    /// expansion immediately followed by an identifier.
    pub insert_adjacency_space: bool,
}

impl PreprocessorContext {
    /// Create a context from a configuration, predefining target/compiler
    /// macros and capturing the build date/time.
    #[must_use]
    pub fn new(config: PreprocessorConfig) -> Self {
        let target = config.target;
        let compiler = config.compiler;
        let mut ctx = Self {
            macros: HashMap::new(),
            included_once: HashSet::new(),
            include_stack: Vec::new(),
            current_file: Rc::from("<stdin>"),
            current_line: 1,
            recursion_limit: config.recursion_limit,
            compiler,
            hooks: config.hooks,
            build_date: crate::date_time::format_date(),
            build_time: crate::date_time::format_time(),
            counter: 0,
            errors: Vec::new(),
            include_resolver: config.include_resolver,
            warning_handler: config.warning_handler,
            include_dirs: config.include_dirs,
            never_define: config.never_define.into_iter().collect(),
            passthru_unknown_exprs: config.passthru_unknown_exprs,
            passthru_defines: config.passthru_defines,
            passthru_unfound_includes: config.passthru_unfound_includes,
            passthru_comments: config.passthru_comments,
            passthru_includes: config.passthru_includes,
            disable_auto_pragma_once: config.disable_auto_pragma_once,
            line_directive_prefix: config.line_directive_prefix,
            blank_line_threshold: config.blank_line_threshold,
            compress: config.compress,
            insert_adjacency_space: config.insert_adjacency_space,
        };
        ctx.define_target_macros(target);
        ctx.define_compiler_macros(compiler);
        ctx.stub_compiler_intrinsics();
        ctx.define_sizeof_stubs();
        ctx.define_builtin("__PCPP__", None, "1", false);
        for def in config.predefines {
            let (name, body) = def.split_once('=').unwrap_or((def.as_str(), "1"));
            let _ = ctx.define_macro(name, None, false, body);
        }
        for name in config.preundefines {
            ctx.undef(&name);
        }
        ctx
    }

    fn define_target_macros(&mut self, target: Target) {
        match target {
            Target::Linux => {
                self.define_builtin("__linux__", None, "1", false);
                self.define_builtin("__unix__", None, "1", false);
                self.define_builtin("__LP64__", None, "1", false);
            }
            Target::Windows => {
                self.define_builtin("_WIN32", None, "1", false);
                self.define_builtin("WIN32", None, "1", false);
                self.define_builtin("_WINDOWS", None, "1", false);
            }
            Target::MacOS => {
                self.define_builtin("__APPLE__", None, "1", false);
                self.define_builtin("__MACH__", None, "1", false);
                self.define_builtin("TARGET_OS_MAC", None, "1", false);
                self.define_builtin("__LP64__", None, "1", false);
            }
        }
    }

    fn define_compiler_macros(&mut self, compiler: Compiler) {
        match compiler {
            Compiler::GCC => {
                self.define_builtin("__GNUC__", None, "11", false);
                self.define_builtin("__GNUC_MINOR__", None, "2", false);
                self.define_builtin("__GNUC_PATCHLEVEL__", None, "0", false);
                self.define_builtin("_GNU_SOURCE", None, "1", false);
            }
            Compiler::Clang => {
                self.define_builtin("__clang__", None, "1", false);
                self.define_builtin("__clang_major__", None, "14", false);
                self.define_builtin("__clang_minor__", None, "0", false);
                self.define_builtin("__clang_patchlevel__", None, "0", false);
            }
            Compiler::MSVC => {
                self.define_builtin("_MSC_VER", None, "1920", false);
                self.define_builtin("_MSC_FULL_VER", None, "192027508", false);
                self.define_builtin("WIN32_LEAN_AND_MEAN", None, "", false);
                self.define_builtin("_CRT_SECURE_NO_WARNINGS", None, "", false);
            }
        }
    }

    fn stub_compiler_intrinsics(&mut self) {
        self.define_builtin("__builtin_expect", Some(vec!["x".to_string(), "y".to_string()]), "x", false);
        self.define_builtin("__builtin_unreachable", None, "", false);
        self.define_builtin("__builtin_va_start", Some(vec!["ap".to_string(), "last".to_string()]), "", false);
        self.define_builtin("__builtin_va_arg", Some(vec!["ap".to_string(), "t".to_string()]), "(t)0", false);
        self.define_builtin("__builtin_va_end", Some(vec!["ap".to_string()]), "", false);
    }

    fn define_sizeof_stubs(&mut self) {
        self.define_builtin("__SIZEOF_INT__", None, "4", false);
        self.define_builtin("__SIZEOF_LONG__", None, "8", false);
        self.define_builtin("__SIZEOF_LONG_LONG__", None, "8", false);
        self.define_builtin("__SIZEOF_POINTER__", None, "8", false);
        self.define_builtin("__SIZEOF_SIZE_T__", None, "8", false);
        self.define_builtin("__SIZEOF_PTRDIFF_T__", None, "8", false);
    }

    /// Define a user macro (via `#define` or a `-D` predefine), recording
    /// the current file/line as its definition location.
    pub fn define_macro(
        &mut self,
        name: &str,
        params: Option<Vec<String>>,
        variadic: bool,
        body: &str,
    ) -> Result<(), PreprocessError> {
        if let Some(p) = &params {
            let mut seen = HashSet::new();
            for pname in p {
                if pname != "__VA_ARGS__" && !seen.insert(pname.as_str()) {
                    return Err(PreprocessError::macro_arg_mismatch(
                        Rc::clone(&self.current_file),
                        self.current_line,
                        format!("duplicate macro parameter '{pname}' in definition of '{name}'"),
                    ));
                }
            }
        }
        let body_tokens = crate::lexer::tokenize(body, &self.current_file);
        let significant: Vec<&crate::token::Token> = body_tokens.iter().filter(|t| !t.is_trivia()).collect();
        if significant.first().is_some_and(|t| t.text == "##") || significant.last().is_some_and(|t| t.text == "##") {
            return Err(PreprocessError::macro_arg_mismatch(
                Rc::clone(&self.current_file),
                self.current_line,
                format!("'##' cannot appear at either end of the replacement list of '{name}'"),
            ));
        }
        let mut makro = match params {
            Some(p) => Macro::function_like(name, p, variadic, body_tokens),
            None => Macro::object_like(name, body_tokens),
        };
        makro.source = Some(Rc::clone(&self.current_file));
        makro.line = Some(self.current_line);
        self.macros.insert(name.to_string(), makro);
        Ok(())
    }

    fn define_builtin(&mut self, name: &str, params: Option<Vec<String>>, body: &str, variadic: bool) {
        let body_tokens = crate::lexer::tokenize(body, &self.current_file);
        let mut makro = match params {
            Some(p) => Macro::function_like(name, p, variadic, body_tokens),
            None => Macro::object_like(name, body_tokens),
        };
        makro.is_builtin = true;
        self.macros.insert(name.to_string(), makro);
    }

    /// Remove a macro definition; a no-op if it was not defined.
    pub fn undef(&mut self, name: &str) {
        self.macros.remove(name);
    }

    /// Check if a macro is defined (including the dynamic built-ins, which
    /// are not stored in the table).
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        matches!(name, "__LINE__" | "__FILE__" | "__DATE__" | "__TIME__" | "__COUNTER__")
            || self.macros.contains_key(name)
    }

    /// Borrow the macro table.
    #[must_use]
    pub fn get_macros(&self) -> &HashMap<String, Macro> {
        &self.macros
    }

    /// Record a non-fatal error; processing continues (see `error.rs`'s
    /// propagation policy). Invokes the `on_error` hook if set.
    pub fn report_error(&mut self, message: impl Into<String>) {
        let err = PreprocessError::other(Rc::clone(&self.current_file), self.current_line, message.into());
        if let Some(hook) = self.hooks.on_error.clone() {
            hook(&err);
        }
        self.errors.push(err);
    }

    /// Number of errors accumulated so far; used as the process exit code.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_and_compiler_macros_are_predefined() {
        let ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        assert!(ctx.is_defined("__linux__"));
        assert!(ctx.is_defined("__GNUC__"));
        assert!(!ctx.is_defined("_WIN32"));
    }

    #[test]
    fn dynamic_builtins_report_as_defined_without_table_entries() {
        let ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        assert!(ctx.is_defined("__LINE__"));
        assert!(!ctx.macros.contains_key("__LINE__"));
    }

    #[test]
    fn define_then_undef_round_trips() {
        let mut ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        ctx.define_macro("FOO", None, false, "1").unwrap();
        assert!(ctx.is_defined("FOO"));
        ctx.undef("FOO");
        assert!(!ctx.is_defined("FOO"));
    }

    #[test]
    fn errors_accumulate_without_aborting() {
        let mut ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        ctx.report_error("first");
        ctx.report_error("second");
        assert_eq!(ctx.error_count(), 2);
    }

    #[test]
    fn duplicate_macro_parameter_is_rejected() {
        let mut ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        let result = ctx.define_macro("F", Some(vec!["a".to_string(), "a".to_string()]), false, "a");
        assert!(result.is_err());
    }

    #[test]
    fn paste_at_replacement_list_edge_is_rejected() {
        let mut ctx = PreprocessorContext::new(PreprocessorConfig::for_linux());
        assert!(ctx.define_macro("F", None, false, "## x").is_err());
        assert!(ctx.define_macro("G", None, false, "x ##").is_err());
    }
}

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # C Preprocessor Library
//!
//! A complete, standards-adjacent C preprocessor: macro expansion
//! (object-like, function-like, variadic), conditional compilation with
//! partial-evaluation pass-through, `#include`/`#include_next` resolution,
//! automatic `#pragma once` inference, and a bounded-integer constant
//! expression evaluator matching C99/C11 semantics.
//!
//! ## Features
//!
//! - Macro expansion with `#`/`##` and full rescanning/self-reference rules
//! - Conditional compilation (`#ifdef`, `#ifndef`, `#if`, `#else`, `#elif`, `#endif`)
//! - Include processing with custom resolvers and `#include_next`
//! - Target-specific macro definitions (Linux, Windows, macOS)
//! - Compiler-specific macro definitions (GCC, Clang, MSVC)
//! - A configurable hook surface for embedding in larger tools
//!
//! ## Example
//!
//! ```rust,no_run
//! use includium::PreprocessorConfig;
//!
//! let code = r#"
//! #define PI 3.14
//! #ifdef __linux__
//! const char* platform = "Linux";
//! #endif
//! "#;
//!
//! let config = PreprocessorConfig::for_linux();
//! let result = includium::process(code, &config).unwrap();
//! ```

mod config;
mod context;
mod date_time;
mod directive;
mod driver;
mod error;
mod evaluator;
mod expander;
mod hooks;
mod include;
mod lexer;
mod macro_def;
mod token;
mod value;
mod writer;

pub use config::{
    Compiler, CompressLevel, IncludeContext, IncludeKind, IncludeResolver, PreprocessorConfig,
    Target, WarningHandler,
};
pub use context::PreprocessorContext;
pub use driver::{PreprocessorDriver, ProcessOutput};
pub use error::{PreprocessError, PreprocessErrorKind};
pub use hooks::{Hooks, OutputDirective};
pub use macro_def::Macro;
pub use value::Value;

pub use PreprocessorDriver as Preprocessor;

use std::fs;
use std::path::Path;

/// Preprocess C code with the given configuration, returning the first
/// accumulated diagnostic as an error if processing was not clean.
///
/// # Errors
/// Returns the first `PreprocessError` accumulated while processing:
/// malformed directives, unterminated conditionals, unresolved includes, or
/// `#error` directives.
pub fn process<S: AsRef<str>>(input: S, config: &PreprocessorConfig) -> Result<String, PreprocessError> {
    let mut driver = PreprocessorDriver::with_config(clone_config(config));
    driver.try_process(input.as_ref())
}

fn clone_config(config: &PreprocessorConfig) -> PreprocessorConfig {
    PreprocessorConfig {
        target: config.target,
        compiler: config.compiler,
        recursion_limit: config.recursion_limit,
        include_resolver: config.include_resolver.clone(),
        warning_handler: config.warning_handler.clone(),
        hooks: config.hooks.clone(),
        include_dirs: config.include_dirs.clone(),
        predefines: config.predefines.clone(),
        preundefines: config.preundefines.clone(),
        never_define: config.never_define.clone(),
        passthru_defines: config.passthru_defines,
        passthru_unfound_includes: config.passthru_unfound_includes,
        passthru_unknown_exprs: config.passthru_unknown_exprs,
        passthru_comments: config.passthru_comments,
        passthru_includes: config.passthru_includes.clone(),
        disable_auto_pragma_once: config.disable_auto_pragma_once,
        line_directive_prefix: config.line_directive_prefix.clone(),
        blank_line_threshold: config.blank_line_threshold,
        compress: config.compress,
        insert_adjacency_space: config.insert_adjacency_space,
    }
}

/// Preprocess a C file and write the result to another file.
///
/// # Errors
/// Returns `PreprocessError` if the input file cannot be read, the output
/// file cannot be written, or if preprocessing accumulates any diagnostic.
pub fn process_file<P: AsRef<Path>>(
    input_path: P,
    output_path: P,
    config: &PreprocessorConfig,
) -> Result<(), PreprocessError> {
    let input = fs::read_to_string(input_path)?;
    let output = process(&input, config)?;
    fs::write(output_path, output)?;
    Ok(())
}

/// Preprocess a C file and return the result as a string.
///
/// # Errors
/// Returns `PreprocessError` if the file cannot be read or if preprocessing
/// accumulates any diagnostic.
pub fn preprocess_c_file_to_string<P: AsRef<Path>>(
    input_path: P,
    config: &PreprocessorConfig,
) -> Result<String, PreprocessError> {
    let input = fs::read_to_string(input_path)?;
    process(&input, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_object_macro() {
        let src = "\n#define PI 3.14\nfloat x = PI;\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("3.14"));
    }

    #[test]
    fn function_like_macro() {
        let src = "\n#define ADD(a, b) ((a)+(b))\nint z = ADD(1, 2);\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("((1)+(2))"));
    }

    #[test]
    fn conditional_compilation_ifdef() {
        let src = "\n#define DEBUG 1\n#ifdef DEBUG\nint x = 1;\n#else\nint x = 0;\n#endif\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("int x = 1;"));
        assert!(!out.contains("int x = 0;"));
    }

    #[test]
    fn expression_arithmetic() {
        let src = "\n#if 1 + 2 * 3 == 7\nint x = 1;\n#endif\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("int x = 1;"));
    }

    #[test]
    fn expression_logical_and_precedence() {
        let src = "\n#if (1 && 0) || (0 && 1) || (1 && 1)\nint x = 1;\n#endif\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("int x = 1;"));
    }

    #[test]
    fn dynamic_macros() {
        let src = "\n#define LINE __LINE__\nint line = LINE;\n";
        let mut pp = Preprocessor::new();
        pp.set_current_file("test.c");
        let out = pp.try_process(src).unwrap();
        assert!(out.contains("int line ="));
    }

    #[test]
    fn pragma_once_prevents_double_inclusion() {
        let mut pp = Preprocessor::new().with_include_resolver(|path, _kind, _ctx| {
            if path == "header.h" {
                Some("#pragma once\nint x = 42;\n".to_string())
            } else {
                None
            }
        });
        let src = "\n#include \"header.h\"\n#include \"header.h\"\nint y = x;\n";
        let out = pp.try_process(src).unwrap();
        assert_eq!(out.matches("int x = 42;").count(), 1);
    }

    #[test]
    fn elif_chain_selects_branch() {
        let src = "\n#define LEVEL 2\n#if LEVEL == 1\nint x = 1;\n#elif LEVEL == 2\nint x = 2;\n#else\nint x = 3;\n#endif\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("int x = 2;"));
    }

    #[test]
    fn error_directive_surfaces_as_error() {
        let src = "\n#if 0\n#else\n#error This should error\n#endif\n";
        let result = process(src, &PreprocessorConfig::for_linux());
        assert!(result.is_err());
    }

    #[test]
    fn undef_directive_leaves_bare_identifier() {
        let src = "\n#define FOO 1\n#undef FOO\nint x = FOO;\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("int x = FOO;"));
    }

    #[test]
    fn variadic_macro_expansion() {
        let src = "\n#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)\nLOG(\"hi %s\", \"world\");\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("printf(\"hi %s\", \"world\")"));
    }

    #[test]
    fn nested_macros_expand_fully() {
        let src = "\n#define ADD(a, b) ((a)+(b))\n#define MUL(a, b) ((a)*(b))\nint x = ADD(ADD(1, 2), MUL(3, 4));\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains('+'));
        assert!(out.contains('*'));
    }

    #[test]
    fn stringify_and_paste() {
        let src = "\n#define STR(x) #x\n#define PASTE(a,b) a##b\nconst char* s = STR(hello);\nint x1 = PASTE(x, 1);\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("\"hello\""));
        assert!(out.contains("x1"));
    }

    #[test]
    fn unterminated_conditional_is_an_error() {
        let src = "\n#if defined(FOO)\nint x = 1;\n";
        let result = process(src, &PreprocessorConfig::for_linux());
        assert!(result.is_err());
    }

    #[test]
    fn malformed_directive_error_has_location() {
        let mut pp = Preprocessor::new();
        pp.set_current_file("test.c");
        let src = "\n#define\nint x = 1;\n";
        let result = pp.try_process(src);
        assert!(result.is_err());
    }

    #[test]
    fn self_referential_macro_does_not_loop() {
        let src = "\n#define RECURSE RECURSE\nRECURSE\n";
        let out = process(src, &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("RECURSE"));
    }
}

//! Engine configuration: target/compiler selection, include search paths,
//! and the knobs exposed by the CLI in `includium-cli`.

use crate::hooks::Hooks;
use std::rc::Rc;

/// Kind of include directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncludeKind {
    /// Local include with quotes: `#include "file.h"`.
    Local,
    /// System include with angles: `#include <file.h>`.
    System,
}

/// Context passed to the include resolver and to the include-not-found hook.
#[derive(Clone, Debug, Default)]
pub struct IncludeContext {
    /// Stack of currently included files, outermost first.
    pub include_stack: Vec<String>,
    /// User-configured include directories, in search order.
    pub include_dirs: Vec<String>,
}

/// Type alias for a custom include file resolver: given the raw include
/// text, its kind, and the current context, return the resolved file's
/// contents, or `None` to fall through to the engine's default resolver.
pub type IncludeResolver = Rc<dyn Fn(&str, IncludeKind, &IncludeContext) -> Option<String>>;

/// Type alias for a warning handler invoked on `#warning`.
pub type WarningHandler = Rc<dyn Fn(&str)>;

/// Target operating system for preprocessing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Linux operating system.
    Linux,
    /// Windows operating system.
    Windows,
    /// macOS operating system.
    MacOS,
}

/// Compiler dialect for preprocessing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compiler {
    /// GNU Compiler Collection.
    GCC,
    /// LLVM Clang compiler.
    Clang,
    /// Microsoft Visual C++ compiler.
    MSVC,
}

/// Whitespace-aggressiveness level for the writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompressLevel {
    /// Preserve whitespace as closely as possible to the source.
    #[default]
    None,
    /// Collapse intra-line whitespace runs to a single space.
    Moderate,
    /// Collapse all whitespace, including blank lines, aggressively.
    Aggressive,
}

/// Configuration for the C preprocessor.
pub struct PreprocessorConfig {
    /// Target operating system, used to predefine target macros.
    pub target: Target,
    /// Compiler dialect, used to predefine compiler macros.
    pub compiler: Compiler,
    /// Maximum recursion depth for macro expansion and nested includes.
    pub recursion_limit: usize,
    /// Custom include file resolver function; consulted before the default
    /// filesystem resolver.
    pub include_resolver: Option<IncludeResolver>,
    /// Optional warning handler for `#warning` directives.
    pub warning_handler: Option<WarningHandler>,
    /// The full hook surface (§4.H); defaults to an all-default `Hooks`.
    pub hooks: Hooks,
    /// User include search directories, in order.
    pub include_dirs: Vec<String>,
    /// Macro names pre-defined before processing begins (`-D`), as raw
    /// `NAME` or `NAME=VALUE` text.
    pub predefines: Vec<String>,
    /// Macro names pre-undefined before processing begins (`-U`).
    pub preundefines: Vec<String>,
    /// Macro names that may never be `#define`d/`#undef`ed by the input;
    /// such directives are passed through unchanged instead (`-N`).
    pub never_define: Vec<String>,
    /// Emit `#define`/`#undef` verbatim even when they are also executed.
    pub passthru_defines: bool,
    /// Emit `#include` verbatim when the target file cannot be found,
    /// instead of erroring.
    pub passthru_unfound_includes: bool,
    /// Treat unresolved identifiers in `#if`/`#elif` expressions as partial
    /// (pass the directive through) rather than as zero.
    pub passthru_unknown_exprs: bool,
    /// Keep comments in the output instead of stripping them.
    pub passthru_comments: bool,
    /// Regex (as text; compiled by the caller) of include targets that
    /// should be both processed and echoed verbatim.
    pub passthru_includes: Option<String>,
    /// Disable automatic `#pragma once` inference from include guards.
    pub disable_auto_pragma_once: bool,
    /// Prefix used for emitted line markers (default `#line`); empty
    /// disables line-marker emission entirely.
    pub line_directive_prefix: Option<String>,
    /// Largest same-file line gap the writer will close by emitting literal
    /// blank lines instead of a `#line` marker (default 6, matching common
    /// preprocessor behavior).
    pub blank_line_threshold: u32,
    /// Writer whitespace-aggressiveness level.
    pub compress: CompressLevel,
    /// Toggle the GCC/clang-compatible space insertion after a function-like
    /// macro expansion immediately followed by an identifier.
    pub insert_adjacency_space: bool,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self::for_linux()
    }
}

impl PreprocessorConfig {
    fn base(target: Target, compiler: Compiler) -> Self {
        Self {
            target,
            compiler,
            recursion_limit: 128,
            include_resolver: None,
            warning_handler: None,
            hooks: Hooks::new(),
            include_dirs: Vec::new(),
            predefines: Vec::new(),
            preundefines: Vec::new(),
            never_define: Vec::new(),
            passthru_defines: false,
            passthru_unfound_includes: false,
            passthru_unknown_exprs: false,
            passthru_comments: false,
            passthru_includes: None,
            disable_auto_pragma_once: false,
            line_directive_prefix: Some("#line".to_string()),
            blank_line_threshold: 6,
            compress: CompressLevel::None,
            insert_adjacency_space: true,
        }
    }

    /// Create configuration for Linux + GCC.
    #[must_use]
    pub fn for_linux() -> Self {
        Self::base(Target::Linux, Compiler::GCC)
    }

    /// Create configuration for Windows + MSVC.
    #[must_use]
    pub fn for_windows() -> Self {
        Self::base(Target::Windows, Compiler::MSVC)
    }

    /// Create configuration for macOS + Clang.
    #[must_use]
    pub fn for_macos() -> Self {
        Self::base(Target::MacOS, Compiler::Clang)
    }

    /// Override the compiler for this configuration.
    #[must_use]
    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Set a warning handler for `#warning` directives.
    #[must_use]
    pub fn with_warning_handler(mut self, handler: WarningHandler) -> Self {
        self.warning_handler = Some(handler);
        self
    }

    /// Set the full hook surface.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Append a user include search directory.
    #[must_use]
    pub fn with_include_dir(mut self, dir: impl Into<String>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Predefine a macro before processing begins.
    #[must_use]
    pub fn with_predefine(mut self, def: impl Into<String>) -> Self {
        self.predefines.push(def.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_linux_gcc() {
        let cfg = PreprocessorConfig::default();
        assert_eq!(cfg.target, Target::Linux);
        assert_eq!(cfg.compiler, Compiler::GCC);
        assert_eq!(cfg.line_directive_prefix.as_deref(), Some("#line"));
    }

    #[test]
    fn builders_compose() {
        let cfg = PreprocessorConfig::for_windows()
            .with_include_dir("include")
            .with_predefine("FOO=1");
        assert_eq!(cfg.target, Target::Windows);
        assert_eq!(cfg.include_dirs, vec!["include".to_string()]);
        assert_eq!(cfg.predefines, vec!["FOO=1".to_string()]);
    }
}

//! The overridable hook surface: every behaviour a host application may want
//! to customise is exposed as a named callback slot with a sensible
//! default, in the same `Rc<dyn Fn(...)>` idiom [`crate::config`] already
//! uses for `IncludeResolver`/`WarningHandler`, generalised here into the
//! full set of extension points the expander, directive processor, and
//! include resolver call into.

use crate::config::{IncludeContext, IncludeKind};
use std::rc::Rc;

/// What a directive handler should do with the directive line it just
/// processed, as decided by the `on_directive` hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputDirective {
    /// The directive was executed; do not emit it.
    ExecuteAndRemove,
    /// The directive was executed but should also be emitted verbatim
    /// (rare; mainly used for diagnostics).
    ExecuteAndEmit,
    /// Do not execute the directive at all; emit it verbatim.
    IgnoreAndPassThrough,
    /// Do not execute the directive, and do not emit it either.
    IgnoreAndRemove,
}

/// Callback invoked for every diagnostic the engine produces.
pub type ErrorHook = Rc<dyn Fn(&crate::error::PreprocessError)>;

/// Callback invoked to open a file given a resolved candidate path; returns
/// its contents on success.
pub type FileOpenHook = Rc<dyn Fn(&str) -> Option<String>>;

/// Callback invoked when an `#include` target could not be found anywhere in
/// the search path. Returning `true` requests pass-through of the directive.
pub type IncludeNotFoundHook = Rc<dyn Fn(&str, IncludeKind, &IncludeContext) -> bool>;

/// Outcome of consulting [`DefinedHook`] for a single identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefinedDecision {
    /// Treat the identifier as (un)defined, overriding the engine's table.
    Value(bool),
    /// The hook can't say; pass the enclosing conditional through verbatim
    /// instead of committing to either branch.
    PassThrough,
}

/// Callback invoked for an identifier seen as the operand of `defined` whose
/// definedness the caller wants to override. Returning `None` means "use the
/// engine's own table"; `Some(DefinedDecision::Value(_))` forces a concrete
/// answer; `Some(DefinedDecision::PassThrough)` defers the decision to the
/// reader, the same way `passthru_unknown_exprs` does for `#if`.
pub type DefinedHook = Rc<dyn Fn(&str) -> Option<DefinedDecision>>;

/// Callback invoked for an identifier encountered bare inside a constant
/// expression that is not in the macro table. `None` means "treat as 0
/// unless passthru-unknown-exprs forces a partial result".
pub type UnknownIdentifierHook = Rc<dyn Fn(&str) -> Option<i64>>;

/// Callback invoked for a call-like form `NAME(...)` inside a constant
/// expression where `NAME` is not a known function-like macro.
pub type UnknownFunctionHook = Rc<dyn Fn(&str, &[String]) -> Option<i64>>;

/// Callback invoked before any directive is handled; may veto execution.
/// `None` means "use the default handling".
pub type DirectiveHook = Rc<dyn Fn(&str, &[String]) -> Option<OutputDirective>>;

/// Callback invoked for a directive name the processor does not recognise.
pub type UnknownDirectiveHook = Rc<dyn Fn(&str, &[String]) -> OutputDirective>;

/// Callback invoked when the automatic include-guard detector believes it
/// has found the guard macro name for the current file.
pub type IncludeGuardHook = Rc<dyn Fn(&str, &str)>;

/// Callback invoked for every comment token encountered, whether or not it
/// ends up stripped from the output.
pub type CommentHook = Rc<dyn Fn(&str, bool)>;

/// The full set of overridable hooks. All are optional; absent hooks fall
/// back to the engine's built-in defaults described in each field's
/// documentation.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Called for every reported error/warning. Default: no-op (errors still
    /// accumulate in the returned error count).
    pub on_error: Option<ErrorHook>,
    /// Called to open a candidate include path. Default: `std::fs::read_to_string`.
    pub on_file_open: Option<FileOpenHook>,
    /// Called when an include target is not found anywhere. Default:
    /// returns `false` (hard error, no pass-through).
    pub on_include_not_found: Option<IncludeNotFoundHook>,
    /// Called for `defined(NAME)` where the engine wants to double check
    /// with the host. Default: `None` (trust the macro table).
    pub on_defined: Option<DefinedHook>,
    /// Called for an unresolved bare identifier in a constant expression.
    pub on_unknown_identifier: Option<UnknownIdentifierHook>,
    /// Called for an unresolved function-call form in a constant expression.
    pub on_unknown_function: Option<UnknownFunctionHook>,
    /// Called before executing any recognised directive.
    pub on_directive: Option<DirectiveHook>,
    /// Called for directive names the processor does not know about.
    /// Default: pass through unchanged.
    pub on_unknown_directive: Option<UnknownDirectiveHook>,
    /// Called when the auto-pragma-once detector identifies a candidate
    /// guard macro for the current file.
    pub on_include_guard_seen: Option<IncludeGuardHook>,
    /// Called for every comment token, `is_block` distinguishing `/* */`
    /// from `//`.
    pub on_comment: Option<CommentHook>,
}

impl Hooks {
    /// An empty hook set; every slot falls back to its documented default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn unknown_directive_action(&self, name: &str, args: &[String]) -> OutputDirective {
        if let Some(hook) = &self.on_unknown_directive {
            return hook(name, args);
        }
        OutputDirective::IgnoreAndPassThrough
    }

    pub(crate) fn directive_action(&self, name: &str, args: &[String]) -> Option<OutputDirective> {
        self.on_directive.as_ref().and_then(|hook| hook(name, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_hooks_have_no_callbacks() {
        let hooks = Hooks::new();
        assert!(hooks.on_error.is_none());
        assert!(hooks.on_file_open.is_none());
    }

    #[test]
    fn unknown_directive_default_is_pass_through() {
        let hooks = Hooks::new();
        assert_eq!(
            hooks.unknown_directive_action("weird", &[]),
            OutputDirective::IgnoreAndPassThrough
        );
    }

    #[test]
    fn directive_hook_can_veto() {
        let mut hooks = Hooks::new();
        hooks.on_directive = Some(Rc::new(|name, _args| {
            if name == "define" {
                Some(OutputDirective::IgnoreAndPassThrough)
            } else {
                None
            }
        }));
        assert_eq!(
            hooks.directive_action("define", &[]),
            Some(OutputDirective::IgnoreAndPassThrough)
        );
        assert_eq!(hooks.directive_action("include", &[]), None);
    }
}

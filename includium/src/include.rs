//! Include resolution: search-path ordering, `#include_next`, and
//! existence-only resolution for `__has_include`. Includer-relative
//! directories are searched innermost-first, ahead of the user-configured
//! search path, with `#include_next` skipping candidates up to and
//! including the file identity it was invoked from. A default
//! filesystem-backed resolver is provided; a caller-supplied resolver hook
//! takes priority when set.

use crate::config::IncludeKind;
use crate::context::PreprocessorContext;
use std::path::{Path, PathBuf};

/// A resolved include: its search-order path and canonical identity, used
/// by `#include_next` to know what to skip past.
pub struct Resolved {
    /// The file's contents.
    pub contents: String,
    /// Canonicalised path, used for the include-once set and `#include_next`.
    pub canonical: String,
}

/// Build the ordered candidate list for resolving an `#include` target.
/// `Local` (`"..."`) includes always search includer-relative directories,
/// innermost-first, ahead of the user search path. `System` (`<...>`)
/// includes normally search only the user search path, but when `is_next`
/// is set (an `#include_next`) they also search includer-relative
/// directories, matching the asymmetric fallback a real `#include_next`
/// implementation composes.
fn candidate_dirs(ctx: &PreprocessorContext, kind: &IncludeKind, is_next: bool) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if *kind == IncludeKind::Local || is_next {
        for includer in ctx.include_stack.iter().rev() {
            if let Some(parent) = Path::new(includer).parent() {
                dirs.push(parent.to_path_buf());
            }
        }
    }
    for dir in &ctx.include_dirs {
        dirs.push(PathBuf::from(dir));
    }
    dirs
}

/// Resolve `target` (the raw text between quotes or angle brackets) to its
/// contents, honoring the custom resolver hook first, then the default
/// filesystem search. `skip_past` is set for `#include_next`: candidates up
/// to and including that canonical path are skipped; it also marks the
/// search as an `#include_next` for [`candidate_dirs`]'s System/Local
/// asymmetry.
pub fn resolve(
    ctx: &PreprocessorContext,
    target: &str,
    kind: IncludeKind,
    skip_past: Option<&str>,
) -> Option<Resolved> {
    if let Some(resolver) = &ctx.include_resolver {
        let include_ctx = crate::config::IncludeContext {
            include_stack: ctx.include_stack.clone(),
            include_dirs: ctx.include_dirs.clone(),
        };
        if let Some(contents) = resolver(target, kind.clone(), &include_ctx) {
            return Some(Resolved { canonical: target.to_string(), contents });
        }
    }

    let is_next = skip_past.is_some();
    let mut skipping = is_next;
    for dir in candidate_dirs(ctx, &kind, is_next) {
        let candidate = dir.join(target);
        let canonical = candidate
            .canonicalize()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| candidate.to_string_lossy().into_owned());
        if skipping {
            if skip_past == Some(canonical.as_str()) {
                skipping = false;
            }
            continue;
        }
        if let Some(hook) = &ctx.hooks.on_file_open {
            if let Some(contents) = hook(candidate.to_string_lossy().as_ref()) {
                return Some(Resolved { canonical, contents });
            }
        } else if let Ok(contents) = std::fs::read_to_string(&candidate) {
            return Some(Resolved { canonical, contents });
        }
    }
    None
}

/// `__has_include(<target>)` / `__has_include("target")`: existence-only
/// resolution, without recursing into the file.
pub fn has_include(ctx: &mut PreprocessorContext, raw: &str) -> bool {
    let Some((target, kind)) = split_include_text(raw) else {
        return false;
    };
    resolve(ctx, &target, kind, None).is_some()
}

/// Split raw include text (either `<...>` or `"..."`) into the target path
/// and its kind.
pub fn split_include_text(raw: &str) -> Option<(String, IncludeKind)> {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix('<') {
        let target = rest.strip_suffix('>')?;
        Some((target.to_string(), IncludeKind::System))
    } else if let Some(rest) = trimmed.strip_prefix('"') {
        let target = rest.strip_suffix('"')?;
        Some((target.to_string(), IncludeKind::Local))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_angle_bracket_and_quoted_targets() {
        assert_eq!(split_include_text("<stdio.h>"), Some(("stdio.h".to_string(), IncludeKind::System)));
        assert_eq!(split_include_text("\"local.h\""), Some(("local.h".to_string(), IncludeKind::Local)));
        assert_eq!(split_include_text("garbage"), None);
    }

    #[test]
    fn system_include_skips_includer_dir_unless_next() {
        let mut cfg = crate::config::PreprocessorConfig::for_linux();
        cfg.include_dirs = vec!["/usr/include".to_string()];
        let mut ctx = PreprocessorContext::new(cfg);
        ctx.include_stack.push("/project/src/main.c".to_string());

        let plain = candidate_dirs(&ctx, &IncludeKind::System, false);
        assert_eq!(plain, vec![PathBuf::from("/usr/include")]);

        let next = candidate_dirs(&ctx, &IncludeKind::System, true);
        assert_eq!(next, vec![PathBuf::from("/project/src"), PathBuf::from("/usr/include")]);
    }

    #[test]
    fn local_include_always_searches_includer_dir() {
        let mut cfg = crate::config::PreprocessorConfig::for_linux();
        cfg.include_dirs = vec!["/usr/include".to_string()];
        let mut ctx = PreprocessorContext::new(cfg);
        ctx.include_stack.push("/project/src/main.c".to_string());

        let dirs = candidate_dirs(&ctx, &IncludeKind::Local, false);
        assert_eq!(dirs, vec![PathBuf::from("/project/src"), PathBuf::from("/usr/include")]);
    }

    #[test]
    fn resolve_via_custom_resolver_hook() {
        let mut cfg = crate::config::PreprocessorConfig::for_linux();
        cfg.include_resolver = Some(std::rc::Rc::new(|target: &str, _k, _c| {
            if target == "virtual.h" {
                Some("int x;".to_string())
            } else {
                None
            }
        }));
        let ctx = PreprocessorContext::new(cfg);
        let resolved = resolve(&ctx, "virtual.h", IncludeKind::Local, None);
        assert_eq!(resolved.unwrap().contents, "int x;");
    }
}

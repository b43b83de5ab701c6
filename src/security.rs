//! Security guards (spec §4.6): path sanitization, size limits, and the
//! symlink/recursion-depth caps directory traversal must respect. These are
//! deliberately standalone so they're unit-testable without any real
//! filesystem-discovery collaborator (spec §10).

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Default cap on a single file's byte size, enforced at parse start
/// (spec §4.6).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
/// Default cap on symlink indirection depth while resolving a path.
pub const DEFAULT_MAX_SYMLINK_DEPTH: u32 = 40;
/// Default cap on directory-traversal recursion depth.
pub const DEFAULT_MAX_RECURSION_DEPTH: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("path {0:?} contains a '..' segment after normalization")]
    ParentTraversal(PathBuf),
    #[error("path {0:?} lies outside every configured root")]
    OutsideRoots(PathBuf),
    #[error("path {path:?} exceeds the {max}-symlink indirection cap")]
    SymlinkDepthExceeded { path: PathBuf, max: u32 },
    #[error("recursion depth {depth} exceeds the {max} cap at {path:?}")]
    RecursionTooDeep { path: PathBuf, depth: u32, max: u32 },
    #[error("file extension {0:?} is not in the configured allow-list")]
    DisallowedExtension(PathBuf),
    #[error("failed to canonicalize {path:?}: {message}")]
    Canonicalize { path: PathBuf, message: String },
}

/// Every limit a pipeline or scheduler enforces before touching a file
/// (spec §4.6). Cloned cheaply and shared read-only across worker tasks.
#[derive(Debug, Clone)]
pub struct SecurityLimits {
    pub max_file_size_bytes: u64,
    pub max_symlink_depth: u32,
    pub max_recursion_depth: u32,
    pub arena_memory_soft_limit_bytes: u64,
    pub allowed_extensions: Vec<String>,
    /// Root directories files must resolve under; empty means "no
    /// restriction beyond the `..`-segment check".
    pub allowed_roots: Vec<PathBuf>,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_symlink_depth: DEFAULT_MAX_SYMLINK_DEPTH,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            arena_memory_soft_limit_bytes: 512 * 1024 * 1024,
            allowed_extensions: vec!["java".to_string()],
            allowed_roots: Vec::new(),
        }
    }
}

/// Only files whose extension is in `limits.allowed_extensions` are
/// processed; everything else is rejected at the pipeline's parse stage
/// (spec §4.6's "Extension" guard, for callers that bypass the excluded
/// `FileDiscovery` collaborator's own filtering).
pub fn check_extension(path: &Path, limits: &SecurityLimits) -> Result<(), String> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if limits
        .allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    {
        Ok(())
    } else {
        Err(format!(
            "extension {ext:?} is not in the configured allow-list {:?}",
            limits.allowed_extensions
        ))
    }
}

/// Lexically normalizes a path without touching the filesystem: collapses
/// `.` segments and resolves `..` where it can be resolved against an
/// already-seen `Normal` segment, without ever following a symlink.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut stack: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match stack.last() {
                Some(Component::Normal(_)) => {
                    stack.pop();
                }
                _ => stack.push(component),
            },
            other => stack.push(other),
        }
    }
    stack.iter().collect()
}

/// Rejects paths containing an unresolved `..` segment after lexical
/// normalization, and (when `limits.allowed_roots` is non-empty) paths that
/// don't canonicalize to somewhere under one of those roots (spec §4.6).
pub fn sanitize_path(path: &Path, limits: &SecurityLimits) -> Result<PathBuf, SecurityError> {
    let normalized = normalize_lexical(path);
    if normalized
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(SecurityError::ParentTraversal(path.to_path_buf()));
    }

    if limits.allowed_roots.is_empty() {
        return Ok(normalized);
    }

    let canonical = path.canonicalize().map_err(|e| SecurityError::Canonicalize {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let under_a_root = limits
        .allowed_roots
        .iter()
        .any(|root| canonical.starts_with(root));
    if !under_a_root {
        return Err(SecurityError::OutsideRoots(path.to_path_buf()));
    }
    Ok(canonical)
}

/// Resolves `path` following symlinks one hop at a time, failing once more
/// than `limits.max_symlink_depth` indirections have been followed. Plain
/// (non-symlink) paths resolve in a single step.
pub fn resolve_symlinks(path: &Path, limits: &SecurityLimits) -> Result<PathBuf, SecurityError> {
    let mut current = path.to_path_buf();
    for _ in 0..limits.max_symlink_depth {
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = std::fs::read_link(&current).map_err(|e| SecurityError::Canonicalize {
                    path: current.clone(),
                    message: e.to_string(),
                })?;
                current = if target.is_absolute() {
                    target
                } else {
                    current
                        .parent()
                        .unwrap_or_else(|| Path::new("."))
                        .join(target)
                };
            }
            _ => return Ok(current),
        }
    }
    Err(SecurityError::SymlinkDepthExceeded {
        path: path.to_path_buf(),
        max: limits.max_symlink_depth,
    })
}

/// Tracks per-branch directory-traversal depth; a `FileDiscovery`
/// collaborator (or the demo binary's walker) increments this descending
/// into each subdirectory and must bail out once `check` fails
/// (spec §4.6's recursion-depth guard).
pub struct RecursionGuard {
    max_depth: u32,
}

impl RecursionGuard {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    pub fn check(&self, path: &Path, depth: u32) -> Result<(), SecurityError> {
        if depth > self.max_depth {
            return Err(SecurityError::RecursionTooDeep {
                path: path.to_path_buf(),
                depth,
                max: self.max_depth,
            });
        }
        Ok(())
    }
}

impl Default for RecursionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECURSION_DEPTH)
    }
}

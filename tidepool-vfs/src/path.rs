//! Path conventions shared by every [`ProjectFs`](crate::ProjectFs)
//! implementation: absolute, `/`-separated, no traversal components.

use crate::{FsError, FsResult};

/// Validates an absolute project path.
///
/// `/` itself is valid; everything else must start with `/` and contain no
/// empty, `.`, or `..` components and no trailing slash.
pub fn validate(path: &str) -> FsResult<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') {
        return Err(FsError::InvalidPath(path.to_string()));
    }
    for component in path[1..].split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(FsError::InvalidPath(path.to_string()));
        }
    }
    Ok(())
}

/// Joins a directory path and a child name.
#[must_use]
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Returns the parent directory of a path, or `None` for `/`.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

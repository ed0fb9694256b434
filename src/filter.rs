//! Include/ignore filtering of changed file names.
//!
//! A change is relevant iff the file's basename matches at least one
//! include pattern and none of the ignore patterns. An empty include list
//! matches everything; an empty ignore list ignores nothing.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use thiserror::Error;

/// A user-supplied glob could not be compiled.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid glob `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Basename filter built from ordered include and ignore glob lists.
///
/// Both lists are fixed at construction for the lifetime of the watch.
pub struct PatternFilter {
    /// `None` means "match everything" (no -p flags given).
    include: Option<Gitignore>,
    /// `None` means "ignore nothing" (no -i flags given).
    ignore: Option<Gitignore>,
}

impl PatternFilter {
    pub fn new(patterns: &[String], ignores: &[String]) -> Result<Self, FilterError> {
        Ok(Self {
            include: build_matcher(patterns)?,
            ignore: build_matcher(ignores)?,
        })
    }

    /// Decide whether a changed path should trigger a rebuild.
    ///
    /// Only the final path segment is matched; directories in the path play
    /// no role here (exclusion by directory is the watcher's job).
    pub fn is_relevant(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = Path::new(name);

        let included = self
            .include
            .as_ref()
            .is_none_or(|m| m.matched(name, false).is_ignore());
        if !included {
            return false;
        }

        !self
            .ignore
            .as_ref()
            .is_some_and(|m| m.matched(name, false).is_ignore())
    }
}

/// Compile a glob list into a matcher; `None` for an empty list.
fn build_matcher(patterns: &[String]) -> Result<Option<Gitignore>, FilterError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GitignoreBuilder::new("");
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| FilterError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
    }

    let matcher = builder.build().map_err(|e| FilterError::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })?;
    Ok(Some(matcher))
}

// ============================================================================
// Tests
// ============================================================================

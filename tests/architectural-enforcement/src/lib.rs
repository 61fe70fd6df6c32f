//! Architectural Enforcement Integration Tests
//!
//! This package scans the workspace sources and enforces:
//! - No blocking sleeps in production code (the connector settle delay is
//!   the one sanctioned async wait)
//! - No blocking I/O inside async code
//!
//! The helpers here are shared by the test files under `tests/`. Everything
//! from a file's `#[cfg(test)]` marker onwards is treated as test code and
//! ignored.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_ROOTS: &[&str] = &["conductor/core/src", "conductor/daemon/src"];

/// A production source file with its test module stripped
#[derive(Debug)]
pub struct SourceFile {
    /// Path to the file
    pub path: PathBuf,
    /// Lines before the first `#[cfg(test)]`
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Build from raw file content
    pub fn from_content(path: impl Into<PathBuf>, content: &str) -> Self {
        let lines = content
            .lines()
            .take_while(|line| line.trim() != "#[cfg(test)]")
            .map(str::to_string)
            .collect();
        Self {
            path: path.into(),
            lines,
        }
    }

    /// Format a violation at `idx`
    pub fn violation(&self, idx: usize, kind: &str) -> String {
        format!(
            "{}:{} - {}: {}",
            self.path.display(),
            idx + 1,
            kind,
            self.lines[idx].trim()
        )
    }
}

/// Workspace root (two levels above this crate)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Every production `.rs` file under [`PRODUCTION_ROOTS`]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();
    for dir in PRODUCTION_ROOTS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(entry.path()) {
                files.push(SourceFile::from_content(entry.path(), &content));
            }
        }
    }
    files
}

/// The part of a line before any `//` comment
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// True for a function signature line (`pub async fn x(`, `fn y<T>(` ...)
pub fn is_fn_signature(line: &str) -> bool {
    let mut rest = line.trim_start();
    loop {
        let stripped = ["pub(crate) ", "pub(super) ", "pub ", "async ", "const ", "unsafe "]
            .iter()
            .find_map(|prefix| rest.strip_prefix(prefix));
        match stripped {
            Some(next) => rest = next,
            None => break,
        }
    }
    rest.starts_with("fn ")
}

/// True when the line at `idx` runs in async context
///
/// Walks back to the nearest function signature or `async` block opener.
pub fn is_in_async_context(lines: &[String], idx: usize) -> bool {
    for i in (0..=idx).rev() {
        let line = code_part(&lines[i]);
        if line.contains("async move {") || line.trim_end().ends_with("async {") {
            return true;
        }
        if is_fn_signature(line) {
            return line.contains("async fn ");
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(code: &[&str]) -> Vec<String> {
        code.iter().map(|l| (*l).to_string()).collect()
    }

    #[test]
    fn test_test_module_is_stripped() {
        let file = SourceFile::from_content("x.rs", "fn a() {}\n#[cfg(test)]\nmod tests {}\n");
        assert_eq!(file.lines, vec!["fn a() {}".to_string()]);
    }

    #[test]
    fn test_fn_signature_detection() {
        assert!(is_fn_signature("    pub(crate) async fn ensure_success("));
        assert!(is_fn_signature("fn main() {"));
        assert!(!is_fn_signature("    let f = move || {"));
        assert!(!is_fn_signature("    // fn commented"));
    }

    #[test]
    fn test_async_context_detection() {
        let code = lines(&[
            "pub async fn load() {",
            "    let contents = std::fs::read_to_string(path);",
            "}",
            "fn sync_load() {",
            "    let contents = std::fs::read_to_string(path);",
            "    tokio::spawn(async move {",
            "        std::fs::read(path);",
            "    });",
            "}",
        ]);
        assert!(is_in_async_context(&code, 1));
        assert!(!is_in_async_context(&code, 4));
        assert!(is_in_async_context(&code, 6));
    }
}

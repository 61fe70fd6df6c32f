//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async code MUST NOT use blocking I/O.
//! **Required**: `tokio::net`, `tokio::fs` and async `reqwest`, not `std::fs`,
//! `std::net` sockets or `reqwest::blocking`.
//!
//! Blocking calls in plain functions (configuration loading before the
//! runtime serves requests) are acceptable.

use architectural_enforcement::{code_part, is_in_async_context, production_sources, SourceFile};

/// Test that production code does not use blocking I/O in async code
#[test]
fn test_no_blocking_io_in_async_code() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(find_blocking_io_violations)
        .collect();

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O found in async code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nForbidden in async code: std::fs::*, std::net sockets, std::process::Command,");
        eprintln!("std::io::stdin(). Forbidden everywhere: reqwest::blocking.");

        panic!(
            "\nFound {} blocking I/O violation(s).\nFix these before merging!",
            violations.len()
        );
    }
}

const ASYNC_FORBIDDEN: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::TcpStream", "Blocking network I/O"),
    ("std::net::TcpListener", "Blocking network I/O"),
    ("std::net::UdpSocket", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("std::io::stdin()", "Blocking stdin"),
];

fn find_blocking_io_violations(file: &SourceFile) -> Vec<String> {
    let mut violations = Vec::new();
    for (idx, line) in file.lines.iter().enumerate() {
        let code = code_part(line);

        if code.contains("reqwest::blocking") {
            violations.push(file.violation(idx, "Blocking HTTP client"));
            continue;
        }

        if let Some((_, kind)) = ASYNC_FORBIDDEN.iter().find(|(needle, _)| code.contains(needle)) {
            if is_in_async_context(&file.lines, idx) {
                violations.push(file.violation(idx, kind));
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_read_in_async_fn_is_flagged() {
        let file = SourceFile::from_content(
            "server.rs",
            "async fn handler() {\n    let body = std::fs::read_to_string(\"x\");\n}\n",
        );
        assert_eq!(find_blocking_io_violations(&file).len(), 1);
    }

    #[test]
    fn test_blocking_read_in_sync_fn_is_allowed() {
        let file = SourceFile::from_content(
            "config/mod.rs",
            "pub fn load() {\n    let body = std::fs::read_to_string(\"x\");\n}\n",
        );
        assert!(find_blocking_io_violations(&file).is_empty());
    }

    #[test]
    fn test_blocking_http_is_always_flagged() {
        let file = SourceFile::from_content("x.rs", "fn f() {\n    reqwest::blocking::get(url);\n}\n");
        assert_eq!(find_blocking_io_violations(&file).len(), 1);
    }
}

//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT sleep. Commands wait on I/O, never on
//! the clock.
//! **Exception**: the applier's connector settle delay, an async wait keyed
//! on `settle_delay` before deferred connectors are flushed.

use architectural_enforcement::{code_part, production_sources, SourceFile};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(find_sleep_violations)
        .collect();

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nAcceptable: tokio::time::sleep on the applier's settle delay, test code.");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

#[test]
fn test_sources_were_scanned() {
    assert!(
        production_sources()
            .iter()
            .any(|f| f.path.ends_with("board/applier.rs")),
        "production sources not found; is the workspace layout intact?"
    );
}

fn find_sleep_violations(file: &SourceFile) -> Vec<String> {
    let mut violations = Vec::new();
    for (idx, line) in file.lines.iter().enumerate() {
        let code = code_part(line);
        if code.contains("thread::sleep(") {
            violations.push(file.violation(idx, "Blocking thread sleep"));
            continue;
        }
        if (code.contains("::sleep(") || code.contains(".sleep("))
            && !is_settle_delay(file, idx)
        {
            violations.push(file.violation(idx, "Sleep"));
        }
    }
    violations
}

/// Sleep on the settle delay inside the applier
fn is_settle_delay(file: &SourceFile, idx: usize) -> bool {
    file.path.ends_with("board/applier.rs")
        && file.lines[idx.saturating_sub(3)..=idx]
            .iter()
            .any(|line| line.contains("settle_delay"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_outside_applier_is_flagged() {
        let file = SourceFile::from_content(
            "conductor/core/src/orchestrator/tool_loop.rs",
            "async fn poll() {\n    tokio::time::sleep(self.settle_delay).await;\n}\n",
        );
        assert_eq!(find_sleep_violations(&file).len(), 1);
    }

    #[test]
    fn test_settle_delay_in_applier_is_allowed() {
        let file = SourceFile::from_content(
            "conductor/core/src/board/applier.rs",
            "if !self.options.settle_delay.is_zero() {\n    tokio::time::sleep(self.options.settle_delay).await;\n}\n",
        );
        assert!(find_sleep_violations(&file).is_empty());
    }

    #[test]
    fn test_thread_sleep_is_never_allowed() {
        let file = SourceFile::from_content(
            "conductor/core/src/board/applier.rs",
            "// settle_delay\nstd::thread::sleep(settle_delay);\n",
        );
        assert_eq!(find_sleep_violations(&file).len(), 1);
    }
}

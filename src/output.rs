//! Progress and report output for the CLI.
//!
//! All user-facing text goes through an injected writer so tests can
//! capture it; nothing in the library prints directly.

use crate::driver::{ArtifactReport, BuildReport};
use std::fmt;
use std::io::Write;

/// Write one line to the given sink, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// One-line summary for a finished build.
#[must_use]
pub fn success_message(report: &BuildReport) -> String {
    format!(
        "Merged {} artifact(s) into universal binaries.",
        report.artifacts.len()
    )
}

/// Per-artifact report lines for a finished build.
#[must_use]
pub fn report_lines(report: &BuildReport) -> Vec<String> {
    report
        .artifacts
        .iter()
        .map(|artifact| match artifact {
            ArtifactReport::Image { path } => format!("  {path}: universal image"),
            ArtifactReport::Archive { path, members } => {
                let universal = members
                    .iter()
                    .filter(|(_, d)| *d == crate::archive::merge::MemberDisposition::Universal)
                    .count();
                let copied = members.len() - universal;
                format!("  {path}: {universal} universal member(s), {copied} copied through")
            }
        })
        .collect()
}

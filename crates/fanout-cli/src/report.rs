//! Rendering of round results for humans and machines

use std::io::{self, Write};

use clap::ValueEnum;
use fanout_core::{ExecutionResult, RoundOutcome, Summary};
use serde::Serialize;

/// Report format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Per-host blocks followed by a summary line
    #[default]
    Text,
    /// One JSON document
    Json,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    results: &'a [ExecutionResult],
    summary: Summary,
    error: Option<String>,
}

/// Write the report for `outcome` in `format`
///
/// # Errors
/// Returns error if writing fails
pub fn render(
    outcome: &RoundOutcome,
    format: OutputFormat,
    out: &mut impl Write,
) -> eyre::Result<()> {
    match format {
        OutputFormat::Text => render_text(outcome, out)?,
        OutputFormat::Json => render_json(outcome, out)?,
    }
    Ok(())
}

fn render_text(outcome: &RoundOutcome, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Execution Results:")?;
    writeln!(out, "==================")?;

    for result in &outcome.results {
        let status = if result.succeeded { "✓" } else { "✗" };
        writeln!(out, "[{status}] {}", result.host)?;

        let output = result.output.trim_end();
        if !output.is_empty() {
            writeln!(out, "Output: {output}")?;
        }
        let diagnostic = result.diagnostic.trim_end();
        if !diagnostic.is_empty() {
            writeln!(out, "Error: {diagnostic}")?;
        }
        writeln!(out)?;
    }

    writeln!(out, "Summary: {}", outcome.summary())
}

fn render_json(outcome: &RoundOutcome, out: &mut impl Write) -> eyre::Result<()> {
    let report = JsonReport {
        results: &outcome.results,
        summary: outcome.summary(),
        error: outcome.error.as_ref().map(ToString::to_string),
    };

    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

//! Report renderers for `--export`.

use std::fmt::{self, Write as _};

use anyhow::{Context, Result};
use pcapdiff_core::{ComparisonResult, DEFAULT_GENERATED_AT, build_report};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::ExportFormat;

const HTML_CHANGED_FIELDS: usize = 10;

pub fn render(result: &ComparisonResult, format: ExportFormat, pretty: bool) -> Result<String> {
    match format {
        ExportFormat::Txt => render_text(result).context("text rendering failed"),
        ExportFormat::Html => render_html(result).context("HTML rendering failed"),
        ExportFormat::Json => build_report(result, generated_at())
            .to_json(pretty)
            .context("JSON serialization failed"),
    }
}

fn generated_at() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| DEFAULT_GENERATED_AT.to_string())
}

pub fn render_text(result: &ComparisonResult) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "PCAP DIFF REPORT")?;
    writeln!(out, "{}\n", "=".repeat(50))?;
    writeln!(out, "File 1: {}", result.file1_metadata.summary())?;
    writeln!(out, "File 2: {}\n", result.file2_metadata.summary())?;
    writeln!(out, "{}\n", result.summary())?;

    writeln!(out, "Breakdown:")?;
    for (diff_type, count) in result.diff_counts().iter() {
        writeln!(out, "  {}: {}", diff_type.title(), count)?;
    }

    writeln!(out, "\nDetailed Differences:")?;
    writeln!(out, "{}", "-".repeat(30))?;
    for diff in result.packet_diffs.iter().filter(|diff| diff.has_differences()) {
        writeln!(out, "\nPacket {}: {}", diff.packet_id, diff.summary())?;
        for (layer, fields) in &diff.layer_diffs {
            writeln!(out, "  Layer {layer}:")?;
            for (field, diff_type) in fields {
                writeln!(out, "    {field}: {diff_type}")?;
            }
        }
    }
    Ok(out)
}

pub fn render_html(result: &ComparisonResult) -> Result<String, fmt::Error> {
    let mut out = String::from(HTML_HEAD);
    writeln!(
        out,
        "<div class=\"header\">\n<h1>PCAP Diff Report</h1>\n<p><strong>File 1:</strong> {}</p>\n<p><strong>File 2:</strong> {}</p>\n</div>",
        escape_html(&result.file1_metadata.summary()),
        escape_html(&result.file2_metadata.summary()),
    )?;
    writeln!(
        out,
        "<div class=\"summary\">\n<h2>Summary</h2>\n<p>{}</p>\n</div>",
        escape_html(&result.summary())
    )?;

    out.push_str("<h2>Detailed Differences</h2>\n<table>\n");
    out.push_str("<tr><th>Packet ID</th><th>Type</th><th>Summary</th><th>Changed Fields</th></tr>\n");
    for diff in result.packet_diffs.iter().filter(|diff| diff.has_differences()) {
        let changed: Vec<_> = diff
            .changed_fields()
            .into_iter()
            .take(HTML_CHANGED_FIELDS)
            .collect();
        writeln!(
            out,
            "<tr class=\"diff-{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            diff.diff_type,
            diff.packet_id,
            diff.diff_type.title(),
            escape_html(&diff.summary()),
            escape_html(&changed.join(", ")),
        )?;
    }
    out.push_str("</table>\n</body>\n</html>\n");
    Ok(out)
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>PCAP Diff Report</title>
<style>
body { font-family: Arial, sans-serif; margin: 20px; }
.header { background-color: #f0f0f0; padding: 20px; border-radius: 5px; }
.summary { margin: 20px 0; }
.diff-added { background-color: #d4edda; }
.diff-removed { background-color: #f8d7da; }
.diff-modified { background-color: #fff3cd; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; }
</style>
</head>
<body>
"#;

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

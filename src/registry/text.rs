//! Text exposition encoding for registry snapshots.

use super::Snapshot;
use std::fmt::Write;

/// The content type scrapers expect for the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Encodes a snapshot as `# HELP` / `# TYPE` headers followed by one
/// `name{label="value",...} value` line per series.
///
/// Families without any series are skipped entirely.
pub fn encode(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for family in snapshot.families.iter().filter(|f| !f.samples.is_empty()) {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "# HELP {} {}", family.name, escape_help(&family.help));
        let _ = writeln!(out, "# TYPE {} gauge", family.name);

        for sample in &family.samples {
            out.push_str(&family.name);
            if !family.label_keys.is_empty() {
                out.push('{');
                for (i, (key, value)) in family.label_keys.iter().zip(&sample.label_values).enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{}=\"{}\"", key, escape_label_value(value));
                }
                out.push('}');
            }
            let _ = writeln!(out, " {}", sample.value);
        }
    }
    out
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

use std::io::Write;

use formfill_core::ExtractionResult;
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the result as pretty JSON, the same shape the web service returns
/// inside `formData` (or `{"error": ...}`).
pub fn print_json(w: &mut dyn Write, result: &ExtractionResult) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(result).map_err(std::io::Error::other)?;
    writeln!(w, "{}", json)
}

/// Print one `key: value` line per field, with missing values dimmed.
pub fn print_table(
    w: &mut dyn Write,
    result: &ExtractionResult,
    color: ColorMode,
) -> std::io::Result<()> {
    let fields = match result {
        ExtractionResult::Fields(fields) => fields,
        ExtractionResult::Error(message) => {
            if color.enabled() {
                writeln!(w, "{} {}", "error:".red().bold(), message)?;
            } else {
                writeln!(w, "error: {}", message)?;
            }
            return Ok(());
        }
    };

    let width = fields.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    for (key, value) in fields {
        let padded = format!("{:width$}", key, width = width);
        match (value, color.enabled()) {
            (Some(v), true) => writeln!(w, "{}  {}", padded.bold(), v.green())?,
            (Some(v), false) => writeln!(w, "{}  {}", padded, v)?,
            (None, true) => writeln!(w, "{}  {}", padded.bold(), "(not found)".dimmed())?,
            (None, false) => writeln!(w, "{}  (not found)", padded)?,
        }
    }

    let found = fields.values().filter(|v| v.is_some()).count();
    writeln!(w)?;
    writeln!(w, "{}/{} fields found", found, fields.len())?;
    Ok(())
}

/// Print the prompt that would be sent, for `--dry-run`.
pub fn print_prompt(
    w: &mut dyn Write,
    system: &str,
    user: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    for (heading, body) in [("SYSTEM", system), ("USER", user)] {
        if color.enabled() {
            writeln!(w, "{}", format!("=== {} ===", heading).cyan().bold())?;
        } else {
            writeln!(w, "=== {} ===", heading)?;
        }
        writeln!(w, "{}", body)?;
        writeln!(w)?;
    }
    Ok(())
}

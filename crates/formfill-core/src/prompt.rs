//! Deterministic prompt construction for field extraction.

use std::fmt::Write;

use crate::fields::FieldSpec;

pub const SYSTEM_PROMPT: &str = "You are an expert data extraction assistant. \
You MUST return a JSON object with ALL requested fields. \
Never skip fields - if information is not found, set the field to null.";

/// A system/user message pair ready to send to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the extraction prompt for `specs` over `document_text`.
///
/// The same inputs always produce the same prompt. The document text is
/// appended verbatim after the instructions.
pub fn build_prompt(specs: &[FieldSpec], document_text: &str) -> Prompt {
    let keys = crate::fields::resolve_keys(specs);
    let count = keys.len();

    let mut user = String::with_capacity(document_text.len() + 1024);

    // Writing to a String cannot fail.
    let _ = writeln!(
        user,
        "TASK: Extract information for {count} specific fields from the document."
    );
    user.push('\n');
    user.push_str("FIELDS TO EXTRACT:\n");
    for key in &keys {
        let _ = writeln!(user, "- {key}");
    }

    let hints: Vec<(&str, &str)> = keys
        .iter()
        .zip(specs)
        .filter_map(|(key, spec)| spec.field_type().map(|t| (key.as_str(), t)))
        .collect();
    if !hints.is_empty() {
        user.push('\n');
        user.push_str("FIELD TYPE HINTS (advisory):\n");
        for (key, field_type) in hints {
            let _ = writeln!(user, "- {key}: {field_type}");
        }
    }

    user.push('\n');
    user.push_str("CRITICAL INSTRUCTIONS:\n");
    let _ = writeln!(
        user,
        "- You MUST return a JSON object with EXACTLY {count} fields, using the field names above verbatim as keys"
    );
    user.push_str("- Each field above must appear in your JSON response\n");
    user.push_str("- Do NOT add any keys that are not listed above\n");
    user.push_str("- If you find information for a field, extract it as a string\n");
    user.push_str("- If you cannot find information for a field, set it to null\n");
    user.push_str(
        "- Example format: {\"field1\": \"value1\", \"field2\": null, \"field3\": \"value3\"}\n",
    );
    let _ = writeln!(
        user,
        "- Do NOT skip any fields - all {count} fields must be present"
    );

    user.push('\n');
    user.push_str("SPECIAL FORMATTING RULES:\n");
    user.push_str(
        "- For money/amount fields: return ONLY the numeric value, with NO currency symbols or codes ($, ¥, RMB, USD, etc.) and no thousands separators\n",
    );
    user.push_str(
        "- For example: if the document says \"$89,723\" or \"89723 RMB\", return \"89723\"\n",
    );
    user.push_str("- For phone numbers: return only digits, no spaces or special characters\n");
    user.push_str("- For dates: use YYYY-MM-DD format\n");
    user.push_str("- For person names: use title case (e.g. \"John Smith\")\n");
    user.push_str("- For addresses: return the full address as a single string\n");

    user.push('\n');
    user.push_str("Document text:\n");
    user.push_str(document_text);

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

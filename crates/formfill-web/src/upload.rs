use axum::extract::Multipart;
use formfill_core::{FieldSpec, FieldSpecError, parse_field_specs};
use formfill_ingest::sanitize_filename;

/// An uploaded document with its (sanitized) filename.
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Parsed form fields from the multipart upload.
pub struct FormFields {
    pub file: UploadedFile,
    pub field_specs: Vec<FieldSpec>,
}

/// Parse a multipart form upload into structured form fields.
///
/// Expects a `file` part and a `formFields` text part holding a JSON array.
/// Errors are returned as the message to show the client.
pub async fn parse_multipart(mut multipart: Multipart) -> Result<FormFields, String> {
    let mut file: Option<UploadedFile> = None;
    let mut form_fields: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Failed to read form field: {}", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = sanitize_filename(field.file_name().unwrap_or(""));
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read file data: {}", e))?
                    .to_vec();
                file = Some(UploadedFile { filename, data });
            }
            "formFields" => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read formFields: {}", e))?;
                form_fields = Some(val);
            }
            _ => {
                // Ignore unknown fields
                let _ = field.bytes().await;
            }
        }
    }

    let file = file.ok_or("No file part")?;
    if file.filename.is_empty() {
        return Err("No selected file".to_string());
    }

    let raw = form_fields.ok_or(FieldSpecError::Missing.to_string())?;
    let field_specs = parse_field_specs(&raw).map_err(|e| e.to_string())?;

    Ok(FormFields { file, field_specs })
}

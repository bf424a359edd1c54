use thiserror::Error;

pub mod docx;
pub mod pdf;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
}

/// Failure inside a format decoder. Never escapes [`extract`]; it is folded
/// into [`ExtractedText::DecodeFailed`].
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to read PDF: {0}")]
    Pdf(String),
    #[error("failed to read DOCX: {0}")]
    Docx(String),
    #[error("file is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Supported document containers, selected by filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
}

impl DocumentFormat {
    /// Case-sensitive suffix match against `.pdf`, `.docx`, `.txt`, `.md`.
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.ends_with(".pdf") {
            Some(DocumentFormat::Pdf)
        } else if filename.ends_with(".docx") {
            Some(DocumentFormat::Docx)
        } else if filename.ends_with(".txt") || filename.ends_with(".md") {
            Some(DocumentFormat::Text)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Text => "text",
        }
    }
}

/// Result of decoding a supported document: its text, or the decoder's
/// error description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedText {
    Text(String),
    DecodeFailed(String),
}

impl ExtractedText {
    /// The text, or the failure description standing in for it.
    pub fn into_string(self) -> String {
        match self {
            ExtractedText::Text(text) | ExtractedText::DecodeFailed(text) => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExtractedText::DecodeFailed(_))
    }
}

/// Extract text from `bytes`, dispatching on the suffix of `filename`.
///
/// Unsupported suffixes are rejected before any decoding. For supported
/// formats this never fails: decoder errors come back as
/// [`ExtractedText::DecodeFailed`].
pub fn extract(bytes: &[u8], filename: &str) -> Result<ExtractedText, IngestError> {
    let format = DocumentFormat::from_filename(filename)
        .ok_or_else(|| IngestError::UnsupportedFormat(filename.to_string()))?;
    Ok(extract_format(bytes, format))
}

/// Decode `bytes` as `format`.
pub fn extract_format(bytes: &[u8], format: DocumentFormat) -> ExtractedText {
    let decoded = match format {
        DocumentFormat::Pdf => pdf::extract_text(bytes),
        DocumentFormat::Docx => docx::extract_text(bytes),
        DocumentFormat::Text => decode_utf8(bytes),
    };

    match decoded {
        Ok(text) => {
            tracing::debug!(format = format.as_str(), chars = text.len(), "extracted text");
            ExtractedText::Text(text)
        }
        Err(e) => {
            tracing::warn!(format = format.as_str(), error = %e, "document decode failed");
            ExtractedText::DecodeFailed(e.to_string())
        }
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, DecodeError> {
    Ok(std::str::from_utf8(bytes)?.to_owned())
}

/// Reduce an uploaded filename to a safe, ASCII-only basename.
///
/// Directory components are dropped, whitespace runs become `_`, characters
/// outside `[A-Za-z0-9._-]` are removed, and leading/trailing `.` and `_` are
/// trimmed. May return an empty string.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

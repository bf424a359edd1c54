use formfill_core::{DecodeFailurePolicy, FieldExtractor};

/// Shared application state accessible from all handlers.
///
/// Built once at startup and never mutated.
pub struct AppState {
    pub extractor: FieldExtractor,
    pub decode_failure_policy: DecodeFailurePolicy,
}

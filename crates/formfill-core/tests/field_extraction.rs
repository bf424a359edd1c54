//! End-to-end tests for [`FieldExtractor`] against a mock oracle.
//!
//! No network: every oracle reply is scripted through [`MockOracle`].

use std::collections::BTreeSet;
use std::sync::Arc;

use formfill_core::oracle::mock::MockOracle;
use formfill_core::response::PARSE_FAILURE_MESSAGE;
use formfill_core::{
    ExtractionResult, ExtractionSettings, FieldExtractor, FieldSpec, OracleError, RetryPolicy,
    parse_field_specs, resolve_keys,
};

fn settings() -> ExtractionSettings {
    ExtractionSettings {
        retry: RetryPolicy::no_retries(),
        ..ExtractionSettings::default()
    }
}

fn extractor(oracle: &Arc<MockOracle>) -> FieldExtractor {
    FieldExtractor::new(oracle.clone(), settings())
}

#[tokio::test]
async fn name_and_email_scenario() {
    let oracle = Arc::new(MockOracle::replying(
        r#"{"name":"John Smith","email":null}"#,
    ));
    let specs = parse_field_specs(r#"["name","email"]"#).unwrap();

    let result = extractor(&oracle)
        .extract_fields("Claimant: John Smith", &specs)
        .await;

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "name": "John Smith", "email": null })
    );
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test]
async fn result_key_set_equals_requested_key_set() {
    let specs = parse_field_specs(
        r#"["policyNumber", {"label": "Claim Amount", "type": "money"}, {"name": "contactPhone"}, {"id": "f4"}]"#,
    )
    .unwrap();
    let oracle = Arc::new(MockOracle::replying(
        r#"{"f4": null, "contactPhone": "5551234567", "Claim Amount": "89723", "policyNumber": "PN-1"}"#,
    ));

    let result = extractor(&oracle).extract_fields("...", &specs).await;

    let got: BTreeSet<String> = result.fields().unwrap().keys().cloned().collect();
    let want: BTreeSet<String> = resolve_keys(&specs).into_iter().collect();
    assert_eq!(got, want);
}

#[tokio::test]
async fn money_field_prompt_and_value() {
    let specs = parse_field_specs(r#"[{"label":"Claim Amount","type":"money"}]"#).unwrap();
    let oracle = Arc::new(MockOracle::replying(r#"{"Claim Amount": "89723"}"#));

    let result = extractor(&oracle)
        .extract_fields("Estimated loss: $89,723", &specs)
        .await;

    let prompt = oracle.last_request().unwrap().prompt.user;
    assert!(prompt.contains("- Claim Amount\n"));
    assert!(prompt.contains("NO currency symbols"));
    assert!(prompt.ends_with("Estimated loss: $89,723"));
    assert_eq!(
        result.fields().unwrap().get("Claim Amount"),
        Some(&Some("89723".to_string()))
    );
}

#[tokio::test]
async fn fenced_reply_matches_unfenced_reply() {
    let specs = vec![FieldSpec::Name("name".into()), FieldSpec::Name("email".into())];
    let inner = r#"{"name": "Jane Doe", "email": "jane@example.com"}"#;

    let plain = Arc::new(MockOracle::replying(inner));
    let fenced = Arc::new(MockOracle::replying(&format!("```json\n{inner}\n```")));

    let a = extractor(&plain).extract_fields("doc", &specs).await;
    let b = extractor(&fenced).extract_fields("doc", &specs).await;
    assert_eq!(a, b);
    assert!(!a.is_error());
}

#[tokio::test]
async fn oracle_failure_yields_error_sentinel_only() {
    let oracle = Arc::new(MockOracle::failing(OracleError::Transport(
        "connection refused".into(),
    )));
    let specs = vec![FieldSpec::Name("name".into())];

    let result = extractor(&oracle).extract_fields("doc", &specs).await;

    match &result {
        ExtractionResult::Error(msg) => assert!(msg.contains("connection refused")),
        other => panic!("expected error sentinel, got {other:?}"),
    }
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json.as_object().unwrap().len(), 1);
    assert!(json.get("name").is_none());
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_retried_with_backoff() {
    let oracle = Arc::new(MockOracle::with_sequence(vec![
        Err(OracleError::Timeout),
        Err(OracleError::RateLimited { retry_after: None }),
        Ok(r#"{"name": "John Smith"}"#.into()),
    ]));
    let extractor = FieldExtractor::new(oracle.clone(), ExtractionSettings::default());

    let result = extractor
        .extract_fields("doc", &[FieldSpec::Name("name".into())])
        .await;

    assert!(!result.is_error());
    assert_eq!(oracle.call_count(), 3);
}

#[tokio::test]
async fn unparseable_then_valid_reply_recovers() {
    let oracle = Arc::new(MockOracle::with_sequence(vec![
        Ok("Here you go: name is John".into()),
        Ok(r#"{"name": "John Smith"}"#.into()),
    ]));

    let result = extractor(&oracle)
        .extract_fields("doc", &[FieldSpec::Name("name".into())])
        .await;

    assert_eq!(
        result.fields().unwrap().get("name"),
        Some(&Some("John Smith".to_string()))
    );
    assert_eq!(oracle.call_count(), 2);
}

#[tokio::test]
async fn persistent_garbage_reports_parse_failure() {
    let oracle = Arc::new(MockOracle::replying("not json at all"));

    let result = extractor(&oracle)
        .extract_fields("doc", &[FieldSpec::Name("name".into())])
        .await;

    assert_eq!(result.error(), Some(PARSE_FAILURE_MESSAGE));
}

#[tokio::test]
async fn key_mismatch_is_re_asked_then_reported() {
    let oracle = Arc::new(MockOracle::replying(r#"{"name": "x", "extra": "y"}"#));
    let specs = vec![FieldSpec::Name("name".into()), FieldSpec::Name("email".into())];

    let result = extractor(&oracle).extract_fields("doc", &specs).await;

    let msg = result.error().expect("mismatch should be an error");
    assert!(msg.contains("missing: email"));
    assert!(msg.contains("unexpected: extra"));
    assert_eq!(oracle.call_count(), 2);
}

#[tokio::test]
async fn key_mismatch_passes_through_when_not_enforced() {
    let oracle = Arc::new(MockOracle::replying(r#"{"name": "x"}"#));
    let extractor = FieldExtractor::new(
        oracle.clone(),
        ExtractionSettings {
            enforce_key_set: false,
            ..settings()
        },
    );

    let result = extractor
        .extract_fields(
            "doc",
            &[FieldSpec::Name("name".into()), FieldSpec::Name("email".into())],
        )
        .await;

    let fields = result.fields().unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(oracle.call_count(), 1);
}

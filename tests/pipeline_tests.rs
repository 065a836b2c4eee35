use casedocs::grouping::{SupportedExtensions, discover_cases};
use casedocs::llm_providers::RequestPurpose;
use casedocs::orchestrator::{NoProgress, Orchestrator};
use casedocs::testing::{ScriptedFailure, ScriptedModel};
use casedocs::types::{Case, Cell, DocumentGroup, PageRef, ProcessingStatus, ResultRow};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use test_utils::{setup_batch, test_config};

fn row<'a>(rows: &'a [ResultRow], base_name: &str) -> &'a ResultRow {
    rows.iter()
        .find(|r| r.base_name == base_name)
        .unwrap_or_else(|| panic!("no row for {base_name}"))
}

#[tokio::test]
async fn test_invoice_extracted_and_unknown_skipped() {
    let batch = setup_batch(&[("C1", &["Invoice 1.pdf", "Invoice 2.pdf", "CRL 1.pdf"])]);
    let model = Arc::new(
        ScriptedModel::new()
            .with_classification("Invoice", "INVOICE", 0.95)
            .with_classification("CRL", "UNKNOWN", 0.4)
            .with_extraction(
                "Invoice",
                &[("INVOICE NO", Some("INV-0042")), ("INVOICE DATE", None)],
            ),
    );
    let config = test_config(2);
    let orchestrator = Orchestrator::new(model.clone(), &config).expect("orchestrator");
    let cases = discover_cases(batch.path()).expect("cases");

    let report = orchestrator
        .run_cases(&cases, &SupportedExtensions::default(), &NoProgress)
        .await;

    assert_eq!(report.group_count(), 2);
    let invoice = row(&report.rows, "Invoice");
    assert_eq!(invoice.status.to_string(), "Extraction Successful");
    assert_eq!(invoice.classified_type.as_deref(), Some("INVOICE"));
    assert_eq!(invoice.get("INVOICE_INVOICE NO_Value"), Cell::text("INV-0042"));
    assert!(invoice.get("INVOICE_INVOICE DATE_Value").is_empty());
    assert_eq!(invoice.get("INVOICE_INVOICE DATE_Confidence"), Cell::Number(0.0));

    let crl = row(&report.rows, "CRL");
    assert_eq!(crl.status.to_string(), "Classified as UNKNOWN");
    assert_eq!(crl.field_columns().count(), 0);

    // Both invoice pages go out in one request, in page order
    let calls = model.calls();
    let invoice_call = calls
        .iter()
        .find(|c| c.purpose == RequestPurpose::Classification && c.base_name == "Invoice")
        .expect("invoice classification call");
    assert_eq!(invoice_call.part_count, 2);
    assert_eq!(invoice_call.case_id, "C1");
    assert_eq!(model.call_count(RequestPurpose::Extraction, "CRL"), 0);
}

#[tokio::test]
async fn test_one_row_per_group_whatever_fails() {
    let batch = setup_batch(&[
        ("C1", &["Invoice 1.pdf", "Blocked 1.pdf", "Bill 1.pdf"]),
        ("C2", &["Letter 1.pdf", "Garbled 1.pdf", "Quota 1.pdf"]),
    ]);
    let model = Arc::new(
        ScriptedModel::new()
            .with_classification("Invoice", "INVOICE", 0.9)
            .with_extraction("Invoice", &[("INVOICE NO", Some("7")), ("INVOICE DATE", Some("2024-01-02"))])
            .with_failure(RequestPurpose::Classification, "Blocked", ScriptedFailure::ContentBlocked)
            .with_classification("Bill", "BL", 0.8)
            .with_classification("Letter", "CRL", 0.7)
            .with_classification_reply("Garbled", "this is not json")
            .with_classification("Quota", "INVOICE", 0.9)
            .with_failure(RequestPurpose::Extraction, "Quota", ScriptedFailure::RateLimited),
    );
    let config = test_config(3);
    let orchestrator = Orchestrator::new(model.clone(), &config).expect("orchestrator");
    let cases = discover_cases(batch.path()).expect("cases");

    let report = orchestrator
        .run_cases(&cases, &SupportedExtensions::default(), &NoProgress)
        .await;

    assert_eq!(report.group_count(), 6);
    let status = |base: &str| row(&report.rows, base).status.clone();
    assert_eq!(status("Invoice"), ProcessingStatus::ExtractionSuccessful);
    assert!(matches!(status("Blocked"), ProcessingStatus::ClassificationFailed(d) if d.contains("content blocked")));
    assert_eq!(status("Bill"), ProcessingStatus::NotConfigured("BL".into()));
    assert_eq!(status("Letter"), ProcessingStatus::NoFieldsConfigured);
    assert!(matches!(status("Garbled"), ProcessingStatus::ClassificationFailed(d) if d.contains("malformed")));
    assert!(matches!(status("Quota"), ProcessingStatus::ExtractionFailed(d) if d.contains("gave up after 3 attempts")));

    // Terminal failures are tried once, transient ones use the whole budget
    assert_eq!(model.call_count(RequestPurpose::Classification, "Blocked"), 1);
    assert_eq!(model.call_count(RequestPurpose::Extraction, "Quota"), 3);
    assert_eq!(model.call_count(RequestPurpose::Extraction, "Bill"), 0);
    assert_eq!(model.call_count(RequestPurpose::Extraction, "Letter"), 0);

    let counts = report.status_counts();
    assert_eq!(counts.extracted, 1);
    assert_eq!(counts.skipped, 2);
    assert_eq!(counts.classification_failed, 2);
    assert_eq!(counts.extraction_failed, 1);
}

#[tokio::test]
async fn test_rows_follow_case_then_group_order() {
    let batch = setup_batch(&[("B", &["Zeta 1.pdf", "Alpha 1.pdf"]), ("A", &["Memo.pdf"])]);
    let model = Arc::new(
        ScriptedModel::new()
            .with_classification("Zeta", "UNKNOWN", 0.2)
            .with_classification("Alpha", "UNKNOWN", 0.2)
            .with_classification("Memo", "UNKNOWN", 0.2),
    );
    let orchestrator = Orchestrator::new(model, &test_config(4)).expect("orchestrator");
    let cases = discover_cases(batch.path()).expect("cases");
    let report = orchestrator
        .run_cases(&cases, &SupportedExtensions::default(), &NoProgress)
        .await;

    let keys: Vec<(String, String)> = report
        .rows
        .iter()
        .map(|r| (r.case_id.clone(), r.base_name.clone()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("A".into(), "Memo".into()),
            ("B".into(), "Alpha".into()),
            ("B".into(), "Zeta".into()),
        ]
    );
}

#[tokio::test]
async fn test_worker_pool_bounds_concurrency() {
    let files: Vec<String> = (0..12).map(|i| format!("Doc{} 1.pdf", char::from(b'A' + i))).collect();
    let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
    let batch = setup_batch(&[("C1", file_refs.as_slice())]);

    let mut model = ScriptedModel::new().with_latency(Duration::from_millis(20));
    for i in 0..12 {
        model = model.with_classification(&format!("Doc{}", char::from(b'A' + i)), "UNKNOWN", 0.1);
    }
    let model = Arc::new(model);
    let orchestrator = Orchestrator::new(model.clone(), &test_config(3)).expect("orchestrator");
    let cases = discover_cases(batch.path()).expect("cases");
    let report = orchestrator
        .run_cases(&cases, &SupportedExtensions::default(), &NoProgress)
        .await;

    assert_eq!(report.group_count(), 12);
    assert!(model.max_in_flight() <= 3, "max in flight was {}", model.max_in_flight());
    assert!(model.max_in_flight() >= 1);
}

#[tokio::test]
async fn test_unreadable_page_fails_only_its_group() {
    let batch = setup_batch(&[("C1", &["Invoice 1.pdf"])]);
    let missing = DocumentGroup {
        case_id: "C1".into(),
        base_name: "Ghost".into(),
        pages: vec![PageRef {
            path: PathBuf::from(batch.path()).join("C1").join("Ghost 1.pdf"),
            file_name: "Ghost 1.pdf".into(),
            page_number: 1,
            mime_type: "application/pdf".into(),
        }],
    };
    let present = DocumentGroup {
        case_id: "C1".into(),
        base_name: "Invoice".into(),
        pages: vec![PageRef {
            path: batch.path().join("C1").join("Invoice 1.pdf"),
            file_name: "Invoice 1.pdf".into(),
            page_number: 1,
            mime_type: "application/pdf".into(),
        }],
    };
    let model = Arc::new(ScriptedModel::new().with_classification("Invoice", "UNKNOWN", 0.3));
    let orchestrator = Orchestrator::new(model.clone(), &test_config(2)).expect("orchestrator");

    let report = orchestrator.run(vec![missing, present], &NoProgress).await;
    assert_eq!(report.group_count(), 2);
    assert!(matches!(
        &report.rows[0].status,
        ProcessingStatus::ClassificationFailed(d) if d.contains("Ghost 1.pdf")
    ));
    assert_eq!(report.rows[1].status, ProcessingStatus::ClassifiedUnknown);
    assert_eq!(model.call_count(RequestPurpose::Classification, "Ghost"), 0);
}

#[tokio::test]
async fn test_partial_extraction_keeps_valid_fields_and_raw() {
    let batch = setup_batch(&[("C1", &["Invoice 1.pdf"])]);
    let reply = r#"{
        "INVOICE NO": {"value": "INV-9", "confidence": 0.9, "reasoning": "header"},
        "INVOICE DATE": {"value": ["2024", "01"], "confidence": 0.5, "reasoning": "split"},
        "NOTES": "stray"
    }"#;
    let model = Arc::new(
        ScriptedModel::new()
            .with_classification("Invoice", "INVOICE", 0.9)
            .with_extraction_reply("Invoice", reply),
    );
    let orchestrator = Orchestrator::new(model, &test_config(1)).expect("orchestrator");
    let cases = discover_cases(batch.path()).expect("cases");
    let report = orchestrator
        .run_cases(&cases, &SupportedExtensions::default(), &NoProgress)
        .await;

    let invoice = &report.rows[0];
    assert_eq!(invoice.status, ProcessingStatus::ExtractionPartial);
    assert_eq!(invoice.get("INVOICE_INVOICE NO_Value"), Cell::text("INV-9"));
    assert!(invoice.get("INVOICE_INVOICE DATE_Value").is_empty());
    assert!(!invoice.get("INVOICE_INVOICE DATE_Raw").is_empty());
    assert_eq!(invoice.get("INVOICE_NOTES_Raw"), Cell::text("\"stray\""));
}

#[tokio::test]
async fn test_empty_case_contributes_no_rows() {
    let batch = setup_batch(&[("C1", &["notes.txt"]), ("C2", &["Invoice 1.pdf"])]);
    let model = Arc::new(ScriptedModel::new().with_classification("Invoice", "UNKNOWN", 0.1));
    let orchestrator = Orchestrator::new(model, &test_config(2)).expect("orchestrator");
    let cases = discover_cases(batch.path()).expect("cases");
    let report = orchestrator
        .run_cases(&cases, &SupportedExtensions::default(), &NoProgress)
        .await;

    assert_eq!(report.group_count(), 1);
    assert_eq!(report.rows[0].case_id, "C2");
}

#[tokio::test]
async fn test_unreadable_case_is_skipped_not_fatal() {
    let batch = setup_batch(&[("C1", &["Invoice 1.pdf"])]);
    let model = Arc::new(
        ScriptedModel::new()
            .with_classification("Invoice", "INVOICE", 0.9)
            .with_extraction("Invoice", &[("INVOICE NO", Some("9")), ("INVOICE DATE", None)]),
    );
    let orchestrator = Orchestrator::new(model, &test_config(2)).expect("orchestrator");
    let mut cases = discover_cases(batch.path()).expect("cases");
    cases.insert(0, Case::new("C0", batch.path().join("removed-before-run")));

    let report = orchestrator
        .run_cases(&cases, &SupportedExtensions::default(), &NoProgress)
        .await;

    assert_eq!(report.group_count(), 1);
    assert_eq!(report.rows[0].case_id, "C1");
    assert_eq!(report.rows[0].status, ProcessingStatus::ExtractionSuccessful);
}

use super::common::*;

use crate::workflows::claim::detector::COMPLETE_APPLICATION_NAME;
use crate::workflows::claim::{detect, ApplicationKind, CoreCategory};

#[test]
fn no_documents_means_no_suggestions() {
    assert!(detect(&[]).is_empty());
}

#[test]
fn an_entry_and_an_export_declaration_form_a_basic_application() {
    let documents = vec![
        document("doc-entry", "cbp_7501", 1),
        document("doc-invoice", "export_invoice", 2),
        document("doc-unrelated", "customs_clearance", 3),
    ];
    let suggestions = detect(&documents);

    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].kind, ApplicationKind::Basic);
    assert_eq!(
        suggestions[0].name,
        "Potential Application: doc-entry.pdf + doc-invoice.pdf"
    );
    assert_eq!(
        suggestions[0].document_ids(),
        vec![doc_id("doc-entry"), doc_id("doc-invoice")]
    );
}

#[test]
fn every_entry_is_paired_with_every_export_declaration() {
    let documents = vec![
        document("doc-entry-1", "cbp_7501", 1),
        document("doc-entry-2", "entry_summary", 2),
        document("doc-export-1", "export_declaration", 3),
        document("doc-export-2", "commercial_invoice_export", 4),
    ];
    let suggestions = detect(&documents);
    assert_eq!(suggestions.len(), 4);
    assert!(suggestions
        .iter()
        .all(|suggestion| suggestion.kind == ApplicationKind::Basic));
}

#[test]
fn complete_application_follows_the_basic_pairs() {
    let mut documents = vec![
        document("doc-entry", "cbp_7501", 1),
        document("doc-invoice", "export_invoice", 2),
    ];
    let basics = detect(&documents);

    documents.push(document("doc-duty", "cbp_7552", 3));
    documents.push(document("doc-bol", "bill_of_lading", 4));
    let suggestions = detect(&documents);

    assert_eq!(suggestions.len(), basics.len() + 1);
    assert_eq!(&suggestions[..basics.len()], basics.as_slice());

    let complete = suggestions.last().expect("complete suggestion");
    assert_eq!(complete.kind, ApplicationKind::Complete);
    assert_eq!(complete.name, COMPLETE_APPLICATION_NAME);
    assert_eq!(
        complete.document_ids(),
        vec![
            doc_id("doc-entry"),
            doc_id("doc-invoice"),
            doc_id("doc-duty"),
            doc_id("doc-bol"),
        ]
    );
}

#[test]
fn complete_application_uses_the_earliest_upload_per_category() {
    let documents = vec![
        document("doc-entry-late", "cbp_7501", 20),
        document("doc-entry-early", "cbp_7501", 1),
        document("doc-invoice", "export_invoice", 2),
        document("doc-duty", "duty_payment_receipt", 3),
        document("doc-awb", "airway_bill", 4),
    ];
    let complete = detect(&documents)
        .into_iter()
        .find(|suggestion| suggestion.kind == ApplicationKind::Complete)
        .expect("complete suggestion");
    assert_eq!(complete.documents[0].id, doc_id("doc-entry-early"));
}

#[test]
fn core_categories_accept_type_codes_case_insensitively() {
    assert!(CoreCategory::ImportEntry.accepts("CBP_7501"));
    assert!(CoreCategory::ExportProof.accepts("airway_bill"));
    assert!(!CoreCategory::DutyProof.accepts("bill_of_lading"));
}

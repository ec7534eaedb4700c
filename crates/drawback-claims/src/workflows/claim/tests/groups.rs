use super::common::*;

use crate::workflows::claim::{detect, ApplicationKind, ClaimError, DocumentGroupRegistry, GroupId};

fn known() -> Vec<crate::workflows::claim::UploadedDocument> {
    vec![
        document("doc-entry", "cbp_7501", 1),
        document("doc-invoice", "export_invoice", 2),
        document("doc-duty", "cbp_7552", 3),
        document("doc-bol", "bill_of_lading", 4),
    ]
}

#[test]
fn groups_need_a_name_and_known_documents() {
    let documents = known();
    let mut registry = DocumentGroupRegistry::new();

    assert!(matches!(
        registry.create("  ", &[doc_id("doc-entry")], &documents),
        Err(ClaimError::Validation { ref field, .. }) if field == "name"
    ));
    assert!(matches!(
        registry.create("Q1 claim", &[], &documents),
        Err(ClaimError::Validation { ref field, .. }) if field == "document_ids"
    ));
    assert!(matches!(
        registry.create("Q1 claim", &[doc_id("doc-missing")], &documents),
        Err(ClaimError::Validation { ref field, .. }) if field == "document_ids"
    ));
    assert!(registry.list().is_empty());
}

#[test]
fn groups_get_sequential_ids_and_deduplicated_members() {
    let documents = known();
    let mut registry = DocumentGroupRegistry::new();

    let first = registry
        .create(
            " Q1 claim ",
            &[doc_id("doc-entry"), doc_id("doc-bol"), doc_id("doc-entry")],
            &documents,
        )
        .expect("valid group");
    let second = registry
        .create("Entry only", &[doc_id("doc-entry")], &documents)
        .expect("overlapping membership allowed");

    assert_eq!(first.id, GroupId(1));
    assert_eq!(first.name, "Q1 claim");
    assert_eq!(first.document_ids, vec![doc_id("doc-entry"), doc_id("doc-bol")]);
    assert_eq!(second.id, GroupId(2));
    assert_eq!(registry.list(), &[first, second][..]);
}

#[test]
fn materialized_suggestion_keeps_being_detected() {
    let documents = known();
    let mut registry = DocumentGroupRegistry::new();
    let suggestions = detect(&documents);
    let complete = suggestions
        .iter()
        .find(|suggestion| suggestion.kind == ApplicationKind::Complete)
        .expect("complete suggestion");

    let group = registry
        .materialize_from_suggestion(complete, &documents)
        .expect("materialized");
    assert_eq!(group.name, complete.name);
    assert_eq!(group.document_ids, complete.document_ids());

    assert_eq!(detect(&documents), suggestions);
}

#[test]
fn workflow_materializes_by_suggestion_index() {
    let mut workflow = workflow();
    workflow.replace_documents(known());
    assert_eq!(workflow.suggestions().len(), 2);

    let group = workflow.materialize_suggestion(1).expect("complete suggestion");
    assert_eq!(group.document_ids.len(), 4);
    assert_eq!(workflow.groups().len(), 1);
    assert_eq!(workflow.suggestions().len(), 2);

    assert!(matches!(
        workflow.materialize_suggestion(7),
        Err(ClaimError::NotFound { kind: "suggestion", .. })
    ));
}

//! End-to-end claim scenarios driven through the public session API against the offline backend.

mod common {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use drawback_claims::backends::OfflineBackend;
    use drawback_claims::workflows::claim::{
        ClaimId, ClaimSession, Collaborators, CompanyInfo, RequirementCatalog, SessionSettings,
    };

    pub(super) const IMPORTS_CSV: &str =
        "entry_number,product_id,import_date,quantity,duty_paid\n\
E-1001,WIDGET-A,2024-01-15,100,50.00\n\
E-1002,WIDGET-B,2024-02-20,40,40.00\n\
E-1003,WIDGET-C,2024-03-05,25,31.72\n";

    pub(super) const EXPORTS_CSV: &str =
        "export_reference,product_id,export_date,quantity,destination\n\
X-2001,WIDGET-A,2024-04-01,60,CA\n\
X-2002,WIDGET-B,2023-12-01,10,MX\n";

    pub(super) fn session() -> ClaimSession {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date");
        let backend = Arc::new(OfflineBackend::new().with_today(today));
        ClaimSession::new(
            ClaimId("claim-000001".to_string()),
            RequirementCatalog::standard(),
            Collaborators::from_backend(backend),
            SessionSettings::default(),
        )
    }

    pub(super) fn company() -> CompanyInfo {
        CompanyInfo {
            company_name: "Harbor Trading Co".to_string(),
            company_address: "12 Pier Road".to_string(),
            company_city: "Long Beach".to_string(),
            company_state: "CA".to_string(),
            company_zip: "90802".to_string(),
            company_ein: "12-3456789".to_string(),
            contact_name: "Dana Ortiz".to_string(),
            contact_phone: "555-0100".to_string(),
            contact_email: "dana@harbor.example".to_string(),
        }
    }
}

use common::*;
use drawback_claims::workflows::claim::session::DocumentSubmission;
use drawback_claims::workflows::claim::{Trigger, UploadFile, WizardStep};

#[tokio::test]
async fn import_only_claim_runs_from_welcome_to_a_generated_form() {
    let session = session();
    session.fire(Trigger::Start).await.expect("start");
    session.fire(Trigger::Continue).await.expect("instructions read");

    let view = session
        .upload_imports(UploadFile::new("imports_q1.csv", IMPORTS_CSV))
        .await
        .expect("imports uploaded");
    assert_eq!(view.step, WizardStep::UploadExports);
    assert!(view.error.is_none());

    let view = session
        .fire(Trigger::SkipExports)
        .await
        .expect("import-only analysis");
    let analysis = view.analysis.expect("analysis available");
    assert_eq!(analysis.eligible_transactions, 3);
    assert!((analysis.potential_refund - 120.50).abs() < 1e-9);
    assert!(analysis.unmatched_imports.is_empty());

    let view = session.fire(Trigger::Continue).await.expect("documents step");
    assert_eq!(view.step, WizardStep::UploadDocuments);
    assert!(!view.documents.complete);
    assert_eq!(view.documents.upload_missing, 4);
    assert!(!view.available_triggers.contains(&Trigger::Continue));

    for (filename, document_type) in [
        ("certificate_of_delivery.pdf", None),
        ("CBP-7501 entry summary.pdf", None),
        ("clearance_0042.pdf", Some("customs_clearance")),
        ("bill_of_lading_MSCU.png", None),
    ] {
        let view = session
            .upload_document(DocumentSubmission {
                file: UploadFile::new(filename, b"scan".to_vec()),
                document_type: document_type.map(str::to_string),
                tags: None,
            })
            .await
            .expect("document uploaded");
        assert!(view.error.is_none(), "{filename}: {:?}", view.error);
    }

    let view = session.view();
    assert!(!view.documents.complete);
    assert_eq!(view.documents.upload_missing, 0);
    assert_eq!(view.documents.report.missing_keys(), vec!["DRAWBACK_ENTRY"]);
    assert!(!view.available_triggers.contains(&Trigger::Continue));
    assert!(session.fire(Trigger::Continue).await.is_err());

    let view = session
        .fire(Trigger::OverrideDocuments)
        .await
        .expect("entry form is produced by the generator");
    assert_eq!(view.step, WizardStep::GenerateForm);
    assert!(view.documents.override_granted);

    let view = session.generate_form(company()).await.expect("form generated");
    assert_eq!(view.step, WizardStep::Completed);
    assert_eq!(view.progress_percent, 100);
    assert_eq!(
        view.generated_form.map(|form| form.form_path).as_deref(),
        Some("forms/cbp_7551_harbor_trading_co_001.pdf")
    );

    let view = session
        .fire(Trigger::StartNewClaim)
        .await
        .expect("new claim");
    assert_eq!(view.step, WizardStep::Welcome);
    assert!(view.import_id.is_none());
    assert!(view.analysis.is_none());
    assert_eq!(view.documents.documents.len(), 5);
}

#[tokio::test]
async fn paired_claim_only_refunds_imports_with_a_later_export() {
    let session = session();
    session.fire(Trigger::Start).await.expect("start");
    session
        .fire(Trigger::SkipInstructions)
        .await
        .expect("skip instructions");
    session
        .upload_imports(UploadFile::new("imports_q1.csv", IMPORTS_CSV))
        .await
        .expect("imports uploaded");

    let view = session
        .upload_exports(UploadFile::new("exports_q1.csv", EXPORTS_CSV))
        .await
        .expect("exports uploaded");

    assert_eq!(view.step, WizardStep::Analysis);
    assert!(!view.import_only);
    let analysis = view.analysis.expect("analysis available");
    assert_eq!(analysis.eligible_transactions, 1);
    assert!((analysis.potential_refund - 49.50).abs() < 1e-9);
    assert_eq!(analysis.matches[0].product_id, "WIDGET-A");
    assert_eq!(analysis.unmatched_imports.len(), 2);
    assert!(analysis
        .unmatched_imports
        .iter()
        .all(|unmatched| unmatched.eligible_for_future_export));
    assert_eq!(
        analysis.results_file.as_deref(),
        Some("results/drawback_analysis_doc_000001_doc_000002.csv")
    );
}

#[tokio::test]
async fn malformed_import_dataset_surfaces_as_an_analysis_error() {
    let session = session();
    session.fire(Trigger::Start).await.expect("start");
    session.fire(Trigger::Continue).await.expect("instructions");
    session
        .upload_imports(UploadFile::new(
            "imports_bad.csv",
            "entry_number,product_id,import_date,quantity,duty_paid\nE-1,W,yesterday,1,1.00\n",
        ))
        .await
        .expect("upload accepted");

    let view = session.fire(Trigger::SkipExports).await.expect("moved");
    assert_eq!(view.step, WizardStep::Analysis);
    let error = view.error.expect("analysis error");
    assert!(!error.retryable);
    assert!(view.analysis.is_none());

    let view = session.dismiss_error();
    assert!(view.error.is_none());
}

#[tokio::test]
async fn returning_to_the_analysis_step_uses_the_session_cache() {
    let session = session();
    session.fire(Trigger::Start).await.expect("start");
    session.fire(Trigger::Continue).await.expect("instructions");
    session
        .upload_imports(UploadFile::new("imports_q1.csv", IMPORTS_CSV))
        .await
        .expect("imports uploaded");
    session.fire(Trigger::SkipExports).await.expect("analysis");

    session.go_back().await.expect("back to exports");
    let view = session.jump_to(WizardStep::Analysis).await.expect("forward again");

    assert!(view.analysis.is_some());
    assert!(view.in_flight.is_idle());
}

use chrono::{Local, NaiveDate};
use clap::Args;
use drawback_claims::backends::OfflineBackend;
use drawback_claims::error::AppError;
use drawback_claims::workflows::claim::session::DocumentSubmission;
use drawback_claims::workflows::claim::{
    ApplicationKind, ClaimId, ClaimSession, ClaimView, Collaborators, CompanyInfo,
    RequirementCatalog, SessionSettings, Trigger, UploadFile,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SAMPLE_IMPORTS: &str = "entry_number,product_id,import_date,quantity,duty_paid\n\
E-1001,WIDGET-A,2024-01-15,100,50.00\n\
E-1002,WIDGET-B,2024-02-20,40,40.00\n\
E-1003,WIDGET-C,2024-03-05,25,31.72\n";

/// Supporting paperwork uploaded during the demo; types are detected from the names.
const SAMPLE_DOCUMENTS: [&str; 4] = [
    "cbp_7552_certificate.pdf",
    "CBP-7501 entry summary.pdf",
    "customs_clearance_0042.pdf",
    "bill_of_lading_MSCU.pdf",
];

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Import dataset CSV. Defaults to a bundled three-entry sample.
    #[arg(long)]
    pub(crate) imports: Option<PathBuf>,
    /// Export dataset CSV. Omit for an import-only claim.
    #[arg(long)]
    pub(crate) exports: Option<PathBuf>,
    /// Analysis date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Company name printed on the generated drawback entry.
    #[arg(long, default_value = "Harbor Trading Co")]
    pub(crate) company_name: String,
    /// Print the final claim summary as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
struct DemoSummary {
    claim_id: String,
    eligible_transactions: u32,
    potential_refund: f64,
    documents: usize,
    groups: usize,
    form_path: Option<String>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        imports,
        exports,
        today,
        company_name,
        json,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let backend = Arc::new(OfflineBackend::new().with_today(today));
    let session = ClaimSession::new(
        ClaimId("demo-claim".to_string()),
        RequirementCatalog::standard(),
        Collaborators::from_backend(backend),
        SessionSettings::default(),
    );

    println!("Duty drawback claim walkthrough (analysis date {today})");
    announce(&session.view());
    announce(&session.fire(Trigger::Start).await?);
    announce(&session.fire(Trigger::Continue).await?);

    let import_file = match imports {
        Some(path) => read_upload(&path, "imports.csv")?,
        None => UploadFile::new("sample_imports.csv", SAMPLE_IMPORTS),
    };
    let view = session.upload_imports(import_file).await?;
    if halted(&view) {
        return Ok(());
    }
    announce(&view);

    let view = match exports {
        Some(path) => {
            let file = read_upload(&path, "exports.csv")?;
            session.upload_exports(file).await?
        }
        None => session.fire(Trigger::SkipExports).await?,
    };
    if halted(&view) {
        return Ok(());
    }
    announce(&view);
    render_analysis(&view);

    let view = session.fire(Trigger::Continue).await?;
    announce(&view);
    println!(
        "- {} of {} document categories missing",
        view.documents.report.missing_count, view.documents.report.total_required
    );

    for filename in SAMPLE_DOCUMENTS {
        let view = session
            .upload_document(DocumentSubmission {
                file: UploadFile::new(filename, b"%PDF-1.7 demo".to_vec()),
                document_type: None,
                tags: Some("demo".to_string()),
            })
            .await?;
        if halted(&view) {
            return Ok(());
        }
        if let Some(document) = view
            .documents
            .documents
            .iter()
            .find(|document| document.filename == filename)
        {
            println!("  uploaded {} as {}", document.filename, document.document_type);
        }
    }

    let suggestions = session.suggestions();
    println!("- {} potential application(s) detected", suggestions.len());
    if let Some(index) = suggestions
        .iter()
        .position(|suggestion| suggestion.kind == ApplicationKind::Complete)
    {
        let group = session.materialize_suggestion(index)?;
        println!(
            "  saved {} as {} with {} documents",
            group.name,
            group.id,
            group.document_ids.len()
        );
    }

    let view = session.view();
    let report = &view.documents.report;
    let advance = if report.is_complete() {
        Trigger::Continue
    } else if view.documents.upload_missing == 0 {
        println!(
            "- still missing {}; the generator produces these, continuing by override",
            report.missing_keys().join(", ")
        );
        Trigger::OverrideDocuments
    } else {
        eprintln!(
            "Documents incomplete: {} still need an upload",
            view.documents.upload_missing
        );
        return Ok(());
    };
    announce(&session.fire(advance).await?);

    let view = session.generate_form(demo_company(company_name)).await?;
    if halted(&view) {
        return Ok(());
    }
    announce(&view);
    if let Some(form) = &view.generated_form {
        println!("- drawback entry written to {}", form.form_path);
    }

    if json {
        let summary = DemoSummary {
            claim_id: view.claim_id.to_string(),
            eligible_transactions: view
                .analysis
                .as_ref()
                .map_or(0, |analysis| analysis.eligible_transactions),
            potential_refund: view
                .analysis
                .as_ref()
                .map_or(0.0, |analysis| analysis.potential_refund),
            documents: view.documents.documents.len(),
            groups: view.documents.groups.len(),
            form_path: view.generated_form.as_ref().map(|form| form.form_path.clone()),
        };
        let rendered = serde_json::to_string_pretty(&summary)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        println!("{rendered}");
    }

    Ok(())
}

fn read_upload(path: &Path, fallback_name: &str) -> Result<UploadFile, AppError> {
    let content = std::fs::read(path)?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(fallback_name);
    Ok(UploadFile::new(filename, content))
}

fn announce(view: &ClaimView) {
    println!(
        "\n[{}/{}] {} ({}%)",
        view.step.index() + 1,
        view.steps.len(),
        view.step_label,
        view.progress_percent
    );
}

fn halted(view: &ClaimView) -> bool {
    match &view.error {
        Some(error) => {
            eprintln!(
                "{} failed during {:?}: {}",
                view.step_label, error.operation, error.message
            );
            true
        }
        None => false,
    }
}

fn render_analysis(view: &ClaimView) {
    let Some(analysis) = &view.analysis else {
        println!("- analysis pending");
        return;
    };
    let mode = if view.import_only {
        "import-only"
    } else {
        "paired"
    };
    println!(
        "- {} eligible transaction(s) | potential refund ${:.2} ({mode})",
        analysis.eligible_transactions, analysis.potential_refund
    );
    for matched in &analysis.matches {
        println!(
            "  {} imported {} | duty ${:.2} -> refund ${:.2}",
            matched.product_id, matched.import_date, matched.duty_paid, matched.refund_amount
        );
    }
    for unmatched in &analysis.unmatched_imports {
        let note = if unmatched.eligible_for_future_export {
            "awaiting export"
        } else {
            "outside the claim window"
        };
        println!(
            "  {} imported {} | {note}",
            unmatched.product_id, unmatched.import_date
        );
    }
}

fn demo_company(company_name: String) -> CompanyInfo {
    CompanyInfo {
        company_name,
        company_address: "12 Pier Road".to_string(),
        company_city: "Long Beach".to_string(),
        company_state: "CA".to_string(),
        company_zip: "90802".to_string(),
        company_ein: "12-3456789".to_string(),
        contact_name: "Dana Ortiz".to_string(),
        contact_phone: "555-0100".to_string(),
        contact_email: "claims@harbor.example".to_string(),
    }
}

//! Drawback eligibility rules applied by the offline backend.

use chrono::{Months, NaiveDate};

use crate::workflows::claim::{
    AnalysisResult, DrawbackMatch, ExportRecord, ImportRecord, UnmatchedImport,
};

/// Imports older than this are outside the claim window.
pub const ELIGIBILITY_WINDOW_MONTHS: u32 = 60;
/// Share of duty refunded on an eligible import.
pub const REFUND_RATE: f64 = 0.99;

pub fn refund_for(duty_paid: f64) -> f64 {
    round_cents(duty_paid * REFUND_RATE)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn window_start(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_months(Months::new(ELIGIBILITY_WINDOW_MONTHS))
        .unwrap_or(NaiveDate::MIN)
}

/// Evaluate imports against the window and, when exports are supplied, against a later export
/// of the same product.
///
/// Without exports every in-window import is a refundable match. With exports, in-window
/// imports lacking a later export are reported as unmatched but still eligible for a future
/// export.
pub fn scan(
    imports: &[ImportRecord],
    exports: Option<&[ExportRecord]>,
    today: NaiveDate,
) -> AnalysisResult {
    let cutoff = window_start(today);
    let mut matches = Vec::new();
    let mut unmatched_imports = Vec::new();

    for import in imports {
        let in_window = import.import_date >= cutoff;
        let export = exports.and_then(|exports| earliest_later_export(exports, import));
        let refundable = in_window && (exports.is_none() || export.is_some());

        if !refundable {
            unmatched_imports.push(UnmatchedImport {
                product_id: import.product_id.clone(),
                import_date: import.import_date,
                quantity: import.quantity,
                duty_paid: import.duty_paid,
                eligible_for_future_export: in_window,
            });
            continue;
        }

        matches.push(DrawbackMatch {
            product_id: import.product_id.clone(),
            import_date: import.import_date,
            import_qty: import.quantity,
            duty_paid: import.duty_paid,
            export_date: export.map(|export| export.export_date),
            export_qty: export.map(|export| export.quantity),
            refund_amount: refund_for(import.duty_paid),
        });
    }

    let potential_refund = round_cents(matches.iter().map(|m| m.refund_amount).sum());
    AnalysisResult {
        eligible_transactions: matches.len() as u32,
        potential_refund,
        matches,
        unmatched_imports,
        results_file: None,
    }
}

fn earliest_later_export<'a>(
    exports: &'a [ExportRecord],
    import: &ImportRecord,
) -> Option<&'a ExportRecord> {
    exports
        .iter()
        .filter(|export| {
            export.product_id == import.product_id && export.export_date > import.import_date
        })
        .min_by_key(|export| export.export_date)
}

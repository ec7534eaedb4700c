use chrono::NaiveDate;
use drawback_claims::backends::{HttpBackend, OfflineBackend};
use drawback_claims::config::BackendConfig;
use drawback_claims::error::AppError;
use drawback_claims::workflows::claim::{ClaimError, Collaborators};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BackendKind {
    Offline,
    Http,
}

impl BackendKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            BackendKind::Offline => "offline",
            BackendKind::Http => "http",
        }
    }
}

/// Select the collaborator backend: the remote service when a URL is configured, otherwise the
/// in-process one.
pub(crate) fn build_collaborators(
    backend: &BackendConfig,
    timeout: Duration,
) -> Result<(Collaborators, BackendKind), AppError> {
    match &backend.base_url {
        Some(url) => {
            let client = HttpBackend::new(url.clone(), timeout).map_err(ClaimError::from)?;
            Ok((Collaborators::from_backend(Arc::new(client)), BackendKind::Http))
        }
        None => Ok((
            Collaborators::from_backend(Arc::new(OfflineBackend::new())),
            BackendKind::Offline,
        )),
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

//! Short-link handler: JSON submissions redirected on visit.
//!
//! `create` expects a body of `{"url": "..."}` with an http/https URL and
//! attaches it to the record; `visit` hands the transport a redirect to the
//! stored URL.

use anyhow::anyhow;
use async_trait::async_trait;
use hostbox_core::ContentRecord;
use serde_json::Value;

use super::PluginError;
use crate::config::ServiceConfig;
use crate::service::events::{
    CreateHandler, CreateHookResult, CreateOutcome, CreateRequest, EventBus, HandlerError,
    VisitHandler, VisitHookResult, VisitOutcome,
};

pub const NAME: &str = "short-link";

/// Registers the short-link hooks. Needs no handler-specific config.
///
/// # Errors
///
/// Infallible today; kept fallible for parity with other handlers.
pub fn install(_config: &ServiceConfig, bus: &mut EventBus) -> Result<(), PluginError> {
    bus.on_create(ShortLinkCreate);
    bus.on_visit(ShortLinkVisit);
    Ok(())
}

/// Case-insensitive http/https scheme check with a non-empty remainder.
fn is_http_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

fn rejected(error: &str) -> HandlerError {
    HandlerError::Rejected {
        status: 400,
        error: error.to_string(),
    }
}

struct ShortLinkCreate;

#[async_trait]
impl CreateHandler for ShortLinkCreate {
    async fn on_create(
        &self,
        record: &mut ContentRecord,
        request: &CreateRequest,
    ) -> CreateHookResult {
        let body: Value = serde_json::from_slice(&request.payload)
            .map_err(|_| rejected("Body is not valid JSON!"))?;
        let Some(url) = body.get("url").and_then(Value::as_str) else {
            return Err(rejected("URL not provided!"));
        };
        if !is_http_url(url) {
            return Err(rejected("URL is not HTTP!"));
        }

        record.set_extra("url", url);
        Ok(Some(CreateOutcome::Created {
            kind: "short link".to_string(),
        }))
    }
}

struct ShortLinkVisit;

#[async_trait]
impl VisitHandler for ShortLinkVisit {
    async fn on_visit(&self, record: &ContentRecord) -> VisitHookResult {
        let url = record.extra_str("url").ok_or_else(|| {
            HandlerError::Internal(anyhow!("short link record '{}' has no url", record.id))
        })?;
        Ok(Some(VisitOutcome::Redirect {
            url: url.to_string(),
        }))
    }
}

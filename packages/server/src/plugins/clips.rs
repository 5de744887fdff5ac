//! Clip handler: binary payloads stored as files on disk.
//!
//! `create` writes the payload under the service's clips directory, naming
//! the file after the record id plus an extension derived from a `video/*`
//! Content-Type. `visit` hands the transport the stored path and MIME type to
//! stream back.

use std::path::PathBuf;

use anyhow::anyhow;
use async_trait::async_trait;
use hostbox_core::ContentRecord;

use super::PluginError;
use crate::config::ServiceConfig;
use crate::service::events::{
    CreateHandler, CreateHookResult, CreateOutcome, CreateRequest, EventBus, HandlerError,
    VisitHandler, VisitHookResult, VisitOutcome,
};

pub const NAME: &str = "clips";

/// Registers the clip hooks, creating the clips directory if absent.
///
/// # Errors
///
/// Requires a `clipsLocation` key in the service config; fails if the
/// directory cannot be created.
pub fn install(config: &ServiceConfig, bus: &mut EventBus) -> Result<(), PluginError> {
    let location = config
        .extra_str("clipsLocation")
        .ok_or(PluginError::MissingKey {
            handler: NAME,
            key: "clipsLocation",
        })?;
    let clips_dir = config.resolve(location);
    std::fs::create_dir_all(&clips_dir).map_err(|source| PluginError::Setup {
        handler: NAME,
        source,
    })?;

    bus.on_create(ClipsCreate { clips_dir });
    bus.on_visit(ClipsVisit);
    Ok(())
}

/// The `video/mp4` → `mp4` extension rule. Non-video types get no extension.
fn video_extension(content_type: &str) -> Option<&str> {
    content_type
        .strip_prefix("video/")
        .filter(|ext| !ext.is_empty())
}

struct ClipsCreate {
    clips_dir: PathBuf,
}

#[async_trait]
impl CreateHandler for ClipsCreate {
    async fn on_create(
        &self,
        record: &mut ContentRecord,
        request: &CreateRequest,
    ) -> CreateHookResult {
        let file_name = match video_extension(&request.content_type) {
            Some(ext) => format!("{}.{ext}", record.id),
            None => record.id.clone(),
        };
        let path = self.clips_dir.join(file_name);
        tokio::fs::write(&path, &request.payload).await?;

        record.set_extra("filePath", path.to_string_lossy().as_ref());
        record.set_extra("mimeType", request.content_type.clone());
        Ok(Some(CreateOutcome::Created {
            kind: "clip".to_string(),
        }))
    }
}

struct ClipsVisit;

#[async_trait]
impl VisitHandler for ClipsVisit {
    async fn on_visit(&self, record: &ContentRecord) -> VisitHookResult {
        let path = record
            .extra_str("filePath")
            .map(PathBuf::from)
            .ok_or_else(|| {
                HandlerError::Internal(anyhow!("clip record '{}' has no filePath", record.id))
            })?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(HandlerError::Internal(anyhow!(
                "clip file missing: {}",
                path.display()
            )));
        }
        let mime = record
            .extra_str("mimeType")
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(Some(VisitOutcome::File { path, mime }))
    }
}

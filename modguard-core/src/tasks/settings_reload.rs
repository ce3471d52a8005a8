// File: src/tasks/settings_reload.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error};
use crate::Error;
use crate::moderation::{FilterPipeline, FilterSettings};

/// Reloads `path` into the pipeline when its mtime differs from `last_seen`.
///
/// On a read or parse failure the pipeline keeps its current settings and
/// `last_seen` is left alone, so the file is retried on the next pass.
pub async fn reload_if_changed(
    pipeline: &FilterPipeline,
    path: &Path,
    last_seen: &mut Option<SystemTime>,
) -> Result<bool, Error> {
    let modified = tokio::fs::metadata(path).await?.modified()?;
    if *last_seen == Some(modified) {
        return Ok(false);
    }

    let raw = tokio::fs::read_to_string(path).await?;
    let settings = FilterSettings::from_json_str(&raw)?;
    pipeline.reload(settings);
    *last_seen = Some(modified);
    Ok(true)
}

/// Spawns a background task that watches the settings file and hot-reloads it.
pub fn spawn_settings_reload_task(
    pipeline: Arc<FilterPipeline>,
    path: PathBuf,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_seen = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        loop {
            sleep(interval).await;
            match reload_if_changed(&pipeline, &path, &mut last_seen).await {
                Ok(true) => debug!("settings reload: applied {}", path.display()),
                Ok(false) => {}
                Err(e) => error!("settings reload: keeping previous settings, {} failed: {}", path.display(), e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reload_then_unchanged() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "length": {{ "maxChars": 10 }} }}"#).unwrap();

        let pipeline = FilterPipeline::new(FilterSettings::default());
        let mut last_seen = None;

        assert!(reload_if_changed(&pipeline, file.path(), &mut last_seen).await.unwrap());
        let settings = pipeline.settings();
        assert_eq!(settings.length.as_ref().map(|c| c.max_chars), Some(10));
        assert!(settings.spam.is_none());

        assert!(!reload_if_changed(&pipeline, file.path(), &mut last_seen).await.unwrap());
    }

    #[tokio::test]
    async fn test_broken_file_keeps_previous_settings() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ nope").unwrap();

        let pipeline = FilterPipeline::new(FilterSettings::default());
        let mut last_seen = None;

        assert!(reload_if_changed(&pipeline, file.path(), &mut last_seen).await.is_err());
        assert!(last_seen.is_none());
        assert_eq!(*pipeline.settings(), FilterSettings::default());
    }
}

use std::path::{Path, PathBuf};
use tracing::info;

use crate::{EmbeddingConfig, EmbeddingError};

/// Ensures `tokenizer.json` exists locally, downloading it once when a URL is configured.
pub(crate) async fn resolve_tokenizer_path(
    cfg: &EmbeddingConfig,
) -> Result<PathBuf, EmbeddingError> {
    ensure_local_file(&cfg.tokenizer_path, cfg.tokenizer_url.as_deref(), || {
        EmbeddingError::ResourceNotFound(cfg.tokenizer_path.display().to_string())
    })
    .await
}

/// Returns `target` if it already exists, otherwise attempts to download `remote_url`.
async fn ensure_local_file<F>(
    target: &Path,
    remote_url: Option<&str>,
    on_missing: F,
) -> Result<PathBuf, EmbeddingError>
where
    F: FnOnce() -> EmbeddingError,
{
    if target.exists() {
        return Ok(target.to_path_buf());
    }

    if let Some(url) = remote_url {
        download_to_path(target, url).await?;
        return Ok(target.to_path_buf());
    }

    Err(on_missing())
}

/// Downloads `url` into `target`, creating parent directories as needed.
async fn download_to_path(target: &Path, url: &str) -> Result<(), EmbeddingError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    info!(url, target = %target.display(), "asset_download");
    let response = reqwest::get(url)
        .await
        .map_err(|e| EmbeddingError::Download(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EmbeddingError::Download(format!(
            "unexpected status {status} while fetching {url}"
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| EmbeddingError::Download(e.to_string()))?;

    tokio::fs::write(target, &bytes).await?;
    Ok(())
}

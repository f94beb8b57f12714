//! Utility functions
//!
use std::{
    fs::File,
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Result};
use reqwest::Client;

/// Download a file from a URL to a given filepath.
pub async fn download_file(
    client: &Client,
    url: &str,
    filepath: impl AsRef<std::path::Path>,
) -> Result<()> {
    let resp = client.get(url).send().await?.error_for_status()?;

    // Only complete downloads end up at `filepath`
    let filepath = filepath.as_ref();
    let partial = filepath.with_extension("part");
    {
        let mut file = File::create(&partial)?;
        let mut content = Cursor::new(resp.bytes().await?);
        std::io::copy(&mut content, &mut file)?;
    }
    std::fs::rename(&partial, filepath)?;

    Ok(())
}

/// Directory where downloaded models are cached.
pub fn model_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("gesture_server"))
        .ok_or_else(|| anyhow!("no cache directory available"))
}

/// Locate a model file, downloading it if necessary.
///
/// A file at `path` is used as is. Otherwise the file of the same name in the
/// model cache is used, and downloaded from `url` first if missing.
pub async fn ensure_model(path: &Path, url: Option<&str>) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_owned());
    }

    let Some(file_name) = path.file_name() else {
        bail!("invalid model path {}", path.display());
    };
    let cached = model_cache_dir()?.join(file_name);
    if cached.is_file() {
        log::info!("Using cached model {}", cached.display());
        return Ok(cached);
    }

    let Some(url) = url else {
        bail!(
            "model {} not found and no download URL given",
            path.display()
        );
    };

    if let Some(dir) = cached.parent() {
        std::fs::create_dir_all(dir)?;
    }
    log::info!("Downloading model from {} to {}", url, cached.display());
    download_file(&Client::new(), url, &cached).await?;

    Ok(cached)
}

#[cfg(test)]
mod test {

    use super::*;

    #[tokio::test]
    async fn existing_model_is_used_directly() -> Result<()> {
        let path = std::env::temp_dir().join("gesture_server_existing_model.onnx");
        std::fs::write(&path, b"model")?;

        assert_eq!(ensure_model(&path, None).await?, path);

        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[tokio::test]
    async fn missing_model_without_url_fails() {
        let path = Path::new("gesture_server_missing_model_3f9a.onnx");
        assert!(ensure_model(path, None).await.is_err());
    }
}

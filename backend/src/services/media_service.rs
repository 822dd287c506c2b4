//! Storage for uploaded movie images and their resized variants.
//!
//! Originals live under the media root; derivatives are produced lazily by a
//! `DerivativeGenerator` the first time their URL is requested and cached
//! under `CACHE/images/`.

use crate::config::Config;
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
const CACHE_DIR: &str = "CACHE/images";

/// Where an uploaded original is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Poster,
    Backdrop,
}

impl ImageKind {
    fn directory(self) -> &'static str {
        match self {
            ImageKind::Poster => "movies/posters",
            ImageKind::Backdrop => "movies/backdrops",
        }
    }
}

/// Target size and encoding of a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: &'static str,
    pub quality: u8,
}

pub const POSTER_MOBILE: ImageSpec = ImageSpec {
    name: "poster_mobile",
    width: 160,
    height: 240,
    format: "webp",
    quality: 80,
};

pub const POSTER_DESKTOP: ImageSpec = ImageSpec {
    name: "poster_desktop",
    width: 220,
    height: 330,
    format: "webp",
    quality: 80,
};

pub const BACKDROP_LARGE: ImageSpec = ImageSpec {
    name: "backdrop_large",
    width: 1920,
    height: 1080,
    format: "webp",
    quality: 85,
};

/// Produces a derivative of `source` at `target` matching `spec`.
#[async_trait]
pub trait DerivativeGenerator: Send + Sync {
    /// File extension the generator writes for `spec` given the source file.
    fn output_extension(&self, source: &Path, spec: &ImageSpec) -> String;

    async fn generate(&self, source: &Path, target: &Path, spec: &ImageSpec) -> ServiceResult<()>;
}

/// Serves the original bytes for every derivative.
///
/// Used when no image pipeline is plugged in; the derivative keeps the
/// source extension since its content is not re-encoded.
pub struct CopyGenerator;

#[async_trait]
impl DerivativeGenerator for CopyGenerator {
    fn output_extension(&self, source: &Path, _spec: &ImageSpec) -> String {
        source
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("bin")
            .to_ascii_lowercase()
    }

    async fn generate(&self, source: &Path, target: &Path, _spec: &ImageSpec) -> ServiceResult<()> {
        tokio::fs::copy(source, target).await.map_err(|e| {
            ServiceError::internal_error(format!("Failed to write derivative {}: {e}", target.display()))
        })?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct MediaService {
    root: PathBuf,
    base_url: String,
    generator: Arc<dyn DerivativeGenerator>,
}

impl MediaService {
    pub fn new(config: &Config) -> Self {
        Self::with_generator(config, Arc::new(CopyGenerator))
    }

    pub fn with_generator(config: &Config, generator: Arc<dyn DerivativeGenerator>) -> Self {
        Self {
            root: config.media_root.clone(),
            base_url: config.media_url.clone(),
            generator,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Saves an uploaded image under a fresh name.
    ///
    /// # Arguments
    /// * `kind` - Poster or backdrop, selects the storage directory
    /// * `filename` - Client-supplied file name, only its extension is kept
    /// * `content` - Raw file bytes
    ///
    /// # Returns
    /// The stored file's path relative to the media root
    pub async fn store_upload(
        &self,
        kind: ImageKind,
        filename: &str,
        content: &[u8],
    ) -> ServiceResult<String> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| {
                ServiceError::validation(format!(
                    "Unsupported image type for '{filename}'. Allowed: {}",
                    ALLOWED_EXTENSIONS.join(", ")
                ))
            })?;

        let relative = format!("{}/{}.{}", kind.directory(), Uuid::now_v7(), extension);
        let target = self.root.join(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ServiceError::internal_error(format!("Failed to create media directory: {e}"))
            })?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| ServiceError::internal_error(format!("Failed to store upload: {e}")))?;

        tracing::info!("Stored {:?} upload at {}", kind, relative);
        Ok(relative)
    }

    /// Removes stored uploads that ended up unreferenced.
    pub async fn discard(&self, stored: &[String]) {
        for relative in stored {
            match tokio::fs::remove_file(self.root.join(relative)).await {
                Ok(()) => tracing::info!("Discarded upload {}", relative),
                Err(e) => tracing::warn!("Failed to discard upload {}: {}", relative, e),
            }
        }
    }

    /// Public URL of a stored original, or an empty string when there is none.
    pub fn original_url(&self, relative: &str) -> String {
        if relative.is_empty() {
            return String::new();
        }
        format!("{}{}", self.base_url, relative)
    }

    /// Public URL of a derivative, generating it on first use.
    ///
    /// Returns an empty string when the movie has no such image or the
    /// original file is missing.
    pub async fn derivative_url(&self, relative: &str, spec: &ImageSpec) -> ServiceResult<String> {
        if relative.is_empty() {
            return Ok(String::new());
        }

        let source = self.root.join(relative);
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            tracing::warn!("Original image {} is missing, skipping {}", relative, spec.name);
            return Ok(String::new());
        }

        let derivative = self.derivative_path(relative, &source, spec);
        let target = self.root.join(&derivative);

        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ServiceError::internal_error(format!("Failed to create cache directory: {e}"))
                })?;
            }
            // concurrent first requests each render privately, the rename publishes one
            let staging = target.with_extension(format!("{}.tmp", Uuid::now_v7()));
            if let Err(e) = self.generator.generate(&source, &staging, spec).await {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e);
            }
            tokio::fs::rename(&staging, &target).await.map_err(|e| {
                ServiceError::internal_error(format!("Failed to publish derivative {derivative}: {e}"))
            })?;
            tracing::info!("Generated {} derivative {}", spec.name, derivative);
        }

        Ok(format!("{}{}", self.base_url, derivative))
    }

    fn derivative_path(&self, relative: &str, source: &Path, spec: &ImageSpec) -> String {
        // movies/posters/abc.jpg -> CACHE/images/movies/posters/abc/poster_mobile.<ext>
        let without_extension = match relative.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => relative,
        };
        format!(
            "{CACHE_DIR}/{without_extension}/{}.{}",
            spec.name,
            self.generator.output_extension(source, spec)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[tokio::test]
    async fn test_store_upload_and_derivatives() {
        let config = test_config();
        let media = MediaService::new(&config);

        let relative = media
            .store_upload(ImageKind::Poster, "matrix.JPG", b"fake image bytes")
            .await
            .unwrap();
        assert!(relative.starts_with("movies/posters/"));
        assert!(relative.ends_with(".jpg"));
        assert_eq!(media.original_url(&relative), format!("/media/{relative}"));

        let url = media.derivative_url(&relative, &POSTER_MOBILE).await.unwrap();
        let stem = relative.trim_end_matches(".jpg");
        assert_eq!(url, format!("/media/CACHE/images/{stem}/poster_mobile.jpg"));

        let generated = config
            .media_root
            .join(format!("CACHE/images/{stem}/poster_mobile.jpg"));
        assert_eq!(tokio::fs::read(generated).await.unwrap(), b"fake image bytes");

        let _ = tokio::fs::remove_dir_all(&config.media_root).await;
    }

    #[tokio::test]
    async fn test_concurrent_derivative_requests() {
        let config = test_config();
        let media = MediaService::new(&config);
        let relative = media
            .store_upload(ImageKind::Backdrop, "dune.png", b"backdrop bytes")
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            media.derivative_url(&relative, &BACKDROP_LARGE),
            media.derivative_url(&relative, &BACKDROP_LARGE)
        );
        assert_eq!(first.unwrap(), second.unwrap());

        let stem = relative.trim_end_matches(".png");
        let cache = config.media_root.join(format!("CACHE/images/{stem}"));
        let mut entries = tokio::fs::read_dir(&cache).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["backdrop_large.png".to_string()]);

        let _ = tokio::fs::remove_dir_all(&config.media_root).await;
    }

    #[tokio::test]
    async fn test_discard_removes_uploads() {
        let config = test_config();
        let media = MediaService::new(&config);
        let relative = media
            .store_upload(ImageKind::Poster, "heat.webp", b"poster bytes")
            .await
            .unwrap();

        media.discard(std::slice::from_ref(&relative)).await;
        assert!(!tokio::fs::try_exists(config.media_root.join(&relative)).await.unwrap());

        let _ = tokio::fs::remove_dir_all(&config.media_root).await;
    }

    #[tokio::test]
    async fn test_missing_images_yield_empty_urls() {
        let media = MediaService::new(&test_config());

        assert_eq!(media.original_url(""), "");
        assert_eq!(media.derivative_url("", &BACKDROP_LARGE).await.unwrap(), "");
        assert_eq!(
            media
                .derivative_url("movies/backdrops/gone.png", &BACKDROP_LARGE)
                .await
                .unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn test_rejects_unsupported_extensions() {
        let media = MediaService::new(&test_config());
        let error = media
            .store_upload(ImageKind::Backdrop, "script.sh", b"#!/bin/sh")
            .await
            .unwrap_err();
        assert!(error.to_string().contains("Unsupported image type"));
    }
}

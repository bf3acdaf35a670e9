use std::path::PathBuf;

use async_trait::async_trait;
use image::{ImageFormat, imageops::FilterType};
use mediaforge_model::{GeneratedThumbnail, MediaDescriptor, ResizeMethod};
use tokio::task;
use tracing::{debug, info};
use uuid::Uuid;

use super::{GenerateError, GenerateThumbnail};

/// Generates thumbnails by decoding the source with the `image` crate.
///
/// Output lands under `output_dir/{origin}/{media_id}/` named by target
/// dimensions and method. The source format is preserved except for gifs,
/// whose first frame is written as png (animated output is out of scope).
#[derive(Debug, Clone)]
pub struct ImageThumbnailer {
    output_dir: PathBuf,
}

impl ImageThumbnailer {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    fn output_format(content_type: &str) -> (ImageFormat, &'static str, &'static str) {
        match content_type {
            "image/png" | "image/gif" => (ImageFormat::Png, "image/png", "png"),
            _ => (ImageFormat::Jpeg, "image/jpeg", "jpg"),
        }
    }
}

#[async_trait]
impl GenerateThumbnail for ImageThumbnailer {
    async fn generate(
        &self,
        media: &MediaDescriptor,
        width: u32,
        height: u32,
        method: ResizeMethod,
    ) -> Result<GeneratedThumbnail, GenerateError> {
        let dir = self.output_dir.join(&media.origin).join(&media.media_id);
        tokio::fs::create_dir_all(&dir).await?;

        let (format, content_type, ext) =
            Self::output_format(&media.content_type);
        let file_path =
            dir.join(format!("{}x{}-{}.{}", width, height, method, ext));

        info!(
            source = %media.location.display(),
            target = %file_path.display(),
            "generating thumbnail"
        );

        // Decode and resize off the runtime; image work is CPU-bound.
        let source = media.location.clone();
        let tmp_path = file_path
            .with_extension(format!("tmp.{}", Uuid::new_v4().simple()));
        let tmp = tmp_path.clone();
        task::spawn_blocking(move || -> Result<(), GenerateError> {
            let decoded = image::open(&source)?;
            let resized = match method {
                ResizeMethod::Scale => {
                    decoded.resize(width, height, FilterType::Lanczos3)
                }
                ResizeMethod::Crop => {
                    decoded.resize_to_fill(width, height, FilterType::Lanczos3)
                }
            };
            resized.save_with_format(&tmp, format)?;
            Ok(())
        })
        .await
        .map_err(|err| {
            GenerateError::Task(format!("failed to join image task: {err}"))
        })??;

        // Publish atomically via hard_link so a concurrent generator for the
        // same artifact can never clobber a file already being served.
        match tokio::fs::hard_link(&tmp_path, &file_path).await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                debug!(path = %file_path.display(), "thumbnail already on disk");
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(GenerateError::Io(err));
            }
        }

        let size_bytes = tokio::fs::metadata(&file_path).await?.len();
        Ok(GeneratedThumbnail {
            content_type: content_type.to_string(),
            location: file_path,
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_source(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut source = RgbImage::new(64, 48);
        for pixel in source.pixels_mut() {
            *pixel = Rgb([180, 40, 40]);
        }
        source.save(&path).unwrap();
        path
    }

    fn media(location: PathBuf, content_type: &str) -> MediaDescriptor {
        MediaDescriptor {
            origin: "local".to_string(),
            media_id: "m1".to_string(),
            content_type: content_type.to_string(),
            size_bytes: 4096,
            location,
        }
    }

    #[tokio::test]
    async fn scale_fits_within_target_box() {
        let tmp = tempfile::tempdir().unwrap();
        let source = write_source(tmp.path(), "source.png");
        let generator = ImageThumbnailer::new(tmp.path().join("thumbs"));

        let generated = generator
            .generate(&media(source, "image/png"), 32, 32, ResizeMethod::Scale)
            .await
            .unwrap();

        assert_eq!(generated.content_type, "image/png");
        assert!(generated.size_bytes > 0);
        let (w, h) = image::image_dimensions(&generated.location).unwrap();
        assert!(w <= 32 && h <= 32);
    }

    #[tokio::test]
    async fn crop_fills_target_box_exactly() {
        let tmp = tempfile::tempdir().unwrap();
        let source = write_source(tmp.path(), "source.jpg");
        let generator = ImageThumbnailer::new(tmp.path().join("thumbs"));

        let generated = generator
            .generate(&media(source, "image/jpeg"), 20, 20, ResizeMethod::Crop)
            .await
            .unwrap();

        assert_eq!(generated.content_type, "image/jpeg");
        let (w, h) = image::image_dimensions(&generated.location).unwrap();
        assert_eq!((w, h), (20, 20));
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = ImageThumbnailer::new(tmp.path().join("thumbs"));
        let descriptor =
            media(tmp.path().join("missing.jpg"), "image/jpeg");

        let err = generator
            .generate(&descriptor, 32, 32, ResizeMethod::Scale)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Io(_) | GenerateError::Image(_)
        ));
    }
}

//! Avatar normalization: centered square crop, fixed size, JPEG.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::constants::profile::AVATAR_KEY_PREFIX;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Avatar processing unavailable")]
    Closed,
}

/// Object key of a profile's uploaded avatar.
#[must_use]
pub fn avatar_key(profile_id: &str) -> String {
    format!("{AVATAR_KEY_PREFIX}/{profile_id}.jpg")
}

/// Decodes a JPEG or PNG, crops the centered square and re-encodes it as a
/// `size`×`size` JPEG.
pub fn normalize_avatar(bytes: &[u8], size: u32, quality: u8) -> Result<Vec<u8>, AvatarError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AvatarError::Decode(e.to_string()))?;

    match reader.format() {
        Some(ImageFormat::Jpeg | ImageFormat::Png) => {}
        _ => return Err(AvatarError::UnsupportedFormat),
    }

    let image = reader
        .decode()
        .map_err(|e| AvatarError::Decode(e.to_string()))?;

    let (width, height) = (image.width(), image.height());
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;

    let square = image.crop_imm(x, y, side, side);
    let resized = square.resize_exact(size, size, FilterType::CatmullRom);
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .map_err(|e| AvatarError::Encode(e.to_string()))?;

    Ok(out)
}

/// Runs `normalize_avatar` on the blocking pool, at most `permits` at a time.
/// A caller waiting for a permit gives up its place by dropping the future;
/// once a job has started, its permit is held until the job ends even if the
/// caller is gone.
#[derive(Clone)]
pub struct AvatarProcessor {
    semaphore: Arc<Semaphore>,
    size: u32,
    quality: u8,
}

impl AvatarProcessor {
    #[must_use]
    pub fn new(permits: usize, size: u32, quality: u8) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            size,
            quality,
        }
    }

    pub async fn process(&self, bytes: Vec<u8>) -> Result<Vec<u8>, AvatarError> {
        let (size, quality) = (self.size, self.quality);
        let started = std::time::Instant::now();

        let result = self
            .run_blocking(move || normalize_avatar(&bytes, size, quality))
            .await;

        metrics::histogram!("kappalib_avatar_processing_seconds")
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn run_blocking<T, F>(&self, job: F) -> Result<T, AvatarError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, AvatarError> + Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| AvatarError::Closed)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| AvatarError::Encode(format!("processing task failed: {e}")))?
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        DynamicImage::ImageRgb8(buffer)
    }

    #[test]
    fn test_wide_jpeg_becomes_square() {
        let input = encode(&gradient(3000, 1000), ImageFormat::Jpeg);
        let output = normalize_avatar(&input, 250, 85).unwrap();

        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Jpeg);
        assert_eq!((decoded.width(), decoded.height()), (250, 250));
    }

    #[test]
    fn test_png_accepted() {
        let input = encode(&gradient(40, 90), ImageFormat::Png);
        let output = normalize_avatar(&input, 32, 85).unwrap();
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }

    #[test]
    fn test_unknown_bytes_rejected() {
        let err = normalize_avatar(b"GIF89a not really", 250, 85).unwrap_err();
        assert!(matches!(err, AvatarError::UnsupportedFormat));

        let err = normalize_avatar(b"plain text", 250, 85).unwrap_err();
        assert!(matches!(err, AvatarError::UnsupportedFormat));
    }

    #[test]
    fn test_avatar_key() {
        assert_eq!(avatar_key("abc"), "avatars/abc.jpg");
    }

    #[tokio::test]
    async fn test_permit_held_after_caller_is_cancelled() {
        let processor = AvatarProcessor::new(1, 16, 85);
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let caller = {
            let processor = processor.clone();
            tokio::spawn(async move {
                processor
                    .run_blocking(move || {
                        let _ = started_tx.send(());
                        let _ = release_rx.recv();
                        Ok(())
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        // The job is still running, so its slot stays taken.
        assert_eq!(processor.available_permits(), 0);

        release_tx.send(()).unwrap();
        let freed = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while processor.available_permits() == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(freed.is_ok());
        assert_eq!(processor.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_processor_releases_permit() {
        let processor = AvatarProcessor::new(2, 16, 85);
        let input = encode(&gradient(20, 20), ImageFormat::Png);
        processor.process(input).await.unwrap();
        assert_eq!(processor.available_permits(), 2);
    }
}

//! Downsize oversized images before upload
//!
//! An image whose longest side exceeds the limit is scaled so that side
//! equals the limit, keeping the aspect ratio (the short side is truncated,
//! not rounded). Lanczos3 resampling. The resized image replaces the file
//! via temp file + rename, so an interrupted resize leaves the original.
//!
//! Running it twice is a no-op the second time, which is what makes it safe
//! to repeat before every attempt.

use std::path::{Path, PathBuf};

use image::ImageFormat;
use image::imageops::FilterType;
use tracing::{debug, info};
use transform::{BoxFuture, Error, Preprocessor, Result, WorkItem};

/// Target size for a `width` x `height` image, or `None` when it already fits.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if max_dimension == 0 || width.max(height) <= max_dimension {
        return None;
    }
    let scale = |side: u32, long: u32| -> u32 {
        let scaled = u64::from(max_dimension) * u64::from(side) / u64::from(long);
        (scaled as u32).max(1)
    };
    if width > height {
        Some((max_dimension, scale(height, width)))
    } else {
        Some((scale(width, height), max_dimension))
    }
}

/// Preprocessor that enforces a maximum image dimension.
#[derive(Debug, Clone, Copy)]
pub struct ResizePreprocessor {
    max_dimension: u32,
}

impl ResizePreprocessor {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl Preprocessor for ResizePreprocessor {
    fn preprocess<'a>(&'a self, item: &'a WorkItem) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = item.path.clone();
            let max_dimension = self.max_dimension;
            let resized = tokio::task::spawn_blocking(move || resize_in_place(&path, max_dimension))
                .await
                .map_err(|e| Error::Preprocess(format!("resize task failed: {e}")))??;

            match resized {
                Some((from, to)) => info!(
                    item = %item.id,
                    from = %format!("{}x{}", from.0, from.1),
                    to = %format!("{}x{}", to.0, to.1),
                    "resized"
                ),
                None => debug!(item = %item.id, "within size limit"),
            }
            Ok(())
        })
    }
}

type Dimensions = (u32, u32);

/// Resize the file at `path` if needed. Returns the old and new size when it
/// did. Blocking.
fn resize_in_place(path: &Path, max_dimension: u32) -> Result<Option<(Dimensions, Dimensions)>> {
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| Error::Preprocess(format!("reading {}: {e}", path.display())))?;

    let Some((new_width, new_height)) = target_dimensions(width, height, max_dimension) else {
        return Ok(None);
    };

    let format = ImageFormat::from_path(path)
        .map_err(|e| Error::Preprocess(format!("unknown image format: {e}")))?;
    let img = image::open(path)
        .map_err(|e| Error::Preprocess(format!("decoding {}: {e}", path.display())))?;
    let resized = img.resize_exact(new_width, new_height, FilterType::Lanczos3);

    let tmp = sibling_temp_path(path);
    if let Err(e) = resized.save_with_format(&tmp, format) {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::Preprocess(format!("encoding resized image: {e}")));
    }
    std::fs::rename(&tmp, path)
        .map_err(|e| Error::Preprocess(format!("replacing {}: {e}", path.display())))?;

    Ok(Some(((width, height), (new_width, new_height))))
}

/// Hidden temp file next to `path`; its extension keeps it out of discovery.
pub(crate) fn sibling_temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tinysweep.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 90]));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn landscape_scales_width_to_limit() {
        assert_eq!(target_dimensions(3000, 1000, 2000), Some((2000, 666)));
    }

    #[test]
    fn portrait_scales_height_to_limit() {
        assert_eq!(target_dimensions(1000, 3000, 2000), Some((666, 2000)));
    }

    #[test]
    fn square_scales_both_sides() {
        assert_eq!(target_dimensions(4000, 4000, 2000), Some((2000, 2000)));
    }

    #[test]
    fn images_within_limit_are_untouched() {
        assert_eq!(target_dimensions(2000, 1500, 2000), None);
        assert_eq!(target_dimensions(800, 600, 2000), None);
    }

    #[test]
    fn zero_limit_disables_resizing() {
        assert_eq!(target_dimensions(10_000, 10_000, 0), None);
    }

    #[test]
    fn extreme_aspect_ratio_keeps_one_pixel() {
        assert_eq!(target_dimensions(100_000, 1, 2000), Some((2000, 1)));
    }

    #[test]
    fn temp_path_is_hidden_sibling() {
        assert_eq!(
            sibling_temp_path(Path::new("/photos/a.png")),
            PathBuf::from("/photos/.a.png.tinysweep.tmp")
        );
    }

    #[tokio::test]
    async fn oversized_png_is_resized_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        write_png(&path, 300, 100);

        let item = WorkItem::new("wide.png", &path, 0);
        let pre = ResizePreprocessor::new(200);
        pre.preprocess(&item).await.unwrap();
        assert_eq!(image::image_dimensions(&path).unwrap(), (200, 66));

        // Second pass is a no-op
        pre.preprocess(&item).await.unwrap();
        assert_eq!(image::image_dimensions(&path).unwrap(), (200, 66));
        assert!(!sibling_temp_path(&path).exists());
    }

    #[tokio::test]
    async fn jpeg_keeps_its_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tall.jpg");
        RgbImage::from_pixel(100, 300, Rgb([10, 10, 10]))
            .save_with_format(&path, ImageFormat::Jpeg)
            .unwrap();

        let item = WorkItem::new("tall.jpg", &path, 0);
        ResizePreprocessor::new(50).preprocess(&item).await.unwrap();

        assert_eq!(image::image_dimensions(&path).unwrap(), (16, 50));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn small_image_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        write_png(&path, 40, 30);
        let before = std::fs::read(&path).unwrap();

        let item = WorkItem::new("small.png", &path, 0);
        ResizePreprocessor::new(200).preprocess(&item).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn corrupt_image_is_preprocess_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let item = WorkItem::new("broken.png", &path, 0);
        let err = ResizePreprocessor::new(200)
            .preprocess(&item)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Preprocess(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_file_is_preprocess_error() {
        let item = WorkItem::new("gone.png", "/nonexistent/gone.png", 0);
        let err = ResizePreprocessor::new(200)
            .preprocess(&item)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Preprocess(_)));
    }
}

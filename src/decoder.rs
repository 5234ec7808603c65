//! Image decoding with orientation normalization.
//!
//! Every decoded image is rotated according to its EXIF orientation tag
//! before it leaves this module, so the stored pixels are display-correct and
//! the tag itself is dropped. Two resolutions are offered: a width-bounded
//! preview for instant display and the full image for the cache.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError, RgbaImage};
use thiserror::Error;
use tracing::{debug, trace};

use crate::media::MediaKind;

/// Decoded pixels shared between the cache, workers and the display.
pub type SharedImage = Arc<DecodedImage>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("unsupported format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("corrupt image data in {path:?}")]
    CorruptData {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DecodeError {
    fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    fn from_image(path: &Path, source: ImageError) -> Self {
        match source {
            ImageError::Unsupported(_) => Self::UnsupportedFormat(path.to_path_buf()),
            other => Self::CorruptData {
                path: path.to_path_buf(),
                source: other,
            },
        }
    }
}

/// Rotation implied by the EXIF orientation tag.
///
/// Only the pure rotations are honoured; mirrored variants and unknown values
/// are displayed as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    Rotate90Cw,
    Rotate180,
    Rotate270Cw,
}

impl Orientation {
    pub fn from_exif_tag(value: u32) -> Self {
        match value {
            3 => Self::Rotate180,
            6 => Self::Rotate90Cw,
            8 => Self::Rotate270Cw,
            _ => Self::Normal,
        }
    }

    /// Reads the orientation tag from an encoded file. Missing or unreadable
    /// metadata means no rotation.
    pub fn read(bytes: &[u8]) -> Self {
        let mut cursor = Cursor::new(bytes);
        let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
            return Self::Normal;
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
            .map(Self::from_exif_tag)
            .unwrap_or(Self::Normal)
    }

    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::Rotate90Cw => img.rotate90(),
            Self::Rotate180 => img.rotate180(),
            Self::Rotate270Cw => img.rotate270(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Downscaled so the width is at most `max_width`.
    Preview { max_width: u32 },
    Full,
}

impl DecodeMode {
    pub fn is_full(self) -> bool {
        self == Self::Full
    }
}

/// Orientation-corrected RGBA pixels. Never mutated after construction.
#[derive(Debug)]
pub struct DecodedImage {
    pixels: RgbaImage,
    source_width: u32,
    source_height: u32,
    mode: DecodeMode,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage, source_width: u32, source_height: u32, mode: DecodeMode) -> Self {
        Self {
            pixels,
            source_width,
            source_height,
            mode,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Oriented dimensions of the full-resolution image.
    pub fn source_dimensions(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub fn is_preview(&self) -> bool {
        !self.mode.is_full()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Seam between the scheduler and the actual codec.
pub trait Decode: Send + Sync {
    fn decode(&self, path: &Path, mode: DecodeMode) -> Result<DecodedImage, DecodeError>;
}

/// Decodes files from disk using the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDecoder;

impl FileDecoder {
    fn load(path: &Path) -> Result<DynamicImage, DecodeError> {
        if MediaKind::of(path) == Some(MediaKind::Video) {
            return Err(DecodeError::UnsupportedFormat(path.to_path_buf()));
        }

        let bytes = std::fs::read(path).map_err(|e| DecodeError::from_io(path, e))?;
        let format = image::guess_format(&bytes)
            .map_err(|_| DecodeError::UnsupportedFormat(path.to_path_buf()))?;

        // GIFs decode to their first frame.
        let img = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| DecodeError::from_image(path, e))?;

        let orientation = Orientation::read(&bytes);
        if orientation != Orientation::Normal {
            trace!(?path, ?orientation, "Applying EXIF orientation");
        }
        Ok(orientation.apply(img))
    }
}

impl Decode for FileDecoder {
    fn decode(&self, path: &Path, mode: DecodeMode) -> Result<DecodedImage, DecodeError> {
        let img = Self::load(path)?;
        let (src_w, src_h) = img.dimensions();

        let pixels = match mode {
            DecodeMode::Full => img.to_rgba8(),
            DecodeMode::Preview { max_width } => {
                let (w, h) = preview_dimensions(src_w, src_h, max_width);
                if (w, h) == (src_w, src_h) {
                    img.to_rgba8()
                } else {
                    img.resize_exact(w, h, FilterType::Triangle).to_rgba8()
                }
            }
        };

        debug!(
            ?path,
            src_w,
            src_h,
            out_w = pixels.width(),
            out_h = pixels.height(),
            full = mode.is_full(),
            "Decoded image"
        );
        Ok(DecodedImage::new(pixels, src_w, src_h, mode))
    }
}

/// Preview size bounded by `max_width`, preserving aspect ratio and never
/// upscaling.
fn preview_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width == 0 || height == 0 || max_width == 0 || width <= max_width {
        return (width.max(1), height.max(1));
    }

    let scaled_height = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled_height.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

    /// 2x1 image: red on the left, green on the right.
    fn two_pixels() -> DynamicImage {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, RED);
        img.put_pixel(1, 0, GREEN);
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_from_exif_tag() {
        assert_eq!(Orientation::from_exif_tag(3), Orientation::Rotate180);
        assert_eq!(Orientation::from_exif_tag(6), Orientation::Rotate90Cw);
        assert_eq!(Orientation::from_exif_tag(8), Orientation::Rotate270Cw);
        for other in [0, 1, 2, 4, 5, 7, 9, 255] {
            assert_eq!(Orientation::from_exif_tag(other), Orientation::Normal);
        }
    }

    #[test]
    fn test_rotate_90_clockwise() {
        let rotated = Orientation::Rotate90Cw.apply(two_pixels()).to_rgba8();
        assert_eq!(rotated.dimensions(), (1, 2));
        // The left column ends up on top.
        assert_eq!(*rotated.get_pixel(0, 0), RED);
        assert_eq!(*rotated.get_pixel(0, 1), GREEN);
    }

    #[test]
    fn test_rotate_180() {
        let rotated = Orientation::Rotate180.apply(two_pixels()).to_rgba8();
        assert_eq!(rotated.dimensions(), (2, 1));
        assert_eq!(*rotated.get_pixel(0, 0), GREEN);
        assert_eq!(*rotated.get_pixel(1, 0), RED);
    }

    #[test]
    fn test_rotate_270_clockwise() {
        let rotated = Orientation::Rotate270Cw.apply(two_pixels()).to_rgba8();
        assert_eq!(rotated.dimensions(), (1, 2));
        assert_eq!(*rotated.get_pixel(0, 0), GREEN);
        assert_eq!(*rotated.get_pixel(0, 1), RED);
    }

    #[test]
    fn test_normal_is_untouched() {
        let img = Orientation::Normal.apply(two_pixels()).to_rgba8();
        assert_eq!(*img.get_pixel(0, 0), RED);
        assert_eq!(*img.get_pixel(1, 0), GREEN);
    }

    #[test]
    fn test_read_without_exif() {
        assert_eq!(Orientation::read(b"not an image"), Orientation::Normal);
    }

    #[test]
    fn test_preview_dimensions() {
        assert_eq!(preview_dimensions(1600, 1200, 400), (400, 300));
        assert_eq!(preview_dimensions(300, 200, 400), (300, 200));
        assert_eq!(preview_dimensions(4000, 10, 400), (400, 1));
        assert_eq!(preview_dimensions(0, 0, 400), (1, 1));
    }

    #[test]
    fn test_decode_png_full_and_preview() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbaImage::from_pixel(800, 200, RED)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let full = FileDecoder.decode(&path, DecodeMode::Full).unwrap();
        assert_eq!((full.width(), full.height()), (800, 200));
        assert!(!full.is_preview());

        let preview = FileDecoder
            .decode(&path, DecodeMode::Preview { max_width: 400 })
            .unwrap();
        assert_eq!((preview.width(), preview.height()), (400, 100));
        assert_eq!(preview.source_dimensions(), (800, 200));
        assert!(preview.is_preview());
    }

    #[test]
    fn test_decode_missing_file() {
        let dir = tempdir().unwrap();
        let err = FileDecoder
            .decode(&dir.path().join("missing.jpg"), DecodeMode::Full)
            .unwrap_err();
        assert!(matches!(err, DecodeError::NotFound(_)));
    }

    #[test]
    fn test_decode_unrecognized_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.png");
        File::create(&path).unwrap().write_all(b"plain text").unwrap();
        let err = FileDecoder.decode(&path, DecodeMode::Full).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_decode_truncated_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00])
            .unwrap();
        let err = FileDecoder.decode(&path, DecodeMode::Full).unwrap_err();
        assert!(matches!(err, DecodeError::CorruptData { .. }));
    }

    #[test]
    fn test_decode_video_is_unsupported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        File::create(&path).unwrap();
        let err = FileDecoder.decode(&path, DecodeMode::Full).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }
}

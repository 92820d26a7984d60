use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{ConvertError, Result};

// Supported label raster formats
pub const LABEL_FORMATS: &[&str] = &["png", "tif", "tiff"];

// Precomputed HashSet of raster extensions for fast lookup
pub static LABEL_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the label raster extensions set
pub fn get_label_extensions_set() -> &'static HashSet<String> {
    LABEL_EXTENSIONS_SET.get_or_init(|| LABEL_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Number of instance ids packed into the low bits of every label value.
pub const INSTANCE_RANGE: u32 = 256;

/// Split a packed label value into its category index and instance id.
#[inline]
pub fn unpack_label(value: u32) -> (u32, u8) {
    (value / INSTANCE_RANGE, (value % INSTANCE_RANGE) as u8)
}

/// Pack a category index and an instance id into a label value.
#[inline]
pub fn pack_label(category: u32, instance: u8) -> u32 {
    category * INSTANCE_RANGE + instance as u32
}

/// A painted label image: one packed `category * 256 + instance` value per pixel.
///
/// Pixels are stored row-major. A raster always has a non-zero area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRaster {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl LabelRaster {
    /// Build a raster from a row-major pixel buffer.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ConvertError::invalid_input(format!(
                "label raster has zero area ({}x{})",
                width, height
            )));
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(ConvertError::invalid_input(format!(
                "label raster buffer holds {} pixels, expected {}x{} = {}",
                pixels.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a raster from rows; every row must have the same, non-zero length.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if let Some((y, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(ConvertError::invalid_input(format!(
                "ragged label raster: row {} has {} pixels, row 0 has {}",
                y,
                row.len(),
                width
            )));
        }
        let pixels = rows.into_iter().flatten().collect();
        Self::new(width as u32, height as u32, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel values.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

/// A binary mask with the dimensions of the raster it was isolated from.
///
/// Stored row-major, one byte per pixel (0 or 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ObjectMask {
    /// An all-unset mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Build a mask from rows of 0/non-zero values.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self> {
        let raster = LabelRaster::from_rows(
            rows.iter()
                .map(|row| row.iter().map(|&v| (v != 0) as u32).collect())
                .collect(),
        )?;
        Ok(Self {
            width: raster.width,
            height: raster.height,
            data: raster.pixels.into_iter().map(|v| v as u8).collect(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel values, 0 or 1.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize] != 0
    }

    #[inline]
    pub fn set_index(&mut self, index: usize) {
        self.data[index] = 1;
    }

    pub fn set(&mut self, x: u32, y: u32) {
        self.set_index(y as usize * self.width as usize + x as usize);
    }

    /// Number of set pixels.
    pub fn count(&self) -> u64 {
        self.data.iter().filter(|&&v| v != 0).count() as u64
    }

    /// True when the mask is wholly empty or wholly set.
    pub fn is_degenerate(&self) -> bool {
        let set = self.count();
        set == 0 || set == self.data.len() as u64
    }

    /// The same pixels in column-major (Fortran) order.
    pub fn to_column_major(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut out = Vec::with_capacity(w * h);
        for x in 0..w {
            for y in 0..h {
                out.push(self.data[y * w + x]);
            }
        }
        out
    }
}

/// One object isolated from a label raster by the decoder.
#[derive(Debug, Clone)]
pub struct DecodedObject {
    /// Position of the category in the category table.
    pub category_index: u32,
    /// Instance id from the low bits; `None` for whole-category masks.
    pub instance_id: Option<u8>,
    pub mask: ObjectMask,
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub total_files_processed: usize,
    pub images_written: usize,
    pub annotations_written: usize,
    pub objects_decoded: usize,
    pub skipped_degenerate: usize,
    pub failed_conversions: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the counters of another run into this one.
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.total_files_processed += other.total_files_processed;
        self.images_written += other.images_written;
        self.annotations_written += other.annotations_written;
        self.objects_decoded += other.objects_decoded;
        self.skipped_degenerate += other.skipped_degenerate;
        self.failed_conversions += other.failed_conversions;
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Total label rasters processed: {}", self.total_files_processed);
        log::info!("Images written: {}", self.images_written);
        log::info!("Objects decoded: {}", self.objects_decoded);
        log::info!("Annotations written: {}", self.annotations_written);
        log::info!("Failed conversions: {}", self.failed_conversions);

        if self.skipped_degenerate > 0 {
            log::warn!(
                "Skipped objects with no encodable geometry: {}",
                self.skipped_degenerate
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_unpack_label() {
        assert_eq!(pack_label(1, 5), 261);
        assert_eq!(unpack_label(261), (1, 5));
        assert_eq!(unpack_label(65535), (255, 255));
    }

    #[test]
    fn test_raster_rejects_bad_shapes() {
        assert!(LabelRaster::new(0, 4, vec![]).is_err());
        assert!(LabelRaster::new(2, 2, vec![0; 3]).is_err());
        assert!(LabelRaster::from_rows(vec![]).is_err());
        assert!(matches!(
            LabelRaster::from_rows(vec![vec![0, 0], vec![0]]),
            Err(ConvertError::InvalidInput { .. })
        ));

        let raster = LabelRaster::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!((raster.width(), raster.height()), (3, 2));
        assert_eq!(raster.get(2, 1), 6);
    }

    #[test]
    fn test_mask_column_major_and_degeneracy() {
        let mut mask = ObjectMask::new(2, 2);
        assert!(mask.is_degenerate());
        mask.set(1, 0);
        assert_eq!(mask.to_column_major(), vec![0, 0, 1, 0]);
        assert_eq!(mask.count(), 1);
        assert!(!mask.is_degenerate());
    }

    #[test]
    fn test_stats_merge() {
        let mut total = ProcessingStats::new();
        let one = ProcessingStats {
            total_files_processed: 1,
            images_written: 1,
            annotations_written: 3,
            ..ProcessingStats::default()
        };
        total.merge(&one);
        total.merge(&one);
        assert_eq!(total.total_files_processed, 2);
        assert_eq!(total.annotations_written, 6);
    }
}

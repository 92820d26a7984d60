use image::{DynamicImage, GrayImage};
use jwalk::WalkDir;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::coco::CocoFile;
use crate::error::{ConvertError, Result};
use crate::types::{get_label_extensions_set, LabelRaster, ObjectMask};
use crate::utils::ensure_directory;

/// Name of the directory the converter writes into; never scanned for input.
pub const OUTPUT_DIR_NAME: &str = "COCODataset";

/// Find every label raster below `dirname`, sorted by path.
///
/// `COCODataset` directories and every directory in `skip_dirs` (such as the
/// mask export directory) are not entered. The sort gives every raster a
/// stable position, which the pipeline turns into its image id.
pub fn discover_label_rasters(dirname: &Path, skip_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let extensions = get_label_extensions_set();
    // Directories that do not exist yet cannot hold rasters
    let skip_dirs: Vec<PathBuf> = skip_dirs
        .iter()
        .filter_map(|dir| fs::canonicalize(dir).ok())
        .collect();

    let mut paths: Vec<PathBuf> = WalkDir::new(dirname)
        .skip_hidden(true)
        .process_read_dir(move |_, _, _, children| {
            children.retain(|entry| {
                entry.as_ref().map_or(true, |e| {
                    if !e.file_type().is_dir() {
                        return true;
                    }
                    if e.file_name().to_str() == Some(OUTPUT_DIR_NAME) {
                        return false;
                    }
                    skip_dirs.is_empty()
                        || fs::canonicalize(e.path())
                            .map_or(true, |path| !skip_dirs.contains(&path))
                })
            });
        })
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.path();
            let ext = path.extension()?.to_string_lossy().to_lowercase();
            extensions.contains(&ext).then_some(path)
        })
        .collect();

    paths.sort();
    paths
}

/// Read a single-channel label image into a [`LabelRaster`].
///
/// 8- and 16-bit grayscale images keep their raw pixel values; other color
/// types cannot carry packed labels and are rejected.
pub fn read_label_raster(path: &Path) -> Result<LabelRaster> {
    let image = image::open(path)?;
    raster_from_image(image)
}

pub fn raster_from_image(image: DynamicImage) -> Result<LabelRaster> {
    let (width, height) = (image.width(), image.height());
    let pixels: Vec<u32> = match image {
        DynamicImage::ImageLuma8(buffer) => buffer.into_raw().into_iter().map(u32::from).collect(),
        DynamicImage::ImageLuma16(buffer) => {
            buffer.into_raw().into_iter().map(u32::from).collect()
        }
        other => {
            return Err(ConvertError::invalid_input(format!(
                "unsupported label pixel format {:?}; expected 8- or 16-bit grayscale",
                other.color()
            )))
        }
    };
    LabelRaster::new(width, height, pixels)
}

/// File name for an exported object mask: `<stem>_<category>_<instance>.png`.
pub fn mask_file_name(stem: &str, category: &str, instance: Option<u8>) -> String {
    let category = category.replace(' ', "_");
    let name = match instance {
        Some(instance) => format!("{}_{}_{}.png", stem, category, instance),
        None => format!("{}_{}.png", stem, category),
    };
    sanitize_filename::sanitize(name)
}

/// Write a mask as an 8-bit PNG with set pixels at 255.
pub fn write_mask_png(mask: &ObjectMask, path: &Path) -> Result<()> {
    let data: Vec<u8> = mask.data().iter().map(|&v| v * 255).collect();
    let image = GrayImage::from_raw(mask.width(), mask.height(), data)
        .ok_or_else(|| ConvertError::invalid_input("mask buffer does not match its size"))?;
    image.save(path)?;
    Ok(())
}

/// Serialize the manifest to `path`, creating parent directories.
pub fn write_manifest(path: &Path, manifest: &CocoFile) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, manifest)?;
    writer.flush()?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn test_raster_from_luma16_keeps_raw_values() {
        let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(2, 1, vec![261, 0]).unwrap();
        let raster = raster_from_image(DynamicImage::ImageLuma16(buffer)).unwrap();
        assert_eq!(raster.pixels(), &[261, 0]);
    }

    #[test]
    fn test_raster_from_rgb_is_rejected() {
        let image = DynamicImage::new_rgb8(2, 2);
        assert!(matches!(
            raster_from_image(image),
            Err(ConvertError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_discovery_skips_output_and_listed_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = &temp_dir.path().join("labels");
        for dir in ["city", "COCODataset", "masks"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        for file in [
            "b.png",
            "city/a.tif",
            "COCODataset/x.png",
            "masks/b_Car_1.png",
            "notes.txt",
        ] {
            fs::write(root.join(file), b"").unwrap();
        }

        let found = discover_label_rasters(root, &[]);
        assert_eq!(found.len(), 3);

        let found = discover_label_rasters(root, &[root.join("masks")]);
        assert_eq!(found, vec![root.join("b.png"), root.join("city/a.tif")]);
    }

    #[test]
    fn test_mask_file_name() {
        assert_eq!(
            mask_file_name("frame_01", "Traffic Light", Some(3)),
            "frame_01_Traffic_Light_3.png"
        );
        assert_eq!(
            mask_file_name("frame_01", "Sky/Clouds", None),
            "frame_01_SkyClouds.png"
        );
    }
}

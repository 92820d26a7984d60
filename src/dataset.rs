//! Label raster dataset processing module
//!
//! Discovers label rasters, converts each one independently on a worker pool
//! and merges the per-image results into one COCO manifest.

use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::category::CategoryTable;
use crate::coco::{Annotation, CocoFile, Image, ImageEntry, ManifestBuilder};
use crate::config::{ConvertConfig, NonInstancePolicy, RleFormat};
use crate::decoder::decode_with_policy;
use crate::encoder::encode;
use crate::error::{ConvertError, Result};
use crate::io::{
    discover_label_rasters, mask_file_name, read_label_raster, write_manifest, write_mask_png,
};
use crate::types::{DecodedObject, LabelRaster, ProcessingStats};
use crate::utils::{create_progress_bar, create_worker_pool, ensure_directory};

/// Main conversion pipeline: read the categories, convert every raster below
/// `config.label_dir` and write the manifest to `config.output_path`.
pub fn process_label_dataset(config: &ConvertConfig) -> Result<ProcessingStats> {
    let categories = CategoryTable::from_json_file(&config.category_config)?;
    info!(
        "Loaded {} categories ({} with instances)",
        categories.len(),
        categories
            .descriptors()
            .iter()
            .filter(|d| d.has_instances)
            .count()
    );

    let skip_dirs: Vec<PathBuf> = config.export_masks.iter().cloned().collect();
    let rasters = discover_label_rasters(&config.label_dir, &skip_dirs);
    if rasters.is_empty() {
        warn!(
            "No label rasters found in {}",
            config.label_dir.display()
        );
    } else {
        info!("Found {} label rasters.", rasters.len());
    }

    let (manifest, stats) = convert_rasters(&rasters, &categories, config)?;
    write_manifest(&config.output_path, &manifest)?;
    stats.print_summary();
    Ok(stats)
}

/// Convert a list of label rasters into a manifest.
///
/// The raster at position `i` gets image id `start_image_id + i`. A raster
/// that fails to convert is logged, counted and left out; the others are
/// unaffected.
pub fn convert_rasters(
    paths: &[PathBuf],
    categories: &CategoryTable,
    config: &ConvertConfig,
) -> Result<(CocoFile, ProcessingStats)> {
    u32::try_from(paths.len())
        .ok()
        .and_then(|count| config.start_image_id.checked_add(count.saturating_sub(1)))
        .ok_or_else(|| {
            ConvertError::invalid_input(format!(
                "{} images starting at id {} exceed {}",
                paths.len(),
                config.start_image_id,
                u32::MAX
            ))
        })?;

    let thread_pool = create_worker_pool(config.workers)?;
    if let Some(export_dir) = &config.export_masks {
        ensure_directory(export_dir)?;
    }

    let pb = create_progress_bar(paths.len() as u64, "Label rasters");

    let outcomes: Vec<(Option<ImageEntry>, ProcessingStats)> = thread_pool.install(|| {
        paths
            .par_iter()
            .enumerate()
            .map(|(position, path)| {
                let image_id = config.start_image_id + position as u32;
                let outcome = convert_label_file(path, image_id, categories, config);
                pb.inc(1);
                match outcome {
                    Ok((entry, stats)) => (Some(entry), stats),
                    Err(e) => {
                        error!("Failed to convert {}: {}", path.display(), e);
                        let stats = ProcessingStats {
                            total_files_processed: 1,
                            failed_conversions: 1,
                            ..ProcessingStats::default()
                        };
                        (None, stats)
                    }
                }
            })
            .collect()
    });
    pb.finish_with_message("Label rasters converted");

    let include_non_instance = config.non_instance_policy == NonInstancePolicy::WholeCategory;
    let mut builder = ManifestBuilder::new(
        categories.coco_categories(include_non_instance),
        config.start_annotation_id,
    );
    let mut stats = ProcessingStats::new();
    for (entry, entry_stats) in outcomes {
        stats.merge(&entry_stats);
        if let Some(entry) = entry {
            builder.add(entry);
        }
    }

    Ok((builder.build()?, stats))
}

/// Convert one label raster file: read, decode, optionally export the masks,
/// and encode every object.
pub fn convert_label_file(
    path: &Path,
    image_id: u32,
    categories: &CategoryTable,
    config: &ConvertConfig,
) -> Result<(ImageEntry, ProcessingStats)> {
    let raster = read_label_raster(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("image{}", image_id));
    let is_crowd = path
        .file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| config.is_crowd_file(name));

    let objects = decode_with_policy(&raster, categories, config.non_instance_policy)?;
    debug!(
        "{}: {} objects decoded",
        path.display(),
        objects.len()
    );

    if let Some(export_dir) = &config.export_masks {
        export_object_masks(export_dir, &stem, &objects, categories);
    }

    let file_name = format!("{}.{}", stem, config.image_extension);
    Ok(annotate_objects(
        &raster, &objects, image_id, file_name, is_crowd, categories, config,
    ))
}

/// Decode and encode an in-memory raster.
pub fn convert_raster(
    raster: &LabelRaster,
    image_id: u32,
    file_name: String,
    is_crowd: bool,
    categories: &CategoryTable,
    config: &ConvertConfig,
) -> Result<(ImageEntry, ProcessingStats)> {
    let objects = decode_with_policy(raster, categories, config.non_instance_policy)?;
    Ok(annotate_objects(
        raster, &objects, image_id, file_name, is_crowd, categories, config,
    ))
}

/// Encode decoded objects into an image entry with image-local annotation ids.
fn annotate_objects(
    raster: &LabelRaster,
    objects: &[DecodedObject],
    image_id: u32,
    file_name: String,
    is_crowd: bool,
    categories: &CategoryTable,
    config: &ConvertConfig,
) -> (ImageEntry, ProcessingStats) {
    let mut annotations: Vec<Annotation> = Vec::with_capacity(objects.len());

    for object in objects {
        let Some(category_id) = categories.output_id(object.category_index) else {
            continue;
        };
        let local_id = annotations.len() as u32 + 1;
        let Some(mut annotation) = encode(
            &object.mask,
            local_id,
            image_id,
            category_id,
            is_crowd,
            config.tolerance,
        ) else {
            continue;
        };
        if config.rle_format == RleFormat::Compressed {
            annotation.segmentation = annotation.segmentation.compress();
        }
        annotations.push(annotation);
    }

    let stats = ProcessingStats {
        total_files_processed: 1,
        images_written: 1,
        annotations_written: annotations.len(),
        objects_decoded: objects.len(),
        skipped_degenerate: objects.len() - annotations.len(),
        failed_conversions: 0,
    };
    let image = Image::new(image_id, file_name, raster.width(), raster.height());
    (ImageEntry { image, annotations }, stats)
}

fn export_object_masks(
    export_dir: &Path,
    stem: &str,
    objects: &[DecodedObject],
    categories: &CategoryTable,
) {
    for object in objects {
        let category = categories
            .get(object.category_index)
            .map(|d| d.display_name())
            .unwrap_or("unknown");
        let path = export_dir.join(mask_file_name(stem, category, object.instance_id));
        if let Err(e) = write_mask_png(&object.mask, &path) {
            warn!("Failed to export mask {}: {}", path.display(), e);
        }
    }
}

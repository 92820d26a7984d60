use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::encoder::DEFAULT_TOLERANCE;

/// Command-line arguments for converting panoptic label images to COCO format.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directory containing the label rasters (searched recursively)
    #[arg(short = 'd', long = "label_dir")]
    pub label_dir: String,

    /// Category config JSON (`{"labels": [{"name", "instances", ...}]}`)
    #[arg(short = 'c', long = "config")]
    pub config: String,

    /// Output manifest path [default: <label_dir>/COCODataset/annotations/instances.json]
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Polygon simplification tolerance in pixels; 0 keeps every contour vertex
    #[arg(long = "tolerance", default_value_t = DEFAULT_TOLERANCE, value_parser = validate_tolerance)]
    pub tolerance: f64,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long = "workers")]
    pub workers: Option<usize>,

    /// Id given to the first image
    #[arg(long = "start_image_id", default_value_t = 1)]
    pub start_image_id: u32,

    /// Id given to the first annotation
    #[arg(long = "start_annotation_id", default_value_t = 1)]
    pub start_annotation_id: u32,

    /// How RLE segmentations are written: 'uncompressed' or 'compressed'
    #[arg(long = "rle_format", value_enum, default_value = "uncompressed")]
    pub rle_format: RleFormat,

    /// What to do with categories that are not split per instance
    #[arg(long = "non_instance_policy", value_enum, default_value = "skip")]
    pub non_instance_policy: NonInstancePolicy,

    /// Extension of the source photographs named in the manifest
    #[arg(long = "image_extension", default_value = "jpg")]
    pub image_extension: String,

    /// Rasters whose file name contains this text are encoded as crowd
    #[arg(long = "crowd_pattern")]
    pub crowd_pattern: Option<String>,

    /// Also write every decoded object mask as a binary PNG into this directory
    #[arg(long = "export_masks")]
    pub export_masks: Option<String>,
}

/// Encoding of RLE segmentations in the manifest.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum RleFormat {
    /// Plain list of run counts
    #[default]
    Uncompressed,
    /// COCO string-compressed counts
    Compressed,
}

/// Treatment of categories whose `instances` flag is false.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum NonInstancePolicy {
    /// Emit nothing for them
    #[default]
    Skip,
    /// Emit one mask covering all of the category's pixels
    WholeCategory,
}

/// Resolved settings used by the conversion pipeline.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub label_dir: PathBuf,
    pub category_config: PathBuf,
    pub output_path: PathBuf,
    pub tolerance: f64,
    pub workers: Option<usize>,
    pub start_image_id: u32,
    pub start_annotation_id: u32,
    pub rle_format: RleFormat,
    pub non_instance_policy: NonInstancePolicy,
    pub image_extension: String,
    pub crowd_pattern: Option<String>,
    pub export_masks: Option<PathBuf>,
}

impl ConvertConfig {
    /// Settings with defaults for everything but the input paths.
    pub fn new(label_dir: impl Into<PathBuf>, category_config: impl Into<PathBuf>) -> Self {
        let label_dir = label_dir.into();
        Self {
            output_path: default_output_path(&label_dir),
            label_dir,
            category_config: category_config.into(),
            tolerance: DEFAULT_TOLERANCE,
            workers: None,
            start_image_id: 1,
            start_annotation_id: 1,
            rle_format: RleFormat::default(),
            non_instance_policy: NonInstancePolicy::default(),
            image_extension: "jpg".to_string(),
            crowd_pattern: None,
            export_masks: None,
        }
    }

    /// Whether a raster with this file name holds crowd objects.
    pub fn is_crowd_file(&self, file_name: &str) -> bool {
        self.crowd_pattern
            .as_deref()
            .is_some_and(|pattern| !pattern.is_empty() && file_name.contains(pattern))
    }
}

impl Args {
    /// Resolve the command line into a [`ConvertConfig`].
    pub fn to_convert_config(&self) -> Result<ConvertConfig, String> {
        if self.start_image_id == 0 || self.start_annotation_id == 0 {
            return Err("start ids must be at least 1".to_string());
        }
        if self.workers == Some(0) {
            return Err("workers must be at least 1".to_string());
        }
        let image_extension = self.image_extension.trim_start_matches('.').to_string();
        if image_extension.is_empty() {
            return Err("image_extension must not be empty".to_string());
        }

        let mut config = ConvertConfig::new(&self.label_dir, &self.config);
        if let Some(output) = &self.output {
            config.output_path = PathBuf::from(output);
        }
        config.tolerance = self.tolerance;
        config.workers = self.workers;
        config.start_image_id = self.start_image_id;
        config.start_annotation_id = self.start_annotation_id;
        config.rle_format = self.rle_format;
        config.non_instance_policy = self.non_instance_policy;
        config.image_extension = image_extension;
        config.crowd_pattern = self.crowd_pattern.clone();
        config.export_masks = self.export_masks.as_ref().map(PathBuf::from);
        Ok(config)
    }
}

fn default_output_path(label_dir: &std::path::Path) -> PathBuf {
    label_dir
        .join("COCODataset")
        .join("annotations")
        .join("instances.json")
}

// Validate that the tolerance is a finite, non-negative number
fn validate_tolerance(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val.is_finite() && val >= 0.0 => Ok(val),
        _ => Err("TOLERANCE must be a non-negative number".to_string()),
    }
}

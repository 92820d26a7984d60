//! Panoptic label raster to COCO converter
//!
//! This library decodes label rasters whose pixels pack a category index and
//! an instance id (`category * 256 + instance`) into one binary mask per
//! object, and encodes every mask as a COCO instance annotation.

pub mod category;
pub mod coco;
pub mod config;
pub mod contour;
pub mod dataset;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod io;
pub mod mask;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use category::{CategoryDescriptor, CategoryTable};
pub use coco::{Annotation, CocoFile, ImageEntry, ManifestBuilder, Segmentation};
pub use config::{Args, ConvertConfig, NonInstancePolicy, RleFormat};
pub use dataset::{convert_label_file, convert_raster, convert_rasters, process_label_dataset};
pub use decoder::{decode, decode_with_policy};
pub use error::{ConvertError, Result};
pub use types::{DecodedObject, LabelRaster, ObjectMask, ProcessingStats};

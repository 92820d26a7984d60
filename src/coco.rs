//! COCO format data structures and utilities
//!
//! This module defines the manifest written by the converter and the builder
//! that merges per-image results into it with dense, deterministic ids.

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};
use crate::mask::{rle_to_string, Rle};

/// COCO dataset information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub year: u32,
    pub version: String,
    pub description: String,
    pub contributor: String,
    pub url: String,
    pub date_created: String,
}

impl Default for Info {
    fn default() -> Self {
        let now = chrono::Utc::now();
        Self {
            year: chrono::Datelike::year(&now) as u32,
            version: "1.0".to_string(),
            description: "Converted from panoptic label images".to_string(),
            contributor: "panoptic2coco".to_string(),
            url: String::new(),
            date_created: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// COCO license information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: u32,
    pub name: String,
    pub url: String,
}

impl Default for License {
    fn default() -> Self {
        Self {
            id: 1,
            name: "Unknown".to_string(),
            url: String::new(),
        }
    }
}

/// COCO category information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: u32,
    pub name: String,
    pub supercategory: String,
}

/// COCO image information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Image {
    pub id: u32,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub license: u32,
}

impl Image {
    pub fn new(id: u32, file_name: String, width: u32, height: u32) -> Self {
        Self {
            id,
            file_name,
            width,
            height,
            license: 1,
        }
    }
}

/// Segmentation geometry: polygon rings or a run-length encoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Segmentation {
    /// Flat `[x0, y0, x1, y1, ...]` rings.
    Polygon(Vec<Vec<f64>>),
    /// Uncompressed RLE; `size` is `[height, width]`.
    Rle { counts: Vec<u32>, size: [u32; 2] },
    /// RLE with counts in the COCO string encoding.
    CompressedRle { counts: String, size: [u32; 2] },
}

impl Segmentation {
    pub fn from_rle(rle: Rle) -> Self {
        Segmentation::Rle {
            size: [rle.h, rle.w],
            counts: rle.counts,
        }
    }

    /// Re-encode uncompressed RLE counts as a COCO string; other variants are unchanged.
    pub fn compress(self) -> Self {
        match self {
            Segmentation::Rle { counts, size } => {
                let counts = rle_to_string(&Rle {
                    h: size[0],
                    w: size[1],
                    counts,
                });
                Segmentation::CompressedRle { counts, size }
            }
            other => other,
        }
    }

    pub fn is_rle(&self) -> bool {
        !matches!(self, Segmentation::Polygon(_))
    }
}

/// COCO annotation information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub id: u32,
    pub image_id: u32,
    pub category_id: u32,
    pub segmentation: Segmentation,
    /// Number of mask pixels.
    pub area: u64,
    /// `[x, y, width, height]` in whole pixels.
    pub bbox: [u32; 4],
    pub iscrowd: u8,
}

/// Complete COCO dataset structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoFile {
    pub info: Info,
    pub licenses: Vec<License>,
    pub categories: Vec<Category>,
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
}

impl Default for CocoFile {
    fn default() -> Self {
        Self {
            info: Info::default(),
            licenses: vec![License::default()],
            categories: Vec::new(),
            images: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

/// The output of one unit of work: an image and its annotations.
///
/// Annotation ids are local to the image until the manifest is built.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub image: Image,
    pub annotations: Vec<Annotation>,
}

/// Merges per-image results into a single manifest.
///
/// Entries may be added in any order; `build` sorts them by image id and
/// assigns annotation ids sequentially from `start_annotation_id`.
pub struct ManifestBuilder {
    categories: Vec<Category>,
    start_annotation_id: u32,
    entries: Vec<ImageEntry>,
}

impl ManifestBuilder {
    pub fn new(categories: Vec<Category>, start_annotation_id: u32) -> Self {
        Self {
            categories,
            start_annotation_id,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, entry: ImageEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ImageEntry>) {
        self.entries.extend(entries);
    }

    /// Build the complete COCO dataset structure
    ///
    /// Fails when the annotation ids would run past `u32::MAX`.
    pub fn build(mut self) -> Result<CocoFile> {
        self.entries.sort_by_key(|entry| entry.image.id);

        let mut images = Vec::with_capacity(self.entries.len());
        let mut annotations = Vec::new();
        let mut next_id = Some(self.start_annotation_id);

        for entry in self.entries {
            let image_id = entry.image.id;
            images.push(entry.image);
            for mut annotation in entry.annotations {
                let id = next_id.ok_or_else(|| {
                    ConvertError::invalid_input(format!(
                        "annotation ids starting at {} exceed {}",
                        self.start_annotation_id,
                        u32::MAX
                    ))
                })?;
                annotation.id = id;
                annotation.image_id = image_id;
                next_id = id.checked_add(1);
                annotations.push(annotation);
            }
        }

        Ok(CocoFile {
            info: Info::default(),
            licenses: vec![License::default()],
            categories: self.categories,
            images,
            annotations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(local_id: u32) -> Annotation {
        Annotation {
            id: local_id,
            image_id: 0,
            category_id: 1,
            segmentation: Segmentation::Polygon(vec![vec![0.5, 0.5, 1.5, 0.5, 1.5, 1.5]]),
            area: 1,
            bbox: [1, 1, 1, 1],
            iscrowd: 0,
        }
    }

    #[test]
    fn build_renumbers_densely_in_image_order() {
        let mut builder = ManifestBuilder::new(Vec::new(), 1);
        builder.add(ImageEntry {
            image: Image::new(2, "b.jpg".to_string(), 4, 4),
            annotations: vec![annotation(1)],
        });
        builder.add(ImageEntry {
            image: Image::new(1, "a.jpg".to_string(), 4, 4),
            annotations: vec![annotation(1), annotation(2)],
        });
        let file = builder.build().unwrap();

        let images: Vec<u32> = file.images.iter().map(|i| i.id).collect();
        assert_eq!(images, vec![1, 2]);
        let ids: Vec<(u32, u32)> = file
            .annotations
            .iter()
            .map(|a| (a.id, a.image_id))
            .collect();
        assert_eq!(ids, vec![(1, 1), (2, 1), (3, 2)]);
    }

    #[test]
    fn build_rejects_annotation_id_overflow() {
        let entry = ImageEntry {
            image: Image::new(1, "a.jpg".to_string(), 4, 4),
            annotations: vec![annotation(1), annotation(2)],
        };

        let mut builder = ManifestBuilder::new(Vec::new(), u32::MAX);
        builder.add(entry.clone());
        assert!(matches!(
            builder.build(),
            Err(ConvertError::InvalidInput { .. })
        ));

        let mut builder = ManifestBuilder::new(Vec::new(), u32::MAX - 1);
        builder.add(entry);
        let ids: Vec<u32> = builder
            .build()
            .unwrap()
            .annotations
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![u32::MAX - 1, u32::MAX]);
    }

    #[test]
    fn segmentation_serializes_in_coco_shapes() {
        let rle = Segmentation::from_rle(Rle {
            h: 10,
            w: 10,
            counts: vec![5, 3, 92],
        });
        let json = serde_json::to_value(&rle).unwrap();
        assert_eq!(json["size"], serde_json::json!([10, 10]));
        assert_eq!(json["counts"], serde_json::json!([5, 3, 92]));

        let compressed = serde_json::to_value(rle.compress()).unwrap();
        assert_eq!(compressed["counts"], serde_json::json!("53l2"));

        let polygon = Segmentation::Polygon(vec![vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]]);
        let json = serde_json::to_value(&polygon).unwrap();
        assert_eq!(json, serde_json::json!([[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]]));
    }

    #[test]
    fn segmentation_deserializes_every_variant() {
        let polygon: Segmentation = serde_json::from_str("[[1, 2, 3, 4, 5, 6]]").unwrap();
        assert!(!polygon.is_rle());
        let rle: Segmentation =
            serde_json::from_str(r#"{"counts": [1, 2, 1], "size": [2, 2]}"#).unwrap();
        assert!(matches!(rle, Segmentation::Rle { .. }));
        let compressed: Segmentation =
            serde_json::from_str(r#"{"counts": "53l2", "size": [10, 10]}"#).unwrap();
        assert!(matches!(compressed, Segmentation::CompressedRle { .. }));
    }
}

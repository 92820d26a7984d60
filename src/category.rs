//! Category table loading and id resolution
//!
//! The table is read from a JSON document shaped like the Mapillary Vistas
//! `config.json`:
//!
//! ```json
//! { "labels": [ { "name": "animal--bird", "readable": "Bird", "instances": true } ] }
//! ```
//!
//! The position of a label in the list is the category index packed into the
//! label rasters. The id written to the manifest defaults to that index and
//! may be overridden per label with an explicit `"id"`.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::coco::Category;
use crate::error::{ConvertError, Result};

/// One entry of the category config document.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDescriptor {
    pub name: String,
    #[serde(default)]
    pub readable: Option<String>,
    /// Whether pixels of this category are separated per instance.
    #[serde(rename = "instances", default)]
    pub has_instances: bool,
    /// Explicit id for the manifest; the table position is used when absent.
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub supercategory: Option<String>,
}

impl CategoryDescriptor {
    pub fn new(name: impl Into<String>, has_instances: bool) -> Self {
        Self {
            name: name.into(),
            readable: None,
            has_instances,
            id: None,
            supercategory: None,
        }
    }

    /// Name written to the manifest.
    pub fn display_name(&self) -> &str {
        self.readable.as_deref().unwrap_or(&self.name)
    }

    /// Explicit supercategory, else the hierarchical prefix of `name`
    /// (`"object--vehicle--car"` gives `"object--vehicle"`).
    pub fn resolved_supercategory(&self) -> String {
        if let Some(supercategory) = &self.supercategory {
            return supercategory.clone();
        }
        match self.name.rsplit_once("--") {
            Some((prefix, _)) => prefix.to_string(),
            None => "none".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CategoryDocument {
    #[serde(alias = "categories")]
    labels: Vec<CategoryDescriptor>,
}

/// Ordered, read-only category table with output ids resolved at load time.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    descriptors: Vec<CategoryDescriptor>,
    output_ids: Vec<u32>,
}

impl CategoryTable {
    /// Build a table, resolving and validating output ids.
    pub fn new(descriptors: Vec<CategoryDescriptor>) -> Result<Self> {
        if descriptors.is_empty() {
            return Err(ConvertError::invalid_input("category table is empty"));
        }

        let output_ids: Vec<u32> = descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| descriptor.id.unwrap_or(index as u32))
            .collect();

        let mut seen: HashMap<u32, usize> = HashMap::with_capacity(output_ids.len());
        for (index, &id) in output_ids.iter().enumerate() {
            if let Some(first) = seen.insert(id, index) {
                return Err(ConvertError::invalid_input(format!(
                    "categories '{}' and '{}' both resolve to id {}",
                    descriptors[first].name, descriptors[index].name, id
                )));
            }
        }

        Ok(Self {
            descriptors,
            output_ids,
        })
    }

    /// Load the table from a JSON config document.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
        })?;
        let document: CategoryDocument = serde_json::from_reader(BufReader::new(file))?;
        log::debug!(
            "Loaded {} categories from {}",
            document.labels.len(),
            path.display()
        );
        Self::new(document.labels)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: CategoryDocument = serde_json::from_str(json)?;
        Self::new(document.labels)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&CategoryDescriptor> {
        self.descriptors.get(index as usize)
    }

    pub fn descriptors(&self) -> &[CategoryDescriptor] {
        &self.descriptors
    }

    /// Manifest id for the category at `index`.
    pub fn output_id(&self, index: u32) -> Option<u32> {
        self.output_ids.get(index as usize).copied()
    }

    /// Manifest `categories` entries, sorted by id.
    ///
    /// With `include_non_instance` false only categories that can produce
    /// annotations under the default policy are listed.
    pub fn coco_categories(&self, include_non_instance: bool) -> Vec<Category> {
        let mut categories: Vec<Category> = self
            .descriptors
            .iter()
            .zip(&self.output_ids)
            .filter(|(descriptor, _)| include_non_instance || descriptor.has_instances)
            .map(|(descriptor, &id)| Category {
                id,
                name: descriptor.display_name().to_string(),
                supercategory: descriptor.resolved_supercategory(),
            })
            .collect();
        categories.sort_by_key(|c| c.id);
        categories
    }
}

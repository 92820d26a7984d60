//! Label raster decomposition
//!
//! Splits a packed `category * 256 + instance` raster into one binary mask per
//! (category, instance) pair. A single scan collects the pairs that actually
//! co-occur, so only those are materialized instead of probing all 256
//! instance values for every category.

use std::collections::BTreeMap;

use crate::category::CategoryTable;
use crate::config::NonInstancePolicy;
use crate::error::{ConvertError, Result};
use crate::types::{unpack_label, DecodedObject, LabelRaster, ObjectMask};

/// Decode a raster with the default policy (non-instance categories skipped).
pub fn decode(raster: &LabelRaster, categories: &CategoryTable) -> Result<Vec<DecodedObject>> {
    decode_with_policy(raster, categories, NonInstancePolicy::Skip)
}

/// Decode a raster into per-object masks, ordered by (category, instance).
///
/// A mask is emitted only if it has at least one set and one unset pixel.
/// Pixels whose category index falls outside `categories` are rejected with
/// [`ConvertError::InvalidInput`].
pub fn decode_with_policy(
    raster: &LabelRaster,
    categories: &CategoryTable,
    policy: NonInstancePolicy,
) -> Result<Vec<DecodedObject>> {
    let total = raster.pixels().len() as u64;
    if total == 0 {
        return Err(ConvertError::invalid_input("label raster has zero area"));
    }

    let pair_counts = count_pairs(raster, categories)?;

    let mut objects = Vec::new();
    let mut category_totals: BTreeMap<u32, u64> = BTreeMap::new();

    for (&(category, instance), &count) in &pair_counts {
        // count_pairs already rejected unknown categories
        let Some(descriptor) = categories.get(category) else {
            continue;
        };
        if !descriptor.has_instances {
            *category_totals.entry(category).or_default() += count;
            continue;
        }
        if count == total {
            log::trace!(
                "Dropping category {} instance {}: covers the whole raster",
                category,
                instance
            );
            continue;
        }

        let mask = build_mask(raster, |c, i| c == category && i == instance);
        debug_assert!(!mask.is_degenerate());
        objects.push(DecodedObject {
            category_index: category,
            instance_id: Some(instance),
            mask,
        });
    }

    if policy == NonInstancePolicy::WholeCategory {
        for (category, count) in category_totals {
            if count == total {
                continue;
            }
            let mask = build_mask(raster, |c, _| c == category);
            objects.push(DecodedObject {
                category_index: category,
                instance_id: None,
                mask,
            });
        }
        objects.sort_by_key(|o| (o.category_index, o.instance_id));
    }

    Ok(objects)
}

/// Pixel counts per co-occurring (category, instance) pair.
fn count_pairs(
    raster: &LabelRaster,
    categories: &CategoryTable,
) -> Result<BTreeMap<(u32, u8), u64>> {
    let mut counts: BTreeMap<(u32, u8), u64> = BTreeMap::new();
    let mut last: Option<(u32, (u32, u8))> = None;
    let mut run = 0u64;

    for (index, &value) in raster.pixels().iter().enumerate() {
        // Label images are mostly long runs of a single value
        if let Some((previous, _)) = last {
            if previous == value {
                run += 1;
                continue;
            }
        }
        if let Some((_, pair)) = last {
            *counts.entry(pair).or_default() += run;
        }

        let (category, instance) = unpack_label(value);
        if category as usize >= categories.len() {
            let width = raster.width() as usize;
            return Err(ConvertError::invalid_input(format!(
                "pixel ({}, {}) has value {} (category {}), but only {} categories are defined",
                index % width,
                index / width,
                value,
                category,
                categories.len()
            )));
        }
        last = Some((value, (category, instance)));
        run = 1;
    }
    if let Some((_, pair)) = last {
        *counts.entry(pair).or_default() += run;
    }

    Ok(counts)
}

fn build_mask(raster: &LabelRaster, select: impl Fn(u32, u8) -> bool) -> ObjectMask {
    let mut mask = ObjectMask::new(raster.width(), raster.height());
    for (index, &value) in raster.pixels().iter().enumerate() {
        let (category, instance) = unpack_label(value);
        if select(category, instance) {
            mask.set_index(index);
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryDescriptor;
    use crate::types::pack_label;

    fn table() -> CategoryTable {
        CategoryTable::new(vec![
            CategoryDescriptor::new("void", false),
            CategoryDescriptor::new("person", true),
            CategoryDescriptor::new("road", false),
            CategoryDescriptor::new("car", true),
        ])
        .unwrap()
    }

    #[test]
    fn all_zero_raster_yields_nothing() {
        let raster = LabelRaster::new(4, 4, vec![0; 16]).unwrap();
        assert!(decode(&raster, &table()).unwrap().is_empty());
    }

    #[test]
    fn isolates_single_instance_block() {
        let v = pack_label(1, 5);
        let raster = LabelRaster::from_rows(vec![
            vec![v, v, 0, 0],
            vec![v, v, 0, 0],
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 0],
        ])
        .unwrap();
        let objects = decode(&raster, &table()).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].category_index, 1);
        assert_eq!(objects[0].instance_id, Some(5));
        assert_eq!(objects[0].mask.count(), 4);
        assert!(objects[0].mask.get(1, 1));
        assert!(!objects[0].mask.get(2, 0));
    }

    #[test]
    fn separates_instances_and_orders_them() {
        let a = pack_label(3, 2);
        let b = pack_label(3, 1);
        let p = pack_label(1, 0);
        let raster = LabelRaster::from_rows(vec![
            vec![a, a, 0],
            vec![b, 0, p],
            vec![b, 0, p],
        ])
        .unwrap();
        let objects = decode(&raster, &table()).unwrap();
        let keys: Vec<_> = objects
            .iter()
            .map(|o| (o.category_index, o.instance_id))
            .collect();
        assert_eq!(keys, vec![(1, Some(0)), (3, Some(1)), (3, Some(2))]);
        assert!(objects.iter().all(|o| !o.mask.is_degenerate()));
    }

    #[test]
    fn same_instance_id_in_other_category_is_not_merged() {
        let raster = LabelRaster::from_rows(vec![
            vec![pack_label(1, 7), pack_label(3, 7)],
            vec![0, 0],
        ])
        .unwrap();
        let objects = decode(&raster, &table()).unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects.iter().all(|o| o.mask.count() == 1));
    }

    #[test]
    fn full_cover_is_degenerate() {
        let raster = LabelRaster::new(2, 2, vec![pack_label(3, 1); 4]).unwrap();
        assert!(decode(&raster, &table()).unwrap().is_empty());
    }

    #[test]
    fn non_instance_category_is_skipped_by_default() {
        let r = pack_label(2, 0);
        let raster = LabelRaster::from_rows(vec![vec![r, r], vec![0, 0]]).unwrap();
        assert!(decode(&raster, &table()).unwrap().is_empty());
    }

    #[test]
    fn whole_category_policy_merges_instances() {
        let raster = LabelRaster::from_rows(vec![
            vec![pack_label(2, 0), pack_label(2, 9)],
            vec![pack_label(1, 1), 0],
        ])
        .unwrap();
        let objects =
            decode_with_policy(&raster, &table(), NonInstancePolicy::WholeCategory).unwrap();
        let keys: Vec<_> = objects
            .iter()
            .map(|o| (o.category_index, o.instance_id))
            .collect();
        // void (category 0) and road (category 2) each become one mask
        assert_eq!(keys, vec![(0, None), (1, Some(1)), (2, None)]);
        assert_eq!(objects[2].mask.count(), 2);
    }

    #[test]
    fn out_of_range_category_is_rejected() {
        let raster = LabelRaster::new(2, 1, vec![0, pack_label(9, 1)]).unwrap();
        let err = decode(&raster, &table()).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidInput { .. }));
    }
}

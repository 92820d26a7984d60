//! Object mask to COCO annotation encoding
//!
//! Masks that touch the image border, and crowd masks, are stored as
//! uncompressed column-major RLE over the whole image. Interior masks are
//! traced into simplified polygons.

use crate::coco::{Annotation, Segmentation};
use crate::contour::mask_to_polygons;
use crate::mask::encode_mask;
use crate::types::ObjectMask;

/// Default Douglas-Peucker tolerance in pixels.
pub const DEFAULT_TOLERANCE: f64 = 2.0;

/// Minimal `[x, y, width, height]` rectangle covering every set pixel.
pub fn bounding_box(mask: &ObjectMask) -> Option<[u32; 4]> {
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut any = false;

    for y in 0..mask.height() {
        for x in 0..mask.width() {
            if mask.get(x, y) {
                any = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    any.then(|| [min_x, min_y, max_x - min_x + 1, max_y - min_y + 1])
}

/// True when the box reaches the first or last row or column of the image.
pub fn touches_border(bbox: &[u32; 4], width: u32, height: u32) -> bool {
    let [x, y, w, h] = *bbox;
    x == 0 || y == 0 || x + w == width || y + h == height
}

/// Encode one object mask into an annotation record.
///
/// Returns `None` for an empty mask, or when polygon encoding leaves no ring
/// with at least three vertices.
pub fn encode(
    mask: &ObjectMask,
    record_id: u32,
    image_id: u32,
    category_id: u32,
    is_crowd: bool,
    tolerance: f64,
) -> Option<Annotation> {
    let bbox = bounding_box(mask)?;
    let area = mask.count();

    let segmentation = if is_crowd || touches_border(&bbox, mask.width(), mask.height()) {
        Segmentation::from_rle(encode_mask(mask))
    } else {
        let polygons = mask_to_polygons(mask, tolerance);
        if polygons.is_empty() {
            log::debug!(
                "Mask of category {} in image {} has no polygon at tolerance {}",
                category_id,
                image_id,
                tolerance
            );
            return None;
        }
        Segmentation::Polygon(polygons)
    };

    Some(Annotation {
        id: record_id,
        image_id,
        category_id,
        segmentation,
        area,
        bbox,
        iscrowd: u8::from(is_crowd),
    })
}

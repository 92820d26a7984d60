//! Run-length encoding of binary masks
//!
//! Follows the pycocotools conventions exactly: pixels are scanned in
//! column-major (Fortran) order and counts alternate between runs of 0s and
//! runs of 1s, always starting with a (possibly empty) run of 0s.

use crate::error::{ConvertError, Result};
use crate::types::ObjectMask;

/// Run-length encoding for masks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rle {
    pub h: u32,
    pub w: u32,
    /// Run counts: alternating runs of 0s and 1s, starting with 0s.
    pub counts: Vec<u32>,
}

/// Encode a column-major binary mask into RLE.
///
/// `mask` is stored in column-major order: pixel (x, y) is at index `y + h * x`.
pub fn encode(mask: &[u8], h: u32, w: u32) -> Result<Rle> {
    let n = (h as usize) * (w as usize);
    if mask.len() != n {
        return Err(ConvertError::invalid_input(format!(
            "mask length {} does not match {}x{}",
            mask.len(),
            w,
            h
        )));
    }
    Ok(Rle {
        h,
        w,
        counts: run_counts(mask),
    })
}

/// Alternating 0/1 run lengths, starting with a (possibly empty) run of 0s.
fn run_counts(mask: &[u8]) -> Vec<u32> {
    let mut counts = Vec::new();
    let mut p: u8 = 0;
    let mut c: u32 = 0;

    for &v in mask {
        let v = u8::from(v != 0);
        if v != p {
            counts.push(c);
            c = 0;
            p = v;
        }
        c += 1;
    }
    counts.push(c);
    counts
}

/// Encode an [`ObjectMask`] over its full image plane.
pub fn encode_mask(mask: &ObjectMask) -> Rle {
    Rle {
        h: mask.height(),
        w: mask.width(),
        counts: run_counts(&mask.to_column_major()),
    }
}

/// Decode an RLE to a column-major binary mask of size `h * w`.
///
/// Runs past the end of the plane are ignored.
pub fn decode(rle: &Rle) -> Vec<u8> {
    let n = (rle.h as usize) * (rle.w as usize);
    let mut mask = vec![0u8; n];
    let mut idx = 0usize;
    let mut v = 0u8;
    for &c in &rle.counts {
        if idx >= n {
            break;
        }
        let end = (idx + c as usize).min(n);
        mask[idx..end].fill(v);
        idx += c as usize;
        v = 1 - v;
    }
    mask
}

/// Decode an RLE back to a row-major [`ObjectMask`].
pub fn to_object_mask(rle: &Rle) -> ObjectMask {
    let column_major = decode(rle);
    let h = rle.h as usize;
    let mut mask = ObjectMask::new(rle.w, rle.h);
    for (i, &v) in column_major.iter().enumerate() {
        if v != 0 {
            mask.set((i / h) as u32, (i % h) as u32);
        }
    }
    mask
}

/// Number of foreground pixels (sum of the odd-indexed runs).
pub fn area(rle: &Rle) -> u64 {
    rle.counts.iter().skip(1).step_by(2).map(|&c| c as u64).sum()
}

/// Compress an RLE into the LEB128-like string format used by COCO.
///
/// Matches `rleToString` in pycocotools' `maskApi.c`: from the third count on,
/// each count is stored as the difference to the count two places before it.
pub fn rle_to_string(rle: &Rle) -> String {
    let mut s = String::new();
    for (i, &cnt) in rle.counts.iter().enumerate() {
        let mut x = cnt as i64;
        if i > 2 {
            x -= rle.counts[i - 2] as i64;
        }
        loop {
            let mut c = (x & 0x1f) as u8;
            x >>= 5;
            let more = if c & 0x10 != 0 { x != -1 } else { x != 0 };
            if more {
                c |= 0x20;
            }
            s.push((c + 48) as char);
            if !more {
                break;
            }
        }
    }
    s
}

/// Decompress a COCO RLE string. Inverse of [`rle_to_string`].
pub fn rle_from_string(s: &str, h: u32, w: u32) -> Result<Rle> {
    let bytes = s.as_bytes();
    let mut counts: Vec<u32> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let mut x: i64 = 0;
        let mut shift = 0;
        let mut more = true;
        while more {
            let Some(&byte) = bytes.get(i) else {
                return Err(ConvertError::invalid_input("truncated RLE string"));
            };
            if !(48..48 + 64).contains(&byte) {
                return Err(ConvertError::invalid_input(format!(
                    "invalid RLE character {:?}",
                    byte as char
                )));
            }
            let c = (byte - 48) as i64;
            i += 1;
            x |= (c & 0x1f) << shift;
            more = c & 0x20 != 0;
            shift += 5;
            if !more && c & 0x10 != 0 {
                x |= -1i64 << shift;
            }
        }
        let k = counts.len();
        if k > 2 {
            x += counts[k - 2] as i64;
        }
        let count = u32::try_from(x)
            .map_err(|_| ConvertError::invalid_input(format!("invalid RLE count {}", x)))?;
        counts.push(count);
    }

    Ok(Rle { h, w, counts })
}

/// Rasterize polygon rings onto a `width x height` mask.
///
/// A pixel is set when its center `(x, y)` lies inside the rings under the
/// even-odd rule, so holes traced as separate rings stay unset. Rings are flat
/// `[x0, y0, x1, y1, ...]` lists in the same frame the encoder writes.
pub fn rasterize_polygons(polygons: &[Vec<f64>], width: u32, height: u32) -> ObjectMask {
    let mut mask = ObjectMask::new(width, height);
    let rings: Vec<Vec<(f64, f64)>> = polygons
        .iter()
        .map(|p| p.chunks_exact(2).map(|xy| (xy[0], xy[1])).collect())
        .collect();

    for y in 0..height {
        let py = y as f64;
        for x in 0..width {
            let px = x as f64;
            let mut inside = false;
            for ring in &rings {
                let n = ring.len();
                if n < 3 {
                    continue;
                }
                let mut j = n - 1;
                for i in 0..n {
                    let (xi, yi) = ring[i];
                    let (xj, yj) = ring[j];
                    if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
                        inside = !inside;
                    }
                    j = i;
                }
            }
            if inside {
                mask.set(x, y);
            }
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mask = vec![0, 0, 0, 1, 1, 1, 0, 0, 1, 1, 0, 0];
        let rle = encode(&mask, 3, 4).unwrap();
        assert_eq!(rle.counts, vec![3, 3, 2, 2, 2]);
        assert_eq!(decode(&rle), mask);
    }

    #[test]
    fn test_encode_all_zeros() {
        let rle = encode(&[0u8; 12], 3, 4).unwrap();
        assert_eq!(rle.counts, vec![12]);
    }

    #[test]
    fn test_encode_leading_ones() {
        let rle = encode(&[1u8, 1, 0, 0], 2, 2).unwrap();
        assert_eq!(rle.counts, vec![0, 2, 2]);
    }

    #[test]
    fn test_encode_rejects_wrong_length() {
        assert!(encode(&[0u8; 5], 2, 2).is_err());
    }

    #[test]
    fn test_encode_mask_is_column_major() {
        // Row 0 set in a 2x3 (h x w) mask: column-major is 1,0,1,0,1,0
        let mask = ObjectMask::from_rows(&[vec![1, 1, 1], vec![0, 0, 0]]).unwrap();
        let rle = encode_mask(&mask);
        assert_eq!((rle.h, rle.w), (2, 3));
        assert_eq!(rle.counts, vec![0, 1, 1, 1, 1, 1, 1]);
        assert_eq!(area(&rle), 3);
        assert_eq!(to_object_mask(&rle), mask);
    }

    #[test]
    fn test_rle_string_matches_pycocotools() {
        // pycocotools encodes [5, 3, 92] on a 10x10 plane as "53l2"
        let rle = Rle {
            h: 10,
            w: 10,
            counts: vec![5, 3, 92],
        };
        assert_eq!(rle_to_string(&rle), "53l2");
    }

    #[test]
    fn test_rle_string_roundtrip_with_deltas() {
        let rle = Rle {
            h: 100,
            w: 100,
            counts: vec![100, 200, 30, 7, 9000, 663],
        };
        let s = rle_to_string(&rle);
        assert_eq!(rle_from_string(&s, 100, 100).unwrap(), rle);
    }

    #[test]
    fn test_decode_ignores_runs_past_the_plane() {
        let rle = Rle {
            h: 2,
            w: 2,
            counts: vec![1, 5, 3, 2],
        };
        assert_eq!(decode(&rle), vec![0, 1, 1, 1]);
        assert_eq!(to_object_mask(&rle).count(), 3);
    }

    #[test]
    fn test_encode_mask_set_everywhere() {
        let mask = ObjectMask::from_rows(&[vec![1, 1], vec![1, 1]]).unwrap();
        assert_eq!(encode_mask(&mask).counts, vec![0, 4]);
    }

    #[test]
    fn test_rle_from_string_rejects_garbage() {
        assert!(rle_from_string("\u{1}", 1, 1).is_err());
    }

    #[test]
    fn test_rasterize_square() {
        // Square spanning pixel edges of columns 1..=2 and rows 1..=2
        let square = vec![0.5, 0.5, 2.5, 0.5, 2.5, 2.5, 0.5, 2.5];
        let mask = rasterize_polygons(&[square], 4, 4);
        assert_eq!(mask.count(), 4);
        assert!(mask.get(1, 1) && mask.get(2, 2));
        assert!(!mask.get(0, 0) && !mask.get(3, 3));
    }
}

//! Boundary tracing and polygon simplification
//!
//! Contours are extracted with marching squares at level 0.5 on the mask
//! padded by one unset pixel on every side, so every contour is closed.
//! Saddle cells keep diagonal foreground pixels apart (foreground is
//! 4-connected), matching `skimage.measure.find_contours` with its default
//! `fully_connected="low"`.
//!
//! Coordinates are in the pixel-center frame: pixel `(x, y)` spans
//! `[x - 0.5, x + 0.5] x [y - 0.5, y + 0.5]`.

use std::collections::{HashMap, HashSet};

use crate::types::ObjectMask;

/// A contour vertex `(x, y)`.
pub type Point = (f64, f64);

/// Edge midpoint in doubled, padded integer coordinates.
type Key = (i64, i64);

/// Trace every closed boundary of the set region.
///
/// Each returned ring is closed: its last point repeats the first. Outer
/// boundaries and hole boundaries run in opposite directions.
pub fn find_contours(mask: &ObjectMask) -> Vec<Vec<Point>> {
    let (w, h) = (mask.width() as i64, mask.height() as i64);
    let at = |px: i64, py: i64| -> bool {
        px >= 1 && py >= 1 && px <= w && py <= h && mask.get((px - 1) as u32, (py - 1) as u32)
    };

    let mut segments: Vec<(Key, Key)> = Vec::new();
    for cy in 0..=h {
        for cx in 0..=w {
            let case = (at(cx, cy) as u8) << 3
                | (at(cx + 1, cy) as u8) << 2
                | (at(cx + 1, cy + 1) as u8) << 1
                | at(cx, cy + 1) as u8;
            if case == 0 || case == 15 {
                continue;
            }

            let top = (2 * cx + 1, 2 * cy);
            let right = (2 * cx + 2, 2 * cy + 1);
            let bottom = (2 * cx + 1, 2 * cy + 2);
            let left = (2 * cx, 2 * cy + 1);

            // Oriented so the set corners stay on the same side of every segment
            match case {
                1 => segments.push((bottom, left)),
                2 => segments.push((right, bottom)),
                3 => segments.push((right, left)),
                4 => segments.push((top, right)),
                5 => {
                    segments.push((top, right));
                    segments.push((bottom, left));
                }
                6 => segments.push((top, bottom)),
                7 => segments.push((top, left)),
                8 => segments.push((left, top)),
                9 => segments.push((bottom, top)),
                10 => {
                    segments.push((left, top));
                    segments.push((right, bottom));
                }
                11 => segments.push((right, top)),
                12 => segments.push((left, right)),
                13 => segments.push((bottom, right)),
                14 => segments.push((left, bottom)),
                _ => unreachable!("marching squares case out of range"),
            }
        }
    }

    let next: HashMap<Key, Key> = segments.iter().copied().collect();
    let mut visited: HashSet<Key> = HashSet::with_capacity(segments.len());
    let mut contours = Vec::new();

    for &(start, _) in &segments {
        if visited.contains(&start) {
            continue;
        }
        let mut ring = Vec::new();
        let mut current = start;
        loop {
            visited.insert(current);
            ring.push(to_point(current));
            match next.get(&current) {
                Some(&following) if following == start => break,
                Some(&following) if !visited.contains(&following) => current = following,
                _ => {
                    log::warn!("open contour at {:?}; dropping it", to_point(current));
                    ring.clear();
                    break;
                }
            }
        }
        if !ring.is_empty() {
            ring.push(ring[0]);
            contours.push(ring);
        }
    }

    contours
}

fn to_point((x, y): Key) -> Point {
    (x as f64 / 2.0 - 1.0, y as f64 / 2.0 - 1.0)
}

/// Simplify a polyline with the Douglas-Peucker algorithm.
///
/// Endpoints are always kept, so a closed ring stays closed. A tolerance of
/// zero or less returns the points unchanged.
pub fn approximate_polygon(points: &[Point], tolerance: f64) -> Vec<Point> {
    if tolerance <= 0.0 || points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_index = start;
        for (i, point) in points.iter().enumerate().take(end).skip(start + 1) {
            let dist = point_to_segment_distance(*point, points[start], points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }

        if max_dist > tolerance {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(&point, kept)| kept.then_some(point))
        .collect()
}

/// Distance from `p` to the line through `a` and `b`, or to `a` when they coincide.
fn point_to_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = dx.hypot(dy);
    if length == 0.0 {
        return (p.0 - a.0).hypot(p.1 - a.1);
    }
    (dy * (p.0 - a.0) - dx * (p.1 - a.1)).abs() / length
}

/// Trace, simplify and flatten the boundary of `mask` into COCO polygons.
///
/// Rings with fewer than three distinct vertices after simplification are
/// dropped. Each polygon is `[x0, y0, x1, y1, ...]` without the repeated
/// closing vertex; negative coordinates are clamped to zero.
pub fn mask_to_polygons(mask: &ObjectMask, tolerance: f64) -> Vec<Vec<f64>> {
    find_contours(mask)
        .iter()
        .filter_map(|ring| {
            let simplified = approximate_polygon(ring, tolerance);
            let open = &simplified[..simplified.len().saturating_sub(1)];
            if open.len() < 3 {
                return None;
            }
            Some(
                open.iter()
                    .flat_map(|&(x, y)| [x.max(0.0), y.max(0.0)])
                    .collect(),
            )
        })
        .collect()
}

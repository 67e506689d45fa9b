//! Hit testing: point → drawable lookup.
//!
//! Walks the drawable layers front-to-back (dynamic before base, last
//! painted first) to find which drawable is at a given container position.

use crate::contract::Group;
use crate::drawable::{Drawable, Role};
use rb_core::model::{Bounds, ShapeKind};

/// Minimum grab distance around thin strokes, in container units.
const STROKE_SLOP: f32 = 2.0;

/// Find the topmost drawable at `(px, py)`.
/// Returns `None` if nothing is hit (background).
pub fn hit_test<N>(layers: [&[Drawable<N>]; 2], px: f32, py: f32) -> Option<(Group, usize)> {
    // Walk groups and drawables in reverse (topmost first)
    for group in Group::ALL.into_iter().rev() {
        let layer = layers[group.index()];
        for (index, drawable) in layer.iter().enumerate().rev() {
            if drawable.role == Role::Overlay {
                continue;
            }
            if hit_bounds(drawable).contains(px, py) {
                return Some((group, index));
            }
        }
    }
    None
}

/// Bounds used for picking; open paths are widened so thin or axis-aligned
/// lines stay grabbable.
fn hit_bounds<N>(drawable: &Drawable<N>) -> Bounds {
    let bounds = drawable.bounds();
    match drawable.shape.kind {
        ShapeKind::Line { .. } => {
            let half = drawable.shape.style.stroke_width.unwrap_or(1.0) * drawable.placement.scale / 2.0;
            bounds.inflate(half.max(STROKE_SLOP))
        }
        _ => bounds,
    }
}

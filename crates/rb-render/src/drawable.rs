use rb_core::model::{Bounds, Shape};

/// Interactive offset and scale applied on top of a shape's own geometry.
/// Scaling pivots on the center of the shape's untransformed bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub dx: f32,
    pub dy: f32,
    pub scale: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            dx: 0.0,
            dy: 0.0,
            scale: 1.0,
        }
    }
}

impl Placement {
    pub fn is_identity(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0 && self.scale == 1.0
    }

    /// Affine coefficients `[a, b, c, d, e, f]` mapping shape space to
    /// container space.
    pub fn coeffs(&self, pivot: (f32, f32)) -> [f32; 6] {
        let s = self.scale;
        let (cx, cy) = pivot;
        [s, 0.0, 0.0, s, cx - s * cx + self.dx, cy - s * cy + self.dy]
    }

    /// `bounds` as placed on the container.
    pub fn apply(&self, bounds: Bounds) -> Bounds {
        let (cx, cy) = bounds.center();
        let width = bounds.width * self.scale;
        let height = bounds.height * self.scale;
        Bounds::new(
            cx - width / 2.0 + self.dx,
            cy - height / 2.0 + self.dy,
            width,
            height,
        )
    }
}

/// What a drawable is for, beyond its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Shape,
    /// Playable media frame.
    Media,
    /// Status text layered over a media frame.
    Overlay,
}

/// One materialized shape: the canonical record it was built from (kept
/// current through mutations), its interactive placement, and the
/// backend-native node.
#[derive(Debug)]
pub struct Drawable<N> {
    pub shape: Shape,
    /// Paint-order key: source index, then sub-position for companions.
    pub order: (usize, u8),
    pub role: Role,
    pub placement: Placement,
    pub node: N,
}

impl<N> Drawable<N> {
    pub fn new(shape: Shape, order: (usize, u8), role: Role, node: N) -> Self {
        Self {
            shape,
            order,
            role,
            placement: Placement::default(),
            node,
        }
    }

    /// Bounds as currently placed on the container.
    pub fn bounds(&self) -> Bounds {
        self.placement.apply(self.shape.bounds())
    }

    pub fn transform(&self) -> [f32; 6] {
        self.placement.coeffs(self.shape.bounds().center())
    }
}

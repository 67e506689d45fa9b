//! Canonical, backend-neutral scene model.
//!
//! A `Scene` is an ordered list of `Shape`s; order is paint order and is
//! preserved from the source document through every backend. Shape variants
//! form a closed set so every consumer matches them exhaustively.

use crate::id::ShapeId;
use std::fmt;
use std::str::FromStr;

// ─── Colors ──────────────────────────────────────────────────────────────

/// Canonical 24-bit RGB color (`0xRRGGBB`). Alpha never survives into the
/// model; opacity is a separate style attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(u32);

/// Helper to parse a single hex digit.
pub fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Rgb {
    pub const BLACK: Rgb = Rgb(0x000000);
    pub const WHITE: Rgb = Rgb(0xFFFFFF);
    pub const RED: Rgb = Rgb(0xFF0000);
    pub const GREEN: Rgb = Rgb(0x008000);

    /// Build from an integer; anything above the low 24 bits is discarded.
    pub const fn new(value: u32) -> Self {
        Self(value & 0xFF_FFFF)
    }

    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self((r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// Parse an ARGB (or plain RGB) hex string.
    ///
    /// Strips one leading `#`, left-pads to 8 digits and keeps the low 6,
    /// so `#FF112233` and `112233` both yield `0x112233`. Returns `None` for
    /// empty input, non-hex digits, or more than 8 digits.
    pub fn from_argb_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        if bytes.is_empty() || bytes.len() > 8 {
            return None;
        }
        let argb = bytes
            .iter()
            .try_fold(0u32, |acc, &c| Some(acc << 4 | hex_val(c)? as u32))?;
        Some(Self::new(argb))
    }

    /// Parse any textual color form accepted in scene documents: ARGB/RGB
    /// hex strings or a basic CSS color keyword.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::from_argb_hex(s).or_else(|| Self::from_css_name(s))
    }

    fn from_css_name(name: &str) -> Option<Self> {
        let value = match name.to_ascii_lowercase().as_str() {
            "black" => 0x000000,
            "white" => 0xFFFFFF,
            "red" => 0xFF0000,
            "green" => 0x008000,
            "lime" => 0x00FF00,
            "blue" => 0x0000FF,
            "yellow" => 0xFFFF00,
            "cyan" | "aqua" => 0x00FFFF,
            "magenta" | "fuchsia" => 0xFF00FF,
            "gray" | "grey" => 0x808080,
            "silver" => 0xC0C0C0,
            "maroon" => 0x800000,
            "olive" => 0x808000,
            "navy" => 0x000080,
            "purple" => 0x800080,
            "teal" => 0x008080,
            "orange" => 0xFFA500,
            _ => return None,
        };
        Some(Self(value))
    }

    /// Emit as `#RRGGBB`.
    pub fn to_hex(self) -> String {
        format!("#{:06X}", self.0)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

// ─── Geometry ────────────────────────────────────────────────────────────

/// A coordinate pair, relative to its shape's `(x, y)` origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounds in container space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Grow uniformly on every side (used for stroke hit tolerance).
    pub fn inflate(&self, by: f32) -> Self {
        Self::new(
            self.x - by,
            self.y - by,
            self.width + by * 2.0,
            self.height + by * 2.0,
        )
    }

    /// Smallest bounds enclosing every point, offset by `(dx, dy)`.
    pub fn enclosing(points: &[Point], dx: f32, dy: f32) -> Self {
        let Some(first) = points.first() else {
            return Self::new(dx, dy, 0.0, 0.0);
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self::new(dx + min_x, dy + min_y, max_x - min_x, max_y - min_y)
    }
}

// ─── Styling ─────────────────────────────────────────────────────────────

/// Paint attributes shared by every shape variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub fill: Option<Rgb>,
    pub stroke: Option<Rgb>,
    pub stroke_width: Option<f32>,
    pub opacity: Option<f32>,
}

impl Style {
    /// Opacity clamped to `[0, 1]`; absent means fully opaque.
    pub fn alpha(&self) -> f32 {
        self.opacity.unwrap_or(1.0).clamp(0.0, 1.0)
    }

    /// Stroke color and width, when the shape is stroked at all.
    /// A stroke color without a width strokes at 1 unit.
    pub fn stroke_paint(&self) -> Option<(Rgb, f32)> {
        let color = self.stroke?;
        let width = self.stroke_width.unwrap_or(1.0);
        (width > 0.0).then_some((color, width))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontSpec {
    pub family: Option<String>,
    pub size: Option<f32>,
}

impl FontSpec {
    pub const DEFAULT_FAMILY: &'static str = "sans-serif";
    pub const DEFAULT_SIZE: f32 = 16.0;

    pub fn family_or_default(&self) -> &str {
        self.family.as_deref().unwrap_or(Self::DEFAULT_FAMILY)
    }

    pub fn size_or_default(&self) -> f32 {
        self.size.filter(|s| *s > 0.0).unwrap_or(Self::DEFAULT_SIZE)
    }
}

// ─── Shapes ──────────────────────────────────────────────────────────────

/// Payload-free discriminant of `ShapeKind`, matching the `type` field of
/// scene records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Rect,
    Line,
    Polygon,
    Text,
    Image,
    Ecad,
    Video,
}

impl ShapeType {
    pub const ALL: [ShapeType; 7] = [
        ShapeType::Rect,
        ShapeType::Line,
        ShapeType::Polygon,
        ShapeType::Text,
        ShapeType::Image,
        ShapeType::Ecad,
        ShapeType::Video,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ShapeType::Rect => "rect",
            ShapeType::Line => "line",
            ShapeType::Polygon => "polygon",
            ShapeType::Text => "text",
            ShapeType::Image => "image",
            ShapeType::Ecad => "ecad",
            ShapeType::Video => "video",
        }
    }

    /// Whether this variant's content is an externally loaded resource.
    pub const fn is_resource(self) -> bool {
        matches!(self, ShapeType::Image | ShapeType::Ecad)
    }
}

impl FromStr for ShapeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShapeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown shape type `{s}`"))
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific geometry and content.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Rect {
        w: f32,
        h: f32,
    },
    /// Open polyline.
    Line {
        points: Vec<Point>,
    },
    /// Closed polyline.
    Polygon {
        points: Vec<Point>,
    },
    Text {
        value: String,
        w: f32,
        h: f32,
        font: FontSpec,
    },
    Image {
        url: String,
        w: f32,
        h: f32,
    },
    /// Vector artwork (an SVG document) loaded from `url`.
    Ecad {
        url: String,
        w: f32,
        h: f32,
    },
    Video {
        url: String,
        w: f32,
        h: f32,
    },
}

impl ShapeKind {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            ShapeKind::Rect { .. } => ShapeType::Rect,
            ShapeKind::Line { .. } => ShapeType::Line,
            ShapeKind::Polygon { .. } => ShapeType::Polygon,
            ShapeKind::Text { .. } => ShapeType::Text,
            ShapeKind::Image { .. } => ShapeType::Image,
            ShapeKind::Ecad { .. } => ShapeType::Ecad,
            ShapeKind::Video { .. } => ShapeType::Video,
        }
    }
}

/// Minimum number of points for a line or polygon to be materialized.
pub const MIN_PATH_POINTS: usize = 2;

/// One element of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: ShapeId,
    /// Optional semantic tag (e.g. `arrow`) used by targeted commands.
    pub name: Option<String>,
    pub x: f32,
    pub y: f32,
    pub style: Style,
    pub draggable: bool,
    pub scaleable: bool,
    pub kind: ShapeKind,
}

impl Shape {
    pub fn new(id: ShapeId, x: f32, y: f32, kind: ShapeKind) -> Self {
        Self {
            id,
            name: None,
            x,
            y,
            style: Style::default(),
            draggable: false,
            scaleable: false,
            kind,
        }
    }

    pub fn rect(id: &str, x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(ShapeId::intern(id), x, y, ShapeKind::Rect { w, h })
    }

    pub fn line(id: &str, x: f32, y: f32, points: Vec<Point>) -> Self {
        Self::new(ShapeId::intern(id), x, y, ShapeKind::Line { points })
    }

    pub fn text(id: &str, x: f32, y: f32, value: impl Into<String>) -> Self {
        Self::new(
            ShapeId::intern(id),
            x,
            y,
            ShapeKind::Text {
                value: value.into(),
                w: 0.0,
                h: 0.0,
                font: FontSpec::default(),
            },
        )
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_fill(mut self, fill: Rgb) -> Self {
        self.style.fill = Some(fill);
        self
    }

    pub fn with_stroke(mut self, stroke: Rgb, width: f32) -> Self {
        self.style.stroke = Some(stroke);
        self.style.stroke_width = Some(width);
        self
    }

    pub fn draggable(mut self) -> Self {
        self.draggable = true;
        self
    }

    pub fn scaleable(mut self) -> Self {
        self.scaleable = true;
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn shape_type(&self) -> ShapeType {
        self.kind.shape_type()
    }

    /// Line and polygon shapes need at least `MIN_PATH_POINTS` points;
    /// every other variant is always materializable.
    pub fn is_materializable(&self) -> bool {
        match &self.kind {
            ShapeKind::Line { points } | ShapeKind::Polygon { points } => {
                points.len() >= MIN_PATH_POINTS
            }
            _ => true,
        }
    }

    /// Untransformed bounds in container space.
    pub fn bounds(&self) -> Bounds {
        match &self.kind {
            ShapeKind::Rect { w, h }
            | ShapeKind::Image { w, h, .. }
            | ShapeKind::Ecad { w, h, .. }
            | ShapeKind::Video { w, h, .. } => Bounds::new(self.x, self.y, *w, *h),
            ShapeKind::Line { points } | ShapeKind::Polygon { points } => {
                Bounds::enclosing(points, self.x, self.y)
            }
            ShapeKind::Text { value, w, h, font } => {
                let size = font.size_or_default();
                // Without shaping, approximate the advance as 0.6em per char.
                let width = if *w > 0.0 {
                    *w
                } else {
                    value.chars().count() as f32 * size * 0.6
                };
                let height = if *h > 0.0 { *h } else { size * 1.2 };
                Bounds::new(self.x, self.y, width, height)
            }
        }
    }
}

// ─── Scene ───────────────────────────────────────────────────────────────

/// Ordered shape list; index order is paint (z) order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    shapes: Vec<Shape>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene, dropping shapes that cannot be materialized.
    pub fn from_shapes(shapes: impl IntoIterator<Item = Shape>) -> Self {
        let mut scene = Self::new();
        for shape in shapes {
            scene.push(shape);
        }
        scene
    }

    /// Append a shape at the top of the z-order. Under-specified lines and
    /// polygons are dropped; returns whether the shape was kept.
    pub fn push(&mut self, shape: Shape) -> bool {
        if !shape.is_materializable() {
            log::debug!(
                "dropping {} {} with fewer than {MIN_PATH_POINTS} points",
                shape.shape_type(),
                shape.id
            );
            return false;
        }
        self.shapes.push(shape);
        true
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Shape> {
        self.shapes.iter()
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn into_shapes(self) -> Vec<Shape> {
        self.shapes
    }
}

impl<'a> IntoIterator for &'a Scene {
    type Item = &'a Shape;
    type IntoIter = std::slice::Iter<'a, Shape>;

    fn into_iter(self) -> Self::IntoIter {
        self.shapes.iter()
    }
}

impl FromIterator<Shape> for Scene {
    fn from_iter<I: IntoIterator<Item = Shape>>(iter: I) -> Self {
        Self::from_shapes(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_hex_drops_alpha() {
        assert_eq!(Rgb::from_argb_hex("#FF112233"), Some(Rgb::new(0x112233)));
        assert_eq!(Rgb::from_argb_hex("FF112233"), Some(Rgb::new(0x112233)));
        assert_eq!(Rgb::from_argb_hex("#00112233"), Some(Rgb::new(0x112233)));
    }

    #[test]
    fn rgb_hex_is_left_padded() {
        assert_eq!(Rgb::from_argb_hex("112233"), Some(Rgb::new(0x112233)));
        assert_eq!(Rgb::from_argb_hex("#112233"), Some(Rgb::new(0x112233)));
        assert_eq!(Rgb::from_argb_hex("#FFF"), Some(Rgb::new(0x000FFF)));
    }

    #[test]
    fn argb_hex_rejects_garbage() {
        assert_eq!(Rgb::from_argb_hex(""), None);
        assert_eq!(Rgb::from_argb_hex("#"), None);
        assert_eq!(Rgb::from_argb_hex("#GG112233"), None);
        assert_eq!(Rgb::from_argb_hex("#1FF112233"), None);
    }

    #[test]
    fn every_eight_digit_form_keeps_low_24_bits() {
        for argb in [0x00000000u32, 0xFFFFFFFF, 0x80FF8000, 0x12345678, 0xDEADBEEF] {
            let hex = format!("#{argb:08X}");
            assert_eq!(Rgb::from_argb_hex(&hex), Some(Rgb::new(argb & 0xFF_FFFF)));
            let lower = format!("{argb:08x}");
            assert_eq!(Rgb::from_argb_hex(&lower), Some(Rgb::new(argb & 0xFF_FFFF)));
        }
    }

    #[test]
    fn css_names_and_hex_parse() {
        assert_eq!(Rgb::parse("green"), Some(Rgb::GREEN));
        assert_eq!(Rgb::parse("Red"), Some(Rgb::RED));
        assert_eq!(Rgb::parse("#00FF00"), Some(Rgb::new(0x00FF00)));
        assert_eq!(Rgb::parse("chartreuse-ish"), None);
    }

    #[test]
    fn rgb_channels_and_hex() {
        let c = Rgb::from_rgb8(0x12, 0x34, 0x56);
        assert_eq!((c.r(), c.g(), c.b()), (0x12, 0x34, 0x56));
        assert_eq!(c.to_hex(), "#123456");
        assert_eq!(Rgb::new(0xAB123456), Rgb::new(0x123456));
    }

    #[test]
    fn scene_drops_short_paths() {
        let scene = Scene::from_shapes([
            Shape::line("a", 0.0, 0.0, vec![Point::new(1.0, 2.0)]),
            Shape::line("b", 0.0, 0.0, vec![Point::new(1.0, 2.0), Point::new(4.0, 5.0)]),
            Shape::rect("c", 0.0, 0.0, 10.0, 10.0),
        ]);
        let ids: Vec<&str> = scene.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    #[test]
    fn path_bounds_include_origin_offset() {
        let line = Shape::line(
            "l",
            10.0,
            20.0,
            vec![Point::new(0.0, 5.0), Point::new(30.0, -5.0)],
        );
        assert_eq!(line.bounds(), Bounds::new(10.0, 15.0, 30.0, 10.0));
    }

    #[test]
    fn shape_type_parses_from_record_tag() {
        assert_eq!("ecad".parse::<ShapeType>(), Ok(ShapeType::Ecad));
        assert!("circle".parse::<ShapeType>().is_err());
    }
}

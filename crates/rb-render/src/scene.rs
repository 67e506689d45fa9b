//! Retained scene-graph backend on Vello.
//!
//! Each drawable owns an encoded fragment in absolute container
//! coordinates. Updates re-encode only the touched fragment; a present
//! rebuilds the root scene by appending every fragment under its
//! placement transform. The root is what a GPU presenter would submit.

use crate::container::{Container, Size};
use crate::contract::{BackendKind, DragHooks, Handle, RedrawMode, RenderContext, Renderer};
use crate::drawable::{Drawable, Placement};
use crate::raster::Resource;
use crate::stage::{NativeBackend, Stage};
use crate::text::FontBook;
use async_trait::async_trait;
use kurbo::{Affine, BezPath, Rect, Stroke as KurboStroke};
use peniko::{Blob, Color, Fill, Font, Image, ImageFormat};
use rb_core::model::{Point, Rgb, Scene, Shape, ShapeKind, Style};
use std::sync::Arc;

const MEDIA_BACKDROP: Rgb = Rgb::new(0x202020);

pub struct SceneNode {
    pub fragment: vello::Scene,
    image: Option<Image>,
}

/// Layout source plus the same face as a vello font resource.
struct Face {
    book: Arc<FontBook>,
    font: Font,
}

pub struct SceneBackend {
    root: vello::Scene,
    size: Size,
    face: Option<Face>,
    encodes: u64,
}

impl SceneBackend {
    pub fn new() -> Self {
        Self {
            root: vello::Scene::new(),
            size: Size::default(),
            face: None,
            encodes: 0,
        }
    }

    pub fn with_fonts(mut self, fonts: Option<Arc<FontBook>>) -> Self {
        self.face = fonts.map(|book| Face {
            font: Font::new(Blob::new(book.data()), 0),
            book,
        });
        self
    }

    /// The scene assembled by the last present.
    pub fn root(&self) -> &vello::Scene {
        &self.root
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Fragment encodings performed so far.
    pub fn encodes(&self) -> u64 {
        self.encodes
    }

    fn node(&mut self, shape: &Shape, image: Option<Image>) -> SceneNode {
        self.encodes += 1;
        SceneNode {
            fragment: encode(shape, image.as_ref(), self.face.as_ref()),
            image,
        }
    }
}

impl Default for SceneBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend for SceneBackend {
    type Node = SceneNode;

    const KIND: BackendKind = BackendKind::Scene;
    const REDRAW: RedrawMode = RedrawMode::Forced;

    fn attach(&mut self, size: Size) {
        self.size = size;
        self.root.reset();
    }

    fn resize(&mut self, size: Size) {
        self.size = size;
    }

    fn build(&mut self, shape: &Shape) -> Option<SceneNode> {
        match shape.kind {
            ShapeKind::Image { .. } | ShapeKind::Ecad { .. } => None,
            _ => Some(self.node(shape, None)),
        }
    }

    fn build_resource(&mut self, shape: &Shape, resource: &Resource) -> Option<SceneNode> {
        let raster = resource.raster();
        if raster.width == 0 || raster.height == 0 {
            return None;
        }
        let image = Image::new(
            Blob::new(raster.rgba8_premul.clone()),
            ImageFormat::Rgba8,
            raster.width,
            raster.height,
        );
        Some(self.node(shape, Some(image)))
    }

    fn update(&mut self, node: &mut SceneNode, shape: &Shape, _placement: &Placement) {
        // Placement is applied when the fragment is appended.
        node.fragment = encode(shape, node.image.as_ref(), self.face.as_ref());
        self.encodes += 1;
    }

    fn present(&mut self, layers: [&[Drawable<SceneNode>]; 2]) {
        self.root.reset();
        for d in layers.into_iter().flatten() {
            let coeffs = d.transform().map(f64::from);
            self.root.append(&d.node.fragment, Some(Affine::new(coeffs)));
        }
    }

    fn detach(&mut self) {
        self.root.reset();
    }
}

// ─── Encoding ────────────────────────────────────────────────────────────

fn encode(shape: &Shape, image: Option<&Image>, face: Option<&Face>) -> vello::Scene {
    let mut fragment = vello::Scene::new();
    let style = &shape.style;
    let (x, y) = (shape.x as f64, shape.y as f64);

    match &shape.kind {
        ShapeKind::Rect { w, h } => {
            let rect = Rect::new(x, y, x + *w as f64, y + *h as f64);
            fill_shape(&mut fragment, &rect, style.fill, style);
            stroke_shape(&mut fragment, &rect, style);
        }
        ShapeKind::Line { points } => {
            stroke_shape(&mut fragment, &poly_path(x, y, points, false), style);
        }
        ShapeKind::Polygon { points } => {
            let path = poly_path(x, y, points, true);
            fill_shape(&mut fragment, &path, style.fill, style);
            stroke_shape(&mut fragment, &path, style);
        }
        ShapeKind::Text { value, font, .. } => match face {
            Some(face) => {
                let size = font.size_or_default();
                let layout = face.book.layout(value, size);
                let baseline = shape.y + layout.ascent;
                let fill = style.fill.unwrap_or(Rgb::BLACK);
                fragment
                    .draw_glyphs(&face.font)
                    .font_size(size)
                    .brush(color(fill, style.alpha()))
                    .draw(
                        Fill::NonZero,
                        layout.glyphs.iter().map(|g| vello::Glyph {
                            id: u32::from(g.id),
                            x: shape.x + g.x,
                            y: baseline,
                        }),
                    );
            }
            None => log::trace!("TEXT @{} {:?} at ({x}, {y}) has no face", shape.id, value),
        },
        ShapeKind::Image { w, h, .. } | ShapeKind::Ecad { w, h, .. } => {
            if let Some(image) = image {
                let sx = *w as f64 / image.width as f64;
                let sy = *h as f64 / image.height as f64;
                let placed = Affine::translate((x, y)) * Affine::scale_non_uniform(sx, sy);
                fragment.draw_image(&image.clone().with_alpha(style.alpha()), placed);
            }
            let outline = Rect::new(x, y, x + *w as f64, y + *h as f64);
            stroke_shape(&mut fragment, &outline, style);
        }
        ShapeKind::Video { w, h, .. } => {
            let rect = Rect::new(x, y, x + *w as f64, y + *h as f64);
            fill_shape(&mut fragment, &rect, Some(MEDIA_BACKDROP), style);
            stroke_shape(&mut fragment, &rect, style);
        }
    }
    fragment
}

fn poly_path(x: f64, y: f64, points: &[Point], closed: bool) -> BezPath {
    let mut bez = BezPath::new();
    for (i, p) in points.iter().enumerate() {
        let pt = (x + p.x as f64, y + p.y as f64);
        if i == 0 {
            bez.move_to(pt);
        } else {
            bez.line_to(pt);
        }
    }
    if closed {
        bez.close_path();
    }
    bez
}

fn fill_shape<S: kurbo::Shape>(scene: &mut vello::Scene, shape: &S, fill: Option<Rgb>, style: &Style) {
    if let Some(fill) = fill {
        scene.fill(Fill::NonZero, Affine::IDENTITY, color(fill, style.alpha()), None, shape);
    }
}

fn stroke_shape<S: kurbo::Shape>(scene: &mut vello::Scene, shape: &S, style: &Style) {
    if let Some((stroke, width)) = style.stroke_paint() {
        scene.stroke(
            &KurboStroke::new(width as f64),
            Affine::IDENTITY,
            color(stroke, style.alpha()),
            None,
            shape,
        );
    }
}

fn color(rgb: Rgb, alpha: f32) -> Color {
    Color::from_rgba8(rgb.r(), rgb.g(), rgb.b(), (alpha * 255.0).round() as u8)
}

// ─── Adapter ─────────────────────────────────────────────────────────────

/// Retained scene-graph adapter.
pub struct SceneRenderer;

#[async_trait(?Send)]
impl Renderer for SceneRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Scene
    }

    async fn create(
        &self,
        target: Option<&Container>,
        scene: &Scene,
        hooks: DragHooks,
        ctx: &RenderContext,
    ) -> Handle {
        let backend = SceneBackend::new().with_fonts(ctx.fonts.clone());
        Stage::create(backend, target, scene, hooks, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_face_encodes_nothing() {
        let fragment = encode(&Shape::text("t", 0.0, 0.0, "hi"), None, None);
        assert!(fragment.encoding().is_empty());
    }

    #[test]
    fn text_encodes_glyph_run() {
        let Some(fonts) = FontBook::system() else {
            eprintln!("no system font installed, skipping");
            return;
        };
        let mut backend = SceneBackend::new().with_fonts(Some(fonts));
        let node = backend.build(&Shape::text("t", 4.0, 4.0, "Updated!")).unwrap();
        let resources = &node.fragment.encoding().resources;
        assert_eq!(resources.glyph_runs.len(), 1);
        assert_eq!(resources.glyphs.len(), 8);
    }

    #[test]
    fn update_reencodes_fragment() {
        let mut backend = SceneBackend::new();
        let shape = Shape::rect("r", 0.0, 0.0, 10.0, 10.0).with_fill(Rgb::RED);
        let mut node = backend.build(&shape).unwrap();
        assert!(!node.fragment.encoding().is_empty());
        backend.update(&mut node, &shape, &Placement::default());
        assert_eq!(backend.encodes(), 2);
    }

    #[test]
    fn unfilled_unstroked_rect_is_empty() {
        let fragment = encode(&Shape::rect("r", 0.0, 0.0, 10.0, 10.0), None, None);
        assert!(fragment.encoding().is_empty());
    }
}

//! Immediate-mode raster backend on `tiny-skia`.
//!
//! Nodes hold prebuilt paths and decoded pixmaps, but nothing is retained on
//! the surface itself: every present clears the pixmap and repaints all
//! drawables from their current shape state and placement. Mutations are
//! therefore visible only after the next redraw, which the render loop
//! forces every frame. Text is the exception: its glyph coverage is
//! rasterized into a small pixmap on build and on every update.

use crate::container::{Container, Size};
use crate::contract::{BackendKind, DragHooks, Handle, RedrawMode, RenderContext, Renderer};
use crate::drawable::{Drawable, Placement, Role};
use crate::raster::Resource;
use crate::stage::{NativeBackend, Stage};
use crate::text::FontBook;
use async_trait::async_trait;
use rb_core::model::{Point, Rgb, Scene, Shape, ShapeKind};
use std::sync::Arc;
use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, Transform,
};

/// Backdrop painted behind video frames.
const MEDIA_BACKDROP: Rgb = Rgb::new(0x202020);

pub enum CanvasNode {
    /// Rect, polyline or polygon outline. `None` when the geometry is
    /// degenerate (zero-sized rect).
    Path { path: Option<Path>, closed: bool },
    /// Tinted glyph run drawn at the shape origin. `None` without a font
    /// or for empty text.
    Text { run: Option<Pixmap> },
    Bitmap { pixmap: Pixmap, outline: Option<Path> },
}

pub struct CanvasBackend {
    pixmap: Option<Pixmap>,
    background: Color,
    fonts: Option<Arc<FontBook>>,
    frames: u64,
}

impl CanvasBackend {
    pub fn new() -> Self {
        Self {
            pixmap: None,
            background: Color::WHITE,
            fonts: None,
            frames: 0,
        }
    }

    pub fn with_fonts(mut self, fonts: Option<Arc<FontBook>>) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Frames painted since attach.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn text_run(&self, shape: &Shape) -> Option<Pixmap> {
        let ShapeKind::Text { value, font, .. } = &shape.kind else {
            return None;
        };
        let coverage = self.fonts.as_ref()?.rasterize(value, font.size_or_default())?;
        let color = shape.style.fill.unwrap_or(Rgb::BLACK);
        let size = IntSize::from_wh(coverage.width, coverage.height)?;
        Pixmap::from_vec(coverage.tint(color, shape.style.alpha()), size)
    }

    /// Demultiplied RGBA at a pixel, if attached and in range.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.pixmap.as_ref()?.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }
}

impl Default for CanvasBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend for CanvasBackend {
    type Node = CanvasNode;

    const KIND: BackendKind = BackendKind::Canvas;
    const REDRAW: RedrawMode = RedrawMode::Forced;

    fn attach(&mut self, size: Size) {
        self.pixmap = Pixmap::new(size.width, size.height);
        if self.pixmap.is_none() {
            log::warn!("canvas: zero-sized container {size}, painting disabled");
        }
        self.frames = 0;
    }

    fn resize(&mut self, size: Size) {
        self.attach(size);
    }

    fn build(&mut self, shape: &Shape) -> Option<CanvasNode> {
        let (x, y) = (shape.x, shape.y);
        match &shape.kind {
            ShapeKind::Rect { w, h } | ShapeKind::Video { w, h, .. } => Some(CanvasNode::Path {
                path: rect_path(x, y, *w, *h),
                closed: true,
            }),
            ShapeKind::Line { points } => Some(CanvasNode::Path {
                path: Some(poly_path(x, y, points, false)?),
                closed: false,
            }),
            ShapeKind::Polygon { points } => Some(CanvasNode::Path {
                path: Some(poly_path(x, y, points, true)?),
                closed: true,
            }),
            ShapeKind::Text { .. } => Some(CanvasNode::Text {
                run: self.text_run(shape),
            }),
            ShapeKind::Image { .. } | ShapeKind::Ecad { .. } => None,
        }
    }

    fn build_resource(&mut self, shape: &Shape, resource: &Resource) -> Option<CanvasNode> {
        let raster = resource.raster();
        let size = IntSize::from_wh(raster.width, raster.height)?;
        let pixmap = Pixmap::from_vec(raster.rgba8_premul.as_ref().clone(), size)?;
        let b = shape.bounds();
        Some(CanvasNode::Bitmap {
            pixmap,
            outline: rect_path(b.x, b.y, b.width, b.height),
        })
    }

    fn update(&mut self, node: &mut CanvasNode, shape: &Shape, _placement: &Placement) {
        // Paths and bitmaps read shape state at present time.
        if let CanvasNode::Text { run } = node {
            *run = self.text_run(shape);
        }
    }

    fn present(&mut self, layers: [&[Drawable<CanvasNode>]; 2]) {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };
        pixmap.fill(self.background);
        for d in layers.into_iter().flatten() {
            paint_drawable(pixmap, d);
        }
        self.frames += 1;
    }

    fn detach(&mut self) {
        self.pixmap = None;
    }
}

// ─── Painting ────────────────────────────────────────────────────────────

fn paint_drawable(pixmap: &mut Pixmap, d: &Drawable<CanvasNode>) {
    let [a, b, c, e, f, g] = d.transform();
    let transform = Transform::from_row(a, b, c, e, f, g);
    let style = &d.shape.style;
    let alpha = style.alpha();

    match &d.node {
        CanvasNode::Path { path, closed } => {
            let Some(path) = path else {
                return;
            };
            let fill = if d.role == Role::Media {
                Some(MEDIA_BACKDROP)
            } else if *closed {
                style.fill
            } else {
                None
            };
            if let Some(fill) = fill {
                pixmap.fill_path(path, &paint(fill, alpha), FillRule::Winding, transform, None);
            }
            stroke(pixmap, path, d, transform);
        }
        CanvasNode::Text { run: Some(run) } => {
            let placed = transform.pre_translate(d.shape.x, d.shape.y);
            pixmap.draw_pixmap(0, 0, run.as_ref(), &PixmapPaint::default(), placed, None);
        }
        CanvasNode::Text { run: None } => {
            if let ShapeKind::Text { value, .. } = &d.shape.kind {
                log::trace!("TEXT @{} {:?} at ({}, {}) has no glyphs", d.shape.id, value, d.shape.x, d.shape.y);
            }
        }
        CanvasNode::Bitmap { pixmap: image, outline } => {
            let bounds = d.shape.bounds();
            let sx = bounds.width / image.width() as f32;
            let sy = bounds.height / image.height() as f32;
            let placed = transform.pre_translate(bounds.x, bounds.y).pre_scale(sx, sy);
            let image_paint = PixmapPaint {
                opacity: alpha,
                quality: FilterQuality::Bilinear,
                ..PixmapPaint::default()
            };
            pixmap.draw_pixmap(0, 0, image.as_ref(), &image_paint, placed, None);
            if let Some(outline) = outline {
                stroke(pixmap, outline, d, transform);
            }
        }
    }
}

fn stroke(pixmap: &mut Pixmap, path: &Path, d: &Drawable<CanvasNode>, transform: Transform) {
    if let Some((color, width)) = d.shape.style.stroke_paint() {
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        pixmap.stroke_path(path, &paint(color, d.shape.style.alpha()), &stroke, transform, None);
    }
}

fn paint(color: Rgb, alpha: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r(), color.g(), color.b(), (alpha * 255.0).round() as u8);
    paint.anti_alias = true;
    paint
}

fn rect_path(x: f32, y: f32, w: f32, h: f32) -> Option<Path> {
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    Rect::from_xywh(x, y, w, h).map(PathBuilder::from_rect)
}

fn poly_path(x: f32, y: f32, points: &[Point], closed: bool) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(x + first.x, y + first.y);
    for p in rest {
        pb.line_to(x + p.x, y + p.y);
    }
    if closed {
        pb.close();
    }
    pb.finish()
}

// ─── Adapter ─────────────────────────────────────────────────────────────

/// Immediate canvas adapter.
pub struct CanvasRenderer;

#[async_trait(?Send)]
impl Renderer for CanvasRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Canvas
    }

    async fn create(
        &self,
        target: Option<&Container>,
        scene: &Scene,
        hooks: DragHooks,
        ctx: &RenderContext,
    ) -> Handle {
        let backend = CanvasBackend::new().with_fonts(ctx.fonts.clone());
        Stage::create(backend, target, scene, hooks, ctx).await
    }
}

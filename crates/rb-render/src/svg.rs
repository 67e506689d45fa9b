//! DOM-style vector backend.
//!
//! Each drawable is an element subtree. Changes are written straight into
//! the element attributes, so the document is always current and no redraw
//! is needed. Vector artwork is embedded as a nested `<svg>` element; the
//! whole document serializes through [`Stage::markup`].

use crate::container::{Container, Size};
use crate::contract::{BackendKind, DragHooks, Group, Handle, RedrawMode, RenderContext, Renderer};
use crate::drawable::{Drawable, Placement};
use crate::raster::Resource;
use crate::stage::{NativeBackend, Stage};
use async_trait::async_trait;
use rb_core::model::{Point, Scene, Shape, ShapeKind, Style};
use rb_core::xml::{Element, parse_xml};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Group element ids in the serialized document.
pub const BASE_GROUP_ID: &str = "base";
pub const DYNAMIC_GROUP_ID: &str = "dynamic-layer";

pub struct SvgNode {
    pub element: Element,
}

pub struct SvgBackend {
    size: Size,
    attached: bool,
}

impl SvgBackend {
    pub fn new() -> Self {
        Self {
            size: Size::default(),
            attached: false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl Default for SvgBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend for SvgBackend {
    type Node = SvgNode;

    const KIND: BackendKind = BackendKind::Svg;
    const REDRAW: RedrawMode = RedrawMode::Automatic;

    fn attach(&mut self, size: Size) {
        self.size = size;
        self.attached = true;
    }

    fn resize(&mut self, size: Size) {
        self.size = size;
    }

    fn build(&mut self, shape: &Shape) -> Option<SvgNode> {
        let (x, y) = (shape.x, shape.y);
        let element = match &shape.kind {
            ShapeKind::Rect { w, h } => {
                let mut el = Element::new("rect");
                set_box(&mut el, x, y, *w, *h);
                el
            }
            ShapeKind::Line { points } => {
                let mut el = Element::new("polyline");
                el.set_attr("points", points_attr(x, y, points));
                el
            }
            ShapeKind::Polygon { points } => {
                let mut el = Element::new("polygon");
                el.set_attr("points", points_attr(x, y, points));
                el
            }
            ShapeKind::Text { font, .. } => {
                let mut el = Element::new("text");
                el.set_attr("x", x.to_string());
                el.set_attr("y", y.to_string());
                el.set_attr("font-family", font.family_or_default());
                el.set_attr("font-size", font.size_or_default().to_string());
                el.set_attr("dominant-baseline", "hanging");
                el
            }
            ShapeKind::Video { url, w, h } => {
                let mut video = Element::new("video");
                video.set_attr("xmlns", XHTML_NS);
                video.set_attr("src", url.as_str());
                video.set_attr("width", w.to_string());
                video.set_attr("height", h.to_string());
                let mut frame = Element::new("foreignObject");
                set_box(&mut frame, x, y, *w, *h);
                frame.children.push(video);
                framed(frame, x, y, *w, *h)
            }
            ShapeKind::Image { .. } | ShapeKind::Ecad { .. } => return None,
        };
        let mut node = SvgNode { element };
        node.element.set_attr("id", shape.id.as_str());
        write_state(&mut node.element, shape, &Placement::default());
        Some(node)
    }

    fn build_resource(&mut self, shape: &Shape, resource: &Resource) -> Option<SvgNode> {
        let (url, w, h) = match &shape.kind {
            ShapeKind::Image { url, w, h } | ShapeKind::Ecad { url, w, h } => (url, *w, *h),
            _ => return None,
        };
        let (x, y) = (shape.x, shape.y);
        let content = match resource {
            Resource::Vector { markup, .. } => match parse_xml(markup) {
                Ok(mut root) if root.name == "svg" => {
                    set_box(&mut root, x, y, w, h);
                    root
                }
                Ok(root) => {
                    log::warn!("{}: root element is <{}>, embedding as image", url, root.name);
                    image_element(url, x, y, w, h)
                }
                Err(e) => {
                    log::warn!("{url}: cannot embed artwork ({e}), embedding as image");
                    image_element(url, x, y, w, h)
                }
            },
            Resource::Bitmap(_) => image_element(url, x, y, w, h),
        };
        let mut node = SvgNode {
            element: framed(content, x, y, w, h),
        };
        node.element.set_attr("id", shape.id.as_str());
        write_state(&mut node.element, shape, &Placement::default());
        Some(node)
    }

    fn update(&mut self, node: &mut SvgNode, shape: &Shape, placement: &Placement) {
        write_state(&mut node.element, shape, placement);
    }

    fn present(&mut self, _layers: [&[Drawable<SvgNode>]; 2]) {}

    fn detach(&mut self) {
        self.attached = false;
    }
}

// ─── Elements ────────────────────────────────────────────────────────────

fn set_box(el: &mut Element, x: f32, y: f32, w: f32, h: f32) {
    el.set_attr("x", x.to_string());
    el.set_attr("y", y.to_string());
    el.set_attr("width", w.to_string());
    el.set_attr("height", h.to_string());
}

fn points_attr(x: f32, y: f32, points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", x + p.x, y + p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn image_element(url: &str, x: f32, y: f32, w: f32, h: f32) -> Element {
    let mut el = Element::new("image");
    el.set_attr("href", url);
    set_box(&mut el, x, y, w, h);
    el.set_attr("preserveAspectRatio", "none");
    el
}

/// Wrap media content in a group whose last child is the stroke outline.
fn framed(content: Element, x: f32, y: f32, w: f32, h: f32) -> Element {
    let mut outline = Element::new("rect");
    set_box(&mut outline, x, y, w, h);
    outline.set_attr("fill", "none");
    let mut group = Element::new("g");
    group.children = vec![content, outline];
    group
}

/// Write paint, text content and placement onto a node's element.
fn write_state(el: &mut Element, shape: &Shape, placement: &Placement) {
    let style = &shape.style;
    match &shape.kind {
        ShapeKind::Rect { .. } | ShapeKind::Polygon { .. } => {
            el.set_attr("fill", paint_attr(style.fill));
            write_stroke(el, style);
        }
        ShapeKind::Line { .. } => {
            el.set_attr("fill", "none");
            write_stroke(el, style);
        }
        ShapeKind::Text { value, .. } => {
            el.set_attr("fill", paint_attr(style.fill.or(Some(rb_core::Rgb::BLACK))));
            el.text = value.clone();
        }
        ShapeKind::Image { .. } | ShapeKind::Ecad { .. } | ShapeKind::Video { .. } => {
            if let Some(outline) = el.children.last_mut() {
                write_stroke(outline, style);
            }
        }
    }

    match style.opacity {
        Some(_) => el.set_attr("opacity", style.alpha().to_string()),
        None => {
            el.remove_attr("opacity");
        }
    }

    if placement.is_identity() {
        el.remove_attr("transform");
    } else {
        let [a, b, c, d, e, f] = placement.coeffs(shape.bounds().center());
        el.set_attr("transform", format!("matrix({a} {b} {c} {d} {e} {f})"));
    }
}

fn write_stroke(el: &mut Element, style: &Style) {
    match style.stroke_paint() {
        Some((color, width)) => {
            el.set_attr("stroke", color.to_hex());
            el.set_attr("stroke-width", width.to_string());
        }
        None => {
            el.set_attr("stroke", "none");
            el.remove_attr("stroke-width");
        }
    }
}

fn paint_attr(color: Option<rb_core::Rgb>) -> String {
    color.map_or_else(|| "none".to_string(), |c| c.to_hex())
}

impl Stage<SvgBackend> {
    /// Serialize the live document.
    pub fn markup(&self) -> String {
        let size = self.size();
        let mut out = format!(
            "<svg xmlns=\"{SVG_NS}\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
            w = size.width,
            h = size.height
        );
        for (group, id) in [(Group::Base, BASE_GROUP_ID), (Group::Dynamic, DYNAMIC_GROUP_ID)] {
            out.push_str(&format!("<g id=\"{id}\">"));
            for d in self.layer(group) {
                d.node.element.write_markup(&mut out);
            }
            out.push_str("</g>");
        }
        out.push_str("</svg>");
        out
    }
}

// ─── Adapter ─────────────────────────────────────────────────────────────

/// DOM/SVG adapter.
pub struct SvgRenderer;

#[async_trait(?Send)]
impl Renderer for SvgRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Svg
    }

    async fn create(
        &self,
        target: Option<&Container>,
        scene: &Scene,
        hooks: DragHooks,
        ctx: &RenderContext,
    ) -> Handle {
        Stage::create(SvgBackend::new(), target, scene, hooks, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterImage;
    use rb_core::Rgb;
    use std::sync::Arc;

    #[test]
    fn rect_element_carries_paint() {
        let mut backend = SvgBackend::new();
        let shape = Shape::rect("r", 1.0, 2.0, 3.0, 4.0).with_fill(Rgb::RED).with_stroke(Rgb::BLACK, 2.0);
        let node = backend.build(&shape).unwrap();
        assert_eq!(
            node.element.to_markup(),
            r##"<rect x="1" y="2" width="3" height="4" id="r" fill="#FF0000" stroke="#000000" stroke-width="2"/>"##
        );
    }

    #[test]
    fn placement_becomes_a_matrix() {
        let mut backend = SvgBackend::new();
        let shape = Shape::rect("m", 0.0, 0.0, 10.0, 10.0);
        let mut node = backend.build(&shape).unwrap();
        let moved = Placement {
            dx: 5.0,
            dy: -1.0,
            scale: 1.0,
        };
        backend.update(&mut node, &shape, &moved);
        assert_eq!(node.element.attr("transform"), Some("matrix(1 0 0 1 5 -1)"));
        backend.update(&mut node, &shape, &Placement::default());
        assert_eq!(node.element.attr("transform"), None);
    }

    #[test]
    fn artwork_embeds_as_nested_svg() {
        let mut backend = SvgBackend::new();
        let shape = Shape::new(
            rb_core::ShapeId::intern("cab"),
            10.0,
            20.0,
            ShapeKind::Ecad {
                url: "/cab.svg".into(),
                w: 30.0,
                h: 40.0,
            },
        );
        let raster = RasterImage {
            width: 1,
            height: 1,
            rgba8_premul: Arc::new(vec![0; 4]),
        };
        let resource = Resource::Vector {
            markup: r#"<svg xmlns="http://www.w3.org/2000/svg" width="5" height="5"><circle r="2"/></svg>"#.into(),
            raster: raster.clone(),
        };
        let node = backend.build_resource(&shape, &resource).unwrap();
        let nested = &node.element.children[0];
        assert_eq!(nested.name, "svg");
        assert_eq!(nested.attr("width"), Some("30"));
        assert_eq!(nested.attr("x"), Some("10"));

        let broken = Resource::Vector {
            markup: "<svg".into(),
            raster,
        };
        let node = backend.build_resource(&shape, &broken).unwrap();
        assert_eq!(node.element.children[0].name, "image");
    }
}

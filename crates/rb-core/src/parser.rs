//! Designer XML → canonical `Scene`.
//!
//! Reads every `DesignerItem` in document order. Each item contributes at
//! most one shape: a `Rectangle` (checked first) becomes a `rect`, a
//! `Polyline` becomes a `line`. Numeric attributes that are missing or
//! unparsable read as 0 instead of rejecting the item, and a malformed
//! document yields an empty scene rather than an error.

use crate::id::ShapeId;
use crate::model::{Point, Rgb, Scene, Shape, ShapeKind, Style};
use crate::xml::{Element, parse_xml};
use std::time::Instant;
use winnow::ascii::float;
use winnow::prelude::*;

pub const ITEM_TAG: &str = "DesignerItem";
pub const CONTENT_TAG: &str = "Content";
pub const RECTANGLE_TAG: &str = "Rectangle";
pub const POLYLINE_TAG: &str = "Polyline";

/// Parse a designer XML document into a scene. Never fails: malformed
/// input is logged and produces an empty scene.
#[must_use = "parsing result should be used"]
pub fn parse_scene_xml(xml: &str) -> Scene {
    let started = Instant::now();

    let root = match parse_xml(xml) {
        Ok(root) => root,
        Err(e) => {
            log::warn!("scene document rejected, using empty scene: {e}");
            return Scene::new();
        }
    };

    let mut scene = Scene::new();
    for item in root.elements_by_tag(ITEM_TAG) {
        if let Some(shape) = parse_item(item) {
            scene.push(shape);
        }
    }

    log::debug!(
        "parsed {} shapes from {} bytes in {:?}",
        scene.len(),
        xml.len(),
        started.elapsed()
    );
    scene
}

fn parse_item(item: &Element) -> Option<Shape> {
    let id = item
        .attr("ID")
        .map(ShapeId::intern)
        .unwrap_or_else(|| ShapeId::with_prefix("item"));
    let left = float_attr(item, "Left");
    let top = float_attr(item, "Top");
    let width = float_attr(item, "Width");
    let height = float_attr(item, "Height");

    let content = item.find(CONTENT_TAG)?;

    if let Some(rect) = content.find(RECTANGLE_TAG) {
        let kind = ShapeKind::Rect {
            w: width,
            h: height,
        };
        let style = Style {
            fill: color_attr(rect, "Fill"),
            stroke: color_attr(rect, "Stroke"),
            stroke_width: rect.attr("StrokeThickness").and_then(parse_float),
            opacity: None,
        };
        return Some(Shape::new(id, left, top, kind).with_style(style));
    }

    if let Some(polyline) = content.find(POLYLINE_TAG) {
        let points = polyline.attr("Points").map(parse_points).unwrap_or_default();
        if points.len() < crate::model::MIN_PATH_POINTS {
            log::debug!("dropping polyline {id}: {} valid points", points.len());
            return None;
        }
        let style = Style {
            fill: None,
            stroke: color_attr(polyline, "Stroke"),
            stroke_width: polyline.attr("StrokeThickness").and_then(parse_float),
            opacity: None,
        };
        return Some(Shape::new(id, left, top, ShapeKind::Line { points }).with_style(style));
    }

    None
}

fn float_attr(element: &Element, name: &str) -> f32 {
    element.attr(name).and_then(parse_float).unwrap_or(0.0)
}

fn color_attr(element: &Element, name: &str) -> Option<Rgb> {
    element
        .attr(name)
        .filter(|v| !v.is_empty())
        .and_then(Rgb::parse)
}

// ─── Numbers & point lists ──────────────────────────────────────────────

/// Lenient float: parses the longest numeric prefix (`"12px"` → 12).
/// Returns `None` when there is no numeric prefix or it is not finite.
pub fn parse_float(raw: &str) -> Option<f32> {
    let mut rest = raw.trim_start();
    let value = float_prefix(&mut rest).ok()?;
    value.is_finite().then_some(value)
}

fn float_prefix(input: &mut &str) -> ModalResult<f32> {
    float.parse_next(input)
}

/// Strict float for point components: the whole token must be numeric.
/// An empty component reads as 0.
fn parse_component(raw: &str) -> Option<f32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0.0);
    }
    let value: f32 = raw.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parse a space-separated `"x,y"` list. A pair is dropped when either
/// component is missing or not numeric; extra components are ignored.
pub fn parse_points(raw: &str) -> Vec<Point> {
    raw.split_whitespace()
        .filter_map(|pair| {
            let mut parts = pair.split(',');
            let x = parse_component(parts.next()?)?;
            let y = parse_component(parts.next()?)?;
            Some(Point::new(x, y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(attrs: &str, content: &str) -> String {
        format!("<Root><DesignerItem {attrs}><Content>{content}</Content></DesignerItem></Root>")
    }

    #[test]
    fn point_list_drops_malformed_pairs() {
        assert_eq!(
            parse_points("1,2 3,x 4,5"),
            vec![Point::new(1.0, 2.0), Point::new(4.0, 5.0)]
        );
    }

    #[test]
    fn point_list_edge_cases() {
        assert_eq!(parse_points(""), vec![]);
        assert_eq!(parse_points("  1,2   3,4 "), vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
        assert_eq!(parse_points("5 6,"), vec![Point::new(6.0, 0.0)]);
        assert_eq!(parse_points("1,2,9"), vec![Point::new(1.0, 2.0)]);
        assert_eq!(parse_points("-1.5,2e1"), vec![Point::new(-1.5, 20.0)]);
        assert_eq!(parse_points("inf,1 NaN,2"), vec![]);
    }

    #[test]
    fn empty_point_components_read_as_zero() {
        assert_eq!(
            parse_points("1, ,5 ,"),
            vec![Point::new(1.0, 0.0), Point::new(0.0, 5.0), Point::new(0.0, 0.0)]
        );
        assert_eq!(parse_points("7"), vec![]);
    }

    #[test]
    fn lenient_float_reads_numeric_prefix() {
        assert_eq!(parse_float("12.5"), Some(12.5));
        assert_eq!(parse_float(" 12px"), Some(12.0));
        assert_eq!(parse_float("-3"), Some(-3.0));
        assert_eq!(parse_float("abc"), None);
        assert_eq!(parse_float(""), None);
    }

    #[test]
    fn rectangle_item_becomes_rect() {
        let doc = item(
            r#"ID="r1" Left="10" Top="20.5" Width="30" Height="40""#,
            r##"<Rectangle Fill="#FF112233" Stroke="#80445566" StrokeThickness="2"/>"##,
        );
        let scene = parse_scene_xml(&doc);
        assert_eq!(scene.len(), 1);
        let shape = &scene.shapes()[0];
        assert_eq!(shape.id.as_str(), "r1");
        assert_eq!((shape.x, shape.y), (10.0, 20.5));
        assert_eq!(shape.kind, ShapeKind::Rect { w: 30.0, h: 40.0 });
        assert_eq!(shape.style.fill, Some(Rgb::new(0x112233)));
        assert_eq!(shape.style.stroke, Some(Rgb::new(0x445566)));
        assert_eq!(shape.style.stroke_width, Some(2.0));
    }

    #[test]
    fn unparsable_geometry_defaults_to_zero() {
        let doc = item(
            r#"ID="r2" Left="abc" Top="" Width="NaN""#,
            r#"<Rectangle/>"#,
        );
        let scene = parse_scene_xml(&doc);
        let shape = &scene.shapes()[0];
        assert_eq!((shape.x, shape.y), (0.0, 0.0));
        assert_eq!(shape.kind, ShapeKind::Rect { w: 0.0, h: 0.0 });
        assert_eq!(shape.style, Style::default());
    }

    #[test]
    fn rectangle_takes_priority_over_polyline() {
        let doc = item(
            r#"ID="both""#,
            r#"<Polyline Points="0,0 1,1"/><Rectangle Fill="FF000000"/>"#,
        );
        let scene = parse_scene_xml(&doc);
        assert_eq!(scene.shapes()[0].kind, ShapeKind::Rect { w: 0.0, h: 0.0 });
    }

    #[test]
    fn polyline_item_becomes_line() {
        let doc = item(
            r#"ID="p1" Left="5" Top="6""#,
            r##"<Polyline Points="1,2 3,x 4,5" Stroke="#FF00FF00" StrokeThickness="1.5"/>"##,
        );
        let scene = parse_scene_xml(&doc);
        let shape = &scene.shapes()[0];
        assert_eq!(
            shape.kind,
            ShapeKind::Line {
                points: vec![Point::new(1.0, 2.0), Point::new(4.0, 5.0)]
            }
        );
        assert_eq!(shape.style.stroke, Some(Rgb::new(0x00FF00)));
        assert_eq!(shape.style.fill, None);
    }

    #[test]
    fn short_polyline_is_excluded() {
        let doc = item(r#"ID="p2""#, r#"<Polyline Points="1,2 3,x"/>"#);
        assert!(parse_scene_xml(&doc).is_empty());
    }

    #[test]
    fn item_without_content_is_skipped() {
        let doc = "<Root><DesignerItem ID=\"x\"/></Root>";
        assert!(parse_scene_xml(doc).is_empty());
    }

    #[test]
    fn malformed_or_empty_documents_yield_empty_scene() {
        assert!(parse_scene_xml("").is_empty());
        assert!(parse_scene_xml("<Root><DesignerItem>").is_empty());
        assert!(parse_scene_xml("{\"not\": \"xml\"}").is_empty());
    }
}

//! JSON scene records ↔ `Shape` / `Scene`.
//!
//! Output is canonical: camelCase keys, a `type` tag, colors as integers,
//! points as `[[x, y], ...]`, absent optionals omitted. Input is tolerant,
//! since hand-written and generated scene files disagree on details:
//!
//! - numbers may be JSON numbers or numeric strings; anything else is 0
//! - colors may be integers, hex strings (`#RRGGBB`, `#AARRGGBB`) or CSS names
//! - points may be nested pairs, a flat `[x1, y1, x2, y2]` list, or the
//!   `"x,y x,y"` string form used by designer documents
//! - `width`/`height` and `text` are accepted as aliases of `w`/`h` and `value`
//! - resource shapes carry their location in `value`; `url` and `src` are
//!   accepted as aliases
//!
//! Records with an unknown `type` are skipped with a warning.

use crate::id::ShapeId;
use crate::model::{FontSpec, Point, Rgb, Scene, Shape, ShapeKind, ShapeType, Style};
use crate::parser::{parse_float, parse_points};
use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ─── Serialization ──────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShapeRecord<'a> {
    id: ShapeId,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    x: f32,
    y: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    w: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    h: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    points: Option<Vec<[f32; 2]>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    font_family: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    font_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fill: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stroke: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stroke_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    opacity: Option<f32>,
    #[serde(skip_serializing_if = "is_false")]
    draggable: bool,
    #[serde(skip_serializing_if = "is_false")]
    scaleable: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl<'a> From<&'a Shape> for ShapeRecord<'a> {
    fn from(shape: &'a Shape) -> Self {
        let mut record = ShapeRecord {
            id: shape.id,
            kind: shape.shape_type().as_str(),
            name: shape.name.as_deref(),
            x: shape.x,
            y: shape.y,
            w: None,
            h: None,
            points: None,
            value: None,
            font_family: None,
            font_size: None,
            fill: shape.style.fill.map(Rgb::value),
            stroke: shape.style.stroke.map(Rgb::value),
            stroke_width: shape.style.stroke_width,
            opacity: shape.style.opacity,
            draggable: shape.draggable,
            scaleable: shape.scaleable,
        };
        match &shape.kind {
            ShapeKind::Rect { w, h } => {
                record.w = Some(*w);
                record.h = Some(*h);
            }
            ShapeKind::Line { points } | ShapeKind::Polygon { points } => {
                record.points = Some(points.iter().map(|p| [p.x, p.y]).collect());
            }
            ShapeKind::Text { value, w, h, font } => {
                record.value = Some(value);
                record.w = (*w != 0.0).then_some(*w);
                record.h = (*h != 0.0).then_some(*h);
                record.font_family = font.family.as_deref();
                record.font_size = font.size;
            }
            ShapeKind::Image { url, w, h }
            | ShapeKind::Ecad { url, w, h }
            | ShapeKind::Video { url, w, h } => {
                record.value = Some(url);
                record.w = Some(*w);
                record.h = Some(*h);
            }
        }
        record
    }
}

impl Serialize for Shape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ShapeRecord::from(self).serialize(serializer)
    }
}

impl Serialize for Scene {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for shape in self {
            seq.serialize_element(shape)?;
        }
        seq.end()
    }
}

// ─── Tolerant deserialization ───────────────────────────────────────────

impl<'de> Deserialize<'de> for Shape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        shape_from_value(&value).map_err(D::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Scene {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<Value>::deserialize(deserializer)?;
        Ok(scene_from_records(&records))
    }
}

impl Scene {
    /// Decode a JSON scene (an array of shape records). Malformed JSON or a
    /// non-array document is logged and yields an empty scene.
    pub fn from_json_str(text: &str) -> Scene {
        Self::from_json_slice(text.as_bytes())
    }

    pub fn from_json_slice(bytes: &[u8]) -> Scene {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Array(records)) => scene_from_records(&records),
            Ok(other) => {
                log::warn!("scene JSON is not an array (found {}), using empty scene", json_kind(&other));
                Scene::new()
            }
            Err(e) => {
                log::warn!("scene JSON rejected, using empty scene: {e}");
                Scene::new()
            }
        }
    }

    /// Canonical JSON text for this scene.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn scene_from_records(records: &[Value]) -> Scene {
    let mut scene = Scene::new();
    for (index, record) in records.iter().enumerate() {
        match shape_from_value(record) {
            Ok(shape) => {
                scene.push(shape);
            }
            Err(e) => log::warn!("skipping scene record {index}: {e}"),
        }
    }
    scene
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode one shape record.
pub fn shape_from_value(value: &Value) -> Result<Shape, String> {
    let Value::Object(record) = value else {
        return Err(format!("expected an object, found {}", json_kind(value)));
    };

    let shape_type: ShapeType = match record.get("type") {
        Some(Value::String(tag)) => tag.parse()?,
        Some(other) => return Err(format!("`type` must be a string, found {}", json_kind(other))),
        None => return Err("record has no `type`".into()),
    };

    let id = match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => ShapeId::intern(s),
        Some(Value::Number(n)) => ShapeId::intern(&n.to_string()),
        _ => ShapeId::with_prefix(shape_type.as_str()),
    };

    let x = number_or_zero(record.get("x"));
    let y = number_or_zero(record.get("y"));
    let w = number_or_zero(first_of(record, &["w", "width"]));
    let h = number_or_zero(first_of(record, &["h", "height"]));
    let url = || string_of(first_of(record, &["value", "url", "src"])).unwrap_or_default();

    let kind = match shape_type {
        ShapeType::Rect => ShapeKind::Rect { w, h },
        ShapeType::Line => ShapeKind::Line {
            points: points_of(record.get("points")),
        },
        ShapeType::Polygon => ShapeKind::Polygon {
            points: points_of(record.get("points")),
        },
        ShapeType::Text => ShapeKind::Text {
            value: string_of(first_of(record, &["value", "text"])).unwrap_or_default(),
            w,
            h,
            font: FontSpec {
                family: string_of(record.get("fontFamily")),
                size: optional_number(record.get("fontSize")),
            },
        },
        ShapeType::Image => ShapeKind::Image { url: url(), w, h },
        ShapeType::Ecad => ShapeKind::Ecad { url: url(), w, h },
        ShapeType::Video => ShapeKind::Video { url: url(), w, h },
    };

    Ok(Shape {
        id,
        name: string_of(record.get("name")),
        x,
        y,
        style: Style {
            fill: color_of(record.get("fill")),
            stroke: color_of(record.get("stroke")),
            stroke_width: optional_number(record.get("strokeWidth")),
            opacity: optional_number(record.get("opacity")),
        },
        draggable: flag_of(record.get("draggable")),
        scaleable: flag_of(record.get("scaleable")),
        kind,
    })
}

fn first_of<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| record.get(*k))
}

fn optional_number(value: Option<&Value>) -> Option<f32> {
    match value? {
        Value::Number(n) => n.as_f64().map(|v| v as f32).filter(|v| v.is_finite()),
        Value::String(s) => parse_float(s),
        _ => None,
    }
}

fn number_or_zero(value: Option<&Value>) -> f32 {
    optional_number(value).unwrap_or(0.0)
}

fn string_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag_of(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

fn color_of(value: Option<&Value>) -> Option<Rgb> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0 && v.is_finite()).map(|v| v as u64))
            .map(|v| Rgb::new(v as u32)),
        Value::String(s) => Rgb::parse(s),
        _ => None,
    }
}

fn points_of(value: Option<&Value>) -> Vec<Point> {
    match value {
        Some(Value::Array(items)) if items.iter().all(|v| v.is_number() || v.is_string()) => items
            .chunks_exact(2)
            .filter_map(|pair| Some(Point::new(component(&pair[0])?, component(&pair[1])?)))
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|pair| match pair {
                Value::Array(xy) if xy.len() >= 2 => {
                    Some(Point::new(component(&xy[0])?, component(&xy[1])?))
                }
                Value::Object(p) => Some(Point::new(component(p.get("x")?)?, component(p.get("y")?)?)),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => parse_points(s),
        _ => Vec::new(),
    }
}

fn component(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32).filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f32>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn canonical_record_shape() {
        let shape = Shape::rect("r", 1.0, 2.0, 3.0, 4.0)
            .with_fill(Rgb::new(0x112233))
            .with_stroke(Rgb::BLACK, 2.0)
            .draggable();
        let value = serde_json::to_value(&shape).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "r", "type": "rect", "x": 1.0, "y": 2.0, "w": 3.0, "h": 4.0,
                "fill": 0x112233, "stroke": 0, "strokeWidth": 2.0, "draggable": true
            })
        );
    }

    #[test]
    fn numbers_accept_strings_and_default_to_zero() {
        let shape = shape_from_value(&json!({
            "type": "rect", "id": "a", "x": "12.5", "y": null, "w": "abc", "h": 7
        }))
        .unwrap();
        assert_eq!((shape.x, shape.y), (12.5, 0.0));
        assert_eq!(shape.kind, ShapeKind::Rect { w: 0.0, h: 7.0 });
    }

    #[test]
    fn colors_accept_every_form() {
        let fill = |v: Value| color_of(Some(&v));
        assert_eq!(fill(json!(0xFF0000)), Some(Rgb::RED));
        assert_eq!(fill(json!("#FF00FF00")), Some(Rgb::new(0x00FF00)));
        assert_eq!(fill(json!("green")), Some(Rgb::GREEN));
        assert_eq!(fill(json!(true)), None);
        assert_eq!(fill(json!(-1)), None);
    }

    #[test]
    fn points_accept_every_form() {
        let expected = vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)];
        assert_eq!(points_of(Some(&json!([[1, 2], [3, 4]]))), expected);
        assert_eq!(points_of(Some(&json!([1, 2, 3, 4, 5]))), expected);
        assert_eq!(points_of(Some(&json!("1,2 3,4"))), expected);
        assert_eq!(points_of(Some(&json!([{"x": 1, "y": 2}, [3, "4"]]))), expected);
        assert_eq!(points_of(Some(&json!([[1, "x"], [3, 4]]))), vec![Point::new(3.0, 4.0)]);
    }

    #[test]
    fn aliases_are_honored() {
        let shape = shape_from_value(&json!({
            "type": "image", "id": "i", "src": "/img/a.png", "width": 10, "height": 20
        }))
        .unwrap();
        assert_eq!(
            shape.kind,
            ShapeKind::Image {
                url: "/img/a.png".into(),
                w: 10.0,
                h: 20.0
            }
        );

        let text = shape_from_value(&json!({"type": "text", "text": "hi", "fontSize": "24"})).unwrap();
        match text.kind {
            ShapeKind::Text { value, font, .. } => {
                assert_eq!(value, "hi");
                assert_eq!(font.size, Some(24.0));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn resource_location_lives_in_value() {
        let video = shape_from_value(&json!({
            "type": "video", "id": "v", "value": "/media/a.mp4", "url": "/ignored.mp4", "w": 160, "h": 90
        }))
        .unwrap();
        assert_eq!(
            video.kind,
            ShapeKind::Video {
                url: "/media/a.mp4".into(),
                w: 160.0,
                h: 90.0
            }
        );
        let value = serde_json::to_value(&video).unwrap();
        assert_eq!(value["value"], json!("/media/a.mp4"));
        assert_eq!(value.get("url"), None);
    }

    #[test]
    fn records_without_ids_get_generated_ones() {
        let a = shape_from_value(&json!({"type": "rect"})).unwrap();
        let b = shape_from_value(&json!({"type": "rect"})).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.id.as_str().starts_with("_rect_"));
    }

    #[test]
    fn unknown_types_and_non_objects_are_skipped() {
        let scene = Scene::from_json_str(
            r#"[{"type":"circle","id":"c"},42,{"type":"rect","id":"r"},{"id":"no-type"}]"#,
        );
        let ids: Vec<&str> = scene.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["r"]);
    }

    #[test]
    fn malformed_json_yields_empty_scene() {
        assert!(Scene::from_json_str("").is_empty());
        assert!(Scene::from_json_str("[{").is_empty());
        assert!(Scene::from_json_str(r#"{"type":"rect"}"#).is_empty());
    }
}

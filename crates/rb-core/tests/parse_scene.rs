//! Integration tests: designer XML and JSON scene records → canonical Scene.

use pretty_assertions::assert_eq;
use rb_core::model::*;
use rb_core::{ShapeId, parse_off_thread, parse_scene_xml};

// ─── Helpers ─────────────────────────────────────────────────────────────

fn ids(scene: &Scene) -> Vec<&str> {
    scene.iter().map(|s| s.id.as_str()).collect()
}

fn shape<'a>(scene: &'a Scene, id: &str) -> &'a Shape {
    scene
        .get(ShapeId::intern(id))
        .unwrap_or_else(|| panic!("shape {id} missing from {:?}", ids(scene)))
}

// ─── Designer XML ────────────────────────────────────────────────────────

#[test]
fn designer_fixture_keeps_document_order() {
    let scene = parse_scene_xml(include_str!("fixtures/designer.xml"));
    // `sketch` has one valid pair, `label` has no rectangle or polyline.
    assert_eq!(ids(&scene), ["panel-a", "duct-1", "panel-b"]);
}

#[test]
fn designer_rectangle_converts_colors_and_geometry() {
    let scene = parse_scene_xml(include_str!("fixtures/designer.xml"));

    let panel = shape(&scene, "panel-a");
    assert_eq!(panel.shape_type(), ShapeType::Rect);
    assert_eq!((panel.x, panel.y), (40.0, 32.5));
    assert_eq!(panel.kind, ShapeKind::Rect { w: 120.0, h: 80.0 });
    assert_eq!(
        panel.style,
        Style {
            fill: Some(Rgb::new(0x3366CC)),
            stroke: Some(Rgb::BLACK),
            stroke_width: Some(2.0),
            opacity: None,
        }
    );
}

#[test]
fn designer_bad_numbers_default_to_zero() {
    let scene = parse_scene_xml(include_str!("fixtures/designer.xml"));

    let panel = shape(&scene, "panel-b");
    assert_eq!((panel.x, panel.y), (0.0, 0.0));
    // Leading numeric prefix survives, like a lenient float read.
    assert_eq!(panel.kind, ShapeKind::Rect { w: 64.0, h: 48.0 });
    assert_eq!(panel.style.fill, Some(Rgb::new(0xCCDDEE)));
}

#[test]
fn designer_polyline_becomes_open_path() {
    let scene = parse_scene_xml(include_str!("fixtures/designer.xml"));

    let duct = shape(&scene, "duct-1");
    assert_eq!((duct.x, duct.y), (200.0, 60.0));
    assert_eq!(
        duct.kind,
        ShapeKind::Line {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(40.0, 0.0),
                Point::new(40.0, 30.0),
                Point::new(80.0, 30.0),
            ]
        }
    );
    assert_eq!(duct.style.stroke, Some(Rgb::new(0xFF8800)));
    assert_eq!(duct.style.stroke_width, Some(1.5));
}

#[test]
fn truncated_designer_document_is_empty() {
    let full = include_str!("fixtures/designer.xml");
    let truncated = &full[..full.len() / 2];
    assert!(parse_scene_xml(truncated).is_empty());
}

#[tokio::test]
async fn worker_reply_matches_inline_parse() {
    let doc = include_str!("fixtures/designer.xml");
    let inline = parse_scene_xml(doc);
    let threaded = parse_off_thread(doc.to_string()).await;
    assert_eq!(threaded, inline);
}

// ─── JSON records ────────────────────────────────────────────────────────

#[test]
fn json_fixture_skips_unknown_and_short_shapes() {
    let scene = Scene::from_json_str(include_str!("fixtures/mixed.json"));
    assert_eq!(
        ids(&scene),
        ["bg", "frame", "route", "zone", "title", "logo", "cab", "cam"]
    );
}

#[test]
fn json_fixture_normalizes_every_color_form() {
    let scene = Scene::from_json_str(include_str!("fixtures/mixed.json"));
    assert_eq!(shape(&scene, "bg").style.fill, Some(Rgb::new(0xF0F0F0)));
    assert_eq!(shape(&scene, "frame").style.stroke, Some(Rgb::new(0x333333)));
    assert_eq!(shape(&scene, "route").style.stroke, Some(Rgb::new(0x000080)));
    assert_eq!(shape(&scene, "zone").style.fill, Some(Rgb::new(0x00AA00)));
    assert_eq!(shape(&scene, "title").style.fill, Some(Rgb::BLACK));
}

#[test]
fn json_fixture_reads_variant_payloads() {
    let scene = Scene::from_json_str(include_str!("fixtures/mixed.json"));

    assert_eq!(
        shape(&scene, "zone").kind,
        ShapeKind::Polygon {
            points: vec![Point::new(0.0, 0.0), Point::new(80.0, 0.0), Point::new(40.0, 60.0)]
        }
    );
    assert_eq!(shape(&scene, "zone").style.alpha(), 0.5);

    let title = shape(&scene, "title");
    assert_eq!(
        title.kind,
        ShapeKind::Text {
            value: "Floor 2".into(),
            w: 0.0,
            h: 0.0,
            font: FontSpec {
                family: Some("Arial".into()),
                size: Some(18.0),
            },
        }
    );

    let logo = shape(&scene, "logo");
    assert!(logo.draggable && logo.scaleable);
    assert_eq!(
        logo.kind,
        ShapeKind::Image {
            url: "/img/logo.png".into(),
            w: 64.0,
            h: 64.0
        }
    );

    let cab = shape(&scene, "cab");
    assert!(cab.draggable && !cab.scaleable);
    assert!(cab.shape_type().is_resource());
    assert!(matches!(&cab.kind, ShapeKind::Ecad { url, .. } if url == "/img/cabinet.svg"));

    assert!(matches!(&shape(&scene, "cam").kind, ShapeKind::Video { url, .. } if url == "/media/cam.mp4"));
}

// ─── Canonical round-trip ────────────────────────────────────────────────

#[test]
fn every_variant_roundtrips_field_for_field() {
    let original = Scene::from_json_str(include_str!("fixtures/mixed.json"));
    let text = original.to_json_string().unwrap();
    let decoded = Scene::from_json_str(&text);
    assert_eq!(decoded, original);
}

#[test]
fn resource_locations_serialize_as_value() {
    let scene = Scene::from_json_str(include_str!("fixtures/mixed.json"));
    let records: serde_json::Value = serde_json::from_str(&scene.to_json_string().unwrap()).unwrap();
    let logo = records
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == "logo")
        .unwrap();
    assert_eq!(logo["value"], "/img/logo.png");
    assert!(logo.get("url").is_none());
}

#[test]
fn designer_scene_roundtrips_through_json() {
    let original = parse_scene_xml(include_str!("fixtures/designer.xml"));
    let decoded: Scene = serde_json::from_str(&original.to_json_string().unwrap()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn named_shape_roundtrips() {
    let arrow = Shape::line(
        "a1",
        5.0,
        6.0,
        vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
    )
    .with_stroke(Rgb::GREEN, 2.0)
    .named("arrow");
    let json = serde_json::to_string(&arrow).unwrap();
    let back: Shape = serde_json::from_str(&json).unwrap();
    assert_eq!(back, arrow);
}

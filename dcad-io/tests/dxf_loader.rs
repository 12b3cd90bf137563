
use std::path::PathBuf;

use glam::DVec2;

use dcad_core::{
    entity::{Dimension, DimensionKind, Ellipse, Entity, EntityKind, Polyline, Style},
    geometry::Point2,
};
use dcad_io::{
    DocumentLoader, DocumentSaver, DxfFacade, EntityEncoder, GroupPair, encode_document,
    encode_entities, encode_entity, to_text,
};
use golden::assert_golden;

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

fn scenario_entities() -> Vec<Entity> {
    vec![
        Polyline::new(
            [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
            ],
            Style::on_layer("WALLS"),
        )
        .into(),
        Ellipse::new(
            Point2::new(3.0, 4.0),
            Point2::new(9.0, 4.0),
            Point2::new(3.0, 6.5),
            Style::default(),
        )
        .into(),
        Dimension::new(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(5.0, 5.0),
            Style::on_layer("DIM"),
        )
        .into(),
    ]
}

#[test]
fn load_mixed_entities_matches_expected_document() {
    let loader = DxfFacade::new();
    let entities = loader
        .load(&fixture("mixed_entities.dxf"))
        .expect("读取 DXF 失败");
    assert_golden("mixed_entities", &entities);
}

#[test]
fn load_closed_polyline_and_flagged_dimension() {
    let loader = DxfFacade::new();
    let entities = loader
        .load(&fixture("closed_polyline.dxf"))
        .expect("读取闭合多段线 DXF 失败");
    assert_golden("closed_polyline", &entities);

    let Entity::Dimension(dimension) = &entities[1] else {
        panic!("期望第二个实体为尺寸标注");
    };
    assert_eq!(dimension.base_type(), 33);
    assert!(matches!(dimension.kind(), DimensionKind::Unknown(33)));
}

#[test]
fn polyline_text_matches_record_layout() {
    let polyline: Entity = Polyline::new(
        [Point2::new(0.0, 0.0), Point2::new(10.5, -2.0)],
        Style::on_layer("A"),
    )
    .into();
    let text = to_text(&encode_entity(&polyline).unwrap());
    let expected = [
        "0", "POLYLINE", "8", "A", "66", "1", "10", "0", "20", "0", "30", "0", "39", "2", "70",
        "0", "0", "VERTEX", "8", "A", "10", "0", "20", "0", "30", "0", "0", "VERTEX", "8", "A",
        "10", "10.5", "20", "-2", "30", "0", "0", "SEQEND", "8", "A",
    ]
    .join("\n");
    assert_eq!(text, expected);
}

#[test]
fn ellipse_text_matches_record_layout() {
    let ellipse: Entity = Ellipse::new(
        Point2::new(0.0, 0.0),
        Point2::new(10.0, 0.0),
        Point2::new(0.0, 5.0),
        Style::default(),
    )
    .into();
    let text = to_text(&encode_entity(&ellipse).unwrap());
    let expected = [
        "0",
        "ELLIPSE",
        "8",
        "0",
        "10",
        "0",
        "20",
        "0",
        "30",
        "0.0",
        "11",
        "10",
        "21",
        "0",
        "31",
        "0.0",
        "40",
        "0.5",
        "41",
        "0",
        "42",
        "6.283185307179586",
    ]
    .join("\n");
    assert_eq!(text, expected);
}

#[test]
fn dimension_text_keeps_type_and_style() {
    let mut dimension = Dimension::new(
        Point2::new(1.0, 2.0),
        Point2::new(7.0, 2.0),
        Point2::new(4.0, 5.0),
        Style::on_layer("DIM"),
    );
    dimension.dim_type = 32;
    dimension.block_name = "*D3".to_string();
    dimension.style_name = "ISO-25".to_string();

    let pairs = DxfFacade::new().encode(&dimension.into()).unwrap();
    let codes: Vec<i32> = pairs.iter().map(|pair| pair.code).collect();
    assert_eq!(
        codes,
        vec![0, 8, 2, 10, 20, 30, 11, 21, 31, 70, 13, 23, 33, 14, 24, 34, 3]
    );
    assert_eq!(pairs[2], GroupPair::new(2, "*D3"));
    assert_eq!(pairs[6], GroupPair::new(11, "4"));
    assert_eq!(pairs[9], GroupPair::new(70, "32"));
    assert_eq!(pairs[13], GroupPair::new(14, "7"));
    assert_eq!(pairs[16], GroupPair::new(3, "ISO-25"));
}

#[test]
fn encode_then_decode_keeps_layer_type_and_coordinates() {
    let entities = scenario_entities();
    let text = encode_entities(&entities).unwrap();
    let decoded = DxfFacade::new().parse_str(&text).unwrap();
    assert_eq!(decoded.len(), entities.len());

    for (original, decoded) in entities.iter().zip(&decoded) {
        assert_eq!(original.kind(), decoded.kind());
        assert_eq!(original.layer_name(), decoded.layer_name());
        match (original, decoded) {
            (Entity::Ellipse(original), Entity::Ellipse(decoded)) => {
                assert!((original.width() - decoded.width()).abs() < 1e-9);
                assert!((original.height() - decoded.height()).abs() < 1e-9);
                let a = original.extremes().unwrap();
                let b = decoded.extremes().unwrap();
                assert!((a.xmin - b.xmin).abs() < 1e-9);
                assert!((a.ymax - b.ymax).abs() < 1e-9);
            }
            _ => {
                for (a, b) in original.points().iter().zip(decoded.points()) {
                    assert!(
                        (a.as_vec2() - b.as_vec2()).length() < 1e-12,
                        "{a:?} != {b:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn rotated_ellipse_survives_round_trip() {
    let centre = Point2::new(2.0, -1.0);
    let axis = Point2::from_vec(centre.as_vec2() + DVec2::new(3.0, 4.0));
    let second = Point2::from_vec(centre.as_vec2() + DVec2::new(-2.0, 1.5));
    let ellipse: Entity = Ellipse::new(centre, axis, second, Style::on_layer("E")).into();

    let text = encode_entities([&ellipse]).unwrap();
    let decoded = DxfFacade::new().parse_str(&text).unwrap();
    let (Entity::Ellipse(before), Entity::Ellipse(after)) = (&ellipse, &decoded[0]) else {
        panic!("期望椭圆实体");
    };
    assert!((before.rotation() - after.rotation()).abs() < 1e-12);
    assert!((before.width() - after.width()).abs() < 1e-12);
    assert!((before.height() - after.height()).abs() < 1e-12);
}

#[test]
fn save_then_load_round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.dxf");

    let facade = DxfFacade::new();
    let entities = scenario_entities();
    facade.save(&entities, &path).unwrap();
    let loaded = facade.load(&path).unwrap();
    let kinds: Vec<EntityKind> = loaded.iter().map(Entity::kind).collect();
    assert_eq!(
        kinds,
        vec![EntityKind::Polyline, EntityKind::Ellipse, EntityKind::Dimension]
    );
}

#[test]
fn missing_file_reports_path() {
    let err = DxfFacade::new()
        .load(&fixture("does_not_exist.dxf"))
        .unwrap_err();
    assert!(err.to_string().contains("does_not_exist.dxf"));
}

#[test]
fn empty_trailing_values_survive_round_trip() {
    let mut dimension = Dimension::new(
        Point2::new(0.0, 0.0),
        Point2::new(6.0, 0.0),
        Point2::new(3.0, 2.0),
        Style::on_layer("DIM"),
    );
    dimension.style_name = String::new();
    let polyline: Entity = Polyline::new(
        [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)],
        Style::on_layer(""),
    )
    .into();

    for entity in [Entity::from(dimension), polyline] {
        let text = encode_entities([&entity]).unwrap();
        assert!(text.ends_with('\n'), "记录应以空值行结束");
        let decoded = DxfFacade::new()
            .parse_str(&text)
            .unwrap_or_else(|err| panic!("无法解析编码器输出: {err}"));
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].kind(), entity.kind());
        assert_eq!(decoded[0].layer_name(), entity.layer_name());
        assert_eq!(decoded[0].points(), entity.points());
        if let Entity::Dimension(decoded) = &decoded[0] {
            assert_eq!(decoded.style_name, "");
        }
    }
}

#[test]
fn crlf_documents_are_accepted() {
    let text = encode_document(&scenario_entities()).unwrap().replace('\n', "\r\n");
    let decoded = DxfFacade::new().parse_str(&text).unwrap();
    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded[0].layer_name(), "WALLS");
}


use std::path::PathBuf;

use golden::assert_golden;
use svgpad_core::document::shape_bounds;
use svgpad_core::geometry::Point2;
use svgpad_io::{DocumentLoader, DocumentSaver, IoError, SvgFacade, parse_markup};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

#[test]
fn load_basic_shapes_matches_expected_tree() {
    let loader = SvgFacade::new();
    let fragment = loader.load(&fixture("basic_shapes.svg")).expect("读取 SVG 失败");
    assert_golden("basic_shapes", &fragment);

    let path = fragment
        .find(|element| element.id() == Some("p1"))
        .expect("未找到路径 p1");
    let element = fragment.get(&path).expect("路径节点");
    let bounds = shape_bounds(element).expect("路径包围盒");
    assert_eq!(bounds.min(), Point2::new(0.0, 0.0));
    assert_eq!(bounds.max(), Point2::new(10.0, 10.0));
}

#[test]
fn saved_document_reloads_identically() {
    let loader = SvgFacade::new();
    let fragment = loader.load(&fixture("basic_shapes.svg")).expect("读取 SVG 失败");

    let dir = tempfile::tempdir().expect("临时目录");
    let target = dir.path().join("copy.svg");
    loader.save(&fragment, &target).expect("写出 SVG 失败");
    let reloaded = loader.load(&target).expect("重新读取失败");
    assert_eq!(reloaded, fragment);

    let original = std::fs::read_to_string(fixture("basic_shapes.svg")).expect("读取原文");
    let written = std::fs::read_to_string(&target).expect("读取副本");
    assert_eq!(written, original);
}

#[test]
fn missing_file_reports_path() {
    let loader = SvgFacade::new();
    let err = loader.load(&fixture("does_not_exist.svg")).unwrap_err();
    assert!(matches!(err, IoError::ReadError { .. }));
    assert!(err.to_string().contains("does_not_exist.svg"));
}

#[test]
fn mismatched_tags_are_invalid() {
    let err = parse_markup("<svg><g></svg>").unwrap_err();
    assert!(matches!(err, IoError::InvalidDocument(_)));
}

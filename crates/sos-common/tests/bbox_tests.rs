//! Tests for BoundingBox parsing and spatial predicates.

use sos_common::bbox::{BboxParseError, BoundingBox};

// ============================================================================
// from_kvp tests
// ============================================================================

#[test]
fn test_parse_kvp_bbox_with_srs() {
    let bbox = BoundingBox::from_kvp("-4.0,48.0,-3.0,49.0,urn:ogc:def:crs:EPSG::4326").unwrap();
    assert_eq!(bbox.min_x, -4.0);
    assert_eq!(bbox.max_y, 49.0);
    assert_eq!(bbox.srs.as_deref(), Some("urn:ogc:def:crs:EPSG::4326"));
}

#[test]
fn test_parse_kvp_bbox_whitespace() {
    let bbox = BoundingBox::from_kvp(" 0 , 0 , 10 , 10 ").unwrap();
    assert_eq!(bbox, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
}

#[test]
fn test_parse_kvp_bbox_too_few() {
    let result = BoundingBox::from_kvp("0,0,10");
    assert!(matches!(result, Err(BboxParseError::InvalidFormat(_))));
}

#[test]
fn test_parse_kvp_bbox_too_many() {
    let result = BoundingBox::from_kvp("0,0,10,10,EPSG:4326,extra");
    assert!(matches!(result, Err(BboxParseError::InvalidFormat(_))));
}

#[test]
fn test_parse_kvp_bbox_invalid_number() {
    let result = BoundingBox::from_kvp("0,abc,10,10");
    assert_eq!(result, Err(BboxParseError::InvalidNumber("abc".to_string())));
}

#[test]
fn test_parse_kvp_bbox_empty_string() {
    assert!(BoundingBox::from_kvp("").is_err());
}

// ============================================================================
// Spatial predicates
// ============================================================================

#[test]
fn test_bbox_intersects_overlap() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
    assert!(a.intersects(&b));
    assert!(b.intersects(&a));
}

#[test]
fn test_bbox_intersects_no_overlap() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
    assert!(!a.intersects(&c));
}

#[test]
fn test_bbox_intersects_touching_edge() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
    assert!(a.intersects(&b));
}

#[test]
fn test_bbox_point_box_intersects() {
    let area = BoundingBox::new(-5.0, 45.0, 0.0, 50.0);
    let station = BoundingBox::from_point(-3.5, 48.2);
    assert!(area.intersects(&station));
}

#[test]
fn test_bbox_contains_point_on_edge() {
    let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    assert!(bbox.contains_point(0.0, 5.0));
    assert!(bbox.contains_point(10.0, 10.0));
    assert!(!bbox.contains_point(10.0001, 5.0));
}

#[test]
fn test_bbox_include_point_grows() {
    let mut bbox = BoundingBox::from_point(1.0, 1.0);
    bbox.include_point(-2.0, 3.0);
    assert_eq!(bbox, BoundingBox::new(-2.0, 1.0, 1.0, 3.0));
}

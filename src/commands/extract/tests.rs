use crate::model::{AppendRule, ExtractProfile, Region, RegionRect};

use super::regions::{
    MAJORITY_OVERLAP, RegionFallback, apply_append_rule, build_row, clean_extracted_text,
    overlap_ratio, plan_fallback, validate_profile,
};

fn rect(x1: f32, y1: f32, x2: f32, y2: f32) -> RegionRect {
    RegionRect { x1, y1, x2, y2 }
}

fn region(name: &str, bounds: RegionRect) -> Region {
    Region {
        name: name.to_string(),
        color_tag: "red".to_string(),
        rect: bounds,
    }
}

fn profile() -> ExtractProfile {
    ExtractProfile {
        regions: vec![
            region("status", rect(0.0, 0.0, 100.0, 20.0)),
            region("order", rect(0.0, 20.0, 100.0, 40.0)),
            region("site", rect(0.0, 40.0, 100.0, 60.0)),
            region("route", rect(0.0, 60.0, 100.0, 80.0)),
        ],
        trigger_region: 0,
        completion_marker: "COMPLETED".to_string(),
        order_region: 1,
        site_region: 2,
        route_region: 3,
        append_rule: None,
    }
}

#[test]
fn fully_contained_segment_counts_as_inside() {
    let segment = rect(10.0, 10.0, 20.0, 20.0);
    let target = rect(0.0, 0.0, 100.0, 100.0);

    assert!(overlap_ratio(&segment, &target) > MAJORITY_OVERLAP);
}

#[test]
fn majority_overlap_rule_rejects_forty_percent_inside() {
    // 40% of the segment's width overlaps the region
    let segment = rect(0.0, 0.0, 100.0, 10.0);
    let inside_forty = rect(60.0, 0.0, 200.0, 10.0);
    let inside_sixty = rect(40.0, 0.0, 200.0, 10.0);

    assert!(overlap_ratio(&segment, &inside_forty) <= MAJORITY_OVERLAP);
    assert!(overlap_ratio(&segment, &inside_sixty) > MAJORITY_OVERLAP);
}

#[test]
fn disjoint_and_degenerate_segments_have_zero_overlap() {
    let segment = rect(0.0, 0.0, 10.0, 10.0);
    let far_away = rect(50.0, 50.0, 60.0, 60.0);
    let empty = rect(5.0, 5.0, 5.0, 5.0);

    assert_eq!(overlap_ratio(&segment, &far_away), 0.0);
    assert_eq!(overlap_ratio(&empty, &segment), 0.0);
}

#[test]
fn non_empty_segment_text_wins_and_is_cleaned() {
    let segments = Ok("ORD\n123".to_string());

    assert_eq!(
        plan_fallback(&segments),
        RegionFallback::UseText("ORD 123".to_string())
    );
}

#[test]
fn empty_segment_result_goes_straight_to_ocr() {
    // All overlapping spans were rejected by the overlap rule; the
    // coarser text-inside-rect primitive must not get a chance to
    // re-admit them.
    let segments = Ok(String::new());

    assert_eq!(plan_fallback(&segments), RegionFallback::OcrCrop);
    assert_eq!(
        plan_fallback(&Ok("  \n ".to_string())),
        RegionFallback::OcrCrop
    );
}

#[test]
fn failed_segment_pass_falls_back_to_text_inside_rect() {
    let segments = Err(anyhow::anyhow!("text layer unavailable"));

    assert_eq!(
        plan_fallback(&segments),
        RegionFallback::InsideRectThenOcrCrop
    );
}

#[test]
fn cleaning_collapses_whitespace_and_control_characters() {
    assert_eq!(
        clean_extracted_text("  ORD\n123\t\tMain \u{0000}St  "),
        "ORD 123 Main St"
    );
    assert_eq!(clean_extracted_text("\n\t \u{0000}"), "");
    assert_eq!(clean_extracted_text("already clean"), "already clean");
}

#[test]
fn append_rule_joins_with_single_space() {
    let mut texts = vec!["A".to_string(), "Main Site".to_string(), "North".to_string()];
    apply_append_rule(&mut texts, &AppendRule { source: 2, target: 1 });

    assert_eq!(texts[1], "Main Site North");
    assert_eq!(texts[2], "North");
}

#[test]
fn append_rule_with_empty_source_is_a_no_op() {
    let mut texts = vec!["A".to_string(), "Main Site".to_string(), "  ".to_string()];
    apply_append_rule(&mut texts, &AppendRule { source: 2, target: 1 });

    assert_eq!(texts[1], "Main Site");
}

#[test]
fn append_rule_fills_an_empty_target() {
    let mut texts = vec!["A".to_string(), "".to_string(), "North".to_string()];
    apply_append_rule(&mut texts, &AppendRule { source: 2, target: 1 });

    assert_eq!(texts[1], "North");
}

#[test]
fn missing_completion_marker_drops_the_page() {
    let texts = vec![
        "IN PROGRESS".to_string(),
        "ord9".to_string(),
        "Site".to_string(),
        "Route".to_string(),
    ];

    assert!(build_row(&texts, &profile(), "scan.pdf").is_none());
}

#[test]
fn completed_page_yields_an_uppercased_row() {
    let texts = vec![
        "Status: completed".to_string(),
        "ord9".to_string(),
        "Main Site".to_string(),
        "North".to_string(),
    ];

    let row = build_row(&texts, &profile(), "scan.pdf").unwrap();
    assert_eq!(row.order_number, "ORD9");
    assert_eq!(row.site_name, "Main Site");
    assert_eq!(row.route, "North");
    assert_eq!(row.source_file, "scan.pdf");
}

#[test]
fn empty_order_region_yields_no_row() {
    let texts = vec![
        "COMPLETED".to_string(),
        "   ".to_string(),
        "Site".to_string(),
        "Route".to_string(),
    ];

    assert!(build_row(&texts, &profile(), "scan.pdf").is_none());
}

#[test]
fn profile_validation_rejects_out_of_range_indices() {
    let mut bad = profile();
    bad.route_region = 9;

    assert!(validate_profile(&bad).is_err());
    assert!(validate_profile(&profile()).is_ok());
}

#[test]
fn profile_validation_rejects_blank_marker() {
    let mut bad = profile();
    bad.completion_marker = "  ".to_string();

    assert!(validate_profile(&bad).is_err());
}

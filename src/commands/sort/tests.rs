use std::collections::HashMap;
use std::path::PathBuf;

use crate::cli::GroupBy;
use crate::model::{Group, MatchKind, PageRecord};

use super::aggregate::Aggregator;
use super::assemble::{BundleOrdering, plan_order};
use super::barcode::{generate_assets, validate_identifier};
use super::matcher::{IdentifierMatcher, generate_variants};
use super::run::{barcode_records_for, bundle_file_name};
use super::summary::render_summary;

fn page(source: &str, index: usize, order_id: &str, stop: Option<&str>) -> PageRecord {
    PageRecord {
        source_file: PathBuf::from(source),
        page_index: index,
        matched_key: Some(order_id.to_string()),
        order_id: Some(order_id.to_string()),
        stop_number: stop.map(|value| value.to_string()),
        match_kind: Some(MatchKind::Exact),
    }
}

fn group_with_stops(stops: &[Option<&str>]) -> Group {
    Group {
        key: "X".to_string(),
        pages: stops
            .iter()
            .enumerate()
            .map(|(index, stop)| page("in.pdf", index, &format!("ORD{index}"), *stop))
            .collect(),
    }
}

#[test]
fn primary_order_is_ascending_then_reversed() {
    let group = group_with_stops(&[Some("3"), Some("1"), Some("2")]);

    let primary = plan_order(&group, BundleOrdering::Primary);
    let alternate = plan_order(&group, BundleOrdering::Alternate);

    // stops [3, 1, 2] by index: alternate ascends, primary reverses it
    assert_eq!(alternate, vec![1, 2, 0]);
    assert_eq!(primary, vec![0, 2, 1]);
}

#[test]
fn non_numeric_stop_forces_lexicographic_for_whole_group() {
    let group = group_with_stops(&[Some("10"), Some("9A"), Some("2")]);

    let alternate = plan_order(&group, BundleOrdering::Alternate);

    // "10" < "2" < "9A" as strings
    assert_eq!(alternate, vec![0, 2, 1]);
}

#[test]
fn missing_stop_numbers_sort_last_and_keep_relative_order() {
    let group = group_with_stops(&[None, Some("2"), None, Some("1")]);

    let alternate = plan_order(&group, BundleOrdering::Alternate);

    assert_eq!(alternate, vec![3, 1, 0, 2]);
}

#[test]
fn exact_match_beats_fuzzy_only_candidate() {
    let identifiers = vec!["A060JR7".to_string(), "B111".to_string()];
    let mut matcher = IdentifierMatcher::new(&identifiers, true).unwrap();

    // "AO60JR7" only fuzzy-matches A060JR7, but B111 is present verbatim
    let candidate = matcher.match_page("docket AO60JR7 ref B111").unwrap();

    assert_eq!(candidate.candidate_id, "B111");
    assert_eq!(candidate.kind, MatchKind::Exact);
}

#[test]
fn exact_match_is_case_insensitive() {
    let identifiers = vec!["ord123".to_string()];
    let mut matcher = IdentifierMatcher::new(&identifiers, false).unwrap();

    let candidate = matcher.match_page("Order ORD123 enclosed").unwrap();

    assert_eq!(candidate.candidate_id, "ord123");
    assert_eq!(candidate.kind, MatchKind::Exact);
}

#[test]
fn longer_identifier_wins_substring_overlap() {
    let identifiers = vec!["1234".to_string(), "12345".to_string()];
    let mut matcher = IdentifierMatcher::new(&identifiers, false).unwrap();

    let candidate = matcher.match_page("ref 12345 attached").unwrap();

    assert_eq!(candidate.candidate_id, "12345");
}

#[test]
fn fuzzy_pass_recovers_ocr_confusion() {
    let identifiers = vec!["A060JR7".to_string()];
    let mut matcher = IdentifierMatcher::new(&identifiers, true).unwrap();

    let candidate = matcher.match_page("scan AO60JR7 end").unwrap();

    assert_eq!(candidate.candidate_id, "A060JR7");
    assert_eq!(candidate.kind, MatchKind::Fuzzy);
    assert_eq!(candidate.variant_used, "AO60JR7");
}

#[test]
fn fuzzy_pass_can_be_disabled() {
    let identifiers = vec!["A060JR7".to_string()];
    let mut matcher = IdentifierMatcher::new(&identifiers, false).unwrap();

    assert!(matcher.match_page("scan AO60JR7 end").is_none());
}

#[test]
fn empty_page_text_never_matches() {
    let identifiers = vec!["A1".to_string()];
    let mut matcher = IdentifierMatcher::new(&identifiers, true).unwrap();

    assert!(matcher.match_page("   \n\t ").is_none());
}

#[test]
fn variants_cover_substitution_deletion_and_insertion() {
    let variants = generate_variants("A060JR7");

    assert!(variants.contains(&"A060JR7".to_string()));
    assert!(variants.contains(&"AO60JR7".to_string()));
    assert!(variants.contains(&"A06OJR7".to_string()));
    assert!(variants.contains(&"A60JR7".to_string()));
    assert!(variants.contains(&"XA060JR7".to_string()));
    assert!(variants.contains(&"A060JR7X".to_string()));

    let mut deduped = variants.clone();
    deduped.dedup();
    assert_eq!(variants, deduped);
}

#[test]
fn aggregator_groups_case_insensitively_with_first_seen_display_key() {
    let mut aggregator = Aggregator::new();
    aggregator.file_processed();
    aggregator.page_scanned();
    aggregator.page_scanned();

    let mut first = page("a.pdf", 0, "ord1", None);
    first.matched_key = Some("DriverX".to_string());
    let mut second = page("b.pdf", 0, "ord2", None);
    second.matched_key = Some("DRIVERX".to_string());
    aggregator.record(first);
    aggregator.record(second);

    let (groups, counts) = aggregator.finish();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key, "DriverX");
    assert_eq!(groups[0].pages.len(), 2);
    assert_eq!(counts.pages_matched, 2);
    assert_eq!(counts.distinct_groups, 1);
}

#[test]
fn aggregator_ignores_pages_without_a_key() {
    let mut aggregator = Aggregator::new();
    let mut unmatched = page("a.pdf", 0, "ord1", None);
    unmatched.matched_key = None;
    aggregator.record(unmatched);

    let (groups, counts) = aggregator.finish();
    assert!(groups.is_empty());
    assert_eq!(counts.pages_matched, 0);
}

#[test]
fn two_file_grouping_scenario_plans_both_orderings() {
    // Two input files, three pages scanned, two matched to one driver.
    let mut aggregator = Aggregator::new();
    for _ in 0..3 {
        aggregator.page_scanned();
    }
    aggregator.file_processed();
    aggregator.file_processed();

    let mut a1 = page("file1.pdf", 0, "A1", Some("1"));
    a1.matched_key = Some("DriverX".to_string());
    let mut b2 = page("file2.pdf", 1, "B2", Some("2"));
    b2.matched_key = Some("DriverX".to_string());
    aggregator.record(a1);
    aggregator.record(b2);

    let (groups, counts) = aggregator.finish();
    assert_eq!(counts.files_processed, 2);
    assert_eq!(counts.pages_scanned, 3);
    assert_eq!(counts.pages_matched, 2);
    assert_eq!(groups.len(), 1);

    let primary = plan_order(&groups[0], BundleOrdering::Primary);
    let alternate = plan_order(&groups[0], BundleOrdering::Alternate);
    assert_eq!(groups[0].pages[primary[0]].order_id.as_deref(), Some("B2"));
    assert_eq!(groups[0].pages[primary[1]].order_id.as_deref(), Some("A1"));
    assert_eq!(groups[0].pages[alternate[0]].order_id.as_deref(), Some("A1"));
    assert_eq!(groups[0].pages[alternate[1]].order_id.as_deref(), Some("B2"));
}

#[test]
fn cancel_flag_flips_once_set() {
    let flag = crate::progress::CancelFlag::new();
    assert!(!flag.is_cancelled());

    let observer = flag.clone();
    flag.cancel();
    assert!(observer.is_cancelled());
}

#[test]
fn barcode_identifier_validity() {
    assert!(validate_identifier("ORD-123").is_ok());
    assert_eq!(validate_identifier(""), Err("empty identifier"));
    assert_eq!(validate_identifier("   "), Err("empty identifier"));
    assert_eq!(validate_identifier("ORD\u{00bd}"), Err("invalid character set"));
    assert_eq!(validate_identifier("ORD\t1"), Err("invalid character set"));
}

#[test]
fn invalid_identifiers_never_produce_assets() {
    let identifiers = vec![
        "ORD1".to_string(),
        "".to_string(),
        "BAD\u{00e9}".to_string(),
    ];

    let (assets, failures) = generate_assets(&identifiers);

    assert!(assets.contains_key("ORD1"));
    assert_eq!(assets.len(), 1);
    assert_eq!(failures.get(""), Some(&"empty identifier".to_string()));
    assert_eq!(
        failures.get("BAD\u{00e9}"),
        Some(&"invalid character set".to_string())
    );
}

#[test]
fn barcode_records_track_written_pages_not_planned_order() {
    let group = Group {
        key: "7".to_string(),
        pages: vec![
            page("scan.pdf", 0, "A1", Some("1")),
            page("scan.pdf", 1, "B2", Some("2")),
            page("scan.pdf", 2, "C3", Some("3")),
        ],
    };
    let mut assets = HashMap::new();
    assets.insert("A1".to_string(), vec![1u8]);
    assets.insert("C3".to_string(), vec![2u8]);

    // Planned order was [2, 1, 0] but the B2 page failed to copy.
    let records = barcode_records_for(&group, &[2, 0], "Driver_7_Orders.pdf", &assets);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].order_id, "C3");
    assert_eq!(records[0].page_number, 1);
    assert_eq!(records[1].order_id, "A1");
    assert_eq!(records[1].page_number, 2);
    assert!(records.iter().all(|record| record.order_id != "B2"));
    assert!(
        records
            .iter()
            .all(|record| record.pdf_file_name == "Driver_7_Orders.pdf")
    );
}

#[test]
fn pages_without_assets_get_no_barcode_record() {
    let group = Group {
        key: "7".to_string(),
        pages: vec![page("scan.pdf", 0, "A1", Some("1"))],
    };

    let records = barcode_records_for(&group, &[0], "Driver_7_Orders.pdf", &HashMap::new());

    assert!(records.is_empty());
}

#[test]
fn bundle_names_follow_mode_and_stay_filesystem_safe() {
    assert_eq!(bundle_file_name(GroupBy::Driver, "12"), "Driver_12_Orders.pdf");
    assert_eq!(
        bundle_file_name(GroupBy::Order, "A/B 1"),
        "Order_A_B_1_Combined.pdf"
    );
}

#[test]
fn summary_lists_groups_and_unmatched_identifiers() {
    let group = Group {
        key: "7".to_string(),
        pages: vec![
            page("scan.pdf", 0, "A1", Some("1")),
            page("scan.pdf", 2, "B2", Some("2")),
        ],
    };
    let counts = crate::model::RunCounts {
        files_processed: 1,
        pages_scanned: 3,
        pages_matched: 2,
        distinct_groups: 1,
        bundles_written: 2,
        ..Default::default()
    };

    let summary = render_summary(
        GroupBy::Driver,
        &counts,
        &[group],
        &["Driver_7_Orders.pdf".to_string()],
        &[],
        &["C3".to_string()],
    );

    assert!(summary.contains("Grouping: by driver"));
    assert!(summary.contains("Pages matched: 2"));
    assert!(summary.contains("Distinct groups: 1"));
    assert!(summary.contains("  - Driver_7_Orders.pdf"));
    assert!(summary.contains("Driver 7 (2 pages found):"));
    assert!(summary.contains("  - scan.pdf page 3 (order B2, stop 2)"));
    assert!(summary.contains("Identifiers with no pages found:"));
    assert!(summary.contains("  - C3"));
}

//! Property-based tests for cloudcfg
//!
//! This module uses proptest to verify core invariants of the mountlist rewrite.
//! Property-based testing generates hundreds of random mountlists to verify
//! that certain properties always hold true.

use std::fs;
use tempfile::TempDir;

use cloudcfg::transform::transform_text;
use cloudcfg::{detect_variant, transform, Mountlist, NullSink, ReplacementTable, Service, Variant};

// Import proptest macro
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn any_variant() -> impl Strategy<Value = Variant> {
    prop_oneof![Just(Variant::M68k), Just(Variant::V102e)]
}

fn any_service() -> impl Strategy<Value = Service> {
    prop_oneof![Just(Service::Dropbox), Just(Service::GoogleDrive)]
}

/// A handler declaration for some service and build, with arbitrary indentation
fn selector_line() -> impl Strategy<Value = String> {
    (any_service(), any_variant(), "[ \t]{0,6}", "[ a-z;]{0,8}").prop_map(
        |(service, variant, indent, tail)| {
            format!(
                "{}Handler = Devs:Cloud/{}{}",
                indent,
                service.handler_filename(variant),
                tail
            )
        },
    )
}

/// Lines that never mention a handler path
fn plain_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z]{3,6}:",
        "    [A-Za-z]{4,12} = [0-9]{1,6}",
        "#",
        "[a-z ]{0,30}",
    ]
}

fn mountlist_lines() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop_oneof![3 => plain_line(), 1 => selector_line()], 0..40)
}

fn join(lines: &[String]) -> String {
    lines.iter().map(|l| format!("{}\n", l)).collect()
}

// ============================================================================
// Property 1: Line count is preserved
// ============================================================================

proptest! {
    /// Every input line yields exactly one output line
    #[test]
    fn prop_transform_preserves_line_count(
        lines in mountlist_lines(),
        variant in any_variant()
    ) {
        let out: Vec<Vec<u8>> = transform(lines.iter().map(|l| format!("{}\n", l)), variant).collect();
        prop_assert_eq!(out.len(), lines.len());
    }
}

// ============================================================================
// Property 2: Only selector lines change
// ============================================================================

proptest! {
    /// Lines without a handler declaration pass through byte for byte
    #[test]
    fn prop_non_selector_lines_unchanged(
        lines in prop::collection::vec(plain_line(), 0..40),
        variant in any_variant()
    ) {
        let text = join(&lines);
        prop_assert_eq!(transform_text(&text, variant), text);
    }

    /// Every selector line becomes the canonical declaration for the target build
    #[test]
    fn prop_selector_lines_canonical(
        lines in mountlist_lines(),
        variant in any_variant()
    ) {
        let table = ReplacementTable::for_variant(variant);
        let input: Vec<String> = lines.iter().map(|l| format!("{}\n", l)).collect();
        let out: Vec<Vec<u8>> = transform(&input, variant).collect();

        for (before, after) in input.iter().zip(&out) {
            match table.selector_service(before.as_bytes()) {
                Some(service) => {
                    let expected = format!(
                        "    Handler = Devs:Cloud/{}\n",
                        service.handler_filename(variant)
                    );
                    prop_assert_eq!(after.as_slice(), expected.as_bytes());
                }
                None => prop_assert_eq!(after.as_slice(), before.as_bytes()),
            }
        }
    }
}

// ============================================================================
// Property 3: Idempotence and round trip
// ============================================================================

proptest! {
    /// Applying the same build twice gives the same result as once
    #[test]
    fn prop_transform_idempotent(
        lines in mountlist_lines(),
        variant in any_variant()
    ) {
        let once = transform_text(&join(&lines), variant);
        let twice = transform_text(&once, variant);
        prop_assert_eq!(once, twice);
    }

    /// Switching away and back ends where a direct switch would
    #[test]
    fn prop_round_trip_converges(
        lines in mountlist_lines(),
        first in any_variant(),
        second in any_variant()
    ) {
        let text = join(&lines);
        let direct = transform_text(&text, second);
        let via = transform_text(&transform_text(&text, first), second);
        prop_assert_eq!(direct, via);
    }
}

// ============================================================================
// Property 4: File transactions
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The file on disk equals the in-memory transform and no temp files remain
    #[test]
    fn prop_apply_matches_transform(
        lines in mountlist_lines(),
        variant in any_variant()
    ) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cloud.mountlist");
        let text = join(&lines);
        fs::write(&path, &text).unwrap();

        let mountlist = Mountlist::new(&path);
        let applied = mountlist.apply_variant(variant, &NullSink).unwrap();

        prop_assert_eq!(fs::read_to_string(&path).unwrap(), transform_text(&text, variant));
        prop_assert_eq!(applied.lines, lines.len());
        prop_assert!(!mountlist.paths().staging.exists());
        prop_assert!(!mountlist.paths().backup.exists());
    }

    /// Detection reports the build just applied whenever a declaration exists
    #[test]
    fn prop_detect_after_apply(
        lines in mountlist_lines(),
        variant in any_variant()
    ) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cloud.mountlist");
        let text = join(&lines);
        fs::write(&path, &text).unwrap();

        Mountlist::new(&path).apply_variant(variant, &NullSink).unwrap();

        let has_selector = text.contains("Handler = Devs:Cloud/");
        let expected = if has_selector { variant } else { Variant::M68k };
        prop_assert_eq!(detect_variant(&path), expected);
    }
}

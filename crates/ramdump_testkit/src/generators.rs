//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random segment tables that keep the
//! layout invariants a producer would.

use ramdump_core::{CoreFormat, Segment, MAX_NAME_LENGTH};
use proptest::prelude::*;

/// Strategy for any header format.
pub fn core_format_strategy() -> impl Strategy<Value = CoreFormat> {
    prop_oneof![
        Just(CoreFormat::Raw),
        Just(CoreFormat::Elf32Core),
        Just(CoreFormat::SectionCore),
    ]
}

/// Strategy for section names, sometimes longer than the string table
/// slot allows.
pub fn section_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(&format!("[a-z][a-z0-9_]{{0,{}}}", MAX_NAME_LENGTH * 2))
        .expect("Invalid regex")
}

/// Strategy for `(address, size)` pairs in ascending, non-overlapping
/// order, with addresses that fit an ELF32 header.
pub fn segment_layout_strategy(
    max_segments: usize,
    max_size: usize,
) -> impl Strategy<Value = Vec<(u64, usize)>> {
    prop::collection::vec((0u64..0x1000, 0..=max_size), 1..=max_segments.max(1)).prop_map(
        |parts| {
            let mut address = 0x8000_0000u64;
            parts
                .into_iter()
                .map(|(gap, size)| {
                    let start = address + gap;
                    address = start + size as u64;
                    (start, size)
                })
                .collect()
        },
    )
}

/// Strategy for unmapped, named segments in ascending address order.
pub fn named_segments_strategy(max_segments: usize) -> impl Strategy<Value = Vec<Segment>> {
    (
        segment_layout_strategy(max_segments, 4096),
        prop::collection::vec(section_name_strategy(), max_segments.max(1)),
    )
        .prop_map(|(layout, names)| {
            layout
                .into_iter()
                .zip(names)
                .map(|((address, size), name)| {
                    Segment::new(address, size as u64).with_name(name)
                })
                .collect()
        })
}

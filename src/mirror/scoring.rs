use crate::{types::TrackDescriptor, utils};

const TITLE_WEIGHT: f64 = 100.0;
const ARTIST_WEIGHT: f64 = 60.0;
const DURATION_WEIGHT: f64 = 40.0;

/// Whether the candidate's duration lies within `tolerance_ms` of the
/// expected one. An unknown duration (0) on either side passes.
pub fn passes_duration_gate(
    expected: &TrackDescriptor,
    candidate: &TrackDescriptor,
    tolerance_ms: u64,
) -> bool {
    if expected.duration_ms == 0 || candidate.duration_ms == 0 {
        return true;
    }
    utils::duration_distance(expected.duration_ms, candidate.duration_ms) <= tolerance_ms
}

/// Case-insensitive ISRC equality; false when either side lacks one.
pub fn isrc_matches(expected: &TrackDescriptor, candidate: &TrackDescriptor) -> bool {
    match (expected.isrc.as_deref(), candidate.isrc.as_deref()) {
        (Some(left), Some(right)) => {
            let left = left.trim();
            !left.is_empty() && left.eq_ignore_ascii_case(right.trim())
        }
        _ => false,
    }
}

/// Text and duration score of a candidate that already passed the gate.
pub fn score(expected: &TrackDescriptor, candidate: &TrackDescriptor, tolerance_ms: u64) -> f64 {
    let title = utils::text_similarity(&expected.title, &candidate.title);
    let artist = utils::text_similarity(&expected.author, &candidate.author);

    let closeness = if expected.duration_ms == 0 || candidate.duration_ms == 0 {
        0.0
    } else if tolerance_ms == 0 {
        1.0
    } else {
        let distance = utils::duration_distance(expected.duration_ms, candidate.duration_ms);
        1.0 - (distance.min(tolerance_ms) as f64 / tolerance_ms as f64)
    };

    title * TITLE_WEIGHT + artist * ARTIST_WEIGHT + closeness * DURATION_WEIGHT
}

/// Picks the best candidate for `expected`, or `None` when nothing passes
/// the duration gate.
///
/// An exact ISRC match wins outright wherever it sits in the list. Otherwise
/// the highest score wins and ties go to the earlier candidate.
pub fn select_best<'a>(
    expected: &TrackDescriptor,
    candidates: &'a [TrackDescriptor],
    tolerance_ms: u64,
) -> Option<&'a TrackDescriptor> {
    let gated: Vec<&TrackDescriptor> = candidates
        .iter()
        .filter(|candidate| passes_duration_gate(expected, candidate, tolerance_ms))
        .collect();

    if let Some(exact) = gated.iter().find(|candidate| isrc_matches(expected, candidate)) {
        return Some(*exact);
    }

    let mut best: Option<(&TrackDescriptor, f64)> = None;
    for candidate in gated {
        let value = score(expected, candidate, tolerance_ms);
        if best.is_none_or(|(_, top)| value > top) {
            best = Some((candidate, value));
        }
    }
    best.map(|(candidate, _)| candidate)
}

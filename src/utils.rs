use std::collections::HashSet;

use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde_json::Value;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{Res, error::SourceError, types::SeedSet};

/// URL-safe base64 that accepts both padded and unpadded input, as JWT
/// segments come either way.
const JWT_SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Lowercases, strips diacritics and punctuation, and collapses whitespace.
///
/// `"Beyoncé - Halo (Live)"` becomes `"beyonce halo live"`.
pub fn normalize_text(value: &str) -> String {
    let mut normalized = String::with_capacity(value.len());
    for ch in value.nfd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_alphanumeric() {
            normalized.extend(ch.to_lowercase());
        } else {
            normalized.push(' ');
        }
    }
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized text with all whitespace removed.
pub fn compact_text(value: &str) -> String {
    normalize_text(value).replace(' ', "")
}

/// Share of distinct words the two normalized strings have in common,
/// relative to the longer word set.
pub fn word_overlap_ratio(left: &str, right: &str) -> f64 {
    let left_tokens: HashSet<&str> = left.split_whitespace().collect();
    let right_tokens: HashSet<&str> = right.split_whitespace().collect();
    if left_tokens.is_empty() || right_tokens.is_empty() {
        return 0.0;
    }
    let overlap = left_tokens.intersection(&right_tokens).count() as f64;
    overlap / (left_tokens.len().max(right_tokens.len()) as f64)
}

/// Whether the words of `needle` appear as a run of whole words in
/// `haystack`. Both are expected normalized.
pub fn contains_words(haystack: &str, needle: &str) -> bool {
    let haystack: Vec<&str> = haystack.split_whitespace().collect();
    let needle: Vec<&str> = needle.split_whitespace().collect();
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle.as_slice())
}

/// Similarity of two display strings in `[0, 1]`.
///
/// Equal after normalization scores 1.0, whole-word containment of one in
/// the other 0.8, everything else the word overlap ratio.
pub fn text_similarity(expected: &str, candidate: &str) -> f64 {
    let expected = normalize_text(expected);
    let candidate = normalize_text(candidate);
    if expected.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let compact_expected = expected.replace(' ', "");
    let compact_candidate = candidate.replace(' ', "");
    if expected == candidate || compact_expected == compact_candidate {
        return 1.0;
    }
    if contains_words(&candidate, &expected) || contains_words(&expected, &candidate) {
        return 0.8;
    }
    word_overlap_ratio(&expected, &candidate)
}

/// Substitutes the `{w}`/`{h}` placeholders of an artwork template.
pub fn materialize_artwork(template: &str, width: &str, height: &str) -> String {
    template.replace("{w}", width).replace("{h}", height)
}

/// Decodes the claims segment of a JWT without verifying its signature.
pub fn decode_jwt_claims(token: &str) -> Res<Value> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| SourceError::parse("token is not a JWT"))?;
    let bytes = JWT_SEGMENT
        .decode(payload)
        .map_err(|e| SourceError::parse(format!("token claims are not base64: {e}")))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Splits `artists|tracks|genres` into a seed set. Extra segments are ignored.
pub fn parse_seeds(query: &str) -> SeedSet {
    let mut seeds = SeedSet::default();
    for (i, seed) in query.split('|').take(3).enumerate() {
        let seed = seed.trim().to_string();
        match i {
            0 => seeds.artists = seed,
            1 => seeds.tracks = seed,
            _ => seeds.genres = seed,
        }
    }
    seeds
}

/// Absolute difference of two durations in milliseconds.
pub fn duration_distance(left_ms: u64, right_ms: u64) -> u64 {
    left_ms.abs_diff(right_ms)
}

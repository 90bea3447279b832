use std::sync::LazyLock;

use regex::Regex;

// ============================================================================
// Noise
// ============================================================================

/// Substrings stripped from a lower-cased tab title, in order.
///
/// Every bracketed variant comes before its bare counterpart so a bare
/// removal never leaves a stray `(`/`)`/`[`/`]` behind. No entry may be a
/// substring of a bracketed entry that follows it.
pub const NOISE: &[&str] = &[
    // platform suffixes
    " - youtube music",
    " - youtube",
    " | youtube",
    " - soundcloud",
    " | free listening on soundcloud",
    // video annotations
    "(official music video)",
    "[official music video]",
    "official music video",
    "(official lyric video)",
    "[official lyric video]",
    "official lyric video",
    "(official video)",
    "[official video]",
    "official video",
    "(official audio)",
    "[official audio]",
    "official audio",
    "(official visualizer)",
    "[official visualizer]",
    "official visualizer",
    "(music video)",
    "[music video]",
    "music video",
    "(lyric video)",
    "[lyric video]",
    "lyric video",
    "(lyrics)",
    "[lyrics]",
    "(lyric)",
    "[lyric]",
    "(audio)",
    "[audio]",
    "(visualizer)",
    "[visualizer]",
    "(explicit)",
    "[explicit]",
    "(hd)",
    "[hd]",
    "(hq)",
    "[hq]",
    "(4k)",
    "[4k]",
    // featuring markers
    "featuring ",
    "feat. ",
    "feat ",
    "ft. ",
];

/// Collaboration markers folded into a plain space.
pub const REPLACEMENTS: &[(&str, &str)] = &[(" x ", " "), (" by ", " "), (" & ", " ")];

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

// ============================================================================
// String Utilities
// ============================================================================

/// Remove every occurrence of `noise`, including ones that only appear once
/// an earlier occurrence is gone.
pub fn remove_text(text: &str, noise: &str) -> String {
    if noise.is_empty() {
        return text.to_string();
    }

    let mut out = text.to_string();
    while out.contains(noise) {
        out = out.replace(noise, "");
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Turn a browser tab title into a catalog search query.
///
/// `Rick Astley - Never Gonna Give You Up (Official Music Video) - YouTube`
/// becomes `rick astley - never gonna give you up`.
pub fn normalize_title(title: &str) -> String {
    let mut query = title.to_lowercase();

    for noise in NOISE {
        query = remove_text(&query, noise);
    }

    for (from, to) in REPLACEMENTS {
        // Loop so adjacent markers sharing a space (" x by ") are all folded
        while query.contains(from) {
            query = query.replace(from, to);
        }
    }

    collapse_whitespace(&query)
}

/// Shorten a query for a notification: at most 15 characters, then `...`.
pub fn truncate_query(query: &str) -> String {
    const MAX_CHARS: usize = 15;

    if query.chars().count() <= MAX_CHARS {
        return query.to_string();
    }
    let prefix: String = query.chars().take(MAX_CHARS).collect();
    format!("{}...", prefix)
}

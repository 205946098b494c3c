//! Language tags
//!
//! Tags are opaque: nothing here validates them. The only interpretation
//! Lexbridge makes is whether a tag names English, which decides if the
//! online path translates at all.

/// Tag of synthesized queries and of the shared embedding space
pub const ENGLISH: &str = "en";

/// Indic languages every synthesized query is translated into
pub const DEFAULT_TARGET_LANGUAGES: [&str; 22] = [
    "as", "bn", "brx", "doi", "gu", "hi", "kn", "ks", "kok", "mai", "ml", "mni", "mr", "ne", "or",
    "pa", "sa", "sat", "sd", "ta", "te", "ur",
];

const ENGLISH_ALIASES: [&str; 4] = ["en", "eng", "eng_latn", "english"];

/// Whether a tag names English
pub fn is_english(tag: &str) -> bool {
    let tag = tag.trim();
    ENGLISH_ALIASES
        .iter()
        .any(|alias| tag.eq_ignore_ascii_case(alias))
}

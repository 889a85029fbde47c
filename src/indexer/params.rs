//! Tunable parameters for the term extraction pipeline.
//!
//! Kept deliberately free of any mail- or store-specific types so the
//! indexer stays pure and can be exercised with a single parameter bundle
//! in unit tests (see `src/indexer/mod.rs`).

/// Parameters controlling n-gram generation and term caps.
#[derive(Debug, Clone)]
pub struct IndexParams {
    /// Max characters per raw token, applied immediately after splitting.
    pub max_token_length: usize,
    /// Max tokens per n-gram (phrase) drawn from the mail body.
    pub word_ngram_limit: usize,
    /// Max tokens per n-gram when exploding a code-like fragment.
    pub code_ngram_limit: usize,
    /// Max tokens per n-gram for author/email/subject fields.
    pub subject_ngram_limit: usize,
    /// Max terms per mail document (global cap, append-order truncation).
    pub max_terms: usize,
    /// Max terms contributed by a single code fragment's local bag.
    pub max_code_terms: usize,
    /// Normalized tokens in this list are dropped from the n-gram stream.
    pub stop_words: Vec<String>,
    /// Raw (lower-cased, pre-normalization) tokens starting with any of
    /// these prefixes are dropped immediately after splitting.
    pub stop_prefixes: Vec<String>,
}

impl Default for IndexParams {
    fn default() -> Self {
        DEFAULT_PARAMS.clone()
    }
}

/// Default stop words: short, high-frequency English function words that
/// contribute no search value as standalone terms.
pub fn default_stop_words() -> Vec<String> {
    [
        "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "has",
        "have", "he", "her", "his", "i", "if", "in", "into", "is", "it", "its", "no", "not",
        "of", "on", "or", "our", "she", "so", "than", "that", "the", "their", "them", "then",
        "there", "these", "they", "this", "to", "was", "we", "were", "will", "with", "you",
        "your",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Default stop prefixes: quoted-reply markers and bare URL schemes that
/// are noise when left whole but still participate in code-ngram splitting
/// upstream of this filter.
pub fn default_stop_prefixes() -> Vec<String> {
    [">", "|", "--", "__", "http://", "https://"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// The parameter bundle used in production, mirroring the original
/// `DEFAULT_PARAMS` in `original_source/src/params.py`.
pub static DEFAULT_PARAMS: std::sync::LazyLock<IndexParams> = std::sync::LazyLock::new(|| IndexParams {
    max_token_length: 100,
    word_ngram_limit: 3,
    code_ngram_limit: 10,
    subject_ngram_limit: 5,
    max_terms: 2500,
    max_code_terms: 100,
    stop_words: default_stop_words(),
    stop_prefixes: default_stop_prefixes(),
});

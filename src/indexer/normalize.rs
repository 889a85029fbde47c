//! Key normalization shared by the indexer and the storage/query layers.
//!
//! `normalize` must produce byte-identical output whether it is called while
//! building index keys (author/email) or while building stored term strings —
//! the query side and the write side both call the same function.

use std::sync::LazyLock;

use regex::Regex;

static NON_KEY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w+#]+").expect("static regex is valid"));

/// Lower-case `s`, then strip every character that isn't a word character
/// (Unicode letter/digit/underscore), `+`, or `#`.
///
/// `+` and `#` are preserved so tokens like `c#` and `c++` survive.
pub fn normalize(s: &str) -> String {
    NON_KEY_CHARS.replace_all(&s.to_lowercase(), "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_lowercases() {
        assert_eq!(normalize("James Gosling"), "jamesgosling");
    }

    #[test]
    fn preserves_plus_and_hash() {
        assert_eq!(normalize("C++"), "c++");
        assert_eq!(normalize("C#"), "c#");
    }

    #[test]
    fn email_normalizes_to_single_run() {
        assert_eq!(normalize("james.gosling@sun.com"), "jamesgoslingsuncom");
    }

    #[test]
    fn idempotent() {
        for s in ["James Gosling", "C++", "c#", "foo_bar-99", "-", "- -"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "normalize not idempotent for {s:?}");
        }
    }

    #[test]
    fn degenerate_author_normalizes_empty() {
        assert_eq!(normalize("-"), "");
        assert_eq!(normalize("- -"), "");
    }
}

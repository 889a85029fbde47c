//! Pure term extraction (C2 in the design).
//!
//! `Indexer::index` is a pure function of its four text inputs and the
//! parameter bundle: no I/O, no shared state, deterministic output order.
//! The orchestrator applies `stop_terms`/`stop_lines`/`stop_func` around
//! this pipeline (see `crate::orchestrator::stops`); this module only knows
//! about `stop_words` and `stop_prefixes`.

pub mod normalize;
pub mod params;

pub use normalize::normalize;
pub use params::IndexParams;

/// A term: a non-empty ordered sequence of 1..N normalized tokens.
pub type Term = Vec<String>;

/// Serialize a term to its stored form: tokens joined with `|`.
pub fn join_term(term: &[String]) -> String {
    term.join("|")
}

pub struct Indexer<'a> {
    params: &'a IndexParams,
}

impl<'a> Indexer<'a> {
    pub fn new(params: &'a IndexParams) -> Self {
        Self { params }
    }

    /// Split on whitespace, drop tokens longer than `max_token_length`,
    /// lower-case, drop tokens whose lowered form starts with a stop prefix.
    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered: Vec<String> = text
            .split_whitespace()
            .filter(|t| t.chars().count() <= self.params.max_token_length)
            .map(|t| t.to_lowercase())
            .collect();
        lowered
            .into_iter()
            .filter(|t| !self.params.stop_prefixes.iter().any(|sp| t.starts_with(sp.as_str())))
            .collect()
    }

    /// Normalize each token and drop empties and stop-words.
    fn normalize_and_filter(&self, tokens: &[String]) -> Vec<String> {
        tokens
            .iter()
            .map(|t| normalize(t))
            .filter(|t| !t.is_empty() && !self.params.stop_words.iter().any(|w| w == t))
            .collect()
    }

    /// For each start position `start..start+limit` (clipped at the end of
    /// `arr`), return the growing prefix slices `arr[start..=i]`.
    fn ngrams(arr: &[String], start: usize, limit: usize) -> Vec<Vec<String>> {
        let end = (start + limit).min(arr.len());
        (start..end).map(|i| arr[start..=i].to_vec()).collect()
    }

    fn add_word_ngrams(&self, terms: &mut Vec<Term>, tokens: &[String], limit: usize) {
        for i in 0..tokens.len() {
            for sub in Self::ngrams(tokens, i, limit) {
                if terms.len() >= self.params.max_terms {
                    return;
                }
                if !terms.contains(&sub) {
                    terms.push(sub);
                }
            }
        }
    }

    /// Build the local bag of code-derived terms for one delimiter-split
    /// segment list, e.g. `["java", "util", "concurrent"]`.
    fn add_code_ngrams(&self, local: &mut Vec<Term>, segments: &[String]) {
        for i in 0..segments.len() {
            for sub in Self::ngrams(segments, i, self.params.code_ngram_limit) {
                let joined: String = sub.concat();
                let n = normalize(&joined);
                if n.is_empty() {
                    continue;
                }
                let term = vec![n];
                if local.len() >= self.params.max_code_terms {
                    continue;
                }
                if !local.contains(&term) {
                    local.push(term);
                }
            }
        }
    }

    /// Explode every raw token containing a code delimiter (`/`, `.`, `=`,
    /// `::`) and merge the resulting single-token terms into `terms`.
    fn add_all_code_ngrams(&self, terms: &mut Vec<Term>, raw_tokens: &[String]) {
        const DELIMITERS: [&str; 4] = ["/", ".", "=", "::"];
        let mut local: Vec<Term> = Vec::new();
        for token in raw_tokens {
            for delim in DELIMITERS {
                if token.contains(delim) {
                    let segments: Vec<String> =
                        token.split(delim).map(|s| s.to_string()).collect();
                    self.add_code_ngrams(&mut local, &segments);
                }
            }
        }
        for term in local {
            if terms.len() >= self.params.max_terms {
                return;
            }
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }

    fn index_field(
        &self,
        terms: &mut Vec<Term>,
        text: &str,
        parse_code: bool,
        all_ngrams: bool,
        ngram_limit: usize,
    ) {
        let raw_tokens = self.tokenize(text);
        let norm_tokens = self.normalize_and_filter(&raw_tokens);

        self.add_word_ngrams(terms, &norm_tokens, ngram_limit);

        if all_ngrams && !norm_tokens.is_empty() && terms.len() < self.params.max_terms {
            if !terms.contains(&norm_tokens) {
                terms.push(norm_tokens.clone());
            }
        }

        // Code n-grams are lowest priority: run last so they are the first
        // thing dropped once max_terms is reached.
        if parse_code {
            self.add_all_code_ngrams(terms, &raw_tokens);
        }
    }

    /// Build the single term a search query resolves to: tokenize and
    /// normalize `q` the same way a field is indexed, but without forming
    /// n-grams — the caller passes an `IndexParams` with a raised
    /// `max_token_length` for the query path (see the query handler).
    pub fn query_term(&self, q: &str) -> String {
        let raw = self.tokenize(q);
        let norm = self.normalize_and_filter(&raw);
        join_term(&norm)
    }

    /// Derive the ordered, deduplicated, capped term list for one message.
    pub fn index(&self, author: &str, email: &str, subject: &str, body: &str) -> Vec<Term> {
        let mut terms = Vec::new();
        let targets: [(&str, bool, bool, usize); 4] = [
            (author, false, true, self.params.subject_ngram_limit),
            (email, false, true, self.params.subject_ngram_limit),
            (subject, false, true, self.params.subject_ngram_limit),
            (body, true, false, self.params.word_ngram_limit),
        ];
        for (text, parse_code, all_ngrams, ngram_limit) in targets {
            self.index_field(&mut terms, text, parse_code, all_ngrams, ngram_limit);
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(words: &[&str]) -> Term {
        words.iter().map(|s| s.to_string()).collect()
    }

    fn terms(rows: &[&[&str]]) -> Vec<Term> {
        rows.iter().map(|r| term(r)).collect()
    }

    /// Small param bundle mirroring `original_source/src/indexer_test.py`,
    /// used to check the pipeline against the reference implementation's
    /// worked example.
    fn reference_params() -> IndexParams {
        IndexParams {
            max_token_length: 50,
            word_ngram_limit: 2,
            code_ngram_limit: 3,
            subject_ngram_limit: 2,
            max_terms: 100,
            max_code_terms: 6,
            stop_words: vec!["the".into(), "is".into(), "of".into()],
            stop_prefixes: vec![],
        }
    }

    #[test]
    fn tokenize_drops_overlong_tokens() {
        let params = reference_params();
        let idx = Indexer::new(&params);
        assert_eq!(idx.tokenize("a b c"), vec!["a", "b", "c"]);
        assert_eq!(idx.tokenize(&format!("a b {}", "c".repeat(51))), vec!["a", "b"]);
    }

    #[test]
    fn add_word_ngrams_dedups_repeated_tokens() {
        let params = reference_params();
        let idx = Indexer::new(&params);
        let mut out = Vec::new();
        idx.add_word_ngrams(&mut out, &["a".into(), "a".into(), "a".into()], 2);
        assert_eq!(out, terms(&[&["a"], &["a", "a"]]));

        let mut out = Vec::new();
        idx.add_word_ngrams(&mut out, &["a".into(), "b".into(), "c".into()], 2);
        assert_eq!(out, terms(&[&["a"], &["a", "b"], &["b"], &["b", "c"], &["c"]]));
    }

    #[test]
    fn add_code_ngrams_matches_reference() {
        let params = reference_params();
        let idx = Indexer::new(&params);

        let mut out = vec![term(&["a"])];
        idx.add_code_ngrams(&mut out, &["a".into()]);
        assert_eq!(out, vec![term(&["a"])]);

        let mut out = vec![term(&["a"]); 100];
        idx.add_code_ngrams(&mut out, &["x".into()]);
        assert_eq!(out, vec![term(&["a"]); 100]);

        let mut out = Vec::new();
        idx.add_code_ngrams(&mut out, &["abc".into(), "x % y".into()]);
        assert_eq!(out, terms(&[&["abc"], &["abcxy"], &["xy"]]));

        let mut out = Vec::new();
        idx.add_code_ngrams(&mut out, &["java".into(), "util".into(), "concurrent".into()]);
        assert_eq!(
            out,
            terms(&[
                &["java"],
                &["javautil"],
                &["javautilconcurrent"],
                &["util"],
                &["utilconcurrent"],
                &["concurrent"],
            ])
        );

        let mut out = Vec::new();
        idx.add_code_ngrams(
            &mut out,
            &["java".into(), "util".into(), "concurrent".into(), "map".into()],
        );
        assert_eq!(
            out,
            terms(&[
                &["java"],
                &["javautil"],
                &["javautilconcurrent"],
                &["util"],
                &["utilconcurrent"],
                &["utilconcurrentmap"],
            ])
        );
    }

    #[test]
    fn add_all_code_ngrams_splits_dotted_path() {
        let params = reference_params();
        let idx = Indexer::new(&params);
        let mut out = Vec::new();
        idx.add_all_code_ngrams(&mut out, &["java.util.concurrent".into()]);
        assert_eq!(
            out,
            terms(&[
                &["java"],
                &["javautil"],
                &["javautilconcurrent"],
                &["util"],
                &["utilconcurrent"],
                &["concurrent"],
            ])
        );
    }

    #[test]
    fn index_matches_reference_worked_example() {
        let params = reference_params();
        let idx = Indexer::new(&params);
        let author = "James Gosling";
        let email = "james.gosling@sun.com";
        let subject = "Introducing the Java Programming Language";
        let body = "Greetings!\n        \n        Behold the following example of Java:\n        \n        public static void main(String[] args) {\n          System.out.println(\"Hello, world!\");\n        }";

        let got = idx.index(author, email, subject, body);
        let want = terms(&[
            &["james"], &["james", "gosling"], &["gosling"],
            &["jamesgoslingsuncom"],
            &["introducing"], &["introducing", "java"], &["java"], &["java", "programming"], &["programming"],
                &["programming", "language"], &["language"], &["introducing", "java", "programming", "language"],
            &["greetings"], &["greetings", "behold"], &["behold"], &["behold", "following"], &["following"],
                &["following", "example"], &["example"], &["example", "java"], &["java", "public"], &["public"],
                &["public", "static"], &["static"], &["static", "void"], &["void"], &["void", "mainstring"],
                &["mainstring"], &["mainstring", "args"], &["args"], &["args", "systemoutprintlnhello"],
                &["systemoutprintlnhello"], &["systemoutprintlnhello", "world"], &["world"], &["system"],
                &["systemout"], &["out"], &["outprintlnhello"], &["printlnhello"],
        ]);
        assert_eq!(got, want);
    }

    #[test]
    fn terms_are_deduplicated_and_capped() {
        let mut params = reference_params();
        params.max_terms = 3;
        let idx = Indexer::new(&params);
        let terms = idx.index("", "", "", "alpha beta alpha beta gamma delta");
        assert_eq!(terms.len(), 3);
    }

    #[test]
    fn deterministic_across_runs() {
        let params = IndexParams::default();
        let idx = Indexer::new(&params);
        let a = idx.index("Mark Reinhold", "mr@openjdk.org", "JEP 123", "some body text here");
        let b = idx.index("Mark Reinhold", "mr@openjdk.org", "JEP 123", "some body text here");
        assert_eq!(a, b);
    }

    #[test]
    fn default_stop_words_removed_from_norm_tokens() {
        let params = IndexParams::default();
        let idx = Indexer::new(&params);
        let found = idx.index("", "", "", "the quick fox");
        assert!(!found.iter().any(|t| t == &term(&["the"])));
    }

    #[test]
    fn query_term_joins_normalized_tokens_without_forming_ngrams() {
        let mut params = reference_params();
        params.max_token_length = 10_000;
        let idx = Indexer::new(&params);
        assert_eq!(idx.query_term("java.util.Concurrent"), "javautilconcurrent");
        assert_eq!(idx.query_term("the of"), "");
    }

    #[test]
    fn empty_field_contributes_no_all_ngrams_bundle() {
        let params = IndexParams::default();
        let idx = Indexer::new(&params);
        let found = idx.index("", "", "", "");
        assert!(found.is_empty());
    }
}

//! Mail filtering rules applied between fetch and index: skip auto-generated
//! changeset notifications entirely, strip diff/signature noise lines from
//! the body before indexing, and drop a handful of terms that are too
//! common in this archive to be useful search keys. `original_source`'s
//! equivalent module ships as list-specific data rather than code, so the
//! defaults below are a reasonable invention for this archive's mail
//! (see the Open Questions resolution in DESIGN.md).

use std::sync::LazyLock;

use regex::Regex;

use crate::archive::Mail;
use crate::indexer::{Term, join_term};

/// Lines matching any of these are dropped from the body before indexing:
/// unified-diff hunks, diff file headers, and PGP/signature boilerplate.
static STOP_LINE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^diff --git ",
        r"^index [0-9a-f]+\.\.[0-9a-f]+",
        r"^--- ",
        r"^\+\+\+ ",
        r"^@@ .* @@",
        r"^-----BEGIN PGP SIGNATURE-----",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static stop-line pattern"))
    .collect()
});

/// Terms too common in this archive to be useful search keys.
const STOP_TERMS: &[&str] = &["openjdk", "jdk", "http", "https"];

/// True for auto-generated changeset notification mail, which carries no
/// useful prose to index (per spec §4.4).
pub fn is_changeset(mail: &Mail) -> bool {
    let subject = mail.subject.trim();
    let subject_is_changeset = (subject.starts_with("hg:") || subject.starts_with("git: ")) && subject.ends_with("changesets");
    let body_is_changeset = mail.body.trim_start().starts_with("Changeset:");
    subject_is_changeset || body_is_changeset
}

/// Drop lines matching [`STOP_LINE_PATTERNS`], e.g. diff hunks and
/// signature blocks, before the body reaches the indexer.
pub fn strip_stop_lines(body: &str) -> String {
    body.lines()
        .filter(|line| !STOP_LINE_PATTERNS.iter().any(|re| re.is_match(line)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// True if a term's joined form is on the stop list and should not be written.
pub fn is_stop_term(term: &Term) -> bool {
    STOP_TERMS.contains(&join_term(term).as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(subject: &str, body: &str) -> Mail {
        Mail {
            list: "loom-dev".into(),
            month: "2025-February".into(),
            id: "000001".into(),
            subject: subject.into(),
            author: "A".into(),
            email: "a@example.com".into(),
            date: "2025-02-04T09:15:03Z".into(),
            body: body.into(),
        }
    }

    #[test]
    fn hg_changeset_subject_is_skipped() {
        assert!(is_changeset(&mail("hg: jdk/jdk: 12 new changesets", "")));
    }

    #[test]
    fn git_changeset_subject_is_skipped() {
        assert!(is_changeset(&mail("git: jdk/jdk: 3 new changesets", "")));
    }

    #[test]
    fn changeset_body_is_skipped() {
        assert!(is_changeset(&mail("Re: review request", "Changeset: abcdef123456\nAuthor: foo\n")));
    }

    #[test]
    fn ordinary_mail_is_not_skipped() {
        assert!(!is_changeset(&mail("RFR: JDK-1234 fix NPE", "Please review this patch.")));
    }

    #[test]
    fn strip_stop_lines_drops_diff_noise_keeps_prose() {
        let body = "Please see the patch below:\n\ndiff --git a/Foo.java b/Foo.java\nindex abc123..def456 100644\n--- a/Foo.java\n+++ b/Foo.java\n@@ -1,3 +1,3 @@\nThanks,\nJane\n";
        let stripped = strip_stop_lines(body);
        assert!(stripped.contains("Please see the patch below:"));
        assert!(stripped.contains("Thanks,"));
        assert!(!stripped.contains("diff --git"));
        assert!(!stripped.contains("@@ -1,3 +1,3 @@"));
    }

    #[test]
    fn stop_terms_are_filtered() {
        let term: Term = vec!["openjdk".to_string()];
        assert!(is_stop_term(&term));
        let term: Term = vec!["npe".to_string()];
        assert!(!is_stop_term(&term));
    }
}

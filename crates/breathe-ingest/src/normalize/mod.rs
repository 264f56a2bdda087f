//! Per-cell text normalization.
//!
//! Three pure stages, always applied in this order:
//!
//! 1. [`repair_text`]: undo mis-decoding and other text damage
//! 2. [`strip_disallowed`]: keep only ASCII alphanumerics, whitespace and
//!    the punctuation set `, . ! ? : ; ' " ( ) - – — %`
//! 3. [`fold_to_ascii`]: NFKD decompose and drop every non-ASCII code point
//!
//! The output of [`clean_text`] is pure ASCII drawn from the allowed set, so
//! running the chain again is a no-op.

mod repair;

use unicode_normalization::UnicodeNormalization;

use crate::schema::{Record, RecordBatch};

pub use repair::{fix_mojibake, repair_text};

/// Non-alphanumeric characters that survive [`strip_disallowed`].
const ALLOWED_PUNCTUATION: &[char] = &[
    ',', '.', '!', '?', ':', ';', '\'', '"', '(', ')', '-', '–', '—', '%',
];

/// Stage 2: remove every character outside the allow-list.
pub fn strip_disallowed(text: &str) -> String {
    text.chars()
        .filter(|&c| c.is_ascii_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(&c))
        .collect()
}

/// Stage 3: compatibility-decompose and keep only ASCII.
pub fn fold_to_ascii(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}

/// Full chain for one cell. NULL stays NULL.
pub fn clean_text(text: Option<&str>) -> Option<String> {
    let text = text?;
    let repaired = repair_text(text);
    let allowed = strip_disallowed(&repaired);
    Some(fold_to_ascii(&allowed))
}

/// Clean every field of a record.
pub fn clean_record(record: &Record) -> Record {
    record.map_fields(clean_text)
}

/// Clean a whole batch, keeping row order.
pub fn clean_batch(batch: &RecordBatch) -> RecordBatch {
    batch.iter().map(clean_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inputs covering every stage: mojibake, entities, quotes, ligatures,
    /// wide forms, line breaks, diacritics, symbols and scripts outside Latin.
    const SAMPLES: &[&str] = &[
        "",
        "plain ascii text, nothing to do.",
        "The patient’s “asthma” worsened",
        "The patientâ€™s â€œasthmaâ€\u{9d} worsened",
        "cafÃ© au lait",
        "cafÃƒÂ© double-encoded",
        "PM2.5 &amp; NO&#8322; exposure &lt;5 µg/m³",
        "a <b>bold</b> &amp; claim",
        "ﬁne ﬂow eﬃciency",
        "ＡＢＣ１２３！",
        "line one\r\nline two\rline three",
        "naïve Zürich São Paulo Łódź",
        "Ångström — 10–20% range (n=30); p<0.05 @ #1 $5 ^_^ ~ | \\ / {}",
        "北京 大学, Москва",
        "non\u{a0}breaking\u{2003}spaces\u{3000}here",
        "tab\tand\u{000b}vertical\u{000c}feed",
        "emoji 🫁 lungs 😷",
        "Ã",
        "â€",
        "&#x41;&#66;&unknown; & lonely ampersand",
    ];

    #[test]
    fn null_passes_through() {
        assert_eq!(clean_text(None), None);
    }

    #[test]
    fn chain_is_idempotent() {
        for sample in SAMPLES {
            let once = clean_text(Some(sample)).unwrap();
            let twice = clean_text(Some(&once)).unwrap();
            assert_eq!(once, twice, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn output_is_ascii_from_allowed_set() {
        for sample in SAMPLES {
            let out = clean_text(Some(sample)).unwrap();
            assert!(out.is_ascii(), "{out:?}");
            assert_eq!(strip_disallowed(&out), out, "{out:?}");
        }
    }

    #[test]
    fn repairs_mojibake_before_filtering() {
        assert_eq!(
            clean_text(Some("The patientâ€™s â€œasthmaâ€\u{9d} worsened")).as_deref(),
            Some("The patient's \"asthma\" worsened")
        );
    }

    #[test]
    fn diacritics_are_dropped_by_allow_list() {
        // Stage 2 runs before folding, so accented letters disappear entirely
        assert_eq!(clean_text(Some("café")).as_deref(), Some("caf"));
        assert_eq!(clean_text(Some("cafÃ©")).as_deref(), Some("caf"));
    }

    #[test]
    fn dashes_survive_allow_list_then_fold_away() {
        assert_eq!(strip_disallowed("10–20 — x"), "10–20 — x");
        assert_eq!(clean_text(Some("10–20 — x")).as_deref(), Some("1020  x"));
    }

    #[test]
    fn strip_disallowed_keeps_punctuation_set() {
        assert_eq!(
            strip_disallowed(r#"a,b.c!d?e:f;g'h"i(j)k-l%m"#),
            r#"a,b.c!d?e:f;g'h"i(j)k-l%m"#
        );
        assert_eq!(strip_disallowed("a@b#c$d&e*f/g<h>i"), "abcdefghi");
    }

    #[test]
    fn fold_maps_compatibility_whitespace() {
        assert_eq!(fold_to_ascii("a\u{a0}b\u{2003}c"), "a b c");
        assert_eq!(fold_to_ascii("–—"), "");
        assert_eq!(fold_to_ascii("é"), "e");
    }

    #[test]
    fn entities_unescaped_then_filtered() {
        assert_eq!(
            clean_text(Some("PM2.5 &amp; NO&#8322; exposure")).as_deref(),
            Some("PM2.5  NO exposure")
        );
    }

    #[test]
    fn ligatures_and_wide_forms() {
        assert_eq!(clean_text(Some("ﬁne ﬂow")).as_deref(), Some("fine flow"));
        assert_eq!(clean_text(Some("ＡＢＣ１２３！")).as_deref(), Some("ABC123!"));
    }

    #[test]
    fn line_breaks_normalized() {
        assert_eq!(
            clean_text(Some("one\r\ntwo\rthree")).as_deref(),
            Some("one\ntwo\nthree")
        );
    }

    #[test]
    fn clean_record_touches_every_field() {
        let record = Record {
            id: Some("id-1".into()),
            title: Some("Ozone ≥ 70ppb".into()),
            abstract_text: Some("naïve".into()),
            authors: Some("José García".into()),
            keywords: None,
            organization_affiliated: Some("Université – Paris".into()),
        };
        let cleaned = clean_record(&record);
        assert_eq!(cleaned.id.as_deref(), Some("id-1"));
        assert_eq!(cleaned.title.as_deref(), Some("Ozone  70ppb"));
        assert_eq!(cleaned.abstract_text.as_deref(), Some("nave"));
        assert_eq!(cleaned.authors.as_deref(), Some("Jos Garca"));
        assert_eq!(cleaned.keywords, None);
        assert_eq!(cleaned.organization_affiliated.as_deref(), Some("Universit  Paris"));
    }
}

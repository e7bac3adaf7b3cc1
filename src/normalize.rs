//! Translation normalization.
//!
//! Merges per-language translation submissions for one subject (a form, or
//! one tag of the global namespace) into a single key -> {language -> text}
//! view. Only the two translated slots (`nn`, `en`) are merged here; the
//! default-language slot is derived by the reconcilers.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::source::TranslationSubmission;

/// Default (bokmål) language code. Always part of a published language list.
pub const DEFAULT_LANGUAGE: &str = "nb";
/// Nynorsk language code.
pub const NYNORSK: &str = "nn";
/// English language code.
pub const ENGLISH: &str = "en";

/// Map region-qualified Norwegian codes to their base code.
///
/// Unrecognized codes pass through unchanged.
pub fn normalize_language(code: &str) -> &str {
    match code {
        "nn-NO" => NYNORSK,
        "nb-NO" => DEFAULT_LANGUAGE,
        other => other,
    }
}

/// Normalize a form's published-language list.
///
/// Codes are normalized, duplicates dropped (first occurrence wins) and the
/// default language appended when missing.
pub fn published_languages(languages: Option<&[String]>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for code in languages.unwrap_or_default() {
        let code = normalize_language(code);
        if !result.iter().any(|c| c == code) {
            result.push(code.to_string());
        }
    }
    if !result.iter().any(|c| c == DEFAULT_LANGUAGE) {
        result.push(DEFAULT_LANGUAGE.to_string());
    }
    result
}

/// Merged translations for one subject.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTranslations {
    /// Distinct keys in first-seen order.
    pub keys: Vec<String>,
    /// Nynorsk text per key.
    pub nn: HashMap<String, String>,
    /// English text per key.
    pub en: HashMap<String, String>,
    /// Languages supplied by more than one submission.
    pub duplicate_languages: Vec<String>,
    /// Number of submissions merged.
    pub submission_count: usize,
}

impl NormalizedTranslations {
    /// Merge `submissions` belonging to `subject`.
    ///
    /// A later submission for an already-seen language overwrites overlapping
    /// keys; this is logged, not treated as an error.
    pub fn from_submissions<'a, I>(subject: &str, submissions: I) -> Self
    where
        I: IntoIterator<Item = &'a TranslationSubmission>,
    {
        let mut result = Self::default();
        let mut seen_keys: HashSet<String> = HashSet::new();
        let mut seen_languages: HashSet<String> = HashSet::new();

        for submission in submissions {
            result.submission_count += 1;
            let data = &submission.data;

            for key in data.i18n.keys() {
                if seen_keys.insert(key.clone()) {
                    result.keys.push(key.clone());
                }
            }

            let language = normalize_language(&data.language);
            if !seen_languages.insert(language.to_string()) {
                warn!(
                    subject,
                    language,
                    form = data.form.as_deref().unwrap_or_default(),
                    "Duplicate language resource"
                );
                if !result.duplicate_languages.iter().any(|l| l == language) {
                    result.duplicate_languages.push(language.to_string());
                }
            }

            let slot = match language {
                NYNORSK => &mut result.nn,
                ENGLISH => &mut result.en,
                other => {
                    debug!(subject, language = other, "Ignoring language outside translated slots");
                    continue;
                }
            };

            for (key, value) in &data.i18n {
                match value.as_str() {
                    Some(text) => {
                        slot.insert(key.clone(), text.to_string());
                    }
                    None => debug!(subject, key = %key, "Ignoring non-text translation value"),
                }
            }
        }

        result
    }

    pub fn nn(&self, key: &str) -> Option<&str> {
        self.nn.get(key).map(String::as_str)
    }

    pub fn en(&self, key: &str) -> Option<&str> {
        self.en.get(key).map(String::as_str)
    }
}

/// Group global submissions by classification tag, in first-seen tag order.
pub fn group_by_tag(
    submissions: &[TranslationSubmission],
) -> Vec<(String, Vec<&TranslationSubmission>)> {
    let mut groups: Vec<(String, Vec<&TranslationSubmission>)> = Vec::new();
    for submission in submissions {
        let tag = submission.data.tag.clone().unwrap_or_default();
        match groups.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, members)) => members.push(submission),
            None => groups.push((tag, vec![submission])),
        }
    }
    groups
}

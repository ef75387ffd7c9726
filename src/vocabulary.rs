//! Entity Vocabulary Learner
//!
//! One-time startup scan over the designated identity columns. Every distinct
//! value is tokenized two ways (non-alphanumeric splits plus case/digit
//! boundary matches) and each surviving token maps to the set of canonical
//! names it was seen in. Lookups are read-only prompt aids; the index never
//! resolves ambiguity by itself and never updates after startup.

use crate::backend::QueryBackend;
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use strsim::jaro_winkler;
use tracing::{info, warn};

/// Columns whose values name machines; scanned for vocabulary at startup.
pub const IDENTITY_COLUMNS: &[&str] = &["MACHINE_NAME", "MACHINE_GROUP"];

/// Tokens this short are noise ("2", "a") and are discarded.
const MIN_TOKEN_LEN: usize = 3;

/// High enough that generic words ("machine") do not latch onto entity tokens;
/// transposition typos still clear it comfortably.
const FUZZY_THRESHOLD: f64 = 0.9;

lazy_static! {
    static ref WORD_SPLIT: Regex = Regex::new(r"[^a-zA-Z0-9]+").unwrap();
    static ref CASE_TOKENS: Regex = Regex::new(r"[A-Z][a-z]*|[0-9]+|[a-z]+").unwrap();
}

/// Tokenize an identity value: split on non-alphanumeric boundaries, then also
/// on internal case transitions and digit runs, lowercase everything.
pub fn tokenize(value: &str) -> Vec<String> {
    let mut tokens: Vec<String> = WORD_SPLIT
        .split(value)
        .map(|t| t.to_string())
        .collect();
    tokens.extend(CASE_TOKENS.find_iter(value).map(|m| m.as_str().to_string()));

    tokens
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct EntityVocabulary {
    index: HashMap<String, BTreeSet<String>>,
}

impl EntityVocabulary {
    /// Scan every identity column the backend exposes. A failed scan degrades
    /// to whatever was learned so far; startup must not fail on this.
    pub fn learn(backend: &dyn QueryBackend) -> Self {
        let mut vocabulary = Self::default();
        match vocabulary.learn_inner(backend) {
            Ok(scanned) => {
                info!(
                    tokens = vocabulary.index.len(),
                    columns = scanned,
                    "learned entity vocabulary"
                );
            }
            Err(e) => {
                warn!(error = %e, "could not learn entity vocabulary; continuing with partial index");
            }
        }
        vocabulary
    }

    fn learn_inner(&mut self, backend: &dyn QueryBackend) -> Result<usize> {
        let identity = backend.identity_columns()?;
        let mut scanned = 0;
        for (table, column) in identity {
            match backend.distinct_values(&table, &column) {
                Ok(values) => {
                    for value in values {
                        self.observe(&value);
                    }
                    scanned += 1;
                }
                Err(e) => {
                    warn!(table = %table, column = %column, error = %e, "skipping identity column scan");
                }
            }
        }
        Ok(scanned)
    }

    pub fn observe(&mut self, value: &str) {
        for token in tokenize(value) {
            self.index
                .entry(token)
                .or_default()
                .insert(value.to_string());
        }
    }

    /// Case-insensitive exact token lookup.
    pub fn lookup(&self, token: &str) -> Option<&BTreeSet<String>> {
        self.index.get(&token.to_lowercase())
    }

    /// Closest known token by Jaro-Winkler similarity, for near-miss phrasing.
    pub fn nearest_token(&self, probe: &str) -> Option<&str> {
        let probe = probe.to_lowercase();
        let mut best: Option<(&str, f64)> = None;
        for token in self.index.keys() {
            let score = jaro_winkler(&probe, token);
            if score >= FUZZY_THRESHOLD && best.map_or(true, |(_, b)| score > b) {
                best = Some((token.as_str(), score));
            }
        }
        best.map(|(token, _)| token)
    }

    /// All known tokens, sorted for stable prompt construction.
    pub fn known_tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.index.keys().map(|k| k.as_str()).collect();
        tokens.sort_unstable();
        tokens
    }

    /// Canonical entity names matching the question's tokens, exact first and
    /// fuzzy as fallback. Sorted and deduplicated for stable prompts.
    pub fn entities_mentioned(&self, question: &str) -> Vec<String> {
        let mut names = BTreeSet::new();
        for token in tokenize(question) {
            let matched = self
                .lookup(&token)
                .or_else(|| self.nearest_token(&token).and_then(|t| self.index.get(t)));
            if let Some(set) = matched {
                names.extend(set.iter().cloned());
            }
        }
        names.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_case_and_separator_boundaries() {
        let tokens = tokenize("MacLine2A");
        assert!(tokens.contains(&"mac".to_string()));
        assert!(tokens.contains(&"line".to_string()));
        assert!(tokens.contains(&"macline2a".to_string()));
        // Short fragments are discarded.
        assert!(!tokens.contains(&"2".to_string()));
        assert!(!tokens.contains(&"a".to_string()));
    }

    #[test]
    fn variant_spellings_share_tokens() {
        let mut vocabulary = EntityVocabulary::default();
        vocabulary.observe("MacLine2A");
        vocabulary.observe("mac_line_2b");

        let mac = vocabulary.lookup("mac").unwrap();
        assert!(mac.contains("MacLine2A"));
        assert!(mac.contains("mac_line_2b"));

        let line = vocabulary.lookup("LINE").unwrap();
        assert!(line.contains("MacLine2A"));
        assert!(line.contains("mac_line_2b"));
    }

    #[test]
    fn every_token_maps_to_nonempty_set() {
        let mut vocabulary = EntityVocabulary::default();
        vocabulary.observe("GalvatronTrxBullet");
        for token in vocabulary.known_tokens() {
            assert!(!vocabulary.lookup(token).unwrap().is_empty());
        }
    }

    #[test]
    fn nearest_token_catches_typos() {
        let mut vocabulary = EntityVocabulary::default();
        vocabulary.observe("GalvatronTrx");
        assert_eq!(vocabulary.nearest_token("galvatorn"), Some("galvatron"));
        assert_eq!(vocabulary.nearest_token("unrelated"), None);
    }

    #[test]
    fn entities_mentioned_resolves_question_phrasing() {
        let mut vocabulary = EntityVocabulary::default();
        vocabulary.observe("MacLine2A");
        vocabulary.observe("GalvatronTrx");

        let names = vocabulary.entities_mentioned("downtime for mac line today");
        assert_eq!(names, vec!["MacLine2A".to_string()]);
    }
}

//! Session Context
//!
//! Per-session follow-up state: the entity and metric subject of the last
//! successfully answered data question. Follow-up phrasings ("same machine",
//! "that machine") are rewritten to the recorded entity before planning.
//! Callers serialize questions on a session; this type is not synchronized.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    Downtime,
    CycleTime,
    Production,
    General,
}

const FOLLOW_UP_REFERENCES: &[&str] = &[
    "same machine",
    "that machine",
    "this machine",
    "the same one",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub last_entity: Option<String>,
    pub last_subject: Option<String>,
    pub last_context: Option<ContextKind>,
}

impl SessionContext {
    /// Rewrite follow-up references to the last answered entity. Questions
    /// without a recorded entity pass through unchanged.
    pub fn resolve_references(&self, question: &str) -> String {
        let Some(entity) = &self.last_entity else {
            return question.to_string();
        };

        let mut resolved = question.to_string();
        for reference in FOLLOW_UP_REFERENCES {
            resolved = replace_case_insensitive(&resolved, reference, entity);
        }
        resolved
    }

    /// Record the outcome of a successfully answered data question.
    pub fn note_success(&mut self, question: &str, entity: Option<String>) {
        if entity.is_some() {
            self.last_entity = entity;
        }
        self.last_context = Some(detect_context(question));
        self.last_subject = detect_subject(question);
    }
}

fn detect_context(question: &str) -> ContextKind {
    let q = question.to_lowercase();
    if q.contains("downtime") {
        ContextKind::Downtime
    } else if q.contains("cycle time") || q.contains("cycletime") {
        ContextKind::CycleTime
    } else if q.contains("production") || q.contains("count") {
        ContextKind::Production
    } else {
        ContextKind::General
    }
}

fn detect_subject(question: &str) -> Option<String> {
    let q = question.to_lowercase();
    for subject in ["downtime", "cycle time", "cycletime", "production"] {
        if q.contains(subject) {
            return Some(subject.to_string());
        }
    }
    None
}

fn replace_case_insensitive(haystack: &str, needle: &str, replacement: &str) -> String {
    let lower = haystack.to_lowercase();
    // Byte offsets into the lowered copy must line up with the original.
    if lower.len() != haystack.len() {
        return haystack.to_string();
    }
    let needle_lower = needle.to_lowercase();
    let mut out = String::with_capacity(haystack.len());
    let mut cursor = 0;

    while let Some(found) = lower[cursor..].find(&needle_lower) {
        let start = cursor + found;
        out.push_str(&haystack[cursor..start]);
        out.push_str(replacement);
        cursor = start + needle.len();
    }
    out.push_str(&haystack[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_follow_up_references() {
        let mut session = SessionContext::default();
        session.note_success(
            "highest downtime for galvatron trx?",
            Some("GalvatronTrx".to_string()),
        );

        let resolved = session.resolve_references("what is the cycle time for the Same Machine?");
        assert_eq!(resolved, "what is the cycle time for the GalvatronTrx?");
    }

    #[test]
    fn passes_through_without_recorded_entity() {
        let session = SessionContext::default();
        let resolved = session.resolve_references("cycle time for that machine");
        assert_eq!(resolved, "cycle time for that machine");
    }

    #[test]
    fn tracks_context_kind_and_subject() {
        let mut session = SessionContext::default();
        session.note_success("average downtime for macline", None);
        assert_eq!(session.last_context, Some(ContextKind::Downtime));
        assert_eq!(session.last_subject.as_deref(), Some("downtime"));

        session.note_success("total production count for line 2", None);
        assert_eq!(session.last_context, Some(ContextKind::Production));
    }

    #[test]
    fn keeps_previous_entity_when_new_answer_has_none() {
        let mut session = SessionContext::default();
        session.note_success("downtime for galvatron", Some("GalvatronTrx".to_string()));
        session.note_success("average downtime overall", None);
        assert_eq!(session.last_entity.as_deref(), Some("GalvatronTrx"));
    }
}

//! Plan Generator
//!
//! Asks the model for the top (table, column) pairs likely to answer a data
//! question. The returned order is the model's own confidence ranking and is
//! trusted as-is downstream. Unparsable output fails the whole request; there
//! is no fallback plan.

use crate::error::{AnalystError, Result};
use crate::llm::{strip_markdown_fences, LanguageModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    table: Option<String>,
    column: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateList {
    candidates: Vec<RawCandidate>,
}

pub struct PlanGenerator {
    max_candidates: usize,
    /// Cap on vocabulary tokens included in the prompt.
    max_vocabulary_tokens: usize,
}

impl Default for PlanGenerator {
    fn default() -> Self {
        Self {
            max_candidates: 3,
            max_vocabulary_tokens: 1000,
        }
    }
}

impl PlanGenerator {
    pub fn build_prompt(
        &self,
        question: &str,
        schema: &str,
        history: &str,
        vocabulary_tokens: &[&str],
    ) -> String {
        let keywords: Vec<&str> = vocabulary_tokens
            .iter()
            .take(self.max_vocabulary_tokens)
            .copied()
            .collect();

        format!(
            r#"You are an expert data analyst. Analyze the user's question and find the best way to answer it.

DATABASE SCHEMA:
{schema}

CONVERSATION HISTORY:
{history}

KNOWN MACHINE KEYWORDS:
{keywords}

User Question: "{question}"

Identify the TOP {top} most likely (table, column) pairs that could answer this question.
The "column" should be the primary metric (e.g., CYCLE_TIME, TOTAL_PRODUCTION_COUNT).
Return ONLY a valid JSON object with key "candidates" containing a list of objects with "table" and "column" keys."#,
            schema = schema,
            history = history,
            keywords = keywords.join(", "),
            question = question,
            top = self.max_candidates,
        )
    }

    /// Propose up to `max_candidates` ranked candidates for the question.
    pub async fn propose(
        &self,
        model: &dyn LanguageModel,
        question: &str,
        schema: &str,
        history: &str,
        vocabulary_tokens: &[&str],
    ) -> Result<Vec<Candidate>> {
        let prompt = self.build_prompt(question, schema, history, vocabulary_tokens);
        let response = model.complete(&prompt).await?;
        let cleaned = strip_markdown_fences(&response);

        let parsed: CandidateList = serde_json::from_str(&cleaned)
            .map_err(|e| AnalystError::Planning(format!("Unparsable candidate list: {}", e)))?;

        let candidates: Vec<Candidate> = parsed
            .candidates
            .into_iter()
            .filter_map(|raw| match (raw.table, raw.column) {
                (Some(table), Some(column)) if !table.is_empty() && !column.is_empty() => {
                    Some(Candidate { table, column })
                }
                _ => {
                    debug!("discarding malformed candidate");
                    None
                }
            })
            .take(self.max_candidates)
            .collect();

        if candidates.is_empty() {
            return Err(AnalystError::Planning(
                "Model proposed no usable candidates".to_string(),
            ));
        }

        info!(count = candidates.len(), "planned candidate paths");
        Ok(candidates)
    }
}

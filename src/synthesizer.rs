//! Query Synthesizer
//!
//! Turns one planned candidate into a concrete SQL string. Pure text
//! generation: the prompt pins the target table and column, states the
//! normalization rules, and shows worked examples. Output is untrusted until
//! the safety gate approves it.

use crate::error::Result;
use crate::llm::{strip_markdown_fences, LanguageModel};
use crate::planner::Candidate;
use tracing::debug;

const FEW_SHOT_EXAMPLES: &str = r#"### EXAMPLES ###

-- Question: which machine has the highest downtime for macline-2 for yesterday?
SELECT MACHINE_NAME, MAX(CAST(COALESCE(NULLIF(ROBOT_DOWNTIME, ''), '0') AS REAL)) AS max_downtime
FROM hourly_machine_status
WHERE (UPPER(MACHINE_NAME) LIKE '%MAC%' AND UPPER(MACHINE_NAME) LIKE '%LINE%' AND UPPER(MACHINE_NAME) LIKE '%2%')
  AND DATE(CREATED_DATE) = DATE('now', '-1 day')
GROUP BY MACHINE_NAME
ORDER BY max_downtime DESC
LIMIT 1;

-- Question: average cycle time for mac line 2 dual robot for may 2025
SELECT AVG(CAST(COALESCE(NULLIF(CYCLE_TIME, ''), '0') AS REAL)) AS avg_cycle_time
FROM live_machine_metrics
WHERE (UPPER(MACHINE_NAME) LIKE '%MAC%' AND UPPER(MACHINE_NAME) LIKE '%LINE%' AND UPPER(MACHINE_NAME) LIKE '%DUAL%')
  AND DATE(CREATED_DATE) >= '2025-05-01'
  AND DATE(CREATED_DATE) < '2025-06-01';
"#;

#[derive(Default)]
pub struct QuerySynthesizer;

impl QuerySynthesizer {
    pub fn build_prompt(
        &self,
        question: &str,
        candidate: &Candidate,
        schema: &str,
        known_entities: &[String],
    ) -> String {
        let entity_hint = if known_entities.is_empty() {
            String::new()
        } else {
            format!(
                "\nKNOWN ENTITY NAMES MENTIONED IN THE QUESTION:\n{}\n",
                known_entities.join(", ")
            )
        };

        format!(
            r#"Write a flawless SQL query to answer the user's question.
MUST use table: {table}
MUST use column: {column}

RULES:
1. AGGREGATION:
   - Use SUM/AVG/COUNT/MAX/MIN for "total"/"average"/"count"/"highest"/"lowest"
   - For "what is [metric]" on live tables: ORDER BY CREATED_DATE DESC LIMIT 1
2. FILTERING:
   - Split machine keywords: "galvatron trx bullet" becomes
     UPPER(MACHINE_NAME) LIKE '%GALVATRON%' AND UPPER(MACHINE_NAME) LIKE '%TRX%' AND UPPER(MACHINE_NAME) LIKE '%BULLET%'
   - Machine groups: (UPPER(MACHINE_NAME) LIKE '%MACLINE 1%' OR MACHINE_GROUP = 'MACLINE-1')
3. NULL HANDLING:
   - Wrap metrics: CAST(COALESCE(NULLIF({column}, ''), '0') AS REAL)

SCHEMA:
{schema}
{entity_hint}
{examples}

User Question: "{question}"

Return ONLY the SQL query."#,
            table = candidate.table,
            column = candidate.column,
            schema = schema,
            entity_hint = entity_hint,
            examples = FEW_SHOT_EXAMPLES,
            question = question,
        )
    }

    /// Generate one query string for the candidate. No execution happens here.
    pub async fn synthesize(
        &self,
        model: &dyn LanguageModel,
        question: &str,
        candidate: &Candidate,
        schema: &str,
        known_entities: &[String],
    ) -> Result<String> {
        let prompt = self.build_prompt(question, candidate, schema, known_entities);
        let response = model.complete(&prompt).await?;
        let sql = strip_markdown_fences(&response)
            .trim_end_matches(';')
            .trim()
            .to_string();
        debug!(table = %candidate.table, column = %candidate.column, sql = %sql, "synthesized query");
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;

    struct FixedModel(String);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn candidate() -> Candidate {
        Candidate {
            table: "live_machine_metrics".to_string(),
            column: "CYCLE_TIME".to_string(),
        }
    }

    #[tokio::test]
    async fn strips_fences_and_trailing_semicolon() {
        let model = FixedModel("```sql\nSELECT 1;\n```".to_string());
        let synthesizer = QuerySynthesizer;
        let sql = synthesizer
            .synthesize(&model, "q", &candidate(), "schema", &[])
            .await
            .unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn prompt_pins_target_and_rules() {
        let synthesizer = QuerySynthesizer;
        let prompt = synthesizer.build_prompt(
            "average cycle time for galvatron",
            &candidate(),
            "CREATE TABLE live_machine_metrics (...)",
            &["GalvatronTrx".to_string()],
        );
        assert!(prompt.contains("MUST use table: live_machine_metrics"));
        assert!(prompt.contains("MUST use column: CYCLE_TIME"));
        assert!(prompt.contains("COALESCE(NULLIF(CYCLE_TIME, ''), '0')"));
        assert!(prompt.contains("GalvatronTrx"));
        assert!(prompt.contains("### EXAMPLES ###"));
    }
}

//! Safety Gate
//!
//! The one auditable function standing between generated SQL and the backend.
//! A raw substring scan over the case-normalized statement: any occurrence of a
//! mutating or schema-altering keyword rejects the query, even inside comments
//! or string literals. Over-blocking is the accepted tradeoff; no query that
//! reaches an executor may mutate state.

use crate::error::{AnalystError, Result};
use tracing::warn;

const DISALLOWED_KEYWORDS: &[&str] = &[
    "DELETE", "DROP", "UPDATE", "INSERT", "TRUNCATE", "ALTER", "EXEC", "GRANT",
];

pub fn review(sql: &str) -> Result<()> {
    let sql_upper = sql.to_uppercase();
    for keyword in DISALLOWED_KEYWORDS {
        if sql_upper.contains(keyword) {
            warn!(keyword, "blocked query containing restricted keyword");
            return Err(AnalystError::Safety(format!(
                "Query contains restricted keyword: {}",
                keyword
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYWORDS: &[&str] = &[
        "DELETE", "DROP", "UPDATE", "INSERT", "TRUNCATE", "ALTER", "EXEC", "GRANT",
    ];

    #[test]
    fn rejects_every_keyword_uppercase() {
        for kw in KEYWORDS {
            let sql = format!("{} TABLE machines", kw);
            assert!(review(&sql).is_err(), "should reject: {}", sql);
        }
    }

    #[test]
    fn rejects_every_keyword_lowercase_and_mixed() {
        for kw in KEYWORDS {
            let lower = format!("{} something", kw.to_lowercase());
            assert!(review(&lower).is_err(), "should reject: {}", lower);

            let mixed: String = kw
                .chars()
                .enumerate()
                .map(|(i, c)| {
                    if i % 2 == 0 {
                        c.to_ascii_lowercase()
                    } else {
                        c
                    }
                })
                .collect();
            let sql = format!("{} something", mixed);
            assert!(review(&sql).is_err(), "should reject: {}", sql);
        }
    }

    #[test]
    fn rejects_keywords_hidden_in_comments() {
        assert!(review("SELECT 1 -- then DROP TABLE machines").is_err());
        assert!(review("SELECT 1 /* delete everything */").is_err());
    }

    #[test]
    fn rejects_keywords_inside_string_literals() {
        // Conservative by design: even a harmless mention is blocked.
        assert!(review("SELECT 'please do not drop this'").is_err());
    }

    #[test]
    fn rejects_keywords_embedded_in_identifiers() {
        // Over-blocking tradeoff: a column literally named update_count.
        assert!(review("SELECT update_count FROM stats").is_err());
    }

    #[test]
    fn accepts_plain_read_queries() {
        assert!(review("SELECT MACHINE_NAME, CYCLE_TIME FROM live_machine_metrics").is_ok());
        assert!(review(
            "SELECT AVG(CAST(COALESCE(NULLIF(ROBOT_DOWNTIME, ''), '0') AS REAL)) FROM hourly_machine_status"
        )
        .is_ok());
        assert!(review("select count(*) from production_summary group by MACHINE_GROUP").is_ok());
    }

    #[test]
    fn accepts_words_that_merely_resemble_keywords() {
        // "EXECUTION" contains "EXEC" and is rejected; "dropping" contains
        // "DROP" and is rejected. Words with no keyword substring pass.
        assert!(review("SELECT produced, granted_at FROM runs").is_err()); // GRANT inside granted_at
        assert!(review("SELECT produced FROM runs").is_ok());
    }
}

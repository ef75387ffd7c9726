//! Factory Analyst engine
//!
//! The service object owning the model handle, execution backend, discovered
//! schema, vocabulary index, and per-session state. `ask` is the single entry
//! point; every internal failure is converted into the next candidate attempt
//! or a terminal user-facing message, never an escaping error.

use crate::backend::{DatasetBackend, QueryBackend, QueryResult};
use crate::charts::{build_chart, AggregateFn, ChartRenderer, ChartRequest};
use crate::error::{AnalystError, Result};
use crate::formatter;
use crate::formatter::ResultShape;
use crate::intent::{self, Intent};
use crate::llm::LanguageModel;
use crate::memory::ConversationMemory;
use crate::planner::{Candidate, PlanGenerator};
use crate::safety;
use crate::session::SessionContext;
use crate::synthesizer::QuerySynthesizer;
use crate::vocabulary::{self, EntityVocabulary};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const PLAN_FAILURE_MESSAGE: &str =
    "My apologies, I was unable to form an initial plan. Please rephrase your question.";
pub const NO_ANSWER_MESSAGE: &str = "I couldn't find a definitive answer in the database. \
Please try rephrasing your question or check if the data exists.";
pub const NOT_READY_MESSAGE: &str =
    "The assistant is not ready to answer questions yet. Please try again shortly.";
pub const EMPTY_QUESTION_MESSAGE: &str = "Please enter a question.";
pub const CHAT_FAILURE_MESSAGE: &str =
    "I'm having trouble responding right now. Please try again.";

/// Turns of recent history included in conversational prompts.
const CHAT_HISTORY_WINDOW: usize = 5;
/// Turns of recent history included in planning prompts.
const PLAN_HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResult {
    pub text: String,
    pub chart: Option<String>,
}

impl AnswerResult {
    fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chart: None,
        }
    }
}

/// Readiness probe: callers should not dispatch questions before `Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Initializing,
    Ready,
    Error(String),
}

struct ChartSupport {
    backend: Arc<DatasetBackend>,
    renderer: Box<dyn ChartRenderer>,
}

pub struct FactoryAnalyst {
    model: Arc<dyn LanguageModel>,
    backend: Arc<dyn QueryBackend>,
    schema: String,
    vocabulary: EntityVocabulary,
    memory: ConversationMemory,
    session: SessionContext,
    planner: PlanGenerator,
    synthesizer: QuerySynthesizer,
    status: EngineStatus,
    charts: Option<ChartSupport>,
}

impl FactoryAnalyst {
    /// Construct the engine: validates the backend by discovering its schema
    /// and learns the entity vocabulary. A failed schema discovery leaves the
    /// engine erroring via `status()` instead of crashing the host; a failed
    /// vocabulary scan degrades to an empty index.
    pub fn new(model: Arc<dyn LanguageModel>, backend: Arc<dyn QueryBackend>) -> Self {
        let (schema, vocabulary, status) = match backend.describe_schema() {
            Ok(schema) => {
                info!("discovered schema");
                let vocabulary = EntityVocabulary::learn(backend.as_ref());
                (schema, vocabulary, EngineStatus::Ready)
            }
            Err(e) => {
                warn!(error = %e, "backend unavailable at startup");
                (
                    String::new(),
                    EntityVocabulary::default(),
                    EngineStatus::Error(e.to_string()),
                )
            }
        };

        Self {
            model,
            backend,
            schema,
            vocabulary,
            memory: ConversationMemory::default(),
            session: SessionContext::default(),
            planner: PlanGenerator::default(),
            synthesizer: QuerySynthesizer,
            status,
            charts: None,
        }
    }

    /// Attach the aggregation/chart path. Only meaningful when a dataset
    /// backend is available; questions with a chart cue then also produce an
    /// artifact reference.
    pub fn with_charts(
        mut self,
        backend: Arc<DatasetBackend>,
        renderer: Box<dyn ChartRenderer>,
    ) -> Self {
        self.charts = Some(ChartSupport { backend, renderer });
        self
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Answer one question. Safe to call repeatedly on the same session; the
    /// caller serializes concurrent questions.
    pub async fn ask(&mut self, question: &str) -> AnswerResult {
        let question = question.trim();
        if question.is_empty() {
            return AnswerResult::text_only(EMPTY_QUESTION_MESSAGE);
        }

        if let EngineStatus::Error(detail) = &self.status {
            warn!(detail = %detail, "refusing question while backend is unavailable");
            return AnswerResult::text_only(NOT_READY_MESSAGE);
        }

        let query_id = Uuid::new_v4();
        info!(query_id = %query_id, question, "processing question");

        match intent::classify(question) {
            Intent::Conversational => self.answer_conversational(question).await,
            Intent::DataSeeking => self.answer_data(query_id, question).await,
        }
    }

    async fn answer_conversational(&mut self, question: &str) -> AnswerResult {
        debug!("routing to general conversation");
        let history = self.memory.render_window(CHAT_HISTORY_WINDOW);
        let prompt = format!(
            r#"You are Factory Analyst, a helpful and friendly AI assistant for the factory floor.

CONVERSATION HISTORY:
{history}

USER'S CURRENT MESSAGE:
{question}

Respond naturally and conversationally. Be helpful, professional, and friendly.
If asked what you can do, mention you can help with factory data queries, machine information, production metrics, downtime analysis, and more."#,
        );

        let answer = match self.model.complete(&prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "conversational model call failed");
                CHAT_FAILURE_MESSAGE.to_string()
            }
        };

        self.memory.record_user(question);
        self.memory.record_assistant(&answer, None);
        AnswerResult::text_only(answer)
    }

    async fn answer_data(&mut self, query_id: Uuid, question: &str) -> AnswerResult {
        let resolved = self.session.resolve_references(question);
        if resolved != question {
            debug!(resolved = %resolved, "rewrote follow-up references");
        }

        let history = self.memory.render_window(PLAN_HISTORY_WINDOW);
        let tokens = self.vocabulary.known_tokens();
        let candidates = match self
            .planner
            .propose(
                self.model.as_ref(),
                &resolved,
                &self.schema,
                &history,
                &tokens,
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(query_id = %query_id, error = %e, "planning failed");
                return AnswerResult::text_only(PLAN_FAILURE_MESSAGE);
            }
        };

        let known_entities = self.vocabulary.entities_mentioned(&resolved);

        for (rank, candidate) in candidates.iter().enumerate() {
            info!(
                query_id = %query_id,
                attempt = rank + 1,
                total = candidates.len(),
                table = %candidate.table,
                column = %candidate.column,
                "attempting candidate"
            );

            let sql = match self
                .synthesizer
                .synthesize(
                    self.model.as_ref(),
                    &resolved,
                    candidate,
                    &self.schema,
                    &known_entities,
                )
                .await
            {
                Ok(sql) => sql,
                Err(e) => {
                    warn!(query_id = %query_id, error = %e, "synthesis failed, moving on");
                    continue;
                }
            };

            if let Err(e) = safety::review(&sql) {
                warn!(query_id = %query_id, sql = %sql, error = %e, "candidate rejected by safety gate");
                continue;
            }

            let result = match self.backend.execute(&sql) {
                Ok(result) => result,
                Err(AnalystError::Execution(detail)) => {
                    // Raw backend errors stay in the logs, never in answers.
                    warn!(query_id = %query_id, sql = %sql, detail = %detail, "candidate failed to execute");
                    continue;
                }
                Err(e) => {
                    warn!(query_id = %query_id, sql = %sql, error = %e, "candidate failed to execute");
                    continue;
                }
            };

            if result.is_empty() {
                debug!(query_id = %query_id, sql = %sql, "candidate returned no rows");
                continue;
            }

            info!(query_id = %query_id, rows = result.rows.len(), "candidate succeeded");
            let text = formatter::render(&resolved, &result);
            let chart = self.maybe_chart(&resolved, candidate);

            self.memory.record_user(question);
            self.memory.record_assistant(&text, Some(sql));
            self.session.note_success(&resolved, entity_of(&result));

            return AnswerResult { text, chart };
        }

        info!(query_id = %query_id, "all candidates exhausted");
        AnswerResult::text_only(NO_ANSWER_MESSAGE)
    }

    /// Run an explicit aggregation/chart request, bypassing planning. Returns
    /// `None` when the grouping/filter matches zero rows.
    pub fn chart(&self, request: &ChartRequest) -> Result<Option<String>> {
        let support = self.charts.as_ref().ok_or_else(|| {
            AnalystError::Chart("no dataset backend attached for charts".to_string())
        })?;
        build_chart(&support.backend, support.renderer.as_ref(), request)
    }

    fn maybe_chart(&self, question: &str, candidate: &Candidate) -> Option<String> {
        let support = self.charts.as_ref()?;
        if !has_chart_cue(question) {
            return None;
        }

        let group_by = support
            .backend
            .identity_columns()
            .ok()?
            .into_iter()
            .find(|(table, _)| table == &candidate.table)
            .map(|(_, column)| column)?;

        let filter_tokens: Vec<String> = vocabulary::tokenize(question)
            .into_iter()
            .filter(|token| self.vocabulary.lookup(token).is_some())
            .collect();

        let request = ChartRequest {
            table: candidate.table.clone(),
            metric: candidate.column.clone(),
            group_by,
            agg: AggregateFn::from_cues(question).unwrap_or(AggregateFn::Sum),
            filter_tokens,
        };

        match build_chart(&support.backend, support.renderer.as_ref(), &request) {
            Ok(reference) => reference,
            Err(e) => {
                warn!(error = %e, "chart generation failed");
                None
            }
        }
    }
}

fn entity_of(result: &QueryResult) -> Option<String> {
    match formatter::classify_shape(result) {
        Some(ResultShape::EntityMetricPair { entity, .. }) => Some(entity),
        _ => None,
    }
}

fn has_chart_cue(question: &str) -> bool {
    question
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| matches!(word, "chart" | "graph" | "plot"))
}

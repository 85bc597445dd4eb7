//! Bounded multi-round loop between the model and the retrieval tools.
//! The round counter is part of the loop structure, so the configured
//! bound holds by construction rather than by convention.

use crate::embeddings::Embedder;
use crate::llm::{ChatEvent, ChatModel, ChatRequest, ModelTurn, ToolOutput};
use crate::models::SourceAttribution;
use crate::session::SessionTracker;
use crate::store::DualIndex;
use crate::tools::{tool_definitions, ToolOrchestrator};
use crate::traits::{CatalogIndex, ContentIndex};
use crate::QueryError;
use std::sync::Arc;

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 2;

const SYSTEM_PROMPT: &str = "\
You are an assistant for questions about course materials, with two tools: \
`search_course_content` for questions about specific course content, and \
`get_course_outline` for questions about course structure or lesson lists.

Tool usage:
- At most two sequential tool rounds per query; you may call several tools in one round.
- Answer general-knowledge questions directly, without tools.
- If a tool yields no results, say so plainly.

Responses must be brief and direct, with no meta-commentary about tools or \
search results. For outline questions include the course title, course link, \
and every lesson number and title.";

#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub answer: String,
    pub sources: Vec<SourceAttribution>,
}

/// Drives one query through INIT, alternating model and tool rounds, to a
/// final answer with source attributions.
pub struct QueryCoordinator<C, T, E, M>
where
    C: CatalogIndex,
    T: ContentIndex,
    E: Embedder,
    M: ChatModel,
{
    index: Arc<DualIndex<C, T, E>>,
    model: M,
    sessions: SessionTracker,
    max_tool_rounds: usize,
}

impl<C, T, E, M> QueryCoordinator<C, T, E, M>
where
    C: CatalogIndex + Send + Sync,
    T: ContentIndex + Send + Sync,
    E: Embedder + Send + Sync,
    M: ChatModel + Send + Sync,
{
    pub fn new(
        index: Arc<DualIndex<C, T, E>>,
        model: M,
        sessions: SessionTracker,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            index,
            model,
            sessions,
            max_tool_rounds,
        }
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Answers one query. Tool access is withheld once `max_tool_rounds`
    /// tool rounds have run, which forces the model to produce a final
    /// answer on the next invocation.
    pub async fn answer_query(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<QueryOutcome, QueryError> {
        let orchestrator = ToolOrchestrator::new(self.index.clone());
        let definitions = tool_definitions();

        let history = self.sessions.history(session_id).await;
        let system = if history.is_empty() {
            SYSTEM_PROMPT.to_string()
        } else {
            format!("{SYSTEM_PROMPT}\n\nPrevious conversation:\n{history}")
        };

        let mut events = vec![ChatEvent::UserMessage(query.to_string())];
        let mut round = 0;

        let answer = loop {
            let tools = (round < self.max_tool_rounds).then(|| definitions.as_slice());
            let turn = self
                .model
                .complete(ChatRequest {
                    system: &system,
                    events: &events,
                    tools,
                })
                .await?;

            match turn {
                ModelTurn::Answer(text) => break text,
                ModelTurn::ToolCalls(calls) => {
                    if round >= self.max_tool_rounds {
                        return Err(QueryError::Model(
                            "tool call requested after tool access was withdrawn".to_string(),
                        ));
                    }

                    events.push(ChatEvent::AssistantToolCalls(calls.clone()));

                    let mut outputs = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let content = orchestrator.execute(&call.name, &call.arguments).await;
                        outputs.push(ToolOutput {
                            call_id: call.id.clone(),
                            content,
                        });
                    }
                    events.push(ChatEvent::ToolOutputs(outputs));
                    round += 1;
                }
            }
        };

        let sources = orchestrator.drain_sources().await;
        self.sessions.record(session_id, query, &answer).await;

        Ok(QueryOutcome { answer, sources })
    }
}

//! The agent loop.
//!
//! A run sends the identified request to the model, executes the tool calls
//! it asks for, feeds the results back, and stops when the model answers
//! with text. Events go out on an unbounded channel in order; every run ends
//! with exactly one terminal event, whether it succeeded or not.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use photos_blob::BlobClient;
use photos_core::config::AgentConfig;
use photos_core::AgentEvent;
use photos_graph::GraphClient;

use crate::error::{AgentError, Result, GENERIC_FAILURE};
use crate::format::parse_final_answer;
use crate::identity::with_identity;
use crate::model::{Content, GeminiModel, LanguageModel, Part};
use crate::pipeline::SearchPipeline;
use crate::policy::GroupPolicy;
use crate::prompt::system_instruction;
use crate::tools::{RunContext, ToolSet};
use crate::transcript::{TranscriptSession, TranscriptStore};

pub struct AgentRunner {
    model: Arc<dyn LanguageModel>,
    tools: ToolSet,
    system: String,
    max_turns: u32,
    transcripts: Option<TranscriptStore>,
}

impl AgentRunner {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        graph: GraphClient,
        policy: GroupPolicy,
        max_turns: u32,
    ) -> Self {
        let system = system_instruction(graph.graph_name(), &policy);
        let pipeline = SearchPipeline::new(graph.clone(), policy);
        Self {
            model,
            tools: ToolSet::new(graph, pipeline),
            system,
            max_turns: max_turns.max(1),
            transcripts: None,
        }
    }

    /// Gemini-backed runner; transcripts are kept when `transcript_dir` is set.
    pub fn from_config(config: &AgentConfig, graph: GraphClient) -> Result<Self> {
        let model = Arc::new(GeminiModel::new(config)?);
        let runner = Self::new(model, graph, GroupPolicy::from_config(config), config.max_turns);
        match &config.transcript_dir {
            Some(dir) => Ok(runner.with_transcripts(TranscriptStore::new(dir)?)),
            None => Ok(runner),
        }
    }

    /// Storage for the collage tool.
    pub fn with_media(mut self, blob: BlobClient) -> Self {
        self.tools = self.tools.with_blob(blob);
        self
    }

    pub fn with_transcripts(mut self, store: TranscriptStore) -> Self {
        self.transcripts = Some(store);
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Run one request for `user_name`, emitting events on `events`.
    ///
    /// The terminal event carries the answer or the generic failure
    /// message; the detailed error is only logged and returned.
    pub async fn run(
        &self,
        user_name: &str,
        message: &str,
        events: &UnboundedSender<AgentEvent>,
    ) -> Result<Vec<String>> {
        let mut session = TranscriptSession::new(user_name, message, self.model.name());
        let result = self.drive(user_name, message, events, &mut session).await;

        let terminal = match &result {
            Ok(answer) => {
                tracing::info!(user = %user_name, photos = answer.len(), "Agent run completed");
                AgentEvent::FinalResponse(answer.clone())
            }
            Err(e) => {
                tracing::error!(user = %user_name, error = %e, "Agent run failed");
                AgentEvent::Error {
                    message: GENERIC_FAILURE.to_string(),
                }
            }
        };
        emit(events, terminal);

        self.save_transcript(session, &result).await;
        result
    }

    /// Run without observing events.
    pub async fn answer(&self, user_name: &str, message: &str) -> Result<Vec<String>> {
        let (tx, _rx) = mpsc::unbounded_channel();
        self.run(user_name, message, &tx).await
    }

    /// Run in a background task and return its event stream.
    pub fn stream(self: Arc<Self>, user_name: String, message: String) -> UnboundedReceiver<AgentEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            // The outcome already went out as the terminal event.
            let _ = self.run(&user_name, &message, &tx).await;
        });
        rx
    }

    async fn drive(
        &self,
        user_name: &str,
        message: &str,
        events: &UnboundedSender<AgentEvent>,
        session: &mut TranscriptSession,
    ) -> Result<Vec<String>> {
        let prompt = with_identity(user_name, message)?;
        let ctx = RunContext {
            user_name: user_name.trim().to_string(),
            request: message.trim().to_string(),
        };
        let declarations = self.tools.declarations();
        let mut history = vec![Content::user(vec![Part::text(prompt)])];

        for turn in 1..=self.max_turns {
            let reply = self
                .model
                .generate(&self.system, &history, &declarations)
                .await?;
            history.push(reply.to_content());
            tracing::debug!(turn, calls = reply.calls.len(), "Model replied");

            if reply.calls.is_empty() {
                let text = reply.text.unwrap_or_default();
                session.record("model_text", json!(text));
                return parse_final_answer(&text);
            }

            if let Some(text) = &reply.text {
                session.record("model_text", json!(text));
                emit(events, AgentEvent::thought(text.trim()));
            }

            let mut responses = Vec::with_capacity(reply.calls.len());
            for call in &reply.calls {
                emit(
                    events,
                    AgentEvent::ToolCall {
                        name: call.name.clone(),
                        args: call.args.clone(),
                    },
                );
                session.record("tool_call", json!({ "name": call.name, "args": call.args }));

                let output = self.tools.call(&ctx, call).await;
                if let Some(search) = &output.search {
                    for record in &search.stages {
                        emit(events, AgentEvent::thought(format!("{}: {}", record.stage, record.detail)));
                        session.record("stage", json!(record));
                    }
                }
                for warning in &output.warnings {
                    tracing::warn!(tool = %call.name, warning = %warning, "Tool returned partial results");
                }
                session.record(
                    "tool_result",
                    json!({ "name": call.name, "response": output.response }),
                );
                responses.push(Part::response(&call.name, output.response));
            }
            history.push(Content::user(responses));
        }

        Err(AgentError::TurnLimit(self.max_turns))
    }

    async fn save_transcript(&self, session: TranscriptSession, result: &Result<Vec<String>>) {
        let Some(store) = &self.transcripts else {
            return;
        };
        let outcome = match result {
            Ok(answer) => Ok(answer.as_slice()),
            Err(e) => Err(e.to_string()),
        };
        let saved = match session.finalize(outcome) {
            Ok(transcript) => store.persist(transcript).await,
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            tracing::warn!(error = %e, "Failed to save transcript");
        }
    }
}

fn emit(events: &UnboundedSender<AgentEvent>, event: AgentEvent) {
    if events.send(event).is_err() {
        tracing::debug!("Event receiver dropped");
    }
}

/// Receive events up to and including the first terminal one.
pub async fn collect_until_terminal(mut events: UnboundedReceiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut out = Vec::new();
    while let Some(event) = events.recv().await {
        let terminal = event.is_terminal();
        out.push(event);
        if terminal {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FunctionCall, FunctionDeclaration, ModelTurn};
    use async_trait::async_trait;
    use photos_graph::store::ResultSet;
    use photos_graph::testing::ScriptedStore;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays fixed turns and records every history it was sent.
    struct ScriptedModel {
        turns: Mutex<VecDeque<ModelTurn>>,
        seen: Mutex<Vec<Vec<Content>>>,
    }

    impl ScriptedModel {
        fn new(turns: Vec<ModelTurn>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(
            &self,
            _system_instruction: &str,
            history: &[Content],
            _tools: &[FunctionDeclaration],
        ) -> Result<ModelTurn> {
            self.seen.lock().unwrap().push(history.to_vec());
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Model("script exhausted".to_string()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn call_turn(name: &str, args: Value) -> ModelTurn {
        ModelTurn {
            text: None,
            calls: vec![FunctionCall {
                name: name.to_string(),
                args,
            }],
        }
    }

    fn text_turn(text: &str) -> ModelTurn {
        ModelTurn {
            text: Some(text.to_string()),
            calls: Vec::new(),
        }
    }

    fn goa_store() -> Arc<ScriptedStore> {
        Arc::new(ScriptedStore::new().on(
            "MATCH (photo:Photo)",
            ResultSet {
                fields: None,
                rows: vec![vec![
                    json!("ph02"),
                    json!("2025-01-15T19:30:00Z"),
                    json!("Goa, India"),
                    json!("gs://my-photos-bucket/ph02.jpg"),
                ]],
            },
        ))
    }

    fn runner(model: Arc<ScriptedModel>, store: Arc<ScriptedStore>, max_turns: u32) -> AgentRunner {
        let graph = GraphClient::new(store, "PhotosGraph");
        AgentRunner::new(model, graph, GroupPolicy::default(), max_turns)
    }

    fn drain(mut rx: UnboundedReceiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let model = ScriptedModel::new(vec![
            call_turn(
                "search_photos",
                json!({"location": "Goa", "include_self": false}),
            ),
            text_turn("```json\n[\"gs://my-photos-bucket/ph02.jpg\"]\n```"),
        ]);
        let runner = runner(model.clone(), goa_store(), 8);
        let (tx, rx) = mpsc::unbounded_channel();

        let answer = runner.run("Rohan", "Photos from Goa", &tx).await.unwrap();
        assert_eq!(answer, ["gs://my-photos-bucket/ph02.jpg"]);

        let events = drain(rx);
        assert_eq!(events[0].kind(), "tool_call");
        assert!(events[1..events.len() - 1]
            .iter()
            .all(|e| e.kind() == "thought"));
        assert_eq!(
            events.last(),
            Some(&AgentEvent::FinalResponse(answer.clone()))
        );
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        let seen = model.seen.lock().unwrap();
        let first = seen[0][0].parts[0].text.as_deref().unwrap();
        assert_eq!(first, "The logged in user is Rohan. Photos from Goa");
        let response = seen[1][2].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.name, "search_photos");
        assert_eq!(
            response.response,
            json!({"photo_locations": ["gs://my-photos-bucket/ph02.jpg"]})
        );
    }

    #[tokio::test]
    async fn malformed_answer_ends_with_generic_error() {
        let model = ScriptedModel::new(vec![text_turn("Here are your photos!")]);
        let runner = runner(model, goa_store(), 8);
        let (tx, rx) = mpsc::unbounded_channel();

        let err = runner.run("Rohan", "Photos from Goa", &tx).await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedAnswer(_)));
        assert_eq!(
            drain(rx),
            vec![AgentEvent::Error {
                message: GENERIC_FAILURE.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn turn_limit_is_enforced() {
        let model = ScriptedModel::new(vec![
            call_turn("find_relationships_by_type", json!({"relationship_type": "FRIEND"})),
            call_turn("find_relationships_by_type", json!({"relationship_type": "FRIEND"})),
            text_turn("[]"),
        ]);
        let runner = runner(model, Arc::new(ScriptedStore::new()), 2);

        let err = runner.answer("Rohan", "my friends").await.unwrap_err();
        assert!(matches!(err, AgentError::TurnLimit(2)));
    }

    #[tokio::test]
    async fn missing_identity_fails_before_model() {
        let model = ScriptedModel::new(vec![text_turn("[]")]);
        let runner = runner(model.clone(), goa_store(), 8);

        let err = runner.answer("  ", "Photos from Goa").await.unwrap_err();
        assert!(matches!(err, AgentError::MissingIdentity));
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stream_stops_at_terminal_event() {
        let model = ScriptedModel::new(vec![text_turn("[]")]);
        let runner = Arc::new(runner(model, goa_store(), 8));

        let rx = runner.stream("Rohan".to_string(), "Photos from Goa".to_string());
        let events = collect_until_terminal(rx).await;
        assert_eq!(events, vec![AgentEvent::FinalResponse(Vec::new())]);
    }

    #[tokio::test]
    async fn runs_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new(vec![
            call_turn("search_photos", json!({"location": "Goa", "include_self": false})),
            text_turn("[\"gs://my-photos-bucket/ph02.jpg\"]"),
        ]);
        let runner = runner(model, goa_store(), 8)
            .with_transcripts(TranscriptStore::new(dir.path()).unwrap());

        runner.answer("Rohan", "Photos from Goa").await.unwrap();

        let transcripts = TranscriptStore::new(dir.path()).unwrap().list().unwrap();
        assert_eq!(transcripts.len(), 1);
        let transcript = &transcripts[0];
        assert!(transcript.verify_integrity());
        assert_eq!(transcript.model, "scripted");
        assert!(transcript.entries.iter().any(|e| e.kind == "stage"));
        assert_eq!(
            transcript.answer.as_deref(),
            Some(&["gs://my-photos-bucket/ph02.jpg".to_string()][..])
        );
    }

    #[tokio::test]
    async fn memory_is_saved_for_the_identified_user() {
        let store = Arc::new(ScriptedStore::new().on(
            "FROM Person",
            ResultSet {
                fields: None,
                rows: vec![vec![json!("p01"), json!("Rohan"), json!(null)]],
            },
        ));
        let model = ScriptedModel::new(vec![
            call_turn(
                "create_memory",
                json!({
                    "memory_title": "Goa with friends",
                    "memory_description": "Beach day in Goa.",
                    "memory_media": ["gs://my-photos-bucket/ph01.jpg"]
                }),
            ),
            text_turn("[\"gs://my-photos-bucket/ph01.jpg\"]"),
        ]);
        let runner = runner(model.clone(), store.clone(), 8);

        let answer = runner
            .answer("Rohan", "Save my Goa photo as a memory")
            .await
            .unwrap();

        assert_eq!(answer, ["gs://my-photos-bucket/ph01.jpg"]);
        let inserts = store.inserts();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].rows[0][1], json!("p01"));

        let seen = model.seen.lock().unwrap();
        let last = serde_json::to_string(seen.last().unwrap()).unwrap();
        assert!(last.contains("memory_id"));
    }
}

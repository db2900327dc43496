//! Agentic loop — the conversational control flow.
//!
//! Drives repeated model calls, executes requested tools, folds results back
//! into the conversation, and stops on either the provider's end-of-turn
//! signal or the session token budget. Modeled as a small explicit state
//! machine: awaiting the model, executing tools, and two terminal outcomes.

use tracing::{debug, info};

use crate::tools::ToolRegistry;
use crate::ui;
use crate::Result;

use super::llm::{ChatClient, ChatResult, StopReason};
use super::message::{ContentBlock, Message};
use super::usage::UsageTracker;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model finished its turn cleanly.
    Done,
    /// The token budget was exhausted; no further model call was issued.
    /// The model is never told it was cut off.
    Halted,
}

enum State {
    AwaitingModel,
    ExecutingTools(ChatResult),
}

/// The agent loop processes one conversation through model and tool turns.
pub struct AgentLoop<C: ChatClient> {
    client: C,
    registry: ToolRegistry,
    system: String,
}

impl<C: ChatClient> AgentLoop<C> {
    /// Create a new agent loop.
    pub fn new(client: C, registry: ToolRegistry, system: impl Into<String>) -> Self {
        Self {
            client,
            registry,
            system: system.into(),
        }
    }

    /// Model identifier of the underlying client.
    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Run the loop until the model ends its turn or the budget runs out.
    ///
    /// The conversation must already contain the initiating user message.
    /// Every assistant turn that requested tools is appended together with
    /// its tool results, even when the budget halts the session afterwards —
    /// never a `ToolUse` without its answering `ToolResult`.
    pub async fn run(
        &self,
        conversation: &mut Vec<Message>,
        tracker: &mut UsageTracker,
    ) -> Result<LoopOutcome> {
        let mut state = State::AwaitingModel;

        loop {
            state = match state {
                State::AwaitingModel => {
                    let tools = self.registry.declarations();
                    let result = self
                        .client
                        .chat(&self.system, conversation, &tools)
                        .await?;

                    // Usage is recorded before any budget decision is made.
                    tracker.record(&result);

                    // Text is shown before any tool runs, so the user sees
                    // stated intent before side effects happen.
                    for block in &result.content {
                        if let ContentBlock::Text { text } = block {
                            ui::print_agent(text);
                        }
                    }

                    if result.stop_reason == StopReason::EndTurn || !result.has_tool_uses() {
                        info!("Session complete");
                        return Ok(LoopOutcome::Done);
                    }

                    State::ExecutingTools(result)
                }

                State::ExecutingTools(result) => {
                    let mut tool_results = Vec::new();
                    for (id, name, input) in result.tool_uses() {
                        ui::print_tool_call(name, input);
                        let output = self.registry.dispatch(name, input.clone()).await;
                        ui::print_tool_result(&output);
                        debug!(tool = name, chars = output.len(), "Tool finished");
                        tool_results.push(ContentBlock::tool_result(id, output));
                    }

                    conversation.push(Message::assistant_blocks(result.content));
                    conversation.push(Message::tool_results(tool_results));

                    // The finished batch stays appended, but once over budget
                    // no further model call is issued.
                    if tracker.over_budget() {
                        info!("Session halted: token budget exhausted");
                        return Ok(LoopOutcome::Halted);
                    }

                    State::AwaitingModel
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::{FakeChatClient, Usage};
    use crate::agent::message::MessageContent;
    use crate::config::BudgetConfig;
    use crate::tools::{DummyTool, Tool, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    fn tracker(max: u64) -> UsageTracker {
        UsageTracker::new(BudgetConfig {
            max_tokens_per_session: max,
            warn_at_percent: 50.0,
        })
    }

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(DummyTool {
            name: "echo".to_string(),
            result: "echoed".to_string(),
        });
        registry
    }

    fn tool_turn(calls: &[(&str, &str)], usage: Usage) -> ChatResult {
        ChatResult {
            content: calls
                .iter()
                .map(|(id, name)| ContentBlock::tool_use(*id, *name, json!({})))
                .collect(),
            stop_reason: StopReason::ToolUse,
            usage,
        }
    }

    /// Records dispatch order across tool instances.
    struct RecorderTool {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Tool for RecorderTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "Records that it ran"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _input: Value) -> Result<String> {
            self.log.lock().unwrap().push(self.name.clone());
            Ok(format!("{} ran", self.name))
        }
    }

    #[tokio::test]
    async fn test_text_only_turn_terminates_without_dispatch() {
        // Scenario D: text + end_turn, no tools touched.
        let client = FakeChatClient::new(vec!["Hello, human!"]);
        let agent = AgentLoop::new(client, echo_registry(), "system");

        let mut conversation = vec![Message::user("Hi there")];
        let mut tracker = tracker(1000);
        let outcome = agent.run(&mut conversation, &mut tracker).await.unwrap();

        assert_eq!(outcome, LoopOutcome::Done);
        // No tool turn was appended.
        assert_eq!(conversation.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_then_final_answer() {
        let client = FakeChatClient::with_tool_use("echo", json!({"text": "hi"}), "All done.");
        let agent = AgentLoop::new(client, echo_registry(), "system");

        let mut conversation = vec![Message::user("Echo please")];
        let mut tracker = tracker(1000);
        let outcome = agent.run(&mut conversation, &mut tracker).await.unwrap();

        assert_eq!(outcome, LoopOutcome::Done);
        assert_eq!(conversation.len(), 3);

        // Assistant turn keeps its original content.
        assert!(matches!(
            conversation[1].content,
            MessageContent::Blocks(ref blocks)
                if matches!(blocks[0], ContentBlock::ToolUse { ref id, .. } if id == "tu_1")
        ));

        // Result correlates with the tool_use id.
        let MessageContent::Blocks(results) = &conversation[2].content else {
            panic!("expected blocks");
        };
        assert_eq!(results[0], ContentBlock::tool_result("tu_1", "echoed"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_result_and_loop_continues() {
        // Scenario A: unregistered name yields a literal unknown-tool result.
        let client = FakeChatClient::with_tool_use("missing_tool", json!({}), "Recovered.");
        let agent = AgentLoop::new(client, echo_registry(), "system");

        let mut conversation = vec![Message::user("Try the missing tool")];
        let mut tracker = tracker(1000);
        let outcome = agent.run(&mut conversation, &mut tracker).await.unwrap();

        assert_eq!(outcome, LoopOutcome::Done);
        let MessageContent::Blocks(results) = &conversation[2].content else {
            panic!("expected blocks");
        };
        assert_eq!(
            results[0],
            ContentBlock::tool_result("tu_1", "Unknown tool: missing_tool")
        );
    }

    #[tokio::test]
    async fn test_budget_halts_after_inflight_batch() {
        // Scenario B: second record crosses the budget; the finished batch is
        // appended but no third model call happens (the script only has two
        // results, so another call would error).
        let client = FakeChatClient::scripted(vec![
            tool_turn(
                &[("tu_1", "echo")],
                Usage {
                    input_tokens: 40,
                    output_tokens: 20,
                },
            ),
            tool_turn(
                &[("tu_2", "echo")],
                Usage {
                    input_tokens: 30,
                    output_tokens: 20,
                },
            ),
        ]);
        let agent = AgentLoop::new(client, echo_registry(), "system");

        let mut conversation = vec![Message::user("Keep working")];
        let mut tracker = tracker(100);
        let outcome = agent.run(&mut conversation, &mut tracker).await.unwrap();

        assert_eq!(outcome, LoopOutcome::Halted);
        assert!(tracker.over_budget());

        // Both completed turns are present: user + 2 * (assistant, results).
        assert_eq!(conversation.len(), 5);
        let MessageContent::Blocks(last) = &conversation[4].content else {
            panic!("expected blocks");
        };
        assert_eq!(last[0], ContentBlock::tool_result("tu_2", "echoed"));
    }

    #[tokio::test]
    async fn test_multiple_tool_uses_run_in_emission_order() {
        // Scenario C: both tools execute, order preserved, no short-circuit.
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        registry.register(RecorderTool {
            name: "alpha".to_string(),
            log: log.clone(),
        });
        registry.register(RecorderTool {
            name: "beta".to_string(),
            log: log.clone(),
        });

        let client = FakeChatClient::scripted(vec![
            tool_turn(&[("tu_a", "alpha"), ("tu_b", "beta")], Usage::default()),
            ChatResult::text("Both done."),
        ]);
        let agent = AgentLoop::new(client, registry, "system");

        let mut conversation = vec![Message::user("Run both")];
        let mut tracker = tracker(1000);
        agent.run(&mut conversation, &mut tracker).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["alpha", "beta"]);

        // Results carry a 1:1 id correlation in dispatch order.
        let MessageContent::Blocks(results) = &conversation[2].content else {
            panic!("expected blocks");
        };
        let ids: Vec<&str> = results
            .iter()
            .map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => tool_use_id.as_str(),
                _ => panic!("unexpected block"),
            })
            .collect();
        assert_eq!(ids, vec!["tu_a", "tu_b"]);
    }

    #[tokio::test]
    async fn test_unrecognized_stop_without_tools_ends_turn() {
        // Safe default: Other stop reason with no tool calls stops the loop.
        let client = FakeChatClient::scripted(vec![ChatResult {
            content: vec![ContentBlock::text("truncated output")],
            stop_reason: StopReason::Other,
            usage: Usage::default(),
        }]);
        let agent = AgentLoop::new(client, echo_registry(), "system");

        let mut conversation = vec![Message::user("hi")];
        let mut tracker = tracker(1000);
        let outcome = agent.run(&mut conversation, &mut tracker).await.unwrap();

        assert_eq!(outcome, LoopOutcome::Done);
    }

    #[tokio::test]
    async fn test_unrecognized_stop_with_tools_keeps_going() {
        let client = FakeChatClient::scripted(vec![
            ChatResult {
                content: vec![ContentBlock::tool_use("tu_1", "echo", json!({}))],
                stop_reason: StopReason::Other,
                usage: Usage::default(),
            },
            ChatResult::text("Finished."),
        ]);
        let agent = AgentLoop::new(client, echo_registry(), "system");

        let mut conversation = vec![Message::user("hi")];
        let mut tracker = tracker(1000);
        let outcome = agent.run(&mut conversation, &mut tracker).await.unwrap();

        assert_eq!(outcome, LoopOutcome::Done);
        assert_eq!(conversation.len(), 3);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        // An exhausted script behaves like a failed API call: the error
        // surfaces to the caller instead of being retried.
        let client = FakeChatClient::scripted(vec![]);
        let agent = AgentLoop::new(client, echo_registry(), "system");

        let mut conversation = vec![Message::user("hi")];
        let mut tracker = tracker(1000);
        assert!(agent.run(&mut conversation, &mut tracker).await.is_err());
    }
}

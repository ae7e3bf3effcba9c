//! Mock implementations for testing
//!
//! These mocks enable integration testing of whole turns without real I/O.

use super::traits::*;
use super::{Agent, AgentOptions};
use crate::checkpoint::MemoryCheckpointStore;
use crate::llm::{LlmError, ModelOutcome, ToolDefinition};
use crate::message::{Message, ToolCall};
use crate::tools::{SuspendSignal, ToolContext, ToolOutcome, ToolOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Model Gateway
// ============================================================================

/// Mock gateway that returns queued outcomes, then an optional repeating one
pub struct MockGateway {
    responses: Mutex<VecDeque<Result<ModelOutcome, LlmError>>>,
    repeat: Mutex<Option<ModelOutcome>>,
    delay: Option<Duration>,
    /// History seen by each call, in call order
    pub histories: Mutex<Vec<Vec<Message>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Mutex::new(None),
            delay: None,
            histories: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a final answer
    pub fn queue_final(&self, text: impl Into<String>) {
        self.queue(Ok(ModelOutcome::Final { text: text.into() }));
    }

    /// Queue a proposal of one or more tool calls
    pub fn queue_tool_calls(&self, calls: Vec<ToolCall>) {
        self.queue(Ok(ModelOutcome::ToolCalls {
            content: String::new(),
            calls,
        }));
    }

    /// Queue an error
    pub fn queue_error(&self, error: LlmError) {
        self.queue(Err(error));
    }

    /// Answer with `outcome` whenever the queue is empty
    pub fn repeat(&self, outcome: ModelOutcome) {
        *self.repeat.lock().unwrap() = Some(outcome);
    }

    fn queue(&self, response: Result<ModelOutcome, LlmError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.histories.lock().unwrap().len()
    }

    pub fn recorded_histories(&self) -> Vec<Vec<Message>> {
        self.histories.lock().unwrap().clone()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn propose(
        &self,
        history: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<ModelOutcome, LlmError> {
        self.histories.lock().unwrap().push(history.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.responses.lock().unwrap().pop_front();
        match queued {
            Some(response) => response,
            None => self
                .repeat
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| LlmError::network("No mock response queued")),
        }
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

/// Behaviour of one mock tool
#[derive(Debug, Clone)]
pub enum MockTool {
    /// Complete immediately with this output
    Output(ToolOutput),
    /// Suspend with the `query` field of the input
    Suspend,
    /// Complete with this output after a delay
    Slow(Duration, ToolOutput),
}

/// Mock tool executor with predefined behaviours
pub struct MockToolExecutor {
    tools: Vec<(String, MockTool)>,
    /// Record of tool executions
    pub executions: Mutex<Vec<(String, Value)>>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Add a tool with a predefined output
    pub fn with_tool(mut self, name: impl Into<String>, output: ToolOutput) -> Self {
        self.tools.push((name.into(), MockTool::Output(output)));
        self
    }

    /// Add a tool that asks for human input
    pub fn with_suspending_tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push((name.into(), MockTool::Suspend));
        self
    }

    /// Add a tool that takes `delay` to finish
    pub fn with_slow_tool(
        mut self,
        name: impl Into<String>,
        delay: Duration,
        output: ToolOutput,
    ) -> Self {
        self.tools.push((name.into(), MockTool::Slow(delay, output)));
        self
    }

    /// Get recorded executions
    pub fn recorded_executions(&self) -> Vec<(String, Value)> {
        self.executions.lock().unwrap().clone()
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(&self, name: &str, input: Value, _ctx: ToolContext) -> Option<ToolOutcome> {
        let behaviour = self
            .tools
            .iter()
            .find(|(tool, _)| tool == name)
            .map(|(_, behaviour)| behaviour.clone())?;
        self.executions
            .lock()
            .unwrap()
            .push((name.to_string(), input.clone()));

        Some(match behaviour {
            MockTool::Output(output) => ToolOutcome::Completed(output),
            MockTool::Suspend => ToolOutcome::Suspend(SuspendSignal {
                query: input["query"].as_str().unwrap_or_default().to_string(),
            }),
            MockTool::Slow(delay, output) => {
                tokio::time::sleep(delay).await;
                ToolOutcome::Completed(output)
            }
        })
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|(name, _)| ToolDefinition {
                name: name.clone(),
                description: format!("Mock {name}"),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            })
            .collect()
    }
}

/// Agent wired to mocks and an in-memory store
pub type TestAgent = Agent<Arc<MockGateway>, Arc<MockToolExecutor>, MemoryCheckpointStore>;

pub fn test_agent(
    gateway: Arc<MockGateway>,
    tools: Arc<MockToolExecutor>,
    max_rounds: u32,
) -> TestAgent {
    Agent::new(
        gateway,
        tools,
        MemoryCheckpointStore::new(),
        AgentOptions {
            max_rounds,
            system_prompt: "You are a test assistant.".to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointError, ConversationId};
    use crate::runtime::{TurnError, TurnOutcome};
    use crate::state_machine::transition::CANCELLED_TOOL_CONTENT;
    use serde_json::json;
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log output in memory
    #[derive(Clone, Default)]
    struct LogBuffer {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.inner.lock().unwrap()).into_owned()
        }
    }

    struct LogBufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBufferWriter;

        fn make_writer(&'a self) -> Self::Writer {
            LogBufferWriter {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl std::io::Write for LogBufferWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.inner.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn standard_tools() -> Arc<MockToolExecutor> {
        Arc::new(
            MockToolExecutor::new()
                .with_tool("search_web", ToolOutput::success("search result for X"))
                .with_suspending_tool("human_assistance"),
        )
    }

    fn tool_messages(history: &[Message]) -> Vec<(String, String, bool)> {
        history
            .iter()
            .filter_map(|m| match m {
                Message::Tool {
                    call_id,
                    content,
                    is_error,
                } => Some((call_id.clone(), content.clone(), *is_error)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_mock_gateway_queue_then_error() {
        let gateway = MockGateway::new();
        gateway.queue_final("Hello");

        let outcome = gateway.propose(&[], &[]).await.unwrap();
        assert_eq!(
            outcome,
            ModelOutcome::Final {
                text: "Hello".to_string()
            }
        );
        assert!(gateway.propose(&[], &[]).await.is_err());
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_tool_executor() {
        let executor = standard_tools();
        let ctx = ToolContext::new(Default::default(), ConversationId::new());

        let result = executor
            .execute("search_web", json!({"query": "X"}), ctx.clone())
            .await;
        assert!(matches!(result, Some(ToolOutcome::Completed(o)) if o.success));

        assert!(executor.execute("unknown", json!({}), ctx).await.is_none());
        assert_eq!(executor.recorded_executions().len(), 1);
    }

    /// Plain question answered directly
    #[tokio::test]
    async fn test_direct_answer() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_final("4");
        let agent = test_agent(gateway.clone(), standard_tools(), 10);
        let id = agent.create_conversation().await.unwrap();

        let outcome = agent.submit(&id, "What is 2+2?").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Final {
                text: "4".to_string()
            }
        );

        let history = agent.history(&id).await.unwrap();
        assert_eq!(
            history,
            vec![
                Message::system("You are a test assistant."),
                Message::user("What is 2+2?"),
                Message::assistant("4"),
            ]
        );
        assert_eq!(gateway.call_count(), 1);
    }

    /// Two proposed calls: only the first runs and the loop continues
    #[tokio::test]
    async fn test_extra_tool_calls_are_discarded() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_tool_calls(vec![
            ToolCall::new("call1", "search_web", json!({"query": "X"})),
            ToolCall::new("call2", "human_assistance", json!({"query": "Y"})),
        ]);
        gateway.queue_final("X is a letter");
        let tools = standard_tools();
        let agent = test_agent(gateway.clone(), tools.clone(), 10);
        let id = agent.create_conversation().await.unwrap();

        let outcome = agent.submit(&id, "Search for X").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Final {
                text: "X is a letter".to_string()
            }
        );

        let executed: Vec<_> = tools
            .recorded_executions()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(executed, vec!["search_web"]);

        let history = agent.history(&id).await.unwrap();
        let proposals: Vec<_> = history
            .iter()
            .filter_map(|m| match m {
                Message::Assistant { tool_calls, .. } if !tool_calls.is_empty() => {
                    Some(tool_calls.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].len(), 1);
        assert_eq!(proposals[0][0].id, "call1");

        let second_call_history = &gateway.recorded_histories()[1];
        assert_eq!(
            second_call_history.last(),
            Some(&Message::tool("call1", "search result for X", false))
        );
    }

    /// Human assistance suspends the turn; resume injects the answer
    #[tokio::test]
    async fn test_suspend_and_resume_round_trip() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_tool_calls(vec![ToolCall::new(
            "callH",
            "human_assistance",
            json!({"query": "Which city?"}),
        )]);
        let agent = test_agent(gateway.clone(), standard_tools(), 10);
        let id = agent.create_conversation().await.unwrap();

        let outcome = agent.submit(&id, "Book me a flight").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Interrupted {
                query_text: "Which city?".to_string()
            }
        );
        let interrupt = agent.pending_interrupt(&id).await.unwrap().unwrap();
        assert_eq!(interrupt.call_id, "callH");
        assert!(tool_messages(&agent.history(&id).await.unwrap()).is_empty());

        gateway.queue_final("Booked a flight to Tokyo");
        let outcome = agent.resume(&id, "Tokyo").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Final {
                text: "Booked a flight to Tokyo".to_string()
            }
        );

        let history = agent.history(&id).await.unwrap();
        assert_eq!(
            tool_messages(&history),
            vec![("callH".to_string(), "Tokyo".to_string(), false)]
        );
        assert!(agent.pending_interrupt(&id).await.unwrap().is_none());
        assert_eq!(
            gateway.recorded_histories()[1].last(),
            Some(&Message::tool("callH", "Tokyo", false))
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_suspend_and_resume_are_logged_with_call_id() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let gateway = Arc::new(MockGateway::new());
        gateway.queue_tool_calls(vec![ToolCall::new(
            "callH",
            "human_assistance",
            json!({"query": "Which city?"}),
        )]);
        let agent = test_agent(gateway.clone(), standard_tools(), 10);
        let id = agent.create_conversation().await.unwrap();

        agent.submit(&id, "Book me a flight").await.unwrap();
        let suspended = logs.contents();
        let line = suspended
            .lines()
            .find(|l| l.contains("Turn suspended for human input"))
            .unwrap();
        assert!(line.contains("call_id=callH"));
        assert!(!suspended.contains("Turn resumed with human input"));

        gateway.queue_final("Booked a flight to Tokyo");
        agent.resume(&id, "Tokyo").await.unwrap();
        let resumed = logs.contents();
        let line = resumed
            .lines()
            .find(|l| l.contains("Turn resumed with human input"))
            .unwrap();
        assert!(line.contains("call_id=callH"));
        assert!(line.contains(&id.to_string()));
    }

    /// A second agent sharing the store can resume the suspended turn
    #[tokio::test]
    async fn test_resume_from_checkpoint_in_new_agent() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_tool_calls(vec![ToolCall::new(
            "callH",
            "human_assistance",
            json!({"query": "Which city?"}),
        )]);
        gateway.queue_final("Tokyo it is");
        let store = MemoryCheckpointStore::new();
        let first = Agent::new(
            gateway.clone(),
            standard_tools(),
            store.clone(),
            AgentOptions::default(),
        );
        let id = first.create_conversation().await.unwrap();
        first.submit(&id, "Book me a flight").await.unwrap();
        drop(first);

        let second = Agent::new(gateway, standard_tools(), store, AgentOptions::default());
        let outcome = second.resume(&id, "Tokyo").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Final {
                text: "Tokyo it is".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_submit_while_suspended_is_rejected() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_tool_calls(vec![ToolCall::new(
            "callH",
            "human_assistance",
            json!({"query": "Which city?"}),
        )]);
        let agent = test_agent(gateway.clone(), standard_tools(), 10);
        let id = agent.create_conversation().await.unwrap();
        agent.submit(&id, "Book me a flight").await.unwrap();
        let before = agent.history(&id).await.unwrap();

        let err = agent.submit(&id, "hello?").await.unwrap_err();
        assert!(matches!(err, TurnError::AwaitingHumanInput));
        assert_eq!(agent.history(&id).await.unwrap(), before);
        assert!(agent.pending_interrupt(&id).await.unwrap().is_some());
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_resume_without_interrupt_is_rejected() {
        let gateway = Arc::new(MockGateway::new());
        let agent = test_agent(gateway.clone(), standard_tools(), 10);
        let id = agent.create_conversation().await.unwrap();
        let before = agent.history(&id).await.unwrap();

        let err = agent.resume(&id, "Tokyo").await.unwrap_err();
        assert!(matches!(err, TurnError::NoPendingInterrupt));
        assert_eq!(agent.history(&id).await.unwrap(), before);
        assert_eq!(gateway.call_count(), 0);
    }

    /// An always-tool-calling model stops after exactly the cap
    #[tokio::test]
    async fn test_recursion_limit() {
        let gateway = Arc::new(MockGateway::new());
        gateway.repeat(ModelOutcome::ToolCalls {
            content: String::new(),
            calls: vec![ToolCall::new("loop", "search_web", json!({"query": "X"}))],
        });
        let agent = test_agent(gateway.clone(), standard_tools(), 3);
        let id = agent.create_conversation().await.unwrap();

        let err = agent.submit(&id, "Search forever").await.unwrap_err();
        assert!(matches!(err, TurnError::RecursionLimit { limit: 3 }));
        assert_eq!(gateway.call_count(), 3);

        // system + user + 3 x (assistant call, tool result)
        let history = agent.history(&id).await.unwrap();
        assert_eq!(history.len(), 8);
        assert!(matches!(history.last(), Some(Message::Tool { .. })));
    }

    #[tokio::test]
    async fn test_gateway_error_aborts_turn() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_error(LlmError::auth("Invalid API key"));
        let agent = test_agent(gateway.clone(), standard_tools(), 10);
        let id = agent.create_conversation().await.unwrap();

        let err = agent.submit(&id, "Hi").await.unwrap_err();
        assert!(matches!(err, TurnError::Gateway(_)));
        let history = agent.history(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(!agent.is_busy(&id));

        // The conversation stays usable
        gateway.queue_final("Hello again");
        let outcome = agent.submit(&id, "Hi").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Final {
                text: "Hello again".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_feeds_error_back_to_model() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_tool_calls(vec![ToolCall::new("call1", "no_such_tool", json!({}))]);
        gateway.queue_final("Sorry, I cannot do that");
        let agent = test_agent(gateway.clone(), standard_tools(), 10);
        let id = agent.create_conversation().await.unwrap();

        let outcome = agent.submit(&id, "Do it").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Final { .. }));

        let tool_msgs = tool_messages(&agent.history(&id).await.unwrap());
        assert_eq!(tool_msgs.len(), 1);
        assert_eq!(tool_msgs[0].0, "call1");
        assert!(tool_msgs[0].1.contains("Unknown tool"));
        assert!(tool_msgs[0].2);
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let agent = test_agent(Arc::new(MockGateway::new()), standard_tools(), 10);
        let err = agent
            .submit(&ConversationId::new(), "Hi")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TurnError::Checkpoint(CheckpointError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_without_turn_is_noop() {
        let agent = test_agent(Arc::new(MockGateway::new()), standard_tools(), 10);
        let id = agent.create_conversation().await.unwrap();
        assert!(!agent.cancel(&id));
    }

    /// Concurrent turns on one conversation conflict; cancel ends the first
    #[tokio::test]
    async fn test_concurrent_submit_conflicts_and_cancel_during_model_turn() {
        let gateway = Arc::new(MockGateway::new().with_delay(Duration::from_secs(5)));
        gateway.queue_final("too late");
        let agent = Arc::new(test_agent(gateway, standard_tools(), 10));
        let id = agent.create_conversation().await.unwrap();

        let running = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.submit(&id, "slow question").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(agent.is_busy(&id));

        let err = agent.submit(&id, "second").await.unwrap_err();
        assert!(matches!(err, TurnError::Conflict(conflict) if conflict == id));

        assert!(agent.cancel(&id));
        let result = running.await.unwrap();
        assert!(matches!(result, Err(TurnError::Cancelled)));
        assert!(!agent.is_busy(&id));

        let history = agent.history(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], Message::user("slow question"));
    }

    /// Cancelling a running tool answers the dangling call
    #[tokio::test]
    async fn test_cancel_during_tool_turn() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_tool_calls(vec![ToolCall::new(
            "call1",
            "search_web",
            json!({"query": "X"}),
        )]);
        let tools = Arc::new(MockToolExecutor::new().with_slow_tool(
            "search_web",
            Duration::from_secs(5),
            ToolOutput::success("discarded"),
        ));
        let agent = Arc::new(test_agent(gateway.clone(), tools, 10));
        let id = agent.create_conversation().await.unwrap();

        let running = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.submit(&id, "Search for X").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(agent.cancel(&id));
        assert!(matches!(running.await.unwrap(), Err(TurnError::Cancelled)));

        let history = agent.history(&id).await.unwrap();
        assert_eq!(
            history.last(),
            Some(&Message::tool("call1", CANCELLED_TOOL_CONTENT, true))
        );

        gateway.queue_final("ok");
        assert!(agent.submit(&id, "never mind").await.is_ok());
    }

    /// Independent conversations run concurrently
    #[tokio::test]
    async fn test_independent_conversations_do_not_conflict() {
        let gateway = Arc::new(MockGateway::new().with_delay(Duration::from_millis(100)));
        gateway.queue_final("one");
        gateway.queue_final("two");
        let agent = Arc::new(test_agent(gateway, standard_tools(), 10));
        let a = agent.create_conversation().await.unwrap();
        let b = agent.create_conversation().await.unwrap();

        let (ra, rb) = tokio::join!(agent.submit(&a, "first"), agent.submit(&b, "second"));
        assert!(ra.is_ok());
        assert!(rb.is_ok());
    }
}

//! Tool-calling loop behaviour with a scripted model.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{DelayedStore, FixtureStore};
use course_rag::{
    AiGenerator, ContentBlock, CourseSearchTool, GenerateRequest, MessageResponse, MockLlmClient,
    RagConfig, Role, SEARCH_TOOL_NAME, StopReason, Tool, ToolManager, ToolOutput,
};
use serde_json::{Value, json};

/// Records every input it is called with.
#[derive(Default)]
struct RecordingTool {
    calls: Mutex<Vec<Value>>,
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        "record"
    }

    fn description(&self) -> &str {
        "Records its input"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }

    async fn execute(&self, input: &Value) -> course_rag::Result<ToolOutput> {
        self.calls.lock().unwrap().push(input.clone());
        Ok(ToolOutput::text(format!("recorded {}", input["query"])))
    }
}

fn search_manager() -> ToolManager {
    let mut manager = ToolManager::new();
    let store = Arc::new(FixtureStore::default());
    manager.register_tool(Arc::new(CourseSearchTool::new(store))).unwrap();
    manager
}

fn generator(mock: &Arc<MockLlmClient>) -> AiGenerator {
    AiGenerator::from_config(mock.clone(), &RagConfig::default())
}

#[tokio::test]
async fn single_tool_round_makes_two_calls_and_echoes_input() {
    let tool = Arc::new(RecordingTool::default());
    let mut manager = ToolManager::new();
    manager.register_tool(tool.clone()).unwrap();
    let tools = manager.tool_definitions();

    let mock = Arc::new(
        MockLlmClient::new(vec![MessageResponse::tool_use(
            "tool_use_123",
            "record",
            json!({"query": "machine learning basics"}),
        )])
        .then(MessageResponse::end_turn("Machine learning lets computers learn from data.")),
    );

    let answer = generator(&mock)
        .generate_response(GenerateRequest::new("What is ML?").with_tools(&tools, &manager))
        .await
        .unwrap();
    assert_eq!(answer, "Machine learning lets computers learn from data.");

    assert_eq!(*tool.calls.lock().unwrap(), vec![json!({"query": "machine learning basics"})]);

    let requests = mock.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "record");
    assert!(requests[0].tool_choice.is_some());

    let followup = &requests[1].messages;
    assert_eq!(followup.len(), 3);
    assert_eq!(followup[1].role, Role::Assistant);
    assert_eq!(followup[2].role, Role::User);
    assert_eq!(
        followup[2].content,
        vec![ContentBlock::ToolResult {
            tool_use_id: "tool_use_123".into(),
            content: "recorded \"machine learning basics\"".into(),
            is_error: false,
        }]
    );
}

#[tokio::test]
async fn parallel_tool_uses_keep_request_order() {
    let manager = search_manager();
    let tools = manager.tool_definitions();

    let mut first = MessageResponse::tool_use("a", SEARCH_TOOL_NAME, json!({"query": "neural"}));
    first.content.push(ContentBlock::ToolUse {
        id: "b".into(),
        name: SEARCH_TOOL_NAME.into(),
        input: json!({"query": "machine learning"}),
    });
    let mock = Arc::new(MockLlmClient::new(vec![first]).then(MessageResponse::end_turn("done")));

    generator(&mock)
        .generate_response(GenerateRequest::new("q").with_tools(&tools, &manager))
        .await
        .unwrap();

    let requests = mock.requests().await;
    let results = &requests[1].messages[2].content;
    let ids: Vec<&str> = results
        .iter()
        .map(|block| match block {
            ContentBlock::ToolResult { tool_use_id, .. } => tool_use_id.as_str(),
            other => panic!("unexpected block {other:?}"),
        })
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn sources_follow_request_order_not_completion_order() {
    let mut manager = ToolManager::new();
    let store = Arc::new(DelayedStore::new(Duration::from_millis(50)));
    manager.register_tool(Arc::new(CourseSearchTool::new(store))).unwrap();
    let tools = manager.tool_definitions();

    // The first search finishes last.
    let mut first = MessageResponse::tool_use("a", SEARCH_TOOL_NAME, json!({"query": "neural"}));
    first.content.push(ContentBlock::ToolUse {
        id: "b".into(),
        name: SEARCH_TOOL_NAME.into(),
        input: json!({"query": "machine learning"}),
    });
    let mock = Arc::new(MockLlmClient::new(vec![first]).then(MessageResponse::end_turn("done")));

    generator(&mock)
        .generate_response(GenerateRequest::new("q").with_tools(&tools, &manager))
        .await
        .unwrap();

    let sources = manager.last_sources().await;
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].lesson_number, Some(1));
}

#[tokio::test]
async fn empty_search_keeps_sources_from_the_previous_round() {
    let manager = search_manager();
    let tools = manager.tool_definitions();

    let mock = Arc::new(
        MockLlmClient::new(vec![
            MessageResponse::tool_use("t1", SEARCH_TOOL_NAME, json!({"query": "machine learning"})),
            MessageResponse::tool_use("t2", SEARCH_TOOL_NAME, json!({"query": "cooking"})),
        ])
        .then(MessageResponse::end_turn("Only the first search helped.")),
    );

    generator(&mock)
        .generate_response(GenerateRequest::new("q").with_tools(&tools, &manager))
        .await
        .unwrap();

    let sources = manager.last_sources().await;
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].lesson_number, Some(1));
}

#[tokio::test]
async fn multi_round_chain_accumulates_history() {
    let manager = search_manager();
    let tools = manager.tool_definitions();

    let mock = Arc::new(
        MockLlmClient::new(vec![
            MessageResponse::tool_use("t1", SEARCH_TOOL_NAME, json!({"query": "machine learning"})),
            MessageResponse::tool_use("t2", SEARCH_TOOL_NAME, json!({"query": "neural networks"})),
        ])
        .then(MessageResponse::end_turn("Both topics are covered.")),
    );

    let answer = generator(&mock)
        .generate_response(GenerateRequest::new("Compare").with_tools(&tools, &manager))
        .await
        .unwrap();
    assert_eq!(answer, "Both topics are covered.");

    let requests = mock.requests().await;
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].messages.len(), 5);
    assert!(!requests[2].tools.is_empty());
    // Sources reflect the latest search.
    assert_eq!(manager.last_sources().await.len(), 2);
}

#[tokio::test]
async fn round_limit_forces_a_final_answer_without_tools() {
    let manager = search_manager();
    let tools = manager.tool_definitions();

    let mock = Arc::new(
        MockLlmClient::new(vec![
            MessageResponse::tool_use("t1", SEARCH_TOOL_NAME, json!({"query": "neural"})),
            MessageResponse::tool_use("t2", SEARCH_TOOL_NAME, json!({"query": "neural"})),
        ])
        .then(MessageResponse::end_turn("final")),
    );

    let answer = AiGenerator::from_config(mock.clone(), &RagConfig::default())
        .with_max_tool_rounds(2)
        .generate_response(GenerateRequest::new("q").with_tools(&tools, &manager))
        .await
        .unwrap();
    assert_eq!(answer, "final");

    let requests = mock.requests().await;
    assert_eq!(requests.len(), 3);
    assert!(!requests[1].tools.is_empty());
    assert!(requests[2].tools.is_empty());
    assert!(requests[2].tool_choice.is_none());
}

#[tokio::test]
async fn tool_failure_is_fed_back_and_loop_finishes() {
    let manager = search_manager();
    let tools = manager.tool_definitions();

    let mock = Arc::new(
        MockLlmClient::new(vec![MessageResponse::tool_use("t1", SEARCH_TOOL_NAME, json!({}))])
            .then(MessageResponse::end_turn("I could not search.")),
    );

    let answer = generator(&mock)
        .generate_response(GenerateRequest::new("q").with_tools(&tools, &manager))
        .await
        .unwrap();
    assert_eq!(answer, "I could not search.");

    match &mock.requests().await[1].messages[2].content[0] {
        ContentBlock::ToolResult { content, is_error, .. } => {
            assert!(*is_error);
            assert!(content.starts_with("Error executing tool 'search_course_content'"));
        }
        other => panic!("unexpected block {other:?}"),
    }
}

#[tokio::test]
async fn max_tokens_stop_still_returns_text() {
    let mut response = MessageResponse::end_turn("partial answer");
    response.stop_reason = Some(StopReason::MaxTokens);
    let mock = Arc::new(MockLlmClient::new(vec![response]));

    let answer = generator(&mock).generate_response(GenerateRequest::new("q")).await.unwrap();
    assert_eq!(answer, "partial answer");
}

//! End-to-end behaviour of the course assistant with a scripted model.

mod common;

use std::sync::Arc;

use common::{COURSE_TITLE, FixtureStore, course_document};
use course_rag::{
    ContentBlock, MessageResponse, MockLlmClient, RagConfig, RagError, RagSystem, SEARCH_TOOL_NAME,
};
use serde_json::json;

fn fixture_system(mock: &Arc<MockLlmClient>) -> RagSystem {
    RagSystem::builder()
        .llm_client(mock.clone())
        .vector_store(Arc::new(FixtureStore::default()))
        .build()
        .unwrap()
}

fn write_courses(dir: &std::path::Path) {
    let retrieval = course_document(
        "Retrieval Basics",
        &[
            (0, "Introduction", "Retrieval finds relevant documents. Embeddings map text to vectors."),
            (1, "Chunking", "Chunking splits long documents. Overlap keeps context between chunks."),
        ],
    );
    let agents = course_document(
        "Building Agents",
        &[(1, "Tools", "Agents call tools to act. A tool has a name and a schema.")],
    );
    std::fs::write(dir.join("retrieval.txt"), retrieval).unwrap();
    std::fs::write(dir.join("agents.md"), &agents).unwrap();
    // Same title under another name: skipped.
    std::fs::write(dir.join("agents_copy.txt"), agents).unwrap();
    // Not a course file.
    std::fs::write(dir.join("notes.pdf"), "binary").unwrap();
}

#[tokio::test]
async fn query_returns_sources_from_the_search() {
    let mock = Arc::new(
        MockLlmClient::new(vec![MessageResponse::tool_use(
            "tool_use_123",
            SEARCH_TOOL_NAME,
            json!({"query": "machine learning"}),
        )])
        .then(MessageResponse::end_turn("Machine learning is a branch of AI.")),
    );
    let rag = fixture_system(&mock);

    let (answer, sources) = rag.query("What is machine learning?", None).await.unwrap();
    assert_eq!(answer, "Machine learning is a branch of AI.");
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].text, COURSE_TITLE);
    assert_eq!(sources[0].lesson_number, Some(1));

    // Sources do not carry over to the next turn.
    assert!(rag.tool_manager().last_sources().await.is_empty());
}

#[tokio::test]
async fn follow_up_search_without_hits_keeps_earlier_sources() {
    let mock = Arc::new(
        MockLlmClient::new(vec![
            MessageResponse::tool_use("t1", SEARCH_TOOL_NAME, json!({"query": "machine learning"})),
            MessageResponse::tool_use("t2", SEARCH_TOOL_NAME, json!({"query": "cooking"})),
        ])
        .then(MessageResponse::end_turn("Machine learning learns from data.")),
    );
    let rag = fixture_system(&mock);

    let (_, sources) = rag.query("What is machine learning?", None).await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].text, COURSE_TITLE);
    assert_eq!(sources[0].lesson_number, Some(1));
}

#[tokio::test]
async fn session_history_reaches_the_second_query() {
    let mock = Arc::new(
        MockLlmClient::new(vec![MessageResponse::end_turn("ML is learning from data.")])
            .then(MessageResponse::end_turn("Deep learning stacks layers.")),
    );
    let rag = fixture_system(&mock);
    let session = rag.create_session().await;

    rag.query("What is ML?", Some(&session)).await.unwrap();
    rag.query("And deep learning?", Some(&session)).await.unwrap();

    let requests = mock.requests().await;
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].system.as_deref().unwrap().contains("Previous conversation:"));
    let system = requests[1].system.as_deref().unwrap();
    assert!(system.ends_with(
        "Previous conversation:\nUser: What is ML?\nAssistant: ML is learning from data."
    ));

    let history = rag.session_manager().get_conversation_history(&session).await.unwrap();
    assert!(history.ends_with("User: And deep learning?\nAssistant: Deep learning stacks layers."));
}

#[tokio::test]
async fn stateless_query_records_no_history() {
    let mock = Arc::new(
        MockLlmClient::new(vec![MessageResponse::end_turn("a")]).then(MessageResponse::end_turn("b")),
    );
    let rag = fixture_system(&mock);

    rag.query("first", None).await.unwrap();
    rag.query("second", None).await.unwrap();

    let requests = mock.requests().await;
    assert!(requests.iter().all(|r| !r.system.as_deref().unwrap().contains("Previous")));
}

#[tokio::test]
async fn failed_turn_propagates_and_leaves_session_untouched() {
    let mock = Arc::new(MockLlmClient::default().then_fail("rate limited"));
    let rag = fixture_system(&mock);
    let session = rag.create_session().await;

    let result = rag.query("anything", Some(&session)).await;
    assert!(matches!(result, Err(RagError::LlmError { .. })));
    assert_eq!(rag.session_manager().get_conversation_history(&session).await, None);
}

#[tokio::test]
async fn folder_loading_skips_duplicates_and_other_files() {
    let dir = tempfile::tempdir().unwrap();
    write_courses(dir.path());
    let rag = RagSystem::builder().llm_client(Arc::new(MockLlmClient::default())).build().unwrap();

    let (courses, chunks) = rag.add_course_folder(dir.path(), false).await.unwrap();
    assert_eq!(courses, 2);
    assert_eq!(chunks, 3);

    let analytics = rag.course_analytics().await.unwrap();
    assert_eq!(analytics.total_courses, 2);
    assert_eq!(analytics.course_titles, vec!["Building Agents", "Retrieval Basics"]);

    // Loading again adds nothing; clearing first reloads everything.
    assert_eq!(rag.add_course_folder(dir.path(), false).await.unwrap(), (0, 0));
    assert_eq!(rag.add_course_folder(dir.path(), true).await.unwrap(), (2, 3));
}

#[tokio::test]
async fn missing_folder_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let rag = RagSystem::builder().llm_client(Arc::new(MockLlmClient::default())).build().unwrap();

    let result = rag.add_course_folder(dir.path().join("missing"), false).await.unwrap();
    assert_eq!(result, (0, 0));
    assert_eq!(rag.course_analytics().await.unwrap().total_courses, 0);
}

#[tokio::test]
async fn end_to_end_search_over_loaded_courses() {
    let dir = tempfile::tempdir().unwrap();
    write_courses(dir.path());

    let mock = Arc::new(
        MockLlmClient::new(vec![MessageResponse::tool_use(
            "t1",
            SEARCH_TOOL_NAME,
            json!({"query": "chunking overlap", "course_name": "retrieval", "lesson_number": 1}),
        )])
        .then(MessageResponse::end_turn("Overlap keeps context.")),
    );
    let config = RagConfig::builder().max_results(3).build().unwrap();
    let rag = RagSystem::builder().llm_client(mock.clone()).config(config).build().unwrap();
    rag.add_course_folder(dir.path(), false).await.unwrap();

    let (answer, sources) = rag.query("How does chunk overlap help?", None).await.unwrap();
    assert_eq!(answer, "Overlap keeps context.");
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].text, "Retrieval Basics");
    assert_eq!(sources[0].lesson_number, Some(1));
    assert_eq!(sources[0].link.as_deref(), Some("https://example.com/lesson/1"));

    let requests = mock.requests().await;
    match &requests[1].messages[2].content[0] {
        ContentBlock::ToolResult { content, is_error, .. } => {
            assert!(!is_error);
            assert!(content.starts_with("[Retrieval Basics - Lesson 1]\n"));
            assert!(content.contains("Overlap keeps context between chunks."));
        }
        other => panic!("unexpected block {other:?}"),
    }
}

#[tokio::test]
async fn added_document_is_searchable_by_partial_course_name() {
    let dir = tempfile::tempdir().unwrap();
    write_courses(dir.path());
    let rag = RagSystem::builder().llm_client(Arc::new(MockLlmClient::default())).build().unwrap();

    let (course, chunk_count) = rag.add_course_document(dir.path().join("agents.md")).await.unwrap();
    assert_eq!(course.title, "Building Agents");
    assert_eq!(course.instructor.as_deref(), Some("Dr. Test"));
    assert_eq!(chunk_count, 1);

    let output = rag.search_tool().search("tools", Some("Agents"), None).await.unwrap();
    assert!(output.content.starts_with("[Building Agents - Lesson 1]\n"));
    let missing = rag.search_tool().search("tools", Some("Nonexistent Course"), None).await.unwrap();
    assert_eq!(missing.content, "No course found matching 'Nonexistent Course'");
}

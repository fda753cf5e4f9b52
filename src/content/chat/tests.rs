use super::*;
use crate::content::MessageKind;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn generator_for(server: &MockServer) -> ChatCompletionsGenerator {
    ChatCompletionsGenerator::new(&ContentConfig {
        enabled: true,
        api_base: server.uri(),
        api_key: "test_key".to_string(),
        model: "test-model".to_string(),
        ..ContentConfig::default()
    })
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    }))
}

fn topic() -> Topic {
    Topic {
        name: "Travel".to_string(),
        description: "Recent trips".to_string(),
    }
}

#[tokio::test]
async fn test_message_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test_key"))
        .and(body_partial_json(json!({"model": "test-model"})))
        .respond_with(completion("  \"Hey! Back from the beach?\"  "))
        .expect(1)
        .mount(&server)
        .await;

    let t = topic();
    let previous = vec!["Hi!".to_string()];
    let req = ContentRequest {
        topic: &t,
        from: "Ana",
        to: "Bia",
        kind: MessageKind::FollowUp,
        previous: &previous,
        recent: &[],
    };
    let text = generator_for(&server).message(&req).await.unwrap();
    assert_eq!(text, "Hey! Back from the beach?");
}

#[tokio::test]
async fn test_empty_content_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("   "))
        .mount(&server)
        .await;

    let t = topic();
    let req = ContentRequest {
        topic: &t,
        from: "Ana",
        to: "Bia",
        kind: MessageKind::Greeting,
        previous: &[],
        recent: &[],
    };
    assert!(generator_for(&server).message(&req).await.is_err());
}

#[tokio::test]
async fn test_rate_limit_maps_to_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let t = topic();
    let req = ContentRequest {
        topic: &t,
        from: "Ana",
        to: "Bia",
        kind: MessageKind::Closing,
        previous: &[],
        recent: &[],
    };
    let err = generator_for(&server).message(&req).await.unwrap_err();
    assert!(matches!(
        err,
        MaturationError::RateLimit {
            retry_after: Some(7)
        }
    ));
}

#[tokio::test]
async fn test_missing_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let t = topic();
    let req = ContentRequest {
        topic: &t,
        from: "Ana",
        to: "Bia",
        kind: MessageKind::Reply,
        previous: &[],
        recent: &[],
    };
    assert!(generator_for(&server).message(&req).await.is_err());
}

#[tokio::test]
async fn test_topic_parses_json_in_code_fence() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(
            "```json\n{\"name\": \"Cooking\", \"description\": \"Recipes tried this week\"}\n```",
        ))
        .mount(&server)
        .await;

    let topic = generator_for(&server).topic().await.unwrap();
    assert_eq!(topic.name, "Cooking");
    assert_eq!(topic.description, "Recipes tried this week");
}

#[tokio::test]
async fn test_topic_invalid_json_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("Let's talk about cooking"))
        .mount(&server)
        .await;

    assert!(generator_for(&server).topic().await.is_err());
}

#[test]
fn test_build_prompt_includes_context() {
    let t = topic();
    let previous = vec!["first".to_string(), "second".to_string()];
    let req = ContentRequest {
        topic: &t,
        from: "Ana",
        to: "Bia",
        kind: MessageKind::Reply,
        previous: &previous,
        recent: &[],
    };
    let prompt = ChatCompletionsGenerator::build_prompt(&req);
    assert!(prompt.contains("Travel"));
    assert!(prompt.contains("Ana writing to Bia"));
    assert!(prompt.contains("- second"));
    assert!(prompt.contains("reply"));
}

#[test]
fn test_clean_generated() {
    assert_eq!(clean_generated("  hello  "), "hello");
    assert_eq!(clean_generated("\"hello\""), "hello");
    assert_eq!(clean_generated("'hi there'"), "hi there");
    assert_eq!(clean_generated("“quoted”"), "quoted");
    assert_eq!(clean_generated("don't strip inner 'quotes'"), "don't strip inner 'quotes'");
}

#[tokio::test]
async fn test_prompt_carries_texts_from_other_chats() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Messages recently sent in other chats"))
        .and(body_string_contains("- Lunch at noon?"))
        .respond_with(completion("Sounds good"))
        .expect(1)
        .mount(&server)
        .await;

    let t = topic();
    let previous = vec!["Hi Bia".to_string()];
    let recent = vec!["Hi Bia".to_string(), "Lunch at noon?".to_string()];
    let req = ContentRequest {
        topic: &t,
        from: "Ana",
        to: "Bia",
        kind: MessageKind::FollowUp,
        previous: &previous,
        recent: &recent,
    };
    let text = generator_for(&server).message(&req).await.unwrap();
    assert_eq!(text, "Sounds good");
}

#[test]
fn test_build_prompt_keeps_latest_run_texts_only() {
    let t = topic();
    let previous = vec!["mine".to_string()];
    let recent: Vec<String> = std::iter::once("mine".to_string())
        .chain((0..30).map(|i| format!("elsewhere {}", i)))
        .collect();
    let req = ContentRequest {
        topic: &t,
        from: "Ana",
        to: "Bia",
        kind: MessageKind::Reply,
        previous: &previous,
        recent: &recent,
    };
    let prompt = ChatCompletionsGenerator::build_prompt(&req);
    assert_eq!(prompt.matches("- mine").count(), 1);
    assert!(prompt.contains("- elsewhere 29"));
    assert!(prompt.contains("- elsewhere 15"));
    assert!(!prompt.contains("- elsewhere 14\n"));
    assert_eq!(prompt.matches("- elsewhere").count(), MAX_RECENT_IN_PROMPT);
}

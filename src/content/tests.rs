use super::*;

fn topic() -> Topic {
    Topic {
        name: "Weekend".to_string(),
        description: "Plans for the weekend".to_string(),
    }
}

#[tokio::test]
async fn test_static_generator_always_fails() {
    let t = topic();
    let req = ContentRequest {
        topic: &t,
        from: "Ana",
        to: "Bia",
        kind: MessageKind::Greeting,
        previous: &[],
        recent: &[],
    };
    assert!(StaticGenerator.message(&req).await.is_err());
    assert!(StaticGenerator.topic().await.is_err());
}

#[tokio::test]
async fn test_choose_topic_falls_back_to_builtin() {
    let chosen = choose_topic(&StaticGenerator).await;
    assert!(fallback::TOPICS.iter().any(|(name, _)| *name == chosen.name));
}

#[test]
fn test_create_generator_respects_enabled_flag() {
    let mut config = ContentConfig::default();
    // Disabled config must not need an API key or network
    let _generator = create_generator(&config);
    config.enabled = true;
    config.api_key = "sk".to_string();
    let _generator = create_generator(&config);
}

#[test]
fn test_message_kind_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&MessageKind::GreetingReply).unwrap(),
        "\"greeting_reply\""
    );
    assert_eq!(MessageKind::FollowUp.to_string(), "follow_up");
}

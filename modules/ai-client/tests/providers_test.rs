use std::time::Duration;

use ai_client::{AiError, Groq, LlmProvider, Message, OpenAi};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "model": "test-model",
        "choices": [{ "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
    })
}

#[tokio::test]
async fn openai_returns_content_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("hello")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAi::new("sk-test", "gpt-4o-mini").with_base_url(server.uri());
    let response = provider.chat(&[Message::user("hi")]).await.unwrap();

    assert_eq!(response.content, "hello");
    assert_eq!(response.model, "test-model");
    assert_eq!(response.usage.total_tokens, 15);
}

#[tokio::test]
async fn openai_maps_401_to_provider_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAi::new("bad", "gpt-4o-mini").with_base_url(server.uri());
    let err = provider.chat(&[Message::user("hi")]).await.unwrap_err();

    match err {
        AiError::ProviderHttp { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("expected ProviderHttp, got {other:?}"),
    }
}

#[tokio::test]
async fn openai_does_not_retry_429() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAi::new("k", "m").with_base_url(server.uri());
    let err = provider.chat(&[Message::user("hi")]).await.unwrap_err();
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn groq_retries_rate_limit_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"ok\":true}")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Groq::new("gsk", "llama-3.3-70b-versatile")
        .with_base_url(server.uri())
        .with_rate_limit_delay(Duration::from_millis(10));
    let response = provider.chat(&[Message::user("hi")]).await.unwrap();

    assert_eq!(response.content, "{\"ok\":true}");
}

#[tokio::test]
async fn groq_stops_after_retry_bound() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(3)
        .mount(&server)
        .await;

    let provider = Groq::new("gsk", "llama-3.3-70b-versatile")
        .with_base_url(server.uri())
        .with_rate_limit_delay(Duration::from_millis(5))
        .with_max_rate_limit_retries(2);
    let err = provider.chat(&[Message::user("hi")]).await.unwrap_err();

    assert!(matches!(err, AiError::ProviderHttp { status: 429, .. }));
}

#[tokio::test]
async fn groq_does_not_retry_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Groq::new("gsk", "m")
        .with_base_url(server.uri())
        .with_rate_limit_delay(Duration::from_millis(5));
    let err = provider.chat(&[Message::user("hi")]).await.unwrap_err();

    assert!(matches!(err, AiError::ProviderHttp { status: 500, .. }));
}

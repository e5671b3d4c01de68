//! Wire-level tests for the HTTP clients against mock servers.

use futures::StreamExt;
use minerva::client::ChatTransport;
use minerva::client::HttpChatTransport;
use minerva::llm::GenerationBackend;
use minerva::models::Message;
use minerva::retrieval::DocumentRetriever;
use minerva::retrieval::EmbeddingClient;
use minerva::retrieval::Retriever;
use minerva::retrieval::VectorIndexClient;
use minerva::MinervaError;
use serde_json::json;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

#[tokio::test]
async fn test_embedding_client_parses_vector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "text-embedding-3-small" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [ { "embedding": [0.1, 0.2, 0.3] } ]
        })))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(
        server.uri(),
        "text-embedding-3-small".to_string(),
        "test-key".to_string(),
    )
    .unwrap();

    let vector = client.generate("a question").await.unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn test_embedding_client_surfaces_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(
        server.uri(),
        "text-embedding-3-small".to_string(),
        "wrong".to_string(),
    )
    .unwrap();

    let err = client.generate("q").await.unwrap_err();
    assert!(matches!(err, MinervaError::Retrieval(_)));
}

#[tokio::test]
async fn test_index_client_tolerates_string_and_array_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("Api-Key", "index-key"))
        .and(body_partial_json(json!({ "topK": 2, "includeMetadata": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {
                    "score": 0.91,
                    "metadata": {
                        "bookTitle": "Devil in Winter",
                        "authorName": "Lisa Kleypas",
                        "grade": "A-",
                        "bookTypes": "European Historical Romance",
                        "text": "Review body one."
                    }
                },
                {
                    "score": 0.84,
                    "metadata": {
                        "bookTitle": "Ravished",
                        "authorName": "Amanda Quick",
                        "bookTypes": ["Historical Romance", "Classic"],
                        "text": "Review body two."
                    }
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = VectorIndexClient::new(server.uri(), "index-key".to_string()).unwrap();
    let documents = client.query(vec![0.1, 0.2], 2).await.unwrap();

    assert_eq!(documents.len(), 2);
    assert_eq!(
        documents[0].metadata.book_types,
        vec!["European Historical Romance"]
    );
    assert_eq!(documents[1].metadata.book_types.len(), 2);
    assert_eq!(documents[0].content, "Review body one.");
}

#[tokio::test]
async fn test_retriever_degrades_to_empty_on_index_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [ { "embedding": [0.5] } ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(500).set_body_string("index down"))
        .mount(&server)
        .await;

    let embedding = EmbeddingClient::new(
        server.uri(),
        "text-embedding-3-small".to_string(),
        "k".to_string(),
    )
    .unwrap();
    let index = VectorIndexClient::new(server.uri(), "k".to_string()).unwrap();
    let retriever = Retriever::new(embedding, index);

    let documents = retriever.retrieve("anything", 4).await;
    assert!(documents.is_empty());
}

#[tokio::test]
async fn test_llm_service_parses_sse_deltas() {
    let server = MockServer::start().await;
    let sse_body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "stream": true, "model": "gpt-4o-mini" })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body),
        )
        .mount(&server)
        .await;

    let mut config = minerva::config::AppConfig::default();
    config.generation.endpoint = server.uri();
    config.generation.api_key = "test-key".to_string();

    let service = minerva::llm::LlmService::from_config(&config).unwrap();
    let response = service.stream_chat("prompt").await.unwrap();
    assert_eq!(response.collect_all().await.unwrap(), "Hello world");
}

#[tokio::test]
async fn test_chat_transport_parses_snapshot_events() {
    let server = MockServer::start().await;
    let sse_body = concat!(
        "event: message\ndata: {\"text\":\"Partial\"}\n\n",
        "event: message\ndata: {\"text\":\"Partial then full\"}\n\n",
        "event: done\ndata: {}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body),
        )
        .mount(&server)
        .await;

    let transport = HttpChatTransport::new(server.uri()).unwrap();
    let messages = vec![Message::user("hi")];
    let stream = transport.stream_chat(&messages, Some("u1")).await.unwrap();

    let snapshots: Vec<String> = stream.map(|s| s.unwrap()).collect().await;
    assert_eq!(snapshots, vec!["Partial", "Partial then full"]);
}

#[tokio::test]
async fn test_chat_transport_maps_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Configuration error",
            "details": "missing generation API key",
            "type": "config"
        })))
        .mount(&server)
        .await;

    let transport = HttpChatTransport::new(server.uri()).unwrap();
    let Err(err) = transport.stream_chat(&[Message::user("hi")], None).await else {
        panic!("expected a config error");
    };
    assert!(matches!(err, MinervaError::Config(_)));
}

#[tokio::test]
async fn test_chat_transport_maps_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": "Rate limit exceeded",
            "details": "too many requests, please slow down"
        })))
        .mount(&server)
        .await;

    let transport = HttpChatTransport::new(server.uri()).unwrap();
    let Err(err) = transport.stream_chat(&[Message::user("hi")], None).await else {
        panic!("expected a rate limit error");
    };
    assert!(matches!(err, MinervaError::RateLimited(_)));
}

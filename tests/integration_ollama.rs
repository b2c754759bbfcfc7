#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance with the models pulled
// Run with: cargo test --test integration_ollama -- --ignored

use antt_rag::config::{LlmConfig, OllamaConfig};
use antt_rag::embeddings::Embedder;
use antt_rag::ollama::OllamaClient;
use antt_rag::query::{Generator, OllamaGenerator, RetrievedChunk, build_prompt};
use std::env;
use tracing::info;

const DEFAULT_EMBEDDING_MODEL: &str = "bge-m3";
const DEFAULT_LLM_MODEL: &str = "llama3:8b";

fn ollama_config() -> OllamaConfig {
    let mut config = OllamaConfig::default();
    if let Ok(host) = env::var("OLLAMA_HOST") {
        config.host = host;
    }
    if let Some(port) = env::var("OLLAMA_PORT").ok().and_then(|p| p.parse().ok()) {
        config.port = port;
    }
    config.embedding_model =
        env::var("OLLAMA_EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
    config.batch_size = 4;
    config
}

fn llm_config() -> LlmConfig {
    LlmConfig {
        model: env::var("OLLAMA_LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
        ..LlmConfig::default()
    }
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn embeddings_are_normalized_and_batched() {
    let client = OllamaClient::new(&ollama_config()).expect("should create client");
    client
        .health_check(&[client.model_name()])
        .expect("embedding model should be available");

    let texts: Vec<String> = (1..=6)
        .map(|n| format!("Art. {} da RCR-3 trata de obrigações da concessionária.", n))
        .collect();
    let vectors = client.embed_documents(&texts).expect("should embed");

    assert_eq!(vectors.len(), texts.len());
    let dimension = vectors[0].len();
    info!("Embedding dimension: {}", dimension);
    for vector in &vectors {
        assert_eq!(vector.len(), dimension);
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3, "norm was {norm}");
    }
}

#[tokio::test]
#[ignore = "requires a running Ollama instance"]
async fn generator_answers_from_context() {
    let client = OllamaClient::new(&ollama_config()).expect("should create client");
    let llm = llm_config();
    client
        .health_check(&[llm.model.as_str()])
        .expect("language model should be available");

    let generator = OllamaGenerator::new(client, &llm);
    let prompt = build_prompt(
        &[RetrievedChunk {
            content: "Art. 50 da RCR-3: a concessionária deve contratar seguro de risco de engenharia."
                .to_string(),
            source: "rcr-3.pdf".to_string(),
            page: Some(12),
            score: 1.0,
        }],
        "Qual artigo trata de seguro de risco de engenharia?",
    );

    let answer = generator.generate(&prompt).await.expect("should generate");
    info!("Answer: {}", answer);
    assert!(answer.contains("50"));
}

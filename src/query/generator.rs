use async_trait::async_trait;

use super::QueryError;
use crate::config::LlmConfig;
use crate::ollama::OllamaClient;

/// Produces the answer text for a filled prompt
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, QueryError>;
}

/// Non-streaming chat completion through Ollama
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(client: OllamaClient, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, QueryError> {
        let client = self.client.clone();
        let model = self.model.clone();
        let temperature = self.temperature;
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || client.chat(&model, &prompt, temperature))
            .await
            .map_err(|e| QueryError::Generation(format!("Generation task failed: {}", e)))?
            .map_err(|e| QueryError::Generation(format!("{:#}", e)))
    }
}

//! Embedding service abstraction shared by L2 (document vectors) and L5
//! (duplicate-filter semantic comparison).

use async_trait::async_trait;
use std::time::Duration;

use crate::types::RetrievalError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingProvider {
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub dimension: usize,
    pub timeout: Duration,
}

impl EmbeddingConfig {
    /// Mirrors the resolution order used across this codebase for picking
    /// an embedding backend: explicit `EMBEDDING_PROVIDER`, then URL/key
    /// sniffing, then `None` so the caller can fall back to a mock.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("EMBEDDING_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty());
        let base_url = std::env::var("EMBEDDING_API_BASE_URL").ok().filter(|u| !u.is_empty());
        let explicit = std::env::var("EMBEDDING_PROVIDER").ok().filter(|p| !p.is_empty());

        let provider = if let Some(p) = explicit {
            match p.to_lowercase().as_str() {
                "ollama" => EmbeddingProvider::Ollama,
                "openai" => EmbeddingProvider::OpenAi,
                _ => return None,
            }
        } else if let Some(url) = &base_url {
            if url.contains("localhost") || url.contains("127.0.0.1") {
                EmbeddingProvider::Ollama
            } else if api_key.is_some() {
                EmbeddingProvider::OpenAi
            } else {
                return None;
            }
        } else if api_key.is_some() {
            EmbeddingProvider::OpenAi
        } else {
            return None;
        };

        let (default_model, default_url, default_dim) = match provider {
            EmbeddingProvider::Ollama => ("nomic-embed-text".to_string(), "http://localhost:11434".to_string(), 768),
            EmbeddingProvider::OpenAi => ("text-embedding-3-small".to_string(), "https://api.openai.com/v1".to_string(), 1536),
        };

        Some(Self {
            provider,
            model: std::env::var("EMBEDDING_MODEL").unwrap_or(default_model),
            base_url: base_url.unwrap_or(default_url),
            api_key,
            dimension: std::env::var("VECTOR_DIMENSION").ok().and_then(|v| v.parse().ok()).unwrap_or(default_dim),
            timeout: Duration::from_secs(30),
        })
    }
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;
    fn dimension(&self) -> usize;
}

pub struct OpenAiEmbeddingService {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl OpenAiEmbeddingService {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(self.embed_batch(&[text.to_string()]).await?.remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            RetrievalError::VectorStore("embedding service has no API key configured".into())
        })?;

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(api_key)
            .json(&serde_json::json!({ "model": self.config.model, "input": texts }))
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| RetrievalError::VectorStore(e.to_string()))?;

        let raw: serde_json::Value = response.json().await.map_err(|e| RetrievalError::VectorStore(e.to_string()))?;
        let data = raw.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
            RetrievalError::VectorStore("embedding response missing data[]".into())
        })?;

        data.iter()
            .map(|item| {
                item.get("embedding")
                    .and_then(|e| e.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
                    .ok_or_else(|| RetrievalError::VectorStore("embedding item missing vector".into()))
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

pub struct OllamaEmbeddingService {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl OllamaEmbeddingService {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }
}

#[async_trait]
impl EmbeddingService for OllamaEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.config.base_url))
            .json(&serde_json::json!({ "model": self.config.model, "prompt": text }))
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| RetrievalError::VectorStore(e.to_string()))?;

        let raw: serde_json::Value = response.json().await.map_err(|e| RetrievalError::VectorStore(e.to_string()))?;
        raw.get("embedding")
            .and_then(|e| e.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
            .ok_or_else(|| RetrievalError::VectorStore("ollama response missing embedding".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Deterministic hash-based embedding used in tests and as a last-resort
/// fallback when no real embedding backend is configured.
pub struct MockEmbeddingService {
    dimension: usize,
}

impl MockEmbeddingService {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingService for MockEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vec = vec![0.0f32; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            vec[i % self.dimension] += byte as f32 / 255.0;
        }
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt().max(1e-6);
        Ok(vec.into_iter().map(|v| v / norm).collect())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic_and_normalized() {
        let svc = MockEmbeddingService::new(16);
        let a = svc.embed("KITAS renewal").await.unwrap();
        let b = svc.embed("KITAS renewal").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![0.5, 0.5, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_zero_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }
}

//! Embedding of service report text and problem descriptions.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::{Result, WrenchError};
use async_trait::async_trait;

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts in one call. Output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    /// Fail unless `embedding` has `dimensions()` entries.
    fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() == self.dimensions() {
            Ok(())
        } else {
            Err(WrenchError::Embedding(format!(
                "expected {} dimensions, got {}",
                self.dimensions(),
                embedding.len()
            )))
        }
    }
}

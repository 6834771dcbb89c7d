//! Embedding provider trait and a deterministic hash-based provider.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it. Output order
/// always matches input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Deterministic embeddings derived from a hash of the input text.
///
/// Identical texts map to identical unit vectors, so similarity search
/// behaves predictably without any external service. Intended for local
/// development and tests.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Create a provider producing vectors of the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // FNV-1a over the bytes, then one splitmix64 draw per component
        let hash = text.bytes().fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        });
        let mut emb = vec![0.0f32; self.dimensions];
        for (i, v) in emb.iter_mut().enumerate() {
            let bits = splitmix64(hash ^ (i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15));
            // top 24 bits mapped onto [-1, 1]
            *v = (bits >> 40) as f32 / (1u64 << 23) as f32 - 1.0;
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embeddings_are_deterministic_and_normalised() {
        let provider = HashEmbeddingProvider::new(32);
        let a = provider.embed("natalizumab").await.unwrap();
        let b = provider.embed("natalizumab").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn long_texts_get_distinct_directions() {
        let provider = HashEmbeddingProvider::new(16);
        let texts = [
            "The capital of France is Paris, on the Seine.",
            "Natalizumab is used to treat relapsing multiple sclerosis.",
            "Quarterly revenue grew eleven percent year over year.",
        ];
        let vectors = provider.embed_batch(&texts).await.unwrap();
        for v in &vectors {
            let mut distinct: Vec<u32> = v.iter().map(|x| x.to_bits()).collect();
            distinct.sort_unstable();
            distinct.dedup();
            assert!(distinct.len() > 8, "components collapsed: {v:?}");
        }
        for i in 0..vectors.len() {
            for j in (i + 1)..vectors.len() {
                let similarity = cosine(&vectors[i], &vectors[j]);
                assert!(similarity.abs() < 0.99, "texts {i} and {j} have cosine {similarity}");
            }
        }
    }

    #[tokio::test]
    async fn components_stay_in_unit_range() {
        let provider = HashEmbeddingProvider::new(64);
        let v = provider.embed("a fairly long sentence used to exercise every component").await.unwrap();
        assert!(v.iter().all(|x| x.is_finite() && x.abs() <= 1.0));
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let provider = HashEmbeddingProvider::new(8);
        let batch = provider.embed_batch(&["one", "two"]).await.unwrap();
        assert_eq!(batch[0], provider.embed("one").await.unwrap());
        assert_eq!(batch[1], provider.embed("two").await.unwrap());
    }
}

//! Retrieval strategies for the Q&A path. The keyword store is the floor:
//! deterministic and dependency-free. The vector path is an accuracy upgrade
//! that must degrade gracefully: any failure or empty result falls through
//! to keywords, and the keyword path never depends on the vector path.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::knowledge::{KnowledgeDocument, KnowledgeStore};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub doc_id: String,
    pub similarity: f32,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn available(&self) -> bool;
    async fn upsert(&self, doc_id: &str, vector: Vec<f32>, category: &str) -> Result<()>;
    async fn query(&self, vector: Vec<f32>, k: usize) -> Result<Vec<VectorMatch>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<KnowledgeDocument>>;
}

pub struct KeywordRetriever {
    store: Arc<KnowledgeStore>,
}

impl KeywordRetriever {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<KnowledgeDocument>> {
        Ok(self.store.search(query, k))
    }
}

pub struct VectorRetriever {
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    store: Arc<KnowledgeStore>,
    similarity_threshold: f32,
}

impl VectorRetriever {
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        store: Arc<KnowledgeStore>,
        similarity_threshold: f32,
    ) -> Self {
        Self {
            embeddings,
            index,
            store,
            similarity_threshold,
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<KnowledgeDocument>> {
        if !self.index.available().await {
            anyhow::bail!("vector index unavailable");
        }

        let vector = self.embeddings.embed(query).await?;
        let matches = self.index.query(vector, k).await?;

        let docs: Vec<KnowledgeDocument> = matches
            .into_iter()
            .filter(|m| m.similarity >= self.similarity_threshold)
            .filter_map(|m| self.store.get(&m.doc_id).cloned())
            .collect();

        debug!(query, results = docs.len(), "vector retrieval");
        Ok(docs)
    }
}

/// Decorator that makes the vector path best-effort. `primary = None` means
/// the upgrade was never configured and everything goes to the fallback.
pub struct FallbackRetriever {
    primary: Option<Arc<dyn Retriever>>,
    fallback: Arc<dyn Retriever>,
}

impl FallbackRetriever {
    pub fn new(primary: Option<Arc<dyn Retriever>>, fallback: Arc<dyn Retriever>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl Retriever for FallbackRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<KnowledgeDocument>> {
        if let Some(primary) = &self.primary {
            match primary.retrieve(query, k).await {
                Ok(docs) if !docs.is_empty() => return Ok(docs),
                Ok(_) => debug!(query, "primary retriever empty, falling back to keywords"),
                Err(e) => warn!(query, error = %e, "primary retriever failed, falling back to keywords"),
            }
        }
        self.fallback.retrieve(query, k).await
    }
}

/// Setup operation: embed every knowledge document and upsert it into the
/// vector index. Runs at startup when the embedding collaborator is
/// configured; a failure here only disables the upgrade path.
pub async fn sync_knowledge_embeddings(
    store: &KnowledgeStore,
    embeddings: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
) -> Result<usize> {
    let mut synced = 0;
    for doc in store.all() {
        let text = format!(
            "{} {}",
            doc.question,
            doc.keywords.iter().cloned().collect::<Vec<_>>().join(" ")
        );
        let vector = embeddings.embed(&text).await?;
        index.upsert(&doc.id, vector, &doc.category).await?;
        synced += 1;
    }
    Ok(synced)
}

/// Cosine similarity between two embedding vectors, clamped to [-1, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        anyhow::bail!("vector dimensions must match: {} != {}", a.len(), b.len());
    }
    if a.is_empty() {
        anyhow::bail!("vectors cannot be empty");
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    fn store() -> Arc<KnowledgeStore> {
        Arc::new(KnowledgeStore::bundled())
    }

    /// Deterministic bag-of-tokens embedding over a fixed vocabulary slot
    /// space, good enough for similarity ordering in tests.
    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; 256];
            for token in text.to_lowercase().split_whitespace() {
                let mut h: usize = 0;
                for b in token.bytes() {
                    h = h.wrapping_mul(31).wrapping_add(b as usize);
                }
                v[h % 256] += 1.0;
            }
            Ok(v)
        }
    }

    /// In-memory cosine index standing in for the pgvector table.
    #[derive(Default)]
    struct MemoryIndex {
        entries: Mutex<HashMap<String, Vec<f32>>>,
    }

    #[async_trait]
    impl VectorIndex for MemoryIndex {
        async fn available(&self) -> bool {
            true
        }

        async fn upsert(&self, doc_id: &str, vector: Vec<f32>, _category: &str) -> Result<()> {
            self.entries.lock().await.insert(doc_id.to_string(), vector);
            Ok(())
        }

        async fn query(&self, vector: Vec<f32>, k: usize) -> Result<Vec<VectorMatch>> {
            let entries = self.entries.lock().await;
            let mut matches: Vec<VectorMatch> = entries
                .iter()
                .map(|(id, v)| VectorMatch {
                    doc_id: id.clone(),
                    similarity: cosine_similarity(&vector, v).unwrap_or(0.0),
                })
                .collect();
            matches.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            matches.truncate(k);
            Ok(matches)
        }
    }

    #[tokio::test]
    async fn every_document_round_trips_through_the_index() {
        let store = store();
        let embedder = StubEmbedder;
        let index = MemoryIndex::default();

        let synced = sync_knowledge_embeddings(&*store, &embedder, &index)
            .await
            .unwrap();
        assert_eq!(synced, store.all().len());

        // Indexing uses question + keywords, so querying by the question
        // itself must clear the similarity threshold.
        let retriever = VectorRetriever::new(
            Arc::new(StubEmbedder),
            Arc::new(index),
            store.clone(),
            0.5,
        );
        for doc in store.all() {
            let results = retriever.retrieve(&doc.question, 3).await.unwrap();
            assert!(
                results.iter().any(|d| d.id == doc.id),
                "document {} not retrievable via its own question",
                doc.id
            );
        }
    }

    #[tokio::test]
    async fn fallback_kicks_in_on_primary_error() {
        let mut primary = MockRetriever::new();
        primary
            .expect_retrieve()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("index down")));

        let fallback = FallbackRetriever::new(
            Some(Arc::new(primary)),
            Arc::new(KeywordRetriever::new(store())),
        );
        let docs = fallback.retrieve("venue location", 3).await.unwrap();
        assert!(!docs.is_empty());
        assert_eq!(docs[0].category, "location");
    }

    #[tokio::test]
    async fn fallback_kicks_in_on_empty_primary() {
        let mut primary = MockRetriever::new();
        primary.expect_retrieve().times(1).returning(|_, _| Ok(vec![]));

        let fallback = FallbackRetriever::new(
            Some(Arc::new(primary)),
            Arc::new(KeywordRetriever::new(store())),
        );
        let docs = fallback.retrieve("registration deadline", 3).await.unwrap();
        assert!(!docs.is_empty());
    }

    #[tokio::test]
    async fn no_primary_goes_straight_to_keywords() {
        let fallback = FallbackRetriever::new(None, Arc::new(KeywordRetriever::new(store())));
        let docs = fallback.retrieve("prizes", 3).await.unwrap();
        assert_eq!(docs[0].id, "prizes");
    }

    #[tokio::test]
    async fn vector_retriever_applies_the_threshold() {
        let mut index = MockVectorIndex::new();
        index.expect_available().returning(|| true);
        index.expect_query().returning(|_, _| {
            Ok(vec![
                VectorMatch { doc_id: "prizes".into(), similarity: 0.9 },
                VectorMatch { doc_id: "food".into(), similarity: 0.2 },
            ])
        });

        let retriever = VectorRetriever::new(
            Arc::new(StubEmbedder),
            Arc::new(index),
            store(),
            0.5,
        );
        let docs = retriever.retrieve("prizes", 3).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "prizes");
    }

    #[test]
    fn cosine_basics() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-6);
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).is_err());
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 0.0);
    }
}

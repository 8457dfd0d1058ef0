//! 混合检索流水线
//!
//! 查询 -> 嵌入 -> 并发检索各个来源 -> 加权排名融合 -> (可选) 生成答案

use futures::future::join_all;
use hybridrag_core::{Config, FailurePolicy, HybridRagError, RankedList, Result};
use hybridrag_vector::VectorStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::embedding::EmbeddingProvider;
use crate::fusion::{FusedEntry, FusedResult, RankFusion, WeightedList};
use crate::generator::AnswerGenerator;
use crate::retriever::{Retriever, VectorStoreRetriever};

pub const STRUCTURED_SOURCE: &str = "structured";
pub const UNSTRUCTURED_SOURCE: &str = "unstructured";

/// 检索器及其融合权重
#[derive(Clone)]
pub struct RetrieverSpec {
    pub retriever: Arc<dyn Retriever>,
    pub weight: f64,
}

impl RetrieverSpec {
    pub fn new(retriever: Arc<dyn Retriever>, weight: f64) -> Self {
        Self { retriever, weight }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<FusedEntry>,
}

pub struct HybridSearchPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    retrievers: Vec<RetrieverSpec>,
    fusion: RankFusion,
    generator: Option<Arc<dyn AnswerGenerator>>,
    top_n: usize,
    candidates_per_source: usize,
    timeout: Duration,
    failure_policy: FailurePolicy,
}

impl HybridSearchPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let config = Config::default();
        Self {
            embedder,
            retrievers: Vec::new(),
            fusion: RankFusion::default(),
            generator: None,
            top_n: config.fusion.top_n,
            candidates_per_source: config.retrieval.candidates_per_source,
            timeout: Duration::from_millis(config.retrieval.timeout_ms),
            failure_policy: config.retrieval.failure_policy,
        }
    }

    /// Wires the structured (pgvector) and unstructured (Qdrant) stores with
    /// the weights and limits from `config`.
    pub fn from_config(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        structured: Arc<dyn VectorStore>,
        unstructured: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self::new(embedder)
            .with_fusion(RankFusion::new(config.fusion.k_const)?)
            .add_retriever(
                Arc::new(VectorStoreRetriever::new(STRUCTURED_SOURCE, structured)),
                config.fusion.structured_weight,
            )
            .add_retriever(
                Arc::new(VectorStoreRetriever::new(UNSTRUCTURED_SOURCE, unstructured)),
                config.fusion.unstructured_weight,
            )
            .with_top_n(config.fusion.top_n)
            .with_candidates_per_source(config.retrieval.candidates_per_source)
            .with_timeout(Duration::from_millis(config.retrieval.timeout_ms))
            .with_failure_policy(config.retrieval.failure_policy))
    }

    pub fn add_retriever(mut self, retriever: Arc<dyn Retriever>, weight: f64) -> Self {
        self.retrievers.push(RetrieverSpec::new(retriever, weight));
        self
    }

    pub fn with_fusion(mut self, fusion: RankFusion) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_candidates_per_source(mut self, candidates: usize) -> Self {
        self.candidates_per_source = candidates;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn retrievers(&self) -> &[RetrieverSpec] {
        &self.retrievers
    }

    /// Embeds the query, searches every source concurrently and fuses the
    /// lists.
    pub async fn retrieve(&self, query: &str) -> Result<FusedResult> {
        if query.trim().is_empty() {
            return Err(HybridRagError::InvalidArgument("query is empty".to_string()));
        }
        if self.retrievers.is_empty() {
            return Err(HybridRagError::InvalidArgument(
                "pipeline has no retrievers".to_string(),
            ));
        }

        let query_vector = self.embedder.embed(query).await?;
        let lists = self.search_all(&query_vector).await?;
        let fused = self.fusion.fuse(&lists, self.top_n)?;

        tracing::info!(
            "Fused {} lists into {} results for query {:?}",
            lists.len(),
            fused.len(),
            query
        );
        Ok(fused)
    }

    /// Retrieves and then asks the generator to answer from the fused
    /// documents in rank order.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            HybridRagError::Config("pipeline has no answer generator".to_string())
        })?;

        let fused = self.retrieve(query).await?;
        let context: Vec<_> = fused.entries.iter().map(|e| e.document.clone()).collect();
        let answer = generator.generate(query, &context).await?;

        Ok(Answer {
            answer,
            sources: fused.entries,
        })
    }

    async fn search_all(&self, query_vector: &[f32]) -> Result<Vec<WeightedList>> {
        let searches = self.retrievers.iter().map(|spec| async move {
            let source = spec.retriever.source();
            let outcome = match tokio::time::timeout(
                self.timeout,
                spec.retriever.search(query_vector, self.candidates_per_source),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(HybridRagError::Timeout(format!(
                    "retriever '{}' did not answer within {:?}",
                    source, self.timeout
                ))),
            };
            (spec, outcome)
        });

        let mut lists = Vec::with_capacity(self.retrievers.len());
        let mut last_error = None;

        for (spec, outcome) in join_all(searches).await {
            match outcome {
                Ok(list) => lists.push(WeightedList::new(relabel(list, spec), spec.weight)),
                Err(e) if self.failure_policy == FailurePolicy::Strict => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Retriever {} failed, continuing without it: {}",
                        spec.retriever.source(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        if lists.is_empty()
            && let Some(e) = last_error
        {
            return Err(e);
        }
        Ok(lists)
    }
}

/// 保证列表的来源标签与检索器一致
fn relabel(mut list: RankedList, spec: &RetrieverSpec) -> RankedList {
    if list.source != spec.retriever.source() {
        list.source = spec.retriever.source().to_string();
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_adapter::AIProviderEmbedding;
    use crate::generator::LlmAnswerGenerator;
    use async_trait::async_trait;
    use hybridrag_core::{Document, GenerationConfig};
    use hybridrag_testing::MockAiProvider;
    use hybridrag_vector::{MemoryStore, PgVectorStore, VectorItem};
    use serde_json::json;

    enum Behavior {
        Return(Vec<&'static str>),
        Fail,
        Hang,
    }

    struct StubRetriever {
        source: &'static str,
        behavior: Behavior,
    }

    impl StubRetriever {
        fn arc(source: &'static str, behavior: Behavior) -> Arc<dyn Retriever> {
            Arc::new(Self { source, behavior })
        }
    }

    #[async_trait]
    impl Retriever for StubRetriever {
        fn source(&self) -> &str {
            self.source
        }

        async fn search(&self, _query_vector: &[f32], k: usize) -> Result<RankedList> {
            match &self.behavior {
                Behavior::Return(ids) => Ok(RankedList::new(
                    self.source,
                    ids.iter()
                        .take(k)
                        .map(|id| Document::new(*id, format!("{} via {}", id, self.source)))
                        .collect(),
                )),
                Behavior::Fail => Err(HybridRagError::VectorStore("connection refused".to_string())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(RankedList::empty(self.source))
                }
            }
        }
    }

    fn embedder() -> Arc<dyn EmbeddingProvider> {
        Arc::new(AIProviderEmbedding::new(Arc::new(MockAiProvider::new()), "mock", 16))
    }

    fn ids(result: &FusedResult) -> Vec<&str> {
        result.entries.iter().map(|e| e.document.id.as_str()).collect()
    }

    fn two_sources(second: Behavior) -> HybridSearchPipeline {
        HybridSearchPipeline::new(embedder())
            .add_retriever(StubRetriever::arc("pg", Behavior::Return(vec!["doc1", "doc2", "doc3"])), 0.5)
            .add_retriever(StubRetriever::arc("qdrant", second), 0.5)
            .with_top_n(10)
    }

    #[tokio::test]
    async fn test_retrieve_fuses_all_sources() {
        let pipeline = two_sources(Behavior::Return(vec!["doc2", "doc4", "doc1"]));
        let result = pipeline.retrieve("is it loud?").await.unwrap();

        assert_eq!(ids(&result), vec!["doc2", "doc1", "doc4", "doc3"]);
        assert_eq!(result.entries[0].document.content, "doc2 via pg");
        assert_eq!(
            result.entries[0].sources().collect::<Vec<_>>(),
            vec!["pg", "qdrant"]
        );
    }

    #[tokio::test]
    async fn test_candidates_per_source_limits_lists() {
        let pipeline = two_sources(Behavior::Return(vec!["doc2", "doc4", "doc1"]))
            .with_candidates_per_source(1);
        let result = pipeline.retrieve("q").await.unwrap();
        assert_eq!(ids(&result), vec!["doc1", "doc2"]);
    }

    #[tokio::test]
    async fn test_strict_policy_fails_query() {
        let err = two_sources(Behavior::Fail).retrieve("q").await.unwrap_err();
        assert!(matches!(err, HybridRagError::VectorStore(_)));
    }

    #[tokio::test]
    async fn test_lenient_policy_drops_failed_source() {
        let pipeline = two_sources(Behavior::Fail).with_failure_policy(FailurePolicy::Lenient);
        let result = pipeline.retrieve("q").await.unwrap();
        assert_eq!(ids(&result), vec!["doc1", "doc2", "doc3"]);
    }

    #[tokio::test]
    async fn test_lenient_policy_all_failed() {
        let pipeline = HybridSearchPipeline::new(embedder())
            .add_retriever(StubRetriever::arc("pg", Behavior::Fail), 0.5)
            .add_retriever(StubRetriever::arc("qdrant", Behavior::Fail), 0.5)
            .with_failure_policy(FailurePolicy::Lenient);
        assert!(pipeline.retrieve("q").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let pipeline = two_sources(Behavior::Hang).with_timeout(Duration::from_millis(50));
        let err = pipeline.retrieve("q").await.unwrap_err();
        assert!(matches!(err, HybridRagError::Timeout(_)));

        let lenient = two_sources(Behavior::Hang)
            .with_timeout(Duration::from_millis(50))
            .with_failure_policy(FailurePolicy::Lenient);
        assert_eq!(lenient.retrieve("q").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_lenient_policy_survives_unreachable_database() {
        let provider = Arc::new(MockAiProvider::new().with_dimensions(16));
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(AIProviderEmbedding::new(provider, "mock", 16));

        let unstructured = Arc::new(MemoryStore::with_name("qdrant"));
        let vector = embedder.embed("very loud motor").await.unwrap();
        unstructured
            .upsert(VectorItem::new(vector, json!({ "content": "very loud motor" })).with_id("r1-0"))
            .await
            .unwrap();

        let structured = Arc::new(
            PgVectorStore::connect_lazy(
                "postgresql://hybridrag@127.0.0.1:1/reviews",
                "review_chunks",
                16,
                1,
                Duration::from_millis(200),
            )
            .unwrap(),
        );

        let mut config = Config::default();
        config.retrieval.failure_policy = FailurePolicy::Lenient;
        let pipeline =
            HybridSearchPipeline::from_config(&config, embedder.clone(), structured.clone(), unstructured.clone())
                .unwrap();
        let result = pipeline.retrieve("is it loud").await.unwrap();
        assert_eq!(ids(&result), vec!["r1-0"]);

        config.retrieval.failure_policy = FailurePolicy::Strict;
        let strict = HybridSearchPipeline::from_config(&config, embedder, structured, unstructured).unwrap();
        assert!(strict.retrieve("is it loud").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let err = two_sources(Behavior::Return(vec![])).retrieve("  ").await.unwrap_err();
        assert!(matches!(err, HybridRagError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_no_retrievers_rejected() {
        let err = HybridSearchPipeline::new(embedder()).retrieve("q").await.unwrap_err();
        assert!(matches!(err, HybridRagError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_answer_without_generator() {
        let err = two_sources(Behavior::Return(vec![])).answer("q").await.unwrap_err();
        assert!(matches!(err, HybridRagError::Config(_)));
    }

    #[tokio::test]
    async fn test_end_to_end_over_memory_stores() {
        let provider = Arc::new(
            MockAiProvider::new()
                .with_dimensions(64)
                .with_response("Most reviewers say it is loud [1]."),
        );
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(AIProviderEmbedding::new(provider.clone(), "mock", 64));

        let structured = Arc::new(MemoryStore::with_name("pg"));
        let unstructured = Arc::new(MemoryStore::with_name("qdrant"));
        let reviews = [
            ("r1-0", "the motor is loud and noisy"),
            ("r2-0", "blends smoothies fast"),
            ("r3-0", "loud motor but strong"),
        ];
        for (id, text) in reviews {
            let vector = embedder.embed(text).await.unwrap();
            let item = VectorItem::new(vector, json!({ "content": text })).with_id(id);
            structured.upsert(item.clone()).await.unwrap();
            unstructured.upsert(item).await.unwrap();
        }

        let mut config = Config::default();
        config.fusion.top_n = 2;
        let generator = LlmAnswerGenerator::new(provider.clone(), &GenerationConfig::default()).unwrap();
        let pipeline = HybridSearchPipeline::from_config(&config, embedder, structured, unstructured)
            .unwrap()
            .with_generator(Arc::new(generator));

        let answer = pipeline.answer("is the motor loud").await.unwrap();

        assert_eq!(answer.answer, "Most reviewers say it is loud [1].");
        assert_eq!(answer.sources.len(), 2);
        assert!(answer.sources.iter().all(|s| s.document.content.contains("loud")));
        assert_eq!(
            answer.sources[0].sources().collect::<Vec<_>>(),
            vec![STRUCTURED_SOURCE, UNSTRUCTURED_SOURCE]
        );
        assert_eq!(provider.chat_call_count(), 1);
    }
}

pub mod ai {
    use async_trait::async_trait;
    use hybridrag_ai::{
        ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FinishReason, TokenUsage,
    };
    use hybridrag_core::{HybridRagError, Message, Result};
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::sync::{Arc, Mutex};

    /// 可控的 AI 提供商，聊天返回预设回复，嵌入按词哈希生成确定性向量
    #[derive(Clone)]
    pub struct MockAiProvider {
        responses: Arc<Mutex<Vec<String>>>,
        requests: Arc<Mutex<Vec<ChatRequest>>>,
        chat_calls: Arc<Mutex<u32>>,
        embed_calls: Arc<Mutex<u32>>,
        should_fail: Arc<Mutex<bool>>,
        dimensions: usize,
    }

    impl Default for MockAiProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockAiProvider {
        pub fn new() -> Self {
            Self {
                responses: Arc::new(Mutex::new(vec!["Mock AI response".to_string()])),
                requests: Arc::new(Mutex::new(Vec::new())),
                chat_calls: Arc::new(Mutex::new(0)),
                embed_calls: Arc::new(Mutex::new(0)),
                should_fail: Arc::new(Mutex::new(false)),
                dimensions: 16,
            }
        }

        pub fn with_response(self, response: impl Into<String>) -> Self {
            *self.responses.lock().unwrap() = vec![response.into()];
            self
        }

        pub fn with_dimensions(mut self, dimensions: usize) -> Self {
            self.dimensions = dimensions;
            self
        }

        pub fn with_failure(self) -> Self {
            self.set_should_fail(true);
            self
        }

        pub fn set_should_fail(&self, should_fail: bool) {
            *self.should_fail.lock().unwrap() = should_fail;
        }

        pub fn call_count(&self) -> u32 {
            self.chat_call_count() + self.embed_call_count()
        }

        pub fn chat_call_count(&self) -> u32 {
            *self.chat_calls.lock().unwrap()
        }

        pub fn embed_call_count(&self) -> u32 {
            *self.embed_calls.lock().unwrap()
        }

        pub fn reset_count(&self) {
            *self.chat_calls.lock().unwrap() = 0;
            *self.embed_calls.lock().unwrap() = 0;
        }

        /// 最近一次聊天请求
        pub fn last_request(&self) -> Option<ChatRequest> {
            self.requests.lock().unwrap().last().cloned()
        }

        fn fail_if_requested(&self) -> Result<()> {
            if *self.should_fail.lock().unwrap() {
                return Err(HybridRagError::AIProvider("Mock AI error".to_string()));
            }
            Ok(())
        }
    }

    /// Bag-of-words hashing embedding, L2-normalized. Texts sharing words end
    /// up close under cosine similarity.
    pub fn hash_embedding(text: &str, dimensions: usize) -> Vec<f32> {
        let mut vector = vec![0.0f32; dimensions.max(1)];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector.truncate(dimensions);
        vector
    }

    #[async_trait]
    impl hybridrag_ai::AIProvider for MockAiProvider {
        fn name(&self) -> &str {
            "mock-ai-provider"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            *self.chat_calls.lock().unwrap() += 1;
            self.requests.lock().unwrap().push(request);
            self.fail_if_requested()?;

            let content = self
                .responses
                .lock()
                .unwrap()
                .first()
                .cloned()
                .unwrap_or_else(|| "Default mock response".to_string());

            Ok(ChatResponse {
                id: "mock-chat-1".to_string(),
                model: "mock-model".to_string(),
                message: Message::assistant(content),
                usage: TokenUsage::new(10, 20),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            *self.embed_calls.lock().unwrap() += 1;
            self.fail_if_requested()?;

            Ok(EmbeddingResponse {
                embeddings: request
                    .input
                    .iter()
                    .map(|text| hash_embedding(text, self.dimensions))
                    .collect(),
                model: request.model,
                usage: TokenUsage::new(request.input.len(), 0),
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(!*self.should_fail.lock().unwrap())
        }
    }
}

pub use ai::*;

//! 答案生成

use async_trait::async_trait;
use hybridrag_ai::{AIProvider, ChatRequest, TiktokenCounter, TokenCounter};
use hybridrag_core::{Document, GenerationConfig, Message, Result};
use std::sync::Arc;

pub const NO_CONTEXT_ANSWER: &str = "I couldn't find relevant information to answer your question.";

const DEFAULT_SYSTEM_PROMPT: &str = "You answer questions about products using customer reviews. \
Use only the numbered reviews provided. Cite the numbers of the reviews you rely on, like [2]. \
If the reviews do not contain the answer, say so.";

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// 根据排好序的上下文文档回答问题
    async fn generate(&self, query: &str, context: &[Document]) -> Result<String>;
}

pub struct LlmAnswerGenerator {
    llm: Arc<dyn AIProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    max_context_tokens: usize,
    system_prompt: String,
    counter: TiktokenCounter,
}

impl LlmAnswerGenerator {
    pub fn new(llm: Arc<dyn AIProvider>, config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            llm,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_context_tokens: config.max_context_tokens,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            counter: TiktokenCounter::for_model(&config.model)?,
        })
    }

    /// Renders documents as numbered blocks until the token budget runs out.
    /// The first document is truncated rather than dropped when it alone is
    /// over budget.
    pub fn build_context(&self, context: &[Document]) -> Result<String> {
        const SEPARATOR: &str = "\n\n";
        let separator_tokens = self.counter.count(SEPARATOR);
        let mut blocks = Vec::new();
        let mut used = 0;

        for (i, document) in context.iter().enumerate() {
            let block = format!("[{}] {}", i + 1, document.content.trim());
            let mut tokens = self.counter.count(&block);
            if !blocks.is_empty() {
                tokens += separator_tokens;
            }

            if used + tokens > self.max_context_tokens {
                if blocks.is_empty() {
                    blocks.push(self.counter.truncate(&block, self.max_context_tokens)?);
                }
                tracing::debug!(
                    "Context budget of {} tokens reached after {} of {} documents",
                    self.max_context_tokens,
                    blocks.len(),
                    context.len()
                );
                break;
            }

            used += tokens;
            blocks.push(block);
        }

        Ok(blocks.join(SEPARATOR))
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn generate(&self, query: &str, context: &[Document]) -> Result<String> {
        if context.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let prompt_text = format!(
            "Reviews:\n{}\n\nQuestion: {}",
            self.build_context(context)?,
            query
        );

        let mut request = ChatRequest::new(
            self.model.clone(),
            vec![Message::system(self.system_prompt.clone()), Message::user(prompt_text)],
        );
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.llm.chat(request).await?;
        Ok(response.message.text_content().trim().to_string())
    }
}

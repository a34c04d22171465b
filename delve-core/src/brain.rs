//! Brain module — completion-service abstraction and interaction.
//!
//! Defines the `LlmProvider` trait the research stages talk to, a tiktoken
//! based `TokenCounter` used for every budget computation, and the `Brain`
//! wrapper that turns "prompt + system messages" into a request and tracks
//! usage across a run.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, StreamEvent, TokenUsage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Trait for completion providers, supporting both full and streaming completions.
///
/// Transport, authentication and retries belong to the implementor.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Perform a streaming completion, sending events to the channel.
    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), LlmError>;

    /// Return the context window size (in tokens) for this provider/model.
    ///
    /// Zero means "unknown"; the brain substitutes its configured default.
    fn context_window(&self) -> usize;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// Token counter using tiktoken-rs for accurate BPE tokenization.
pub struct TokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

impl TokenCounter {
    /// Create a token counter for the given model.
    /// Falls back to cl100k_base if the model isn't recognized.
    pub fn for_model(model: &str) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model).unwrap_or_else(|_| {
            tiktoken_rs::cl100k_base().expect("cl100k_base should be available")
        });
        Self { bpe }
    }

    /// Count the number of tokens in a string.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Count the tokens of several strings.
    pub fn count_all<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> usize {
        texts.into_iter().map(|t| self.count(t)).sum()
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter").finish_non_exhaustive()
    }
}

/// The Brain wraps an LLM provider and adds request construction, token
/// accounting, and usage tracking.
///
/// All methods take `&self` so one brain can be shared by concurrent stages.
pub struct Brain {
    provider: Arc<dyn LlmProvider>,
    token_counter: TokenCounter,
    context_window: usize,
    temperature: f32,
    total_usage: Mutex<TokenUsage>,
}

impl Brain {
    /// Fallback context window when the provider does not report one.
    pub const DEFAULT_CONTEXT_WINDOW: usize = 8192;

    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self::with_default_context_window(provider, Self::DEFAULT_CONTEXT_WINDOW)
    }

    /// Create a brain that uses `fallback_window` when the provider reports 0.
    pub fn with_default_context_window(
        provider: Arc<dyn LlmProvider>,
        fallback_window: usize,
    ) -> Self {
        let model_name = provider.model_name().to_string();
        let reported = provider.context_window();
        let context_window = if reported == 0 {
            fallback_window
        } else {
            reported
        };
        Self {
            provider,
            token_counter: TokenCounter::for_model(&model_name),
            context_window,
            temperature: 0.3,
            total_usage: Mutex::new(TokenUsage::default()),
        }
    }

    /// Override the sampling temperature for every request.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Total token budget of the active model.
    pub fn context_window(&self) -> usize {
        self.context_window
    }

    pub fn token_counter(&self) -> &TokenCounter {
        &self.token_counter
    }

    /// Count tokens in `text` with the active model's tokenizer.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.token_counter.count(text)
    }

    /// Usage accumulated over every call made through this brain.
    pub fn total_usage(&self) -> TokenUsage {
        self.total_usage
            .lock()
            .map(|usage| *usage)
            .unwrap_or_default()
    }

    /// Construct messages: system messages first, in order, then the prompt.
    pub fn build_messages(&self, prompt: &str, system_msgs: &[String]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(system_msgs.len() + 1);
        messages.extend(system_msgs.iter().map(Message::system));
        messages.push(Message::user(prompt));
        messages
    }

    /// Ask the completion service and return the reply text.
    pub async fn ask(
        &self,
        prompt: &str,
        system_msgs: &[String],
        stream: bool,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            messages: self.build_messages(prompt, system_msgs),
            temperature: self.temperature,
            ..Default::default()
        };
        self.send(request, stream).await
    }

    /// Ask with the output allowance raised to everything the prompt leaves
    /// free in the context window.
    pub async fn ask_uncapped(
        &self,
        prompt: &str,
        system_msgs: &[String],
        stream: bool,
    ) -> Result<String, LlmError> {
        let used = self.token_counter.count(prompt)
            + self
                .token_counter
                .count_all(system_msgs.iter().map(String::as_str));
        if used >= self.context_window {
            return Err(LlmError::ContextOverflow {
                used,
                limit: self.context_window,
            });
        }
        let request = CompletionRequest {
            messages: self.build_messages(prompt, system_msgs),
            temperature: self.temperature,
            max_tokens: Some(self.context_window - used),
            ..Default::default()
        };
        self.send(request, stream).await
    }

    async fn send(&self, request: CompletionRequest, stream: bool) -> Result<String, LlmError> {
        debug!(
            model = self.provider.model_name(),
            prompt_chars = request.prompt().len(),
            max_tokens = ?request.max_tokens,
            stream,
            "Sending completion request"
        );
        trace!(prompt = request.prompt(), "Prompt body");

        let (text, usage) = if stream {
            self.send_streaming(request).await?
        } else {
            let response = self.provider.complete(request).await?;
            (response.message.content, response.usage)
        };

        if let Ok(mut total) = self.total_usage.lock() {
            total.accumulate(&usage);
        }
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            reply_chars = text.len(),
            "Completion received"
        );
        Ok(text)
    }

    async fn send_streaming(
        &self,
        request: CompletionRequest,
    ) -> Result<(String, TokenUsage), LlmError> {
        let (tx, mut rx) = mpsc::channel(64);
        let producer = self.provider.complete_streaming(request, tx);
        let consumer = async {
            let mut text = String::new();
            let mut usage = TokenUsage::default();
            let mut error = None;
            while let Some(event) = rx.recv().await {
                match event {
                    StreamEvent::Token(token) => text.push_str(&token),
                    StreamEvent::Done { usage: done } => usage = done,
                    StreamEvent::Error(message) => error = Some(message),
                }
            }
            (text, usage, error)
        };
        let (result, (text, usage, error)) = tokio::join!(producer, consumer);
        result?;
        if let Some(message) = error {
            return Err(LlmError::Streaming { message });
        }
        Ok((text, usage))
    }
}

/// A reply rule for [`MockLlmProvider`]: the first rule whose needle occurs in
/// the prompt answers it.
#[derive(Debug, Clone)]
struct ReplyRule {
    needle: String,
    reply: String,
}

/// A scripted provider for tests and offline runs.
///
/// Replies are resolved in this order: the first matching `respond_when`
/// rule, then the next queued response, then the default reply. Every request
/// is recorded.
pub struct MockLlmProvider {
    model: String,
    context_window: usize,
    rules: Mutex<Vec<ReplyRule>>,
    responses: Mutex<Vec<String>>,
    default_reply: String,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            context_window: 8192,
            rules: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            default_reply: "I'm a mock LLM. No queued responses available.".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        Self {
            default_reply: text.to_string(),
            ..Self::new()
        }
    }

    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window = tokens;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Answer any prompt containing `needle` with `reply`.
    pub fn respond_when(self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(ReplyRule {
                needle: needle.into(),
                reply: reply.into(),
            });
        }
        self
    }

    /// Queue a response to be returned by the next unmatched call.
    pub fn queue_response(&self, text: impl Into<String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push(text.into());
        }
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Create a simple text response.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    fn resolve(&self, request: &CompletionRequest) -> String {
        let prompt = request.prompt();
        if let Ok(rules) = self.rules.lock() {
            if let Some(rule) = rules.iter().find(|r| prompt.contains(&r.needle)) {
                return rule.reply.clone();
            }
        }
        if let Ok(mut responses) = self.responses.lock() {
            if !responses.is_empty() {
                return responses.remove(0);
            }
        }
        self.default_reply.clone()
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let reply = self.resolve(&request);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        Ok(MockLlmProvider::text_response(&reply))
    }

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), LlmError> {
        let response = self.complete(request).await?;
        let text = response.message.content;
        let mut piece = String::new();
        for ch in text.chars() {
            piece.push(ch);
            if ch.is_whitespace() {
                let _ = tx.send(StreamEvent::Token(std::mem::take(&mut piece))).await;
            }
        }
        if !piece.is_empty() {
            let _ = tx.send(StreamEvent::Token(piece)).await;
        }
        let _ = tx
            .send(StreamEvent::Done {
                usage: response.usage,
            })
            .await;
        Ok(())
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

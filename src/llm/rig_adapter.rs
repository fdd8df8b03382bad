//! Bridge from rig-core's `CompletionModel` trait to our `LlmProvider` trait.

use async_trait::async_trait;

use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Message};

use crate::error::CollaboratorError;

use super::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Adapter wrapping any rig `CompletionModel`.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M: CompletionModel> LlmProvider for RigAdapter<M> {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CollaboratorError> {
        // System messages become the preamble; the last user message is the
        // prompt; everything in between is chat history.
        let mut preamble_parts: Vec<String> = Vec::new();
        let mut history: Vec<Message> = Vec::new();
        let mut prompt: Option<String> = None;

        for message in &request.messages {
            match message.role {
                Role::System => preamble_parts.push(message.content.clone()),
                Role::User => {
                    if let Some(previous) = prompt.take() {
                        history.push(Message::user(previous));
                    }
                    prompt = Some(message.content.clone());
                }
                Role::Assistant => {
                    if let Some(previous) = prompt.take() {
                        history.push(Message::user(previous));
                    }
                    history.push(Message::assistant(message.content.clone()));
                }
            }
        }

        let prompt = prompt.unwrap_or_default();

        let mut builder = self
            .model
            .completion_request(Message::user(prompt))
            .messages(history)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens as u64);

        if !preamble_parts.is_empty() {
            builder = builder.preamble(preamble_parts.join("\n\n"));
        }

        let response =
            builder
                .send()
                .await
                .map_err(|e| CollaboratorError::RequestFailed {
                    provider: self.model_name.clone(),
                    reason: e.to_string(),
                })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if content.is_empty() {
            return Err(CollaboratorError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "Response contained no text content".to_string(),
            });
        }

        Ok(CompletionResponse { content })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

//! Chat completion: conversation turns, the token-budget guard and the OpenAI client.

use crate::config::CompletionSettings;
use crate::error::{Result, WrenchError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Characters per token used by the budget estimate.
const CHARS_PER_TOKEN: usize = 4;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One `{role, content}` entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

fn total_chars(turns: &[ChatTurn]) -> usize {
    turns.iter().map(|t| t.content.chars().count()).sum()
}

/// Rough token count for a conversation: total characters divided by four.
pub fn estimate_tokens(turns: &[ChatTurn]) -> usize {
    total_chars(turns) / CHARS_PER_TOKEN
}

/// Halve the first turn when the conversation is over `budget` tokens.
///
/// Only the first turn (the system turn) is cut, to half its character
/// length rounded down. Returns whether a cut was made.
pub fn apply_token_budget(turns: &mut [ChatTurn], budget: usize) -> bool {
    if total_chars(turns) <= budget * CHARS_PER_TOKEN {
        return false;
    }
    let estimated = estimate_tokens(turns);

    let Some(first) = turns.first_mut() else {
        return false;
    };

    let keep = first.content.chars().count() / 2;
    let cut = first
        .content
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(first.content.len());
    first.content.truncate(cut);

    warn!(
        "Conversation estimated at {} tokens exceeds budget of {}, system turn cut to {} characters",
        estimated,
        budget,
        keep
    );
    true
}

/// A chat completion backend.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Generate a reply to the ordered turns.
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String>;
}

/// Completion through the OpenAI chat API.
pub struct OpenAICompleter {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAICompleter {
    /// Create a completer from settings.
    pub fn new(settings: &CompletionSettings) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }

    fn to_message(turn: &ChatTurn) -> Result<ChatCompletionRequestMessage> {
        let content = turn.content.clone();
        let message: std::result::Result<ChatCompletionRequestMessage, _> = match turn.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()
                .map(Into::into),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map(Into::into),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()
                .map(Into::into),
        };
        message.map_err(|e| WrenchError::Generation(e.to_string()))
    }
}

#[async_trait]
impl Completer for OpenAICompleter {
    #[instrument(skip(self, turns), fields(model = %self.model, turns = turns.len()))]
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let messages = turns
            .iter()
            .map(Self::to_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(self.max_tokens)
            .temperature(self.temperature)
            .n(1)
            .build()
            .map_err(|e| WrenchError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| WrenchError::Generation(e.to_string()))?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .ok_or_else(|| WrenchError::Generation("Empty response from model".to_string()))?
            .to_string();

        debug!("Completion returned {} characters", answer.len());
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serde_uses_lowercase_roles() {
        let json = r#"{"role": "user", "content": "spindle won't start"}"#;
        let turn: ChatTurn = serde_json::from_str(json).unwrap();
        assert_eq!(turn, ChatTurn::user("spindle won't start"));

        let out = serde_json::to_string(&ChatTurn::system("x")).unwrap();
        assert_eq!(out, r#"{"role":"system","content":"x"}"#);
    }

    #[test]
    fn test_estimate_tokens() {
        let turns = vec![ChatTurn::system("a".repeat(40)), ChatTurn::user("b".repeat(4))];
        assert_eq!(estimate_tokens(&turns), 11);
    }

    #[test]
    fn test_under_budget_is_untouched() {
        let mut turns = vec![ChatTurn::system("a".repeat(1000)), ChatTurn::user("hi")];
        assert!(!apply_token_budget(&mut turns, 15000));
        assert_eq!(turns[0].content.len(), 1000);
    }

    #[test]
    fn test_budget_boundary_is_inclusive() {
        let mut turns = vec![ChatTurn::system("a".repeat(60_000))];
        assert!(!apply_token_budget(&mut turns, 15000));

        let mut turns = vec![ChatTurn::system("a".repeat(60_001))];
        assert!(apply_token_budget(&mut turns, 15000));
        assert_eq!(turns[0].content.len(), 30_000);
    }

    #[test]
    fn test_over_budget_halves_system_turn_only() {
        let mut turns = vec![
            ChatTurn::system("s".repeat(50_001)),
            ChatTurn::user("u".repeat(20_000)),
            ChatTurn::assistant("a".repeat(100)),
        ];
        assert!(apply_token_budget(&mut turns, 15000));
        assert_eq!(turns[0].content.chars().count(), 25_000);
        assert_eq!(turns[1].content.len(), 20_000);
        assert_eq!(turns[2].content.len(), 100);
    }

    #[test]
    fn test_halving_counts_characters() {
        let mut turns = vec![ChatTurn::system("é".repeat(70_001))];
        assert!(apply_token_budget(&mut turns, 15000));
        assert_eq!(turns[0].content.chars().count(), 35_000);
    }

    #[test]
    fn test_empty_conversation() {
        let mut turns: Vec<ChatTurn> = Vec::new();
        assert!(!apply_token_budget(&mut turns, 0));
    }
}

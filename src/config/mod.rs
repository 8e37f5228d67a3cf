//! Configuration module for Wrench.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AssistantPrompts, Prompts};
pub use settings::{
    CompletionSettings, DatabaseSettings, EmbeddingSettings, GeneralSettings, PromptSettings,
    RetrievalSettings, ServerSettings, Settings, VectorStoreProvider, VectorStoreSettings,
};

//! Wrench - Machine Service-History Assistant
//!
//! Answers CNC troubleshooting questions from a machine's recorded service history.
//!
//! # Overview
//!
//! Wrench allows you to:
//! - Summarize the recent service history of a machine by model or serial
//! - Rank past service reports by similarity to a described problem
//! - Chat with a model that sees the relevant history as context
//! - Serve the same chat over HTTP
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and prompt templates
//! - `records` - Read-only access to machines, service reports and parts
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector index abstraction
//! - `indexer` - Populating the vector index from service reports
//! - `retrieval` - Keyword (recency) and semantic retrieval
//! - `rag` - Context assembly, token budget and chat completion
//! - `assistant` - Request handling and tagged outcomes
//!
//! # Example
//!
//! ```rust,no_run
//! use wrench::assistant::{Assistant, ChatRequest, ChatResponse};
//! use wrench::config::Settings;
//! use wrench::rag::ChatTurn;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let assistant = Assistant::new(&settings)?;
//!
//!     let request = ChatRequest {
//!         model: Some("VF-4".to_string()),
//!         conversation: vec![ChatTurn::user("Spindle won't start")],
//!         ..ChatRequest::default()
//!     };
//!     let outcome = assistant.chat(&request).await;
//!     println!("{}", ChatResponse::from(&outcome).response);
//!
//!     Ok(())
//! }
//! ```

pub mod assistant;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod openai;
pub mod rag;
pub mod records;
pub mod retrieval;
pub mod vector_store;

#[cfg(test)]
mod test_support;

pub use error::{Result, WrenchError};

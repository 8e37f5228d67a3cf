//! The service assistant: validates a chat request, assembles context and asks the model.

use crate::config::{Prompts, Settings, VectorStoreProvider};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, WrenchError};
use crate::indexer::Indexer;
use crate::rag::{
    apply_token_budget, AssembledContext, ChatTurn, Completer, ContextAssembler, OpenAICompleter,
};
use crate::records::{MachineFilter, RecordStore, SqliteRecordStore};
use crate::retrieval::NO_HISTORY_MESSAGE;
use crate::vector_store::{MemoryVectorStore, SqliteVectorStore, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Response text when neither model nor serial is given.
pub const MISSING_MACHINE_MESSAGE: &str =
    "Error: Please provide either a machine model or serial number.";

/// Incoming chat request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    /// Free-text problem description. Selects semantic retrieval when non-blank.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub conversation: Vec<ChatTurn>,
}

impl ChatRequest {
    pub fn filter(&self) -> MachineFilter {
        MachineFilter::new(self.model.as_deref(), self.serial.as_deref())
    }

    /// The machine filter, or `InvalidInput` when neither model nor serial is set.
    pub fn validate(&self) -> Result<MachineFilter> {
        let filter = self.filter();
        if filter.is_empty() {
            return Err(WrenchError::InvalidInput(
                "either a machine model or serial number is required".to_string(),
            ));
        }
        Ok(filter)
    }
}

/// Category of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    Connection,
    Retrieval,
    Generation,
}

impl From<&WrenchError> for ErrorKind {
    fn from(err: &WrenchError) -> Self {
        match err {
            WrenchError::Generation(_) | WrenchError::OpenAI(_) => ErrorKind::Generation,
            WrenchError::InvalidInput(_) => ErrorKind::InvalidRequest,
            e if e.is_connection_failure() => ErrorKind::Connection,
            _ => ErrorKind::Retrieval,
        }
    }
}

/// Result of one chat interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Answer(String),
    NotFound,
    Error { kind: ErrorKind, message: String },
}

impl ChatOutcome {
    fn error(kind: ErrorKind, err: &WrenchError) -> Self {
        ChatOutcome::Error {
            kind,
            message: err.to_string(),
        }
    }

    /// Text for the `response` field. Failures start with `Error`, misses with `No service`.
    pub fn response_text(&self) -> String {
        match self {
            ChatOutcome::Answer(text) => text.clone(),
            ChatOutcome::NotFound => NO_HISTORY_MESSAGE.to_string(),
            ChatOutcome::Error {
                kind: ErrorKind::InvalidRequest,
                ..
            } => MISSING_MACHINE_MESSAGE.to_string(),
            ChatOutcome::Error { message, .. } => format!("Error: {}", message),
        }
    }
}

/// Outcome status on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Ok,
    NotFound,
    Error,
}

/// Chat response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub status: ChatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub response: String,
}

impl From<&ChatOutcome> for ChatResponse {
    fn from(outcome: &ChatOutcome) -> Self {
        let (status, kind) = match outcome {
            ChatOutcome::Answer(_) => (ChatStatus::Ok, None),
            ChatOutcome::NotFound => (ChatStatus::NotFound, None),
            ChatOutcome::Error { kind, .. } => (ChatStatus::Error, Some(*kind)),
        };
        Self {
            status,
            kind,
            response: outcome.response_text(),
        }
    }
}

/// Record store, embedder and vector index opened from settings.
#[derive(Clone)]
pub struct Backends {
    pub records: Arc<dyn RecordStore>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorStore>,
}

impl Backends {
    /// Open the service database read-only and the configured vector index.
    pub fn open(settings: &Settings) -> Result<Self> {
        let records = SqliteRecordStore::open(&settings.database_path())?;

        if !settings.embedding.provider.eq_ignore_ascii_case("openai") {
            return Err(WrenchError::Config(format!(
                "Unsupported embedding provider: {}",
                settings.embedding.provider
            )));
        }
        let embedder = OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?;

        let index: Arc<dyn VectorStore> = match settings.vector_store.provider {
            VectorStoreProvider::Sqlite => {
                Arc::new(SqliteVectorStore::new(&settings.vector_store_path())?)
            }
            VectorStoreProvider::Memory => Arc::new(MemoryVectorStore::new()),
        };

        Ok(Self {
            records: Arc::new(records),
            embedder: Arc::new(embedder),
            index,
        })
    }

    /// Indexer over these backends with the configured limits.
    pub fn indexer(&self, settings: &Settings) -> Indexer {
        Indexer::new(self.records.clone(), self.embedder.clone(), self.index.clone())
            .with_min_document_chars(settings.retrieval.min_document_chars)
            .with_batch_size(settings.retrieval.index_batch_size)
    }
}

/// Answers troubleshooting conversations from the service history.
pub struct Assistant {
    prompts: Prompts,
    assembler: ContextAssembler,
    indexer: Arc<Indexer>,
    completer: Arc<dyn Completer>,
    token_budget: usize,
}

impl Assistant {
    /// Open every backend and client named in `settings`.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let backends = Backends::open(settings)?;
        let completer = Arc::new(OpenAICompleter::new(&settings.completion)?);

        info!(
            "Assistant ready (completion model {}, {} vector store)",
            settings.completion.model, settings.vector_store.provider
        );

        Ok(Self::with_components(settings, prompts, backends, completer))
    }

    /// Build an assistant over already-open components.
    pub fn with_components(
        settings: &Settings,
        prompts: Prompts,
        backends: Backends,
        completer: Arc<dyn Completer>,
    ) -> Self {
        let indexer = Arc::new(backends.indexer(settings));
        let assembler = ContextAssembler::new(
            backends.records,
            backends.embedder,
            backends.index,
            indexer.clone(),
            settings.retrieval.clone(),
        );

        Self {
            prompts,
            assembler,
            indexer,
            completer,
            token_budget: settings.completion.token_budget,
        }
    }

    /// The indexer shared with the context assembler.
    pub fn indexer(&self) -> Arc<Indexer> {
        self.indexer.clone()
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    /// Handle one chat turn. Never fails; every failure is an outcome.
    #[instrument(skip(self, request), fields(model = ?request.model, serial = ?request.serial))]
    pub async fn chat(&self, request: &ChatRequest) -> ChatOutcome {
        let filter = match request.validate() {
            Ok(filter) => filter,
            Err(e) => return ChatOutcome::error(ErrorKind::from(&e), &e),
        };

        let context = match self
            .assembler
            .assemble(&filter, request.query.as_deref())
            .await
        {
            Ok(AssembledContext::Context(context)) => context,
            Ok(AssembledContext::NotFound) => return ChatOutcome::NotFound,
            Err(e) => {
                warn!("Context assembly failed: {}", e);
                return ChatOutcome::error(ErrorKind::from(&e), &e);
            }
        };

        let mut turns = Vec::with_capacity(request.conversation.len() + 1);
        turns.push(ChatTurn::system(self.prompts.system_prompt(&context)));
        turns.extend(request.conversation.iter().cloned());
        apply_token_budget(&mut turns, self.token_budget);

        match self.completer.complete(&turns).await {
            Ok(answer) => ChatOutcome::Answer(answer),
            Err(e) => {
                warn!("Completion failed: {}", e);
                ChatOutcome::error(ErrorKind::Generation, &e)
            }
        }
    }
}

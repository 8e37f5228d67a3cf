//! Retrieval-augmented generation over the service history.
//!
//! [`ContextAssembler`] turns a machine filter and optional problem
//! description into the context block of the system turn; the
//! [`completion`] module bounds the conversation and sends it to the model.

pub mod completion;
pub mod context;

pub use completion::{
    apply_token_budget, ChatTurn, Completer, OpenAICompleter, Role,
};
pub use context::{AssembledContext, ContextAssembler};

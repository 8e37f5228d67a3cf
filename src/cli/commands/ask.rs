//! Ask command implementation.

use crate::assistant::{Assistant, ChatOutcome, ChatRequest};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::ChatTurn;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    symptoms: &str,
    model: Option<String>,
    serial: Option<String>,
    query: Option<String>,
    keyword_only: bool,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'wrench doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let assistant = Assistant::new(&settings)?;

    let model_label = model
        .clone()
        .or_else(|| serial.as_ref().map(|s| format!("serial {}", s)))
        .unwrap_or_else(|| "unknown".to_string());
    let user_turn = assistant.prompts().ask_prompt(&model_label, symptoms);

    let request = ChatRequest {
        model,
        serial,
        query: if keyword_only {
            None
        } else {
            query.or_else(|| Some(symptoms.to_string()))
        },
        conversation: vec![ChatTurn::user(user_turn)],
    };

    let spinner = Output::spinner("Reviewing service history...");
    let outcome = assistant.chat(&request).await;
    spinner.finish_and_clear();

    print_outcome(&outcome)
}

/// Print an outcome, turning failures into a command error.
pub(super) fn print_outcome(outcome: &ChatOutcome) -> Result<()> {
    match outcome {
        ChatOutcome::Answer(answer) => {
            println!("\n{}\n", answer);
            Ok(())
        }
        ChatOutcome::NotFound => {
            Output::warning(&outcome.response_text());
            Ok(())
        }
        ChatOutcome::Error { .. } => {
            let text = outcome.response_text();
            Output::error(&text);
            Err(anyhow::anyhow!(text))
        }
    }
}

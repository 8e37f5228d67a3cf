//! Interactive troubleshooting session.

use crate::assistant::{Assistant, ChatOutcome, ChatRequest};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::ChatTurn;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Turns kept from earlier in the session.
const MAX_HISTORY_TURNS: usize = 20;

/// Run the interactive chat command.
pub async fn run_chat(
    model: Option<String>,
    serial: Option<String>,
    semantic: bool,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'wrench doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let assistant = Assistant::new(&settings)?;
    let mut session = ChatSession::new(model, serial, semantic);

    let machine = [session.model.as_deref(), session.serial.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" / ");
    println!("\n{} {}", style("Wrench Chat").bold().cyan(), style(machine).bold());
    println!(
        "{}\n",
        style("Describe the problem, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            session.clear();
            Output::info("Conversation history cleared.");
            continue;
        }

        let request = session.request(input);
        let spinner = Output::spinner("Thinking...");
        let outcome = assistant.chat(&request).await;
        spinner.finish_and_clear();

        match &outcome {
            ChatOutcome::Answer(answer) => {
                println!("\n{} {}\n", style("Wrench:").cyan().bold(), answer);
                session.record(input, answer);
            }
            ChatOutcome::NotFound => {
                Output::warning(&outcome.response_text());
                Output::info("Check the model or serial and start a new session.");
                break;
            }
            ChatOutcome::Error { .. } => {
                Output::error(&outcome.response_text());
            }
        }
    }

    Ok(())
}

/// Conversation state for one machine.
struct ChatSession {
    model: Option<String>,
    serial: Option<String>,
    semantic: bool,
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    fn new(model: Option<String>, serial: Option<String>, semantic: bool) -> Self {
        Self {
            model,
            serial,
            semantic,
            turns: Vec::new(),
        }
    }

    /// Request carrying the history plus the new message.
    fn request(&self, message: &str) -> ChatRequest {
        let mut conversation = self.turns.clone();
        conversation.push(ChatTurn::user(message));

        ChatRequest {
            model: self.model.clone(),
            serial: self.serial.clone(),
            query: self.semantic.then(|| message.to_string()),
            conversation,
        }
    }

    /// Keep an answered exchange, dropping the oldest turns past the cap.
    fn record(&mut self, message: &str, answer: &str) {
        self.turns.push(ChatTurn::user(message));
        self.turns.push(ChatTurn::assistant(answer));
        if self.turns.len() > MAX_HISTORY_TURNS {
            let excess = self.turns.len() - MAX_HISTORY_TURNS;
            self.turns.drain(..excess);
        }
    }

    fn clear(&mut self) {
        self.turns.clear();
    }
}

//! Prompt templates for Wrench.
//!
//! Prompts can be customized by placing an `assistant.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub assistant: AssistantPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the service assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantPrompts {
    /// System turn. `{{context}}` receives the assembled service history.
    pub system: String,
    /// User turn for one-shot questions. Uses `{{model}}` and `{{symptoms}}`.
    pub ask_user: String,
}

impl Default for AssistantPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a specialized Haas CNC service assistant with deep knowledge of CNC machinery maintenance and repair.
Your responses should:
1. Analyze the service history to identify patterns and recurring issues
2. Consider the machine's age and maintenance history when providing recommendations
3. Reference specific parts and procedures from past successful repairs
4. Provide step-by-step troubleshooting guidance
5. Suggest preventive maintenance based on historical issues

Use the following service history and related information to provide detailed, actionable recommendations:

{{context}}"#
                .to_string(),

            ask_user: r#"Machine Model: {{model}}
User Reported Symptoms: {{symptoms}}

Please analyze the above information and provide a detailed troubleshooting summary, including likely issues, recommended solutions, and any relevant parts information."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let assistant_path = custom_path.join("assistant.toml");
            if assistant_path.exists() {
                let content = std::fs::read_to_string(&assistant_path)?;
                prompts.assistant = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are substituted in one left-to-right pass, so `{{...}}`
    /// inside a substituted value is never expanded. Unknown placeholders are
    /// kept as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                result.push_str(&rest[start..]);
                return result;
            };

            let key = &after[..end];
            match vars.get(key) {
                Some(value) => result.push_str(value),
                None => result.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after[end + 2..];
        }

        result.push_str(rest);
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Render the system turn around an assembled context block.
    pub fn system_prompt(&self, context: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), context.to_string());
        self.render_with_custom(&self.assistant.system, &vars)
    }

    /// Render the one-shot user turn.
    pub fn ask_prompt(&self, model: &str, symptoms: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("model".to_string(), model.to_string());
        vars.insert("symptoms".to_string(), symptoms.to_string());
        self.render_with_custom(&self.assistant.ask_user, &vars)
    }
}

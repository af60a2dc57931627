//! Prompt command handler.
//!
//! Renders the context prompt for the configured codebase and prints it.

use super::parse_vars;
use clap::Args;
use codeprompt_core::{config::AppConfig, AppResult};
use codeprompt_engine::{log_markup, Orchestrator};
use codeprompt_template::Template;
use std::path::PathBuf;

/// Print the rendered context prompt
#[derive(Args, Debug)]
pub struct PromptCommand {
    /// Extra template variables as a JSON object
    #[arg(long)]
    pub vars: Option<String>,

    /// Write the prompt to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl PromptCommand {
    /// Execute the prompt command.
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompt command");

        let template = Template::load(config.template.as_deref(), None)?;
        let variables = parse_vars(self.vars.as_deref())?;

        let orchestrator = Orchestrator::new(config.clone());
        let prompt = orchestrator.generate_context_prompt(&template, variables)?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, &prompt.rendered)?;
                log_markup(
                    &format!("Prompt written to *{}", path.display()),
                    !config.no_color,
                );
            }
            None => println!("{}", prompt.rendered),
        }

        Ok(())
    }
}

//! Run command handler.
//!
//! Executes a template end to end: pre-phase code blocks, the model step
//! for a non-blank rendering, then post-phase blocks.

use super::parse_vars;
use clap::Args;
use codeprompt_core::{config::AppConfig, AppResult};
use codeprompt_engine::{log_markup, Orchestrator};
use codeprompt_template::Template;
use serde_json::Value;

/// Execute a template end to end
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Extra template variables as a JSON object
    #[arg(long)]
    pub vars: Option<String>,

    /// Print the full final context instead of just the model payload
    #[arg(long)]
    pub full_context: bool,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing run command");

        let template = Template::load(config.template.as_deref(), None)?;
        let variables = parse_vars(self.vars.as_deref())?;

        let mut orchestrator = Orchestrator::new(config.clone());

        log_markup("Running template against *your codebase", !config.no_color);
        let context = orchestrator.run_template(&template, variables).await?;

        if self.full_context {
            println!("{}", serde_json::to_string_pretty(&context.to_json())?);
            return Ok(());
        }

        match context.get("schema") {
            Some(Value::String(text)) => println!("{}", text),
            Some(structured) => println!("{}", serde_json::to_string_pretty(structured)?),
            None => log_markup("#Done (no model payload bound)", !config.no_color),
        }

        Ok(())
    }
}

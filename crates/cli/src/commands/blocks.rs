//! Blocks command handler.
//!
//! Lists the code blocks a template declares, with phase and runtime
//! classification.

use clap::Args;
use codeprompt_core::{config::AppConfig, AppResult};
use codeprompt_template::Template;
use serde_json::json;

/// List the code blocks extracted from a template
#[derive(Args, Debug)]
pub struct BlocksCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BlocksCommand {
    /// Execute the blocks command.
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing blocks command");

        let template = Template::load(config.template.as_deref(), None)?;
        let blocks = template.blocks();

        if self.json {
            let listing: Vec<_> = blocks
                .iter()
                .map(|block| {
                    json!({
                        "tag": block.tag,
                        "phase": format!("{:?}", block.phase).to_lowercase(),
                        "runtime": block.runtime.map(|r| format!("{:?}", r).to_lowercase()),
                        "lines": block.source.lines().count(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
            return Ok(());
        }

        if blocks.is_empty() {
            println!("No code blocks in this template.");
            return Ok(());
        }

        for (index, block) in blocks.iter().enumerate() {
            let runtime = block
                .runtime
                .map(|r| format!("{:?}", r).to_lowercase())
                .unwrap_or_else(|| "inert".to_string());
            println!(
                "{:>3}. [{}] {:?} {} ({} line(s))",
                index + 1,
                block.tag,
                block.phase,
                runtime,
                block.source.lines().count()
            );
        }

        Ok(())
    }
}

//! Ask command handler.
//!
//! Asks a question against the full codebase context and prints the
//! normalized answer.

use super::parse_vars;
use clap::Args;
use codeprompt_core::{config::AppConfig, AppError, AppResult};
use codeprompt_engine::{log_markup, Orchestrator, RequestOptions};
use codeprompt_template::{SchemaNode, Template};
use serde_json::Value;
use std::path::PathBuf;

/// Ask a question against the full codebase context
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// JSON example file; the answer must match its synthesized schema
    #[arg(long)]
    pub schema_example: Option<PathBuf>,

    /// Extra template variables as a JSON object
    #[arg(long)]
    pub vars: Option<String>,

    /// Record the exchange under this QA session name
    #[arg(long)]
    pub record: Option<String>,

    /// Attach raw context and extracted code blocks to JSON output
    #[arg(long)]
    pub meta: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let question = self.read_question()?;
        let schema = self.read_schema()?;
        let variables = parse_vars(self.vars.as_deref())?;

        let template = Template::load(config.template.as_deref(), None)?;
        let mut orchestrator = Orchestrator::new(config.clone());

        if let Some(name) = &self.record {
            orchestrator.record_qa(name.clone());
        }

        log_markup("Asking the model about *your codebase", !config.no_color);

        let options = RequestOptions {
            meta: self.meta,
            custom_context: None,
            variables,
        };
        let answer = orchestrator
            .request(&question, &template, schema.as_ref(), &options)
            .await?
            .ok_or_else(|| {
                AppError::Config(
                    "No LLM provider available for this prompt; set OPENAI_API_KEY, \
                     ANTHROPIC_API_KEY or GROQ_API_KEY, or shrink the context"
                        .to_string(),
                )
            })?;

        if self.json {
            let mut doc = serde_json::Map::new();
            doc.insert("data".to_string(), answer.data);
            doc.insert("usage".to_string(), serde_json::to_value(&answer.usage)?);
            if let Some(context) = answer.context {
                doc.insert("context".to_string(), context);
            }
            if let Some(blocks) = answer.code_blocks {
                doc.insert("codeBlocks".to_string(), serde_json::to_value(&blocks)?);
            }
            println!("{}", serde_json::to_string_pretty(&Value::Object(doc))?);
        } else {
            match answer.data {
                Value::String(text) => println!("{}", text),
                structured => println!("{}", serde_json::to_string_pretty(&structured)?),
            }
        }

        Ok(())
    }

    fn read_question(&self) -> AppResult<String> {
        if let Some(question) = &self.question {
            return Ok(question.clone());
        }
        if let Some(path) = &self.file {
            return Ok(std::fs::read_to_string(path)?.trim().to_string());
        }
        Err(AppError::Config("No question provided".to_string()))
    }

    fn read_schema(&self) -> AppResult<Option<SchemaNode>> {
        let Some(path) = &self.schema_example else {
            return Ok(None);
        };
        let example: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        Ok(Some(SchemaNode::synthesize(&example)))
    }
}

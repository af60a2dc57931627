//! End-to-end request orchestration.
//!
//! The orchestrator ties the pieces together: scan the codebase, assemble
//! the context, render the template, run the two execution phases, and
//! issue provider-backed completions. Provider and credential state is
//! per-orchestrator; nothing global.

use crate::assembler::assemble_context;
use crate::session::SessionStore;
use codeprompt_core::{AppConfig, AppError, AppResult};
use codeprompt_exec::{ExecutionContext, ExecutionEngine, ScriptBridge, ShellOptions};
use codeprompt_llm::{
    complete, create_client, select_provider, Completion, Credentials, LlmClient, Provider, Usage,
};
use codeprompt_scan::Scanner;
use codeprompt_template::{extract_fences, CodeBlock, SchemaNode, Template};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Options for a single [`Orchestrator::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Attach the raw context and the answer's code blocks to the result
    pub meta: bool,

    /// Use this context instead of scanning the configured codebase
    pub custom_context: Option<Value>,

    /// Extra template variables (caller values win over computed defaults)
    pub variables: Option<Value>,
}

/// A normalized answer from a full-context request.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Schema-shaped payload, or the raw text as a JSON string
    pub data: Value,

    /// Token usage reported by the provider
    pub usage: Usage,

    /// Raw context the prompt was built from (with `meta`)
    pub context: Option<Value>,

    /// Code blocks extracted from a textual answer (with `meta`)
    pub code_blocks: Option<Vec<CodeBlock>>,
}

/// The rendered context prompt together with the context it came from.
#[derive(Debug, Clone)]
pub struct ContextPrompt {
    pub context: ExecutionContext,
    pub rendered: String,
}

/// Provider-call routing shared between the orchestrator and the
/// bridge handler handed to scripted blocks.
#[derive(Clone)]
struct Dispatcher {
    credentials: Credentials,
    preferences: Vec<Provider>,
    client_override: Option<Arc<dyn LlmClient>>,
}

impl Dispatcher {
    /// Run one provider-backed completion for `prompt`.
    async fn dispatch(
        &self,
        prompt: &str,
        schema: Option<&SchemaNode>,
    ) -> AppResult<Option<Completion>> {
        if let Some(client) = &self.client_override {
            let completion = complete(client.as_ref(), "override", prompt, schema).await?;
            return Ok(Some(completion));
        }

        let Some(choice) = select_provider(prompt, &self.preferences, &self.credentials) else {
            tracing::warn!("No provider qualifies for this prompt, yielding no answer");
            return Ok(None);
        };

        let client = create_client(&choice, &self.credentials)?;
        let completion = complete(client.as_ref(), &choice.model_id, prompt, schema).await?;
        Ok(Some(completion))
    }
}

/// Services the bridge calls a scripted block may make: `query_llm`,
/// `request` and `extract_code_blocks`.
struct BlockBridge {
    dispatcher: Dispatcher,
    context_prompt: String,
    schema: Option<SchemaNode>,
}

impl BlockBridge {
    fn arg_str(args: &[Value], name: &str) -> AppResult<String> {
        args.first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::execution(format!("Bridge call '{}' expects a string argument", name))
            })
    }
}

#[async_trait::async_trait]
impl ScriptBridge for BlockBridge {
    async fn call(&self, name: &str, args: Vec<Value>) -> AppResult<Value> {
        match name {
            "query_llm" => {
                let prompt = Self::arg_str(&args, name)?;
                let completion = self.dispatcher.dispatch(&prompt, None).await?;
                Ok(completion.map(|c| c.data).unwrap_or(Value::Null))
            }
            "request" => {
                let question = Self::arg_str(&args, name)?;
                let prompt =
                    format!("{}\n\n# {}", self.context_prompt.trim_end(), question);
                let completion = self
                    .dispatcher
                    .dispatch(&prompt, self.schema.as_ref())
                    .await?;
                Ok(completion.map(|c| c.data).unwrap_or(Value::Null))
            }
            "extract_code_blocks" => {
                let text = Self::arg_str(&args, name)?;
                let blocks: Vec<CodeBlock> = extract_fences(&text)
                    .into_iter()
                    .map(|fence| CodeBlock::from_fence(fence.tag, fence.body))
                    .collect();
                Ok(serde_json::to_value(blocks)?)
            }
            other => Err(AppError::execution(format!(
                "Unknown bridge call '{}'",
                other
            ))),
        }
    }
}

/// Coordinates scanning, templating, execution and provider calls.
pub struct Orchestrator {
    config: AppConfig,
    dispatcher: Dispatcher,
    engine: ExecutionEngine,
    sessions: SessionStore,
}

impl Orchestrator {
    /// Build an orchestrator from the application configuration,
    /// reading provider credentials from the environment.
    pub fn new(config: AppConfig) -> Self {
        Self::with_credentials(config, Credentials::from_env())
    }

    /// Build an orchestrator with explicit credentials.
    pub fn with_credentials(config: AppConfig, credentials: Credentials) -> Self {
        let preferences: Vec<Provider> = config
            .provider_preferences
            .iter()
            .filter_map(|name| {
                let parsed = Provider::parse(name);
                if parsed.is_none() {
                    tracing::warn!("Ignoring unknown provider preference '{}'", name);
                }
                parsed
            })
            .collect();

        let shell = ShellOptions {
            workdir: Some(config.path.clone()),
            strict_vars: config.strict_shell_vars,
            timeout: config.shell_timeout_secs.map(Duration::from_secs),
            ..ShellOptions::default()
        };
        let engine = ExecutionEngine::new(Some(config.path.clone()), shell);

        Self {
            config,
            dispatcher: Dispatcher {
                credentials,
                preferences,
                client_override: None,
            },
            engine,
            sessions: SessionStore::new(),
        }
    }

    /// Route every provider call through `client` instead of the factory.
    pub fn with_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.dispatcher.client_override = Some(client);
        self
    }

    /// Scan the configured codebase and render `template` against the
    /// assembled context.
    pub fn generate_context_prompt(
        &self,
        template: &Template,
        variables: Option<Value>,
    ) -> AppResult<ContextPrompt> {
        let scan = Scanner::from_config(&self.config).scan(&self.config.path)?;
        let context = assemble_context(&scan, variables.unwrap_or(Value::Null))?;
        let rendered = template.render(&context.to_json())?;
        Ok(ContextPrompt { context, rendered })
    }

    /// Ask a question against the full codebase context.
    ///
    /// Returns `Ok(None)` when no provider has both a credential and the
    /// token budget for the assembled prompt; that is a degraded outcome,
    /// not an error.
    pub async fn request(
        &mut self,
        question: &str,
        template: &Template,
        schema: Option<&SchemaNode>,
        options: &RequestOptions,
    ) -> AppResult<Option<Answer>> {
        let (context_json, rendered) = match &options.custom_context {
            Some(custom) => (custom.clone(), None),
            None => {
                let prompt =
                    self.generate_context_prompt(template, options.variables.clone())?;
                (prompt.context.to_json(), Some(prompt.rendered))
            }
        };

        // With a custom context only the question is sent; the context
        // travels back via `meta`, never inlined into the prompt.
        let full_prompt = match &rendered {
            Some(rendered) => format!("{}\n\n# {}", rendered.trim_end(), question),
            None => question.to_string(),
        };

        let Some(completion) = self.dispatch(&full_prompt, schema).await? else {
            return Ok(None);
        };

        let answer_text = match &completion.data {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        self.sessions.append(question, answer_text);

        let (meta_context, code_blocks) = if options.meta {
            let blocks = match &completion.data {
                Value::String(text) => Some(
                    extract_fences(text)
                        .into_iter()
                        .map(|fence| CodeBlock::from_fence(fence.tag, fence.body))
                        .collect(),
                ),
                _ => None,
            };
            (Some(context_json), blocks)
        } else {
            (None, None)
        };

        Ok(Some(Answer {
            data: completion.data,
            usage: completion.usage,
            context: meta_context,
            code_blocks,
        }))
    }

    /// Issue a completion without any codebase context.
    pub async fn query_llm(
        &self,
        prompt: &str,
        schema: Option<&SchemaNode>,
    ) -> AppResult<Option<Completion>> {
        self.dispatch(prompt, schema).await
    }

    /// Execute a template end to end.
    ///
    /// Assembles the context, runs the `pre` phase, issues the LLM request
    /// for a non-blank rendering (binding its payload as `schema`), then
    /// runs the `post` phase. Returns the final context.
    pub async fn run_template(
        &mut self,
        template: &Template,
        variables: Option<Value>,
    ) -> AppResult<ExecutionContext> {
        use codeprompt_template::Phase;

        let scan = Scanner::from_config(&self.config).scan(&self.config.path)?;
        let mut context = assemble_context(&scan, variables.unwrap_or(Value::Null))?;

        // Scripted blocks get the callable bridges, with `request`
        // grounded in the context as initially assembled.
        let bridge = Arc::new(BlockBridge {
            dispatcher: self.dispatcher.clone(),
            context_prompt: template.render(&context.to_json())?,
            schema: template.schema().cloned(),
        });
        let engine = self.engine.clone().with_bridge(bridge);

        engine
            .run_phase(Phase::Pre, template.blocks(), &mut context)
            .await?;

        let rendered = template.render(&context.to_json())?;
        if !rendered.trim().is_empty() {
            match self.dispatch(&rendered, template.schema()).await? {
                Some(completion) => context.insert("schema", completion.data),
                None => tracing::warn!("No provider available, skipping the model step"),
            }
        } else {
            tracing::debug!("Rendered template is blank, skipping the model step");
        }

        engine
            .run_phase(Phase::Post, template.blocks(), &mut context)
            .await?;

        Ok(context)
    }

    /// Parse arbitrary text (e.g. a model answer) into classified code
    /// blocks.
    pub fn extract_code_blocks(&self, text: &str) -> Vec<CodeBlock> {
        extract_fences(text)
            .into_iter()
            .map(|fence| CodeBlock::from_fence(fence.tag, fence.body))
            .collect()
    }

    /// Start recording question/answer pairs under `name`.
    pub fn record_qa(&mut self, name: impl Into<String>) {
        self.sessions.record_qa(name);
    }

    /// Stop recording question/answer pairs.
    pub fn stop_recording(&mut self) {
        self.sessions.stop_recording();
    }

    /// The recorded log for session `name`.
    pub fn qa_log(&self, name: &str) -> &[crate::session::QaEntry] {
        self.sessions.qa_log(name)
    }

    /// Run one provider-backed completion for `prompt`.
    async fn dispatch(
        &self,
        prompt: &str,
        schema: Option<&SchemaNode>,
    ) -> AppResult<Option<Completion>> {
        self.dispatcher.dispatch(prompt, schema).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeprompt_core::AppError;
    use codeprompt_llm::{ChatRequest, ChatResponse};
    use serde_json::json;
    use std::io::Write as _;

    struct CannedClient {
        content: String,
        prompts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl LlmClient for CannedClient {
        fn provider_name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(ChatResponse {
                content: self.content.clone(),
                model: request.model.clone(),
                usage: Usage::new(10, 5),
            })
        }
    }

    fn workspace() -> (tempfile::TempDir, AppConfig) {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("main.rs")).unwrap();
        writeln!(file, "fn main() {{}}").unwrap();

        let config = AppConfig {
            path: dir.path().to_path_buf(),
            provider_preferences: vec!["openai".to_string()],
            ..AppConfig::default()
        };
        (dir, config)
    }

    fn capture(content: &str) -> Arc<CannedClient> {
        Arc::new(CannedClient {
            content: content.to_string(),
            prompts: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn canned(content: &str) -> Arc<dyn LlmClient> {
        capture(content)
    }

    fn node_available() -> bool {
        std::process::Command::new("node")
            .arg("--version")
            .output()
            .is_ok()
    }

    #[test]
    fn test_generate_context_prompt_includes_scan() {
        let (_dir, config) = workspace();
        let orchestrator = Orchestrator::with_credentials(config, Credentials::default());
        let template = Template::load(None, None).unwrap();

        let prompt = orchestrator.generate_context_prompt(&template, None).unwrap();
        assert!(prompt.rendered.contains("main.rs"));
        assert!(prompt.context.contains_key("source_tree"));
    }

    #[tokio::test]
    async fn test_request_without_credentials_is_none() {
        let (_dir, config) = workspace();
        let mut orchestrator = Orchestrator::with_credentials(config, Credentials::default());
        let template = Template::load(None, None).unwrap();

        let answer = orchestrator
            .request("What does this do?", &template, None, &RequestOptions::default())
            .await
            .unwrap();
        assert!(answer.is_none());
    }

    #[tokio::test]
    async fn test_request_records_active_session() {
        let (_dir, config) = workspace();
        let mut orchestrator = Orchestrator::with_credentials(config, Credentials::default())
            .with_client(canned("the entry point is main"));
        let template = Template::load(None, None).unwrap();

        orchestrator.record_qa("tour");
        let answer = orchestrator
            .request("Where does it start?", &template, None, &RequestOptions::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(answer.data, json!("the entry point is main"));
        let log = orchestrator.qa_log("tour");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].question, "Where does it start?");
        assert_eq!(log[0].answer, "the entry point is main");
    }

    #[tokio::test]
    async fn test_request_meta_attaches_context_and_blocks() {
        let (_dir, config) = workspace();
        let mut orchestrator = Orchestrator::with_credentials(config, Credentials::default())
            .with_client(canned("Use this:\n```bash\nls\n```\n"));
        let template = Template::load(None, None).unwrap();

        let options = RequestOptions {
            meta: true,
            ..RequestOptions::default()
        };
        let answer = orchestrator
            .request("How do I list files?", &template, None, &options)
            .await
            .unwrap()
            .unwrap();

        let context = answer.context.unwrap();
        assert!(context.get("source_tree").is_some());
        let blocks = answer.code_blocks.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].source.trim(), "ls");
    }

    #[tokio::test]
    async fn test_request_with_schema_validates_payload() {
        let (_dir, config) = workspace();
        let schema = SchemaNode::synthesize(&json!({"language": "main language"}));

        let mut good = Orchestrator::with_credentials(config.clone(), Credentials::default())
            .with_client(canned("{\"language\": \"rust\"}"));
        let template = Template::load(None, None).unwrap();
        let answer = good
            .request("Which language?", &template, Some(&schema), &RequestOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(answer.data, json!({"language": "rust"}));

        let mut bad = Orchestrator::with_credentials(config, Credentials::default())
            .with_client(canned("not json at all"));
        let result = bad
            .request("Which language?", &template, Some(&schema), &RequestOptions::default())
            .await;
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_run_template_binds_schema_and_runs_post_phase() {
        let (dir, config) = workspace();
        let template_text = "\
Summarize {{absolute_code_path}}.

```schema
{\"summary\": \"one line\"}
```

```bash
echo \"post ran\" > marker.txt
```
";
        std::fs::write(dir.path().join("answer.hbs"), template_text).unwrap();

        let mut orchestrator = Orchestrator::with_credentials(config, Credentials::default())
            .with_client(canned("{\"summary\": \"a tiny binary\"}"));
        let template =
            Template::load(Some(&dir.path().join("answer.hbs")), None).unwrap();

        let context = orchestrator.run_template(&template, None).await.unwrap();
        assert_eq!(
            context.get("schema"),
            Some(&json!({"summary": "a tiny binary"}))
        );
        assert!(dir.path().join("marker.txt").exists());
    }

    #[tokio::test]
    async fn test_run_template_without_provider_still_runs_phases() {
        let (dir, config) = workspace();
        std::fs::write(
            dir.path().join("t.hbs"),
            "Context for {{absolute_code_path}}\n\n```bash:pre\necho hi > pre.txt\n```\n",
        )
        .unwrap();

        let mut orchestrator = Orchestrator::with_credentials(config, Credentials::default());
        let template = Template::load(Some(&dir.path().join("t.hbs")), None).unwrap();

        let context = orchestrator.run_template(&template, None).await.unwrap();
        assert!(dir.path().join("pre.txt").exists());
        assert!(context.get("schema").is_none());
    }

    #[tokio::test]
    async fn test_request_joins_context_and_question_with_heading() {
        let (_dir, config) = workspace();
        let client = capture("fine");
        let mut orchestrator = Orchestrator::with_credentials(config, Credentials::default())
            .with_client(client.clone());
        let template = Template::load(None, None).unwrap();

        orchestrator
            .request("Where does it start?", &template, None, &RequestOptions::default())
            .await
            .unwrap()
            .unwrap();

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("\n\n# Where does it start?"));
    }

    #[tokio::test]
    async fn test_request_custom_context_sends_only_the_question() {
        let (_dir, config) = workspace();
        let client = capture("fine");
        let mut orchestrator = Orchestrator::with_credentials(config, Credentials::default())
            .with_client(client.clone());
        let template = Template::load(None, None).unwrap();

        let options = RequestOptions {
            meta: true,
            custom_context: Some(json!({"notes": "keep this out of the prompt"})),
            ..RequestOptions::default()
        };
        let answer = orchestrator
            .request("Summarize the notes.", &template, None, &options)
            .await
            .unwrap()
            .unwrap();

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts[0], "Summarize the notes.");
        // The context comes back through meta instead
        assert_eq!(
            answer.context,
            Some(json!({"notes": "keep this out of the prompt"}))
        );
    }

    #[tokio::test]
    async fn test_run_template_blocks_can_call_the_model() {
        if !node_available() {
            return;
        }
        let (dir, config) = workspace();
        std::fs::write(
            dir.path().join("t.hbs"),
            "```js:pre\nreturn { reply: await queryLLM(\"ping\") };\n```\n",
        )
        .unwrap();

        let mut orchestrator = Orchestrator::with_credentials(config, Credentials::default())
            .with_client(canned("pong"));
        let template = Template::load(Some(&dir.path().join("t.hbs")), None).unwrap();

        let context = orchestrator.run_template(&template, None).await.unwrap();
        assert_eq!(context.get("reply"), Some(&json!("pong")));
    }

    #[test]
    fn test_extract_code_blocks_from_answer_text() {
        let (_dir, config) = workspace();
        let orchestrator = Orchestrator::with_credentials(config, Credentials::default());
        let blocks = orchestrator
            .extract_code_blocks("Run:\n```bash\nmake test\n```\nthen read it.");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].tag, "bash");
    }
}

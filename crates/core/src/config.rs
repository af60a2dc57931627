//! Configuration management for codeprompt.
//!
//! Configuration merges from multiple sources, lowest precedence first:
//! defaults, a YAML config file (`.codeprompt.yaml` in the scan root),
//! environment variables, and finally CLI flag overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of the codebase to scan
    pub path: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Optional prompt template path (None = built-in default template)
    pub template: Option<PathBuf>,

    /// File extensions to include (empty = all)
    pub extensions: Vec<String>,

    /// Glob patterns to exclude from the scan
    pub ignore: Vec<String>,

    /// Per-file byte ceiling for scanned content (None = unlimited)
    pub max_bytes_per_file: Option<usize>,

    /// Ranked provider preference list (e.g. ["openai", "anthropic", "groq"])
    pub provider_preferences: Vec<String>,

    /// Error on unresolved `{ident}` placeholders in shell blocks
    /// instead of leaving them literal
    pub strict_shell_vars: bool,

    /// Optional timeout for shell code blocks, in seconds
    pub shell_timeout_secs: Option<u64>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    scan: Option<ScanSection>,
    llm: Option<LlmSection>,
    shell: Option<ShellSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ScanSection {
    path: Option<String>,
    template: Option<String>,
    extensions: Option<Vec<String>>,
    ignore: Option<Vec<String>>,
    #[serde(rename = "maxBytesPerFile")]
    max_bytes_per_file: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LlmSection {
    #[serde(rename = "providerPreferences")]
    provider_preferences: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ShellSection {
    #[serde(rename = "strictVars")]
    strict_vars: Option<bool>,
    #[serde(rename = "timeoutSecs")]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            config_file: None,
            template: None,
            extensions: Vec::new(),
            ignore: vec!["**/node_modules/**".to_string(), "**/target/**".to_string()],
            max_bytes_per_file: Some(8192),
            provider_preferences: vec![
                "openai".to_string(),
                "anthropic".to_string(),
                "groq".to_string(),
            ],
            strict_shell_vars: false,
            shell_timeout_secs: None,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `CODEPROMPT_PATH`: scan root
    /// - `CODEPROMPT_CONFIG`: path to config file
    /// - `CODEPROMPT_TEMPLATE`: prompt template path
    /// - `RUST_LOG`: log level
    /// - `NO_COLOR`: disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("CODEPROMPT_PATH") {
            config.path = PathBuf::from(path);
        }

        if let Ok(config_file) = std::env::var("CODEPROMPT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if let Ok(template) = std::env::var("CODEPROMPT_TEMPLATE") {
            config.template = Some(PathBuf::from(template));
        }

        if !config.path.exists() {
            return Err(AppError::Config(format!(
                "Scan root does not exist: {:?}",
                config.path
            )));
        }

        // Load from YAML config file if it exists
        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.path.join(".codeprompt.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge an explicitly named YAML configuration file into this
    /// config (the `--config` flag). Flag overrides still apply on top.
    pub fn with_config_file(mut self, path: &Path) -> AppResult<Self> {
        self.config_file = Some(path.to_path_buf());
        self.merge_yaml(path)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(scan) = config_file.scan {
            if let Some(path) = scan.path {
                result.path = PathBuf::from(path);
            }
            if let Some(template) = scan.template {
                result.template = Some(PathBuf::from(template));
            }
            if let Some(extensions) = scan.extensions {
                result.extensions = extensions;
            }
            if let Some(ignore) = scan.ignore {
                result.ignore = ignore;
            }
            if let Some(max_bytes) = scan.max_bytes_per_file {
                result.max_bytes_per_file = Some(max_bytes);
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(preferences) = llm.provider_preferences {
                result.provider_preferences = preferences;
            }
        }

        if let Some(shell) = config_file.shell {
            if let Some(strict) = shell.strict_vars {
                result.strict_shell_vars = strict;
            }
            if let Some(timeout) = shell.timeout_secs {
                result.shell_timeout_secs = Some(timeout);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and file
    /// configuration.
    pub fn with_overrides(
        mut self,
        path: Option<PathBuf>,
        template: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(path) = path {
            self.path = path;
        }

        if let Some(template) = template {
            self.template = Some(template);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.path, PathBuf::from("."));
        assert_eq!(config.max_bytes_per_file, Some(8192));
        assert_eq!(
            config.provider_preferences,
            vec!["openai", "anthropic", "groq"]
        );
        assert!(!config.strict_shell_vars);
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            Some(PathBuf::from("/tmp")),
            None,
            None,
            true,
            true,
        );

        assert_eq!(overridden.path, PathBuf::from("/tmp"));
        assert!(overridden.verbose);
        assert!(overridden.no_color);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(".codeprompt.yaml");
        std::fs::write(
            &config_path,
            r#"
scan:
  extensions: ["rs", "toml"]
  maxBytesPerFile: 4096
llm:
  providerPreferences: ["groq"]
shell:
  strictVars: true
logging:
  level: debug
"#,
        )
        .unwrap();

        let config = AppConfig::default();
        let merged = config.merge_yaml(&config_path).unwrap();

        assert_eq!(merged.extensions, vec!["rs", "toml"]);
        assert_eq!(merged.max_bytes_per_file, Some(4096));
        assert_eq!(merged.provider_preferences, vec!["groq"]);
        assert!(merged.strict_shell_vars);
        assert_eq!(merged.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.yaml");
        std::fs::write(&config_path, "scan: [not, a, map]").unwrap();

        let config = AppConfig::default();
        assert!(config.merge_yaml(&config_path).is_err());
    }
}

use serde::{Deserialize, Serialize};

use super::language::TargetLanguage;

/// Smallest allowed iteration limit
pub const MIN_ITERATION_LIMIT: u32 = 1;

/// Largest allowed iteration limit
pub const MAX_ITERATION_LIMIT: u32 = 10;

/// Main configuration structure for solveloop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Synthesis loop settings
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Completion provider settings
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Sandbox settings
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for one synthesis-verification run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SynthesisConfig {
    /// Maximum attempts per run (1-10)
    #[serde(default = "default_iteration_limit")]
    pub iteration_limit: u32,

    /// Sampling temperature passed to the provider (0.0-1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Language the model is asked to write
    #[serde(default)]
    pub language: TargetLanguage,

    /// Compare outputs case-sensitively instead of the canonical case-insensitive rule
    #[serde(default)]
    pub case_sensitive: bool,

    /// Deadline for a single completion request, in seconds
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,

    /// How the feedback history is rendered into requests
    #[serde(default)]
    pub context: ContextPolicyConfig,
}

const fn default_iteration_limit() -> u32 {
    5
}

const fn default_temperature() -> f32 {
    0.5
}

const fn default_completion_timeout_secs() -> u64 {
    180
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            iteration_limit: default_iteration_limit(),
            temperature: default_temperature(),
            language: TargetLanguage::default(),
            case_sensitive: false,
            completion_timeout_secs: default_completion_timeout_secs(),
            context: ContextPolicyConfig::default(),
        }
    }
}

/// Context growth policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ContextPolicyConfig {
    /// Feedback messages rendered verbatim; older ones are summarized.
    /// `None` sends the full history.
    #[serde(default)]
    pub retained_feedback: Option<usize>,

    /// Character budget for any single source or output section in feedback
    #[serde(default = "default_max_section_chars")]
    pub max_section_chars: usize,
}

const fn default_max_section_chars() -> usize {
    12_000
}

impl Default for ContextPolicyConfig {
    fn default() -> Self {
        Self {
            retained_feedback: None,
            max_section_chars: default_max_section_chars(),
        }
    }
}

/// OpenAI-compatible completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletionConfig {
    /// Base URL of the chat-completions API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// API key; falls back to `OPENAI_API_KEY` when empty
    #[serde(default)]
    pub api_key: String,

    /// Maximum tokens to generate per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Transport-level retries for transient HTTP errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

const fn default_max_tokens() -> u32 {
    2048
}

const fn default_request_timeout_secs() -> u64 {
    120
}

const fn default_requests_per_second() -> f64 {
    2.0
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_request_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl CompletionConfig {
    /// Configured key, or the `OPENAI_API_KEY` environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        if self.api_key.trim().is_empty() {
            std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty())
        } else {
            Some(self.api_key.clone())
        }
    }
}

/// Network isolation applied to sandboxed programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkIsolation {
    /// No namespace isolation (the child shares the host network)
    None,
    /// Run inside a fresh network namespace via `unshare --net`
    #[default]
    Unshare,
}

/// Filesystem isolation applied to sandboxed programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilesystemIsolation {
    /// The child can write wherever the host user can
    None,
    /// Private mount namespace with every host mount remounted read-only;
    /// only the scratch directory stays writable
    #[default]
    ReadOnlyHost,
}

/// How to run a program in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    pub language: TargetLanguage,

    /// Executable to launch
    pub program: String,

    /// Arguments; `{file}` is replaced by the source file name, otherwise
    /// the file name is appended
    #[serde(default)]
    pub args: Vec<String>,

    /// File name the source is written to inside the scratch directory
    pub file_name: String,
}

impl RuntimeConfig {
    pub fn new(
        language: TargetLanguage,
        program: impl Into<String>,
        args: &[&str],
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            language,
            program: program.into(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
            file_name: file_name.into(),
        }
    }
}

/// Sandbox executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SandboxConfig {
    /// Wall-clock limit per execution in milliseconds
    #[serde(default = "default_sandbox_timeout_ms")]
    pub timeout_ms: u64,

    /// Bytes of stdout/stderr captured per stream
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Executions allowed to run at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Network isolation mode
    #[serde(default)]
    pub network_isolation: NetworkIsolation,

    /// Filesystem isolation mode
    #[serde(default)]
    pub filesystem_isolation: FilesystemIsolation,

    /// Per-language launch commands
    #[serde(default = "default_runtimes")]
    pub runtimes: Vec<RuntimeConfig>,
}

const fn default_sandbox_timeout_ms() -> u64 {
    10_000
}

const fn default_max_output_bytes() -> usize {
    64 * 1024
}

const fn default_max_concurrent() -> usize {
    4
}

fn default_runtimes() -> Vec<RuntimeConfig> {
    vec![
        RuntimeConfig::new(TargetLanguage::Python, "python3", &["-I", "-B"], "solution.py"),
        RuntimeConfig::new(TargetLanguage::JavaScript, "node", &[], "solution.js"),
        RuntimeConfig::new(
            TargetLanguage::Cpp,
            "sh",
            &["-c", "c++ -O2 -o solution {file} && ./solution"],
            "solution.cpp",
        ),
        RuntimeConfig::new(TargetLanguage::Java, "java", &[], "Main.java"),
    ]
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_sandbox_timeout_ms(),
            max_output_bytes: default_max_output_bytes(),
            max_concurrent: default_max_concurrent(),
            network_isolation: NetworkIsolation::default(),
            filesystem_isolation: FilesystemIsolation::default(),
            runtimes: default_runtimes(),
        }
    }
}

impl SandboxConfig {
    /// Whether the child has to be launched through `unshare`
    pub fn needs_namespaces(&self) -> bool {
        self.network_isolation == NetworkIsolation::Unshare
            || self.filesystem_isolation == FilesystemIsolation::ReadOnlyHost
    }

    pub fn runtime_for(&self, language: TargetLanguage) -> Option<&RuntimeConfig> {
        self.runtimes.iter().find(|rt| rt.language == language)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling JSON log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_product_settings() {
        let config = Config::default();
        assert_eq!(config.synthesis.iteration_limit, 5);
        assert!((config.synthesis.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.synthesis.language, TargetLanguage::Python);
        assert!(!config.synthesis.case_sensitive);
        assert_eq!(config.synthesis.context.retained_feedback, None);
        assert_eq!(config.completion.model, "gpt-4");
        assert_eq!(config.sandbox.network_isolation, NetworkIsolation::Unshare);
        assert_eq!(
            config.sandbox.filesystem_isolation,
            FilesystemIsolation::ReadOnlyHost
        );
    }

    #[test]
    fn test_every_language_has_a_default_runtime() {
        let sandbox = SandboxConfig::default();
        for language in TargetLanguage::ALL {
            assert!(
                sandbox.runtime_for(language).is_some(),
                "missing runtime for {language}"
            );
        }
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r"
synthesis:
  iteration_limit: 3
  language: javascript
sandbox:
  timeout_ms: 2000
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.synthesis.iteration_limit, 3);
        assert_eq!(config.synthesis.language, TargetLanguage::JavaScript);
        assert_eq!(config.sandbox.timeout_ms, 2000);
        assert_eq!(config.sandbox.max_output_bytes, 64 * 1024);
        assert_eq!(config.sandbox.runtimes.len(), 4);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_isolation_can_be_switched_off() {
        let yaml = r"
sandbox:
  network_isolation: none
  filesystem_isolation: none
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.sandbox.filesystem_isolation, FilesystemIsolation::None);
        assert!(!config.sandbox.needs_namespaces());

        let yaml = "sandbox:\n  filesystem_isolation: read_only_host\n";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert!(config.sandbox.needs_namespaces());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let completion = CompletionConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        };
        assert_eq!(completion.resolved_api_key().as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_api_key_falls_back_to_env() {
        temp_env::with_var("OPENAI_API_KEY", Some("sk-from-env"), || {
            let completion = CompletionConfig::default();
            assert_eq!(completion.resolved_api_key().as_deref(), Some("sk-from-env"));
        });
        temp_env::with_var_unset("OPENAI_API_KEY", || {
            assert_eq!(CompletionConfig::default().resolved_api_key(), None);
        });
    }
}

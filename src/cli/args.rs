//! CLI argument definitions using clap.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::core::provider::ChatBackend;
use crate::error::{LmcError, Result};

/// LLM Compare - run one prompt against several models side by side.
#[derive(Parser, Debug)]
#[command(name = "lmc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one prompt to up to four models and compare the answers
    Compare(CompareArgs),

    /// Compare web search results across providers
    Search(SearchArgs),

    /// Chat with a single model
    Chat(ChatArgs),

    /// List models offered by the chat backends
    Models(ModelsArgs),

    /// Manage system prompts by category
    #[command(subcommand)]
    Prompts(PromptsCommand),

    /// Manage saved user prompts
    #[command(subcommand)]
    UserPrompts(UserPromptsCommand),

    /// Browse saved comparison sessions
    #[command(subcommand)]
    Sessions(SessionsCommand),

    /// Manage provider API keys
    #[command(subcommand)]
    Keys(KeysCommand),

    /// Control the local Ollama server
    #[command(subcommand)]
    Ollama(OllamaCommand),

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// A model on a backend, written `backend:model` on the command line.
///
/// The backend prefix is optional and defaults to OpenRouter. Ollama model
/// tags keep their own colons: `ollama:llama3:8b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub backend: ChatBackend,
    pub model_id: String,
}

impl FromStr for ModelSpec {
    type Err = LmcError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (backend, model_id) = match s.split_once(':') {
            Some((prefix, rest)) => match ChatBackend::from_cli_name(prefix) {
                Ok(backend) => (backend, rest),
                Err(_) => (ChatBackend::OpenRouter, s),
            },
            None => (ChatBackend::OpenRouter, s),
        };

        if model_id.is_empty() {
            return Err(LmcError::InvalidInput(format!("model spec '{s}' has no model id")));
        }
        Ok(Self {
            backend,
            model_id: model_id.to_string(),
        })
    }
}

/// Prompt sources shared by `compare` and `chat`.
#[derive(Parser, Debug, Clone, Default)]
pub struct PromptArgs {
    /// System prompt text (overrides --category)
    #[arg(long, value_name = "TEXT")]
    pub system: Option<String>,

    /// System prompt category (writing, seo, coding, other, or a custom one)
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<String>,

    /// Internet augmentation: none, online, or a search provider
    #[arg(long, value_name = "MODE")]
    pub augment: Option<String>,

    /// Country for search context (two-letter code or "worldwide")
    #[arg(long, value_name = "CODE")]
    pub country: Option<String>,

    /// Sampling temperature
    #[arg(long, value_name = "T")]
    pub temperature: Option<f64>,

    /// Maximum tokens to generate
    #[arg(long, value_name = "N")]
    pub max_tokens: Option<u32>,

    /// Attach an image (png, jpeg, webp, gif; at most 20 MB)
    #[arg(long = "image", value_name = "PATH")]
    pub images: Vec<PathBuf>,
}

/// Arguments for the `compare` command.
#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// Model to compare, as backend:model (repeat up to four times)
    #[arg(short, long = "model", value_name = "SPEC", required = true)]
    pub models: Vec<ModelSpec>,

    /// User prompt; read from stdin when omitted
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Read the user prompt from a file
    #[arg(long, value_name = "PATH", conflicts_with_all = ["prompt", "saved"])]
    pub prompt_file: Option<PathBuf>,

    /// Use a saved user prompt by id
    #[arg(long, value_name = "ID", conflicts_with = "prompt")]
    pub saved: Option<u64>,

    #[command(flatten)]
    pub prompt_args: PromptArgs,

    /// Do not store the run as a session
    #[arg(long)]
    pub no_save: bool,

    /// Return without waiting for confirmed costs
    #[arg(long)]
    pub no_wait: bool,
}

/// Arguments for the `search` command.
#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// Search query
    #[arg(value_name = "QUERY", required = true)]
    pub query: Vec<String>,

    /// Search provider (repeatable; defaults to all four)
    #[arg(short, long = "provider", value_name = "NAME")]
    pub providers: Vec<String>,

    /// Two-letter country code or "worldwide"
    #[arg(long, value_name = "CODE")]
    pub country: Option<String>,

    /// Results per provider
    #[arg(long, value_name = "N", default_value = "10")]
    pub max_results: u32,
}

/// Arguments for the `chat` command.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model to chat with, as backend:model
    #[arg(short, long = "model", value_name = "SPEC")]
    pub model: ModelSpec,

    /// Send this single message and exit instead of reading turns from stdin
    #[arg(long, value_name = "TEXT")]
    pub message: Option<String>,

    #[command(flatten)]
    pub prompt_args: PromptArgs,
}

/// Arguments for the `models` command.
#[derive(Parser, Debug)]
pub struct ModelsArgs {
    /// Backend to list (openrouter or ollama); both when omitted
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<String>,

    /// Only models that accept images
    #[arg(long)]
    pub vision: bool,

    /// Case-insensitive filter on id and name
    #[arg(long, value_name = "TERM")]
    pub filter: Option<String>,
}

/// System prompt subcommands.
#[derive(Subcommand, Debug)]
pub enum PromptsCommand {
    /// List categories
    List,

    /// Print the prompt for a category
    Show {
        /// Category name
        category: String,
    },

    /// Set the prompt for a category
    Set {
        /// Category name
        category: String,

        /// Prompt text
        #[arg(required_unless_present = "file")]
        text: Option<String>,

        /// Read the prompt text from a file
        #[arg(long, value_name = "PATH", conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Delete a custom category (built-in categories are kept)
    Delete {
        /// Category name
        category: String,
    },

    /// Merge prompts from a JSON file
    Import {
        /// JSON file mapping category to prompt
        path: PathBuf,
    },

    /// Write all prompts to a JSON file
    Export {
        /// Destination path
        path: PathBuf,
    },
}

/// Saved user prompt subcommands.
#[derive(Subcommand, Debug)]
pub enum UserPromptsCommand {
    /// List saved prompts
    List {
        /// Only this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Print one saved prompt
    Show {
        /// Prompt id
        id: u64,
    },

    /// Save a new prompt
    Add {
        /// Short title
        #[arg(long)]
        title: String,

        /// Prompt text
        #[arg(required_unless_present = "file")]
        content: Option<String>,

        /// Read the prompt text from a file
        #[arg(long, value_name = "PATH", conflicts_with = "content")]
        file: Option<PathBuf>,

        /// Category
        #[arg(long, default_value = "other")]
        category: String,
    },

    /// Delete a saved prompt
    Delete {
        /// Prompt id
        id: u64,
    },
}

/// Session subcommands.
#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// List sessions, newest first
    List {
        /// Show at most this many
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one session in full
    Show {
        /// Session id
        id: u64,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: u64,
    },

    /// Find sessions whose prompts or answers contain a term
    Search {
        /// Case-insensitive search term
        term: String,
    },
}

/// API key subcommands.
#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// Store an API key
    Set {
        /// Provider (openrouter, tavily, perplexity, brave, exa)
        provider: String,

        /// Key value; read from stdin when omitted
        value: Option<String>,
    },

    /// Show which providers have a key and where it comes from
    Show,
}

/// Local runtime subcommands.
#[derive(Subcommand, Debug)]
pub enum OllamaCommand {
    /// Report installation and server status
    Status,

    /// Start `ollama serve` if no server answers
    Start {
        /// Seconds to wait for the server to answer
        #[arg(long, default_value = "15")]
        wait: u64,
    },

    /// Stop a server started by lmc
    Stop,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Markdown output
    Md,
}

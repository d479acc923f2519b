use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scai", version, about = "Console client for the migration agent backend")]
pub struct Cli {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection overrides shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct BackendArgs {
    /// Backend base URL (e.g., "http://localhost:8000")
    #[arg(short, long, global = true)]
    pub backend: Option<String>,

    /// Terminal WebSocket URL (defaults to {backend}/ws/terminal)
    #[arg(long, global = true)]
    pub terminal_url: Option<String>,

    /// Backend session id, sent as the session cookie
    #[arg(long, global = true)]
    pub session: Option<String>,

    /// Path to config file (overrides default search)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an agent run and stream its events to the console
    Run {
        /// Instruction for the agent
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Do not attach the agent terminal while the run streams
        #[arg(long)]
        no_terminal: bool,

        /// Earlier chat messages (JSON) sent ahead of the prompt
        #[arg(long)]
        conversation: Option<PathBuf>,
    },
    /// Start an agent run inside the interactive dashboard
    Dashboard {
        /// Instruction for the agent
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Earlier chat messages (JSON) sent ahead of the prompt
        #[arg(long)]
        conversation: Option<PathBuf>,
    },
    /// Attach the backend terminal to this console
    Terminal,
    /// Upload files for a chat session
    Upload {
        /// Chat id the files belong to (a new one is generated when omitted)
        #[arg(long)]
        chat_id: Option<String>,

        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the display text of a chat message stored as JSON
    Extract {
        /// Path to a JSON file holding one message object
        file: PathBuf,
    },
}

impl Commands {
    /// The prompt words joined into one instruction, for commands that start a run.
    pub fn prompt(&self) -> Option<String> {
        match self {
            Commands::Run { prompt, .. } | Commands::Dashboard { prompt, .. } => {
                Some(prompt.join(" "))
            }
            _ => None,
        }
    }
}

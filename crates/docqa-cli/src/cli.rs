use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Command-line arguments for docqa
#[derive(Debug, Parser)]
#[command(name = "docqa")]
#[command(about = "Ask questions about your documents with a local model", long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        help = "Config file to use instead of ~/.docqa/config.toml"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Build the vector index from a document directory")]
    Ingest {
        #[arg(short, long, help = "Directory holding the documents (overrides config)")]
        data: Option<PathBuf>,

        #[arg(long, help = "File name glob, e.g. \"*.pdf\" (overrides config)")]
        pattern: Option<String>,

        #[arg(short, long, help = "Where to write the index (overrides config)")]
        index: Option<PathBuf>,
    },

    #[command(about = "Ask a single question")]
    Ask {
        #[arg(help = "The question to answer")]
        question: String,

        #[arg(short = 'k', long, help = "Number of chunks to retrieve (overrides config)")]
        top_k: Option<usize>,

        #[arg(long, help = "Print the answer only once it is complete")]
        no_stream: bool,
    },

    #[command(about = "Start an interactive chat session")]
    Chat {
        #[arg(short, long, help = "Resume a saved session by id")]
        session: Option<Uuid>,

        #[arg(long, help = "Do not persist the conversation")]
        ephemeral: bool,
    },

    #[command(about = "Manage saved chat sessions")]
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum SessionAction {
    #[command(about = "List saved sessions, newest first")]
    List,

    #[command(about = "Delete a saved session")]
    Delete {
        #[arg(help = "Session id")]
        id: Uuid,
    },
}

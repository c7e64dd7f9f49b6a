//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Consultation pipeline - ingest documents into consultations and export them.
///
/// consult ingest notes.pdf -c <id> | estimate <id> | export <id> -f docx -o out.docx
#[derive(Parser, Debug)]
#[command(name = "consult")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to ~/.consultation-pipeline/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server.
    Serve {
        /// Override the configured port.
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the configured host.
        #[arg(long)]
        host: Option<String>,
    },

    /// Check a file against the upload size and type policy.
    Validate {
        /// File to check.
        file: PathBuf,
    },

    /// Validate, extract and store a document as a system message.
    Ingest {
        /// Document to ingest.
        file: PathBuf,

        /// Conversation to append to (a new one is created if omitted).
        #[arg(short, long)]
        conversation: Option<String>,
    },

    /// Render a stored conversation to a document.
    Export {
        /// Conversation ID.
        conversation_id: String,

        /// Export format: pdf, docx, txt, or json.
        #[arg(short, long, default_value = "txt")]
        format: String,

        /// Output file path (defaults to the generated filename).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave out analysis messages.
        #[arg(long)]
        no_analysis: bool,

        /// Leave out generated-code messages.
        #[arg(long)]
        no_code: bool,

        /// Document title.
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show message composition and estimated export sizes.
    Estimate {
        /// Conversation ID.
        conversation_id: String,
    },

    /// List stored conversations.
    List {
        /// Output format: table or json.
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Maximum number of conversations to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Load a JSON export back into the store.
    Import {
        /// JSON export file.
        file: PathBuf,
    },

    /// Show the effective configuration and its location.
    Config {
        /// Write the default configuration file if none exists.
        #[arg(long)]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_flags() {
        let cli = Cli::parse_from([
            "consult", "-vv", "export", "abc", "-f", "pdf", "--no-code", "-o", "out.pdf",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Export {
                conversation_id,
                format,
                no_code,
                no_analysis,
                output,
                ..
            } => {
                assert_eq!(conversation_id, "abc");
                assert_eq!(format, "pdf");
                assert!(no_code);
                assert!(!no_analysis);
                assert_eq!(output, Some(PathBuf::from("out.pdf")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_ingest_with_conversation() {
        let cli = Cli::parse_from(["consult", "ingest", "notes.txt", "-c", "conv-1"]);
        assert!(matches!(
            cli.command,
            Commands::Ingest { conversation: Some(ref c), .. } if c == "conv-1"
        ));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

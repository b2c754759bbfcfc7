use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use antt_rag::commands::{ingest, query, report_error, show_status, web};
use antt_rag::config::{Config, run_interactive_config, show_config};
use antt_rag::{RagError, Result};

#[derive(Debug, Parser)]
#[command(name = "antt-rag")]
#[command(about = "Question answering over ANTT regulation documents with a local RAG pipeline")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector store (default: ~/.antt-rag)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert, chunk and embed documents into the vector store
    Ingest {
        /// Files or directories to ingest
        paths: Vec<PathBuf>,
        /// Abort on the first file that cannot be converted
        #[arg(long)]
        fail_fast: bool,
    },
    /// Ask questions interactively
    Query,
    /// Serve the question form over HTTP
    Web {
        /// Address to bind, overrides [web].bind
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on, overrides [web].port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Show the state of the vector store and the Ollama server
    Status,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            report_error(&RagError::Other(e.into()));
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(cli));
    // Blocked stdin reads and in-flight model calls must not delay the exit
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let base_dir = match cli.data_dir {
        Some(dir) => dir,
        None => Config::default_dir().map_err(|e| RagError::Config(e.to_string()))?,
    };

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&base_dir)?;
        } else {
            run_interactive_config(&base_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&base_dir).map_err(|e| RagError::Config(format!("{:#}", e)))?;

    match cli.command {
        Commands::Ingest { paths, fail_fast } => {
            ingest(&config, &paths, fail_fast).await?;
        }
        Commands::Query => {
            query(config).await?;
        }
        Commands::Web { bind, port } => {
            web(config, bind, port).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn ingest_collects_paths() {
        let cli = Cli::try_parse_from(["antt-rag", "ingest", "docs", "rcr-3.pdf", "--fail-fast"])
            .expect("should parse");

        match cli.command {
            Commands::Ingest { paths, fail_fast } => {
                assert_eq!(paths, vec![PathBuf::from("docs"), PathBuf::from("rcr-3.pdf")]);
                assert!(fail_fast);
            }
            _ => panic!("expected ingest command"),
        }
    }

    #[test]
    fn ingest_without_paths_parses() {
        // Rejected later with a friendly message rather than a usage error
        let cli = Cli::try_parse_from(["antt-rag", "ingest"]).expect("should parse");

        match cli.command {
            Commands::Ingest { paths, fail_fast } => {
                assert!(paths.is_empty());
                assert!(!fail_fast);
            }
            _ => panic!("expected ingest command"),
        }
    }

    #[test]
    fn web_overrides() {
        let cli = Cli::try_parse_from(["antt-rag", "web", "--bind", "0.0.0.0", "--port", "9000"])
            .expect("should parse");

        match cli.command {
            Commands::Web { bind, port } => {
                assert_eq!(bind.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected web command"),
        }
    }

    #[test]
    fn data_dir_is_global() {
        let cli = Cli::try_parse_from(["antt-rag", "query", "--data-dir", "/tmp/antt"])
            .expect("should parse");

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/antt")));
        assert!(matches!(cli.command, Commands::Query));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["antt-rag", "config", "--show"]).expect("should parse");
        assert!(matches!(cli.command, Commands::Config { show: true }));
    }

    #[test]
    fn invalid_command() {
        let err = Cli::try_parse_from(["antt-rag", "crawl"]).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn missing_subcommand() {
        let err = Cli::try_parse_from(["antt-rag"]).expect_err("should fail");
        assert_eq!(
            err.kind(),
            ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }
}

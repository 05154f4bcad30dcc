mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codegrade-cli")]
#[command(about = "Codegrade CLI - Run jobs locally and manage language profiles", long_about = None)]
struct Cli {
    /// Path to languages.json (defaults to CODEGRADE_LANGUAGES or config/languages.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a raw JSON request and print the encoded result
    Exec {
        /// Request file, or `-` to read stdin
        #[arg(default_value = "-")]
        request: String,

        /// Pretty-print the result
        #[arg(long, default_value = "false")]
        pretty: bool,
    },

    /// Compile and run a source file against a list of cases
    Run {
        /// Language name (e.g., python, cpp, java)
        #[arg(short, long)]
        language: String,

        /// Source file to run
        #[arg(short, long)]
        source: PathBuf,

        /// Per-case timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// JSON file holding a list of cases, e.g. [[1,1],[10,20]]
        #[arg(short, long)]
        cases: Option<PathBuf>,

        /// Pretty-print the result
        #[arg(long, default_value = "false")]
        pretty: bool,
    },

    /// List configured languages
    Languages,

    /// Add a new language profile to languages.json
    AddLang {
        /// Language name (e.g., java, cpp, go)
        #[arg(short, long)]
        name: String,

        /// File extension (e.g., java, cpp, go)
        #[arg(short, long)]
        ext: String,

        /// Language version (e.g., 17, 20, 1.21)
        #[arg(short, long, default_value = "latest")]
        version: String,

        /// Run command, whitespace separated (e.g., "python3 {source}")
        #[arg(short, long)]
        run: String,

        /// Compile command, whitespace separated (e.g., "gcc {source} -o {workdir}/main")
        #[arg(long)]
        compile: Option<String>,

        /// Fixed source file name (e.g., Main.java)
        #[arg(long)]
        source_file: Option<String>,

        /// Artifact extension used to resolve `{entry}` after compiling (e.g., .class)
        #[arg(long)]
        entry_ext: Option<String>,
    },

    /// Write a default languages.json
    Init {
        /// Overwrite an existing file
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the encoded result only
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = commands::settings_for(cli.config);

    match cli.command {
        Commands::Exec { request, pretty } => {
            let passed = commands::exec_request(&settings, &request, pretty).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Run {
            language,
            source,
            timeout,
            cases,
            pretty,
        } => {
            let passed = commands::run_source(
                &settings,
                &language,
                &source,
                timeout,
                cases.as_deref(),
                pretty,
            )
            .await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Languages => {
            commands::list_languages(&settings.languages_path)?;
        }
        Commands::AddLang {
            name,
            ext,
            version,
            run,
            compile,
            source_file,
            entry_ext,
        } => {
            commands::add_language(
                &settings.languages_path,
                commands::NewLanguage {
                    name: &name,
                    ext: &ext,
                    version: &version,
                    run: &run,
                    compile: compile.as_deref(),
                    source_file: source_file.as_deref(),
                    entry_ext: entry_ext.as_deref(),
                },
            )?;
        }
        Commands::Init { force } => {
            commands::init_config(&settings.languages_path, force)?;
        }
    }

    Ok(())
}

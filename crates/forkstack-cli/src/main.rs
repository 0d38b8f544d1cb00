mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_PROTECTED, EXIT_STORE_ERROR};
use forkstack_core::install_signal_handler;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "forks",
    version,
    about = "forkstack - instant, isolated development environments"
)]
struct Cli {
    /// Path to the project config (default: nearest .forkstack.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a starter .forkstack.toml in the current directory.
    Init {
        /// Overwrite an existing config without asking.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Create a new fork and make it the active environment.
    Create {
        /// Name for the fork (generated when omitted).
        #[arg(short, long)]
        name: Option<String>,
        /// Environment to fork from (default: the project's default source).
        #[arg(long)]
        from: Option<String>,
    },
    /// Make an existing environment the active one.
    Switch {
        /// Environment name.
        name: String,
    },
    /// Delete a fork and all of its resources.
    Delete {
        /// Name of the fork to delete.
        name: String,
    },
    /// List all forks.
    List,
    /// Print the active environment.
    Current,
    /// Show one environment and its resources.
    Show {
        /// Environment name.
        name: String,
    },
    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages.
    ManPages {
        /// Output directory.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FORKSTACK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let config = cli.config.as_deref();
    let json_output = cli.json;

    let result = match cli.command {
        Commands::Init { force } => commands::init::run(config, force, json_output),
        Commands::Create { name, from } => {
            commands::create::run(config, name.as_deref(), from.as_deref(), json_output)
        }
        Commands::Switch { name } => commands::switch::run(config, &name, json_output),
        Commands::Delete { name } => commands::delete::run(config, &name, json_output),
        Commands::List => commands::list::run(config, json_output),
        Commands::Current => commands::current::run(config, json_output),
        Commands::Show { name } => commands::show::run(config, &name, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("config error:") {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("store error:") || msg.starts_with("store lock:") {
                EXIT_STORE_ERROR
            } else if msg.starts_with("protected:") {
                EXIT_PROTECTED
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

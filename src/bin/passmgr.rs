//! passmgr CLI - encrypted credential store
//!
//! Command-line interface over a single store file sealed with
//! AES-256-GCM under an scrypt-derived key.

use clap::{Args, Parser, Subcommand};
use std::error::Error as _;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use passmgr::commands::{self, DEFAULT_SECRET_NAME};
use passmgr::error::{ErrorCategory, ErrorKind, PassmgrError, Result};
use passmgr::file_store;
use passmgr::passphrase::{LinePassphraseReader, PassphraseReader, TerminalPassphraseReader};
use passmgr::subject::SubjectId;

#[derive(Parser)]
#[command(name = "passmgr")]
#[command(version)]
#[command(about = "Encrypted credential store.", long_about = None)]
struct Cli {
    /// Store file, or a directory holding .passmgr_store [default: ~/.passmgr_store]
    #[arg(long, global = true, env = "PASSMGR_FILE", value_name = "PATH")]
    file: Option<PathBuf>,

    /// Read passphrases and secrets from stdin, one per line, instead of
    /// from the terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Identity {
    /// User name of the entry
    #[arg(short, long)]
    user: String,

    /// URL of the entry
    #[arg(short = 'l', long)]
    url: String,
}

impl Identity {
    fn into_id(self) -> SubjectId {
        SubjectId::new(self.user, self.url)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty store
    Init,

    /// List stored entries (secrets are not shown)
    #[command(alias = "ls")]
    List {
        /// Only show entries whose user or URL contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Print a secret of an entry
    #[command(alias = "get")]
    Show {
        #[command(flatten)]
        identity: Identity,

        /// Name of the secret to print
        #[arg(short, long, default_value = DEFAULT_SECRET_NAME)]
        name: String,
    },

    /// Add an entry, or set a secret of an existing one
    #[command(alias = "a")]
    Add {
        #[command(flatten)]
        identity: Identity,

        /// Name of the secret to set
        #[arg(short, long, default_value = DEFAULT_SECRET_NAME)]
        name: String,
    },

    /// Delete an entry and all its secrets
    #[command(alias = "rm")]
    Delete {
        #[command(flatten)]
        identity: Identity,
    },

    /// Import entries from a JSON array of {User, URL, Secrets} objects
    Import {
        /// Path to the JSON file to import
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Change the master passphrase
    Passwd,
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("PASSMGR_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("passmgr=debug")
        } else {
            EnvFilter::new("passmgr=warn")
        }
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(io::stderr),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", error_chain(&e));
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let path = store_path(cli.file)?;
    let mut reader = get_passphrase_reader(cli.passphrase_stdin);
    let reader = &mut *reader;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Init => commands::init(&path, reader, &mut stdout),
        Commands::List { filter } => commands::list(&path, reader, filter.as_deref(), &mut stdout),
        Commands::Show { identity, name } => {
            commands::show(&path, reader, &identity.into_id(), &name, &mut stdout)
        }
        Commands::Add { identity, name } => {
            commands::add(&path, reader, &identity.into_id(), &name, &mut stdout)
        }
        Commands::Delete { identity } => {
            commands::delete(&path, reader, &identity.into_id(), &mut stdout)
        }
        Commands::Import { input } => commands::import(&path, reader, &input, &mut stdout),
        Commands::Passwd => commands::passwd(&path, reader, &mut stdout),
    }
}

fn store_path(file: Option<PathBuf>) -> Result<PathBuf> {
    let path = match file {
        Some(path) => path,
        None => dirs::home_dir()
            .ok_or_else(|| {
                PassmgrError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::InvalidInput,
                    "cannot determine home directory; pass --file",
                )
            })?
            .join(file_store::STORE_FILE_NAME),
    };
    Ok(file_store::resolve_path(&path))
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(LinePassphraseReader::new(Box::new(BufReader::new(io::stdin()))))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}

fn error_chain(err: &PassmgrError) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

//! segkv CLI
//!
//! One-shot commands and an interactive shell over a local data directory.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use segkv::{Engine, KvError};
use tracing_subscriber::{fmt, EnvFilter};

/// segkv CLI
#[derive(Parser, Debug)]
#[command(name = "segkv")]
#[command(about = "Embedded log-structured key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "db")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// List all keys
    List,

    /// Show storage statistics
    Stats,

    /// Rewrite all live data into a single segment
    Compact,

    /// Save the index snapshot
    Snapshot,

    /// Interactive shell
    Shell,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,segkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let engine = match Engine::open_path(&args.data_dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open store at {}: {}", args.data_dir, e);
            return ExitCode::FAILURE;
        }
    };

    let code = match args.command {
        Commands::Shell => run_shell(&engine),
        command => run_command(&engine, command),
    };

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close store: {}", e);
        return ExitCode::FAILURE;
    }

    code
}

/// Execute a single command, printing its result to stdout
fn run_command(engine: &Engine, command: Commands) -> ExitCode {
    let result = match command {
        Commands::Set { key, value } => engine.set(&key, value.as_bytes()).map(|_| {
            println!("OK");
        }),
        Commands::Get { key } => match engine.get(&key) {
            Ok(value) => {
                println!("{}", String::from_utf8_lossy(&value));
                Ok(())
            }
            Err(KvError::KeyNotFound) => {
                println!("Key not found");
                return ExitCode::FAILURE;
            }
            Err(e) => Err(e),
        },
        Commands::Delete { key } => engine.delete(&key).map(|_| {
            println!("Deleted");
        }),
        Commands::List => {
            for key in engine.list_keys() {
                println!("  {}", key);
            }
            Ok(())
        }
        Commands::Stats => {
            println!("{}", engine.stats());
            Ok(())
        }
        Commands::Compact => engine.compact().map(|_| {
            println!("Compaction finished");
        }),
        Commands::Snapshot => engine.save_snapshot().map(|_| {
            println!("Snapshot saved");
        }),
        Commands::Shell => unreachable!("shell is dispatched by main"),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Read-eval-print loop over stdin
///
/// `quit`/`exit` save a snapshot before leaving.
fn run_shell(engine: &Engine) -> ExitCode {
    println!("segkv {} (type help for instructions)", segkv::VERSION);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                return ExitCode::FAILURE;
            }
            None => break,
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.splitn(3, ' ');
        let cmd = parts.next().unwrap_or_default();
        let arg1 = parts.next();
        let arg2 = parts.next();

        match (cmd, arg1, arg2) {
            ("set", Some(key), Some(value)) => {
                run_command(engine, Commands::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
            ("set", _, _) => println!("Usage: set <key> <value>"),
            ("get", Some(key), _) => {
                run_command(engine, Commands::Get { key: key.to_string() });
            }
            ("get", None, _) => println!("Usage: get <key>"),
            ("delete", Some(key), _) => {
                run_command(engine, Commands::Delete { key: key.to_string() });
            }
            ("delete", None, _) => println!("Usage: delete <key>"),
            ("list", _, _) => {
                run_command(engine, Commands::List);
            }
            ("stats", _, _) => {
                run_command(engine, Commands::Stats);
            }
            ("compact", _, _) => {
                run_command(engine, Commands::Compact);
            }
            ("snapshot", _, _) => {
                run_command(engine, Commands::Snapshot);
            }
            ("help", _, _) => print_help(),
            ("quit", _, _) | ("exit", _, _) => {
                println!("Saving snapshot...");
                if let Err(e) = engine.save_snapshot() {
                    println!("Warning: failed to save snapshot: {}", e);
                }
                return ExitCode::SUCCESS;
            }
            (other, _, _) => println!("Unknown command: {}", other),
        }
    }

    ExitCode::SUCCESS
}

fn print_help() {
    println!("Available commands:");
    println!("  set <key> <value>  - Store a key-value pair");
    println!("  get <key>          - Retrieve a value");
    println!("  delete <key>       - Remove a key");
    println!("  list               - List all keys");
    println!("  compact            - Compact storage");
    println!("  snapshot           - Save index snapshot");
    println!("  stats              - Show statistics");
    println!("  help               - Show this help");
    println!("  quit / exit        - Exit the program");
}

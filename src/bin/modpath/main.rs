//! modpath
//!
//! Выводит установленные модули и ищет имена так, как их видит модуль.
//!
//! # Использование
//!
//! ```bash
//! # Плоский список ./modules
//! modpath list
//!
//! # Дерево зависимостей по нескольким путям
//! modpath list --tree --modulepath site,/opt/shared/modules
//!
//! # Пути поиска окружения из modpath.toml
//! modpath list --environment production
//!
//! # Откуда функция, если смотреть из модуля `web`?
//! modpath lookup web::vhost --kind function --module web
//! ```

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

/// Module path inspector
#[derive(Parser)]
#[command(name = "modpath")]
#[command(version)]
#[command(about = "Inspect installed modules and their dependencies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (default: modpath.toml in this or a parent directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed modules
    List {
        /// Show tree view
        #[arg(long)]
        tree: bool,

        /// Comma-separated search paths
        #[arg(long)]
        modulepath: Option<String>,

        /// Use the search paths of an environment
        #[arg(long)]
        environment: Option<String>,
    },

    /// Resolve a name through the loader chain
    Lookup {
        /// Name to resolve (e.g. `web::vhost`)
        name: String,

        /// function, type or class
        #[arg(long, default_value = "function")]
        kind: String,

        /// Module whose view is used (default: the global scope)
        #[arg(long)]
        module: Option<String>,

        /// Comma-separated search paths
        #[arg(long)]
        modulepath: Option<String>,

        /// Use the search paths of an environment
        #[arg(long)]
        environment: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let options = commands::Options {
        config: cli.config,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Commands::List {
            tree,
            modulepath,
            environment,
        } => commands::list_modules(&options, tree, modulepath.as_deref(), environment.as_deref()),
        Commands::Lookup {
            name,
            kind,
            module,
            modulepath,
            environment,
        } => commands::lookup_name(
            &options,
            &name,
            &kind,
            module.as_deref(),
            modulepath.as_deref(),
            environment.as_deref(),
        ),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            if !options.quiet {
                eprintln!("{}: {}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

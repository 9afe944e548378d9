//! Реализация команд CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use log::debug;

use modpath::config::split_modulepath;
use modpath::loader::{LoaderChain, ScopeId};
use modpath::{
    render, render_diagnostics, ModError, ModResult, ModuleConfig, ModuleRegistry, NameKind,
    RenderMode, Settings, TypedName,
};

/// Общие опции всех команд.
pub struct Options {
    pub config: Option<PathBuf>,
    pub quiet: bool,
}

/// Пути поиска и корни окружения для запуска.
///
/// Приоритет: `--modulepath`, затем окружение или общий список из файла
/// конфигурации, затем `./modules`.
fn module_config(
    options: &Options,
    modulepath: Option<&str>,
    environment: Option<&str>,
) -> ModResult<ModuleConfig> {
    let cwd = std::env::current_dir()?;

    let settings_path = match &options.config {
        Some(path) => Some(path.clone()),
        None => Settings::find(),
    };
    let settings = match settings_path {
        Some(path) => Some(Settings::load(path)?),
        None => None,
    };

    let mut config = match (&settings, environment) {
        (Some(settings), env) => settings.module_config(env)?,
        (None, Some(env)) => {
            return Err(ModError::Config(format!(
                "environment '{}' requested but no configuration file found",
                env
            )))
        }
        (None, None) => ModuleConfig {
            search_paths: vec![cwd.join("modules")],
            environment_roots: Vec::new(),
        },
    };

    if let Some(raw) = modulepath {
        config.search_paths = split_modulepath(raw, &cwd);
    }

    debug!("Search paths: {:?}", config.search_paths);
    Ok(config)
}

/// Вывести модули всех путей поиска.
pub fn list_modules(
    options: &Options,
    tree: bool,
    modulepath: Option<&str>,
    environment: Option<&str>,
) -> ModResult<ExitCode> {
    let config = module_config(options, modulepath, environment)?;
    let registry = ModuleRegistry::discover(&config.search_paths)?;
    let resolution = modpath::resolve(&registry);

    let mode = if tree { RenderMode::Tree } else { RenderMode::Flat };
    print!("{}", render(&resolution, mode));

    // Проблемы графа только предупреждения: листинг получен.
    if resolution.has_problems() && !options.quiet {
        eprintln!("{} Module dependencies are not satisfied", "Warning:".yellow().bold());
        eprint!("{}", render_diagnostics(&resolution));
    }

    Ok(ExitCode::SUCCESS)
}

/// Найти имя так, как его видит модуль.
pub fn lookup_name(
    options: &Options,
    name: &str,
    kind: &str,
    module: Option<&str>,
    modulepath: Option<&str>,
    environment: Option<&str>,
) -> ModResult<ExitCode> {
    let kind: NameKind = kind.parse()?;
    let config = module_config(options, modulepath, environment)?;
    let registry = ModuleRegistry::discover(&config.search_paths)?;
    let resolution = modpath::resolve(&registry);

    let mut builder = LoaderChain::builder(&resolution);
    for root in &config.environment_roots {
        builder = builder.environment_root(root);
    }
    let mut chain = builder.build();

    let scope = match module {
        Some(module_name) => chain
            .scope_of(module_name)
            .ok_or_else(|| ModError::Config(format!("module '{}' is not installed", module_name)))?,
        None => chain.root(),
    };

    let typed = TypedName::new(kind, name);
    match chain.load(scope, &typed)? {
        Some(entry) => {
            println!("{} -> {}", entry.name, entry.origin);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            if !options.quiet {
                eprintln!(
                    "{} {} is not visible from {}",
                    "✗".red(),
                    typed,
                    describe_scope(&chain, scope)
                );
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn describe_scope(chain: &LoaderChain, scope: ScopeId) -> String {
    match chain.loader_name(scope) {
        Some(name) => format!("loader '{}'", name),
        None => format!("scope {}", scope.0),
    }
}

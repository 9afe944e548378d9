//! Работа с `modpath.toml`.
//!
//! ```toml
//! modulepath = ["modules", "/opt/shared/modules"]
//!
//! [environments.production]
//! modulepath = ["environments/production/modules", "modules"]
//! root = "environments/production"
//! ```
//!
//! Относительные пути отсчитываются от каталога, где лежит файл.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ModError, ModResult};
use crate::modules::ModuleConfig;

/// Имя файла конфигурации.
pub const CONFIG_FILE: &str = "modpath.toml";

/// Разобранный файл конфигурации.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Пути поиска по умолчанию
    #[serde(default)]
    pub modulepath: Vec<String>,

    /// Именованные замены путей поиска по умолчанию
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentSettings>,

    /// Каталог, от которого отсчитываются относительные пути
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Одна таблица `[environments.NAME]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    /// Пути поиска; если пусто, берётся общий список
    #[serde(default)]
    pub modulepath: Vec<String>,

    /// Глобальный корень, который опрашивается раньше модулей
    #[serde(default)]
    pub root: Option<String>,
}

impl Settings {
    /// Загрузить настройки из файла.
    pub fn load(path: impl AsRef<Path>) -> ModResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        debug!("Loading configuration from {}", path.display());
        Self::parse(&content, base_dir)
    }

    pub fn parse(content: &str, base_dir: impl Into<PathBuf>) -> ModResult<Self> {
        let mut settings: Settings =
            toml::from_str(content).map_err(|e| ModError::Config(e.to_string()))?;
        settings.base_dir = base_dir.into();
        Ok(settings)
    }

    /// Найти файл конфигурации в текущей директории или выше.
    pub fn find() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_from(&current)
    }

    pub fn find_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE);
            if config_path.is_file() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Пути поиска и корни окружения для запуска.
    pub fn module_config(&self, environment: Option<&str>) -> ModResult<ModuleConfig> {
        let mut config = ModuleConfig::default();
        let mut modulepath = &self.modulepath;

        if let Some(name) = environment {
            let env = self
                .environments
                .get(name)
                .ok_or_else(|| ModError::Config(format!("unknown environment '{}'", name)))?;
            if !env.modulepath.is_empty() {
                modulepath = &env.modulepath;
            }
            if let Some(root) = &env.root {
                config.environment_roots.push(resolve_against(&self.base_dir, root));
            }
        }

        config.search_paths = if modulepath.is_empty() {
            vec![self.base_dir.join("modules")]
        } else {
            modulepath
                .iter()
                .map(|entry| resolve_against(&self.base_dir, entry))
                .collect()
        };

        Ok(config)
    }
}

/// Разбить значение `--modulepath` по запятым; относительные пути
/// отсчитываются от `base`.
pub fn split_modulepath(raw: &str, base: &Path) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| resolve_against(base, entry))
        .collect()
}

fn resolve_against(base: &Path, entry: &str) -> PathBuf {
    let path = Path::new(entry);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

//! Метаданные модуля (`metadata.json`).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::version::VersionRequirement;
use crate::error::{ModError, ModResult};

/// Имя файла метаданных в каталоге модуля.
pub const METADATA_FILE: &str = "metadata.json";

/// Метаданные в том виде, в каком они лежат на диске.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Полное имя: `author/modname` или `author-modname`
    pub name: String,

    /// Строка версии (ожидается semver, но не обязательно)
    pub version: String,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub license: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

/// Зависимость в том виде, как она записана в метаданных.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub name: String,

    #[serde(default, alias = "version_range", skip_serializing_if = "Option::is_none")]
    pub version_requirement: Option<String>,
}

/// Объявленная зависимость с разобранным требованием.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Имя как объявлено (может содержать автора)
    pub name: String,
    pub requirement: VersionRequirement,
}

impl Dependency {
    pub fn new(name: impl Into<String>, requirement: VersionRequirement) -> Self {
        Self {
            name: name.into(),
            requirement,
        }
    }

    /// Имя модуля для поиска в реестре.
    pub fn module_name(&self) -> &str {
        short_name(&self.name)
    }
}

/// Отбросить автора из полного имени: `puppetlabs/stdlib` и
/// `puppetlabs-stdlib` оба дают `stdlib`.
pub fn short_name(forge_name: &str) -> &str {
    match forge_name.find(['/', '-']) {
        Some(idx) => &forge_name[idx + 1..],
        None => forge_name,
    }
}

impl ModuleMetadata {
    /// Прочитать и разобрать файл метаданных.
    pub fn load(path: impl AsRef<Path>) -> ModResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    /// Разобрать текст метаданных; `origin` нужен только для сообщений об ошибках.
    pub fn parse(origin: &Path, content: &str) -> ModResult<Self> {
        serde_json::from_str(content).map_err(|e| ModError::MalformedMetadata {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Разобрать все объявленные требования.
    pub fn parsed_dependencies(&self) -> ModResult<Vec<Dependency>> {
        self.dependencies
            .iter()
            .map(|spec| {
                let requirement =
                    VersionRequirement::parse_optional(spec.version_requirement.as_deref())?;
                Ok(Dependency::new(spec.name.clone(), requirement))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_full_metadata() {
        let json = r#"{
            "name": "example/a",
            "version": "0.1.0",
            "source": "git@github.com/example/example-a.git",
            "author": "Bob the Builder",
            "license": "Apache-2.0",
            "dependencies": [{"name": "example/c", "version_requirement": ">= 0.1.0"}]
        }"#;
        let meta = ModuleMetadata::parse(&PathBuf::from("metadata.json"), json).unwrap();
        assert_eq!(meta.name, "example/a");
        assert_eq!(meta.author.as_deref(), Some("Bob the Builder"));

        let deps = meta.parsed_dependencies().unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].module_name(), "c");
        assert_eq!(deps[0].requirement.raw(), ">= 0.1.0");
    }

    #[test]
    fn test_version_range_alias_and_missing_requirement() {
        let json = r#"{
            "name": "example-b",
            "version": "1.0.0",
            "dependencies": [
                {"name": "c", "version_range": "1.x"},
                {"name": "d"}
            ]
        }"#;
        let meta = ModuleMetadata::parse(&PathBuf::from("metadata.json"), json).unwrap();
        let deps = meta.parsed_dependencies().unwrap();
        assert_eq!(deps[0].requirement.raw(), "1.x");
        assert!(deps[1].requirement.is_any());
    }

    #[test]
    fn test_malformed_metadata() {
        let result = ModuleMetadata::parse(&PathBuf::from("metadata.json"), "{ not json");
        assert!(matches!(result, Err(ModError::MalformedMetadata { .. })));

        let missing_version = ModuleMetadata::parse(&PathBuf::from("m"), r#"{"name": "a/b"}"#);
        assert!(missing_version.is_err());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("puppetlabs/stdlib"), "stdlib");
        assert_eq!(short_name("puppetlabs-stdlib"), "stdlib");
        assert_eq!(short_name("stdlib"), "stdlib");
    }
}

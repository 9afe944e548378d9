//! Реестр модулей.
//!
//! Обходит пути поиска и запоминает каждый каталог модуля в
//! воспроизводимом порядке: пути как заданы, каталоги по имени.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::metadata::{Dependency, ModuleMetadata, METADATA_FILE};
use super::version::ModuleVersion;
use crate::error::{ModError, ModResult};

/// Индекс дескриптора в реестре (порядок обнаружения).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

/// Что известно о модуле из метаданных.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorState {
    /// Метаданные разобраны
    Valid,
    /// Файла метаданных нет
    Unversioned,
    /// Метаданные есть, но непригодны
    Invalid(String),
}

/// Установленный модуль.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// Имя каталога
    pub name: String,
    /// Имя из метаданных
    pub forge_name: Option<String>,
    pub version: ModuleVersion,
    /// Корневой каталог модуля
    pub path: PathBuf,
    /// Путь поиска, где найден модуль
    pub search_path: PathBuf,
    pub search_path_index: usize,
    /// Объявленные зависимости. `None` значит, что ничего не известно, и
    /// модуль видит все остальные модули.
    pub dependencies: Option<Vec<Dependency>>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub source: Option<String>,
    pub state: DescriptorState,
}

impl ModuleDescriptor {
    /// Дескриптор каталога без метаданных.
    pub fn unversioned(name: String, path: PathBuf, search_path: PathBuf, index: usize) -> Self {
        Self {
            name,
            forge_name: None,
            version: ModuleVersion::Unversioned,
            path,
            search_path,
            search_path_index: index,
            dependencies: None,
            author: None,
            license: None,
            source: None,
            state: DescriptorState::Unversioned,
        }
    }

    /// Построить дескриптор по каталогу модуля.
    ///
    /// Не падает: битые метаданные дают дескриптор `Invalid`, и модуль
    /// остаётся в листинге.
    pub fn from_directory(name: String, path: PathBuf, search_path: PathBuf, index: usize) -> Self {
        let metadata_path = path.join(METADATA_FILE);
        let mut descriptor = Self::unversioned(name, path, search_path, index);

        if !metadata_path.is_file() {
            return descriptor;
        }

        let parsed = ModuleMetadata::load(&metadata_path)
            .and_then(|meta| meta.parsed_dependencies().map(|deps| (meta, deps)));

        match parsed {
            Ok((meta, deps)) => {
                descriptor.version = ModuleVersion::from_metadata(&meta.version);
                descriptor.forge_name = Some(meta.name);
                descriptor.dependencies = Some(deps);
                descriptor.author = meta.author;
                descriptor.license = meta.license;
                descriptor.source = meta.source;
                descriptor.state = DescriptorState::Valid;
            }
            Err(e) => {
                warn!("Module '{}' has invalid metadata: {}", descriptor.name, e);
                descriptor.state = DescriptorState::Invalid(e.to_string());
            }
        }

        descriptor
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.state, DescriptorState::Invalid(_))
    }
}

/// Все модули, найденные на путях поиска.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRegistry {
    search_paths: Vec<PathBuf>,
    /// Дескрипторы в порядке обнаружения
    modules: Vec<ModuleDescriptor>,
    /// Кандидаты по имени, в порядке путей поиска
    by_name: HashMap<String, Vec<ModuleId>>,
}

impl ModuleRegistry {
    /// Обойти пути поиска и построить реестр.
    pub fn discover<P: AsRef<Path>>(search_paths: &[P]) -> ModResult<Self> {
        if search_paths.is_empty() {
            return Err(ModError::NoSearchPaths);
        }

        let mut registry = Self::default();

        for (index, search_path) in search_paths.iter().enumerate() {
            let search_path = search_path.as_ref();
            if !search_path.is_dir() {
                return Err(ModError::InvalidSearchPath(search_path.to_path_buf()));
            }
            info!("Scanning module path {}", search_path.display());
            registry.search_paths.push(search_path.to_path_buf());

            for (name, path) in module_directories(search_path)? {
                let descriptor =
                    ModuleDescriptor::from_directory(name, path, search_path.to_path_buf(), index);
                debug!(
                    "Found module '{}' ({}) in {}",
                    descriptor.name,
                    descriptor.version,
                    search_path.display()
                );
                registry.insert(descriptor);
            }
        }

        info!(
            "Discovered {} modules on {} search paths",
            registry.modules.len(),
            registry.search_paths.len()
        );
        Ok(registry)
    }

    fn insert(&mut self, descriptor: ModuleDescriptor) -> ModuleId {
        let id = ModuleId(self.modules.len());
        self.by_name
            .entry(descriptor.name.clone())
            .or_default()
            .push(id);
        self.modules.push(descriptor);
        id
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Все дескрипторы в порядке обнаружения.
    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn get(&self, id: ModuleId) -> Option<&ModuleDescriptor> {
        self.modules.get(id.0)
    }

    /// Все установленные копии модуля в порядке путей поиска.
    pub fn candidates(&self, name: &str) -> &[ModuleId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Побеждающая копия `name`: первая на путях поиска.
    pub fn default_candidate(&self, name: &str) -> Option<ModuleId> {
        self.candidates(name).first().copied()
    }

    /// Различные имена модулей в порядке обнаружения.
    pub fn names(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.modules
            .iter()
            .filter(|m| seen.insert(m.name.as_str()))
            .map(|m| m.name.as_str())
            .collect()
    }

    /// Модули одного пути поиска.
    pub fn modules_in(&self, search_path_index: usize) -> impl Iterator<Item = (ModuleId, &ModuleDescriptor)> {
        self.modules
            .iter()
            .enumerate()
            .filter(move |(_, m)| m.search_path_index == search_path_index)
            .map(|(i, m)| (ModuleId(i), m))
    }

    pub fn count(&self) -> usize {
        self.modules.len()
    }
}

/// Непосредственные нескрытые подкаталоги `dir`, по имени.
fn module_directories(dir: &Path) -> ModResult<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        found.push((name, path));
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_module(root: &Path, name: &str, metadata: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(json) = metadata {
            fs::write(dir.join(METADATA_FILE), json).unwrap();
        }
    }

    #[test]
    fn test_discover_requires_search_paths() {
        let empty: Vec<PathBuf> = Vec::new();
        assert!(matches!(
            ModuleRegistry::discover(&empty),
            Err(ModError::NoSearchPaths)
        ));
    }

    #[test]
    fn test_discover_rejects_missing_directory() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            ModuleRegistry::discover(&[missing]),
            Err(ModError::InvalidSearchPath(_))
        ));
    }

    #[test]
    fn test_discover_sorted_and_unversioned() {
        let dir = tempdir().unwrap();
        write_module(dir.path(), "zeta", None);
        write_module(dir.path(), "alpha", Some(r#"{"name": "me/alpha", "version": "1.0.0"}"#));
        fs::write(dir.path().join("README"), "not a module").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let registry = ModuleRegistry::discover(&[dir.path()]).unwrap();
        let names: Vec<_> = registry.modules().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        let zeta = &registry.modules()[1];
        assert_eq!(zeta.state, DescriptorState::Unversioned);
        assert!(zeta.dependencies.is_none());
        assert_eq!(registry.modules()[0].forge_name.as_deref(), Some("me/alpha"));
    }

    #[test]
    fn test_malformed_metadata_still_listed() {
        let dir = tempdir().unwrap();
        write_module(dir.path(), "broken", Some("{ this is not json"));
        write_module(dir.path(), "fine", Some(r#"{"name": "me/fine", "version": "2.0.0"}"#));

        let registry = ModuleRegistry::discover(&[dir.path()]).unwrap();
        assert_eq!(registry.count(), 2);
        assert!(registry.modules()[0].is_invalid());
        assert!(!registry.modules()[1].is_invalid());
    }

    #[test]
    fn test_candidates_follow_search_path_order() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        write_module(second.path(), "shared", Some(r#"{"name": "me/shared", "version": "2.0.0"}"#));
        write_module(first.path(), "shared", Some(r#"{"name": "me/shared", "version": "1.0.0"}"#));

        let registry = ModuleRegistry::discover(&[first.path(), second.path()]).unwrap();
        let candidates = registry.candidates("shared");
        assert_eq!(candidates.len(), 2);

        let winner = registry.get(registry.default_candidate("shared").unwrap()).unwrap();
        assert_eq!(winner.search_path_index, 0);
        assert_eq!(winner.version.to_string(), "v1.0.0");
        assert_eq!(registry.names(), vec!["shared"]);
    }

    #[test]
    fn test_modules_in_one_search_path() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        write_module(first.path(), "a", None);
        write_module(second.path(), "b", None);
        write_module(second.path(), "c", None);

        let registry = ModuleRegistry::discover(&[first.path(), second.path()]).unwrap();
        let second_path: Vec<_> = registry
            .modules_in(1)
            .map(|(id, m)| (id, m.name.as_str()))
            .collect();
        assert_eq!(second_path, vec![(ModuleId(1), "b"), (ModuleId(2), "c")]);
        assert_eq!(registry.modules_in(2).count(), 0);
    }

    #[test]
    fn test_discover_is_idempotent() {
        let dir = tempdir().unwrap();
        write_module(dir.path(), "b", Some(r#"{"name": "me/b", "version": "1.0.0",
            "dependencies": [{"name": "me/a", "version_requirement": "1.x"}]}"#));
        write_module(dir.path(), "a", None);

        let once = ModuleRegistry::discover(&[dir.path()]).unwrap();
        let twice = ModuleRegistry::discover(&[dir.path()]).unwrap();
        assert_eq!(once, twice);
        assert_eq!(format!("{:?}", once.modules()), format!("{:?}", twice.modules()));
    }
}

//! Установленные модули и их зависимости.
//!
//! Модуль это каталог на одном из путей поиска, возможно с файлом
//! `metadata.json`:
//!
//! ```json
//! {
//!   "name": "example/web",
//!   "version": "1.2.0",
//!   "dependencies": [
//!     { "name": "example/stdlib", "version_requirement": ">= 4.0.0 < 6.0.0" }
//!   ]
//! }
//! ```
//!
//! [`ModuleRegistry::discover`] находит модули, [`DependencyResolver`] решает,
//! что видит каждый из них.

pub mod metadata;
mod registry;
mod resolver;
mod version;

pub use metadata::{short_name, Dependency, DependencySpec, ModuleMetadata, METADATA_FILE};
pub use registry::{DescriptorState, ModuleDescriptor, ModuleId, ModuleRegistry};
pub use resolver::{
    resolve, DependencyResolver, Diagnostic, Requirer, RequirementOutcome, ResolutionEntry,
    ResolutionResult, ResolutionStatus,
};
pub use version::{ModuleVersion, VersionRequirement};

use std::path::PathBuf;

/// Пути поиска и дополнительные глобальные корни для одного запуска.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Пути поиска модулей, от самого приоритетного
    pub search_paths: Vec<PathBuf>,
    /// Корни областей окружения, от внешнего
    pub environment_roots: Vec<PathBuf>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from("modules")],
            environment_roots: Vec::new(),
        }
    }
}

//! Разрешение зависимостей.
//!
//! Для каждого найденного модуля определяет, какие модули он видит и какие
//! требования не выполнены. Проблемы собираются в диагностики, само
//! разрешение не падает.

use std::path::PathBuf;

use log::debug;

use super::metadata::Dependency;
use super::registry::{ModuleDescriptor, ModuleId, ModuleRegistry};
use super::version::{ModuleVersion, VersionRequirement};

/// Итог для одного модуля.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    /// Все зависимости установлены в подходящей версии
    Resolved,
    /// Установленная зависимость не подходит по версии
    Invalid,
    /// Объявленная зависимость не установлена
    Unmet,
}

/// Что стало с одной объявленной зависимостью.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementOutcome {
    Satisfied {
        dependency: Dependency,
        module: ModuleId,
    },
    Mismatch {
        dependency: Dependency,
        module: ModuleId,
    },
    Missing {
        dependency: Dependency,
    },
}

impl RequirementOutcome {
    pub fn dependency(&self) -> &Dependency {
        match self {
            RequirementOutcome::Satisfied { dependency, .. }
            | RequirementOutcome::Mismatch { dependency, .. }
            | RequirementOutcome::Missing { dependency } => dependency,
        }
    }

    /// Установленный модуль, на который указывает требование.
    pub fn module(&self) -> Option<ModuleId> {
        match self {
            RequirementOutcome::Satisfied { module, .. }
            | RequirementOutcome::Mismatch { module, .. } => Some(*module),
            RequirementOutcome::Missing { .. } => None,
        }
    }
}

/// Разрешение одного дескриптора.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionEntry {
    pub id: ModuleId,
    pub descriptor: ModuleDescriptor,
    /// Видимые модули в порядке поиска
    pub resolved_dependencies: Vec<ModuleId>,
    /// Итог на каждую объявленную зависимость, в порядке объявления
    pub requirements: Vec<RequirementOutcome>,
    pub status: ResolutionStatus,
    /// Копия с тем же именем есть раньше на путях поиска
    pub shadowed: bool,
}

/// Модуль, который требует зависимость.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirer {
    pub module: String,
    pub version: ModuleVersion,
    pub constraint: VersionRequirement,
}

/// Проблема графа, сгруппированная по имени модуля зависимости.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Missing {
        name: String,
        requirers: Vec<Requirer>,
    },
    VersionMismatch {
        name: String,
        installed_version: ModuleVersion,
        requirers: Vec<Requirer>,
    },
}

impl Diagnostic {
    pub fn name(&self) -> &str {
        match self {
            Diagnostic::Missing { name, .. } | Diagnostic::VersionMismatch { name, .. } => name,
        }
    }

    pub fn requirers(&self) -> &[Requirer] {
        match self {
            Diagnostic::Missing { requirers, .. }
            | Diagnostic::VersionMismatch { requirers, .. } => requirers,
        }
    }

    fn requirers_mut(&mut self) -> &mut Vec<Requirer> {
        match self {
            Diagnostic::Missing { requirers, .. }
            | Diagnostic::VersionMismatch { requirers, .. } => requirers,
        }
    }

    fn same_group(&self, other: &Diagnostic) -> bool {
        matches!(
            (self, other),
            (Diagnostic::Missing { .. }, Diagnostic::Missing { .. })
                | (Diagnostic::VersionMismatch { .. }, Diagnostic::VersionMismatch { .. })
        ) && self.name() == other.name()
    }
}

/// Всё, что построил резолвер.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    search_paths: Vec<PathBuf>,
    entries: Vec<ResolutionEntry>,
    diagnostics: Vec<Diagnostic>,
}

impl ResolutionResult {
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Записи по индексу [`ModuleId`].
    pub fn entries(&self) -> &[ResolutionEntry] {
        &self.entries
    }

    pub fn entry(&self, id: ModuleId) -> Option<&ResolutionEntry> {
        self.entries.get(id.0)
    }

    /// Запись основного (незатенённого) кандидата `name`.
    pub fn entry_by_name(&self, name: &str) -> Option<&ResolutionEntry> {
        self.entries
            .iter()
            .find(|e| !e.shadowed && e.descriptor.name == name)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_problems(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Разрешает зависимости модулей одного реестра.
pub struct DependencyResolver<'a> {
    registry: &'a ModuleRegistry,
    /// Первый кандидат каждого имени, в порядке обнаружения
    first_of_each: Vec<ModuleId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        let first_of_each = registry
            .names()
            .into_iter()
            .filter_map(|name| registry.default_candidate(name))
            .collect();

        Self {
            registry,
            first_of_each,
            diagnostics: Vec::new(),
        }
    }

    /// Разрешить все найденные модули.
    pub fn resolve(mut self) -> ResolutionResult {
        let mut entries = Vec::with_capacity(self.registry.count());

        for (index, descriptor) in self.registry.modules().iter().enumerate() {
            let id = ModuleId(index);
            let shadowed = self.registry.default_candidate(&descriptor.name) != Some(id);
            let entry = self.resolve_module(id, descriptor, shadowed);
            debug!(
                "Resolved '{}' ({:?}): {} visible modules",
                descriptor.name,
                entry.status,
                entry.resolved_dependencies.len()
            );
            entries.push(entry);
        }

        ResolutionResult {
            search_paths: self.registry.search_paths().to_vec(),
            entries,
            diagnostics: self.diagnostics,
        }
    }

    fn resolve_module(
        &mut self,
        id: ModuleId,
        descriptor: &ModuleDescriptor,
        shadowed: bool,
    ) -> ResolutionEntry {
        let Some(dependencies) = &descriptor.dependencies else {
            return ResolutionEntry {
                id,
                descriptor: descriptor.clone(),
                resolved_dependencies: self.everything_visible_from(descriptor),
                requirements: Vec::new(),
                status: ResolutionStatus::Resolved,
                shadowed,
            };
        };

        let mut resolved = Vec::new();
        let mut requirements = Vec::with_capacity(dependencies.len());
        let mut missing = false;
        let mut mismatched = false;

        for dependency in dependencies {
            let requirer = Requirer {
                module: descriptor.name.clone(),
                version: descriptor.version.clone(),
                constraint: dependency.requirement.clone(),
            };

            let Some(candidate) = self.registry.default_candidate(dependency.module_name()) else {
                missing = true;
                if !shadowed {
                    self.report(Diagnostic::Missing {
                        name: dependency.module_name().to_string(),
                        requirers: vec![requirer],
                    });
                }
                requirements.push(RequirementOutcome::Missing {
                    dependency: dependency.clone(),
                });
                continue;
            };

            let installed = match self.registry.get(candidate) {
                Some(found) => &found.version,
                None => continue,
            };

            if dependency.requirement.satisfied_by(installed) {
                resolved.push(candidate);
                requirements.push(RequirementOutcome::Satisfied {
                    dependency: dependency.clone(),
                    module: candidate,
                });
            } else {
                mismatched = true;
                if !shadowed {
                    self.report(Diagnostic::VersionMismatch {
                        name: dependency.module_name().to_string(),
                        installed_version: installed.clone(),
                        requirers: vec![requirer],
                    });
                }
                requirements.push(RequirementOutcome::Mismatch {
                    dependency: dependency.clone(),
                    module: candidate,
                });
            }
        }

        let status = if missing {
            ResolutionStatus::Unmet
        } else if mismatched {
            ResolutionStatus::Invalid
        } else {
            ResolutionStatus::Resolved
        };

        ResolutionEntry {
            id,
            descriptor: descriptor.clone(),
            resolved_dependencies: resolved,
            requirements,
            status,
            shadowed,
        }
    }

    /// Видимость модуля без объявленных зависимостей: побеждающие копии всех
    /// остальных модулей с тем же или меньшим приоритетом пути.
    fn everything_visible_from(&self, descriptor: &ModuleDescriptor) -> Vec<ModuleId> {
        self.first_of_each
            .iter()
            .copied()
            .filter(|id| {
                self.registry.get(*id).is_some_and(|other| {
                    other.name != descriptor.name
                        && other.search_path_index >= descriptor.search_path_index
                })
            })
            .collect()
    }

    /// Добавить диагностику, слив её с группой того же имени.
    fn report(&mut self, diagnostic: Diagnostic) {
        if let Some(group) = self.diagnostics.iter_mut().find(|d| d.same_group(&diagnostic)) {
            group.requirers_mut().extend(diagnostic.requirers().iter().cloned());
        } else {
            self.diagnostics.push(diagnostic);
        }
    }
}

/// Сокращение для разрешения реестра.
pub fn resolve(registry: &ModuleRegistry) -> ResolutionResult {
    DependencyResolver::new(registry).resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::metadata::METADATA_FILE;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn module(root: &Path, name: &str, version: &str, deps: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        let deps: Vec<String> = deps
            .iter()
            .map(|(n, r)| format!(r#"{{"name": "{}", "version_requirement": "{}"}}"#, n, r))
            .collect();
        let json = format!(
            r#"{{"name": "test/{}", "version": "{}", "dependencies": [{}]}}"#,
            name,
            version,
            deps.join(", ")
        );
        fs::write(dir.join(METADATA_FILE), json).unwrap();
    }

    fn resolve_dirs(dirs: &[&Path]) -> (ModuleRegistry, ResolutionResult) {
        let registry = ModuleRegistry::discover(dirs).unwrap();
        let result = resolve(&registry);
        (registry, result)
    }

    #[test]
    fn test_satisfied_dependency() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.1.0", &[("test/b", "1.1.0")]);
        module(dir.path(), "b", "1.1.0", &[]);

        let (registry, result) = resolve_dirs(&[dir.path()]);
        let a = result.entry_by_name("a").unwrap();
        assert_eq!(a.status, ResolutionStatus::Resolved);
        assert_eq!(a.resolved_dependencies, vec![registry.default_candidate("b").unwrap()]);
        assert!(!result.has_problems());
    }

    #[test]
    fn test_version_mismatch_is_invalid() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.0.0", &[("test/b", "0.4.x")]);
        module(dir.path(), "b", "0.3.0", &[]);

        let (_, result) = resolve_dirs(&[dir.path()]);
        let a = result.entry_by_name("a").unwrap();
        assert_eq!(a.status, ResolutionStatus::Invalid);
        assert!(a.resolved_dependencies.is_empty());
        assert!(matches!(a.requirements[0], RequirementOutcome::Mismatch { .. }));

        match &result.diagnostics()[0] {
            Diagnostic::VersionMismatch { name, installed_version, requirers } => {
                assert_eq!(name, "b");
                assert_eq!(installed_version.to_string(), "v0.3.0");
                assert_eq!(requirers[0].module, "a");
                assert_eq!(requirers[0].constraint.raw(), "0.4.x");
            }
            other => panic!("unexpected diagnostic {:?}", other),
        }
    }

    #[test]
    fn test_missing_dependency_grouped() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.0.0", &[("test/c", ">= 1.0.0")]);
        module(dir.path(), "d", "2.0.0", &[("test/c", "2.x")]);

        let (_, result) = resolve_dirs(&[dir.path()]);
        assert_eq!(result.diagnostics().len(), 1);

        let diagnostic = &result.diagnostics()[0];
        assert!(matches!(diagnostic, Diagnostic::Missing { .. }));
        assert_eq!(diagnostic.name(), "c");
        let requirers: Vec<_> = diagnostic
            .requirers()
            .iter()
            .map(|r| (r.module.as_str(), r.constraint.raw()))
            .collect();
        assert_eq!(requirers, vec![("a", ">= 1.0.0"), ("d", "2.x")]);
        assert_eq!(result.entry_by_name("a").unwrap().status, ResolutionStatus::Unmet);
    }

    #[test]
    fn test_missing_spellings_group_together() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.0.0", &[("t/c", ">= 1.0.0")]);
        module(dir.path(), "d", "2.0.0", &[("t-c", "2.x")]);

        let (_, result) = resolve_dirs(&[dir.path()]);
        assert_eq!(result.diagnostics().len(), 1);
        assert_eq!(result.diagnostics()[0].name(), "c");
        assert_eq!(result.diagnostics()[0].requirers().len(), 2);
    }

    #[test]
    fn test_direct_cycle_resolves() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.0.0", &[("test/b", "1.x")]);
        module(dir.path(), "b", "1.0.0", &[("test/a", "1.x")]);

        let (registry, result) = resolve_dirs(&[dir.path()]);
        let a_id = registry.default_candidate("a").unwrap();
        let b_id = registry.default_candidate("b").unwrap();

        assert!(result.diagnostics().is_empty());
        assert_eq!(result.entry(a_id).unwrap().resolved_dependencies, vec![b_id]);
        assert_eq!(result.entry(b_id).unwrap().resolved_dependencies, vec![a_id]);
        assert_eq!(result.entry(a_id).unwrap().status, ResolutionStatus::Resolved);
    }

    #[test]
    fn test_unversioned_sees_same_or_lower_precedence() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        module(first.path(), "early", "1.0.0", &[]);
        fs::create_dir_all(second.path().join("legacy")).unwrap();
        module(second.path(), "late", "1.0.0", &[]);

        let (registry, result) = resolve_dirs(&[first.path(), second.path()]);
        let legacy = result.entry_by_name("legacy").unwrap();
        assert_eq!(legacy.status, ResolutionStatus::Resolved);
        assert_eq!(legacy.resolved_dependencies, vec![registry.default_candidate("late").unwrap()]);
    }

    #[test]
    fn test_shadowed_candidate_is_never_chosen() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        module(first.path(), "lib", "1.0.0", &[]);
        module(second.path(), "lib", "2.0.0", &[]);
        module(first.path(), "app", "1.0.0", &[("test/lib", "2.x")]);

        let (_, result) = resolve_dirs(&[first.path(), second.path()]);
        // Копия 2.0.0 подошла бы, но она затенена.
        assert_eq!(result.entry_by_name("app").unwrap().status, ResolutionStatus::Invalid);
        assert!(result.entries().iter().any(|e| e.shadowed && e.descriptor.name == "lib"));
    }

    #[test]
    fn test_non_semantic_installed_version_is_unmet() {
        let dir = tempdir().unwrap();
        module(dir.path(), "needy", "1.0.0", &[("test/odd", "*")]);
        module(dir.path(), "odd", "5.1", &[]);

        let (_, result) = resolve_dirs(&[dir.path()]);
        assert_eq!(result.entry_by_name("needy").unwrap().status, ResolutionStatus::Invalid);
        assert!(matches!(result.diagnostics()[0], Diagnostic::VersionMismatch { .. }));
    }
}

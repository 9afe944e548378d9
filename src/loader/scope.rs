//! Области поиска имён.
//!
//! Область владеет своими привязками и знает, где искать ещё не привязанные
//! имена. Делегированием родителям и зависимостям управляет
//! [`LoaderChain`](super::LoaderChain); сама область ищет только у себя.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use super::entry::{Bindings, NamedEntry, Origin, Value};
use super::evaluator::SourceEvaluator;
use super::name::{NameKind, TypedName};
use crate::error::ModResult;
use crate::modules::ModuleId;

/// Идентификатор области внутри цепочки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

const SOURCE_EXTENSION: &str = "pp";

const BUILTIN_TYPES: &[&str] = &[
    "any", "array", "boolean", "callable", "collection", "data", "default", "enum", "float",
    "hash", "integer", "iterable", "numeric", "optional", "pattern", "regexp", "runtime",
    "scalar", "sensitive", "string", "struct", "timespan", "timestamp", "tuple", "type",
    "undef", "variant",
];

const BUILTIN_FUNCTIONS: &[&str] = &[
    "alert", "assert_type", "contain", "create_resources", "crit", "debug", "defined", "each",
    "emerg", "err", "fail", "filter", "include", "info", "lookup", "map", "notice", "realize",
    "reduce", "require", "split", "tag", "warning", "with",
];

const BUILTIN_CLASSES: &[&str] = &["settings"];

/// Виды областей. Интерфейс общий, различается только то, где ищет `find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    /// Встроенные имена, без обращения к файловой системе
    System,
    /// Глобальный корень (окружение или дополнительный каталог)
    Environment { root: PathBuf },
    /// Один установленный модуль
    Module {
        module: ModuleId,
        name: String,
        root: PathBuf,
        /// Области разрешённых зависимостей, в порядке поиска
        dependencies: Vec<ScopeId>,
    },
}

/// Узел цепочки загрузчиков.
#[derive(Debug)]
pub struct LoaderScope {
    loader_name: String,
    kind: ScopeKind,
    parent: Option<ScopeId>,
    bindings: Bindings,
    /// Последнее имя, найденное в собственных привязках
    last_queried: Option<(TypedName, NamedEntry)>,
    /// Уже выполненные файлы
    loaded_files: HashSet<PathBuf>,
    /// Есть ли каталог для вида имён (проверяется один раз)
    smart_paths: HashMap<NameKind, bool>,
}

impl LoaderScope {
    fn with_kind(loader_name: String, kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            loader_name,
            kind,
            parent,
            bindings: Bindings::new(),
            last_queried: None,
            loaded_files: HashSet::new(),
            smart_paths: HashMap::new(),
        }
    }

    /// Корневая область.
    pub fn system() -> Self {
        Self::with_kind("system".to_string(), ScopeKind::System, None)
    }

    pub fn environment(root: PathBuf, parent: ScopeId) -> Self {
        let loader_name = format!("environment {}", root.display());
        Self::with_kind(loader_name, ScopeKind::Environment { root }, Some(parent))
    }

    pub fn module(
        module: ModuleId,
        name: String,
        root: PathBuf,
        parent: ScopeId,
        dependencies: Vec<ScopeId>,
    ) -> Self {
        Self::with_kind(
            name.clone(),
            ScopeKind::Module {
                module,
                name,
                root,
                dependencies,
            },
            Some(parent),
        )
    }

    pub fn loader_name(&self) -> &str {
        &self.loader_name
    }

    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn loaded_files(&self) -> &HashSet<PathBuf> {
        &self.loaded_files
    }

    /// Области зависимостей (пусто для не-модульных областей).
    pub fn dependencies(&self) -> &[ScopeId] {
        match &self.kind {
            ScopeKind::Module { dependencies, .. } => dependencies,
            _ => &[],
        }
    }

    pub fn bound(&self, name: &TypedName) -> Option<&NamedEntry> {
        self.bindings.get(name)
    }

    pub fn bind(&mut self, entry: NamedEntry) -> ModResult<NamedEntry> {
        self.bindings.bind(entry)
    }

    pub(crate) fn cached(&self, name: &TypedName) -> Option<&NamedEntry> {
        match &self.last_queried {
            Some((last, entry)) if last == name => Some(entry),
            _ => None,
        }
    }

    pub(crate) fn remember(&mut self, name: &TypedName, entry: &NamedEntry) {
        self.last_queried = Some((name.clone(), entry.clone()));
    }

    /// Поиск только в этой области: встроенные имена для системной,
    /// первый существующий файл-кандидат для остальных.
    pub(crate) fn find_own(
        &mut self,
        name: &TypedName,
        evaluator: &dyn SourceEvaluator,
    ) -> ModResult<Option<NamedEntry>> {
        if let ScopeKind::System = self.kind {
            return Ok(builtin(name));
        }

        if !self.meaningful_to_search(name.kind()) {
            return Ok(None);
        }

        let Some(path) = self.candidate_paths(name).into_iter().find(|p| p.is_file()) else {
            return Ok(None);
        };

        self.execute(&path, evaluator)?;
        Ok(self.bindings.get(name).cloned())
    }

    /// Файлы, которые могут определять `name`.
    pub fn candidate_paths(&self, name: &TypedName) -> Vec<PathBuf> {
        match &self.kind {
            ScopeKind::System => Vec::new(),
            ScopeKind::Environment { root } => {
                let parts = name.parts();
                vec![source_path(&root.join(name.kind().directory()), &parts)]
            }
            ScopeKind::Module {
                name: module_name,
                root,
                ..
            } => module_candidate_paths(module_name, root, name),
        }
    }

    fn root(&self) -> Option<&Path> {
        match &self.kind {
            ScopeKind::System => None,
            ScopeKind::Environment { root } | ScopeKind::Module { root, .. } => Some(root),
        }
    }

    fn meaningful_to_search(&mut self, kind: NameKind) -> bool {
        if let Some(known) = self.smart_paths.get(&kind) {
            return *known;
        }
        let exists = self
            .root()
            .map(|root| root.join(kind.directory()).is_dir())
            .unwrap_or(false);
        self.smart_paths.insert(kind, exists);
        exists
    }

    /// Выполнить файл не более одного раза и привязать всё, что он определяет.
    fn execute(&mut self, path: &Path, evaluator: &dyn SourceEvaluator) -> ModResult<()> {
        if !self.loaded_files.insert(path.to_path_buf()) {
            return Ok(());
        }

        debug!("Scope '{}' executing {}", self.loader_name, path.display());
        let source = fs::read_to_string(path)?;
        for definition in evaluator.evaluate(path, &source)? {
            self.bindings.bind(NamedEntry::new(
                definition.name,
                definition.value,
                Origin::File(path.to_path_buf()),
            ))?;
        }
        Ok(())
    }
}

/// Файлы модуля `module_name` с корнем `root`, которые могут определять `name`.
///
/// Квалифицированное имя из чужого пространства имён в модуле не ищется.
pub(crate) fn module_candidate_paths(
    module_name: &str,
    root: &Path,
    name: &TypedName,
) -> Vec<PathBuf> {
    let parts = name.parts();
    let kind = name.kind();
    let dir = root.join(kind.directory());

    if parts.len() > 1 {
        if parts[0] != module_name {
            return Vec::new();
        }
        return vec![source_path(&dir, &parts[1..])];
    }

    let own_name = parts[0] == module_name;
    match kind {
        NameKind::Class if own_name => vec![source_path(&dir, &["init"])],
        NameKind::Type if own_name => vec![source_path(&dir, &["init_typeset"])],
        NameKind::Function => vec![source_path(&dir, &parts)],
        _ => Vec::new(),
    }
}

fn source_path(dir: &Path, parts: &[&str]) -> PathBuf {
    let mut path = dir.to_path_buf();
    for part in parts {
        path.push(part);
    }
    path.set_extension(SOURCE_EXTENSION);
    path
}

fn builtin(name: &TypedName) -> Option<NamedEntry> {
    let table = match name.kind() {
        NameKind::Function => BUILTIN_FUNCTIONS,
        NameKind::Type => BUILTIN_TYPES,
        NameKind::Class => BUILTIN_CLASSES,
    };
    table.contains(&name.name()).then(|| {
        NamedEntry::new(
            name.clone(),
            Value::Builtin(name.name().to_string()),
            Origin::Builtin,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DeclarationScanner;

    fn module_scope(root: &Path) -> LoaderScope {
        LoaderScope::module(ModuleId(0), "mymod".to_string(), root.to_path_buf(), ScopeId(0), vec![])
    }

    #[test]
    fn test_module_candidate_paths() {
        let scope = module_scope(Path::new("/mods/mymod"));

        assert_eq!(
            scope.candidate_paths(&TypedName::function("mymod::util::fmt")),
            vec![PathBuf::from("/mods/mymod/functions/util/fmt.pp")]
        );
        assert_eq!(
            scope.candidate_paths(&TypedName::class("mymod")),
            vec![PathBuf::from("/mods/mymod/manifests/init.pp")]
        );
        assert_eq!(
            scope.candidate_paths(&TypedName::type_name("Mymod")),
            vec![PathBuf::from("/mods/mymod/types/init_typeset.pp")]
        );
        assert!(scope.candidate_paths(&TypedName::class("other::thing")).is_empty());
        assert!(scope.candidate_paths(&TypedName::class("other")).is_empty());
    }

    #[test]
    fn test_environment_candidate_paths_use_every_part() {
        let scope = LoaderScope::environment(PathBuf::from("/env"), ScopeId(0));
        assert_eq!(
            scope.candidate_paths(&TypedName::type_name("site::port")),
            vec![PathBuf::from("/env/types/site/port.pp")]
        );
        assert!(scope.dependencies().is_empty());
    }

    #[test]
    fn test_system_scope_answers_builtins() {
        let mut scope = LoaderScope::system();
        let found = scope
            .find_own(&TypedName::type_name("Integer"), &DeclarationScanner)
            .unwrap()
            .unwrap();
        assert_eq!(found.origin, Origin::Builtin);
        assert!(scope
            .find_own(&TypedName::function("no_such_fn"), &DeclarationScanner)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_last_queried_matches_only_same_name() {
        let mut scope = LoaderScope::system();
        let name = TypedName::function("notice");
        let entry = builtin(&name).unwrap();
        scope.remember(&name, &entry);
        assert_eq!(scope.cached(&name), Some(&entry));
        assert!(scope.cached(&TypedName::type_name("notice")).is_none());
    }
}

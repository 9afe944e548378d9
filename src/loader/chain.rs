//! Цепочка загрузчиков.
//!
//! Области хранятся в одной арене и ссылаются друг на друга через
//! [`ScopeId`]. Области модулей сначала отложены за [`LazyScopeProxy`] и
//! строятся только тогда, когда у них действительно что-то ищут.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use log::debug;

use super::entry::{NamedEntry, Origin, Value};
use super::evaluator::{DeclarationScanner, SourceEvaluator};
use super::name::TypedName;
use super::scope::{module_candidate_paths, LoaderScope, ScopeId};
use crate::error::{ModError, ModResult};
use crate::modules::{ModuleId, ResolutionResult};

/// Фаза построения области.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePhase {
    Unconstructed,
    Constructing,
    Ready,
}

/// Заместитель области модуля до первого использования.
#[derive(Debug)]
pub enum LazyScopeProxy {
    Deferred {
        parent: ScopeId,
        module: ModuleId,
        /// Имена, которые модуль точно не определяет
        misses: HashSet<TypedName>,
    },
    /// Построение идёт прямо сейчас. Построение не вызывает поиск, так что
    /// попасть сюда повторно значит нарушить инвариант цепочки.
    Constructing { parent: ScopeId, module: ModuleId },
    Materialized(LoaderScope),
}

impl LazyScopeProxy {
    fn deferred(parent: ScopeId, module: ModuleId) -> Self {
        LazyScopeProxy::Deferred {
            parent,
            module,
            misses: HashSet::new(),
        }
    }

    /// Отвечает в любой фазе, не строя область.
    pub fn parent(&self) -> Option<ScopeId> {
        match self {
            LazyScopeProxy::Deferred { parent, .. } | LazyScopeProxy::Constructing { parent, .. } => {
                Some(*parent)
            }
            LazyScopeProxy::Materialized(scope) => scope.parent(),
        }
    }

    pub fn phase(&self) -> ScopePhase {
        match self {
            LazyScopeProxy::Deferred { .. } => ScopePhase::Unconstructed,
            LazyScopeProxy::Constructing { .. } => ScopePhase::Constructing,
            LazyScopeProxy::Materialized(_) => ScopePhase::Ready,
        }
    }

    pub fn scope(&self) -> Option<&LoaderScope> {
        match self {
            LazyScopeProxy::Materialized(scope) => Some(scope),
            _ => None,
        }
    }

    /// Имя уже проверено и модулю не принадлежит.
    pub fn known_miss(&self, name: &TypedName) -> bool {
        match self {
            LazyScopeProxy::Deferred { misses, .. } => misses.contains(name),
            _ => false,
        }
    }
}

/// Всё, что нужно для построения области модуля.
#[derive(Debug, Clone)]
struct ModuleSeed {
    name: String,
    root: PathBuf,
    dependencies: Vec<ModuleId>,
}

/// Построитель [`LoaderChain`].
pub struct LoaderChainBuilder<'a> {
    resolution: &'a ResolutionResult,
    environment_roots: Vec<PathBuf>,
    evaluator: Box<dyn SourceEvaluator>,
}

impl<'a> LoaderChainBuilder<'a> {
    /// Добавить промежуточную глобальную область. Каждый следующий корень
    /// вложен в предыдущий, области модулей подвешены к последнему.
    pub fn environment_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.environment_roots.push(root.into());
        self
    }

    pub fn evaluator(mut self, evaluator: impl SourceEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn build(self) -> LoaderChain {
        let mut scopes = vec![LazyScopeProxy::Materialized(LoaderScope::system())];
        let system = ScopeId(0);
        let mut root = system;

        for env_root in self.environment_roots {
            let id = ScopeId(scopes.len());
            scopes.push(LazyScopeProxy::Materialized(LoaderScope::environment(env_root, root)));
            root = id;
        }

        let mut module_scopes = Vec::with_capacity(self.resolution.entries().len());
        let mut seeds = Vec::with_capacity(self.resolution.entries().len());
        let mut by_name = HashMap::new();

        for entry in self.resolution.entries() {
            let id = ScopeId(scopes.len());
            scopes.push(LazyScopeProxy::deferred(root, entry.id));
            module_scopes.push(id);
            seeds.push(ModuleSeed {
                name: entry.descriptor.name.clone(),
                root: entry.descriptor.path.clone(),
                dependencies: entry.resolved_dependencies.clone(),
            });
            if !entry.shadowed {
                by_name.insert(entry.descriptor.name.clone(), entry.id);
            }
        }

        debug!(
            "Loader chain built: {} scopes, {} deferred",
            scopes.len(),
            module_scopes.len()
        );

        LoaderChain {
            scopes,
            system,
            root,
            module_scopes,
            seeds,
            by_name,
            evaluator: self.evaluator,
        }
    }
}

/// Дерево областей поиска для одного разрешения зависимостей.
pub struct LoaderChain {
    scopes: Vec<LazyScopeProxy>,
    system: ScopeId,
    /// Родитель всех областей модулей
    root: ScopeId,
    /// Индекс — `ModuleId`
    module_scopes: Vec<ScopeId>,
    seeds: Vec<ModuleSeed>,
    by_name: HashMap<String, ModuleId>,
    evaluator: Box<dyn SourceEvaluator>,
}

impl LoaderChain {
    pub fn builder(resolution: &ResolutionResult) -> LoaderChainBuilder<'_> {
        LoaderChainBuilder {
            resolution,
            environment_roots: Vec::new(),
            evaluator: Box::new(DeclarationScanner),
        }
    }

    /// Цепочка без окружений, с вычислителем по умолчанию.
    pub fn build(resolution: &ResolutionResult) -> Self {
        Self::builder(resolution).build()
    }

    pub fn system(&self) -> ScopeId {
        self.system
    }

    /// Область, к которой подвешены области модулей.
    pub fn root(&self) -> ScopeId {
        self.root
    }

    /// Область выигравшей копии модуля.
    pub fn scope_of(&self, module_name: &str) -> Option<ScopeId> {
        self.by_name
            .get(module_name)
            .and_then(|id| self.scope_for(*id))
    }

    pub fn scope_for(&self, module: ModuleId) -> Option<ScopeId> {
        self.module_scopes.get(module.0).copied()
    }

    pub fn proxy(&self, scope: ScopeId) -> Option<&LazyScopeProxy> {
        self.scopes.get(scope.0)
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.proxy(scope).and_then(LazyScopeProxy::parent)
    }

    pub fn phase(&self, scope: ScopeId) -> Option<ScopePhase> {
        self.proxy(scope).map(LazyScopeProxy::phase)
    }

    /// Область, если она уже построена.
    pub fn scope(&self, scope: ScopeId) -> Option<&LoaderScope> {
        self.proxy(scope).and_then(LazyScopeProxy::scope)
    }

    pub fn loader_name(&self, scope: ScopeId) -> Option<String> {
        match self.proxy(scope)? {
            LazyScopeProxy::Materialized(s) => Some(s.loader_name().to_string()),
            LazyScopeProxy::Deferred { module, .. } | LazyScopeProxy::Constructing { module, .. } => {
                self.seeds.get(module.0).map(|seed| seed.name.clone())
            }
        }
    }

    pub fn materialized_count(&self) -> usize {
        self.scopes
            .iter()
            .filter(|s| s.phase() == ScopePhase::Ready)
            .count()
    }

    /// Уже привязанная запись. Область не строится: у отложенной области
    /// привязок ещё нет.
    pub fn peek(&self, scope: ScopeId, name: &TypedName) -> Option<&NamedEntry> {
        self.scope(scope).and_then(|s| s.bound(name))
    }

    /// Привязать значение прямо в области.
    pub fn bind(
        &mut self,
        scope: ScopeId,
        name: TypedName,
        value: Value,
        origin: Origin,
    ) -> ModResult<NamedEntry> {
        self.materialize(scope)?
            .bind(NamedEntry::new(name, value, origin))
    }

    /// Найти `name` так, как его видит `scope`.
    ///
    /// Порядок: последний ответ, свои привязки, цепочка родителей, затем
    /// `find`. `Ok(None)` значит, что имя нигде не видно.
    pub fn load(&mut self, scope: ScopeId, name: &TypedName) -> ModResult<Option<NamedEntry>> {
        {
            let target = self.materialize(scope)?;
            if let Some(hit) = target.cached(name) {
                return Ok(Some(hit.clone()));
            }
            if let Some(bound) = target.bound(name).cloned() {
                target.remember(name, &bound);
                return Ok(Some(bound));
            }
        }

        if let Some(parent) = self.parent(scope) {
            if let Some(found) = self.load(parent, name)? {
                return Ok(Some(found));
            }
        }

        match self.find(scope, name)? {
            Some(found) => self.bind_found(scope, name, found).map(Some),
            None => Ok(None),
        }
    }

    /// Поиск в самой области и, для модулей, в её зависимостях.
    /// Побеждает первая зависимость, где имя нашлось.
    pub fn find(&mut self, scope: ScopeId, name: &TypedName) -> ModResult<Option<NamedEntry>> {
        if let Some(own) = self.find_own(scope, name)? {
            return Ok(Some(own));
        }

        let dependencies = self.materialize(scope)?.dependencies().to_vec();
        for dependency in dependencies {
            if let Some(found) = self.load_public(dependency, name)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// То, что область показывает зависящим от неё: свои привязки и свои
    /// файлы, без родителей и без собственных зависимостей. Так поиск
    /// конечен и при взаимных зависимостях.
    fn load_public(&mut self, scope: ScopeId, name: &TypedName) -> ModResult<Option<NamedEntry>> {
        if !self.may_define(scope, name) {
            return Ok(None);
        }
        {
            let target = self.materialize(scope)?;
            if let Some(bound) = target.bound(name) {
                return Ok(Some(bound.clone()));
            }
        }
        match self.find_own(scope, name)? {
            Some(found) => self.bind_found(scope, name, found).map(Some),
            None => Ok(None),
        }
    }

    /// Может ли отложенная область определять `name`: пространство имён
    /// совпадает с именем модуля, или для простого имени есть файл.
    /// Построенные области отвечают `true`. Промахи запоминаются.
    fn may_define(&mut self, scope: ScopeId, name: &TypedName) -> bool {
        let Some(proxy) = self.scopes.get_mut(scope.0) else {
            return true;
        };
        if proxy.known_miss(name) {
            return false;
        }
        let LazyScopeProxy::Deferred { module, misses, .. } = proxy else {
            return true;
        };
        let Some(seed) = self.seeds.get(module.0) else {
            return true;
        };

        let matching = match name.namespace() {
            Some(namespace) => namespace == seed.name,
            None => module_candidate_paths(&seed.name, &seed.root, name)
                .iter()
                .any(|path| path.is_file()),
        };
        if !matching {
            debug!("Module '{}' cannot define {}, not materializing", seed.name, name);
            misses.insert(name.clone());
        }
        matching
    }

    fn find_own(&mut self, scope: ScopeId, name: &TypedName) -> ModResult<Option<NamedEntry>> {
        self.materialize(scope)?;
        let evaluator = self.evaluator.as_ref();
        let target = materialized_mut(&mut self.scopes, scope)?;
        target.find_own(name, evaluator)
    }

    /// Привязать результат `find`, если выполнение файла уже не привязало его.
    fn bind_found(
        &mut self,
        scope: ScopeId,
        name: &TypedName,
        found: NamedEntry,
    ) -> ModResult<NamedEntry> {
        let target = self.materialize(scope)?;
        let entry = match target.bound(name) {
            Some(existing) => existing.clone(),
            None => target.bind(found)?,
        };
        target.remember(name, &entry);
        Ok(entry)
    }

    /// Построить отложенную область модуля и вернуть настоящую область.
    fn materialize(&mut self, scope: ScopeId) -> ModResult<&mut LoaderScope> {
        let (parent, module) = match self.scopes.get(scope.0) {
            None => return Err(ModError::UnknownScope(scope.0)),
            Some(LazyScopeProxy::Materialized(_)) => return materialized_mut(&mut self.scopes, scope),
            Some(LazyScopeProxy::Constructing { module, .. }) => {
                let name = self
                    .seeds
                    .get(module.0)
                    .map(|seed| seed.name.clone())
                    .unwrap_or_default();
                return Err(ModError::ReentrantConstruction(name));
            }
            Some(LazyScopeProxy::Deferred { parent, module, .. }) => (*parent, *module),
        };

        self.scopes[scope.0] = LazyScopeProxy::Constructing { parent, module };

        let seed = self
            .seeds
            .get(module.0)
            .cloned()
            .ok_or(ModError::UnknownScope(scope.0))?;
        let dependencies = seed
            .dependencies
            .iter()
            .filter_map(|dep| self.module_scopes.get(dep.0).copied())
            .collect();

        debug!("Materializing loader for module '{}'", seed.name);
        let real = LoaderScope::module(module, seed.name, seed.root, parent, dependencies);
        self.scopes[scope.0] = LazyScopeProxy::Materialized(real);

        materialized_mut(&mut self.scopes, scope)
    }
}

fn materialized_mut(scopes: &mut [LazyScopeProxy], scope: ScopeId) -> ModResult<&mut LoaderScope> {
    match scopes.get_mut(scope.0) {
        Some(LazyScopeProxy::Materialized(real)) => Ok(real),
        _ => Err(ModError::UnknownScope(scope.0)),
    }
}

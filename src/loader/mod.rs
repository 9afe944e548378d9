//! Иерархический поиск имён.
//!
//! [`LoaderChain`] держит по области на каждый модуль; их родители это
//! области окружения и в конце системная область. Поиск идёт так: последний
//! ответ, свои привязки, цепочка родителей, свои файлы, затем разрешённые
//! зависимости:
//!
//! ```text
//! system ── environment ──┬── module a ─→ deps: b
//!                         └── module b
//! ```
//!
//! Области модулей строятся при первом обращении.

mod chain;
mod entry;
mod evaluator;
mod name;
mod scope;

pub use chain::{LazyScopeProxy, LoaderChain, LoaderChainBuilder, ScopePhase};
pub use entry::{Bindings, NamedEntry, Origin, Value};
pub use evaluator::{DeclarationScanner, Definition, SourceEvaluator};
pub use name::{relativize, NameKind, TypedName};
pub use scope::{LoaderScope, ScopeId, ScopeKind};

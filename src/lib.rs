//! # modpath
//!
//! Поиск установленных модулей, разрешение зависимостей и иерархический
//! поиск имён для системы управления конфигурацией.
//!
//! ## Основные модули
//!
//! - [`modules`] - Поиск установленных модулей и разрешение зависимостей
//! - [`loader`] - Ленивые области поиска с делегированием родителю
//! - [`render`] - Плоский и древовидный листинг, текст диагностик
//! - [`config`] - Пути поиска и окружения из `modpath.toml`
//!
//! ## Пример
//!
//! ```rust,ignore
//! use modpath::{render, LoaderChain, ModuleRegistry, RenderMode, TypedName};
//!
//! let registry = ModuleRegistry::discover(&["/etc/modules"])?;
//! let resolution = modpath::resolve(&registry);
//! println!("{}", render(&resolution, RenderMode::Tree));
//!
//! let mut chain = LoaderChain::build(&resolution);
//! if let Some(scope) = chain.scope_of("web") {
//!     let found = chain.load(scope, &TypedName::function("web::vhost"))?;
//! }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod modules;
pub mod render;

// === Реэкспорт ===
pub use config::Settings;
pub use error::{ModError, ModResult};
pub use loader::{LoaderChain, NameKind, NamedEntry, Origin, ScopeId, TypedName};
pub use modules::{
    resolve, DependencyResolver, Diagnostic, ModuleConfig, ModuleRegistry, ResolutionResult,
    ResolutionStatus,
};
pub use render::{render, render_diagnostics, DependencyTreeRenderer, RenderMode};

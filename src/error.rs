//! Определения ошибок для modpath.

use std::path::PathBuf;

use thiserror::Error;

/// Основной тип `Result` для библиотеки.
pub type ModResult<T> = Result<T, ModError>;

/// Ошибки реестра, резолвера и цепочки загрузчиков.
///
/// Проблемы графа (отсутствующие или несовместимые зависимости, циклы) не
/// ошибки: они попадают в диагностики результата разрешения.
#[derive(Error, Debug)]
pub enum ModError {
    #[error("No module search paths given")]
    NoSearchPaths,

    #[error("Search path is not a directory: {}", .0.display())]
    InvalidSearchPath(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Malformed metadata in {}: {reason}", path.display())]
    MalformedMetadata { path: PathBuf, reason: String },

    #[error("Invalid version requirement '{0}': {1}")]
    InvalidVersionRequirement(String, String),

    /// Два источника определили одно имя в одной области.
    #[error("Attempt to redefine {name} (originally bound by {original}, redefined by {attempted})")]
    DuplicateBinding {
        name: String,
        original: String,
        attempted: String,
    },

    #[error("Scope '{0}' was requested while it was being constructed")]
    ReentrantConstruction(String),

    #[error("Unknown scope id {0}")]
    UnknownScope(usize),

    #[error("Evaluation error in {}: {message}", path.display())]
    Evaluation { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for ModError {
    fn from(err: std::io::Error) -> Self {
        ModError::IoError(err.to_string())
    }
}

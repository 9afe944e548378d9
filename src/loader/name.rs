//! Типизированные относительные имена.

use std::fmt;
use std::str::FromStr;

use crate::error::ModError;

/// Вид сущности, на которую ссылается имя.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NameKind {
    Function,
    Type,
    /// Классы и определяемые типы ресурсов
    Class,
}

impl NameKind {
    /// Каталог модуля или окружения с файлами этого вида.
    pub fn directory(&self) -> &'static str {
        match self {
            NameKind::Function => "functions",
            NameKind::Type => "types",
            NameKind::Class => "manifests",
        }
    }
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NameKind::Function => "function",
            NameKind::Type => "type",
            NameKind::Class => "class",
        };
        write!(f, "{}", text)
    }
}

impl FromStr for NameKind {
    type Err = ModError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "function" | "func" => Ok(NameKind::Function),
            "type" => Ok(NameKind::Type),
            "class" | "define" => Ok(NameKind::Class),
            other => Err(ModError::Config(format!("unknown name kind '{}'", other))),
        }
    }
}

/// Имя вместе с видом, всегда в относительной форме.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypedName {
    kind: NameKind,
    name: String,
}

impl TypedName {
    pub fn new(kind: NameKind, name: &str) -> Self {
        Self {
            kind,
            name: relativize(name),
        }
    }

    pub fn function(name: &str) -> Self {
        Self::new(NameKind::Function, name)
    }

    pub fn type_name(name: &str) -> Self {
        Self::new(NameKind::Type, name)
    }

    pub fn class(name: &str) -> Self {
        Self::new(NameKind::Class, name)
    }

    pub fn kind(&self) -> NameKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> Vec<&str> {
        self.name.split("::").collect()
    }

    pub fn is_qualified(&self) -> bool {
        self.name.contains("::")
    }

    /// Первый сегмент квалифицированного имени.
    pub fn namespace(&self) -> Option<&str> {
        self.name.split_once("::").map(|(ns, _)| ns)
    }
}

impl fmt::Display for TypedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// Нормализовать имя: убрать ведущий `::` и привести к нижнему регистру.
pub fn relativize(name: &str) -> String {
    let trimmed = name.trim();
    trimmed
        .strip_prefix("::")
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

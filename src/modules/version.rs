//! Версии модулей и требования к версиям.
//!
//! Требования понимают диалект диапазонов из метаданных (`1.x`,
//! `>= 1.0.0 < 2.0.0`, `1.0.0 - 2.0.0`, `a || b`) и проверяются через
//! [`semver`]. Голая версия означает точное совпадение, а не caret, как в Cargo.

use std::fmt;

use semver::{Version, VersionReq};

use crate::error::{ModError, ModResult};

/// Версия установленного модуля.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleVersion {
    /// В метаданных корректная семантическая версия.
    Semantic(Version),
    /// В метаданных версия не по semver (например, `5.1`).
    NonSemantic(String),
    /// Метаданных нет, версии тоже.
    Unversioned,
}

impl ModuleVersion {
    /// Разобрать поле `version` файла метаданных.
    pub fn from_metadata(raw: &str) -> Self {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        match Version::parse(trimmed) {
            Ok(version) => ModuleVersion::Semantic(version),
            Err(_) => ModuleVersion::NonSemantic(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleVersion::Semantic(v) => write!(f, "v{}", v),
            ModuleVersion::NonSemantic(raw) => write!(f, "v{}", raw),
            ModuleVersion::Unversioned => write!(f, "???"),
        }
    }
}

/// Разобранное ограничение версии.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRequirement {
    raw: String,
    /// Альтернативы через `||`; пусто значит "любая версия".
    alternatives: Vec<VersionReq>,
}

impl VersionRequirement {
    /// Требование, которому подходит любая версия.
    pub fn any() -> Self {
        Self {
            raw: String::new(),
            alternatives: Vec::new(),
        }
    }

    /// Разобрать выражение требования.
    pub fn parse(raw: &str) -> ModResult<Self> {
        let trimmed = raw.trim();
        let mut alternatives = Vec::new();

        for alternative in trimmed.split("||") {
            match normalize_alternative(alternative.trim()) {
                Some(normalized) => {
                    let req = VersionReq::parse(&normalized).map_err(|e| {
                        ModError::InvalidVersionRequirement(raw.to_string(), e.to_string())
                    })?;
                    alternatives.push(req);
                }
                None if is_wildcard(alternative.trim()) => {
                    // Одна альтернатива "любая" делает "любой" всю дизъюнкцию.
                    return Ok(Self {
                        raw: trimmed.to_string(),
                        alternatives: Vec::new(),
                    });
                }
                None => {
                    return Err(ModError::InvalidVersionRequirement(
                        raw.to_string(),
                        "dangling comparison operator".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            alternatives,
        })
    }

    /// Разобрать необязательное требование; отсутствие значит "любая".
    pub fn parse_optional(raw: Option<&str>) -> ModResult<Self> {
        match raw {
            Some(text) => Self::parse(text),
            None => Ok(Self::any()),
        }
    }

    pub fn is_any(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Проверить семантическую версию.
    pub fn matches(&self, version: &Version) -> bool {
        self.is_any() || self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Проверить версию установленного модуля.
    ///
    /// Версия не по semver не подходит никогда, модуль без версии подходит
    /// только под "любую".
    pub fn satisfied_by(&self, version: &ModuleVersion) -> bool {
        match version {
            ModuleVersion::Semantic(v) => self.matches(v),
            ModuleVersion::NonSemantic(_) => false,
            ModuleVersion::Unversioned => self.is_any(),
        }
    }
}

impl Default for VersionRequirement {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            write!(f, ">= 0.0.0")
        } else {
            write!(f, "{}", self.raw)
        }
    }
}

fn is_wildcard(text: &str) -> bool {
    matches!(text, "" | "*" | "x" | "X")
}

fn is_operator(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^'))
}

/// Переписать одну альтернативу `||` в синтаксис сравнений `semver`.
///
/// `None` для альтернативы "любая" и для висящего оператора; различает их
/// вызывающий код.
fn normalize_alternative(alternative: &str) -> Option<String> {
    if is_wildcard(alternative) {
        return None;
    }

    if let Some((low, high)) = alternative.split_once(" - ") {
        return Some(format!(
            ">={}, <={}",
            strip_v(low.trim()),
            strip_v(high.trim())
        ));
    }

    let mut comparators = Vec::new();
    let mut pending: Option<&str> = None;

    for token in alternative.split_whitespace() {
        if is_operator(token) {
            if pending.is_some() {
                return None;
            }
            pending = Some(token);
            continue;
        }
        let joined = match pending.take() {
            Some(op) => format!("{}{}", op, token),
            None => token.to_string(),
        };
        comparators.push(normalize_comparator(&joined));
    }

    if pending.is_some() || comparators.is_empty() {
        return None;
    }
    Some(comparators.join(", "))
}

fn normalize_comparator(comparator: &str) -> String {
    let split = comparator
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
        .unwrap_or(comparator.len());
    let (op, version) = comparator.split_at(split);
    let version = strip_v(version);
    let op = if op == "~>" { "~" } else { op };

    if op.is_empty() {
        let wildcard = version.contains(['x', 'X', '*']);
        if wildcard {
            version.to_string()
        } else {
            format!("={}", version)
        }
    } else {
        format!("{}{}", op, version)
    }
}

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

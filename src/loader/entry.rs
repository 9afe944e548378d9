//! Привязанные записи и таблица привязок только на добавление.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use super::name::{NameKind, TypedName};
use crate::error::{ModError, ModResult};

/// Во что разрешилось имя.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Встроенное имя из системной области
    Builtin(String),
    /// Объявление, полученное при выполнении файла
    Definition { kind: NameKind, source: String },
}

/// Откуда взялась привязка.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Builtin,
    File(PathBuf),
    /// Привязано вызывающим кодом напрямую
    Explicit(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Builtin => write!(f, "<builtin>"),
            Origin::File(path) => write!(f, "{}", path.display()),
            Origin::Explicit(label) => write!(f, "{}", label),
        }
    }
}

/// Неизменяемая привязка.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEntry {
    pub name: TypedName,
    pub value: Value,
    pub origin: Origin,
}

impl NamedEntry {
    pub fn new(name: TypedName, value: Value, origin: Origin) -> Self {
        Self {
            name,
            value,
            origin,
        }
    }
}

/// Таблица имя → запись, где имя привязывается один раз.
#[derive(Debug, Default)]
pub struct Bindings {
    entries: HashMap<TypedName, NamedEntry>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &TypedName) -> Option<&NamedEntry> {
        self.entries.get(name)
    }

    /// Вставить `entry`, если имя свободно; иначе ошибка с указанием
    /// исходной привязки.
    pub fn bind(&mut self, entry: NamedEntry) -> ModResult<NamedEntry> {
        match self.entries.entry(entry.name.clone()) {
            Entry::Occupied(existing) => Err(ModError::DuplicateBinding {
                name: existing.key().to_string(),
                original: existing.get().origin.to_string(),
                attempted: entry.origin.to_string(),
            }),
            Entry::Vacant(slot) => Ok(slot.insert(entry).clone()),
        }
    }
}

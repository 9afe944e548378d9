//! Точка подключения для выполнения файлов, найденных областями.
//!
//! Сам язык конфигурации живёт в другом месте; загрузчику нужно знать
//! только, какие имена определяет файл.

use std::path::Path;

use super::entry::Value;
use super::name::{NameKind, TypedName};
use crate::error::{ModError, ModResult};

/// Имя, которое определяет файл.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: TypedName,
    pub value: Value,
}

/// Выполняет файл и сообщает его определения.
pub trait SourceEvaluator {
    fn evaluate(&self, origin: &Path, source: &str) -> ModResult<Vec<Definition>>;
}

/// Вычислитель, который распознаёт только объявления верхнего уровня:
/// `function`, `type`, `class` и `define`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclarationScanner;

impl SourceEvaluator for DeclarationScanner {
    fn evaluate(&self, origin: &Path, source: &str) -> ModResult<Vec<Definition>> {
        let mut definitions = Vec::new();

        for (line_no, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((keyword, rest)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            let kind = match keyword {
                "function" => NameKind::Function,
                "type" => NameKind::Type,
                "class" | "define" => NameKind::Class,
                _ => continue,
            };

            let name: String = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
                .collect();
            if name.is_empty() || name.trim_matches(':').is_empty() {
                return Err(ModError::Evaluation {
                    path: origin.to_path_buf(),
                    message: format!("{} declaration without a name on line {}", keyword, line_no + 1),
                });
            }

            definitions.push(Definition {
                name: TypedName::new(kind, &name),
                value: Value::Definition {
                    kind,
                    source: line.to_string(),
                },
            });
        }

        Ok(definitions)
    }
}

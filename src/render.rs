//! Текстовые листинги результата разрешения.
//!
//! ```text
//! /etc/modules
//! └─┬ app (v1.0.0)
//!   ├── lib (v2.1.0) [/opt/shared]
//!   └── UNMET DEPENDENCY example/db (>= 1.0.0)
//! ```

use std::collections::HashSet;

use crate::modules::{
    Dependency, Diagnostic, ModuleId, RequirementOutcome, ResolutionEntry, ResolutionResult,
    ResolutionStatus,
};

/// Вид листинга.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Одна строка на установленный модуль
    #[default]
    Flat,
    /// Модули вложены под теми, кто их требует
    Tree,
}

const INVALID_MARKER: &str = "  invalid";

/// Форматирует [`ResolutionResult`] по путям поиска.
pub struct DependencyTreeRenderer<'a> {
    resolution: &'a ResolutionResult,
}

impl<'a> DependencyTreeRenderer<'a> {
    pub fn new(resolution: &'a ResolutionResult) -> Self {
        Self { resolution }
    }

    /// Блок на каждый путь поиска, блоки разделены пустой строкой.
    pub fn render(&self, mode: RenderMode) -> String {
        let blocks: Vec<String> = (0..self.resolution.search_paths().len())
            .map(|index| self.render_path(index, mode))
            .collect();
        blocks.join("\n")
    }

    fn render_path(&self, index: usize, mode: RenderMode) -> String {
        let header = self.resolution.search_paths()[index].display().to_string();
        let installed: Vec<&ResolutionEntry> = self
            .resolution
            .entries()
            .iter()
            .filter(|e| e.descriptor.search_path_index == index)
            .collect();

        if installed.is_empty() {
            return format!("{} (no modules installed)\n", header);
        }

        let mut lines = vec![header];
        match mode {
            RenderMode::Flat => {
                for (i, entry) in installed.iter().enumerate() {
                    let connector = if i + 1 == installed.len() { "└── " } else { "├── " };
                    lines.push(format!("{}{}", connector, label(entry, false, None)));
                }
            }
            RenderMode::Tree => {
                let roots = self.roots(&installed);
                let mut ancestors = Vec::new();
                for (i, root) in roots.iter().enumerate() {
                    let node = Node::Module {
                        id: *root,
                        mismatch: false,
                    };
                    self.render_node(
                        &node,
                        index,
                        "",
                        i + 1 == roots.len(),
                        &mut ancestors,
                        &mut lines,
                    );
                }
            }
        }

        let mut block = lines.join("\n");
        block.push('\n');
        block
    }

    /// Корни дерева пути: модули, которые не требует никто из того же пути.
    /// Затем то, до чего они не достают (циклы): сначала модули, которых не
    /// требуют другие недостижимые, иначе первый по имени.
    fn roots(&self, installed: &[&ResolutionEntry]) -> Vec<ModuleId> {
        let required: HashSet<ModuleId> = installed
            .iter()
            .flat_map(|e| e.requirements.iter().filter_map(RequirementOutcome::module))
            .collect();

        let mut roots: Vec<ModuleId> = installed
            .iter()
            .map(|e| e.id)
            .filter(|id| !required.contains(id))
            .collect();

        let mut reached = HashSet::new();
        for root in &roots {
            self.reach(*root, &mut reached);
        }

        loop {
            let mut leftovers: Vec<&ResolutionEntry> = installed
                .iter()
                .copied()
                .filter(|e| !reached.contains(&e.id))
                .collect();
            if leftovers.is_empty() {
                break;
            }
            leftovers.sort_by(|a, b| a.descriptor.name.cmp(&b.descriptor.name));

            let required_by_leftovers: HashSet<ModuleId> = leftovers
                .iter()
                .flat_map(|e| {
                    e.requirements
                        .iter()
                        .filter_map(RequirementOutcome::module)
                        .filter(move |dep| *dep != e.id)
                })
                .collect();
            let next = leftovers
                .iter()
                .find(|e| !required_by_leftovers.contains(&e.id))
                .unwrap_or(&leftovers[0])
                .id;

            self.reach(next, &mut reached);
            roots.push(next);
        }
        roots
    }

    fn reach(&self, id: ModuleId, reached: &mut HashSet<ModuleId>) {
        if !reached.insert(id) {
            return;
        }
        if let Some(entry) = self.resolution.entry(id) {
            for dep in entry.requirements.iter().filter_map(RequirementOutcome::module) {
                self.reach(dep, reached);
            }
        }
    }

    fn render_node(
        &self,
        node: &Node<'_>,
        path_index: usize,
        prefix: &str,
        last: bool,
        ancestors: &mut Vec<ModuleId>,
        lines: &mut Vec<String>,
    ) {
        let (text, children) = match node {
            Node::Unmet(dependency) => (
                format!("UNMET DEPENDENCY {} ({})", dependency.name, dependency.requirement),
                Vec::new(),
            ),
            Node::Module { id, mismatch } => {
                let Some(entry) = self.resolution.entry(*id) else {
                    return;
                };
                let foreign = (entry.descriptor.search_path_index != path_index)
                    .then(|| entry.descriptor.search_path.display().to_string());
                let text = label(entry, *mismatch, foreign.as_deref());
                // Уже встречался по пути от корня: обрываем цикл.
                let children = if ancestors.contains(id) {
                    Vec::new()
                } else {
                    entry.requirements.iter().map(Node::from_outcome).collect()
                };
                (text, children)
            }
        };

        let connector = match (last, children.is_empty()) {
            (true, true) => "└── ",
            (true, false) => "└─┬ ",
            (false, true) => "├── ",
            (false, false) => "├─┬ ",
        };
        lines.push(format!("{}{}{}", prefix, connector, text));

        if children.is_empty() {
            return;
        }

        let child_prefix = format!("{}{}", prefix, if last { "  " } else { "│ " });
        if let Node::Module { id, .. } = node {
            ancestors.push(*id);
        }
        for (i, child) in children.iter().enumerate() {
            self.render_node(
                child,
                path_index,
                &child_prefix,
                i + 1 == children.len(),
                ancestors,
                lines,
            );
        }
        if let Node::Module { .. } = node {
            ancestors.pop();
        }
    }

    /// Абзац на каждую сгруппированную диагностику.
    pub fn render_diagnostics(&self) -> String {
        let paragraphs: Vec<String> = self
            .resolution
            .diagnostics()
            .iter()
            .map(|diagnostic| {
                let mut lines = vec![match diagnostic {
                    Diagnostic::Missing { name, .. } => format!("Missing dependency '{}':", name),
                    Diagnostic::VersionMismatch {
                        name,
                        installed_version,
                        ..
                    } => format!(
                        "Module '{}' ({}) fails to meet some dependencies:",
                        name, installed_version
                    ),
                }];
                for requirer in diagnostic.requirers() {
                    lines.push(format!(
                        "  '{}' ({}) requires '{}' ({})",
                        requirer.module,
                        requirer.version,
                        diagnostic.name(),
                        requirer.constraint
                    ));
                }
                let mut paragraph = lines.join("\n");
                paragraph.push('\n');
                paragraph
            })
            .collect();
        paragraphs.join("\n")
    }
}

/// Строка дерева.
enum Node<'a> {
    Module { id: ModuleId, mismatch: bool },
    Unmet(&'a Dependency),
}

impl<'a> Node<'a> {
    fn from_outcome(outcome: &'a RequirementOutcome) -> Self {
        match outcome {
            RequirementOutcome::Satisfied { module, .. } => Node::Module {
                id: *module,
                mismatch: false,
            },
            RequirementOutcome::Mismatch { module, .. } => Node::Module {
                id: *module,
                mismatch: true,
            },
            RequirementOutcome::Missing { dependency } => Node::Unmet(dependency),
        }
    }
}

fn label(entry: &ResolutionEntry, mismatch: bool, foreign_path: Option<&str>) -> String {
    let mut text = format!("{} ({})", entry.descriptor.name, entry.descriptor.version);
    if let Some(path) = foreign_path {
        text.push_str(&format!(" [{}]", path));
    }
    if mismatch || entry.status != ResolutionStatus::Resolved || entry.descriptor.is_invalid() {
        text.push_str(INVALID_MARKER);
    }
    text
}

/// Сокращение для [`DependencyTreeRenderer::render`].
pub fn render(resolution: &ResolutionResult, mode: RenderMode) -> String {
    DependencyTreeRenderer::new(resolution).render(mode)
}

/// Сокращение для [`DependencyTreeRenderer::render_diagnostics`].
pub fn render_diagnostics(resolution: &ResolutionResult) -> String {
    DependencyTreeRenderer::new(resolution).render_diagnostics()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{resolve, ModuleRegistry, METADATA_FILE};
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
        fs::write(
            dir.join(METADATA_FILE),
            format!(
                r#"{{"name": "test/{}", "version": "{}", "dependencies": [{}]}}"#,
                name,
                version,
                deps.join(", ")
            ),
        )
        .unwrap();
    }

    fn resolved(dirs: &[&Path]) -> ResolutionResult {
        resolve(&ModuleRegistry::discover(dirs).unwrap())
    }

    #[test]
    fn test_flat_listing() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.0.0", &[]);
        module(dir.path(), "b", "2.0.0", &[]);

        let out = render(&resolved(&[dir.path()]), RenderMode::Flat);
        let expected = format!("{}\n├── a (v1.0.0)\n└── b (v2.0.0)\n", dir.path().display());
        assert_eq!(out, expected);
    }

    #[test]
    fn test_empty_search_path() {
        let dir = tempdir().unwrap();
        let out = render(&resolved(&[dir.path()]), RenderMode::Flat);
        assert_eq!(out, format!("{} (no modules installed)\n", dir.path().display()));

        let tree = render(&resolved(&[dir.path()]), RenderMode::Tree);
        assert_eq!(tree, out);
    }

    #[test]
    fn test_tree_linear_chain() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.0.0", &[("test/b", ">= 1.0.0")]);
        module(dir.path(), "b", "1.0.0", &[("test/c", ">= 1.0.0")]);
        module(dir.path(), "c", "1.0.0", &[]);

        let out = render(&resolved(&[dir.path()]), RenderMode::Tree);
        let expected = format!(
            "{}\n└─┬ a (v1.0.0)\n  └─┬ b (v1.0.0)\n    └── c (v1.0.0)\n",
            dir.path().display()
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_tree_markers() {
        let dir = tempdir().unwrap();
        module(
            dir.path(),
            "app",
            "1.0.0",
            &[("test/lib", "2.x"), ("test/db", ">= 1.0.0")],
        );
        module(dir.path(), "lib", "1.5.0", &[]);
        module(dir.path(), "tool", "0.1.0", &[]);

        let out = render(&resolved(&[dir.path()]), RenderMode::Tree);
        let expected = format!(
            "{}\n├─┬ app (v1.0.0)  invalid\n│ ├── lib (v1.5.0)  invalid\n│ └── UNMET DEPENDENCY test/db (>= 1.0.0)\n└── tool (v0.1.0)\n",
            dir.path().display()
        );
        assert_eq!(out, expected);

        let flat = render(&resolved(&[dir.path()]), RenderMode::Flat);
        assert!(flat.contains("├── app (v1.0.0)  invalid\n"));
        assert!(flat.contains("├── lib (v1.5.0)\n"));
    }

    #[test]
    fn test_tree_annotates_other_search_path() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        module(first.path(), "app", "1.0.0", &[("test/lib", "1.x")]);
        module(second.path(), "lib", "1.2.0", &[]);

        let out = render(&resolved(&[first.path(), second.path()]), RenderMode::Tree);
        let expected = format!(
            "{}\n└─┬ app (v1.0.0)\n  └── lib (v1.2.0) [{}]\n\n{}\n└── lib (v1.2.0)\n",
            first.path().display(),
            second.path().display(),
            second.path().display()
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_tree_cycle_terminates() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.0.0", &[("test/b", "1.x")]);
        module(dir.path(), "b", "1.0.0", &[("test/a", "1.x")]);

        let out = render(&resolved(&[dir.path()]), RenderMode::Tree);
        let expected = format!(
            "{}\n└─┬ a (v1.0.0)\n  └─┬ b (v1.0.0)\n    └── a (v1.0.0)\n",
            dir.path().display()
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_tree_roots_ignore_requirers_from_other_paths() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        module(first.path(), "x", "1.0.0", &[("test/b", "1.x")]);
        module(second.path(), "b", "1.0.0", &[("test/a", "1.x")]);
        module(second.path(), "a", "1.0.0", &[]);

        let out = render(&resolved(&[first.path(), second.path()]), RenderMode::Tree);
        let expected = format!(
            "{}\n└─┬ x (v1.0.0)\n  └─┬ b (v1.0.0) [{}]\n    └── a (v1.0.0) [{}]\n\n{}\n└─┬ b (v1.0.0)\n  └── a (v1.0.0)\n",
            first.path().display(),
            second.path().display(),
            second.path().display(),
            second.path().display()
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_tree_enters_cycle_through_its_requirer() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.0.0", &[("test/b", "1.x")]);
        module(dir.path(), "b", "1.0.0", &[("test/a", "1.x")]);
        module(dir.path(), "z", "1.0.0", &[("test/a", "1.x")]);
        module(dir.path(), "y", "1.0.0", &[("test/z", "1.x")]);

        let out = render(&resolved(&[dir.path()]), RenderMode::Tree);
        let expected = format!(
            "{}\n└─┬ y (v1.0.0)\n  └─┬ z (v1.0.0)\n    └─┬ a (v1.0.0)\n      └─┬ b (v1.0.0)\n        └── a (v1.0.0)\n",
            dir.path().display()
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_shared_dependency_rendered_per_occurrence() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.0.0", &[("test/c", "1.x")]);
        module(dir.path(), "b", "1.0.0", &[("test/c", "1.x")]);
        module(dir.path(), "c", "1.0.0", &[]);

        let out = render(&resolved(&[dir.path()]), RenderMode::Tree);
        assert_eq!(out.matches("c (v1.0.0)").count(), 2);
    }

    #[test]
    fn test_diagnostics_text() {
        let dir = tempdir().unwrap();
        module(dir.path(), "a", "1.0.0", &[("test/c", ">= 1.0.0"), ("test/b", "0.4.x")]);
        module(dir.path(), "b", "0.3.0", &[]);
        module(dir.path(), "d", "2.0.0", &[("test/c", "2.x")]);

        let out = render_diagnostics(&resolved(&[dir.path()]));
        assert_eq!(
            out,
            "Missing dependency 'c':\n  'a' (v1.0.0) requires 'c' (>= 1.0.0)\n  'd' (v2.0.0) requires 'c' (2.x)\n\nModule 'b' (v0.3.0) fails to meet some dependencies:\n  'a' (v1.0.0) requires 'b' (0.4.x)\n"
        );
    }
}

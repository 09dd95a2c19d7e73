//! The item tree — the parsed intermediate representation of a script.
//!
//! A source file parses into one [`TreeItem`] whose body is a tree of
//! [`SakuraItem`] nodes. Execution always works on deep copies of these
//! nodes: a subtree call clones the referenced tree, a loop clones its body
//! per iteration. Cloning is cheap enough at script scale and removes every
//! aliasing question from the concurrent execution path.

mod expr;

pub use expr::{Comparator, Condition, EvalError, Expression};

use crate::value::{Value, ValueMap};

/// One node of the execution tree.
#[derive(Debug, Clone)]
pub enum SakuraItem {
    /// Children run in order; the first error aborts the rest.
    Sequential(SequentialItem),
    /// Children run concurrently; all finish before the node completes.
    Parallel(ParallelItem),
    /// A named, reusable unit parsed from one source file.
    Tree(Box<TreeItem>),
    /// An unresolved reference to another tree, by id or relative path.
    Subtree(SubtreeItem),
    /// A named cluster of blossom calls sharing a group type.
    BlossomGroup(BlossomGroupItem),
    If(Box<IfItem>),
    For(Box<ForItem>),
    ForEach(Box<ForEachItem>),
}

#[derive(Debug, Clone, Default)]
pub struct SequentialItem {
    pub children: Vec<SakuraItem>,
}

#[derive(Debug, Clone, Default)]
pub struct ParallelItem {
    pub children: Vec<SakuraItem>,
}

/// A parsed source file: id, declared parameters and a body.
#[derive(Debug, Clone)]
pub struct TreeItem {
    /// Tree id from the `[id]` header.
    pub id: String,
    /// Root directory of the garden this tree was loaded into.
    pub root_path: String,
    /// Path of the source file relative to `root_path`, `/`-separated.
    pub relative_path: String,
    /// Declared parameters with their default values.
    pub values: ValueMap,
    pub body: Box<SakuraItem>,
}

impl TreeItem {
    /// Full path of the source file, for diagnostics.
    pub fn file_path(&self) -> String {
        if self.root_path.is_empty() {
            self.relative_path.clone()
        } else {
            format!("{}/{}", self.root_path, self.relative_path)
        }
    }
}

/// A call site referencing another tree by id (resource) or relative path.
#[derive(Debug, Clone)]
pub struct SubtreeItem {
    pub referenced_id: String,
    /// Caller-supplied values, applied to the resolved tree's parameters.
    pub values: ValueMap,
}

/// A named cluster of blossom calls sharing a group type.
///
/// Group values fan into each child with fill-only semantics: a value the
/// child already sets always wins over the group default.
#[derive(Debug, Clone)]
pub struct BlossomGroupItem {
    pub group_type: String,
    pub id: String,
    /// Enclosing tree/group names, outermost first, for output blocks.
    pub name_hierarchy: Vec<String>,
    pub values: ValueMap,
    pub blossoms: Vec<BlossomItem>,
}

/// A single action invocation — a leaf of the execution tree.
#[derive(Debug, Clone)]
pub struct BlossomItem {
    /// The action type, resolved against the registry or the resources.
    pub blossom_type: String,
    /// The registry group, stamped from the enclosing group.
    pub group_type: String,
    /// Display name, stamped from the enclosing group's id.
    pub name: String,
    /// Source file the call appears in, for diagnostics.
    pub file_path: String,
    pub values: ValueMap,
    /// Set by the handler on success; readable once the item has finished.
    pub output: Value,
}

impl BlossomItem {
    pub fn new(blossom_type: impl Into<String>) -> Self {
        Self {
            blossom_type: blossom_type.into(),
            group_type: String::new(),
            name: String::new(),
            file_path: String::new(),
            values: ValueMap::new(),
            output: Value::Null,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IfItem {
    pub condition: Condition,
    pub then_body: SakuraItem,
    pub else_body: SakuraItem,
}

/// Integer range loop over `[start, end)`, step +1.
#[derive(Debug, Clone)]
pub struct ForItem {
    pub var: String,
    pub start: Expression,
    pub end: Expression,
    pub body: SakuraItem,
}

/// Iteration over an array value, one sequential pass per element.
#[derive(Debug, Clone)]
pub struct ForEachItem {
    pub var: String,
    pub iterable: Expression,
    pub body: SakuraItem,
}

impl SakuraItem {
    /// Variant tag for log lines and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SakuraItem::Sequential(_) => "sequential",
            SakuraItem::Parallel(_) => "parallel",
            SakuraItem::Tree(_) => "tree",
            SakuraItem::Subtree(_) => "subtree",
            SakuraItem::BlossomGroup(_) => "blossom-group",
            SakuraItem::If(_) => "if",
            SakuraItem::For(_) => "for",
            SakuraItem::ForEach(_) => "for-each",
        }
    }

    /// Collects every subtree reference below this node.
    ///
    /// Blossom calls are included as well: a blossom whose type matches a
    /// registered resource id is a subtree call in disguise.
    pub fn collect_subtree_refs(&self, refs: &mut Vec<String>) {
        match self {
            SakuraItem::Sequential(seq) => {
                for child in &seq.children {
                    child.collect_subtree_refs(refs);
                }
            }
            SakuraItem::Parallel(par) => {
                for child in &par.children {
                    child.collect_subtree_refs(refs);
                }
            }
            SakuraItem::Tree(tree) => tree.body.collect_subtree_refs(refs),
            SakuraItem::Subtree(subtree) => refs.push(subtree.referenced_id.clone()),
            SakuraItem::BlossomGroup(group) => {
                for blossom in &group.blossoms {
                    refs.push(blossom.blossom_type.clone());
                }
            }
            SakuraItem::If(branch) => {
                branch.then_body.collect_subtree_refs(refs);
                branch.else_body.collect_subtree_refs(refs);
            }
            SakuraItem::For(item) => item.body.collect_subtree_refs(refs),
            SakuraItem::ForEach(item) => item.body.collect_subtree_refs(refs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_file_path_joins_root_and_relative() {
        let tree = TreeItem {
            id: "t".to_string(),
            root_path: "/tmp/garden".to_string(),
            relative_path: "sub/a.sakura".to_string(),
            values: ValueMap::new(),
            body: Box::new(SakuraItem::Sequential(SequentialItem::default())),
        };
        assert_eq!(tree.file_path(), "/tmp/garden/sub/a.sakura");
    }

    #[test]
    fn test_collect_subtree_refs_walks_all_branches() {
        let subtree = SakuraItem::Subtree(SubtreeItem {
            referenced_id: "other".to_string(),
            values: ValueMap::new(),
        });
        let branch = SakuraItem::If(Box::new(IfItem {
            condition: Condition {
                left: Expression::Literal(Value::Int(1)),
                op: Comparator::Equal,
                right: Expression::Literal(Value::Int(1)),
            },
            then_body: subtree,
            else_body: SakuraItem::Sequential(SequentialItem::default()),
        }));
        let root = SakuraItem::Parallel(ParallelItem {
            children: vec![branch],
        });

        let mut refs = Vec::new();
        root.collect_subtree_refs(&mut refs);
        assert_eq!(refs, vec!["other".to_string()]);
    }
}

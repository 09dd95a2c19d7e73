//! Static validation of loaded trees.
//!
//! Runs once per `process_files` call, after the garden is populated and
//! before any handler executes. Every reachable blossom call must resolve to
//! a registered handler or a resource, every handler must approve its
//! declared inputs, and the subtree reference graph must be acyclic. The
//! first failure aborts the run.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::debug;

use crate::blossom::BlossomRegistry;
use crate::error::SakuraError;
use crate::garden::SakuraGarden;
use crate::item::{BlossomItem, SakuraItem, TreeItem};
use crate::value::{merge, MergeMode};

/// Validates every tree and resource in the garden.
pub fn validate_all(
    garden: &SakuraGarden,
    registry: &BlossomRegistry,
) -> Result<(), SakuraError> {
    check_cycles(garden)?;
    for tree in garden.trees().chain(garden.resources()) {
        debug!(id = %tree.id, "validating tree");
        check_item(&tree.body, &tree.file_path(), garden, registry)?;
    }
    Ok(())
}

fn check_item(
    item: &SakuraItem,
    file_path: &str,
    garden: &SakuraGarden,
    registry: &BlossomRegistry,
) -> Result<(), SakuraError> {
    match item {
        SakuraItem::Sequential(seq) => {
            for child in &seq.children {
                check_item(child, file_path, garden, registry)?;
            }
            Ok(())
        }
        SakuraItem::Parallel(par) => {
            for child in &par.children {
                check_item(child, file_path, garden, registry)?;
            }
            Ok(())
        }
        SakuraItem::Tree(tree) => check_item(&tree.body, &tree.file_path(), garden, registry),
        // Subtree resolution happens at expansion time in the interpreter;
        // the reference graph is covered by the cycle check.
        SakuraItem::Subtree(_) => Ok(()),
        SakuraItem::BlossomGroup(group) => {
            for blossom in &group.blossoms {
                let mut filled = blossom.clone();
                filled.group_type = group.group_type.clone();
                filled.name = group.id.clone();
                filled.file_path = file_path.to_string();
                merge(&mut filled.values, &group.values, MergeMode::OnlyNonExisting);
                check_blossom(&filled, garden, registry)?;
            }
            Ok(())
        }
        SakuraItem::If(branch) => {
            check_item(&branch.then_body, file_path, garden, registry)?;
            check_item(&branch.else_body, file_path, garden, registry)
        }
        SakuraItem::For(item) => check_item(&item.body, file_path, garden, registry),
        SakuraItem::ForEach(item) => check_item(&item.body, file_path, garden, registry),
    }
}

fn check_blossom(
    item: &BlossomItem,
    garden: &SakuraGarden,
    registry: &BlossomRegistry,
) -> Result<(), SakuraError> {
    // A blossom type matching a resource id is a subtree call.
    if garden.get_resource(&item.blossom_type).is_some() {
        return Ok(());
    }

    let Some(handler) = registry.get_blossom(&item.group_type, &item.blossom_type) else {
        return Err(SakuraError::Validation {
            context: "while checking blossom-items".to_string(),
            message: format!("unknown blossom-type \"{}\"", item.blossom_type),
            blossom_group: item.group_type.clone(),
            blossom_name: item.name.clone(),
            file_path: item.file_path.clone(),
        });
    };

    handler
        .validate_input(item)
        .map_err(|message| SakuraError::Validation {
            context: "while checking blossom-items".to_string(),
            message,
            blossom_group: item.group_type.clone(),
            blossom_name: item.name.clone(),
            file_path: item.file_path.clone(),
        })
}

/// Rejects circular tree/resource references.
///
/// Nodes are trees (by relative path) and resources (by id); edges are the
/// subtree references that actually resolve within the garden.
fn check_cycles(garden: &SakuraGarden) -> Result<(), SakuraError> {
    let mut edges: HashMap<String, Vec<String>> = HashMap::new();

    let mut add_node = |tree: &TreeItem, node: String| {
        let mut refs = Vec::new();
        tree.body.collect_subtree_refs(&mut refs);

        let mut targets = Vec::new();
        for reference in refs {
            if garden.get_resource(&reference).is_some() {
                targets.push(format!("resource:{}", reference));
                continue;
            }
            let key = garden.relative_path(Path::new(&tree.file_path()), &reference);
            if garden.get_tree(&key, Path::new("")).is_some() {
                targets.push(format!("tree:{}", key));
            }
        }
        edges.insert(node, targets);
    };

    for tree in garden.trees() {
        add_node(tree, format!("tree:{}", tree.relative_path));
    }
    for resource in garden.resources() {
        add_node(resource, format!("resource:{}", resource.id));
    }

    let mut finished: HashSet<String> = HashSet::new();
    for node in edges.keys() {
        let mut on_stack = HashSet::new();
        visit(node, &edges, &mut on_stack, &mut finished)?;
    }
    Ok(())
}

fn visit(
    node: &str,
    edges: &HashMap<String, Vec<String>>,
    on_stack: &mut HashSet<String>,
    finished: &mut HashSet<String>,
) -> Result<(), SakuraError> {
    if finished.contains(node) {
        return Ok(());
    }
    if !on_stack.insert(node.to_string()) {
        return Err(SakuraError::Validation {
            context: "while checking subtree-references".to_string(),
            message: format!("circular subtree-reference involving \"{}\"", node),
            blossom_group: String::new(),
            blossom_name: String::new(),
            file_path: String::new(),
        });
    }

    if let Some(targets) = edges.get(node) {
        for target in targets {
            visit(target, edges, on_stack, finished)?;
        }
    }

    on_stack.remove(node);
    finished.insert(node.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blossom::Blossom;
    use crate::value::ValueMap;
    use std::sync::Arc;

    struct AcceptAll;
    impl Blossom for AcceptAll {
        fn validate_input(&self, _item: &BlossomItem) -> Result<(), String> {
            Ok(())
        }
        fn execute(&self, _item: &mut BlossomItem, _env: &ValueMap) -> Result<(), String> {
            Ok(())
        }
    }

    struct RequireText;
    impl Blossom for RequireText {
        fn validate_input(&self, item: &BlossomItem) -> Result<(), String> {
            if item.values.contains_key("text") {
                Ok(())
            } else {
                Err("missing value \"text\"".to_string())
            }
        }
        fn execute(&self, _item: &mut BlossomItem, _env: &ValueMap) -> Result<(), String> {
            Ok(())
        }
    }

    fn garden_with(source: &str) -> SakuraGarden {
        let mut garden = SakuraGarden::new();
        garden.add_resource(source, "inline.sakura").unwrap();
        garden
    }

    #[test]
    fn test_unknown_blossom_type_is_rejected() {
        let garden = garden_with("[t]\nbar {}\n");
        let registry = BlossomRegistry::new();

        let err = validate_all(&garden, &registry).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("unknown blossom-type"), "{rendered}");
        assert!(rendered.contains("bar"), "{rendered}");
    }

    #[test]
    fn test_registered_blossom_passes() {
        let garden = garden_with("[t]\nbar {}\n");
        let mut registry = BlossomRegistry::new();
        registry.add_blossom("bar", "bar", Arc::new(AcceptAll));

        assert!(validate_all(&garden, &registry).is_ok());
    }

    #[test]
    fn test_handler_rejection_is_surfaced() {
        let garden = garden_with("[t]\nspecial {\n-> print {\n}\n}\n");
        let mut registry = BlossomRegistry::new();
        registry.add_blossom("special", "print", Arc::new(RequireText));

        let err = validate_all(&garden, &registry).unwrap_err();
        assert!(err.to_string().contains("missing value \"text\""));
    }

    #[test]
    fn test_group_values_fill_children_before_validation() {
        // The group default supplies "text", so RequireText must accept.
        let garden = garden_with("[t]\nspecial {\n- text = \"hi\"\n-> print {\n}\n}\n");
        let mut registry = BlossomRegistry::new();
        registry.add_blossom("special", "print", Arc::new(RequireText));

        assert!(validate_all(&garden, &registry).is_ok());
    }

    #[test]
    fn test_blossom_matching_resource_is_accepted_without_registry() {
        let mut garden = SakuraGarden::new();
        garden.add_resource("[helper]\nstep {}\n", "helper.sakura").unwrap();
        // "helper {}" parses as a blossom-group call whose implicit blossom
        // type matches the resource id.
        garden.add_resource("[t]\nhelper {}\n", "t.sakura").unwrap();
        let mut registry = BlossomRegistry::new();
        registry.add_blossom("step", "step", Arc::new(AcceptAll));

        assert!(validate_all(&garden, &registry).is_ok());
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut garden = SakuraGarden::new();
        garden
            .add_resource("[loop]\nsubtree (\"loop\") {}\n", "loop.sakura")
            .unwrap();

        let err = validate_all(&garden, &BlossomRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("circular subtree-reference"));
    }

    #[test]
    fn test_mutual_reference_is_a_cycle() {
        let mut garden = SakuraGarden::new();
        garden
            .add_resource("[a]\nsubtree (\"b\") {}\n", "a.sakura")
            .unwrap();
        garden
            .add_resource("[b]\nsubtree (\"a\") {}\n", "b.sakura")
            .unwrap();

        let err = validate_all(&garden, &BlossomRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("circular subtree-reference"));
    }

    #[test]
    fn test_acyclic_references_pass() {
        let mut garden = SakuraGarden::new();
        garden
            .add_resource("[leaf]\nstep {}\n", "leaf.sakura")
            .unwrap();
        garden
            .add_resource("[top]\nsubtree (\"leaf\") {}\n", "top.sakura")
            .unwrap();
        let mut registry = BlossomRegistry::new();
        registry.add_blossom("step", "step", Arc::new(AcceptAll));

        assert!(validate_all(&garden, &registry).is_ok());
    }

    #[test]
    fn test_validator_walks_both_if_branches() {
        let garden = garden_with(
            "[t]\n- x = 1\nif (x == 1) {\ngood {}\n} else {\nbad {}\n}\n",
        );
        let mut registry = BlossomRegistry::new();
        registry.add_blossom("good", "good", Arc::new(AcceptAll));

        let err = validate_all(&garden, &registry).unwrap_err();
        assert!(err.to_string().contains("bad"));
    }
}

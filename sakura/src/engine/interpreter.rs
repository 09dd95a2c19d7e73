//! Per-item execution logic.
//!
//! The interpreter is shared by every worker. It executes one item at a
//! time, recursing through containers in the current thread and handing the
//! children of a `parallel` block to the queue. A thread that spawned a
//! parallel batch keeps pumping the queue while it waits for the batch to
//! finish, so execution makes progress with any pool size.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::debug;

use super::queue::{Completion, SubtreeObject, SubtreeQueue};
use crate::blossom::BlossomRegistry;
use crate::error::SakuraError;
use crate::garden::SakuraGarden;
use crate::item::{
    BlossomGroupItem, BlossomItem, ForEachItem, ForItem, SakuraItem, SubtreeItem, TreeItem,
};
use crate::report::Reporter;
use crate::template;
use crate::value::{check_input, merge, MergeMode, Value, ValueMap};

/// How long a helping waiter parks before rechecking the counter.
const HELP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Executes items against the garden, registry and reporter.
pub(crate) struct Interpreter {
    garden: Arc<RwLock<SakuraGarden>>,
    registry: Arc<RwLock<BlossomRegistry>>,
    queue: Arc<SubtreeQueue>,
    reporter: Arc<dyn Reporter>,
}

impl Interpreter {
    pub fn new(
        garden: Arc<RwLock<SakuraGarden>>,
        registry: Arc<RwLock<BlossomRegistry>>,
        queue: Arc<SubtreeQueue>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            garden,
            registry,
            queue,
            reporter,
        }
    }

    /// Runs one queued object to completion and reports its result.
    pub fn process_object(&self, object: SubtreeObject) {
        let SubtreeObject {
            mut item,
            mut env,
            hierarchy,
            file_path,
            completion,
        } = object;
        let result = self.process_item(&mut item, &mut env, &hierarchy, &file_path);
        completion.finish(result);
    }

    /// Entry point for the root tree: spawn as a one-element batch and wait.
    pub fn run_tree(&self, tree: TreeItem, initial_values: &ValueMap) -> Result<(), SakuraError> {
        let root = SakuraItem::Tree(Box::new(tree));
        self.spawn_parallel(std::slice::from_ref(&root), initial_values, &[], "")
    }

    fn process_item(
        &self,
        item: &mut SakuraItem,
        env: &mut ValueMap,
        hierarchy: &[String],
        file_path: &str,
    ) -> Result<(), SakuraError> {
        match item {
            SakuraItem::Sequential(seq) => {
                for child in &mut seq.children {
                    self.process_item(child, env, hierarchy, file_path)?;
                }
                Ok(())
            }
            SakuraItem::Parallel(par) => {
                self.spawn_parallel(&par.children, env, hierarchy, file_path)
            }
            SakuraItem::Tree(tree) => self.process_tree(tree, env, hierarchy),
            SakuraItem::Subtree(subtree) => {
                self.process_subtree(subtree, env, hierarchy, file_path)
            }
            SakuraItem::BlossomGroup(group) => {
                self.process_blossom_group(group, env, hierarchy, file_path)
            }
            SakuraItem::If(branch) => {
                let taken = branch
                    .condition
                    .evaluate(env)
                    .map_err(|e| expression_error(e.to_string(), file_path))?;
                if taken {
                    self.process_item(&mut branch.then_body, env, hierarchy, file_path)
                } else {
                    self.process_item(&mut branch.else_body, env, hierarchy, file_path)
                }
            }
            SakuraItem::For(item) => self.process_for(item, env, hierarchy, file_path),
            SakuraItem::ForEach(item) => self.process_for_each(item, env, hierarchy, file_path),
        }
    }

    /// Enqueues one object per child and waits for the whole batch.
    ///
    /// The wait helps: while the counter is non-zero the calling thread
    /// dequeues and runs other pending objects instead of blocking idle.
    fn spawn_parallel(
        &self,
        children: &[SakuraItem],
        env: &ValueMap,
        hierarchy: &[String],
        file_path: &str,
    ) -> Result<(), SakuraError> {
        let completion = Arc::new(Completion::new(children.len()));
        debug!(children = children.len(), "spawning parallel subtrees");

        for child in children {
            self.queue.enqueue(SubtreeObject {
                item: child.clone(),
                env: env.clone(),
                hierarchy: hierarchy.to_vec(),
                file_path: file_path.to_string(),
                completion: Arc::clone(&completion),
            });
        }

        while !completion.is_done() {
            match self.queue.try_dequeue() {
                Some(object) => self.process_object(object),
                None => completion.wait_timeout(HELP_POLL_INTERVAL),
            }
        }

        let errors = completion.take_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SakuraError::aggregate(errors))
        }
    }

    fn process_tree(
        &self,
        tree: &mut TreeItem,
        env: &mut ValueMap,
        hierarchy: &[String],
    ) -> Result<(), SakuraError> {
        let file_path = tree.file_path();

        // The tree's declared parameters become the inner environment; the
        // caller may only override keys the tree declares.
        let mut inner = tree.values.clone();
        merge(&mut inner, env, MergeMode::OnlyExisting);

        let mut hierarchy = hierarchy.to_vec();
        hierarchy.push(format!("TREE: {}", tree.id));

        self.process_item(&mut tree.body, &mut inner, &hierarchy, &file_path)
    }

    fn process_subtree(
        &self,
        subtree: &SubtreeItem,
        env: &mut ValueMap,
        hierarchy: &[String],
        file_path: &str,
    ) -> Result<(), SakuraError> {
        let caller_values = template::resolve_map(&subtree.values, env)
            .map_err(|e| expression_error(e.to_string(), file_path))?;

        let tree = self
            .resolve_tree(&subtree.referenced_id, file_path)
            .ok_or_else(|| SakuraError::Link {
                kind: "tree",
                key: subtree.referenced_id.clone(),
                file_path: file_path.to_string(),
            })?;

        self.call_tree(tree, caller_values, hierarchy, file_path)
    }

    /// Resolves a reference by resource id first, then by relative path.
    fn resolve_tree(&self, referenced_id: &str, file_path: &str) -> Option<TreeItem> {
        let garden = self.garden.read().unwrap();
        if let Some(tree) = garden.get_resource(referenced_id) {
            return Some(tree.clone());
        }
        let key = garden.relative_path(Path::new(file_path), referenced_id);
        garden.get_tree(&key, Path::new("")).cloned()
    }

    /// Executes a deep copy of a resolved tree with the caller's values.
    fn call_tree(
        &self,
        tree: TreeItem,
        caller_values: ValueMap,
        hierarchy: &[String],
        file_path: &str,
    ) -> Result<(), SakuraError> {
        let unknown = check_input(&tree.values, &caller_values);
        if !unknown.is_empty() {
            return Err(SakuraError::Validation {
                context: "while calling subtree".to_string(),
                message: format!(
                    "input-values are not valid for tree \"{}\": {}",
                    tree.id,
                    unknown.join(", ")
                ),
                blossom_group: String::new(),
                blossom_name: String::new(),
                file_path: file_path.to_string(),
            });
        }

        let mut hierarchy = hierarchy.to_vec();
        hierarchy.push(format!("SUBTREE: {}", tree.id));

        let mut item = SakuraItem::Tree(Box::new(tree));
        let mut sub_env = caller_values;
        self.process_item(&mut item, &mut sub_env, &hierarchy, file_path)
    }

    fn process_blossom_group(
        &self,
        group: &mut BlossomGroupItem,
        env: &mut ValueMap,
        hierarchy: &[String],
        file_path: &str,
    ) -> Result<(), SakuraError> {
        let mut hierarchy = hierarchy.to_vec();
        let label = if group.id.is_empty() {
            group.group_type.clone()
        } else {
            group.id.clone()
        };
        hierarchy.push(format!("BLOSSOM-GROUP: {}", label));
        group.name_hierarchy = hierarchy.clone();

        self.reporter.print(&render_hierarchy(&hierarchy));

        // Group children are always sequential; parallelism only ever comes
        // from an enclosing parallel block.
        for blossom in &mut group.blossoms {
            blossom.group_type = group.group_type.clone();
            blossom.name = group.id.clone();
            merge(&mut blossom.values, &group.values, MergeMode::OnlyNonExisting);
            self.process_blossom(blossom, env, &hierarchy, file_path)?;
        }
        Ok(())
    }

    fn process_blossom(
        &self,
        blossom: &mut BlossomItem,
        env: &mut ValueMap,
        hierarchy: &[String],
        file_path: &str,
    ) -> Result<(), SakuraError> {
        blossom.file_path = file_path.to_string();

        // A blossom type matching a resource id is a subtree call.
        let resource = {
            let garden = self.garden.read().unwrap();
            garden.get_resource(&blossom.blossom_type).cloned()
        };
        if let Some(tree) = resource {
            let caller_values = template::resolve_map(&blossom.values, env)
                .map_err(|e| expression_error(e.to_string(), file_path))?;
            return self.call_tree(tree, caller_values, hierarchy, file_path);
        }

        let handler = {
            let registry = self.registry.read().unwrap();
            registry.get_blossom(&blossom.group_type, &blossom.blossom_type)
        }
        .ok_or_else(|| {
            SakuraError::blossom_runtime(
                "while executing blossom-item",
                format!("unknown blossom-type \"{}\"", blossom.blossom_type),
                &blossom.group_type,
                &blossom.name,
                file_path,
            )
        })?;

        blossom.values = template::resolve_map(&blossom.values, env)
            .map_err(|e| expression_error(e.to_string(), file_path))?;

        debug!(
            group = %blossom.group_type,
            blossom = %blossom.blossom_type,
            "executing blossom"
        );

        handler.execute(blossom, env).map_err(|message| {
            SakuraError::blossom_runtime(
                "while executing blossom-item",
                message,
                &blossom.group_type,
                &blossom.name,
                file_path,
            )
        })?;

        self.reporter.print(&render_blossom_output(blossom));
        Ok(())
    }

    fn process_for(
        &self,
        item: &mut ForItem,
        env: &mut ValueMap,
        hierarchy: &[String],
        file_path: &str,
    ) -> Result<(), SakuraError> {
        let start = item
            .start
            .evaluate_int(env)
            .map_err(|e| expression_error(e.to_string(), file_path))?;
        let end = item
            .end
            .evaluate_int(env)
            .map_err(|e| expression_error(e.to_string(), file_path))?;

        for counter in start..end {
            env.insert(item.var.clone(), Value::Int(counter));
            // Fresh copy per pass so one iteration's outputs cannot leak
            // into the next.
            let mut body = item.body.clone();
            self.process_item(&mut body, env, hierarchy, file_path)?;
        }
        Ok(())
    }

    fn process_for_each(
        &self,
        item: &mut ForEachItem,
        env: &mut ValueMap,
        hierarchy: &[String],
        file_path: &str,
    ) -> Result<(), SakuraError> {
        let elements = item
            .iterable
            .evaluate_array(env)
            .map_err(|e| expression_error(e.to_string(), file_path))?;

        for element in elements {
            env.insert(item.var.clone(), element);
            let mut body = item.body.clone();
            self.process_item(&mut body, env, hierarchy, file_path)?;
        }
        Ok(())
    }
}

fn expression_error(message: String, file_path: &str) -> SakuraError {
    SakuraError::runtime("while evaluating expression", message, file_path)
}

/// Indented call-hierarchy block printed when a group starts.
fn render_hierarchy(hierarchy: &[String]) -> String {
    let mut out = String::new();
    for (depth, name) in hierarchy.iter().enumerate() {
        for _ in 0..depth {
            out.push_str("   ");
        }
        out.push_str(name);
        out.push('\n');
    }
    out
}

/// Result block printed after a blossom executed.
fn render_blossom_output(blossom: &BlossomItem) -> String {
    let mut out = format!(
        "- blossom: {}/{}\n",
        blossom.group_type, blossom.blossom_type
    );
    if !blossom.name.is_empty() {
        out.push_str(&format!("- name: {}\n", blossom.name));
    }
    if !blossom.file_path.is_empty() {
        out.push_str(&format!("- file-path: {}\n", blossom.file_path));
    }
    out.push_str(&format!("- output:\n{}", blossom.output));
    out
}

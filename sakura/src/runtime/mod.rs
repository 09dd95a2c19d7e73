//! The runtime facade hosts embed.
//!
//! A [`SakuraRuntime`] owns the garden, the blossom registry, the reporter
//! and the worker pool. Hosts register blossoms and resources up front, then
//! call [`SakuraRuntime::process_files`] per run. The pool starts with the
//! runtime and is joined when the runtime drops.
//!
//! # Example
//!
//! ```ignore
//! use sakura::config::RuntimeConfig;
//! use sakura::runtime::SakuraRuntime;
//!
//! let runtime = SakuraRuntime::new(RuntimeConfig::default());
//! runtime.add_blossom("special", "print", Arc::new(PrintBlossom));
//! runtime.process_files(Path::new("scripts/"), &initial_values, false)?;
//! ```

use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::blossom::{Blossom, BlossomRegistry};
use crate::config::RuntimeConfig;
use crate::engine::{Interpreter, SubtreeQueue, WorkerPool};
use crate::error::SakuraError;
use crate::garden::SakuraGarden;
use crate::report::{ConsoleReporter, Reporter};
use crate::validator;
use crate::value::{check_input, ValueMap};

/// Entry file used when the input path is a directory.
pub const DEFAULT_ENTRY_FILE: &str = "root.sakura";

/// The language runtime: garden, registry, reporter and worker pool.
pub struct SakuraRuntime {
    garden: Arc<RwLock<SakuraGarden>>,
    registry: Arc<RwLock<BlossomRegistry>>,
    interpreter: Arc<Interpreter>,
    // Held for its Drop: joins the workers when the runtime goes away.
    _pool: WorkerPool,
}

impl SakuraRuntime {
    /// Creates a runtime printing blocks to stdout.
    pub fn new(config: RuntimeConfig) -> Self {
        let reporter = Arc::new(ConsoleReporter::with_width(config.separator_width));
        Self::with_reporter(config, reporter)
    }

    /// Creates a runtime with a custom output sink.
    pub fn with_reporter(config: RuntimeConfig, reporter: Arc<dyn Reporter>) -> Self {
        let garden = Arc::new(RwLock::new(SakuraGarden::new()));
        let registry = Arc::new(RwLock::new(BlossomRegistry::new()));
        let queue = Arc::new(SubtreeQueue::new());

        let interpreter = Arc::new(Interpreter::new(
            Arc::clone(&garden),
            Arc::clone(&registry),
            Arc::clone(&queue),
            reporter,
        ));
        let pool = WorkerPool::start(config.workers, queue, Arc::clone(&interpreter));

        info!(workers = config.workers, "sakura runtime started");

        Self {
            garden,
            registry,
            interpreter,
            _pool: pool,
        }
    }

    /// Registers a blossom handler. Returns `false` when the `(group, name)`
    /// pair is already taken; the first registration wins.
    pub fn add_blossom(
        &self,
        group: impl Into<String>,
        name: impl Into<String>,
        handler: Arc<dyn Blossom>,
    ) -> bool {
        self.registry.write().unwrap().add_blossom(group, name, handler)
    }

    pub fn has_blossom(&self, group: &str, name: &str) -> bool {
        self.registry.read().unwrap().has_blossom(group, name)
    }

    /// Parses a source string and registers it as a resource under its id.
    pub fn add_resource(&self, content: &str, relative_path: &str) -> Result<(), SakuraError> {
        self.garden
            .write()
            .unwrap()
            .add_resource(content, relative_path)
    }

    /// Loads, validates and executes a script tree.
    ///
    /// `input_path` must be an existing file or a directory containing
    /// [`DEFAULT_ENTRY_FILE`]. `initial_values` override the root tree's
    /// declared parameters; unknown keys abort before anything executes.
    /// With `dry_run` the call returns right after successful validation.
    pub fn process_files(
        &self,
        input_path: &Path,
        initial_values: &ValueMap,
        dry_run: bool,
    ) -> Result<(), SakuraError> {
        let metadata = fs::metadata(input_path).map_err(|_| SakuraError::Path {
            path: input_path.display().to_string(),
            message: "not a regular file or directory as input-path".to_string(),
        })?;

        let entry = if metadata.is_dir() {
            input_path.join(DEFAULT_ENTRY_FILE)
        } else {
            input_path.to_path_buf()
        };

        self.garden.write().unwrap().add_tree(&entry)?;

        let entry_key = entry
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = entry.parent().unwrap_or(Path::new(""));

        let tree = self
            .garden
            .read()
            .unwrap()
            .get_tree(&entry_key, parent)
            .cloned()
            .ok_or_else(|| SakuraError::Link {
                kind: "tree",
                key: entry_key.clone(),
                file_path: entry.display().to_string(),
            })?;

        let unknown = check_input(&tree.values, initial_values);
        if !unknown.is_empty() {
            return Err(SakuraError::Validation {
                context: "while checking input-values".to_string(),
                message: format!(
                    "input-values are not valid for the initial tree: {}",
                    unknown.join(", ")
                ),
                blossom_group: String::new(),
                blossom_name: String::new(),
                file_path: entry.display().to_string(),
            });
        }

        {
            let garden = self.garden.read().unwrap();
            let registry = self.registry.read().unwrap();
            validator::validate_all(&garden, &registry)?;
        }

        if dry_run {
            debug!(path = %entry.display(), "dry-run validated");
            return Ok(());
        }

        info!(tree = %tree.id, "executing root tree");
        self.interpreter.run_tree(tree, initial_values)
    }
}

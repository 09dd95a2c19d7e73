//! Sakura — a runtime for hierarchical, partly parallel workflows.
//!
//! Sakura scripts describe trees of named actions ("blossoms") grouped into
//! subtrees and composed with `if`, `for`, `parallel` and `sequential`
//! blocks. The runtime parses script files into an item tree, validates
//! every blossom call against host-registered handlers, and executes the
//! tree on a worker pool that honors its sequential/parallel structure.
//!
//! # High-Level API
//!
//! Most hosts only need the [`runtime`] facade:
//!
//! ```ignore
//! use sakura::config::RuntimeConfig;
//! use sakura::runtime::SakuraRuntime;
//!
//! let runtime = SakuraRuntime::new(RuntimeConfig::default());
//! runtime.add_blossom("special", "print", Arc::new(PrintBlossom));
//! runtime.process_files(Path::new("scripts/"), &initial_values, false)?;
//! ```

pub mod blossom;
pub mod config;
pub mod error;
pub mod garden;
pub mod item;
pub mod logging;
pub mod parser;
pub mod report;
pub mod runtime;
pub mod template;
pub mod validator;
pub mod value;

mod engine;

/// Version of the Sakura library and CLI.
///
/// Synchronized across the workspace via `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

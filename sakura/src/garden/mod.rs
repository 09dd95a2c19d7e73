//! The garden — the library of everything loaded from disk.
//!
//! A garden owns the parsed trees of one script directory, resources added
//! by the host, template texts and opaque file blobs. All keys are relative
//! paths below the garden root, `/`-separated with no leading `./`. The
//! garden is populated before execution starts and only read afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::SakuraError;
use crate::item::TreeItem;
use crate::parser;

/// Directory name whose contents load into the template map.
const TEMPLATE_DIR: &str = "templates";
/// Directory name whose contents load into the file map.
const FILE_DIR: &str = "files";
/// Extension of parseable script files.
const SCRIPT_EXTENSION: &str = "sakura";

/// Registry of parsed trees, resources, templates and file blobs.
#[derive(Debug, Default)]
pub struct SakuraGarden {
    root_path: PathBuf,
    trees: HashMap<String, TreeItem>,
    resources: HashMap<String, TreeItem>,
    templates: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
}

impl SakuraGarden {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root directory of the loaded script tree.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Loads the entry file and everything reachable from its directory.
    ///
    /// The walk parses every `*.sakura` file below the entry file's parent
    /// directory, skipping directories named `templates` and `files`, whose
    /// contents land in the template and file maps instead. Re-adding an
    /// already-registered path is a no-op.
    pub fn add_tree(&mut self, entry: &Path) -> Result<(), SakuraError> {
        if !entry.is_file() {
            return Err(SakuraError::Path {
                path: entry.display().to_string(),
                message: "not a regular file".to_string(),
            });
        }

        let root = entry.parent().unwrap_or(Path::new("")).to_path_buf();
        if self.root_path.as_os_str().is_empty() {
            self.root_path = root.clone();
        }

        self.load_tree_file(entry)?;
        self.walk_directory(&root)
    }

    /// Parses a source string and registers it as a resource under its id.
    pub fn add_resource(&mut self, content: &str, relative_path: &str) -> Result<(), SakuraError> {
        let root = self.root_path.display().to_string();
        let tree = parser::parse_tree(content, &root, relative_path)?;
        debug!(id = %tree.id, "registered resource");
        self.resources.insert(tree.id.clone(), tree);
        Ok(())
    }

    /// Looks up a tree by its relative path.
    ///
    /// When a non-empty `root_path` is given it must match the garden root;
    /// a garden only ever serves trees of the directory it was loaded from.
    pub fn get_tree(&self, relative_path: &str, root_path: &Path) -> Option<&TreeItem> {
        if !root_path.as_os_str().is_empty() && root_path != self.root_path {
            return None;
        }
        self.trees.get(&normalize_key_str(relative_path))
    }

    pub fn get_resource(&self, id: &str) -> Option<&TreeItem> {
        self.resources.get(id)
    }

    pub fn get_template(&self, relative_path: &str) -> Option<&str> {
        self.templates
            .get(&normalize_key_str(relative_path))
            .map(String::as_str)
    }

    pub fn get_file(&self, relative_path: &str) -> Option<&[u8]> {
        self.files
            .get(&normalize_key_str(relative_path))
            .map(Vec::as_slice)
    }

    /// All registered trees, for the validator walk.
    pub fn trees(&self) -> impl Iterator<Item = &TreeItem> {
        self.trees.values()
    }

    /// All registered resources, for the validator walk.
    pub fn resources(&self) -> impl Iterator<Item = &TreeItem> {
        self.resources.values()
    }

    /// Canonical key of a path referenced from within a script file.
    ///
    /// Joins the referencing file's directory with the internal relative
    /// path and strips the garden root.
    pub fn relative_path(&self, referencing_file: &Path, internal: &str) -> String {
        let dir = referencing_file.parent().unwrap_or(Path::new(""));
        let joined = dir.join(internal);
        let stripped = joined
            .strip_prefix(&self.root_path)
            .unwrap_or(joined.as_path());
        normalize_key(stripped)
    }

    fn load_tree_file(&mut self, path: &Path) -> Result<(), SakuraError> {
        let relative = path
            .strip_prefix(&self.root_path)
            .unwrap_or(path)
            .to_path_buf();
        let key = normalize_key(&relative);
        if self.trees.contains_key(&key) {
            return Ok(());
        }

        let source = fs::read_to_string(path).map_err(|e| read_error(path, &e))?;
        let root = self.root_path.display().to_string();
        let tree = parser::parse_tree(&source, &root, &key)?;
        debug!(id = %tree.id, path = %key, "loaded tree");
        self.trees.insert(key, tree);
        Ok(())
    }

    fn walk_directory(&mut self, dir: &Path) -> Result<(), SakuraError> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| read_error(dir, &e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                match path.file_name().and_then(|n| n.to_str()) {
                    Some(TEMPLATE_DIR) => self.load_templates(&path)?,
                    Some(FILE_DIR) => self.load_files(&path)?,
                    _ => self.walk_directory(&path)?,
                }
            } else if path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXTENSION) {
                self.load_tree_file(&path)?;
            }
        }
        Ok(())
    }

    fn load_templates(&mut self, dir: &Path) -> Result<(), SakuraError> {
        for path in collect_files(dir)? {
            let key = normalize_key(path.strip_prefix(&self.root_path).unwrap_or(&path));
            let text = fs::read_to_string(&path).map_err(|e| read_error(&path, &e))?;
            debug!(path = %key, "loaded template");
            self.templates.insert(key, text);
        }
        Ok(())
    }

    fn load_files(&mut self, dir: &Path) -> Result<(), SakuraError> {
        for path in collect_files(dir)? {
            let key = normalize_key(path.strip_prefix(&self.root_path).unwrap_or(&path));
            let bytes = fs::read(&path).map_err(|e| read_error(&path, &e))?;
            debug!(path = %key, bytes = bytes.len(), "loaded file");
            self.files.insert(key, bytes);
        }
        Ok(())
    }
}

/// Recursively collects regular files below `dir`, in sorted order.
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, SakuraError> {
    let mut out = Vec::new();
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| read_error(dir, &e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            out.extend(collect_files(&path)?);
        } else {
            out.push(path);
        }
    }
    Ok(out)
}

/// Normalizes a path into a `/`-separated key without a leading `./`.
fn normalize_key(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

fn normalize_key_str(path: &str) -> String {
    normalize_key(Path::new(path))
}

fn read_error(path: &Path, error: &std::io::Error) -> SakuraError {
    SakuraError::Path {
        path: path.display().to_string(),
        message: format!("failed to read: {}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_add_tree_loads_whole_directory() {
        let dir = TempDir::new().unwrap();
        let entry = write(dir.path(), "root.sakura", "[root]\nstep {}\n");
        write(dir.path(), "sub/extra.sakura", "[extra]\nother {}\n");

        let mut garden = SakuraGarden::new();
        garden.add_tree(&entry).unwrap();

        assert!(garden.get_tree("root.sakura", dir.path()).is_some());
        assert!(garden.get_tree("sub/extra.sakura", dir.path()).is_some());
    }

    #[test]
    fn test_template_and_file_directories_are_not_parsed() {
        let dir = TempDir::new().unwrap();
        let entry = write(dir.path(), "root.sakura", "[root]\nstep {}\n");
        write(dir.path(), "templates/motd.txt", "hello {{who}}");
        write(dir.path(), "files/blob.bin", "rawdata");

        let mut garden = SakuraGarden::new();
        garden.add_tree(&entry).unwrap();

        assert_eq!(garden.get_template("templates/motd.txt"), Some("hello {{who}}"));
        assert_eq!(garden.get_file("files/blob.bin"), Some(b"rawdata".as_slice()));
        assert!(garden.get_tree("templates/motd.txt", dir.path()).is_none());
    }

    #[test]
    fn test_add_tree_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let entry = write(dir.path(), "root.sakura", "[root]\nstep {}\n");

        let mut garden = SakuraGarden::new();
        garden.add_tree(&entry).unwrap();
        garden.add_tree(&entry).unwrap();

        assert_eq!(garden.trees().count(), 1);
    }

    #[test]
    fn test_get_tree_checks_root_path() {
        let dir = TempDir::new().unwrap();
        let entry = write(dir.path(), "root.sakura", "[root]\nstep {}\n");

        let mut garden = SakuraGarden::new();
        garden.add_tree(&entry).unwrap();

        assert!(garden.get_tree("root.sakura", Path::new("/elsewhere")).is_none());
        assert!(garden.get_tree("root.sakura", Path::new("")).is_some());
    }

    #[test]
    fn test_parse_failure_surfaces_as_parse_error() {
        let dir = TempDir::new().unwrap();
        let entry = write(dir.path(), "root.sakura", "[root\n");

        let mut garden = SakuraGarden::new();
        let err = garden.add_tree(&entry).unwrap_err();
        assert!(matches!(err, SakuraError::Parse(_)));
    }

    #[test]
    fn test_add_resource_registers_by_id() {
        let mut garden = SakuraGarden::new();
        garden
            .add_resource("[helper]\nstep {}\n", "inline/helper.sakura")
            .unwrap();
        assert!(garden.get_resource("helper").is_some());
        assert!(garden.get_resource("nope").is_none());
    }

    #[test]
    fn test_relative_path_strips_root() {
        let dir = TempDir::new().unwrap();
        let entry = write(dir.path(), "root.sakura", "[root]\nstep {}\n");

        let mut garden = SakuraGarden::new();
        garden.add_tree(&entry).unwrap();

        let referencing = dir.path().join("sub/caller.sakura");
        assert_eq!(
            garden.relative_path(&referencing, "helper.sakura"),
            "sub/helper.sakura"
        );
    }

    #[test]
    fn test_missing_path_is_rejected() {
        let mut garden = SakuraGarden::new();
        let err = garden.add_tree(Path::new("/does/not/exist.sakura")).unwrap_err();
        assert!(matches!(err, SakuraError::Path { .. }));
    }
}

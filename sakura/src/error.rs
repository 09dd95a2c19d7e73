//! Error surface of the runtime.
//!
//! Every user-visible error renders as a key-value block with `component`,
//! `source` and `message` rows plus kind-specific rows (line numbers, blossom
//! identity, file paths). Parse errors live in [`crate::parser`] and are
//! wrapped transparently.

use thiserror::Error;

use crate::parser::ParseError;

/// Renders an aligned key-value block, the shared format of all errors.
pub(crate) fn render_rows(rows: &[(&str, String)]) -> String {
    let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut out = String::from("ERROR");
    for (key, value) in rows {
        if value.is_empty() {
            continue;
        }
        out.push_str(&format!("\n    {:<width$} : {}", key, value, width = width));
    }
    out
}

/// Top-level error of every runtime operation.
#[derive(Debug, Error)]
pub enum SakuraError {
    /// Input path missing, unreadable or of the wrong kind.
    #[error("{}", path_block(.path, .message))]
    Path { path: String, message: String },

    /// The grammar rejected a source file.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A referenced tree, resource, template or file is not in the garden.
    #[error("{}", link_block(.kind, .key, .file_path))]
    Link {
        kind: &'static str,
        key: String,
        file_path: String,
    },

    /// The static validator rejected the tree before execution.
    #[error("{}", item_block("sakura-validator", .context, .message, .blossom_group, .blossom_name, .file_path))]
    Validation {
        context: String,
        message: String,
        blossom_group: String,
        blossom_name: String,
        file_path: String,
    },

    /// A handler or expression failed during execution.
    #[error("{}", item_block("sakura-runtime", .context, .message, .blossom_group, .blossom_name, .file_path))]
    Runtime {
        context: String,
        message: String,
        blossom_group: String,
        blossom_name: String,
        file_path: String,
    },

    /// Collected failures of a parallel block; siblings are never preempted,
    /// so several children may fail independently.
    #[error("{}", join_errors(.0))]
    Aggregate(Vec<SakuraError>),
}

impl SakuraError {
    /// Folds an error bag into a single error. A single entry passes through
    /// unwrapped; an empty bag is a caller bug and maps to an empty aggregate.
    pub fn aggregate(mut errors: Vec<SakuraError>) -> SakuraError {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            SakuraError::Aggregate(errors)
        }
    }

    /// Runtime error carrying a blossom identity.
    pub(crate) fn blossom_runtime(
        context: impl Into<String>,
        message: impl Into<String>,
        group: impl Into<String>,
        name: impl Into<String>,
        file_path: impl Into<String>,
    ) -> SakuraError {
        SakuraError::Runtime {
            context: context.into(),
            message: message.into(),
            blossom_group: group.into(),
            blossom_name: name.into(),
            file_path: file_path.into(),
        }
    }

    /// Runtime error with no blossom context (expression failures and the
    /// like).
    pub(crate) fn runtime(
        context: impl Into<String>,
        message: impl Into<String>,
        file_path: impl Into<String>,
    ) -> SakuraError {
        SakuraError::Runtime {
            context: context.into(),
            message: message.into(),
            blossom_group: String::new(),
            blossom_name: String::new(),
            file_path: file_path.into(),
        }
    }
}

fn path_block(path: &str, message: &str) -> String {
    render_rows(&[
        ("component", "sakura-runtime".to_string()),
        ("source", "while reading sakura-files".to_string()),
        ("message", message.to_string()),
        ("path", path.to_string()),
    ])
}

fn link_block(kind: &str, key: &str, file_path: &str) -> String {
    render_rows(&[
        ("component", "sakura-garden".to_string()),
        ("source", "while resolving references".to_string()),
        ("message", format!("no {} found for \"{}\"", kind, key)),
        ("file-path", file_path.to_string()),
    ])
}

fn item_block(
    component: &str,
    context: &str,
    message: &str,
    blossom_group: &str,
    blossom_name: &str,
    file_path: &str,
) -> String {
    render_rows(&[
        ("component", component.to_string()),
        ("source", context.to_string()),
        ("message", message.to_string()),
        ("blossom-group", blossom_group.to_string()),
        ("blossom-name", blossom_name.to_string()),
        ("file-path", file_path.to_string()),
    ])
}

fn join_errors(errors: &[SakuraError]) -> String {
    let mut out = String::new();
    for (i, error) in errors.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&error.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_renders_block() {
        let error = SakuraError::Path {
            path: "/nope".to_string(),
            message: "not a regular file or directory".to_string(),
        };
        let rendered = error.to_string();
        assert!(rendered.starts_with("ERROR"));
        assert!(rendered.contains("component"));
        assert!(rendered.contains("sakura-runtime"));
        assert!(rendered.contains("/nope"));
    }

    #[test]
    fn test_empty_rows_are_skipped() {
        let error = SakuraError::runtime("while executing", "boom", "");
        let rendered = error.to_string();
        assert!(!rendered.contains("file-path"));
        assert!(!rendered.contains("blossom-group"));
    }

    #[test]
    fn test_aggregate_unwraps_single_error() {
        let single = SakuraError::aggregate(vec![SakuraError::runtime("s", "only", "")]);
        assert!(matches!(single, SakuraError::Runtime { .. }));
    }

    #[test]
    fn test_aggregate_joins_all_messages() {
        let error = SakuraError::aggregate(vec![
            SakuraError::runtime("s", "E1", ""),
            SakuraError::runtime("s", "E2", ""),
        ]);
        let rendered = error.to_string();
        assert!(rendered.contains("E1"));
        assert!(rendered.contains("E2"));
    }

    #[test]
    fn test_link_error_names_the_missing_kind() {
        let error = SakuraError::Link {
            kind: "resource",
            key: "ghost".to_string(),
            file_path: "a/b.sakura".to_string(),
        };
        let rendered = error.to_string();
        assert!(rendered.contains("no resource found for \"ghost\""));
        assert!(rendered.contains("a/b.sakura"));
    }
}

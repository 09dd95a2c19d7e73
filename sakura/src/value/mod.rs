//! Dynamically typed values and environments.
//!
//! Every item in a Sakura tree carries a [`ValueMap`] of named values: the
//! tree's declared parameters, a blossom group's defaults, a blossom's
//! inputs. Values are plain owned data — copying an environment across a
//! subtree boundary is a deep copy, so no two items ever alias storage.

use std::collections::BTreeMap;
use std::fmt;

/// A named value environment, as seen by a single item.
///
/// Lookups are by key; iteration order is the sorted key order, which only
/// matters for display and error listings.
pub type ValueMap = BTreeMap<String, Value>;

/// A dynamically typed Sakura value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Map(ValueMap),
}

impl Value {
    /// Returns the contained integer, coercing from float when lossless.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Returns the contained boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the contained string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the contained array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Short name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// How [`merge`] treats keys that already exist in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Every key from the source overwrites the destination.
    Replace,
    /// Source entries are only inserted where the destination has no key.
    /// Used by blossom groups to fill defaults into child blossoms.
    OnlyNonExisting,
    /// Source entries only overwrite keys the destination already declares.
    /// Used to apply caller values to a tree's declared parameters.
    OnlyExisting,
}

/// Merges `src` into `dst` according to `mode`. Values are deep-copied.
pub fn merge(dst: &mut ValueMap, src: &ValueMap, mode: MergeMode) {
    for (key, value) in src {
        match mode {
            MergeMode::Replace => {
                dst.insert(key.clone(), value.clone());
            }
            MergeMode::OnlyNonExisting => {
                if !dst.contains_key(key) {
                    dst.insert(key.clone(), value.clone());
                }
            }
            MergeMode::OnlyExisting => {
                if let Some(slot) = dst.get_mut(key) {
                    *slot = value.clone();
                }
            }
        }
    }
}

/// Returns the keys of `supplied` that `declared` does not know about.
///
/// A non-empty result aborts execution; the list is the user-facing error
/// payload.
pub fn check_input(declared: &ValueMap, supplied: &ValueMap) -> Vec<String> {
    supplied
        .keys()
        .filter(|key| !declared.contains_key(*key))
        .cloned()
        .collect()
}

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use serde_json::Value;

use super::{FieldMarker, MarkupRejected, StringMode, StringPolicy};
use crate::validation::FieldError;

/// Static marker metadata for one field, keyed by its JSON (wire) name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub markers: &'static [FieldMarker],
}

impl FieldSpec {
    pub const fn new(name: &'static str, markers: &'static [FieldMarker]) -> Self {
        Self { name, markers }
    }
}

/// Implemented by request bodies bound through
/// [`ValidatedJson`](crate::ValidatedJson).
///
/// Field names are wire names, i.e. after any `#[serde(rename)]`. Strings
/// nested inside a member (objects, arrays, any depth) take that member's
/// mode; a non-object body takes the type's default mode.
pub trait StringFields {
    const POLICY: StringPolicy = StringPolicy::Untouched;
    const FIELDS: &'static [FieldSpec] = &[];
}

static RESOLVED: Lazy<RwLock<HashMap<TypeId, Arc<FieldModes>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Resolved per-field modes of one request type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldModes {
    default: StringMode,
    fields: HashMap<&'static str, StringMode>,
}

impl FieldModes {
    /// Resolve `policy` and `specs` into per-field modes.
    pub fn resolve(policy: StringPolicy, specs: &[FieldSpec]) -> Self {
        let fields = specs
            .iter()
            .map(|spec| (spec.name, StringMode::resolve(policy, spec.markers)))
            .collect();

        Self {
            default: policy.base_mode(),
            fields,
        }
    }

    /// Modes for `T`, resolved on first use and shared afterwards.
    pub fn for_type<T>() -> Arc<FieldModes>
    where
        T: StringFields + 'static,
    {
        let key = TypeId::of::<T>();

        if let Some(modes) = RESOLVED
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
        {
            return Arc::clone(modes);
        }

        let mut resolved = RESOLVED
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let modes = resolved.entry(key).or_insert_with(|| {
            tracing::debug!(
                type_name = std::any::type_name::<T>(),
                fields = T::FIELDS.len(),
                "Resolved string field modes"
            );
            Arc::new(FieldModes::resolve(T::POLICY, T::FIELDS))
        });
        Arc::clone(modes)
    }

    pub fn default_mode(&self) -> StringMode {
        self.default
    }

    pub fn mode_for(&self, field: &str) -> StringMode {
        self.fields.get(field).copied().unwrap_or(self.default)
    }

    /// Apply the resolved modes to a JSON body in place.
    ///
    /// Every string is reached, however deeply nested; `null` and other
    /// scalars are left as they are. Each rejected string is reported by its
    /// path (`author.name`, `replies[0].text`).
    pub fn apply(&self, body: &mut Value) -> Result<(), Vec<FieldError>> {
        let mut rejected = Vec::new();

        match body {
            Value::Object(members) => {
                for (name, value) in members.iter_mut() {
                    let mode = self.mode_for(name);
                    if !mode.is_untouched() {
                        process_tree(mode, value, name.clone(), &mut rejected);
                    }
                }
            }
            other if !self.default.is_untouched() => {
                process_tree(self.default, other, ROOT_PATH.to_string(), &mut rejected);
            }
            _ => {}
        }

        if rejected.is_empty() {
            Ok(())
        } else {
            Err(rejected
                .into_iter()
                .map(|path| FieldError::new(path, MarkupRejected::MESSAGE))
                .collect())
        }
    }
}

const ROOT_PATH: &str = "body";

fn process_tree(mode: StringMode, value: &mut Value, path: String, rejected: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if process_in_place(mode, s) {
                rejected.push(path);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                process_tree(mode, item, format!("{path}[{index}]"), rejected);
            }
        }
        Value::Object(members) => {
            for (key, item) in members.iter_mut() {
                process_tree(mode, item, format!("{path}.{key}"), rejected);
            }
        }
        _ => {}
    }
}

/// Returns true if the value was rejected.
fn process_in_place(mode: StringMode, value: &mut String) -> bool {
    match mode.process(std::mem::take(value)) {
        Ok(processed) => {
            *value = processed;
            false
        }
        Err(_) => true,
    }
}

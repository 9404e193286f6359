// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Payload access for tool invocations.
//!
//! Tool parameters arrive either as a loosely-typed JSON tree or as a flat
//! key/value map depending on the transport binding. The gate probes both
//! through one small trait, selected once at the boundary; a malformed
//! shape degrades to "nothing found", never an error.

use std::collections::HashMap;

use serde_json::Value;

/// Field names probed, in order, for the path of the file being modified.
pub const FILE_PATH_FIELDS: &[&str] = &["file_path", "filePath", "notebook_path"];

/// Field names probed, in order, for the modification text itself.
pub const CONTENT_FIELDS: &[&str] = &["new_string", "content", "new_source"];

const EDITS_FIELD: &str = "edits";
const EDIT_FRAGMENT_FIELD: &str = "new_string";

/// Read access to one concrete payload shape.
pub trait PayloadView: Send + Sync {
    /// Value of the first present field among `field_names`.
    fn get_string(&self, field_names: &[&str]) -> Option<String>;

    /// Text fragments of an `edits` array, in order. Empty when the payload
    /// has no such array.
    fn edit_fragments(&self) -> Vec<String>;
}

/// A JSON parameter tree as delivered by JSON-RPC-style transports.
pub struct JsonPayload {
    root: Value,
}

impl JsonPayload {
    pub fn new(root: Value) -> Self {
        Self { root }
    }
}

impl PayloadView for JsonPayload {
    fn get_string(&self, field_names: &[&str]) -> Option<String> {
        let fields = self.root.as_object()?;
        field_names
            .iter()
            .find_map(|name| fields.get(*name).and_then(Value::as_str))
            .map(str::to_string)
    }

    fn edit_fragments(&self) -> Vec<String> {
        self.root
            .get(EDITS_FIELD)
            .and_then(Value::as_array)
            .map(|edits| {
                edits
                    .iter()
                    .filter_map(|edit| edit.get(EDIT_FRAGMENT_FIELD).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A flat, already-reflected parameter map.
pub struct KeyValuePayload {
    fields: HashMap<String, String>,
}

impl KeyValuePayload {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }
}

impl PayloadView for KeyValuePayload {
    fn get_string(&self, field_names: &[&str]) -> Option<String> {
        field_names
            .iter()
            .find_map(|name| self.fields.get(*name))
            .cloned()
    }

    fn edit_fragments(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Path of the file the payload modifies, if it names one.
pub fn file_path(payload: &dyn PayloadView) -> Option<String> {
    payload.get_string(FILE_PATH_FIELDS)
}

/// The text being written: a direct content field, or the concatenation
/// of every `edits` fragment.
pub fn modification_text(payload: &dyn PayloadView) -> Option<String> {
    payload.get_string(CONTENT_FIELDS).or_else(|| {
        let fragments = payload.edit_fragments();
        if fragments.is_empty() {
            None
        } else {
            Some(fragments.join("\n"))
        }
    })
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tree::{Element, Node};

/// Id prefix shared by every global Value node.
pub const VALUE_ID_PREFIX: &str = "xccdf_preupg_value_";

/// Run parameters exported to modules as global XCCDF Values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalValues {
    pub result_dir: PathBuf,
    pub scenario: String,
    /// Requested modes, e.g. `migrate` or `upgrade`; none means both.
    pub mode: Option<String>,
    pub devel_mode: bool,
    /// Distribution-signing mode; `sign` when unset.
    pub dist_native: Option<String>,
}

impl GlobalValues {
    pub fn report_dir(&self) -> PathBuf {
        self.result_dir.join(&self.scenario)
    }

    fn mode_flag(&self) -> String {
        let enabled = match self.mode.as_deref() {
            None | Some("") => true,
            Some(mode) => mode.contains("migrate") || mode.contains("upgrade"),
        };
        flag(enabled)
    }
}

fn flag(enabled: bool) -> String {
    if enabled { "1" } else { "0" }.to_string()
}

type Resolver = fn(&GlobalValues) -> String;

/// Global values in the order they appear after each Profile.
pub const GLOBAL_VALUES: &[(&str, Resolver)] = &[
    ("tmp_preupgrade", |v: &GlobalValues| v.result_dir.display().to_string()),
    ("report_dir", |v: &GlobalValues| v.report_dir().display().to_string()),
    ("migrate", GlobalValues::mode_flag),
    ("upgrade", GlobalValues::mode_flag),
    ("devel_mode", |v: &GlobalValues| flag(v.devel_mode)),
    ("dist_native", |v: &GlobalValues| {
        v.dist_native.clone().unwrap_or_else(|| "sign".to_string())
    }),
];

/// Insert or update the global Values directly after every Profile child of `root`.
pub(crate) fn apply(root: &mut Element, values: &GlobalValues) {
    let resolved: Vec<(String, String)> = GLOBAL_VALUES
        .iter()
        .map(|(key, resolve)| (format!("{VALUE_ID_PREFIX}{key}"), resolve(values)))
        .collect();

    let mut index = 0;
    while index < root.children.len() {
        let profile_prefix = match &root.children[index] {
            Node::Element(element) if element.is("Profile") => element.prefix().map(str::to_string),
            _ => {
                index += 1;
                continue;
            }
        };
        let run_start = index + 1;
        let mut cursor = run_start;
        for (id, value) in &resolved {
            debug!(id = %id, value = %value, "global value");
            if let Some(at) = find_in_run(root, run_start, id) {
                if let Node::Element(existing) = &mut root.children[at] {
                    update_value(existing, value);
                }
                cursor = cursor.max(at + 1);
                continue;
            }
            let node = Node::Element(value_node(profile_prefix.as_deref(), id, value));
            root.children.insert(cursor, node);
            cursor += 1;
        }
        index = cursor;
    }
}

/// Position of Value `id` among the Value siblings that directly follow a Profile.
fn find_in_run(root: &Element, start: usize, id: &str) -> Option<usize> {
    for (offset, child) in root.children[start..].iter().enumerate() {
        match child {
            Node::Text(text) if text.trim().is_empty() => {}
            Node::Element(element) if element.is("Value") => {
                if element.get("id") == Some(id) {
                    return Some(start + offset);
                }
            }
            _ => break,
        }
    }
    None
}

fn update_value(value_node: &mut Element, value: &str) {
    let mut updated = false;
    value_node.for_each_mut("value", crate::tree::Depth::Children, &mut |child| {
        child.set_text(value);
        updated = true;
    });
    if !updated {
        let name = qualified(value_node.prefix(), "value");
        let mut child = Element::new(name, value_node.namespace.clone());
        child.set_text(value);
        value_node.children.push(Node::Element(child));
    }
}

fn value_node(prefix: Option<&str>, id: &str, value: &str) -> Element {
    let namespace = Some(crate::tree::XCCDF_NS.to_string());
    let mut node = Element::new(qualified(prefix, "Value"), namespace.clone());
    node.set("id", id);
    node.set("type", "string");
    let mut child = Element::new(qualified(prefix, "value"), namespace);
    child.set_text(value);
    node.children.push(Node::Element(child));
    node
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

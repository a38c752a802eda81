use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod element;

pub use element::{Depth, Element, Node};

/// Namespace every tag lookup is qualified with.
pub const XCCDF_NS: &str = "http://checklists.nist.gov/xccdf/1.2";
/// Predecessor namespace still expected by the HTML stylesheets.
pub const XCCDF_1_1_NS: &str = "http://checklists.nist.gov/xccdf/1.1";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml/";
const BEL: char = '\u{7}';

/// Errors raised while loading or persisting a report document.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("failed to access report at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("report is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("failed to parse report markup: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("failed to parse report attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("failed to unescape report text: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
    #[error("failed to serialize report: {0}")]
    Write(#[from] std::io::Error),
    #[error("malformed report: {0}")]
    Malformed(String),
    #[error("report contains no root element")]
    EmptyDocument,
}

/// XCCDF schema versions a report can be rewritten between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XccdfVersion {
    #[serde(rename = "1.1")]
    V1_1,
    #[serde(rename = "1.2")]
    V1_2,
}

impl XccdfVersion {
    pub fn namespace(self) -> &'static str {
        match self {
            Self::V1_1 => XCCDF_1_1_NS,
            Self::V1_2 => XCCDF_NS,
        }
    }

    fn other(self) -> Self {
        match self {
            Self::V1_1 => Self::V1_2,
            Self::V1_2 => Self::V1_1,
        }
    }
}

impl std::str::FromStr for XccdfVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.1" => Ok(Self::V1_1),
            "1.2" => Ok(Self::V1_2),
            other => Err(format!("unsupported XCCDF version `{other}` (expected 1.1 or 1.2)")),
        }
    }
}

/// A loaded report document bound to its on-disk location.
///
/// Every mutating pass takes the tree by value and hands back the reloaded
/// successor from [`ReportTree::persist`], so no pass can keep working on a
/// tree that no longer matches the file.
#[derive(Debug, Clone)]
pub struct ReportTree {
    path: PathBuf,
    root: Element,
    revision: u64,
}

impl ReportTree {
    /// Load the report at `path`. Fails if the content is not well-formed XML.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, TreeError> {
        let path = path.into();
        let content = String::from_utf8(read(&path)?)?;
        let root = element::parse(&content)?;
        debug!(path = %path.display(), "report loaded");
        Ok(Self {
            path,
            root,
            revision: 0,
        })
    }

    /// Re-read the persisted file. BEL characters emitted by module output
    /// break the parser, so they are dropped here.
    fn reload(path: PathBuf, revision: u64) -> Result<Self, TreeError> {
        let content = String::from_utf8(read(&path)?)?;
        let content: String = content.chars().filter(|c| *c != BEL).collect();
        let root = element::parse(&content)?;
        Ok(Self {
            path,
            root,
            revision,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of persist round trips this document has been through.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Serialized form of the document as it would be written by [`persist`](Self::persist).
    pub fn to_bytes(&self) -> Result<Vec<u8>, TreeError> {
        let mut root = self.root.clone();
        root.set("xmlns:xhtml", XHTML_NS);
        element::serialize(&root)
    }

    /// Write the document and return the tree re-parsed from the written bytes.
    pub fn persist(self) -> Result<Self, TreeError> {
        let bytes = self.to_bytes()?;
        fs::write(&self.path, bytes).map_err(|source| TreeError::Io {
            path: self.path.clone(),
            source,
        })?;
        let revision = self.revision + 1;
        debug!(path = %self.path.display(), revision, "report persisted");
        Self::reload(self.path, revision)
    }

    /// Persist, swap the XCCDF namespace URI in the written file, and reload.
    pub fn rewrite_namespace(self, target: XccdfVersion) -> Result<Self, TreeError> {
        let tree = self.persist()?;
        rewrite_namespace_file(&tree.path, target)?;
        Self::reload(tree.path, tree.revision + 1)
    }
}

/// Replace every occurrence of the other version's namespace URI in `path` with `target`'s.
pub fn rewrite_namespace_file(path: &Path, target: XccdfVersion) -> Result<(), TreeError> {
    let content = String::from_utf8(read(path)?)?;
    let rewritten = content.replace(target.other().namespace(), target.namespace());
    fs::write(path, rewritten).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), namespace = target.namespace(), "namespace rewritten");
    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>, TreeError> {
    fs::read(path).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

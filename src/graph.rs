//! Typed dependency trees for a single unit
//!
//! A [`UnitDependencyGraph`] owns a tree of [`DependencyNode`]s rooted at the
//! unit's object definition. Statistics (found/missing counts, total size,
//! deepest level, completion status) are computed once when the graph is
//! assembled and never change afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a dependency node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    ObjectDefinition,
    Armor,
    Weapon,
    Projectile,
    VisualEffect,
    Audio,
    Model3D,
    Texture,
    Custom,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DependencyType::ObjectDefinition => "object",
            DependencyType::Armor => "armor",
            DependencyType::Weapon => "weapon",
            DependencyType::Projectile => "projectile",
            DependencyType::VisualEffect => "fx",
            DependencyType::Audio => "audio",
            DependencyType::Model3D => "model",
            DependencyType::Texture => "texture",
            DependencyType::Custom => "custom",
        };
        write!(f, "{}", label)
    }
}

/// Result of probing a node's asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    NotVerified,
    Found,
    Missing,
    /// The reference itself is unusable (e.g. escapes the asset root)
    Invalid,
}

/// Four-bucket classification of how much of a graph was confirmed present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionStatus {
    /// 100%
    Complete,
    /// 80% up to but not including 100%
    Partial,
    /// Above 0% and below 80%
    Incomplete,
    /// 0%, including graphs where nothing could be probed
    CannotVerify,
}

impl CompletionStatus {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 100.0 {
            CompletionStatus::Complete
        } else if percentage >= 80.0 {
            CompletionStatus::Partial
        } else if percentage > 0.0 {
            CompletionStatus::Incomplete
        } else {
            CompletionStatus::CannotVerify
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CompletionStatus::Complete => "complete",
            CompletionStatus::Partial => "partial",
            CompletionStatus::Incomplete => "incomplete",
            CompletionStatus::CannotVerify => "cannot verify",
        };
        write!(f, "{}", label)
    }
}

/// One asset in a dependency tree; owns its children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DependencyType,
    pub depth: usize,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<DependencyNode>,
}

impl DependencyNode {
    pub fn new(name: impl Into<String>, kind: DependencyType, depth: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            depth,
            status: NodeStatus::NotVerified,
            size: None,
            modified: None,
            children: Vec::new(),
        }
    }

    pub fn children(&self) -> &[DependencyNode] {
        &self.children
    }

    /// Attach a child; its depth must be exactly one below this node
    pub(crate) fn push_child(&mut self, child: DependencyNode) {
        debug_assert_eq!(child.depth, self.depth + 1);
        self.children.push(child);
    }

    /// Pre-order walk over this node and all descendants
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter { stack: vec![self] }
    }

    /// First node in pre-order with the given name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&DependencyNode> {
        self.iter().find(|node| node.name.eq_ignore_ascii_case(name))
    }
}

/// Pre-order iterator returned by [`DependencyNode::iter`]
pub struct NodeIter<'a> {
    stack: Vec<&'a DependencyNode>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = &'a DependencyNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Dependency tree of one unit plus its summary statistics
#[derive(Debug, Clone, Serialize)]
pub struct UnitDependencyGraph {
    unit_id: String,
    unit_name: String,
    root: DependencyNode,
    found_count: usize,
    missing_count: usize,
    total_size: u64,
    max_depth: usize,
    completion_percentage: f64,
    status: CompletionStatus,
}

impl UnitDependencyGraph {
    /// Wrap a finished tree and compute its statistics
    pub fn from_root(
        unit_id: impl Into<String>,
        unit_name: impl Into<String>,
        root: DependencyNode,
    ) -> Self {
        let mut found_count = 0;
        let mut missing_count = 0;
        let mut total_size = 0u64;
        let mut max_depth = 0;

        for node in root.iter() {
            match node.status {
                NodeStatus::Found => found_count += 1,
                NodeStatus::Missing => missing_count += 1,
                NodeStatus::NotVerified | NodeStatus::Invalid => {}
            }
            total_size = total_size.saturating_add(node.size.unwrap_or(0));
            max_depth = max_depth.max(node.depth);
        }

        let probed = found_count + missing_count;
        let completion_percentage = if probed == 0 {
            0.0
        } else {
            found_count as f64 * 100.0 / probed as f64
        };

        Self {
            unit_id: unit_id.into(),
            unit_name: unit_name.into(),
            root,
            found_count,
            missing_count,
            total_size,
            max_depth,
            completion_percentage,
            status: CompletionStatus::from_percentage(completion_percentage),
        }
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn root(&self) -> &DependencyNode {
        &self.root
    }

    /// Every node, root first, in pre-order
    pub fn all_nodes(&self) -> Vec<&DependencyNode> {
        self.root.iter().collect()
    }

    pub fn node_count(&self) -> usize {
        self.root.iter().count()
    }

    /// Number of nodes below the root
    pub fn dependency_count(&self) -> usize {
        self.node_count() - 1
    }

    pub fn found_count(&self) -> usize {
        self.found_count
    }

    pub fn missing_count(&self) -> usize {
        self.missing_count
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn completion_percentage(&self) -> f64 {
        self.completion_percentage
    }

    pub fn status(&self) -> CompletionStatus {
        self.status
    }

    pub fn nodes_with_status(&self, status: NodeStatus) -> Vec<&DependencyNode> {
        self.root.iter().filter(|node| node.status == status).collect()
    }

    /// Box-drawing rendering of the tree, one node per line
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        render_node(&self.root, "", true, true, &mut out);
        out
    }
}

fn render_node(node: &DependencyNode, prefix: &str, is_last: bool, is_root: bool, out: &mut String) {
    let connector = if is_root {
        ""
    } else if is_last {
        "└── "
    } else {
        "├── "
    };

    let status = match node.status {
        NodeStatus::Found => match node.size {
            Some(size) => format!("✓ found ({})", format_size(size)),
            None => "✓ found".to_string(),
        },
        NodeStatus::Missing => "✗ missing".to_string(),
        NodeStatus::Invalid => "✗ invalid reference".to_string(),
        NodeStatus::NotVerified => "(not verified)".to_string(),
    };

    out.push_str(&format!(
        "{}{}{} [{}] {}\n",
        prefix, connector, node.name, node.kind, status
    ));

    let child_prefix = if is_root {
        String::new()
    } else if is_last {
        format!("{}    ", prefix)
    } else {
        format!("{}│   ", prefix)
    };

    for (i, child) in node.children.iter().enumerate() {
        render_node(child, &child_prefix, i == node.children.len() - 1, false, out);
    }
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

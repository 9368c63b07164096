//! Headless scene graph
//!
//! CoinForge never touches a real DOM or canvas. Modules build and mutate
//! this scene graph; an external renderer reads it each frame. Nodes carry
//! the small set of visual attributes the animation core actually drives
//! (opacity, horizontal squash, vertical offset, size, color).
//!
//! All operations on missing nodes are defensive no-ops so that animation
//! callbacks racing a module's teardown cannot fail.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Opaque handle to a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Visual state of a node, written by modules and read by the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visual {
    pub opacity: f32,
    /// Horizontal squash factor (1.0 = full width)
    pub scale_x: f32,
    /// Vertical offset in pixels (negative = up)
    pub translate_y: f32,
    pub width: f32,
    pub height: f32,
    /// `#rrggbb` color, when the node has one
    pub color: Option<String>,
}

impl Default for Visual {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            scale_x: 1.0,
            translate_y: 0.0,
            width: 0.0,
            height: 0.0,
            color: None,
        }
    }
}

/// One node in the scene tree
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Renderer-facing label ("coin-wrap", "tray", ...)
    pub label: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub visual: Visual,
}

/// The scene tree. One instance per application, shared behind a mutex.
#[derive(Debug)]
pub struct Scene {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
}

/// Shared scene handle handed to modules through the context
pub type SharedScene = Arc<Mutex<Scene>>;

impl Scene {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                label: "root".to_string(),
                parent: None,
                children: Vec::new(),
                visual: Visual::default(),
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    /// Create a shared scene handle.
    pub fn shared() -> SharedScene {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a node under `parent`. A missing parent falls back to the root.
    pub fn create_node(&mut self, parent: NodeId, label: &str) -> NodeId {
        let parent = if self.nodes.contains_key(&parent) {
            parent
        } else {
            log::warn!("[scene] create_node: parent {:?} missing, attaching to root", parent);
            self.root
        };

        let id = NodeId(self.next_id);
        self.next_id += 1;

        self.nodes.insert(
            id,
            Node {
                id,
                label: label.to_string(),
                parent: Some(parent),
                children: Vec::new(),
                visual: Visual::default(),
            },
        );
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        id
    }

    /// Remove a node and its whole subtree. No-op when the node is gone.
    pub fn remove_node(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        for child in node.children {
            self.remove_subtree(child);
        }
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Mutable access to a node's visual state; `None` after teardown.
    pub fn visual_mut(&mut self, id: NodeId) -> Option<&mut Visual> {
        self.nodes.get_mut(&id).map(|n| &mut n.visual)
    }

    pub fn visual(&self, id: NodeId) -> Option<&Visual> {
        self.nodes.get(&id).map(|n| &n.visual)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_remove() {
        let mut scene = Scene::new();
        let root = scene.root();
        let wrap = scene.create_node(root, "coin-wrap");
        let face = scene.create_node(wrap, "avers");
        assert!(scene.contains(face));
        assert_eq!(scene.children(wrap), &[face]);

        scene.remove_node(wrap);
        assert!(!scene.contains(wrap));
        assert!(!scene.contains(face));
        assert!(scene.children(root).is_empty());
    }

    #[test]
    fn test_missing_node_is_noop() {
        let mut scene = Scene::new();
        let ghost = NodeId(999);
        scene.remove_node(ghost);
        assert!(scene.visual_mut(ghost).is_none());
        assert!(scene.children(ghost).is_empty());
    }

    #[test]
    fn test_missing_parent_falls_back_to_root() {
        let mut scene = Scene::new();
        let id = scene.create_node(NodeId(42), "orphan");
        assert_eq!(scene.node(id).unwrap().parent, Some(scene.root()));
    }

    #[test]
    fn test_root_is_not_removable() {
        let mut scene = Scene::new();
        let root = scene.root();
        scene.remove_node(root);
        assert!(scene.contains(root));
    }
}

//! Tree — position-keyed search index from token lines to stored ids.
//!
//! Nodes live in a single arena and refer to children by index. Each node
//! maps a literal word to a child, optionally has one wildcard child, and may
//! carry a terminal id for patterns ending at that depth.

use std::collections::HashMap;

use super::model::{Template, Token};

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Default)]
struct Node {
    children: HashMap<String, NodeId>,
    wildcard: Option<NodeId>,
    terminal: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SearchTree {
    nodes: Vec<Node>,
    patterns: usize,
}

impl SearchTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            patterns: 0,
        }
    }

    /// Insert `pattern` with `id`. If the pattern is already terminal, the
    /// stored id wins and is returned.
    pub fn insert(&mut self, pattern: &Template, id: usize) -> usize {
        let mut node = ROOT;
        for token in pattern.tokens() {
            node = match token {
                Token::Word(w) => match self.nodes[node].children.get(w) {
                    Some(&child) => child,
                    None => {
                        let child = self.push_node();
                        self.nodes[node].children.insert(w.clone(), child);
                        child
                    }
                },
                Token::Var => match self.nodes[node].wildcard {
                    Some(child) => child,
                    None => {
                        let child = self.push_node();
                        self.nodes[node].wildcard = Some(child);
                        child
                    }
                },
            };
        }
        match self.nodes[node].terminal {
            Some(existing) => {
                if existing != id {
                    tracing::trace!(existing, rejected = id, "search tree: pattern already indexed");
                }
                existing
            }
            None => {
                self.nodes[node].terminal = Some(id);
                self.patterns += 1;
                id
            }
        }
    }

    /// Clear the terminal marker of `pattern`. Nodes stay allocated.
    pub fn remove(&mut self, pattern: &Template) -> Option<usize> {
        let node = self.locate(pattern)?;
        let removed = self.nodes[node].terminal.take();
        if removed.is_some() {
            self.patterns -= 1;
        }
        removed
    }

    /// Find the id whose pattern matches `line` exactly in length.
    ///
    /// Literal branches are tried before the wildcard branch at every depth;
    /// a dead end on the literal side backtracks into the wildcard side.
    pub fn search<S: AsRef<str>>(&self, line: &[S]) -> Option<usize> {
        self.descend(ROOT, line, 0)
    }

    fn descend<S: AsRef<str>>(&self, node: NodeId, line: &[S], depth: usize) -> Option<usize> {
        let current = &self.nodes[node];
        if depth == line.len() {
            return current.terminal;
        }
        if let Some(&child) = current.children.get(line[depth].as_ref()) {
            if let Some(id) = self.descend(child, line, depth + 1) {
                return Some(id);
            }
        }
        current
            .wildcard
            .and_then(|child| self.descend(child, line, depth + 1))
    }

    fn locate(&self, pattern: &Template) -> Option<NodeId> {
        let mut node = ROOT;
        for token in pattern.tokens() {
            node = match token {
                Token::Word(w) => *self.nodes[node].children.get(w)?,
                Token::Var => self.nodes[node].wildcard?,
            };
        }
        Some(node)
    }

    fn push_node(&mut self) -> NodeId {
        self.nodes.push(Node::default());
        self.nodes.len() - 1
    }

    /// Number of indexed patterns.
    pub fn len(&self) -> usize {
        self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns == 0
    }
}

impl Default for SearchTree {
    fn default() -> Self {
        Self::new()
    }
}

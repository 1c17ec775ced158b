//! cross-chain edge and root registry
//!
//! a proof constructed on this chain may reference roots that were
//! valid on a linked chain at some point. each edge keeps a bounded
//! FIFO history of recent roots per tree kind; eviction is the
//! finality/rollback boundary - an evicted root can no longer anchor a
//! new proof.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use masp_merkle::Root;
use masp_pool::ChainId;

use crate::error::{AnchorError, Result};

/// which record tree a root belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreeKind {
    Unspent,
    Spent,
}

#[derive(Clone, Debug)]
struct Edge {
    chain_id: ChainId,
    unspent: VecDeque<Root>,
    spent: VecDeque<Root>,
}

impl Edge {
    fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            unspent: VecDeque::new(),
            spent: VecDeque::new(),
        }
    }

    fn history(&self, kind: TreeKind) -> &VecDeque<Root> {
        match kind {
            TreeKind::Unspent => &self.unspent,
            TreeKind::Spent => &self.spent,
        }
    }

    fn history_mut(&mut self, kind: TreeKind) -> &mut VecDeque<Root> {
        match kind {
            TreeKind::Unspent => &mut self.unspent,
            TreeKind::Spent => &mut self.spent,
        }
    }
}

/// registry of linked chains and their recent root histories
///
/// `max_edges` counts total root-set slots including this chain's own
/// slot 0, so up to `max_edges - 1` remote chains can be linked
#[derive(Clone, Debug)]
pub struct EdgeRegistry {
    local_chain: ChainId,
    max_edges: usize,
    history_len: usize,
    edges: Vec<Edge>,
}

impl EdgeRegistry {
    /// default bounded history: the latest root plus one predecessor
    pub const DEFAULT_HISTORY: usize = 2;

    pub fn new(local_chain: ChainId, max_edges: usize, history_len: usize) -> Self {
        Self {
            local_chain,
            max_edges,
            history_len,
            edges: Vec::new(),
        }
    }

    pub fn local_chain(&self) -> ChainId {
        self.local_chain
    }

    pub fn max_edges(&self) -> usize {
        self.max_edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn edge_mut(&mut self, chain_id: ChainId) -> Result<&mut Edge> {
        self.edges
            .iter_mut()
            .find(|e| e.chain_id == chain_id)
            .ok_or(AnchorError::UnknownEdge(chain_id))
    }

    /// register a new linked chain with empty root histories
    pub fn add_edge(&mut self, chain_id: ChainId) -> Result<()> {
        if chain_id == self.local_chain || self.edges.iter().any(|e| e.chain_id == chain_id) {
            return Err(AnchorError::DuplicateEdge(chain_id));
        }
        if self.edges.len() + 1 >= self.max_edges {
            return Err(AnchorError::EdgeLimitReached(self.max_edges));
        }
        self.edges.push(Edge::new(chain_id));
        info!(chain = chain_id.0, "registered edge");
        Ok(())
    }

    /// re-point an edge slot at a different chain, clearing its histories
    pub fn update_edge(&mut self, old_chain: ChainId, new_chain: ChainId) -> Result<()> {
        if new_chain == self.local_chain || self.edges.iter().any(|e| e.chain_id == new_chain) {
            return Err(AnchorError::DuplicateEdge(new_chain));
        }
        let edge = self.edge_mut(old_chain)?;
        *edge = Edge::new(new_chain);
        info!(old = old_chain.0, new = new_chain.0, "updated edge");
        Ok(())
    }

    /// append a root to the bounded history, evicting the oldest entry
    /// once the cap is reached
    pub fn record_root(&mut self, chain_id: ChainId, kind: TreeKind, root: Root) -> Result<()> {
        let history_len = self.history_len;
        let history = self.edge_mut(chain_id)?.history_mut(kind);
        if history.len() == history_len {
            history.pop_front();
        }
        history.push_back(root);
        debug!(chain = chain_id.0, kind = ?kind, root = %hex::encode(root.0), "recorded root");
        Ok(())
    }

    /// whether the root is still inside the staleness window
    pub fn is_known_root(&self, chain_id: ChainId, kind: TreeKind, root: &Root) -> bool {
        self.edges
            .iter()
            .find(|e| e.chain_id == chain_id)
            .is_some_and(|e| e.history(kind).contains(root))
    }

    /// latest recorded root for an edge, if any
    pub fn latest_root(&self, chain_id: ChainId, kind: TreeKind) -> Option<Root> {
        self.edges
            .iter()
            .find(|e| e.chain_id == chain_id)
            .and_then(|e| e.history(kind).back().copied())
    }

    /// fixed-width root array for proof public inputs
    ///
    /// always exactly `max_edges` long: slot 0 is this chain's current
    /// root, then one latest root per registered edge, and the
    /// empty-tree sentinel for every unused slot - circuit-side array
    /// indexing must stay well-defined
    pub fn root_set(&self, kind: TreeKind, local_root: Root) -> Vec<Root> {
        let mut roots = Vec::with_capacity(self.max_edges);
        roots.push(local_root);
        for edge in &self.edges {
            roots.push(edge.history(kind).back().copied().unwrap_or(Root::EMPTY));
        }
        roots.resize(self.max_edges, Root::EMPTY);
        roots
    }

    /// whether every root of a claimed set is currently provable:
    /// slot 0 must equal the local root, the rest must sit inside a
    /// registered edge's history window (empty sentinels are skipped)
    pub fn validate_root_set(&self, kind: TreeKind, local_root: &Root, roots: &[Root]) -> bool {
        if roots.len() != self.max_edges {
            return false;
        }
        if roots.first() != Some(local_root) {
            return false;
        }
        roots.iter().skip(1).all(|root| {
            root.is_empty()
                || self
                    .edges
                    .iter()
                    .any(|e| e.history(kind).contains(root))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(n: u8) -> Root {
        Root([n; 32])
    }

    #[test]
    fn test_add_edge_limits() {
        let mut registry = EdgeRegistry::new(ChainId(1), 3, 2);

        registry.add_edge(ChainId(2)).unwrap();
        registry.add_edge(ChainId(3)).unwrap();
        // slot 0 is local, so only max_edges - 1 remotes fit
        assert_eq!(
            registry.add_edge(ChainId(4)),
            Err(AnchorError::EdgeLimitReached(3))
        );
        assert_eq!(
            registry.add_edge(ChainId(2)),
            Err(AnchorError::DuplicateEdge(ChainId(2)))
        );
        // own chain can never be an edge
        assert_eq!(
            registry.add_edge(ChainId(1)),
            Err(AnchorError::DuplicateEdge(ChainId(1)))
        );
    }

    #[test]
    fn test_fifo_eviction() {
        let mut registry = EdgeRegistry::new(ChainId(1), 3, 2);
        registry.add_edge(ChainId(2)).unwrap();

        registry.record_root(ChainId(2), TreeKind::Spent, root(1)).unwrap();
        registry.record_root(ChainId(2), TreeKind::Spent, root(2)).unwrap();
        assert!(registry.is_known_root(ChainId(2), TreeKind::Spent, &root(1)));

        // third root evicts the oldest
        registry.record_root(ChainId(2), TreeKind::Spent, root(3)).unwrap();
        assert!(!registry.is_known_root(ChainId(2), TreeKind::Spent, &root(1)));
        assert!(registry.is_known_root(ChainId(2), TreeKind::Spent, &root(2)));
        assert!(registry.is_known_root(ChainId(2), TreeKind::Spent, &root(3)));
        assert_eq!(
            registry.latest_root(ChainId(2), TreeKind::Spent),
            Some(root(3))
        );
    }

    #[test]
    fn test_root_set_shape() {
        let mut registry = EdgeRegistry::new(ChainId(1), 4, 2);
        registry.add_edge(ChainId(2)).unwrap();
        registry.record_root(ChainId(2), TreeKind::Unspent, root(9)).unwrap();

        let set = registry.root_set(TreeKind::Unspent, root(5));
        assert_eq!(set.len(), 4);
        assert_eq!(set[0], root(5));
        assert_eq!(set[1], root(9));
        // unused slots hold the empty sentinel, never omitted
        assert_eq!(set[2], Root::EMPTY);
        assert_eq!(set[3], Root::EMPTY);

        // evicted roots fail validation
        registry.record_root(ChainId(2), TreeKind::Unspent, root(10)).unwrap();
        registry.record_root(ChainId(2), TreeKind::Unspent, root(11)).unwrap();
        let stale = vec![root(5), root(9), Root::EMPTY, Root::EMPTY];
        assert!(!registry.validate_root_set(TreeKind::Unspent, &root(5), &stale));

        let fresh = registry.root_set(TreeKind::Unspent, root(5));
        assert!(registry.validate_root_set(TreeKind::Unspent, &root(5), &fresh));
    }

    #[test]
    fn test_update_edge_clears_history() {
        let mut registry = EdgeRegistry::new(ChainId(1), 3, 2);
        registry.add_edge(ChainId(2)).unwrap();
        registry.record_root(ChainId(2), TreeKind::Spent, root(1)).unwrap();

        registry.update_edge(ChainId(2), ChainId(7)).unwrap();
        assert_eq!(
            registry.record_root(ChainId(2), TreeKind::Spent, root(2)),
            Err(AnchorError::UnknownEdge(ChainId(2)))
        );
        assert_eq!(registry.latest_root(ChainId(7), TreeKind::Spent), None);
    }
}

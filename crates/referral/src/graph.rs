//! Referral forest with cached downline counters

use dashmap::DashMap;
use levelbank_core::{EngineError, EngineResult, Principal};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A referral edge, created once when a member joins under a referrer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberReferral {
    pub referrer: Principal,
    pub new_member: Principal,
}

#[derive(Debug, Default)]
struct Node {
    parent: Option<Principal>,
    children: Vec<Principal>,
    /// Transitive descendants, excluding the node itself
    downline: AtomicU64,
}

/// Append-only referral forest
///
/// Reads (`downline_size`, `referrer_of`, ...) never block on the writer.
/// Structural changes go through a [`GraphWriter`], which holds the
/// forest-wide writer lock for its lifetime so that the cycle check, the
/// edge insertion and the ancestor counter updates form one unit.
#[derive(Debug, Default)]
pub struct ReferralGraph {
    nodes: DashMap<Principal, Node>,
    edges: RwLock<Vec<MemberReferral>>,
    writer: Mutex<()>,
}

impl ReferralGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive structural access.
    pub fn writer(&self) -> GraphWriter<'_> {
        GraphWriter {
            graph: self,
            _guard: self.writer.lock(),
        }
    }

    /// Convenience for a single edge insertion.
    pub fn add_edge(
        &self,
        referrer: &Principal,
        new_member: &Principal,
    ) -> EngineResult<Vec<(Principal, u64)>> {
        self.writer().add_edge(referrer, new_member)
    }

    pub fn contains(&self, member: &Principal) -> bool {
        self.nodes.contains_key(member)
    }

    /// Number of transitive descendants (0 for unknown members)
    pub fn downline_size(&self, member: &Principal) -> u64 {
        self.nodes
            .get(member)
            .map(|n| n.downline.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    pub fn referrer_of(&self, member: &Principal) -> Option<Principal> {
        self.nodes.get(member).and_then(|n| n.parent.clone())
    }

    pub fn direct_referrals(&self, member: &Principal) -> Vec<Principal> {
        self.nodes
            .get(member)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Ancestors of `member`, nearest first (excluding `member`)
    pub fn ancestors(&self, member: &Principal) -> Vec<Principal> {
        let mut chain = Vec::new();
        let mut cursor = self.referrer_of(member);
        while let Some(current) = cursor {
            cursor = self.referrer_of(&current);
            chain.push(current);
        }
        chain
    }

    /// Edge that brought `new_member` in, if any
    pub fn edge_for(&self, new_member: &Principal) -> Option<MemberReferral> {
        self.referrer_of(new_member).map(|referrer| MemberReferral {
            referrer,
            new_member: new_member.clone(),
        })
    }

    /// Every edge in insertion order
    pub fn edges(&self) -> Vec<MemberReferral> {
        self.edges.read().clone()
    }

    pub fn member_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every member in the forest, in no particular order
    pub fn members(&self) -> Vec<Principal> {
        self.nodes.iter().map(|n| n.key().clone()).collect()
    }
}

/// Exclusive structural access to a [`ReferralGraph`]
///
/// Callers that must act on the returned ancestor chain under the same
/// serialization boundary (level evaluation) keep the writer alive until
/// they are done.
pub struct GraphWriter<'a> {
    graph: &'a ReferralGraph,
    _guard: MutexGuard<'a, ()>,
}

impl GraphWriter<'_> {
    /// Add a member without a referrer. Returns false if already present.
    pub fn insert_root(&mut self, member: &Principal) -> bool {
        if self.graph.nodes.contains_key(member) {
            return false;
        }
        self.graph.nodes.insert(member.clone(), Node::default());
        true
    }

    /// Ancestor sizes `add_edge(referrer, new_member)` would produce,
    /// without changing anything.
    ///
    /// Fails exactly when `add_edge` would. The writer held by `self` keeps
    /// the projection current until the edge is added.
    pub fn projected_sizes(
        &self,
        referrer: &Principal,
        new_member: &Principal,
    ) -> EngineResult<Vec<(Principal, u64)>> {
        let chain = self.check_edge(referrer, new_member)?;
        let growth = self.graph.downline_size(new_member) + 1;
        Ok(chain
            .into_iter()
            .map(|ancestor| {
                let size = self.graph.downline_size(&ancestor) + growth;
                (ancestor, size)
            })
            .collect())
    }

    /// `referrer` and its ancestors, nearest first, if the edge is allowed.
    fn check_edge(
        &self,
        referrer: &Principal,
        new_member: &Principal,
    ) -> EngineResult<Vec<Principal>> {
        if referrer == new_member {
            return Err(EngineError::SelfReferral(new_member.to_string()));
        }
        if self.graph.referrer_of(new_member).is_some() {
            return Err(EngineError::DuplicateMembership(new_member.to_string()));
        }

        let mut chain = vec![referrer.clone()];
        chain.extend(self.graph.ancestors(referrer));
        if chain.contains(new_member) {
            return Err(EngineError::CycleDetected {
                referrer: referrer.to_string(),
                new_member: new_member.to_string(),
            });
        }
        Ok(chain)
    }

    /// Attach `new_member` under `referrer`.
    ///
    /// Unknown members are inserted as roots first. On success every
    /// ancestor of `new_member` (starting with `referrer`) grows by the
    /// size of the attached subtree; the chain is returned nearest first
    /// with each ancestor's new downline size.
    pub fn add_edge(
        &mut self,
        referrer: &Principal,
        new_member: &Principal,
    ) -> EngineResult<Vec<(Principal, u64)>> {
        let chain = self.check_edge(referrer, new_member)?;

        self.insert_root(referrer);
        self.insert_root(new_member);

        let growth = {
            let mut node = self
                .graph
                .nodes
                .get_mut(new_member)
                .ok_or_else(|| EngineError::NotFound(new_member.to_string()))?;
            node.parent = Some(referrer.clone());
            node.downline.load(Ordering::Acquire) + 1
        };
        if let Some(mut node) = self.graph.nodes.get_mut(referrer) {
            node.children.push(new_member.clone());
        }

        let sizes = chain
            .into_iter()
            .map(|ancestor| {
                let size = self
                    .graph
                    .nodes
                    .get(&ancestor)
                    .map(|n| n.downline.fetch_add(growth, Ordering::AcqRel) + growth)
                    .unwrap_or(growth);
                (ancestor, size)
            })
            .collect();

        self.graph.edges.write().push(MemberReferral {
            referrer: referrer.clone(),
            new_member: new_member.clone(),
        });

        tracing::debug!(
            referrer = %referrer,
            new_member = %new_member,
            growth,
            "Referral edge added"
        );

        Ok(sizes)
    }
}

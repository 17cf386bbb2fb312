// src/crawl/registry.rs
// =============================================================================
// The visitation registry: the single owner of "who visits which node".
//
// How it works:
// 1. One tokio task owns the ClaimSet and nothing else can touch it
// 2. Crawl tasks send requests into a bounded mpsc inbox
// 3. The registry handles requests strictly one at a time, so claim decisions
//    across any number of concurrent callers are totally ordered
// 4. Claims are answered over a oneshot channel; settles need no answer
//
// Because only the registry task mutates the set, there is no lock anywhere.
// The price is that the loop must never process two requests concurrently.
//
// Lifecycle: the loop runs until every RegistryHandle has been dropped.
// =============================================================================

use crate::fetch::Node;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// How a settled node's processing ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Fetched; `children` links were found and `spawned` of them were claimed here.
    Expanded { children: usize, spawned: usize },
    /// The fetch capability reported the node unreachable.
    FetchFailed { reason: String },
    /// Reached with no depth budget left, so never fetched.
    DepthExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    Claimed,
    Settled(Outcome),
}

/// Node -> claim state. Entries are only ever added or moved forward.
#[derive(Debug, Clone, Default)]
pub struct ClaimSet {
    entries: HashMap<Node, ClaimState>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// First claim wins: true only if nobody claimed `node` before.
    pub fn try_claim(&mut self, node: &Node) -> bool {
        if self.entries.contains_key(node) {
            return false;
        }
        self.entries.insert(node.clone(), ClaimState::Claimed);
        true
    }

    /// Moves a claimed node to settled. Returns false (and changes nothing)
    /// if the node was never claimed or is already settled.
    pub fn settle(&mut self, node: &Node, outcome: Outcome) -> bool {
        match self.entries.get_mut(node) {
            Some(state) if matches!(state, ClaimState::Claimed) => {
                *state = ClaimState::Settled(outcome);
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, node: &str) -> Option<&ClaimState> {
        self.entries.get(node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every settled node with its outcome.
    pub fn settled_outcomes(&self) -> impl Iterator<Item = (&Node, &Outcome)> {
        self.entries.iter().filter_map(|(node, state)| match state {
            ClaimState::Settled(outcome) => Some((node, outcome)),
            ClaimState::Claimed => None,
        })
    }

    pub fn settled(&self) -> BTreeSet<Node> {
        self.settled_outcomes().map(|(node, _)| node.clone()).collect()
    }

    /// Claimed but not yet settled.
    pub fn in_flight(&self) -> BTreeSet<Node> {
        self.entries
            .iter()
            .filter(|(_, state)| matches!(state, ClaimState::Claimed))
            .map(|(node, _)| node.clone())
            .collect()
    }
}

/// The registry task is gone, so no request can be answered.
///
/// Only reachable if the registry task panicked; a live handle keeps it running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("visitation registry has shut down")]
pub struct RegistryError;

// Messages the registry understands
#[derive(Debug)]
enum Request {
    Claim {
        node: Node,
        reply: oneshot::Sender<bool>,
    },
    Settle {
        node: Node,
        outcome: Outcome,
    },
    Snapshot {
        reply: oneshot::Sender<ClaimSet>,
    },
}

pub struct VisitationRegistry {
    claims: ClaimSet,
    inbox: mpsc::Receiver<Request>,
}

impl VisitationRegistry {
    /// Starts the registry on its own task and returns a handle to it.
    ///
    /// `capacity` bounds the inbox; senders wait when it is full, nothing is dropped.
    pub fn spawn(capacity: usize) -> RegistryHandle {
        let (tx, inbox) = mpsc::channel(capacity.max(1));
        let registry = Self {
            claims: ClaimSet::new(),
            inbox,
        };
        tokio::spawn(registry.run());
        RegistryHandle { tx }
    }

    // The sequential decision loop
    async fn run(mut self) {
        while let Some(request) = self.inbox.recv().await {
            self.handle(request);
        }
        debug!(claimed = self.claims.len(), "registry stopped");
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Claim { node, reply } => {
                let granted = self.claims.try_claim(&node);
                debug!(%node, granted, "claim");
                // The caller may have gone away; the claim stands either way
                let _ = reply.send(granted);
            }
            Request::Settle { node, outcome } => {
                if self.claims.settle(&node, outcome) {
                    debug!(%node, "settled");
                } else {
                    warn!(%node, "ignoring settle for a node that is not in flight");
                }
            }
            Request::Snapshot { reply } => {
                let _ = reply.send(self.claims.clone());
            }
        }
    }
}

/// Cheap, cloneable port into the registry.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<Request>,
}

impl RegistryHandle {
    /// Asks "may I process this node?". Exactly one caller ever gets `true`
    /// for a given node.
    pub async fn try_claim(&self, node: &Node) -> Result<bool, RegistryError> {
        let (reply, answer) = oneshot::channel();
        self.send(Request::Claim {
            node: node.clone(),
            reply,
        })
        .await?;
        answer.await.map_err(|_| RegistryError)
    }

    /// Records that processing of `node` has finished.
    ///
    /// Returns once the request is queued. Requests are handled in queue order,
    /// so any snapshot requested afterwards already sees this settle.
    pub async fn mark_settled(&self, node: &Node, outcome: Outcome) -> Result<(), RegistryError> {
        self.send(Request::Settle {
            node: node.clone(),
            outcome,
        })
        .await
    }

    /// A copy of the claim set as of now.
    pub async fn snapshot(&self) -> Result<ClaimSet, RegistryError> {
        let (reply, answer) = oneshot::channel();
        self.send(Request::Snapshot { reply }).await?;
        answer.await.map_err(|_| RegistryError)
    }

    async fn send(&self, request: Request) -> Result<(), RegistryError> {
        self.tx.send(request).await.map_err(|_| RegistryError)
    }
}

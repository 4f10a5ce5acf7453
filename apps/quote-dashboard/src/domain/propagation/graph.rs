//! Graph construction and batch propagation.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

use tokio::sync::mpsc;

use super::GraphError;
use super::subscription::{NodeUpdate, Subscription, SubscriptionId};

/// Pure computation of a derived node.
///
/// Receives the dependency values in declaration order, `None` for absent.
pub type ComputeFn<V> = Box<dyn Fn(&[Option<&V>]) -> Option<V> + Send>;

enum NodeKind<V> {
    Leaf,
    Derived(ComputeFn<V>),
}

struct Node<K, V> {
    key: K,
    deps: Vec<usize>,
    dependents: Vec<usize>,
    rank: usize,
    kind: NodeKind<V>,
    value: Option<V>,
    recomputations: u64,
}

struct Subscriber<K, V> {
    id: SubscriptionId,
    node: usize,
    tx: mpsc::UnboundedSender<NodeUpdate<K, V>>,
}

// =============================================================================
// Builder
// =============================================================================

/// Declares the nodes of a [`PropagationGraph`].
///
/// # Example
///
/// ```rust
/// use quote_dashboard::domain::propagation::GraphBuilder;
///
/// let mut graph = GraphBuilder::<&str, i64>::new()
///     .leaf("a")
///     .derived("double", &["a"], |v| v[0].map(|a| a * 2))
///     .build()
///     .unwrap();
///
/// graph.apply([("a", Some(21))]).unwrap();
/// assert_eq!(graph.get("double"), Some(&42));
/// ```
pub struct GraphBuilder<K, V> {
    entries: Vec<(K, Vec<K>, NodeKind<V>)>,
}

impl<K, V> Default for GraphBuilder<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K, V> GraphBuilder<K, V>
where
    K: Copy + Eq + Hash + Debug,
    V: Clone + PartialEq,
{
    /// Start an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf node. Leaves start absent.
    #[must_use]
    pub fn leaf(mut self, key: K) -> Self {
        self.entries.push((key, Vec::new(), NodeKind::Leaf));
        self
    }

    /// Register a derived node computed from `deps`.
    ///
    /// Derived nodes start absent and are first computed when one of their
    /// dependencies changes.
    #[must_use]
    pub fn derived<F>(mut self, key: K, deps: &[K], compute: F) -> Self
    where
        F: Fn(&[Option<&V>]) -> Option<V> + Send + 'static,
    {
        self.entries
            .push((key, deps.to_vec(), NodeKind::Derived(Box::new(compute))));
        self
    }

    /// Validate the declarations and build the graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] on duplicate keys, unknown dependencies or a
    /// dependency cycle.
    pub fn build(self) -> Result<PropagationGraph<K, V>, GraphError> {
        let mut index = HashMap::with_capacity(self.entries.len());
        for (i, (key, _, _)) in self.entries.iter().enumerate() {
            if index.insert(*key, i).is_some() {
                return Err(GraphError::DuplicateNode(format!("{key:?}")));
            }
        }

        let mut nodes = Vec::with_capacity(self.entries.len());
        for (key, deps, kind) in self.entries {
            let deps = deps
                .iter()
                .map(|dep| {
                    index
                        .get(dep)
                        .copied()
                        .ok_or_else(|| GraphError::UnknownDependency {
                            node: format!("{key:?}"),
                            dependency: format!("{dep:?}"),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            nodes.push(Node {
                key,
                deps,
                dependents: Vec::new(),
                rank: 0,
                kind,
                value: None,
                recomputations: 0,
            });
        }

        for i in 0..nodes.len() {
            for dep in nodes[i].deps.clone() {
                nodes[dep].dependents.push(i);
            }
        }

        let order = topological_order(&nodes)?;
        for (rank, &i) in order.iter().enumerate() {
            nodes[i].rank = rank;
        }

        Ok(PropagationGraph {
            nodes,
            index,
            order,
            subscribers: Vec::new(),
            next_subscription: 0,
            batches: 0,
        })
    }
}

/// Kahn's algorithm. Leaves and other roots keep declaration order.
fn topological_order<K: Debug, V>(nodes: &[Node<K, V>]) -> Result<Vec<usize>, GraphError> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.deps.len()).collect();
    let mut ready: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &dependent in &nodes[i].dependents {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push_back(dependent);
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        let stuck = (0..nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| format!("{:?}", nodes[i].key))
            .collect();
        Err(GraphError::Cycle(stuck))
    }
}

// =============================================================================
// Graph
// =============================================================================

/// Result of one propagation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome<K> {
    /// Sequence number of the batch.
    pub batch: u64,
    /// Nodes whose value changed, in topological order.
    pub changed: Vec<K>,
    /// Number of derived-node recomputations performed.
    pub recomputed: usize,
}

impl<K> BatchOutcome<K> {
    /// Whether the batch changed anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Dataflow graph with cached node values and subscribers.
///
/// Owned by a single task; all writes go through [`PropagationGraph::apply`].
pub struct PropagationGraph<K, V> {
    nodes: Vec<Node<K, V>>,
    index: HashMap<K, usize>,
    order: Vec<usize>,
    subscribers: Vec<Subscriber<K, V>>,
    next_subscription: u64,
    batches: u64,
}

impl<K, V> PropagationGraph<K, V>
where
    K: Copy + Eq + Hash + Debug,
    V: Clone + PartialEq,
{
    /// Write leaves as one batch and propagate.
    ///
    /// All keys are validated before anything is written, so a rejected
    /// batch leaves the graph untouched. When a leaf appears more than once
    /// the last write wins.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownNode`] or [`GraphError::NotALeaf`].
    pub fn apply<I>(&mut self, writes: I) -> Result<BatchOutcome<K>, GraphError>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
    {
        let mut staged: Vec<(usize, Option<V>)> = Vec::new();
        for (key, value) in writes {
            let i = self.lookup(key)?;
            if !matches!(self.nodes[i].kind, NodeKind::Leaf) {
                return Err(GraphError::NotALeaf(format!("{key:?}")));
            }
            match staged.iter_mut().find(|(j, _)| *j == i) {
                Some(slot) => slot.1 = value,
                None => staged.push((i, value)),
            }
        }

        self.batches += 1;

        let mut changed = Vec::new();
        let mut pending: BTreeSet<(usize, usize)> = BTreeSet::new();

        for (i, value) in staged {
            if self.nodes[i].value != value {
                self.nodes[i].value = value;
                changed.push(i);
                self.schedule_dependents(i, &mut pending);
            }
        }

        let mut recomputed = 0;
        while let Some((_, i)) = pending.pop_first() {
            let Some(value) = self.compute(i) else {
                continue;
            };
            recomputed += 1;

            let node = &mut self.nodes[i];
            node.recomputations += 1;
            tracing::trace!(node = ?node.key, "recomputed");

            if node.value != value {
                node.value = value;
                changed.push(i);
                self.schedule_dependents(i, &mut pending);
            }
        }

        changed.sort_by_key(|&i| self.nodes[i].rank);
        self.notify(&changed);

        let outcome = BatchOutcome {
            batch: self.batches,
            changed: changed.iter().map(|&i| self.nodes[i].key).collect(),
            recomputed,
        };

        tracing::debug!(
            batch = outcome.batch,
            changed = outcome.changed.len(),
            recomputed,
            "propagation batch settled"
        );

        Ok(outcome)
    }

    /// Subscribe to a node.
    ///
    /// The current value is queued immediately, followed by every later
    /// change.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownNode`] if `key` is not in the graph.
    pub fn subscribe(&mut self, key: K) -> Result<Subscription<K, V>, GraphError> {
        let i = self.lookup(key)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;

        let _ = tx.send(NodeUpdate {
            node: key,
            value: self.nodes[i].value.clone(),
            batch: self.batches,
        });
        self.subscribers.push(Subscriber { id, node: i, tx });

        Ok(Subscription::new(id, key, rx))
    }

    /// Stop delivery to a subscription. Returns `false` if it was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    /// Current value of a node; `None` if absent or unknown.
    #[must_use]
    pub fn get(&self, key: K) -> Option<&V> {
        self.index
            .get(&key)
            .and_then(|&i| self.nodes[i].value.as_ref())
    }

    /// How often a derived node has been recomputed.
    #[must_use]
    pub fn recomputations(&self, key: K) -> u64 {
        self.index
            .get(&key)
            .map_or(0, |&i| self.nodes[i].recomputations)
    }

    /// Number of batches applied so far.
    #[must_use]
    pub const fn batches(&self) -> u64 {
        self.batches
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// All keys in topological order.
    #[must_use]
    pub fn topological_order(&self) -> Vec<K> {
        self.order.iter().map(|&i| self.nodes[i].key).collect()
    }

    /// Direct dependents of a node.
    #[must_use]
    pub fn dependents(&self, key: K) -> Vec<K> {
        self.index.get(&key).map_or_else(Vec::new, |&i| {
            self.nodes[i]
                .dependents
                .iter()
                .map(|&d| self.nodes[d].key)
                .collect()
        })
    }

    fn lookup(&self, key: K) -> Result<usize, GraphError> {
        self.index
            .get(&key)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(format!("{key:?}")))
    }

    fn schedule_dependents(&self, i: usize, pending: &mut BTreeSet<(usize, usize)>) {
        for &d in &self.nodes[i].dependents {
            pending.insert((self.nodes[d].rank, d));
        }
    }

    /// Evaluate a derived node against the current dependency values.
    ///
    /// Returns `None` for leaves, `Some(new_value)` otherwise.
    fn compute(&self, i: usize) -> Option<Option<V>> {
        let node = &self.nodes[i];
        let NodeKind::Derived(compute) = &node.kind else {
            return None;
        };

        let inputs: Vec<Option<&V>> = node
            .deps
            .iter()
            .map(|&d| self.nodes[d].value.as_ref())
            .collect();

        Some(compute(&inputs))
    }

    fn notify(&mut self, changed: &[usize]) {
        if changed.is_empty() || self.subscribers.is_empty() {
            return;
        }

        let batch = self.batches;
        for &i in changed {
            let node = &self.nodes[i];
            for sub in self.subscribers.iter().filter(|s| s.node == i) {
                let _ = sub.tx.send(NodeUpdate {
                    node: node.key,
                    value: node.value.clone(),
                    batch,
                });
            }
        }

        self.subscribers.retain(|s| !s.tx.is_closed());
    }
}

impl<K: Debug, V> Debug for PropagationGraph<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagationGraph")
            .field("nodes", &self.nodes.len())
            .field("subscribers", &self.subscribers.len())
            .field("batches", &self.batches)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Dependency graph construction and topological ordering.
//!
//! This module derives edges between resource descriptors from attribute
//! references and explicit `depends_on` entries, rejects dangling references
//! and cycles, and produces a deterministic topologically sorted node
//! sequence for the executor.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use tracing::debug;

use crate::error::{GraphError, Result, VectorformError};

use super::descriptor::{ResourceDescriptor, ResourceRef};

/// Builder that turns a descriptor set into a validated dependency graph.
#[derive(Debug, Default)]
pub struct GraphBuilder;

/// A descriptor augmented with resolved dependency edges.
///
/// Edge indices refer to positions within the owning [`ResourceGraph`]'s
/// topologically ordered node sequence.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// The resource descriptor.
    pub descriptor: ResourceDescriptor,
    /// Indices of nodes this node depends on.
    pub deps: Vec<usize>,
    /// Indices of nodes that depend on this node.
    pub dependents: Vec<usize>,
}

/// A validated, acyclic resource graph in topological order.
///
/// Every node appears after all of its dependencies; ties are broken by
/// declaration order so the sequence is reproducible across runs with
/// identical input.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    /// Nodes in apply order.
    pub nodes: Vec<GraphNode>,
}

impl GraphBuilder {
    /// Creates a new graph builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds a validated graph from descriptors in declaration order.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] on duplicate descriptors, references to
    /// descriptors that do not exist, or dependency cycles. No partial graph
    /// is ever produced.
    pub fn build(&self, descriptors: Vec<ResourceDescriptor>) -> Result<ResourceGraph> {
        let index = Self::index_descriptors(&descriptors)?;
        let deps = Self::resolve_edges(&descriptors, &index)?;

        if let Some(cycle) = Self::find_cycle(&deps) {
            let sequence: Vec<String> = cycle
                .iter()
                .map(|&i| descriptors[i].address().to_string())
                .collect();
            return Err(VectorformError::Graph(GraphError::CyclicDependency {
                cycle: sequence.join(" -> "),
            }));
        }

        let order = Self::topological_order(&deps);
        debug!("Graph ordered: {} nodes", order.len());

        Ok(Self::assemble(descriptors, &deps, &order))
    }

    /// Maps each descriptor address to its declaration index, rejecting
    /// duplicates.
    fn index_descriptors(
        descriptors: &[ResourceDescriptor],
    ) -> Result<BTreeMap<ResourceRef, usize>> {
        let mut index = BTreeMap::new();
        for (i, descriptor) in descriptors.iter().enumerate() {
            let address = descriptor.address();
            if index.insert(address.clone(), i).is_some() {
                return Err(VectorformError::Graph(GraphError::DuplicateResource {
                    resource_type: address.resource_type,
                    name: address.name,
                }));
            }
        }
        Ok(index)
    }

    /// Resolves every reference to a declaration index, building per-node
    /// dependency sets.
    fn resolve_edges(
        descriptors: &[ResourceDescriptor],
        index: &BTreeMap<ResourceRef, usize>,
    ) -> Result<Vec<BTreeSet<usize>>> {
        let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); descriptors.len()];

        for (i, descriptor) in descriptors.iter().enumerate() {
            for (target, attribute) in descriptor.reference_targets() {
                let Some(&target_idx) = index.get(target) else {
                    return Err(VectorformError::Graph(GraphError::UnresolvedReference {
                        from: descriptor.address().to_string(),
                        target: target.to_string(),
                        attribute: attribute.map(String::from),
                    }));
                };
                deps[i].insert(target_idx);
            }
        }

        Ok(deps)
    }

    /// Searches for a dependency cycle via depth-first traversal.
    ///
    /// Returns the cycle's node sequence (first node repeated at the end)
    /// when one exists.
    fn find_cycle(deps: &[BTreeSet<usize>]) -> Option<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Gray,
            Black,
        }

        fn visit(
            node: usize,
            deps: &[BTreeSet<usize>],
            marks: &mut [Mark],
            path: &mut Vec<usize>,
        ) -> Option<Vec<usize>> {
            marks[node] = Mark::Gray;
            path.push(node);

            for &dep in &deps[node] {
                match marks[dep] {
                    Mark::Gray => {
                        // Back edge: slice the current path from the first
                        // occurrence of `dep` and close the loop.
                        let start = path.iter().position(|&n| n == dep)?;
                        let mut cycle = path[start..].to_vec();
                        cycle.push(dep);
                        return Some(cycle);
                    }
                    Mark::White => {
                        if let Some(cycle) = visit(dep, deps, marks, path) {
                            return Some(cycle);
                        }
                    }
                    Mark::Black => {}
                }
            }

            path.pop();
            marks[node] = Mark::Black;
            None
        }

        let mut marks = vec![Mark::White; deps.len()];
        let mut path = Vec::new();
        for n in 0..deps.len() {
            if marks[n] == Mark::White
                && let Some(cycle) = visit(n, deps, &mut marks, &mut path)
            {
                return Some(cycle);
            }
        }
        None
    }

    /// Produces a topological ordering of declaration indices.
    ///
    /// Kahn's algorithm with a min-heap over declaration indices, so nodes
    /// that become ready together are emitted in declaration order.
    fn topological_order(deps: &[BTreeSet<usize>]) -> Vec<usize> {
        let mut indegree: Vec<usize> = deps.iter().map(BTreeSet::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); deps.len()];
        for (i, node_deps) in deps.iter().enumerate() {
            for &dep in node_deps {
                dependents[dep].push(i);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(deps.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in &dependents[node] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        order
    }

    /// Assembles the final graph, remapping edges to topological positions.
    fn assemble(
        descriptors: Vec<ResourceDescriptor>,
        deps: &[BTreeSet<usize>],
        order: &[usize],
    ) -> ResourceGraph {
        let mut position = vec![0usize; order.len()];
        for (topo_idx, &decl_idx) in order.iter().enumerate() {
            position[decl_idx] = topo_idx;
        }

        let mut descriptor_slots: Vec<Option<ResourceDescriptor>> =
            descriptors.into_iter().map(Some).collect();

        let mut nodes: Vec<GraphNode> = order
            .iter()
            .map(|&decl_idx| {
                let mut node_deps: Vec<usize> =
                    deps[decl_idx].iter().map(|&d| position[d]).collect();
                node_deps.sort_unstable();
                GraphNode {
                    descriptor: descriptor_slots[decl_idx]
                        .take()
                        .unwrap_or_else(|| ResourceDescriptor::new("", "")),
                    deps: node_deps,
                    dependents: Vec::new(),
                }
            })
            .collect();

        for i in 0..nodes.len() {
            let node_deps = nodes[i].deps.clone();
            for dep in node_deps {
                nodes[dep].dependents.push(i);
            }
        }

        ResourceGraph { nodes }
    }
}

impl ResourceGraph {
    /// Returns the number of nodes in the graph.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph contains no nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds a node's topological index by address.
    #[must_use]
    pub fn position(&self, address: &ResourceRef) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| &n.descriptor.address() == address)
    }
}

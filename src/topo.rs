//! Bottom-up linearization of a forest.

use crate::error::{Error, Result};
use crate::forest::{Edge, Forest, NodeId};

/// Layered (Kahn) topological sort of the nodes of a hypergraph
///
/// Every head depends on its tails. Nodes are emitted layer by layer, and
/// inside a layer by ascending node id so that the order is reproducible.
/// Fails with [`Error::Grammar`] if the edges contain a cycle.
pub(crate) fn sort(name: &str, num_nodes: usize, edges: &[Edge]) -> Result<Vec<NodeId>> {
    // deps[v]: distinct tails v still waits for
    let mut deps = vec![0usize; num_nodes];
    let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); num_nodes];
    for edge in edges {
        for &tail in &edge.tails {
            if !dependents[tail].contains(&edge.head) {
                dependents[tail].push(edge.head);
                deps[edge.head] += 1;
            }
        }
    }

    let mut order = Vec::with_capacity(num_nodes);
    let mut layer: Vec<NodeId> = (0..num_nodes).filter(|&v| deps[v] == 0).collect();
    while !layer.is_empty() {
        let mut next = Vec::new();
        for &v in &layer {
            for &head in &dependents[v] {
                deps[head] -= 1;
                if deps[head] == 0 {
                    next.push(head);
                }
            }
        }
        order.extend_from_slice(&layer);
        next.sort_unstable();
        layer = next;
    }

    if order.len() != num_nodes {
        return Err(Error::grammar(
            name,
            format!(
                "cycle detected: {} of {} nodes could not be ordered",
                num_nodes - order.len(),
                num_nodes
            ),
        ));
    }
    Ok(order)
}

/// Recompute the topological order of a forest from its edges
pub fn topological_sort(forest: &Forest) -> Result<Vec<NodeId>> {
    sort(forest.name(), forest.num_nodes(), forest.edges())
}

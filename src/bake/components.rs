//! Connected components over a filtered adjacency relation.
//!
//! Both smoothing groups (polygons around a vertex joined by soft edges) and
//! UV charts (triangles joined by matching corners) are partitions of a graph
//! whose edges are filtered by a predicate. Callers describe the graph by
//! pushing the neighbors of a node into a scratch buffer.

use std::collections::VecDeque;

/// Groups `0..node_count` into connected components with a breadth-first work
/// queue. A node is consumed exactly once. Components are returned in order of
/// their lowest node, and members in discovery order.
pub fn connected_components<F>(node_count: usize, mut neighbors: F) -> Vec<Vec<usize>>
where
    F: FnMut(usize, &mut Vec<usize>),
{
    let mut visited = vec![false; node_count];
    let mut components = Vec::new();
    let mut queue = VecDeque::new();
    let mut scratch = Vec::new();

    for seed in 0..node_count {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);
        let mut members = Vec::new();

        while let Some(node) = queue.pop_front() {
            members.push(node);
            scratch.clear();
            neighbors(node, &mut scratch);
            for &next in &scratch {
                if next < node_count && !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        components.push(members);
    }
    components
}

/// Per-node component label, the inverse of [`connected_components`].
#[must_use]
pub fn component_labels(node_count: usize, components: &[Vec<usize>]) -> Vec<u32> {
    let mut labels = vec![u32::MAX; node_count];
    for (label, members) in components.iter().enumerate() {
        for &node in members {
            labels[node] = label as u32;
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_and_isolated_nodes() {
        // 0-1-2   3   4-5
        let edges = [(0, 1), (1, 2), (4, 5)];
        let comps = connected_components(6, |n, out| {
            for &(a, b) in &edges {
                if a == n {
                    out.push(b);
                } else if b == n {
                    out.push(a);
                }
            }
        });
        assert_eq!(comps, vec![vec![0, 1, 2], vec![3], vec![4, 5]]);
        assert_eq!(component_labels(6, &comps), vec![0, 0, 0, 1, 2, 2]);
    }

    #[test]
    fn out_of_range_neighbors_are_ignored() {
        let comps = connected_components(2, |_, out| out.push(99));
        assert_eq!(comps.len(), 2);
    }
}

//! Undirected topology graph over named waypoints

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use super::PlanError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Unweighted undirected graph of waypoint names.
///
/// Neighbours are kept sorted so that shortest path queries with several equal length answers
/// always give the same one.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    adjacency: BTreeMap<String, BTreeSet<String>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str) {
        self.adjacency.entry(name.to_string()).or_default();
    }

    pub fn add_edge(&mut self, a: &str, b: &str) {
        self.adjacency
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.adjacency
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adjacency.contains_key(name)
    }

    /// All edges, each listed once.
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges = Vec::new();

        for (a, neighbours) in &self.adjacency {
            for b in neighbours {
                if a <= b {
                    edges.push((a.clone(), b.clone()));
                }
            }
        }

        edges
    }

    /// Breadth first shortest path between two nodes, both ends included.
    pub fn shortest_path(&self, from: &str, to: &str) -> Result<Vec<String>, PlanError> {
        for name in &[from, to] {
            if !self.contains(name) {
                return Err(PlanError::UnknownNode(name.to_string()));
            }
        }

        if from == to {
            return Ok(vec![from.to_string()]);
        }

        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(from);
        parents.insert(from, from);

        while let Some(node) = queue.pop_front() {
            if node == to {
                break;
            }

            if let Some(neighbours) = self.adjacency.get(node) {
                for n in neighbours {
                    if !parents.contains_key(n.as_str()) {
                        parents.insert(n.as_str(), node);
                        queue.push_back(n.as_str());
                    }
                }
            }
        }

        if !parents.contains_key(to) {
            return Err(PlanError::NoPath {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        // Walk back from the goal
        let mut path = vec![to.to_string()];
        let mut node = to;
        while node != from {
            node = parents[node];
            path.push(node.to_string());
        }
        path.reverse();

        Ok(path)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn graph() -> TopologyGraph {
        let mut g = TopologyGraph::new();
        g.add_edge("safe_a", "hub");
        g.add_edge("hub", "safe_b");
        g.add_edge("safe_b", "safe_c");
        g.add_edge("safe_a", "long_1");
        g.add_edge("long_1", "long_2");
        g.add_edge("long_2", "safe_c");
        g.add_node("island");
        g
    }

    #[test]
    fn test_shortest_path() {
        let g = graph();

        assert_eq!(
            g.shortest_path("safe_a", "safe_b").unwrap(),
            vec!["safe_a", "hub", "safe_b"]
        );
        assert_eq!(g.shortest_path("safe_c", "safe_a").unwrap().len(), 4);
        assert_eq!(g.shortest_path("hub", "hub").unwrap(), vec!["hub"]);
        assert_eq!(g.shortest_path("island", "island").unwrap(), vec!["island"]);
    }

    #[test]
    fn test_shortest_path_errors() {
        let g = graph();

        match g.shortest_path("safe_a", "island") {
            Err(PlanError::NoPath { from, to }) => {
                assert_eq!(from, "safe_a");
                assert_eq!(to, "island");
            }
            r => panic!("Expected no path, got {:?}", r),
        }

        assert!(matches!(
            g.shortest_path("safe_a", "nowhere"),
            Err(PlanError::UnknownNode(n)) if n == "nowhere"
        ));
    }

    #[test]
    fn test_edges() {
        let mut g = TopologyGraph::new();
        g.add_edge("b", "a");
        g.add_edge("a", "b");
        assert_eq!(g.edges(), vec![("a".to_string(), "b".to_string())]);
    }
}

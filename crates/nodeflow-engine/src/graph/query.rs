use std::collections::{HashMap, HashSet, VecDeque};

use nodeflow_core::types::{Edge, Node};

use super::node::GraphNode;

/// Index arena over one workflow's nodes and edges.
///
/// Built fresh per run and read-only afterwards. Edges pointing at unknown
/// node ids are dropped from the adjacency lists; when ids repeat, the first
/// node with that id owns it.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
    /// Successor indices per node, in edge order (duplicates kept).
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    /// Node ids that appear as the target of any edge.
    targeted: HashSet<String>,
}

impl WorkflowGraph {
    pub fn new(nodes: &[Node], edges: &[Edge]) -> Self {
        let graph_nodes: Vec<GraphNode> = nodes.iter().cloned().map(GraphNode::new).collect();

        let mut index = HashMap::with_capacity(graph_nodes.len());
        for (i, n) in graph_nodes.iter().enumerate() {
            index.entry(n.id().to_string()).or_insert(i);
        }

        let mut successors = vec![Vec::new(); graph_nodes.len()];
        let mut predecessors = vec![Vec::new(); graph_nodes.len()];
        for edge in edges {
            if let (Some(&from), Some(&to)) = (index.get(&edge.source), index.get(&edge.target)) {
                successors[from].push(to);
                predecessors[to].push(from);
            }
        }

        let targeted = edges.iter().map(|e| e.target.clone()).collect();

        Self {
            nodes: graph_nodes,
            index,
            successors,
            predecessors,
            targeted,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &GraphNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Resolve the traversal entry point.
    ///
    /// 1. a node with `type == "start"`
    /// 2. a node whose label contains "start" (case-insensitive)
    /// 3. among nodes without incoming edges, the first API-looking one,
    ///    else the first of them
    /// 4. the first node
    pub fn find_start_node(&self) -> Option<usize> {
        if let Some(i) = self.position(|n| n.node.is_start_type()) {
            return Some(i);
        }

        if let Some(i) = self.position(|n| n.node.label().to_lowercase().contains("start")) {
            return Some(i);
        }

        let sources: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| !self.targeted.contains(self.nodes[i].id()))
            .collect();
        if let Some(&first) = sources.first() {
            let api = sources
                .iter()
                .copied()
                .find(|&i| self.nodes[i].node.looks_like_api());
            return Some(api.unwrap_or(first));
        }

        if self.nodes.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    /// Targets of the node's outgoing edges, in edge order.
    pub fn next_nodes(&self, idx: usize) -> &[usize] {
        &self.successors[idx]
    }

    /// Same as [`next_nodes`](Self::next_nodes), looked up by id.
    pub fn next_nodes_of(&self, id: &str) -> Vec<&GraphNode> {
        self.index_of(id)
            .map(|i| self.successors[i].iter().map(|&s| &self.nodes[s]).collect())
            .unwrap_or_default()
    }

    pub fn has_output_node(&self) -> bool {
        self.nodes.iter().any(|n| n.node.is_output())
    }

    pub fn output_nodes(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].node.is_output())
            .collect()
    }

    /// Whether some directed path leads from this node to an output node.
    ///
    /// Depth-first over successors, refusing to re-enter a node already on
    /// the current path, so cycles end the branch instead of recursing.
    pub fn is_connected_to_output(&self, idx: usize) -> bool {
        let mut on_path = vec![false; self.nodes.len()];
        self.connected(idx, &mut on_path)
    }

    fn connected(&self, idx: usize, on_path: &mut [bool]) -> bool {
        if on_path[idx] {
            return false;
        }
        if self.nodes[idx].node.is_output() {
            return true;
        }

        on_path[idx] = true;
        let found = self.successors[idx]
            .iter()
            .any(|&next| self.connected(next, on_path));
        on_path[idx] = false;
        found
    }

    /// Ids of every node that is an output node or can reach one.
    ///
    /// One reverse breadth-first pass from the outputs; agrees with
    /// [`is_connected_to_output`](Self::is_connected_to_output) node by node.
    pub fn nodes_connected_to_output(&self) -> HashSet<String> {
        let mut seen = vec![false; self.nodes.len()];
        let mut queue: VecDeque<usize> = self.output_nodes().into();
        for &i in &queue {
            seen[i] = true;
        }

        while let Some(idx) = queue.pop_front() {
            for &prev in &self.predecessors[idx] {
                if !seen[prev] {
                    seen[prev] = true;
                    queue.push_back(prev);
                }
            }
        }

        let mut ids: HashSet<String> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| seen[*i])
            .map(|(_, n)| n.id().to_string())
            .collect();
        // Output nodes shadowed by a duplicate id still count by id.
        ids.extend(
            self.nodes
                .iter()
                .filter(|n| n.node.is_output())
                .map(|n| n.id().to_string()),
        );
        ids
    }

    fn position(&self, pred: impl Fn(&GraphNode) -> bool) -> Option<usize> {
        self.nodes.iter().position(pred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_core::types::{ApiRouteConfig, HttpMethod};

    fn node(id: &str, ty: &str, label: &str) -> Node {
        Node::new(id, ty, label)
    }

    fn start_id(nodes: &[Node], edges: &[Edge]) -> Option<String> {
        let graph = WorkflowGraph::new(nodes, edges);
        graph.find_start_node().map(|i| graph.node(i).id().to_string())
    }

    #[test]
    fn test_start_node_empty_graph() {
        assert_eq!(start_id(&[], &[]), None);
    }

    #[test]
    fn test_start_node_prefers_start_type() {
        let nodes = vec![
            node("a", "default", "Kickstart here"),
            node("b", "default", "Api"),
            node("c", "start", "Begin"),
        ];
        assert_eq!(start_id(&nodes, &[Edge::new("c", "a")]).as_deref(), Some("c"));
    }

    #[test]
    fn test_start_node_by_label_case_insensitive() {
        let nodes = vec![node("a", "default", "Fetch"), node("b", "default", "START here")];
        let edges = vec![Edge::new("b", "a")];
        assert_eq!(start_id(&nodes, &edges).as_deref(), Some("b"));
    }

    #[test]
    fn test_start_node_prefers_api_source() {
        let route = ApiRouteConfig::new(HttpMethod::Get, "http://example.test");
        let nodes = vec![
            node("plain", "default", "Step"),
            node("api", "default", "Fetch").with_api_route(route),
            node("sink", "output", "Output"),
        ];
        let edges = vec![Edge::new("plain", "sink"), Edge::new("api", "sink")];
        assert_eq!(start_id(&nodes, &edges).as_deref(), Some("api"));
    }

    #[test]
    fn test_start_node_first_source_without_api() {
        let nodes = vec![
            node("x", "default", "Step"),
            node("y", "default", "Other"),
            node("z", "output", "Output"),
        ];
        let edges = vec![Edge::new("y", "x"), Edge::new("x", "z")];
        assert_eq!(start_id(&nodes, &edges).as_deref(), Some("y"));
    }

    #[test]
    fn test_start_node_without_edges_is_first_node() {
        let nodes = vec![node("first", "default", "One"), node("second", "default", "Two")];
        assert_eq!(start_id(&nodes, &[]).as_deref(), Some("first"));
    }

    #[test]
    fn test_start_node_falls_back_to_first_in_full_cycle() {
        let nodes = vec![node("a", "default", "A"), node("b", "default", "B")];
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "a")];
        assert_eq!(start_id(&nodes, &edges).as_deref(), Some("a"));
    }

    #[test]
    fn test_next_nodes_follow_edge_order() {
        let nodes = vec![
            node("s", "start", "Start"),
            node("a", "default", "A"),
            node("b", "default", "B"),
        ];
        let edges = vec![
            Edge::new("s", "b"),
            Edge::new("s", "a"),
            Edge::new("s", "b"),
            Edge::new("s", "missing"),
        ];
        let graph = WorkflowGraph::new(&nodes, &edges);
        let ids: Vec<&str> = graph.next_nodes_of("s").iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["b", "a", "b"]);
        assert!(graph.next_nodes_of("unknown").is_empty());
    }

    #[test]
    fn test_output_detection() {
        let nodes = vec![
            node("a", "default", "A"),
            node("o1", "output", "Result"),
            node("o2", "default", "Output"),
        ];
        let graph = WorkflowGraph::new(&nodes, &[]);
        assert!(graph.has_output_node());
        assert_eq!(graph.output_nodes(), vec![1, 2]);

        let graph = WorkflowGraph::new(&nodes[..1], &[]);
        assert!(!graph.has_output_node());
        assert!(graph.output_nodes().is_empty());
    }

    #[test]
    fn test_connected_to_output_through_chain() {
        let nodes = vec![
            node("s", "start", "Start"),
            node("a", "default", "A"),
            node("o", "output", "Output"),
            node("dead", "default", "Dead end"),
        ];
        let edges = vec![
            Edge::new("s", "a"),
            Edge::new("a", "o"),
            Edge::new("s", "dead"),
        ];
        let graph = WorkflowGraph::new(&nodes, &edges);
        assert!(graph.is_connected_to_output(0));
        assert!(graph.is_connected_to_output(1));
        assert!(graph.is_connected_to_output(2));
        assert!(!graph.is_connected_to_output(3));
    }

    #[test]
    fn test_cycle_without_output_terminates() {
        let nodes = vec![node("a", "default", "A"), node("b", "default", "B")];
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "a"), Edge::new("a", "a")];
        let graph = WorkflowGraph::new(&nodes, &edges);
        assert!(!graph.is_connected_to_output(0));
        assert!(!graph.is_connected_to_output(1));
        assert!(graph.nodes_connected_to_output().is_empty());
    }

    #[test]
    fn test_cycle_with_exit_to_output() {
        let nodes = vec![
            node("a", "default", "A"),
            node("b", "default", "B"),
            node("o", "output", "Output"),
        ];
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "a"), Edge::new("b", "o")];
        let graph = WorkflowGraph::new(&nodes, &edges);
        assert!(graph.is_connected_to_output(0));
        assert!(graph.is_connected_to_output(1));
    }

    #[test]
    fn test_reverse_pass_agrees_with_path_search() {
        let nodes = vec![
            node("s", "start", "Start"),
            node("a", "default", "A"),
            node("b", "default", "B"),
            node("c", "default", "C"),
            node("o", "default", "Output"),
            node("x", "default", "Orphan"),
        ];
        let edges = vec![
            Edge::new("s", "a"),
            Edge::new("a", "b"),
            Edge::new("b", "a"),
            Edge::new("b", "o"),
            Edge::new("s", "c"),
            Edge::new("c", "c"),
            Edge::new("x", "s"),
        ];
        let graph = WorkflowGraph::new(&nodes, &edges);
        let reachable = graph.nodes_connected_to_output();
        for (i, n) in graph.nodes().iter().enumerate() {
            assert_eq!(
                reachable.contains(n.id()),
                graph.is_connected_to_output(i),
                "disagreement on {}",
                n.id()
            );
        }
        assert!(!reachable.contains("c"));
        assert!(reachable.contains("x"));
    }
}

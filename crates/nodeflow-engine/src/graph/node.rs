use nodeflow_core::types::{ApiRouteConfig, Node};

/// What a node does when the traversal reaches it.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Entry marker. Never executed as a work item.
    Start,
    /// Passes the previous node's data through.
    Output,
    /// Sends the previous node's data to the text-cleaning service.
    Transform,
    /// Issues an HTTP request.
    Api(ApiRouteConfig),
    /// No route and no special label: informational payload only.
    Passive,
}

impl NodeKind {
    /// Resolve a node's kind from its raw `type`, label, and route.
    ///
    /// First match wins: start type, output, "Transform" label, non-empty
    /// route, then passive.
    pub fn resolve(node: &Node) -> Self {
        if node.is_start_type() {
            return NodeKind::Start;
        }
        if node.is_output() {
            return NodeKind::Output;
        }
        if node.label() == "Transform" {
            return NodeKind::Transform;
        }
        match node.api_route() {
            Some(route) => NodeKind::Api(route.clone()),
            None => NodeKind::Passive,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Output => "output",
            NodeKind::Transform => "transform",
            NodeKind::Api(_) => "api",
            NodeKind::Passive => "passive",
        }
    }
}

/// A node paired with its resolved kind.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub node: Node,
    pub kind: NodeKind,
}

impl GraphNode {
    pub fn new(node: Node) -> Self {
        let kind = NodeKind::resolve(&node);
        Self { node, kind }
    }

    pub fn id(&self) -> &str {
        &self.node.id
    }
}

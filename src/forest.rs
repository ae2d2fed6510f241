use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::symbol::Node;
use crate::topo;

/// Index of a node inside a [`Forest`]
pub type NodeId = usize;
/// Index of an edge inside a [`Forest`]
pub type EdgeId = usize;

/// Order in which the two children of a binary production are composed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Orientation {
    Monotone,
    Inverted,
}

/// A production as handed over by the forest producer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    pub lhs: Node,
    pub rhs: Vec<Node>,
    pub orientation: Orientation,
}

impl Rule {
    /// Terminal emission or start production
    pub fn unary(lhs: Node, child: Node) -> Self {
        Self {
            lhs,
            rhs: vec![child],
            orientation: Orientation::Monotone,
        }
    }

    /// Monotone binary composition
    pub fn binary(lhs: Node, left: Node, right: Node) -> Self {
        Self {
            lhs,
            rhs: vec![left, right],
            orientation: Orientation::Monotone,
        }
    }

    /// Inverted binary composition
    ///
    /// Children are given in surface order of the side the forest yields.
    pub fn inverted(lhs: Node, left: Node, right: Node) -> Self {
        Self {
            lhs,
            rhs: vec![left, right],
            orientation: Orientation::Inverted,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ->", self.lhs)?;
        for node in &self.rhs {
            write!(f, " {}", node)?;
        }
        if self.orientation == Orientation::Inverted {
            write!(f, " <inv>")?;
        }
        Ok(())
    }
}

/// A hyperedge: one head produced from one or two tails
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub head: NodeId,
    pub tails: Vec<NodeId>,
    pub orientation: Orientation,
}

impl Edge {
    pub fn is_binary(&self) -> bool {
        self.tails.len() == 2
    }
}

/// Incrementally collects rules and validates them into a [`Forest`]
#[derive(Debug, Clone)]
pub struct ForestBuilder {
    name: String,
    nodes: Vec<Node>,
    node_ids: HashMap<Node, NodeId>,
    edges: Vec<Edge>,
    seen: HashMap<Edge, EdgeId>,
}

impl ForestBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            node_ids: HashMap::new(),
            edges: Vec::new(),
            seen: HashMap::new(),
        }
    }

    fn intern(&mut self, node: Node) -> NodeId {
        if let Some(&id) = self.node_ids.get(&node) {
            id
        } else {
            let id = self.nodes.len();
            self.node_ids.insert(node.clone(), id);
            self.nodes.push(node);
            id
        }
    }

    /// Add a production, returning its edge id
    ///
    /// Adding the same production twice returns the id of the first copy.
    pub fn add_rule(&mut self, rule: Rule) -> Result<EdgeId> {
        if rule.rhs.is_empty() || rule.rhs.len() > 2 {
            return Err(Error::grammar(
                &self.name,
                format!("rule `{}` must have one or two children", rule),
            ));
        }
        if rule.lhs.is_terminal() {
            return Err(Error::grammar(
                &self.name,
                format!("terminal head in rule `{}`", rule),
            ));
        }
        let head = self.intern(rule.lhs);
        let tails = rule.rhs.into_iter().map(|n| self.intern(n)).collect();
        let edge = Edge {
            head,
            tails,
            orientation: rule.orientation,
        };
        if let Some(&id) = self.seen.get(&edge) {
            return Ok(id);
        }
        let id = self.edges.len();
        self.seen.insert(edge.clone(), id);
        self.edges.push(edge);
        Ok(id)
    }

    /// Add several productions
    pub fn extend<I: IntoIterator<Item = Rule>>(&mut self, rules: I) -> Result<()> {
        for rule in rules {
            self.add_rule(rule)?;
        }
        Ok(())
    }

    /// Build the immutable forest together with its indices and topological order
    pub fn build(self) -> Result<Forest> {
        let num_nodes = self.nodes.len();
        let mut by_head = vec![Vec::new(); num_nodes];
        let mut by_tail: Vec<Vec<EdgeId>> = vec![Vec::new(); num_nodes];
        for (eid, edge) in self.edges.iter().enumerate() {
            by_head[edge.head].push(eid);
            for (i, &tail) in edge.tails.iter().enumerate() {
                // An edge is indexed once per distinct tail
                if !edge.tails[..i].contains(&tail) {
                    by_tail[tail].push(eid);
                }
            }
        }

        let mut root = None;
        if !self.edges.is_empty() {
            let candidates: Vec<NodeId> = (0..num_nodes)
                .filter(|&v| by_tail[v].is_empty())
                .collect();
            if candidates.len() != 1 {
                return Err(Error::grammar(
                    &self.name,
                    format!("expected a unique root, found {} candidates", candidates.len()),
                ));
            }
            root = Some(candidates[0]);
        }

        let order = topo::sort(&self.name, num_nodes, &self.edges)?;
        if let (Some(r), Some(&last)) = (root, order.last()) {
            if r != last {
                return Err(Error::grammar(
                    &self.name,
                    "root is not maximal in topological order",
                ));
            }
        }

        Ok(Forest {
            name: self.name,
            nodes: self.nodes,
            node_ids: self.node_ids,
            edges: self.edges,
            by_head,
            by_tail,
            order,
            root,
        })
    }
}

/// An acyclic hypergraph of weighted productions
///
/// Both edge indices and the topological order are computed once in
/// [`ForestBuilder::build`] and are read-only afterwards.
#[derive(Debug, Clone)]
pub struct Forest {
    name: String,
    nodes: Vec<Node>,
    node_ids: HashMap<Node, NodeId>,
    edges: Vec<Edge>,
    /// Edges producing each node
    by_head: Vec<Vec<EdgeId>>,
    /// Edges consuming each node
    by_tail: Vec<Vec<EdgeId>>,
    /// Nodes bottom-up, root last
    order: Vec<NodeId>,
    root: Option<NodeId>,
}

impl Forest {
    /// A forest with no derivation
    pub fn empty<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            node_ids: HashMap::new(),
            edges: Vec::new(),
            by_head: Vec::new(),
            by_tail: Vec::new(),
            order: Vec::new(),
            root: None,
        }
    }

    /// Build a forest from a list of rules
    pub fn from_rules<S, I>(name: S, rules: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = Rule>,
    {
        let mut builder = ForestBuilder::new(name);
        builder.extend(rules)?;
        builder.build()
    }

    /// Identity used in error reports and logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if the forest has no derivation
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn lookup(&self, node: &Node) -> Option<NodeId> {
        self.node_ids.get(node).copied()
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The production an edge stands for
    pub fn rule(&self, id: EdgeId) -> Rule {
        let edge = &self.edges[id];
        Rule {
            lhs: self.nodes[edge.head].clone(),
            rhs: edge.tails.iter().map(|&t| self.nodes[t].clone()).collect(),
            orientation: edge.orientation,
        }
    }

    /// Edges whose head is `node`
    pub fn by_head(&self, node: NodeId) -> &[EdgeId] {
        &self.by_head[node]
    }

    /// Edges that have `node` among their tails
    pub fn by_tail(&self, node: NodeId) -> &[EdgeId] {
        &self.by_tail[node]
    }

    /// All nodes, every edge's tails before its head
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// The unique maximal node, `None` for an empty forest
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn is_terminal(&self, node: NodeId) -> bool {
        self.nodes[node].is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s() -> Node {
        Node::nonterminal("S")
    }

    #[test]
    fn test_indices() {
        let x = Node::nonterminal("X");
        let forest = Forest::from_rules(
            "test",
            vec![
                Rule::unary(s(), x.clone()),
                Rule::binary(x.clone(), Node::terminal("a"), Node::terminal("b")),
                Rule::inverted(x.clone(), Node::terminal("a"), Node::terminal("b")),
            ],
        )
        .unwrap();

        assert_eq!(forest.len(), 3);
        assert_eq!(forest.num_nodes(), 4);
        let xid = forest.lookup(&x).unwrap();
        let aid = forest.lookup(&Node::terminal("a")).unwrap();
        assert_eq!(forest.by_head(xid), &[1, 2]);
        assert_eq!(forest.by_tail(xid), &[0]);
        assert_eq!(forest.by_tail(aid), &[1, 2]);
        assert_eq!(forest.root(), forest.lookup(&s()));
        assert_eq!(forest.order().last().copied(), forest.root());
    }

    #[test]
    fn test_duplicate_rule() {
        let mut builder = ForestBuilder::new("dup");
        let r = Rule::unary(s(), Node::terminal("a"));
        assert_eq!(builder.add_rule(r.clone()).unwrap(), 0);
        assert_eq!(builder.add_rule(r).unwrap(), 0);
        assert_eq!(builder.build().unwrap().len(), 1);
    }

    #[test]
    fn test_repeated_tail_indexed_once() {
        let x = Node::nonterminal("X");
        let forest = Forest::from_rules(
            "twice",
            vec![
                Rule::binary(s(), x.clone(), x.clone()),
                Rule::unary(x.clone(), Node::terminal("a")),
            ],
        )
        .unwrap();
        let xid = forest.lookup(&x).unwrap();
        assert_eq!(forest.by_tail(xid), &[0]);
    }

    #[test]
    fn test_malformed_rules() {
        let mut builder = ForestBuilder::new("bad");
        assert!(builder
            .add_rule(Rule::unary(Node::terminal("a"), Node::terminal("b")))
            .is_err());
        let ternary = Rule {
            lhs: s(),
            rhs: vec![Node::terminal("a"), Node::terminal("b"), Node::terminal("c")],
            orientation: Orientation::Monotone,
        };
        assert!(builder.add_rule(ternary).is_err());
    }

    #[test]
    fn test_multiple_roots() {
        let result = Forest::from_rules(
            "two-roots",
            vec![
                Rule::unary(s(), Node::terminal("a")),
                Rule::unary(Node::nonterminal("T"), Node::terminal("b")),
            ],
        );
        match result {
            Err(Error::Grammar { forest, .. }) => assert_eq!(forest, "two-roots"),
            other => panic!("expected grammar error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_forest() {
        let forest = ForestBuilder::new("empty").build().unwrap();
        assert!(forest.is_empty());
        assert_eq!(forest.root(), None);
        assert!(Forest::empty("e").order().is_empty());
    }
}

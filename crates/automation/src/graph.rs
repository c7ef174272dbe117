//! Indexed view over a [`RuleDocument`].
//!
//! The document stores flat rows; everything that walks the graph (validator,
//! introspection, the execution walker) goes through a [`GraphIndex`], which
//! maps action ids to dense indices and builds adjacency plus the transition
//! table once, in O(V + E).
//!
//! Transition rule (shared by every consumer): at a node, an explicit output
//! label follows the lowest-ordered output edge carrying that label;
//! otherwise the lowest-ordered always edge is followed; otherwise the node
//! is a branch point (it has unresolved output edges) or terminal.

use std::collections::{HashMap, VecDeque};

use opsforge_core::ActionId;

use crate::model::{Action, Edge, EdgeType, RuleDocument};

/// Display name of the synthetic node the start edge leaves from.
pub const START_NODE: &str = "(start)";

/// Result of resolving the next hop from a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hop {
    /// Follow this edge (index into `RuleDocument::edges`).
    Edge(usize),
    /// The node has output edges but nothing resolved; the caller must pick
    /// one of these labels.
    Branch(Vec<String>),
    /// No outgoing edges apply.
    Terminal,
}

/// Structural facts about a graph, computed together by
/// [`GraphIndex::structure`]. Each part is linear in V + E.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    /// Topological order of every node not on or behind a cycle.
    pub topo_order: Vec<usize>,
    /// Nodes lying on a directed cycle, in document order.
    pub on_cycle: Vec<usize>,
    /// `reachable[i]` is true when node `i` can be reached from a start target.
    pub reachable: Vec<bool>,
}

#[derive(Debug)]
pub struct GraphIndex<'a> {
    doc: &'a RuleDocument,
    positions: HashMap<ActionId, usize>,
    start_edges: Vec<usize>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    by_port: HashMap<(usize, &'a str), usize>,
    always: Vec<Option<usize>>,
    wired_ports: Vec<Vec<&'a str>>,
}

impl<'a> GraphIndex<'a> {
    pub fn build(doc: &'a RuleDocument) -> Self {
        let n = doc.actions.len();

        let mut positions = HashMap::with_capacity(n);
        for (i, action) in doc.actions.iter().enumerate() {
            // First occurrence wins; duplicates are a validation error.
            positions.entry(action.id).or_insert(i);
        }

        let mut start_edges = Vec::new();
        let mut outgoing = vec![Vec::new(); n];
        let mut incoming = vec![Vec::new(); n];

        for (e, edge) in doc.edges.iter().enumerate() {
            let target = positions.get(&edge.target_action_id).copied();
            if edge.edge_type == EdgeType::Start {
                start_edges.push(e);
                if let Some(t) = target {
                    incoming[t].push(e);
                }
                continue;
            }
            let source = edge.source_action_id.and_then(|s| positions.get(&s).copied());
            if let (Some(s), Some(t)) = (source, target) {
                outgoing[s].push(e);
                incoming[t].push(e);
            }
        }

        let by_order = |a: &usize, b: &usize| {
            doc.edges[*a]
                .edge_order
                .cmp(&doc.edges[*b].edge_order)
                .then(a.cmp(b))
        };
        start_edges.sort_by(by_order);
        for list in outgoing.iter_mut().chain(incoming.iter_mut()) {
            list.sort_by(by_order);
        }

        let mut by_port = HashMap::new();
        let mut always = vec![None; n];
        let mut wired_ports: Vec<Vec<&'a str>> = vec![Vec::new(); n];
        for (s, edges) in outgoing.iter().enumerate() {
            // `edges` is already in (order, position) order, so the first
            // edge seen for a key is the one to follow.
            for &e in edges {
                let edge = &doc.edges[e];
                match (edge.edge_type, edge.source_output.as_deref()) {
                    (EdgeType::Output, Some(label)) => {
                        by_port.entry((s, label)).or_insert(e);
                        if !wired_ports[s].contains(&label) {
                            wired_ports[s].push(label);
                        }
                    }
                    (EdgeType::Always, _) => {
                        always[s].get_or_insert(e);
                    }
                    _ => {}
                }
            }
        }

        Self {
            doc,
            positions,
            start_edges,
            outgoing,
            incoming,
            by_port,
            always,
            wired_ports,
        }
    }

    pub fn document(&self) -> &'a RuleDocument {
        self.doc
    }

    pub fn len(&self) -> usize {
        self.doc.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.actions.is_empty()
    }

    pub fn position(&self, id: &ActionId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn action(&self, node: usize) -> &'a Action {
        &self.doc.actions[node]
    }

    pub fn edge(&self, e: usize) -> &'a Edge {
        &self.doc.edges[e]
    }

    /// Start edges, ordered by edge order.
    pub fn start_edges(&self) -> &[usize] {
        &self.start_edges
    }

    /// Resolved targets of every start edge.
    pub fn start_targets(&self) -> Vec<usize> {
        self.start_edges
            .iter()
            .filter_map(|&e| self.position(&self.doc.edges[e].target_action_id))
            .collect()
    }

    /// The entry node: target of the lowest-ordered resolvable start edge.
    pub fn entry(&self) -> Option<usize> {
        self.start_targets().into_iter().next()
    }

    /// Non-start edges leaving `node`, ordered by edge order.
    pub fn outgoing(&self, node: usize) -> &[usize] {
        &self.outgoing[node]
    }

    /// Edges (start edges included) entering `node`, ordered by edge order.
    pub fn incoming(&self, node: usize) -> &[usize] {
        &self.incoming[node]
    }

    /// Index of the node an edge points at.
    pub fn target_of(&self, e: usize) -> Option<usize> {
        self.position(&self.doc.edges[e].target_action_id)
    }

    /// Distinct output labels wired out of `node`, in edge order.
    pub fn wired_ports(&self, node: usize) -> Vec<String> {
        self.wired_ports[node].iter().map(|s| s.to_string()).collect()
    }

    /// Resolve the next hop from `node`, optionally following `label`.
    pub fn resolve(&self, node: usize, label: Option<&str>) -> Hop {
        if let Some(label) = label {
            if let Some(&e) = self.by_port.get(&(node, label)) {
                return Hop::Edge(e);
            }
        }
        if let Some(e) = self.always[node] {
            return Hop::Edge(e);
        }
        if !self.wired_ports[node].is_empty() {
            return Hop::Branch(self.wired_ports(node));
        }
        Hop::Terminal
    }

    /// Kahn's algorithm for the order, strongly connected components for
    /// cycle membership, and a BFS from the start targets for reachability.
    pub fn structure(&self) -> Structure {
        let n = self.len();

        let mut in_degree = vec![0usize; n];
        for edges in &self.outgoing {
            for &e in edges {
                if let Some(t) = self.target_of(e) {
                    in_degree[t] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut topo_order = Vec::with_capacity(n);
        while let Some(node) = queue.pop_front() {
            topo_order.push(node);
            for &e in &self.outgoing[node] {
                if let Some(t) = self.target_of(e) {
                    in_degree[t] -= 1;
                    if in_degree[t] == 0 {
                        queue.push_back(t);
                    }
                }
            }
        }

        // Whatever Kahn could not drain sits on a cycle or downstream of one;
        // only the former are reported.
        let cyclic = self.cyclic_nodes();
        let on_cycle = (0..n).filter(|&i| cyclic[i]).collect();

        let mut reachable = vec![false; n];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for t in self.start_targets() {
            if !reachable[t] {
                reachable[t] = true;
                queue.push_back(t);
            }
        }
        while let Some(node) = queue.pop_front() {
            for &e in &self.outgoing[node] {
                if let Some(t) = self.target_of(e) {
                    if !reachable[t] {
                        reachable[t] = true;
                        queue.push_back(t);
                    }
                }
            }
        }

        Structure {
            topo_order,
            on_cycle,
            reachable,
        }
    }

    /// `true` for every node in a strongly connected component with more
    /// than one node, or with a self-loop (iterative Tarjan).
    fn cyclic_nodes(&self) -> Vec<bool> {
        let n = self.len();
        let mut order: Vec<Option<usize>> = vec![None; n];
        let mut low = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut cyclic = vec![false; n];
        let mut next = 0;

        for root in 0..n {
            if order[root].is_some() {
                continue;
            }
            order[root] = Some(next);
            low[root] = next;
            next += 1;
            stack.push(root);
            on_stack[root] = true;
            // (node, position of the next outgoing edge to look at)
            let mut frames = vec![(root, 0usize)];

            while let Some(frame) = frames.last_mut() {
                let (node, pos) = *frame;
                if let Some(&e) = self.outgoing[node].get(pos) {
                    frame.1 += 1;
                    let Some(t) = self.target_of(e) else { continue };
                    if t == node {
                        cyclic[node] = true;
                    }
                    match order[t] {
                        None => {
                            order[t] = Some(next);
                            low[t] = next;
                            next += 1;
                            stack.push(t);
                            on_stack[t] = true;
                            frames.push((t, 0));
                        }
                        Some(seen) if on_stack[t] => low[node] = low[node].min(seen),
                        Some(_) => {}
                    }
                    continue;
                }

                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    low[parent] = low[parent].min(low[node]);
                }
                if order[node] == Some(low[node]) {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack[member] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    if component.len() > 1 {
                        for member in component {
                            cyclic[member] = true;
                        }
                    }
                }
            }
        }
        cyclic
    }

    /// Longest-path depth from the start targets (which have depth 0).
    ///
    /// Depth never decreases along a directed path. Unreachable nodes, and
    /// nodes on or behind a cycle, have no depth.
    pub fn depths(&self) -> Vec<Option<usize>> {
        let n = self.len();
        let structure = self.structure();
        let mut depth: Vec<Option<usize>> = vec![None; n];

        for t in self.start_targets() {
            depth[t] = Some(0);
        }

        let mut settled = vec![false; n];
        for &node in &structure.topo_order {
            settled[node] = true;
            let Some(d) = depth[node] else { continue };
            for &e in &self.outgoing[node] {
                if let Some(t) = self.target_of(e) {
                    depth[t] = Some(depth[t].map_or(d + 1, |cur| cur.max(d + 1)));
                }
            }
        }

        for i in 0..n {
            if !settled[i] || !structure.reachable[i] {
                depth[i] = None;
            }
        }
        depth
    }
}

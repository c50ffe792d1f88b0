//! Dependency graph over workspace repositories.
//!
//! Edges point from a dependant to its dependency. All orderings are
//! deterministic: siblings follow configuration declaration order.

use crate::error::{ConfigError, Result};
use crate::workspace::{RepositoryDescriptor, WorkspaceInfo};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

/// Directed graph of repository dependencies
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl DependencyGraph {
    /// Build the graph for every repository of the workspace
    pub fn build(workspace: &WorkspaceInfo) -> Self {
        Self::from_descriptors(workspace.repositories())
    }

    /// Build the graph from repository descriptors.
    ///
    /// Declared dependencies that name no known repository are skipped.
    pub fn from_descriptors(repositories: &[RepositoryDescriptor]) -> Self {
        Self::from_declarations(
            repositories
                .iter()
                .map(|r| (r.name.as_str(), r.dependencies.as_slice())),
        )
    }

    /// Build the graph from `(name, dependencies)` pairs in declaration order
    pub fn from_declarations<'a, I, D>(declarations: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, D)> + Clone,
        D: AsRef<[String]>,
    {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for (name, _) in declarations.clone() {
            if !nodes.contains_key(name) {
                let idx = graph.add_node(name.to_string());
                nodes.insert(name.to_string(), idx);
            }
        }

        for (name, deps) in declarations {
            let from = nodes[name];
            for dep in deps.as_ref() {
                match nodes.get(dep) {
                    Some(&to) => {
                        graph.add_edge(from, to, ());
                    }
                    None => log::debug!("Skipping unknown dependency '{}' of '{}'", dep, name),
                }
            }
        }

        Self { graph, nodes }
    }

    /// Number of repositories in the graph
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no repositories
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Whether `name` is a node of the graph
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Direct dependencies of a repository, in declaration order
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Direct dependents of a repository, in the order their edges were declared
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbor_indices(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        // petgraph yields edges newest first; sort by edge index to restore declaration order
        let mut edges: Vec<_> = self.graph.edges_directed(idx, direction).collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .map(|e| match direction {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
            .collect()
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<String> {
        match self.nodes.get(name) {
            Some(&idx) => self
                .neighbor_indices(idx, direction)
                .into_iter()
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Every repository ordered so each dependency precedes its dependents.
    ///
    /// Depth-first post-order with three-state marks; re-entering a node that
    /// is still in progress fails with a circular dependency error naming it.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];
        let mut order = Vec::with_capacity(self.graph.node_count());

        for idx in self.graph.node_indices() {
            self.visit(idx, &mut marks, &mut order)?;
        }

        Ok(order)
    }

    fn visit(&self, idx: NodeIndex, marks: &mut [Mark], order: &mut Vec<String>) -> Result<()> {
        match marks[idx.index()] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                return Err(ConfigError::CircularDependency {
                    node: self.graph[idx].clone(),
                }
                .into());
            }
            Mark::Unvisited => {}
        }

        marks[idx.index()] = Mark::InProgress;
        for dep in self.neighbor_indices(idx, Direction::Outgoing) {
            self.visit(dep, marks, order)?;
        }
        marks[idx.index()] = Mark::Done;
        order.push(self.graph[idx].clone());

        Ok(())
    }

    /// Filter a full order down to `subset`, keeping relative order
    pub fn subgraph(order: &[String], subset: &[String]) -> Vec<String> {
        let wanted: HashSet<&str> = subset.iter().map(String::as_str).collect();
        order
            .iter()
            .filter(|name| wanted.contains(name.as_str()))
            .cloned()
            .collect()
    }

    /// Topological order restricted to `subset`
    pub fn processing_order(&self, subset: &[String]) -> Result<Vec<String>> {
        let order = self.topological_order()?;
        Ok(Self::subgraph(&order, subset))
    }

    /// Every direct or transitive dependent of any root, each exactly once,
    /// roots excluded. Returned in breadth-first discovery order.
    pub fn find_all_dependents(&self, roots: &[String]) -> Vec<String> {
        let mut processed: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();

        for root in roots {
            if let Some(&idx) = self.nodes.get(root)
                && processed.insert(idx)
            {
                queue.push_back(idx);
            }
        }

        let mut dependents = Vec::new();
        while let Some(idx) = queue.pop_front() {
            for dependent in self.neighbor_indices(idx, Direction::Incoming) {
                if processed.insert(dependent) {
                    dependents.push(self.graph[dependent].clone());
                    queue.push_back(dependent);
                }
            }
        }

        dependents
    }

    /// Members of `subset` with no workspace dependencies, and the rest
    pub fn partition_independent(&self, subset: &[String]) -> (Vec<String>, Vec<String>) {
        subset
            .iter()
            .cloned()
            .partition(|name| self.dependencies(name).is_empty())
    }
}

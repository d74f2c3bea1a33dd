//! The validated stage graph and its ordering algorithms.

use crate::core::Artifact;
use crate::errors::CycleDetectedError;
use crate::stages::StageDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A producer → consumer dependency carried by one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// The producing stage.
    pub from: String,
    /// The consuming stage.
    pub to: String,
    /// The artifact flowing along the edge.
    pub artifact: String,
    /// The consumer's input slot receiving the artifact.
    pub slot: String,
}

/// A validated, acyclic graph of stages.
///
/// Built by [`super::PipelineBuilder::build`]; every input slot is resolved
/// and the graph is known to be acyclic.
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    name: String,
    stages: Vec<StageDescriptor>,
    artifacts: Vec<Artifact>,
    edges: Vec<Edge>,
    execution_order: Vec<String>,
}

impl PipelineGraph {
    pub(crate) fn new(
        name: String,
        stages: Vec<StageDescriptor>,
        artifacts: Vec<Artifact>,
        edges: Vec<Edge>,
    ) -> Self {
        let execution_order = topological_sort(&stages, &edges);
        Self {
            name,
            stages,
            artifacts,
            edges,
            execution_order,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stages in declaration order.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the artifacts in declaration order.
    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Returns the edges in consumer declaration order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns the stages with no inputs, in declaration order.
    #[must_use]
    pub fn entry_points(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.is_entry_point())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Returns a topological execution order. Ties are broken by declaration
    /// order, so the result is deterministic.
    #[must_use]
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Returns the distinct upstream stages of `stage`, in input order.
    #[must_use]
    pub fn dependencies_of(&self, stage: &str) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        for edge in self.edges.iter().filter(|e| e.to == stage) {
            if !deps.contains(&edge.from.as_str()) {
                deps.push(&edge.from);
            }
        }
        deps
    }
}

/// Detects a cycle among `stage_order` given each stage's upstream
/// dependencies.
///
/// Depth-first search with a recursion-stack marker; stages are visited in
/// `stage_order` so the reported cycle is deterministic.
pub(crate) fn detect_cycles(
    stage_order: &[String],
    dependencies: &HashMap<String, Vec<String>>,
) -> Result<(), CycleDetectedError> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for name in stage_order {
        if !visited.contains(name) {
            if let Some(cycle) =
                dfs_cycle(name, dependencies, &mut visited, &mut rec_stack, &mut path)
            {
                return Err(CycleDetectedError::new(cycle));
            }
        }
    }

    Ok(())
}

fn dfs_cycle(
    node: &str,
    dependencies: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    rec_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<Vec<String>> {
    visited.insert(node.to_string());
    rec_stack.insert(node.to_string());
    path.push(node.to_string());

    if let Some(deps) = dependencies.get(node) {
        for dep in deps {
            if !visited.contains(dep) {
                if let Some(cycle) = dfs_cycle(dep, dependencies, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(dep) {
                let cycle_start = path.iter().position(|n| n == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[cycle_start..].to_vec();
                cycle.push(dep.clone());
                return Some(cycle);
            }
        }
    }

    path.pop();
    rec_stack.remove(node);
    None
}

/// Kahn's algorithm, always picking the earliest-declared ready stage.
fn topological_sort(stages: &[StageDescriptor], edges: &[Edge]) -> Vec<String> {
    let position: HashMap<&str, usize> = stages
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; stages.len()];
    let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];
    let mut seen = HashSet::new();
    for edge in edges {
        let (Some(&from), Some(&to)) = (position.get(edge.from.as_str()), position.get(edge.to.as_str()))
        else {
            continue;
        };
        if seen.insert((from, to)) {
            in_degree[to] += 1;
            downstream[from].push(to);
        }
    }

    let mut ready: Vec<usize> = (0..stages.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(stages.len());

    while !ready.is_empty() {
        ready.sort_unstable();
        let next = ready.remove(0);
        order.push(stages[next].name.clone());
        for &child in &downstream[next] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push(child);
            }
        }
    }

    order
}

//! Dependency graph over a step list.
//!
//! [`StepGraph`] loads the steps into a `petgraph` [`DiGraph`] whose node
//! indices are the positions in the step slice, with an edge from each
//! dependency to its dependent. Cycle detection uses petgraph's algorithms;
//! levels and the critical path are computed on top of the same graph.

use std::collections::{HashMap, HashSet};

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::step::ExecutionStep;

/// A dependency id that does not name a step of the same plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    /// Step declaring the dependency.
    pub step_id: String,
    /// The unknown id.
    pub dependency: String,
}

/// Graph over a borrowed step slice.
pub struct StepGraph<'a> {
    steps: &'a [ExecutionStep],
    /// One node per step, weighted by its id. Edges run dependency -> dependent.
    graph: DiGraph<&'a str, ()>,
    missing: Vec<MissingDependency>,
    duplicates: Vec<String>,
}

impl<'a> StepGraph<'a> {
    /// Build the graph. Unknown dependency ids are recorded, not resolved.
    pub fn new(steps: &'a [ExecutionStep]) -> Self {
        let mut graph = DiGraph::with_capacity(steps.len(), steps.len());
        let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(steps.len());
        let mut duplicates = Vec::new();

        for step in steps {
            let node = graph.add_node(step.id.as_str());
            if index.contains_key(step.id.as_str()) {
                duplicates.push(step.id.clone());
            } else {
                index.insert(step.id.as_str(), node);
            }
        }

        let mut missing = Vec::new();

        for (i, step) in steps.iter().enumerate() {
            for dep_id in &step.dependencies {
                match index.get(dep_id.as_str()) {
                    Some(&dep) => {
                        graph.add_edge(dep, NodeIndex::new(i), ());
                    }
                    None => missing.push(MissingDependency {
                        step_id: step.id.clone(),
                        dependency: dep_id.clone(),
                    }),
                }
            }
        }

        Self {
            steps,
            graph,
            missing,
            duplicates,
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the graph has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step at `index`.
    pub fn step(&self, index: usize) -> &'a ExecutionStep {
        &self.steps[index]
    }

    /// Dependency ids that did not resolve, in declaration order.
    pub fn missing_dependencies(&self) -> &[MissingDependency] {
        &self.missing
    }

    /// Step ids declared more than once.
    pub fn duplicate_ids(&self) -> &[String] {
        &self.duplicates
    }

    /// Indices of the steps `index` depends on, in plan order.
    pub fn dependencies_of(&self, index: usize) -> Vec<usize> {
        self.neighbors(index, Direction::Incoming)
    }

    /// Indices of the steps that depend on `index`, in plan order.
    pub fn dependents_of(&self, index: usize) -> Vec<usize> {
        self.neighbors(index, Direction::Outgoing)
    }

    fn neighbors(&self, index: usize, direction: Direction) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(index), direction)
            .map(|n| n.index())
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// The ids along one cycle, closed with its first step (e.g. `[a, b, a]`).
    ///
    /// The cycle is taken from the strongly connected component holding the
    /// earliest step in plan order and walked along dependencies from there.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        if !is_cyclic_directed(&self.graph) {
            return None;
        }

        let component = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .min_by_key(|scc| scc.iter().copied().min())?;
        let members: HashSet<NodeIndex> = component.iter().copied().collect();

        let mut current = component.iter().copied().min()?;
        let mut path = vec![current];
        let mut position: HashMap<NodeIndex, usize> = HashMap::from([(current, 0)]);

        loop {
            let next = self
                .graph
                .neighbors_directed(current, Direction::Incoming)
                .filter(|n| members.contains(n))
                .min()?;

            if let Some(&at) = position.get(&next) {
                let mut cycle: Vec<String> =
                    path[at..].iter().map(|&n| self.graph[n].to_string()).collect();
                cycle.push(self.graph[next].to_string());
                return Some(cycle);
            }

            position.insert(next, path.len());
            path.push(next);
            current = next;
        }
    }

    /// Level of every step: 0 without dependencies, otherwise one more than
    /// the deepest dependency.
    ///
    /// Safe on cyclic input: a step re-entered while its own level is being
    /// computed contributes level 0.
    pub fn levels(&self) -> Vec<usize> {
        let mut memo: Vec<Option<usize>> = vec![None; self.steps.len()];
        let mut visiting = HashSet::new();

        (0..self.steps.len())
            .map(|i| self.level_of(i, &mut memo, &mut visiting))
            .collect()
    }

    fn level_of(
        &self,
        index: usize,
        memo: &mut [Option<usize>],
        visiting: &mut HashSet<usize>,
    ) -> usize {
        if let Some(level) = memo[index] {
            return level;
        }
        if !visiting.insert(index) {
            return 0;
        }

        let level = self
            .dependencies_of(index)
            .into_iter()
            .map(|d| self.level_of(d, memo, visiting) + 1)
            .max()
            .unwrap_or(0);

        visiting.remove(&index);
        memo[index] = Some(level);
        level
    }

    /// Sum over distinct levels of the slowest step at that level.
    pub fn level_time(&self, levels: &[usize]) -> u64 {
        let depth = levels.iter().copied().max().map_or(0, |max| max + 1);
        let mut slowest = vec![0u64; depth];

        for (i, &level) in levels.iter().enumerate() {
            slowest[level] = slowest[level].max(self.steps[i].estimated_time);
        }

        slowest.iter().sum()
    }

    /// Steps grouped by level, shallowest first, plan order within a group.
    pub fn parallel_groups(&self, levels: &[usize]) -> Vec<Vec<usize>> {
        let depth = levels.iter().copied().max().map_or(0, |max| max + 1);
        let mut groups = vec![Vec::new(); depth];

        for (i, &level) in levels.iter().enumerate() {
            groups[level].push(i);
        }

        groups
    }

    /// Steps no other step depends on, in plan order.
    pub fn terminal_steps(&self) -> Vec<usize> {
        (0..self.steps.len())
            .filter(|&i| {
                self.graph
                    .neighbors_directed(NodeIndex::new(i), Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// The dependency chain with the largest summed `estimated_time` that
    /// ends at a terminal step. Ties keep the chain discovered first, walking
    /// terminals and dependencies in plan order.
    pub fn critical_path(&self) -> Vec<usize> {
        let mut memo: Vec<Option<(u64, Vec<usize>)>> = vec![None; self.steps.len()];
        let mut visiting = HashSet::new();
        let mut best: Option<(u64, Vec<usize>)> = None;

        for terminal in self.terminal_steps() {
            let candidate = self.heaviest_chain(terminal, &mut memo, &mut visiting);
            let replace = match &best {
                Some((weight, _)) => candidate.0 > *weight,
                None => true,
            };
            if replace {
                best = Some(candidate);
            }
        }

        best.map(|(_, path)| path).unwrap_or_default()
    }

    fn heaviest_chain(
        &self,
        index: usize,
        memo: &mut [Option<(u64, Vec<usize>)>],
        visiting: &mut HashSet<usize>,
    ) -> (u64, Vec<usize>) {
        if let Some(found) = &memo[index] {
            return found.clone();
        }
        if !visiting.insert(index) {
            return (0, Vec::new());
        }

        let mut longest: (u64, Vec<usize>) = (0, Vec::new());
        for dep in self.dependencies_of(index) {
            let chain = self.heaviest_chain(dep, memo, visiting);
            if longest.1.is_empty() || chain.0 > longest.0 {
                longest = chain;
            }
        }

        visiting.remove(&index);

        let (weight, mut path) = longest;
        path.push(index);
        let result = (weight + self.steps[index].estimated_time, path);
        memo[index] = Some(result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, deps: &[&str], time: u64) -> ExecutionStep {
        let mut builder = ExecutionStep::builder(id, "test").time(time);
        for dep in deps {
            builder = builder.depends_on(*dep);
        }
        builder.build().unwrap()
    }

    fn ids(graph: &StepGraph<'_>, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| graph.step(i).id.clone()).collect()
    }

    #[test]
    fn test_linear_levels_and_time() {
        let steps = vec![
            step("a", &[], 1000),
            step("b", &["a"], 1000),
            step("c", &["b"], 1000),
        ];
        let graph = StepGraph::new(&steps);
        let levels = graph.levels();

        assert_eq!(levels, vec![0, 1, 2]);
        assert_eq!(graph.level_time(&levels), 3000);
        assert_eq!(ids(&graph, &graph.critical_path()), vec!["a", "b", "c"]);
        assert_eq!(ids(&graph, &graph.terminal_steps()), vec!["c"]);
    }

    #[test]
    fn test_fan_out_takes_slowest_per_level() {
        let steps = vec![
            step("a", &[], 2000),
            step("b", &["a"], 5000),
            step("c", &["a"], 3000),
            step("d", &["b", "c"], 4000),
        ];
        let graph = StepGraph::new(&steps);
        let levels = graph.levels();

        assert_eq!(levels, vec![0, 1, 1, 2]);
        assert_eq!(graph.level_time(&levels), 2000 + 5000 + 4000);
        assert_eq!(ids(&graph, &graph.critical_path()), vec!["a", "b", "d"]);

        let groups: Vec<Vec<String>> = graph
            .parallel_groups(&levels)
            .iter()
            .map(|g| ids(&graph, g))
            .collect();
        assert_eq!(groups, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn test_critical_path_prefers_time_over_length() {
        let steps = vec![
            step("a", &[], 100),
            step("b", &["a"], 100),
            step("c", &["b"], 100),
            step("slow", &[], 1000),
        ];
        let graph = StepGraph::new(&steps);
        assert_eq!(ids(&graph, &graph.critical_path()), vec!["slow"]);
    }

    #[test]
    fn test_critical_path_tie_keeps_first() {
        let steps = vec![step("x", &[], 500), step("y", &[], 500)];
        let graph = StepGraph::new(&steps);
        assert_eq!(ids(&graph, &graph.critical_path()), vec!["x"]);
    }

    #[test]
    fn test_missing_dependencies_recorded() {
        let steps = vec![step("a", &["ghost"], 10), step("b", &["a", "phantom"], 10)];
        let graph = StepGraph::new(&steps);

        let missing = graph.missing_dependencies();
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0].dependency, "ghost");
        assert_eq!(missing[1].step_id, "b");
    }

    #[test]
    fn test_two_step_cycle_detected() {
        let steps = vec![step("a", &["b"], 10), step("b", &["a"], 10)];
        let graph = StepGraph::new(&steps);

        assert_eq!(
            graph.find_cycle(),
            Some(vec!["a".to_string(), "b".to_string(), "a".to_string()])
        );
        // Guards keep the derived metrics finite on cyclic input.
        assert_eq!(graph.levels().len(), 2);
        assert!(graph.terminal_steps().is_empty());
    }

    #[test]
    fn test_cycle_found_past_acyclic_prefix() {
        let steps = vec![
            step("x", &[], 10),
            step("a", &["c"], 10),
            step("b", &["a"], 10),
            step("c", &["b", "x"], 10),
        ];
        let graph = StepGraph::new(&steps);

        assert_eq!(
            graph.find_cycle(),
            Some(vec![
                "a".to_string(),
                "c".to_string(),
                "b".to_string(),
                "a".to_string()
            ])
        );
        assert_eq!(graph.dependencies_of(3), vec![0, 2]);
        assert_eq!(graph.dependents_of(0), vec![3]);
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let steps = vec![
            step("a", &[], 1),
            step("b", &["a"], 1),
            step("c", &["a"], 1),
            step("d", &["b", "c"], 1),
        ];
        assert_eq!(StepGraph::new(&steps).find_cycle(), None);
    }

    #[test]
    fn test_duplicates_recorded() {
        let steps = vec![step("a", &[], 1), step("a", &[], 1)];
        let graph = StepGraph::new(&steps);
        assert_eq!(graph.duplicate_ids(), &["a".to_string()]);
    }

    #[test]
    fn test_empty_graph() {
        let steps: Vec<ExecutionStep> = Vec::new();
        let graph = StepGraph::new(&steps);
        let levels = graph.levels();

        assert!(graph.is_empty());
        assert_eq!(graph.level_time(&levels), 0);
        assert!(graph.critical_path().is_empty());
        assert!(graph.parallel_groups(&levels).is_empty());
    }
}

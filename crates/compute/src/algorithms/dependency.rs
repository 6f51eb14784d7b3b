use std::collections::{HashMap, HashSet};

use qflow_core::{TaskRecord, WorkflowTaskSpec};
use serde::Serialize;
use tracing::debug;

/// Anything that participates in a dependency graph.
pub trait GraphNode {
    fn node_id(&self) -> &str;
    /// Ids this node depends on, in declaration order.
    fn dependency_ids(&self) -> Vec<&str>;
}

impl GraphNode for WorkflowTaskSpec {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn dependency_ids(&self) -> Vec<&str> {
        self.dependencies.iter().map(String::as_str).collect()
    }
}

impl GraphNode for TaskRecord {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn dependency_ids(&self) -> Vec<&str> {
        self.dependencies.iter().map(String::as_str).collect()
    }
}

/// Reverse adjacency: task id -> ids of the tasks that depend on it.
///
/// Every task of the input set is a key, including those without dependents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyGraph {
    pub dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.dependents.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn dependent_count(&self, id: &str) -> usize {
        self.dependents_of(id).len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dependents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

/// A task that more than one other task waits on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bottleneck {
    pub task_id: String,
    pub dependent_count: usize,
    pub dependents: Vec<String>,
}

/// Everything the analyzer can say about a task set in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyAnalysis {
    pub graph: DependencyGraph,
    pub critical_path: Vec<String>,
    pub bottlenecks: Vec<Bottleneck>,
    pub topological_order: Vec<String>,
    /// Cycles found in the input. Non-empty means the other results are best-effort.
    pub cycles: Vec<Vec<String>>,
}

/// Build the reverse adjacency map in O(n + e).
///
/// Dependencies on ids outside the task set do not produce edges.
pub fn build_graph<T: GraphNode>(tasks: &[T]) -> DependencyGraph {
    let mut dependents: HashMap<String, Vec<String>> = tasks
        .iter()
        .map(|t| (t.node_id().to_string(), Vec::new()))
        .collect();

    for task in tasks {
        for dep in task.dependency_ids() {
            if let Some(list) = dependents.get_mut(dep) {
                if !list.iter().any(|d| d == task.node_id()) {
                    list.push(task.node_id().to_string());
                }
            }
        }
    }

    DependencyGraph { dependents }
}

/// Longest chain of dependent tasks, ordered from root to sink.
///
/// Walks backward from every task without dependents. An id already on the
/// current path is skipped, so cycles terminate instead of recursing forever.
/// Ties keep the first chain discovered in input order.
pub fn find_critical_path<T: GraphNode>(tasks: &[T]) -> Vec<String> {
    if tasks.is_empty() {
        return Vec::new();
    }

    let graph = build_graph(tasks);
    let by_id: HashMap<&str, &T> = tasks.iter().map(|t| (t.node_id(), t)).collect();

    // A chain ending at a task that cannot reach a cycle does not depend on
    // the path walked so far, so only those tasks are memoized.
    let memoizable = cycle_free_tasks(tasks, &graph);
    let mut memo: HashMap<String, Vec<String>> = HashMap::new();

    let mut starts: Vec<&str> = tasks
        .iter()
        .map(|t| t.node_id())
        .filter(|id| graph.dependent_count(id) == 0)
        .collect();
    if starts.is_empty() {
        // Every task sits on a cycle; any task can end the longest chain.
        starts = tasks.iter().map(|t| t.node_id()).collect();
    }

    let mut best: Vec<String> = Vec::new();
    for sink in starts {
        let mut on_path = HashSet::new();
        let path = walk_back(sink, &by_id, &mut on_path, &mut memo, &memoizable);
        if path.len() > best.len() {
            best = path;
        }
    }
    best
}

fn walk_back<'a, T: GraphNode>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a T>,
    on_path: &mut HashSet<&'a str>,
    memo: &mut HashMap<String, Vec<String>>,
    memoizable: &HashSet<String>,
) -> Vec<String> {
    if let Some(cached) = memo.get(id) {
        return cached.clone();
    }

    on_path.insert(id);
    let mut longest: Vec<String> = Vec::new();
    if let Some(task) = by_id.get(id) {
        for dep in task.dependency_ids() {
            let Some((&dep_key, _)) = by_id.get_key_value(dep) else {
                continue;
            };
            if on_path.contains(dep_key) {
                continue;
            }
            let candidate = walk_back(dep_key, by_id, on_path, memo, memoizable);
            if candidate.len() > longest.len() {
                longest = candidate;
            }
        }
    }
    on_path.remove(id);

    longest.push(id.to_string());
    if memoizable.contains(id) {
        memo.insert(id.to_string(), longest.clone());
    }
    longest
}

/// Tasks from which no dependency cycle is reachable.
///
/// Peels tasks whose in-set dependencies are all peeled, starting from the
/// roots. Tasks on a cycle, or downstream of one, are never peeled.
fn cycle_free_tasks<T: GraphNode>(tasks: &[T], graph: &DependencyGraph) -> HashSet<String> {
    let mut waiting_on: HashMap<&str, usize> = tasks
        .iter()
        .map(|t| {
            let deps: HashSet<&str> = t
                .dependency_ids()
                .into_iter()
                .filter(|d| graph.contains(d))
                .collect();
            (t.node_id(), deps.len())
        })
        .collect();

    let mut ready: Vec<String> = waiting_on
        .iter()
        .filter(|(_, &n)| n == 0)
        .map(|(&id, _)| id.to_string())
        .collect();
    let mut peeled: HashSet<String> = HashSet::with_capacity(tasks.len());

    while let Some(id) = ready.pop() {
        for dependent in graph.dependents_of(&id) {
            if let Some(count) = waiting_on.get_mut(dependent.as_str()) {
                if *count > 0 {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(dependent.clone());
                    }
                }
            }
        }
        peeled.insert(id);
    }
    peeled
}

/// Tasks with more than one dependent, most-depended-on first.
pub fn identify_bottlenecks<T: GraphNode>(tasks: &[T]) -> Vec<Bottleneck> {
    let graph = build_graph(tasks);
    let mut bottlenecks: Vec<Bottleneck> = tasks
        .iter()
        .filter_map(|t| {
            let dependents = graph.dependents_of(t.node_id());
            (dependents.len() > 1).then(|| Bottleneck {
                task_id: t.node_id().to_string(),
                dependent_count: dependents.len(),
                dependents: dependents.to_vec(),
            })
        })
        .collect();
    // Stable sort keeps input order among equal counts.
    bottlenecks.sort_by(|a, b| b.dependent_count.cmp(&a.dependent_count));
    bottlenecks
}

/// Best-effort topological order.
///
/// Each round places every task whose in-set dependencies are already placed.
/// Dependencies outside the set count as satisfied. When a round finds nothing
/// placeable (a cycle), the first remaining task is forced in and the walk continues.
pub fn topological_order<T: GraphNode>(tasks: &[T]) -> Vec<String> {
    let known: HashSet<&str> = tasks.iter().map(|t| t.node_id()).collect();
    let mut placed: HashSet<&str> = HashSet::with_capacity(tasks.len());
    let mut order: Vec<String> = Vec::with_capacity(tasks.len());
    let mut remaining: Vec<&T> = tasks.iter().collect();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&T>, Vec<&T>) = remaining.into_iter().partition(|t| {
            t.dependency_ids()
                .iter()
                .all(|d| placed.contains(d) || !known.contains(d))
        });

        if ready.is_empty() {
            let mut blocked = blocked;
            let forced = blocked.remove(0);
            debug!(task_id = forced.node_id(), "Dependency cycle, forcing task into order");
            placed.insert(forced.node_id());
            order.push(forced.node_id().to_string());
            remaining = blocked;
            continue;
        }

        for task in ready {
            placed.insert(task.node_id());
            order.push(task.node_id().to_string());
        }
        remaining = blocked;
    }

    order
}

/// Find dependency cycles via DFS back edges. Each cycle is listed once,
/// starting at the task where the back edge lands.
pub fn detect_cycles<T: GraphNode>(tasks: &[T]) -> Vec<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    let by_id: HashMap<&str, &T> = tasks.iter().map(|t| (t.node_id(), t)).collect();
    let mut marks: HashMap<&str, Mark> = by_id.keys().map(|&id| (id, Mark::Unvisited)).collect();
    let mut cycles = Vec::new();

    fn visit<'a, T: GraphNode>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a T>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        marks.insert(id, Mark::OnStack);
        stack.push(id);

        if let Some(task) = by_id.get(id) {
            for dep in task.dependency_ids() {
                let Some((&dep_key, _)) = by_id.get_key_value(dep) else {
                    continue;
                };
                match marks.get(dep_key).copied().unwrap_or(Mark::Done) {
                    Mark::Unvisited => visit(dep_key, by_id, marks, stack, cycles),
                    Mark::OnStack => {
                        if let Some(pos) = stack.iter().position(|s| *s == dep_key) {
                            cycles.push(stack[pos..].iter().map(|s| s.to_string()).collect());
                        }
                    }
                    Mark::Done => {}
                }
            }
        }

        stack.pop();
        marks.insert(id, Mark::Done);
    }

    for task in tasks {
        let id = task.node_id();
        if marks.get(id).copied() == Some(Mark::Unvisited) {
            let mut stack = Vec::new();
            visit(id, &by_id, &mut marks, &mut stack, &mut cycles);
        }
    }

    cycles
}

/// Run every analysis over the same task set.
pub fn analyze<T: GraphNode>(tasks: &[T]) -> DependencyAnalysis {
    let cycles = detect_cycles(tasks);
    if !cycles.is_empty() {
        debug!(cycles = cycles.len(), "Dependency analysis running on cyclic input");
    }
    DependencyAnalysis {
        graph: build_graph(tasks),
        critical_path: find_critical_path(tasks),
        bottlenecks: identify_bottlenecks(tasks),
        topological_order: topological_order(tasks),
        cycles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> WorkflowTaskSpec {
        WorkflowTaskSpec::new(id, "analysis", 100.0).with_dependencies(deps.iter().copied())
    }

    fn diamond() -> Vec<WorkflowTaskSpec> {
        // a -> b, a -> c, b -> d, c -> d
        vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a"]),
            task("d", &["b", "c"]),
        ]
    }

    #[test]
    fn graph_maps_dependencies_to_dependents() {
        let g = build_graph(&diamond());
        assert_eq!(g.len(), 4);
        assert_eq!(g.dependents_of("a"), ["b", "c"]);
        assert_eq!(g.dependents_of("b"), ["d"]);
        assert!(g.dependents_of("d").is_empty());
    }

    #[test]
    fn graph_ignores_external_dependencies() {
        let g = build_graph(&[task("a", &["outside"])]);
        assert_eq!(g.len(), 1);
        assert!(!g.contains("outside"));
    }

    #[test]
    fn critical_path_of_diamond() {
        assert_eq!(find_critical_path(&diamond()), ["a", "b", "d"]);
    }

    #[test]
    fn critical_path_prefers_longest_chain() {
        let tasks = vec![
            task("x", &[]),
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["b"]),
        ];
        assert_eq!(find_critical_path(&tasks), ["a", "b", "c"]);
    }

    #[test]
    fn critical_path_empty() {
        assert!(find_critical_path::<WorkflowTaskSpec>(&[]).is_empty());
    }

    #[test]
    fn critical_path_terminates_on_cycle() {
        // a <-> b, c depends on b
        let tasks = vec![task("a", &["b"]), task("b", &["a"]), task("c", &["b"])];
        let path = find_critical_path(&tasks);
        assert_eq!(path, ["a", "b", "c"]);
    }

    #[test]
    fn critical_path_on_pure_cycle() {
        let tasks = vec![task("a", &["c"]), task("b", &["a"]), task("c", &["b"])];
        let path = find_critical_path(&tasks);
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn unrelated_cycle_keeps_critical_path_memoized() {
        // 40 layers, two tasks wide, each depending on both tasks of the
        // layer below, next to an x <-> y loop.
        let mut tasks = vec![task("x", &["y"]), task("y", &["x"])];
        for layer in 0..40 {
            for side in ["a", "b"] {
                let id = format!("l{layer:02}{side}");
                let deps: Vec<String> = if layer == 0 {
                    Vec::new()
                } else {
                    vec![format!("l{:02}a", layer - 1), format!("l{:02}b", layer - 1)]
                };
                tasks.push(WorkflowTaskSpec::new(id, "analysis", 1.0).with_dependencies(deps));
            }
        }

        let path = find_critical_path(&tasks);
        assert_eq!(path.len(), 40);
        assert_eq!(path.first().map(String::as_str), Some("l00a"));
        assert_eq!(path.last().map(String::as_str), Some("l39a"));

        let clean = cycle_free_tasks(&tasks, &build_graph(&tasks));
        assert_eq!(clean.len(), 80);
        assert!(!clean.contains("x") && !clean.contains("y"));
    }

    #[test]
    fn tasks_downstream_of_a_cycle_are_not_cycle_free() {
        let tasks = vec![
            task("root", &[]),
            task("a", &["b"]),
            task("b", &["a", "root"]),
            task("c", &["b"]),
            task("d", &["root"]),
        ];
        let clean = cycle_free_tasks(&tasks, &build_graph(&tasks));
        let mut clean: Vec<&str> = clean.iter().map(String::as_str).collect();
        clean.sort_unstable();
        assert_eq!(clean, ["d", "root"]);
    }

    #[test]
    fn bottlenecks_sorted_by_dependent_count() {
        let tasks = vec![
            task("a", &[]),
            task("b", &[]),
            task("c", &["a", "b"]),
            task("d", &["a", "b"]),
            task("e", &["a"]),
        ];
        let found = identify_bottlenecks(&tasks);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].task_id, "a");
        assert_eq!(found[0].dependent_count, 3);
        assert_eq!(found[1].task_id, "b");
        assert_eq!(found[1].dependents, ["c", "d"]);
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let tasks = vec![task("d", &["b", "c"]), task("c", &["a"]), task("b", &["a"]), task("a", &[])];
        let order = topological_order(&tasks);
        let pos = |id: &str| order.iter().position(|o| o == id).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn topological_order_forces_through_cycle() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"]), task("c", &["a"])];
        let order = topological_order(&tasks);
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn detect_cycles_finds_loop() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"]), task("c", &[])];
        let cycles = detect_cycles(&tasks);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], ["a", "b"]);
        assert!(detect_cycles(&diamond()).is_empty());
    }

    #[test]
    fn analyze_bundles_results() {
        let analysis = analyze(&diamond());
        assert_eq!(analysis.critical_path, ["a", "b", "d"]);
        assert_eq!(analysis.bottlenecks.len(), 1);
        assert_eq!(analysis.bottlenecks[0].task_id, "a");
        assert_eq!(analysis.topological_order, ["a", "b", "c", "d"]);
        assert!(analysis.cycles.is_empty());
    }
}

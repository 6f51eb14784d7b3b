//! Graph and timing analysis over task sets.
//!
//! Both modules are generic over [`GraphNode`], so they work on planning
//! specs and on live scheduler records alike. Neither ever fails on cyclic
//! input; cycles are reported by [`dependency::detect_cycles`] instead.

pub mod dependency;
pub mod estimator;

pub use dependency::{
    analyze, build_graph, detect_cycles, find_critical_path, identify_bottlenecks,
    topological_order, Bottleneck, DependencyAnalysis, DependencyGraph, GraphNode,
};
pub use estimator::{estimate, parallel_time, sequential_time, ExecutionEstimate, Timed};

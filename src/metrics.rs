//! Structural statistics over a [`CitationGraph`].
//!
//! Every algorithm runs once over the same graph and produces one value per
//! node, in node index order. [`MetricsEngine::compute_metrics`] then aligns
//! those vectors by handle into a [`MetricsTable`].
//!
//! The definitions are the usual ones for directed, unweighted graphs:
//!
//! - degree centrality is the degree divided by `n - 1`,
//! - PageRank is computed by power iteration with a uniform teleport vector,
//!   the rank of dangling nodes being spread uniformly over all nodes,
//! - closeness uses incoming distances with the Wasserman and Faust
//!   correction for graphs that are not strongly connected,
//! - betweenness follows Brandes and is normalized by `(n - 1)(n - 2)`.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write;

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::error::{RepeciError, Result};
use crate::graph::CitationGraph;

pub const DEFAULT_DAMPING: f64 = 0.85;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

// ------------- PageRankConfig -------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    /// Convergence is reached once the summed change is below `n * tolerance`.
    pub tolerance: f64,
}
impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: DEFAULT_DAMPING,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}
impl PageRankConfig {
    pub fn with_damping(self, damping: f64) -> Self {
        Self { damping, ..self }
    }
    fn check(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.damping) {
            return Err(RepeciError::InvalidArgument(format!(
                "damping factor {} is outside [0, 1)",
                self.damping
            )));
        }
        if self.max_iterations == 0 {
            return Err(RepeciError::InvalidArgument(String::from(
                "at least one iteration is needed",
            )));
        }
        if self.tolerance.is_nan() || self.tolerance <= 0.0 {
            return Err(RepeciError::InvalidArgument(format!(
                "tolerance {} is not positive",
                self.tolerance
            )));
        }
        Ok(())
    }
}

// ------------- NodeMetrics -------------
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NodeMetrics {
    pub out_degree_centrality: f64,
    pub in_degree_centrality: f64,
    pub page_rank: f64,
    pub closeness_centrality: f64,
    pub betweenness_centrality: f64,
}

/// One row of metrics per handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricsTable {
    rows: BTreeMap<String, NodeMetrics>,
}
impl MetricsTable {
    pub fn get(&self, handle: &str) -> Option<&NodeMetrics> {
        self.rows.get(handle)
    }
    /// Rows ordered by handle.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeMetrics)> {
        self.rows.iter().map(|(handle, row)| (handle.as_str(), row))
    }
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
    /// Rows by descending PageRank, ties broken by handle.
    pub fn ranked_by_page_rank(&self) -> Vec<(&str, &NodeMetrics)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.page_rank.total_cmp(&a.1.page_rank).then(a.0.cmp(b.0)));
        ranked
    }
    /// The `n` rows with the highest PageRank.
    pub fn top(&self, n: usize) -> MetricsTable {
        let rows = self
            .ranked_by_page_rank()
            .into_iter()
            .take(n)
            .map(|(handle, row)| (handle.to_owned(), *row))
            .collect();
        MetricsTable { rows }
    }
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(
            "handle,out_degree_centrality,in_degree_centrality,page_rank,closeness_centrality,betweenness_centrality\n",
        );
        for (handle, row) in self.iter() {
            let _ = writeln!(
                csv,
                "{},{},{},{},{},{}",
                handle,
                row.out_degree_centrality,
                row.in_degree_centrality,
                row.page_rank,
                row.closeness_centrality,
                row.betweenness_centrality
            );
        }
        csv
    }
}

/// PageRank per handle, one column per damping factor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensitivityTable {
    pub alphas: Vec<f64>,
    pub rows: BTreeMap<String, Vec<f64>>,
}
impl SensitivityTable {
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("handle");
        for alpha in &self.alphas {
            let _ = write!(csv, ",{}", alpha);
        }
        csv.push('\n');
        for (handle, ranks) in &self.rows {
            csv.push_str(handle);
            for rank in ranks {
                let _ = write!(csv, ",{}", rank);
            }
            csv.push('\n');
        }
        csv
    }
}

// ------------- MetricsEngine -------------
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: PageRankConfig,
}
impl MetricsEngine {
    pub fn new(config: PageRankConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &PageRankConfig {
        &self.config
    }
    pub fn compute_metrics(&self, graph: &CitationGraph) -> Result<MetricsTable> {
        let out_degree = degree_centrality(graph, Direction::Outgoing);
        let in_degree = degree_centrality(graph, Direction::Incoming);
        let page_rank = page_rank(graph, &self.config)?;
        let closeness = closeness_centrality(graph);
        let betweenness = betweenness_centrality(graph);
        let rows = graph
            .handles()
            .enumerate()
            .map(|(i, handle)| {
                (
                    handle.to_owned(),
                    NodeMetrics {
                        out_degree_centrality: out_degree[i],
                        in_degree_centrality: in_degree[i],
                        page_rank: page_rank[i],
                        closeness_centrality: closeness[i],
                        betweenness_centrality: betweenness[i],
                    },
                )
            })
            .collect();
        tracing::debug!(nodes = graph.node_count(), "metrics computed");
        Ok(MetricsTable { rows })
    }
    /// Recomputes PageRank for each damping factor.
    pub fn page_rank_sensitivity(&self, graph: &CitationGraph, alphas: &[f64]) -> Result<SensitivityTable> {
        let mut rows: BTreeMap<String, Vec<f64>> = graph
            .handles()
            .map(|handle| (handle.to_owned(), Vec::with_capacity(alphas.len())))
            .collect();
        let handles: Vec<&str> = graph.handles().collect();
        for alpha in alphas {
            let ranks = page_rank(graph, &self.config.with_damping(*alpha))?;
            for (handle, rank) in handles.iter().zip(ranks) {
                if let Some(column) = rows.get_mut(*handle) {
                    column.push(rank);
                }
            }
        }
        Ok(SensitivityTable {
            alphas: alphas.to_vec(),
            rows,
        })
    }
}

/// Most damping factors a single range may hold.
pub const MAX_ALPHAS: usize = 10_000;

/// Damping factors from `start` up to but excluding `stop`. Values at or
/// above 1 are never valid damping factors, so `stop` is capped there.
pub fn alpha_range(start: f64, stop: f64, step: f64) -> Result<Vec<f64>> {
    if step.is_nan() || step <= 0.0 {
        return Err(RepeciError::InvalidArgument(format!("step {} is not positive", step)));
    }
    if !(0.0..1.0).contains(&start) {
        return Err(RepeciError::InvalidArgument(format!(
            "range start {} is outside [0, 1)",
            start
        )));
    }
    if stop.is_nan() {
        return Err(RepeciError::InvalidArgument(String::from("range stop is not a number")));
    }
    let stop = stop.min(1.0);
    // the small slack keeps a stop that is a multiple of step out of the range
    let steps = ((stop - start) / step - 1e-9).ceil().max(0.0);
    if steps > MAX_ALPHAS as f64 {
        return Err(RepeciError::InvalidArgument(format!(
            "step {} gives more than {} damping factors",
            step, MAX_ALPHAS
        )));
    }
    Ok((0..steps as usize).map(|i| start + i as f64 * step).collect())
}

pub fn degree_centrality(graph: &CitationGraph, direction: Direction) -> Vec<f64> {
    let n = graph.node_count();
    if n <= 1 {
        return vec![1.0; n];
    }
    let scale = 1.0 / (n - 1) as f64;
    graph
        .inner()
        .node_indices()
        .map(|node| match direction {
            Direction::Outgoing => graph.out_degree(node) as f64 * scale,
            Direction::Incoming => graph.in_degree(node) as f64 * scale,
        })
        .collect()
}

pub fn page_rank(graph: &CitationGraph, config: &PageRankConfig) -> Result<Vec<f64>> {
    config.check()?;
    let n = graph.node_count();
    if n == 0 {
        return Ok(Vec::new());
    }
    let inner = graph.inner();
    let nf = n as f64;
    let alpha = config.damping;
    let out_degree: Vec<usize> = inner.node_indices().map(|v| graph.out_degree(v)).collect();
    let mut rank = vec![1.0 / nf; n];
    for iteration in 0..config.max_iterations {
        let dangling: f64 = rank
            .iter()
            .zip(&out_degree)
            .filter(|(_, degree)| **degree == 0)
            .map(|(r, _)| *r)
            .sum();
        let base = (alpha * dangling + 1.0 - alpha) / nf;
        let mut next = vec![base; n];
        for edge in inner.raw_edges() {
            let from = edge.source().index();
            next[edge.target().index()] += alpha * rank[from] / out_degree[from] as f64;
        }
        let error: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if error < nf * config.tolerance {
            tracing::trace!(iterations = iteration + 1, "page rank converged");
            return Ok(rank);
        }
    }
    tracing::warn!(
        damping = alpha,
        iterations = config.max_iterations,
        "page rank did not converge, returning the last iterate"
    );
    Ok(rank)
}

// breadth first distances from `source`, following edges in the given direction
fn distances(graph: &CitationGraph, source: NodeIndex, direction: Direction) -> Vec<Option<usize>> {
    let inner = graph.inner();
    let mut distance = vec![None; inner.node_count()];
    distance[source.index()] = Some(0);
    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        let d = distance[v.index()].unwrap_or(0);
        for w in inner.neighbors_directed(v, direction) {
            if distance[w.index()].is_none() {
                distance[w.index()] = Some(d + 1);
                queue.push_back(w);
            }
        }
    }
    distance
}

pub fn closeness_centrality(graph: &CitationGraph) -> Vec<f64> {
    let n = graph.node_count();
    graph
        .inner()
        .node_indices()
        .map(|u| {
            let reached: Vec<usize> = distances(graph, u, Direction::Incoming)
                .into_iter()
                .flatten()
                .collect();
            let total: usize = reached.iter().sum();
            if total == 0 || n <= 1 {
                return 0.0;
            }
            let others = (reached.len() - 1) as f64;
            (others / total as f64) * (others / (n - 1) as f64)
        })
        .collect()
}

pub fn betweenness_centrality(graph: &CitationGraph) -> Vec<f64> {
    let inner = graph.inner();
    let n = inner.node_count();
    let mut betweenness = vec![0.0; n];
    for s in inner.node_indices() {
        let mut stack = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut distance: Vec<Option<usize>> = vec![None; n];
        sigma[s.index()] = 1.0;
        distance[s.index()] = Some(0);
        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v.index());
            let dv = distance[v.index()].unwrap_or(0);
            for w in inner.neighbors_directed(v, Direction::Outgoing) {
                let wi = w.index();
                if distance[wi].is_none() {
                    distance[wi] = Some(dv + 1);
                    queue.push_back(w);
                }
                if distance[wi] == Some(dv + 1) {
                    sigma[wi] += sigma[v.index()];
                    predecessors[wi].push(v.index());
                }
            }
        }
        let mut delta = vec![0.0_f64; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s.index() {
                betweenness[w] += delta[w];
            }
        }
    }
    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        betweenness.iter_mut().for_each(|b| *b *= scale);
    }
    betweenness
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_range_excludes_stop() {
        let alphas = alpha_range(0.5, 0.95, 0.05).unwrap();
        assert_eq!(alphas.len(), 9);
        assert!((alphas[8] - 0.9).abs() < 1e-12);
        assert!(alpha_range(0.5, 0.4, 0.05).unwrap().is_empty());
        assert!(alpha_range(0.5, 0.9, 0.0).is_err());
    }

    #[test]
    fn alpha_range_stays_below_one() {
        let alphas = alpha_range(0.5, 1e30, 0.1).unwrap();
        assert_eq!(alphas.len(), 5);
        assert!(alphas.iter().all(|a| *a < 1.0));
        assert!(alpha_range(0.5, 1e30, 1e-9).is_err());
        assert!(alpha_range(1.5, 2.0, 0.1).is_err());
        assert!(alpha_range(-0.1, 0.5, 0.1).is_err());
    }

    #[test]
    fn ranks_sum_to_one() {
        let mut graph = CitationGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("d", "c");
        let ranks = page_rank(&graph, &PageRankConfig::default()).unwrap();
        assert!((ranks.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}

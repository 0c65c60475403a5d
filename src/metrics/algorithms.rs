//! Builtin graph algorithms over a weighted adjacency list
//!
//! Node indices are `0..n`; `adjacency[v]` lists `(w, weight)` for every
//! edge `v -> w`. Undirected projections list each edge both ways.

use std::collections::{BTreeMap, VecDeque};

pub type Adjacency = Vec<Vec<(usize, f64)>>;

/// PageRank parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRankParams {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for PageRankParams {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 50,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageRankResult {
    pub scores: Vec<f64>,
    /// Iterations to convergence
    pub iterations: usize,
    /// Final L1 change between iterations
    pub delta: f64,
}

/// Weighted PageRank. Rank held by nodes without outgoing weight is spread
/// evenly over all nodes each iteration.
pub fn pagerank(adjacency: &Adjacency, params: PageRankParams) -> PageRankResult {
    let n = adjacency.len();
    if n == 0 {
        return PageRankResult {
            scores: Vec::new(),
            iterations: 0,
            delta: 0.0,
        };
    }

    let out_weight: Vec<f64> = adjacency
        .iter()
        .map(|edges| edges.iter().map(|(_, w)| w).sum())
        .collect();

    let mut scores = vec![1.0 / n as f64; n];
    let mut next = vec![0.0; n];
    let base = (1.0 - params.damping) / n as f64;
    let mut iterations = 0;
    let mut delta = f64::MAX;

    while iterations < params.max_iterations && delta > params.tolerance {
        let dangling: f64 = scores
            .iter()
            .zip(&out_weight)
            .filter(|(_, w)| **w <= 0.0)
            .map(|(s, _)| s)
            .sum();

        next.iter_mut().for_each(|s| *s = base + params.damping * dangling / n as f64);
        for (v, edges) in adjacency.iter().enumerate() {
            if out_weight[v] <= 0.0 {
                continue;
            }
            for &(w, weight) in edges {
                next[w] += params.damping * scores[v] * weight / out_weight[v];
            }
        }

        delta = scores.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        std::mem::swap(&mut scores, &mut next);
        iterations += 1;
    }

    PageRankResult {
        scores,
        iterations,
        delta,
    }
}

/// Brandes betweenness centrality on the unweighted structure of
/// `adjacency`. Scores are raw pair counts, not normalized.
pub fn betweenness(adjacency: &Adjacency) -> Vec<f64> {
    let n = adjacency.len();
    let mut centrality = vec![0.0; n];

    for s in 0..n {
        let mut stack = Vec::with_capacity(n);
        let mut pred: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut dist = vec![-1_i64; n];

        sigma[s] = 1.0;
        dist[s] = 0;
        let mut queue = VecDeque::from([s]);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &(w, _) in &adjacency[v] {
                // First visit?
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                // Shortest path to w via v?
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    pred[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0_f64; n];
        while let Some(w) = stack.pop() {
            for &v in &pred[w] {
                delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    centrality
}

/// Deterministic weighted label propagation.
///
/// Edges are read as undirected. Nodes are visited in index order; each
/// adopts the neighbouring label with the largest total weight, ties going
/// to the smallest label. Communities are renumbered `0..k` by first
/// appearance.
pub fn label_propagation(adjacency: &Adjacency, max_iterations: usize) -> Vec<i64> {
    let n = adjacency.len();
    let mut neighbours: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
    for (v, edges) in adjacency.iter().enumerate() {
        for &(w, weight) in edges {
            if v != w {
                *neighbours[v].entry(w).or_insert(0.0) += weight;
                *neighbours[w].entry(v).or_insert(0.0) += weight;
            }
        }
    }

    let mut labels: Vec<usize> = (0..n).collect();
    for _ in 0..max_iterations {
        let mut changed = false;
        for v in 0..n {
            let mut totals: BTreeMap<usize, f64> = BTreeMap::new();
            for (&w, &weight) in &neighbours[v] {
                *totals.entry(labels[w]).or_insert(0.0) += weight;
            }
            // BTreeMap iterates labels ascending, so the first maximum wins ties.
            let best = totals
                .into_iter()
                .fold(None::<(usize, f64)>, |best, (label, total)| match best {
                    Some((_, t)) if t >= total => best,
                    _ => Some((label, total)),
                });
            if let Some((label, _)) = best {
                if label != labels[v] {
                    labels[v] = label;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut renumber: BTreeMap<usize, i64> = BTreeMap::new();
    labels
        .into_iter()
        .map(|l| {
            let next = renumber.len() as i64;
            *renumber.entry(l).or_insert(next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directed(n: usize, edges: &[(usize, usize)]) -> Adjacency {
        let mut adj = vec![Vec::new(); n];
        for &(a, b) in edges {
            adj[a].push((b, 1.0));
        }
        adj
    }

    fn undirected(n: usize, edges: &[(usize, usize)]) -> Adjacency {
        let mut adj = vec![Vec::new(); n];
        for &(a, b) in edges {
            adj[a].push((b, 1.0));
            adj[b].push((a, 1.0));
        }
        adj
    }

    #[test]
    fn pagerank_sums_to_one_with_dangling_nodes() {
        // 0 -> 1 -> 2, and 2 has no outgoing edges
        let result = pagerank(&directed(3, &[(0, 1), (1, 2)]), PageRankParams::default());
        let total: f64 = result.scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-6, "total = {total}");
        assert!(result.scores[2] > result.scores[1]);
        assert!(result.scores[1] > result.scores[0]);
    }

    #[test]
    fn pagerank_favours_the_hub() {
        let result = pagerank(&directed(4, &[(1, 0), (2, 0), (3, 0), (0, 1)]), PageRankParams::default());
        let hub = result.scores[0];
        assert!(result.scores[1..].iter().all(|&s| s < hub));
        assert!(result.iterations <= 50);
    }

    #[test]
    fn pagerank_of_empty_graph_is_empty() {
        assert!(pagerank(&Vec::new(), PageRankParams::default()).scores.is_empty());
    }

    #[test]
    fn betweenness_of_path_peaks_in_the_middle() {
        // 0 - 1 - 2 undirected: both ordered pairs (0,2), (2,0) pass through 1
        let scores = betweenness(&undirected(3, &[(0, 1), (1, 2)]));
        assert_eq!(scores, vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn betweenness_splits_over_equal_paths() {
        // 0 -> 1 -> 3 and 0 -> 2 -> 3
        let scores = betweenness(&directed(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]));
        assert_eq!(scores[1], 0.5);
        assert_eq!(scores[2], 0.5);
    }

    #[test]
    fn label_propagation_separates_cliques() {
        // two triangles joined by nothing
        let adj = undirected(6, &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)]);
        let communities = label_propagation(&adj, 100);
        assert_eq!(communities[0], communities[1]);
        assert_eq!(communities[1], communities[2]);
        assert_eq!(communities[3], communities[4]);
        assert_ne!(communities[0], communities[3]);
        assert_eq!(communities[0], 0);
    }

    #[test]
    fn label_propagation_is_deterministic() {
        let adj = undirected(5, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 0)]);
        assert_eq!(label_propagation(&adj, 100), label_propagation(&adj, 100));
    }

    #[test]
    fn isolated_nodes_keep_their_own_community() {
        let communities = label_propagation(&vec![Vec::new(); 3], 10);
        assert_eq!(communities, vec![0, 1, 2]);
    }
}

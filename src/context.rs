use std::sync::Arc;

use bitflags::bitflags;
use ndarray::Array1;

use crate::error::{Error, Result};
use crate::feature::FeatureMap;
use crate::forest::{EdgeId, Forest, NodeId};
use crate::params::WeightFunction;

bitflags! {
    /// Passes a context computes
    #[derive(Default)]
    pub struct Flag: u32 {
        const INSIDE = 0x01;
        const OUTSIDE = 0x02;
        const VITERBI = 0x04;
        /// Inside and outside, needed for edge marginals
        const MARGINALS = 0x03;
        const ALL = 0xFF;
    }
}

/// Log-sum-exp trick for numerical stability.
///
/// Computes log(sum(exp(values))) in a numerically stable way.
/// Returns NEG_INFINITY for empty arrays or arrays where all values are NEG_INFINITY.
pub fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    let sum: f64 = values.iter().map(|&v| (v - max_val).exp()).sum();
    max_val + sum.ln()
}

/// Context maintains the dynamic programming tables for one forest
///
/// All values are in log space. An unreachable node holds `NEG_INFINITY`,
/// which is a regular "probability zero" value, never an error.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Flag specifying the functionality
    flag: Flag,
    /// Log weight of each edge
    scores: Array1<f64>,
    /// Inside score of each node
    ///
    /// Total weight of all sub-derivations rooted at the node.
    inside: Array1<f64>,
    /// Outside score of each node
    ///
    /// Total weight of all ways to complete a derivation around the node.
    outside: Array1<f64>,
    /// Best sub-derivation score of each node
    best: Array1<f64>,
    /// Edge that yields the best score of each node.
    /// This member is available only with `Flag::VITERBI`.
    backpointer: Array1<Option<EdgeId>>,
    /// Logarithm of the partition function
    log_z: f64,
    /// Work space
    row: Vec<f64>,
}

impl Context {
    pub fn new(flag: Flag) -> Self {
        Self {
            flag,
            log_z: f64::NEG_INFINITY,
            ..Default::default()
        }
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }

    /// Score every edge with `weights` applied to its feature map
    pub fn compute_scores<W: WeightFunction + ?Sized>(
        &mut self,
        features: &[Arc<FeatureMap>],
        weights: &mut W,
    ) {
        self.scores = features.iter().map(|fmap| weights.weight(fmap)).collect();
    }

    /// Use precomputed edge scores
    pub fn set_scores(&mut self, scores: Vec<f64>) {
        self.scores = Array1::from(scores);
    }

    pub fn scores(&self) -> &[f64] {
        self.scores.as_slice().unwrap_or(&[])
    }

    /// Run every pass enabled by the flag, returning log Z
    ///
    /// Fails when the edge scores do not line up with the edges of `forest`.
    /// An empty forest gives `NEG_INFINITY`.
    pub fn compute(&mut self, forest: &Forest) -> Result<f64> {
        if self.scores.len() != forest.len() {
            return Err(Error::grammar(
                forest.name(),
                format!("{} edge scores for {} edges", self.scores.len(), forest.len()),
            ));
        }
        if self.flag.contains(Flag::INSIDE) {
            self.inside(forest);
        }
        if self.flag.contains(Flag::OUTSIDE) {
            self.outside(forest);
        }
        if self.flag.contains(Flag::VITERBI) {
            self.viterbi(forest);
        }
        Ok(self.log_z)
    }

    /// Inside algorithm in log space
    fn inside(&mut self, forest: &Forest) {
        self.inside = Array1::from_elem(forest.num_nodes(), f64::NEG_INFINITY);

        for &v in forest.order() {
            if forest.is_terminal(v) {
                self.inside[v] = 0.0;
                continue;
            }
            self.row.clear();
            for &eid in forest.by_head(v) {
                let edge = forest.edge(eid);
                let mut value = self.scores[eid];
                for &tail in &edge.tails {
                    value += self.inside[tail];
                }
                self.row.push(value);
            }
            self.inside[v] = logsumexp(&self.row);
        }

        self.log_z = match forest.root() {
            Some(root) => self.inside[root],
            None => f64::NEG_INFINITY,
        };
    }

    /// Outside algorithm in log space
    ///
    /// Requires inside scores.
    fn outside(&mut self, forest: &Forest) {
        self.outside = Array1::from_elem(forest.num_nodes(), f64::NEG_INFINITY);
        let root = match forest.root() {
            Some(root) => root,
            None => return,
        };
        self.outside[root] = 0.0;

        for &v in forest.order().iter().rev() {
            if v == root {
                continue;
            }
            self.row.clear();
            for &eid in forest.by_tail(v) {
                let edge = forest.edge(eid);
                let base = self.outside[edge.head] + self.scores[eid];
                // One term per occurrence of v among the tails
                for (i, &tail) in edge.tails.iter().enumerate() {
                    if tail != v {
                        continue;
                    }
                    let mut value = base;
                    for (j, &other) in edge.tails.iter().enumerate() {
                        if j != i {
                            value += self.inside[other];
                        }
                    }
                    self.row.push(value);
                }
            }
            self.outside[v] = logsumexp(&self.row);
        }
    }

    /// Viterbi algorithm: max instead of sum, recording the best edge per node
    ///
    /// Ties keep the first edge in head-index order.
    fn viterbi(&mut self, forest: &Forest) {
        self.best = Array1::from_elem(forest.num_nodes(), f64::NEG_INFINITY);
        self.backpointer = Array1::from_elem(forest.num_nodes(), None);

        for &v in forest.order() {
            if forest.is_terminal(v) {
                self.best[v] = 0.0;
                continue;
            }
            let mut max_score = f64::NEG_INFINITY;
            let mut argmax = None;
            for &eid in forest.by_head(v) {
                let edge = forest.edge(eid);
                let mut score = self.scores[eid];
                for &tail in &edge.tails {
                    score += self.best[tail];
                }
                if max_score < score {
                    max_score = score;
                    argmax = Some(eid);
                }
            }
            self.best[v] = max_score;
            self.backpointer[v] = argmax;
        }
    }

    /// Logarithm of the partition function from the last inside pass
    pub fn log_z(&self) -> f64 {
        self.log_z
    }

    pub fn inside_score(&self, node: NodeId) -> f64 {
        self.inside[node]
    }

    pub fn outside_score(&self, node: NodeId) -> f64 {
        self.outside[node]
    }

    pub fn inside_scores(&self) -> &[f64] {
        self.inside.as_slice().unwrap_or(&[])
    }

    pub fn outside_scores(&self) -> &[f64] {
        self.outside.as_slice().unwrap_or(&[])
    }

    pub fn best_score(&self, node: NodeId) -> f64 {
        self.best[node]
    }

    pub fn backpointer(&self, node: NodeId) -> Option<EdgeId> {
        self.backpointer.get(node).copied().flatten()
    }

    /// Posterior probability of an edge
    ///
    /// Requires inside and outside scores. Zero when the forest has no
    /// derivation.
    pub fn edge_marginal(&self, forest: &Forest, eid: EdgeId) -> f64 {
        if self.log_z == f64::NEG_INFINITY {
            return 0.0;
        }
        let edge = forest.edge(eid);
        let mut log_marginal = self.outside[edge.head] + self.scores[eid] - self.log_z;
        for &tail in &edge.tails {
            log_marginal += self.inside[tail];
        }
        log_marginal.exp()
    }
}

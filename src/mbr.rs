//! Ancestral sampling and empirical Bayes risk minimization.

use std::collections::VecDeque;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::context::Context;
use crate::decoder::Derivation;
use crate::forest::{EdgeId, Forest, NodeId};

/// One occurrence of a node in a sampled tree
struct Slot {
    node: NodeId,
    children: Vec<usize>,
}

/// How an edge is drawn among the edges sharing its head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sampling {
    /// p(e | v) proportional to exp(sum of tail inside scores)
    #[default]
    TailInside,
    /// p(e | v) proportional to exp(w(e) + sum of tail inside scores),
    /// the exact posterior over derivations
    Posterior,
}

fn sample_edge<R: Rng + ?Sized>(
    forest: &Forest,
    ctx: &Context,
    v: NodeId,
    sampling: Sampling,
    rng: &mut R,
) -> Option<EdgeId> {
    let candidates = forest.by_head(v);
    let log_weights: Vec<f64> = candidates
        .iter()
        .map(|&eid| {
            let tails: f64 = forest
                .edge(eid)
                .tails
                .iter()
                .map(|&t| ctx.inside_score(t))
                .sum();
            match sampling {
                Sampling::TailInside => tails,
                Sampling::Posterior => ctx.scores()[eid] + tails,
            }
        })
        .collect();
    let max = log_weights
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return None;
    }
    let weights: Vec<f64> = log_weights.iter().map(|w| (w - max).exp()).collect();
    let dist = WeightedIndex::new(&weights).ok()?;
    Some(candidates[dist.sample(rng)])
}

/// Draw one full derivation top-down
///
/// Starts at the root and expands frontier nodes breadth-first, choosing
/// each edge according to `sampling`. `ctx` must hold inside scores.
/// Returns the derivation (edges in expansion order) and its terminal yield
/// left to right, or `None` when the root is unreachable.
pub fn ancestral_sample<R: Rng + ?Sized>(
    forest: &Forest,
    ctx: &Context,
    sampling: Sampling,
    rng: &mut R,
) -> Option<(Derivation, Vec<String>)> {
    let root = forest.root()?;
    let mut slots = vec![Slot {
        node: root,
        children: Vec::new(),
    }];
    let mut queue = VecDeque::from(vec![0usize]);
    let mut edges = Vec::new();
    let mut score = 0.0;

    while let Some(i) = queue.pop_front() {
        let v = slots[i].node;
        if forest.is_terminal(v) {
            continue;
        }
        let eid = sample_edge(forest, ctx, v, sampling, rng)?;
        edges.push(eid);
        score += ctx.scores()[eid];
        for &tail in &forest.edge(eid).tails {
            let child = slots.len();
            slots.push(Slot {
                node: tail,
                children: Vec::new(),
            });
            slots[i].children.push(child);
            queue.push_back(child);
        }
    }

    let mut tokens = Vec::new();
    let mut stack = vec![0usize];
    while let Some(i) = stack.pop() {
        let slot = &slots[i];
        if forest.is_terminal(slot.node) {
            tokens.push(forest.node(slot.node).symbol.as_str().to_string());
        } else {
            stack.extend(slot.children.iter().rev());
        }
    }

    Some((Derivation { edges, score }, tokens))
}

/// Index of the candidate with the least total loss against all candidates
///
/// Ties go to the earliest candidate. `None` for an empty population.
pub fn min_risk<L>(candidates: &[Vec<String>], loss: L) -> Option<usize>
where
    L: Fn(&[String], &[String]) -> f64,
{
    let mut best = None;
    let mut best_risk = f64::INFINITY;
    for (i, hypothesis) in candidates.iter().enumerate() {
        let risk: f64 = candidates
            .iter()
            .map(|reference| loss(reference, hypothesis))
            .sum();
        if best.is_none() || risk < best_risk {
            best = Some(i);
            best_risk = risk;
        }
    }
    best
}

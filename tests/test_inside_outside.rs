use std::sync::Arc;

use forest_crf::train::expected_feature_vector;
use forest_crf::{
    logsumexp, Context, FeatureMap, Flag, Forest, ForestBuilder, Instance, Node, NodeId,
    ParameterVector, Rule,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn nt(label: &str, start: u32, end: u32) -> Node {
    Node::nonterminal(label).with_source(start, end)
}

/// An ambiguous chart over three tokens with 15 edges
fn chart() -> Forest {
    let t = |i: u32| Node::terminal(format!("t{}", i)).with_source(i, i + 1);
    let mut rules = Vec::new();
    for i in 0..3 {
        rules.push(Rule::unary(nt("A", i, i + 1), t(i)));
        rules.push(Rule::unary(nt("B", i, i + 1), t(i)));
    }
    for i in 0..2 {
        let x = nt("X", i, i + 2);
        rules.push(Rule::binary(x.clone(), nt("A", i, i + 1), nt("A", i + 1, i + 2)));
        rules.push(Rule::inverted(x.clone(), nt("B", i, i + 1), nt("A", i + 1, i + 2)));
        rules.push(Rule::binary(x, nt("A", i, i + 1), nt("B", i + 1, i + 2)));
    }
    let s = nt("S", 0, 3);
    rules.push(Rule::binary(s.clone(), nt("X", 0, 2), nt("A", 2, 3)));
    rules.push(Rule::binary(s.clone(), nt("A", 0, 1), nt("X", 1, 3)));
    rules.push(Rule::inverted(s, nt("B", 0, 1), nt("X", 1, 3)));
    Forest::from_rules("chart", rules).unwrap()
}

/// One private feature per edge plus a shared one
fn features(forest: &Forest) -> Vec<Arc<FeatureMap>> {
    (0..forest.len())
        .map(|eid| {
            let mut fmap = FeatureMap::new();
            fmap.add(format!("e{}", eid), 1.0);
            fmap.add("shared", (eid % 3) as f64);
            Arc::new(fmap)
        })
        .collect()
}

fn weights(forest: &Forest) -> ParameterVector {
    let mut params = ParameterVector::with_seed(0);
    for eid in 0..forest.len() {
        params.set(format!("e{}", eid), ((eid * 37 % 11) as f64 - 5.0) / 3.0);
    }
    params.set("shared", 0.25);
    params
}

/// Scores of every derivation rooted at `v`
fn enumerate(forest: &Forest, scores: &[f64], v: NodeId) -> Vec<f64> {
    if forest.is_terminal(v) {
        return vec![0.0];
    }
    let mut out = Vec::new();
    for &eid in forest.by_head(v) {
        let mut partial = vec![scores[eid]];
        for &tail in &forest.edge(eid).tails {
            let sub = enumerate(forest, scores, tail);
            partial = partial
                .iter()
                .flat_map(|p| sub.iter().map(move |s| p + s))
                .collect();
        }
        out.extend(partial);
    }
    out
}

fn run(forest: &Forest, params: &mut ParameterVector, flag: Flag) -> Context {
    let mut ctx = Context::new(flag);
    ctx.compute_scores(&features(forest), params);
    ctx.compute(forest).unwrap();
    ctx
}

#[test]
fn test_inside_matches_enumeration() {
    let forest = chart();
    assert!(forest.len() <= 20);
    let mut params = weights(&forest);
    let ctx = run(&forest, &mut params, Flag::MARGINALS);

    let root = forest.root().unwrap();
    let all = enumerate(&forest, ctx.scores(), root);
    assert_eq!(all.len(), 9);
    assert!((ctx.log_z() - logsumexp(&all)).abs() < 1e-9);
    assert_eq!(ctx.outside_score(root), 0.0);
}

/// Random acyclic forest over nonterminals `N0..Nk` and a few terminals
///
/// `Ni` only rewrites to `Nj` with `j > i` or to terminals, so `N0` is the
/// root. The last nonterminal may be left without productions, and binary
/// children are drawn with replacement so tails can repeat.
fn random_forest(seed: u64) -> Forest {
    let mut rng = StdRng::seed_from_u64(seed);
    let k = rng.gen_range(3..=5);
    let m = rng.gen_range(2..=3);
    let nonterminal = |i: usize| Node::nonterminal(format!("N{}", i));
    let terminal = |i: usize| Node::terminal(format!("t{}", i));
    let dead_end = rng.gen_bool(0.5);

    let mut builder = ForestBuilder::new(format!("random-{}", seed));
    let mut used = vec![false; k + m];
    for i in 0..k {
        if dead_end && i == k - 1 {
            continue;
        }
        // children of Ni: N(i+1).. then the terminals
        let choices: Vec<usize> = (i + 1..k + m).collect();
        for _ in 0..rng.gen_range(1..=2) {
            let arity = if rng.gen_bool(1.0 / 3.0) { 2 } else { 1 };
            let tails: Vec<usize> = (0..arity)
                .map(|_| choices[rng.gen_range(0..choices.len())])
                .collect();
            let node = |c: usize| if c < k { nonterminal(c) } else { terminal(c - k) };
            let rule = if arity == 1 {
                Rule::unary(nonterminal(i), node(tails[0]))
            } else if rng.gen_bool(0.5) {
                Rule::binary(nonterminal(i), node(tails[0]), node(tails[1]))
            } else {
                Rule::inverted(nonterminal(i), node(tails[0]), node(tails[1]))
            };
            builder.add_rule(rule).unwrap();
            for c in tails {
                used[c] = true;
            }
        }
    }
    // every node but the root must occur as a tail
    for c in 1..k + m {
        if !used[c] {
            let child = if c < k { nonterminal(c) } else { terminal(c - k) };
            builder.add_rule(Rule::unary(nonterminal(0), child)).unwrap();
        }
    }
    builder.build().unwrap()
}

/// Number of derivations rooted at each node
fn derivation_counts(forest: &Forest) -> Vec<f64> {
    let mut counts = vec![0.0; forest.num_nodes()];
    for &v in forest.order() {
        if forest.is_terminal(v) {
            counts[v] = 1.0;
            continue;
        }
        counts[v] = forest
            .by_head(v)
            .iter()
            .map(|&eid| {
                forest
                    .edge(eid)
                    .tails
                    .iter()
                    .map(|&t| counts[t])
                    .product::<f64>()
            })
            .sum();
    }
    counts
}

#[test]
fn test_random_forests_match_enumeration() {
    let mut checked = 0;
    for seed in 0..40 {
        let forest = random_forest(seed);
        assert!(forest.len() <= 20, "seed {}: {} edges", seed, forest.len());
        let root = forest.root().unwrap();
        if derivation_counts(&forest)[root] > 10_000.0 {
            continue;
        }

        let mut rng = StdRng::seed_from_u64(1000 + seed);
        let scores: Vec<f64> = (0..forest.len()).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let mut ctx = Context::new(Flag::ALL);
        ctx.set_scores(scores.clone());
        let log_z = ctx.compute(&forest).unwrap();
        assert_eq!(ctx.outside_score(root), 0.0, "seed {}", seed);

        let all = enumerate(&forest, &scores, root);
        if all.is_empty() {
            assert_eq!(log_z, f64::NEG_INFINITY, "seed {}", seed);
            assert_eq!(ctx.best_score(root), f64::NEG_INFINITY, "seed {}", seed);
        } else {
            assert!((log_z - logsumexp(&all)).abs() < 1e-9, "seed {}", seed);
            let best = all.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!((ctx.best_score(root) - best).abs() < 1e-9, "seed {}", seed);
        }
        checked += 1;
    }
    assert!(checked >= 20, "only {} forests checked", checked);
}

#[test]
fn test_viterbi_matches_enumeration() {
    let forest = chart();
    let mut params = weights(&forest);
    let ctx = run(&forest, &mut params, Flag::ALL);
    let root = forest.root().unwrap();
    let best = enumerate(&forest, ctx.scores(), root)
        .into_iter()
        .fold(f64::NEG_INFINITY, f64::max);
    assert!((ctx.best_score(root) - best).abs() < 1e-9);
}

#[test]
fn test_marginals_sum_per_node() {
    // Every derivation uses the root exactly once
    let forest = chart();
    let mut params = weights(&forest);
    let ctx = run(&forest, &mut params, Flag::MARGINALS);
    let root = forest.root().unwrap();
    let total: f64 = forest
        .by_head(root)
        .iter()
        .map(|&eid| ctx.edge_marginal(&forest, eid))
        .sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn test_finite_difference_gradient() {
    let forest = chart();
    let inst = Instance::new(forest.clone(), features(&forest)).unwrap();
    let mut params = weights(&forest);
    let mut ctx = Context::new(Flag::MARGINALS);
    ctx.compute_scores(&inst.features, &mut params);
    ctx.compute(&inst.forest).unwrap();
    let phi = expected_feature_vector(&inst, &ctx);

    let eps = 1e-5;
    for name in ["shared", "e3", "e12"] {
        let base = params.get(name).unwrap();
        let log_z_at = |value: f64| {
            let mut shifted = params.clone();
            shifted.set(name, value);
            let mut ctx = Context::new(Flag::INSIDE);
            ctx.compute_scores(&inst.features, &mut shifted);
            ctx.compute(&inst.forest).unwrap()
        };
        let numeric = (log_z_at(base + eps) - log_z_at(base - eps)) / (2.0 * eps);
        assert!(
            (numeric - phi[name]).abs() < 1e-6,
            "{}: numeric {} analytic {}",
            name,
            numeric,
            phi[name]
        );
    }
}

#[test]
fn test_unreachable_node_is_negative_infinity() {
    // X has no production, so S -> X 'a' carries no mass
    let s = Node::nonterminal("S");
    let x = Node::nonterminal("X");
    let forest = Forest::from_rules(
        "partial",
        vec![
            Rule::binary(s.clone(), x.clone(), Node::terminal("a")),
            Rule::unary(s, Node::terminal("b")),
        ],
    )
    .unwrap();
    let mut ctx = Context::new(Flag::MARGINALS);
    ctx.set_scores(vec![5.0, 1.0]);
    let log_z = ctx.compute(&forest).unwrap();
    assert_eq!(ctx.inside_score(forest.lookup(&x).unwrap()), f64::NEG_INFINITY);
    assert!((log_z - 1.0).abs() < 1e-12);
    assert_eq!(ctx.edge_marginal(&forest, 0), 0.0);
    assert!((ctx.edge_marginal(&forest, 1) - 1.0).abs() < 1e-12);
}

#[test]
fn test_scenario_a() {
    let forest = Forest::from_rules(
        "a",
        vec![Rule::unary(Node::nonterminal("S"), Node::terminal("a"))],
    )
    .unwrap();
    let mut ctx = Context::new(Flag::ALL);
    ctx.set_scores(vec![2.0]);
    ctx.compute(&forest).unwrap();
    let root = forest.root().unwrap();
    assert_eq!(ctx.inside_score(root), 2.0);
    assert_eq!(ctx.outside_score(root), 0.0);
    assert_eq!(ctx.best_score(root), 2.0);
}

#[test]
fn test_scenario_b() {
    let s = Node::nonterminal("S");
    let forest = Forest::from_rules(
        "b",
        vec![
            Rule::unary(s.clone(), Node::terminal("low")),
            Rule::unary(s, Node::terminal("high")),
        ],
    )
    .unwrap();
    let mut ctx = Context::new(Flag::ALL);
    ctx.set_scores(vec![1.0, 3.0]);
    let log_z = ctx.compute(&forest).unwrap();
    assert!((log_z - 3.126928).abs() < 1e-6);
    assert_eq!(ctx.backpointer(forest.root().unwrap()), Some(1));
}

#[test]
fn test_empty_forest() {
    let forest = Forest::empty("none");
    let mut ctx = Context::new(Flag::ALL);
    ctx.set_scores(Vec::new());
    assert_eq!(ctx.compute(&forest).unwrap(), f64::NEG_INFINITY);
}

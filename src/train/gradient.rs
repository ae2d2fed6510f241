//! Expected feature vectors and the log-likelihood gradient.

use std::collections::HashMap;

use crate::context::{Context, Flag};
use crate::dataset::{Example, Instance};
use crate::error::Result;
use crate::params::WeightFunction;

/// Sparse mapping from feature name to real value
pub type FeatureVector = HashMap<String, f64>;

/// Add `scale` times the expected feature counts of `inst` into `out`
///
/// `ctx` must hold inside and outside scores computed on `inst.forest`.
/// The result for feature f is d(log Z)/d(weight of f). Every feature that
/// appears on some edge gets an entry, even if its expectation is zero.
pub fn expected_counts_into(inst: &Instance, ctx: &Context, scale: f64, out: &mut FeatureVector) {
    for eid in 0..inst.forest.len() {
        let marginal = ctx.edge_marginal(&inst.forest, eid);
        for attr in inst.features[eid].iter() {
            *out.entry(attr.name.clone()).or_insert(0.0) += scale * marginal * attr.value;
        }
    }
}

/// Expected feature vector of one instance under its current edge scores
pub fn expected_feature_vector(inst: &Instance, ctx: &Context) -> FeatureVector {
    let mut phi = FeatureVector::new();
    expected_counts_into(inst, ctx, 1.0, &mut phi);
    phi
}

/// Per-example gradient of the conditional log-likelihood
///
/// Returns `None` when either forest has no derivation. Otherwise the result
/// is E_gold[phi] - E_unconstrained[phi], feature by feature. Fails when an
/// instance has a feature map count that does not match its edges.
pub fn gradient<W: WeightFunction + ?Sized>(
    example: &Example,
    weights: &mut W,
) -> Result<Option<FeatureVector>> {
    if !example.is_covered() {
        return Ok(None);
    }
    let mut grad = FeatureVector::new();
    let mut ctx = Context::new(Flag::MARGINALS);
    for (inst, sign) in [(&example.gold, 1.0), (&example.unconstrained, -1.0)] {
        ctx.compute_scores(&inst.features, weights);
        let log_z = ctx.compute(&inst.forest)?;
        if log_z == f64::NEG_INFINITY {
            return Ok(None);
        }
        expected_counts_into(inst, &ctx, sign, &mut grad);
    }
    Ok(Some(grad))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::feature::FeatureMap;
    use crate::forest::{Forest, Rule};
    use crate::symbol::Node;

    fn fmap(entries: &[(&str, f64)]) -> Arc<FeatureMap> {
        Arc::new(entries.iter().map(|&(k, v)| (k, v)).collect())
    }

    #[test]
    fn test_expected_counts_two_edges() {
        let s = Node::nonterminal("S");
        let forest = Forest::from_rules(
            "two",
            vec![
                Rule::unary(s.clone(), Node::terminal("a")),
                Rule::unary(s, Node::terminal("b")),
            ],
        )
        .unwrap();
        let inst = Instance::new(forest, vec![fmap(&[("f", 1.0)]), fmap(&[("g", 2.0)])]).unwrap();

        let mut ctx = Context::new(Flag::MARGINALS);
        ctx.set_scores(vec![0.0, 0.0]);
        ctx.compute(&inst.forest).unwrap();
        let phi = expected_feature_vector(&inst, &ctx);
        assert!((phi["f"] - 0.5).abs() < 1e-12);
        assert!((phi["g"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_difference() {
        let s = Node::nonterminal("S");
        let all = Forest::from_rules(
            "all",
            vec![
                Rule::unary(s.clone(), Node::terminal("a")),
                Rule::unary(s.clone(), Node::terminal("b")),
            ],
        )
        .unwrap();
        let gold = Forest::from_rules("gold", vec![Rule::unary(s, Node::terminal("a"))]).unwrap();
        let example = Example::new(
            "0",
            Instance::new(all, vec![fmap(&[("f", 1.0)]), fmap(&[("g", 1.0)])]).unwrap(),
            Instance::new(gold, vec![fmap(&[("f", 1.0)])]).unwrap(),
        );

        let mut zero = |_: &FeatureMap| 0.0;
        let grad = gradient(&example, &mut zero).unwrap().unwrap();
        assert!((grad["f"] - 0.5).abs() < 1e-12);
        assert!((grad["g"] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_empty_gold() {
        let all = Forest::from_rules(
            "all",
            vec![Rule::unary(Node::nonterminal("S"), Node::terminal("a"))],
        )
        .unwrap();
        let example = Example::new(
            "0",
            Instance::new(all, vec![fmap(&[("f", 1.0)])]).unwrap(),
            Instance::new(Forest::empty("gold"), Vec::new()).unwrap(),
        );
        let mut zero = |_: &FeatureMap| 0.0;
        assert!(gradient(&example, &mut zero).unwrap().is_none());
    }

    #[test]
    fn test_gradient_misaligned_features() {
        let all = Forest::from_rules(
            "all",
            vec![Rule::unary(Node::nonterminal("S"), Node::terminal("a"))],
        )
        .unwrap();
        let mut gold = Instance::new(all.clone(), vec![fmap(&[("f", 1.0)])]).unwrap();
        gold.features.clear();
        let example = Example::new(
            "0",
            Instance::new(all, vec![fmap(&[("f", 1.0)])]).unwrap(),
            gold,
        );
        let mut zero = |_: &FeatureMap| 0.0;
        assert!(gradient(&example, &mut zero).is_err());
    }
}

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::attribute::Attribute;
use crate::feature::FeatureMap;

/// Log-weight of an edge from its feature map
pub trait WeightFunction {
    fn weight(&mut self, features: &FeatureMap) -> f64;
}

/// Sparse parameter vector with lazy initialization
///
/// A feature that has never been referenced gets one draw from a standard
/// normal distribution on first lookup, which is stored and never resampled.
/// The random source is explicit so that runs are reproducible.
#[derive(Debug, Clone)]
pub struct ParameterVector {
    weights: HashMap<String, f64>,
    rng: StdRng,
}

impl ParameterVector {
    /// Create an empty parameter vector seeded from system entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create an empty parameter vector with a fixed seed
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            weights: HashMap::new(),
            rng,
        }
    }

    /// Replace the random source used for unseen features
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Weight of `name`, drawing and storing it if unseen
    pub fn get_or_init(&mut self, name: &str) -> f64 {
        if let Some(&w) = self.weights.get(name) {
            return w;
        }
        let w: f64 = self.rng.sample(StandardNormal);
        self.weights.insert(name.to_string(), w);
        w
    }

    /// Weight of `name` without initializing it
    pub fn get(&self, name: &str) -> Option<f64> {
        self.weights.get(name).copied()
    }

    pub fn set<S: Into<String>>(&mut self, name: S, weight: f64) {
        self.weights.insert(name.into(), weight);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.weights.contains_key(name)
    }

    /// Number of initialized features
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.weights.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// All weights as attributes sorted by name
    pub fn to_attributes(&self) -> Vec<Attribute> {
        let mut attrs: Vec<Attribute> = self
            .weights
            .iter()
            .map(|(k, &v)| Attribute::new(k.as_str(), v))
            .collect();
        attrs.sort_by(|a, b| a.name.cmp(&b.name));
        attrs
    }

    /// Squared L2 norm
    pub fn norm2(&self) -> f64 {
        self.weights.values().map(|w| w * w).sum()
    }

    /// Dot product with a feature map, initializing unseen features
    pub fn dot(&mut self, features: &FeatureMap) -> f64 {
        let mut score = 0.0;
        for attr in features.iter() {
            score += self.get_or_init(&attr.name) * attr.value;
        }
        score
    }
}

impl Default for ParameterVector {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightFunction for ParameterVector {
    fn weight(&mut self, features: &FeatureMap) -> f64 {
        self.dot(features)
    }
}

impl<F> WeightFunction for F
where
    F: FnMut(&FeatureMap) -> f64,
{
    fn weight(&mut self, features: &FeatureMap) -> f64 {
        self(features)
    }
}

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::feature::{FeatureCache, FeatureMap, Featurizer};
use crate::forest::Forest;

/// A forest together with the feature map of each of its edges
#[derive(Debug, Clone)]
pub struct Instance {
    /// The forest
    pub forest: Forest,
    /// Feature map of each edge, indexed by edge id
    pub features: Vec<Arc<FeatureMap>>,
}

impl Instance {
    pub fn new(forest: Forest, features: Vec<Arc<FeatureMap>>) -> Result<Self> {
        let inst = Self { forest, features };
        inst.validate()?;
        Ok(inst)
    }

    /// Check that every edge has exactly one feature map
    pub fn validate(&self) -> Result<()> {
        if self.features.len() != self.forest.len() {
            return Err(Error::grammar(
                self.forest.name(),
                format!(
                    "{} feature maps for {} edges",
                    self.features.len(),
                    self.forest.len()
                ),
            ));
        }
        Ok(())
    }

    /// Featurize every edge through `cache`
    pub fn featurize<F: Featurizer + ?Sized>(
        forest: Forest,
        source: &[String],
        cache: &mut FeatureCache,
        featurizer: &F,
    ) -> Self {
        let features = cache.featurize_forest(&forest, source, featurizer);
        Self { forest, features }
    }

    /// Returns `true` if the forest has no derivation
    pub fn is_empty(&self) -> bool {
        self.forest.is_empty()
    }
}

/// One training or test input
///
/// `unconstrained` holds every derivation of the source sentence, `gold`
/// only those that also yield the reference. The optional
/// length-constrained forest is what decoding searches when present.
#[derive(Debug, Clone)]
pub struct Example {
    pub id: String,
    pub source: Vec<String>,
    pub unconstrained: Instance,
    pub gold: Instance,
    pub length_constrained: Option<Instance>,
}

impl Example {
    pub fn new<S: Into<String>>(id: S, unconstrained: Instance, gold: Instance) -> Self {
        Self {
            id: id.into(),
            source: Vec::new(),
            unconstrained,
            gold,
            length_constrained: None,
        }
    }

    /// Featurize the forests of one sentence pair, sharing feature maps
    /// between them
    pub fn featurize<S, F>(
        id: S,
        source: Vec<String>,
        unconstrained: Forest,
        gold: Forest,
        featurizer: &F,
    ) -> Self
    where
        S: Into<String>,
        F: Featurizer + ?Sized,
    {
        let mut cache = FeatureCache::new();
        let unconstrained = Instance::featurize(unconstrained, &source, &mut cache, featurizer);
        let gold = Instance::featurize(gold, &source, &mut cache, featurizer);
        Self {
            id: id.into(),
            source,
            unconstrained,
            gold,
            length_constrained: None,
        }
    }

    pub fn with_length_constrained(mut self, instance: Instance) -> Self {
        self.length_constrained = Some(instance);
        self
    }

    /// Validate every forest of the example
    pub fn validate(&self) -> Result<()> {
        self.unconstrained.validate()?;
        self.gold.validate()?;
        if let Some(inst) = &self.length_constrained {
            inst.validate()?;
        }
        Ok(())
    }

    /// Both forests have at least one derivation
    pub fn is_covered(&self) -> bool {
        !self.unconstrained.is_empty() && !self.gold.is_empty()
    }

    /// The forest searched at decoding time
    pub fn decode_instance(&self) -> &Instance {
        self.length_constrained
            .as_ref()
            .unwrap_or(&self.unconstrained)
    }
}

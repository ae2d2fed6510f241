use std::collections::HashMap;
use std::sync::Arc;

use crate::attribute::Attribute;
use crate::forest::{Forest, Orientation, Rule};
use crate::symbol::{Span, Symbol};

/// Sparse feature vector attached to one edge
///
/// Names are unique; adding an existing name accumulates its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMap {
    attrs: Vec<Attribute>,
}

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to feature `name`
    pub fn add<S: AsRef<str>>(&mut self, name: S, value: f64) {
        let name = name.as_ref();
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value += value,
            None => self.attrs.push(Attribute::new(name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.attrs.iter().find(|a| a.name == name).map(|a| a.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> + '_ {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl<A: Into<Attribute>> FromIterator<A> for FeatureMap {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        let mut fmap = FeatureMap::new();
        for attr in iter {
            let attr = attr.into();
            fmap.add(&attr.name, attr.value);
        }
        fmap
    }
}

/// Produces the features of one production given its source sentence
///
/// Implementations must be deterministic, and must only look at symbols and
/// source spans: [`FeatureCache`] shares feature maps between productions
/// that differ in target spans only.
pub trait Featurizer {
    fn featurize(&self, rule: &Rule, source: &[String]) -> FeatureMap;
}

impl<F> Featurizer for F
where
    F: Fn(&Rule, &[String]) -> FeatureMap,
{
    fn featurize(&self, rule: &Rule, source: &[String]) -> FeatureMap {
        self(rule, source)
    }
}

/// Canonical rule shape: symbols without annotations
type ShapeKey = (Symbol, Vec<Symbol>, Orientation);
/// Source spans of head and children
type SpanKey = (Option<Span>, Vec<Option<Span>>);

/// Feature maps of one input, keyed first by rule shape then by source spans
#[derive(Debug, Default)]
pub struct FeatureCache {
    shapes: HashMap<ShapeKey, HashMap<SpanKey, Arc<FeatureMap>>>,
    hits: usize,
    misses: usize,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feature map of one production, computed on first request
    pub fn get_or_featurize<F: Featurizer + ?Sized>(
        &mut self,
        rule: &Rule,
        source: &[String],
        featurizer: &F,
    ) -> Arc<FeatureMap> {
        let shape = (
            rule.lhs.symbol.clone(),
            rule.rhs.iter().map(|n| n.symbol.clone()).collect(),
            rule.orientation,
        );
        let spans = (rule.lhs.source, rule.rhs.iter().map(|n| n.source).collect());
        let by_span = self.shapes.entry(shape).or_default();
        if let Some(fmap) = by_span.get(&spans) {
            self.hits += 1;
            return Arc::clone(fmap);
        }
        self.misses += 1;
        let fmap = Arc::new(featurizer.featurize(rule, source));
        by_span.insert(spans, Arc::clone(&fmap));
        fmap
    }

    /// Feature maps for every edge of a forest, indexed by edge id
    pub fn featurize_forest<F: Featurizer + ?Sized>(
        &mut self,
        forest: &Forest,
        source: &[String],
        featurizer: &F,
    ) -> Vec<Arc<FeatureMap>> {
        (0..forest.len())
            .map(|eid| self.get_or_featurize(&forest.rule(eid), source, featurizer))
            .collect()
    }

    /// Number of distinct feature maps held
    pub fn len(&self) -> usize {
        self.shapes.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

const PHRASE: &str = "X";
const TRANSLATION: &str = "T";
const DELETION: &str = "D";
const INSERTION: &str = "I";

/// Structural and sparse lexical features of ITG productions
///
/// Nonterminals follow the ITG labels: `X` phrases, `T` translations,
/// `D` deletions and `I` insertions. Any other unary nonterminal
/// production is a start rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct SparseFeaturizer {
    pub sparse_deletions: bool,
    pub sparse_insertions: bool,
    pub sparse_translations: bool,
}

impl SparseFeaturizer {
    /// All sparse lexical feature families enabled
    pub fn new() -> Self {
        Self {
            sparse_deletions: true,
            sparse_insertions: true,
            sparse_translations: true,
        }
    }

    fn source_words(source: &[String], span: Option<Span>) -> String {
        match span {
            Some(s) => {
                let start = (s.start as usize).min(source.len());
                let end = (s.end as usize).clamp(start, source.len());
                source[start..end].join(" ")
            }
            None => String::new(),
        }
    }

    fn binary(&self, rule: &Rule, fmap: &mut FeatureMap) {
        fmap.add("type:binary", 1.0);
        if rule.lhs.symbol.as_str() == DELETION {
            fmap.add("binary:recursive_deletion", 1.0);
        } else {
            match rule.orientation {
                Orientation::Monotone => fmap.add("binary:monotone", 1.0),
                Orientation::Inverted => fmap.add("binary:inverted", 1.0),
            }
        }
        if rule.rhs[0].source.map_or(false, |s| s.is_empty()) {
            fmap.add("binary:deletion_left_src_child", 1.0);
        }
        if rule.rhs[1].source.map_or(false, |s| s.is_empty()) {
            fmap.add("binary:deletion_right_src_child", 1.0);
        }
    }

    /// X -> T | D | I
    fn upgrade(&self, rule: &Rule, fmap: &mut FeatureMap) {
        match rule.rhs[0].symbol.as_str() {
            TRANSLATION => fmap.add("type:upgrade_t", 1.0),
            DELETION => fmap.add("type:upgrade_d", 1.0),
            INSERTION => fmap.add("type:upgrade_i", 1.0),
            _ => {}
        }
    }

    fn terminal(&self, rule: &Rule, source: &[String], fmap: &mut FeatureMap) {
        fmap.add("type:terminal", 1.0);
        let child = &rule.rhs[0];
        let span = child.source.or(rule.lhs.source);
        if child.symbol.is_epsilon() {
            fmap.add("type:deletion", 1.0);
            fmap.add("target-len", -1.0);
            if self.sparse_deletions {
                fmap.add(format!("del:{}", Self::source_words(source, span)), 1.0);
            }
        } else if span.map_or(true, |s| s.is_empty()) {
            fmap.add("type:insertion", 1.0);
            fmap.add("target-len", 1.0);
            if self.sparse_insertions {
                fmap.add(format!("ins:{}", child.symbol.as_str()), 1.0);
            }
        } else {
            fmap.add("type:translation", 1.0);
            fmap.add("target-len", 1.0);
            if self.sparse_translations {
                let src = Self::source_words(source, span);
                fmap.add(format!("trans:{}/{}", src, child.symbol.as_str()), 1.0);
            }
        }
    }
}

impl Featurizer for SparseFeaturizer {
    fn featurize(&self, rule: &Rule, source: &[String]) -> FeatureMap {
        let mut fmap = FeatureMap::new();
        if rule.rhs.len() == 2 {
            self.binary(rule, &mut fmap);
        } else if rule.rhs[0].is_terminal() {
            self.terminal(rule, source, &mut fmap);
        } else if rule.lhs.symbol.as_str() == PHRASE {
            self.upgrade(rule, &mut fmap);
        } else {
            fmap.add("top", 1.0);
        }
        fmap
    }
}

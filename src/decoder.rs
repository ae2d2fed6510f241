use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bleu::bleu_loss;
use crate::context::{Context, Flag};
use crate::dataset::Instance;
use crate::error::{Error, Result};
use crate::forest::{EdgeId, Forest};
use crate::mbr::{self, Sampling};
use crate::params::WeightFunction;
use crate::symbol::EPSILON;

/// A set of edges forming one tree rooted at the forest root
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    /// Edges in the order they were expanded
    pub edges: Vec<EdgeId>,
    /// Sum of edge log-weights
    pub score: f64,
}

/// Surface tokens of a decoded derivation
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutput {
    pub tokens: Vec<String>,
    pub derivation: Derivation,
}

/// Decoder settings
#[derive(Debug, Clone)]
pub struct DecoderParams {
    strip_epsilon: bool,
    epsilon: String,
    num_samples: usize,
    seed: Option<u64>,
    sampling: Sampling,
}

impl Default for DecoderParams {
    fn default() -> Self {
        Self {
            strip_epsilon: true,
            epsilon: EPSILON.to_string(),
            num_samples: 100,
            seed: None,
            sampling: Sampling::default(),
        }
    }
}

impl DecoderParams {
    pub fn strip_epsilon(&self) -> bool {
        self.strip_epsilon
    }

    /// Remove the epsilon terminal from decoded output
    pub fn set_strip_epsilon(&mut self, enabled: bool) {
        self.strip_epsilon = enabled;
    }

    pub fn epsilon(&self) -> &str {
        &self.epsilon
    }

    pub fn set_epsilon<S: Into<String>>(&mut self, epsilon: S) {
        self.epsilon = epsilon.into();
    }

    /// Number of derivations MBR samples
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn set_num_samples(&mut self, num_samples: usize) -> Result<()> {
        if num_samples == 0 {
            return Err(Error::invalid("num_samples must be positive"));
        }
        self.num_samples = num_samples;
        Ok(())
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// Edge distribution used by MBR's ancestral sampler
    pub fn set_sampling(&mut self, sampling: Sampling) {
        self.sampling = sampling;
    }
}

/// Follow back-pointers from the root, collecting edges and terminal yield
/// left to right
///
/// `ctx` must hold a Viterbi pass over `forest`. Returns `None` if the root
/// has no finite-weight derivation.
pub fn best_derivation(forest: &Forest, ctx: &Context) -> Option<(Derivation, Vec<String>)> {
    let root = forest.root()?;
    let score = ctx.best_score(root);
    if score == f64::NEG_INFINITY {
        return None;
    }
    let mut edges = Vec::new();
    let mut tokens = Vec::new();
    let mut stack = vec![root];
    while let Some(v) = stack.pop() {
        if forest.is_terminal(v) {
            tokens.push(forest.node(v).symbol.as_str().to_string());
            continue;
        }
        let eid = ctx.backpointer(v)?;
        edges.push(eid);
        stack.extend(forest.edge(eid).tails.iter().rev());
    }
    Some((Derivation { edges, score }, tokens))
}

/// Viterbi and minimum-Bayes-risk decoding
#[derive(Debug, Clone)]
pub struct Decoder {
    params: DecoderParams,
    rng: StdRng,
}

impl Decoder {
    pub fn new(params: DecoderParams) -> Self {
        let rng = match params.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { params, rng }
    }

    pub fn params(&self) -> &DecoderParams {
        &self.params
    }

    fn filter(&self, tokens: Vec<String>) -> Vec<String> {
        if !self.params.strip_epsilon {
            return tokens;
        }
        tokens
            .into_iter()
            .filter(|t| *t != self.params.epsilon)
            .collect()
    }

    /// Best-scoring derivation of `inst`
    ///
    /// Returns `None` for a forest without derivation, an error when the
    /// feature maps do not match the edges.
    pub fn viterbi<W: WeightFunction + ?Sized>(
        &self,
        inst: &Instance,
        weights: &mut W,
    ) -> Result<Option<DecodeOutput>> {
        let mut ctx = Context::new(Flag::VITERBI);
        ctx.compute_scores(&inst.features, weights);
        ctx.compute(&inst.forest)?;
        Ok(
            best_derivation(&inst.forest, &ctx).map(|(derivation, tokens)| DecodeOutput {
                tokens: self.filter(tokens),
                derivation,
            }),
        )
    }

    /// Minimum-Bayes-risk decoding under `1 - BLEU`
    pub fn mbr<W: WeightFunction + ?Sized>(
        &mut self,
        inst: &Instance,
        weights: &mut W,
    ) -> Result<Option<DecodeOutput>> {
        self.mbr_with_loss(inst, weights, |r: &[String], c: &[String]| bleu_loss(r, c))
    }

    /// Minimum-Bayes-risk decoding with a custom loss
    ///
    /// `loss(reference, hypothesis)` is evaluated for every ordered pair of
    /// sampled candidates.
    pub fn mbr_with_loss<W, L>(
        &mut self,
        inst: &Instance,
        weights: &mut W,
        loss: L,
    ) -> Result<Option<DecodeOutput>>
    where
        W: WeightFunction + ?Sized,
        L: Fn(&[String], &[String]) -> f64,
    {
        let mut ctx = Context::new(Flag::INSIDE);
        ctx.compute_scores(&inst.features, weights);
        if ctx.compute(&inst.forest)? == f64::NEG_INFINITY {
            return Ok(None);
        }

        let sampling = self.params.sampling;
        let mut samples = Vec::with_capacity(self.params.num_samples);
        for _ in 0..self.params.num_samples {
            match mbr::ancestral_sample(&inst.forest, &ctx, sampling, &mut self.rng) {
                Some(sample) => samples.push(sample),
                None => return Ok(None),
            }
        }
        let candidates: Vec<Vec<String>> = samples
            .iter()
            .map(|(_, tokens)| self.filter(tokens.clone()))
            .collect();
        let best = match mbr::min_risk(&candidates, loss) {
            Some(best) => best,
            None => return Ok(None),
        };
        let (derivation, _) = samples.swap_remove(best);
        let tokens = candidates.into_iter().nth(best).unwrap_or_default();
        Ok(Some(DecodeOutput { tokens, derivation }))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DecoderParams::default())
    }
}

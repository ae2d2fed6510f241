use std::borrow::Borrow;
use std::path::Path;

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::gradient::{gradient, FeatureVector};
use super::model_writer::ModelWriter;
use super::sgd::SgdParams;
use crate::checkpoint;
use crate::context::{Context, Flag};
use crate::dataset::{Example, Instance};
use crate::error::Result;
use crate::feature::FeatureMap;
use crate::params::{ParameterVector, WeightFunction};

const PARAMS_COLLECTION: &str = "params";
const TRAINER_COLLECTION: &str = "trainer";
const STEP_RECORD: &str = "__step__";

fn shuffle_indices(indices: &mut [usize], rng: &mut StdRng) {
    indices.shuffle(rng);
}

/// Outcome of one SGD step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Examples in the batch
    pub examples: usize,
    /// Examples without a derivation in either forest
    pub skipped: usize,
    /// Features updated by the step
    pub touched: usize,
    /// Learning rate used for the step
    pub learning_rate: f64,
}

/// Outcome of a training run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    pub epochs: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub skipped_examples: usize,
    /// Log-likelihood of the training set after the last epoch
    pub log_likelihood: f64,
}

/// Log-linear model trainer over derivation forests
///
/// Owns the parameter vector and updates it with batched stochastic
/// gradient ascent on the conditional log-likelihood of the gold forests.
#[derive(Debug)]
pub struct CrfTrainer {
    /// Model weights
    params: ParameterVector,
    /// Training parameters
    sgd: SgdParams,
    /// Number of updates applied so far
    step: u64,
    /// Examples seen by `train_batch`
    seen: usize,
    /// Examples skipped for lack of a derivation
    skipped: usize,
    /// Log-likelihood before and after each batch
    verbose: bool,
    /// Shuffles examples between epochs
    rng: StdRng,
}

impl Default for CrfTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl CrfTrainer {
    /// Create a new trainer
    pub fn new() -> Self {
        Self {
            params: ParameterVector::new(),
            sgd: SgdParams::default(),
            step: 0,
            seen: 0,
            skipped: 0,
            verbose: false,
            rng: StdRng::from_entropy(),
        }
    }

    /// Enable or disable per-batch log-likelihood reports
    pub fn verbose(&mut self, enabled: bool) -> &mut Self {
        self.verbose = enabled;
        self
    }

    /// Set the base learning rate (builder pattern)
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Result<Self> {
        self.sgd.set_learning_rate(learning_rate)?;
        Ok(self)
    }

    /// Set the L2 regularization strength (builder pattern)
    pub fn with_l2(mut self, l2: f64) -> Result<Self> {
        self.sgd.set_l2(l2)?;
        Ok(self)
    }

    /// Set the learning rate decay (builder pattern)
    pub fn with_decay(mut self, decay: f64) -> Result<Self> {
        self.sgd.set_decay(decay)?;
        Ok(self)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        self.sgd.set_batch_size(batch_size)?;
        Ok(self)
    }

    pub fn with_max_epochs(mut self, max_epochs: usize) -> Result<Self> {
        self.sgd.set_max_epochs(max_epochs)?;
        Ok(self)
    }

    /// Seed parameter initialization and shuffling (builder pattern)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.reseed(seed);
        self
    }

    fn reseed(&mut self, seed: u64) {
        self.sgd.set_seed(Some(seed));
        self.params.reseed(seed);
        // shuffling draws from its own stream
        self.rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    }

    /// Set a training parameter by name
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.sgd.set(name, value)?;
        if let Some(seed) = self.sgd.seed().filter(|_| name == "seed") {
            self.reseed(seed);
        }
        Ok(())
    }

    /// Get a training parameter by name
    pub fn get(&self, name: &str) -> Result<String> {
        self.sgd.get(name)
    }

    /// Get training parameters
    pub fn sgd_params(&self) -> &SgdParams {
        &self.sgd
    }

    pub fn params(&self) -> &ParameterVector {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterVector {
        &mut self.params
    }

    /// Number of updates applied so far
    pub fn step(&self) -> u64 {
        self.step
    }

    /// (examples seen, examples skipped) by `train_batch`
    pub fn coverage(&self) -> (usize, usize) {
        (self.seen, self.skipped)
    }

    /// Log-weight of an edge: its features dotted with the current weights
    pub fn weight(&mut self, features: &FeatureMap) -> f64 {
        self.params.dot(features)
    }

    fn log_z(&mut self, inst: &Instance) -> Result<f64> {
        let mut ctx = Context::new(Flag::INSIDE);
        ctx.compute_scores(&inst.features, &mut self.params);
        ctx.compute(&inst.forest)
    }

    /// log Z(gold) - log Z(unconstrained) under the current weights
    ///
    /// Returns 0 when either forest has no derivation. A malformed example
    /// is logged and counts as 0 as well.
    pub fn compute_loglikelihood(&mut self, example: &Example) -> f64 {
        if !example.is_covered() {
            return 0.0;
        }
        let log_z = self
            .log_z(&example.gold)
            .and_then(|gold| Ok((gold, self.log_z(&example.unconstrained)?)));
        match log_z {
            Ok((gold, all)) if gold == f64::NEG_INFINITY || all == f64::NEG_INFINITY => 0.0,
            Ok((gold, all)) => gold - all,
            Err(err) => {
                warn!("example {} skipped: {}", example.id, err);
                0.0
            }
        }
    }

    /// Sum of `compute_loglikelihood` over `examples`
    pub fn compute_loglikelihood_batch<E: Borrow<Example>>(&mut self, examples: &[E]) -> f64 {
        examples
            .iter()
            .map(|ex| self.compute_loglikelihood(ex.borrow()))
            .sum()
    }

    /// Gradient of one example's log-likelihood, `None` when it is skipped
    pub fn gradient(&mut self, example: &Example) -> Result<Option<FeatureVector>> {
        gradient(example, &mut self.params)
    }

    /// Apply one SGD step computed over `batch`
    ///
    /// Only features with a gradient entry are updated, including their L2
    /// pull. Skipped examples still count towards the batch size. A malformed
    /// forest aborts the whole batch before any weight changes.
    pub fn train_batch<E: Borrow<Example>>(&mut self, batch: &[E]) -> Result<BatchReport> {
        if batch.is_empty() {
            return Ok(BatchReport::default());
        }
        for example in batch {
            example.borrow().validate()?;
        }

        let before = if self.verbose {
            Some(self.compute_loglikelihood_batch(batch))
        } else {
            None
        };

        let mut sum = FeatureVector::new();
        let mut skipped = 0;
        for example in batch {
            let example = example.borrow();
            self.seen += 1;
            match gradient(example, &mut self.params)? {
                Some(grad) if grad.values().all(|g| g.is_finite()) => {
                    for (name, g) in grad {
                        *sum.entry(name).or_insert(0.0) += g;
                    }
                }
                Some(_) => {
                    warn!("non-finite gradient for example {}, skipped", example.id);
                    skipped += 1;
                }
                None => {
                    debug!("example {} has no derivation, skipped", example.id);
                    skipped += 1;
                }
            }
        }
        self.skipped += skipped;

        let eta = self.sgd.learning_rate_at(self.step);
        let lambda = self.sgd.l2();
        let size = batch.len() as f64;
        for (name, g) in &sum {
            let theta = self.params.get_or_init(name);
            self.params
                .set(name.as_str(), theta + eta * (g / size - lambda * theta));
        }
        self.step += 1;

        debug!(
            "step {}: eta = {:.6}, {} features updated, {}/{} examples skipped",
            self.step,
            eta,
            sum.len(),
            skipped,
            batch.len()
        );
        if let Some(before) = before {
            let after = self.compute_loglikelihood_batch(batch);
            info!(
                "step {}: batch log-likelihood {:.6} -> {:.6}",
                self.step, before, after
            );
        }

        Ok(BatchReport {
            examples: batch.len(),
            skipped,
            touched: sum.len(),
            learning_rate: eta,
        })
    }

    /// Train for the configured number of epochs
    ///
    /// Each epoch visits the examples in a fresh random order, in batches of
    /// `batch_size`. A failing batch is logged and training goes on.
    pub fn fit(&mut self, examples: &[Example]) -> TrainReport {
        let mut report = TrainReport::default();
        let mut indices: Vec<usize> = (0..examples.len()).collect();
        let batch_size = self.sgd.batch_size();

        info!(
            "training on {} examples (learning_rate={}, l2={}, decay={}, batch_size={})",
            examples.len(),
            self.sgd.learning_rate(),
            self.sgd.l2(),
            self.sgd.decay(),
            batch_size
        );

        for epoch in 1..=self.sgd.max_epochs() {
            shuffle_indices(&mut indices, &mut self.rng);
            for (i, chunk) in indices.chunks(batch_size).enumerate() {
                let batch: Vec<&Example> = chunk.iter().map(|&idx| &examples[idx]).collect();
                match self.train_batch(&batch) {
                    Ok(batch_report) => {
                        report.batches += 1;
                        report.skipped_examples += batch_report.skipped;
                    }
                    Err(err) => {
                        error!("epoch {}, batch {} failed: {}", epoch, i + 1, err);
                        report.failed_batches += 1;
                    }
                }
            }
            report.epochs = epoch;
            report.log_likelihood = self.compute_loglikelihood_batch(examples);
            let (seen, skipped) = self.coverage();
            info!(
                "epoch {}: log-likelihood = {:.6}, feature_norm = {:.6}, coverage {}/{}",
                epoch,
                report.log_likelihood,
                self.params.norm2().sqrt(),
                seen - skipped,
                seen
            );
        }
        report
    }

    /// Write the weights and the step counter to `dir`
    pub fn save_checkpoint<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        checkpoint::save(dir, PARAMS_COLLECTION, self.params.iter())?;
        checkpoint::save(
            dir,
            TRAINER_COLLECTION,
            std::iter::once((STEP_RECORD, self.step as f64)),
        )?;
        info!("saved {} weights at step {}", self.params.len(), self.step);
        Ok(())
    }

    /// Restore weights and the step counter saved by `save_checkpoint`
    ///
    /// Weights in the checkpoint replace current ones; others are kept.
    pub fn load_checkpoint<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        let records = checkpoint::load(checkpoint::path_for(dir, PARAMS_COLLECTION))?;
        let count = records.len();
        for (name, weight) in records {
            self.params.set(name, weight);
        }
        let trainer_path = checkpoint::path_for(dir, TRAINER_COLLECTION);
        if trainer_path.exists() {
            let state = checkpoint::load(&trainer_path)?;
            if let Some(&step) = state.get(STEP_RECORD) {
                self.step = step as u64;
            }
        } else {
            warn!("no trainer state in {}, step counter kept", dir.display());
        }
        info!("loaded {} weights, resuming at step {}", count, self.step);
        Ok(())
    }

    /// Write the non-zero weights as a frozen model
    pub fn save_model<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        ModelWriter::write(filename, &self.params)
    }
}

impl WeightFunction for CrfTrainer {
    fn weight(&mut self, features: &FeatureMap) -> f64 {
        self.params.dot(features)
    }
}

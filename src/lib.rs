//! Log-linear (CRF) training and decoding over weighted derivation forests
//!
//! A forest is a hypergraph whose edges are grammar productions. Every edge
//! carries a sparse feature map; its log-weight is the dot product of those
//! features with the model parameters. This library computes inside and
//! outside scores, trains the parameters by maximizing the conditional
//! log-likelihood of gold-constrained forests, and decodes with Viterbi or
//! minimum Bayes risk.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use forest_crf::train::CrfTrainer;
//! use forest_crf::{Example, Forest, Node, Rule, SparseFeaturizer};
//!
//! let s = Node::nonterminal("S");
//! let all = Forest::from_rules("all", vec![
//!     Rule::unary(s.clone(), Node::terminal("a")),
//!     Rule::unary(s.clone(), Node::terminal("b")),
//! ])?;
//! let gold = Forest::from_rules("gold", vec![Rule::unary(s, Node::terminal("a"))])?;
//! let example = Example::featurize("0", vec!["a".into()], all, gold, &SparseFeaturizer::new());
//!
//! let mut trainer = CrfTrainer::new().with_seed(42);
//! trainer.set("learning_rate", "0.5")?;
//! trainer.fit(&[example]);
//! trainer.save_model("model.hcrf")?;
//! # Ok::<(), forest_crf::Error>(())
//! ```
//!
//! ## Decoding
//!
//! ```no_run
//! use forest_crf::{DecoderParams, Model};
//! # use forest_crf::{Forest, Instance, FeatureCache, Node, Rule, SparseFeaturizer};
//! # let forest = Forest::from_rules("f", vec![Rule::unary(Node::nonterminal("S"), Node::terminal("a"))])?;
//! # let inst = Instance::featurize(forest, &[], &mut FeatureCache::new(), &SparseFeaturizer::new());
//!
//! let model_data = std::fs::read("model.hcrf")?;
//! let model = Model::new(&model_data)?;
//! let translator = model.translator(DecoderParams::default());
//! let result = translator.viterbi(&inst)?;
//! # Ok::<(), forest_crf::Error>(())
//! ```

mod attribute;
mod bleu;
pub mod checkpoint;
mod context;
mod dataset;
mod decoder;
mod error;
mod feature;
mod forest;
pub mod mbr;
mod model;
mod params;
mod symbol;
mod topo;
mod translator;

/// Training module containing the gradient estimator and the trainer
pub mod train;

// Re-export main types
pub use self::attribute::Attribute;
pub use self::bleu::{bleu_loss, sentence_bleu};
pub use self::context::{logsumexp, Context, Flag};
pub use self::dataset::{Example, Instance};
pub use self::decoder::{best_derivation, DecodeOutput, Decoder, DecoderParams, Derivation};
pub use self::error::{Error, Result};
pub use self::feature::{FeatureCache, FeatureMap, Featurizer, SparseFeaturizer};
pub use self::forest::{Edge, EdgeId, Forest, ForestBuilder, NodeId, Orientation, Rule};
pub use self::mbr::Sampling;
pub use self::model::Model;
pub use self::params::{ParameterVector, WeightFunction};
pub use self::symbol::{Node, Span, Symbol, EPSILON};
pub use self::topo::topological_sort;
pub use self::translator::Translator;

// Re-export training types for convenience
pub use self::train::CrfTrainer;

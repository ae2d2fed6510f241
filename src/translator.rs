use crate::dataset::{Example, Instance};
use crate::decoder::{DecodeOutput, Decoder, DecoderParams};
use crate::error::Result;
use crate::feature::FeatureMap;
use crate::model::Model;

/// The translator decodes forests with the weights of a frozen model
#[derive(Debug, Clone)]
pub struct Translator<'a> {
    /// Frozen model
    model: &'a Model<'a>,
    decoder: Decoder,
}

impl<'a> Translator<'a> {
    pub(crate) fn new(model: &'a Model<'a>, params: DecoderParams) -> Self {
        Self {
            model,
            decoder: Decoder::new(params),
        }
    }

    /// Best derivation of the forest
    pub fn viterbi(&self, inst: &Instance) -> Result<Option<DecodeOutput>> {
        let model = self.model;
        self.decoder
            .viterbi(inst, &mut |features: &FeatureMap| model.score(features))
    }

    /// Minimum-Bayes-risk translation of the forest
    pub fn mbr(&mut self, inst: &Instance) -> Result<Option<DecodeOutput>> {
        let model = self.model;
        self.decoder
            .mbr(inst, &mut |features: &FeatureMap| model.score(features))
    }

    /// Viterbi translation of an example, searching its length-constrained
    /// forest when there is one
    ///
    /// An example without derivation translates to no tokens.
    pub fn translate(&self, example: &Example) -> Result<Vec<String>> {
        Ok(self
            .viterbi(example.decode_instance())?
            .map(|out| out.tokens)
            .unwrap_or_default())
    }
}

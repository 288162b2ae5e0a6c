// Copyright 2021 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Summarization pipeline
//!
//! Abstractive summarization of whitespace-tokenized articles with a pointer-generator network,
//! decoded with beam search. Words of the article missing from the vocabulary can be copied into
//! the summary.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_pgn::data::Vocab;
//! use rust_pgn::pipelines::summarization::{SummarizationConfig, SummarizationModel};
//! use rust_pgn::pointer_generator::{Mode, PgnConfig};
//! use std::path::Path;
//!
//! let vocab = Vocab::from_file("path/to/vocab", 50000)?;
//! let pgn_config = PgnConfig {
//!     vocab_size: vocab.size(),
//!     mode: Mode::Test,
//!     ..Default::default()
//! };
//! let summarization_model = SummarizationModel::new(
//!     &pgn_config,
//!     vocab,
//!     Some(Path::new("path/to/model.ot")),
//!     SummarizationConfig::default(),
//! )?;
//!
//! let input = ["in findings published tuesday in cornell university 's arxiv by a team of scientists from the university of montreal ..."];
//! let output = summarization_model.summarize(&input)?;
//! # Ok(())
//! # }
//! ```

use crate::data::{output_ids_to_words, SummarizationExample, Vocab};
use crate::pointer_generator::{
    Attention, DecoderStep, Encoder, GenerationGate, Mode, PgnConfig, PointerGeneratorModel,
};
use crate::{Config, PgnError};
use log::debug;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::path::Path;
use tch::{nn, no_grad, Device, Tensor};

const LOG_EPSILON: f64 = 1e-12;

#[derive(Debug, Serialize, Deserialize, Clone)]
/// # Configuration for pointer-generator summarization
pub struct SummarizationConfig {
    /// Number of hypotheses kept at each decoding step (default: 4)
    pub beam_size: i64,
    /// Minimum number of decoding steps before a hypothesis may end with `[STOP]` (default: 35)
    pub min_dec_steps: i64,
    /// Maximum number of decoding steps (default: 100)
    pub max_dec_steps: i64,
    /// Maximum number of article tokens fed to the encoder (default: 400)
    pub max_enc_steps: usize,
    /// Device to run the model on (default: CUDA/GPU when available)
    #[serde(skip, default = "Device::cuda_if_available")]
    pub device: Device,
}

impl Config for SummarizationConfig {}

impl Default for SummarizationConfig {
    fn default() -> SummarizationConfig {
        SummarizationConfig {
            beam_size: 4,
            min_dec_steps: 35,
            max_dec_steps: 100,
            max_enc_steps: 400,
            device: Device::cuda_if_available(),
        }
    }
}

impl SummarizationConfig {
    fn validate(&self) -> Result<(), PgnError> {
        if self.beam_size < 1 || self.max_dec_steps < 1 || self.max_enc_steps < 1 {
            return Err(PgnError::InvalidConfigurationError(format!(
                "beam_size ({}), max_dec_steps ({}) and max_enc_steps ({}) must be strictly positive",
                self.beam_size, self.max_dec_steps, self.max_enc_steps
            )));
        }
        Ok(())
    }
}

/// # Summary produced by beam search
#[derive(Debug, Clone)]
pub struct DecodedSummary {
    /// Extended ids of the summary, without `[START]` and `[STOP]`
    pub token_ids: Vec<i64>,
    /// Words of the summary (copied OOV words included)
    pub words: Vec<String>,
    /// Summary text (words joined with spaces)
    pub text: String,
    /// Average log-probability of the hypothesis
    pub avg_log_prob: f64,
    /// Generation probability at each decoding step
    pub p_gens: Vec<f64>,
}

struct Hypothesis {
    tokens: Vec<i64>,
    log_probs: Vec<f64>,
    p_gens: Vec<f64>,
    hidden_state: Tensor,
    context_vector: Option<Tensor>,
}

impl Hypothesis {
    fn extend(
        &self,
        token: i64,
        log_prob: f64,
        p_gen: f64,
        hidden_state: &Tensor,
        context_vector: &Tensor,
    ) -> Hypothesis {
        let mut tokens = self.tokens.clone();
        tokens.push(token);
        let mut log_probs = self.log_probs.clone();
        log_probs.push(log_prob);
        let mut p_gens = self.p_gens.clone();
        p_gens.push(p_gen);
        Hypothesis {
            tokens,
            log_probs,
            p_gens,
            hidden_state: hidden_state.shallow_clone(),
            context_vector: Some(context_vector.shallow_clone()),
        }
    }

    fn latest_token(&self) -> i64 {
        *self.tokens.last().unwrap_or(&0)
    }

    fn avg_log_prob(&self) -> f64 {
        self.log_probs.iter().sum::<f64>() / self.tokens.len() as f64
    }
}

/// Beam search decoding of a single article.
///
/// Hypotheses are advanced together, one step at a time, through `PointerGeneratorModel::decode_t`.
/// Tokens with extended ids (copied OOV words) are fed back to the decoder as `[UNK]`.
///
/// # Arguments
///
/// * `model` - pointer-generator model
/// * `enc_inp` - article ids of shape (1, *source_sequence_length*), OOV words mapped to `[UNK]`
/// * `enc_extended_inp` - article extended ids of shape (1, *source_sequence_length*)
/// * `article_oovs` - OOV words of the article, in order of first appearance
/// * `vocab` - fixed vocabulary
/// * `config` - beam search settings
pub fn beam_search<E, A, D, G>(
    model: &PointerGeneratorModel<E, A, D, G>,
    enc_inp: &Tensor,
    enc_extended_inp: &Tensor,
    article_oovs: &[String],
    vocab: &Vocab,
    config: &SummarizationConfig,
) -> Result<DecodedSummary, PgnError>
where
    E: Encoder,
    A: Attention,
    D: DecoderStep,
    G: GenerationGate,
{
    config.validate()?;
    let (batch_size, source_length) = enc_inp.size2()?;
    if batch_size != 1 || enc_extended_inp.size() != [1, source_length] {
        return Err(PgnError::ShapeMismatch(format!(
            "Beam search decodes a single article: got inputs of shape {:?} and extended inputs of shape {:?}",
            enc_inp.size(),
            enc_extended_inp.size()
        )));
    }
    let device = enc_inp.device();
    let max_oov = article_oovs.len() as i64;
    let beam_size = config.beam_size as usize;

    no_grad(|| -> Result<DecodedSummary, PgnError> {
        let encoded = model.encode(enc_inp)?;

        let mut hypotheses: Vec<Hypothesis> = (0..beam_size)
            .map(|_| Hypothesis {
                tokens: vec![vocab.start_id()],
                log_probs: vec![],
                p_gens: vec![],
                hidden_state: encoded.hidden_state.get(0),
                // the seed context is computed from the encoder state on the first step
                context_vector: None,
            })
            .collect();
        let mut results: Vec<Hypothesis> = Vec::new();
        let mut steps = 0;

        while steps < config.max_dec_steps && results.len() < beam_size {
            let num_hypotheses = hypotheses.len() as i64;
            let latest_tokens: Vec<i64> = hypotheses
                .iter()
                .map(|hypothesis| {
                    let token = hypothesis.latest_token();
                    if token >= vocab.size() {
                        vocab.unk_id()
                    } else {
                        token
                    }
                })
                .collect();
            let dec_inp = Tensor::from_slice(&latest_tokens)
                .view([num_hypotheses, 1])
                .to(device);
            let hidden_states = Tensor::stack(
                &hypotheses
                    .iter()
                    .map(|hypothesis| &hypothesis.hidden_state)
                    .collect::<Vec<&Tensor>>(),
                0,
            );
            let context_vectors = hypotheses
                .iter()
                .map(|hypothesis| hypothesis.context_vector.as_ref())
                .collect::<Option<Vec<&Tensor>>>()
                .map(|context_vectors| Tensor::stack(&context_vectors, 0));
            let encoder_output = encoded.encoder_output.expand(
                [
                    num_hypotheses,
                    source_length,
                    *encoded.encoder_output.size().last().unwrap_or(&0),
                ],
                false,
            );
            let extended_inp = enc_extended_inp.expand([num_hypotheses, source_length], false);

            let output = model.decode_t(
                &encoder_output,
                None,
                &hidden_states,
                context_vectors.as_ref(),
                &extended_inp,
                &dec_inp,
                max_oov,
            )?;
            let log_probs = output
                .final_dists
                .squeeze_dim(1)
                .clamp_min(LOG_EPSILON)
                .log();
            let top_k = (2 * config.beam_size).min(*log_probs.size().last().unwrap_or(&1));
            let (top_log_probs, top_ids) = log_probs.topk(top_k, -1, true, true);

            let num_origin_hypotheses = if steps == 0 { 1 } else { hypotheses.len() };
            let mut all_hypotheses = Vec::with_capacity(num_origin_hypotheses * top_k as usize);
            for (i, hypothesis) in hypotheses.iter().take(num_origin_hypotheses).enumerate() {
                let i = i as i64;
                let hidden_state = output.dec_hidden.get(i);
                let context_vector = output.context_vector.get(i);
                let p_gen = output.p_gens.double_value(&[i, 0, 0]);
                for j in 0..top_k {
                    all_hypotheses.push(hypothesis.extend(
                        top_ids.int64_value(&[i, j]),
                        top_log_probs.double_value(&[i, j]),
                        p_gen,
                        &hidden_state,
                        &context_vector,
                    ));
                }
            }
            all_hypotheses.sort_by_key(|hypothesis| Reverse(OrderedFloat(hypothesis.avg_log_prob())));

            hypotheses = Vec::with_capacity(beam_size);
            for hypothesis in all_hypotheses {
                if hypothesis.latest_token() == vocab.stop_id() {
                    if steps >= config.min_dec_steps {
                        results.push(hypothesis);
                    }
                } else {
                    hypotheses.push(hypothesis);
                }
                if hypotheses.len() == beam_size || results.len() == beam_size {
                    break;
                }
            }
            steps += 1;
        }

        debug!(
            "beam search finished after {} steps with {} complete hypotheses",
            steps,
            results.len()
        );
        if results.is_empty() {
            results = hypotheses;
        }
        results.sort_by_key(|hypothesis| Reverse(OrderedFloat(hypothesis.avg_log_prob())));
        let best = results.into_iter().next().ok_or_else(|| {
            PgnError::ValueError("Beam search did not produce any hypothesis".to_string())
        })?;

        let mut token_ids = best.tokens[1..].to_vec();
        if let Some(stop_position) = token_ids.iter().position(|&id| id == vocab.stop_id()) {
            token_ids.truncate(stop_position);
        }
        let words = output_ids_to_words(&token_ids, vocab, article_oovs)?;
        Ok(DecodedSummary {
            text: words.join(" "),
            avg_log_prob: best.avg_log_prob(),
            p_gens: best.p_gens,
            token_ids,
            words,
        })
    })
}

/// # Pointer-generator summarization model
/// Wraps a `PointerGeneratorModel`, its vocabulary and beam search settings.
pub struct SummarizationModel {
    model: PointerGeneratorModel,
    vocab: Vocab,
    config: SummarizationConfig,
    var_store: nn::VarStore,
}

impl SummarizationModel {
    /// Build a new `SummarizationModel`
    ///
    /// # Arguments
    ///
    /// * `pgn_config` - model architecture. The mode must be `test` or `eval`.
    /// * `vocab` - vocabulary the model was trained with
    /// * `weights_path` - optional path to the model weights. Weights are randomly initialized when not provided.
    /// * `config` - beam search settings
    pub fn new(
        pgn_config: &PgnConfig,
        vocab: Vocab,
        weights_path: Option<&Path>,
        config: SummarizationConfig,
    ) -> Result<SummarizationModel, PgnError> {
        config.validate()?;
        if pgn_config.mode == Mode::Train {
            return Err(PgnError::InvalidConfigurationError(
                "Summarization requires a model in test or eval mode".to_string(),
            ));
        }
        if pgn_config.vocab_size != vocab.size() {
            return Err(PgnError::InvalidConfigurationError(format!(
                "Model vocabulary size ({}) does not match the vocabulary ({} words)",
                pgn_config.vocab_size,
                vocab.size()
            )));
        }
        let mut var_store = nn::VarStore::new(config.device);
        let model = PointerGeneratorModel::new(&var_store.root() / "pgn", pgn_config)?;
        if let Some(weights_path) = weights_path {
            var_store.load(weights_path)?;
        }
        Ok(SummarizationModel {
            model,
            vocab,
            config,
            var_store,
        })
    }

    pub fn get_var_store(&self) -> &nn::VarStore {
        &self.var_store
    }

    /// Summarizes whitespace-tokenized articles, one beam search per article.
    pub fn summarize<S: AsRef<str>>(&self, articles: &[S]) -> Result<Vec<DecodedSummary>, PgnError> {
        let empty_abstract: [&str; 0] = [];
        articles
            .iter()
            .map(|article| {
                let example = SummarizationExample::new(
                    article.as_ref(),
                    &empty_abstract,
                    &self.vocab,
                    self.config.max_enc_steps,
                    self.config.max_dec_steps as usize,
                );
                let source_length = example.enc_input.len() as i64;
                let enc_inp = Tensor::from_slice(&example.enc_input)
                    .view([1, source_length])
                    .to(self.config.device);
                let enc_extended_inp = Tensor::from_slice(&example.enc_input_extended)
                    .view([1, source_length])
                    .to(self.config.device);
                beam_search(
                    &self.model,
                    &enc_inp,
                    &enc_extended_inp,
                    &example.article_oovs,
                    &self.vocab,
                    &self.config,
                )
            })
            .collect()
    }
}

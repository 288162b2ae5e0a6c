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

use crate::pointer_generator::attention::{Attention, BahdanauAttention};
use crate::pointer_generator::decoder::{DecoderStep, PgnDecoder};
use crate::pointer_generator::decoding::decode_steps;
use crate::pointer_generator::encoder::{Encoder, EncoderOutput, PgnEncoder};
use crate::pointer_generator::final_distribution::calc_final_dist;
use crate::pointer_generator::pointer::{GenerationGate, Pointer};
use crate::{Config, PgnError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use tch::{nn, Tensor};

/// # Model mode
/// Selects the output contract of `PointerGeneratorModel::forward_t`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Training: final distributions and decoder hidden state
    Train,
    /// Test: final distributions, hidden state, context vector, attentions and generation probabilities
    Test,
    /// Evaluation: same output contract as `Test`
    Eval,
}

impl FromStr for Mode {
    type Err = PgnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "train" => Ok(Mode::Train),
            "test" => Ok(Mode::Test),
            "eval" => Ok(Mode::Eval),
            _ => Err(PgnError::InvalidConfigurationError(format!(
                "Invalid mode: {}, expected one of train, test or eval",
                s
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Mode::Train => "train",
            Mode::Test => "test",
            Mode::Eval => "eval",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
/// # Pointer-generator model configuration
/// Defines the model architecture (vocabulary size, layer sizes) and the mode of the model.
/// Unknown or missing keys are rejected when deserializing.
pub struct PgnConfig {
    pub vocab_size: i64,
    pub embed_size: i64,
    pub enc_units: i64,
    pub dec_units: i64,
    pub attn_units: i64,
    /// Maximum number of examples in a batch passed to `PointerGeneratorModel::forward_t`
    pub batch_size: i64,
    pub mode: Mode,
}

impl Config for PgnConfig {}

impl Default for PgnConfig {
    fn default() -> Self {
        PgnConfig {
            vocab_size: 50000,
            embed_size: 256,
            enc_units: 256,
            dec_units: 256,
            attn_units: 512,
            batch_size: 16,
            mode: Mode::Train,
        }
    }
}

impl PgnConfig {
    /// Checks the consistency of the configuration. Called when building a model.
    pub fn validate(&self) -> Result<(), PgnError> {
        let sizes = [
            ("vocab_size", self.vocab_size),
            ("embed_size", self.embed_size),
            ("enc_units", self.enc_units),
            ("dec_units", self.dec_units),
            ("attn_units", self.attn_units),
            ("batch_size", self.batch_size),
        ];
        if let Some((name, value)) = sizes.iter().find(|(_, value)| *value <= 0) {
            return Err(PgnError::InvalidConfigurationError(format!(
                "{} must be strictly positive, got {}",
                name, value
            )));
        }
        if self.enc_units != self.dec_units {
            return Err(PgnError::InvalidConfigurationError(format!(
                "The decoder is initialized with the encoder hidden state: enc_units ({}) and dec_units ({}) must be equal",
                self.enc_units, self.dec_units
            )));
        }
        Ok(())
    }
}

/// # Training output of the pointer-generator
pub struct TrainingOutput {
    /// Final distributions of shape (*batch size*, *decoder_steps*, *vocab_size + max_oov*)
    pub final_dists: Tensor,
    /// Decoder hidden state after the last step, of shape (*batch size*, *dec_units*)
    pub dec_hidden: Tensor,
}

/// # Inference output of the pointer-generator
/// Carries the state needed to continue decoding one step at a time (e.g. beam search).
pub struct InferenceOutput {
    /// Final distributions of shape (*batch size*, *decoder_steps*, *vocab_size + max_oov*)
    pub final_dists: Tensor,
    /// Decoder hidden state after the last step, of shape (*batch size*, *dec_units*)
    pub dec_hidden: Tensor,
    /// Context vector computed from the last hidden state, of shape (*batch size*, *enc_units*)
    pub context_vector: Tensor,
    /// Attention distributions of shape (*batch size*, *decoder_steps*, *source_sequence_length*)
    pub attentions: Tensor,
    /// Generation probabilities of shape (*batch size*, *decoder_steps*, 1)
    pub p_gens: Tensor,
}

/// # Output of a pointer-generator forward pass
/// The variant is selected by the `mode` of the model configuration.
pub enum PgnOutput {
    Training(TrainingOutput),
    Inference(InferenceOutput),
}

impl PgnOutput {
    /// Final distributions, available in both variants
    pub fn final_dists(&self) -> &Tensor {
        match self {
            PgnOutput::Training(output) => &output.final_dists,
            PgnOutput::Inference(output) => &output.final_dists,
        }
    }

    /// Decoder hidden state after the last step, available in both variants
    pub fn dec_hidden(&self) -> &Tensor {
        match self {
            PgnOutput::Training(output) => &output.dec_hidden,
            PgnOutput::Inference(output) => &output.dec_hidden,
        }
    }

    pub fn into_training(self) -> Result<TrainingOutput, PgnError> {
        match self {
            PgnOutput::Training(output) => Ok(output),
            PgnOutput::Inference(_) => Err(PgnError::ValueError(
                "Expected a training output, got an inference output".to_string(),
            )),
        }
    }

    pub fn into_inference(self) -> Result<InferenceOutput, PgnError> {
        match self {
            PgnOutput::Inference(output) => Ok(output),
            PgnOutput::Training(_) => Err(PgnError::ValueError(
                "Expected an inference output, got a training output".to_string(),
            )),
        }
    }
}

/// # Pointer-generator network
/// Sequence-to-sequence model able to copy source words into its output, including words that are
/// not part of the fixed vocabulary. It is made of the following blocks:
/// - `encoder`: source sequence encoder (`PgnEncoder` by default)
/// - `attention`: attention over the encoder outputs, keyed by the decoder hidden state (`BahdanauAttention` by default)
/// - `decoder`: single step decoder producing a distribution over the fixed vocabulary (`PgnDecoder` by default)
/// - `pointer`: generation gate balancing generation and copy (`Pointer` by default)
///
/// The components are only accessed through their traits and may be replaced with
/// `PointerGeneratorModel::from_components`.
pub struct PointerGeneratorModel<
    E = PgnEncoder,
    A = BahdanauAttention,
    D = PgnDecoder,
    G = Pointer,
> {
    encoder: E,
    attention: A,
    decoder: D,
    pointer: G,
    config: PgnConfig,
}

impl PointerGeneratorModel {
    /// Build a new `PointerGeneratorModel`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the pointer-generator model
    /// * `config` - `PgnConfig` object defining the model architecture and mode
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_pgn::pointer_generator::{PgnConfig, PointerGeneratorModel};
    /// use rust_pgn::Config;
    /// use std::path::Path;
    /// use tch::{nn, Device};
    ///
    /// let config_path = Path::new("path/to/config.json");
    /// let device = Device::Cpu;
    /// let p = nn::VarStore::new(device);
    /// let config = PgnConfig::from_file(config_path).unwrap();
    /// let pgn = PointerGeneratorModel::new(&p.root() / "pgn", &config).unwrap();
    /// ```
    pub fn new<'p, P>(p: P, config: &PgnConfig) -> Result<PointerGeneratorModel, PgnError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        config.validate()?;
        let p = p.borrow();

        let encoder = PgnEncoder::new(p / "encoder", config);
        let attention = BahdanauAttention::new(p / "attention", config);
        let decoder = PgnDecoder::new(p / "decoder", config);
        let pointer = Pointer::new(p / "pointer", config);

        Ok(PointerGeneratorModel {
            encoder,
            attention,
            decoder,
            pointer,
            config: config.clone(),
        })
    }
}

impl<E, A, D, G> PointerGeneratorModel<E, A, D, G>
where
    E: Encoder,
    A: Attention,
    D: DecoderStep,
    G: GenerationGate,
{
    /// Build a `PointerGeneratorModel` from existing sub-networks.
    ///
    /// The decoder vocabulary width must match `config.vocab_size`.
    pub fn from_components(
        config: &PgnConfig,
        encoder: E,
        attention: A,
        decoder: D,
        pointer: G,
    ) -> Result<PointerGeneratorModel<E, A, D, G>, PgnError> {
        config.validate()?;
        if decoder.vocab_size() != config.vocab_size {
            return Err(PgnError::InvalidConfigurationError(format!(
                "Decoder vocabulary size ({}) does not match the configuration vocabulary size ({})",
                decoder.vocab_size(),
                config.vocab_size
            )));
        }
        Ok(PointerGeneratorModel {
            encoder,
            attention,
            decoder,
            pointer,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &PgnConfig {
        &self.config
    }

    /// Encodes a batch of source token ids of shape (*batch size*, *source_sequence_length*),
    /// starting from the zero state of the encoder.
    pub fn encode(&self, enc_inp: &Tensor) -> Result<EncoderOutput, PgnError> {
        let (batch_size, _) = enc_inp.size2()?;
        let initial_hidden = self
            .encoder
            .initial_hidden_state(batch_size, enc_inp.device());
        Ok(self.encoder.forward(enc_inp, &initial_hidden))
    }

    /// Runs the decoding loop from an encoded source and returns the inference output contract,
    /// whatever the mode of the model.
    ///
    /// # Arguments
    ///
    /// * `encoder_output` - encoder activations of shape (*batch size*, *source_sequence_length*, *enc_units*)
    /// * `enc_padding_mask` - optional source padding mask of shape (*batch size*, *source_sequence_length*), 1.0 for real tokens
    /// * `dec_hidden` - decoder hidden state to start from, of shape (*batch size*, *dec_units*)
    /// * `context_vector` - optional context vector returned by a previous call, reused for the first step
    /// * `enc_extended_inp` - source extended ids of shape (*batch size*, *source_sequence_length*)
    /// * `dec_inp` - decoder input tokens of shape (*batch size*, *decoder_steps*), in the fixed vocabulary
    /// * `batch_oov_len` - largest number of source OOV words of a single example in the batch
    pub fn decode_t(
        &self,
        encoder_output: &Tensor,
        enc_padding_mask: Option<&Tensor>,
        dec_hidden: &Tensor,
        context_vector: Option<&Tensor>,
        enc_extended_inp: &Tensor,
        dec_inp: &Tensor,
        batch_oov_len: i64,
    ) -> Result<InferenceOutput, PgnError> {
        let decoded = decode_steps(
            &self.attention,
            &self.decoder,
            &self.pointer,
            encoder_output,
            enc_padding_mask,
            dec_hidden,
            context_vector,
            dec_inp,
        )?;
        let final_dists = calc_final_dist(
            enc_extended_inp,
            &decoded.vocab_dists,
            &decoded.attention_dists,
            &decoded.p_gens,
            batch_oov_len,
        )?;
        Ok(InferenceOutput {
            final_dists,
            dec_hidden: decoded.hidden_state,
            context_vector: decoded.context_vector,
            attentions: decoded.attention_dists,
            p_gens: decoded.p_gens,
        })
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `enc_inp` - source token ids of shape (*batch size*, *source_sequence_length*), OOV words mapped to `[UNK]`
    /// * `enc_padding_mask` - optional source padding mask of shape (*batch size*, *source_sequence_length*), 1.0 for real tokens.
    ///   Padded source positions receive no attention and therefore no copy probability.
    /// * `enc_extended_inp` - source extended ids of shape (*batch size*, *source_sequence_length*)
    /// * `dec_inp` - teacher-forced decoder input of shape (*batch size*, *decoder_steps*)
    /// * `batch_oov_len` - largest number of source OOV words of a single example in the batch
    ///
    /// # Returns
    ///
    /// * `PgnOutput::Training` in `Mode::Train`, containing:
    ///   - `final_dists` - `Tensor` of shape (*batch size*, *decoder_steps*, *vocab_size + batch_oov_len*)
    ///   - `dec_hidden` - `Tensor` of shape (*batch size*, *dec_units*)
    /// * `PgnOutput::Inference` otherwise, additionally containing:
    ///   - `context_vector` - `Tensor` of shape (*batch size*, *enc_units*)
    ///   - `attentions` - `Tensor` of shape (*batch size*, *decoder_steps*, *source_sequence_length*)
    ///   - `p_gens` - `Tensor` of shape (*batch size*, *decoder_steps*, 1)
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use tch::{nn, Device, Tensor, no_grad};
    /// # use tch::kind::Kind::Int64;
    /// use rust_pgn::pointer_generator::{PgnConfig, PointerGeneratorModel};
    /// # let device = Device::Cpu;
    /// # let vs = nn::VarStore::new(device);
    /// # let config = PgnConfig::default();
    /// # let pgn_model = PointerGeneratorModel::new(&vs.root(), &config).unwrap();
    /// let (batch_size, source_sequence_length, target_sequence_length) = (16, 400, 100);
    /// let enc_inp = Tensor::randint(config.vocab_size, &[batch_size, source_sequence_length], (Int64, device));
    /// let dec_inp = Tensor::randint(config.vocab_size, &[batch_size, target_sequence_length], (Int64, device));
    ///
    /// let model_output =
    ///     no_grad(|| pgn_model.forward_t(&enc_inp, None, &enc_inp, &dec_inp, 0)).unwrap();
    /// ```
    pub fn forward_t(
        &self,
        enc_inp: &Tensor,
        enc_padding_mask: Option<&Tensor>,
        enc_extended_inp: &Tensor,
        dec_inp: &Tensor,
        batch_oov_len: i64,
    ) -> Result<PgnOutput, PgnError> {
        let (batch_size, _) = enc_inp.size2()?;
        if batch_size > self.config.batch_size {
            return Err(PgnError::ShapeMismatch(format!(
                "Batch of {} examples exceeds the configured batch size {}",
                batch_size, self.config.batch_size
            )));
        }
        let encoder_output = self.encode(enc_inp)?;
        let output = self.decode_t(
            &encoder_output.encoder_output,
            enc_padding_mask,
            &encoder_output.hidden_state,
            None,
            enc_extended_inp,
            dec_inp,
            batch_oov_len,
        )?;
        Ok(match self.config.mode {
            Mode::Train => PgnOutput::Training(TrainingOutput {
                final_dists: output.final_dists,
                dec_hidden: output.dec_hidden,
            }),
            Mode::Test | Mode::Eval => PgnOutput::Inference(output),
        })
    }
}

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

use crate::pointer_generator::PgnConfig;
use std::borrow::Borrow;
use tch::nn::{embedding, EmbeddingConfig, GRUState, LinearConfig, RNNConfig, RNN};
use tch::{nn, Kind, Tensor};

/// Output of a single decoder step
pub struct DecoderStepOutput {
    /// Step features consumed by the generation gate, of shape (*batch size*, *decoder_output_dim*).
    /// For `PgnDecoder` this is the recurrent cell input `x_t` (context vector concatenated with the token embedding).
    pub decoder_output: Tensor,
    /// Distribution over the fixed vocabulary, of shape (*batch size*, *vocab_size*). Each row sums to 1.
    pub vocab_distribution: Tensor,
    /// Updated decoder hidden state of shape (*batch size*, *dec_units*)
    pub hidden_state: Tensor,
}

/// # Single decoder step
/// `(single_target_token, decoder_hidden_state, encoder_output, context_vector) ->
/// (decoder_output, vocabulary_distribution, updated_hidden_state)`
pub trait DecoderStep {
    /// Width of the fixed vocabulary distribution produced at each step
    fn vocab_size(&self) -> i64;

    /// Runs one decoding step for input tokens of shape (*batch size*, 1)
    fn forward(
        &self,
        input_token: &Tensor,
        hidden_state: &Tensor,
        encoder_output: &Tensor,
        context_vector: &Tensor,
    ) -> DecoderStepOutput;
}

/// # GRU decoder
/// Embeds the input token, prepends the context vector, runs one GRU step and projects the GRU
/// output on the fixed vocabulary.
#[derive(Debug)]
pub struct PgnDecoder {
    embeddings: nn::Embedding,
    gru: nn::GRU,
    fc: nn::Linear,
    vocab_size: i64,
}

impl PgnDecoder {
    pub fn new<'p, P>(p: P, config: &PgnConfig) -> PgnDecoder
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let embeddings = embedding(
            p / "embedding",
            config.vocab_size,
            config.embed_size,
            EmbeddingConfig::default(),
        );
        let gru_config = RNNConfig {
            batch_first: true,
            ..Default::default()
        };
        let gru = nn::gru(
            p / "gru",
            config.enc_units + config.embed_size,
            config.dec_units,
            gru_config,
        );
        let fc = nn::linear(
            p / "fc",
            config.dec_units,
            config.vocab_size,
            LinearConfig::default(),
        );
        PgnDecoder {
            embeddings,
            gru,
            fc,
            vocab_size: config.vocab_size,
        }
    }
}

impl DecoderStep for PgnDecoder {
    fn vocab_size(&self) -> i64 {
        self.vocab_size
    }

    fn forward(
        &self,
        input_token: &Tensor,
        hidden_state: &Tensor,
        _encoder_output: &Tensor,
        context_vector: &Tensor,
    ) -> DecoderStepOutput {
        let embedded = input_token.apply(&self.embeddings);
        let x = Tensor::cat(&[context_vector.unsqueeze(1), embedded], -1);
        let (output, state) = self.gru.seq_init(&x, &GRUState(hidden_state.unsqueeze(0)));
        let vocab_distribution = output
            .squeeze_dim(1)
            .apply(&self.fc)
            .softmax(-1, Kind::Float);
        DecoderStepOutput {
            decoder_output: x.squeeze_dim(1),
            vocab_distribution,
            hidden_state: state.value().select(0, -1),
        }
    }
}

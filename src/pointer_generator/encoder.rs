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
use tch::nn::{embedding, EmbeddingConfig, GRUState, RNNConfig, RNN};
use tch::{nn, Device, Kind, Tensor};

/// Output of an encoder pass
pub struct EncoderOutput {
    /// Encoder activations of shape (*batch size*, *source_sequence_length*, *enc_units*)
    pub encoder_output: Tensor,
    /// Final encoder hidden state of shape (*batch size*, *enc_units*)
    pub hidden_state: Tensor,
}

/// # Source sequence encoder
/// `(source_token_ids, initial_hidden_state) -> (encoder_output, encoder_hidden_state)`
pub trait Encoder {
    /// Zero state used to seed the encoder, of shape (*batch size*, *enc_units*)
    fn initial_hidden_state(&self, batch_size: i64, device: Device) -> Tensor;

    /// Encodes a batch of source token ids of shape (*batch size*, *source_sequence_length*)
    fn forward(&self, input_ids: &Tensor, hidden_state: &Tensor) -> EncoderOutput;
}

/// # GRU encoder
/// Token embeddings followed by a single layer, batch-first GRU.
#[derive(Debug)]
pub struct PgnEncoder {
    embeddings: nn::Embedding,
    gru: nn::GRU,
    enc_units: i64,
}

impl PgnEncoder {
    pub fn new<'p, P>(p: P, config: &PgnConfig) -> PgnEncoder
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
        let gru = nn::gru(p / "gru", config.embed_size, config.enc_units, gru_config);
        PgnEncoder {
            embeddings,
            gru,
            enc_units: config.enc_units,
        }
    }
}

impl Encoder for PgnEncoder {
    fn initial_hidden_state(&self, batch_size: i64, device: Device) -> Tensor {
        Tensor::zeros([batch_size, self.enc_units], (Kind::Float, device))
    }

    fn forward(&self, input_ids: &Tensor, hidden_state: &Tensor) -> EncoderOutput {
        let embedded = input_ids.apply(&self.embeddings);
        let (encoder_output, state) = self
            .gru
            .seq_init(&embedded, &GRUState(hidden_state.unsqueeze(0)));
        EncoderOutput {
            encoder_output,
            hidden_state: state.value().select(0, -1),
        }
    }
}

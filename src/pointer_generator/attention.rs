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
use tch::nn::LinearConfig;
use tch::{nn, Kind, Tensor};

/// Output of an attention pass
pub struct AttentionOutput {
    /// Attention-weighted sum of the encoder outputs, of shape (*batch size*, *enc_units*)
    pub context_vector: Tensor,
    /// Attention distribution over source positions, of shape (*batch size*, *source_sequence_length*).
    /// Each row sums to 1.
    pub attention_weights: Tensor,
}

/// # Attention over the encoder outputs
/// `(decoder_hidden_state, encoder_output, enc_padding_mask) -> (context_vector, attention_distribution)`
///
/// `enc_padding_mask` has shape (*batch size*, *source_sequence_length*), with 1.0 for real tokens
/// and 0.0 for padding. Padded source positions must receive no attention. Each row of the mask
/// must hold at least one real token.
pub trait Attention {
    fn forward(
        &self,
        decoder_hidden_state: &Tensor,
        encoder_output: &Tensor,
        enc_padding_mask: Option<&Tensor>,
    ) -> AttentionOutput;
}

/// # Additive (Bahdanau) attention
/// `score = v · tanh(W1 · encoder_output + W2 · hidden)`, normalized with a softmax over the source positions.
#[derive(Debug)]
pub struct BahdanauAttention {
    w1: nn::Linear,
    w2: nn::Linear,
    v: nn::Linear,
}

impl BahdanauAttention {
    pub fn new<'p, P>(p: P, config: &PgnConfig) -> BahdanauAttention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let w1 = nn::linear(
            p / "w1",
            config.enc_units,
            config.attn_units,
            LinearConfig::default(),
        );
        let w2 = nn::linear(
            p / "w2",
            config.dec_units,
            config.attn_units,
            LinearConfig::default(),
        );
        let v = nn::linear(p / "v", config.attn_units, 1, LinearConfig::default());
        BahdanauAttention { w1, w2, v }
    }
}

impl Attention for BahdanauAttention {
    fn forward(
        &self,
        decoder_hidden_state: &Tensor,
        encoder_output: &Tensor,
        enc_padding_mask: Option<&Tensor>,
    ) -> AttentionOutput {
        let hidden_with_time_axis = decoder_hidden_state.unsqueeze(1);
        let mut score = (encoder_output.apply(&self.w1) + hidden_with_time_axis.apply(&self.w2))
            .tanh()
            .apply(&self.v);
        if let Some(mask) = enc_padding_mask {
            score = score.masked_fill(&mask.eq(0).unsqueeze(-1), f64::NEG_INFINITY);
        }
        let attention_weights = score.softmax(1, Kind::Float);
        let context_vector = (&attention_weights * encoder_output).sum_dim_intlist(
            [1].as_slice(),
            false,
            Kind::Float,
        );
        AttentionOutput {
            context_vector,
            attention_weights: attention_weights.squeeze_dim(-1),
        }
    }
}

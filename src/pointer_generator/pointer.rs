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
use tch::{nn, Tensor};

/// # Generation gate
/// `(context_vector, decoder_hidden_state, decoder_output) -> p_gen`, with `p_gen` of shape
/// (*batch size*, 1) and values in `[0, 1]`.
pub trait GenerationGate {
    fn forward(
        &self,
        context_vector: &Tensor,
        hidden_state: &Tensor,
        decoder_output: &Tensor,
    ) -> Tensor;
}

/// # Pointer gate
/// `p_gen = sigmoid(w_c · context + w_s · hidden + w_x · x_t)`
#[derive(Debug)]
pub struct Pointer {
    w_s_reduce: nn::Linear,
    w_i_reduce: nn::Linear,
    w_c_reduce: nn::Linear,
}

impl Pointer {
    pub fn new<'p, P>(p: P, config: &PgnConfig) -> Pointer
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let w_s_reduce = nn::linear(
            p / "w_s_reduce",
            config.dec_units,
            1,
            LinearConfig::default(),
        );
        let w_i_reduce = nn::linear(
            p / "w_i_reduce",
            config.enc_units + config.embed_size,
            1,
            LinearConfig::default(),
        );
        let w_c_reduce = nn::linear(
            p / "w_c_reduce",
            config.enc_units,
            1,
            LinearConfig::default(),
        );
        Pointer {
            w_s_reduce,
            w_i_reduce,
            w_c_reduce,
        }
    }
}

impl GenerationGate for Pointer {
    fn forward(
        &self,
        context_vector: &Tensor,
        hidden_state: &Tensor,
        decoder_output: &Tensor,
    ) -> Tensor {
        (hidden_state.apply(&self.w_s_reduce)
            + context_vector.apply(&self.w_c_reduce)
            + decoder_output.apply(&self.w_i_reduce))
        .sigmoid()
    }
}

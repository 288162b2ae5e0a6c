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

//! # Pointer-generator network (See et al.)
//!
//! Implementation of the pointer-generator network from [Get To The Point: Summarization with Pointer-Generator Networks](https://arxiv.org/abs/1704.04368) (See, Liu, Manning, 2017).
//! At each decoding step the model blends a distribution over a fixed vocabulary with a copy
//! distribution over the source positions, using a generation probability `p_gen`. Copied
//! probability mass is scattered onto an extended vocabulary that also covers the out-of-vocabulary
//! words of the source articles of the batch.
//!
//! The model is made of four sub-networks accessed through traits (`Encoder`, `Attention`,
//! `DecoderStep` and `GenerationGate`), with default `tch` implementations:
//! - `PgnEncoder`: embeddings and GRU encoder
//! - `BahdanauAttention`: additive attention
//! - `PgnDecoder`: single step GRU decoder with a softmax output layer
//! - `Pointer`: sigmoid generation gate
//!
//! # Model set-up and forward pass
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_pgn::data::{Batch, SummarizationExample, Vocab};
//! use rust_pgn::pointer_generator::{masked_nll_loss, PgnConfig, PointerGeneratorModel};
//! use tch::{nn, Device};
//!
//! let device = Device::cuda_if_available();
//! let vocab = Vocab::from_file("path/to/vocab", 50000)?;
//! let config = PgnConfig {
//!     vocab_size: vocab.size(),
//!     ..Default::default()
//! };
//! let vs = nn::VarStore::new(device);
//! let model = PointerGeneratorModel::new(&vs.root() / "pgn", &config)?;
//!
//! let example = SummarizationExample::new(
//!     "the quick brown fox jumps over the lazy dog",
//!     &["a fox jumps"],
//!     &vocab,
//!     400,
//!     100,
//! );
//! let batch = Batch::new(&[example], &vocab, 100, device)?;
//! let output = model
//!     .forward_t(
//!         &batch.enc_batch,
//!         Some(&batch.enc_padding_mask),
//!         &batch.extended_vocab.enc_extended_inp,
//!         &batch.dec_batch,
//!         batch.extended_vocab.max_oov,
//!     )?
//!     .into_training()?;
//! let loss = masked_nll_loss(
//!     &output.final_dists,
//!     &batch.target_batch,
//!     &batch.dec_padding_mask,
//! )?;
//! # Ok(())
//! # }
//! ```

mod attention;
mod decoder;
mod decoding;
mod encoder;
mod final_distribution;
mod loss;
mod pgn_model;
mod pointer;

pub use attention::{Attention, AttentionOutput, BahdanauAttention};
pub use decoder::{DecoderStep, DecoderStepOutput, PgnDecoder};
pub use decoding::{decode_steps, DecodeLoopOutput};
pub use encoder::{Encoder, EncoderOutput, PgnEncoder};
pub use final_distribution::calc_final_dist;
pub use loss::{masked_nll_loss, padding_mask};
pub use pgn_model::{
    InferenceOutput, Mode, PgnConfig, PgnOutput, PointerGeneratorModel, TrainingOutput,
};
pub use pointer::{GenerationGate, Pointer};

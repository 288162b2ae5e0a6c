//! Pointer-generator network for abstractive summarization, built on [tch-rs](https://github.com/LaurentMazare/tch-rs).
//!
//! The pointer-generator extends an attentional sequence-to-sequence model with a copy mechanism:
//! at each decoding step, a generation probability `p_gen` blends the distribution over a fixed
//! vocabulary with the attention distribution over the source words. Copied probability mass is
//! placed on an extended vocabulary covering the out-of-vocabulary words of the articles in the
//! batch, so that the model can produce words it never saw during vocabulary construction.
//!
//! The crate is organized as follows:
//! - `pointer_generator`: model configuration, sub-networks, decoding loop, final distribution and loss
//! - `data`: word-level vocabulary, extended vocabulary index map and batching of summarization examples
//! - `pipelines`: ready-to-use summarization with beam search decoding
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_pgn::pointer_generator::calc_final_dist;
//! use tch::Tensor;
//!
//! // one article of three words: an in-vocabulary word (id 2) and an OOV word repeated twice (extended id 7)
//! let enc_extended_inp = Tensor::from_slice(&[2i64, 7, 7]).view([1, 3]);
//! let vocab_dist = Tensor::from_slice(&[0.1f64, 0.2, 0.3, 0.2, 0.2]).view([1, 5]);
//! let attn_dist = Tensor::from_slice(&[0.5f64, 0.25, 0.25]).view([1, 3]);
//! let p_gen = Tensor::from_slice(&[0.6f64]).view([1, 1]);
//!
//! let final_dist = calc_final_dist(&enc_extended_inp, &vocab_dist, &attn_dist, &p_gen, 3)?;
//! // [0.06, 0.12, 0.38, 0.12, 0.12, 0.0, 0.0, 0.2]
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod data;
pub mod pipelines;
pub mod pointer_generator;

pub use common::error::PgnError;
pub use common::Config;

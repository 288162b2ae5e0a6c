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

//! # Final distribution of the pointer-generator
//!
//! Blends the vocabulary distribution and the copy distribution of each decoding step into a
//! single distribution over the extended vocabulary of the batch:
//!
//! `P(w) = p_gen * P_vocab(w) + (1 - p_gen) * sum_{i: x_i = w} a_i`
//!
//! The vocabulary term is zero-padded with `max_oov` columns, the copy term is obtained by
//! scatter-adding the attention weights at the extended id of their source position.
//! No renormalization is applied: rows sum to 1 when both input distributions do.
//! Rows of padding decoder positions are well-formed but meaningless and must be masked by the consumer.

use crate::PgnError;
use tch::{Kind, Tensor};

/// Computes the final distributions over the extended vocabulary.
///
/// Inputs may either describe a single step or all the steps of a decoding loop stacked along
/// the second dimension; the output has the same rank as the inputs.
///
/// # Arguments
///
/// * `enc_extended_inp` - extended id of each source position, of shape (*batch size*, *source_sequence_length*)
/// * `vocab_dists` - vocabulary distributions of shape (*batch size*, *vocab_size*) or (*batch size*, *decoder_steps*, *vocab_size*)
/// * `attn_dists` - attention distributions of shape (*batch size*, *source_sequence_length*) or (*batch size*, *decoder_steps*, *source_sequence_length*)
/// * `p_gens` - generation probabilities of shape (*batch size*, 1) or (*batch size*, *decoder_steps*, 1)
/// * `batch_oov_len` - largest number of OOV source words of a single example in the batch
///
/// # Returns
///
/// * `Tensor` of shape (*batch size*, *vocab_size + batch_oov_len*) or (*batch size*, *decoder_steps*, *vocab_size + batch_oov_len*)
///
/// # Example
///
/// ```no_run
/// # use tch::{Device, Kind, Tensor};
/// use rust_pgn::pointer_generator::calc_final_dist;
///
/// let enc_extended_inp = Tensor::from_slice(&[2i64, 7, 7]).view([1, 3]);
/// let vocab_dist = Tensor::from_slice(&[0.1f64, 0.2, 0.3, 0.2, 0.2]).view([1, 5]);
/// let attn_dist = Tensor::from_slice(&[0.5f64, 0.25, 0.25]).view([1, 3]);
/// let p_gen = Tensor::from_slice(&[0.6f64]).view([1, 1]);
///
/// let final_dist = calc_final_dist(&enc_extended_inp, &vocab_dist, &attn_dist, &p_gen, 3).unwrap();
/// assert_eq!(final_dist.size(), vec![1, 8]);
/// ```
pub fn calc_final_dist(
    enc_extended_inp: &Tensor,
    vocab_dists: &Tensor,
    attn_dists: &Tensor,
    p_gens: &Tensor,
    batch_oov_len: i64,
) -> Result<Tensor, PgnError> {
    let single_step = match vocab_dists.dim() {
        2 => true,
        3 => false,
        dim => {
            return Err(PgnError::ShapeMismatch(format!(
                "Vocabulary distributions must be of rank 2 or 3, got rank {}",
                dim
            )));
        }
    };
    let (vocab_dists, attn_dists, p_gens) = if single_step {
        (
            vocab_dists.unsqueeze(1),
            attn_dists.unsqueeze(1),
            p_gens.unsqueeze(1),
        )
    } else {
        (
            vocab_dists.shallow_clone(),
            attn_dists.shallow_clone(),
            p_gens.shallow_clone(),
        )
    };

    let (batch_size, steps, vocab_size) = vocab_dists.size3()?;
    let (extended_batch_size, attn_len) = enc_extended_inp.size2()?;
    let attn_shape = attn_dists.size();
    if attn_shape.len() != 3 || attn_shape[0] != batch_size || attn_shape[1] != steps {
        return Err(PgnError::ShapeMismatch(format!(
            "Attention distributions of shape {:?} do not match vocabulary distributions of shape {:?}",
            attn_shape,
            vocab_dists.size()
        )));
    }
    if extended_batch_size != batch_size || attn_shape[2] != attn_len {
        return Err(PgnError::ShapeMismatch(format!(
            "Source extended ids of shape {:?} do not match attention distributions of shape {:?}",
            enc_extended_inp.size(),
            attn_shape
        )));
    }
    if p_gens.size() != [batch_size, steps, 1] {
        return Err(PgnError::ShapeMismatch(format!(
            "Generation probabilities of shape {:?} do not match vocabulary distributions of shape {:?}",
            p_gens.size(),
            vocab_dists.size()
        )));
    }
    if batch_oov_len < 0 {
        return Err(PgnError::ValueError(format!(
            "Batch OOV length must be positive, got {}",
            batch_oov_len
        )));
    }

    let extended_vsize = vocab_size + batch_oov_len;
    let enc_extended_inp = enc_extended_inp.to_kind(Kind::Int64);
    if enc_extended_inp.numel() > 0 {
        let min_id = enc_extended_inp.min().int64_value(&[]);
        let max_id = enc_extended_inp.max().int64_value(&[]);
        if min_id < 0 || max_id >= extended_vsize {
            return Err(PgnError::ValueError(format!(
                "Source extended ids must be in [0, {}), got values in [{}, {}]",
                extended_vsize, min_id, max_id
            )));
        }
    }

    let kind = vocab_dists.kind();
    let device = vocab_dists.device();

    let vocab_dists = &p_gens * vocab_dists;
    let attn_dists: Tensor = (1.0 - &p_gens) * attn_dists;

    let extra_zeros = Tensor::zeros([batch_size, steps, batch_oov_len], (kind, device));
    let vocab_dists_extended = Tensor::cat(&[vocab_dists, extra_zeros], 2);

    let indices = enc_extended_inp
        .unsqueeze(1)
        .expand([batch_size, steps, attn_len], false);
    let attn_dists_projected = Tensor::zeros([batch_size, steps, extended_vsize], (kind, device))
        .f_scatter_add(2, &indices, &attn_dists.to_kind(kind))?;

    let final_dists = vocab_dists_extended + attn_dists_projected;
    Ok(if single_step {
        final_dists.squeeze_dim(1)
    } else {
        final_dists
    })
}

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

use crate::PgnError;
use tch::{Kind, Tensor};

const LOG_EPSILON: f64 = 1e-12;

/// Builds a `{0, 1}` float mask of the same shape as `targets`, with zeros at padding positions.
pub fn padding_mask(targets: &Tensor, pad_id: i64) -> Tensor {
    targets.ne(pad_id).to_kind(Kind::Float)
}

/// Negative log-likelihood of the targets under the final distributions, ignoring padding positions.
///
/// The loss of each example is averaged over its real (unmasked) positions, then averaged over the batch.
///
/// # Arguments
///
/// * `final_dists` - final distributions of shape (*batch size*, *decoder_steps*, *extended_vocab_size*)
/// * `targets` - target extended ids of shape (*batch size*, *decoder_steps*)
/// * `padding_mask` - mask of shape (*batch size*, *decoder_steps*), 0 at padding positions
///
/// # Returns
///
/// * Scalar `Tensor` holding the batch loss
pub fn masked_nll_loss(
    final_dists: &Tensor,
    targets: &Tensor,
    padding_mask: &Tensor,
) -> Result<Tensor, PgnError> {
    let (batch_size, steps, extended_vsize) = final_dists.size3()?;
    if targets.size() != [batch_size, steps] || padding_mask.size() != [batch_size, steps] {
        return Err(PgnError::ShapeMismatch(format!(
            "Targets of shape {:?} and padding mask of shape {:?} must match the first dimensions of the final distributions {:?}",
            targets.size(),
            padding_mask.size(),
            final_dists.size()
        )));
    }
    let targets = targets.to_kind(Kind::Int64);
    if targets.numel() > 0
        && (targets.min().int64_value(&[]) < 0
            || targets.max().int64_value(&[]) >= extended_vsize)
    {
        return Err(PgnError::ValueError(format!(
            "Target ids must be in [0, {}), the extended vocabulary size",
            extended_vsize
        )));
    }

    let gold_probs = final_dists
        .f_gather(2, &targets.unsqueeze(-1), false)?
        .squeeze_dim(-1);
    let losses = -(gold_probs + LOG_EPSILON).log();
    let padding_mask = padding_mask.to_kind(losses.kind());
    let example_lengths = padding_mask
        .sum_dim_intlist([1].as_slice(), false, losses.kind())
        .clamp_min(1.0);
    let example_losses = (losses * &padding_mask).sum_dim_intlist(
        [1].as_slice(),
        false,
        padding_mask.kind(),
    ) / example_lengths;
    Ok(example_losses.mean(padding_mask.kind()))
}

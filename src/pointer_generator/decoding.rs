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

use crate::pointer_generator::attention::Attention;
use crate::pointer_generator::decoder::DecoderStep;
use crate::pointer_generator::pointer::GenerationGate;
use crate::PgnError;
use log::debug;
use tch::{Device, Kind, Tensor};

/// Fixed-length buffer of shape (*batch size*, *decoder_steps*, *width*), written one step at a time.
/// The storage is allocated on the first write so that it follows the kind of the stored values.
struct StepBuffer {
    values: Option<Tensor>,
    batch_size: i64,
    steps: i64,
    width: i64,
    device: Device,
}

impl StepBuffer {
    fn new(batch_size: i64, steps: i64, width: i64, device: Device) -> StepBuffer {
        StepBuffer {
            values: None,
            batch_size,
            steps,
            width,
            device,
        }
    }

    fn write(&mut self, name: &str, step: i64, value: &Tensor) -> Result<(), PgnError> {
        let (batch_size, steps, width, device) =
            (self.batch_size, self.steps, self.width, self.device);
        if value.size() != [batch_size, width] {
            return Err(PgnError::ShapeMismatch(format!(
                "Step {} {} of shape {:?}, expected [{}, {}]",
                step,
                name,
                value.size(),
                batch_size,
                width
            )));
        }
        let values = self
            .values
            .get_or_insert_with(|| Tensor::zeros([batch_size, steps, width], (value.kind(), device)));
        let mut slot = values.select(1, step);
        slot.f_copy_(value)?;
        Ok(())
    }

    fn into_tensor(self) -> Tensor {
        match self.values {
            Some(values) => values,
            None => Tensor::zeros(
                [self.batch_size, self.steps, self.width],
                (Kind::Float, self.device),
            ),
        }
    }
}

/// Per-step outputs of a decoding loop, stacked along the second dimension
pub struct DecodeLoopOutput {
    /// Vocabulary distributions of shape (*batch size*, *decoder_steps*, *vocab_size*)
    pub vocab_dists: Tensor,
    /// Attention distributions of shape (*batch size*, *decoder_steps*, *source_sequence_length*)
    pub attention_dists: Tensor,
    /// Generation probabilities of shape (*batch size*, *decoder_steps*, 1)
    pub p_gens: Tensor,
    /// Decoder hidden state after the last step, of shape (*batch size*, *dec_units*)
    pub hidden_state: Tensor,
    /// Context vector computed from the last hidden state, of shape (*batch size*, *enc_units*)
    pub context_vector: Tensor,
}

/// Runs the teacher-forced decoding loop for exactly as many steps as `dec_inp` has columns.
///
/// The seed context vector is computed from the initial hidden state before the first step,
/// unless `initial_context` is provided. At step `t`, the decoder consumes the context vector of
/// the previous step, then attention is recomputed from the updated hidden state: the attention
/// distribution recorded for step `t` therefore comes from the hidden state produced at step `t`.
///
/// # Arguments
///
/// * `attention` - attention over the encoder outputs
/// * `decoder` - single step decoder
/// * `pointer` - generation gate
/// * `encoder_output` - encoder activations of shape (*batch size*, *source_sequence_length*, *enc_units*)
/// * `enc_padding_mask` - optional source padding mask of shape (*batch size*, *source_sequence_length*), 1.0 for real tokens
/// * `initial_hidden` - decoder hidden state before the first step, of shape (*batch size*, *dec_units*)
/// * `initial_context` - optional context vector to use for the first step instead of recomputing it
/// * `dec_inp` - decoder input tokens of shape (*batch size*, *decoder_steps*)
pub fn decode_steps<A, D, G>(
    attention: &A,
    decoder: &D,
    pointer: &G,
    encoder_output: &Tensor,
    enc_padding_mask: Option<&Tensor>,
    initial_hidden: &Tensor,
    initial_context: Option<&Tensor>,
    dec_inp: &Tensor,
) -> Result<DecodeLoopOutput, PgnError>
where
    A: Attention + ?Sized,
    D: DecoderStep + ?Sized,
    G: GenerationGate + ?Sized,
{
    let (batch_size, steps) = dec_inp.size2()?;
    let (encoder_batch_size, attn_len, _) = encoder_output.size3()?;
    if encoder_batch_size != batch_size || initial_hidden.size()[0] != batch_size {
        return Err(PgnError::ShapeMismatch(format!(
            "Decoder inputs of shape {:?}, encoder output of shape {:?} and hidden state of shape {:?} must share the batch size",
            dec_inp.size(),
            encoder_output.size(),
            initial_hidden.size()
        )));
    }
    if let Some(mask) = enc_padding_mask {
        if mask.size() != [batch_size, attn_len] {
            return Err(PgnError::ShapeMismatch(format!(
                "Encoder padding mask of shape {:?} does not match the encoder output of shape {:?}",
                mask.size(),
                encoder_output.size()
            )));
        }
    }
    let device = encoder_output.device();
    debug!(
        "decoding {} steps for a batch of {} examples over {} source positions",
        steps, batch_size, attn_len
    );

    let mut context_vector = match initial_context {
        Some(context) => context.shallow_clone(),
        None => {
            attention
                .forward(initial_hidden, encoder_output, enc_padding_mask)
                .context_vector
        }
    };
    let mut hidden_state = initial_hidden.shallow_clone();

    let mut vocab_dists = StepBuffer::new(batch_size, steps, decoder.vocab_size(), device);
    let mut attention_dists = StepBuffer::new(batch_size, steps, attn_len, device);
    let mut p_gens = StepBuffer::new(batch_size, steps, 1, device);

    for t in 0..steps {
        let input_token = dec_inp.narrow(1, t, 1);
        let step_output =
            decoder.forward(&input_token, &hidden_state, encoder_output, &context_vector);
        let attention_output =
            attention.forward(&step_output.hidden_state, encoder_output, enc_padding_mask);
        let p_gen = pointer.forward(
            &attention_output.context_vector,
            &step_output.hidden_state,
            &step_output.decoder_output,
        );

        vocab_dists.write("vocabulary distribution", t, &step_output.vocab_distribution)?;
        attention_dists.write("attention distribution", t, &attention_output.attention_weights)?;
        p_gens.write("generation probability", t, &p_gen)?;

        hidden_state = step_output.hidden_state;
        context_vector = attention_output.context_vector;
    }

    Ok(DecodeLoopOutput {
        vocab_dists: vocab_dists.into_tensor(),
        attention_dists: attention_dists.into_tensor(),
        p_gens: p_gens.into_tensor(),
        hidden_state,
        context_vector,
    })
}

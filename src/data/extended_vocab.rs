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

//! # Extended vocabulary bookkeeping
//!
//! Source words missing from the fixed vocabulary receive batch-local ids `V + rank`, where `rank`
//! is the order of first appearance of the word in its own article. The ids are only meaningful
//! together with the OOV list of the article they were built from.

use crate::data::vocab::Vocab;
use crate::PgnError;
use tch::{Device, Kind, Tensor};

/// Maps article words to extended ids.
///
/// # Returns
///
/// * `ids` - one extended id per word: the vocabulary id for known words, `V + rank` for OOV words
/// * `oovs` - the distinct OOV words in order of first appearance (`oovs[rank]`)
pub fn article_to_ids<S: AsRef<str>>(article_words: &[S], vocab: &Vocab) -> (Vec<i64>, Vec<String>) {
    let mut ids = Vec::with_capacity(article_words.len());
    let mut oovs: Vec<String> = Vec::new();
    let unk_id = vocab.unk_id();
    for word in article_words {
        let word = word.as_ref();
        let id = vocab.word_to_id(word);
        if id == unk_id {
            let rank = match oovs.iter().position(|oov| oov == word) {
                Some(rank) => rank,
                None => {
                    oovs.push(word.to_string());
                    oovs.len() - 1
                }
            };
            ids.push(vocab.size() + rank as i64);
        } else {
            ids.push(id);
        }
    }
    (ids, oovs)
}

/// Maps abstract words to extended ids. OOV words that also appear in the article are given their
/// article extended id, other OOV words are mapped to `[UNK]`.
pub fn abstract_to_ids<S: AsRef<str>>(
    abstract_words: &[S],
    vocab: &Vocab,
    article_oovs: &[String],
) -> Vec<i64> {
    let unk_id = vocab.unk_id();
    abstract_words
        .iter()
        .map(|word| {
            let word = word.as_ref();
            let id = vocab.word_to_id(word);
            if id == unk_id {
                match article_oovs.iter().position(|oov| oov == word) {
                    Some(rank) => vocab.size() + rank as i64,
                    None => unk_id,
                }
            } else {
                id
            }
        })
        .collect()
}

/// Maps extended ids back to words, using the article OOV list for ids beyond the vocabulary.
pub fn output_ids_to_words(
    ids: &[i64],
    vocab: &Vocab,
    article_oovs: &[String],
) -> Result<Vec<String>, PgnError> {
    ids.iter()
        .map(|&id| {
            if id < vocab.size() {
                Ok(vocab.id_to_word(id)?.to_string())
            } else {
                let rank = (id - vocab.size()) as usize;
                article_oovs.get(rank).cloned().ok_or_else(|| {
                    PgnError::ValueError(format!(
                        "Model produced word id {} which corresponds to article OOV {}, but this example only has {} article OOVs",
                        id,
                        rank,
                        article_oovs.len()
                    ))
                })
            }
        })
        .collect()
}

/// # Per-batch extended vocabulary index map
/// Holds, for every example of a batch, the extended id of each source position (the scatter
/// target of the copy distribution) together with the OOV words behind the synthetic ids.
#[derive(Debug)]
pub struct ExtendedVocabIndex {
    /// Extended ids of shape (*batch size*, *source_sequence_length*)
    pub enc_extended_inp: Tensor,
    /// OOV words of each example, indexed by `extended_id - vocab_size`
    pub article_oovs: Vec<Vec<String>>,
    /// Largest number of OOV words of a single example in the batch
    pub max_oov: i64,
    /// Size of the fixed vocabulary
    pub vocab_size: i64,
}

impl ExtendedVocabIndex {
    /// Builds the index map from per-example extended id sequences. Sequences shorter than the
    /// longest one are right-padded with `pad_id`.
    ///
    /// # Arguments
    ///
    /// * `extended_ids` - extended ids of each example, as produced by `article_to_ids`
    /// * `article_oovs` - OOV list of each example
    /// * `vocab_size` - size of the fixed vocabulary
    /// * `pad_id` - in-vocabulary id used for padding positions
    /// * `device` - device of the resulting tensor
    pub fn new(
        extended_ids: &[Vec<i64>],
        article_oovs: Vec<Vec<String>>,
        vocab_size: i64,
        pad_id: i64,
        device: Device,
    ) -> Result<ExtendedVocabIndex, PgnError> {
        if extended_ids.len() != article_oovs.len() {
            return Err(PgnError::ShapeMismatch(format!(
                "Got {} extended id sequences for {} OOV lists",
                extended_ids.len(),
                article_oovs.len()
            )));
        }
        let max_oov = article_oovs
            .iter()
            .map(|oovs| oovs.len() as i64)
            .max()
            .unwrap_or(0);
        for (ids, oovs) in extended_ids.iter().zip(article_oovs.iter()) {
            if let Some(&id) = ids
                .iter()
                .find(|&&id| id < 0 || id >= vocab_size + oovs.len() as i64)
            {
                return Err(PgnError::ValueError(format!(
                    "Extended id {} outside of the example extended vocabulary (size {})",
                    id,
                    vocab_size + oovs.len() as i64
                )));
            }
        }
        let enc_extended_inp = pad_sequences(extended_ids, None, pad_id).to(device);
        Ok(ExtendedVocabIndex {
            enc_extended_inp,
            article_oovs,
            max_oov,
            vocab_size,
        })
    }

    /// Width of the final distributions built with this index map (`V + max_oov`)
    pub fn extended_vocab_size(&self) -> i64 {
        self.vocab_size + self.max_oov
    }

    /// Number of examples in the batch
    pub fn batch_size(&self) -> i64 {
        self.article_oovs.len() as i64
    }
}

/// Right-pads integer sequences with `pad_id` to `length` (defaults to the longest sequence) and
/// stacks them into a tensor of shape (*number of sequences*, *length*).
pub(crate) fn pad_sequences(sequences: &[Vec<i64>], length: Option<usize>, pad_id: i64) -> Tensor {
    let max_len = length.unwrap_or_else(|| sequences.iter().map(Vec::len).max().unwrap_or(0));
    let mut flat = Vec::with_capacity(sequences.len() * max_len);
    for sequence in sequences {
        flat.extend(sequence.iter().take(max_len));
        flat.extend(std::iter::repeat(pad_id).take(max_len.saturating_sub(sequence.len())));
    }
    Tensor::from_slice(&flat)
        .to_kind(Kind::Int64)
        .view([sequences.len() as i64, max_len as i64])
}

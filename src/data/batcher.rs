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

use crate::data::extended_vocab::{
    abstract_to_ids, article_to_ids, pad_sequences, ExtendedVocabIndex,
};
use crate::data::vocab::{Vocab, SENTENCE_END, SENTENCE_START};
use crate::PgnError;
use log::debug;
use tch::{Device, Kind, Tensor};

/// Splits an abstract made of `<s> ... </s>` delimited sentences into its sentences.
/// Text outside of sentence tags is ignored, as is an unterminated trailing sentence.
pub fn abstract_to_sentences(abstract_text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut cursor = 0;
    while let Some(start) = abstract_text[cursor..].find(SENTENCE_START) {
        let sentence_start = cursor + start + SENTENCE_START.len();
        match abstract_text[sentence_start..].find(SENTENCE_END) {
            Some(end) => {
                sentences.push(
                    abstract_text[sentence_start..sentence_start + end]
                        .trim()
                        .to_string(),
                );
                cursor = sentence_start + end + SENTENCE_END.len();
            }
            None => break,
        }
    }
    sentences
}

/// Builds the teacher-forced decoder input (`[START] + sequence`) and target
/// (`sequence + [STOP]`), truncated to `max_len`. A truncated target has no `[STOP]` token.
fn decoder_input_and_target(
    sequence: &[i64],
    max_len: usize,
    start_id: i64,
    stop_id: i64,
) -> (Vec<i64>, Vec<i64>) {
    let mut input = Vec::with_capacity(sequence.len() + 1);
    input.push(start_id);
    input.extend_from_slice(sequence);
    let mut target = sequence.to_vec();
    if input.len() > max_len {
        input.truncate(max_len);
        target.truncate(max_len);
    } else {
        target.push(stop_id);
    }
    (input, target)
}

/// # Single summarization example
/// Article and abstract converted to model ids. The article is truncated to `max_enc_steps`
/// words, the decoder input and target to `max_dec_steps`.
#[derive(Debug, Clone)]
pub struct SummarizationExample {
    /// Article ids, OOV words mapped to `[UNK]`
    pub enc_input: Vec<i64>,
    /// Article extended ids, OOV words mapped to `V + rank`
    pub enc_input_extended: Vec<i64>,
    /// Article OOV words, in order of first appearance
    pub article_oovs: Vec<String>,
    /// Decoder input ids (`[START]` + abstract), OOV words mapped to `[UNK]`
    pub dec_input: Vec<i64>,
    /// Target extended ids (abstract + `[STOP]`), article OOV words mapped to their extended id
    pub target: Vec<i64>,
    /// Original article text
    pub original_article: String,
    /// Original abstract sentences
    pub original_abstract_sentences: Vec<String>,
}

impl SummarizationExample {
    /// Creates a new example from whitespace-tokenized text.
    ///
    /// # Arguments
    ///
    /// * `article` - article text, tokens separated by whitespace
    /// * `abstract_sentences` - reference summary sentences (can be empty at inference time)
    /// * `vocab` - fixed vocabulary
    /// * `max_enc_steps` - maximum number of article tokens kept
    /// * `max_dec_steps` - maximum decoder sequence length
    pub fn new<S: AsRef<str>>(
        article: &str,
        abstract_sentences: &[S],
        vocab: &Vocab,
        max_enc_steps: usize,
        max_dec_steps: usize,
    ) -> SummarizationExample {
        let article_words: Vec<&str> = article.split_whitespace().take(max_enc_steps).collect();
        let enc_input = article_words
            .iter()
            .map(|word| vocab.word_to_id(word))
            .collect();
        let (enc_input_extended, article_oovs) = article_to_ids(&article_words, vocab);

        let original_abstract_sentences: Vec<String> = abstract_sentences
            .iter()
            .map(|sentence| sentence.as_ref().to_string())
            .collect();
        let abstract_text = original_abstract_sentences.join(" ");
        let abstract_words: Vec<&str> = abstract_text.split_whitespace().collect();
        let abstract_ids: Vec<i64> = abstract_words
            .iter()
            .map(|word| vocab.word_to_id(word))
            .collect();
        let abstract_extended_ids = abstract_to_ids(&abstract_words, vocab, &article_oovs);

        let (dec_input, _) = decoder_input_and_target(
            &abstract_ids,
            max_dec_steps,
            vocab.start_id(),
            vocab.stop_id(),
        );
        let (_, target) = decoder_input_and_target(
            &abstract_extended_ids,
            max_dec_steps,
            vocab.start_id(),
            vocab.stop_id(),
        );

        SummarizationExample {
            enc_input,
            enc_input_extended,
            article_oovs,
            dec_input,
            target,
            original_article: article.to_string(),
            original_abstract_sentences,
        }
    }
}

/// # Batch of summarization examples
/// Padded tensors ready to be fed to `PointerGeneratorModel::forward_t`, along with the
/// extended vocabulary index map of the batch.
#[derive(Debug)]
pub struct Batch {
    /// Encoder inputs of shape (*batch size*, *source_sequence_length*), padded with `[PAD]`
    pub enc_batch: Tensor,
    /// Encoder padding mask of shape (*batch size*, *source_sequence_length*), 1.0 for real tokens.
    /// Passed to `PointerGeneratorModel::forward_t` so that attention skips padded positions.
    pub enc_padding_mask: Tensor,
    /// Extended vocabulary index map (`enc_extended_inp`, per-example OOV words and `max_oov`)
    pub extended_vocab: ExtendedVocabIndex,
    /// Decoder inputs of shape (*batch size*, *max_dec_steps*), padded with `[PAD]`
    pub dec_batch: Tensor,
    /// Decoder targets (extended ids) of shape (*batch size*, *max_dec_steps*), padded with `[PAD]`
    pub target_batch: Tensor,
    /// Decoder padding mask of shape (*batch size*, *max_dec_steps*), 1.0 for real tokens
    pub dec_padding_mask: Tensor,
    /// Original article texts
    pub original_articles: Vec<String>,
    /// Original abstract sentences
    pub original_abstracts_sentences: Vec<Vec<String>>,
}

impl Batch {
    /// Pads and stacks a set of examples.
    ///
    /// # Arguments
    ///
    /// * `examples` - examples to batch together
    /// * `vocab` - fixed vocabulary the examples were built with
    /// * `max_dec_steps` - decoder sequence length after padding
    /// * `device` - device of the batch tensors
    pub fn new(
        examples: &[SummarizationExample],
        vocab: &Vocab,
        max_dec_steps: usize,
        device: Device,
    ) -> Result<Batch, PgnError> {
        if examples.is_empty() {
            return Err(PgnError::ValueError(
                "Cannot build a batch without examples".to_string(),
            ));
        }
        let pad_id = vocab.pad_id();

        let enc_inputs: Vec<Vec<i64>> = examples.iter().map(|ex| ex.enc_input.clone()).collect();
        let enc_batch = pad_sequences(&enc_inputs, None, pad_id).to(device);
        let enc_padding_mask = enc_batch.ne(pad_id).to_kind(Kind::Float);

        let extended_ids: Vec<Vec<i64>> = examples
            .iter()
            .map(|ex| ex.enc_input_extended.clone())
            .collect();
        let article_oovs = examples.iter().map(|ex| ex.article_oovs.clone()).collect();
        let extended_vocab =
            ExtendedVocabIndex::new(&extended_ids, article_oovs, vocab.size(), pad_id, device)?;

        let dec_inputs: Vec<Vec<i64>> = examples.iter().map(|ex| ex.dec_input.clone()).collect();
        let targets: Vec<Vec<i64>> = examples.iter().map(|ex| ex.target.clone()).collect();
        let dec_batch = pad_sequences(&dec_inputs, Some(max_dec_steps), pad_id).to(device);
        let target_batch = pad_sequences(&targets, Some(max_dec_steps), pad_id).to(device);
        let dec_lengths: Vec<i64> = targets
            .iter()
            .map(|target| target.len().min(max_dec_steps) as i64)
            .collect();
        let dec_padding_mask = Tensor::arange(max_dec_steps as i64, (Kind::Int64, device))
            .unsqueeze(0)
            .lt_tensor(&Tensor::from_slice(&dec_lengths).to(device).unsqueeze(1))
            .to_kind(Kind::Float);

        debug!(
            "built batch of {} examples: source length {}, max OOV {}",
            examples.len(),
            enc_batch.size()[1],
            extended_vocab.max_oov
        );

        Ok(Batch {
            enc_batch,
            enc_padding_mask,
            extended_vocab,
            dec_batch,
            target_batch,
            dec_padding_mask,
            original_articles: examples
                .iter()
                .map(|ex| ex.original_article.clone())
                .collect(),
            original_abstracts_sentences: examples
                .iter()
                .map(|ex| ex.original_abstract_sentences.clone())
                .collect(),
        })
    }

    pub fn batch_size(&self) -> i64 {
        self.enc_batch.size()[0]
    }
}

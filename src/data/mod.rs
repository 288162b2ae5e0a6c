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

//! # Vocabulary, OOV tracking and batching
//!
//! Converts whitespace-tokenized articles and abstracts to the id sequences consumed by the
//! pointer-generator model. Article words outside of the fixed vocabulary receive extended ids
//! so that the model can copy them (see `ExtendedVocabIndex`).

mod batcher;
mod extended_vocab;
mod vocab;

pub use batcher::{abstract_to_sentences, Batch, SummarizationExample};
pub use extended_vocab::{
    abstract_to_ids, article_to_ids, output_ids_to_words, ExtendedVocabIndex,
};
pub use vocab::{
    Vocab, PAD_TOKEN, SENTENCE_END, SENTENCE_START, START_DECODING, STOP_DECODING, UNKNOWN_TOKEN,
};

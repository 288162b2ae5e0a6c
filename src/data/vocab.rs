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
use log::warn;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Out-of-vocabulary placeholder, also fed to the decoder in place of copied words
pub const UNKNOWN_TOKEN: &str = "[UNK]";
/// Padding token for encoder and decoder inputs and targets
pub const PAD_TOKEN: &str = "[PAD]";
/// First token of every decoder input sequence
pub const START_DECODING: &str = "[START]";
/// Last token of every (non-truncated) target sequence
pub const STOP_DECODING: &str = "[STOP]";
/// Opening sentence tag found in abstracts
pub const SENTENCE_START: &str = "<s>";
/// Closing sentence tag found in abstracts
pub const SENTENCE_END: &str = "</s>";

const RESERVED_TOKENS: [&str; 4] = [UNKNOWN_TOKEN, PAD_TOKEN, START_DECODING, STOP_DECODING];

/// # Word-level vocabulary
/// Fixed mapping between words and ids `0..V-1`. The four reserved tokens always occupy the
/// first ids (`[UNK]`, `[PAD]`, `[START]`, `[STOP]`), followed by the words in file order.
#[derive(Debug, Clone)]
pub struct Vocab {
    word_to_id: HashMap<String, i64>,
    id_to_word: Vec<String>,
}

impl Vocab {
    /// Reads a vocabulary file made of one `<word> <count>` pair per line, sorted by
    /// decreasing frequency.
    ///
    /// # Arguments
    ///
    /// * `path` - path to the vocabulary file
    /// * `max_size` - maximum number of words (reserved tokens included) to keep. `0` keeps every word.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_pgn::data::Vocab;
    ///
    /// let vocab = Vocab::from_file("path/to/vocab", 50000).unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P, max_size: usize) -> Result<Vocab, PgnError> {
        let f = File::open(path)?;
        let br = BufReader::new(f);
        let mut words = Vec::new();
        for line in br.lines() {
            if Vocab::is_full(RESERVED_TOKENS.len() + words.len(), max_size) {
                Vocab::warn_truncation(max_size);
                break;
            }
            let line = line?;
            let pieces: Vec<&str> = line.split_whitespace().collect();
            if pieces.len() != 2 {
                warn!("incorrectly formatted line in vocabulary file: {:?}", line);
                continue;
            }
            words.push(pieces[0].to_string());
        }
        Vocab::from_words(words, max_size)
    }

    /// Builds a vocabulary from an ordered list of words.
    ///
    /// Reserved tokens and sentence tags are not allowed in `words` and duplicates are rejected.
    pub fn from_words<I, S>(words: I, max_size: usize) -> Result<Vocab, PgnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Vocab {
            word_to_id: HashMap::new(),
            id_to_word: Vec::new(),
        };
        for token in RESERVED_TOKENS.iter() {
            vocab.push(token.to_string());
        }

        for word in words {
            if Vocab::is_full(vocab.id_to_word.len(), max_size) {
                Vocab::warn_truncation(max_size);
                break;
            }
            let word = word.into();
            if word == SENTENCE_START
                || word == SENTENCE_END
                || RESERVED_TOKENS.contains(&word.as_str())
            {
                return Err(PgnError::InvalidVocabulary(format!(
                    "{}, {}, {}, {}, {} and {} shouldn't be in the vocab file, but {} is",
                    SENTENCE_START,
                    SENTENCE_END,
                    UNKNOWN_TOKEN,
                    PAD_TOKEN,
                    START_DECODING,
                    STOP_DECODING,
                    word
                )));
            }
            if vocab.word_to_id.contains_key(&word) {
                return Err(PgnError::InvalidVocabulary(format!(
                    "Duplicated word in vocabulary file: {}",
                    word
                )));
            }
            vocab.push(word);
        }
        Ok(vocab)
    }

    fn is_full(num_words: usize, max_size: usize) -> bool {
        max_size != 0 && num_words >= max_size
    }

    fn warn_truncation(max_size: usize) {
        warn!(
            "max_size of vocab was specified as {}; we now have {} words. Stopping reading.",
            max_size, max_size
        );
    }

    fn push(&mut self, word: String) {
        self.word_to_id
            .insert(word.clone(), self.id_to_word.len() as i64);
        self.id_to_word.push(word);
    }

    /// Id of `word`, or the id of `[UNK]` if the word is out of vocabulary.
    pub fn word_to_id(&self, word: &str) -> i64 {
        match self.word_to_id.get(word) {
            Some(id) => *id,
            None => self.unk_id(),
        }
    }

    /// Returns `true` if `word` has an in-vocabulary id.
    pub fn contains(&self, word: &str) -> bool {
        self.word_to_id.contains_key(word)
    }

    pub fn id_to_word(&self, id: i64) -> Result<&str, PgnError> {
        if id < 0 || id >= self.size() {
            return Err(PgnError::ValueError(format!(
                "Id not found in vocab: {}",
                id
            )));
        }
        Ok(self.id_to_word[id as usize].as_str())
    }

    /// Number of words in the vocabulary, reserved tokens included (`V`)
    pub fn size(&self) -> i64 {
        self.id_to_word.len() as i64
    }

    pub fn unk_id(&self) -> i64 {
        self.word_to_id[UNKNOWN_TOKEN]
    }

    pub fn pad_id(&self) -> i64 {
        self.word_to_id[PAD_TOKEN]
    }

    pub fn start_id(&self) -> i64 {
        self.word_to_id[START_DECODING]
    }

    pub fn stop_id(&self) -> i64 {
        self.word_to_id[STOP_DECODING]
    }
}

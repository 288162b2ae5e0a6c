use rust_pgn::data::{
    abstract_to_ids, abstract_to_sentences, article_to_ids, output_ids_to_words, Batch,
    ExtendedVocabIndex, SummarizationExample, Vocab, PAD_TOKEN, STOP_DECODING,
};
use rust_pgn::PgnError;
use std::io::Write;
use tch::{Device, Kind, Tensor};

fn test_vocab() -> anyhow::Result<Vocab> {
    Ok(Vocab::from_words(
        vec!["the", "a", "fox", "dog", "jumps", "over", "quick", "."],
        0,
    )?)
}

fn to_vec_i64(tensor: &Tensor) -> Vec<i64> {
    let tensor = tensor.flatten(0, -1);
    (0..tensor.size()[0])
        .map(|i| tensor.int64_value(&[i]))
        .collect()
}

#[test]
fn vocab_from_file() -> anyhow::Result<()> {
    let mut vocab_file = tempfile::NamedTempFile::new()?;
    writeln!(vocab_file, "the 1061396")?;
    writeln!(vocab_file, ", 1002330")?;
    writeln!(vocab_file, "malformed line here")?;
    writeln!(vocab_file, "fox 5000")?;
    writeln!(vocab_file, "dog 4000")?;

    let vocab = Vocab::from_file(vocab_file.path(), 0)?;
    assert_eq!(vocab.size(), 8);
    assert_eq!(vocab.word_to_id("the"), 4);
    assert_eq!(vocab.word_to_id("fox"), 6);
    assert_eq!(vocab.word_to_id("here"), vocab.unk_id());
    assert_eq!(vocab.id_to_word(5)?, ",");
    assert!(vocab.id_to_word(8).is_err());
    assert_eq!(vocab.id_to_word(vocab.pad_id())?, PAD_TOKEN);
    assert_eq!(vocab.id_to_word(vocab.stop_id())?, STOP_DECODING);

    let truncated = Vocab::from_file(vocab_file.path(), 5)?;
    assert_eq!(truncated.size(), 5);
    assert!(truncated.contains("the"));
    assert!(!truncated.contains(","));
    Ok(())
}

#[test]
fn vocab_stops_reading_once_full() -> anyhow::Result<()> {
    let mut vocab_file = tempfile::NamedTempFile::new()?;
    writeln!(vocab_file, "the 1061396")?;
    writeln!(vocab_file, "fox 5000")?;
    writeln!(vocab_file, "the 4000")?;
    writeln!(vocab_file, "<s> 3000")?;

    let vocab = Vocab::from_file(vocab_file.path(), 6)?;
    assert_eq!(vocab.size(), 6);
    assert!(vocab.contains("fox"));
    assert!(Vocab::from_file(vocab_file.path(), 0).is_err());

    let vocab = Vocab::from_words(vec!["the", "fox", "[PAD]", "fox"], 6)?;
    assert_eq!(vocab.size(), 6);
    let reserved_only = Vocab::from_words(vec!["the", "fox"], 4)?;
    assert_eq!(reserved_only.size(), 4);
    assert!(!reserved_only.contains("the"));
    Ok(())
}

#[test]
fn vocab_rejects_reserved_and_duplicated_words() {
    assert!(matches!(
        Vocab::from_words(vec!["the", "[PAD]"], 0),
        Err(PgnError::InvalidVocabulary(_))
    ));
    assert!(matches!(
        Vocab::from_words(vec!["the", "<s>"], 0),
        Err(PgnError::InvalidVocabulary(_))
    ));
    assert!(matches!(
        Vocab::from_words(vec!["the", "fox", "the"], 0),
        Err(PgnError::InvalidVocabulary(_))
    ));
}

#[test]
fn article_and_abstract_extended_ids() -> anyhow::Result<()> {
    let vocab = test_vocab()?;
    let article = ["the", "zorblat", "fox", "quux", "zorblat", "."];

    let (ids, oovs) = article_to_ids(&article, &vocab);
    assert_eq!(ids, vec![4, 12, 6, 13, 12, 11]);
    assert_eq!(oovs, vec!["zorblat".to_string(), "quux".to_string()]);

    let abstract_ids = abstract_to_ids(&["quux", "jumps", "unseen", "zorblat"], &vocab, &oovs);
    assert_eq!(abstract_ids, vec![13, 8, vocab.unk_id(), 12]);

    let words = output_ids_to_words(&[4, 13, 6], &vocab, &oovs)?;
    assert_eq!(words, vec!["the", "quux", "fox"]);
    assert!(output_ids_to_words(&[14], &vocab, &oovs).is_err());
    Ok(())
}

#[test]
fn abstract_sentences_extraction() {
    let sentences = abstract_to_sentences("<s> a fox jumps . </s> <s> the dog sleeps . </s> <s> cut");
    assert_eq!(sentences, vec!["a fox jumps .", "the dog sleeps ."]);
    assert!(abstract_to_sentences("no tags").is_empty());
}

#[test]
fn summarization_example_truncation() -> anyhow::Result<()> {
    let vocab = test_vocab()?;

    let example = SummarizationExample::new(
        "the quick zorblat jumps over the dog",
        &["a zorblat jumps ."],
        &vocab,
        4,
        10,
    );
    assert_eq!(example.enc_input, vec![4, 10, 0, 8]);
    assert_eq!(example.enc_input_extended, vec![4, 10, 12, 8]);
    assert_eq!(example.article_oovs, vec!["zorblat".to_string()]);
    assert_eq!(example.dec_input, vec![2, 5, 0, 8, 11]);
    assert_eq!(example.target, vec![5, 12, 8, 11, 3]);

    let truncated = SummarizationExample::new(
        "the quick fox",
        &["a fox jumps .", "the dog"],
        &vocab,
        400,
        3,
    );
    assert_eq!(truncated.dec_input, vec![2, 5, 6]);
    assert_eq!(truncated.target, vec![5, 6, 8]);
    Ok(())
}

#[test]
fn batch_padding_and_masks() -> anyhow::Result<()> {
    let vocab = test_vocab()?;
    let examples = vec![
        SummarizationExample::new("the zorblat fox quux", &["quux jumps"], &vocab, 400, 5),
        SummarizationExample::new("a dog", &["a dog"], &vocab, 400, 5),
    ];

    let batch = Batch::new(&examples, &vocab, 5, Device::Cpu)?;

    assert_eq!(batch.batch_size(), 2);
    assert_eq!(batch.enc_batch.size(), vec![2, 4]);
    assert_eq!(to_vec_i64(&batch.enc_batch), vec![4, 0, 6, 0, 5, 7, 1, 1]);
    assert_eq!(
        to_vec_i64(&batch.extended_vocab.enc_extended_inp),
        vec![4, 12, 6, 13, 5, 7, 1, 1]
    );
    assert_eq!(batch.extended_vocab.max_oov, 2);
    assert_eq!(batch.extended_vocab.extended_vocab_size(), 14);
    assert_eq!(
        to_vec_i64(&batch.enc_padding_mask.to_kind(Kind::Int64)),
        vec![1, 1, 1, 1, 1, 1, 0, 0]
    );
    assert_eq!(batch.dec_batch.size(), vec![2, 5]);
    assert_eq!(
        to_vec_i64(&batch.target_batch),
        vec![13, 8, 3, 1, 1, 5, 7, 3, 1, 1]
    );
    assert_eq!(
        to_vec_i64(&batch.dec_padding_mask.to_kind(Kind::Int64)),
        vec![1, 1, 1, 0, 0, 1, 1, 1, 0, 0]
    );
    assert!(Batch::new(&[], &vocab, 5, Device::Cpu).is_err());
    Ok(())
}

#[test]
fn extended_vocab_index_rejects_ids_beyond_example_oovs() -> anyhow::Result<()> {
    let result = ExtendedVocabIndex::new(
        &[vec![1, 2, 11], vec![3, 10]],
        vec![vec!["zorblat".to_string()], vec!["quux".to_string()]],
        10,
        1,
        Device::Cpu,
    );
    assert!(matches!(result, Err(PgnError::ValueError(_))));

    let index = ExtendedVocabIndex::new(
        &[vec![1, 2, 10], vec![3]],
        vec![vec!["zorblat".to_string()], vec![]],
        10,
        1,
        Device::Cpu,
    )?;
    assert_eq!(index.max_oov, 1);
    assert_eq!(index.batch_size(), 2);
    assert_eq!(to_vec_i64(&index.enc_extended_inp), vec![1, 2, 10, 3, 1, 1]);
    Ok(())
}

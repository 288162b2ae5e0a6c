use rust_pgn::data::{SummarizationExample, Vocab, START_DECODING, STOP_DECODING};
use rust_pgn::pipelines::summarization::{beam_search, SummarizationConfig, SummarizationModel};
use rust_pgn::pointer_generator::{Mode, PgnConfig, PointerGeneratorModel};
use rust_pgn::PgnError;
use tch::{nn, Device, Tensor};

fn test_vocab() -> anyhow::Result<Vocab> {
    Ok(Vocab::from_words(
        vec![
            "the", "a", "fox", "dog", "jumps", "over", "quick", "lazy", "brown", ".",
        ],
        0,
    )?)
}

fn pgn_config(vocab: &Vocab, mode: Mode) -> PgnConfig {
    PgnConfig {
        vocab_size: vocab.size(),
        embed_size: 8,
        enc_units: 16,
        dec_units: 16,
        attn_units: 8,
        batch_size: 1,
        mode,
    }
}

fn beam_config() -> SummarizationConfig {
    SummarizationConfig {
        beam_size: 3,
        min_dec_steps: 0,
        max_dec_steps: 6,
        max_enc_steps: 50,
        device: Device::Cpu,
    }
}

#[test]
fn beam_search_single_article() -> anyhow::Result<()> {
    tch::manual_seed(11);
    let vocab = test_vocab()?;
    let vs = nn::VarStore::new(Device::Cpu);
    let model = PointerGeneratorModel::new(&vs.root(), &pgn_config(&vocab, Mode::Test))?;
    let example = SummarizationExample::new(
        "the quick brown zorblat jumps over the lazy quux .",
        &["a zorblat jumps ."],
        &vocab,
        50,
        6,
    );
    let source_length = example.enc_input.len() as i64;
    let enc_inp = Tensor::from_slice(&example.enc_input).view([1, source_length]);
    let enc_extended_inp = Tensor::from_slice(&example.enc_input_extended).view([1, source_length]);

    let summary = beam_search(
        &model,
        &enc_inp,
        &enc_extended_inp,
        &example.article_oovs,
        &vocab,
        &beam_config(),
    )?;

    assert!(summary.token_ids.len() <= 6);
    assert_eq!(summary.words.len(), summary.token_ids.len());
    assert!(!summary.p_gens.is_empty() && summary.p_gens.len() <= 6);
    assert!(summary.p_gens.iter().all(|p_gen| (0.0..=1.0).contains(p_gen)));
    assert!(summary.avg_log_prob.is_finite() && summary.avg_log_prob <= 0.0);
    assert!(summary
        .words
        .iter()
        .all(|word| word != START_DECODING && word != STOP_DECODING));
    assert!(summary
        .token_ids
        .iter()
        .all(|&id| id < vocab.size() + example.article_oovs.len() as i64));
    assert_eq!(summary.text, summary.words.join(" "));
    Ok(())
}

#[test]
fn beam_search_rejects_batched_inputs() -> anyhow::Result<()> {
    let vocab = test_vocab()?;
    let vs = nn::VarStore::new(Device::Cpu);
    let model = PointerGeneratorModel::new(&vs.root(), &pgn_config(&vocab, Mode::Test))?;
    let enc_inp = Tensor::from_slice(&[4i64, 5, 6, 7]).view([2, 2]);

    let result = beam_search(&model, &enc_inp, &enc_inp, &[], &vocab, &beam_config());

    assert!(matches!(result, Err(PgnError::ShapeMismatch(_))));
    Ok(())
}

#[test]
fn summarization_model_summarizes_each_article() -> anyhow::Result<()> {
    tch::manual_seed(5);
    let vocab = test_vocab()?;
    let config = pgn_config(&vocab, Mode::Eval);
    let model = SummarizationModel::new(&config, vocab, None, beam_config())?;

    let summaries = model.summarize(&[
        "the quick brown fox jumps over the lazy dog .",
        "a zorblat jumps over a quux",
    ])?;

    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|summary| summary.token_ids.len() <= 6));
    Ok(())
}

#[test]
fn summarization_model_requires_inference_mode() -> anyhow::Result<()> {
    let vocab = test_vocab()?;
    let config = pgn_config(&vocab, Mode::Train);

    let result = SummarizationModel::new(&config, vocab, None, beam_config());

    assert!(matches!(
        result,
        Err(PgnError::InvalidConfigurationError(_))
    ));
    Ok(())
}

use rust_pgn::pointer_generator::calc_final_dist;
use rust_pgn::PgnError;
use tch::{Device, Kind, Tensor};

fn to_vec(tensor: &Tensor) -> Vec<f64> {
    let tensor = tensor.flatten(0, -1);
    (0..tensor.size()[0])
        .map(|i| tensor.double_value(&[i]))
        .collect()
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected);
    }
}

#[test]
fn final_dist_single_article() -> anyhow::Result<()> {
    let enc_extended_inp = Tensor::from_slice(&[2i64, 7, 7]).view([1, 3]);
    let vocab_dist = Tensor::from_slice(&[0.1f64, 0.2, 0.3, 0.2, 0.2]).view([1, 5]);
    let attn_dist = Tensor::from_slice(&[0.5f64, 0.25, 0.25]).view([1, 3]);
    let p_gen = Tensor::from_slice(&[0.6f64]).view([1, 1]);

    let final_dist = calc_final_dist(&enc_extended_inp, &vocab_dist, &attn_dist, &p_gen, 3)?;

    assert_eq!(final_dist.size(), vec![1, 8]);
    assert_close(
        &to_vec(&final_dist),
        &[0.06, 0.12, 0.38, 0.12, 0.12, 0.0, 0.0, 0.2],
    );
    assert!((final_dist.sum(Kind::Double).double_value(&[]) - 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn final_dist_accumulates_aliased_positions() -> anyhow::Result<()> {
    let enc_extended_inp = Tensor::from_slice(&[4i64, 4]).view([1, 2]);
    let vocab_dist = Tensor::from_slice(&[0.25f64, 0.25, 0.25, 0.25]).view([1, 4]);
    let attn_dist = Tensor::from_slice(&[0.3f64, 0.7]).view([1, 2]);
    let p_gen = Tensor::from_slice(&[0.5f64]).view([1, 1]);

    let final_dist = calc_final_dist(&enc_extended_inp, &vocab_dist, &attn_dist, &p_gen, 1)?;

    assert_close(
        &to_vec(&final_dist),
        &[0.125, 0.125, 0.125, 0.125, 0.15 + 0.35],
    );
    Ok(())
}

#[test]
fn final_dist_without_oov() -> anyhow::Result<()> {
    let enc_extended_inp = Tensor::from_slice(&[0i64, 3, 3, 1]).view([2, 2]);
    let vocab_dist = Tensor::full([2, 4], 0.25, (Kind::Double, Device::Cpu));
    let attn_dist = Tensor::full([2, 2], 0.5, (Kind::Double, Device::Cpu));
    let p_gen = Tensor::from_slice(&[0.2f64, 0.8]).view([2, 1]);

    let final_dist = calc_final_dist(&enc_extended_inp, &vocab_dist, &attn_dist, &p_gen, 0)?;

    assert_eq!(final_dist.size(), vec![2, 4]);
    assert_close(
        &to_vec(&final_dist),
        &[
            0.05 + 0.4,
            0.05,
            0.05,
            0.05 + 0.4,
            0.2,
            0.2 + 0.1,
            0.2,
            0.2 + 0.1,
        ],
    );
    Ok(())
}

#[test]
fn final_dist_gate_boundaries() -> anyhow::Result<()> {
    let enc_extended_inp = Tensor::from_slice(&[1i64, 5, 6]).view([1, 3]);
    let vocab_dist = Tensor::from_slice(&[0.4f64, 0.1, 0.2, 0.2, 0.1]).view([1, 5]);
    let attn_dist = Tensor::from_slice(&[0.2f64, 0.5, 0.3]).view([1, 3]);

    let generate_only = calc_final_dist(
        &enc_extended_inp,
        &vocab_dist,
        &attn_dist,
        &Tensor::ones([1, 1], (Kind::Double, Device::Cpu)),
        2,
    )?;
    assert_close(
        &to_vec(&generate_only),
        &[0.4, 0.1, 0.2, 0.2, 0.1, 0.0, 0.0],
    );

    let copy_only = calc_final_dist(
        &enc_extended_inp,
        &vocab_dist,
        &attn_dist,
        &Tensor::zeros([1, 1], (Kind::Double, Device::Cpu)),
        2,
    )?;
    assert_close(&to_vec(&copy_only), &[0.0, 0.2, 0.0, 0.0, 0.0, 0.5, 0.3]);
    Ok(())
}

#[test]
fn final_dist_rows_sum_to_one() -> anyhow::Result<()> {
    tch::manual_seed(42);
    let (batch_size, steps, vocab_size, attn_len, max_oov) = (4, 6, 10, 7, 3);
    let options = (Kind::Double, Device::Cpu);
    let enc_extended_inp = Tensor::randint(
        vocab_size + max_oov,
        [batch_size, attn_len],
        (Kind::Int64, Device::Cpu),
    );
    let vocab_dists = Tensor::randn([batch_size, steps, vocab_size], options).softmax(-1, Kind::Double);
    let attn_dists = Tensor::randn([batch_size, steps, attn_len], options).softmax(-1, Kind::Double);
    let p_gens = Tensor::rand([batch_size, steps, 1], options);

    let final_dists = calc_final_dist(
        &enc_extended_inp,
        &vocab_dists,
        &attn_dists,
        &p_gens,
        max_oov,
    )?;

    assert_eq!(
        final_dists.size(),
        vec![batch_size, steps, vocab_size + max_oov]
    );
    let row_sums = final_dists.sum_dim_intlist([-1].as_slice(), false, Kind::Double);
    let max_deviation = (row_sums - 1.0).abs().max().double_value(&[]);
    assert!(max_deviation < 1e-5);
    assert!(final_dists.min().double_value(&[]) >= 0.0);
    Ok(())
}

#[test]
fn final_dist_stacked_matches_single_steps() -> anyhow::Result<()> {
    tch::manual_seed(7);
    let options = (Kind::Double, Device::Cpu);
    let enc_extended_inp = Tensor::from_slice(&[0i64, 8, 2, 9, 9, 1]).view([2, 3]);
    let vocab_dists = Tensor::rand([2, 4, 8], options).softmax(-1, Kind::Double);
    let attn_dists = Tensor::rand([2, 4, 3], options).softmax(-1, Kind::Double);
    let p_gens = Tensor::rand([2, 4, 1], options);

    let stacked = calc_final_dist(&enc_extended_inp, &vocab_dists, &attn_dists, &p_gens, 2)?;
    for step in 0..4 {
        let single = calc_final_dist(
            &enc_extended_inp,
            &vocab_dists.select(1, step),
            &attn_dists.select(1, step),
            &p_gens.select(1, step),
            2,
        )?;
        assert!(single.allclose(&stacked.select(1, step), 1e-12, 1e-12, false));
    }
    Ok(())
}

#[test]
fn final_dist_rejects_mismatched_source_length() {
    let enc_extended_inp = Tensor::from_slice(&[1i64, 2]).view([1, 2]);
    let vocab_dist = Tensor::from_slice(&[0.5f64, 0.5, 0.0]).view([1, 3]);
    let attn_dist = Tensor::from_slice(&[0.2f64, 0.3, 0.5]).view([1, 3]);
    let p_gen = Tensor::from_slice(&[0.5f64]).view([1, 1]);

    let result = calc_final_dist(&enc_extended_inp, &vocab_dist, &attn_dist, &p_gen, 0);

    assert!(matches!(result, Err(PgnError::ShapeMismatch(_))));
}

#[test]
fn final_dist_rejects_out_of_range_ids() {
    let enc_extended_inp = Tensor::from_slice(&[1i64, 5]).view([1, 2]);
    let vocab_dist = Tensor::from_slice(&[0.5f64, 0.5, 0.0]).view([1, 3]);
    let attn_dist = Tensor::from_slice(&[0.5f64, 0.5]).view([1, 2]);
    let p_gen = Tensor::from_slice(&[0.5f64]).view([1, 1]);

    let result = calc_final_dist(&enc_extended_inp, &vocab_dist, &attn_dist, &p_gen, 2);

    assert!(matches!(result, Err(PgnError::ValueError(_))));
}

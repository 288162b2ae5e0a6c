#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};
use rust_pgn::pointer_generator::calc_final_dist;
use std::time::{Duration, Instant};
use tch::kind::Kind;
use tch::{Device, Tensor};

fn final_distribution(
    iters: u64,
    enc_extended_inp: &Tensor,
    vocab_dists: &Tensor,
    attn_dists: &Tensor,
    p_gens: &Tensor,
    max_oov: i64,
) -> Duration {
    let mut duration = Duration::new(0, 0);
    for _i in 0..iters {
        let start = Instant::now();
        let _ = calc_final_dist(enc_extended_inp, vocab_dists, attn_dists, p_gens, max_oov);
        duration = duration.checked_add(start.elapsed()).unwrap();
    }
    duration
}

fn bench_final_distribution(c: &mut Criterion) {
    //    Set-up a batch of 16 articles of 400 tokens, 100 decoding steps and a vocabulary of 50k words
    let device = Device::cuda_if_available();
    let (batch_size, steps, vocab_size, attn_len, max_oov) = (16, 100, 50000, 400, 20);
    let enc_extended_inp = Tensor::randint(
        vocab_size + max_oov,
        &[batch_size, attn_len],
        (Kind::Int64, device),
    );
    let vocab_dists =
        Tensor::rand(&[batch_size, steps, vocab_size], (Kind::Float, device)).softmax(-1, Kind::Float);
    let attn_dists =
        Tensor::rand(&[batch_size, steps, attn_len], (Kind::Float, device)).softmax(-1, Kind::Float);
    let p_gens = Tensor::rand(&[batch_size, steps, 1], (Kind::Float, device));

    let _ = calc_final_dist(&enc_extended_inp, &vocab_dists, &attn_dists, &p_gens, max_oov);
    c.bench_function("Final distribution", |b| {
        b.iter_custom(|iters| {
            black_box(final_distribution(
                iters,
                &enc_extended_inp,
                &vocab_dists,
                &attn_dists,
                &p_gens,
                max_oov,
            ))
        })
    });
}

criterion_group! {
name = benches;
config = Criterion::default().sample_size(10);
targets = bench_final_distribution
}

criterion_main!(benches);

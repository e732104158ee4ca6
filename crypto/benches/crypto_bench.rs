use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde::Serialize;
use votechain_crypto::{Ed25519Signer, SigningAdapter};

#[derive(Serialize)]
struct Payload {
    sender: String,
    recipient: String,
    value: u64,
}

fn ed25519_sign_bench(c: &mut Criterion) {
    let signer = Ed25519Signer::from_seed(&[7u8; 32]);
    let msg = [42u8; 128];

    c.bench_function("ed25519_sign_128B", |b| {
        b.iter(|| signer.sign(black_box(&msg)))
    });
}

fn ed25519_verify_bench(c: &mut Criterion) {
    let signer = Ed25519Signer::from_seed(&[7u8; 32]);
    let msg = [42u8; 128];
    let sig = signer.sign(&msg);
    let public = signer.public_key();

    c.bench_function("ed25519_verify_128B", |b| {
        b.iter(|| votechain_crypto::verify_signature(black_box(&msg), &sig, &public))
    });
}

fn sha256_1kb_bench(c: &mut Criterion) {
    let data = vec![0xCDu8; 1024];

    c.bench_function("sha256_1KB", |b| {
        b.iter(|| votechain_crypto::sha256(black_box(&data)))
    });
}

fn canonical_payload_bench(c: &mut Criterion) {
    let payload = Payload {
        sender: "ab".repeat(32),
        recipient: "cd".repeat(32),
        value: 99,
    };

    c.bench_function("canonical_json_signable", |b| {
        b.iter(|| votechain_crypto::canonical_json(black_box(&payload)))
    });
}

criterion_group!(
    benches,
    ed25519_sign_bench,
    ed25519_verify_bench,
    sha256_1kb_bench,
    canonical_payload_bench,
);
criterion_main!(benches);

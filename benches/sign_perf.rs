//! Criterion benchmarks for bundle signing and verification.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tempfile::TempDir;

use jdeploy_sign::certs::{CertificateChain, CertificateIssuer, TrustPolicy};
use jdeploy_sign::identity::DeveloperIdentity;
use jdeploy_sign::keys::StaticKeyProvider;
use jdeploy_sign::signing::digest::sha256;
use jdeploy_sign::signing::{FileSigner, FileVerifier, SignOptions, VerifyOptions};

fn provider() -> StaticKeyProvider {
    let issuer = CertificateIssuer::new();
    let key = issuer.generate_key_pair().expect("generate bench key");
    let cert = issuer
        .issue_self_signed(&DeveloperIdentity::new("Bench Dev"), &key)
        .expect("issue bench certificate");
    StaticKeyProvider::new("bench", key, CertificateChain::single(cert))
}

fn bundle(files: usize, size: usize) -> TempDir {
    let dir = TempDir::new().expect("create bench bundle");
    for i in 0..files {
        let path = dir.path().join(format!("lib/part-{}/file-{i}.bin", i % 8));
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        std::fs::write(&path, vec![(i % 251) as u8; size]).expect("write bench file");
    }
    dir
}

fn hashing_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("sha256");
    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let input = vec![7u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("bytes", size), &input, |b, input| {
            b.iter(|| sha256(black_box(input)));
        });
    }
    group.finish();
}

fn signing_benchmarks(c: &mut Criterion) {
    let provider = provider();
    let mut group = c.benchmark_group("bundle");
    group.sample_size(10);

    for files in [16usize, 128] {
        let dir = bundle(files, 16 * 1024);
        group.throughput(Throughput::Elements(files as u64));

        group.bench_with_input(BenchmarkId::new("sign", files), &dir, |b, dir| {
            let signer = FileSigner::new(SignOptions::default());
            b.iter(|| {
                signer
                    .sign_directory("1.0.0", dir.path(), &provider)
                    .expect("sign bench bundle")
            });
        });

        let policy = TrustPolicy::trust_any(vec![
            jdeploy_sign::keys::KeyProvider::certificate_chain(&provider)
                .expect("bench chain")
                .leaf()
                .clone(),
        ]);
        group.bench_with_input(BenchmarkId::new("verify", files), &dir, |b, dir| {
            let verifier = FileVerifier::new(VerifyOptions::default());
            b.iter(|| {
                verifier
                    .verify_directory("1.0.0", dir.path(), &policy)
                    .expect("verify bench bundle")
            });
        });
    }
    group.finish();
}

criterion_group!(benches, hashing_benchmarks, signing_benchmarks);
criterion_main!(benches);

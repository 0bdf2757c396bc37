use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use msingi_registry::{
    compute_commitment, derive_nullifier, hash::leaf_hash, merkle::verify_proof, DeviceId,
    DeviceRegistry, MerkleTree,
};

fn leaves(count: usize) -> Vec<[u8; 32]> {
    (0..count)
        .map(|i| leaf_hash(format!("dev-{i}").as_bytes()))
        .collect()
}

fn bench_merkle_tree_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle_tree_construction");

    for leaf_count in [4, 16, 64, 256, 1024, 4096].iter() {
        let leaves = leaves(*leaf_count);

        group.bench_with_input(
            BenchmarkId::from_parameter(leaf_count),
            leaf_count,
            |b, _| b.iter(|| black_box(MerkleTree::new(black_box(leaves.clone())))),
        );
    }

    group.finish();
}

fn bench_merkle_proof_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle_proof_generation");

    for leaf_count in [4, 16, 64, 256, 1024].iter() {
        let tree = MerkleTree::new(leaves(*leaf_count));

        group.bench_with_input(
            BenchmarkId::from_parameter(leaf_count),
            leaf_count,
            |b, &n| b.iter(|| black_box(tree.generate_proof(black_box(n - 1)).unwrap())),
        );
    }

    group.finish();
}

fn bench_merkle_proof_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle_proof_verification");

    for leaf_count in [4, 64, 1024, 16384].iter() {
        let tree = MerkleTree::new(leaves(*leaf_count));
        let proof = tree.generate_proof(leaf_count / 2).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(leaf_count),
            leaf_count,
            |b, _| {
                b.iter(|| {
                    black_box(verify_proof(
                        black_box(&proof.leaf),
                        &proof.siblings,
                        proof.leaf_index,
                        &proof.root,
                    ))
                })
            },
        );
    }

    group.finish();
}

fn bench_registry_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_registration");
    group.sample_size(20);

    for existing in [16, 256, 1024].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(existing),
            existing,
            |b, &n| {
                b.iter_with_setup(
                    || {
                        let registry = DeviceRegistry::in_memory();
                        for i in 0..n {
                            registry
                                .register(DeviceId::from(format!("dev-{i}").as_str()), None)
                                .unwrap();
                        }
                        registry
                    },
                    |registry| {
                        registry
                            .register(DeviceId::from("dev-new"), None)
                            .unwrap();
                        black_box(registry.root())
                    },
                )
            },
        );
    }

    group.finish();
}

fn bench_nullifier_and_commitment(c: &mut Criterion) {
    let secret = [0x2A; 32];
    c.bench_function("derive_nullifier", |b| {
        b.iter(|| black_box(derive_nullifier(black_box(&secret), black_box(20_000))))
    });

    let cid = b"bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";
    let key = [0x11u8; 64];
    c.bench_function("compute_commitment", |b| {
        b.iter(|| black_box(compute_commitment(black_box(cid), black_box(&key), 42)))
    });
}

criterion_group!(
    benches,
    bench_merkle_tree_construction,
    bench_merkle_proof_generation,
    bench_merkle_proof_verification,
    bench_registry_registration,
    bench_nullifier_and_commitment
);
criterion_main!(benches);

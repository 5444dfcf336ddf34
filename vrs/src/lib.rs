//! Prove that a sequence was derived from public plaintexts under a committed key.
//!
//! A verifiable random sequence (VRS) is `v_t = Scheme(plain_t, key)` for a public,
//! seed-derived plaintext sequence `plain_0..plain_{count-1}` and a secret key. A proof
//! convinces a verifier that:
//!
//! 1. every `v_t` was computed correctly from `plain_t` and the key committed in
//!    `key_com = h * key_com_r + g * key` (the receipt), and
//! 2. a public weighting of the sequence, `<v, w>`, opens `com_vw = u * <v, w> + h * vw_com_r`.
//!
//! # Components
//!
//! - [`scheme`]: the keyed permutation as a rank-1 constraint system ([`Mimc5`](scheme::Mimc5)).
//! - [`plain`]: the public plaintext sequence.
//! - [`shard`]: prove/verify one bounded instance.
//! - [`large`]: split an arbitrary instance into shards and merge their outputs.
//! - [`cache`]: persist per-shard commitments and upgrade them to new sizes.
//! - [`store`] and [`lease`]: select cache files on disk and check them out exclusively.
//!
//! # Example
//!
//! ```no_run
//! use pod_cryptography::{Config, Parameters, Scalar, Standard};
//! use pod_parallel::Sequential;
//! use pod_vrs::{large, plain, scheme::Mimc5, shard::Secret, Context};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let params = Parameters::new(&Config { wire_generators: 16, row_generators: 1 });
//! let scheme = Mimc5::new();
//! let ctx = Context::new(&params, &scheme, &Sequential);
//! let mut rng = StdRng::seed_from_u64(0);
//!
//! let seed = [7u8; 32];
//! let plain = plain::sequence(&Sequential, &seed, 40);
//! let weights: Vec<Scalar> = (0..40).map(|_| Scalar::rand(&mut rng)).collect();
//! let secret = Secret::random(&mut rng);
//!
//! let (proofs, output, _) =
//!     large::prove::<_, _, Standard, _>(&mut rng, &ctx, &seed, &plain, &weights, &secret, None)
//!         .unwrap();
//! let verified = large::verify(&ctx, &seed, &plain, &weights, &proofs).unwrap();
//! assert_eq!(verified, output);
//! ```

use pod_cryptography::Parameters;
use pod_parallel::Executor;
use thiserror::Error;

pub mod cache;
pub mod large;
pub mod lease;
pub mod plain;
pub mod scheme;
pub mod shard;
pub mod store;

pub use scheme::{Mimc5, Scheme};

/// Errors that can occur when proving, verifying or caching a VRS.
#[derive(Error, Debug)]
pub enum Error {
    #[error("empty instance")]
    Empty,
    #[error("shard too large: {0} > {1}")]
    ShardTooLarge(usize, usize),
    #[error("length mismatch: expected {0}, got {1}")]
    LengthMismatch(usize, usize),
    #[error("shard count mismatch: expected {0}, got {1}")]
    ShardCount(usize, usize),
    #[error("invalid cached commitments")]
    InvalidCachedCommitments,
    #[error("plaintext commitment mismatch")]
    PlainMismatch,
    #[error("hadamard product argument rejected")]
    HadamardRejected,
    #[error("inner product argument rejected")]
    InnerProductRejected,
    #[error("shard {0} rejected: {1}")]
    Shard(usize, Box<Error>),
    #[error("blinding generator differs across shards")]
    GeneratorMismatch,
    #[error("cache corrupt: {0}")]
    CacheCorrupt(&'static str),
    #[error("codec error: {0}")]
    Codec(#[from] commonware_codec::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared, immutable inputs of every VRS operation.
pub struct Context<'a, S: Scheme, E: Executor> {
    pub params: &'a Parameters,
    pub scheme: &'a S,
    pub executor: &'a E,
}

impl<'a, S: Scheme, E: Executor> Context<'a, S, E> {
    pub fn new(params: &'a Parameters, scheme: &'a S, executor: &'a E) -> Self {
        Self {
            params,
            scheme,
            executor,
        }
    }

    /// Largest number of positions a single shard may prove.
    pub fn max_shard(&self) -> usize {
        self.params.capacity()
    }
}

impl<S: Scheme, E: Executor> Clone for Context<'_, S, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Scheme, E: Executor> Copy for Context<'_, S, E> {}

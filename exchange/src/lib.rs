//! Sell committed data for a key, with a proof that the ciphertext decrypts to it.
//!
//! A seller holds `n` rows of `s` scalars, each publicly committed as
//! `com_i = row_0 * r_i + sum_j row_{j+1} * m_ij`. To sell them, the seller:
//!
//! 1. masks every row with a verifiable random sequence `V = Scheme(plain, key)` derived
//!    from a public plaintext sequence and a secret key ([seller]),
//! 2. hands the buyer the masked rows, commitments to the masks and a VRS proof, which the
//!    buyer checks and signs as a receipt `key_com = h * key_com_r + g * key` ([buyer]),
//! 3. reveals `(key, key_com_r)` once the signed receipt matches its own, at which point
//!    anyone can check the secret against the receipt ([notary]) and the buyer can
//!    decrypt.
//!
//! # Status
//!
//! `pod-exchange` is **ALPHA** software and is not yet recommended for production use.
//! Developers should expect breaking changes and occasional instability.

use pod_cryptography::{Parameters, Policy, Scalar, Seed, Transcript, G1};
use pod_parallel::Executor;
use pod_vrs::{store::Store, Context, Scheme};
use std::{marker::PhantomData, path::PathBuf};
use thiserror::Error;

pub mod buyer;
pub mod notary;
pub mod seller;
pub mod types;

pub use types::{CommitedData, DataCfg, ProveOutput, ProvedData, Receipt, Secret, VerifyOutput};

const LABEL_MASKS: &[u8] = b"pod_k";
const LABEL_WEIGHTS: &[u8] = b"pod_w";

/// Verifier check that rejected a [`ProvedData`].
#[derive(Error, Debug)]
pub enum Invalid {
    #[error("dimensions")]
    Dimensions,
    #[error("hiding consistency")]
    Hiding,
    #[error("weighted sum")]
    WeightedSum,
    #[error("vrs: {0}")]
    Vrs(pod_vrs::Error),
    #[error("weighted sum commitment")]
    VwCommitment,
}

/// Errors that can occur during an exchange.
#[derive(Error, Debug)]
pub enum Error {
    #[error("precondition failed: {0}")]
    Precondition(&'static str),
    #[error("proof invalid: {0}")]
    ProofInvalid(Invalid),
    #[error("receipt mismatch")]
    ReceiptMismatch,
    #[error("secret mismatch")]
    SecretMismatch,
    #[error("serialization: {0}")]
    Serialization(#[from] commonware_codec::Error),
    #[error("vrs: {0}")]
    Vrs(#[from] pod_vrs::Error),
}

/// Configuration for [`Protocol`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory of precomputed caches (no caching if `None`).
    pub cache_directory: Option<PathBuf>,

    /// Maximum number of positions proven by a single VRS shard.
    pub max_shard: usize,

    /// Maximum number of columns (`s`) of the committed data.
    pub max_columns: usize,
}

/// Parameters, scheme and executor shared by the seller, the buyer and the notary.
pub struct Protocol<S: Scheme, P: Policy, E: Executor> {
    params: Parameters,
    scheme: S,
    executor: E,
    store: Option<Store>,
    _policy: PhantomData<P>,
}

impl<S: Scheme, P: Policy, E: Executor> Protocol<S, P, E> {
    /// Derives the generators and opens the cache directory (if any).
    pub fn new(cfg: Config, scheme: S, executor: E) -> Result<Self, Error> {
        if cfg.max_shard == 0 || cfg.max_columns == 0 {
            return Err(Error::Precondition("empty configuration"));
        }
        let params = Parameters::new(&pod_cryptography::Config {
            wire_generators: cfg.max_shard,
            row_generators: cfg.max_columns + 1,
        });
        let store = cfg
            .cache_directory
            .map(Store::init)
            .transpose()
            .map_err(Error::Vrs)?;
        Ok(Self {
            params,
            scheme,
            executor,
            store,
            _policy: PhantomData,
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Cache directory, if caching is enabled.
    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    /// Context of the VRS engine.
    pub fn context(&self) -> Context<'_, S, E> {
        Context::new(&self.params, &self.scheme, &self.executor)
    }

    /// Decoding bounds for [`ProvedData`] over `n` rows of `s` columns.
    pub fn data_cfg(&self, n: usize, s: usize) -> Result<DataCfg, Error> {
        let count = positions(n, s).ok_or(Error::Precondition("dimensions"))?;
        Ok(DataCfg {
            rows: n,
            columns: s,
            shards: count.div_ceil(self.params.capacity()),
            proof: pod_vrs::shard::ProofCfg::new(&self.scheme, self.params.capacity()),
        })
    }
}

/// Binds the mask commitments `k` to `seed` and derives one weight per mask row.
///
/// Returns the seed of the VRS proof and the `k.len()` row weights.
pub fn derive_weights(seed: &Seed, k: &[G1]) -> (Seed, Vec<Scalar>) {
    let mut transcript = Transcript::new(seed);
    transcript.append_points(LABEL_MASKS, k);
    let vrs_seed = transcript.seed();
    let w = transcript.challenge_scalars(LABEL_WEIGHTS, k.len());
    (vrs_seed, w)
}

/// Number of VRS positions for `n` rows of `s` columns (`(n + 1) * (s + 1)`), if it fits.
pub fn positions(n: usize, s: usize) -> Option<usize> {
    n.checked_add(1)?.checked_mul(s.checked_add(1)?)
}

/// Expands row weights to one weight per position (`w[t / columns]`).
pub fn position_weights(w: &[Scalar], columns: usize) -> Vec<Scalar> {
    w.iter()
        .flat_map(|weight| std::iter::repeat(*weight).take(columns))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{Decode, Encode};
    use commonware_macros::test_traced;
    use pod_cryptography::{Element, Standard};
    use pod_parallel::{Parallel, Sequential};
    use pod_vrs::{lease::Outcome, Mimc5};
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    fn temp_dir(rng: &mut StdRng) -> PathBuf {
        std::env::temp_dir().join(format!(
            "pod-exchange-{}-{}",
            std::process::id(),
            rng.next_u64()
        ))
    }

    fn config(cache_directory: Option<PathBuf>) -> Config {
        Config {
            cache_directory,
            max_shard: 8,
            max_columns: 8,
        }
    }

    #[test]
    fn test_position_weights() {
        let w = [Scalar::from_u64(1), Scalar::from_u64(2)];
        let expanded = position_weights(&w, 3);
        assert_eq!(expanded.len(), 6);
        assert_eq!(expanded[2], w[0]);
        assert_eq!(expanded[3], w[1]);
    }

    #[test]
    fn test_positions_overflow() {
        assert_eq!(positions(3, 5), Some(24));
        assert_eq!(positions(usize::MAX, 1), None);
        assert_eq!(positions(1, usize::MAX), None);
        assert_eq!(positions(usize::MAX / 2, 3), None);

        let protocol = Protocol::<_, Standard, _>::new(config(None), Mimc5::new(), Sequential)
            .unwrap();
        assert!(matches!(
            protocol.data_cfg(usize::MAX, 2),
            Err(Error::Precondition("dimensions"))
        ));
    }

    #[test]
    fn test_derive_weights_binds_masks() {
        let seed = [1u8; 32];
        let k = vec![G1::one(); 3];
        let (vrs_seed, w) = derive_weights(&seed, &k);
        assert_eq!(w.len(), 3);
        assert_eq!(derive_weights(&seed, &k), (vrs_seed, w.clone()));

        let mut other = k.clone();
        other[1].add(&G1::one());
        let (other_seed, other_w) = derive_weights(&seed, &other);
        assert_ne!(other_seed, vrs_seed);
        assert_ne!(other_w, w);
    }

    fn exchange<E: Executor>(protocol: &Protocol<Mimc5, Standard, E>, rng: &mut StdRng) {
        let (n, s) = (3, 5);
        let data = CommitedData::random(rng, protocol.params(), n, s);
        let seed = [9u8; 32];

        // Seller
        let output = protocol.encrypt_and_prove(rng, &seed, &data).unwrap();

        // Transport
        let encoded = output.proved_data.encode();
        let cfg = protocol.data_cfg(n, s).unwrap();
        let proved = ProvedData::<Standard>::decode_cfg(encoded, &cfg).unwrap();
        assert_eq!(proved, output.proved_data);

        // Buyer
        let verified = protocol
            .verify_and_sign(&seed, n, s, &data.com, &proved)
            .unwrap();
        assert_eq!(verified.receipt, output.receipt);

        // Seller reveals against the signed receipt
        let secret = output.reveal(&verified.receipt).unwrap();
        assert!(notary::verify_secret(&verified.receipt, &secret));

        // Buyer decrypts
        let m = protocol
            .decrypt_data(n, s, &proved.em, &secret, &verified)
            .unwrap();
        assert_eq!(m, data.m);
    }

    #[test_traced]
    fn test_exchange() {
        let mut rng = StdRng::seed_from_u64(0);
        let protocol = Protocol::<_, Standard, _>::new(config(None), Mimc5::new(), Sequential)
            .unwrap();
        exchange(&protocol, &mut rng);
    }

    #[test_traced]
    fn test_exchange_parallel_with_cache() {
        let mut rng = StdRng::seed_from_u64(1);
        let dir = temp_dir(&mut rng);
        let protocol = Protocol::<_, Standard, _>::new(
            config(Some(dir.clone())),
            Mimc5::new(),
            Parallel::with_concurrency(4).unwrap(),
        )
        .unwrap();

        // Pre-build a cache close to the session size ((3 + 1) * (5 + 1) = 24)
        let store = protocol.store().unwrap();
        store.create(&mut rng, &protocol.context(), 20).unwrap();

        exchange(&protocol, &mut rng);

        // The cached key was revealed, so the file is retired
        assert!(store.select(24, 8).is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_receipt_mismatch_returns_lease() {
        let mut rng = StdRng::seed_from_u64(2);
        let dir = temp_dir(&mut rng);
        let protocol =
            Protocol::<_, Standard, _>::new(config(Some(dir.clone())), Mimc5::new(), Sequential)
                .unwrap();
        let store = protocol.store().unwrap();
        store.create(&mut rng, &protocol.context(), 12).unwrap();

        let data = CommitedData::random(&mut rng, protocol.params(), 2, 3);
        let output = protocol.encrypt_and_prove(&mut rng, &[3u8; 32], &data).unwrap();
        assert!(output.lease().is_some());

        let mut forged = output.receipt;
        forged.key_com.add(&G1::one());
        assert!(matches!(
            output.reveal(&forged),
            Err(Error::ReceiptMismatch)
        ));

        // The key was not disclosed, so the cache is available again
        let lease = store.select(12, 8).unwrap();
        assert_eq!(lease.release(), Outcome::Returned);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unrevealed_output_returns_lease() {
        let mut rng = StdRng::seed_from_u64(3);
        let dir = temp_dir(&mut rng);
        let protocol =
            Protocol::<_, Standard, _>::new(config(Some(dir.clone())), Mimc5::new(), Sequential)
                .unwrap();
        let store = protocol.store().unwrap();
        store.create(&mut rng, &protocol.context(), 12).unwrap();

        let data = CommitedData::random(&mut rng, protocol.params(), 2, 3);
        let output = protocol.encrypt_and_prove(&mut rng, &[4u8; 32], &data).unwrap();
        let base = output.lease().unwrap().base().to_path_buf();

        // Held while the output lives
        assert!(store.select(12, 8).is_none());
        drop(output);

        // Never revealed, so the file is back under its name
        assert!(base.exists());
        let lease = store.select(12, 8).unwrap();
        assert_eq!(lease.base(), base.as_path());
        assert_eq!(lease.release(), Outcome::Returned);

        // A revealed key retires the file
        let output = protocol.encrypt_and_prove(&mut rng, &[4u8; 32], &data).unwrap();
        let receipt = output.receipt;
        output.reveal(&receipt).unwrap();
        assert!(!base.exists());
        assert!(store.select(12, 8).is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_invalid_configuration() {
        let cfg = Config {
            cache_directory: None,
            max_shard: 0,
            max_columns: 4,
        };
        assert!(matches!(
            Protocol::<_, Standard, _>::new(cfg, Mimc5::new(), Sequential),
            Err(Error::Precondition(_))
        ));
    }
}

//! Public plaintext sequence.
//!
//! `plain_t = H(seed || t)` mapped to a scalar. Both parties compute it from the public
//! seed, so the plaintext is never transmitted.

use pod_cryptography::{Scalar, Seed};
use pod_parallel::Executor;

const DST_PLAIN: &[u8] = b"POD_VRS_PLAIN";

/// Returns the plaintext at `index`.
pub fn generate(seed: &Seed, index: u64) -> Scalar {
    let mut message = [0u8; 40];
    message[..32].copy_from_slice(seed);
    message[32..].copy_from_slice(&index.to_be_bytes());
    Scalar::map(DST_PLAIN, &message)
}

/// Returns the plaintexts at positions `begin..end`.
pub fn range<E: Executor>(executor: &E, seed: &Seed, begin: usize, end: usize) -> Vec<Scalar> {
    executor.map_range(end.saturating_sub(begin), |i| {
        generate(seed, (begin + i) as u64)
    })
}

/// Returns the first `count` plaintexts.
pub fn sequence<E: Executor>(executor: &E, seed: &Seed, count: usize) -> Vec<Scalar> {
    range(executor, seed, 0, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_parallel::{Parallel, Sequential};

    #[test]
    fn test_deterministic() {
        let seed = [1u8; 32];
        let sequential = sequence(&Sequential, &seed, 10);
        let parallel = sequence(&Parallel::with_concurrency(3).unwrap(), &seed, 10);
        assert_eq!(sequential, parallel);
        assert_eq!(sequential[4], generate(&seed, 4));
        assert_eq!(range(&Sequential, &seed, 3, 7), sequential[3..7].to_vec());
        assert_ne!(sequence(&Sequential, &[2u8; 32], 10), sequential);
    }
}

//! Fiat-Shamir transcript.
//!
//! A [`Transcript`] is a running 32-byte seed. Every append replaces the seed with
//! `SHA-256(DST || seed || tag || label || data)`, so the current seed commits to the
//! entire (ordered) history. Challenges are derived from the seed and then absorbed,
//! which makes consecutive challenges independent.
//!
//! Only public or already-committed values should ever be appended.

use crate::group::{Scalar, G1};
use commonware_codec::Encode;
use sha2::{Digest, Sha256};

/// Length of a transcript seed.
pub const SEED_LENGTH: usize = 32;

/// A public 32-byte seed (for example, the seed of a pseudorandom plaintext sequence).
pub type Seed = [u8; SEED_LENGTH];

/// Domain separation tags for different transcript operations.
const DST_TRANSCRIPT: &[u8] = b"POD_TRANSCRIPT_V1";
const DST_CHALLENGE: &[u8] = b"challenge";
const DST_CHALLENGES: &[u8] = b"challenges";
const DST_POINT: &[u8] = b"point";
const DST_SCALAR: &[u8] = b"scalar";
const DST_BYTES: &[u8] = b"bytes";
const DST_FORK: &[u8] = b"fork";
const DST_CHALLENGE_SCALAR: &[u8] = b"POD_TRANSCRIPT_V1_CHALLENGE";

/// A Fiat-Shamir transcript for generating deterministic challenges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript {
    state: Seed,
}

impl Transcript {
    /// Creates a new transcript starting from the provided seed.
    pub fn new(seed: &Seed) -> Self {
        Self { state: *seed }
    }

    /// Returns the current seed (which commits to everything appended so far).
    pub fn seed(&self) -> Seed {
        self.state
    }

    fn absorb(&mut self, tag: &[u8], label: &[u8], data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(DST_TRANSCRIPT);
        hasher.update(self.state);
        hasher.update(tag);
        hasher.update((label.len() as u32).to_be_bytes());
        hasher.update(label);
        hasher.update((data.len() as u64).to_be_bytes());
        hasher.update(data);
        self.state = hasher.finalize().into();
    }

    /// Returns a domain-separated copy of the transcript, leaving self untouched.
    pub fn fork(&self, label: &[u8]) -> Self {
        let mut forked = self.clone();
        forked.absorb(DST_FORK, label, &[]);
        forked
    }

    /// Appends arbitrary bytes to the transcript.
    pub fn append_bytes(&mut self, label: &[u8], data: &[u8]) {
        self.absorb(DST_BYTES, label, data);
    }

    /// Appends a u64 to the transcript.
    pub fn append_u64(&mut self, label: &[u8], value: u64) {
        self.append_bytes(label, &value.to_be_bytes());
    }

    /// Appends a point to the transcript.
    pub fn append_point(&mut self, label: &[u8], point: &G1) {
        self.absorb(DST_POINT, label, &point.encode());
    }

    /// Appends a sequence of points, in order, to the transcript.
    pub fn append_points(&mut self, label: &[u8], points: &[G1]) {
        let mut data = Vec::with_capacity(points.len() * 48);
        for point in points {
            data.extend_from_slice(&point.encode());
        }
        self.absorb(DST_POINT, label, &data);
    }

    /// Appends a scalar to the transcript.
    pub fn append_scalar(&mut self, label: &[u8], scalar: &Scalar) {
        self.absorb(DST_SCALAR, label, &scalar.encode());
    }

    /// Appends a sequence of scalars, in order, to the transcript.
    pub fn append_scalars(&mut self, label: &[u8], scalars: &[Scalar]) {
        let mut data = Vec::with_capacity(scalars.len() * 32);
        for scalar in scalars {
            data.extend_from_slice(&scalar.encode());
        }
        self.absorb(DST_SCALAR, label, &data);
    }

    /// Generates a challenge scalar from the current transcript state.
    pub fn challenge_scalar(&mut self, label: &[u8]) -> Scalar {
        self.absorb(DST_CHALLENGE, label, &[]);
        Scalar::map(DST_CHALLENGE_SCALAR, &self.state)
    }

    /// Generates `count` challenge scalars from the current transcript state.
    pub fn challenge_scalars(&mut self, label: &[u8], count: usize) -> Vec<Scalar> {
        self.absorb(DST_CHALLENGES, label, &(count as u64).to_be_bytes());
        let mut message = [0u8; SEED_LENGTH + 8];
        message[..SEED_LENGTH].copy_from_slice(&self.state);
        (0..count as u64)
            .map(|i| {
                message[SEED_LENGTH..].copy_from_slice(&i.to_be_bytes());
                Scalar::map(DST_CHALLENGE_SCALAR, &message)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Element;

    #[test]
    fn test_transcript_determinism() {
        let mut t1 = Transcript::new(&[1u8; SEED_LENGTH]);
        let mut t2 = Transcript::new(&[1u8; SEED_LENGTH]);

        let point = G1::one();
        t1.append_point(b"P", &point);
        t2.append_point(b"P", &point);
        assert_eq!(t1.seed(), t2.seed());

        let c1 = t1.challenge_scalar(b"c");
        let c2 = t2.challenge_scalar(b"c");
        assert_eq!(c1, c2);

        // Consecutive challenges differ.
        assert_ne!(t1.challenge_scalar(b"c"), c1);
    }

    #[test]
    fn test_transcript_different_seeds() {
        let mut t1 = Transcript::new(&[1u8; SEED_LENGTH]);
        let mut t2 = Transcript::new(&[2u8; SEED_LENGTH]);
        assert_ne!(t1.challenge_scalar(b"c"), t2.challenge_scalar(b"c"));
    }

    #[test]
    fn test_transcript_order_sensitive() {
        let a = Scalar::from_u64(1);
        let b = Scalar::from_u64(2);

        let mut t1 = Transcript::new(&[0u8; SEED_LENGTH]);
        t1.append_scalars(b"x", &[a, b]);
        let mut t2 = Transcript::new(&[0u8; SEED_LENGTH]);
        t2.append_scalars(b"x", &[b, a]);
        assert_ne!(t1.seed(), t2.seed());

        // Labels are bound too.
        let mut t3 = Transcript::new(&[0u8; SEED_LENGTH]);
        t3.append_scalars(b"y", &[a, b]);
        assert_ne!(t1.seed(), t3.seed());
    }

    #[test]
    fn test_fork() {
        let base = Transcript::new(&[7u8; SEED_LENGTH]);
        let left = base.fork(b"left");
        let right = base.fork(b"right");
        assert_ne!(left.seed(), right.seed());
        assert_eq!(base.fork(b"left"), left);
        assert_eq!(base.seed(), [7u8; SEED_LENGTH]);
    }

    #[test]
    fn test_challenge_scalars() {
        let mut t1 = Transcript::new(&[3u8; SEED_LENGTH]);
        let mut t2 = Transcript::new(&[3u8; SEED_LENGTH]);
        let c1 = t1.challenge_scalars(b"w", 5);
        let c2 = t2.challenge_scalars(b"w", 5);
        assert_eq!(c1.len(), 5);
        assert_eq!(c1, c2);
        for i in 0..c1.len() {
            for j in i + 1..c1.len() {
                assert_ne!(c1[i], c1[j]);
            }
        }
    }
}

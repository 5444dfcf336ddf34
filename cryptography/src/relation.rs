//! Contracts of the two relation arguments consumed by the VRS prover.
//!
//! A [`HadamardArgument`] proves that committed vectors satisfy `a_c ∘ b_c = c_c` for a batch
//! of triples. An [`InnerProductArgument`] proves that a committed vector `x` and a public
//! weight vector `w` satisfy `<x, w> = y` for a committed scalar `y`. A [`Policy`] bundles
//! one instance of each so callers can be generic over the proving family.
//!
//! Both arguments draw their challenges from a caller-supplied [`Transcript`], which must
//! already be bound to every public value the caller depends on.

use crate::{
    dot::Hyrax,
    group::{Scalar, G1},
    hadamard::Batched,
    params::Parameters,
    transcript::Transcript,
};
use commonware_codec::{EncodeSize, Read, Write};
use rand::RngCore;
use std::fmt::Debug;

/// Bounds applied when decoding a relation proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Exact number of triples (ignored by inner-product proofs).
    pub triples: usize,

    /// Maximum vector length.
    pub positions: usize,
}

/// Public statement of a Hadamard-product argument.
///
/// `a[c]`, `b[c]` and `c[c]` commit (against the wire basis) to vectors of `length` scalars.
#[derive(Clone, Debug)]
pub struct Triples {
    pub length: usize,
    pub a: Vec<G1>,
    pub b: Vec<G1>,
    pub c: Vec<G1>,
}

/// Witness of a Hadamard-product argument.
#[derive(Clone, Debug)]
pub struct TriplesWitness {
    pub a: Vec<Vec<Scalar>>,
    pub b: Vec<Vec<Scalar>>,
    pub r_a: Vec<Scalar>,
    pub r_b: Vec<Scalar>,
    pub r_c: Vec<Scalar>,
}

/// Public statement of an inner-product argument: `x` commits to a vector against the wire
/// basis and `y = u * <x, weights> + h * r_y`.
#[derive(Clone, Debug)]
pub struct Dot<'a> {
    pub x: G1,
    pub y: G1,
    pub weights: &'a [Scalar],
}

/// Witness of an inner-product argument.
#[derive(Clone, Debug)]
pub struct DotWitness<'a> {
    pub x: &'a [Scalar],
    pub r_x: Scalar,
    pub r_y: Scalar,
}

/// Proof type shared bounds.
pub trait Transcribed:
    Clone + Debug + PartialEq + Eq + Send + Sync + Write + EncodeSize + Read<Cfg = Limits>
{
}

impl<T> Transcribed for T where
    T: Clone + Debug + PartialEq + Eq + Send + Sync + Write + EncodeSize + Read<Cfg = Limits>
{
}

/// Batched Hadamard-product argument.
pub trait HadamardArgument: Send + Sync + 'static {
    type Proof: Transcribed;

    /// Proves the statement. The witness must satisfy it.
    fn prove<R: RngCore>(
        rng: &mut R,
        transcript: &mut Transcript,
        params: &Parameters,
        statement: &Triples,
        witness: &TriplesWitness,
    ) -> Self::Proof;

    /// Returns whether the proof is valid for the statement.
    fn verify(
        transcript: &mut Transcript,
        params: &Parameters,
        statement: &Triples,
        proof: &Self::Proof,
    ) -> bool;
}

/// Inner-product argument against a public weight vector.
pub trait InnerProductArgument: Send + Sync + 'static {
    type Proof: Transcribed;

    /// Proves the statement. The witness must satisfy it.
    fn prove<R: RngCore>(
        rng: &mut R,
        transcript: &mut Transcript,
        params: &Parameters,
        statement: &Dot<'_>,
        witness: &DotWitness<'_>,
    ) -> Self::Proof;

    /// Returns whether the proof is valid for the statement.
    fn verify(
        transcript: &mut Transcript,
        params: &Parameters,
        statement: &Dot<'_>,
        proof: &Self::Proof,
    ) -> bool;
}

/// A family of relation arguments.
pub trait Policy: Clone + Debug + PartialEq + Eq + Send + Sync + 'static {
    type Hadamard: HadamardArgument;
    type InnerProduct: InnerProductArgument;
}

/// The default family: [`Batched`] Hadamard products and [`Hyrax`] inner products.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Standard;

impl Policy for Standard {
    type Hadamard = Batched;
    type InnerProduct = Hyrax;
}

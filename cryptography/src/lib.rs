//! Commit to vectors over BLS12-381 and prove relations between them.
//!
//! This crate provides the algebra consumed by the verifiable random sequence prover:
//!
//! - [`group`]: the scalar field and the G1 group (backed by `blst`).
//! - [`params`]: public generators ([`Parameters`]) for vector, scalar and row commitments.
//! - [`transcript`]: a Fiat-Shamir [`Transcript`] over SHA-256.
//! - [`relation`]: contracts of the Hadamard-product and inner-product arguments, bundled
//!   into a [`Policy`].
//! - [`hadamard`] and [`dot`]: the [`Standard`] implementations of those contracts.
//!
//! # Status
//!
//! `pod-cryptography` is **ALPHA** software and is not yet recommended for production use.
//! Developers should expect breaking changes and occasional instability.

pub mod dot;
pub mod group;
pub mod hadamard;
pub mod params;
pub mod relation;
pub mod transcript;

pub use group::{Element, Scalar, G1};
pub use params::{Config, Parameters};
pub use relation::{HadamardArgument, InnerProductArgument, Limits, Policy, Standard};
pub use transcript::{Seed, Transcript};

//! Public generators shared by every party.
//!
//! [`Parameters`] is built once from a [`Config`] and passed by reference to every
//! prover and verifier. All generators are derived by hashing a label to G1, so the
//! discrete logarithm relation between any two of them is unknown.

use crate::group::{Element, Scalar, G1};

/// Domain separation tag for generator derivation.
const DST_GENERATORS: &[u8] = b"POD_BLS12381G1_XMD:SHA-256_SSWU_RO_GENERATORS_";

const LABEL_BLINDING: &[u8] = b"h";
const LABEL_WEIGHTED: &[u8] = b"u";
const LABEL_WIRE: &[u8] = b"g";
const LABEL_ROW: &[u8] = b"row";

/// Configuration for [`Parameters`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of wire generators (the largest vector a single commitment may hold).
    pub wire_generators: usize,

    /// Number of row generators (one blinding slot plus the widest row).
    pub row_generators: usize,
}

/// Public generators.
#[derive(Clone, Debug)]
pub struct Parameters {
    h: G1,
    u: G1,
    g: Vec<G1>,
    row: Vec<G1>,
}

fn derive(label: &[u8], index: Option<u64>) -> G1 {
    let mut message = label.to_vec();
    if let Some(index) = index {
        message.extend_from_slice(&index.to_be_bytes());
    }
    G1::hash(DST_GENERATORS, &message)
}

impl Parameters {
    /// Derives all generators described by the configuration.
    pub fn new(cfg: &Config) -> Self {
        Self {
            h: derive(LABEL_BLINDING, None),
            u: derive(LABEL_WEIGHTED, None),
            g: (0..cfg.wire_generators as u64)
                .map(|i| derive(LABEL_WIRE, Some(i)))
                .collect(),
            row: (0..cfg.row_generators as u64)
                .map(|i| derive(LABEL_ROW, Some(i)))
                .collect(),
        }
    }

    /// Blinding generator.
    pub fn h(&self) -> &G1 {
        &self.h
    }

    /// Generator binding a committed weighted sum.
    pub fn u(&self) -> &G1 {
        &self.u
    }

    /// Wire basis `g_0..`.
    pub fn g(&self) -> &[G1] {
        &self.g
    }

    /// Independent row basis `row_0..` (`row_0` carries a row's blinding).
    pub fn row(&self) -> &[G1] {
        &self.row
    }

    /// Largest vector that can be committed against the wire basis.
    pub fn capacity(&self) -> usize {
        self.g.len()
    }

    /// Widest row (excluding its blinding slot) that can be committed against the row basis.
    pub fn max_columns(&self) -> usize {
        self.row.len().saturating_sub(1)
    }

    /// Returns `sum_{t < len} g_t`, the commitment to the all-ones vector of length `len`.
    pub fn sigma_g(&self, len: usize) -> G1 {
        G1::sum(&self.g[..len])
    }

    /// Returns `h * blinding + sum_t g_t * values[t]`.
    ///
    /// # Panics
    ///
    /// Panics if `values` is longer than [`Self::capacity`].
    pub fn commit(&self, values: &[Scalar], blinding: &Scalar) -> G1 {
        assert!(values.len() <= self.g.len(), "vector exceeds wire basis");
        let mut com = G1::msm(&self.g, values);
        if *blinding != Scalar::zero() {
            let mut blind = self.h;
            blind.mul(blinding);
            com.add(&blind);
        }
        com
    }

    /// Returns `u * value + h * blinding`.
    pub fn commit_scalar(&self, value: &Scalar, blinding: &Scalar) -> G1 {
        let mut com = self.u;
        com.mul(value);
        let mut blind = self.h;
        blind.mul(blinding);
        com.add(&blind);
        com
    }

    /// Returns `sum_j row_j * values[j]` (no separate blinding term).
    ///
    /// # Panics
    ///
    /// Panics if `values` is longer than the row basis.
    pub fn commit_row(&self, values: &[Scalar]) -> G1 {
        assert!(values.len() <= self.row.len(), "vector exceeds row basis");
        G1::msm(&self.row, values)
    }

    /// Returns `row_0 * blinding + sum_j row_{j+1} * values[j]`, the commitment to a data row.
    pub fn commit_data_row(&self, values: &[Scalar], blinding: &Scalar) -> G1 {
        assert!(values.len() < self.row.len(), "vector exceeds row basis");
        let mut com = G1::msm(&self.row[1..], values);
        let mut blind = self.row[0];
        blind.mul(blinding);
        com.add(&blind);
        com
    }
}

//! Data exchanged between the seller, the buyer and the notary.

use crate::Error;
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, FixedSize, Read, ReadExt, Write};
use pod_cryptography::{Parameters, Policy, Scalar, Seed, G1};
use pod_vrs::{
    lease::Lease,
    shard::{Output, Proof, ProofCfg},
};
use rand::RngCore;
use tracing::{debug, warn};

/// The seller's data: `n` rows of `s` scalars, each with a blinding `r_i` and a public
/// commitment `com_i = row_0 * r_i + sum_j row_{j+1} * m_ij`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitedData {
    pub m: Vec<Vec<Scalar>>,
    pub r: Vec<Scalar>,
    pub com: Vec<G1>,
}

impl CommitedData {
    /// Commits to `m` with blindings `r`.
    pub fn new(params: &Parameters, m: Vec<Vec<Scalar>>, r: Vec<Scalar>) -> Self {
        let com = m
            .iter()
            .zip(&r)
            .map(|(row, r)| params.commit_data_row(row, r))
            .collect();
        Self { m, r, com }
    }

    /// Commits to `n` random rows of `s` scalars.
    pub fn random<R: RngCore>(rng: &mut R, params: &Parameters, n: usize, s: usize) -> Self {
        let m = (0..n)
            .map(|_| (0..s).map(|_| Scalar::rand(rng)).collect())
            .collect();
        let r = (0..n).map(|_| Scalar::rand(rng)).collect();
        Self::new(params, m, r)
    }

    /// Number of rows.
    pub fn n(&self) -> usize {
        self.m.len()
    }

    /// Number of columns.
    pub fn s(&self) -> usize {
        self.m.first().map_or(0, Vec::len)
    }

    /// Returns an error unless the data is well formed and matches its commitments.
    pub fn check(&self, params: &Parameters) -> Result<(), Error> {
        let (n, s) = (self.n(), self.s());
        if n == 0 || s == 0 {
            return Err(Error::Precondition("empty data"));
        }
        if s > params.max_columns() {
            return Err(Error::Precondition("too many columns"));
        }
        if self.m.iter().any(|row| row.len() != s) {
            return Err(Error::Precondition("ragged rows"));
        }
        if self.r.len() != n || self.com.len() != n {
            return Err(Error::Precondition("row count"));
        }
        for ((row, r), com) in self.m.iter().zip(&self.r).zip(&self.com) {
            if params.commit_data_row(row, r) != *com {
                return Err(Error::Precondition("commitment"));
            }
        }
        Ok(())
    }
}

/// Bounds applied when decoding a [`ProvedData`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataCfg {
    /// Number of data rows (`n`).
    pub rows: usize,

    /// Number of data columns (`s`).
    pub columns: usize,

    /// Number of VRS shards.
    pub shards: usize,

    /// Bounds of every shard proof.
    pub proof: ProofCfg,
}

/// What the seller sends to the buyer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvedData<P: Policy> {
    /// Row commitments of the masks (`n + 1` rows, the last one being the key row).
    pub k: Vec<G1>,

    /// Masked rows (`n` rows of `s + 1` scalars).
    pub em: Vec<Vec<Scalar>>,

    /// Weighted column sums of the masks (`s + 1` scalars).
    pub vw: Vec<Scalar>,

    pub vrs_plain_seed: Seed,
    pub vw_com_r: Scalar,
    pub vrs_proofs: Vec<Proof<P>>,
}

impl<P: Policy> Write for ProvedData<P> {
    fn write(&self, buf: &mut impl BufMut) {
        self.k.write(buf);
        self.em.write(buf);
        self.vw.write(buf);
        self.vrs_plain_seed.write(buf);
        self.vw_com_r.write(buf);
        self.vrs_proofs.write(buf);
    }
}

impl<P: Policy> EncodeSize for ProvedData<P> {
    fn encode_size(&self) -> usize {
        self.k.encode_size()
            + self.em.encode_size()
            + self.vw.encode_size()
            + self.vrs_plain_seed.encode_size()
            + self.vw_com_r.encode_size()
            + self.vrs_proofs.encode_size()
    }
}

impl<P: Policy> Read for ProvedData<P> {
    type Cfg = DataCfg;

    fn read_cfg(buf: &mut impl Buf, cfg: &DataCfg) -> Result<Self, CodecError> {
        let (rows, columns) = (cfg.rows, cfg.columns + 1);
        let k = Vec::<G1>::read_cfg(buf, &((rows + 1..=rows + 1).into(), ()))?;
        let em = Vec::<Vec<Scalar>>::read_cfg(
            buf,
            &((rows..=rows).into(), ((columns..=columns).into(), ())),
        )?;
        let vw = Vec::<Scalar>::read_cfg(buf, &((columns..=columns).into(), ()))?;
        let vrs_plain_seed = Seed::read(buf)?;
        let vw_com_r = Scalar::read(buf)?;
        let vrs_proofs =
            Vec::<Proof<P>>::read_cfg(buf, &((cfg.shards..=cfg.shards).into(), cfg.proof))?;
        Ok(Self {
            k,
            em,
            vw,
            vrs_plain_seed,
            vw_com_r,
            vrs_proofs,
        })
    }
}

/// The key commitment `key_com = h * key_com_r + g * key`, signed by the buyer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub h: G1,
    pub g: G1,
    pub key_com: G1,
}

impl From<Output> for Receipt {
    fn from(output: Output) -> Self {
        Self {
            h: output.h,
            g: output.g,
            key_com: output.key_com,
        }
    }
}

impl Write for Receipt {
    fn write(&self, buf: &mut impl BufMut) {
        self.h.write(buf);
        self.g.write(buf);
        self.key_com.write(buf);
    }
}

impl Read for Receipt {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let h = G1::read(buf)?;
        let g = G1::read(buf)?;
        let key_com = G1::read(buf)?;
        Ok(Self { h, g, key_com })
    }
}

impl FixedSize for Receipt {
    const SIZE: usize = 3 * G1::SIZE;
}

/// The opening of a [`Receipt`], disclosed once the seller is paid.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    pub key: Scalar,
    pub key_com_r: Scalar,
}

impl Write for Secret {
    fn write(&self, buf: &mut impl BufMut) {
        self.key.write(buf);
        self.key_com_r.write(buf);
    }
}

impl Read for Secret {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let key = Scalar::read(buf)?;
        let key_com_r = Scalar::read(buf)?;
        Ok(Self { key, key_com_r })
    }
}

impl FixedSize for Secret {
    const SIZE: usize = 2 * Scalar::SIZE;
}

/// What the buyer learns from a successful verification.
#[derive(Clone, Debug)]
pub struct VerifyOutput {
    pub receipt: Receipt,
    pub plain: Vec<Scalar>,
    pub w: Vec<Scalar>,
    pub sigma_vw: Scalar,
}

/// What the seller keeps after proving.
///
/// The secret is only reachable through [`ProveOutput::reveal`]. Dropping an unrevealed
/// output returns its cache file to the store.
pub struct ProveOutput<P: Policy> {
    pub proved_data: ProvedData<P>,
    pub receipt: Receipt,
    secret: Secret,

    /// Cache file the key came from, if any.
    lease: Option<Lease>,
}

impl<P: Policy> ProveOutput<P> {
    pub(crate) fn new(
        proved_data: ProvedData<P>,
        receipt: Receipt,
        secret: Secret,
        lease: Option<Lease>,
    ) -> Self {
        Self {
            proved_data,
            receipt,
            secret,
            lease,
        }
    }

    /// Cache file the key came from, if any.
    pub fn lease(&self) -> Option<&Lease> {
        self.lease.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Discloses the secret if `signed` equals the seller's own receipt.
    ///
    /// Once disclosed, the key is public: the cache file it came from is retired.
    pub fn reveal(self, signed: &Receipt) -> Result<Secret, Error> {
        if self.receipt != *signed {
            warn!("signed receipt differs, withholding secret");
            return Err(Error::ReceiptMismatch);
        }
        if let Some(mut lease) = self.lease {
            lease.set_leaked();
            let outcome = lease.release();
            debug!(?outcome, "released leaked cache");
        }
        Ok(self.secret)
    }
}

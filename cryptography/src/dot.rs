//! Inner-product argument against a public weight vector.
//!
//! Given `X = Com(x, r_x)` and `Y = u * <x, w> + h * r_y`, the prover sends
//! `D = Com(d, r_d)` and `Δ = u * <d, w> + h * r_δ` for a random mask `d`, receives a
//! challenge `e` and opens `f = e x + d` with blindings `z_x = e r_x + r_d` and
//! `z_y = e r_y + r_δ`. The verifier checks `Com(f, z_x) = e X + D` and
//! `u * <f, w> + h * z_y = e Y + Δ`.

use crate::{
    group::{inner_product, Element, Scalar, G1},
    params::Parameters,
    relation::{Dot, DotWitness, InnerProductArgument, Limits},
    transcript::Transcript,
};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, RangeCfg, Read, ReadExt, Write};
use rand::RngCore;

const LABEL_STATEMENT: &[u8] = b"ip_statement";
const LABEL_WEIGHTS: &[u8] = b"ip_weights";
const LABEL_MASK: &[u8] = b"ip_mask";
const LABEL_E: &[u8] = b"ip_e";

/// Hyrax-style dot-product argument.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hyrax;

/// Proof produced by [`Hyrax`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    pub d: G1,
    pub delta: G1,
    pub f: Vec<Scalar>,
    pub z_x: Scalar,
    pub z_y: Scalar,
}

fn bind(transcript: &mut Transcript, statement: &Dot<'_>) {
    transcript.append_points(LABEL_STATEMENT, &[statement.x, statement.y]);
    transcript.append_scalars(LABEL_WEIGHTS, statement.weights);
}

/// Returns `point * scalar + other`.
fn scale_add(point: &G1, scalar: &Scalar, other: &G1) -> G1 {
    let mut ret = *point;
    ret.mul(scalar);
    ret.add(other);
    ret
}

impl InnerProductArgument for Hyrax {
    type Proof = Proof;

    fn prove<R: RngCore>(
        rng: &mut R,
        transcript: &mut Transcript,
        params: &Parameters,
        statement: &Dot<'_>,
        witness: &DotWitness<'_>,
    ) -> Proof {
        bind(transcript, statement);

        let mask: Vec<Scalar> = (0..witness.x.len()).map(|_| Scalar::rand(rng)).collect();
        let r_d = Scalar::rand(rng);
        let r_delta = Scalar::rand(rng);
        let d = params.commit(&mask, &r_d);
        let delta = params.commit_scalar(&inner_product(&mask, statement.weights), &r_delta);
        transcript.append_points(LABEL_MASK, &[d, delta]);
        let e = transcript.challenge_scalar(LABEL_E);

        let f = witness
            .x
            .iter()
            .zip(&mask)
            .map(|(x, d)| {
                let mut f = *x;
                f.mul(&e);
                f.add(d);
                f
            })
            .collect();
        let mut z_x = witness.r_x;
        z_x.mul(&e);
        z_x.add(&r_d);
        let mut z_y = witness.r_y;
        z_y.mul(&e);
        z_y.add(&r_delta);
        Proof {
            d,
            delta,
            f,
            z_x,
            z_y,
        }
    }

    fn verify(
        transcript: &mut Transcript,
        params: &Parameters,
        statement: &Dot<'_>,
        proof: &Proof,
    ) -> bool {
        let length = statement.weights.len();
        if length == 0 || length > params.capacity() || proof.f.len() != length {
            return false;
        }
        bind(transcript, statement);
        transcript.append_points(LABEL_MASK, &[proof.d, proof.delta]);
        let e = transcript.challenge_scalar(LABEL_E);

        if params.commit(&proof.f, &proof.z_x) != scale_add(&statement.x, &e, &proof.d) {
            return false;
        }
        let opened = params.commit_scalar(&inner_product(&proof.f, statement.weights), &proof.z_y);
        opened == scale_add(&statement.y, &e, &proof.delta)
    }
}

impl Write for Proof {
    fn write(&self, buf: &mut impl BufMut) {
        self.d.write(buf);
        self.delta.write(buf);
        self.f.write(buf);
        self.z_x.write(buf);
        self.z_y.write(buf);
    }
}

impl EncodeSize for Proof {
    fn encode_size(&self) -> usize {
        self.d.encode_size()
            + self.delta.encode_size()
            + self.f.encode_size()
            + self.z_x.encode_size()
            + self.z_y.encode_size()
    }
}

impl Read for Proof {
    type Cfg = Limits;

    fn read_cfg(buf: &mut impl Buf, limits: &Limits) -> Result<Self, CodecError> {
        let d = G1::read(buf)?;
        let delta = G1::read(buf)?;
        let range: RangeCfg = (1..=limits.positions).into();
        let f = Vec::<Scalar>::read_cfg(buf, &(range, ()))?;
        let z_x = Scalar::read(buf)?;
        let z_y = Scalar::read(buf)?;
        Ok(Self {
            d,
            delta,
            f,
            z_x,
            z_y,
        })
    }
}

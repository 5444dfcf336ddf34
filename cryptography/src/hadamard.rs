//! Batched Hadamard-product argument.
//!
//! Proves, for `K` committed triples over vectors of length `m`, that
//! `a_c ∘ b_c = c_c` for every `c`, given `A_c = Com(a_c, r_a,c)`, `B_c = Com(b_c, r_b,c)`
//! and `C_c = Com(c_c, r_c,c)` against the wire basis.
//!
//! ## Protocol
//!
//! 1. Both parties bind `m` and all commitments, then derive the batching challenge `β`.
//! 2. The prover samples masks `d_a,c`, `d_b,c` and sends `D_a,c = Com(d_a,c, s_a,c)`,
//!    `D_b,c = Com(d_b,c, s_b,c)`, `T_1 = Com(Σ β^c (a_c ∘ d_b,c + d_a,c ∘ b_c), τ_1)` and
//!    `T_0 = Com(Σ β^c (d_a,c ∘ d_b,c), τ_0)`.
//! 3. Challenge `e`.
//! 4. The prover opens `f_a,c = e a_c + d_a,c`, `f_b,c = e b_c + d_b,c` with blindings
//!    `z_a,c`, `z_b,c`, and `z_t = e^2 Σ β^c r_c,c + e τ_1 + τ_0`.
//! 5. The verifier derives `ρ` from the responses and checks, in one combination, that every
//!    `f` opens `e A_c + D_a,c` (resp. `e B_c + D_b,c`), then that
//!    `Com(Σ β^c f_a,c ∘ f_b,c, z_t) = e^2 Σ β^c C_c + e T_1 + T_0`.

use crate::{
    group::{Element, Scalar, G1},
    params::Parameters,
    relation::{HadamardArgument, Limits, Triples, TriplesWitness},
    transcript::Transcript,
};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, RangeCfg, Read, ReadExt, Write};
use rand::RngCore;

const LABEL_LENGTH: &[u8] = b"hp_length";
const LABEL_A: &[u8] = b"hp_a";
const LABEL_B: &[u8] = b"hp_b";
const LABEL_C: &[u8] = b"hp_c";
const LABEL_BETA: &[u8] = b"hp_beta";
const LABEL_D_A: &[u8] = b"hp_d_a";
const LABEL_D_B: &[u8] = b"hp_d_b";
const LABEL_T: &[u8] = b"hp_t";
const LABEL_E: &[u8] = b"hp_e";
const LABEL_F: &[u8] = b"hp_f";
const LABEL_Z: &[u8] = b"hp_z";
const LABEL_RHO: &[u8] = b"hp_rho";

/// The batched Hadamard-product argument.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batched;

/// Proof produced by [`Batched`].
///
/// `f_a` and `f_b` are stored row-major (`K` rows of `m` scalars).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    pub d_a: Vec<G1>,
    pub d_b: Vec<G1>,
    pub t_1: G1,
    pub t_0: G1,
    pub f_a: Vec<Scalar>,
    pub f_b: Vec<Scalar>,
    pub z_a: Vec<Scalar>,
    pub z_b: Vec<Scalar>,
    pub z_t: Scalar,
}

fn bind(transcript: &mut Transcript, statement: &Triples) -> Vec<Scalar> {
    transcript.append_u64(LABEL_LENGTH, statement.length as u64);
    transcript.append_points(LABEL_A, &statement.a);
    transcript.append_points(LABEL_B, &statement.b);
    transcript.append_points(LABEL_C, &statement.c);
    transcript
        .challenge_scalar(LABEL_BETA)
        .powers(statement.a.len())
}

/// Returns `e * x + d`.
fn mask(e: &Scalar, x: &Scalar, d: &Scalar) -> Scalar {
    let mut ret = *x;
    ret.mul(e);
    ret.add(d);
    ret
}

impl HadamardArgument for Batched {
    type Proof = Proof;

    fn prove<R: RngCore>(
        rng: &mut R,
        transcript: &mut Transcript,
        params: &Parameters,
        statement: &Triples,
        witness: &TriplesWitness,
    ) -> Proof {
        let triples = statement.a.len();
        let m = statement.length;
        let betas = bind(transcript, statement);

        // Masks and their commitments
        let mut d_a = Vec::with_capacity(triples);
        let mut d_b = Vec::with_capacity(triples);
        let mut s_a = Vec::with_capacity(triples);
        let mut s_b = Vec::with_capacity(triples);
        let mut com_d_a = Vec::with_capacity(triples);
        let mut com_d_b = Vec::with_capacity(triples);
        for _ in 0..triples {
            let da: Vec<Scalar> = (0..m).map(|_| Scalar::rand(rng)).collect();
            let db: Vec<Scalar> = (0..m).map(|_| Scalar::rand(rng)).collect();
            let sa = Scalar::rand(rng);
            let sb = Scalar::rand(rng);
            com_d_a.push(params.commit(&da, &sa));
            com_d_b.push(params.commit(&db, &sb));
            d_a.push(da);
            d_b.push(db);
            s_a.push(sa);
            s_b.push(sb);
        }

        // Cross and square terms of the masked product
        let mut t_1 = vec![Scalar::zero(); m];
        let mut t_0 = vec![Scalar::zero(); m];
        for c in 0..triples {
            for t in 0..m {
                let mut cross = witness.a[c][t];
                cross.mul(&d_b[c][t]);
                let mut other = d_a[c][t];
                other.mul(&witness.b[c][t]);
                cross.add(&other);
                cross.mul(&betas[c]);
                t_1[t].add(&cross);

                let mut square = d_a[c][t];
                square.mul(&d_b[c][t]);
                square.mul(&betas[c]);
                t_0[t].add(&square);
            }
        }
        let tau_1 = Scalar::rand(rng);
        let tau_0 = Scalar::rand(rng);
        let com_t_1 = params.commit(&t_1, &tau_1);
        let com_t_0 = params.commit(&t_0, &tau_0);

        transcript.append_points(LABEL_D_A, &com_d_a);
        transcript.append_points(LABEL_D_B, &com_d_b);
        transcript.append_points(LABEL_T, &[com_t_1, com_t_0]);
        let e = transcript.challenge_scalar(LABEL_E);

        // Responses
        let mut f_a = Vec::with_capacity(triples * m);
        let mut f_b = Vec::with_capacity(triples * m);
        let mut z_a = Vec::with_capacity(triples);
        let mut z_b = Vec::with_capacity(triples);
        let mut z_t = Scalar::zero();
        for c in 0..triples {
            for t in 0..m {
                f_a.push(mask(&e, &witness.a[c][t], &d_a[c][t]));
                f_b.push(mask(&e, &witness.b[c][t], &d_b[c][t]));
            }
            z_a.push(mask(&e, &witness.r_a[c], &s_a[c]));
            z_b.push(mask(&e, &witness.r_b[c], &s_b[c]));
            let mut r_c = witness.r_c[c];
            r_c.mul(&betas[c]);
            z_t.add(&r_c);
        }
        z_t.mul(&e);
        z_t.add(&tau_1);
        z_t.mul(&e);
        z_t.add(&tau_0);

        let proof = Proof {
            d_a: com_d_a,
            d_b: com_d_b,
            t_1: com_t_1,
            t_0: com_t_0,
            f_a,
            f_b,
            z_a,
            z_b,
            z_t,
        };
        absorb_responses(transcript, &proof).challenge_scalar(LABEL_RHO);
        proof
    }

    fn verify(
        transcript: &mut Transcript,
        params: &Parameters,
        statement: &Triples,
        proof: &Proof,
    ) -> bool {
        let triples = statement.a.len();
        let m = statement.length;
        if m == 0 || m > params.capacity() {
            return false;
        }
        if statement.b.len() != triples
            || statement.c.len() != triples
            || proof.d_a.len() != triples
            || proof.d_b.len() != triples
            || proof.z_a.len() != triples
            || proof.z_b.len() != triples
            || proof.f_a.len() != triples * m
            || proof.f_b.len() != triples * m
        {
            return false;
        }
        let betas = bind(transcript, statement);
        transcript.append_points(LABEL_D_A, &proof.d_a);
        transcript.append_points(LABEL_D_B, &proof.d_b);
        transcript.append_points(LABEL_T, &[proof.t_1, proof.t_0]);
        let e = transcript.challenge_scalar(LABEL_E);
        let rhos = absorb_responses(transcript, proof)
            .challenge_scalar(LABEL_RHO)
            .powers(2 * triples);

        // Openings: Com(Σ ρ^c f_a,c + ρ^(K+c) f_b,c, ...) = Σ ρ^c (e A_c + D_a,c) + ρ^(K+c) (e B_c + D_b,c)
        let mut f = vec![Scalar::zero(); m];
        let mut z = Scalar::zero();
        let mut points = Vec::with_capacity(4 * triples);
        let mut scalars = Vec::with_capacity(4 * triples);
        for c in 0..triples {
            let (rho_a, rho_b) = (&rhos[c], &rhos[triples + c]);
            for t in 0..m {
                let mut term = proof.f_a[c * m + t];
                term.mul(rho_a);
                f[t].add(&term);
                let mut term = proof.f_b[c * m + t];
                term.mul(rho_b);
                f[t].add(&term);
            }
            let mut term = proof.z_a[c];
            term.mul(rho_a);
            z.add(&term);
            let mut term = proof.z_b[c];
            term.mul(rho_b);
            z.add(&term);

            let mut rho_a_e = *rho_a;
            rho_a_e.mul(&e);
            let mut rho_b_e = *rho_b;
            rho_b_e.mul(&e);
            points.extend_from_slice(&[statement.a[c], statement.b[c], proof.d_a[c], proof.d_b[c]]);
            scalars.extend_from_slice(&[rho_a_e, rho_b_e, *rho_a, *rho_b]);
        }
        if params.commit(&f, &z) != G1::msm(&points, &scalars) {
            return false;
        }

        // Product: Com(Σ β^c f_a,c ∘ f_b,c, z_t) = e^2 Σ β^c C_c + e T_1 + T_0
        let mut product = vec![Scalar::zero(); m];
        for c in 0..triples {
            for t in 0..m {
                let mut term = proof.f_a[c * m + t];
                term.mul(&proof.f_b[c * m + t]);
                term.mul(&betas[c]);
                product[t].add(&term);
            }
        }
        let mut e_squared = e;
        e_squared.mul(&e);
        let mut scalars: Vec<Scalar> = betas
            .iter()
            .map(|beta| {
                let mut s = *beta;
                s.mul(&e_squared);
                s
            })
            .collect();
        let mut points = statement.c.clone();
        points.extend_from_slice(&[proof.t_1, proof.t_0]);
        scalars.extend_from_slice(&[e, Scalar::one()]);
        params.commit(&product, &proof.z_t) == G1::msm(&points, &scalars)
    }
}

fn absorb_responses<'a>(transcript: &'a mut Transcript, proof: &Proof) -> &'a mut Transcript {
    transcript.append_scalars(LABEL_F, &proof.f_a);
    transcript.append_scalars(LABEL_F, &proof.f_b);
    transcript.append_scalars(LABEL_Z, &proof.z_a);
    transcript.append_scalars(LABEL_Z, &proof.z_b);
    transcript.append_scalar(LABEL_Z, &proof.z_t);
    transcript
}

impl Write for Proof {
    fn write(&self, buf: &mut impl BufMut) {
        self.d_a.write(buf);
        self.d_b.write(buf);
        self.t_1.write(buf);
        self.t_0.write(buf);
        self.f_a.write(buf);
        self.f_b.write(buf);
        self.z_a.write(buf);
        self.z_b.write(buf);
        self.z_t.write(buf);
    }
}

impl EncodeSize for Proof {
    fn encode_size(&self) -> usize {
        self.d_a.encode_size()
            + self.d_b.encode_size()
            + self.t_1.encode_size()
            + self.t_0.encode_size()
            + self.f_a.encode_size()
            + self.f_b.encode_size()
            + self.z_a.encode_size()
            + self.z_b.encode_size()
            + self.z_t.encode_size()
    }
}

impl Read for Proof {
    type Cfg = Limits;

    fn read_cfg(buf: &mut impl Buf, limits: &Limits) -> Result<Self, CodecError> {
        let triples: RangeCfg = (limits.triples..=limits.triples).into();
        let responses: RangeCfg = (0..=limits.triples * limits.positions).into();
        let d_a = Vec::<G1>::read_cfg(buf, &(triples.clone(), ()))?;
        let d_b = Vec::<G1>::read_cfg(buf, &(triples.clone(), ()))?;
        let t_1 = G1::read(buf)?;
        let t_0 = G1::read(buf)?;
        let f_a = Vec::<Scalar>::read_cfg(buf, &(responses.clone(), ()))?;
        let f_b = Vec::<Scalar>::read_cfg(buf, &(responses, ()))?;
        if f_a.len() != f_b.len() {
            return Err(CodecError::Invalid("hadamard::Proof", "response length mismatch"));
        }
        let z_a = Vec::<Scalar>::read_cfg(buf, &(triples.clone(), ()))?;
        let z_b = Vec::<Scalar>::read_cfg(buf, &(triples, ()))?;
        let z_t = Scalar::read(buf)?;
        Ok(Self {
            d_a,
            d_b,
            t_1,
            t_0,
            f_a,
            f_b,
            z_a,
            z_b,
            z_t,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Config;
    use commonware_codec::{Decode, Encode};
    use rand::{rngs::StdRng, SeedableRng};

    struct Instance {
        statement: Triples,
        witness: TriplesWitness,
    }

    fn instance(params: &Parameters, rng: &mut StdRng, triples: usize, m: usize) -> Instance {
        let mut witness = TriplesWitness {
            a: Vec::new(),
            b: Vec::new(),
            r_a: Vec::new(),
            r_b: Vec::new(),
            r_c: Vec::new(),
        };
        let mut statement = Triples {
            length: m,
            a: Vec::new(),
            b: Vec::new(),
            c: Vec::new(),
        };
        for _ in 0..triples {
            let a: Vec<Scalar> = (0..m).map(|_| Scalar::rand(rng)).collect();
            let b: Vec<Scalar> = (0..m).map(|_| Scalar::rand(rng)).collect();
            let c: Vec<Scalar> = a
                .iter()
                .zip(&b)
                .map(|(x, y)| {
                    let mut z = *x;
                    z.mul(y);
                    z
                })
                .collect();
            let (r_a, r_b, r_c) = (Scalar::rand(rng), Scalar::rand(rng), Scalar::rand(rng));
            statement.a.push(params.commit(&a, &r_a));
            statement.b.push(params.commit(&b, &r_b));
            statement.c.push(params.commit(&c, &r_c));
            witness.a.push(a);
            witness.b.push(b);
            witness.r_a.push(r_a);
            witness.r_b.push(r_b);
            witness.r_c.push(r_c);
        }
        Instance { statement, witness }
    }

    fn params() -> Parameters {
        Parameters::new(&Config {
            wire_generators: 8,
            row_generators: 1,
        })
    }

    #[test]
    fn test_prove_verify() {
        let params = params();
        let mut rng = StdRng::seed_from_u64(0);
        let Instance { statement, witness } = instance(&params, &mut rng, 3, 5);

        let mut transcript = Transcript::new(&[0u8; 32]);
        let proof = Batched::prove(&mut rng, &mut transcript, &params, &statement, &witness);

        let mut verifier = Transcript::new(&[0u8; 32]);
        assert!(Batched::verify(&mut verifier, &params, &statement, &proof));
        assert_eq!(transcript, verifier);

        // A different transcript seed yields different challenges.
        let mut other = Transcript::new(&[1u8; 32]);
        assert!(!Batched::verify(&mut other, &params, &statement, &proof));
    }

    #[test]
    fn test_rejects_wrong_product() {
        let params = params();
        let mut rng = StdRng::seed_from_u64(1);
        let Instance {
            mut statement,
            witness,
        } = instance(&params, &mut rng, 2, 4);

        // Replace the last product commitment with one that does not open to a ∘ b.
        let bogus: Vec<Scalar> = (0..4).map(|_| Scalar::rand(&mut rng)).collect();
        statement.c[1] = params.commit(&bogus, &witness.r_c[1]);

        let mut transcript = Transcript::new(&[0u8; 32]);
        let proof = Batched::prove(&mut rng, &mut transcript, &params, &statement, &witness);
        let mut verifier = Transcript::new(&[0u8; 32]);
        assert!(!Batched::verify(&mut verifier, &params, &statement, &proof));
    }

    #[test]
    fn test_rejects_tampered_proof() {
        let params = params();
        let mut rng = StdRng::seed_from_u64(2);
        let Instance { statement, witness } = instance(&params, &mut rng, 2, 3);
        let mut transcript = Transcript::new(&[0u8; 32]);
        let proof = Batched::prove(&mut rng, &mut transcript, &params, &statement, &witness);

        let mut tampered = proof.clone();
        tampered.f_a[4].add(&Scalar::one());
        let mut verifier = Transcript::new(&[0u8; 32]);
        assert!(!Batched::verify(&mut verifier, &params, &statement, &tampered));

        let mut tampered = proof.clone();
        tampered.z_t.add(&Scalar::one());
        let mut verifier = Transcript::new(&[0u8; 32]);
        assert!(!Batched::verify(&mut verifier, &params, &statement, &tampered));

        let mut tampered = proof;
        tampered.f_b.pop();
        let mut verifier = Transcript::new(&[0u8; 32]);
        assert!(!Batched::verify(&mut verifier, &params, &statement, &tampered));
    }

    #[test]
    fn test_codec() {
        let params = params();
        let mut rng = StdRng::seed_from_u64(3);
        let Instance { statement, witness } = instance(&params, &mut rng, 2, 3);
        let mut transcript = Transcript::new(&[0u8; 32]);
        let proof = Batched::prove(&mut rng, &mut transcript, &params, &statement, &witness);

        let encoded = proof.encode();
        assert_eq!(encoded.len(), proof.encode_size());
        let limits = Limits {
            triples: 2,
            positions: 8,
        };
        let decoded = Proof::decode_cfg(encoded.clone(), &limits).unwrap();
        assert_eq!(decoded, proof);

        // Wrong triple count is rejected.
        let limits = Limits {
            triples: 3,
            positions: 8,
        };
        assert!(Proof::decode_cfg(encoded, &limits).is_err());
    }
}

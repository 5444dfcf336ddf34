//! Prove and verify a single bounded VRS instance.
//!
//! The prover evaluates the scheme at every position, commits each wire row (`var_coms`),
//! and delegates:
//!
//! - the constraint system to a [`HadamardArgument`] over per-constraint commitments
//!   derived homomorphically from `var_coms`, and
//! - the weighted output sum to an [`InnerProductArgument`] against
//!   `com_vw = u * <v, w> + h * vw_com_r`.
//!
//! The plaintext wire is committed without blinding so the verifier can recompute it, and
//! the key wire is committed with exactly `key_com_r` so that `var_coms[KEY_WIRE]` is the
//! key commitment `h * key_com_r + (sum_t g_t) * key`.

use crate::{
    scheme::{Scheme, KEY_WIRE, PLAIN_WIRE},
    Context, Error,
};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, RangeCfg, Read, ReadExt, Write};
use pod_cryptography::{
    group::inner_product,
    relation::{Dot, DotWitness, Triples, TriplesWitness},
    Element, HadamardArgument, InnerProductArgument, Limits, Policy, Scalar, Seed, Transcript,
    G1,
};
use pod_parallel::Executor;
use rand::RngCore;

const LABEL_COUNT: &[u8] = b"vrs_count";
const LABEL_SCHEME: &[u8] = b"vrs_scheme";
const LABEL_VAR_COMS: &[u8] = b"vrs_var_coms";
const LABEL_COM_VW: &[u8] = b"vrs_com_vw";
const LABEL_HADAMARD: &[u8] = b"vrs_hadamard";
const LABEL_INNER_PRODUCT: &[u8] = b"vrs_inner_product";

/// Secret input of a VRS proof.
#[derive(Clone)]
pub struct Secret {
    pub key: Scalar,
    pub key_com_r: Scalar,
    pub vw_com_r: Scalar,
}

impl Secret {
    /// Samples a fresh key and fresh blindings.
    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        Self {
            key: Scalar::rand(rng),
            key_com_r: Scalar::rand(rng),
            vw_com_r: Scalar::rand(rng),
        }
    }
}

/// Per-wire commitments of one shard and their blindings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commitments {
    pub var_coms: Vec<G1>,
    pub var_coms_r: Vec<Scalar>,
}

/// Public output of a VRS proof: `key_com = h * key_com_r + g * key`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Output {
    pub g: G1,
    pub h: G1,
    pub key_com: G1,
}

/// Proof of one shard.
pub struct Proof<P: Policy> {
    pub var_coms: Vec<G1>,
    pub com_vw: G1,
    pub hadamard: <P::Hadamard as HadamardArgument>::Proof,
    pub inner_product: <P::InnerProduct as InnerProductArgument>::Proof,
}

// Implemented by hand: `derive` would also require `P::Hadamard` and `P::InnerProduct`
// themselves to implement these traits, not just their proof types.
impl<P: Policy> Clone for Proof<P> {
    fn clone(&self) -> Self {
        Self {
            var_coms: self.var_coms.clone(),
            com_vw: self.com_vw.clone(),
            hadamard: self.hadamard.clone(),
            inner_product: self.inner_product.clone(),
        }
    }
}

impl<P: Policy> std::fmt::Debug for Proof<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proof")
            .field("var_coms", &self.var_coms)
            .field("com_vw", &self.com_vw)
            .field("hadamard", &self.hadamard)
            .field("inner_product", &self.inner_product)
            .finish()
    }
}

impl<P: Policy> PartialEq for Proof<P> {
    fn eq(&self, other: &Self) -> bool {
        self.var_coms == other.var_coms
            && self.com_vw == other.com_vw
            && self.hadamard == other.hadamard
            && self.inner_product == other.inner_product
    }
}

impl<P: Policy> Eq for Proof<P> {}

/// Bounds applied when decoding a [`Proof`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofCfg {
    pub wires: usize,
    pub constraints: usize,
    pub positions: usize,
}

impl ProofCfg {
    /// Returns the bounds for proofs of `scheme` with at most `positions` positions.
    pub fn new<S: Scheme>(scheme: &S, positions: usize) -> Self {
        Self {
            wires: scheme.wires(),
            constraints: scheme.constraints().len(),
            positions,
        }
    }
}

/// Evaluates the scheme at every position and returns the witness as wire rows
/// (`rows[wire][position]`).
pub fn witness<S: Scheme, E: Executor>(
    ctx: &Context<'_, S, E>,
    plain: &[Scalar],
    key: &Scalar,
) -> Vec<Vec<Scalar>> {
    let assignments = ctx
        .executor
        .map_range(plain.len(), |t| ctx.scheme.assign(&plain[t], key));
    (0..ctx.scheme.wires())
        .map(|wire| assignments.iter().map(|a| a[wire]).collect())
        .collect()
}

/// Returns wire blindings: zero for the plaintext, `key_com_r` for the key, random otherwise.
pub fn blindings<R: RngCore>(rng: &mut R, wires: usize, key_com_r: &Scalar) -> Vec<Scalar> {
    (0..wires)
        .map(|wire| match wire {
            PLAIN_WIRE => Scalar::zero(),
            KEY_WIRE => *key_com_r,
            _ => Scalar::rand(rng),
        })
        .collect()
}

/// Commits every wire row with its blinding.
pub fn commit<S: Scheme, E: Executor>(
    ctx: &Context<'_, S, E>,
    rows: &[Vec<Scalar>],
    var_coms_r: &[Scalar],
) -> Vec<G1> {
    ctx.executor
        .map_range(rows.len(), |wire| {
            ctx.params.commit(&rows[wire], &var_coms_r[wire])
        })
}

/// Computes fresh commitments for the positions of `plain`.
pub fn commitments<R: RngCore, S: Scheme, E: Executor>(
    rng: &mut R,
    ctx: &Context<'_, S, E>,
    plain: &[Scalar],
    key: &Scalar,
    key_com_r: &Scalar,
) -> Commitments {
    let rows = witness(ctx, plain, key);
    let var_coms_r = blindings(rng, ctx.scheme.wires(), key_com_r);
    let var_coms = commit(ctx, &rows, &var_coms_r);
    Commitments {
        var_coms,
        var_coms_r,
    }
}

fn transcript(seed: &Seed, count: usize, scheme: &str, var_coms: &[G1], com_vw: &G1) -> Transcript {
    let mut transcript = Transcript::new(seed);
    transcript.append_u64(LABEL_COUNT, count as u64);
    transcript.append_bytes(LABEL_SCHEME, scheme.as_bytes());
    transcript.append_points(LABEL_VAR_COMS, var_coms);
    transcript.append_point(LABEL_COM_VW, com_vw);
    transcript
}

/// Derives the per-constraint commitments from the wire commitments.
fn statement<S: Scheme, E: Executor>(
    ctx: &Context<'_, S, E>,
    var_coms: &[G1],
    length: usize,
) -> Triples {
    let ones = ctx.params.sigma_g(length);
    let constraints = ctx.scheme.constraints();
    let coms = ctx.executor.map_range(constraints.len(), |c| {
        let constraint = &constraints[c];
        (
            constraint.a.commitment(var_coms, &ones),
            constraint.b.commitment(var_coms, &ones),
            constraint.c.commitment(var_coms, &ones),
        )
    });
    let mut triples = Triples {
        length,
        a: Vec::with_capacity(coms.len()),
        b: Vec::with_capacity(coms.len()),
        c: Vec::with_capacity(coms.len()),
    };
    for (a, b, c) in coms {
        triples.a.push(a);
        triples.b.push(b);
        triples.c.push(c);
    }
    triples
}

fn check_lengths<S: Scheme, E: Executor>(
    ctx: &Context<'_, S, E>,
    plain: &[Scalar],
    weights: &[Scalar],
) -> Result<usize, Error> {
    let count = plain.len();
    if count == 0 {
        return Err(Error::Empty);
    }
    if count > ctx.max_shard() {
        return Err(Error::ShardTooLarge(count, ctx.max_shard()));
    }
    if weights.len() != count {
        return Err(Error::LengthMismatch(count, weights.len()));
    }
    Ok(count)
}

/// Proves that `v_t = scheme(plain[t], secret.key)` and that `<v, weights>` opens `com_vw`.
///
/// When `cached` commitments are provided they are used instead of committing the witness
/// (they must have been computed over the same plaintexts and key).
pub fn prove<R: RngCore, S: Scheme, P: Policy, E: Executor>(
    rng: &mut R,
    ctx: &Context<'_, S, E>,
    seed: &Seed,
    plain: &[Scalar],
    weights: &[Scalar],
    secret: &Secret,
    cached: Option<Commitments>,
) -> Result<(Proof<P>, Output), Error> {
    let count = check_lengths(ctx, plain, weights)?;
    let wires = ctx.scheme.wires();
    let output_wire = wires - 1;
    let rows = witness(ctx, plain, &secret.key);
    let Commitments {
        var_coms,
        var_coms_r,
    } = match cached {
        Some(cached) => {
            if cached.var_coms.len() != wires
                || cached.var_coms_r.len() != wires
                || cached.var_coms_r[PLAIN_WIRE] != Scalar::zero()
                || cached.var_coms_r[KEY_WIRE] != secret.key_com_r
            {
                return Err(Error::InvalidCachedCommitments);
            }
            cached
        }
        None => {
            let var_coms_r = blindings(rng, wires, &secret.key_com_r);
            let var_coms = commit(ctx, &rows, &var_coms_r);
            Commitments {
                var_coms,
                var_coms_r,
            }
        }
    };

    let vw = inner_product(&rows[output_wire], weights);
    let com_vw = ctx.params.commit_scalar(&vw, &secret.vw_com_r);
    let transcript = transcript(seed, count, ctx.scheme.name(), &var_coms, &com_vw);

    // Constraint system
    let statement = statement(ctx, &var_coms, count);
    let constraints = ctx.scheme.constraints();
    let (a, b): (Vec<_>, Vec<_>) = ctx
        .executor
        .map_range(constraints.len(), |c| {
            (
                constraints[c].a.evaluate_rows(&rows, count),
                constraints[c].b.evaluate_rows(&rows, count),
            )
        })
        .into_iter()
        .unzip();
    let witness = TriplesWitness {
        a,
        b,
        r_a: constraints.iter().map(|c| c.a.blinding(&var_coms_r)).collect(),
        r_b: constraints.iter().map(|c| c.b.blinding(&var_coms_r)).collect(),
        r_c: constraints.iter().map(|c| c.c.blinding(&var_coms_r)).collect(),
    };
    let hadamard = P::Hadamard::prove(
        rng,
        &mut transcript.fork(LABEL_HADAMARD),
        ctx.params,
        &statement,
        &witness,
    );

    // Weighted output sum
    let dot = Dot {
        x: var_coms[output_wire],
        y: com_vw,
        weights,
    };
    let dot_witness = DotWitness {
        x: &rows[output_wire],
        r_x: var_coms_r[output_wire],
        r_y: secret.vw_com_r,
    };
    let inner_product = P::InnerProduct::prove(
        rng,
        &mut transcript.fork(LABEL_INNER_PRODUCT),
        ctx.params,
        &dot,
        &dot_witness,
    );

    let output = Output {
        g: ctx.params.sigma_g(count),
        h: *ctx.params.h(),
        key_com: var_coms[KEY_WIRE],
    };
    Ok((
        Proof {
            var_coms,
            com_vw,
            hadamard,
            inner_product,
        },
        output,
    ))
}

/// Verifies a shard proof over the public plaintexts and weights.
pub fn verify<S: Scheme, P: Policy, E: Executor>(
    ctx: &Context<'_, S, E>,
    seed: &Seed,
    plain: &[Scalar],
    weights: &[Scalar],
    proof: &Proof<P>,
) -> Result<Output, Error> {
    let count = check_lengths(ctx, plain, weights)?;
    let wires = ctx.scheme.wires();
    if proof.var_coms.len() != wires {
        return Err(Error::LengthMismatch(wires, proof.var_coms.len()));
    }

    // The plaintext wire must be the unblinded commitment to the public sequence.
    if ctx.params.commit(plain, &Scalar::zero()) != proof.var_coms[PLAIN_WIRE] {
        return Err(Error::PlainMismatch);
    }

    let transcript = transcript(
        seed,
        count,
        ctx.scheme.name(),
        &proof.var_coms,
        &proof.com_vw,
    );
    let statement = statement(ctx, &proof.var_coms, count);
    let dot = Dot {
        x: proof.var_coms[wires - 1],
        y: proof.com_vw,
        weights,
    };
    let (hadamard, inner_product) = ctx.executor.join(
        || {
            P::Hadamard::verify(
                &mut transcript.fork(LABEL_HADAMARD),
                ctx.params,
                &statement,
                &proof.hadamard,
            )
        },
        || {
            P::InnerProduct::verify(
                &mut transcript.fork(LABEL_INNER_PRODUCT),
                ctx.params,
                &dot,
                &proof.inner_product,
            )
        },
    );
    if !hadamard {
        return Err(Error::HadamardRejected);
    }
    if !inner_product {
        return Err(Error::InnerProductRejected);
    }

    Ok(Output {
        g: ctx.params.sigma_g(count),
        h: *ctx.params.h(),
        key_com: proof.var_coms[KEY_WIRE],
    })
}

impl<P: Policy> Write for Proof<P> {
    fn write(&self, buf: &mut impl BufMut) {
        self.var_coms.write(buf);
        self.com_vw.write(buf);
        self.hadamard.write(buf);
        self.inner_product.write(buf);
    }
}

impl<P: Policy> EncodeSize for Proof<P> {
    fn encode_size(&self) -> usize {
        self.var_coms.encode_size()
            + self.com_vw.encode_size()
            + self.hadamard.encode_size()
            + self.inner_product.encode_size()
    }
}

impl<P: Policy> Read for Proof<P> {
    type Cfg = ProofCfg;

    fn read_cfg(buf: &mut impl Buf, cfg: &ProofCfg) -> Result<Self, CodecError> {
        let wires: RangeCfg = (cfg.wires..=cfg.wires).into();
        let var_coms = Vec::<G1>::read_cfg(buf, &(wires, ()))?;
        let com_vw = G1::read(buf)?;
        let hadamard = <P::Hadamard as HadamardArgument>::Proof::read_cfg(
            buf,
            &Limits {
                triples: cfg.constraints,
                positions: cfg.positions,
            },
        )?;
        let inner_product = <P::InnerProduct as InnerProductArgument>::Proof::read_cfg(
            buf,
            &Limits {
                triples: 0,
                positions: cfg.positions,
            },
        )?;
        Ok(Self {
            var_coms,
            com_vw,
            hadamard,
            inner_product,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{plain, scheme::Mimc5};
    use commonware_codec::{Decode, Encode};
    use commonware_macros::test_traced;
    use pod_cryptography::{Config, Parameters, Standard};
    use pod_parallel::{Parallel, Sequential};
    use rand::{rngs::StdRng, SeedableRng};

    fn params() -> Parameters {
        Parameters::new(&Config {
            wire_generators: 8,
            row_generators: 1,
        })
    }

    fn weights(rng: &mut StdRng, n: usize) -> Vec<Scalar> {
        (0..n).map(|_| Scalar::rand(rng)).collect()
    }

    #[test_traced]
    fn test_prove_verify() {
        let params = params();
        let scheme = Mimc5::new();
        let executor = Parallel::with_concurrency(2).unwrap();
        let ctx = Context::new(&params, &scheme, &executor);
        let mut rng = StdRng::seed_from_u64(0);

        let seed = [1u8; 32];
        let plain = plain::sequence(&executor, &seed, 6);
        let weights = weights(&mut rng, 6);
        let secret = Secret::random(&mut rng);
        let (proof, output) =
            prove::<_, _, Standard, _>(&mut rng, &ctx, &seed, &plain, &weights, &secret, None)
                .unwrap();

        // Receipt opens with the secret
        let mut expected = output.g;
        expected.mul(&secret.key);
        let mut blind = output.h;
        blind.mul(&secret.key_com_r);
        expected.add(&blind);
        assert_eq!(output.key_com, expected);

        // Weighted sum opens com_vw
        let v: Vec<Scalar> = plain.iter().map(|p| scheme.generate(p, &secret.key)).collect();
        let vw = inner_product(&v, &weights);
        assert_eq!(proof.com_vw, params.commit_scalar(&vw, &secret.vw_com_r));

        assert_eq!(verify(&ctx, &seed, &plain, &weights, &proof).unwrap(), output);

        // Sequential verification agrees
        let sequential = Context::new(&params, &scheme, &Sequential);
        assert_eq!(
            verify(&sequential, &seed, &plain, &weights, &proof).unwrap(),
            output
        );
    }

    #[test]
    fn test_rejections() {
        let params = params();
        let scheme = Mimc5::new();
        let ctx = Context::new(&params, &scheme, &Sequential);
        let mut rng = StdRng::seed_from_u64(1);

        let seed = [2u8; 32];
        let plain = plain::sequence(&Sequential, &seed, 4);
        let weights = weights(&mut rng, 4);
        let secret = Secret::random(&mut rng);
        let (proof, _) =
            prove::<_, _, Standard, _>(&mut rng, &ctx, &seed, &plain, &weights, &secret, None)
                .unwrap();

        // Substituted plaintext
        let other = plain::sequence(&Sequential, &[3u8; 32], 4);
        assert!(matches!(
            verify(&ctx, &seed, &other, &weights, &proof),
            Err(Error::PlainMismatch)
        ));

        // Tampered intermediate wire
        let mut tampered = proof.clone();
        tampered.var_coms[7].add(params.h());
        assert!(matches!(
            verify(&ctx, &seed, &plain, &weights, &tampered),
            Err(Error::HadamardRejected)
        ));

        // Different weights (not bound by the constraint argument)
        let other_weights = self::weights(&mut rng, 4);
        assert!(matches!(
            verify(&ctx, &seed, &plain, &other_weights, &proof),
            Err(Error::InnerProductRejected)
        ));

        // Different transcript seed
        assert!(verify(&ctx, &[9u8; 32], &plain, &weights, &proof).is_err());

        // Oversized and mismatched instances
        let long = plain::sequence(&Sequential, &seed, 9);
        assert!(matches!(
            verify(&ctx, &seed, &long, &self::weights(&mut rng, 9), &proof),
            Err(Error::ShardTooLarge(9, 8))
        ));
        assert!(matches!(
            verify(&ctx, &seed, &plain, &weights[..3], &proof),
            Err(Error::LengthMismatch(4, 3))
        ));
    }

    #[test]
    fn test_cached_commitments() {
        let params = params();
        let scheme = Mimc5::new();
        let ctx = Context::new(&params, &scheme, &Sequential);
        let mut rng = StdRng::seed_from_u64(2);

        let seed = [4u8; 32];
        let plain = plain::sequence(&Sequential, &seed, 5);
        let weights = weights(&mut rng, 5);
        let secret = Secret::random(&mut rng);
        let cached = commitments(&mut rng, &ctx, &plain, &secret.key, &secret.key_com_r);
        let (proof, output) = prove::<_, _, Standard, _>(
            &mut rng,
            &ctx,
            &seed,
            &plain,
            &weights,
            &secret,
            Some(cached.clone()),
        )
        .unwrap();
        assert_eq!(proof.var_coms, cached.var_coms);
        assert_eq!(verify(&ctx, &seed, &plain, &weights, &proof).unwrap(), output);

        // Cached commitments must carry the key blinding
        let mut wrong = cached;
        wrong.var_coms_r[KEY_WIRE].add(&Scalar::one());
        assert!(matches!(
            prove::<_, _, Standard, _>(
                &mut rng,
                &ctx,
                &seed,
                &plain,
                &weights,
                &secret,
                Some(wrong)
            ),
            Err(Error::InvalidCachedCommitments)
        ));
    }

    #[test]
    fn test_codec() {
        let params = params();
        let scheme = Mimc5::new();
        let ctx = Context::new(&params, &scheme, &Sequential);
        let mut rng = StdRng::seed_from_u64(3);

        let seed = [5u8; 32];
        let plain = plain::sequence(&Sequential, &seed, 3);
        let weights = weights(&mut rng, 3);
        let secret = Secret::random(&mut rng);
        let (proof, _) =
            prove::<_, _, Standard, _>(&mut rng, &ctx, &seed, &plain, &weights, &secret, None)
                .unwrap();

        let cfg = ProofCfg::new(&scheme, params.capacity());
        let encoded = proof.encode();
        assert_eq!(encoded.len(), proof.encode_size());
        let decoded = Proof::<Standard>::decode_cfg(encoded.clone(), &cfg).unwrap();
        assert_eq!(decoded, proof);

        // Truncated input
        let truncated = &encoded[..encoded.len() - 1];
        assert!(Proof::<Standard>::decode_cfg(truncated, &cfg).is_err());
    }
}

//! Prove and verify instances of any size by splitting them into shards.
//!
//! Positions are split into consecutive shards of at most [`Context::max_shard`] positions
//! (only the last shard may be shorter). Every shard is proven independently from the same
//! transcript seed (shards are told apart by their plaintexts). The key blinding and the
//! weighted-sum blinding are split additively across shards so that the merged outputs
//! open with the caller's [`Secret`].

use crate::{
    cache::Cache,
    scheme::{Scheme, KEY_WIRE},
    shard::{self, Commitments, Output, Proof, Secret},
    Context, Error,
};
use pod_cryptography::{Element, Policy, Scalar, Seed, G1};
use pod_parallel::Executor;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::ops::Range;
use tracing::debug;

/// Splits `count` positions into consecutive ranges of at most `max_shard` positions.
pub fn split(count: usize, max_shard: usize) -> Vec<Range<usize>> {
    if max_shard == 0 {
        return Vec::new();
    }
    (0..count)
        .step_by(max_shard)
        .map(|begin| begin..count.min(begin + max_shard))
        .collect()
}

/// Splits `target` into `n` random scalars that sum to `target`.
pub fn split_scalar<R: RngCore>(rng: &mut R, target: &Scalar, n: usize) -> Vec<Scalar> {
    if n == 0 {
        return Vec::new();
    }
    let mut parts: Vec<Scalar> = (0..n - 1).map(|_| Scalar::rand(rng)).collect();
    let mut last = *target;
    for part in &parts {
        last.sub(part);
    }
    parts.push(last);
    parts
}

/// Merges shard outputs: the blinding generator must agree, `g` and `key_com` are summed.
pub fn merge(outputs: &[Output]) -> Result<Output, Error> {
    let (first, rest) = outputs.split_first().ok_or(Error::Empty)?;
    let mut merged = *first;
    for output in rest {
        if output.h != merged.h {
            return Err(Error::GeneratorMismatch);
        }
        merged.g.add(&output.g);
        merged.key_com.add(&output.key_com);
    }
    Ok(merged)
}

/// Sums the weighted-sum commitments of all shards.
pub fn sum_com_vw<P: Policy>(proofs: &[Proof<P>]) -> G1 {
    G1::sum(proofs.iter().map(|proof| &proof.com_vw))
}

fn check_lengths<S: Scheme, E: Executor>(
    ctx: &Context<'_, S, E>,
    plain: &[Scalar],
    weights: &[Scalar],
) -> Result<Vec<Range<usize>>, Error> {
    if plain.is_empty() {
        return Err(Error::Empty);
    }
    if weights.len() != plain.len() {
        return Err(Error::LengthMismatch(plain.len(), weights.len()));
    }
    Ok(split(plain.len(), ctx.max_shard()))
}

/// Proves `v_t = scheme(plain[t], secret.key)` for every position.
///
/// Returns the shard proofs, the merged [`Output`] and the sum of the shards' `com_vw`,
/// which commits to `<v, weights>` with blinding `secret.vw_com_r`.
///
/// When a `cache` is provided it must cover exactly `plain.len()` positions and have been
/// created for `secret.key` and `secret.key_com_r`.
pub fn prove<R: RngCore, S: Scheme, P: Policy, E: Executor>(
    rng: &mut R,
    ctx: &Context<'_, S, E>,
    seed: &Seed,
    plain: &[Scalar],
    weights: &[Scalar],
    secret: &Secret,
    cache: Option<&Cache>,
) -> Result<(Vec<Proof<P>>, Output, G1), Error> {
    let ranges = check_lengths(ctx, plain, weights)?;
    let shards = ranges.len();

    // Key blindings come from the cache when available.
    let key_com_rs = match cache {
        Some(cache) => {
            if cache.count as usize != plain.len()
                || cache.var_coms.len() != shards
                || cache.key != secret.key
                || cache.key_com_r != secret.key_com_r
            {
                return Err(Error::InvalidCachedCommitments);
            }
            let key_com_rs: Vec<Scalar> = cache
                .var_coms_r
                .iter()
                .map(|r| r.get(KEY_WIRE).copied().unwrap_or_else(Scalar::zero))
                .collect();
            let mut sum = Scalar::zero();
            for r in &key_com_rs {
                sum.add(r);
            }
            if sum != secret.key_com_r {
                return Err(Error::InvalidCachedCommitments);
            }
            key_com_rs
        }
        None => split_scalar(rng, &secret.key_com_r, shards),
    };
    let vw_com_rs = split_scalar(rng, &secret.vw_com_r, shards);
    let seeds: Vec<[u8; 32]> = (0..shards)
        .map(|_| {
            let mut seed = [0u8; 32];
            rng.fill_bytes(&mut seed);
            seed
        })
        .collect();
    debug!(count = plain.len(), shards, cached = cache.is_some(), "proving vrs");

    let results = ctx.executor.map_range(shards, |i| {
        let range = ranges[i].clone();
        let mut rng = StdRng::from_seed(seeds[i]);
        let shard_secret = Secret {
            key: secret.key,
            key_com_r: key_com_rs[i],
            vw_com_r: vw_com_rs[i],
        };
        let cached = cache.map(|cache| Commitments {
            var_coms: cache.var_coms[i].clone(),
            var_coms_r: cache.var_coms_r[i].clone(),
        });
        shard::prove::<_, _, P, _>(
            &mut rng,
            ctx,
            seed,
            &plain[range.clone()],
            &weights[range],
            &shard_secret,
            cached,
        )
        .map_err(|err| Error::Shard(i, Box::new(err)))
    });

    let mut proofs = Vec::with_capacity(shards);
    let mut outputs = Vec::with_capacity(shards);
    for result in results {
        let (proof, output) = result?;
        proofs.push(proof);
        outputs.push(output);
    }
    let output = merge(&outputs)?;
    let com_vw = sum_com_vw(&proofs);
    Ok((proofs, output, com_vw))
}

/// Verifies every shard proof and returns the merged [`Output`].
pub fn verify<S: Scheme, P: Policy, E: Executor>(
    ctx: &Context<'_, S, E>,
    seed: &Seed,
    plain: &[Scalar],
    weights: &[Scalar],
    proofs: &[Proof<P>],
) -> Result<Output, Error> {
    let ranges = check_lengths(ctx, plain, weights)?;
    if proofs.len() != ranges.len() {
        return Err(Error::ShardCount(ranges.len(), proofs.len()));
    }
    let results = ctx.executor.map_range(ranges.len(), |i| {
        let range = ranges[i].clone();
        shard::verify(
            ctx,
            seed,
            &plain[range.clone()],
            &weights[range],
            &proofs[i],
        )
        .map_err(|err| Error::Shard(i, Box::new(err)))
    });
    let outputs = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    merge(&outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{plain, scheme::Mimc5};
    use commonware_macros::test_traced;
    use pod_cryptography::{Config, Parameters, Standard};
    use pod_parallel::{Parallel, Sequential};
    use test_case::test_case;

    #[test_case(1, 8, &[1]; "single position")]
    #[test_case(8, 8, &[8]; "exactly one shard")]
    #[test_case(9, 8, &[8, 1]; "one extra position")]
    #[test_case(20, 8, &[8, 8, 4]; "three shards")]
    #[test_case(0, 8, &[]; "empty")]
    fn test_split(count: usize, max_shard: usize, lengths: &[usize]) {
        let ranges = split(count, max_shard);
        assert_eq!(ranges.iter().map(|r| r.len()).collect::<Vec<_>>(), lengths);
        let mut next = 0;
        for range in ranges {
            assert_eq!(range.start, next);
            next = range.end;
        }
        assert_eq!(next, count);
    }

    #[test]
    fn test_split_scalar() {
        let mut rng = StdRng::seed_from_u64(0);
        let target = Scalar::rand(&mut rng);
        for n in 1..5 {
            let parts = split_scalar(&mut rng, &target, n);
            assert_eq!(parts.len(), n);
            let mut sum = Scalar::zero();
            for part in &parts {
                sum.add(part);
            }
            assert_eq!(sum, target);
        }
    }

    #[test]
    fn test_merge_rejects_generator_mismatch() {
        let one = Output {
            g: G1::one(),
            h: G1::one(),
            key_com: G1::one(),
        };
        let mut other = one;
        other.h.add(&G1::one());
        assert!(matches!(merge(&[one, other]), Err(Error::GeneratorMismatch)));
        assert!(matches!(merge(&[]), Err(Error::Empty)));

        let merged = merge(&[one, one]).unwrap();
        let mut double = G1::one();
        double.add(&G1::one());
        assert_eq!(merged.g, double);
        assert_eq!(merged.key_com, double);
        assert_eq!(merged.h, G1::one());
    }

    #[test_traced]
    fn test_prove_verify_sharded() {
        let params = Parameters::new(&Config {
            wire_generators: 8,
            row_generators: 1,
        });
        let scheme = Mimc5::new();
        let executor = Parallel::with_concurrency(4).unwrap();
        let ctx = Context::new(&params, &scheme, &executor);
        let mut rng = StdRng::seed_from_u64(1);

        let seed = [3u8; 32];
        let plain = plain::sequence(&executor, &seed, 20);
        let weights: Vec<Scalar> = (0..20).map(|_| Scalar::rand(&mut rng)).collect();
        let secret = Secret::random(&mut rng);
        let (proofs, output, com_vw) =
            prove::<_, _, Standard, _>(&mut rng, &ctx, &seed, &plain, &weights, &secret, None)
                .unwrap();
        assert_eq!(proofs.len(), 3);

        // Every shard commits against its own prefix of the wire basis
        let mut g = params.sigma_g(8);
        g.add(&params.sigma_g(8));
        g.add(&params.sigma_g(4));
        assert_eq!(output.g, g);

        // The merged receipt opens with the full secret
        let mut blind = *params.h();
        blind.mul(&secret.key_com_r);
        let mut expected = g;
        expected.mul(&secret.key);
        expected.add(&blind);
        assert_eq!(output.key_com, expected);

        // The summed weighted commitment opens with the full blinding
        let v: Vec<Scalar> = plain
            .iter()
            .map(|p| scheme.generate(p, &secret.key))
            .collect();
        let vw = pod_cryptography::group::inner_product(&v, &weights);
        assert_eq!(com_vw, params.commit_scalar(&vw, &secret.vw_com_r));
        assert_eq!(com_vw, sum_com_vw(&proofs));

        // Same instance proven as a single shard under a basis wide enough for every position
        let wide = Parameters::new(&Config {
            wire_generators: 32,
            row_generators: 1,
        });
        let unsharded_ctx = Context::new(&wide, &scheme, &executor);
        let (unsharded, unsharded_output, unsharded_com_vw) = prove::<_, _, Standard, _>(
            &mut rng,
            &unsharded_ctx,
            &seed,
            &plain,
            &weights,
            &secret,
            None,
        )
        .unwrap();
        assert_eq!(unsharded.len(), 1);
        assert_eq!(unsharded_output.g, wide.sigma_g(20));
        assert_eq!(unsharded_output.h, output.h);
        assert_eq!(unsharded_com_vw, com_vw);
        assert_eq!(sum_com_vw(&unsharded), sum_com_vw(&proofs));

        // Both key commitments carry the same blinding and the same key
        let mut sharded_blind = output.key_com;
        let mut key_part = output.g;
        key_part.mul(&secret.key);
        sharded_blind.sub(&key_part);
        let mut unsharded_blind = unsharded_output.key_com;
        let mut key_part = unsharded_output.g;
        key_part.mul(&secret.key);
        unsharded_blind.sub(&key_part);
        assert_eq!(sharded_blind, blind);
        assert_eq!(unsharded_blind, blind);

        // The first shard matches the unsharded wire basis on its positions
        assert_eq!(wide.sigma_g(8), params.sigma_g(8));
        assert_eq!(
            verify(&unsharded_ctx, &seed, &plain, &weights, &unsharded).unwrap(),
            unsharded_output
        );

        let sequential = Context::new(&params, &scheme, &Sequential);
        assert_eq!(
            verify(&sequential, &seed, &plain, &weights, &proofs).unwrap(),
            output
        );

        // Reordered shards are rejected
        let mut swapped = proofs.clone();
        swapped.swap(0, 1);
        assert!(matches!(
            verify(&ctx, &seed, &plain, &weights, &swapped),
            Err(Error::Shard(0, _))
        ));

        // Missing shard
        assert!(matches!(
            verify(&ctx, &seed, &plain, &weights, &proofs[..2]),
            Err(Error::ShardCount(3, 2))
        ));

        // Tampered last shard
        let mut tampered = proofs;
        tampered[2].com_vw.add(params.u());
        assert!(matches!(
            verify(&ctx, &seed, &plain, &weights, &tampered),
            Err(Error::Shard(2, _))
        ));
    }
}

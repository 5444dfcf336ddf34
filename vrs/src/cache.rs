//! Precomputed per-shard commitments for a fixed key and plaintext seed.
//!
//! Committing every wire of every shard dominates proving time and does not depend on the
//! weights, so a seller can compute it ahead of time. A [`Cache`] holds the key, the
//! per-shard commitments and their blindings for positions `0..count` of the plaintext
//! sequence derived from `seed`.
//!
//! A cache can be [upgraded](Cache::upgrade) to a different `count` without recomputing
//! unaffected shards: only the boundary shard is adjusted (by adding or subtracting the
//! commitments of the positions that enter or leave it) and whole shards are appended or
//! dropped.

use crate::{
    large::split,
    plain,
    scheme::{Scheme, KEY_WIRE, PLAIN_WIRE},
    shard::{self, Commitments, Secret},
    Context, Error,
};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, RangeCfg, Read, ReadExt, Write};
use commonware_utils::{from_hex, hex};
use pod_cryptography::{Element, Scalar, Seed, G1};
use pod_parallel::Executor;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::{fmt, ops::Range};
use tracing::debug;

/// Maximum length of a scheme name.
const MAX_SCHEME_NAME: usize = 64;

/// Returns the file name of a cache: `<count>_<hex(seed)>`.
pub fn file_name(count: u64, seed: &Seed) -> String {
    format!("{count}_{}", hex(seed))
}

/// Parses a file name produced by [`file_name`].
pub fn parse_file_name(name: &str) -> Option<(u64, Seed)> {
    let (count, seed) = name.split_once('_')?;
    if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let count = count.parse().ok()?;
    let seed: Seed = from_hex(seed)?.try_into().ok()?;
    Some((count, seed))
}

/// Bounds applied when decoding a [`Cache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheCfg {
    /// Number of wires of the scheme.
    pub wires: usize,

    /// Maximum number of shards.
    pub max_shards: usize,
}

/// Precomputed commitments for positions `0..count`.
#[derive(Clone, PartialEq, Eq)]
pub struct Cache {
    pub scheme: String,
    pub max_shard: u64,
    pub count: u64,
    pub seed: Seed,
    pub key: Scalar,
    pub key_com_r: Scalar,
    pub var_coms: Vec<Vec<G1>>,
    pub var_coms_r: Vec<Vec<Scalar>>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("scheme", &self.scheme)
            .field("max_shard", &self.max_shard)
            .field("count", &self.count)
            .field("seed", &hex(&self.seed))
            .finish_non_exhaustive()
    }
}

fn shard_seeds<R: RngCore>(rng: &mut R, n: usize) -> Vec<[u8; 32]> {
    (0..n)
        .map(|_| {
            let mut seed = [0u8; 32];
            rng.fill_bytes(&mut seed);
            seed
        })
        .collect()
}

/// Commits fresh shards covering `ranges`, each with its own random key blinding.
fn commit_shards<R: RngCore, S: Scheme, E: Executor>(
    rng: &mut R,
    ctx: &Context<'_, S, E>,
    seed: &Seed,
    key: &Scalar,
    ranges: &[Range<usize>],
) -> Vec<Commitments> {
    let seeds = shard_seeds(rng, ranges.len());
    ctx.executor.map_range(ranges.len(), |i| {
        let mut rng = StdRng::from_seed(seeds[i]);
        let range = &ranges[i];
        let plain = plain::range(ctx.executor, seed, range.start, range.end);
        let key_com_r = Scalar::rand(&mut rng);
        shard::commitments(&mut rng, ctx, &plain, key, &key_com_r)
    })
}

/// Returns the commitment delta of positions `positions` within the shard starting at
/// `begin` (one point per wire, without blinding).
fn delta<S: Scheme, E: Executor>(
    ctx: &Context<'_, S, E>,
    seed: &Seed,
    key: &Scalar,
    begin: usize,
    positions: Range<usize>,
) -> Vec<G1> {
    let plain = plain::range(ctx.executor, seed, positions.start, positions.end);
    let rows = shard::witness(ctx, &plain, key);
    let g = &ctx.params.g()[positions.start - begin..positions.end - begin];
    ctx.executor
        .map_range(rows.len(), |wire| G1::msm(g, &rows[wire]))
}

impl Cache {
    /// Computes a cache for positions `0..count` under a fresh key.
    pub fn create<R: RngCore, S: Scheme, E: Executor>(
        rng: &mut R,
        ctx: &Context<'_, S, E>,
        seed: Seed,
        count: u64,
    ) -> Result<Self, Error> {
        if count == 0 {
            return Err(Error::Empty);
        }
        let key = Scalar::rand(rng);
        let ranges = split(count as usize, ctx.max_shard());
        let shards = commit_shards(rng, ctx, &seed, &key, &ranges);
        let mut key_com_r = Scalar::zero();
        let mut var_coms = Vec::with_capacity(shards.len());
        let mut var_coms_r = Vec::with_capacity(shards.len());
        for shard in shards {
            key_com_r.add(&shard.var_coms_r[KEY_WIRE]);
            var_coms.push(shard.var_coms);
            var_coms_r.push(shard.var_coms_r);
        }
        debug!(count, shards = var_coms.len(), "created cache");
        Ok(Self {
            scheme: ctx.scheme.name().to_string(),
            max_shard: ctx.max_shard() as u64,
            count,
            seed,
            key,
            key_com_r,
            var_coms,
            var_coms_r,
        })
    }

    /// File name of this cache.
    pub fn name(&self) -> String {
        file_name(self.count, &self.seed)
    }

    /// Cached commitments of shard `index`.
    pub fn commitments(&self, index: usize) -> Option<Commitments> {
        Some(Commitments {
            var_coms: self.var_coms.get(index)?.clone(),
            var_coms_r: self.var_coms_r.get(index)?.clone(),
        })
    }

    /// Returns the secret proven with this cache (with a fresh weighted-sum blinding).
    pub fn secret<R: RngCore>(&self, rng: &mut R) -> Secret {
        Secret {
            key: self.key,
            key_com_r: self.key_com_r,
            vw_com_r: Scalar::rand(rng),
        }
    }

    /// Returns a cache covering positions `0..count` with the same key and seed.
    pub fn upgrade<R: RngCore, S: Scheme, E: Executor>(
        mut self,
        rng: &mut R,
        ctx: &Context<'_, S, E>,
        count: u64,
    ) -> Result<Self, Error> {
        if count == 0 {
            return Err(Error::Empty);
        }
        if self.scheme != ctx.scheme.name() {
            return Err(Error::CacheCorrupt("scheme"));
        }
        if self.max_shard != ctx.max_shard() as u64 {
            return Err(Error::CacheCorrupt("max shard"));
        }
        let old = split(self.count as usize, ctx.max_shard());
        if old.is_empty() {
            return Err(Error::CacheCorrupt("empty"));
        }
        if old.len() != self.var_coms.len() || old.len() != self.var_coms_r.len() {
            return Err(Error::CacheCorrupt("shard count"));
        }
        let wires = ctx.scheme.wires();
        if self.var_coms.iter().any(|coms| coms.len() != wires)
            || self.var_coms_r.iter().any(|rs| rs.len() != wires)
        {
            return Err(Error::CacheCorrupt("wire count"));
        }
        if count == self.count {
            return Ok(self);
        }
        let new = split(count as usize, ctx.max_shard());

        // Adjust the boundary shard (the last shard both splits share).
        let boundary = old.len().min(new.len()) - 1;
        let begin = old[boundary].start;
        let old_end = old[boundary].end;
        let new_end = new[boundary].end;
        if old_end != new_end {
            let (positions, grow) = if new_end > old_end {
                (old_end..new_end, true)
            } else {
                (new_end..old_end, false)
            };
            let delta = delta(ctx, &self.seed, &self.key, begin, positions);
            for (com, delta) in self.var_coms[boundary].iter_mut().zip(&delta) {
                if grow {
                    com.add(delta);
                } else {
                    com.sub(delta);
                }
            }
        }

        if new.len() > old.len() {
            let appended = commit_shards(rng, ctx, &self.seed, &self.key, &new[old.len()..]);
            for shard in appended {
                self.key_com_r.add(&shard.var_coms_r[KEY_WIRE]);
                self.var_coms.push(shard.var_coms);
                self.var_coms_r.push(shard.var_coms_r);
            }
        } else {
            for dropped in &self.var_coms_r[new.len()..] {
                self.key_com_r.sub(&dropped[KEY_WIRE]);
            }
            self.var_coms.truncate(new.len());
            self.var_coms_r.truncate(new.len());
        }
        debug!(from = self.count, to = count, "upgraded cache");
        self.count = count;
        Ok(self)
    }

    /// Recomputes every commitment and returns an error if the cache is inconsistent.
    pub fn check<S: Scheme, E: Executor>(&self, ctx: &Context<'_, S, E>) -> Result<(), Error> {
        if self.scheme != ctx.scheme.name() {
            return Err(Error::CacheCorrupt("scheme"));
        }
        if self.max_shard != ctx.max_shard() as u64 {
            return Err(Error::CacheCorrupt("max shard"));
        }
        if self.count == 0 {
            return Err(Error::CacheCorrupt("empty"));
        }
        let ranges = split(self.count as usize, ctx.max_shard());
        if ranges.len() != self.var_coms.len() || ranges.len() != self.var_coms_r.len() {
            return Err(Error::CacheCorrupt("shard count"));
        }
        let wires = ctx.scheme.wires();
        let mut key_com_r = Scalar::zero();
        for (coms, rs) in self.var_coms.iter().zip(&self.var_coms_r) {
            if coms.len() != wires || rs.len() != wires {
                return Err(Error::CacheCorrupt("wire count"));
            }
            if rs[PLAIN_WIRE] != Scalar::zero() {
                return Err(Error::CacheCorrupt("plain blinding"));
            }
            key_com_r.add(&rs[KEY_WIRE]);
        }
        if key_com_r != self.key_com_r {
            return Err(Error::CacheCorrupt("key blinding"));
        }
        let consistent = ctx.executor.all(ranges.len(), |i| {
            let range = &ranges[i];
            let plain = plain::range(ctx.executor, &self.seed, range.start, range.end);
            let rows = shard::witness(ctx, &plain, &self.key);
            shard::commit(ctx, &rows, &self.var_coms_r[i]) == self.var_coms[i]
        });
        if !consistent {
            return Err(Error::CacheCorrupt("commitments"));
        }
        Ok(())
    }
}

impl Write for Cache {
    fn write(&self, buf: &mut impl BufMut) {
        self.scheme.as_bytes().to_vec().write(buf);
        self.max_shard.write(buf);
        self.count.write(buf);
        self.seed.write(buf);
        self.key.write(buf);
        self.key_com_r.write(buf);
        self.var_coms.write(buf);
        self.var_coms_r.write(buf);
    }
}

impl EncodeSize for Cache {
    fn encode_size(&self) -> usize {
        self.scheme.as_bytes().to_vec().encode_size()
            + self.max_shard.encode_size()
            + self.count.encode_size()
            + self.seed.encode_size()
            + self.key.encode_size()
            + self.key_com_r.encode_size()
            + self.var_coms.encode_size()
            + self.var_coms_r.encode_size()
    }
}

impl Read for Cache {
    type Cfg = CacheCfg;

    fn read_cfg(buf: &mut impl Buf, cfg: &CacheCfg) -> Result<Self, CodecError> {
        let name: RangeCfg = (0..=MAX_SCHEME_NAME).into();
        let scheme = Vec::<u8>::read_cfg(buf, &(name, ()))?;
        let scheme = String::from_utf8(scheme)
            .map_err(|_| CodecError::Invalid("Cache", "scheme name is not utf-8"))?;
        let max_shard = u64::read(buf)?;
        let count = u64::read(buf)?;
        let seed = Seed::read(buf)?;
        let key = Scalar::read(buf)?;
        let key_com_r = Scalar::read(buf)?;
        let shards: RangeCfg = (1..=cfg.max_shards).into();
        let wires: RangeCfg = (cfg.wires..=cfg.wires).into();
        let var_coms = Vec::<Vec<G1>>::read_cfg(buf, &(shards.clone(), (wires.clone(), ())))?;
        let var_coms_r = Vec::<Vec<Scalar>>::read_cfg(buf, &(shards, (wires, ())))?;
        if var_coms.len() != var_coms_r.len() {
            return Err(CodecError::Invalid("Cache", "shard count mismatch"));
        }
        Ok(Self {
            scheme,
            max_shard,
            count,
            seed,
            key,
            key_com_r,
            var_coms,
            var_coms_r,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{large, scheme::Mimc5};
    use commonware_codec::{Decode, Encode};
    use commonware_macros::test_traced;
    use pod_cryptography::{Config, Parameters, Standard};
    use pod_parallel::{Parallel, Sequential};
    use test_case::test_case;

    fn params() -> Parameters {
        Parameters::new(&Config {
            wire_generators: 4,
            row_generators: 1,
        })
    }

    #[test]
    fn test_file_name() {
        let seed = [0xabu8; 32];
        let name = file_name(42, &seed);
        assert!(name.starts_with("42_abab"));
        assert_eq!(parse_file_name(&name), Some((42, seed)));

        assert_eq!(parse_file_name("42"), None);
        assert_eq!(parse_file_name("x_abab"), None);
        assert_eq!(parse_file_name("42_abab"), None);
        assert_eq!(parse_file_name(&format!("{name}.using")), None);
    }

    #[test_traced]
    fn test_create_check() {
        let params = params();
        let scheme = Mimc5::new();
        let executor = Parallel::with_concurrency(2).unwrap();
        let ctx = Context::new(&params, &scheme, &executor);
        let mut rng = StdRng::seed_from_u64(0);

        let cache = Cache::create(&mut rng, &ctx, [1u8; 32], 10).unwrap();
        assert_eq!(cache.var_coms.len(), 3);
        assert_eq!(cache.scheme, "mimc5");
        assert_eq!(cache.max_shard, 4);
        cache.check(&ctx).unwrap();

        // Tampered commitment
        let mut tampered = cache.clone();
        tampered.var_coms[1][5].add(params.h());
        assert!(matches!(
            tampered.check(&ctx),
            Err(Error::CacheCorrupt("commitments"))
        ));

        // Tampered key blinding
        let mut tampered = cache.clone();
        tampered.key_com_r.add(&Scalar::one());
        assert!(matches!(
            tampered.check(&ctx),
            Err(Error::CacheCorrupt("key blinding"))
        ));

        // Different shard ceiling
        let other = Parameters::new(&Config {
            wire_generators: 5,
            row_generators: 1,
        });
        let other_ctx = Context::new(&other, &scheme, &executor);
        assert!(matches!(
            cache.check(&other_ctx),
            Err(Error::CacheCorrupt("max shard"))
        ));
    }

    #[test_case(10, 12; "grow within boundary shard")]
    #[test_case(10, 17; "grow with new shards")]
    #[test_case(8, 9; "grow from full shard")]
    #[test_case(12, 10; "shrink within boundary shard")]
    #[test_case(17, 6; "shrink dropping shards")]
    #[test_case(9, 8; "shrink to full shard")]
    #[test_case(7, 7; "unchanged")]
    fn test_upgrade(from: u64, to: u64) {
        let params = params();
        let scheme = Mimc5::new();
        let ctx = Context::new(&params, &scheme, &Sequential);
        let mut rng = StdRng::seed_from_u64(from * 100 + to);

        let cache = Cache::create(&mut rng, &ctx, [2u8; 32], from).unwrap();
        let key = cache.key;
        let upgraded = cache.upgrade(&mut rng, &ctx, to).unwrap();
        assert_eq!(upgraded.count, to);
        assert_eq!(upgraded.key, key);
        upgraded.check(&ctx).unwrap();
    }

    #[test_case(10, 12; "within boundary shard")]
    #[test_case(10, 17; "through new shards")]
    #[test_case(6, 5; "shrink first")]
    fn test_upgrade_round_trip(from: u64, to: u64) {
        let params = params();
        let scheme = Mimc5::new();
        let ctx = Context::new(&params, &scheme, &Sequential);
        let mut rng = StdRng::seed_from_u64(from * 100 + to);

        let original = Cache::create(&mut rng, &ctx, [5u8; 32], from).unwrap();
        let upgraded = original.clone().upgrade(&mut rng, &ctx, to).unwrap();
        upgraded.check(&ctx).unwrap();
        let restored = upgraded.upgrade(&mut rng, &ctx, from).unwrap();
        restored.check(&ctx).unwrap();
        assert_eq!(restored.var_coms, original.var_coms);
        assert_eq!(restored.var_coms_r, original.var_coms_r);
        assert_eq!(restored.key_com_r, original.key_com_r);
        assert_eq!(restored, original);
    }

    #[test]
    fn test_upgrade_rejects_malformed_shard() {
        let params = params();
        let scheme = Mimc5::new();
        let ctx = Context::new(&params, &scheme, &Sequential);
        let mut rng = StdRng::seed_from_u64(3);
        let cache = Cache::create(&mut rng, &ctx, [6u8; 32], 10).unwrap();

        // Short boundary shard
        let mut short = cache.clone();
        short.var_coms[2].pop();
        assert!(matches!(
            short.upgrade(&mut rng, &ctx, 11),
            Err(Error::CacheCorrupt("wire count"))
        ));

        // Short blindings of a shard that would be dropped
        let mut short = cache.clone();
        short.var_coms_r[2].truncate(1);
        assert!(matches!(
            short.upgrade(&mut rng, &ctx, 4),
            Err(Error::CacheCorrupt("wire count"))
        ));

        // Missing shard
        let mut missing = cache;
        missing.var_coms.pop();
        assert!(matches!(
            missing.upgrade(&mut rng, &ctx, 12),
            Err(Error::CacheCorrupt("shard count"))
        ));
    }

    #[test_traced]
    fn test_prove_with_cache() {
        let params = params();
        let scheme = Mimc5::new();
        let ctx = Context::new(&params, &scheme, &Sequential);
        let mut rng = StdRng::seed_from_u64(1);

        let seed = [3u8; 32];
        let cache = Cache::create(&mut rng, &ctx, seed, 6)
            .unwrap()
            .upgrade(&mut rng, &ctx, 9)
            .unwrap();
        let plain = plain::sequence(&Sequential, &seed, 9);
        let weights: Vec<Scalar> = (0..9).map(|_| Scalar::rand(&mut rng)).collect();
        let secret = cache.secret(&mut rng);
        let (proofs, output, _) = large::prove::<_, _, Standard, _>(
            &mut rng,
            &ctx,
            &seed,
            &plain,
            &weights,
            &secret,
            Some(&cache),
        )
        .unwrap();
        for (proof, coms) in proofs.iter().zip(&cache.var_coms) {
            assert_eq!(&proof.var_coms, coms);
        }
        assert_eq!(
            large::verify(&ctx, &seed, &plain, &weights, &proofs).unwrap(),
            output
        );

        // A cache for a different key is refused
        let other = Secret::random(&mut rng);
        assert!(matches!(
            large::prove::<_, _, Standard, _>(
                &mut rng,
                &ctx,
                &seed,
                &plain,
                &weights,
                &other,
                Some(&cache)
            ),
            Err(Error::InvalidCachedCommitments)
        ));
    }

    #[test]
    fn test_codec() {
        let params = params();
        let scheme = Mimc5::new();
        let ctx = Context::new(&params, &scheme, &Sequential);
        let mut rng = StdRng::seed_from_u64(2);

        let cache = Cache::create(&mut rng, &ctx, [4u8; 32], 5).unwrap();
        let cfg = CacheCfg {
            wires: scheme.wires(),
            max_shards: 16,
        };
        let encoded = cache.encode();
        assert_eq!(encoded.len(), cache.encode_size());
        let decoded = Cache::decode_cfg(encoded.clone(), &cfg).unwrap();
        assert_eq!(decoded, cache);

        // Too many shards for the bound
        let tight = CacheCfg {
            wires: scheme.wires(),
            max_shards: 1,
        };
        assert!(Cache::decode_cfg(encoded, &tight).is_err());
    }
}

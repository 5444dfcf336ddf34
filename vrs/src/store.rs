//! A directory of [`Cache`] files.
//!
//! Files are named `<count>_<hex(seed)>`. Leased files carry a `.using` suffix, retired
//! files a `.used` suffix and files being written a `.tmp` suffix; only bare names are
//! candidates for selection.

use crate::{
    cache::{file_name, parse_file_name, Cache, CacheCfg},
    large::split,
    lease::{with_suffix, Lease},
    scheme::Scheme,
    Context, Error,
};
use commonware_codec::{Decode, Encode};
use pod_parallel::Executor;
use rand::RngCore;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::{debug, info, warn};

/// Suffix of a file being written.
const TMP: &str = "tmp";

/// Number of times selection rescans the directory after losing a rename race.
const MAX_ATTEMPTS: usize = 8;

/// Serializes selection within the process (renames serialize across processes).
static SELECTION: Mutex<()> = Mutex::new(());

/// Picks the candidate to lease for `count` positions from candidates sorted by count.
///
/// Returns the nearest count (preferring the smaller one on ties). Declines when every
/// candidate is larger, the request is below the shard ceiling and the nearest candidate
/// (capped at the ceiling) is at least twice the request: shrinking such a cache costs more
/// than computing a fresh one.
pub fn choose(counts: &[u64], count: u64, max_shard: u64) -> Option<usize> {
    let first = *counts.first()?;
    let idx = counts.partition_point(|c| *c < count);
    if idx == 0 {
        if first != count && count < max_shard && first.min(max_shard) >= 2 * count {
            return None;
        }
        return Some(0);
    }
    if idx == counts.len() {
        return Some(counts.len() - 1);
    }
    let gap_lo = count - counts[idx - 1];
    let gap_hi = counts[idx] - count;
    if gap_hi >= gap_lo {
        Some(idx - 1)
    } else {
        Some(idx)
    }
}

/// A directory of cache files.
#[derive(Clone, Debug)]
pub struct Store {
    directory: PathBuf,
}

impl Store {
    /// Opens (creating if needed) the cache directory.
    pub fn init(directory: impl Into<PathBuf>) -> Result<Self, Error> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes `cache` under its name (through a temporary file) and returns its path.
    pub fn save(&self, cache: &Cache) -> Result<PathBuf, Error> {
        let path = self.directory.join(cache.name());
        let tmp = with_suffix(&path, TMP);
        fs::write(&tmp, cache.encode())?;
        fs::rename(&tmp, &path)?;
        debug!(?path, count = cache.count, "saved cache");
        Ok(path)
    }

    /// Creates a cache for `count` positions under a fresh seed and key, and saves it.
    pub fn create<R: RngCore, S: Scheme, E: Executor>(
        &self,
        rng: &mut R,
        ctx: &Context<'_, S, E>,
        count: u64,
    ) -> Result<PathBuf, Error> {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let cache = Cache::create(rng, ctx, seed, count)?;
        self.save(&cache)
    }

    /// Returns the selectable files as `(count, name)`, sorted by count.
    fn candidates(&self) -> Result<Vec<(u64, String)>, Error> {
        let mut candidates = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.contains('.') {
                continue;
            }
            if let Some((count, _)) = parse_file_name(&name) {
                candidates.push((count, name));
            }
        }
        candidates.sort();
        Ok(candidates)
    }

    /// Leases the file best suited to `count` positions, if any.
    pub fn select(&self, count: u64, max_shard: u64) -> Option<Lease> {
        let _guard = SELECTION.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for _ in 0..MAX_ATTEMPTS {
            let candidates = match self.candidates() {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(directory = ?self.directory, ?err, "failed to scan cache directory");
                    return None;
                }
            };
            let counts: Vec<u64> = candidates.iter().map(|(count, _)| *count).collect();
            let Some(idx) = choose(&counts, count, max_shard) else {
                debug!(count, available = counts.len(), "no suitable cache");
                return None;
            };
            let (selected, name) = &candidates[idx];
            if let Some(lease) = Lease::acquire(self.directory.join(name)) {
                info!(count, selected, "selected cache");
                return Some(lease);
            }
        }
        None
    }

    /// Decodes the leased file and checks it belongs to `ctx`.
    pub fn load<S: Scheme, E: Executor>(
        &self,
        ctx: &Context<'_, S, E>,
        lease: &Lease,
    ) -> Result<Cache, Error> {
        let name = lease
            .base()
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(Error::CacheCorrupt("name"))?;
        let (count, seed) = parse_file_name(name).ok_or(Error::CacheCorrupt("name"))?;
        let bytes = fs::read(lease.path())?;
        let cfg = CacheCfg {
            wires: ctx.scheme.wires(),
            max_shards: split(count as usize, ctx.max_shard()).len(),
        };
        let cache = Cache::decode_cfg(bytes.as_slice(), &cfg)
            .map_err(|_| Error::CacheCorrupt("encoding"))?;
        if cache.scheme != ctx.scheme.name() {
            return Err(Error::CacheCorrupt("scheme"));
        }
        if cache.max_shard != ctx.max_shard() as u64 {
            return Err(Error::CacheCorrupt("max shard"));
        }
        if cache.name() != file_name(count, &seed) {
            return Err(Error::CacheCorrupt("name"));
        }
        Ok(cache)
    }

    /// Leases, loads and upgrades the cache best suited to `count` positions.
    ///
    /// Files that cannot be loaded are deleted and selection continues with the remaining
    /// files. Returns `None` when no file is suitable.
    pub fn checkout<R: RngCore, S: Scheme, E: Executor>(
        &self,
        rng: &mut R,
        ctx: &Context<'_, S, E>,
        count: u64,
    ) -> Option<(Lease, Cache)> {
        loop {
            let lease = self.select(count, ctx.max_shard() as u64)?;
            let cache = match self.load(ctx, &lease) {
                Ok(cache) => cache,
                Err(err) => {
                    warn!(path = ?lease.base(), ?err, "deleting corrupt cache file");
                    lease.discard();
                    continue;
                }
            };
            match cache.upgrade(rng, ctx, count) {
                Ok(cache) => return Some((lease, cache)),
                Err(err) => {
                    warn!(path = ?lease.base(), ?err, "deleting unusable cache file");
                    lease.discard();
                }
            }
        }
    }
}

//! Mask committed data and prove the masks are a verifiable random sequence.

use crate::{
    derive_weights, position_weights, positions,
    types::{CommitedData, ProveOutput, ProvedData, Receipt, Secret},
    Error, Protocol,
};
use pod_cryptography::{Element, Policy, Scalar, Seed};
use pod_parallel::Executor;
use pod_vrs::{large, plain, shard, Scheme};
use rand::RngCore;
use tracing::{debug, info};

impl<S: Scheme, P: Policy, E: Executor> Protocol<S, P, E> {
    /// Encrypts `data` under a (possibly cached) key and proves the encryption.
    ///
    /// The masks `V = Scheme(plain, key)` form `n + 1` rows of `s + 1` scalars (the last row
    /// only enters the weighted sums). Row `i < n` is published as
    /// `em_i = V_i + w_i * (r_i, m_i)`, with weights `w` derived from the row commitments
    /// of the masks. The key is withheld in the returned [`ProveOutput`].
    pub fn encrypt_and_prove<R: RngCore>(
        &self,
        rng: &mut R,
        seed: &Seed,
        data: &CommitedData,
    ) -> Result<ProveOutput<P>, Error> {
        data.check(self.params())?;
        let (n, s) = (data.n(), data.s());
        let count = positions(n, s).ok_or(Error::Precondition("dimensions"))?;
        let columns = s + 1;
        let ctx = self.context();

        // Prefer a cached key (its wire commitments are already computed).
        let checkout = self
            .store()
            .and_then(|store| store.checkout(rng, &ctx, count as u64));
        let (vrs_plain_seed, vrs_secret, lease, cache) = match checkout {
            Some((lease, cache)) => {
                debug!(count, path = ?lease.base(), "using cached key");
                (cache.seed, cache.secret(rng), Some(lease), Some(cache))
            }
            None => {
                let mut vrs_plain_seed = [0u8; 32];
                rng.fill_bytes(&mut vrs_plain_seed);
                (vrs_plain_seed, shard::Secret::random(rng), None, None)
            }
        };

        // Masks and their row commitments
        let plain = plain::sequence(self.executor(), &vrs_plain_seed, count);
        let v = self
            .executor()
            .map_range(count, |t| self.scheme().generate(&plain[t], &vrs_secret.key));
        let k = self.executor().map_range(n + 1, |i| {
            self.params()
                .commit_row(&v[i * columns..(i + 1) * columns])
        });
        let (vrs_seed, w) = derive_weights(seed, &k);

        // Encrypt
        let em = self.executor().map_range(n, |i| {
            let mask = &v[i * columns..(i + 1) * columns];
            let mut row = Vec::with_capacity(columns);
            for (j, mask) in mask.iter().enumerate() {
                let mut value = if j == 0 { data.r[i] } else { data.m[i][j - 1] };
                value.mul(&w[i]);
                value.add(mask);
                row.push(value);
            }
            row
        });

        // Weighted column sums over every mask row (including the key row)
        let vw = self.executor().map_range(columns, |j| {
            let mut sum = Scalar::zero();
            for (i, weight) in w.iter().enumerate() {
                let mut term = v[i * columns + j];
                term.mul(weight);
                sum.add(&term);
            }
            sum
        });

        let weights = position_weights(&w, columns);
        let (vrs_proofs, output, _) = large::prove::<_, _, P, _>(
            rng,
            &ctx,
            &vrs_seed,
            &plain,
            &weights,
            &vrs_secret,
            cache.as_ref(),
        )?;
        info!(n, s, shards = vrs_proofs.len(), cached = lease.is_some(), "proved data");

        Ok(ProveOutput::new(
            ProvedData {
                k,
                em,
                vw,
                vrs_plain_seed,
                vw_com_r: vrs_secret.vw_com_r,
                vrs_proofs,
            },
            Receipt::from(output),
            Secret {
                key: vrs_secret.key,
                key_com_r: vrs_secret.key_com_r,
            },
            lease,
        ))
    }
}

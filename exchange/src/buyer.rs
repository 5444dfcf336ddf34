//! Verify proved data, sign its receipt and decrypt once the secret is revealed.

use crate::{
    derive_weights, notary, position_weights, positions,
    types::{ProvedData, Secret, VerifyOutput},
    Error, Invalid, Protocol,
};
use pod_cryptography::{Element, Policy, Scalar, Seed, G1};
use pod_parallel::{Executor, Task};
use pod_vrs::{large, plain, shard::Output, Scheme};
use tracing::{info, warn};

/// Outcome of one verification check (the VRS check yields the merged output).
type Check = Result<Option<Output>, Invalid>;

fn sum(values: &[Scalar]) -> Scalar {
    let mut sum = Scalar::zero();
    for value in values {
        sum.add(value);
    }
    sum
}

impl<S: Scheme, P: Policy, E: Executor> Protocol<S, P, E> {
    /// Verifies `data` against the public row commitments `com` of `n` rows of `s` columns.
    ///
    /// Runs three independent checks:
    ///
    /// - hiding consistency: `sum_i (w_i * com_i + k_i)` commits to the column sums of `em`,
    /// - weighted sum: `sum_i w_i * k_i` commits to `vw`,
    /// - the VRS proof, whose summed `com_vw` must open to `sum_j vw_j` with `vw_com_r`.
    ///
    /// On success the merged VRS output is the receipt to sign.
    pub fn verify_and_sign(
        &self,
        seed: &Seed,
        n: usize,
        s: usize,
        com: &[G1],
        data: &ProvedData<P>,
    ) -> Result<VerifyOutput, Error> {
        let Some(count) = positions(n, s).filter(|_| {
            n != 0
                && s != 0
                && s <= self.params().max_columns()
                && com.len() == n
                && data.k.len() == n + 1
                && data.em.len() == n
                && data.em.iter().all(|row| row.len() == s + 1)
                && data.vw.len() == s + 1
        }) else {
            warn!(n, s, "rejected proved data dimensions");
            return Err(Error::ProofInvalid(Invalid::Dimensions));
        };
        let columns = s + 1;
        let (vrs_seed, w) = derive_weights(seed, &data.k);
        let plain = plain::sequence(self.executor(), &data.vrs_plain_seed, count);
        let weights = position_weights(&w, columns);
        let sigma_vw = sum(&data.vw);
        let ctx = self.context();

        let hiding: Task<'_, Check> = Box::new(|| {
            let mut points = Vec::with_capacity(2 * n);
            let mut scalars = Vec::with_capacity(2 * n);
            for i in 0..n {
                points.push(com[i]);
                scalars.push(w[i]);
                points.push(data.k[i]);
                scalars.push(Scalar::one());
            }
            let left = G1::msm(&points, &scalars);
            let column_sums: Vec<Scalar> = (0..columns)
                .map(|j| {
                    let mut sum = Scalar::zero();
                    for row in &data.em {
                        sum.add(&row[j]);
                    }
                    sum
                })
                .collect();
            if left != self.params().commit_row(&column_sums) {
                return Err(Invalid::Hiding);
            }
            Ok(None)
        });
        let weighted: Task<'_, Check> = Box::new(|| {
            if G1::msm(&data.k, &w) != self.params().commit_row(&data.vw) {
                return Err(Invalid::WeightedSum);
            }
            Ok(None)
        });
        let vrs: Task<'_, Check> = Box::new(|| {
            let output = large::verify(&ctx, &vrs_seed, &plain, &weights, &data.vrs_proofs)
                .map_err(Invalid::Vrs)?;
            let com_vw = large::sum_com_vw(&data.vrs_proofs);
            if com_vw != self.params().commit_scalar(&sigma_vw, &data.vw_com_r) {
                return Err(Invalid::VwCommitment);
            }
            Ok(Some(output))
        });

        // Checks report in submission order
        let mut output = None;
        for check in self.executor().invoke(vec![hiding, weighted, vrs]) {
            match check {
                Ok(Some(merged)) => output = Some(merged),
                Ok(None) => {}
                Err(reason) => {
                    warn!(%reason, "rejected proved data");
                    return Err(Error::ProofInvalid(reason));
                }
            }
        }
        let output = output.ok_or(Error::ProofInvalid(Invalid::Vrs(pod_vrs::Error::Empty)))?;
        info!(n, s, "verified proved data");

        Ok(VerifyOutput {
            receipt: output.into(),
            plain,
            w,
            sigma_vw,
        })
    }

    /// Decrypts `em` with a revealed secret, returning the `n` rows of `s` scalars.
    pub fn decrypt_data(
        &self,
        n: usize,
        s: usize,
        em: &[Vec<Scalar>],
        secret: &Secret,
        verified: &VerifyOutput,
    ) -> Result<Vec<Vec<Scalar>>, Error> {
        if !notary::verify_secret(&verified.receipt, secret) {
            return Err(Error::SecretMismatch);
        }
        let count = positions(n, s).ok_or(Error::Precondition("dimensions"))?;
        let columns = s + 1;
        if em.len() != n
            || em.iter().any(|row| row.len() != columns)
            || verified.plain.len() != count
            || verified.w.len() != n + 1
        {
            return Err(Error::Precondition("dimensions"));
        }

        let v = self.executor().map_range(count, |t| {
            self.scheme().generate(&verified.plain[t], &secret.key)
        });
        debug_assert!({
            let mut sigma = Scalar::zero();
            for (t, value) in v.iter().enumerate() {
                let mut term = *value;
                term.mul(&verified.w[t / columns]);
                sigma.add(&term);
            }
            sigma == verified.sigma_vw
        });

        let inverses = verified.w[..n]
            .iter()
            .map(|w| w.inverse().ok_or(Error::Precondition("zero weight")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.executor().map_range(n, |i| {
            (1..columns)
                .map(|j| {
                    let mut value = em[i][j];
                    value.sub(&v[i * columns + j]);
                    value.mul(&inverses[i]);
                    value
                })
                .collect()
        }))
    }
}

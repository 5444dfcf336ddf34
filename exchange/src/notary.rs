//! Check a disclosed secret against a signed receipt.

use crate::types::{Receipt, Secret};
use pod_cryptography::G1;

/// Returns whether `receipt.key_com == receipt.h * key_com_r + receipt.g * key`.
pub fn verify_secret(receipt: &Receipt, secret: &Secret) -> bool {
    G1::msm(&[receipt.h, receipt.g], &[secret.key_com_r, secret.key]) == receipt.key_com
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_cryptography::{Element, Scalar};
    use rand::{rngs::StdRng, SeedableRng};

    fn receipt(secret: &Secret) -> Receipt {
        let h = G1::hash(b"NOTARY_TEST", b"h");
        let g = G1::hash(b"NOTARY_TEST", b"g");
        Receipt {
            h,
            g,
            key_com: G1::msm(&[h, g], &[secret.key_com_r, secret.key]),
        }
    }

    #[test]
    fn test_verify_secret() {
        let mut rng = StdRng::seed_from_u64(0);
        let secret = Secret {
            key: Scalar::rand(&mut rng),
            key_com_r: Scalar::rand(&mut rng),
        };
        let receipt = receipt(&secret);
        assert!(verify_secret(&receipt, &secret));

        // Wrong key
        let mut wrong = secret.clone();
        wrong.key.add(&Scalar::one());
        assert!(!verify_secret(&receipt, &wrong));

        // Wrong blinding
        let mut wrong = secret.clone();
        wrong.key_com_r = Scalar::rand(&mut rng);
        assert!(!verify_secret(&receipt, &wrong));

        // Swapped generators
        let swapped = Receipt {
            h: receipt.g,
            g: receipt.h,
            key_com: receipt.key_com,
        };
        assert!(!verify_secret(&swapped, &secret));
    }
}

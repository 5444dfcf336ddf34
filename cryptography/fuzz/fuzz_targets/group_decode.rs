#![no_main]

use commonware_codec::{DecodeExt, Encode};
use libfuzzer_sys::fuzz_target;
use pod_cryptography::{Element, Scalar, G1};

fn fuzz(data: &[u8]) {
    if let Ok(scalar) = Scalar::decode(data) {
        assert_eq!(scalar.encode().as_ref(), data);
        if let Some(inverse) = scalar.inverse() {
            let mut one = scalar;
            one.mul(&inverse);
            assert_eq!(one, Scalar::one());
        }
    }
    if let Ok(point) = G1::decode(data) {
        assert_eq!(point.encode().as_ref(), data);
        let mut zero = point;
        zero.sub(&point);
        assert_eq!(zero, G1::zero());
    }
}

fuzz_target!(|data: &[u8]| {
    fuzz(data);
});

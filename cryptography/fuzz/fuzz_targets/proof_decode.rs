#![no_main]

use arbitrary::Arbitrary;
use commonware_codec::{Decode, Encode};
use libfuzzer_sys::fuzz_target;
use pod_cryptography::{dot, hadamard, Limits};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    encoded: Vec<u8>,
    triples: u8,
    positions: u8,
}

fn fuzz(input: FuzzInput) {
    let limits = Limits {
        triples: input.triples as usize,
        positions: input.positions as usize,
    };
    if let Ok(proof) = hadamard::Proof::decode_cfg(&input.encoded[..], &limits) {
        assert_eq!(proof.encode().as_ref(), &input.encoded[..]);
    }
    if let Ok(proof) = dot::Proof::decode_cfg(&input.encoded[..], &limits) {
        assert_eq!(proof.encode().as_ref(), &input.encoded[..]);
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});

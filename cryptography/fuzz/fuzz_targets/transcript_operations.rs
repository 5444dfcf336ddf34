#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pod_cryptography::{Scalar, Transcript};

const LABELS: &[&[u8]] = &[b"test", b"fork", b"label", b"A", b"B", b"C", b"data"];

const MAX_OPERATIONS: usize = 100;

#[derive(Debug, Arbitrary)]
enum TranscriptOperation {
    Bytes { label_index: u8, data: Vec<u8> },
    U64 { label_index: u8, value: u64 },
    Scalar { label_index: u8, value: u64 },
    Fork { label_index: u8 },
    Challenges { label_index: u8, count: u8 },
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    seed: [u8; 32],
    operations: Vec<TranscriptOperation>,
}

fn label(index: u8) -> &'static [u8] {
    LABELS[index as usize % LABELS.len()]
}

fn apply(transcript: &mut Transcript, operation: &TranscriptOperation) {
    match operation {
        TranscriptOperation::Bytes { label_index, data } => {
            transcript.append_bytes(label(*label_index), data);
        }
        TranscriptOperation::U64 { label_index, value } => {
            transcript.append_u64(label(*label_index), *value);
        }
        TranscriptOperation::Scalar { label_index, value } => {
            transcript.append_scalar(label(*label_index), &Scalar::from_u64(*value));
        }
        TranscriptOperation::Fork { label_index } => {
            *transcript = transcript.fork(label(*label_index));
        }
        TranscriptOperation::Challenges { label_index, count } => {
            let challenges = transcript.challenge_scalars(label(*label_index), *count as usize);
            assert_eq!(challenges.len(), *count as usize);
        }
    }
}

fn fuzz(input: FuzzInput) {
    // A replayed transcript must reach the same state.
    let mut transcript = Transcript::new(&input.seed);
    let mut replay = Transcript::new(&input.seed);
    for operation in input.operations.iter().take(MAX_OPERATIONS) {
        apply(&mut transcript, operation);
        apply(&mut replay, operation);
        assert_eq!(transcript, replay);
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});

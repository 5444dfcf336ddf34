//! Group operations over BLS12-381.
//!
//! Provides the scalar field ([`Scalar`]) and the G1 group ([`G1`]) used by every
//! commitment in the exchange. Both types implement the `commonware-codec` traits;
//! decoding checks that scalars are canonical and that points belong to G1.
//!
//! # Warning
//!
//! Only decode points through [`Read`]. Constructing points from raw bytes by any other
//! means skips the subgroup check.

use blst::{
    blst_bendian_from_scalar, blst_fr, blst_fr_add, blst_fr_from_scalar, blst_fr_from_uint64,
    blst_fr_inverse, blst_fr_mul, blst_fr_sub, blst_hash_to_g1, blst_keygen_v3, blst_p1,
    blst_p1_add_or_double, blst_p1_affine, blst_p1_cneg, blst_p1_compress, blst_p1_from_affine,
    blst_p1_in_g1, blst_p1_is_inf, blst_p1_mult, blst_p1_uncompress, blst_scalar,
    blst_scalar_fr_check, blst_scalar_from_bendian, blst_scalar_from_fr, p1_affines,
    BLS12_381_G1, BLST_ERROR,
};
use bytes::{Buf, BufMut};
use commonware_codec::{Error as CodecError, FixedSize, Read, ReadExt, Write};
use commonware_utils::hex;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::{fmt, ptr};
use zeroize::Zeroize;

/// An element of a group.
pub trait Element: Clone + Eq + PartialEq + Send + Sync {
    /// Returns the additive identity.
    fn zero() -> Self;

    /// Returns the multiplicative identity (the generator for groups).
    fn one() -> Self;

    /// Adds to self in-place.
    fn add(&mut self, rhs: &Self);

    /// Multiplies self in-place.
    fn mul(&mut self, rhs: &Scalar);
}

/// An element of the BLS12-381 scalar field.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct Scalar(blst_fr);

/// Length of a canonically encoded [`Scalar`].
pub const SCALAR_LENGTH: usize = 32;

/// `R = 2^256 mod q` in little-endian Montgomery form which is equivalent to 1 in little-endian
/// non-Montgomery form.
///
/// mod(2^256, 0x73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001) = 0x1824b159acc5056f998c4fefecbc4ff55884b7fa0003480200000001fffffffe
// Reference: https://github.com/filecoin-project/blstrs/blob/ffbb41d1495d84e40a712583346439924603b49a/src/scalar.rs#L77-L89
const BLST_FR_ONE: Scalar = Scalar(blst_fr {
    l: [
        0x0000_0001_ffff_fffe,
        0x5884_b7fa_0003_4802,
        0x998c_4fef_ecbc_4ff5,
        0x1824_b159_acc5_056f,
    ],
});

/// Number of digest bytes folded into each half of a wide reduction (always below the modulus).
const LIMB_BYTES: usize = 31;

/// Bit length of the scalar field modulus.
const SCALAR_BITS: usize = 255;

/// Number of terms from which [`G1::msm`] switches to Pippenger's algorithm.
pub const MSM_PIPPENGER_THRESHOLD: usize = 32;

/// An element of the BLS12-381 G1 group.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct G1(blst_p1);

/// Length of a compressed [`G1`] element.
pub const G1_ELEMENT_BYTE_LENGTH: usize = 48;

/// Returns the size in bits of a given blst_scalar (represented in little-endian).
fn bits(scalar: &blst_scalar) -> usize {
    let mut bits: usize = SCALAR_LENGTH * 8;
    for i in scalar.b.iter().rev() {
        let leading = i.leading_zeros();
        bits -= leading as usize;
        if leading < 8 {
            break;
        }
    }
    bits
}

impl Scalar {
    /// Generates a random scalar using the provided RNG.
    pub fn rand<R: RngCore>(rng: &mut R) -> Self {
        let mut ikm = [0u8; 64];
        rng.fill_bytes(&mut ikm);

        let mut ret = blst_fr::default();
        unsafe {
            let mut sc = blst_scalar::default();
            blst_keygen_v3(&mut sc, ikm.as_ptr(), ikm.len(), ptr::null(), 0);
            blst_fr_from_scalar(&mut ret, &sc);
        }
        ikm.zeroize();
        Self(ret)
    }

    /// Returns the scalar representing the provided integer.
    pub fn from_u64(i: u64) -> Self {
        // blst requires a buffer of 4 uint64 values. Failure to provide one will
        // result in unexpected behavior (will read past the provided buffer).
        let buffer = [i, 0, 0, 0];
        let mut ret = blst_fr::default();
        unsafe { blst_fr_from_uint64(&mut ret, buffer.as_ptr()) };
        Self(ret)
    }

    /// Interprets 31 big-endian bytes (always smaller than the modulus) as a scalar.
    fn from_limb(limb: &[u8]) -> Self {
        let mut padded = [0u8; SCALAR_LENGTH];
        padded[SCALAR_LENGTH - limb.len()..].copy_from_slice(limb);
        let mut ret = blst_fr::default();
        unsafe {
            let mut scalar = blst_scalar::default();
            blst_scalar_from_bendian(&mut scalar, padded.as_ptr());
            blst_fr_from_scalar(&mut ret, &scalar);
        }
        Self(ret)
    }

    /// Maps a message to a scalar under the provided domain separation tag.
    ///
    /// Two SHA-256 digests are reduced as `hi * 2^248 + lo` (each half is 248 bits),
    /// so the output is statistically close to uniform.
    pub fn map(dst: &[u8], message: &[u8]) -> Self {
        let digest = |counter: u8| {
            let mut hasher = Sha256::new();
            hasher.update((dst.len() as u32).to_be_bytes());
            hasher.update(dst);
            hasher.update([counter]);
            hasher.update(message);
            hasher.finalize()
        };
        let hi = digest(0);
        let lo = digest(1);

        // 2^248 encoded as a single leading byte followed by 31 zero bytes.
        let mut shift = [0u8; LIMB_BYTES + 1];
        shift[0] = 1;
        let shift = Self::from_limb(&shift[..]);

        let mut ret = Self::from_limb(&hi[..LIMB_BYTES]);
        ret.mul(&shift);
        ret.add(&Self::from_limb(&lo[..LIMB_BYTES]));
        ret
    }

    /// Computes the inverse of the scalar.
    pub fn inverse(&self) -> Option<Self> {
        if *self == Self::zero() {
            return None;
        }
        let mut ret = blst_fr::default();
        unsafe { blst_fr_inverse(&mut ret, &self.0) };
        Some(Self(ret))
    }

    /// Subtracts the provided scalar from self in-place.
    pub fn sub(&mut self, rhs: &Self) {
        unsafe { blst_fr_sub(&mut self.0, &self.0, &rhs.0) }
    }

    /// Returns the additive inverse of the scalar.
    pub fn neg(&self) -> Self {
        let mut ret = Self::zero();
        ret.sub(self);
        ret
    }

    /// Returns `[1, x, x^2, ..., x^(n-1)]`.
    pub fn powers(&self, n: usize) -> Vec<Self> {
        let mut powers = Vec::with_capacity(n);
        let mut current = Self::one();
        for _ in 0..n {
            powers.push(current);
            current.mul(self);
        }
        powers
    }

    /// Returns the canonical big-endian encoding of the scalar.
    fn to_bytes(self) -> [u8; SCALAR_LENGTH] {
        let mut bytes = [0u8; SCALAR_LENGTH];
        unsafe {
            let mut scalar = blst_scalar::default();
            blst_scalar_from_fr(&mut scalar, &self.0);
            blst_bendian_from_scalar(bytes.as_mut_ptr(), &scalar);
        }
        bytes
    }
}

/// Returns `<a, b>`.
pub fn inner_product(a: &[Scalar], b: &[Scalar]) -> Scalar {
    let mut sum = Scalar::zero();
    for (x, y) in a.iter().zip(b) {
        let mut term = *x;
        term.mul(y);
        sum.add(&term);
    }
    sum
}

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        self.0.l.zeroize();
    }
}

impl Element for Scalar {
    fn zero() -> Self {
        Self(blst_fr::default())
    }

    fn one() -> Self {
        BLST_FR_ONE
    }

    fn add(&mut self, rhs: &Self) {
        unsafe {
            blst_fr_add(&mut self.0, &self.0, &rhs.0);
        }
    }

    fn mul(&mut self, rhs: &Self) {
        unsafe {
            blst_fr_mul(&mut self.0, &self.0, &rhs.0);
        }
    }
}

impl Write for Scalar {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.to_bytes());
    }
}

impl Read for Scalar {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let bytes = <[u8; SCALAR_LENGTH]>::read(buf)?;
        let mut ret = blst_fr::default();
        unsafe {
            let mut scalar = blst_scalar::default();
            blst_scalar_from_bendian(&mut scalar, bytes.as_ptr());
            if !blst_scalar_fr_check(&scalar) {
                return Err(CodecError::Invalid("Scalar", "not canonical"));
            }
            blst_fr_from_scalar(&mut ret, &scalar);
        }
        Ok(Self(ret))
    }
}

impl FixedSize for Scalar {
    const SIZE: usize = SCALAR_LENGTH;
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({})", hex(&self.to_bytes()))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex(&self.to_bytes()))
    }
}

impl G1 {
    /// Hashes a message to G1 under the provided domain separation tag.
    pub fn hash(dst: &[u8], message: &[u8]) -> Self {
        let mut ret = blst_p1::default();
        unsafe {
            blst_hash_to_g1(
                &mut ret,
                message.as_ptr(),
                message.len(),
                dst.as_ptr(),
                dst.len(),
                ptr::null(),
                0,
            );
        }
        Self(ret)
    }

    /// Negates self in-place.
    pub fn neg(&mut self) {
        unsafe { blst_p1_cneg(&mut self.0, true) };
    }

    /// Subtracts the provided element from self in-place.
    pub fn sub(&mut self, rhs: &Self) {
        let mut negated = *rhs;
        negated.neg();
        self.add(&negated);
    }

    /// Returns `sum_i points[i] * scalars[i]` over the common prefix of both slices.
    ///
    /// Inputs with at least [`MSM_PIPPENGER_THRESHOLD`] non-trivial terms use Pippenger's
    /// algorithm.
    pub fn msm(points: &[Self], scalars: &[Scalar]) -> Self {
        let zero = Scalar::zero();
        let terms: Vec<(&Self, &Scalar)> = points
            .iter()
            .zip(scalars)
            .filter(|(point, scalar)| **scalar != zero && !point.is_zero())
            .collect();
        if terms.len() < MSM_PIPPENGER_THRESHOLD {
            let one = Scalar::one();
            let mut sum = Self::zero();
            for (point, scalar) in terms {
                let mut term = *point;
                if *scalar != one {
                    term.mul(scalar);
                }
                sum.add(&term);
            }
            return sum;
        }

        let raw: Vec<blst_p1> = terms.iter().map(|(point, _)| point.0).collect();
        let mut bytes = Vec::with_capacity(terms.len() * SCALAR_LENGTH);
        for (_, scalar) in &terms {
            let mut raw = blst_scalar::default();
            unsafe { blst_scalar_from_fr(&mut raw, &scalar.0) };
            bytes.extend_from_slice(&raw.b);
        }
        Self(p1_affines::from(&raw).mult(&bytes, SCALAR_BITS))
    }

    fn is_zero(&self) -> bool {
        unsafe { blst_p1_is_inf(&self.0) }
    }

    /// Returns the sum of the provided elements.
    pub fn sum<'a>(points: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut sum = Self::zero();
        for point in points {
            sum.add(point);
        }
        sum
    }

    fn to_bytes(self) -> [u8; G1_ELEMENT_BYTE_LENGTH] {
        let mut bytes = [0u8; G1_ELEMENT_BYTE_LENGTH];
        unsafe {
            blst_p1_compress(bytes.as_mut_ptr(), &self.0);
        }
        bytes
    }
}

impl Element for G1 {
    fn zero() -> Self {
        Self(blst_p1::default())
    }

    fn one() -> Self {
        let mut ret = blst_p1::default();
        unsafe {
            blst_p1_from_affine(&mut ret, &BLS12_381_G1);
        }
        Self(ret)
    }

    fn add(&mut self, rhs: &Self) {
        unsafe {
            blst_p1_add_or_double(&mut self.0, &self.0, &rhs.0);
        }
    }

    fn mul(&mut self, rhs: &Scalar) {
        let mut scalar: blst_scalar = blst_scalar::default();
        unsafe {
            blst_scalar_from_fr(&mut scalar, &rhs.0);
            blst_p1_mult(&mut self.0, &self.0, scalar.b.as_ptr(), bits(&scalar));
        }
    }
}

impl Write for G1 {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.to_bytes());
    }
}

impl Read for G1 {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let bytes = <[u8; G1_ELEMENT_BYTE_LENGTH]>::read(buf)?;
        let mut ret = blst_p1::default();
        unsafe {
            let mut affine = blst_p1_affine::default();
            if blst_p1_uncompress(&mut affine, bytes.as_ptr()) != BLST_ERROR::BLST_SUCCESS {
                return Err(CodecError::Invalid("G1", "invalid encoding"));
            }
            blst_p1_from_affine(&mut ret, &affine);

            // Commitments to zero vectors are legitimate, so the identity is accepted.
            if !blst_p1_in_g1(&ret) {
                return Err(CodecError::Invalid("G1", "not in subgroup"));
            }
        }
        Ok(Self(ret))
    }
}

impl FixedSize for G1 {
    const SIZE: usize = G1_ELEMENT_BYTE_LENGTH;
}

impl fmt::Debug for G1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G1({})", hex(&self.to_bytes()))
    }
}

impl fmt::Display for G1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex(&self.to_bytes()))
    }
}

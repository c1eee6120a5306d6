//! Hash primitives.
//!
//! Every other component only relies on the contract of [`HashPrimitive`]: the same
//! text always produces the same 64-char lowercase hex digest. Prefix-based difficulty
//! assumes the digest characters are close to uniformly distributed.

use sha2::{Digest, Sha256};

/// Deterministic text to fixed-width hex digest function.
pub trait HashPrimitive: Send + Sync {
    fn digest(&self, data: &str) -> String;
}

impl<H: HashPrimitive + ?Sized> HashPrimitive for &H {
    fn digest(&self, data: &str) -> String {
        (**self).digest(data)
    }
}

/// Four-lane 64-bit mixing hash. Fast and non-cryptographic.
#[derive(Clone, Copy, Debug, Default)]
pub struct MixHash;

impl HashPrimitive for MixHash {
    fn digest(&self, data: &str) -> String {
        let mut a: u64 = 0x1A2B_3C4D_5E6F_7788;
        let mut b: u64 = 0x8899_AABB_CCDD_EEFF;
        let mut c: u64 = 0x0123_4567_89AB_CDEF;
        let mut d: u64 = 0xF0E1_D2C3_B4A5_9687;

        for &byte in data.as_bytes() {
            let ch = u64::from(byte);

            a ^= ch;
            a = a.rotate_left(7);
            a = a.wrapping_mul(33).wrapping_add(ch ^ (ch >> 2));

            b ^= ch.rotate_left(11);
            b = b.wrapping_mul(29).wrapping_add(ch ^ (ch >> 4));

            c ^= ch.rotate_left(19);
            c = c.wrapping_mul(35).wrapping_add(ch ^ (ch >> 6));

            d ^= ch.rotate_left(23);
            d = d.wrapping_mul(39).wrapping_add(ch ^ (ch >> 8));
        }

        a ^= b.rotate_left(13);
        a = a.wrapping_add(c);

        b ^= c.rotate_left(17);
        b = b.wrapping_add(d);

        c ^= d.rotate_left(29);
        c = c.wrapping_add(a);

        d ^= a.rotate_left(31);
        d = d.wrapping_add(b);

        format!("{a:016x}{b:016x}{c:016x}{d:016x}")
    }
}

/// SHA-256 over the UTF-8 bytes, hex encoded.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hex;

impl HashPrimitive for Sha256Hex {
    fn digest(&self, data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Difficulty is a literal prefix match over the hex digest.
pub fn meets_target(hash: &str, target: &str) -> bool {
    hash.starts_with(target)
}

use crate::domain::value_objects::Fingerprint;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Compute the equality fingerprint of a decrypted configuration value.
///
/// Algorithm:
/// 1. 64-bit FNV-1a over the UTF-8 bytes of the value (order-sensitive).
/// 2. The hash is rendered in lowercase radix 36 (at most 13 characters).
///
/// Not cryptographic. Two values are treated as equal iff their fingerprints
/// are equal; the token is discarded at the end of the request.
pub fn fingerprint(value: &str) -> Fingerprint {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in value.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    Fingerprint(to_radix36(hash))
}

fn to_radix36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(13);
    while n > 0 {
        digits.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    digits.iter().rev().collect()
}

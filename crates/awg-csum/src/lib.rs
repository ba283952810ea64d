#![no_std]
#![forbid(unsafe_code)]

//! RFC 1071 Internet checksum.
//!
//! The running sum is kept in a 64-bit accumulator of native-endian words and
//! converted to network order only at the boundaries, so callers can chain
//! partial sums through `initial` and fold once at the end.

pub mod pseudo;
pub use pseudo::{pseudo_header_checksum, pseudo_header_checksum_no_fold};

pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

#[inline(always)]
fn word64(b: &[u8]) -> u64 {
    let mut w = [0u8; 8];
    w.copy_from_slice(&b[..8]);
    u64::from_ne_bytes(w)
}

/// Adds `v` into `ac` with the carry from the previous add.
#[inline(always)]
fn add_carry(ac: u64, v: u64, carry: u64) -> (u64, u64) {
    let (s1, c1) = ac.overflowing_add(v);
    let (s2, c2) = s1.overflowing_add(carry);
    (s2, (c1 | c2) as u64)
}

/// Sums `n` consecutive 8-byte words from `b`, ending with the carry folded back.
#[inline(always)]
fn add_words(mut ac: u64, b: &[u8], n: usize) -> u64 {
    let mut carry = 0;
    for i in 0..n {
        let (s, c) = add_carry(ac, word64(&b[i * 8..]), carry);
        ac = s;
        carry = c;
    }
    end_around(ac, carry)
}

#[inline(always)]
fn end_around(ac: u64, v: u64) -> u64 {
    let (s, c) = ac.overflowing_add(v);
    // s <= MAX - 1 whenever c is set, so this cannot wrap.
    s + c as u64
}

/// One's-complement sum of `b` without folding.
/// `initial` is a previous unfolded result, so runs can be chained
/// as long as every run but the last has even length.
pub fn checksum_no_fold(mut b: &[u8], initial: u64) -> u64 {
    let mut ac = u64::from_be_bytes(initial.to_ne_bytes());

    while b.len() >= 128 {
        ac = add_words(ac, b, 16);
        b = &b[128..];
    }
    if b.len() >= 64 {
        ac = add_words(ac, b, 8);
        b = &b[64..];
    }
    if b.len() >= 32 {
        ac = add_words(ac, b, 4);
        b = &b[32..];
    }
    if b.len() >= 16 {
        ac = add_words(ac, b, 2);
        b = &b[16..];
    }
    if b.len() >= 8 {
        ac = add_words(ac, b, 1);
        b = &b[8..];
    }
    if b.len() >= 4 {
        let v = u32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as u64;
        ac = end_around(ac, v);
        b = &b[4..];
    }
    if b.len() >= 2 {
        let v = u16::from_ne_bytes([b[0], b[1]]) as u64;
        ac = end_around(ac, v);
        b = &b[2..];
    }
    if b.len() == 1 {
        // Odd trailing byte is padded with a zero low-order byte.
        let v = u16::from_ne_bytes([b[0], 0]) as u64;
        ac = end_around(ac, v);
    }

    u64::from_be_bytes(ac.to_ne_bytes())
}

/// Folds an unfolded sum to 16 bits. Four rounds drain any 64-bit carry.
#[inline]
pub fn fold(mut ac: u64) -> u16 {
    ac = (ac >> 16) + (ac & 0xffff);
    ac = (ac >> 16) + (ac & 0xffff);
    ac = (ac >> 16) + (ac & 0xffff);
    ac = (ac >> 16) + (ac & 0xffff);
    ac as u16
}

/// Folded one's-complement sum of `b`. Not complemented: callers
/// writing a checksum field store `!checksum(..)`.
pub fn checksum(b: &[u8], initial: u64) -> u16 {
    fold(checksum_no_fold(b, initial))
}

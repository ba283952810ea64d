use crate::{checksum_no_fold, fold};

/// TCP/UDP pseudo-header sum: src, dst, {0, proto}, total length (BE).
pub fn pseudo_header_checksum_no_fold(protocol: u8, src: &[u8], dst: &[u8], total_len: u16) -> u64 {
    let sum = checksum_no_fold(src, 0);
    let sum = checksum_no_fold(dst, sum);
    let sum = checksum_no_fold(&[0, protocol], sum);
    checksum_no_fold(&total_len.to_be_bytes(), sum)
}

pub fn pseudo_header_checksum(protocol: u8, src: &[u8], dst: &[u8], total_len: u16) -> u16 {
    fold(pseudo_header_checksum_no_fold(protocol, src, dst, total_len))
}

#![forbid(unsafe_code)]

//! Software segmentation for super-packets handed up by a TUN device.
//!
//! The device delivers one large TCP packet plus a virtio-style header
//! describing how it should be cut. [`gso_split`] performs that cut into
//! caller-owned buffers so each piece can be disguised and sent on its own.

use std::ops::Range;

use awg_core::{AwgError, AwgResult};
use awg_csum::{checksum, pseudo_header_checksum_no_fold, IPPROTO_TCP};
use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GsoType {
    #[default]
    None,
    TcpV4,
    TcpV6,
}

/// Segmentation metadata accompanying a super-packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GsoOptions {
    pub gso_type: GsoType,
    /// L3 + L4 header bytes replicated ahead of every segment.
    pub hdr_len: usize,
    /// Maximum payload bytes per segment.
    pub gso_size: usize,
    /// Where L4 checksumming begins.
    pub csum_start: usize,
    /// Checksum field position relative to `csum_start`.
    pub csum_offset: usize,
    pub needs_csum: bool,
}

impl GsoOptions {
    /// Options for a packet that needs no segmentation.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Splits `packet` into `out_bufs`, writing at `offset` in each buffer.
///
/// Returns the number of segments produced; `sizes[i]` receives the length
/// written after `offset` in `out_bufs[i]`. No buffer is touched when an
/// error is returned.
pub fn gso_split(
    packet: &[u8],
    options: &GsoOptions,
    out_bufs: &mut [&mut [u8]],
    sizes: &mut [usize],
    offset: usize,
) -> AwgResult<usize> {
    let available = out_bufs.len().min(sizes.len());

    if options.gso_type == GsoType::None {
        if available == 0 {
            return Err(AwgError::InsufficientBuffers { needed: 1, available });
        }
        let dst = room(&mut out_bufs[0], offset, packet.len())?;
        dst.copy_from_slice(packet);
        sizes[0] = packet.len();
        return Ok(1);
    }

    let hdr_len = options.hdr_len;
    if hdr_len > packet.len() {
        return Err(AwgError::HeaderTooLong { hdr_len, packet_len: packet.len() });
    }
    let (header, payload) = packet.split_at(hdr_len);

    let segments = if payload.is_empty() {
        1
    } else if options.gso_size == 0 {
        return Err(AwgError::InvalidGsoSize);
    } else {
        (payload.len() + options.gso_size - 1) / options.gso_size
    };
    if segments > available {
        return Err(AwgError::InsufficientBuffers { needed: segments, available });
    }

    // Size and checksum layout checks up front so a failure leaves every buffer untouched.
    for i in 0..segments {
        let seg_len = hdr_len + chunk_len(payload.len(), options.gso_size, i);
        room(&mut out_bufs[i], offset, seg_len)?;
        if options.needs_csum {
            l4_checksum_layout(options, seg_len)?;
        }
    }

    for i in 0..segments {
        let start = i * options.gso_size;
        let len = chunk_len(payload.len(), options.gso_size, i);
        let seg_len = hdr_len + len;
        let seg = room(&mut out_bufs[i], offset, seg_len)?;
        seg[..hdr_len].copy_from_slice(header);
        seg[hdr_len..].copy_from_slice(&payload[start..start + len]);
        if options.needs_csum {
            let layout = l4_checksum_layout(options, seg_len)?;
            write_l4_checksum(seg, options, layout);
        }
        sizes[i] = seg_len;
    }

    trace!(
        "gso split {} bytes into {} segments (hdr={} mss={})",
        packet.len(),
        segments,
        hdr_len,
        options.gso_size
    );
    Ok(segments)
}

fn chunk_len(payload_len: usize, gso_size: usize, i: usize) -> usize {
    if payload_len == 0 {
        return 0;
    }
    let start = i * gso_size;
    gso_size.min(payload_len - start)
}

fn room<'a>(buf: &'a mut [u8], offset: usize, len: usize) -> AwgResult<&'a mut [u8]> {
    match offset.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(&mut buf[offset..end]),
        _ => Err(AwgError::InsufficientBuffers { needed: offset.saturating_add(len), available: buf.len() }),
    }
}

/// Address ranges and L4 length for a segment's pseudo-header.
struct L4Layout {
    src: Range<usize>,
    dst: Range<usize>,
    l4_len: u16,
}

/// The checksum field and IP addresses must sit inside the replicated header.
fn l4_checksum_layout(options: &GsoOptions, seg_len: usize) -> AwgResult<L4Layout> {
    let field_end = options
        .csum_start
        .checked_add(options.csum_offset)
        .and_then(|f| f.checked_add(2));
    if !matches!(field_end, Some(end) if end <= options.hdr_len) {
        return Err(AwgError::MalformedMessage("checksum field outside header"));
    }
    let (src, dst) = match options.gso_type {
        GsoType::TcpV4 if options.hdr_len >= 20 => (12..16, 16..20),
        GsoType::TcpV6 if options.hdr_len >= 40 => (8..24, 24..40),
        _ => return Err(AwgError::MalformedMessage("IP header truncated")),
    };
    let l4_len = u16::try_from(seg_len - options.csum_start)
        .map_err(|_| AwgError::MalformedMessage("segment exceeds 64 KiB"))?;
    Ok(L4Layout { src, dst, l4_len })
}

/// Recomputes the TCP checksum of one segment in place.
fn write_l4_checksum(seg: &mut [u8], options: &GsoOptions, layout: L4Layout) {
    let field = options.csum_start + options.csum_offset;
    seg[field..field + 2].fill(0);
    let pseudo = pseudo_header_checksum_no_fold(IPPROTO_TCP, &seg[layout.src], &seg[layout.dst], layout.l4_len);
    let sum = !checksum(&seg[options.csum_start..], pseudo);
    seg[field..field + 2].copy_from_slice(&sum.to_be_bytes());
}

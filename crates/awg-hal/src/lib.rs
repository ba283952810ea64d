#![forbid(unsafe_code)]

//! Capability contracts for the virtual network device beneath the tunnel.
//! Implementations live with the platform; this crate only fixes the shape.

use awg_core::AwgError;
use awg_offload::{gso_split, GsoOptions};

/// Receive-side coalescing switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroSettings {
    pub tcp: bool,
    pub udp: bool,
}

impl Default for GroSettings {
    fn default() -> Self {
        Self { tcp: true, udp: true }
    }
}

/// A TUN-style packet device.
/// INVARIANT: Must be non-blocking. An empty queue is `WouldBlock`.
///
/// Batch calls address packet `i` as `bufs[i][offset..]`, leaving `offset`
/// bytes of headroom for the caller's own framing.
pub trait TunDevice: Send {
    fn name(&self) -> &str;

    fn mtu(&self) -> usize;

    /// Upper bound on packets moved by one `read` or `write`.
    fn batch_size(&self) -> usize {
        1
    }

    /// Reads a single packet into `buf`.
    fn read_packet(&mut self, buf: &mut [u8]) -> nb::Result<usize, AwgError>;

    /// Writes a single packet.
    fn write_packet(&mut self, packet: &[u8]) -> nb::Result<usize, AwgError>;

    /// Vectored read. The default loops over `read_packet`, for devices
    /// without a batched kernel interface.
    fn read(&mut self, bufs: &mut [&mut [u8]], sizes: &mut [usize], offset: usize) -> nb::Result<usize, AwgError> {
        let mut count = 0;
        for (buf, size) in bufs.iter_mut().zip(sizes.iter_mut()).take(self.batch_size()) {
            let Some(room) = buf.get_mut(offset..) else { break };
            match self.read_packet(room) {
                Ok(n) => {
                    *size = n;
                    count += 1;
                }
                Err(nb::Error::WouldBlock) => break,
                Err(e) if count == 0 => return Err(e),
                Err(_) => break,
            }
        }
        if count > 0 { Ok(count) } else { Err(nb::Error::WouldBlock) }
    }

    /// Vectored write. Returns the number of packets accepted.
    fn write(&mut self, bufs: &[&[u8]], offset: usize) -> nb::Result<usize, AwgError> {
        let mut count = 0;
        for buf in bufs {
            let packet = buf
                .get(offset..)
                .ok_or(AwgError::MalformedMessage("offset beyond buffer"))?;
            match self.write_packet(packet) {
                Ok(_) => count += 1,
                Err(nb::Error::WouldBlock) if count > 0 => break,
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    /// Writes a super-packet on a device that cannot segment it itself.
    /// Slices it through `gso_split` into `scratch` and writes the pieces.
    fn write_gso(
        &mut self,
        packet: &[u8],
        options: &GsoOptions,
        scratch: &mut [&mut [u8]],
        offset: usize,
    ) -> nb::Result<usize, AwgError> {
        let mut sizes = vec![0usize; scratch.len()];
        let n = gso_split(packet, options, scratch, &mut sizes, offset)?;
        let segments: Vec<&[u8]> = scratch[..n]
            .iter()
            .zip(&sizes)
            .map(|(buf, len)| &buf[..offset + len])
            .collect();
        self.write(&segments, offset)
    }
}

/// A device that coalesces received segments before handing them up.
pub trait GroDevice: TunDevice {
    /// Merges the first entries of `bufs` in place where possible and
    /// returns how many logical packets remain. `sizes` is updated to match.
    fn gro(&mut self, bufs: &mut [&mut [u8]], sizes: &mut [usize], offset: usize) -> Result<usize, AwgError>;

    fn gro_settings(&self) -> GroSettings;

    fn disable_tcp_gro(&mut self);

    fn disable_udp_gro(&mut self);
}

use std::collections::VecDeque;

use awg_core::AwgError;
use awg_hal::{GroDevice, GroSettings, TunDevice};
use awg_offload::{GsoOptions, GsoType};

/// In-memory device: `inbound` feeds reads, writes land in `written`.
struct MockTun {
    mtu: usize,
    batch: usize,
    inbound: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    gro: GroSettings,
}

impl MockTun {
    fn new(batch: usize) -> Self {
        Self { mtu: 1420, batch, inbound: VecDeque::new(), written: Vec::new(), gro: GroSettings::default() }
    }
}

impl TunDevice for MockTun {
    fn name(&self) -> &str {
        "awg-test0"
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn batch_size(&self) -> usize {
        self.batch
    }

    fn read_packet(&mut self, buf: &mut [u8]) -> nb::Result<usize, AwgError> {
        let pkt = self.inbound.pop_front().ok_or(nb::Error::WouldBlock)?;
        if pkt.len() > buf.len() {
            return Err(nb::Error::Other(AwgError::InsufficientBuffers { needed: pkt.len(), available: buf.len() }));
        }
        buf[..pkt.len()].copy_from_slice(&pkt);
        Ok(pkt.len())
    }

    fn write_packet(&mut self, packet: &[u8]) -> nb::Result<usize, AwgError> {
        self.written.push(packet.to_vec());
        Ok(packet.len())
    }
}

impl GroDevice for MockTun {
    /// Coalesces adjacent packets sharing a leading flow byte; byte 1 marks TCP (6) or UDP (17).
    fn gro(&mut self, bufs: &mut [&mut [u8]], sizes: &mut [usize], offset: usize) -> Result<usize, AwgError> {
        let mut out = 0;
        for i in 0..sizes.len() {
            let (head, tail) = bufs.split_at_mut(i);
            let cur = &tail[0][offset..offset + sizes[i]];
            let proto_on = match cur[1] {
                6 => self.gro.tcp,
                17 => self.gro.udp,
                _ => false,
            };
            if out > 0 && proto_on {
                let last = out - 1;
                let prev = &mut head[last][offset..];
                if prev[0] == cur[0] && prev[1] == cur[1] && sizes[last] + cur.len() - 2 <= prev.len() {
                    prev[sizes[last]..sizes[last] + cur.len() - 2].copy_from_slice(&cur[2..]);
                    sizes[last] += cur.len() - 2;
                    continue;
                }
            }
            if out != i {
                let (dst, src) = bufs.split_at_mut(i);
                dst[out][offset..offset + sizes[i]].copy_from_slice(&src[0][offset..offset + sizes[i]]);
                sizes[out] = sizes[i];
            }
            out += 1;
        }
        Ok(out)
    }

    fn gro_settings(&self) -> GroSettings {
        self.gro
    }

    fn disable_tcp_gro(&mut self) {
        self.gro.tcp = false;
    }

    fn disable_udp_gro(&mut self) {
        self.gro.udp = false;
    }
}

#[test]
fn test_batched_read_respects_offset_and_batch() {
    let mut dev = MockTun::new(2);
    dev.inbound.extend([vec![1u8; 10], vec![2u8; 20], vec![3u8; 30]]);

    let mut store = vec![vec![0u8; 64]; 4];
    let mut bufs: Vec<&mut [u8]> = store.iter_mut().map(|b| b.as_mut_slice()).collect();
    let mut sizes = [0usize; 4];

    assert_eq!(dev.read(&mut bufs, &mut sizes, 8), Ok(2));
    assert_eq!(&sizes[..2], &[10, 20]);
    assert!(bufs[0][..8].iter().all(|b| *b == 0));
    assert!(bufs[1][8..28].iter().all(|b| *b == 2));

    assert_eq!(dev.read(&mut bufs, &mut sizes, 8), Ok(1));
    assert_eq!(dev.read(&mut bufs, &mut sizes, 8), Err(nb::Error::WouldBlock));
}

#[test]
fn test_read_error_surfaces_on_first_packet() {
    let mut dev = MockTun::new(4);
    dev.inbound.push_back(vec![0u8; 100]);
    let mut store = vec![vec![0u8; 50]; 1];
    let mut bufs: Vec<&mut [u8]> = store.iter_mut().map(|b| b.as_mut_slice()).collect();
    let res = dev.read(&mut bufs, &mut [0], 0);
    assert!(matches!(res, Err(nb::Error::Other(AwgError::InsufficientBuffers { .. }))));
}

#[test]
fn test_write_strips_headroom() {
    let mut dev = MockTun::new(8);
    let a = [0xffu8, 0xff, 1, 2, 3];
    let b = [0xffu8, 0xff, 9];
    assert_eq!(dev.write(&[&a[..], &b[..]], 2), Ok(2));
    assert_eq!(dev.written, vec![vec![1, 2, 3], vec![9]]);

    assert!(dev.write(&[&b[..]], 4).is_err());
}

#[test]
fn test_write_gso_falls_back_to_software_split() {
    let mut dev = MockTun::new(8);
    let mut pkt = vec![0xaau8; 20];
    pkt.extend((0..250u32).map(|i| i as u8));
    let opts = GsoOptions { gso_type: GsoType::TcpV4, hdr_len: 20, gso_size: 100, ..GsoOptions::none() };

    let mut store = vec![vec![0u8; 200]; 4];
    let mut scratch: Vec<&mut [u8]> = store.iter_mut().map(|b| b.as_mut_slice()).collect();
    assert_eq!(dev.write_gso(&pkt, &opts, &mut scratch, 16), Ok(3));

    let lens: Vec<usize> = dev.written.iter().map(Vec::len).collect();
    assert_eq!(lens, vec![120, 120, 70]);
    assert!(dev.written.iter().all(|seg| seg[..20] == pkt[..20]));
    assert_eq!(&dev.written[2][20..], &pkt[220..]);
}

#[test]
fn test_write_gso_reports_split_errors() {
    let mut dev = MockTun::new(8);
    let pkt = vec![0u8; 520];
    let opts = GsoOptions { gso_type: GsoType::TcpV4, hdr_len: 20, gso_size: 100, ..GsoOptions::none() };
    let mut store = vec![vec![0u8; 200]; 2];
    let mut scratch: Vec<&mut [u8]> = store.iter_mut().map(|b| b.as_mut_slice()).collect();
    assert_eq!(
        dev.write_gso(&pkt, &opts, &mut scratch, 0),
        Err(nb::Error::Other(AwgError::InsufficientBuffers { needed: 5, available: 2 }))
    );
    assert!(dev.written.is_empty());
}

fn gro_batch(dev: &mut MockTun, packets: &[&[u8]]) -> (usize, Vec<Vec<u8>>) {
    let mut store = vec![vec![0u8; 64]; packets.len()];
    let mut sizes: Vec<usize> = packets.iter().map(|p| p.len()).collect();
    for (buf, p) in store.iter_mut().zip(packets) {
        buf[4..4 + p.len()].copy_from_slice(p);
    }
    let mut bufs: Vec<&mut [u8]> = store.iter_mut().map(|b| b.as_mut_slice()).collect();
    let n = dev.gro(&mut bufs, &mut sizes, 4).unwrap();
    let merged = (0..n).map(|i| bufs[i][4..4 + sizes[i]].to_vec()).collect();
    (n, merged)
}

#[test]
fn test_gro_toggles_are_independent() {
    let tcp: [&[u8]; 3] = [&[1, 6, 10], &[1, 6, 11], &[1, 6, 12]];
    let udp: [&[u8]; 2] = [&[2, 17, 20], &[2, 17, 21]];
    let mixed = [tcp[0], tcp[1], tcp[2], udp[0], udp[1]];

    let mut dev = MockTun::new(8);
    assert_eq!(dev.gro_settings(), GroSettings { tcp: true, udp: true });
    let (n, merged) = gro_batch(&mut dev, &mixed);
    assert_eq!(n, 2);
    assert_eq!(merged[0], vec![1, 6, 10, 11, 12]);
    assert_eq!(merged[1], vec![2, 17, 20, 21]);

    dev.disable_tcp_gro();
    let (n, merged) = gro_batch(&mut dev, &mixed);
    assert_eq!(n, 4);
    assert_eq!(merged[3], vec![2, 17, 20, 21]);

    dev.disable_udp_gro();
    assert_eq!(dev.gro_settings(), GroSettings { tcp: false, udp: false });
    assert_eq!(gro_batch(&mut dev, &mixed).0, 5);
}

#[test]
fn test_device_identity() {
    let dev = MockTun::new(1);
    assert_eq!(dev.name(), "awg-test0");
    assert_eq!(dev.mtu(), 1420);
}

use std::fmt::Write as _;
use std::sync::Arc;

use awg_core::{parse_error, AwgError, AwgResult, MessageType, MESSAGE_TYPE_COUNT};
use awg_prng::RandomSource;
use log::debug;

use crate::magic::{parse_range, MagicHeaderRange, MagicHeaderSet};

pub const MAX_JUNK_PACKET_COUNT: usize = 128;
pub const MAX_JUNK_PACKET_SIZE: usize = 1280;
pub const MIN_HANDSHAKE_JUNK: usize = 15;
pub const MAX_HANDSHAKE_JUNK: usize = 150;

/// Tunnel-wide obfuscation settings. Replaced wholesale on reconfiguration.
#[derive(Debug, Clone, PartialEq)]
pub struct ObfuscationConfig {
    pub enabled: bool,
    /// Jc: junk datagrams sent ahead of each handshake initiation.
    pub junk_packet_count: usize,
    /// Jmin / Jmax: size bounds for those datagrams.
    pub junk_packet_min_size: usize,
    pub junk_packet_max_size: usize,
    /// S1..S4: padding prepended to each message category.
    pub init_header_junk_size: usize,
    pub response_header_junk_size: usize,
    pub cookie_reply_header_junk_size: usize,
    pub transport_header_junk_size: usize,
    /// H1..H4.
    pub magic_headers: MagicHeaderSet,
}

impl ObfuscationConfig {
    /// Plain WireGuard: no junk, stock type values.
    pub fn disabled(rng: Arc<dyn RandomSource>) -> Self {
        Self {
            enabled: false,
            junk_packet_count: 0,
            junk_packet_min_size: 0,
            junk_packet_max_size: 0,
            init_header_junk_size: 0,
            response_header_junk_size: 0,
            cookie_reply_header_junk_size: 0,
            transport_header_junk_size: 0,
            magic_headers: MagicHeaderSet::identity(rng),
        }
    }

    pub fn header_junk_size(&self, ty: MessageType) -> usize {
        match ty {
            MessageType::Initiation => self.init_header_junk_size,
            MessageType::Response => self.response_header_junk_size,
            MessageType::CookieReply => self.cookie_reply_header_junk_size,
            MessageType::Transport => self.transport_header_junk_size,
        }
    }

    /// True when any knob differs from stock WireGuard.
    pub fn has_obfuscation(&self) -> bool {
        self.junk_packet_count > 0
            || self.junk_packet_min_size > 0
            || self.junk_packet_max_size > 0
            || MessageType::ALL.iter().any(|ty| self.header_junk_size(*ty) > 0)
            || !self.magic_headers.is_identity()
    }

    pub fn validate(&self) -> AwgResult<()> {
        let invalid = |msg: String| Err(AwgError::InvalidConfig(msg));

        if self.junk_packet_count > MAX_JUNK_PACKET_COUNT {
            return invalid(format!("Jc must be between 0 and {}", MAX_JUNK_PACKET_COUNT));
        }
        if self.junk_packet_max_size > MAX_JUNK_PACKET_SIZE {
            return invalid(format!("Jmax must be <= {}", MAX_JUNK_PACKET_SIZE));
        }
        if self.junk_packet_max_size != 0 && self.junk_packet_min_size > self.junk_packet_max_size {
            return invalid("Jmin must be <= Jmax".into());
        }
        // With Jmax == 0 the decoys are exactly Jmin bytes.
        if self.junk_packet_min_size > MAX_JUNK_PACKET_SIZE {
            return invalid(format!("Jmin must be <= {}", MAX_JUNK_PACKET_SIZE));
        }
        for (name, s) in [("S1", self.init_header_junk_size), ("S2", self.response_header_junk_size)] {
            if s != 0 && !(MIN_HANDSHAKE_JUNK..=MAX_HANDSHAKE_JUNK).contains(&s) {
                return invalid(format!(
                    "{} must be 0 or between {} and {}",
                    name, MIN_HANDSHAKE_JUNK, MAX_HANDSHAKE_JUNK
                ));
            }
        }
        for (name, s) in [("S3", self.cookie_reply_header_junk_size), ("S4", self.transport_header_junk_size)] {
            if s > MAX_JUNK_PACKET_SIZE {
                return invalid(format!("{} must be <= {}", name, MAX_JUNK_PACKET_SIZE));
            }
        }

        // Receivers classify handshakes by padded length alone.
        let handshakes = [MessageType::Initiation, MessageType::Response, MessageType::CookieReply];
        for (i, a) in handshakes.iter().enumerate() {
            for b in &handshakes[i + 1..] {
                let la = a.base_size().saturating_add(self.header_junk_size(*a));
                let lb = b.base_size().saturating_add(self.header_junk_size(*b));
                if la == lb {
                    return invalid(format!("{} and {} would both be {} bytes on the wire", a, b, la));
                }
            }
        }

        if self.magic_headers.ranges().iter().any(|r| r.min() == 0) {
            return invalid("H1-H4 must be >= 1".into());
        }
        Ok(())
    }

    /// Parses the `[Interface]` section of an obfuscation config file.
    /// Other sections and unknown keys are ignored; `enabled` is derived.
    pub fn from_config_str(text: &str, rng: Arc<dyn RandomSource>) -> AwgResult<Self> {
        let mut cfg = Self::disabled(rng.clone());
        let mut headers = [None; MESSAGE_TYPE_COUNT];
        let mut in_interface = false;

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                in_interface = line.eq_ignore_ascii_case("[interface]");
                continue;
            }
            if !in_interface {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(parse_error(line, "expected key = value"));
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            let slot = match key.as_str() {
                "jc" => &mut cfg.junk_packet_count,
                "jmin" => &mut cfg.junk_packet_min_size,
                "jmax" => &mut cfg.junk_packet_max_size,
                "s1" => &mut cfg.init_header_junk_size,
                "s2" => &mut cfg.response_header_junk_size,
                "s3" => &mut cfg.cookie_reply_header_junk_size,
                "s4" => &mut cfg.transport_header_junk_size,
                "h1" | "h2" | "h3" | "h4" => {
                    let idx = (key.as_bytes()[1] - b'1') as usize;
                    headers[idx] = Some(parse_range(value)?);
                    continue;
                }
                _ => {
                    debug!("ignoring unknown key {:?}", key);
                    continue;
                }
            };
            *slot = value
                .parse::<usize>()
                .map_err(|e| parse_error(value, format!("{}: {}", key, e)))?;
        }

        let ranges: Vec<MagicHeaderRange> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| h.unwrap_or(MagicHeaderRange::single(i as u32 + 1)))
            .collect();
        let identity = MagicHeaderSet::identity(rng.clone());
        cfg.magic_headers = if ranges.as_slice() == identity.ranges() {
            identity
        } else {
            MagicHeaderSet::new(&ranges, rng)?
        };

        cfg.enabled = cfg.has_obfuscation();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_config_string(&self) -> String {
        let mut out = String::from("[Interface]\n");
        let sizes = [
            ("Jc", self.junk_packet_count),
            ("Jmin", self.junk_packet_min_size),
            ("Jmax", self.junk_packet_max_size),
            ("S1", self.init_header_junk_size),
            ("S2", self.response_header_junk_size),
            ("S3", self.cookie_reply_header_junk_size),
            ("S4", self.transport_header_junk_size),
        ];
        for (k, v) in sizes {
            let _ = writeln!(out, "{} = {}", k, v);
        }
        for (i, r) in self.magic_headers.ranges().iter().enumerate() {
            let _ = writeln!(out, "H{} = {}", i + 1, r);
        }
        out
    }
}

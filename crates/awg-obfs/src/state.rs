use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use awg_core::{AwgError, AwgResult, MessageType, TYPE_FIELD_LEN};
use awg_prng::{RandomSource, RandomSourceExt};
use log::info;
use spin::RwLock;

use crate::config::ObfuscationConfig;
use crate::junk::{JunkCreator, RandomJunk};

/// Notified after each handshake message is disguised.
pub trait HandshakeObserver: Send + Sync {
    fn on_handshake(&self, kind: MessageType, wire_len: usize);
}

/// Per-session obfuscation state shared by all packet threads.
///
/// Readers clone the current `Arc<ObfuscationConfig>` and work on that
/// snapshot; [`reconfigure`](Self::reconfigure) publishes a replacement.
/// A caller therefore sees either the old or the new configuration in full,
/// never a mix of the two.
pub struct ObfuscationState {
    is_on: AtomicBool,
    config: RwLock<Arc<ObfuscationConfig>>,
    junk: Arc<dyn JunkCreator>,
    rng: Arc<dyn RandomSource>,
    observer: Option<Arc<dyn HandshakeObserver>>,
}

pub struct StateBuilder {
    rng: Arc<dyn RandomSource>,
    junk: Option<Arc<dyn JunkCreator>>,
    observer: Option<Arc<dyn HandshakeObserver>>,
}

impl StateBuilder {
    /// Overrides the default keystream padding.
    pub fn junk_creator(mut self, junk: Arc<dyn JunkCreator>) -> Self {
        self.junk = Some(junk);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn HandshakeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self, config: ObfuscationConfig) -> AwgResult<ObfuscationState> {
        config.validate()?;
        let junk = match self.junk {
            Some(j) => j,
            None => Arc::new(RandomJunk::new(self.rng.clone())),
        };
        info!(
            "obfuscation {}: jc={} s1={} s2={} s3={} s4={}",
            if config.enabled { "on" } else { "off" },
            config.junk_packet_count,
            config.init_header_junk_size,
            config.response_header_junk_size,
            config.cookie_reply_header_junk_size,
            config.transport_header_junk_size,
        );
        Ok(ObfuscationState {
            is_on: AtomicBool::new(config.enabled),
            config: RwLock::new(Arc::new(config)),
            junk,
            rng: self.rng,
            observer: self.observer,
        })
    }
}

impl ObfuscationState {
    pub fn builder(rng: Arc<dyn RandomSource>) -> StateBuilder {
        StateBuilder { rng, junk: None, observer: None }
    }

    /// Keystream junk, no observer.
    pub fn new(config: ObfuscationConfig, rng: Arc<dyn RandomSource>) -> AwgResult<Self> {
        Self::builder(rng).build(config)
    }

    /// Lock-free view of the enable flag.
    #[inline]
    pub fn is_on(&self) -> bool {
        self.is_on.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> Arc<ObfuscationConfig> {
        self.config.read().clone()
    }

    /// Blocks until in-flight snapshot reads finish, then swaps.
    pub fn reconfigure(&self, config: ObfuscationConfig) -> AwgResult<()> {
        config.validate()?;
        let enabled = config.enabled;
        let mut current = self.config.write();
        *current = Arc::new(config);
        self.is_on.store(enabled, Ordering::Release);
        drop(current);
        info!("obfuscation reconfigured (enabled={})", enabled);
        Ok(())
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut current = self.config.write();
        if current.enabled != enabled {
            let mut next = (**current).clone();
            next.enabled = enabled;
            *current = Arc::new(next);
        }
        self.is_on.store(enabled, Ordering::Release);
    }

    fn header_junk(&self, cfg: &ObfuscationConfig, ty: MessageType, extra: usize) -> AwgResult<Vec<u8>> {
        let size = if cfg.enabled { cfg.header_junk_size(ty) } else { 0 };
        if size == 0 {
            return Ok(Vec::new());
        }
        let capacity = size
            .checked_add(extra)
            .ok_or(AwgError::MalformedMessage("payload size overflows junk buffer"))?;
        let mut buf = Vec::with_capacity(capacity);
        self.junk.append_junk(&mut buf, size)?;
        Ok(buf)
    }

    fn create_junk_for(&self, ty: MessageType, extra: usize) -> AwgResult<Vec<u8>> {
        if !self.is_on() {
            return Ok(Vec::new());
        }
        let cfg = self.snapshot();
        self.header_junk(&cfg, ty, extra)
    }

    pub fn create_init_junk(&self) -> AwgResult<Vec<u8>> {
        self.create_junk_for(MessageType::Initiation, 0)
    }

    pub fn create_response_junk(&self) -> AwgResult<Vec<u8>> {
        self.create_junk_for(MessageType::Response, 0)
    }

    pub fn create_cookie_reply_junk(&self) -> AwgResult<Vec<u8>> {
        self.create_junk_for(MessageType::CookieReply, 0)
    }

    /// Junk with spare capacity for `payload_size` bytes of transport data.
    pub fn create_transport_junk(&self, payload_size: usize) -> AwgResult<Vec<u8>> {
        self.create_junk_for(MessageType::Transport, payload_size)
    }

    /// Decoy datagrams sent ahead of a handshake initiation.
    pub fn create_junk_packets(&self) -> AwgResult<Vec<Vec<u8>>> {
        if !self.is_on() {
            return Ok(Vec::new());
        }
        let cfg = self.snapshot();
        if !cfg.enabled || cfg.junk_packet_count == 0 {
            return Ok(Vec::new());
        }
        let mut packets = Vec::with_capacity(cfg.junk_packet_count);
        for _ in 0..cfg.junk_packet_count {
            let size = self.rng.bounded(cfg.junk_packet_min_size, cfg.junk_packet_max_size);
            let mut pkt = Vec::with_capacity(size);
            self.junk.append_junk(&mut pkt, size)?;
            packets.push(pkt);
        }
        Ok(packets)
    }

    /// Type-field value to write for `default_category`.
    /// Off means stock WireGuard: the category is returned as-is.
    pub fn get_message_magic(&self, default_category: u32) -> AwgResult<u32> {
        let cfg = self.snapshot();
        if !cfg.enabled {
            return Ok(default_category);
        }
        cfg.magic_headers.get(default_category)
    }

    /// Category of an observed type-field value.
    pub fn message_type_of(&self, value: u32) -> AwgResult<MessageType> {
        let cfg = self.snapshot();
        if !cfg.enabled {
            return MessageType::try_from(value).map_err(|_| AwgError::NoMatch(value));
        }
        cfg.magic_headers.reverse_lookup(value)
    }

    /// Prepends junk to `message` and overwrites its type field.
    /// Junk size and magic value come from the same snapshot.
    pub fn wrap_message(&self, ty: MessageType, message: &[u8]) -> AwgResult<Vec<u8>> {
        if message.len() < TYPE_FIELD_LEN {
            return Err(AwgError::MalformedMessage("message shorter than type field"));
        }
        let cfg = self.snapshot();
        let mut out = self.header_junk(&cfg, ty, message.len())?;
        let start = out.len();
        out.extend_from_slice(message);

        let magic = if cfg.enabled { cfg.magic_headers.magic_for(ty) } else { ty.wire_value() };
        out[start..start + TYPE_FIELD_LEN].copy_from_slice(&magic.to_le_bytes());

        if ty.is_handshake() {
            if let Some(obs) = &self.observer {
                obs.on_handshake(ty, out.len());
            }
        }
        Ok(out)
    }

    /// Classifies a received datagram and strips its junk.
    ///
    /// Handshake categories are recognised by exact padded length, then
    /// confirmed by the type field; anything else is tried as transport.
    pub fn unwrap_message<'a>(&self, packet: &'a [u8]) -> AwgResult<(MessageType, &'a [u8])> {
        let cfg = self.snapshot();
        let mut observed = None;

        for ty in MessageType::ALL {
            let junk = if cfg.enabled { cfg.header_junk_size(ty) } else { 0 };
            let fits = if ty.is_handshake() {
                packet.len() == junk.saturating_add(ty.base_size())
            } else {
                packet.len() >= junk.saturating_add(ty.base_size())
            };
            if !fits {
                continue;
            }

            let body = &packet[junk..];
            let mut field = [0u8; TYPE_FIELD_LEN];
            field.copy_from_slice(&body[..TYPE_FIELD_LEN]);
            let value = u32::from_le_bytes(field);
            observed = Some(value);

            let matches = if cfg.enabled {
                cfg.magic_headers.range(ty).contains(value)
            } else {
                value == ty.wire_value()
            };
            if matches {
                return Ok((ty, body));
            }
        }

        match observed {
            Some(value) => Err(AwgError::NoMatch(value)),
            None => Err(AwgError::MalformedMessage("datagram too short for any message")),
        }
    }
}

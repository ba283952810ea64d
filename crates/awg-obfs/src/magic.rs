use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use awg_core::{parse_error, AwgError, AwgResult, MessageType, MESSAGE_TYPE_COUNT};
use awg_prng::{RandomSource, RandomSourceExt};

/// Inclusive `[min, max]` interval of type-field values for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MagicHeaderRange {
    min: u32,
    max: u32,
}

impl MagicHeaderRange {
    pub fn new(min: u32, max: u32) -> AwgResult<Self> {
        if min > max {
            return Err(AwgError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub const fn single(value: u32) -> Self {
        Self { min: value, max: value }
    }

    pub fn min(&self) -> u32 { self.min }
    pub fn max(&self) -> u32 { self.max }

    #[inline]
    pub fn contains(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }
}

fn parse_u32(full: &str, part: &str) -> AwgResult<u32> {
    // u32::from_str would also take a leading '+'.
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(parse_error(full, format!("{:?} is not an unsigned integer", part)));
    }
    part.parse::<u32>()
        .map_err(|e| parse_error(full, e.to_string()))
}

/// Parses `"N"` or `"N-M"`.
pub fn parse_range(text: &str) -> AwgResult<MagicHeaderRange> {
    let value = text.trim();
    match value.split_once('-') {
        None => parse_u32(value, value).map(MagicHeaderRange::single),
        Some((lo, hi)) => {
            if lo.is_empty() || hi.is_empty() {
                return Err(parse_error(value, "expected format: min-max"));
            }
            let min = parse_u32(value, lo)?;
            let max = parse_u32(value, hi)?;
            MagicHeaderRange::new(min, max)
        }
    }
}

impl FromStr for MagicHeaderRange {
    type Err = AwgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_range(s)
    }
}

impl fmt::Display for MagicHeaderRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

const IDENTITY: [MagicHeaderRange; MESSAGE_TYPE_COUNT] = [
    MagicHeaderRange::single(1),
    MagicHeaderRange::single(2),
    MagicHeaderRange::single(3),
    MagicHeaderRange::single(4),
];

/// The four category ranges, indexed by [`MessageType`].
/// INVARIANT: pairwise disjoint once sorted by `min`.
#[derive(Clone)]
pub struct MagicHeaderSet {
    ranges: [MagicHeaderRange; MESSAGE_TYPE_COUNT],
    rng: Arc<dyn RandomSource>,
}

impl MagicHeaderSet {
    /// `ranges` are in category order: initiation, response, cookie reply, transport.
    pub fn new(ranges: &[MagicHeaderRange], rng: Arc<dyn RandomSource>) -> AwgResult<Self> {
        let ranges: [MagicHeaderRange; MESSAGE_TYPE_COUNT] = ranges
            .try_into()
            .map_err(|_| AwgError::CountMismatch(ranges.len()))?;

        let mut sorted = ranges;
        sorted.sort_by_key(|r| r.min);
        for pair in sorted.windows(2) {
            if pair[0].max >= pair[1].min {
                return Err(AwgError::Overlap { max: pair[0].max, next_min: pair[1].min });
            }
        }

        Ok(Self { ranges, rng })
    }

    /// Stock WireGuard types `{1, 2, 3, 4}`, built without the overlap check.
    pub fn identity(rng: Arc<dyn RandomSource>) -> Self {
        Self { ranges: IDENTITY, rng }
    }

    pub fn is_identity(&self) -> bool {
        self.ranges == IDENTITY
    }

    /// Swaps the randomness source, e.g. for a seeded one in tests.
    pub fn with_random_source(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn ranges(&self) -> &[MagicHeaderRange; MESSAGE_TYPE_COUNT] {
        &self.ranges
    }

    pub fn range(&self, ty: MessageType) -> MagicHeaderRange {
        self.ranges[ty.index()]
    }

    /// Draws a type-field value for `category` (1..=4).
    pub fn get(&self, category: u32) -> AwgResult<u32> {
        let ty = MessageType::try_from(category)?;
        Ok(self.magic_for(ty))
    }

    pub fn magic_for(&self, ty: MessageType) -> u32 {
        let r = self.range(ty);
        self.rng.bounded(r.min, r.max)
    }

    pub fn reverse_lookup(&self, value: u32) -> AwgResult<MessageType> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|ty| self.range(*ty).contains(value))
            .ok_or(AwgError::NoMatch(value))
    }

    /// Lower bound of the range containing `value`.
    pub fn range_min_for(&self, value: u32) -> AwgResult<u32> {
        self.reverse_lookup(value).map(|ty| self.range(ty).min)
    }
}

impl PartialEq for MagicHeaderSet {
    fn eq(&self, other: &Self) -> bool {
        self.ranges == other.ranges
    }
}

impl fmt::Debug for MagicHeaderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MagicHeaderSet").field("ranges", &self.ranges).finish_non_exhaustive()
    }
}

use crate::RandomSource;

/// Unsigned integers that can be drawn from a bounded range.
pub trait RangeInt: Copy + PartialOrd {
    fn to_u64(self) -> u64;
    /// Only called with values that fit, i.e. within `[min, max]` of `Self`.
    fn from_u64(v: u64) -> Self;
}

macro_rules! impl_range_int {
    ($($t:ty),*) => {$(
        impl RangeInt for $t {
            #[inline(always)]
            fn to_u64(self) -> u64 { self as u64 }
            #[inline(always)]
            fn from_u64(v: u64) -> Self { v as $t }
        }
    )*};
}

impl_range_int!(u8, u16, u32, u64, usize);

pub(crate) fn draw<R: RandomSource + ?Sized, T: RangeInt>(rng: &R, min: T, max: T) -> T {
    if min >= max {
        return min;
    }
    let lo = min.to_u64();
    let span = max.to_u64() - lo;
    // Full 64-bit span: every keystream word is already in range.
    let offset = match span.checked_add(1) {
        Some(width) => rng.next_u64() % width,
        None => rng.next_u64(),
    };
    T::from_u64(lo + offset)
}

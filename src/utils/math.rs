//! Mathematical utility functions.

use crate::Result;

/// Rounds `value` up to the next multiple of `alignment`.
///
/// An alignment of zero leaves the value unchanged. Saturates instead of overflowing.
///
/// # Examples
///
/// ```rust
/// use pescope::utils::align_up;
///
/// assert_eq!(align_up(0x201, 0x200), 0x400);
/// assert_eq!(align_up(0x400, 0x200), 0x400);
/// assert_eq!(align_up(7, 0), 7);
/// ```
#[must_use]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }

    let rem = value % alignment;
    if rem == 0 {
        value
    } else {
        value.saturating_add(alignment - rem)
    }
}

/// Rounds `value` down to a multiple of `alignment`. An alignment of zero leaves it unchanged.
#[must_use]
pub fn align_down(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    value - (value % alignment)
}

/// Converts a `u64` to `u32` for header serialization, returning an error if the value
/// exceeds `u32::MAX`.
///
/// # Errors
///
/// Returns an error if `value` exceeds `u32::MAX`.
pub fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| malformed_error!("PE serialization value {value} exceeds u32::MAX"))
}

/// Converts a `u64` file offset to `usize`, failing with [`crate::Error::OutOfBounds`].
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit the address space.
pub fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| out_of_bounds_error!())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 0x1000), 0);
        assert_eq!(align_up(1, 0x1000), 0x1000);
        assert_eq!(align_up(0x1000, 0x1000), 0x1000);
        assert_eq!(align_up(0x1001, 0x1000), 0x2000);
        assert_eq!(align_up(u64::MAX, 0x10), u64::MAX);
        assert_eq!(align_up(5, 0), 5);
    }

    #[test]
    fn test_align_down() {
        assert_eq!(align_down(0x1FFF, 0x1000), 0x1000);
        assert_eq!(align_down(0x1000, 0x1000), 0x1000);
        assert_eq!(align_down(9, 0), 9);
    }

    #[test]
    fn test_to_u32() {
        assert_eq!(to_u32(0).unwrap(), 0);
        assert_eq!(to_u32(u64::from(u32::MAX)).unwrap(), u32::MAX);
        assert!(to_u32(u64::from(u32::MAX) + 1).is_err());
    }
}

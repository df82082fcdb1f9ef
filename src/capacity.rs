use crate::error::Error;

/// Capacity of a table built without a size hint. Such a table owns no
/// storage until the first insert.
pub const DEFAULT_INITIAL_CAPACITY: usize = 0;

/// Smallest slot count ever allocated by growth from an unallocated table.
pub const DEFAULT_MIN_CAPACITY: usize = 16;

/// Load factor used when none is configured.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Largest power of two representable in a `usize`.
const MAX_POWER_OF_TWO: usize = 1 << (usize::BITS - 1);

/// Rounds a non-negative float up to the next integer, saturating at
/// `usize::MAX`.
///
/// `f64::ceil` lives in `std`, so this stays usable without it.
#[inline]
fn ceil_to_usize(value: f64) -> usize {
    let truncated = value as usize;
    if (truncated as f64) < value {
        truncated.saturating_add(1)
    } else {
        truncated
    }
}

/// Returns `true` if `n` has exactly one bit set.
///
/// Zero is not a power of two. Code that also accepts the unallocated
/// capacity checks `n == 0` separately.
///
/// # Examples
///
/// ```rust
/// use open_hash::capacity::is_power_of_two;
///
/// assert!(is_power_of_two(1));
/// assert!(is_power_of_two(64));
/// assert!(!is_power_of_two(0));
/// assert!(!is_power_of_two(12));
/// ```
#[inline]
pub const fn is_power_of_two(n: usize) -> bool {
    n != 0 && n & (n - 1) == 0
}

/// Returns the smallest power of two greater than or equal to `n`.
///
/// `0` maps to `0`, which is the size of an unallocated table.
///
/// # Errors
///
/// Returns [`Error::CapacityOverflow`] if `n` is larger than the greatest
/// power of two a `usize` can hold.
///
/// # Examples
///
/// ```rust
/// use open_hash::capacity::next_power_of_two;
///
/// assert_eq!(next_power_of_two(3), Ok(4));
/// assert_eq!(next_power_of_two(16), Ok(16));
/// assert!(next_power_of_two(usize::MAX).is_err());
/// ```
#[inline]
pub fn next_power_of_two(n: usize) -> Result<usize, Error> {
    if n > MAX_POWER_OF_TWO {
        return Err(Error::CapacityOverflow { requested: n });
    }
    if n == 0 {
        return Ok(0);
    }

    Ok(n.next_power_of_two())
}

/// Returns the number of live entries a table of `capacity` slots may hold
/// before it must grow.
///
/// The result is always strictly smaller than `capacity`, which keeps at
/// least one slot empty so that every probe sequence terminates. A capacity
/// of zero holds nothing.
#[inline]
pub fn max_fill(capacity: usize, load_factor: f32) -> usize {
    let target = ceil_to_usize(capacity as f64 * load_factor as f64);
    target.min(capacity.saturating_sub(1))
}

/// Returns the power-of-two slot count needed to hold `expected` entries
/// without exceeding `load_factor`.
///
/// # Errors
///
/// Returns [`Error::CapacityOverflow`] if the required slot count is not
/// representable as a power of two.
///
/// # Examples
///
/// ```rust
/// use open_hash::capacity::array_size;
///
/// assert_eq!(array_size(0, 0.75), Ok(0));
/// assert_eq!(array_size(1, 0.5), Ok(2));
/// assert_eq!(array_size(12, 0.75), Ok(16));
/// ```
#[inline]
pub fn array_size(expected: usize, load_factor: f32) -> Result<usize, Error> {
    next_power_of_two(ceil_to_usize(expected as f64 / load_factor as f64))
}

/// Returns the mask that wraps an index into a table of `capacity` slots.
#[inline]
pub const fn array_mask(capacity: usize) -> usize {
    capacity.saturating_sub(1)
}

/// Checks that `load_factor` lies in `(0, 1]`.
///
/// # Errors
///
/// Returns [`Error::InvalidLoadFactor`] for zero, negative, NaN, or values
/// above one.
pub fn validate_load_factor(load_factor: f32) -> Result<f32, Error> {
    if load_factor > 0.0 && load_factor <= 1.0 {
        Ok(load_factor)
    } else {
        Err(Error::InvalidLoadFactor { load_factor })
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn next_power_of_two_handles_zero() {
        assert_eq!(next_power_of_two(0), Ok(0));
    }

    #[test]
    fn next_power_of_two_small_values() {
        assert_eq!(next_power_of_two(1), Ok(1));
        assert_eq!(next_power_of_two(2), Ok(2));
        assert_eq!(next_power_of_two(3), Ok(4));
        assert_eq!(next_power_of_two(17), Ok(32));
    }

    #[test]
    fn next_power_of_two_at_the_ceiling() {
        assert_eq!(
            next_power_of_two(MAX_POWER_OF_TWO - 1),
            Ok(MAX_POWER_OF_TWO)
        );
        assert_eq!(next_power_of_two(MAX_POWER_OF_TWO), Ok(MAX_POWER_OF_TWO));
    }

    #[test]
    fn next_power_of_two_rejects_values_above_the_ceiling() {
        let err = next_power_of_two(usize::MAX).unwrap_err();
        assert_eq!(
            err,
            Error::CapacityOverflow {
                requested: usize::MAX
            }
        );
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert!(next_power_of_two(MAX_POWER_OF_TWO + 1).is_err());
    }

    #[test]
    fn next_power_of_two_is_smallest_bound() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for _ in 0..10_000 {
            let n = rng.random_range(1..=MAX_POWER_OF_TWO);
            let p = next_power_of_two(n).unwrap();
            assert!(is_power_of_two(p), "{p} from {n}");
            assert!(p >= n, "{p} < {n}");
            if n > 1 {
                assert!(p / 2 < n, "{p} is not the smallest bound for {n}");
            }
        }
    }

    #[test]
    fn zero_is_not_a_power_of_two() {
        assert!(!is_power_of_two(0));
    }

    #[test]
    fn power_of_two_detection() {
        for shift in 0..usize::BITS {
            assert!(is_power_of_two(1 << shift));
        }
        for n in [3usize, 5, 6, 7, 12, 100, usize::MAX] {
            assert!(!is_power_of_two(n), "{n}");
        }
    }

    #[test]
    fn mask_handles_zero() {
        assert_eq!(array_mask(0), 0);
    }

    #[test]
    fn mask_handles_power_of_two() {
        assert_eq!(array_mask(16), 15);
        assert_eq!(array_mask(1), 0);
    }

    #[test]
    fn size_handles_zero() {
        assert_eq!(array_size(0, 0.1), Ok(0));
        assert_eq!(array_size(0, 0.5), Ok(0));
        assert_eq!(array_size(0, 0.9999999), Ok(0));
    }

    #[test]
    fn size_handles_one() {
        assert_eq!(array_size(1, 0.1), Ok(16));
        assert_eq!(array_size(1, 0.5), Ok(2));
        assert_eq!(array_size(1, 0.9999999), Ok(2));
    }

    #[test]
    fn size_fits_expected_entries() {
        for expected in 1..2_000usize {
            for load_factor in [0.25f32, 0.5, 0.75, 0.9] {
                let capacity = array_size(expected, load_factor).unwrap();
                assert!(is_power_of_two(capacity));
                assert!(
                    max_fill(capacity, load_factor) >= expected,
                    "{expected} entries do not fit {capacity} slots at {load_factor}"
                );
            }
        }
    }

    #[test]
    fn size_overflow_is_reported() {
        assert!(array_size(usize::MAX, 0.5).is_err());
    }

    #[test]
    fn max_fill_leaves_an_empty_slot() {
        assert_eq!(max_fill(0, 0.75), 0);
        assert_eq!(max_fill(1, 1.0), 0);
        assert_eq!(max_fill(16, 0.75), 12);
        assert_eq!(max_fill(16, 1.0), 15);
        assert_eq!(max_fill(16, 0.01), 1);

        for shift in 1..20 {
            let capacity = 1usize << shift;
            for load_factor in [0.1f32, 0.5, 0.75, 1.0] {
                assert!(max_fill(capacity, load_factor) < capacity);
            }
        }
    }

    #[test]
    fn load_factor_bounds() {
        assert_eq!(validate_load_factor(0.75), Ok(0.75));
        assert_eq!(validate_load_factor(1.0), Ok(1.0));
        for bad in [0.0f32, -0.5, 1.5, f32::NAN, f32::INFINITY] {
            let err = validate_load_factor(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }
}

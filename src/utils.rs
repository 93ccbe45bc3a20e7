/// Rounds `val` up to the next multiple of `align`, which must be a power of two.
/// Returns `None` if the result does not fit in a `u64`.
#[must_use]
pub const fn checked_align_up(val: u64, align: u64) -> Option<u64> {
    match val.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

#[must_use]
pub const fn is_aligned(val: u64, align: u64) -> bool {
    val & (align - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(checked_align_up(0, 0x1000), Some(0));
        assert_eq!(checked_align_up(1, 0x1000), Some(0x1000));
        assert_eq!(checked_align_up(0x1000, 0x1000), Some(0x1000));
        assert_eq!(checked_align_up(0x1001, 0x100), Some(0x1100));
    }

    #[test]
    fn align_up_reports_overflow() {
        assert_eq!(checked_align_up(u64::MAX, 0x100), None);
        assert_eq!(checked_align_up(u64::MAX - 0xff, 0x100), Some(u64::MAX - 0xff));
    }

    #[test]
    fn is_aligned_checks_low_bits() {
        assert!(is_aligned(0x2000, 0x1000));
        assert!(!is_aligned(0x2010, 0x1000));
    }
}

use std::cmp;

fn bits_helper(n: u64, i: u64) -> u64 {
    if n == 0 {
        i
    } else {
        bits_helper(n / 2, i + 1)
    }
}

/// Number of bits needed to represent a number.
pub fn bits_needed_for(n: u64) -> u64 {
    cmp::max(bits_helper(n - 1, 0), 1)
}

/// True if `value` can be stored in an unsigned field that is `width` bits
/// wide.
pub fn fits_in_bits(value: u64, width: u64) -> bool {
    bits_needed_for(value + 1) <= width
}

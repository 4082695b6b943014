use anyhow::{anyhow, Result};

/// Encode a base-3 digit sequence (each digit in `{0, 1, 2}`) into a
/// 1-indexed ID in `[1, 3^len]`.
pub fn encode_csd(digits: &[u32]) -> usize {
    let mut id = 0usize;
    for &d in digits {
        debug_assert!(d < 3);
        id = id * 3 + d as usize;
    }
    id + 1
}

/// Decode a 1-indexed ID back into its `power` base-3 digits. Exact
/// inverse of [`encode_csd`] for sequences of length `power`.
pub fn decode_csd(id: usize, power: usize) -> Vec<u32> {
    debug_assert!(id >= 1);
    let mut rem = id - 1;
    let mut digits = vec![0u32; power];
    for i in (0..power).rev() {
        digits[i] = (rem % 3) as u32;
        rem /= 3;
    }
    digits
}

/// Diagnostic: every nonzero entry of a complete split distribution must
/// decode to digits summing to `expected_sum`. Not part of the hot path.
pub fn check_csd(csd: &[f64], power: usize, expected_sum: u32) -> Result<()> {
    for id in 1..=3usize.pow(power as u32) {
        if csd[id - 1] != 0.0 {
            let digit_sum: u32 = decode_csd(id, power).iter().sum();
            if digit_sum != expected_sum {
                return Err(anyhow!(
                    "CSD digit sum is not {} at index {}",
                    expected_sum,
                    id
                ));
            }
        }
    }
    Ok(())
}

use fastmm_utils::*;

#[test]
fn test_encode_decode_roundtrip() {
    for power in 1..=6usize {
        let count = 3usize.pow(power as u32);
        for id in 1..=count {
            let digits = decode_csd(id, power);
            assert_eq!(digits.len(), power);
            assert!(digits.iter().all(|&d| d < 3));
            assert_eq!(encode_csd(&digits), id);
        }
    }
}

#[test]
fn test_encode_range() {
    for power in 1..=6usize {
        let count = 3usize.pow(power as u32);
        let mut digits = vec![0u32; power];
        loop {
            let id = encode_csd(&digits);
            assert!(id >= 1 && id <= count);
            // advance the digit sequence as a base-3 counter
            let mut pos = power;
            while pos > 0 && digits[pos - 1] == 2 {
                digits[pos - 1] = 0;
                pos -= 1;
            }
            if pos == 0 {
                break;
            }
            digits[pos - 1] += 1;
        }
    }
}

#[test]
fn test_encode_is_one_indexed_base3() {
    assert_eq!(encode_csd(&[0, 0]), 1);
    assert_eq!(encode_csd(&[0, 1]), 2);
    assert_eq!(encode_csd(&[1, 0]), 4);
    assert_eq!(encode_csd(&[2, 2]), 9);
}

#[test]
fn test_check_csd_accepts_consistent_distribution() {
    // power 2, digit sum 2: (0,2), (1,1), (2,0)
    let mut csd = vec![0.0; 9];
    csd[encode_csd(&[0, 2]) - 1] = 0.25;
    csd[encode_csd(&[2, 0]) - 1] = 0.25;
    csd[encode_csd(&[1, 1]) - 1] = 0.5;
    assert!(check_csd(&csd, 2, 2).is_ok());
}

#[test]
fn test_check_csd_rejects_inconsistent_distribution() {
    let mut csd = vec![0.0; 9];
    csd[encode_csd(&[0, 1]) - 1] = 1.0;
    assert!(check_csd(&csd, 2, 2).is_err());
}

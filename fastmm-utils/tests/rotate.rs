use fastmm_utils::*;

#[test]
fn test_rot3_period_three() {
    let x = [1.5, -2.0, 7.25];
    assert_eq!(rot3(rot3(rot3(x, 1), 1), 1), x);
    assert_eq!(rot3(x, 3), x);
    assert_eq!(rot3(x, 0), x);
}

#[test]
fn test_rot3_left_rotation() {
    assert_eq!(rot3([1, 2, 3], 1), [2, 3, 1]);
    assert_eq!(rot3([1, 2, 3], 2), [3, 1, 2]);
}

#[test]
fn test_rot3c_matches_rot3() {
    let x = [vec![1], vec![2, 2], vec![3]];
    assert_eq!(rot3c(x.clone(), 1), [vec![2, 2], vec![3], vec![1]]);
    assert_eq!(rot3c(rot3c(rot3c(x.clone(), 1), 1), 1), x);
}

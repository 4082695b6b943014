use fastmm_utils::*;

#[test]
fn test_prepare_shapes_sums_and_count() {
    for level in 1..=4usize {
        let sum_col = 1usize << level;
        let shapes = prepare_shapes(level);
        // number of weak compositions of sum_col into 3 parts
        assert_eq!(shapes.len(), (sum_col + 1) * (sum_col + 2) / 2);
        for s in &shapes {
            assert_eq!(s.iter().sum::<usize>(), sum_col);
        }
    }
}

#[test]
fn test_prepare_splits_covers_all_half_splits() {
    // shape (2, 1, 1): left halves sum to 2 with i1 <= 2, j1 <= 1, k1 <= 1
    let splits = prepare_splits([2, 1, 1]);
    for sp in &splits {
        assert_eq!(sp.left.iter().sum::<usize>(), 2);
        for d in 0..3 {
            assert_eq!(sp.left[d] + sp.right[d], [2, 1, 1][d]);
        }
    }
    // enumerate expected left halves directly
    let mut expected = Vec::new();
    for i in 0..=2usize {
        for j in 0..=1usize.min(2 - i) {
            let k = 2 - i - j;
            if k <= 1 {
                expected.push([i, j, k]);
            }
        }
    }
    let got: Vec<_> = splits.iter().map(|s| s.left).collect();
    assert_eq!(got, expected);
}

#[test]
fn test_joint_to_margin_projects_marginals() {
    let support = [[0, 1, 1], [1, 0, 1], [1, 1, 0], [2, 0, 0]];
    let proj = joint_to_margin(&support, 2);
    let joint = [0.1, 0.2, 0.3, 0.4];
    let mx = proj[0].apply(&joint);
    assert_eq!(mx, vec![0.1, 0.5, 0.4]);
    let my = proj[1].apply(&joint);
    assert_eq!(my, vec![0.6, 0.4, 0.0]);
    let mz = proj[2].apply(&joint);
    assert_eq!(mz, vec![0.7, 0.3, 0.0]);
}

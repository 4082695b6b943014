use fastmm_utils::*;

#[test]
fn test_sparse_vec_axpy_merges_indices() {
    let mut a = SparseVec::from_dense(&[1.0, 0.0, 2.0, 0.0]);
    let b = SparseVec::from_dense(&[0.0, 3.0, 1.0, 0.0]);
    a.axpy(2.0, &b);
    assert_eq!(a.to_dense(4).to_vec(), vec![1.0, 6.0, 4.0, 0.0]);
}

#[test]
fn test_sparse_vec_from_entries_sums_duplicates() {
    let v = SparseVec::from_entries(vec![(3, 1.0), (1, 2.0), (3, 0.5)]);
    assert_eq!(v.get(1), 2.0);
    assert_eq!(v.get(3), 1.5);
    assert_eq!(v.get(0), 0.0);
}

#[test]
fn test_sparse_mat_combine_cols() {
    let mut m = SparseMat::zeros(3, 2);
    m.set_col(0, SparseVec::from_dense(&[1.0, 0.0, 2.0]));
    m.set_col(1, SparseVec::from_dense(&[0.0, 1.0, 1.0]));
    let c = m.combine_cols(&[2.0, -1.0]);
    assert_eq!(c.to_dense(3).to_vec(), vec![2.0, -1.0, 3.0]);
}

#[test]
fn test_sparse_mat_identity_block() {
    let m = SparseMat::identity_block(5, 2, 3);
    let d = m.to_dense();
    for j in 0..3 {
        for i in 0..5 {
            let expected = if i == 2 + j { 1.0 } else { 0.0 };
            assert_eq!(d[[i, j]], expected);
        }
    }
}

#[test]
fn test_sparse_mat_project_scatters_columns() {
    let mut m = SparseMat::zeros(2, 3);
    m.set_col(0, SparseVec::from_dense(&[1.0, 0.0]));
    m.set_col(1, SparseVec::from_dense(&[0.0, 1.0]));
    m.set_col(2, SparseVec::from_dense(&[2.0, 2.0]));
    let p = m.project(&[0, 1, 0], 2);
    assert_eq!(p.col(0).to_dense(2).to_vec(), vec![3.0, 2.0]);
    assert_eq!(p.col(1).to_dense(2).to_vec(), vec![0.0, 1.0]);
}

#[test]
fn test_row_matrix_matvec_and_prune() {
    let mut m = RowMatrix::new(3);
    let mut rhs = vec![1.0, 2.0, 3.0];
    m.push_row(SparseVec::from_dense(&[1.0, 1.0, 0.0]));
    m.push_row(SparseVec::new());
    m.push_row(SparseVec::from_dense(&[0.0, 1.0, -1.0]));
    let y = m.matvec(&[1.0, 2.0, 3.0]);
    assert_eq!(y.to_vec(), vec![3.0, 0.0, -1.0]);
    m.prune_empty(&mut rhs);
    assert_eq!(m.nrows(), 2);
    assert_eq!(rhs, vec![1.0, 3.0]);
}

#[test]
fn test_row_matrix_zero_sum_row_is_kept() {
    // +1/-1 coefficients sum to zero but the row is not empty
    let mut m = RowMatrix::new(2);
    let mut rhs = vec![0.0];
    m.push_row(SparseVec::from_dense(&[1.0, -1.0]));
    m.prune_empty(&mut rhs);
    assert_eq!(m.nrows(), 1);
}

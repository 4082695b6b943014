/// Cyclic left-rotation of a 3-tuple by `n` places.
pub fn rot3<T: Copy>(x: [T; 3], n: usize) -> [T; 3] {
    let n = n % 3;
    [x[n], x[(n + 1) % 3], x[(n + 2) % 3]]
}

/// Same as [`rot3`] but moves the cells instead of copying them, for
/// element types that are expensive or impossible to copy.
pub fn rot3c<T>(x: [T; 3], n: usize) -> [T; 3] {
    let [a, b, c] = x;
    match n % 3 {
        0 => [a, b, c],
        1 => [b, c, a],
        _ => [c, a, b],
    }
}

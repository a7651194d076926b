//! Pointwise vector algebra on packed `(x, y, z)` component arrays.
//!
//! Particle velocities, DEM normals and forces are stored as structure-of-arrays. These
//! helpers operate element-wise over such triples. `normalize` leaves zero-length vectors
//! untouched instead of producing NaN.

use super::Vec3;

/// Borrowed `(x, y, z)` component arrays of equal length
pub type Components<'a> = (&'a [f64], &'a [f64], &'a [f64]);

/// Owned `(x, y, z)` component arrays of equal length
pub type OwnedComponents = (Vec<f64>, Vec<f64>, Vec<f64>);

#[inline]
fn check_len(a: Components<'_>) -> usize {
    debug_assert!(
        a.0.len() == a.1.len() && a.1.len() == a.2.len(),
        "component arrays must have equal length"
    );
    a.0.len()
}

/// Euclidean norm of each vector
pub fn norm(a: Components<'_>) -> Vec<f64> {
    norm2(a).into_iter().map(f64::sqrt).collect()
}

/// Squared Euclidean norm of each vector
pub fn norm2(a: Components<'_>) -> Vec<f64> {
    let n = check_len(a);
    (0..n)
        .map(|i| a.0[i] * a.0[i] + a.1[i] * a.1[i] + a.2[i] * a.2[i])
        .collect()
}

/// Normalize each vector in place. Vectors with zero norm are left unchanged.
pub fn normalize(x: &mut [f64], y: &mut [f64], z: &mut [f64]) {
    let n = check_len((x, y, z));
    for i in 0..n {
        let len = (x[i] * x[i] + y[i] * y[i] + z[i] * z[i]).sqrt();
        if len > 0.0 {
            x[i] /= len;
            y[i] /= len;
            z[i] /= len;
        }
    }
}

/// Cross product `a x b` of each pair
pub fn cross(a: Components<'_>, b: Components<'_>) -> OwnedComponents {
    let n = check_len(a);
    debug_assert_eq!(n, check_len(b));
    let mut cx = Vec::with_capacity(n);
    let mut cy = Vec::with_capacity(n);
    let mut cz = Vec::with_capacity(n);
    for i in 0..n {
        cx.push(a.1[i] * b.2[i] - a.2[i] * b.1[i]);
        cy.push(a.2[i] * b.0[i] - a.0[i] * b.2[i]);
        cz.push(a.0[i] * b.1[i] - a.1[i] * b.0[i]);
    }
    (cx, cy, cz)
}

/// Dot product `a . b` of each pair
pub fn dot(a: Components<'_>, b: Components<'_>) -> Vec<f64> {
    let n = check_len(a);
    debug_assert_eq!(n, check_len(b));
    (0..n)
        .map(|i| a.0[i] * b.0[i] + a.1[i] * b.1[i] + a.2[i] * b.2[i])
        .collect()
}

/// Single-vector counterpart of [`normalize`]: returns `v` unchanged when `|v| = 0`
#[inline]
pub fn normalize_or_keep(v: Vec3) -> Vec3 {
    let len = v.norm();
    if len > 0.0 {
        v / len
    } else {
        v
    }
}

/// Remove the component of `v` along the unit normal `n`
#[inline]
pub fn project_tangent(v: Vec3, n: Vec3) -> Vec3 {
    v - n * v.dot(&n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_norm_and_norm2() {
        let x = [3.0, 0.0];
        let y = [4.0, 0.0];
        let z = [0.0, 2.0];
        assert_eq!(norm2((&x, &y, &z)), vec![25.0, 4.0]);
        assert_eq!(norm((&x, &y, &z)), vec![5.0, 2.0]);
    }

    #[test]
    fn test_normalize_keeps_zero_vectors() {
        let mut x = vec![3.0, 0.0];
        let mut y = vec![4.0, 0.0];
        let mut z = vec![0.0, 0.0];
        normalize(&mut x, &mut y, &mut z);
        assert_relative_eq!(x[0], 0.6);
        assert_relative_eq!(y[0], 0.8);
        assert_eq!((x[1], y[1], z[1]), (0.0, 0.0, 0.0));
        assert!(x.iter().chain(&y).chain(&z).all(|v| v.is_finite()));
    }

    #[test]
    fn test_cross_and_dot() {
        let ex = ([1.0], [0.0], [0.0]);
        let ey = ([0.0], [1.0], [0.0]);
        let (cx, cy, cz) = cross((&ex.0, &ex.1, &ex.2), (&ey.0, &ey.1, &ey.2));
        assert_eq!((cx[0], cy[0], cz[0]), (0.0, 0.0, 1.0));
        assert_eq!(dot((&ex.0, &ex.1, &ex.2), (&ey.0, &ey.1, &ey.2)), vec![0.0]);
    }

    #[test]
    fn test_project_tangent_removes_normal_part() {
        let n = Vec3::new(0.0, 0.6, 0.8);
        let v = Vec3::new(1.0, 2.0, 3.0);
        let vt = project_tangent(v, n);
        assert_relative_eq!(vt.dot(&n), 0.0, epsilon = 1e-12);
        assert_eq!(normalize_or_keep(Vec3::zeros()), Vec3::zeros());
    }
}

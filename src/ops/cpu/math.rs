//! Elementwise, reduction and linear algebra kernels.

use super::{broadcast_shape, broadcast_to, invalid, norm_axis, standard};
use crate::capability::Op;
use crate::error::Result;
use ndarray::{Array3, ArrayD, ArrayView1, Axis, IxDyn, Zip};
use rayon::prelude::*;

/// Applies `f` elementwise after broadcasting `x` against `y`.
pub fn binary<F>(op: Op, x: &ArrayD<f64>, y: &ArrayD<f64>, f: F) -> Result<ArrayD<f64>>
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    let shape = broadcast_shape(op, x.shape(), y.shape())?;
    let a = broadcast_to(op, x, &shape)?;
    let b = broadcast_to(op, y, &shape)?;
    Ok(Zip::from(&a).and(&b).par_map_collect(|&a, &b| f(a, b)))
}

/// Applies `f` to every element in parallel.
pub fn unary<F>(x: &ArrayD<f64>, f: F) -> ArrayD<f64>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    let mut y = x.clone();
    y.par_mapv_inplace(f);
    y
}

/// Remainder taking the sign of the divisor.
pub fn floormod(x: f64, y: f64) -> f64 {
    let r = x % y;
    if r != 0.0 && (r < 0.0) != (y < 0.0) {
        r + y
    } else {
        r
    }
}

/// Logical truth of a stored value as `0.0`/`1.0`.
pub fn truth(v: bool) -> f64 {
    f64::from(u8::from(v))
}

fn arg_best(op: Op, x: &ArrayD<f64>, axis: isize, better: fn(f64, f64) -> bool) -> Result<ArrayD<f64>> {
    let a = norm_axis(op, axis, x.ndim())?;
    if x.shape()[a] == 0 {
        return Err(invalid(op, "attempt to get the index of an empty sequence"));
    }
    #[allow(clippy::cast_precision_loss)]
    let pick = |lane: ArrayView1<'_, f64>| {
        let mut best = 0;
        for (i, &v) in lane.iter().enumerate().skip(1) {
            if better(v, lane[best]) {
                best = i;
            }
        }
        best as f64
    };
    Ok(x.map_axis(Axis(a), pick))
}

/// Index of the first largest value along `axis`.
pub fn argmax(x: &ArrayD<f64>, axis: isize) -> Result<ArrayD<f64>> {
    arg_best(Op::Argmax, x, axis, |v, best| v > best)
}

/// Index of the first smallest value along `axis`.
pub fn argmin(x: &ArrayD<f64>, axis: isize) -> Result<ArrayD<f64>> {
    arg_best(Op::Argmin, x, axis, |v, best| v < best)
}

/// Cross product of 3-vectors along the last axis.
pub fn cross(x: &ArrayD<f64>, y: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    if x.shape() != y.shape() || x.shape().last() != Some(&3) {
        return Err(invalid(
            Op::Cross,
            format!(
                "operands must share a shape ending in 3, got {:?} and {:?}",
                x.shape(),
                y.shape()
            ),
        ));
    }
    let last = Axis(x.ndim() - 1);
    let mut out = ArrayD::zeros(x.raw_dim());
    Zip::from(out.lanes_mut(last))
        .and(x.lanes(last))
        .and(y.lanes(last))
        .for_each(|mut o, u, v| {
            o[0] = u[1] * v[2] - u[2] * v[1];
            o[1] = u[2] * v[0] - u[0] * v[2];
            o[2] = u[0] * v[1] - u[1] * v[0];
        });
    Ok(out)
}

/// Matrix product; 1-D operands are promoted and the promoted axis dropped.
///
/// Leading (batch) axes broadcast; each batch entry runs on the rayon pool.
pub fn matmul(x: &ArrayD<f64>, y: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    if x.ndim() == 0 || y.ndim() == 0 {
        return Err(invalid(Op::Matmul, "operands need at least one dimension"));
    }
    let mut xs = x.shape().to_vec();
    if xs.len() == 1 {
        xs.insert(0, 1);
    }
    let mut ys = y.shape().to_vec();
    if ys.len() == 1 {
        ys.push(1);
    }
    let (m, k) = (xs[xs.len() - 2], xs[xs.len() - 1]);
    let (k2, n) = (ys[ys.len() - 2], ys[ys.len() - 1]);
    if k != k2 {
        return Err(invalid(
            Op::Matmul,
            format!("core dimension mismatch, {k} (left) vs {k2} (right)"),
        ));
    }

    let batch = broadcast_shape(Op::Matmul, &xs[..xs.len() - 2], &ys[..ys.len() - 2])?;
    let count: usize = batch.iter().product();
    let lhs = batched(x, &xs, &batch, count, m, k)?;
    let rhs = batched(y, &ys, &batch, count, k, n)?;

    let products: Vec<_> = (0..count)
        .into_par_iter()
        .map(|i| lhs.index_axis(Axis(0), i).dot(&rhs.index_axis(Axis(0), i)))
        .collect();

    let mut shape = batch;
    if x.ndim() > 1 {
        shape.push(m);
    }
    if y.ndim() > 1 {
        shape.push(n);
    }
    let data: Vec<f64> = products.iter().flat_map(|p| p.iter().copied()).collect();
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| invalid(Op::Matmul, e))
}

/// Broadcasts `a` (viewed as `shape`) over `batch` and packs it into `(count, rows, cols)`.
fn batched(
    a: &ArrayD<f64>,
    shape: &[usize],
    batch: &[usize],
    count: usize,
    rows: usize,
    cols: usize,
) -> Result<Array3<f64>> {
    let a = a
        .to_shape(IxDyn(shape))
        .map_err(|e| invalid(Op::Matmul, e))?;
    let mut full = batch.to_vec();
    full.extend([rows, cols]);
    let view = a
        .broadcast(IxDyn(&full))
        .ok_or_else(|| invalid(Op::Matmul, "batch dimensions do not broadcast"))?;
    Array3::from_shape_vec((count, rows, cols), view.iter().copied().collect())
        .map_err(|e| invalid(Op::Matmul, e))
}

/// Running sum along `axis`, or over the flattened array.
pub fn cumsum(x: &ArrayD<f64>, axis: Option<isize>) -> Result<ArrayD<f64>> {
    let (mut y, a) = match axis {
        None => (
            ArrayD::from_shape_vec(IxDyn(&[x.len()]), x.iter().copied().collect())
                .map_err(|e| invalid(Op::Cumsum, e))?,
            0,
        ),
        Some(axis) => (standard(x.clone()), norm_axis(Op::Cumsum, axis, x.ndim())?),
    };
    y.accumulate_axis_inplace(Axis(a), |&prev, cur| *cur += prev);
    Ok(y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(shape: &[usize], data: &[f64]) -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(shape), data.to_vec()).unwrap()
    }

    #[test]
    fn floormod_follows_divisor_sign() {
        assert_eq!(floormod(-7.0, 3.0), 2.0);
        assert_eq!(floormod(7.0, -3.0), -2.0);
        assert_eq!(floormod(6.0, 3.0), 0.0);
    }

    #[test]
    fn binary_broadcasts_rows() {
        let x = arr(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
        let y = arr(&[2], &[10.0, 20.0]);
        let s = binary(Op::Add, &x, &y, |a, b| a + b).unwrap();
        assert_eq!(s.as_slice().unwrap(), &[11.0, 22.0, 13.0, 24.0]);
        assert!(binary(Op::Add, &x, &arr(&[3], &[0.0; 3]), |a, b| a + b).is_err());
    }

    #[test]
    fn argmax_takes_first_maximum() {
        let x = arr(&[2, 3], &[1.0, 5.0, 5.0, 7.0, 0.0, 7.0]);
        assert_eq!(argmax(&x, 1).unwrap().as_slice().unwrap(), &[1.0, 0.0]);
        assert_eq!(argmin(&x, 0).unwrap().as_slice().unwrap(), &[0.0, 1.0, 0.0]);
        assert!(argmax(&x, 2).is_err());
    }

    #[test]
    fn matmul_shapes() {
        let a = arr(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
        let b = arr(&[2, 2], &[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(matmul(&a, &b).unwrap().as_slice().unwrap(), &[19.0, 22.0, 43.0, 50.0]);

        let v = arr(&[2], &[1.0, 1.0]);
        let mv = matmul(&a, &v).unwrap();
        assert_eq!(mv.shape(), &[2]);
        assert_eq!(mv.as_slice().unwrap(), &[3.0, 7.0]);
        assert_eq!(matmul(&v, &v).unwrap().shape(), &[] as &[usize]);

        let batch = arr(&[3, 2, 2], &[1.0, 2.0, 3.0, 4.0].repeat(3));
        assert_eq!(matmul(&batch, &b).unwrap().shape(), &[3, 2, 2]);
        assert!(matmul(&a, &arr(&[3], &[0.0; 3])).is_err());
    }

    #[test]
    fn cross_of_unit_vectors() {
        let x = arr(&[3], &[1.0, 0.0, 0.0]);
        let y = arr(&[3], &[0.0, 1.0, 0.0]);
        assert_eq!(cross(&x, &y).unwrap().as_slice().unwrap(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn cumsum_with_and_without_axis() {
        let x = arr(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(cumsum(&x, None).unwrap().as_slice().unwrap(), &[1.0, 3.0, 6.0, 10.0]);
        assert_eq!(cumsum(&x, Some(0)).unwrap().as_slice().unwrap(), &[1.0, 2.0, 4.0, 6.0]);
    }
}

//! Array construction kernels.

use super::invalid;
use crate::capability::Op;
use crate::error::Result;
use crate::tensors::Nested;
use ndarray::{Array1, Array2, ArrayD, IxDyn};

/// Dense data from nested lists.
pub fn from_nested(data: &Nested) -> Result<ArrayD<f64>> {
    let shape = data.shape().map_err(|m| invalid(Op::Array, m))?;
    ArrayD::from_shape_vec(IxDyn(&shape), data.flatten()).map_err(|e| invalid(Op::Array, e))
}

/// Values `start, start + step, ...` strictly before `stop`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn arange(stop: f64, start: f64, step: f64) -> Result<ArrayD<f64>> {
    if step == 0.0 {
        return Err(invalid(Op::Arange, "step must be non-zero"));
    }
    let count = ((stop - start) / step).ceil();
    if !count.is_finite() {
        return Err(invalid(Op::Arange, "bounds must be finite"));
    }
    let n = count.max(0.0) as usize;
    Ok(Array1::from_iter((0..n).map(|i| start + i as f64 * step)).into_dyn())
}

/// `num` points from `start` to `stop`, both included.
#[allow(clippy::cast_precision_loss)]
pub fn linspace(start: f64, stop: f64, num: usize, axis: Option<isize>) -> Result<ArrayD<f64>> {
    if !matches!(axis, None | Some(0 | -1)) {
        return Err(invalid(
            Op::Linspace,
            "scalar bounds produce a 1-D result, axis must be 0 or -1",
        ));
    }
    let out = match num {
        0 => Array1::zeros(0),
        1 => Array1::from_elem(1, start),
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            Array1::from_shape_fn(num, |i| {
                if i == num - 1 { stop } else { start + i as f64 * step }
            })
        }
    };
    Ok(out.into_dyn())
}

/// `n × n` identity, repeated over `batch_shape`.
pub fn identity(n: usize, batch_shape: Option<&[usize]>) -> Result<ArrayD<f64>> {
    let eye = Array2::<f64>::eye(n).into_dyn();
    let Some(batch) = batch_shape else {
        return Ok(eye);
    };
    let mut full = batch.to_vec();
    full.extend([n, n]);
    eye.broadcast(IxDyn(&full))
        .map(|v| v.to_owned())
        .ok_or_else(|| invalid(Op::Identity, format!("cannot tile identity over {batch:?}")))
}

/// One-hot rows for every index, along a new trailing axis.
pub fn one_hot(indices: &ArrayD<f64>, depth: usize) -> Result<ArrayD<f64>> {
    let mut shape = indices.shape().to_vec();
    shape.push(depth);
    let mut data = vec![0.0; indices.len() * depth];
    for (row, &v) in indices.iter().enumerate() {
        let hot = super::to_index(Op::OneHot, v, depth, false)?;
        data[row * depth + hot] = 1.0;
    }
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| invalid(Op::OneHot, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arange_counts_like_ceil() {
        assert_eq!(arange(5.0, 0.0, 2.0).unwrap().as_slice().unwrap(), &[0.0, 2.0, 4.0]);
        assert_eq!(arange(0.0, 3.0, -1.0).unwrap().len(), 3);
        assert!(arange(1.0, 2.0, 1.0).unwrap().is_empty());
        assert!(arange(1.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn linspace_hits_both_ends() {
        let l = linspace(0.0, 1.0, 5, None).unwrap();
        assert_eq!(l.as_slice().unwrap(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(2.0, 9.0, 1, Some(-1)).unwrap().as_slice().unwrap(), &[2.0]);
        assert!(linspace(0.0, 1.0, 3, Some(1)).is_err());
    }

    #[test]
    fn batched_identity() {
        let i = identity(2, Some(&[3])).unwrap();
        assert_eq!(i.shape(), &[3, 2, 2]);
        assert_eq!(i[[2, 1, 1]], 1.0);
        assert_eq!(i[[2, 0, 1]], 0.0);
    }

    #[test]
    fn one_hot_rejects_out_of_range() {
        let idx = ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.0, 2.0]).unwrap();
        let oh = one_hot(&idx, 3).unwrap();
        assert_eq!(oh.as_slice().unwrap(), &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(one_hot(&idx, 2).is_err());
    }
}

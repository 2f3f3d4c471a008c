//! Shape manipulation kernels.
//!
//! All kernels return arrays in standard (row-major) layout.

use super::{broadcast_shape, broadcast_to, invalid, norm_axis, standard};
use crate::capability::Op;
use crate::error::Result;
use ndarray::{ArrayD, ArrayViewD, Axis, Dimension, IxDyn, Slice, Zip};

/// Copies the logical element order of `x` into a new shape.
fn relayout(op: Op, x: &ArrayD<f64>, dims: &[usize]) -> Result<ArrayD<f64>> {
    ArrayD::from_shape_vec(IxDyn(dims), x.iter().copied().collect()).map_err(|e| invalid(op, e))
}

/// Reshape with at most one `-1` entry.
pub fn reshape(x: &ArrayD<f64>, shape: &[isize]) -> Result<ArrayD<f64>> {
    let total = x.len();
    let mut dims = Vec::with_capacity(shape.len());
    let mut unknown = None;
    let mut known = 1_usize;
    for (i, &d) in shape.iter().enumerate() {
        match usize::try_from(d) {
            Ok(d) => {
                known *= d;
                dims.push(d);
            }
            Err(_) if d == -1 && unknown.is_none() => {
                unknown = Some(i);
                dims.push(0);
            }
            Err(_) => {
                return Err(invalid(
                    Op::Reshape,
                    format!("invalid target shape {shape:?}, only one -1 is allowed"),
                ));
            }
        }
    }
    if let Some(i) = unknown {
        if known != 0 && total % known == 0 {
            dims[i] = total / known;
        }
    }
    if dims.iter().product::<usize>() != total {
        return Err(invalid(
            Op::Reshape,
            format!("cannot reshape array of size {total} into shape {shape:?}"),
        ));
    }
    relayout(Op::Reshape, x, &dims)
}

/// Removes size-1 axes.
pub fn squeeze(x: &ArrayD<f64>, axis: Option<isize>) -> Result<ArrayD<f64>> {
    let dims: Vec<usize> = match axis {
        None => x.shape().iter().copied().filter(|&d| d != 1).collect(),
        Some(axis) => {
            let a = norm_axis(Op::Squeeze, axis, x.ndim())?;
            if x.shape()[a] != 1 {
                return Err(invalid(
                    Op::Squeeze,
                    "cannot select an axis to squeeze out which has size not equal to one",
                ));
            }
            let mut dims = x.shape().to_vec();
            dims.remove(a);
            dims
        }
    };
    relayout(Op::Squeeze, x, &dims)
}

/// Inserts a size-1 axis at `axis` of the result.
pub fn expand_dims(x: &ArrayD<f64>, axis: isize) -> Result<ArrayD<f64>> {
    let a = norm_axis(Op::ExpandDims, axis, x.ndim() + 1)?;
    Ok(standard(x.clone().insert_axis(Axis(a))))
}

/// Permutes axes, reversing them when `axes` is `None`.
pub fn transpose(x: &ArrayD<f64>, axes: Option<&[usize]>) -> Result<ArrayD<f64>> {
    let Some(axes) = axes else {
        return Ok(standard(x.clone().reversed_axes()));
    };
    let mut seen = vec![false; x.ndim()];
    let is_permutation = axes.len() == x.ndim()
        && axes
            .iter()
            .all(|&a| a < seen.len() && !std::mem::replace(&mut seen[a], true));
    if !is_permutation {
        return Err(invalid(
            Op::Transpose,
            format!("axes {axes:?} are not a permutation of {} dimensions", x.ndim()),
        ));
    }
    Ok(standard(x.clone().permuted_axes(IxDyn(axes))))
}

/// Exchanges two axes.
pub fn swapaxes(x: &ArrayD<f64>, axis0: isize, axis1: isize) -> Result<ArrayD<f64>> {
    let a = norm_axis(Op::Swapaxes, axis0, x.ndim())?;
    let b = norm_axis(Op::Swapaxes, axis1, x.ndim())?;
    let mut y = x.clone();
    y.swap_axes(a, b);
    Ok(standard(y))
}

/// Joins along an existing axis, or along axis 0 after flattening.
pub fn concatenate(xs: &[&ArrayD<f64>], axis: Option<isize>) -> Result<ArrayD<f64>> {
    let first = xs
        .first()
        .ok_or_else(|| invalid(Op::Concatenate, "need at least one array to concatenate"))?;
    match axis {
        None => {
            let flat: Vec<f64> = xs.iter().flat_map(|x| x.iter().copied()).collect();
            ArrayD::from_shape_vec(IxDyn(&[flat.len()]), flat).map_err(|e| invalid(Op::Concatenate, e))
        }
        Some(axis) => {
            let a = norm_axis(Op::Concatenate, axis, first.ndim())?;
            let views: Vec<ArrayViewD<'_, f64>> = xs.iter().map(|x| x.view()).collect();
            ndarray::concatenate(Axis(a), &views).map_err(|e| invalid(Op::Concatenate, e))
        }
    }
}

/// Joins along a new axis.
pub fn stack(xs: &[&ArrayD<f64>], axis: isize) -> Result<ArrayD<f64>> {
    let first = xs
        .first()
        .ok_or_else(|| invalid(Op::Stack, "need at least one array to stack"))?;
    let a = norm_axis(Op::Stack, axis, first.ndim() + 1)?;
    let views: Vec<ArrayViewD<'_, f64>> = xs.iter().map(|x| x.view()).collect();
    ndarray::stack(Axis(a), &views).map_err(|e| invalid(Op::Stack, e))
}

/// Slices along `axis`, dropping it.
pub fn unstack(x: &ArrayD<f64>, axis: isize) -> Result<Vec<ArrayD<f64>>> {
    let a = norm_axis(Op::Unstack, axis, x.ndim())?;
    Ok(x.axis_iter(Axis(a)).map(|v| v.to_owned()).collect())
}

/// Equal sections along `axis`; one per element when `num_sections` is `None`.
pub fn split(x: &ArrayD<f64>, num_sections: Option<usize>, axis: isize) -> Result<Vec<ArrayD<f64>>> {
    let a = norm_axis(Op::Split, axis, x.ndim())?;
    let len = x.shape()[a];
    let n = num_sections.unwrap_or(len);
    if n == 0 || len % n != 0 {
        return Err(invalid(
            Op::Split,
            format!("axis of length {len} does not split into {n} equal sections"),
        ));
    }
    Ok(x.axis_chunks_iter(Axis(a), len / n)
        .map(|v| v.to_owned())
        .collect())
}

/// Repeats `x` along each axis; shorter operands gain leading axes.
pub fn tile(x: &ArrayD<f64>, reps: &[usize]) -> Result<ArrayD<f64>> {
    let nd = x.ndim().max(reps.len());
    let mut src_shape = vec![1; nd - x.ndim()];
    src_shape.extend_from_slice(x.shape());
    let mut full_reps = vec![1; nd - reps.len()];
    full_reps.extend_from_slice(reps);

    let src = relayout(Op::Tile, x, &src_shape)?;
    let out_shape: Vec<usize> = src_shape.iter().zip(&full_reps).map(|(s, r)| s * r).collect();
    Ok(ArrayD::from_shape_fn(IxDyn(&out_shape), |idx| {
        let at: Vec<usize> = idx.slice().iter().zip(&src_shape).map(|(i, s)| i % s).collect();
        src[IxDyn(&at)]
    }))
}

/// Reverses every axis, or the single axis given.
pub fn flip(x: &ArrayD<f64>, axis: Option<&[isize]>) -> Result<ArrayD<f64>> {
    let mut y = x.clone();
    match axis {
        None => (0..y.ndim()).for_each(|a| y.invert_axis(Axis(a))),
        Some(&[axis]) => y.invert_axis(Axis(norm_axis(Op::Flip, axis, x.ndim())?)),
        Some(axes) => {
            return Err(invalid(
                Op::Flip,
                format!("a single axis is accepted, got {}", axes.len()),
            ));
        }
    }
    Ok(standard(y))
}

/// Surrounds `x` with `value`; one `(before, after)` pair per axis.
pub fn constant_pad(x: &ArrayD<f64>, pad_width: &[(usize, usize)], value: f64) -> Result<ArrayD<f64>> {
    if pad_width.len() != x.ndim() {
        return Err(invalid(
            Op::ConstantPad,
            format!("expected {} pad widths, got {}", x.ndim(), pad_width.len()),
        ));
    }
    let out_shape: Vec<usize> = x
        .shape()
        .iter()
        .zip(pad_width)
        .map(|(d, (before, after))| before + d + after)
        .collect();
    let mut out = ArrayD::from_elem(IxDyn(&out_shape), value);
    out.slice_each_axis_mut(|ax| {
        let i = ax.axis.index();
        let before = pad_width[i].0;
        Slice::from(before..before + x.shape()[i])
    })
    .assign(x);
    Ok(out)
}

/// Picks `x1` where `condition` is non-zero, `x2` elsewhere, broadcasting all three.
pub fn select(condition: &ArrayD<f64>, x1: &ArrayD<f64>, x2: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let shape = broadcast_shape(Op::Where, condition.shape(), x1.shape())?;
    let shape = broadcast_shape(Op::Where, &shape, x2.shape())?;
    let c = broadcast_to(Op::Where, condition, &shape)?;
    let a = broadcast_to(Op::Where, x1, &shape)?;
    let b = broadcast_to(Op::Where, x2, &shape)?;
    Ok(Zip::from(&c)
        .and(&a)
        .and(&b)
        .par_map_collect(|&c, &a, &b| if c == 0.0 { b } else { a }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(shape: &[usize], data: &[f64]) -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(shape), data.to_vec()).unwrap()
    }

    #[test]
    fn reshape_infers_one_dimension() {
        let x = arr(&[2, 3], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(reshape(&x, &[3, -1]).unwrap().shape(), &[3, 2]);
        assert!(reshape(&x, &[-1, -1]).is_err());
        assert!(reshape(&x, &[4, -1]).is_err());
    }

    #[test]
    fn transpose_defaults_to_reversal() {
        let x = arr(&[2, 3], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let t = transpose(&x, None).unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.as_slice().unwrap(), &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
        assert!(transpose(&x, Some(&[0, 0])).is_err());
    }

    #[test]
    fn concatenate_without_axis_flattens() {
        let a = arr(&[3], &[0.0, 1.0, 2.0]);
        let b = arr(&[1, 3], &[1.0, 2.0, 3.0]);
        let c = concatenate(&[&a, &b], None).unwrap();
        assert_eq!(c.as_slice().unwrap(), &[0.0, 1.0, 2.0, 1.0, 2.0, 3.0]);
        assert!(concatenate(&[&a, &b], Some(0)).is_err());
    }

    #[test]
    fn split_defaults_to_axis_length() {
        let x = arr(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(split(&x, None, 1).unwrap().len(), 2);
        assert!(split(&arr(&[3], &[1.0, 2.0, 3.0]), Some(2), 0).is_err());
    }

    #[test]
    fn tile_and_pad() {
        let x = arr(&[2], &[1.0, 2.0]);
        let t = tile(&x, &[2, 2]).unwrap();
        assert_eq!(t.shape(), &[2, 4]);
        assert_eq!(t.as_slice().unwrap(), &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        let p = constant_pad(&x, &[(1, 2)], 9.0).unwrap();
        assert_eq!(p.as_slice().unwrap(), &[9.0, 1.0, 2.0, 9.0, 9.0]);
    }

    #[test]
    fn flip_takes_one_axis() {
        let x = arr(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(flip(&x, Some(&[-1])).unwrap().as_slice().unwrap(), &[2.0, 1.0, 4.0, 3.0]);
        assert_eq!(flip(&x, None).unwrap().as_slice().unwrap(), &[4.0, 3.0, 2.0, 1.0]);
        assert!(flip(&x, Some(&[0, 1])).is_err());
    }

    #[test]
    fn select_broadcasts() {
        let c = arr(&[3], &[1.0, 0.0, 1.0]);
        let a = arr(&[1], &[7.0]);
        let b = arr(&[2, 3], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let w = select(&c, &a, &b).unwrap();
        assert_eq!(w.as_slice().unwrap(), &[7.0, 1.0, 7.0, 7.0, 4.0, 7.0]);
    }
}

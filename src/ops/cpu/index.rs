//! Gather and scatter kernels.

use super::{invalid, to_index};
use crate::adapter::Reduction;
use crate::capability::Op;
use crate::error::Result;
use ndarray::{ArrayD, Axis, Dimension, IxDyn};

/// Last-axis length of an index array, the number of coordinates per row.
fn index_depth(op: Op, indices: &ArrayD<f64>, max: usize) -> Result<usize> {
    let depth = *indices
        .shape()
        .last()
        .ok_or_else(|| invalid(op, "indices need at least one dimension"))?;
    if depth > max {
        return Err(invalid(
            op,
            format!("index rows of length {depth} address a {max}-dimensional target"),
        ));
    }
    Ok(depth)
}

/// Row-major strides of `shape`, in elements.
fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        out[i] = out[i + 1] * shape[i + 1];
    }
    out
}

/// Rows of `params` along axis 0, shaped `indices.shape + params.shape[1..]`.
pub fn gather_flat(params: &ArrayD<f64>, indices: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let rows = *params
        .shape()
        .first()
        .ok_or_else(|| invalid(Op::GatherFlat, "params need at least one dimension"))?;
    let picked = indices
        .iter()
        .map(|&v| to_index(Op::GatherFlat, v, rows, true))
        .collect::<Result<Vec<_>>>()?;
    let mut shape = indices.shape().to_vec();
    shape.extend_from_slice(&params.shape()[1..]);
    let data: Vec<f64> = picked
        .into_iter()
        .flat_map(|i| params.index_axis(Axis(0), i).into_iter().copied())
        .collect();
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| invalid(Op::GatherFlat, e))
}

/// Slices of `params` addressed by the rows of `indices`' last axis.
pub fn gather_nd(params: &ArrayD<f64>, indices: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let depth = index_depth(Op::GatherNd, indices, params.ndim())?;
    let batch = &indices.shape()[..indices.ndim() - 1];
    let mut shape = batch.to_vec();
    shape.extend_from_slice(&params.shape()[depth..]);

    let coords: Vec<f64> = indices.iter().copied().collect();
    let rows: usize = batch.iter().product();
    let mut data = Vec::with_capacity(rows * params.shape()[depth..].iter().product::<usize>());
    for r in 0..rows {
        let mut view = params.view();
        for &c in &coords[r * depth..(r + 1) * depth] {
            let i = to_index(Op::GatherNd, c, view.shape()[0], true)?;
            view = view.index_axis_move(Axis(0), i);
        }
        data.extend(view.iter().copied());
    }
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| invalid(Op::GatherNd, e))
}

/// Scatters into a flat target of length `size`.
pub fn scatter_flat(
    indices: &ArrayD<f64>,
    updates: &ArrayD<f64>,
    size: usize,
    reduction: Reduction,
) -> Result<ArrayD<f64>> {
    if indices.len() != updates.len() {
        return Err(invalid(
            Op::ScatterFlat,
            format!("{} indices for {} updates", indices.len(), updates.len()),
        ));
    }
    let mut target = vec![0.0; size];
    let mut touched = vec![false; size];
    for (&i, &u) in indices.iter().zip(updates.iter()) {
        let i = to_index(Op::ScatterFlat, i, size, false)?;
        land(&mut target[i], &mut touched[i], reduction, u);
    }
    ArrayD::from_shape_vec(IxDyn(&[size]), target).map_err(|e| invalid(Op::ScatterFlat, e))
}

/// Scatters slices into a target of `shape`, addressed like [`gather_nd`].
pub fn scatter_nd(
    indices: &ArrayD<f64>,
    updates: &ArrayD<f64>,
    shape: &[usize],
    reduction: Reduction,
) -> Result<ArrayD<f64>> {
    let depth = index_depth(Op::ScatterNd, indices, shape.len())?;
    let rows: usize = indices.shape()[..indices.ndim() - 1].iter().product();
    let inner: usize = shape[depth..].iter().product();
    if updates.len() != rows * inner {
        return Err(invalid(
            Op::ScatterNd,
            format!(
                "expected {} update values for {rows} index rows, got {}",
                rows * inner,
                updates.len()
            ),
        ));
    }

    let total: usize = shape.iter().product();
    let strides = strides(shape);
    let coords: Vec<f64> = indices.iter().copied().collect();
    let values: Vec<f64> = updates.iter().copied().collect();
    let mut target = vec![0.0; total];
    let mut touched = vec![false; total];
    for r in 0..rows {
        let mut offset = 0;
        for (j, &c) in coords[r * depth..(r + 1) * depth].iter().enumerate() {
            offset += to_index(Op::ScatterNd, c, shape[j], false)? * strides[j];
        }
        for (e, &u) in values[r * inner..(r + 1) * inner].iter().enumerate() {
            land(&mut target[offset + e], &mut touched[offset + e], reduction, u);
        }
    }
    ArrayD::from_shape_vec(IxDyn(shape), target).map_err(|e| invalid(Op::ScatterNd, e))
}

/// The first update to a cell is stored as is; later ones are combined.
fn land(cell: &mut f64, touched: &mut bool, reduction: Reduction, update: f64) {
    *cell = if *touched {
        reduction.combine(*cell, update)
    } else {
        update
    };
    *touched = true;
}

/// Coordinates of non-zero elements, shaped `[count, ndim]`.
#[allow(clippy::cast_precision_loss)]
pub fn indices_where(x: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let mut data = Vec::new();
    let mut count = 0;
    for (idx, &v) in x.indexed_iter() {
        if v != 0.0 {
            count += 1;
            data.extend(idx.slice().iter().map(|&i| i as f64));
        }
    }
    ArrayD::from_shape_vec(IxDyn(&[count, x.ndim()]), data).map_err(|e| invalid(Op::IndicesWhere, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(shape: &[usize], data: &[f64]) -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(shape), data.to_vec()).unwrap()
    }

    #[test]
    fn scatter_flat_sums_collisions() {
        let idx = arr(&[4], &[0.0, 4.0, 1.0, 2.0]);
        let upd = arr(&[4], &[1.0, 2.0, 3.0, 4.0]);
        let out = scatter_flat(&idx, &upd, 8, Reduction::Sum).unwrap();
        assert_eq!(out.as_slice().unwrap(), &[1.0, 3.0, 4.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn scatter_keeps_updates_beyond_any_starting_value() {
        let idx = arr(&[2], &[0.0, 1.0]);
        let upd = arr(&[2], &[2e12, -3e12]);
        let min = scatter_flat(&idx, &upd, 3, Reduction::Min).unwrap();
        assert_eq!(min.as_slice().unwrap(), &[2e12, -3e12, 0.0]);
        let max = scatter_flat(&idx, &upd, 3, Reduction::Max).unwrap();
        assert_eq!(max.as_slice().unwrap(), &[2e12, -3e12, 0.0]);

        let idx = arr(&[2, 1], &[1.0, 1.0]);
        let upd = arr(&[2, 2], &[-5e12, 7e12, -4e12, 6e12]);
        let max = scatter_nd(&idx, &upd, &[2, 2], Reduction::Max).unwrap();
        assert_eq!(max.as_slice().unwrap(), &[0.0, 0.0, -4e12, 7e12]);
    }

    #[test]
    fn scatter_min_max_zero_untouched_cells() {
        let idx = arr(&[3], &[1.0, 1.0, 3.0]);
        let upd = arr(&[3], &[5.0, 2.0, 7.0]);
        let min = scatter_flat(&idx, &upd, 4, Reduction::Min).unwrap();
        assert_eq!(min.as_slice().unwrap(), &[0.0, 2.0, 0.0, 7.0]);
        let max = scatter_flat(&idx, &upd, 4, Reduction::Max).unwrap();
        assert_eq!(max.as_slice().unwrap(), &[0.0, 5.0, 0.0, 7.0]);
    }

    #[test]
    fn scatter_nd_writes_slices() {
        let idx = arr(&[2, 1], &[0.0, 2.0]);
        let upd = arr(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
        let out = scatter_nd(&idx, &upd, &[3, 2], Reduction::Sum).unwrap();
        assert_eq!(out.as_slice().unwrap(), &[1.0, 2.0, 0.0, 0.0, 3.0, 4.0]);
        assert!(scatter_nd(&arr(&[1, 1], &[3.0]), &arr(&[2], &[1.0, 1.0]), &[3, 2], Reduction::Sum).is_err());
    }

    #[test]
    fn gather_flat_and_nd() {
        let p = arr(&[3, 2], &[0.0, 1.0, 10.0, 11.0, 20.0, 21.0]);
        let g = gather_flat(&p, &arr(&[2], &[2.0, 0.0])).unwrap();
        assert_eq!(g.shape(), &[2, 2]);
        assert_eq!(g.as_slice().unwrap(), &[20.0, 21.0, 0.0, 1.0]);
        let nd = gather_nd(&p, &arr(&[2, 2], &[1.0, 1.0, 2.0, 0.0])).unwrap();
        assert_eq!(nd.as_slice().unwrap(), &[11.0, 20.0]);
        assert!(gather_flat(&p, &arr(&[1], &[3.0])).is_err());
    }

    #[test]
    fn nonzero_coordinates() {
        let x = arr(&[2, 2], &[0.0, 1.0, 1.0, 0.0]);
        let w = indices_where(&x).unwrap();
        assert_eq!(w.shape(), &[2, 2]);
        assert_eq!(w.as_slice().unwrap(), &[0.0, 1.0, 1.0, 0.0]);
    }
}

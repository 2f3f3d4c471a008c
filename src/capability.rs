//! Canonical operation names and per-backend capability sets.
//!
//! Every operation the facade can route has one [`Op`] variant. A backend
//! advertises what it implements as a [`Capabilities`] bit set; the facade
//! checks the set before calling into the adapter.

use core::fmt;

macro_rules! ops {
    ($( $(#[$meta:meta])* $variant:ident => $name:literal, )+) => {
        /// A canonical operation of the unified API.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Op {
            $( $(#[$meta])* $variant, )+
        }

        impl Op {
            /// Every operation, in declaration order.
            pub const ALL: &'static [Op] = &[ $( Op::$variant, )+ ];

            /// Canonical snake_case name.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $( Op::$variant => $name, )+
                }
            }
        }
    };
}

ops! {
    // creation
    /// `array(data, dtype?, device?)`
    Array => "array",
    /// `arange(stop, start?, step?, dtype?, device?)`
    Arange => "arange",
    /// `linspace(start, stop, num, axis?, device?)`
    Linspace => "linspace",
    /// `zeros(shape, dtype?, device?)`
    Zeros => "zeros",
    /// `ones(shape, dtype?, device?)`
    Ones => "ones",
    /// `zeros_like(x, dtype?, device?)`
    ZerosLike => "zeros_like",
    /// `ones_like(x, dtype?, device?)`
    OnesLike => "ones_like",
    /// `identity(n, dtype?, batch_shape?, device?)`
    Identity => "identity",
    /// `one_hot(indices, depth, device?)`
    OneHot => "one_hot",

    // shape
    /// `reshape(x, shape)`
    Reshape => "reshape",
    /// `squeeze(x, axis?)`
    Squeeze => "squeeze",
    /// `expand_dims(x, axis)`
    ExpandDims => "expand_dims",
    /// `transpose(x, axes?)`
    Transpose => "transpose",
    /// `swapaxes(x, axis0, axis1)`
    Swapaxes => "swapaxes",
    /// `concatenate(xs, axis?)`
    Concatenate => "concatenate",
    /// `stack(xs, axis)`
    Stack => "stack",
    /// `unstack(x, axis)`
    Unstack => "unstack",
    /// `split(x, num_sections?, axis)`
    Split => "split",
    /// `tile(x, reps)`
    Tile => "tile",
    /// `flip(x, axis?)`
    Flip => "flip",
    /// `constant_pad(x, pad_width, value)`
    ConstantPad => "constant_pad",
    /// `zero_pad(x, pad_width)`
    ZeroPad => "zero_pad",
    /// `where(condition, x1, x2)`
    Where => "where",

    // indexing
    /// `gather_flat(params, indices, device?)`
    GatherFlat => "gather_flat",
    /// `gather_nd(params, indices, device?)`
    GatherNd => "gather_nd",
    /// `scatter_flat(indices, updates, size, reduction, device?)`
    ScatterFlat => "scatter_flat",
    /// `scatter_nd(indices, updates, shape, reduction, device?)`
    ScatterNd => "scatter_nd",
    /// `indices_where(x)`
    IndicesWhere => "indices_where",

    // math
    /// `minimum(x, y)`
    Minimum => "minimum",
    /// `maximum(x, y)`
    Maximum => "maximum",
    /// `clip(x, min, max)`
    Clip => "clip",
    /// `round(x)`
    Round => "round",
    /// `floor(x)`
    Floor => "floor",
    /// `ceil(x)`
    Ceil => "ceil",
    /// `abs(x)`
    Abs => "abs",
    /// `floormod(x, y)`
    Floormod => "floormod",
    /// `argmax(x, axis?)`
    Argmax => "argmax",
    /// `argmin(x, axis?)`
    Argmin => "argmin",
    /// `cross(x1, x2)`
    Cross => "cross",
    /// `matmul(x1, x2)`
    Matmul => "matmul",
    /// `cumsum(x, axis?)`
    Cumsum => "cumsum",
    /// `logical_and(x, y)`
    LogicalAnd => "logical_and",
    /// `logical_or(x, y)`
    LogicalOr => "logical_or",
    /// `logical_not(x)`
    LogicalNot => "logical_not",
    /// `add(x, y)`
    Add => "add",
    /// `subtract(x, y)`
    Subtract => "subtract",
    /// `multiply(x, y)`
    Multiply => "multiply",
    /// `divide(x, y)`
    Divide => "divide",
    /// `log(x)`
    Log => "log",

    // introspection
    /// `shape(x, as_tensor?)`
    Shape => "shape",
    /// `get_num_dims(x, as_tensor?)`
    GetNumDims => "get_num_dims",
    /// `dtype(x)`
    Dtype => "dtype",
    /// `dtype_to_str(dtype)`
    DtypeToStr => "dtype_to_str",
    /// `dtype_str(x)`
    DtypeStr => "dtype_str",
    /// `dev(x)`
    Dev => "dev",
    /// `dev_to_str(device)`
    DevToStr => "dev_to_str",
    /// `dev_str(x)`
    DevStr => "dev_str",
    /// `cast(x, dtype)`
    Cast => "cast",
    /// `gpu_is_available()`
    GpuIsAvailable => "gpu_is_available",
    /// `tpu_is_available()`
    TpuIsAvailable => "tpu_is_available",

    // random
    /// `random_uniform(low, high, shape, device)`
    RandomUniform => "random_uniform",
    /// `randint(low, high, shape, device)`
    Randint => "randint",
    /// `seed(value)`
    Seed => "seed",
    /// `shuffle(x)`
    Shuffle => "shuffle",

    // conversion
    /// `to_numpy(x)`
    ToNumpy => "to_numpy",
    /// `to_list(x)`
    ToList => "to_list",

    // compilation
    /// `compile_fn(fn, dynamic?, example_inputs?)`
    CompileFn => "compile_fn",
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Op {
    /// Looks an operation up by its canonical name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }
}

/// A set of [`Op`]s, one bit per operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u128);

impl Capabilities {
    /// No operations.
    pub const NONE: Self = Self(0);

    /// Every operation.
    #[must_use]
    pub fn all() -> Self {
        Self::from_ops(Op::ALL)
    }

    /// The set holding exactly `ops`.
    #[must_use]
    pub fn from_ops(ops: &[Op]) -> Self {
        ops.iter().fold(Self::NONE, |set, &op| set.with(op))
    }

    /// This set plus `op`.
    #[must_use]
    pub const fn with(self, op: Op) -> Self {
        Self(self.0 | (1_u128 << op as u8))
    }

    /// This set minus `op`.
    #[must_use]
    pub const fn without(self, op: Op) -> Self {
        Self(self.0 & !(1_u128 << op as u8))
    }

    /// `true` if `op` is in the set.
    #[must_use]
    pub const fn contains(self, op: Op) -> bool {
        self.0 & (1_u128 << op as u8) != 0
    }

    /// Number of operations in the set.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// `true` for the empty set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` if every operation is present.
    #[must_use]
    pub fn is_complete(self) -> bool {
        self == Self::all()
    }

    /// Operations absent from the set, in declaration order.
    #[must_use]
    pub fn missing(self) -> Vec<Op> {
        Op::ALL.iter().copied().filter(|&op| !self.contains(op)).collect()
    }

    /// Operations in the set, in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Op> {
        Op::ALL.iter().copied().filter(move |&op| self.contains(op))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_op_fits_in_the_bit_set() {
        assert!(Op::ALL.len() <= 128);
        assert_eq!(Capabilities::all().len(), Op::ALL.len());
        assert!(Capabilities::all().missing().is_empty());
    }

    #[test]
    fn names_are_unique_and_parse_back() {
        for &op in Op::ALL {
            assert_eq!(Op::from_name(op.name()), Some(op));
        }
        assert_eq!(Op::from_name("scatter"), None);
    }

    #[test]
    fn set_operations() {
        let caps = Capabilities::from_ops(&[Op::Matmul, Op::Abs]);
        assert!(caps.contains(Op::Matmul));
        assert!(!caps.contains(Op::Reshape));
        assert_eq!(caps.without(Op::Abs).iter().collect::<Vec<_>>(), vec![Op::Matmul]);
        assert_eq!(caps.missing().len(), Op::ALL.len() - 2);
    }
}

use ndarray::{Array1, ArrayView1};

use crate::weights::{Gate, ParameterSet};
use crate::{Float, Result, ScnError};

/// Hidden and cell vectors carried between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentState {
    /// (n_h,)
    pub h: Array1<Float>,
    /// (n_h,)
    pub c: Array1<Float>,
}

impl RecurrentState {
    pub fn zeros(n_h: usize) -> Self {
        Self {
            h: Array1::zeros(n_h),
            c: Array1::zeros(n_h),
        }
    }
}

/// One pre-activation vector per gate, indexed by `Gate as usize`.
#[derive(Debug, Clone, PartialEq)]
pub struct GatePreacts(pub [Array1<Float>; 4]);

impl GatePreacts {
    pub fn gate(&self, gate: Gate) -> &Array1<Float> {
        &self.0[gate as usize]
    }
}

/// Tag-dependent factor scales for one request and one ensemble member:
/// y · Wb_g on the input side and y · Ub_g on the hidden side.
#[derive(Debug, Clone)]
pub struct TagConditioning {
    /// (n_fx,) per gate
    pub input_side: [Array1<Float>; 4],
    /// (n_fh,) per gate
    pub hidden_side: [Array1<Float>; 4],
}

impl TagConditioning {
    pub fn new(params: &ParameterSet, tags: ArrayView1<Float>) -> Result<Self> {
        let n_y = params.dims().n_y;
        if tags.len() != n_y {
            return Err(ScnError::InputShape {
                name: "tag vector",
                expected: n_y,
                actual: tags.len(),
            });
        }
        let input_side = Gate::ALL.map(|g| tags.dot(&params.gate(g).wb));
        let hidden_side = Gate::ALL.map(|g| tags.dot(&params.gate(g).ub));
        Ok(Self {
            input_side,
            hidden_side,
        })
    }

    pub fn input(&self, gate: Gate) -> &Array1<Float> {
        &self.input_side[gate as usize]
    }

    pub fn hidden(&self, gate: Gate) -> &Array1<Float> {
        &self.hidden_side[gate as usize]
    }
}

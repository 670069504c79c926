//! One step of the tag-conditioned, factorized LSTM.
//!
//! For each gate g the input-side term is ((x · Wa_g) ⊙ yWb_g) · Wc_gᵀ and the
//! hidden-side term is ((h · Ua_g) ⊙ yUb_g) · Uc_gᵀ, where yWb_g and yUb_g
//! come from [`TagConditioning`]. Then, as in a plain LSTM:
//!
//! ```text
//! i = σ(pre_i)   f = σ(pre_f)   o = σ(pre_o)   c' = tanh(pre_c)
//! c = f ◦ c_prev + i ◦ c'
//! h = o ◦ tanh(c)
//! y = h · (Vhid · Wembᵀ) + bhid
//! ```

use ndarray::{Array1, ArrayView1};

use crate::operator;
use crate::state::{GatePreacts, RecurrentState, TagConditioning};
use crate::weights::{Gate, ParameterSet};
use crate::Float;

/// Scores over the vocabulary plus the state they were read from.
#[derive(Debug, Clone)]
pub struct CellOutput {
    /// (vocab_size,), unnormalized
    pub scores: Array1<Float>,
    pub state: RecurrentState,
}

pub fn input_side(
    params: &ParameterSet,
    tag: &TagConditioning,
    x: ArrayView1<Float>,
) -> GatePreacts {
    GatePreacts(Gate::ALL.map(|g| {
        let w = params.gate(g);
        (x.dot(&w.wa) * tag.input(g)).dot(&w.wc.t())
    }))
}

pub fn hidden_side(
    params: &ParameterSet,
    tag: &TagConditioning,
    h: ArrayView1<Float>,
) -> GatePreacts {
    GatePreacts(Gate::ALL.map(|g| {
        let u = params.gate(g);
        (h.dot(&u.ua) * tag.hidden(g)).dot(&u.uc.t())
    }))
}

/// Finishes a step from already computed pre-activation halves.
pub fn combine(
    params: &ParameterSet,
    from_input: &GatePreacts,
    from_hidden: &GatePreacts,
    c_prev: ArrayView1<Float>,
) -> CellOutput {
    let preact = |g: Gate| from_input.gate(g) + from_hidden.gate(g) + &params.gate(g).b;

    let mut i = preact(Gate::Input);
    let mut f = preact(Gate::Forget);
    let mut o = preact(Gate::Output);
    let mut candidate = preact(Gate::Candidate);
    operator::sigmoid(&mut i);
    operator::sigmoid(&mut f);
    operator::sigmoid(&mut o);
    operator::tanh(&mut candidate);

    let c = f * &c_prev + i * candidate;
    let mut h = c.clone();
    operator::tanh(&mut h);
    h *= &o;

    let scores = h.dot(&params.output_embedding) + &params.bhid;

    CellOutput {
        scores,
        state: RecurrentState { h, c },
    }
}

/// A full step without any caching.
pub fn step(
    params: &ParameterSet,
    tag: &TagConditioning,
    x: ArrayView1<Float>,
    prev: &RecurrentState,
) -> CellOutput {
    let from_input = input_side(params, tag, x);
    let from_hidden = hidden_side(params, tag, prev.h.view());
    combine(params, &from_input, &from_hidden, prev.c.view())
}

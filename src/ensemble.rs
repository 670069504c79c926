use ndarray::{Array1, ArrayView1};

use crate::cell;
use crate::config::ModelDims;
use crate::loader;
use crate::memo::StepMemo;
use crate::operator;
use crate::state::{RecurrentState, TagConditioning};
use crate::weights::ParameterSet;
use crate::{Float, Result, ScnError};

/// What is fed into a step.
#[derive(Debug, Clone, Copy)]
pub enum StepInput<'a> {
    /// Per-member z · C0 for the synthetic start step.
    Start(&'a [Array1<Float>]),
    /// A previously emitted vocabulary index.
    Token(usize),
}

/// Averaged next-token distribution plus every member's new state.
#[derive(Debug, Clone)]
pub struct EnsembleStep {
    /// log of the member-averaged probabilities, (vocab_size,)
    pub log_probs: Array1<Float>,
    pub states: Vec<RecurrentState>,
}

/// Independently trained members sharing the same dimensions.
#[derive(Debug, Clone)]
pub struct Ensemble {
    members: Vec<ParameterSet>,
    dims: ModelDims,
}

impl Ensemble {
    pub fn new(members: Vec<ParameterSet>) -> Result<Self> {
        let dims = loader::common_dims(&members)?;
        Ok(Self { members, dims })
    }

    pub fn load(prefix: &str, members: &[usize]) -> Result<Self> {
        Self::new(loader::load_ensemble(prefix, members)?)
    }

    pub fn dims(&self) -> ModelDims {
        self.dims
    }

    pub fn members(&self) -> &[ParameterSet] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Tag conditioning for every member, computed once per request.
    pub fn condition(&self, tags: ArrayView1<Float>) -> Result<Vec<TagConditioning>> {
        self.members
            .iter()
            .map(|params| TagConditioning::new(params, tags))
            .collect()
    }

    /// Start-step inputs for every member.
    pub fn start_inputs(&self, image: ArrayView1<Float>) -> Result<Vec<Array1<Float>>> {
        self.members
            .iter()
            .map(|params| params.start_input(image))
            .collect()
    }

    /// Runs every member one step and averages their softmax outputs in
    /// probability space. `slot` identifies the hidden state for caching;
    /// `None` means it must not be cached.
    pub fn step(
        &self,
        tags: &[TagConditioning],
        input: StepInput<'_>,
        states: &[RecurrentState],
        slot: Option<usize>,
        memo: &mut StepMemo,
    ) -> Result<EnsembleStep> {
        debug_assert_eq!(tags.len(), self.members.len());
        debug_assert_eq!(states.len(), self.members.len());

        let mut probs = Array1::<Float>::zeros(self.dims.vocab_size);
        let mut next_states = Vec::with_capacity(self.members.len());

        for (member, ((params, tag), prev)) in self
            .members
            .iter()
            .zip(tags)
            .zip(states)
            .enumerate()
        {
            let from_input = match input {
                StepInput::Start(xs) => {
                    let x = xs.get(member).ok_or(ScnError::IndexOutOfRange {
                        index: member,
                        len: xs.len(),
                    })?;
                    memo.input_side(member, None, || cell::input_side(params, tag, x.view()))
                }
                StepInput::Token(token) => {
                    let x = params.embedding(token)?;
                    memo.input_side(member, Some(token), || cell::input_side(params, tag, x))
                }
            };
            let from_hidden =
                memo.hidden_side(member, slot, || cell::hidden_side(params, tag, prev.h.view()));

            let out = cell::combine(params, &from_input, &from_hidden, prev.c.view());
            let mut p = out.scores;
            operator::softmax(&mut p);
            probs += &p;
            next_states.push(out.state);
        }

        probs /= self.members.len() as Float;
        Ok(EnsembleStep {
            log_probs: operator::floored_log(&probs),
            states: next_states,
        })
    }
}

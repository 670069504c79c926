//! Ensemble beam search over the factorized LSTM.
//!
//! The start step is run once from a zero state with the projected image
//! as input, and its top `beam_width` tokens seed the beam. Each following
//! round expands every live hypothesis by its top `beam_width` next tokens,
//! pools those with the frozen ones and keeps the best `beam_width`. A
//! hypothesis ending in [`END_TOKEN`] is frozen at the start of the next
//! round: it stays in the pool unchanged but is never extended.
//!
//! States live in a per-round arena. Every expanded parent writes one slot,
//! and its children point at that slot, so the slot index doubles as the
//! hidden-state identity for [`StepMemo`].

use std::cmp::Ordering;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::DecodeConfig;
use crate::ensemble::{Ensemble, StepInput};
use crate::memo::StepMemo;
use crate::operator;
use crate::state::{RecurrentState, TagConditioning};
use crate::{Float, Result, ScnError};

/// Vocabulary index of the end-of-sequence marker.
pub const END_TOKEN: usize = 0;

/// One decoded sequence and its cumulative log-probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub log_prob: Float,
    pub tokens: Vec<usize>,
}

impl Caption {
    pub fn is_finished(&self) -> bool {
        ends_with_marker(&self.tokens)
    }
}

/// Best-first list of captions for one request.
pub type NBestList = Vec<Caption>;

#[derive(Debug, Clone)]
struct Hypothesis {
    log_prob: Float,
    tokens: Vec<usize>,
    /// state slot in the current round's arena; `None` once frozen
    slot: Option<usize>,
}

impl Hypothesis {
    fn is_frozen(&self) -> bool {
        ends_with_marker(&self.tokens)
    }
}

/// Hypotheses of one round and the states their children will read.
struct Round {
    beam: Vec<Hypothesis>,
    /// per slot, one state per ensemble member
    slots: Vec<Vec<RecurrentState>>,
}

fn ends_with_marker(tokens: &[usize]) -> bool {
    tokens.last() == Some(&END_TOKEN)
}

/// Decodes one request. The caller owns the memo so that a batch can reuse
/// its allocations; token entries are dropped here at request start.
pub struct BeamSearch<'a> {
    ensemble: &'a Ensemble,
    tags: &'a [TagConditioning],
    config: &'a DecodeConfig,
    memo: &'a mut StepMemo,
}

impl<'a> BeamSearch<'a> {
    pub fn new(
        ensemble: &'a Ensemble,
        tags: &'a [TagConditioning],
        config: &'a DecodeConfig,
        memo: &'a mut StepMemo,
    ) -> Self {
        Self {
            ensemble,
            tags,
            config,
            memo,
        }
    }

    pub fn run(&mut self, image: ArrayView1<Float>) -> Result<NBestList> {
        self.config.validate()?;
        self.memo.begin_request();

        let mut round = self.start(image)?;
        let mut nsteps = 1;
        loop {
            round = self.expand(round, nsteps)?;
            nsteps += 1;
            trace!(
                step = nsteps,
                beam = ?round.beam.iter().map(|h| (h.log_prob, &h.tokens)).collect::<Vec<_>>(),
                "round done"
            );
            if nsteps >= self.config.max_steps {
                break;
            }
            if self.config.early_exit && round.beam.iter().all(Hypothesis::is_frozen) {
                debug!(step = nsteps, "every hypothesis ended, stopping early");
                break;
            }
        }

        let stats = self.memo.stats();
        debug!(
            steps = nsteps,
            input_hits = stats.input.hits,
            input_misses = stats.input.misses,
            hidden_hits = stats.hidden.hits,
            hidden_misses = stats.hidden.misses,
            "beam search finished"
        );

        Ok(round
            .beam
            .into_iter()
            .map(|h| Caption {
                log_prob: h.log_prob,
                tokens: h.tokens,
            })
            .collect())
    }

    fn start(&mut self, image: ArrayView1<Float>) -> Result<Round> {
        let n_h = self.ensemble.dims().n_h;
        let xs = self.ensemble.start_inputs(image)?;
        let zeros = vec![RecurrentState::zeros(n_h); self.ensemble.len()];
        let step = self
            .ensemble
            .step(self.tags, StepInput::Start(&xs), &zeros, None, self.memo)?;
        check_finite(step.log_probs.view(), 1)?;

        let beam = operator::top_k(step.log_probs.view(), self.config.beam_width)
            .into_iter()
            .map(|token| Hypothesis {
                log_prob: step.log_probs[token],
                tokens: vec![token],
                slot: Some(0),
            })
            .collect();
        Ok(Round {
            beam,
            slots: vec![step.states],
        })
    }

    fn expand(&mut self, round: Round, nsteps: usize) -> Result<Round> {
        self.memo.begin_round();

        let Round { beam, slots } = round;
        let mut pool = Vec::with_capacity(beam.len() * self.config.beam_width);
        let mut next_slots = Vec::with_capacity(beam.len());

        for hyp in beam {
            let live = match (hyp.slot, hyp.tokens.last().copied()) {
                (Some(slot), Some(last)) if last != END_TOKEN => Some((slot, last)),
                _ => None,
            };
            let Some((slot, last)) = live else {
                pool.push(Hypothesis { slot: None, ..hyp });
                continue;
            };
            let states = slots.get(slot).ok_or(ScnError::IndexOutOfRange {
                index: slot,
                len: slots.len(),
            })?;

            let step = self.ensemble.step(
                self.tags,
                StepInput::Token(last),
                states,
                Some(slot),
                self.memo,
            )?;
            check_finite(step.log_probs.view(), nsteps + 1)?;

            let child_slot = next_slots.len();
            for token in operator::top_k(step.log_probs.view(), self.config.beam_width) {
                let mut tokens = hyp.tokens.clone();
                tokens.push(token);
                pool.push(Hypothesis {
                    log_prob: hyp.log_prob + step.log_probs[token],
                    tokens,
                    slot: Some(child_slot),
                });
            }
            next_slots.push(step.states);
        }

        if let Some(bad) = pool.iter().find(|h| !h.log_prob.is_finite()) {
            return Err(ScnError::NumericFault {
                step: nsteps + 1,
                detail: format!("candidate {:?} scored {}", bad.tokens, bad.log_prob),
            });
        }
        pool.sort_by(rank);
        pool.truncate(self.config.beam_width);

        Ok(Round {
            beam: pool,
            slots: next_slots,
        })
    }
}

/// Best first: higher score, then the lexicographically larger sequence.
fn rank(a: &Hypothesis, b: &Hypothesis) -> Ordering {
    b.log_prob
        .total_cmp(&a.log_prob)
        .then_with(|| b.tokens.cmp(&a.tokens))
}

fn check_finite(log_probs: ArrayView1<Float>, step: usize) -> Result<()> {
    match operator::first_non_finite(log_probs) {
        Some((token, value)) => Err(ScnError::NumericFault {
            step,
            detail: format!("token {token} has log-probability {value}"),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hyp(log_prob: Float, tokens: &[usize]) -> Hypothesis {
        Hypothesis {
            log_prob,
            tokens: tokens.to_vec(),
            slot: None,
        }
    }

    #[test]
    fn test_rank_is_descending_with_sequence_tiebreak() {
        let mut pool = vec![
            hyp(-2.0, &[1, 2]),
            hyp(-1.0, &[3]),
            hyp(-2.0, &[2, 1]),
            hyp(-0.5, &[0]),
        ];
        pool.sort_by(rank);
        let order: Vec<_> = pool.iter().map(|h| h.tokens.clone()).collect();
        assert_eq!(order, vec![vec![0], vec![3], vec![2, 1], vec![1, 2]]);
    }

    #[test]
    fn test_frozen_needs_trailing_marker() {
        assert!(hyp(0.0, &[0]).is_frozen());
        assert!(hyp(0.0, &[4, 0]).is_frozen());
        assert!(!hyp(0.0, &[0, 4]).is_frozen());
        assert!(!hyp(0.0, &[]).is_frozen());
    }

    #[test]
    fn test_check_finite_reports_step() {
        let ok = ndarray::array![-1.0, -2.0];
        assert!(check_finite(ok.view(), 1).is_ok());
        let bad = ndarray::array![-1.0, Float::NAN];
        assert!(matches!(
            check_finite(bad.view(), 4),
            Err(ScnError::NumericFault { step: 4, .. })
        ));
    }
}

#![allow(dead_code)]

use ndarray::{Array1, ArrayD, IxDyn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use scn_caption::loader::ParameterBundle;
use scn_caption::weights::Gate;
use scn_caption::{Ensemble, Float, ParameterSet};

pub struct Dims {
    pub vocab: usize,
    pub n_x: usize,
    pub n_h: usize,
    pub n_f: usize,
    pub n_y: usize,
    pub n_z: usize,
}

pub const SMALL: Dims = Dims {
    vocab: 5,
    n_x: 3,
    n_h: 4,
    n_f: 4,
    n_y: 2,
    n_z: 2,
};

pub const MEDIUM: Dims = Dims {
    vocab: 12,
    n_x: 6,
    n_h: 8,
    n_f: 5,
    n_y: 7,
    n_z: 9,
};

fn build<F>(dims: &Dims, mut weight: F, gate_bias: [Float; 4], bhid: Vec<Float>) -> ParameterBundle
where
    F: FnMut(&[usize]) -> ArrayD<Float>,
{
    assert_eq!(bhid.len(), dims.vocab);
    let mut b = ParameterBundle::new();
    for (gate, bias) in Gate::ALL.iter().zip(gate_bias) {
        let s = gate.suffix();
        b.insert(format!("encoder_lstm_Wa_{s}"), weight(&[dims.n_x, dims.n_f]));
        b.insert(format!("encoder_lstm_Wb_{s}"), weight(&[dims.n_y, dims.n_f]));
        b.insert(format!("encoder_lstm_Wc_{s}"), weight(&[dims.n_h, dims.n_f]));
        b.insert(format!("encoder_lstm_Ua_{s}"), weight(&[dims.n_h, dims.n_f]));
        b.insert(format!("encoder_lstm_Ub_{s}"), weight(&[dims.n_y, dims.n_f]));
        b.insert(format!("encoder_lstm_Uc_{s}"), weight(&[dims.n_h, dims.n_f]));
        b.insert(
            format!("encoder_lstm_b_{s}"),
            ArrayD::from_elem(IxDyn(&[dims.n_h]), bias),
        );
    }
    b.insert("Wemb".to_string(), weight(&[dims.vocab, dims.n_x]));
    b.insert("Vhid".to_string(), weight(&[dims.n_h, dims.n_x]));
    b.insert(
        "bhid".to_string(),
        ArrayD::from_shape_vec(IxDyn(&[dims.vocab]), bhid).unwrap(),
    );
    b.insert("C0".to_string(), weight(&[dims.n_z, dims.n_x]));
    b
}

/// Small fixed weights with a zero candidate bias. Under a zero image and
/// zero tag vector every step's scores are exactly `ln(probs)`, so the
/// next-token distribution is `probs` at every step.
pub fn flat_member(probs: &[Float]) -> ParameterSet {
    let mut counter = 0usize;
    let weight = |shape: &[usize]| {
        ArrayD::from_shape_fn(IxDyn(shape), |_| {
            counter += 1;
            0.01 * ((counter % 7) as Float) - 0.03
        })
    };
    let bhid = probs.iter().map(|p| p.ln()).collect();
    let dims = Dims {
        vocab: probs.len(),
        ..SMALL
    };
    let bundle = build(&dims, weight, [0.1, -0.2, 0.3, 0.0], bhid);
    ParameterSet::from_bundle(&bundle, 0).unwrap()
}

pub fn flat_ensemble(probs: &[Float]) -> Ensemble {
    Ensemble::new(vec![flat_member(probs)]).unwrap()
}

pub fn random_member(dims: &Dims, seed: u64) -> ParameterSet {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut biases = [0.0; 4];
    for b in biases.iter_mut() {
        *b = rng.gen_range(-0.5..0.5);
    }
    let bhid = (0..dims.vocab).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let weight =
        |shape: &[usize]| ArrayD::from_shape_fn(IxDyn(shape), |_| rng.gen_range(-0.6..0.6));
    let bundle = build(dims, weight, biases, bhid);
    ParameterSet::from_bundle(&bundle, 0).unwrap()
}

pub fn random_vector(len: usize, seed: u64) -> Array1<Float> {
    let mut rng = SmallRng::seed_from_u64(seed);
    Array1::from_shape_fn(len, |_| rng.gen_range(-1.0..1.0))
}

pub fn zeros(len: usize) -> Array1<Float> {
    Array1::zeros(len)
}

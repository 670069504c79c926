use ndarray::{Array1, Array2, ArrayView1, Ix1, Ix2};

use crate::config::ModelDims;
use crate::loader::ParameterBundle;
use crate::{Float, Result, ScnError};

/// Prefix carried by every gate parameter in a trained bundle.
pub const LSTM_PREFIX: &str = "encoder_lstm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Input,
    Forget,
    Output,
    Candidate,
}

impl Gate {
    pub const ALL: [Gate; 4] = [Gate::Input, Gate::Forget, Gate::Output, Gate::Candidate];

    pub fn suffix(self) -> &'static str {
        match self {
            Gate::Input => "i",
            Gate::Forget => "f",
            Gate::Output => "o",
            Gate::Candidate => "c",
        }
    }
}

/// Factorized weights of one gate. `a` projects into factor space, `b`
/// maps tags to per-factor scales, `c` projects back to hidden units.
#[derive(Debug, Clone)]
pub struct GateWeights {
    /// (n_x, n_fx)
    pub wa: Array2<Float>,
    /// (n_y, n_fx)
    pub wb: Array2<Float>,
    /// (n_h, n_fx)
    pub wc: Array2<Float>,
    /// (n_h, n_fh)
    pub ua: Array2<Float>,
    /// (n_y, n_fh)
    pub ub: Array2<Float>,
    /// (n_h, n_fh)
    pub uc: Array2<Float>,
    /// (n_h,)
    pub b: Array1<Float>,
}

/// One trained ensemble member, shape-checked once at construction.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    /// indexed by `Gate as usize`
    pub gates: [GateWeights; 4],
    /// token embeddings
    /// (vocab_size, n_x)
    pub wemb: Array2<Float>,
    /// (n_h, n_x)
    pub vhid: Array2<Float>,
    /// (vocab_size,)
    pub bhid: Array1<Float>,
    /// image projection into embedding space
    /// (n_z, n_x)
    pub c0: Array2<Float>,
    /// vhid · wembᵀ
    /// (n_h, vocab_size)
    pub output_embedding: Array2<Float>,
    dims: ModelDims,
}

struct Fetch<'a> {
    bundle: &'a ParameterBundle,
    member: usize,
}

impl Fetch<'_> {
    fn matrix(&self, key: &str, rows: Option<usize>, cols: Option<usize>) -> Result<Array2<Float>> {
        let raw = self.get(key)?;
        let shape = raw.shape().to_vec();
        let fits = shape.len() == 2
            && rows.map_or(true, |r| r == shape[0])
            && cols.map_or(true, |c| c == shape[1]);
        if !fits {
            return Err(self.mismatch(key, format!("({}, {})", dim(rows), dim(cols)), shape));
        }
        raw.clone()
            .into_dimensionality::<Ix2>()
            .map_err(|_| self.mismatch(key, "a matrix".to_string(), shape))
    }

    fn vector(&self, key: &str, len: usize) -> Result<Array1<Float>> {
        let raw = self.get(key)?;
        let shape = raw.shape().to_vec();
        if shape != [len] {
            return Err(self.mismatch(key, format!("({len},)"), shape));
        }
        raw.clone()
            .into_dimensionality::<Ix1>()
            .map_err(|_| self.mismatch(key, "a vector".to_string(), shape))
    }

    fn get(&self, key: &str) -> Result<&ndarray::ArrayD<Float>> {
        self.bundle
            .get(key)
            .ok_or_else(|| ScnError::MissingParameter {
                member: self.member,
                key: key.to_string(),
            })
    }

    fn mismatch(&self, key: &str, expected: String, actual: Vec<usize>) -> ScnError {
        ScnError::ShapeMismatch {
            member: self.member,
            key: key.to_string(),
            expected,
            actual,
        }
    }
}

fn dim(d: Option<usize>) -> String {
    d.map_or_else(|| "?".to_string(), |d| d.to_string())
}

fn gate_key(name: &str, gate: Gate) -> String {
    format!("{LSTM_PREFIX}_{name}_{}", gate.suffix())
}

impl ParameterSet {
    /// Builds a typed member from a raw bundle. `member` is only used to
    /// label errors.
    pub fn from_bundle(bundle: &ParameterBundle, member: usize) -> Result<Self> {
        let fetch = Fetch { bundle, member };

        let wemb = fetch.matrix("Wemb", None, None)?;
        let (vocab_size, n_x) = wemb.dim();

        let ua_i = fetch.matrix(&gate_key("Ua", Gate::Input), None, None)?;
        let (n_h, n_fh) = ua_i.dim();
        let wa_i = fetch.matrix(&gate_key("Wa", Gate::Input), Some(n_x), None)?;
        let n_fx = wa_i.ncols();
        let wb_i = fetch.matrix(&gate_key("Wb", Gate::Input), None, Some(n_fx))?;
        let n_y = wb_i.nrows();

        let load_gate = |gate: Gate| -> Result<GateWeights> {
            Ok(GateWeights {
                wa: fetch.matrix(&gate_key("Wa", gate), Some(n_x), Some(n_fx))?,
                wb: fetch.matrix(&gate_key("Wb", gate), Some(n_y), Some(n_fx))?,
                wc: fetch.matrix(&gate_key("Wc", gate), Some(n_h), Some(n_fx))?,
                ua: fetch.matrix(&gate_key("Ua", gate), Some(n_h), Some(n_fh))?,
                ub: fetch.matrix(&gate_key("Ub", gate), Some(n_y), Some(n_fh))?,
                uc: fetch.matrix(&gate_key("Uc", gate), Some(n_h), Some(n_fh))?,
                b: fetch.vector(&gate_key("b", gate), n_h)?,
            })
        };
        let gates = [
            load_gate(Gate::Input)?,
            load_gate(Gate::Forget)?,
            load_gate(Gate::Output)?,
            load_gate(Gate::Candidate)?,
        ];

        let vhid = fetch.matrix("Vhid", Some(n_h), Some(n_x))?;
        let bhid = fetch.vector("bhid", vocab_size)?;
        let c0 = fetch.matrix("C0", None, Some(n_x))?;
        let n_z = c0.nrows();

        let output_embedding = vhid.dot(&wemb.t());

        Ok(Self {
            gates,
            wemb,
            vhid,
            bhid,
            c0,
            output_embedding,
            dims: ModelDims {
                vocab_size,
                n_x,
                n_h,
                n_z,
                n_y,
                n_fx,
                n_fh,
            },
        })
    }

    pub fn dims(&self) -> ModelDims {
        self.dims
    }

    pub fn gate(&self, gate: Gate) -> &GateWeights {
        &self.gates[gate as usize]
    }

    /// Row of `Wemb` for `token`.
    pub fn embedding(&self, token: usize) -> Result<ArrayView1<'_, Float>> {
        if token >= self.dims.vocab_size {
            return Err(ScnError::IndexOutOfRange {
                index: token,
                len: self.dims.vocab_size,
            });
        }
        Ok(self.wemb.row(token))
    }

    /// z · C0, the input fed to the start step.
    pub fn start_input(&self, image: ArrayView1<Float>) -> Result<Array1<Float>> {
        if image.len() != self.dims.n_z {
            return Err(ScnError::InputShape {
                name: "image vector",
                expected: self.dims.n_z,
                actual: image.len(),
            });
        }
        Ok(image.dot(&self.c0))
    }

    /// Total number of scalars held by the trained tensors.
    pub fn num_parameters(&self) -> usize {
        let gates: usize = self
            .gates
            .iter()
            .map(|g| {
                [&g.wa, &g.wb, &g.wc, &g.ua, &g.ub, &g.uc]
                    .iter()
                    .map(|m| m.len())
                    .sum::<usize>()
                    + g.b.len()
            })
            .sum();
        gates + self.wemb.len() + self.vhid.len() + self.bhid.len() + self.c0.len()
    }
}

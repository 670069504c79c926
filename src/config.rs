use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, ScnError};

/// Knobs for one decoding session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// hypotheses kept per round
    pub beam_width: usize,
    /// hard step cap, counted from the start step
    pub max_steps: usize,
    /// stop as soon as every hypothesis ends in the end marker
    pub early_exit: bool,
    /// reuse gate pre-activations across beam branches
    pub memoize: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            beam_width: 5,
            max_steps: 20,
            early_exit: false,
            memoize: true,
        }
    }
}

impl DecodeConfig {
    pub fn new(beam_width: usize, max_steps: usize) -> Self {
        Self {
            beam_width,
            max_steps,
            ..Self::default()
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.beam_width == 0 {
            return Err(ScnError::Configuration(
                "beam width must be at least 1".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(ScnError::Configuration(
                "max steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Dimensions shared by every member of an ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelDims {
    /// vocabulary size, rows of `Wemb`
    pub vocab_size: usize,
    /// word embedding width
    pub n_x: usize,
    /// hidden units
    pub n_h: usize,
    /// image feature width, rows of `C0`
    pub n_z: usize,
    /// tag feature width, rows of `Wb_*`/`Ub_*`
    pub n_y: usize,
    /// factors on the input side
    pub n_fx: usize,
    /// factors on the hidden side
    pub n_fh: usize,
}

//! Caption decoding for Semantic Compositional Networks: a tag-conditioned,
//! factorized LSTM decoded with ensemble beam search.

pub mod beam;
pub mod cell;
pub mod config;
pub mod ensemble;
pub mod loader;
pub mod memo;
pub mod model;
pub mod operator;
pub mod output;
pub mod state;
pub mod tokenizer;
pub mod weights;

mod error;

pub use beam::{Caption, NBestList, END_TOKEN};
pub use config::{DecodeConfig, ModelDims};
pub use ensemble::Ensemble;
pub use error::Result;
pub use error::ScnError;
pub use model::Captioner;
pub use tokenizer::Vocabulary;
pub use weights::ParameterSet;

pub type Float = f64;

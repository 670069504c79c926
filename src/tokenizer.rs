use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::beam::END_TOKEN;
use crate::{Result, ScnError};

/// Word list where position is the vocabulary index. Index 0 is the
/// end-of-sequence marker.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new(words: Vec<String>) -> Self {
        let index = words
            .iter()
            .enumerate()
            .map(|(ix, w)| (w.clone(), ix))
            .collect();
        Self { words, index }
    }

    /// Reads a JSON array of words. When `vocab_size` is given the list must
    /// have exactly that many entries.
    pub fn from_json_file<P: AsRef<Path>>(path: P, vocab_size: Option<usize>) -> Result<Self> {
        let file = File::open(path)?;
        let words: Vec<String> = serde_json::from_reader(BufReader::new(file))?;
        if let Some(expected) = vocab_size {
            if words.len() != expected {
                return Err(ScnError::InputShape {
                    name: "vocabulary",
                    expected,
                    actual: words.len(),
                });
            }
        }
        Ok(Self::new(words))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, ix: usize) -> Result<&str> {
        self.words
            .get(ix)
            .map(String::as_str)
            .ok_or(ScnError::IndexOutOfRange {
                index: ix,
                len: self.words.len(),
            })
    }

    /// Joins words with spaces, dropping one trailing end marker.
    pub fn decode(&self, tokens: &[usize]) -> Result<String> {
        let body = match tokens.split_last() {
            Some((&END_TOKEN, rest)) => rest,
            _ => tokens,
        };
        let words = body
            .iter()
            .map(|&ix| self.word(ix))
            .collect::<Result<Vec<_>>>()?;
        Ok(words.join(" "))
    }

    pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
        text.split_whitespace()
            .map(|w| {
                self.index
                    .get(w)
                    .copied()
                    .ok_or_else(|| ScnError::UnknownWord(w.to_string()))
            })
            .collect()
    }
}

//! Persisted decoding results: the full N-best structure per item and a
//! map from item id to its best caption.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::beam::NBestList;
use crate::tokenizer::Vocabulary;
use crate::{Float, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NBestEntry {
    pub log_prob: Float,
    pub tokens: Vec<usize>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemNBest {
    pub id: String,
    pub captions: Vec<NBestEntry>,
}

pub fn render(id: &str, nbest: &NBestList, vocab: &Vocabulary) -> Result<ItemNBest> {
    let captions = nbest
        .iter()
        .map(|c| {
            Ok(NBestEntry {
                log_prob: c.log_prob,
                tokens: c.tokens.clone(),
                text: vocab.decode(&c.tokens)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ItemNBest {
        id: id.to_string(),
        captions,
    })
}

/// Item id to the text of its top-ranked caption. Items with an empty list
/// are left out.
pub fn best_captions(items: &[ItemNBest]) -> BTreeMap<String, String> {
    items
        .iter()
        .filter_map(|item| {
            item.captions
                .first()
                .map(|best| (item.id.clone(), best.text.clone()))
        })
        .collect()
}

pub fn write_nbest_json<P: AsRef<Path>>(path: P, items: &[ItemNBest]) -> Result<()> {
    write_json(path, items)
}

pub fn write_captions_json<P: AsRef<Path>>(
    path: P,
    captions: &BTreeMap<String, String>,
) -> Result<()> {
    write_json(path, captions)
}

fn write_json<P: AsRef<Path>, T: Serialize + ?Sized>(path: P, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam::Caption;

    fn vocab() -> Vocabulary {
        Vocabulary::new(vec![".".into(), "a".into(), "cat".into()])
    }

    #[test]
    fn test_render_and_best() {
        let nbest = vec![
            Caption {
                log_prob: -1.0,
                tokens: vec![1, 2, 0],
            },
            Caption {
                log_prob: -2.5,
                tokens: vec![2, 2],
            },
        ];
        let items = vec![
            render("42", &nbest, &vocab()).unwrap(),
            render("43", &Vec::new(), &vocab()).unwrap(),
        ];
        assert_eq!(items[0].captions[0].text, "a cat");
        assert_eq!(items[0].captions[1].text, "cat cat");

        let best = best_captions(&items);
        assert_eq!(best.len(), 1);
        assert_eq!(best["42"], "a cat");
    }

    #[test]
    fn test_written_files_parse_back() {
        let dir = tempfile::tempdir().unwrap();
        let nbest = vec![Caption {
            log_prob: -0.25,
            tokens: vec![2, 0],
        }];
        let items = vec![render("7", &nbest, &vocab()).unwrap()];

        let nbest_path = dir.path().join("nbest.json");
        write_nbest_json(&nbest_path, &items).unwrap();
        let back: Vec<ItemNBest> =
            serde_json::from_str(&std::fs::read_to_string(&nbest_path).unwrap()).unwrap();
        assert_eq!(back, items);

        let captions_path = dir.path().join("captions.json");
        write_captions_json(&captions_path, &best_captions(&items)).unwrap();
        let back: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&captions_path).unwrap()).unwrap();
        assert_eq!(back["7"], "cat");
    }
}

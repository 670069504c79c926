use ndarray::{ArrayView1, ArrayView2};
use tracing::{debug, info, warn};

use crate::beam::{BeamSearch, NBestList};
use crate::config::DecodeConfig;
use crate::ensemble::Ensemble;
use crate::memo::StepMemo;
use crate::{Float, Result, ScnError};

/// Loaded ensemble plus decoding settings; produces captions for
/// (image, tag) feature pairs.
pub struct Captioner {
    pub config: DecodeConfig,
    ensemble: Ensemble,
}

impl Captioner {
    pub fn new(ensemble: Ensemble, config: DecodeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, ensemble })
    }

    /// Loads `{prefix}{member}.npz` for each member.
    pub fn from_npz(prefix: &str, members: &[usize], config: DecodeConfig) -> Result<Self> {
        let ensemble = Ensemble::load(prefix, members)?;
        info!(
            members = ensemble.len(),
            dims = ?ensemble.dims(),
            "ensemble ready"
        );
        Self::new(ensemble, config)
    }

    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    /// N-best captions for one image/tag pair.
    pub fn caption(&self, image: ArrayView1<Float>, tags: ArrayView1<Float>) -> Result<NBestList> {
        let mut memo = StepMemo::new(self.config.memoize);
        self.caption_with(image, tags, &mut memo)
    }

    fn caption_with(
        &self,
        image: ArrayView1<Float>,
        tags: ArrayView1<Float>,
        memo: &mut StepMemo,
    ) -> Result<NBestList> {
        let conditioning = self.ensemble.condition(tags)?;
        BeamSearch::new(&self.ensemble, &conditioning, &self.config, memo).run(image)
    }

    /// Decodes every row pair in order. A failing item yields its own error
    /// and does not stop the rest.
    pub fn caption_batch(
        &self,
        images: ArrayView2<Float>,
        tags: ArrayView2<Float>,
    ) -> Result<Vec<Result<NBestList>>> {
        if images.nrows() != tags.nrows() {
            return Err(ScnError::BatchMismatch {
                images: images.nrows(),
                tags: tags.nrows(),
            });
        }
        self.config.validate()?;
        info!(items = images.nrows(), "start decoding");

        let results = self.decode_rows(images, tags);

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(failed, "some items could not be decoded");
        }
        info!(items = results.len(), "end decoding");
        Ok(results)
    }

    #[cfg(not(feature = "parallel"))]
    fn decode_rows(
        &self,
        images: ArrayView2<Float>,
        tags: ArrayView2<Float>,
    ) -> Vec<Result<NBestList>> {
        let mut memo = StepMemo::new(self.config.memoize);
        images
            .rows()
            .into_iter()
            .zip(tags.rows())
            .enumerate()
            .map(|(item, (image, tag))| {
                debug!(item, "decoding");
                self.caption_with(image, tag, &mut memo)
            })
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn decode_rows(
        &self,
        images: ArrayView2<Float>,
        tags: ArrayView2<Float>,
    ) -> Vec<Result<NBestList>> {
        use rayon::prelude::*;

        (0..images.nrows())
            .into_par_iter()
            .map(|item| {
                debug!(item, "decoding");
                self.caption(images.row(item), tags.row(item))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ParameterBundle;
    use crate::weights::{Gate, ParameterSet};
    use ndarray::{Array2, ArrayD, IxDyn};

    fn flat_ensemble(bhid: Vec<Float>) -> Ensemble {
        let (n_x, n_h, n_f, n_y, n_z) = (2, 2, 2, 3, 2);
        let v = bhid.len();
        let fill = |shape: &[usize]| ArrayD::from_elem(IxDyn(shape), 0.25);
        let mut b = ParameterBundle::new();
        for gate in Gate::ALL {
            let s = gate.suffix();
            b.insert(format!("encoder_lstm_Wa_{s}"), fill(&[n_x, n_f]));
            b.insert(format!("encoder_lstm_Wb_{s}"), fill(&[n_y, n_f]));
            b.insert(format!("encoder_lstm_Wc_{s}"), fill(&[n_h, n_f]));
            b.insert(format!("encoder_lstm_Ua_{s}"), fill(&[n_h, n_f]));
            b.insert(format!("encoder_lstm_Ub_{s}"), fill(&[n_y, n_f]));
            b.insert(format!("encoder_lstm_Uc_{s}"), fill(&[n_h, n_f]));
            b.insert(format!("encoder_lstm_b_{s}"), fill(&[n_h]));
        }
        b.insert("Wemb".to_string(), fill(&[v, n_x]));
        b.insert("Vhid".to_string(), fill(&[n_h, n_x]));
        b.insert(
            "bhid".to_string(),
            ArrayD::from_shape_vec(IxDyn(&[v]), bhid).unwrap(),
        );
        b.insert("C0".to_string(), fill(&[n_z, n_x]));
        Ensemble::new(vec![ParameterSet::from_bundle(&b, 0).unwrap()]).unwrap()
    }

    #[test]
    fn test_rejects_bad_config_up_front() {
        let ensemble = flat_ensemble(vec![0.0, 1.0, 2.0]);
        assert!(matches!(
            Captioner::new(ensemble, DecodeConfig::new(0, 5)),
            Err(ScnError::Configuration(_))
        ));
    }

    #[test]
    fn test_batch_row_mismatch() {
        let captioner =
            Captioner::new(flat_ensemble(vec![0.0, 1.0]), DecodeConfig::new(2, 3)).unwrap();
        let images = Array2::zeros((2, 2));
        let tags = Array2::zeros((3, 3));
        assert!(matches!(
            captioner.caption_batch(images.view(), tags.view()),
            Err(ScnError::BatchMismatch { images: 2, tags: 3 })
        ));
    }

    #[test]
    fn test_bad_item_does_not_stop_batch() {
        let captioner =
            Captioner::new(flat_ensemble(vec![0.0, 1.0, 0.5]), DecodeConfig::new(2, 3)).unwrap();
        let images =
            Array2::from_shape_vec((3, 2), vec![0.1, 0.2, Float::NAN, 0.0, 0.3, -0.1]).unwrap();
        let tags = Array2::from_elem((3, 3), 0.5);

        let results = captioner.caption_batch(images.view(), tags.view()).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ScnError::NumericFault { step: 1, .. })));
        assert!(results[2].is_ok());

        let alone = captioner.caption(images.row(2), tags.row(2)).unwrap();
        assert_eq!(results[2].as_ref().unwrap(), &alone);
    }
}

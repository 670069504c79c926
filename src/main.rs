use std::fs::File;
use std::io::BufReader;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scn_caption::output::{self, ItemNBest};
use scn_caption::{Captioner, DecodeConfig, Vocabulary};

#[derive(Parser, Debug)]
#[command(author, version, about = "Decode captions with an SCN ensemble", long_about = None)]
struct Args {
    /// Parameter archives are read from `{prefix}{member}.npz`
    #[arg(short, long, default_value = "pretrained_model/coco_result_scn_")]
    params_prefix: String,

    /// Ensemble member ids
    #[arg(short, long, value_delimiter = ',', default_value = "0")]
    members: Vec<usize>,

    /// Image features, one row per item (.npy)
    #[arg(short, long)]
    image_feats: String,

    /// Tag features, one row per item (.npy)
    #[arg(short, long)]
    tag_feats: String,

    /// JSON array of words, index 0 is the end marker
    #[arg(short, long)]
    vocab: String,

    /// JSON array of item ids, defaults to row numbers
    #[arg(long)]
    ids: Option<String>,

    /// JSON decode config; flags below override it
    #[arg(short, long)]
    config: Option<String>,

    #[arg(short, long)]
    beam_size: Option<usize>,

    #[arg(short = 'n', long)]
    max_steps: Option<usize>,

    /// Stop once every hypothesis has ended
    #[arg(long)]
    early_exit: bool,

    /// Recompute every gate pre-activation
    #[arg(long)]
    no_memo: bool,

    #[arg(long, default_value = "coco_nbest.json")]
    nbest_out: String,

    #[arg(long, default_value = "decode_results.json")]
    captions_out: String,
}

impl Args {
    fn decode_config(&self) -> Result<DecodeConfig> {
        let mut config = match &self.config {
            Some(path) => DecodeConfig::from_json_file(path)
                .with_context(|| format!("reading decode config {path}"))?,
            None => DecodeConfig::default(),
        };
        if let Some(beam_size) = self.beam_size {
            config.beam_width = beam_size;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
        config.early_exit |= self.early_exit;
        config.memoize &= !self.no_memo;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.decode_config()?;
    info!(?config, "decode settings");

    #[cfg(feature = "parallel")]
    {
        let cpus = num_cpus::get().max(1);
        info!(cpus, "decoding items in parallel");
        rayon::ThreadPoolBuilder::new()
            .num_threads(cpus)
            .build_global()
            .context("building thread pool")?;
    }

    let captioner = Captioner::from_npz(&args.params_prefix, &args.members, config)
        .context("loading learned params")?;
    let dims = captioner.ensemble().dims();

    let vocab = Vocabulary::from_json_file(&args.vocab, Some(dims.vocab_size))
        .with_context(|| format!("reading vocabulary {}", args.vocab))?;
    let images = scn_caption::loader::load_matrix(&args.image_feats)
        .with_context(|| format!("reading image features {}", args.image_feats))?;
    let tags = scn_caption::loader::load_matrix(&args.tag_feats)
        .with_context(|| format!("reading tag features {}", args.tag_feats))?;

    let ids: Vec<String> = match &args.ids {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening ids {path}"))?;
            let raw: Vec<serde_json::Value> = serde_json::from_reader(BufReader::new(file))?;
            raw.iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        }
        None => (0..images.nrows()).map(|i| i.to_string()).collect(),
    };
    if ids.len() != images.nrows() {
        bail!("{} ids for {} items", ids.len(), images.nrows());
    }

    let results = captioner.caption_batch(images.view(), tags.view())?;

    let mut items: Vec<ItemNBest> = Vec::with_capacity(results.len());
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(nbest) => items.push(output::render(id, &nbest, &vocab)?),
            Err(e) => tracing::error!(id = %id, error = %e, "item failed"),
        }
    }

    output::write_nbest_json(&args.nbest_out, &items)
        .with_context(|| format!("writing {}", args.nbest_out))?;
    let best = output::best_captions(&items);
    info!(path = %args.captions_out, captions = best.len(), "write generated captions");
    output::write_captions_json(&args.captions_out, &best)
        .with_context(|| format!("writing {}", args.captions_out))?;

    Ok(())
}

use anyhow::Result;
use clap::Parser;

use scn_caption::loader;

/// Print the shape of trained SCN parameter sets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "pretrained_model/coco_result_scn_")]
    params_prefix: String,

    #[arg(short, long, value_delimiter = ',', default_value = "0")]
    members: Vec<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let args = Args::parse();
    let sets = loader::load_ensemble(&args.params_prefix, &args.members)?;

    for (member, set) in args.members.iter().zip(&sets) {
        println!("member {member}: {} parameters", set.num_parameters());
        println!("{:#?}", set.dims());
    }
    let dims = loader::common_dims(&sets)?;
    println!("ensemble of {} agrees on {dims:?}", sets.len());

    Ok(())
}

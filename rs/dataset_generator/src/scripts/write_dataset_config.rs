// Script to write a dataset generator config for one of the common benchmark shapes.
use anyhow::Result;
use clap::Parser;
use config::dataset::DatasetConfig;

#[derive(clap::ValueEnum, Clone, Debug, PartialEq)]
enum ProfileArgs {
    /// Tiny dataset for smoke tests.
    Small,
    /// Same shape as the sift-128 benchmark.
    Sift,
    /// Medium dataset with group predicates.
    Predicates,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, default_value_t = ProfileArgs::Small, value_enum)]
    profile: ProfileArgs,

    #[arg(long, default_value_t = String::from("/tmp/dataset_config.yaml"))]
    output_path: String,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            profile: ProfileArgs::Small,
            output_path: String::from("/tmp/dataset_config.yaml"),
        }
    }
}

fn generate_config(args: &Args) -> DatasetConfig {
    let mut config = DatasetConfig::default();
    config.seed = Some(42);
    match args.profile {
        ProfileArgs::Small => {
            config.train_count = 1000;
            config.dimension = 8;
            config.test_count = 10;
        }
        ProfileArgs::Sift => {
            config.train_count = 1_000_000;
            config.dimension = 128;
            config.test_count = 10_000;
        }
        ProfileArgs::Predicates => {
            config.train_count = 100_000;
            config.dimension = 64;
            config.test_count = 1000;
            config.use_predicates = true;
        }
    }
    config.output_path = format!("/tmp/{:?}_d[d]_b[b]_q[q]_k[k].hdf5", args.profile).to_lowercase();
    config
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = generate_config(&args);
    config.write_yaml_file(&args.output_path)?;
    println!("Config written to {}", args.output_path);
    Ok(())
}

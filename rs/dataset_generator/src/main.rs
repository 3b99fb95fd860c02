use anyhow::Result;
use clap::{Parser, Subcommand};
use config::dataset::DatasetConfig;
use dataset_generator::generator::DatasetGenerator;
use dataset_generator::verify::{verify, VerifyOptions};
use log::info;

const MISMATCH_EXIT_CODE: i32 = 2;

#[derive(Parser, Debug, Default, PartialEq)]
struct GenerateArgs {
    /// YAML config to start from. Flags below override its values.
    #[arg(long)]
    config_path: Option<String>,

    #[arg(long)]
    train_count: Option<usize>,

    #[arg(long)]
    dimension: Option<usize>,

    #[arg(long)]
    test_count: Option<usize>,

    /// Output file. Tokens like [d], [b], [q], [k] and [f] in the file name are replaced by the
    /// dataset shape.
    #[arg(long)]
    output_path: Option<String>,

    #[arg(long, default_value_t = false)]
    use_predicates: bool,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    num_neighbors: Option<usize>,

    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl GenerateArgs {
    fn to_config(&self) -> Result<DatasetConfig> {
        let mut config = match &self.config_path {
            Some(path) => DatasetConfig::from_yaml_file(path)?,
            None => DatasetConfig::default(),
        };
        if let Some(train_count) = self.train_count {
            config.train_count = train_count;
        }
        if let Some(dimension) = self.dimension {
            config.dimension = dimension;
        }
        if let Some(test_count) = self.test_count {
            config.test_count = test_count;
        }
        if let Some(output_path) = &self.output_path {
            config.output_path = output_path.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(num_neighbors) = self.num_neighbors {
            config.num_neighbors = num_neighbors;
        }
        config.use_predicates |= self.use_predicates;
        config.overwrite |= self.overwrite;
        Ok(config)
    }
}

#[derive(Parser, Debug, PartialEq)]
struct VerifyArgs {
    #[arg(long, required = true)]
    input_path: String,

    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Exclusive. Defaults to the number of queries.
    #[arg(long)]
    end: Option<usize>,

    #[arg(long, default_value_t = 0.001)]
    phi: f32,

    #[arg(long, default_value_t = false)]
    fail_fast: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    #[clap(name = "generate")]
    Generate(GenerateArgs),

    #[clap(name = "verify")]
    Verify(VerifyArgs),
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

fn generate(args: &GenerateArgs) -> Result<()> {
    let generator = DatasetGenerator::new(args.to_config()?)?;
    let path = generator.run()?;
    println!("Dataset written to {}", path.display());
    Ok(())
}

fn run_verify(args: &VerifyArgs) -> Result<bool> {
    let options = VerifyOptions {
        start: args.start,
        end: args.end,
        phi: args.phi,
        fail_fast: args.fail_fast,
        ..VerifyOptions::default()
    };
    let report = verify(&args.input_path, &options)?;
    if report.is_ok() {
        println!(
            "All {} checked queries in {} are correct",
            report.num_checked, args.input_path
        );
    } else {
        println!(
            "{} of {} checked queries in {} are incorrect: {:?}",
            report.mismatched_queries.len(),
            report.num_checked,
            args.input_path,
            report.mismatched_queries
        );
    }
    Ok(report.is_ok())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    match &args.command {
        Command::Generate(generate_args) => generate(generate_args),
        Command::Verify(verify_args) => {
            if !run_verify(verify_args)? {
                info!("Verification failed");
                std::process::exit(MISMATCH_EXIT_CODE);
            }
            Ok(())
        }
    }
}

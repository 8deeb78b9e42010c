use clap::Parser;
use std::path::PathBuf;

use opgen::emit::{emit_all, Manifest};
use opgen::ops::{FpNegate, IntAdder, IntMultiplier, MultiAdder, SumOfProducts};
use opgen::{GenerationConfig, GenerationContext, Schedulable};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Kind {
    IntAdder,
    MultiAdder,
    IntMultiplier,
    SumOfProducts,
    FpNegate,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    Verilog,
    Timing,
    Manifest,
}

#[derive(Parser, Debug)]
#[command(
    name = "opgen",
    version,
    about = "Pipelined operator generator — schedules arithmetic operators into retimed Verilog"
)]
struct Cli {
    /// Operator kind to generate
    #[arg(value_enum)]
    kind: Kind,

    /// Operand width in bits
    #[arg(long, default_value_t = 32)]
    width: u32,

    /// Number of operands (multi-adder, sum-of-products)
    #[arg(long, default_value_t = 4)]
    count: u32,

    /// Exponent width (fp-negate)
    #[arg(long, default_value_t = 8)]
    we: u32,

    /// Fraction width (fp-negate)
    #[arg(long, default_value_t = 23)]
    wf: u32,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target frequency, overrides the configuration
    #[arg(long)]
    frequency_mhz: Option<f64>,

    /// Never insert implicit pipeline stages
    #[arg(long)]
    not_pipelined: bool,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Verilog)]
    emit: EmitStage,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Print scheduling decisions
    #[arg(long)]
    verbose: bool,
}

fn kind_of(cli: &Cli) -> Box<dyn Schedulable> {
    match cli.kind {
        Kind::IntAdder => Box::new(IntAdder { width: cli.width }),
        Kind::MultiAdder => Box::new(MultiAdder {
            width: cli.width,
            count: cli.count,
        }),
        Kind::IntMultiplier => Box::new(IntMultiplier { width: cli.width }),
        Kind::SumOfProducts => Box::new(SumOfProducts {
            width: cli.width,
            count: cli.count,
        }),
        Kind::FpNegate => Box::new(FpNegate {
            we: cli.we,
            wf: cli.wf,
        }),
    }
}

fn load_config(cli: &Cli) -> Result<GenerationConfig, opgen::config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => GenerationConfig::load(path)?,
        None => GenerationConfig::default(),
    };
    if let Some(f) = cli.frequency_mhz {
        config.frequency_mhz = f;
    }
    if cli.not_pipelined {
        config.pipelined = false;
    }
    config.validate()?;
    Ok(config)
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    for (flag, value) in [
        ("--width", cli.width),
        ("--count", cli.count),
        ("--we", cli.we),
        ("--wf", cli.wf),
    ] {
        if value == 0 {
            eprintln!("opgen: error: {} must be at least 1", flag);
            std::process::exit(2);
        }
    }

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("opgen: error: {}", e);
            std::process::exit(2);
        }
    };
    log::debug!(
        "period {:.3}ns, pipelined = {}",
        config.period_ns(),
        config.pipelined
    );

    // ── Generate ──
    let mut ctx = GenerationContext::new(config);
    let kind = kind_of(&cli);
    if let Err(e) = ctx.generate(kind.as_ref()) {
        eprintln!("opgen: {}", e);
        std::process::exit(1);
    }
    let modules = match emit_all(&ctx) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("opgen: {}", e);
            std::process::exit(1);
        }
    };

    // ── Write ──
    let files: Vec<(String, String)> = match cli.emit {
        EmitStage::Verilog => modules
            .iter()
            .map(|m| (m.file_name.clone(), m.text.clone()))
            .collect(),
        EmitStage::Timing => vec![(
            "timing.mmd".to_string(),
            opgen::timing::emit_timing_chart(&ctx),
        )],
        EmitStage::Manifest => match Manifest::new(&ctx, &modules).to_json() {
            Ok(json) => vec![("manifest.json".to_string(), json)],
            Err(e) => {
                eprintln!("opgen: error: {}", e);
                std::process::exit(2);
            }
        },
    };
    if let Err(e) = std::fs::create_dir_all(&cli.output) {
        eprintln!("opgen: error: {}: {}", cli.output.display(), e);
        std::process::exit(2);
    }
    for (name, text) in files {
        let path = cli.output.join(&name);
        if let Err(e) = std::fs::write(&path, text) {
            eprintln!("opgen: error: {}: {}", path.display(), e);
            std::process::exit(2);
        }
        if cli.verbose {
            eprintln!("opgen: wrote {}", path.display());
        }
    }
}

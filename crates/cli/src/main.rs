use std::path::PathBuf;

use candle_core::Device;
use clap::{Parser, Subcommand};
use seamless_cli::config::CliConfig;
use seamless_cli::demo::{run_decode, run_patch};
use seamless_cli::logging::{self, LogFormat};
use seamless_core::{AxisSeam, SeamReport, TilingMode};

#[derive(Parser)]
#[command(name = "seamless", about = "Seamless tiling patches for convolutional networks")]
struct Cli {
    /// Config file (defaults to ~/.config/seamless-tiling/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the effective settings back to the config file
    #[arg(long, global = true)]
    save_config: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Patch a demo denoiser and run it for a number of steps
    Patch {
        /// First step with circular padding (negative: unbounded)
        #[arg(long, allow_hyphen_values = true)]
        start_step: Option<i64>,

        /// Last step with circular padding (negative: unbounded)
        #[arg(long, allow_hyphen_values = true)]
        stop_step: Option<i64>,

        /// Tile horizontally
        #[arg(long)]
        tile_x: Option<bool>,

        /// Tile vertically
        #[arg(long)]
        tile_y: Option<bool>,

        /// Number of denoising iterations
        #[arg(long)]
        steps: Option<usize>,

        #[command(flatten)]
        size: SizeArgs,
    },
    /// Decode random latents with a circularly padded demo decoder
    Decode {
        /// One of: enable, x_only, y_only, disable
        #[arg(long)]
        tiling: Option<TilingMode>,

        #[command(flatten)]
        size: SizeArgs,
    },
}

#[derive(clap::Args)]
struct SizeArgs {
    /// Latent height
    #[arg(long)]
    height: Option<usize>,

    /// Latent width
    #[arg(long)]
    width: Option<usize>,

    /// Latent channels
    #[arg(long)]
    channels: Option<usize>,
}

impl SizeArgs {
    fn apply_to(&self, config: &mut CliConfig) {
        config.merge(&CliConfig {
            latent_height: self.height,
            latent_width: self.width,
            channels: self.channels,
            ..Default::default()
        });
    }
}

fn print_seams(report: &SeamReport) {
    let row = |name: &str, seam: &AxisSeam| {
        println!(
            "  {name:<10} wrap {:>8.4}  interior {:>8.4}  ratio {:>6.3}",
            seam.wrap,
            seam.interior,
            seam.ratio()
        );
    };
    println!("Seams:");
    row("horizontal", &report.horizontal);
    row("vertical", &report.vertical);
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, LogFormat::from_env())?;

    let config_path = cli.config.clone().or_else(CliConfig::default_path);
    let mut config = match &cli.config {
        Some(path) => CliConfig::load_or_default(path)?,
        None => CliConfig::load(),
    };
    if let Some(path) = &config_path {
        if path.exists() {
            tracing::info!(path = %path.display(), "loaded config");
        }
    }

    match &cli.command {
        Command::Patch {
            start_step,
            stop_step,
            tile_x,
            tile_y,
            steps,
            size,
        } => {
            config.merge(&CliConfig {
                start_step: *start_step,
                stop_step: *stop_step,
                tile_x: *tile_x,
                tile_y: *tile_y,
                steps: *steps,
                ..Default::default()
            });
            size.apply_to(&mut config);
        }
        Command::Decode { tiling, size } => {
            config.merge(&CliConfig {
                tiling: *tiling,
                ..Default::default()
            });
            size.apply_to(&mut config);
        }
    }

    if cli.save_config {
        let path = match &config_path {
            Some(path) => {
                config.save_to(path)?;
                path.clone()
            }
            None => config.save()?,
        };
        tracing::info!(path = %path.display(), "saved config");
    }

    let device = Device::Cpu;
    match cli.command {
        Command::Patch { .. } => {
            let node = config.patch_node();
            let run = run_patch(
                &node,
                config.channels(),
                config.latent_size(),
                config.steps(),
                &device,
            )?;
            let active = run.steps.iter().filter(|s| s.circular).count();
            println!(
                "Patched {} convolution layers, range {}, tile_x={}, tile_y={}",
                run.layers,
                node.step_range(),
                node.tiling_x,
                node.tiling_y
            );
            println!("Circular padding active for {active} of {} steps", run.steps.len());
            print_seams(&run.seams);
        }
        Command::Decode { .. } => {
            let mode = config.tiling_mode();
            let (image, seams) =
                run_decode(mode, config.channels(), config.latent_size(), &device)?;
            println!("Decoded image {:?} with tiling {mode}", image.dims());
            print_seams(&seams);
        }
    }

    Ok(())
}

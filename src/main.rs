//! Toolpath CLI - slice triangle meshes into G-code.
//!
//! Usage:
//!   toolpath-cli slice <input.stl> -o <output.gcode> [options]
//!   toolpath-cli slice <input.stl> --config job.json
//!   toolpath-cli info <input.stl>

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, LevelFilter};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use toolpath::config::JobConfig;
use toolpath::gcode::GCoder;
use toolpath::mesh::Mesh;
use toolpath::pipeline::SliceJob;

/// A fused-filament toolpath generator: triangle meshes in, G-code out
#[derive(Parser, Debug)]
#[command(name = "toolpath-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Slice an STL file and generate G-code
    Slice {
        /// Input STL file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output G-code file (default: input with .gcode extension)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Job configuration file (JSON); command-line options override it
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Layer height in mm
        #[arg(long)]
        layer_height: Option<f64>,

        /// Extrusion width in mm
        #[arg(long)]
        layer_width: Option<f64>,

        /// Number of inset shells
        #[arg(long)]
        shells: Option<usize>,

        /// Infill density (0-100)
        #[arg(long)]
        infill_density: Option<u32>,

        /// Generate support material
        #[arg(long)]
        support: bool,

        /// Use the graph path optimizer instead of greedy
        #[arg(long)]
        graph_optimizer: bool,
    },

    /// Show mesh statistics without slicing
    Info {
        /// Input STL file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Slice {
            input,
            output,
            config,
            layer_height,
            layer_width,
            shells,
            infill_density,
            support,
            graph_optimizer,
        } => {
            let mut job_config = match config {
                Some(path) => JobConfig::from_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => JobConfig::default(),
            };
            if let Some(h) = layer_height {
                job_config.layer_h = h;
            }
            if let Some(w) = layer_width {
                job_config.layer_w = w;
            }
            if let Some(n) = shells {
                job_config.n_shells = n;
            }
            if let Some(d) = infill_density {
                job_config.infill_density = f64::from(d.min(100)) / 100.0;
            }
            if support {
                job_config.do_support = true;
            }
            if graph_optimizer {
                job_config.do_graph_optimization = true;
            }
            job_config
                .validate()
                .map_err(anyhow::Error::from)
                .context("invalid configuration")?;

            let output = output.unwrap_or_else(|| input.with_extension("gcode"));
            slice(&input, &output, job_config)
        }
        Commands::Info { input } => show_info(&input),
    }
}

fn slice(input: &PathBuf, output: &PathBuf, config: JobConfig) -> Result<()> {
    let progress = ProgressBar::new(3);
    progress.set_style(
        ProgressStyle::with_template("[{bar:30}] {pos}/{len} {msg}")
            .expect("static template")
            .progress_chars("=> "),
    );

    progress.set_message(format!("loading {}", input.display()));
    let mesh =
        Mesh::from_stl(input).with_context(|| format!("loading mesh {}", input.display()))?;
    info!("{} triangles", mesh.len());
    progress.inc(1);

    progress.set_message("slicing");
    let job = SliceJob::new(config.clone());
    let layerpaths = job.generate(&mesh).context("slicing failed")?;
    info!("{} layers", layerpaths.len());
    progress.inc(1);

    progress.set_message(format!("writing {}", output.display()));
    let file =
        File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let title = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());
    let mut gcoder = GCoder::new(config).map_err(anyhow::Error::from)?;
    gcoder
        .write_gcode_file(&layerpaths, &mut writer, &title)
        .context("gcode emission failed")?;
    progress.inc(1);
    progress.finish_with_message(format!(
        "{} layers -> {}",
        layerpaths.len(),
        output.display()
    ));
    Ok(())
}

fn show_info(input: &PathBuf) -> Result<()> {
    let mesh =
        Mesh::from_stl(input).with_context(|| format!("loading mesh {}", input.display()))?;
    let limits = mesh.limits();
    println!("{}", input.display());
    println!("  triangles: {}", mesh.len());
    println!(
        "  bounds: x {:.3}..{:.3}  y {:.3}..{:.3}  z {:.3}..{:.3}",
        limits.x_min, limits.x_max, limits.y_min, limits.y_max, limits.z_min, limits.z_max
    );
    let default_h = JobConfig::default().layer_h;
    println!(
        "  layers at {:.2}mm: {}",
        default_h,
        (limits.z_span() / default_h).ceil() as usize
    );
    Ok(())
}

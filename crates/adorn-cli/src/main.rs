use adorn_batch::Config;
use adorn_core::{CoordinateResolver, ImageSize};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "adorn", about = "Decorate avatar portraits with facial accessories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place accessories on every avatar in a file or directory
    Accessorise {
        /// Avatar image, or a directory of png/jpg images
        #[arg(short, long)]
        input: PathBuf,
        /// Directory of detector JSON files named after each image
        #[arg(short, long)]
        face_data: PathBuf,
        /// Remove the probability checks
        #[arg(long)]
        all_options: bool,
        /// Mark landmarks and skin-scan areas on the output
        #[arg(long)]
        indicate: bool,
        /// Output root (a timestamped run directory is created inside)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seed for reproducible placements
        #[arg(long)]
        seed: Option<u64>,
        /// Catalog TOML to use instead of the built-in one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Print the effective accessory catalog
    Catalog {
        /// Catalog TOML to use instead of the built-in one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Print the resolved anchor of every region for one face
    Regions {
        /// Detector JSON file
        #[arg(short, long)]
        face_data: PathBuf,
        /// Avatar image; enables mouth refinement and supplies the size
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long, default_value_t = 720)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Accessorise {
            input,
            face_data,
            all_options,
            indicate,
            output,
            seed,
            catalog,
        } => {
            config.force_all |= all_options;
            config.indicate |= indicate;
            if let Some(output) = output {
                config.output_root = output;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            if catalog.is_some() {
                config.catalog_path = catalog;
            }

            let summary = adorn_batch::accessorise(&config, &input, &face_data).await?;
            let report = &summary.report;
            for (id, reason) in &report.failures {
                eprintln!("[{id}] could not process image: {reason}");
            }
            println!(
                "Processed {}/{} images, {} accessories added",
                report.succeeded.len(),
                report.count,
                report.accessories_added()
            );
            println!("Output: {}", summary.run_dir.display());
            println!("Report: {}", summary.info_path.display());
            if report.succeeded.is_empty() && report.count > 0 {
                bail!("every image failed");
            }
        }
        Commands::Catalog { catalog } => {
            let path = catalog.or(config.catalog_path);
            let catalog = adorn_io::load_catalog(path.as_deref(), &config.asset_dir)?;
            for acc in catalog.accessories() {
                let regions: Vec<&str> = acc.regions.iter().map(|r| r.as_str()).collect();
                println!(
                    "{:<20} {:?} p={:<6} elevation={:<3} {:?} skin-check={} [{}]",
                    acc.name,
                    acc.category,
                    acc.probability,
                    acc.elevation,
                    acc.direction,
                    !acc.skip_skin_check,
                    regions.join(", ")
                );
            }
            println!("{} accessories", catalog.len());
        }
        Commands::Regions {
            face_data,
            image,
            width,
            height,
        } => {
            let face = adorn_io::read_face(&face_data)?;
            let pixels = match &image {
                Some(path) => Some(adorn_io::load_image(path)?),
                None => None,
            };
            let size = match &pixels {
                Some(img) => ImageSize::new(img.width(), img.height()),
                None => ImageSize::new(width, height),
            };

            let mut resolver = CoordinateResolver::new(size, &face.landmarks);
            if let Some(img) = &pixels {
                resolver = resolver.with_sampler(img);
            }
            let points = resolver
                .resolve_all()
                .with_context(|| format!("resolving regions for {}", face_data.display()))?;

            let json: serde_json::Map<String, serde_json::Value> = points
                .values()
                .map(|p| (p.region.to_string(), serde_json::json!({ "x": p.x, "y": p.y })))
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use dominant_color_wasm::{
    ColorPalette, DEFAULT_COLOR_COUNT, DominantColor, ExtractorConfig, ScoredClusters,
};
use rand::{SeedableRng, rngs::StdRng};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Extract primary, secondary and palette colors from images.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// One or more input image paths
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Number of colors to extract (at least 2: primary and secondary)
    #[arg(short = 'k', long, default_value_t = DEFAULT_COLOR_COUNT)]
    colors: usize,

    /// Seed for k-means++ initialization
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// JSON configuration file (missing keys keep their defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Also print the score of every cluster
    #[arg(long)]
    explain: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dominant_color_wasm=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ExtractorConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ExtractorConfig::default(),
    };
    let extractor = DominantColor::new(config)?;

    for input in &args.inputs {
        let img = image::open(input).with_context(|| format!("opening {}", input.display()))?;

        let mut rng = StdRng::seed_from_u64(args.seed);
        let scored = extractor
            .score(&img, args.colors, &mut rng)
            .with_context(|| format!("extracting colors from {}", input.display()))?;
        let palette = dominant_color_wasm::output::build_palette(&scored);

        if args.json {
            let mut value = serde_json::json!({
                "input": input.display().to_string(),
                "result": palette,
            });
            if args.explain {
                value["clusters"] = serde_json::to_value(&scored)?;
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{}", input.display());
            print_palette(&palette);
            if args.explain {
                print_clusters(&scored);
            }
        }
    }

    Ok(())
}

fn print_palette(palette: &ColorPalette) {
    println!("  primary    #{} {:.3}", palette.primary.hex(), palette.primary.score());
    match &palette.secondary {
        Some(color) => println!("  secondary  #{} {:.3}", color.hex(), color.score()),
        None => println!("  secondary  (single color image)"),
    }
    for color in &palette.palette {
        println!("  palette    #{} {:.3}", color.hex(), color.score());
    }
}

fn print_clusters(scored: &ScoredClusters) {
    println!("  cluster  color    points  p_score  s_score      S      V");
    for s in &scored.scores {
        println!(
            "  {:>7}  #{}  {:>6}  {:>7.3}  {:>7.3}  {:.3}  {:.3}",
            s.cluster,
            dominant_color_wasm::output::hex(s.rgb),
            s.count,
            s.primary_score,
            s.secondary_score,
            s.saturation,
            s.value
        );
    }
}

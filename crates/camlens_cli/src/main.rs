//! camlens CLI: Grad-CAM overlays and captions for image classifiers.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use camlens_caption::{select_captioner, CaptionConfig, Captioner, TemplateCaptioner};
use camlens_core::Hooked;
use camlens_explain::{composite, GradCam};
use camlens_models::{
    load_classifier, load_image, pathology_labels, predict, top_k, CheckpointMetadata,
    ConvClassifier, ConvClassifierConfig, Preprocessor,
};
use image::DynamicImage;

/// Backend for explanation: CPU with gradient tracking.
type ExplainBackend = Autodiff<NdArray>;

#[derive(Parser)]
#[command(name = "camlens")]
#[command(author, version)]
#[command(about = "Grad-CAM visual explanations with plain-language captions")]
#[command(long_about = "camlens: where did the classifier look?

EXAMPLES:
  # Explain the top prediction for an X-ray with a trained checkpoint
  camlens explain --image chest.png --checkpoint weights/chest

  # Explain class 8 (Pneumonia) on a specific layer, offline captions only
  camlens explain --image chest.png --checkpoint weights/chest --class 8 \\
      --layer features.block2 --offline

  # List the observable layers of a checkpoint
  camlens layers --checkpoint weights/chest

  # Caption raw predictions
  camlens caption --predictions 0.9,0.3 --labels Pneumonia,Edema")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain a prediction with a Grad-CAM overlay and a caption
    Explain {
        /// Input image (PNG or JPEG)
        #[arg(long, value_name = "PATH")]
        image: PathBuf,

        /// Checkpoint stem (`<stem>.mpk` + `<stem>.json`)
        #[arg(long, value_name = "PATH")]
        checkpoint: Option<PathBuf>,

        /// Target layer (defaults to the last convolutional block)
        #[arg(long, value_name = "NAME")]
        layer: Option<String>,

        /// Class index to explain (defaults to the top prediction)
        #[arg(long = "class", value_name = "INDEX")]
        class_idx: Option<usize>,

        /// Output PNG for the overlay
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// JSON explain configuration
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Use template captions without probing the caption service
        #[arg(long, default_value = "false")]
        offline: bool,

        /// Seed for random weights when no checkpoint is given
        #[arg(long, default_value = "42", value_name = "SEED")]
        seed: u64,
    },
    /// List the observable layers of a classifier
    Layers {
        /// Checkpoint stem (defaults to the built-in architecture)
        #[arg(long, value_name = "PATH")]
        checkpoint: Option<PathBuf>,
    },
    /// Caption raw per-label confidences
    Caption {
        /// Comma-separated confidences
        #[arg(long, value_delimiter = ',', required = true, value_name = "P1,P2,..")]
        predictions: Vec<f32>,

        /// Comma-separated labels (defaults to the pathology labels)
        #[arg(long, value_delimiter = ',', value_name = "L1,L2,..")]
        labels: Vec<String>,

        /// JSON explain configuration (its caption section is used)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Use template captions without probing the caption service
        #[arg(long, default_value = "false")]
        offline: bool,
    },
}

/// Settings for `camlens explain`, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ExplainConfig {
    /// Target layer; the architecture's last block when unset.
    layer: Option<String>,
    /// Overlay output path.
    output: PathBuf,
    /// Number of findings to print.
    top_k: usize,
    /// Caption service settings.
    caption: CaptionConfig,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            layer: None,
            output: PathBuf::from("gradcam_overlay.png"),
            top_k: 3,
            caption: CaptionConfig::default(),
        }
    }
}

impl ExplainConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Explain {
            image,
            checkpoint,
            layer,
            class_idx,
            output,
            config,
            offline,
            seed,
        } => {
            let mut explain = ExplainConfig::load(config.as_deref())?;
            if layer.is_some() {
                explain.layer = layer;
            }
            if let Some(output) = output {
                explain.output = output;
            }
            handle_explain(&image, checkpoint.as_deref(), class_idx, &explain, offline, seed)
        }
        Commands::Layers { checkpoint } => handle_layers(checkpoint.as_deref()),
        Commands::Caption {
            predictions,
            labels,
            config,
            offline,
        } => {
            let explain = ExplainConfig::load(config.as_deref())?;
            handle_caption(&predictions, labels, &explain.caption, offline)
        }
    }
}

/// Load a checkpoint, or build a seeded random classifier when none is given.
fn load_model(
    checkpoint: Option<&Path>,
    seed: u64,
    device: &<ExplainBackend as Backend>::Device,
) -> Result<(ConvClassifier<ExplainBackend>, CheckpointMetadata)> {
    match checkpoint {
        Some(path) => load_classifier::<ExplainBackend>(path, device)
            .with_context(|| format!("Failed to load checkpoint {}", path.display())),
        None => {
            tracing::warn!(
                seed,
                "no checkpoint given, explaining a randomly initialized classifier"
            );
            ExplainBackend::seed(seed);
            let config = ConvClassifierConfig::default();
            Ok((config.init(device), CheckpointMetadata::new(config)))
        }
    }
}

fn make_captioner(config: &CaptionConfig, offline: bool) -> Box<dyn Captioner> {
    if offline {
        Box::new(TemplateCaptioner::from_config(config))
    } else {
        select_captioner(config)
    }
}

fn handle_explain(
    image_path: &Path,
    checkpoint: Option<&Path>,
    class_idx: Option<usize>,
    config: &ExplainConfig,
    offline: bool,
    seed: u64,
) -> Result<()> {
    println!("=== camlens Grad-CAM ===\n");

    let device = <ExplainBackend as Backend>::Device::default();
    let (model, metadata) = load_model(checkpoint, seed, &device)?;

    let image = load_image(image_path)
        .with_context(|| format!("Failed to load image {}", image_path.display()))?;
    let image = if image.color().has_alpha() {
        tracing::debug!("flattening alpha channel before compositing");
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image
    };
    let input = Preprocessor::from_config(&metadata.config)?
        .tensor::<ExplainBackend>(&image, &device);

    let mut model = Hooked::new(model);
    let probabilities = predict(&mut model, input.clone())?;

    let class_idx = match class_idx {
        Some(idx) => idx,
        None => top_k(&probabilities, 1)
            .first()
            .map(|(idx, _)| *idx)
            .context("Model produced no scores")?,
    };
    if class_idx >= metadata.labels.len() {
        bail!(
            "Class index {} out of range for {} classes",
            class_idx,
            metadata.labels.len()
        );
    }

    let layer = config
        .layer
        .clone()
        .unwrap_or_else(|| metadata.config.target_layer());
    println!("Image:  {}", image_path.display());
    println!("Layer:  {}", layer);
    println!(
        "Class:  {} ({}, confidence {:.2})",
        class_idx, metadata.labels[class_idx], probabilities[class_idx]
    );

    let mut cam = GradCam::new(model, &layer)?;
    cam.set_input(input);
    let map = cam.generate(class_idx)?;
    tracing::info!(
        height = map.height(),
        width = map.width(),
        mean = map.mean(),
        "saliency map computed"
    );

    let overlay = composite(&image, &map)?;
    if let Some(parent) = config.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    overlay
        .save(&config.output)
        .with_context(|| format!("Failed to write overlay {}", config.output.display()))?;
    println!("Overlay: {}\n", config.output.display());

    println!("Top findings:");
    for (idx, p) in top_k(&probabilities, config.top_k) {
        println!("  {:<28} {:.3}", metadata.labels[idx], p);
    }
    println!();

    let captioner = make_captioner(&config.caption, offline);
    let caption = captioner.caption(&probabilities, &metadata.labels)?;
    println!("Caption ({}):\n{}", captioner.name(), caption);

    Ok(())
}

fn handle_layers(checkpoint: Option<&Path>) -> Result<()> {
    let device = <ExplainBackend as Backend>::Device::default();
    let (model, metadata) = load_model(checkpoint, 0, &device)?;
    let config = &metadata.config;

    println!("Observable layers ({}):", metadata.arch);
    let names = camlens_core::TappedModule::layer_names(&model);
    for (i, name) in names.iter().enumerate() {
        let side = config.input_size >> i;
        let marker = if *name == config.target_layer() {
            "  [default target]"
        } else {
            ""
        };
        println!(
            "  {:<20} ({}, {}, {}){}",
            name, config.block_channels[i], side, side, marker
        );
    }
    Ok(())
}

fn handle_caption(
    predictions: &[f32],
    labels: Vec<String>,
    config: &CaptionConfig,
    offline: bool,
) -> Result<()> {
    let labels = if labels.is_empty() {
        pathology_labels()
    } else {
        labels
    };

    let captioner = make_captioner(config, offline);
    let caption = captioner.caption(predictions, &labels)?;
    println!("{}", caption);
    Ok(())
}

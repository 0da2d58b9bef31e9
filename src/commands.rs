//! Subcommand implementations: dataset check, training, evaluation.

use crate::config::RunConfig;
use anyhow::{bail, Context};
use ndarray::Array2;
use patchx_backbone::ConvBackbone;
use patchx_core::{ModelArtifact, PatchCore};
use patchx_data::{
    index_test_split, list_categories, load_image, load_mask, pixel_auroc, resolve_root, roc_auc,
    save_triptych, train_good_images, upsample_bilinear, validate_root, MetricsReport,
};
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;
use tracing::info;

fn data_root(config: &RunConfig) -> PathBuf {
    resolve_root(config.data_root.as_deref())
}

/// Validate the dataset layout and list usable categories
pub fn download(config: &RunConfig) -> anyhow::Result<()> {
    let root = data_root(config);
    validate_root(&root)?;
    let categories = list_categories(&root)?;
    info!(root = %root.display(), categories = categories.len(), "dataset layout ok");
    for category in &categories {
        println!("{category}");
    }
    Ok(())
}

/// Fit a model for one category and persist the artifact
pub fn train(config: &RunConfig, category: &str) -> anyhow::Result<()> {
    let root = data_root(config);
    let image_paths = train_good_images(&root, category)?;
    if image_paths.is_empty() {
        bail!(
            "no training images under {}/{category}/train/good",
            root.display()
        );
    }
    info!(
        category,
        images = image_paths.len(),
        backbone = %config.backbone,
        "loading training split"
    );

    let mut images = Vec::with_capacity(image_paths.len());
    for path in &image_paths {
        images.push(load_image(path, config.image_size)?);
    }

    let backbone = ConvBackbone::from_id(&config.backbone)?;
    let mut model = PatchCore::new(backbone, config.image_size, config.nn_k);
    let mut rng = StdRng::seed_from_u64(config.seed);
    model.fit_from_images(&images, config.max_patches, &mut rng)?;

    let path = config.model_path(category);
    model.save(&path)?;
    println!("saved {}", path.display());
    Ok(())
}

/// Load a fitted model, score the full test split, write metrics and the
/// top-N anomaly gallery
pub fn eval(config: &RunConfig, category: &str) -> anyhow::Result<()> {
    let root = data_root(config);
    let model_path = config.model_path(category);
    let artifact = ModelArtifact::read(&model_path)?;
    let backbone = ConvBackbone::from_id(&artifact.backbone)?;
    let model = PatchCore::from_artifact(artifact, backbone)?;
    let size = model.image_size();

    let samples = index_test_split(&root, category)?;
    if samples.is_empty() {
        bail!("empty test split for category '{category}'");
    }
    info!(category, samples = samples.len(), "scoring test split");

    let mut labels = Vec::with_capacity(samples.len());
    let mut scores = Vec::with_capacity(samples.len());
    let mut masks = Vec::with_capacity(samples.len());
    let mut heatmaps = Vec::with_capacity(samples.len());
    for sample in &samples {
        let image = load_image(&sample.image_path, size)?;
        let (score, map) = model.score(&image)?;
        let mask = match &sample.mask_path {
            Some(path) => load_mask(path, size)?,
            None => Array2::zeros((size as usize, size as usize)),
        };
        labels.push(u8::from(sample.label));
        scores.push(score);
        heatmaps.push(upsample_bilinear(&map, size as usize));
        masks.push(mask);
    }

    let n_anomalous = labels.iter().filter(|&&l| l > 0).count();
    let report = MetricsReport {
        category: category.to_string(),
        backbone: model.backbone_id().to_string(),
        image_size: size,
        n_test: samples.len(),
        n_anomalous,
        image_auroc: roc_auc(&labels, &scores),
        pixel_auroc: pixel_auroc(&masks, &heatmaps),
    };
    let metrics_path = config.metrics_path(category);
    report.write_json(&metrics_path)?;
    info!(
        image_auroc = ?report.image_auroc,
        pixel_auroc = ?report.pixel_auroc,
        "metrics written"
    );

    // gallery: the top-N highest-scoring samples
    let mut ranked: Vec<usize> = (0..samples.len()).collect();
    ranked.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let gallery = config.gallery_dir(category);
    for (rank, &i) in ranked.iter().take(config.top_n).enumerate() {
        let image = load_image(&samples[i].image_path, size)?;
        let name = format!(
            "{rank:02}_{}_{:.4}.png",
            samples[i].defect_type, scores[i]
        );
        save_triptych(&gallery.join(name), &image, &heatmaps[i], &masks[i])
            .with_context(|| format!("failed to render gallery entry {rank}"))?;
    }

    println!("wrote {}", metrics_path.display());
    Ok(())
}

//! Job runner: ties together geometry, materials, output and the worker pool.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};

use gray_compute::{run_session, ComputeBackend, CpuBackend, EngineFactory, SessionReport};
use gray_core::sink::CsvSink;
use gray_core::source::PrimarySource;
use gray_core::transport::{ReplayTransport, TransportEngine};
use gray_core::{RunAggregator, RunContext};
use gray_geometry::units::{DEG, MM3_PER_CM3};
use gray_geometry::{presets, GeometryBuilder, GeometryModel, Transform, VolumeSpec};
use gray_materials::{MaterialDatabase, NistDatabase};

use crate::config::{GeometryConfig, JobConfig};

/// Build the material table: NIST plus the job's custom materials.
pub fn build_materials(job: &JobConfig) -> Result<NistDatabase> {
    job.materials
        .iter()
        .try_fold(NistDatabase::new(), |db, m| db.with_material(&m.name, m.density))
        .context("Invalid custom material")
}

/// Build and validate the geometry described by the job.
pub fn build_geometry(config: &GeometryConfig) -> Result<GeometryModel> {
    let builder = match &config.preset {
        Some(name) => presets::by_name(name).ok_or_else(|| {
            anyhow!(
                "Unknown geometry preset '{}' (available: {})",
                name,
                presets::PRESETS.join(", ")
            )
        })?,
        None => config.volumes.iter().fold(GeometryBuilder::new(), |builder, v| {
            let rotation = [v.rotation[0] * DEG, v.rotation[1] * DEG, v.rotation[2] * DEG];
            let mut spec = VolumeSpec::new(&v.name, v.shape.clone(), &v.material)
                .with_placement(Transform::placement(rotation, v.position));
            if let Some(parent) = &v.parent {
                spec = spec.inside(parent);
            }
            builder.volume(spec)
        }),
    };
    builder
        .check_overlaps(config.check_overlaps)
        .build()
        .context("Geometry construction failed")
}

/// Check that every volume's material resolves, so a bad name fails before
/// any event is processed.
pub fn check_materials(model: &GeometryModel, materials: &dyn MaterialDatabase) -> Result<()> {
    for (id, volume) in model.iter() {
        model
            .mass(id, materials)
            .with_context(|| format!("Volume '{}'", volume.name()))?;
    }
    Ok(())
}

fn build_engines(job: &JobConfig) -> Result<Box<EngineFactory>> {
    let replay = match &job.run.deposits_file {
        Some(path) => ReplayTransport::from_csv(path)?,
        None => ReplayTransport::from_deposits(&job.run.deposits)?,
    };
    log::info!("Replaying {} recorded event(s)", replay.len());
    Ok(Box::new(move |_worker: usize| {
        Box::new(replay.clone()) as Box<dyn TransportEngine>
    }))
}

/// Run a full scoring job from a parsed configuration.
pub fn run_job(job: &JobConfig, output_dir: &Path) -> Result<SessionReport> {
    let materials = build_materials(job)?;
    let geometry = build_geometry(&job.geometry)?;
    check_materials(&geometry, &materials)?;
    println!(
        "Geometry: {} volumes, scoring volume '{}'",
        geometry.len(),
        job.run.scoring_volume
    );

    let source = job.source.clone().place_in_envelope(&geometry);
    let sink = CsvSink::new(output_dir).with_json_summary(job.output.save_json);
    let context = RunContext::new(
        Arc::new(geometry),
        Arc::new(materials),
        Arc::new(Mutex::new(sink)),
    )
    .with_scoring_volume(&job.run.scoring_volume)
    .context("Scoring volume not found in geometry")?;

    let mut aggregator =
        RunAggregator::new(context, &job.output.file_name).with_run_condition(source.describe());
    let backend = match job.run.threads {
        0 => CpuBackend::new(),
        n => CpuBackend::with_threads(n),
    };
    println!("Backend: {}", backend.device_info().name);

    let engines = build_engines(job)?;
    let cancel = AtomicBool::new(false);
    let report = run_session(
        &mut aggregator,
        &backend,
        &source,
        engines.as_ref(),
        job.run.events,
        &cancel,
    )?;
    Ok(report)
}

/// Print the volume tree with shapes, materials and masses.
pub fn print_geometry(model: &GeometryModel, materials: &dyn MaterialDatabase) {
    for (depth, id) in model.walk() {
        let volume = model.volume(id);
        let mass = model
            .mass(id, materials)
            .map(|m| format!("{:.4} g", m))
            .unwrap_or_else(|e| format!("? ({e})"));
        println!(
            "{:indent$}{} [{}] {}  volume = {:.4} cm³  mass = {}",
            "",
            volume.name(),
            volume.material(),
            volume.shape(),
            volume.shape().volume() / MM3_PER_CM3,
            mass,
            indent = depth * 2
        );
    }
}

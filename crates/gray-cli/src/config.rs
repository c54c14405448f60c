//! TOML configuration deserialisation for scoring jobs.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use gray_core::source::ParticleGun;
use gray_geometry::Shape;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub run: RunConfig,
    #[serde(default)]
    pub source: ParticleGun,
    #[serde(default)]
    pub geometry: GeometryConfig,
    /// Materials added to (or overriding) the built-in NIST table.
    #[serde(default, rename = "material")]
    pub materials: Vec<MaterialConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Run parameters from TOML.
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub events: u64,
    /// Worker threads; 0 uses every available core.
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "default_scoring_volume")]
    pub scoring_volume: String,
    /// Per-event deposits (MeV) replayed in place of a physics engine.
    #[serde(default)]
    pub deposits: Vec<f64>,
    /// CSV table of per-event step deposits, relative to the job file.
    #[serde(default)]
    pub deposits_file: Option<PathBuf>,
}

fn default_scoring_volume() -> String {
    gray_geometry::presets::DETECTOR.into()
}

/// Geometry: a named preset or an explicit volume list.
#[derive(Debug, Deserialize)]
pub struct GeometryConfig {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default, rename = "volume")]
    pub volumes: Vec<VolumeConfig>,
    #[serde(default = "default_true")]
    pub check_overlaps: bool,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            preset: Some("germanium-detector".into()),
            volumes: Vec::new(),
            check_overlaps: true,
        }
    }
}

/// A single placed volume.
#[derive(Debug, Deserialize)]
pub struct VolumeConfig {
    pub name: String,
    /// Mother volume; omitted for the world.
    #[serde(default)]
    pub parent: Option<String>,
    pub material: String,
    /// Shape in mm and radians, tagged by `type`.
    pub shape: Shape,
    /// Position in the parent frame (mm).
    #[serde(default)]
    pub position: [f64; 3],
    /// Euler angles about x, y, z (degrees).
    #[serde(default)]
    pub rotation: [f64; 3],
}

#[derive(Debug, Deserialize)]
pub struct MaterialConfig {
    pub name: String,
    /// Density (g/cm³).
    pub density: f64,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Base name of the output files (default: "B4.csv").
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Whether to save the run summary as JSON (default: true).
    #[serde(default = "default_true")]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            file_name: default_file_name(),
            save_json: true,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_file_name() -> String {
    "B4.csv".into()
}
fn default_true() -> bool {
    true
}

impl JobConfig {
    fn check(&self) -> anyhow::Result<()> {
        if self.geometry.preset.is_some() && !self.geometry.volumes.is_empty() {
            bail!("geometry: give either 'preset' or [[geometry.volume]] entries, not both");
        }
        if self.geometry.preset.is_none() && self.geometry.volumes.is_empty() {
            bail!("geometry: no preset and no volumes");
        }
        if self.run.deposits.is_empty() && self.run.deposits_file.is_none() {
            bail!("run: no deposits to replay; set 'deposits' or 'deposits_file'");
        }
        Ok(())
    }
}

/// Load and parse a TOML job configuration file.
///
/// A relative `deposits_file` is resolved against the job file's directory.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut config = parse_config(&content)
        .with_context(|| format!("Invalid job file {}", path.display()))?;
    if let (Some(file), Some(dir)) = (&config.run.deposits_file, path.parent()) {
        if file.is_relative() {
            config.run.deposits_file = Some(dir.join(file));
        }
    }
    Ok(config)
}

pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    config.check()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_job_uses_preset() {
        let job = parse_config("[run]\nevents = 4\ndeposits = [1.0, 2.0, 1.5, 0.5]\n").unwrap();
        assert_eq!(job.run.events, 4);
        assert_eq!(job.run.scoring_volume, "Detector");
        assert_eq!(job.geometry.preset.as_deref(), Some("germanium-detector"));
        assert_eq!(job.source.particle, "gamma");
        assert_eq!(job.output.file_name, "B4.csv");
    }

    #[test]
    fn test_explicit_volumes() {
        let job = parse_config(
            r#"
            [run]
            events = 10
            deposits = [0.1]
            scoring_volume = "Target"

            [geometry]
            [[geometry.volume]]
            name = "World"
            material = "G4_AIR"
            shape = { type = "box", dx = 100.0, dy = 100.0, dz = 100.0 }

            [[geometry.volume]]
            name = "Target"
            parent = "World"
            material = "G4_WATER"
            shape = { type = "sphere", rmax = 20.0 }
            position = [0.0, 0.0, 10.0]
            rotation = [0.0, 90.0, 0.0]

            [[material]]
            name = "Scintillator"
            density = 1.032
            "#,
        )
        .unwrap();
        assert!(job.geometry.preset.is_none());
        assert_eq!(job.geometry.volumes.len(), 2);
        assert_eq!(job.geometry.volumes[1].parent.as_deref(), Some("World"));
        assert!(matches!(job.geometry.volumes[1].shape, Shape::Sphere(_)));
        assert_eq!(job.materials[0].name, "Scintillator");
    }

    #[test]
    fn test_rejects_missing_deposits() {
        assert!(parse_config("[run]\nevents = 4\n").is_err());
    }

    #[test]
    fn test_rejects_preset_and_volumes() {
        let err = parse_config(
            r#"
            [run]
            events = 1
            deposits = [1.0]
            [geometry]
            preset = "germanium-detector"
            [[geometry.volume]]
            name = "World"
            material = "G4_AIR"
            shape = { type = "box", dx = 1.0, dy = 1.0, dz = 1.0 }
            "#,
        );
        assert!(err.is_err());
    }
}

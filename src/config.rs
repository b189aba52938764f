//! Configuration management for Piranesi

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PiranesiError, Result};
use crate::geometry::Point;
use crate::quad::Quad;
use crate::resample::DEFAULT_GRID_SIZE;
use crate::transform::SolverTunables;

/// Output canvas size in pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 1600,
        }
    }
}

/// Target quadrilateral in destination pixel coordinates
/// Edges run a→b→c→d→a; the usual layout is bottom-left, bottom-right,
/// top-right, top-left
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CornersConfig {
    pub a: Point,
    pub b: Point,
    pub c: Point,
    pub d: Point,
}

impl Default for CornersConfig {
    fn default() -> Self {
        let quad = Quad::default();
        Self {
            a: quad.a,
            b: quad.b,
            c: quad.c,
            d: quad.d,
        }
    }
}

/// Sampling grid configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridConfig {
    /// Cells per axis; the inverse solver runs on (size + 1)^2 nodes
    pub size: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_GRID_SIZE,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub canvas: CanvasConfig,

    #[serde(default)]
    pub corners: CornersConfig,

    #[serde(default)]
    pub solver: SolverTunables,

    #[serde(default)]
    pub grid: GridConfig,
}

impl Config {
    /// The configured corners as a quadrilateral
    pub fn quad(&self) -> Quad {
        Quad::new(self.corners.a, self.corners.b, self.corners.c, self.corners.d)
    }

    /// Check everything that would otherwise fail halfway through a warp
    pub fn validate(&self) -> Result<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(PiranesiError::InvalidCanvas {
                width: self.canvas.width,
                height: self.canvas.height,
            });
        }
        if self.grid.size == 0 {
            return Err(PiranesiError::InvalidGrid);
        }
        self.quad().validate()?;
        self.solver.validate()
    }

    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration from a file, or create default if it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            config.save(path)?;
            tracing::info!("Created default configuration at {:?}", path);
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content)?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.canvas.width, 1600);
        assert_eq!(config.canvas.height, 1600);
        assert_eq!(config.grid.size, 64);
        assert_eq!(config.solver.max_iterations, 11);
        assert_eq!(config.corners.a, Point::new(80.0, 990.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [canvas]
            width = 800
            height = 600

            [solver]
            damping = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.canvas.width, 800);
        assert_eq!(config.solver.damping, 1.0);
        assert_eq!(config.solver.step, 0.001);
        assert_eq!(config.corners, CornersConfig::default());
        assert_eq!(config.grid.size, 64);
    }

    #[test]
    fn test_corners_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [corners]
            a = { x = 0.0, y = 100.0 }
            b = { x = 100.0, y = 100.0 }
            c = { x = 100.0, y = 0.0 }
            d = { x = 0.0, y = 0.0 }
            "#,
        )
        .unwrap();
        assert_eq!(config.quad().c, Point::new(100.0, 0.0));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.canvas.height = 0;
        assert!(matches!(config.validate(), Err(PiranesiError::InvalidCanvas { .. })));

        let mut config = Config::default();
        config.grid.size = 0;
        assert!(matches!(config.validate(), Err(PiranesiError::InvalidGrid)));

        let mut config = Config::default();
        config.corners.b = config.corners.a;
        config.corners.c = config.corners.a;
        assert!(matches!(config.validate(), Err(PiranesiError::DegenerateQuad { .. })));

        let mut config = Config::default();
        config.solver.damping = 0.0;
        assert!(matches!(config.validate(), Err(PiranesiError::InvalidTunable { .. })));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("piranesi.toml");

        let mut config = Config::default();
        config.canvas.width = 1024;
        config.corners.d = Point::new(12.5, 480.0);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("piranesi.toml");
        assert!(!path.exists());

        let config = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, Config::default());
        assert_eq!(Config::load_or_create(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[canvas]\nwidth = 0\nheight = 10\n").unwrap();
        assert!(matches!(Config::load(&path), Err(PiranesiError::InvalidCanvas { .. })));

        std::fs::write(&path, "[canvas\n").unwrap();
        assert!(matches!(Config::load(&path), Err(PiranesiError::ConfigParse(_))));
    }
}

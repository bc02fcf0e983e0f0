//! Settings for the sphere output
//!
//! Handles loading/saving of the tuning parameters exposed to the host
//! (render mode, field of view, Z, lens correction, sphere resolution) as XML.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default sphere resolution: the display draws 1050x1050, so the canvas is 2100x1050
pub const DEFAULT_SPHERE_RESOLUTION: u32 = 1050;

/// Lens distortion correction coefficients passed to the spherize program
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LensCorrection {
    /// Linear term (0.8 - 1.5)
    #[serde(rename = "a")]
    pub a: f32,
    /// Quadratic term (0.0012 - 0.1212)
    #[serde(rename = "b")]
    pub b: f32,
    /// Cubic term (0.15 - 0.44)
    #[serde(rename = "c")]
    pub c: f32,
}

impl Default for LensCorrection {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0012,
            c: 0.15,
        }
    }
}

impl LensCorrection {
    pub const A_RANGE: (f32, f32) = (0.8, 1.5);
    pub const B_RANGE: (f32, f32) = (0.0012, 0.1212);
    pub const C_RANGE: (f32, f32) = (0.15, 0.44);

    fn clamp_ranges(&mut self) {
        self.a = self.a.clamp(Self::A_RANGE.0, Self::A_RANGE.1);
        self.b = self.b.clamp(Self::B_RANGE.0, Self::B_RANGE.1);
        self.c = self.c.clamp(Self::C_RANGE.0, Self::C_RANGE.1);
    }
}

/// Sphere output settings stored in XML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "SphereSettings")]
pub struct SphereSettings {
    /// Warp for the physical sphere (true) or show the flat preview (false)
    #[serde(rename = "renderForSphere", default)]
    pub render_for_sphere: bool,

    /// Field of view in degrees (1 - 359)
    #[serde(rename = "fov", default = "default_fov")]
    pub fov: f32,

    /// Depth/zoom parameter (0 - 1000)
    #[serde(rename = "z", default)]
    pub z: f32,

    /// Lens distortion correction
    #[serde(rename = "lensCorrection", default)]
    pub lens_correction: LensCorrection,

    /// Sphere resolution S; the canvas is 2S x S. Read once at setup.
    #[serde(rename = "sphereResolution", default = "default_sphere_resolution")]
    pub sphere_resolution: u32,

    /// Offaxis shader source location
    #[serde(rename = "offaxisShader", default = "default_offaxis_location")]
    pub offaxis_shader: String,

    /// Spherize shader source location
    #[serde(rename = "spherizeShader", default = "default_spherize_location")]
    pub spherize_shader: String,
}

fn default_fov() -> f32 {
    180.0
}

fn default_sphere_resolution() -> u32 {
    DEFAULT_SPHERE_RESOLUTION
}

fn default_offaxis_location() -> String {
    "offaxis".to_string()
}

fn default_spherize_location() -> String {
    "spherize".to_string()
}

impl Default for SphereSettings {
    fn default() -> Self {
        Self {
            render_for_sphere: false,
            fov: default_fov(),
            z: 0.0,
            lens_correction: LensCorrection::default(),
            sphere_resolution: default_sphere_resolution(),
            offaxis_shader: default_offaxis_location(),
            spherize_shader: default_spherize_location(),
        }
    }
}

impl SphereSettings {
    pub const FOV_RANGE: (f32, f32) = (1.0, 359.0);
    pub const Z_RANGE: (f32, f32) = (0.0, 1000.0);
    /// The canvas is twice as wide, so 8192 keeps it within a 16384 texture
    pub const SPHERE_RESOLUTION_RANGE: (u32, u32) = (1, 8192);

    /// Clamp every tunable to its slider range
    pub fn clamp_ranges(&mut self) {
        self.fov = self.fov.clamp(Self::FOV_RANGE.0, Self::FOV_RANGE.1);
        self.z = self.z.clamp(Self::Z_RANGE.0, Self::Z_RANGE.1);
        self.lens_correction.clamp_ranges();
        self.sphere_resolution = self
            .sphere_resolution
            .clamp(Self::SPHERE_RESOLUTION_RANGE.0, Self::SPHERE_RESOLUTION_RANGE.1);
    }

    /// Canvas dimensions (2S, S)
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.sphere_resolution.saturating_mul(2), self.sphere_resolution)
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
        let mut settings: Self = from_str(&contents).map_err(SettingsError::XmlParse)?;
        settings.clamp_ranges();
        Ok(settings)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let xml = to_string(self).map_err(SettingsError::XmlWrite)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(SettingsError::Io)?;
        }
        fs::write(path, formatted).map_err(SettingsError::Io)?;
        Ok(())
    }

    /// Default settings file in the config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("ImmersiveSphere");
            p.push("sphere.xml");
            p
        })
    }

    /// Save to [`Self::default_path`]
    pub fn save_default(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::default_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to_file(&path)?;
        Ok(path)
    }

    /// Load from `path`, falling back to defaults if missing or unreadable
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from_file(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to load sphere settings from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Settings-related errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(quick_xml::SeError),
    #[error("Could not find config directory")]
    NoConfigDir,
}

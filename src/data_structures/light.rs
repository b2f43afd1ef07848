//! Image-based lighting: indirect light and skybox builders.

use anyhow::{Context as _, Result, ensure};

use crate::engine::Engine;

/// Maximum number of spherical-harmonics bands the engine evaluates.
pub const MAX_SH_BANDS: usize = 3;
/// Coefficients for [`MAX_SH_BANDS`] bands (`bands * bands`).
pub const SH_COEFFICIENTS: usize = MAX_SH_BANDS * MAX_SH_BANDS;

/// Irradiance as RGB spherical-harmonics coefficients.
///
/// Unused higher bands are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SphericalHarmonics {
    pub bands: usize,
    pub coefficients: [[f32; 3]; SH_COEFFICIENTS],
}

impl SphericalHarmonics {
    /// Build from `bands * bands` RGB triples laid out flat.
    pub fn from_floats(bands: usize, floats: &[f32]) -> Result<Self> {
        ensure!(
            (1..=MAX_SH_BANDS).contains(&bands),
            "irradiance needs 1 to {} bands, got {}",
            MAX_SH_BANDS,
            bands
        );
        let needed = bands * bands * 3;
        ensure!(
            floats.len() >= needed,
            "{} bands need {} floats, got {}",
            bands,
            needed,
            floats.len()
        );
        let mut coefficients = [[0.0; 3]; SH_COEFFICIENTS];
        for (dst, src) in coefficients.iter_mut().zip(floats[..needed].chunks_exact(3)) {
            dst.copy_from_slice(src);
        }
        Ok(Self {
            bands,
            coefficients,
        })
    }

    /// Parse whitespace-separated floats, as stored in a KTX `sh` entry.
    pub fn parse(bands: usize, text: &str) -> Result<Self> {
        let floats = text
            .split_whitespace()
            .take(bands * bands * 3)
            .map(|token| {
                token
                    .parse::<f32>()
                    .with_context(|| format!("invalid spherical harmonics value '{token}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_floats(bands, &floats)
    }

    /// Coefficients padded to vec4 for a uniform buffer.
    pub fn to_uniform(&self) -> [[f32; 4]; SH_COEFFICIENTS] {
        self.coefficients.map(|[r, g, b]| [r, g, b, 0.0])
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndirectLightDesc {
    pub irradiance: SphericalHarmonics,
    pub intensity: f32,
}

/// Default environment intensity in lux, matching a bright overcast sky.
pub const DEFAULT_IBL_INTENSITY: f32 = 30_000.0;

pub struct IndirectLightBuilder<T> {
    reflections: Option<T>,
    irradiance: Option<SphericalHarmonics>,
    intensity: f32,
}

impl<T> Default for IndirectLightBuilder<T> {
    fn default() -> Self {
        Self {
            reflections: None,
            irradiance: None,
            intensity: DEFAULT_IBL_INTENSITY,
        }
    }
}

impl<T> IndirectLightBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefiltered cubemap used for specular reflections.
    pub fn reflections(mut self, texture: T) -> Self {
        self.reflections = Some(texture);
        self
    }

    pub fn irradiance_sh(mut self, bands: usize, floats: &[f32]) -> Result<Self> {
        self.irradiance = Some(SphericalHarmonics::from_floats(bands, floats)?);
        Ok(self)
    }

    pub fn irradiance(mut self, irradiance: SphericalHarmonics) -> Self {
        self.irradiance = Some(irradiance);
        self
    }

    pub fn intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn build<E>(self, engine: &mut E) -> Result<E::IndirectLight>
    where
        E: Engine<Texture = T>,
    {
        ensure!(
            self.reflections.is_some() || self.irradiance.is_some(),
            "an indirect light needs reflections or irradiance"
        );
        let desc = IndirectLightDesc {
            irradiance: self.irradiance.unwrap_or_default(),
            intensity: self.intensity,
        };
        engine.create_indirect_light(self.reflections, &desc)
    }
}

pub struct SkyboxBuilder<T> {
    environment: Option<T>,
}

impl<T> Default for SkyboxBuilder<T> {
    fn default() -> Self {
        Self { environment: None }
    }
}

impl<T> SkyboxBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn environment(mut self, texture: T) -> Self {
        self.environment = Some(texture);
        self
    }

    pub fn build<E>(self, engine: &mut E) -> Result<E::Skybox>
    where
        E: Engine<Texture = T>,
    {
        let environment = self
            .environment
            .context("a skybox needs an environment cubemap")?;
        engine.create_skybox(environment)
    }
}

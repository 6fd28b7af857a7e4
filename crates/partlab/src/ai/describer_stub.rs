//! Template-based part describer (fallback when "ai" feature is disabled).
//!
//! Produces deterministic description text from the measured geometry so
//! API consumers see the same shape of data either way.

use thiserror::Error;

use crate::analyzer::MeshMetrics;
use crate::config::AiConfig;

/// Errors that can occur while generating a part description.
#[derive(Debug, Error)]
pub enum DescriberError {
    #[error("AI describer is disabled in configuration")]
    Disabled,

    #[error("No API key configured (set ai.api_key or OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("Description request failed: {0}")]
    Request(String),

    #[error("Failed to parse description response: {0}")]
    ResponseParse(String),
}

/// Generated description text for a completed analysis.
#[derive(Debug, Clone)]
pub struct PartDescription {
    /// Factual summary of the measured geometry.
    pub technical: String,
    /// Customer-facing blurb, when one was produced.
    pub commercial: Option<String>,
}

pub struct PartDescriber;

impl PartDescriber {
    pub fn new(config: &AiConfig) -> Result<Self, DescriberError> {
        if !config.enabled {
            return Err(DescriberError::Disabled);
        }
        Ok(Self)
    }

    pub fn describe(
        &self,
        filename: &str,
        metrics: &MeshMetrics,
    ) -> Result<PartDescription, DescriberError> {
        let quality = if metrics.watertight {
            "a watertight mesh suitable for printing"
        } else {
            "an open mesh that may need repair before printing"
        };

        let technical = format!(
            "{} measures {:.1} x {:.1} x {:.1} mm with a volume of {:.1} mm^3 \
             across {} triangles, {}.",
            filename,
            metrics.dim_x,
            metrics.dim_y,
            metrics.dim_z,
            metrics.volume_mm3,
            metrics.poly_count,
            quality,
        );

        Ok(PartDescription {
            technical,
            commercial: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metrics(watertight: bool) -> MeshMetrics {
        MeshMetrics {
            poly_count: 12,
            volume_mm3: 1000.0,
            dim_x: 10.0,
            dim_y: 10.0,
            dim_z: 10.0,
            watertight,
        }
    }

    fn enabled_config() -> AiConfig {
        AiConfig {
            enabled: true,
            ..AiConfig::default()
        }
    }

    #[test]
    fn test_stub_describes_watertight_mesh() {
        let describer = PartDescriber::new(&enabled_config()).unwrap();
        let description = describer
            .describe("cube.stl", &sample_metrics(true))
            .unwrap();

        assert!(description.technical.contains("cube.stl"));
        assert!(description.technical.contains("12 triangles"));
        assert!(description.technical.contains("watertight"));
        assert!(description.commercial.is_none());
    }

    #[test]
    fn test_stub_flags_open_mesh() {
        let describer = PartDescriber::new(&enabled_config()).unwrap();
        let description = describer
            .describe("shell.stl", &sample_metrics(false))
            .unwrap();

        assert!(description.technical.contains("open mesh"));
    }

    #[test]
    fn test_disabled_config_rejected() {
        let config = AiConfig::default();
        assert!(matches!(
            PartDescriber::new(&config),
            Err(DescriberError::Disabled)
        ));
    }
}

//! Graph configuration and the per-frame parameters derived from it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::history::{MetricId, SampleRate};

/// Geometry used to draw the tracked metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphStyle {
    #[default]
    Line,
    StackedArea,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub style: GraphStyle,
    /// Metrics in drawing (and stacking) order.
    pub metrics: Vec<MetricId>,
    pub sample_rate: SampleRate,
    /// Raw samples spanned by the full graph width.
    pub sample_window: u32,
    /// Upper bound on graph points per render unit of width.
    pub max_points_per_pixel: f32,
    /// Line width in render units. Zero or less draws nothing.
    pub line_thickness: f32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            style: GraphStyle::Line,
            metrics: Vec::new(),
            sample_rate: SampleRate::EveryTick,
            sample_window: 256,
            max_points_per_pixel: 0.5,
            line_thickness: 2.0,
        }
    }
}

impl GraphConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_window == 0 {
            return Err(GraphError::InvalidConfig("sample_window must be at least 1".into()));
        }
        if !(self.max_points_per_pixel.is_finite() && self.max_points_per_pixel > 0.0) {
            return Err(GraphError::InvalidConfig(format!(
                "max_points_per_pixel must be positive, got {}",
                self.max_points_per_pixel
            )));
        }
        if self.line_thickness.is_nan() {
            return Err(GraphError::InvalidConfig("line_thickness is NaN".into()));
        }
        Ok(())
    }

    pub fn stat_count(&self) -> usize {
        self.metrics.len()
    }

    /// Parameters for a viewport `width` render units wide.
    pub fn params_for_width(&self, width: f32) -> GraphParams {
        let density_cap = (width.max(0.0) * self.max_points_per_pixel).floor() as usize;
        let point_count = (self.sample_window as usize).min(density_cap);
        let samples_per_point = if point_count > 0 {
            self.sample_window as f64 / point_count as f64
        } else {
            0.0
        };
        GraphParams {
            stat_count: self.metrics.len(),
            point_count,
            samples_per_point,
        }
    }
}

/// Sizes derived from the config and the current viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphParams {
    pub stat_count: usize,
    pub point_count: usize,
    pub samples_per_point: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GraphConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config = GraphConfig::from_json(
            r#"{ "style": "stacked_area", "metrics": [1, 2], "sample_rate": "per_second", "sample_window": 60 }"#,
        )
        .unwrap();
        assert_eq!(config.style, GraphStyle::StackedArea);
        assert_eq!(config.metrics, vec![MetricId(1), MetricId(2)]);
        assert_eq!(config.sample_rate, SampleRate::PerSecond);
        assert_eq!(config.sample_window, 60);
        assert_eq!(config.line_thickness, 2.0);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            GraphConfig::from_json(r#"{ "sample_window": 0 }"#),
            Err(GraphError::InvalidConfig(_))
        ));
        assert!(matches!(
            GraphConfig::from_json(r#"{ "max_points_per_pixel": -1.0 }"#),
            Err(GraphError::InvalidConfig(_))
        ));
        assert!(matches!(GraphConfig::from_json("not json"), Err(GraphError::Json(_))));
    }

    #[test]
    fn test_non_positive_thickness_is_valid() {
        let config = GraphConfig { line_thickness: 0.0, ..GraphConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_params_density_cap() {
        let config = GraphConfig { sample_window: 120, max_points_per_pixel: 0.5, ..GraphConfig::default() };
        // Wide viewport: one point per sample.
        let params = config.params_for_width(400.0);
        assert_eq!(params.point_count, 120);
        assert_eq!(params.samples_per_point, 1.0);
        // Narrow viewport: capped at 40 points, 3 samples each.
        let params = config.params_for_width(80.0);
        assert_eq!(params.point_count, 40);
        assert_eq!(params.samples_per_point, 3.0);
        // Fractional ratio.
        let params = config.params_for_width(100.0);
        assert_eq!(params.point_count, 50);
        assert!((params.samples_per_point - 2.4).abs() < 1e-12);
    }

    #[test]
    fn test_params_zero_width() {
        let params = GraphConfig::default().params_for_width(0.0);
        assert_eq!(params.point_count, 0);
        assert_eq!(params.samples_per_point, 0.0);
    }
}

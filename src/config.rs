use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What happens to pan/zoom when a newly selected model's layout is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPolicy {
    /// Scale back to 1 and center the new graph.
    #[default]
    Reset,
    /// Keep the current scale and offset.
    Preserve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSpacing {
    pub node_node: f32,
    pub between_layers: f32,
    pub edge_node: f32,
}

impl Default for LayoutSpacing {
    fn default() -> Self {
        Self {
            node_node: 50.0,
            between_layers: 80.0,
            edge_node: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSizes {
    pub layer_width: f32,
    pub io_width: f32,
    pub io_height: f32,
}

impl Default for NodeSizes {
    fn default() -> Self {
        Self {
            layer_width: 200.0,
            io_width: 140.0,
            io_height: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub spacing: LayoutSpacing,
    pub node_sizes: NodeSizes,
    /// Substrings marking a tensor name as a learned parameter rather than data.
    pub parameter_markers: Vec<String>,
    pub wheel_zoom_step: f32,
    pub button_zoom_step: f32,
    pub min_viewport_size: [f32; 2],
    pub viewport_margin: f32,
    pub view_policy: ViewPolicy,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            spacing: LayoutSpacing::default(),
            node_sizes: NodeSizes::default(),
            parameter_markers: vec!["weight".to_string(), "bias".to_string(), "conv".to_string()],
            wheel_zoom_step: 1.05,
            button_zoom_step: 1.2,
            min_viewport_size: [800.0, 600.0],
            viewport_margin: 40.0,
            view_policy: ViewPolicy::Reset,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wheel_zoom_step <= 1.0 || self.button_zoom_step <= 1.0 {
            return Err(ConfigError::Invalid(
                "zoom steps must be greater than 1".to_string(),
            ));
        }
        let spacing = &self.spacing;
        if spacing.node_node < 0.0 || spacing.between_layers < 0.0 || spacing.edge_node < 0.0 {
            return Err(ConfigError::Invalid("negative spacing".to_string()));
        }
        if self.node_sizes.layer_width <= 0.0
            || self.node_sizes.io_width <= 0.0
            || self.node_sizes.io_height <= 0.0
        {
            return Err(ConfigError::Invalid("node sizes must be positive".to_string()));
        }
        Ok(())
    }
}

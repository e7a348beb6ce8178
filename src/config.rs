use std::path::Path;

use serde::{Deserialize, Serialize};

/// Where a delta "add" lands when its logical parent is currently
/// flattened. `Sibling` drops the node into the flattened plane next to
/// the target (visible immediately); `Nested` parks it in the flatten
/// bookkeeping so it materializes on unflatten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlattenedAddPolicy {
    #[default]
    Sibling,
    Nested,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainmentConfig {
    /// Canvas margin before the first root container.
    pub margin: f32,
    /// Horizontal gap between packed root containers.
    pub root_spacing: f32,
    /// Inner padding between a container's border and its children.
    pub padding_x: f32,
    /// Extra headroom at the top of a container for its title band.
    pub padding_top: f32,
    pub padding_bottom: f32,
    /// Grid gaps between sibling cells inside a container.
    pub gap_x: f32,
    pub gap_y: f32,
    /// Fixed columns per container grid; 0 picks ceil(sqrt(n)).
    pub columns: usize,
    /// Default footprint for an item (leaf) node.
    pub item_width: f32,
    pub item_height: f32,
    /// Floor for a container that ends up empty.
    pub min_container_width: f32,
    pub min_container_height: f32,
}

impl Default for ContainmentConfig {
    fn default() -> Self {
        Self {
            margin: 24.0,
            root_spacing: 48.0,
            padding_x: 24.0,
            padding_top: 48.0,
            padding_bottom: 24.0,
            gap_x: 32.0,
            gap_y: 32.0,
            columns: 0,
            item_width: 160.0,
            item_height: 64.0,
            min_container_width: 208.0,
            min_container_height: 136.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForceConfig {
    /// The deterministic grid stays the default; relaxation is opt-in.
    pub enabled: bool,
    pub iterations: usize,
    /// Spring constant along relationship edges.
    pub attraction: f32,
    /// Target rest length for those springs.
    pub link_distance: f32,
    /// Pairwise inverse-square repulsion strength.
    pub repulsion: f32,
    pub damping: f32,
    /// Per-iteration displacement clamp.
    pub max_step: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            iterations: 120,
            attraction: 0.6,
            link_distance: 220.0,
            repulsion: 48_000.0,
            damping: 0.85,
            max_step: 24.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlatConfig {
    pub margin: f32,
    pub gap_x: f32,
    pub gap_y: f32,
    /// Fixed columns for the grid; 0 picks ceil(sqrt(n)).
    pub columns: usize,
    pub cell_width: f32,
    pub cell_height: f32,
    pub force: ForceConfig,
}

impl Default for FlatConfig {
    fn default() -> Self {
        Self {
            margin: 24.0,
            gap_x: 48.0,
            gap_y: 48.0,
            columns: 0,
            cell_width: 160.0,
            cell_height: 64.0,
            force: ForceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub containment: ContainmentConfig,
    pub flat: FlatConfig,
    pub flattened_add_policy: FlattenedAddPolicy,
}

/// Reads a config file when a path is given, falling back to defaults.
/// Accepts JSON5 so hand-maintained config files can carry comments and
/// trailing commas.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let config: LayoutConfig = json5::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_give_deterministic_grid() {
        let config = LayoutConfig::default();
        assert!(!config.flat.force.enabled);
        assert_eq!(config.flattened_add_policy, FlattenedAddPolicy::Sibling);
    }

    #[test]
    fn json5_config_overrides_only_named_fields() {
        let parsed: LayoutConfig = json5::from_str(
            r#"{
                // tighter grids for dense graphs
                containment: { gapX: 16, gapY: 16 },
                flat: { columns: 4 },
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.containment.gap_x, 16.0);
        assert_eq!(parsed.containment.item_width, 160.0);
        assert_eq!(parsed.flat.columns, 4);
    }
}

use crate::layout::{Size, VERTICAL};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacingConfig {
    /// Gap between stacked siblings along the main axis.
    pub node_spacing: f32,
    /// Main-axis offset of an inline row inside its container.
    pub inline_spacing_pre: f32,
    /// Main-axis space appended after an inline row.
    pub inline_spacing_after: f32,
    /// Cross-axis gap between inline siblings.
    pub min_inline_block_spacing: f32,
    /// Intrinsic size of leaf kinds that declare none.
    pub default_node_size: Size,
}

impl Default for SpacingConfig {
    fn default() -> Self {
        Self {
            node_spacing: 32.0,
            inline_spacing_pre: 40.0,
            inline_spacing_after: 40.0,
            min_inline_block_spacing: 20.0,
            default_node_size: Size::new(280.0, 60.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    pub layout: String,
    pub refine_branches: bool,
    pub strict_kinds: bool,
    pub spacing: SpacingConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            layout: VERTICAL.to_string(),
            refine_branches: false,
            strict_kinds: false,
            spacing: SpacingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SizeFile {
    width: f32,
    height: f32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SpacingConfigFile {
    node_spacing: Option<f32>,
    inline_spacing_pre: Option<f32>,
    inline_spacing_after: Option<f32>,
    min_inline_block_spacing: Option<f32>,
    default_node_size: Option<SizeFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<String>,
    refine_branches: Option<bool>,
    strict_kinds: Option<bool>,
    spacing: Option<SpacingConfigFile>,
}

fn parse_config_file(contents: &str) -> anyhow::Result<ConfigFile> {
    match serde_json::from_str(contents) {
        Ok(parsed) => Ok(parsed),
        Err(err) => json5::from_str(contents).map_err(|_| err.into()),
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<FlowConfig> {
    let mut config = FlowConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed = parse_config_file(&contents)?;
    apply_config_file(&mut config, parsed);
    Ok(config)
}

fn apply_config_file(config: &mut FlowConfig, parsed: ConfigFile) {
    if let Some(layout) = parsed.layout {
        config.layout = layout;
    }
    if let Some(v) = parsed.refine_branches {
        config.refine_branches = v;
    }
    if let Some(v) = parsed.strict_kinds {
        config.strict_kinds = v;
    }
    if let Some(spacing) = parsed.spacing {
        if let Some(v) = spacing.node_spacing {
            config.spacing.node_spacing = v;
        }
        if let Some(v) = spacing.inline_spacing_pre {
            config.spacing.inline_spacing_pre = v;
        }
        if let Some(v) = spacing.inline_spacing_after {
            config.spacing.inline_spacing_after = v;
        }
        if let Some(v) = spacing.min_inline_block_spacing {
            config.spacing.min_inline_block_spacing = v;
        }
        if let Some(size) = spacing.default_node_size {
            config.spacing.default_node_size = Size::new(size.width, size.height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, FlowConfig::default());
        assert_eq!(config.layout, "vertical");
        assert_eq!(config.spacing.default_node_size, Size::new(280.0, 60.0));
    }

    #[test]
    fn partial_files_override_only_what_they_name() {
        let mut config = FlowConfig::default();
        let parsed = parse_config_file(
            r#"{"layout": "horizontal", "spacing": {"nodeSpacing": 24, "defaultNodeSize": {"width": 200, "height": 48}}}"#,
        )
        .unwrap();
        apply_config_file(&mut config, parsed);
        assert_eq!(config.layout, "horizontal");
        assert_eq!(config.spacing.node_spacing, 24.0);
        assert_eq!(config.spacing.inline_spacing_pre, 40.0);
        assert_eq!(config.spacing.default_node_size, Size::new(200.0, 48.0));
        assert!(!config.strict_kinds);
    }

    #[test]
    fn accepts_json5_files() {
        let parsed = parse_config_file("{ strictKinds: true, refineBranches: true, // comment\n }").unwrap();
        assert_eq!(parsed.strict_kinds, Some(true));
        assert_eq!(parsed.refine_branches, Some(true));
        assert!(parse_config_file("strictKinds = true").is_err());
    }
}

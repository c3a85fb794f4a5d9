use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Raw preset document compiled into the binary
const PRESET_JSON: &str = include_str!("../assets/style_preset.json");

/// Complete style configuration sent alongside every edit request.
///
/// Parsed into typed fields so a malformed asset fails at startup. The
/// instruction embeds the document itself, so numbers and key order reach
/// the service exactly as written in the asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylePreset {
    pub version: String,
    pub name: String,
    pub id: String,
    pub created_utc: String,
    pub notes: String,
    pub style_prompt: Vec<String>,
    pub negative_prompt: Vec<String>,
    pub palette: Palette,
    pub materials: Materials,
    pub geometry: Geometry,
    pub lighting: Lighting,
    pub camera: Camera,
    pub render: Render,
    pub post: PostProcess,
    pub output: OutputSpec,
    pub controls: Controls,
    pub templates: Templates,
    pub reference_image: ReferenceImage,
    pub overrides: Overrides,
    #[serde(skip)]
    document: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub base_off_white: String,
    pub graphite_grey: String,
    pub window_tint: String,
    pub accent_red: String,
    pub accent_yellow: String,
    pub accent_blue: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Materials {
    pub default: Material,
    pub gloss_accent: Material,
    pub glass_like_windows: Material,
    pub rubber_tires: Material,
}

/// Surface parameters; `tint` names a palette entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub metalness: f64,
    pub roughness: f64,
    pub specular: f64,
    pub subsurface: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ior: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_roughness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub bevel_ratio: [f64; 2],
    pub inflation_amount: String,
    pub window_inset_depth: String,
    pub headlight_shape: String,
    pub proportions_hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    pub scheme: String,
    pub env_intensity: f64,
    pub key: LightSource,
    pub fill: LightSource,
    pub kicker: LightSource,
    pub rim: LightSource,
    pub shadow: Shadow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSource {
    pub intensity: f64,
    pub direction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub softness: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    /// Min/max opacity of the ground contact shadow
    pub opacity: [f64; 2],
    pub blur: String,
    pub offset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    #[serde(rename = "type")]
    pub kind: String,
    pub isometric: bool,
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
    pub tilt_deg: f64,
    pub ortho_scale: f64,
    pub distance_mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Render {
    pub style_strength: f64,
    pub detail_level: String,
    pub consistency: Consistency,
    pub background: Background,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consistency {
    pub seed_mode: String,
    pub seed_hint: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub mode: String,
    pub hex: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcess {
    pub ao_boost: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub sharpen: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub size_px: u32,
    pub padding_ratio: f64,
    pub filetype: String,
    pub transparent_background: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    pub guidance_scale: f64,
    pub steps: u32,
}

/// Prompt templates; `{subject}` and `{details}` are filled by text-to-image callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Templates {
    pub text_to_image_prompt: String,
    pub image_to_image_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceImage {
    #[serde(rename = "use")]
    pub usage: String,
    pub weight: f64,
    pub notes: String,
}

/// Per-generation tweak slots. Empty in the baked preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    pub palette: serde_json::Map<String, serde_json::Value>,
    pub seed: Option<u64>,
    pub camera: serde_json::Map<String, serde_json::Value>,
    pub lighting: serde_json::Map<String, serde_json::Value>,
    pub materials: serde_json::Map<String, serde_json::Value>,
    pub notes: String,
}

impl StylePreset {
    /// Parse the preset compiled into the binary
    pub fn baked() -> Result<Self> {
        let document: serde_json::Value =
            serde_json::from_str(PRESET_JSON).context("Failed to parse baked style preset")?;
        let mut preset: Self = serde_json::from_value(document.clone())
            .context("Baked style preset does not match the expected shape")?;
        preset.document = document;
        Ok(preset)
    }

    /// Pretty JSON (two-space indent) as embedded in the instruction text
    pub fn to_pretty_json(&self) -> Result<String> {
        let json = if self.document.is_null() {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string_pretty(&self.document)
        };
        json.context("Failed to serialize style preset")
    }
}

//! Read-only configuration handed to the driver by the host. Mirrors what
//! the host stores in its scene/camera/layer property groups.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelKind;

/// Everything the driver needs to know for one render invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Base film resolution before scaling and border cropping
    pub film_width: u32,
    pub film_height: u32,
    /// Resolution scale in percent (100 = full size)
    pub resolution_percent: u32,
    /// Optional border crop region (fractions of the frame)
    pub border: Option<Border>,
    /// Multi-frame render (animation) - disables the fast refresh phase
    /// and always requires a halt condition
    pub is_animation: bool,
    pub imagepipeline: ImagepipelineSettings,
    pub display: DisplaySettings,
    pub config: EngineConfig,
    /// Global halt condition, used by layers that don't override it
    pub halt: HaltSettings,
    pub layers: Vec<LayerSettings>,
    /// Configured light groups, in channel index order
    pub lightgroups: Vec<LightGroup>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            film_width: 1920,
            film_height: 1080,
            resolution_percent: 100,
            border: None,
            is_animation: false,
            imagepipeline: ImagepipelineSettings::default(),
            display: DisplaySettings::default(),
            config: EngineConfig::default(),
            halt: HaltSettings::default(),
            layers: vec![LayerSettings::new("RenderLayer")],
            lightgroups: Vec::new(),
        }
    }
}

impl RenderSettings {
    /// Effective film size with the resolution scale and border crop
    /// applied, never zero
    pub fn filmsize(&self) -> (usize, usize) {
        let scale = self.resolution_percent as f32 / 100.0;
        let (mut width, mut height) = (
            self.film_width as f32 * scale,
            self.film_height as f32 * scale,
        );
        if let Some(border) = &self.border {
            width *= (border.x_max - border.x_min).clamp(0.0, 1.0);
            height *= (border.y_max - border.y_min).clamp(0.0, 1.0);
        }
        ((width.round() as usize).max(1), (height.round() as usize).max(1))
    }

    pub fn enabled_layers(&self) -> impl Iterator<Item = &LayerSettings> {
        self.layers.iter().filter(|layer| layer.enabled)
    }
}

/// Border crop region as fractions of the full frame
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Border {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

/// Imagepipeline configuration relevant to the driver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagepipelineSettings {
    /// Render the world background transparent (4-channel combined output)
    pub transparent_film: bool,
    pub tonemapper: TonemapperSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TonemapperKind {
    /// Brightness controlled by a fixed gain (or auto-detected)
    Linear,
    /// Camera settings (ISO, f-stop, shutter)
    LuxLinear,
    /// Reinhard, adapts to image brightness
    Reinhard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TonemapperSettings {
    pub kind: TonemapperKind,
    /// Auto-detect optimal brightness (Linear only)
    pub use_autolinear: bool,
    pub linear_scale: f32,
}

impl Default for TonemapperSettings {
    fn default() -> Self {
        Self {
            kind: TonemapperKind::Linear,
            use_autolinear: true,
            linear_scale: 0.5,
        }
    }
}

impl TonemapperSettings {
    /// Automatic tonemappers adapt to image content, which makes multiple
    /// render layers come out with different brightness
    pub fn is_automatic(&self) -> bool {
        let autolinear = self.kind == TonemapperKind::Linear && self.use_autolinear;
        autolinear || self.kind == TonemapperKind::Reinhard
    }
}

/// Film display refresh configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Seconds between full film refreshes in the steady phase
    pub interval: f32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { interval: 10.0 }
    }
}

impl DisplaySettings {
    /// Refresh cadence for the fast startup phase: never slower than one
    /// second, so the user quickly sees an image forming
    pub fn shortest_interval(&self) -> f32 {
        self.interval.min(1.0)
    }
}

/// Engine-level configuration the driver consults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Only serialize the scene to disk instead of rendering
    pub use_filesaver: bool,
    pub filesaver_format: FilesaverFormat,
    pub path: PathSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilesaverFormat {
    /// Single binary scene file
    Bin,
    /// Text scene description in a directory
    #[default]
    Txt,
}

/// Path tracer settings relevant to the driver
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Radiance clamping enabled - when off, the driver suggests a clamp
    /// value once per render
    pub use_clamping: bool,
    pub clamp_value: f32,
}

/// Halt condition. On a layer, `enable` means the layer overrides the
/// global condition with its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HaltSettings {
    pub enable: bool,
    pub use_time: bool,
    /// Seconds
    pub time: u32,
    pub use_samples: bool,
    pub samples: u32,
    pub use_noise_threshold: bool,
    pub noise_threshold: f32,
}

impl Default for HaltSettings {
    fn default() -> Self {
        Self {
            enable: false,
            use_time: false,
            time: 600,
            use_samples: false,
            samples: 500,
            use_noise_threshold: false,
            noise_threshold: 5.0 / 256.0,
        }
    }
}

impl HaltSettings {
    /// A halt condition only counts if it is enabled and at least one
    /// criterion is active
    pub fn is_enabled(&self) -> bool {
        self.enable && (self.use_time || self.use_samples || self.use_noise_threshold)
    }
}

/// One output layer of the render
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSettings {
    pub name: String,
    pub enabled: bool,
    /// Per-layer halt override (`halt.enable` opts into overriding)
    pub halt: HaltSettings,
    /// Channels enabled for this layer besides the combined image
    pub aovs: Vec<ChannelKind>,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self::new("RenderLayer")
    }
}

impl LayerSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            halt: HaltSettings::default(),
            aovs: Vec::new(),
        }
    }
}

/// User-defined partition of scene lights with its own radiance channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGroup {
    /// User-facing name, also the pass name
    pub name: String,
}

impl LightGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filmsize_without_border_is_full_frame() {
        let settings = RenderSettings {
            film_width: 800,
            film_height: 600,
            ..RenderSettings::default()
        };
        assert_eq!(settings.filmsize(), (800, 600));
    }

    #[test]
    fn filmsize_applies_resolution_percent() {
        let settings = RenderSettings {
            film_width: 800,
            film_height: 600,
            resolution_percent: 50,
            ..RenderSettings::default()
        };
        assert_eq!(settings.filmsize(), (400, 300));
    }

    #[test]
    fn filmsize_applies_border_crop() {
        let settings = RenderSettings {
            film_width: 1000,
            film_height: 500,
            border: Some(Border {
                x_min: 0.25,
                x_max: 0.75,
                y_min: 0.0,
                y_max: 0.5,
            }),
            ..RenderSettings::default()
        };
        assert_eq!(settings.filmsize(), (500, 250));
    }

    #[test]
    fn filmsize_never_collapses_to_zero() {
        let settings = RenderSettings {
            film_width: 10,
            film_height: 10,
            border: Some(Border {
                x_min: 0.5,
                x_max: 0.5,
                y_min: 0.5,
                y_max: 0.5,
            }),
            ..RenderSettings::default()
        };
        assert_eq!(settings.filmsize(), (1, 1));
    }

    #[test]
    fn halt_needs_enable_and_a_criterion() {
        let mut halt = HaltSettings::default();
        assert!(!halt.is_enabled());

        halt.enable = true;
        assert!(!halt.is_enabled()); // enabled but no criterion

        halt.use_samples = true;
        assert!(halt.is_enabled());
    }

    #[test]
    fn autolinear_and_reinhard_are_automatic() {
        let mut tm = TonemapperSettings::default();
        assert!(tm.is_automatic()); // Linear + autolinear

        tm.use_autolinear = false;
        assert!(!tm.is_automatic());

        tm.kind = TonemapperKind::Reinhard;
        assert!(tm.is_automatic());

        tm.kind = TonemapperKind::LuxLinear;
        assert!(!tm.is_automatic());
    }

    #[test]
    fn enabled_layers_filters_disabled() {
        let mut settings = RenderSettings::default();
        settings.layers = vec![
            LayerSettings::new("a"),
            LayerSettings {
                enabled: false,
                ..LayerSettings::new("b")
            },
            LayerSettings::new("c"),
        ];

        let names: Vec<_> = settings.enabled_layers().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn settings_roundtrip_through_json() {
        let mut settings = RenderSettings::default();
        settings.layers[0].aovs = vec![ChannelKind::Depth, ChannelKind::Other("FOO".into())];
        settings.lightgroups.push(LightGroup::new("key"));

        let json = serde_json::to_string(&settings).unwrap();
        let back: RenderSettings = serde_json::from_str(&json).unwrap();

        assert_eq!(back.layers[0].aovs, settings.layers[0].aovs);
        assert_eq!(back.lightgroups[0].name, "key");
    }
}

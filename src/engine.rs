//! Contracts of the external collaborators: the rendering engine session,
//! the scene exporter and the host application driving the render.

use std::collections::HashMap;

use anyhow::Result;

use crate::channel::FilmOutput;
use crate::compositor::PipelineRemap;
use crate::surface::LayerSurface;

/// Render configuration properties exposed by the engine
/// (filesaver paths and similar)
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    properties: HashMap<String, String>,
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Progress snapshot queried once per statistics tick
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    pub elapsed_seconds: f32,
    pub samples: u64,
    pub samples_per_second: f32,
    /// Fraction of pixels considered converged, 0 when unknown
    pub convergence: f32,
}

/// Opaque engine session. The engine runs its own worker pool; this
/// interface only starts, stops and queries it.
pub trait RenderSession {
    fn start(&mut self) -> Result<()>;

    /// Stop rendering and flush the film. Must be safe to call once and
    /// tolerate queries afterwards.
    fn stop(&mut self);

    /// Whether a halt condition was reached
    fn has_done(&self) -> bool;

    /// Read a floating-point film output into `dest`. `index` selects the
    /// group for indexed channels or the imagepipeline slot.
    fn get_output_float(&self, output: &FilmOutput, dest: &mut [f32], index: u32) -> Result<()>;

    /// Read an unsigned-integer film output into `dest`
    fn get_output_uint(&self, output: &FilmOutput, dest: &mut [u32], index: u32) -> Result<()>;

    fn statistics(&self) -> SessionStats;

    /// Average film luminance (Y); non-positive when not available yet
    fn film_luminance(&self) -> f32;

    fn render_config(&self) -> &RenderConfig;
}

/// Scene exporter: builds sessions from the host scene and pushes
/// configuration edits into a running session
pub trait SceneExporter {
    /// Export the scene and construct a session, recording on `remap` any
    /// channels the export redirected to tonemapped imagepipeline slots.
    /// `Ok(None)` means the user cancelled during setup - not an error.
    fn create_session(
        &mut self,
        remap: &mut PipelineRemap,
    ) -> Result<Option<Box<dyn RenderSession>>>;

    /// Whether configuration edits (tonemapper, light groups...) are
    /// pending since the last call
    fn get_changes(&mut self) -> bool;

    /// Apply pending edits to the running session
    fn update_session(&mut self, changes: bool, session: &mut dyn RenderSession) -> Result<()>;

    /// Whether any scene light was registered into the light group with
    /// this channel index during export. Unregistered groups have no
    /// engine channel and must be skipped.
    fn has_lightgroup(&self, index: usize) -> bool;
}

/// The host application: cancellation, status display and per-layer
/// compositing surfaces
pub trait RenderHost {
    /// Advisory cancellation flag, polled every loop iteration
    fn test_break(&self) -> bool;

    /// Update the progress/status display
    fn update_stats(&mut self, stage: &str, message: &str);

    /// Surface user-visible information (export paths etc.)
    fn report_info(&mut self, message: &str);

    /// Compositing surface for one layer. `None` skips the layer.
    fn layer_surface(&mut self, layer_name: &str) -> Option<&mut dyn LayerSurface>;

    /// Thumbnail/material preview mode - AOV import is skipped entirely
    fn is_preview(&self) -> bool {
        false
    }
}

//! Synthetic engine collaborators so the driver can run without a real
//! rendering engine: a session producing deterministic channel data, a
//! matching exporter and an in-memory host. Used by the demo binary and
//! the integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::channel::{layer_pass_layout, ChannelKind, FilmOutput};
use crate::compositor::PipelineRemap;
use crate::engine::{RenderConfig, RenderHost, RenderSession, SceneExporter, SessionStats};
use crate::settings::RenderSettings;
use crate::surface::{LayerSurface, MemorySurface};

/// Session that fakes progress over wall-clock time and fills readbacks
/// with deterministic values. Only channels "exported" from the settings
/// are defined; reading anything else fails like a real engine would.
pub struct DemoSession {
    defined: HashSet<ChannelKind>,
    lightgroup_count: usize,
    halt_samples: u64,
    samples_per_second: f32,
    started: Option<Instant>,
    stopped: bool,
    config: RenderConfig,
}

impl DemoSession {
    pub fn new(settings: &RenderSettings, lightgroup_count: usize, samples_per_second: f32) -> Self {
        let mut defined = HashSet::new();
        for layer in settings.enabled_layers() {
            defined.extend(layer.aovs.iter().cloned());
        }

        let halt_samples = if settings.halt.is_enabled() && settings.halt.use_samples {
            settings.halt.samples as u64
        } else {
            0 // render until stopped
        };

        let mut config = RenderConfig::new();
        if settings.config.use_filesaver {
            config.set("filesaver.filename", "demo-scene.bcf");
            config.set("filesaver.directory", "demo-scene");
        }

        Self {
            defined,
            lightgroup_count,
            halt_samples,
            samples_per_second,
            started: None,
            stopped: false,
            config,
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    fn samples(&self) -> u64 {
        match self.started {
            Some(started) => (started.elapsed().as_secs_f32() * self.samples_per_second) as u64,
            None => 0,
        }
    }

    fn check_defined(&self, output: &FilmOutput, index: u32) -> Result<()> {
        let FilmOutput::Channel(kind) = output else {
            // Imagepipeline outputs always exist
            return Ok(());
        };
        if *kind == ChannelKind::RadianceGroup {
            if index as usize >= self.lightgroup_count {
                anyhow::bail!("film output RADIANCE_GROUP {} not defined", index);
            }
            return Ok(());
        }
        if !self.defined.contains(kind) {
            anyhow::bail!("film output {} not defined", kind.name());
        }
        Ok(())
    }
}

impl RenderSession for DemoSession {
    fn start(&mut self) -> Result<()> {
        self.started = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn has_done(&self) -> bool {
        self.halt_samples > 0 && self.samples() >= self.halt_samples
    }

    fn get_output_float(&self, output: &FilmOutput, dest: &mut [f32], index: u32) -> Result<()> {
        self.check_defined(output, index)?;
        // Deterministic ramp, offset by the group/slot index
        for (i, value) in dest.iter_mut().enumerate() {
            *value = 0.25 + ((i % 7) as f32) * 0.1 + index as f32;
        }
        Ok(())
    }

    fn get_output_uint(&self, output: &FilmOutput, dest: &mut [u32], index: u32) -> Result<()> {
        self.check_defined(output, index)?;
        for (i, value) in dest.iter_mut().enumerate() {
            *value = (i % 17) as u32 + 1;
        }
        Ok(())
    }

    fn statistics(&self) -> SessionStats {
        let elapsed = self
            .started
            .map(|s| s.elapsed().as_secs_f32())
            .unwrap_or(0.0);
        SessionStats {
            elapsed_seconds: elapsed,
            samples: self.samples(),
            samples_per_second: self.samples_per_second,
            convergence: if self.halt_samples > 0 {
                (self.samples() as f32 / self.halt_samples as f32).min(1.0)
            } else {
                0.0
            },
        }
    }

    fn film_luminance(&self) -> f32 {
        if self.started.is_some() {
            0.35
        } else {
            -1.0
        }
    }

    fn render_config(&self) -> &RenderConfig {
        &self.config
    }
}

/// Exporter over a fixed settings snapshot. Light groups are "registered"
/// up to a configurable count, like a scene where only some configured
/// groups are actually used by lights.
pub struct DemoExporter {
    settings: RenderSettings,
    registered_lightgroups: usize,
    samples_per_second: f32,
    cancel_export: bool,
    pending_changes: bool,
    remaps: Vec<(String, u32)>,
}

impl DemoExporter {
    pub fn new(settings: RenderSettings) -> Self {
        let registered_lightgroups = settings.lightgroups.len();
        Self {
            settings,
            registered_lightgroups,
            samples_per_second: 1000.0,
            cancel_export: false,
            pending_changes: false,
            remaps: Vec::new(),
        }
    }

    /// Pretend only the first `count` configured groups have lights
    pub fn with_registered_lightgroups(mut self, count: usize) -> Self {
        self.registered_lightgroups = count;
        self
    }

    pub fn with_samples_per_second(mut self, rate: f32) -> Self {
        self.samples_per_second = rate;
        self
    }

    /// Redirect a channel to a tonemapped imagepipeline slot, recorded on
    /// the remap during session creation
    pub fn with_channel_remap(mut self, key: impl Into<String>, slot: u32) -> Self {
        self.remaps.push((key.into(), slot));
        self
    }

    /// Make the next `create_session` behave like a user cancel
    pub fn cancel_next_export(&mut self) {
        self.cancel_export = true;
    }

    /// Queue a fake configuration edit for the next `get_changes`
    pub fn queue_change(&mut self) {
        self.pending_changes = true;
    }
}

impl SceneExporter for DemoExporter {
    fn create_session(
        &mut self,
        remap: &mut PipelineRemap,
    ) -> Result<Option<Box<dyn RenderSession>>> {
        if self.cancel_export {
            self.cancel_export = false;
            return Ok(None);
        }
        for (key, slot) in &self.remaps {
            remap.assign(key.clone(), *slot);
        }
        Ok(Some(Box::new(DemoSession::new(
            &self.settings,
            self.registered_lightgroups,
            self.samples_per_second,
        ))))
    }

    fn get_changes(&mut self) -> bool {
        std::mem::take(&mut self.pending_changes)
    }

    fn update_session(&mut self, _changes: bool, _session: &mut dyn RenderSession) -> Result<()> {
        Ok(())
    }

    fn has_lightgroup(&self, index: usize) -> bool {
        index < self.registered_lightgroups
    }
}

/// Host with one in-memory surface per enabled layer and a shared
/// cancellation flag
pub struct DemoHost {
    surfaces: HashMap<String, MemorySurface>,
    cancel: Arc<AtomicBool>,
    preview: bool,
    status: Vec<String>,
    infos: Vec<String>,
}

impl DemoHost {
    pub fn new(settings: &RenderSettings) -> Self {
        let (width, height) = settings.filmsize();
        let mut surfaces = HashMap::new();
        for layer in settings.enabled_layers() {
            let layout = layer_pass_layout(layer, &settings.lightgroups);
            surfaces.insert(
                layer.name.clone(),
                MemorySurface::with_layout(width, height, &layout),
            );
        }
        Self {
            surfaces,
            cancel: Arc::new(AtomicBool::new(false)),
            preview: false,
            status: Vec::new(),
            infos: Vec::new(),
        }
    }

    pub fn set_preview(&mut self, preview: bool) {
        self.preview = preview;
    }

    /// Shared flag another thread (or a test) can set to cancel
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn surface(&self, layer_name: &str) -> Option<&MemorySurface> {
        self.surfaces.get(layer_name)
    }

    pub fn status_updates(&self) -> &[String] {
        &self.status
    }

    pub fn infos(&self) -> &[String] {
        &self.infos
    }
}

impl RenderHost for DemoHost {
    fn test_break(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn update_stats(&mut self, stage: &str, message: &str) {
        log::debug!("[{}] {}", stage, message);
        self.status.push(format!("{}: {}", stage, message));
    }

    fn report_info(&mut self, message: &str) {
        log::info!("{}", message);
        self.infos.push(message.to_string());
    }

    fn layer_surface(&mut self, layer_name: &str) -> Option<&mut dyn LayerSurface> {
        self.surfaces
            .get_mut(layer_name)
            .map(|s| s as &mut dyn LayerSurface)
    }

    fn is_preview(&self) -> bool {
        self.preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{HaltSettings, LayerSettings};

    #[test]
    fn session_progresses_to_halt_samples() {
        let settings = RenderSettings {
            halt: HaltSettings {
                enable: true,
                use_samples: true,
                samples: 1,
                ..HaltSettings::default()
            },
            ..RenderSettings::default()
        };
        let mut session = DemoSession::new(&settings, 0, 1_000_000.0);
        assert!(!session.has_done());

        session.start().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(session.has_done());
    }

    #[test]
    fn undefined_channels_fail_readback() {
        let settings = RenderSettings::default();
        let session = DemoSession::new(&settings, 1, 100.0);

        let mut buffer = vec![0.0_f32; 4];
        // No AOVs enabled, DEPTH was never exported
        let err = session
            .get_output_float(&FilmOutput::Channel(ChannelKind::Depth), &mut buffer, 0)
            .unwrap_err();
        assert!(err.to_string().contains("not defined"));

        // Group 0 is registered, group 1 is not
        assert!(session
            .get_output_float(
                &FilmOutput::Channel(ChannelKind::RadianceGroup),
                &mut buffer,
                0
            )
            .is_ok());
        assert!(session
            .get_output_float(
                &FilmOutput::Channel(ChannelKind::RadianceGroup),
                &mut buffer,
                1
            )
            .is_err());
    }

    #[test]
    fn exporter_cancel_yields_no_session() {
        let mut exporter = DemoExporter::new(RenderSettings::default());
        let mut remap = PipelineRemap::new();
        exporter.cancel_next_export();

        assert!(exporter.create_session(&mut remap).unwrap().is_none());
        // Only the next export is cancelled
        assert!(exporter.create_session(&mut remap).unwrap().is_some());
    }

    #[test]
    fn exporter_records_remaps_on_session_creation() {
        let mut exporter = DemoExporter::new(RenderSettings::default())
            .with_channel_remap("SHADING_NORMAL", 2);
        let mut remap = PipelineRemap::new();

        exporter.create_session(&mut remap).unwrap();
        assert_eq!(remap.slot_for("SHADING_NORMAL"), Some(2));
    }

    #[test]
    fn exporter_changes_are_consumed() {
        let mut exporter = DemoExporter::new(RenderSettings::default());
        assert!(!exporter.get_changes());

        exporter.queue_change();
        assert!(exporter.get_changes());
        assert!(!exporter.get_changes());
    }

    #[test]
    fn host_declares_surfaces_for_enabled_layers_only() {
        let mut settings = RenderSettings::default();
        settings.layers.push(LayerSettings {
            enabled: false,
            ..LayerSettings::new("off")
        });

        let mut host = DemoHost::new(&settings);
        assert!(host.layer_surface("RenderLayer").is_some());
        assert!(host.layer_surface("off").is_none());
    }
}

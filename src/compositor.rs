//! Per-frame import orchestration: pulls the combined image and every
//! enabled channel from the engine into the host's layer passes.

use std::collections::HashMap;

use crate::channel::{ChannelKind, ChannelSpec, FilmOutput, DEFAULT_SPEC};
use crate::engine::{RenderSession, SceneExporter};
use crate::error::{ChannelReadError, DriverError};
use crate::framebuffer::FrameBuffer;
use crate::settings::{LayerSettings, LightGroup};
use crate::surface::LayerSurface;

/// Override records for channels the host remapped to a user-visible
/// tonemapped imagepipeline slot. A remapped channel reads from that slot
/// instead of its raw output and always has the default (3-float,
/// unnormalized) shape, regardless of its native spec.
#[derive(Debug, Default)]
pub struct PipelineRemap {
    slots: HashMap<String, u32>,
}

impl PipelineRemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all overrides (done once per layer render)
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Remap a channel buffer key to an imagepipeline slot
    pub fn assign(&mut self, key: impl Into<String>, slot: u32) {
        self.slots.insert(key.into(), slot);
    }

    pub fn slot_for(&self, key: &str) -> Option<u32> {
        self.slots.get(key).copied()
    }
}

/// Fully resolved import plan for one channel
struct ResolvedChannel {
    /// Buffer key (channel name, plus group index for indexed kinds)
    key: String,
    pass_name: String,
    output: FilmOutput,
    index: u32,
    spec: &'static ChannelSpec,
}

/// Resolve spec, buffer key, output source and destination pass for a
/// channel, consulting remap overrides before the registry
fn resolve(
    kind: &ChannelKind,
    index: u32,
    lightgroup_name: Option<&str>,
    remap: &PipelineRemap,
) -> ResolvedChannel {
    let mut key = kind.name().to_string();
    if kind.needs_index() {
        // Differentiate between the outputs that exist once per index
        key.push_str(&index.to_string());
    }

    let (output, index, spec) = match remap.slot_for(&key) {
        Some(slot) => (FilmOutput::RgbImagePipeline, slot, &DEFAULT_SPEC),
        None => (FilmOutput::Channel(kind.clone()), index, kind.spec()),
    };

    let pass_name = match lightgroup_name {
        Some(name) => name.to_string(),
        None => kind.pass_name().to_string(),
    };

    ResolvedChannel {
        key,
        pass_name,
        output,
        index,
        spec,
    }
}

/// Import one channel: get-or-create its buffer, fill it from the engine
/// and convert it into the destination pass
fn import_channel(
    fb: &mut FrameBuffer,
    session: &dyn RenderSession,
    kind: &ChannelKind,
    index: u32,
    lightgroup_name: Option<&str>,
    remap: &PipelineRemap,
    surface: &mut dyn LayerSurface,
) -> Result<(), ChannelReadError> {
    let resolved = resolve(kind, index, lightgroup_name, remap);

    let buffer = fb.buffer_for(
        &resolved.key,
        resolved.spec.element_count,
        resolved.spec.representation,
    );
    FrameBuffer::fill(session, &resolved.key, &resolved.output, buffer, resolved.index)?;

    let pass = surface.pass_mut(&resolved.pass_name).ok_or_else(|| {
        ChannelReadError::new(
            resolved.key.clone(),
            anyhow::anyhow!("no pass named \"{}\" declared", resolved.pass_name),
        )
    })?;
    fb.write_pass(resolved.spec, &resolved.key, pass)
}

/// Composite one frame: combined image first, then every enabled AOV and
/// light-group channel. Single-channel failures are logged and do not
/// prevent the rest of the frame.
#[allow(clippy::too_many_arguments)]
pub fn composite(
    fb: &mut FrameBuffer,
    session: &dyn RenderSession,
    layer: &LayerSettings,
    lightgroups: &[LightGroup],
    exporter: &dyn SceneExporter,
    remap: &PipelineRemap,
    surface: &mut dyn LayerSurface,
    preview: bool,
) -> Result<(), DriverError> {
    fb.read_combined(session)
        .map_err(|err| DriverError::CombinedRead(err.into()))?;

    let combined = surface
        .pass_mut("Combined")
        .ok_or_else(|| DriverError::MissingCombinedPass(layer.name.clone()))?;
    fb.write_combined(combined)
        .map_err(|err| DriverError::CombinedRead(err.into()))?;

    // AOVs are only imported in final renders, not in preview mode
    if preview {
        return Ok(());
    }

    for kind in &layer.aovs {
        if let Err(err) = import_channel(fb, session, kind, 0, None, remap, surface) {
            log::error!("Error on import of AOV {}: {}", err.channel, err.source);
        }
    }

    for (i, group) in lightgroups.iter().enumerate() {
        if !exporter.has_lightgroup(i) {
            // No light in the scene uses this group, so the channel was
            // never defined; reading it is a hard failure in the engine
            continue;
        }

        let result = import_channel(
            fb,
            session,
            &ChannelKind::RadianceGroup,
            i as u32,
            Some(&group.name),
            remap,
            surface,
        );
        if let Err(err) = result {
            log::error!(
                "Error on import of light group AOV {}: {}",
                group.name,
                err.source
            );
        }
    }

    Ok(())
}

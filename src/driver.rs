//! Render loop controller: drives the session lifecycle per layer
//! (start, fast refresh, steady refresh, stop) under halt conditions,
//! staying responsive to cancellation through cooperative polling.

use std::thread;
use std::time::{Duration, Instant};

use crate::compositor::{self, PipelineRemap};
use crate::engine::{RenderHost, RenderSession, SceneExporter};
use crate::error::DriverError;
use crate::errorlog::ErrorLog;
use crate::framebuffer::FrameBuffer;
use crate::halt;
use crate::settings::{FilesaverFormat, LayerSettings, RenderSettings};

/// Cancellation checks per poll sleep during the fast refresh phase
const FAST_REFRESH_BREAK_CHECKS: u32 = 10;

/// Timing knobs of the polling loop, in seconds. Tests compress these to
/// keep wall-clock time down; production uses the defaults.
#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    /// Wall-clock window of the fast startup refresh phase
    pub fast_refresh_duration: f32,
    /// Cadence of statistics polls in the steady phase
    pub stat_refresh_interval: f32,
    /// Delay before the suggested clamp value is computed
    pub clamp_warmup: f32,
    /// Sleep between loop iterations
    pub poll_sleep: f32,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            fast_refresh_duration: 5.0,
            stat_refresh_interval: 1.0,
            clamp_warmup: 10.0,
            poll_sleep: 1.0 / 60.0,
        }
    }
}

/// Mutable per-render state. Owned by the loop controller and lent to the
/// compositor and buffer manager, never ambient.
pub struct RenderContext {
    pub exporter: Box<dyn SceneExporter>,
    /// Live session while a layer renders
    pub session: Option<Box<dyn RenderSession>>,
    /// Frame buffers of the layer currently rendering
    pub framebuffer: Option<FrameBuffer>,
    /// Channels remapped to tonemapped imagepipeline slots
    pub remap: PipelineRemap,
}

impl RenderContext {
    pub fn new(exporter: Box<dyn SceneExporter>) -> Self {
        Self {
            exporter,
            session: None,
            framebuffer: None,
            remap: PipelineRemap::new(),
        }
    }
}

/// Suggested radiance clamp value from the average film luminance.
/// Only meaningful while clamping is disabled.
pub fn find_suggested_clamp_value(session: &dyn RenderSession) -> f32 {
    let luminance = session.film_luminance();
    if luminance <= 0.0 {
        0.0
    } else {
        let scaled = luminance * 10.0;
        scaled * scaled
    }
}

/// Render all enabled layers sequentially. Fatal configuration errors
/// abort before any session starts; cancellation skips remaining layers.
pub fn render(
    host: &mut dyn RenderHost,
    ctx: &mut RenderContext,
    settings: &RenderSettings,
    errorlog: &mut ErrorLog,
    timing: &LoopTiming,
) -> Result<(), DriverError> {
    errorlog.clear();

    if settings.enabled_layers().count() > 1 && settings.imagepipeline.tonemapper.is_automatic() {
        errorlog.add_warning(
            "Using an automatic tonemapper with multiple render layers \
             will result in brightness differences",
        );
    }

    halt::check_halt_conditions(settings, errorlog)?;

    for layer in &settings.layers {
        if !layer.enabled {
            continue;
        }
        if host.layer_surface(&layer.name).is_none() {
            // The host declined to provide a surface for this layer
            continue;
        }

        log::info!("Rendering layer \"{}\"", layer.name);
        render_layer(host, ctx, settings, layer, timing)?;

        if host.test_break() {
            // Skip the remaining layers
            return Ok(());
        }
        log::info!("Finished rendering layer \"{}\"", layer.name);
    }

    Ok(())
}

/// Drive one layer through start, fast refresh, steady refresh and stop
fn render_layer(
    host: &mut dyn RenderHost,
    ctx: &mut RenderContext,
    settings: &RenderSettings,
    layer: &LayerSettings,
    timing: &LoopTiming,
) -> Result<(), DriverError> {
    ctx.remap.clear();

    // The exporter records imagepipeline remap assignments while it builds
    // the session
    let session = ctx
        .exporter
        .create_session(&mut ctx.remap)
        .map_err(DriverError::SessionSetup)?;
    let Some(mut session) = session else {
        // No session and no error: the user cancelled during export
        log::info!("Export cancelled by user.");
        return Ok(());
    };

    host.update_stats("Render", "Starting session...");
    ctx.framebuffer = Some(FrameBuffer::new(settings));
    session.start().map_err(DriverError::SessionStart)?;
    ctx.session = Some(session);

    let start = Instant::now();

    if settings.config.use_filesaver {
        // The engine only serializes the scene to disk in this mode
        finish_filesaver(host, ctx, settings);
        return Ok(());
    }

    let mut done = false;

    // Fast refresh on startup so the user quickly sees an image forming.
    // Skipped during animation renders for performance.
    if !settings.is_animation {
        let refresh_interval = settings.display.shortest_interval();
        let mut last_refresh: Option<Instant> = None;

        while !done {
            let now = Instant::now();

            let refresh_due = last_refresh
                .map_or(true, |t| now.duration_since(t).as_secs_f32() > refresh_interval);
            if refresh_due {
                refresh(host, ctx, settings, layer, true, None);
                last_refresh = Some(now);
                done = host.test_break() || session_has_done(ctx);
            }

            if now.duration_since(start).as_secs_f32() > timing.fast_refresh_duration {
                // Time to switch to the slow refresh loop below
                break;
            }

            // Check for cancellation at sub-sleep granularity to keep
            // cancel latency low in this phase
            for _ in 0..FAST_REFRESH_BREAK_CHECKS {
                if host.test_break() {
                    done = true;
                    break;
                }
                thread::sleep(Duration::from_secs_f32(
                    timing.poll_sleep / FAST_REFRESH_BREAK_CHECKS as f32,
                ));
            }
        }
    }

    // Main loop, refreshing the film at the user-configured interval
    let mut last_film_refresh = Instant::now();
    let mut last_stat_refresh = Instant::now();
    let mut computed_optimal_clamp = false;

    while !done {
        let now = Instant::now();

        if now.duration_since(last_stat_refresh).as_secs_f32() > timing.stat_refresh_interval {
            // Stats must be checked often to notice a met halt condition,
            // but film drawing is expensive and runs on its own interval
            let time_until_film_refresh = settings.display.interval
                - now.duration_since(last_film_refresh).as_secs_f32();
            let mut draw_film = time_until_film_refresh <= 0.0;

            // Session update (imagepipeline, light groups)
            let changes = ctx.exporter.get_changes();
            apply_changes(ctx, changes);
            // Refresh quickly when the user changed something
            draw_film |= changes;

            refresh(host, ctx, settings, layer, draw_film, Some(time_until_film_refresh));
            done = host.test_break() || session_has_done(ctx);

            last_stat_refresh = now;
            if draw_film {
                last_film_refresh = now;
            }
        }

        // Report the optimal clamp value once after a warmup phase, only
        // while clamping is disabled - otherwise the value is meaningless
        if !computed_optimal_clamp
            && !settings.config.path.use_clamping
            && start.elapsed().as_secs_f32() > timing.clamp_warmup
        {
            if let Some(session) = ctx.session.as_deref() {
                let optimal_clamp = find_suggested_clamp_value(session);
                log::info!("Recommended clamp value: {}", optimal_clamp);
                host.report_info(&format!("Recommended clamp value: {}", optimal_clamp));
            }
            computed_optimal_clamp = true;
        }

        // Don't burn CPU on this loop, but stay responsive
        thread::sleep(Duration::from_secs_f32(timing.poll_sleep));
    }

    // The user wants to stop or a halt condition was reached:
    // draw the final result, then shut the session down
    refresh(host, ctx, settings, layer, true, None);
    host.update_stats("Render", "Stopping session...");
    if let Some(session) = ctx.session.as_deref_mut() {
        session.stop();
    }
    ctx.session = None;
    ctx.framebuffer = None;
    Ok(())
}

/// File-export mode: stop immediately, report where the engine wrote the
/// scene, release the session. No refresh phases.
fn finish_filesaver(host: &mut dyn RenderHost, ctx: &mut RenderContext, settings: &RenderSettings) {
    if let Some(session) = ctx.session.as_deref_mut() {
        session.stop();

        let key = match settings.config.filesaver_format {
            FilesaverFormat::Bin => "filesaver.filename",
            FilesaverFormat::Txt => "filesaver.directory",
        };
        match session.render_config().get(key) {
            Some(path) => host.report_info(&format!("Exported to \"{}\"", path)),
            None => log::warn!("Engine did not report a filesaver output path"),
        }
    }
    ctx.session = None;
    ctx.framebuffer = None;
}

fn session_has_done(ctx: &RenderContext) -> bool {
    ctx.session.as_deref().map_or(true, |s| s.has_done())
}

/// Push pending configuration edits into the running session
fn apply_changes(ctx: &mut RenderContext, changes: bool) {
    let RenderContext {
        exporter, session, ..
    } = ctx;
    if let Some(session) = session.as_deref_mut() {
        if let Err(err) = exporter.update_session(changes, session) {
            log::error!("Failed to apply configuration changes: {}", err);
        }
    }
}

/// Update the host status display and optionally draw the film into the
/// layer surface. Frame-level failures are logged, never fatal.
fn refresh(
    host: &mut dyn RenderHost,
    ctx: &mut RenderContext,
    settings: &RenderSettings,
    layer: &LayerSettings,
    draw_film: bool,
    time_until_film_refresh: Option<f32>,
) {
    let preview = host.is_preview();
    let RenderContext {
        exporter,
        session,
        framebuffer,
        remap,
    } = ctx;
    let (Some(session), Some(fb)) = (session.as_deref(), framebuffer.as_mut()) else {
        return;
    };

    let stats = session.statistics();
    let mut status = format!("{:.0}s | {} samples", stats.elapsed_seconds, stats.samples);
    if let Some(remaining) = time_until_film_refresh {
        if remaining > 0.0 {
            status.push_str(&format!(" | film refresh in {:.0}s", remaining));
        }
    }
    host.update_stats("Render", &status);

    if draw_film {
        let Some(surface) = host.layer_surface(&layer.name) else {
            return;
        };
        let result = compositor::composite(
            fb,
            session,
            layer,
            &settings.lightgroups,
            exporter.as_ref(),
            remap,
            surface,
            preview,
        );
        if let Err(err) = result {
            log::error!("Film refresh failed: {}", err);
        }
    }
}

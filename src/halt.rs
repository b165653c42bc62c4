//! Pre-flight validation of halt conditions across all enabled layers.
//! Runs once, before any session is started.

use crate::error::DriverError;
use crate::errorlog::ErrorLog;
use crate::settings::RenderSettings;

/// Check that a valid halt condition exists wherever one is required.
///
/// A halt condition is required when more than one layer is enabled or the
/// render is an animation. With multiple layers, every layer may override
/// the global condition; a layer that opts to override must supply a valid
/// condition of its own. All invalid layers are recorded on the error log,
/// not just the first.
pub fn check_halt_conditions(
    settings: &RenderSettings,
    errorlog: &mut ErrorLog,
) -> Result<(), DriverError> {
    let enabled_layers: Vec<_> = settings.enabled_layers().collect();
    let needs_halt_condition = enabled_layers.len() > 1 || settings.is_animation;

    let mut is_halt_enabled = true;

    if enabled_layers.len() > 1 {
        // With multiple layers we need a halt condition for each one
        for layer in &enabled_layers {
            if layer.halt.enable {
                // The layer overrides the global halt conditions
                let has_halt_condition = layer.halt.is_enabled();
                is_halt_enabled &= has_halt_condition;

                if !has_halt_condition {
                    errorlog.add_error(format!(
                        "Halt condition missing for render layer \"{}\"",
                        layer.name
                    ));
                }
            } else {
                is_halt_enabled = false;
            }
        }
    }

    // Fall back to the global halt conditions
    if !is_halt_enabled {
        is_halt_enabled = settings.halt.is_enabled();
    }

    if needs_halt_condition && !is_halt_enabled {
        return Err(DriverError::MissingHaltCondition);
    }
    Ok(())
}

use std::collections::HashMap;

use crate::channel::PassDecl;

/// One named pass of the host compositing surface: a flat f32 rect with a
/// fixed component width, pre-declared before rendering starts
#[derive(Debug, Clone)]
pub struct Pass {
    components: usize,
    rect: Vec<f32>,
}

impl Pass {
    /// Create a zeroed pass for the given resolution and component width
    pub fn new(width: usize, height: usize, components: usize) -> Self {
        Self {
            components,
            rect: vec![0.0; width * height * components],
        }
    }

    /// Components per pixel
    pub fn components(&self) -> usize {
        self.components
    }

    pub fn rect(&self) -> &[f32] {
        &self.rect
    }

    pub fn rect_mut(&mut self) -> &mut [f32] {
        &mut self.rect
    }
}

/// Per-layer compositing surface exposed by the host. The core only
/// writes into passes by name; it never creates passes at draw time.
pub trait LayerSurface {
    /// Look up a pre-declared pass by name
    fn pass_mut(&mut self, name: &str) -> Option<&mut Pass>;
}

/// In-memory surface backed by a pass map. Used by the demo binary and
/// as the reference host surface in tests.
#[derive(Debug, Default)]
pub struct MemorySurface {
    passes: HashMap<String, Pass>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a surface with all passes from a layer layout pre-declared
    pub fn with_layout(width: usize, height: usize, layout: &[PassDecl]) -> Self {
        let mut surface = Self::new();
        for decl in layout {
            surface.declare_pass(&decl.name, width, height, decl.components);
        }
        surface
    }

    /// Declare a pass before rendering. Re-declaring a name replaces it.
    pub fn declare_pass(&mut self, name: &str, width: usize, height: usize, components: usize) {
        self.passes
            .insert(name.to_string(), Pass::new(width, height, components));
    }

    pub fn pass(&self, name: &str) -> Option<&Pass> {
        self.passes.get(name)
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.keys().map(String::as_str)
    }
}

impl LayerSurface for MemorySurface {
    fn pass_mut(&mut self, name: &str) -> Option<&mut Pass> {
        self.passes.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_is_zero_initialized() {
        let pass = Pass::new(4, 2, 3);
        assert_eq!(pass.components(), 3);
        assert_eq!(pass.rect().len(), 4 * 2 * 3);
        assert!(pass.rect().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn surface_only_serves_declared_passes() {
        let mut surface = MemorySurface::new();
        surface.declare_pass("Combined", 2, 2, 4);

        assert!(surface.pass_mut("Combined").is_some());
        assert!(surface.pass_mut("DEPTH").is_none());
    }

    #[test]
    fn with_layout_declares_everything() {
        let layout = vec![
            PassDecl {
                name: "Combined".to_string(),
                components: 4,
            },
            PassDecl {
                name: "Depth".to_string(),
                components: 1,
            },
        ];
        let mut surface = MemorySurface::with_layout(3, 3, &layout);

        assert_eq!(surface.pass_mut("Combined").unwrap().rect().len(), 36);
        assert_eq!(surface.pass_mut("Depth").unwrap().rect().len(), 9);
    }
}

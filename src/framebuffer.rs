use std::collections::HashMap;

use crate::channel::{ChannelSpec, FilmOutput, Representation};
use crate::convert::{self, ConvertError, ConvertFn};
use crate::engine::RenderSession;
use crate::error::ChannelReadError;
use crate::settings::RenderSettings;
use crate::surface::Pass;

/// Flat per-channel readback buffer in the engine's native representation
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelBuffer {
    Float32(Vec<f32>),
    Uint32(Vec<u32>),
}

impl ChannelBuffer {
    /// Allocate a zero-initialized buffer
    pub fn new(representation: Representation, len: usize) -> Self {
        match representation {
            Representation::Float32 => ChannelBuffer::Float32(vec![0.0; len]),
            Representation::Uint32 => ChannelBuffer::Uint32(vec![0; len]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChannelBuffer::Float32(data) => data.len(),
            ChannelBuffer::Uint32(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn representation(&self) -> Representation {
        match self {
            ChannelBuffer::Float32(_) => Representation::Float32,
            ChannelBuffer::Uint32(_) => Representation::Uint32,
        }
    }

    /// Stable address of the backing storage, used to verify buffer reuse
    pub fn as_ptr(&self) -> *const u8 {
        match self {
            ChannelBuffer::Float32(data) => data.as_ptr() as *const u8,
            ChannelBuffer::Uint32(data) => data.as_ptr() as *const u8,
        }
    }
}

/// Per-render-layer frame state: the combined buffer plus lazily created,
/// reused AOV buffers. Constructed once per layer render; a resolution
/// change means a new FrameBuffer, buffers are never resized.
#[derive(Debug)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    transparent: bool,
    combined_output: FilmOutput,
    convert_combined: ConvertFn,
    combined_buffer: ChannelBuffer,
    aov_buffers: HashMap<String, ChannelBuffer>,
}

impl FrameBuffer {
    pub fn new(settings: &RenderSettings) -> Self {
        let (width, height) = settings.filmsize();
        let transparent = settings.imagepipeline.transparent_film;

        let (depth, combined_output, convert_combined): (usize, FilmOutput, ConvertFn) =
            if transparent {
                (4, FilmOutput::RgbaImagePipeline, convert::float4_to_float4)
            } else {
                // 3-channel source, alpha synthesized on the way out
                (3, FilmOutput::RgbImagePipeline, convert::float3_to_float4)
            };

        Self {
            width,
            height,
            transparent,
            combined_output,
            convert_combined,
            combined_buffer: ChannelBuffer::new(Representation::Float32, width * height * depth),
            aov_buffers: HashMap::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transparent(&self) -> bool {
        self.transparent
    }

    pub fn combined_len(&self) -> usize {
        self.combined_buffer.len()
    }

    /// Pull the tonemapped combined image from the engine
    pub fn read_combined(&mut self, session: &dyn RenderSession) -> Result<(), ChannelReadError> {
        Self::fill(
            session,
            "Combined",
            &self.combined_output,
            &mut self.combined_buffer,
            0,
        )
    }

    /// Convert the combined buffer into the host's 4-component pass
    pub fn write_combined(&self, pass: &mut Pass) -> Result<(), ConvertError> {
        (self.convert_combined)(self.width, self.height, &self.combined_buffer, pass, false)
    }

    /// Get the buffer for `key`, allocating it on first use. Subsequent
    /// calls return the same buffer; it is never resized.
    pub fn buffer_for(
        &mut self,
        key: &str,
        element_count: usize,
        representation: Representation,
    ) -> &mut ChannelBuffer {
        let len = self.width * self.height * element_count;
        self.aov_buffers
            .entry(key.to_string())
            .or_insert_with(|| ChannelBuffer::new(representation, len))
    }

    /// Read one film output into `buffer`, dispatching on its
    /// representation. Failures carry the channel key.
    pub fn fill(
        session: &dyn RenderSession,
        key: &str,
        output: &FilmOutput,
        buffer: &mut ChannelBuffer,
        index: u32,
    ) -> Result<(), ChannelReadError> {
        let result = match buffer {
            ChannelBuffer::Uint32(data) => session.get_output_uint(output, data, index),
            ChannelBuffer::Float32(data) => session.get_output_float(output, data, index),
        };
        result.map_err(|source| ChannelReadError::new(key, source))
    }

    /// Convert a filled buffer into a host pass using the channel's spec
    pub fn write_pass(
        &self,
        spec: &ChannelSpec,
        key: &str,
        pass: &mut Pass,
    ) -> Result<(), ChannelReadError> {
        let buffer = self
            .aov_buffers
            .get(key)
            .ok_or_else(|| ChannelReadError::new(key, anyhow::anyhow!("buffer never filled")))?;
        (spec.convert)(self.width, self.height, buffer, pass, spec.normalize)
            .map_err(|err| ChannelReadError::new(key, err.into()))
    }

    #[cfg(test)]
    pub(crate) fn buffer(&self, key: &str) -> Option<&ChannelBuffer> {
        self.aov_buffers.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelKind;
    use crate::settings::ImagepipelineSettings;

    fn settings(width: u32, height: u32, transparent: bool) -> RenderSettings {
        RenderSettings {
            film_width: width,
            film_height: height,
            imagepipeline: ImagepipelineSettings {
                transparent_film: transparent,
                ..ImagepipelineSettings::default()
            },
            ..RenderSettings::default()
        }
    }

    #[test]
    fn combined_buffer_sized_by_transparency() {
        let opaque = FrameBuffer::new(&settings(8, 4, false));
        assert_eq!(opaque.combined_len(), 8 * 4 * 3);

        let transparent = FrameBuffer::new(&settings(8, 4, true));
        assert_eq!(transparent.combined_len(), 8 * 4 * 4);
    }

    #[test]
    fn buffer_for_reuses_the_same_allocation() {
        let mut fb = FrameBuffer::new(&settings(4, 4, false));

        let first = fb.buffer_for("DEPTH", 1, Representation::Float32).as_ptr();
        let second = fb.buffer_for("DEPTH", 1, Representation::Float32).as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn buffer_for_allocates_zeroed_with_requested_shape() {
        let mut fb = FrameBuffer::new(&settings(3, 2, false));

        let buffer = fb.buffer_for("MATERIAL_ID", 1, Representation::Uint32);
        assert_eq!(buffer.representation(), Representation::Uint32);
        assert_eq!(buffer.len(), 3 * 2);
        assert_eq!(*buffer, ChannelBuffer::Uint32(vec![0; 6]));
    }

    #[test]
    fn default_spec_fallback_allocates_three_floats() {
        let mut fb = FrameBuffer::new(&settings(2, 2, false));
        let kind = ChannelKind::Other("NOISE_ESTIMATE".to_string());
        let spec = kind.spec();

        let buffer = fb.buffer_for(kind.name(), spec.element_count, spec.representation);
        assert_eq!(buffer.representation(), Representation::Float32);
        assert_eq!(buffer.len(), 2 * 2 * 3);
    }

    #[test]
    fn distinct_keys_get_distinct_buffers() {
        let mut fb = FrameBuffer::new(&settings(2, 2, false));

        let first = fb.buffer_for("RADIANCE_GROUP0", 3, Representation::Float32).as_ptr();
        let second = fb.buffer_for("RADIANCE_GROUP1", 3, Representation::Float32).as_ptr();
        assert_ne!(first, second);
    }
}

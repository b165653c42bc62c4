//! Conversion functions that copy an engine-side channel buffer into a
//! host pass, optionally normalizing by the buffer maximum.

use thiserror::Error;

use crate::framebuffer::ChannelBuffer;
use crate::surface::Pass;

/// Signature shared by all channel conversion functions
pub type ConvertFn =
    fn(width: usize, height: usize, src: &ChannelBuffer, dst: &mut Pass, normalize: bool) -> Result<(), ConvertError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("source buffer has {actual} elements, expected {expected}")]
    SourceSize { expected: usize, actual: usize },
    #[error("destination pass holds {actual} components per pixel, expected {expected}")]
    PassWidth { expected: usize, actual: usize },
    #[error("destination pass holds {actual} values, expected {expected}")]
    PassSize { expected: usize, actual: usize },
    #[error("buffer representation does not match the channel spec")]
    Representation,
}

fn check_float<'a>(
    src: &'a ChannelBuffer,
    pixels: usize,
    elements: usize,
) -> Result<&'a [f32], ConvertError> {
    let data = match src {
        ChannelBuffer::Float32(data) => data.as_slice(),
        ChannelBuffer::Uint32(_) => return Err(ConvertError::Representation),
    };
    if data.len() != pixels * elements {
        return Err(ConvertError::SourceSize {
            expected: pixels * elements,
            actual: data.len(),
        });
    }
    Ok(data)
}

fn check_uint<'a>(
    src: &'a ChannelBuffer,
    pixels: usize,
    elements: usize,
) -> Result<&'a [u32], ConvertError> {
    let data = match src {
        ChannelBuffer::Uint32(data) => data.as_slice(),
        ChannelBuffer::Float32(_) => return Err(ConvertError::Representation),
    };
    if data.len() != pixels * elements {
        return Err(ConvertError::SourceSize {
            expected: pixels * elements,
            actual: data.len(),
        });
    }
    Ok(data)
}

fn check_pass(dst: &Pass, pixels: usize, components: usize) -> Result<(), ConvertError> {
    if dst.components() != components {
        return Err(ConvertError::PassWidth {
            expected: components,
            actual: dst.components(),
        });
    }
    // A pass declared at a different resolution than the frame buffer
    if dst.rect().len() != pixels * components {
        return Err(ConvertError::PassSize {
            expected: pixels * components,
            actual: dst.rect().len(),
        });
    }
    Ok(())
}

fn max_of(data: &[f32]) -> f32 {
    data.iter().copied().fold(0.0_f32, f32::max)
}

/// Scale factor that maps the buffer maximum to 1.0 (zero for empty data)
fn normalize_scale(max: f32) -> f32 {
    if max > 0.0 {
        1.0 / max
    } else {
        0.0
    }
}

/// Straight copy of an n-element float buffer into an n-component pass
fn float_n_to_n(
    n: usize,
    width: usize,
    height: usize,
    src: &ChannelBuffer,
    dst: &mut Pass,
    normalize: bool,
) -> Result<(), ConvertError> {
    let pixels = width * height;
    let data = check_float(src, pixels, n)?;
    check_pass(dst, pixels, n)?;

    let rect = dst.rect_mut();
    if normalize {
        let scale = normalize_scale(max_of(data));
        for (out, value) in rect.iter_mut().zip(data) {
            *out = value * scale;
        }
    } else {
        rect.copy_from_slice(data);
    }
    Ok(())
}

pub fn float1_to_float1(
    width: usize,
    height: usize,
    src: &ChannelBuffer,
    dst: &mut Pass,
    normalize: bool,
) -> Result<(), ConvertError> {
    float_n_to_n(1, width, height, src, dst, normalize)
}

pub fn float3_to_float3(
    width: usize,
    height: usize,
    src: &ChannelBuffer,
    dst: &mut Pass,
    normalize: bool,
) -> Result<(), ConvertError> {
    float_n_to_n(3, width, height, src, dst, normalize)
}

pub fn float4_to_float4(
    width: usize,
    height: usize,
    src: &ChannelBuffer,
    dst: &mut Pass,
    normalize: bool,
) -> Result<(), ConvertError> {
    float_n_to_n(4, width, height, src, dst, normalize)
}

/// RGB source into a 4-component pass, alpha synthesized as opaque
pub fn float3_to_float4(
    width: usize,
    height: usize,
    src: &ChannelBuffer,
    dst: &mut Pass,
    normalize: bool,
) -> Result<(), ConvertError> {
    let pixels = width * height;
    let data = check_float(src, pixels, 3)?;
    check_pass(dst, pixels, 4)?;

    let scale = if normalize {
        normalize_scale(max_of(data))
    } else {
        1.0
    };

    let rect = dst.rect_mut();
    for i in 0..pixels {
        rect[i * 4] = data[i * 3] * scale;
        rect[i * 4 + 1] = data[i * 3 + 1] * scale;
        rect[i * 4 + 2] = data[i * 3 + 2] * scale;
        rect[i * 4 + 3] = 1.0;
    }
    Ok(())
}

/// 2-element UV buffer padded to a 3-component pass, third component 1.0
pub fn uv_to_float3(
    width: usize,
    height: usize,
    src: &ChannelBuffer,
    dst: &mut Pass,
    normalize: bool,
) -> Result<(), ConvertError> {
    let pixels = width * height;
    let data = check_float(src, pixels, 2)?;
    check_pass(dst, pixels, 3)?;

    let scale = if normalize {
        normalize_scale(max_of(data))
    } else {
        1.0
    };

    let rect = dst.rect_mut();
    for i in 0..pixels {
        rect[i * 3] = data[i * 2] * scale;
        rect[i * 3 + 1] = data[i * 2 + 1] * scale;
        rect[i * 3 + 2] = 1.0;
    }
    Ok(())
}

/// Unsigned integer channel (ids, sample counts) into a 1-component pass
pub fn uint1_to_float1(
    width: usize,
    height: usize,
    src: &ChannelBuffer,
    dst: &mut Pass,
    normalize: bool,
) -> Result<(), ConvertError> {
    let pixels = width * height;
    let data = check_uint(src, pixels, 1)?;
    check_pass(dst, pixels, 1)?;

    let rect = dst.rect_mut();
    if normalize {
        let max = data.iter().copied().max().unwrap_or(0);
        let scale = normalize_scale(max as f32);
        for (out, value) in rect.iter_mut().zip(data) {
            *out = *value as f32 * scale;
        }
    } else {
        for (out, value) in rect.iter_mut().zip(data) {
            *out = *value as f32;
        }
    }
    Ok(())
}

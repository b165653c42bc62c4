use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::convert::{self, ConvertFn};
use crate::settings::{LayerSettings, LightGroup};

/// Numeric representation of a channel's intermediate buffer.
/// Everything is converted to f32 for the host in the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    Float32,
    Uint32,
}

/// How one engine output channel is read back and converted
#[derive(Debug, Clone, Copy)]
pub struct ChannelSpec {
    /// Elements per pixel in the engine's native layout
    pub element_count: usize,
    pub representation: Representation,
    pub convert: ConvertFn,
    /// Divide by the buffer maximum before writing to the pass
    pub normalize: bool,
}

/// Default spec for channels without a registry entry
/// (per-light-group radiance, dynamically named outputs, ...)
pub const DEFAULT_SPEC: ChannelSpec = ChannelSpec {
    element_count: 3,
    representation: Representation::Float32,
    convert: convert::float3_to_float3,
    normalize: false,
};

const RGBA_SPEC: ChannelSpec = ChannelSpec {
    element_count: 4,
    representation: Representation::Float32,
    convert: convert::float4_to_float4,
    normalize: false,
};

const FLOAT1_SPEC: ChannelSpec = ChannelSpec {
    element_count: 1,
    representation: Representation::Float32,
    convert: convert::float1_to_float1,
    normalize: false,
};

const FLOAT1_NORMALIZED_SPEC: ChannelSpec = ChannelSpec {
    element_count: 1,
    representation: Representation::Float32,
    convert: convert::float1_to_float1,
    normalize: true,
};

const UINT1_SPEC: ChannelSpec = ChannelSpec {
    element_count: 1,
    representation: Representation::Uint32,
    convert: convert::uint1_to_float1,
    normalize: false,
};

const UINT1_NORMALIZED_SPEC: ChannelSpec = ChannelSpec {
    element_count: 1,
    representation: Representation::Uint32,
    convert: convert::uint1_to_float1,
    normalize: true,
};

const UV_SPEC: ChannelSpec = ChannelSpec {
    element_count: 2,
    representation: Representation::Float32,
    convert: convert::uv_to_float3,
    normalize: false,
};

/// Output channel identifier. Known kinds carry their spec in a fixed
/// table; anything else travels as `Other` and uses the default spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Rgb,
    Rgba,
    Alpha,
    Depth,
    Position,
    GeometryNormal,
    ShadingNormal,
    MaterialId,
    ObjectId,
    Emission,
    DirectDiffuse,
    DirectGlossy,
    IndirectDiffuse,
    IndirectGlossy,
    IndirectSpecular,
    MaterialIdMask,
    ObjectIdMask,
    DirectShadowMask,
    IndirectShadowMask,
    Uv,
    Raycount,
    Samplecount,
    Convergence,
    Irradiance,
    ByMaterialId,
    ByObjectId,
    RadianceGroup,
    /// Channel the registry doesn't know; rendered with the default spec
    Other(String),
}

impl ChannelKind {
    /// Canonical engine-side channel name
    pub fn name(&self) -> &str {
        match self {
            ChannelKind::Rgb => "RGB",
            ChannelKind::Rgba => "RGBA",
            ChannelKind::Alpha => "ALPHA",
            ChannelKind::Depth => "DEPTH",
            ChannelKind::Position => "POSITION",
            ChannelKind::GeometryNormal => "GEOMETRY_NORMAL",
            ChannelKind::ShadingNormal => "SHADING_NORMAL",
            ChannelKind::MaterialId => "MATERIAL_ID",
            ChannelKind::ObjectId => "OBJECT_ID",
            ChannelKind::Emission => "EMISSION",
            ChannelKind::DirectDiffuse => "DIRECT_DIFFUSE",
            ChannelKind::DirectGlossy => "DIRECT_GLOSSY",
            ChannelKind::IndirectDiffuse => "INDIRECT_DIFFUSE",
            ChannelKind::IndirectGlossy => "INDIRECT_GLOSSY",
            ChannelKind::IndirectSpecular => "INDIRECT_SPECULAR",
            ChannelKind::MaterialIdMask => "MATERIAL_ID_MASK",
            ChannelKind::ObjectIdMask => "OBJECT_ID_MASK",
            ChannelKind::DirectShadowMask => "DIRECT_SHADOW_MASK",
            ChannelKind::IndirectShadowMask => "INDIRECT_SHADOW_MASK",
            ChannelKind::Uv => "UV",
            ChannelKind::Raycount => "RAYCOUNT",
            ChannelKind::Samplecount => "SAMPLECOUNT",
            ChannelKind::Convergence => "CONVERGENCE",
            ChannelKind::Irradiance => "IRRADIANCE",
            ChannelKind::ByMaterialId => "BY_MATERIAL_ID",
            ChannelKind::ByObjectId => "BY_OBJECT_ID",
            ChannelKind::RadianceGroup => "RADIANCE_GROUP",
            ChannelKind::Other(name) => name,
        }
    }

    /// Parse an engine channel name; unknown names become `Other`
    pub fn parse(name: &str) -> ChannelKind {
        match name {
            "RGB" => ChannelKind::Rgb,
            "RGBA" => ChannelKind::Rgba,
            "ALPHA" => ChannelKind::Alpha,
            "DEPTH" => ChannelKind::Depth,
            "POSITION" => ChannelKind::Position,
            "GEOMETRY_NORMAL" => ChannelKind::GeometryNormal,
            "SHADING_NORMAL" => ChannelKind::ShadingNormal,
            "MATERIAL_ID" => ChannelKind::MaterialId,
            "OBJECT_ID" => ChannelKind::ObjectId,
            "EMISSION" => ChannelKind::Emission,
            "DIRECT_DIFFUSE" => ChannelKind::DirectDiffuse,
            "DIRECT_GLOSSY" => ChannelKind::DirectGlossy,
            "INDIRECT_DIFFUSE" => ChannelKind::IndirectDiffuse,
            "INDIRECT_GLOSSY" => ChannelKind::IndirectGlossy,
            "INDIRECT_SPECULAR" => ChannelKind::IndirectSpecular,
            "MATERIAL_ID_MASK" => ChannelKind::MaterialIdMask,
            "OBJECT_ID_MASK" => ChannelKind::ObjectIdMask,
            "DIRECT_SHADOW_MASK" => ChannelKind::DirectShadowMask,
            "INDIRECT_SHADOW_MASK" => ChannelKind::IndirectShadowMask,
            "UV" => ChannelKind::Uv,
            "RAYCOUNT" => ChannelKind::Raycount,
            "SAMPLECOUNT" => ChannelKind::Samplecount,
            "CONVERGENCE" => ChannelKind::Convergence,
            "IRRADIANCE" => ChannelKind::Irradiance,
            "BY_MATERIAL_ID" => ChannelKind::ByMaterialId,
            "BY_OBJECT_ID" => ChannelKind::ByObjectId,
            "RADIANCE_GROUP" => ChannelKind::RadianceGroup,
            other => ChannelKind::Other(other.to_string()),
        }
    }

    /// Resolve the readback/conversion spec. Lookups never fail:
    /// kinds without a table entry fall back to the default spec.
    pub fn spec(&self) -> &'static ChannelSpec {
        match self {
            ChannelKind::Rgba => &RGBA_SPEC,
            ChannelKind::Alpha
            | ChannelKind::Depth
            | ChannelKind::DirectShadowMask
            | ChannelKind::IndirectShadowMask
            | ChannelKind::Convergence => &FLOAT1_SPEC,
            ChannelKind::Raycount => &FLOAT1_NORMALIZED_SPEC,
            ChannelKind::MaterialId | ChannelKind::ObjectId => &UINT1_SPEC,
            ChannelKind::Samplecount => &UINT1_NORMALIZED_SPEC,
            ChannelKind::Uv => &UV_SPEC,
            _ => &DEFAULT_SPEC,
        }
    }

    /// Channels that exist once per numeric index (light group, id mask...)
    /// and need the index appended to their buffer key to avoid collisions
    pub fn needs_index(&self) -> bool {
        matches!(
            self,
            ChannelKind::RadianceGroup
                | ChannelKind::ByMaterialId
                | ChannelKind::ByObjectId
                | ChannelKind::MaterialIdMask
                | ChannelKind::ObjectIdMask
        )
    }

    /// Component width of the host pass this channel is written to.
    /// UV is padded to 3 because most hosts can't display 2-element passes.
    pub fn pass_components(&self) -> usize {
        match self {
            ChannelKind::Rgba => 4,
            ChannelKind::Alpha
            | ChannelKind::Depth
            | ChannelKind::MaterialId
            | ChannelKind::ObjectId
            | ChannelKind::MaterialIdMask
            | ChannelKind::ObjectIdMask
            | ChannelKind::DirectShadowMask
            | ChannelKind::IndirectShadowMask
            | ChannelKind::Raycount
            | ChannelKind::Samplecount
            | ChannelKind::Convergence => 1,
            _ => 3,
        }
    }

    /// Host-side pass name. The depth pass is pre-defined by hosts with
    /// fixed capitalization, everything else keeps the channel name.
    pub fn pass_name(&self) -> &str {
        match self {
            ChannelKind::Depth => "Depth",
            other => other.name(),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ChannelKind::parse(s))
    }
}

impl Serialize for ChannelKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ChannelKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        if name.is_empty() {
            return Err(D::Error::custom("empty channel name"));
        }
        Ok(ChannelKind::parse(&name))
    }
}

/// Engine readback source for one film output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilmOutput {
    /// Tonemapped RGB image from the imagepipeline at a given slot
    RgbImagePipeline,
    /// Tonemapped RGBA image (transparent film)
    RgbaImagePipeline,
    /// Raw channel data
    Channel(ChannelKind),
}

/// Pass declaration the host must make before rendering starts.
/// The core never creates passes at draw time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDecl {
    pub name: String,
    pub components: usize,
}

/// All passes one render layer needs: the combined pass, every enabled
/// AOV and one pass per configured light group.
pub fn layer_pass_layout(layer: &LayerSettings, lightgroups: &[LightGroup]) -> Vec<PassDecl> {
    let mut passes = vec![PassDecl {
        name: "Combined".to_string(),
        components: 4,
    }];

    for kind in &layer.aovs {
        passes.push(PassDecl {
            name: kind.pass_name().to_string(),
            components: kind.pass_components(),
        });
    }

    for group in lightgroups {
        passes.push(PassDecl {
            name: group.name.clone(),
            components: 3,
        });
    }

    passes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrips_known_names() {
        for name in [
            "RGBA",
            "DEPTH",
            "MATERIAL_ID",
            "SAMPLECOUNT",
            "UV",
            "RADIANCE_GROUP",
        ] {
            assert_eq!(ChannelKind::parse(name).name(), name);
        }
    }

    #[test]
    fn unknown_names_become_other() {
        let kind = ChannelKind::parse("NOISE_ESTIMATE");
        assert_eq!(kind, ChannelKind::Other("NOISE_ESTIMATE".to_string()));
        assert_eq!(kind.name(), "NOISE_ESTIMATE");
    }

    #[test]
    fn unlisted_kinds_use_default_spec() {
        for kind in [
            ChannelKind::Emission,
            ChannelKind::RadianceGroup,
            ChannelKind::Position,
            ChannelKind::Other("NOISE_ESTIMATE".to_string()),
        ] {
            let spec = kind.spec();
            assert_eq!(spec.element_count, 3);
            assert_eq!(spec.representation, Representation::Float32);
            assert!(!spec.normalize);
        }
    }

    #[test]
    fn id_channels_are_uint() {
        assert_eq!(
            ChannelKind::MaterialId.spec().representation,
            Representation::Uint32
        );
        assert_eq!(
            ChannelKind::Samplecount.spec().representation,
            Representation::Uint32
        );
        assert!(ChannelKind::Samplecount.spec().normalize);
    }

    #[test]
    fn indexed_kinds_are_flagged() {
        assert!(ChannelKind::RadianceGroup.needs_index());
        assert!(ChannelKind::MaterialIdMask.needs_index());
        assert!(!ChannelKind::Depth.needs_index());
        assert!(!ChannelKind::Other("FOO".to_string()).needs_index());
    }

    #[test]
    fn depth_pass_name_is_capitalized() {
        assert_eq!(ChannelKind::Depth.pass_name(), "Depth");
        assert_eq!(ChannelKind::ShadingNormal.pass_name(), "SHADING_NORMAL");
    }

    #[test]
    fn pass_layout_declares_combined_aovs_and_lightgroups() {
        let layer = LayerSettings {
            aovs: vec![ChannelKind::Depth, ChannelKind::Uv, ChannelKind::Rgba],
            ..LayerSettings::new("layer")
        };
        let groups = vec![LightGroup::new("key"), LightGroup::new("fill")];

        let layout = layer_pass_layout(&layer, &groups);
        let names: Vec<_> = layout.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Combined", "Depth", "UV", "RGBA", "key", "fill"]);

        assert_eq!(layout[0].components, 4); // Combined
        assert_eq!(layout[1].components, 1); // Depth
        assert_eq!(layout[2].components, 3); // UV padded
        assert_eq!(layout[3].components, 4); // RGBA
        assert_eq!(layout[4].components, 3); // light group
    }

    #[test]
    fn serde_uses_channel_names() {
        let json = serde_json::to_string(&ChannelKind::ShadingNormal).unwrap();
        assert_eq!(json, "\"SHADING_NORMAL\"");

        let kind: ChannelKind = serde_json::from_str("\"MY_CUSTOM\"").unwrap();
        assert_eq!(kind, ChannelKind::Other("MY_CUSTOM".to_string()));
    }
}

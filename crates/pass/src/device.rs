use std::{fmt, path::Path};

use glam::{Vec2, Vec4};

use crate::error::DeviceError;

slotmap::new_key_type! {
    pub struct ImageHandle;
    pub struct EffectHandle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    R32Float,
}

impl PixelFormat {
    pub fn is_rgba(self) -> bool {
        !matches!(self, PixelFormat::R32Float)
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const SAMPLED = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const COPY_DST = 1 << 2;
    }
}

#[derive(Debug, Clone)]
pub struct ImageDesc {
    pub label: String,
    pub extent: Extent,
    pub format: PixelFormat,
    pub usage: ImageUsage,
}

impl ImageDesc {
    /// Sampled color target, the usual shape of a stage output.
    pub fn render_target(label: impl Into<String>, extent: Extent, format: PixelFormat) -> Self {
        Self {
            label: label.into(),
            extent,
            format,
            usage: ImageUsage::SAMPLED | ImageUsage::RENDER_TARGET,
        }
    }

    pub fn texture(label: impl Into<String>, extent: Extent, format: PixelFormat) -> Self {
        Self {
            label: label.into(),
            extent,
            format,
            usage: ImageUsage::SAMPLED | ImageUsage::COPY_DST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: String,
}

impl Define {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectDesc {
    pub shader: String,
    pub defines: Vec<Define>,
}

impl EffectDesc {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            defines: vec![],
        }
    }

    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push(Define::new(name, value));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Point,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Vec2(Vec2),
    Vec4(Vec4),
    Image(ImageHandle),
    Sampler(Filter),
}

/// Named shader inputs for one effect invocation, in binding order.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: Vec<(&'static str, ParamValue)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `value` to `name`, replacing any earlier binding of the same name.
    pub fn set(&mut self, name: &'static str, value: ParamValue) -> &mut Self {
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((name, value)),
        }
        self
    }

    pub fn float(&mut self, name: &'static str, value: f32) -> &mut Self {
        self.set(name, ParamValue::Float(value))
    }

    pub fn vec2(&mut self, name: &'static str, value: Vec2) -> &mut Self {
        self.set(name, ParamValue::Vec2(value))
    }

    pub fn image(&mut self, name: &'static str, image: ImageHandle) -> &mut Self {
        self.set(name, ParamValue::Image(image))
    }

    pub fn sampler(&mut self, name: &'static str, filter: Filter) -> &mut Self {
        self.set(name, ParamValue::Sampler(filter))
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ParamValue)> + '_ {
        self.values.iter().copied()
    }

    pub fn images(&self) -> impl Iterator<Item = ImageHandle> + '_ {
        self.values.iter().filter_map(|(_, value)| match value {
            ParamValue::Image(image) => Some(*image),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Device and resource context the chain renders through.
///
/// Every operation takes the context explicitly; stages never keep a
/// reference to it between calls.
pub trait RenderDevice {
    fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle, DeviceError>;

    /// Creates an image and uploads linear RGBA texels in row-major order.
    fn create_image_with_data(
        &mut self,
        desc: &ImageDesc,
        texels: &[Vec4],
    ) -> Result<ImageHandle, DeviceError>;

    fn load_image(&mut self, path: &Path) -> Result<ImageHandle, DeviceError>;

    fn destroy_image(&mut self, image: ImageHandle);

    fn image_info(&self, image: ImageHandle) -> Option<(Extent, PixelFormat)>;

    fn create_effect(&mut self, desc: &EffectDesc) -> Result<EffectHandle, DeviceError>;

    fn destroy_effect(&mut self, effect: EffectHandle);

    /// Runs `effect` over the whole of `target`.
    fn execute(
        &mut self,
        effect: EffectHandle,
        bindings: &Bindings,
        target: ImageHandle,
    ) -> Result<(), DeviceError>;

    fn image_extent(&self, image: ImageHandle) -> Option<Extent> {
        self.image_info(image).map(|(extent, _)| extent)
    }
}

pub(crate) fn check_texel_count(desc: &ImageDesc, texels: &[Vec4]) -> Result<(), DeviceError> {
    if texels.len() != desc.extent.texel_count() {
        return Err(DeviceError::DataSize {
            expected: desc.extent.texel_count(),
            actual: texels.len(),
        });
    }
    Ok(())
}

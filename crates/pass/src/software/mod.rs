//! CPU reference implementation of [`RenderDevice`].
//!
//! Images are kept as linear `Vec4` texels whatever their declared format;
//! 8-bit formats are quantized on write. Effects resolve to Rust kernels
//! registered under the same names as the WGSL shaders.

mod kernels;

use std::path::Path;

use ahash::AHashMap;
use glam::{Vec2, Vec4};
use slotmap::SlotMap;

use crate::{
    device::check_texel_count, effects::binding, Bindings, DeviceError, EffectDesc, EffectHandle,
    Extent, Filter, ImageDesc, ImageHandle, ParamValue, PixelFormat, RenderDevice,
};

pub use kernels::{hash, Kernel, KernelFn, UniformKind};

struct SoftImage {
    label: String,
    extent: Extent,
    format: PixelFormat,
    texels: Vec<Vec4>,
}

struct SoftEffect {
    name: String,
    kernel: Kernel,
}

pub struct SoftwareDevice {
    images: SlotMap<ImageHandle, SoftImage>,
    effects: SlotMap<EffectHandle, SoftEffect>,
    kernels: AHashMap<String, Kernel>,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareDevice {
    /// A device with every built-in effect registered.
    pub fn new() -> Self {
        let mut device = Self::empty();
        for (name, kernel) in kernels::builtin() {
            device.register_kernel(name, kernel);
        }
        device
    }

    /// A device with no effects at all.
    pub fn empty() -> Self {
        Self {
            images: SlotMap::with_key(),
            effects: SlotMap::with_key(),
            kernels: AHashMap::new(),
        }
    }

    pub fn register_kernel(&mut self, name: impl Into<String>, kernel: Kernel) {
        self.kernels.insert(name.into(), kernel);
    }

    pub fn pixels(&self, image: ImageHandle) -> Option<&[Vec4]> {
        self.images.get(image).map(|image| image.texels.as_slice())
    }

    pub fn pixel(&self, image: ImageHandle, x: u32, y: u32) -> Option<Vec4> {
        let image = self.images.get(image)?;
        if x >= image.extent.width || y >= image.extent.height {
            return None;
        }
        Some(image.texels[(y * image.extent.width + x) as usize])
    }

    pub fn label(&self, image: ImageHandle) -> Option<&str> {
        self.images.get(image).map(|image| image.label.as_str())
    }

    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    pub fn live_effects(&self) -> usize {
        self.effects.len()
    }

    /// Writes `image` as an 8-bit RGBA file; the format follows the extension.
    pub fn save_image(&self, image: ImageHandle, path: &Path) -> Result<(), DeviceError> {
        let soft = self.images.get(image).ok_or(DeviceError::UnknownImage)?;
        let Extent { width, height } = soft.extent;
        let buffer = image::RgbaImage::from_fn(width, height, |x, y| {
            let texel = soft.texels[(y * width + x) as usize];
            let bytes = (texel.clamp(Vec4::ZERO, Vec4::ONE) * 255.).round();
            image::Rgba([bytes.x as u8, bytes.y as u8, bytes.z as u8, bytes.w as u8])
        });
        buffer.save(path).map_err(|err| DeviceError::ImageLoad {
            path: path.to_owned(),
            reason: err.to_string(),
        })
    }

    fn insert_image(&mut self, desc: &ImageDesc, texels: Vec<Vec4>) -> ImageHandle {
        let texels = texels
            .into_iter()
            .map(|texel| store(desc.format, texel))
            .collect();
        self.images.insert(SoftImage {
            label: desc.label.clone(),
            extent: desc.extent,
            format: desc.format,
            texels,
        })
    }

    fn validate(
        &self,
        effect: &SoftEffect,
        bindings: &Bindings,
        target: ImageHandle,
    ) -> Result<(), DeviceError> {
        let unknown = |name: &str| DeviceError::UnknownParameter {
            effect: effect.name.clone(),
            name: name.to_owned(),
        };
        let wrong_type = |name: &str| DeviceError::ParameterType {
            effect: effect.name.clone(),
            name: name.to_owned(),
        };

        for (name, value) in bindings.iter() {
            match value {
                ParamValue::Image(image) => {
                    if !effect.kernel.textures.contains(&name) {
                        return Err(unknown(name));
                    }
                    if image == target {
                        return Err(DeviceError::TargetAliased);
                    }
                    if !self.images.contains_key(image) {
                        return Err(DeviceError::UnknownImage);
                    }
                }
                ParamValue::Sampler(_) => {
                    if name != binding::SAMPLER {
                        return Err(unknown(name));
                    }
                }
                ParamValue::Float(_) | ParamValue::Vec2(_) | ParamValue::Vec4(_) => {
                    let (_, kind) = effect
                        .kernel
                        .uniforms
                        .iter()
                        .find(|(uniform, _)| *uniform == name)
                        .ok_or_else(|| unknown(name))?;
                    if !kind.accepts(&value) {
                        return Err(wrong_type(name));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Quantizes a texel the way an image of `format` would store it.
fn store(format: PixelFormat, texel: Vec4) -> Vec4 {
    match format {
        PixelFormat::Rgba8Unorm | PixelFormat::Rgba8UnormSrgb => {
            (texel.clamp(Vec4::ZERO, Vec4::ONE) * 255.).round() / 255.
        }
        PixelFormat::Rgba16Float => texel,
        PixelFormat::R32Float => Vec4::new(texel.x, 0., 0., 1.),
    }
}

impl RenderDevice for SoftwareDevice {
    fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle, DeviceError> {
        if desc.extent.is_empty() {
            return Err(DeviceError::EmptyExtent(desc.extent));
        }
        let texels = vec![Vec4::ZERO; desc.extent.texel_count()];
        Ok(self.insert_image(desc, texels))
    }

    fn create_image_with_data(
        &mut self,
        desc: &ImageDesc,
        texels: &[Vec4],
    ) -> Result<ImageHandle, DeviceError> {
        if desc.extent.is_empty() {
            return Err(DeviceError::EmptyExtent(desc.extent));
        }
        check_texel_count(desc, texels)?;
        Ok(self.insert_image(desc, texels.to_vec()))
    }

    fn load_image(&mut self, path: &Path) -> Result<ImageHandle, DeviceError> {
        let decoded = image::open(path)
            .map_err(|err| DeviceError::ImageLoad {
                path: path.to_owned(),
                reason: err.to_string(),
            })?
            .to_rgba32f();
        let extent = Extent::new(decoded.width(), decoded.height());
        let texels: Vec<Vec4> = decoded.pixels().map(|pixel| Vec4::from(pixel.0)).collect();
        let label = path.display().to_string();
        self.create_image_with_data(
            &ImageDesc::texture(label, extent, PixelFormat::Rgba8Unorm),
            &texels,
        )
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        self.images.remove(image);
    }

    fn image_info(&self, image: ImageHandle) -> Option<(Extent, PixelFormat)> {
        self.images
            .get(image)
            .map(|image| (image.extent, image.format))
    }

    fn create_effect(&mut self, desc: &EffectDesc) -> Result<EffectHandle, DeviceError> {
        let kernel = *self
            .kernels
            .get(&desc.shader)
            .ok_or_else(|| DeviceError::EffectNotFound(desc.shader.clone()))?;
        if !desc.defines.is_empty() {
            log::debug!(
                "Software kernel `{}` ignores {} define(s)",
                desc.shader,
                desc.defines.len()
            );
        }
        Ok(self.effects.insert(SoftEffect {
            name: desc.shader.clone(),
            kernel,
        }))
    }

    fn destroy_effect(&mut self, effect: EffectHandle) {
        self.effects.remove(effect);
    }

    fn execute(
        &mut self,
        effect: EffectHandle,
        bindings: &Bindings,
        target: ImageHandle,
    ) -> Result<(), DeviceError> {
        let effect = self.effects.get(effect).ok_or(DeviceError::UnknownEffect)?;
        self.validate(effect, bindings, target)?;
        let func = effect.kernel.func;

        let image = self.images.get_mut(target).ok_or(DeviceError::UnknownImage)?;
        let (extent, format) = (image.extent, image.format);
        let mut texels = std::mem::take(&mut image.texels);

        let filter = match bindings.get(binding::SAMPLER) {
            Some(ParamValue::Sampler(filter)) => filter,
            _ => Filter::Linear,
        };
        let ctx = KernelContext {
            images: &self.images,
            bindings,
            filter,
            extent,
        };
        let size = extent.as_vec2();
        for y in 0..extent.height {
            for x in 0..extent.width {
                let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
                texels[(y * extent.width + x) as usize] = store(format, func(&ctx, uv));
            }
        }

        if let Some(image) = self.images.get_mut(target) {
            image.texels = texels;
        }
        Ok(())
    }
}

/// What a kernel can read while shading one texel.
pub struct KernelContext<'a> {
    images: &'a SlotMap<ImageHandle, SoftImage>,
    bindings: &'a Bindings,
    filter: Filter,
    extent: Extent,
}

impl KernelContext<'_> {
    /// Unbound uniforms read as zero.
    pub fn float(&self, name: &str) -> f32 {
        match self.bindings.get(name) {
            Some(ParamValue::Float(value)) => value,
            _ => 0.,
        }
    }

    pub fn vec2(&self, name: &str) -> Vec2 {
        match self.bindings.get(name) {
            Some(ParamValue::Vec2(value)) => value,
            _ => Vec2::ZERO,
        }
    }

    /// Extent of the image being written.
    pub fn target_extent(&self) -> Extent {
        self.extent
    }

    /// Samples the texture bound to `name` with clamp-to-edge addressing.
    /// Unbound textures read as transparent black.
    pub fn sample(&self, name: &str, uv: Vec2) -> Vec4 {
        let Some(ParamValue::Image(handle)) = self.bindings.get(name) else {
            return Vec4::ZERO;
        };
        let Some(image) = self.images.get(handle) else {
            return Vec4::ZERO;
        };
        match self.filter {
            Filter::Point => sample_point(image, uv),
            Filter::Linear => sample_linear(image, uv),
        }
    }
}

fn fetch(image: &SoftImage, x: i64, y: i64) -> Vec4 {
    let x = x.clamp(0, image.extent.width as i64 - 1) as u32;
    let y = y.clamp(0, image.extent.height as i64 - 1) as u32;
    image.texels[(y * image.extent.width + x) as usize]
}

fn sample_point(image: &SoftImage, uv: Vec2) -> Vec4 {
    let texel = (uv * image.extent.as_vec2()).floor();
    fetch(image, texel.x as i64, texel.y as i64)
}

fn sample_linear(image: &SoftImage, uv: Vec2) -> Vec4 {
    let pos = uv * image.extent.as_vec2() - 0.5;
    let base = pos.floor();
    let frac = pos - base;
    let (x, y) = (base.x as i64, base.y as i64);

    let top = fetch(image, x, y).lerp(fetch(image, x + 1, y), frac.x);
    let bottom = fetch(image, x, y + 1).lerp(fetch(image, x + 1, y + 1), frac.x);
    top.lerp(bottom, frac.y)
}

use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
    sync::Arc,
};

use ahash::AHashMap;
use glam::Vec4;
use pollster::FutureExt;
use slotmap::SlotMap;
use wgpu::util::DeviceExt;

use components::{create_solid_color_texture, Gpu, Watcher};
use pass::{
    Bindings, DeviceError, EffectDesc, EffectHandle, Extent, Filter, ImageDesc, ImageHandle,
    ImageUsage, ParamValue, PixelFormat, RenderDevice,
};

use super::reflect::EffectLayout;

const FULLSCREEN_PRELUDE: &str = include_str!("fullscreen.wgsl");

struct GpuImage {
    label: String,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: Extent,
    format: PixelFormat,
    usage: ImageUsage,
}

struct Compiled {
    layout: EffectLayout,
    module: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    bind_group_layout: wgpu::BindGroupLayout,
}

struct GpuEffect {
    desc: EffectDesc,
    path: PathBuf,
    compiled: Compiled,
    pipelines: AHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

/// [`RenderDevice`] on top of `wgpu`.
///
/// Effects are WGSL files under the shader directory. Every effect is recorded
/// into the encoder handed over by [`GpuDevice::begin_frame`]; executing
/// outside a frame is [`DeviceError::NoFrame`].
pub struct GpuDevice {
    gpu: Arc<Gpu>,
    shader_dir: PathBuf,
    images: SlotMap<ImageHandle, GpuImage>,
    effects: SlotMap<EffectHandle, GpuEffect>,
    linear_sampler: wgpu::Sampler,
    point_sampler: wgpu::Sampler,
    placeholder: wgpu::TextureView,
    encoder: Option<wgpu::CommandEncoder>,
    watcher: Option<Watcher>,
}

impl GpuDevice {
    pub fn new(gpu: Arc<Gpu>, shader_dir: impl Into<PathBuf>, watcher: Option<Watcher>) -> Self {
        let device = gpu.device();
        let sampler = |label, filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };
        let linear_sampler = sampler("Linear Sampler", wgpu::FilterMode::Linear);
        let point_sampler = sampler("Point Sampler", wgpu::FilterMode::Nearest);
        let placeholder = create_solid_color_texture(device, gpu.queue(), [0., 0., 0., 1.])
            .create_view(&Default::default());

        Self {
            shader_dir: shader_dir.into(),
            images: SlotMap::with_key(),
            effects: SlotMap::with_key(),
            linear_sampler,
            point_sampler,
            placeholder,
            encoder: None,
            watcher,
            gpu,
        }
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    /// Starts recording a frame into `encoder`.
    pub fn begin_frame(&mut self, encoder: wgpu::CommandEncoder) {
        if self.encoder.replace(encoder).is_some() {
            log::warn!("Previous frame was never finished, dropping its commands");
        }
    }

    /// Hands the frame's encoder back for submission.
    pub fn finish_frame(&mut self) -> Option<wgpu::CommandEncoder> {
        self.encoder.take()
    }

    pub fn view(&self, image: ImageHandle) -> Option<&wgpu::TextureView> {
        self.images.get(image).map(|image| &image.view)
    }

    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    /// Recompiles every effect built from `path`. An effect that fails to
    /// compile keeps its previous pipelines. Returns how many were reloaded.
    pub fn reload(&mut self, path: &Path) -> usize {
        let path = canonical(path);
        let handles: Vec<_> = self
            .effects
            .iter()
            .filter(|(_, effect)| effect.path == path)
            .map(|(handle, _)| handle)
            .collect();
        if handles.is_empty() {
            return 0;
        }

        let body = match std::fs::read_to_string(&path) {
            Ok(body) => body,
            Err(err) => {
                log::error!("Failed to read {}: {err}", path.display());
                return 0;
            }
        };

        let mut reloaded = 0;
        for handle in handles {
            let Some(desc) = self.effects.get(handle).map(|effect| effect.desc.clone()) else {
                continue;
            };
            match self.compile(&desc, &body) {
                Ok(compiled) => {
                    if let Some(effect) = self.effects.get_mut(handle) {
                        effect.compiled = compiled;
                        effect.pipelines.clear();
                        reloaded += 1;
                        log::info!("{} reloaded successfully", desc.shader);
                    }
                }
                Err(err) => log::error!("{err}\nKeeping the previous version of {}", desc.shader),
            }
        }
        reloaded
    }

    fn effect_path(&self, shader: &str) -> PathBuf {
        self.shader_dir.join(format!("{shader}.wgsl"))
    }

    fn compile(&self, desc: &EffectDesc, body: &str) -> Result<Compiled, DeviceError> {
        let compile_error = |reason: String| DeviceError::EffectCompile {
            name: desc.shader.clone(),
            reason,
        };
        let source = compose(desc, body);
        let layout =
            EffectLayout::reflect(&source).map_err(|err| compile_error(err.to_string()))?;

        let device = self.gpu.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&desc.shader),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&desc.shader),
            entries: &layout.bind_group_layout_entries(),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&desc.shader),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        if let Some(err) = device.pop_error_scope().block_on() {
            return Err(compile_error(err.to_string()));
        }

        Ok(Compiled {
            layout,
            module,
            pipeline_layout,
            bind_group_layout,
        })
    }

    fn allocate(
        &mut self,
        desc: &ImageDesc,
        extra_usage: ImageUsage,
    ) -> Result<ImageHandle, DeviceError> {
        if desc.extent.is_empty() {
            return Err(DeviceError::EmptyExtent(desc.extent));
        }
        let usage = desc.usage | extra_usage;
        let texture = self.gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: extent_3d(desc.extent),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: texture_usages(usage),
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        log::debug!("Created {} {} {:?}", desc.label, desc.extent, desc.format);
        Ok(self.images.insert(GpuImage {
            label: desc.label.clone(),
            texture,
            view,
            extent: desc.extent,
            format: desc.format,
            usage,
        }))
    }

    fn upload(&self, image: ImageHandle, bytes: &[u8]) -> Result<(), DeviceError> {
        let image = self.images.get(image).ok_or(DeviceError::UnknownImage)?;
        self.gpu.queue().write_texture(
            wgpu::ImageCopyTexture {
                texture: &image.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(image.extent.width * texel_size(image.format)),
                rows_per_image: Some(image.extent.height),
            },
            extent_3d(image.extent),
        );
        Ok(())
    }
}

impl RenderDevice for GpuDevice {
    fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle, DeviceError> {
        self.allocate(desc, ImageUsage::empty())
    }

    fn create_image_with_data(
        &mut self,
        desc: &ImageDesc,
        texels: &[Vec4],
    ) -> Result<ImageHandle, DeviceError> {
        if texels.len() != desc.extent.texel_count() {
            return Err(DeviceError::DataSize {
                expected: desc.extent.texel_count(),
                actual: texels.len(),
            });
        }
        let image = self.allocate(desc, ImageUsage::COPY_DST)?;
        self.upload(image, &encode_texels(desc.format, texels))?;
        Ok(image)
    }

    fn load_image(&mut self, path: &Path) -> Result<ImageHandle, DeviceError> {
        let decoded = image::open(path)
            .map_err(|err| DeviceError::ImageLoad {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?
            .to_rgba8();
        let desc = ImageDesc::texture(
            path.display().to_string(),
            Extent::new(decoded.width(), decoded.height()),
            PixelFormat::Rgba8Unorm,
        );
        let image = self.allocate(&desc, ImageUsage::COPY_DST)?;
        self.upload(image, decoded.as_raw())?;
        Ok(image)
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        if let Some(image) = self.images.remove(image) {
            log::debug!("Destroyed {}", image.label);
            image.texture.destroy();
        }
    }

    fn image_info(&self, image: ImageHandle) -> Option<(Extent, PixelFormat)> {
        self.images
            .get(image)
            .map(|image| (image.extent, image.format))
    }

    fn create_effect(&mut self, desc: &EffectDesc) -> Result<EffectHandle, DeviceError> {
        let path = self.effect_path(&desc.shader);
        let body = std::fs::read_to_string(&path).map_err(|err| {
            log::error!("Failed to read {}: {err}", path.display());
            DeviceError::EffectNotFound(desc.shader.clone())
        })?;
        let compiled = self.compile(desc, &body)?;

        let path = canonical(&path);
        if let Some(watcher) = &mut self.watcher {
            if let Err(err) = watcher.watch_file(&path) {
                log::warn!("Hot reload disabled for {}: {err}", path.display());
            }
        }
        log::debug!("Created effect {}", desc.shader);
        Ok(self.effects.insert(GpuEffect {
            desc: desc.clone(),
            path,
            compiled,
            pipelines: AHashMap::new(),
        }))
    }

    fn destroy_effect(&mut self, effect: EffectHandle) {
        let Some(effect) = self.effects.remove(effect) else {
            return;
        };
        let still_used = self.effects.values().any(|other| other.path == effect.path);
        if let Some(watcher) = self.watcher.as_mut().filter(|_| !still_used) {
            if let Err(err) = watcher.unwatch_file(&effect.path) {
                log::debug!("Failed to unwatch {}: {err}", effect.path.display());
            }
        }
    }

    fn execute(
        &mut self,
        effect: EffectHandle,
        bindings: &Bindings,
        target: ImageHandle,
    ) -> Result<(), DeviceError> {
        let Self {
            gpu,
            images,
            effects,
            linear_sampler,
            point_sampler,
            placeholder,
            encoder,
            ..
        } = self;
        let device = gpu.device();

        let effect = effects.get_mut(effect).ok_or(DeviceError::UnknownEffect)?;
        let target_image = images.get(target).ok_or(DeviceError::UnknownImage)?;
        let encoder = encoder.as_mut().ok_or(DeviceError::NoFrame)?;
        if !target_image.usage.contains(ImageUsage::RENDER_TARGET) {
            return Err(DeviceError::InvalidImage(format!(
                "`{}` is not a render target",
                target_image.label
            )));
        }

        let layout = &effect.compiled.layout;
        let rejected = |name: &str| {
            if layout.declares(name) {
                DeviceError::ParameterType {
                    effect: effect.desc.shader.clone(),
                    name: name.to_owned(),
                }
            } else {
                DeviceError::UnknownParameter {
                    effect: effect.desc.shader.clone(),
                    name: name.to_owned(),
                }
            }
        };

        let mut views = AHashMap::new();
        let mut samplers = AHashMap::new();
        let mut uniform_data = layout
            .uniforms
            .as_ref()
            .map(|block| vec![0u8; block.size as usize]);
        for (name, value) in bindings.iter() {
            match value {
                ParamValue::Image(image) => {
                    let binding = layout.texture(name).ok_or_else(|| rejected(name))?;
                    if image == target {
                        return Err(DeviceError::TargetAliased);
                    }
                    let image = images.get(image).ok_or(DeviceError::UnknownImage)?;
                    if image.format == PixelFormat::R32Float {
                        return Err(DeviceError::UnsupportedFormat(image.format));
                    }
                    if !image.usage.contains(ImageUsage::SAMPLED) {
                        return Err(DeviceError::InvalidImage(format!(
                            "`{}` cannot be sampled",
                            image.label
                        )));
                    }
                    views.insert(binding, &image.view);
                }
                ParamValue::Sampler(filter) => {
                    let binding = layout.sampler(name).ok_or_else(|| rejected(name))?;
                    let sampler = match filter {
                        Filter::Linear => &*linear_sampler,
                        Filter::Point => &*point_sampler,
                    };
                    samplers.insert(binding, sampler);
                }
                value => {
                    let (block, data) = layout
                        .uniforms
                        .as_ref()
                        .zip(uniform_data.as_mut())
                        .ok_or_else(|| rejected(name))?;
                    let member = block
                        .member(name)
                        .filter(|member| member.kind.accepts(&value))
                        .ok_or_else(|| rejected(name))?;
                    member.write(data, &value);
                }
            }
        }

        let uniform_buffer = uniform_data.map(|data| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Effect Parameters"),
                contents: &data,
                usage: wgpu::BufferUsages::UNIFORM,
            })
        });

        let mut entries = Vec::new();
        for (_, binding) in &layout.textures {
            let view = views.get(binding).copied().unwrap_or(&*placeholder);
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        for (_, binding) in &layout.samplers {
            let sampler = samplers.get(binding).copied().unwrap_or(&*linear_sampler);
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        if let (Some(block), Some(buffer)) = (&layout.uniforms, &uniform_buffer) {
            entries.push(wgpu::BindGroupEntry {
                binding: block.binding,
                resource: buffer.as_entire_binding(),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&effect.desc.shader),
            layout: &effect.compiled.bind_group_layout,
            entries: &entries,
        });

        let format = texture_format(target_image.format);
        if !effect.pipelines.contains_key(&format) {
            let pipeline = create_pipeline(device, &effect.desc.shader, &effect.compiled, format)?;
            effect.pipelines.insert(format, pipeline);
        }
        let pipeline = effect
            .pipelines
            .get(&format)
            .ok_or(DeviceError::UnknownEffect)?;

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&effect.desc.shader),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target_image.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: true,
                },
            })],
            depth_stencil_attachment: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    name: &str,
    compiled: &Compiled,
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, DeviceError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(name),
        layout: Some(&compiled.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &compiled.module,
            entry_point: "vs_main",
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &compiled.module,
            entry_point: "fs_main",
            targets: &[Some(format.into())],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    });
    match device.pop_error_scope().block_on() {
        None => Ok(pipeline),
        Some(err) => Err(DeviceError::EffectCompile {
            name: name.to_owned(),
            reason: err.to_string(),
        }),
    }
}

/// The shared vertex stage, then one `const` per define, then the effect body.
fn compose(desc: &EffectDesc, body: &str) -> String {
    let mut source = String::with_capacity(FULLSCREEN_PRELUDE.len() + body.len() + 64);
    source.push_str(FULLSCREEN_PRELUDE);
    source.push('\n');
    for define in &desc.defines {
        let _ = writeln!(source, "const {} = {};", define.name, define.value);
    }
    source.push_str(body);
    source
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn extent_3d(extent: Extent) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: extent.width,
        height: extent.height,
        depth_or_array_layers: 1,
    }
}

fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::R32Float => wgpu::TextureFormat::R32Float,
    }
}

fn texture_usages(usage: ImageUsage) -> wgpu::TextureUsages {
    let mut usages = wgpu::TextureUsages::empty();
    if usage.contains(ImageUsage::SAMPLED) {
        usages |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.contains(ImageUsage::RENDER_TARGET) {
        usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(ImageUsage::COPY_DST) {
        usages |= wgpu::TextureUsages::COPY_DST;
    }
    usages
}

fn texel_size(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Rgba8Unorm | PixelFormat::Rgba8UnormSrgb | PixelFormat::R32Float => 4,
        PixelFormat::Rgba16Float => 8,
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1. / 2.4) - 0.055
    }
}

fn unorm8(c: f32) -> u8 {
    (c.clamp(0., 1.) * 255.).round() as u8
}

/// Packs linear texels into the byte layout of `format`.
fn encode_texels(format: PixelFormat, texels: &[Vec4]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(texels.len() * texel_size(format) as usize);
    for texel in texels {
        match format {
            PixelFormat::Rgba8Unorm => bytes.extend(texel.to_array().map(unorm8)),
            PixelFormat::Rgba8UnormSrgb => {
                let [r, g, b, a] = texel.to_array();
                bytes.extend([r, g, b].map(|c| unorm8(linear_to_srgb(c))));
                bytes.push(unorm8(a));
            }
            PixelFormat::Rgba16Float => {
                for c in texel.to_array() {
                    bytes.extend(half::f16::from_f32(c).to_le_bytes());
                }
            }
            PixelFormat::R32Float => bytes.extend(texel.x.to_le_bytes()),
        }
    }
    bytes
}

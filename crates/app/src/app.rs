use std::{fmt::Display, path::PathBuf, sync::Arc, time::Instant};

use color_eyre::{
    eyre::{ContextCompat, WrapErr},
    Result,
};
use egui_wgpu::renderer::ScreenDescriptor;
use pollster::FutureExt;
use winit::{dpi::PhysicalSize, window::Window};

use components::{preferred_framebuffer_format, Blitter, FpsCounter, Gpu, Watcher};
use pass::{Chain, ChainConfig, Extent, ImageHandle, LoadContext, ParamOverride};

pub mod device;
pub mod gbuffer;
pub mod panels;
pub mod reflect;

use self::{device::GpuDevice, gbuffer::GBuffer, panels::EguiPanels};

/// Window, surface and everything rendered into it.
pub struct App {
    pub gpu: Arc<Gpu>,
    pub surface: wgpu::Surface,
    pub surface_config: wgpu::SurfaceConfiguration,

    gpu_device: GpuDevice,
    gbuffer: Option<GBuffer>,
    chain: Chain,
    blitter: Blitter,

    start: Instant,
    fps_counter: FpsCounter,

    pub(crate) egui_context: egui::Context,
    egui_renderer: egui_wgpu::Renderer,
    pub(crate) egui_state: egui_winit::State,
}

impl App {
    pub const SAMPLE_COUNT: u32 = 1;

    pub fn new(window: &Window, file_watcher: Watcher, config: &ChainConfig) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            dx12_shader_compiler: wgpu::Dx12Compiler::Fxc,
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(&window) }?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .block_on()
            .context("Failed to create Adapter")?;

        let limits = adapter.limits();
        let mut features = adapter.features();
        features.remove(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    features,
                    limits,
                },
                None,
            )
            .block_on()?;
        let gpu = Arc::new(Gpu::new(adapter, device, queue));

        let PhysicalSize { width, height } = window.inner_size();
        let format = preferred_framebuffer_format(&surface.get_capabilities(gpu.adapter()).formats);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            view_formats: vec![],
        };
        surface.configure(gpu.device(), &surface_config);

        let extent = Extent::new(width.max(1), height.max(1));
        let mut gpu_device =
            GpuDevice::new(gpu.clone(), &config.shader_dir, Some(file_watcher));
        let gbuffer =
            GBuffer::new(&mut gpu_device, extent).wrap_err("Failed to create the G-buffer")?;
        let mut chain = Chain::from_config(config)?;
        let ctx = LoadContext {
            extent,
            ..config.load_context()
        };
        chain
            .load_with(&mut gpu_device, ctx)
            .wrap_err("Failed to load the postprocess chain")?;

        let egui_renderer = egui_wgpu::renderer::Renderer::new(
            gpu.device(),
            surface_config.format,
            None,
            Self::SAMPLE_COUNT,
        );
        let egui_context = egui::Context::default();
        let egui_state = egui_winit::State::new(window);

        Ok(Self {
            blitter: Blitter::new(gpu.device()),
            surface,
            surface_config,

            gpu_device,
            gbuffer: Some(gbuffer),
            chain,

            start: Instant::now(),
            fps_counter: FpsCounter::new(),

            gpu,
            egui_renderer,
            egui_context,
            egui_state,
        })
    }

    pub fn apply_overrides(&mut self, overrides: &[ParamOverride]) -> Result<()> {
        for param in overrides {
            self.chain
                .apply_override(param)
                .wrap_err_with(|| format!("Failed to apply `{}.{}`", param.stage, param.param))?;
        }
        Ok(())
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let target = self.surface.get_current_texture()?;
        let target_view = target.texture.create_view(&Default::default());
        self.fps_counter.record();

        let encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Main Render Encoder"),
            });
        self.gpu_device.begin_frame(encoder);
        let output = self.render_chain(self.start.elapsed().as_secs_f32());
        let Some(mut encoder) = self.gpu_device.finish_frame() else {
            return Ok(());
        };

        if let Some(view) = output.and_then(|image| self.gpu_device.view(image)) {
            self.blitter.blit_to_texture(
                &mut encoder,
                self.gpu.device(),
                view,
                &target_view,
                self.surface_config.format,
            );
        }
        let ui_buffers = self.draw_ui(window, &mut encoder, &target_view);

        self.gpu
            .queue()
            .submit(ui_buffers.into_iter().chain(Some(encoder.finish())));
        target.present();

        Ok(())
    }

    /// G-buffer, then the chain. Returns the image to present.
    fn render_chain(&mut self, time: f32) -> Option<ImageHandle> {
        let gbuffer = self.gbuffer.as_ref()?;
        let inputs = match gbuffer.render(&mut self.gpu_device, time) {
            Ok(inputs) => inputs,
            Err(err) => {
                log::error!("G-buffer pass failed: {err}");
                return None;
            }
        };
        match self.chain.render_or_passthrough(&mut self.gpu_device, &inputs) {
            Ok(output) => Some(output),
            Err(err) => {
                log::error!("{:?}", color_eyre::Report::new(err));
                Some(inputs.color)
            }
        }
    }

    fn draw_ui(
        &mut self,
        window: &Window,
        encoder: &mut wgpu::CommandEncoder,
        target_view: &wgpu::TextureView,
    ) -> Vec<wgpu::CommandBuffer> {
        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: [self.surface_config.width, self.surface_config.height],
            pixels_per_point: window.scale_factor() as _,
        };

        let Self {
            egui_context,
            egui_state,
            egui_renderer,
            chain,
            fps_counter,
            gpu,
            ..
        } = self;

        let full_output = egui_context.run(egui_state.take_egui_input(window), |ctx| {
            egui::Window::new("Stats").show(ctx, |ui| {
                ui.label(format!(
                    "{:.1} fps ({:.2} ms)",
                    fps_counter.fps(),
                    fps_counter.frame_time() * 1000.
                ));
                ui.label(chain.names().collect::<Vec<_>>().join(" -> "));
            });
            if chain.render_ui(&mut EguiPanels::new(ctx)) {
                log::trace!("Postprocess parameters changed");
            }
        });
        egui_state.handle_platform_output(window, egui_context, full_output.platform_output);

        let paint_jobs = egui_context.tessellate(full_output.shapes);
        let textures_delta = full_output.textures_delta;

        for (texture_id, image_delta) in &textures_delta.set {
            egui_renderer.update_texture(gpu.device(), gpu.queue(), *texture_id, image_delta);
        }
        for texture_id in &textures_delta.free {
            egui_renderer.free_texture(texture_id);
        }
        let buffers = egui_renderer.update_buffers(
            gpu.device(),
            gpu.queue(),
            encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("UI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            egui_renderer.render(&mut render_pass, paint_jobs.as_slice(), &screen_descriptor);
        }

        buffers
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.surface_config.width == width && self.surface_config.height == height {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface
            .configure(self.gpu.device(), &self.surface_config);

        let extent = Extent::new(width, height);
        if let Some(gbuffer) = &mut self.gbuffer {
            if let Err(err) = gbuffer.resize(&mut self.gpu_device, extent) {
                log::error!("Failed to resize the G-buffer: {err}");
                return;
            }
        }
        if let Err(err) = self.chain.resize(&mut self.gpu_device, extent) {
            log::error!("{:?}", color_eyre::Report::new(err));
        }
    }

    pub fn handle_events(&mut self, path: PathBuf) {
        if self.gpu_device.reload(&path) == 0 {
            log::debug!("No effect uses {}", path.display());
        }
    }

    /// Releases every image and effect the chain and G-buffer own.
    pub fn shutdown(&mut self) {
        self.chain.unload(&mut self.gpu_device);
        if let Some(gbuffer) = self.gbuffer.take() {
            gbuffer.release(&mut self.gpu_device);
        }
        log::debug!("{} images still alive", self.gpu_device.live_images());
    }

    pub fn device(&self) -> &wgpu::Device {
        self.gpu.device()
    }

    pub fn get_info(&self) -> RendererInfo {
        let info = self.gpu.adapter().get_info();
        RendererInfo {
            device_name: info.name,
            device_type: self.get_device_type().to_string(),
            vendor_name: self.get_vendor_name().to_string(),
            backend: self.get_backend().to_string(),
        }
    }

    fn get_vendor_name(&self) -> &str {
        match self.gpu.adapter().get_info().vendor {
            0x1002 => "AMD",
            0x1010 => "ImgTec",
            0x10DE => "NVIDIA Corporation",
            0x13B5 => "ARM",
            0x5143 => "Qualcomm",
            0x8086 => "INTEL Corporation",
            _ => "Unknown vendor",
        }
    }

    fn get_backend(&self) -> &str {
        match self.gpu.adapter().get_info().backend {
            wgpu::Backend::Empty => "Empty",
            wgpu::Backend::Vulkan => "Vulkan",
            wgpu::Backend::Metal => "Metal",
            wgpu::Backend::Dx12 => "Dx12",
            wgpu::Backend::Dx11 => "Dx11",
            wgpu::Backend::Gl => "GL",
            wgpu::Backend::BrowserWebGpu => "Browser WGPU",
        }
    }

    fn get_device_type(&self) -> &str {
        match self.gpu.adapter().get_info().device_type {
            wgpu::DeviceType::Other => "Other",
            wgpu::DeviceType::IntegratedGpu => "Integrated GPU",
            wgpu::DeviceType::DiscreteGpu => "Discrete GPU",
            wgpu::DeviceType::VirtualGpu => "Virtual GPU",
            wgpu::DeviceType::Cpu => "CPU",
        }
    }
}

#[derive(Debug)]
pub struct RendererInfo {
    pub device_name: String,
    pub device_type: String,
    pub vendor_name: String,
    pub backend: String,
}

impl Display for RendererInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Vendor name: {}", self.vendor_name)?;
        writeln!(f, "Device name: {}", self.device_name)?;
        writeln!(f, "Device type: {}", self.device_type)?;
        writeln!(f, "Backend: {}", self.backend)?;
        Ok(())
    }
}

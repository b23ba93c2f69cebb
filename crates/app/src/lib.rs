#![allow(clippy::new_without_default)]

use color_eyre::Result;
use log::warn;
use wgpu::SurfaceError;
use winit::{
    dpi::PhysicalSize,
    event::{Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::ControlFlow,
};

pub use crate::app::App;
mod app;

pub use app::{
    device::GpuDevice,
    gbuffer::{GBuffer, SCENE_SHADER},
    panels::EguiPanels,
    reflect::{EffectLayout, MemberKind, ReflectError, UniformBlock, UniformMember},
    RendererInfo,
};
pub use components::{Gpu, Watcher};
pub use egui;
pub use winit::{dpi::LogicalSize, window::WindowBuilder};

use pass::{ChainConfig, ParamOverride};

pub const WINDOW_TITLE: &str = "postfx";

/// `RUST_LOG` defaults to `info`; noisy graphics crates are capped.
pub fn init_logger() {
    env_logger::builder()
        .parse_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"))
        .filter_module("wgpu_core", log::LevelFilter::Warn)
        .filter_module("wgpu_hal", log::LevelFilter::Warn)
        .filter_module("MANGOHUD", log::LevelFilter::Warn)
        .filter_module("winit", log::LevelFilter::Warn)
        .filter_module("naga", log::LevelFilter::Error)
        .init();
}

/// Opens a window sized from `config` and runs the chain over the ray-marched
/// G-buffer until the window is closed or Escape is pressed.
pub fn run(config: ChainConfig, overrides: &[ParamOverride]) -> Result<()> {
    let event_loop = winit::event_loop::EventLoopBuilder::with_user_event().build();
    let window = WindowBuilder::new()
        .with_title(WINDOW_TITLE)
        .with_inner_size(LogicalSize::new(config.width, config.height))
        .build(&event_loop)?;

    let watcher = Watcher::new(event_loop.create_proxy())?;

    let mut app = App::new(&window, watcher, &config)?;
    app.apply_overrides(overrides)?;
    log::info!("\n{}", app.get_info());

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::RedrawEventsCleared => window.request_redraw(),
            Event::RedrawRequested(_) => {
                if let Err(err) = app.render(&window) {
                    match err {
                        SurfaceError::Lost | SurfaceError::Outdated => {
                            warn!("render: Outdated Surface");
                            app.surface.configure(app.device(), &app.surface_config);
                            window.request_redraw();
                        }
                        SurfaceError::OutOfMemory => {
                            log::error!("Surface out of memory, exiting");
                            *control_flow = ControlFlow::Exit;
                        }
                        SurfaceError::Timeout => warn!("Surface Timeout"),
                    }
                }
            }
            Event::WindowEvent {
                event:
                    WindowEvent::Resized(PhysicalSize { width, height })
                    | WindowEvent::ScaleFactorChanged {
                        new_inner_size: &mut PhysicalSize { width, height },
                        ..
                    },
                ..
            } => {
                if width != 0 && height != 0 {
                    app.resize(width, height);
                }
            }
            Event::WindowEvent {
                event:
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                virtual_keycode: Some(VirtualKeyCode::Escape),
                                ..
                            },
                        ..
                    },
                ..
            } => *control_flow = ControlFlow::Exit,
            Event::WindowEvent { event, .. } => {
                let _ = app.egui_state.on_event(&app.egui_context, &event);
            }
            Event::UserEvent(path) => {
                app.handle_events(path);
            }
            Event::LoopDestroyed => {
                app.shutdown();
                log::info!("Bye");
            }
            _ => {}
        }
    })
}

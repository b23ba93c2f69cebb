use crate::{
    device::{EffectDesc, EffectHandle, Extent, Filter, ImageDesc, ImageHandle, PixelFormat},
    error::DeviceError,
    param::ParamSet,
    ui::ParameterUi,
    RenderDevice,
};

/// Per-chain state every stage is loaded with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadContext {
    pub extent: Extent,
    pub format: PixelFormat,
    pub filter: Filter,
}

impl LoadContext {
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.aspect_ratio()
    }
}

/// Images a stage may read during one frame.
///
/// `color` is the stage's primary input. The auxiliary G-buffer images are
/// shared by every stage and must not be written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    pub time: f32,
    pub color: ImageHandle,
    pub depth: Option<ImageHandle>,
    pub normal: Option<ImageHandle>,
    pub position: Option<ImageHandle>,
    pub motion: Option<ImageHandle>,
}

impl FrameInputs {
    pub fn new(time: f32, color: ImageHandle) -> Self {
        Self {
            time,
            color,
            depth: None,
            normal: None,
            position: None,
            motion: None,
        }
    }

    pub fn with_color(&self, color: ImageHandle) -> Self {
        Self { color, ..*self }
    }

    pub(crate) fn named_images(&self) -> [(&'static str, Option<ImageHandle>); 5] {
        [
            ("color", Some(self.color)),
            ("depth", self.depth),
            ("normal", self.normal),
            ("position", self.position),
            ("motion", self.motion),
        ]
    }
}

/// An effect and the image it renders into.
#[derive(Debug)]
pub struct FullscreenPass {
    pub effect: EffectHandle,
    pub output: ImageHandle,
    label: String,
    format: PixelFormat,
}

impl FullscreenPass {
    pub fn create(
        device: &mut dyn RenderDevice,
        label: &str,
        desc: &EffectDesc,
        ctx: &LoadContext,
    ) -> Result<Self, DeviceError> {
        let effect = device.create_effect(desc)?;
        let output =
            match device.create_image(&ImageDesc::render_target(label, ctx.extent, ctx.format)) {
                Ok(output) => output,
                Err(err) => {
                    device.destroy_effect(effect);
                    return Err(err);
                }
            };
        Ok(Self {
            effect,
            output,
            label: label.to_owned(),
            format: ctx.format,
        })
    }

    pub fn resize(
        &mut self,
        device: &mut dyn RenderDevice,
        extent: Extent,
    ) -> Result<(), DeviceError> {
        let output =
            device.create_image(&ImageDesc::render_target(&self.label, extent, self.format))?;
        device.destroy_image(std::mem::replace(&mut self.output, output));
        Ok(())
    }

    pub fn execute(
        &self,
        device: &mut dyn RenderDevice,
        bindings: &crate::Bindings,
    ) -> Result<(), DeviceError> {
        device.execute(self.effect, bindings, self.output)
    }

    pub fn release(self, device: &mut dyn RenderDevice) {
        device.destroy_image(self.output);
        device.destroy_effect(self.effect);
    }
}

/// Lifecycle of a stage's pass, which only exists while the stage is loaded.
pub trait PassSlotExt {
    /// Reallocates the output if the pass is loaded.
    fn resize_pass(
        &mut self,
        device: &mut dyn RenderDevice,
        extent: Extent,
    ) -> Result<(), DeviceError>;

    fn release_pass(&mut self, device: &mut dyn RenderDevice);
}

impl PassSlotExt for Option<FullscreenPass> {
    fn resize_pass(
        &mut self,
        device: &mut dyn RenderDevice,
        extent: Extent,
    ) -> Result<(), DeviceError> {
        match self {
            Some(pass) => pass.resize(device, extent),
            None => Ok(()),
        }
    }

    fn release_pass(&mut self, device: &mut dyn RenderDevice) {
        if let Some(pass) = self.take() {
            pass.release(device);
        }
    }
}

/// One full-screen postprocess effect in a chain.
pub trait Stage {
    /// Unique within a chain.
    fn name(&self) -> &str;

    fn params(&self) -> &ParamSet;

    fn params_mut(&mut self) -> &mut ParamSet;

    /// Resolves the stage's effect and allocates its output at `ctx.extent`.
    fn load(
        &mut self,
        device: &mut dyn RenderDevice,
        ctx: &LoadContext,
    ) -> Result<(), DeviceError>;

    fn resize(
        &mut self,
        device: &mut dyn RenderDevice,
        extent: Extent,
    ) -> Result<(), DeviceError>;

    /// Renders `inputs.color` through the effect into the stage output.
    fn render(
        &mut self,
        device: &mut dyn RenderDevice,
        inputs: &FrameInputs,
    ) -> Result<(), DeviceError>;

    /// Returns whether the user changed a parameter.
    fn ui(&mut self, ui: &mut dyn ParameterUi) -> bool {
        let title = self.name().to_owned();
        param_panel(ui, &title, self.params_mut())
    }

    fn pass(&self) -> Option<&FullscreenPass>;

    fn output(&self) -> Option<ImageHandle> {
        self.pass().map(|pass| pass.output)
    }

    fn is_loaded(&self) -> bool {
        self.output().is_some()
    }

    fn unload(&mut self, device: &mut dyn RenderDevice);
}

/// A panel with one slider per parameter.
pub fn param_panel(ui: &mut dyn ParameterUi, title: &str, params: &mut ParamSet) -> bool {
    ui.panel(title, &mut |ui: &mut dyn ParameterUi| param_sliders(ui, params))
}

pub fn param_sliders(ui: &mut dyn ParameterUi, params: &mut ParamSet) -> bool {
    let mut changed = false;
    for param in params.iter_mut() {
        changed |= ui.slider(param.name, &mut param.value, param.range.clone());
    }
    changed
}

use crate::{
    effects::{binding, shader},
    stage::param_sliders,
    Bindings, DeviceError, EffectDesc, EffectHandle, Extent, Filter, FrameInputs, FullscreenPass,
    LoadContext, Param, ParamSet, ParameterUi, PassSlotExt, RenderDevice, Stage,
};

const RCP_X: &str = "rcp_x";
const RCP_Y: &str = "rcp_y";

/// Fast approximate anti-aliasing. Copies its input when disabled.
pub struct Fxaa {
    name: String,
    params: ParamSet,
    enabled: bool,
    filter: Filter,
    pass: Option<FullscreenPass>,
    copy: Option<EffectHandle>,
}

impl Fxaa {
    pub const NAME: &'static str = "fxaa";

    pub fn new() -> Self {
        Self::named(Self::NAME)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: ParamSet::new([
                Param::new(RCP_X, 0.1, 0.01..=1.),
                Param::new(RCP_Y, 0.1, 0.01..=1.),
            ]),
            enabled: true,
            filter: Filter::default(),
            pass: None,
            copy: None,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Default for Fxaa {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Fxaa {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn load(
        &mut self,
        device: &mut dyn RenderDevice,
        ctx: &LoadContext,
    ) -> Result<(), DeviceError> {
        let pass = FullscreenPass::create(device, &self.name, &EffectDesc::new(shader::FXAA), ctx)?;
        match device.create_effect(&EffectDesc::new(shader::COPY)) {
            Ok(copy) => {
                self.copy = Some(copy);
                self.pass = Some(pass);
                self.filter = ctx.filter;
                Ok(())
            }
            Err(err) => {
                pass.release(device);
                Err(err)
            }
        }
    }

    fn resize(
        &mut self,
        device: &mut dyn RenderDevice,
        extent: Extent,
    ) -> Result<(), DeviceError> {
        self.pass.resize_pass(device, extent)
    }

    fn render(
        &mut self,
        device: &mut dyn RenderDevice,
        inputs: &FrameInputs,
    ) -> Result<(), DeviceError> {
        let (Some(pass), Some(copy)) = (&self.pass, self.copy) else {
            return Err(DeviceError::UnknownEffect);
        };

        let mut bindings = Bindings::new();
        bindings
            .image(binding::COLOR, inputs.color)
            .sampler(binding::SAMPLER, self.filter);
        if !self.enabled {
            return device.execute(copy, &bindings, pass.output);
        }

        let extent = device
            .image_extent(pass.output)
            .ok_or(DeviceError::UnknownImage)?;
        bindings
            .vec2(binding::RESOLUTION, extent.as_vec2())
            .vec2(
                binding::RCP_FRAME,
                glam::vec2(self.params.value(RCP_X), self.params.value(RCP_Y)),
            );
        pass.execute(device, &bindings)
    }

    fn ui(&mut self, ui: &mut dyn ParameterUi) -> bool {
        let Self {
            name,
            params,
            enabled,
            ..
        } = self;
        ui.panel(name, &mut |ui: &mut dyn ParameterUi| {
            let changed = param_sliders(ui, params);
            ui.checkbox("FXAA", enabled) | changed
        })
    }

    fn pass(&self) -> Option<&FullscreenPass> {
        self.pass.as_ref()
    }

    fn unload(&mut self, device: &mut dyn RenderDevice) {
        if let Some(copy) = self.copy.take() {
            device.destroy_effect(copy);
        }
        self.pass.release_pass(device);
    }
}

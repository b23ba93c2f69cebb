use std::ops::RangeInclusive;

use crate::{
    effects::{binding, shader},
    Bindings, DeviceError, EffectDesc, Extent, Filter, FrameInputs, FullscreenPass, LoadContext,
    Param, ParamSet, PassSlotExt, RenderDevice, Stage,
};

/// A full-screen effect over the input color driven by `strength` and the
/// frame time. Zero strength passes the input through.
pub struct TimedEffect {
    name: String,
    shader: &'static str,
    params: ParamSet,
    filter: Filter,
    pass: Option<FullscreenPass>,
}

impl TimedEffect {
    pub fn new(
        name: impl Into<String>,
        shader: &'static str,
        strength: RangeInclusive<f32>,
    ) -> Self {
        Self {
            name: name.into(),
            shader,
            params: ParamSet::new([Param::new(binding::STRENGTH, 0., strength)]),
            filter: Filter::default(),
            pass: None,
        }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.params.set(binding::STRENGTH, strength);
        self
    }

    pub fn strength(&self) -> f32 {
        self.params.value(binding::STRENGTH)
    }

    pub fn shader(&self) -> &'static str {
        self.shader
    }
}

/// Photographic grain noise over the input color, strength in `[0, 100]`.
pub struct FilmGrain;

impl FilmGrain {
    pub const NAME: &'static str = "film_grain";

    pub fn new() -> TimedEffect {
        Self::named(Self::NAME)
    }

    pub fn named(name: impl Into<String>) -> TimedEffect {
        TimedEffect::new(name, shader::FILM_GRAIN, 0.0..=100.)
    }
}

/// Time-driven scanline displacement and channel split, strength in `[0, 1]`.
pub struct Glitch;

impl Glitch {
    pub const NAME: &'static str = "glitch";

    pub fn new() -> TimedEffect {
        Self::named(Self::NAME)
    }

    pub fn named(name: impl Into<String>) -> TimedEffect {
        TimedEffect::new(name, shader::GLITCH, 0.0..=1.)
    }
}

impl Stage for TimedEffect {
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
        let desc = EffectDesc::new(self.shader);
        self.pass = Some(FullscreenPass::create(device, &self.name, &desc, ctx)?);
        self.filter = ctx.filter;
        Ok(())
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
        let pass = self.pass.as_ref().ok_or(DeviceError::UnknownEffect)?;
        let extent = device
            .image_extent(pass.output)
            .ok_or(DeviceError::UnknownImage)?;

        let mut bindings = Bindings::new();
        bindings
            .image(binding::COLOR, inputs.color)
            .sampler(binding::SAMPLER, self.filter)
            .vec2(binding::RESOLUTION, extent.as_vec2())
            .float(binding::STRENGTH, self.strength())
            .float(binding::TIME, inputs.time);
        pass.execute(device, &bindings)
    }

    fn pass(&self) -> Option<&FullscreenPass> {
        self.pass.as_ref()
    }

    fn unload(&mut self, device: &mut dyn RenderDevice) {
        self.pass.release_pass(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_only_in_shader_and_range() {
        let grain = FilmGrain::new().with_strength(25.);
        let glitch = Glitch::named("scanlines").with_strength(0.4);

        assert_eq!(grain.name(), FilmGrain::NAME);
        assert_eq!(grain.shader(), shader::FILM_GRAIN);
        assert_eq!(grain.strength(), 25.);
        assert_eq!(grain.params().iter().next().map(|p| p.range.clone()), Some(0.0..=100.));
        assert_eq!(glitch.name(), "scanlines");
        assert_eq!(glitch.shader(), shader::GLITCH);
        assert_eq!(glitch.strength(), 0.4);
        assert_eq!(glitch.params().iter().next().map(|p| p.range.clone()), Some(0.0..=1.));
    }
}

#![allow(dead_code)]

use std::{cell::Cell, cell::RefCell, ops::RangeInclusive, rc::Rc};

use glam::Vec4;
use pass::{
    effects::{binding, shader},
    Bindings, ChainConfig, DeviceError, EffectDesc, Extent, Filter, FrameInputs, FullscreenPass,
    ImageDesc, ImageHandle, LoadContext, Param, ParamSet, ParameterUi, PassSlotExt, PixelFormat,
    RenderDevice, SoftwareDevice, Stage,
};

pub const GREY: Vec4 = Vec4::new(0.5, 0.5, 0.5, 1.);

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config(width: u32, height: u32) -> ChainConfig {
    ChainConfig {
        width,
        height,
        ..Default::default()
    }
}

pub fn solid(device: &mut SoftwareDevice, extent: Extent, color: Vec4) -> ImageHandle {
    let texels = vec![color; extent.texel_count()];
    device
        .create_image_with_data(
            &ImageDesc::texture("base color", extent, PixelFormat::Rgba16Float),
            &texels,
        )
        .unwrap()
}

/// A left-to-right, top-to-bottom gradient with some texture to it.
pub fn gradient(device: &mut SoftwareDevice, extent: Extent) -> ImageHandle {
    let mut texels = Vec::with_capacity(extent.texel_count());
    for y in 0..extent.height {
        for x in 0..extent.width {
            let u = x as f32 / (extent.width - 1).max(1) as f32;
            let v = y as f32 / (extent.height - 1).max(1) as f32;
            texels.push(Vec4::new(u, v, 1. - u * v, 1.));
        }
    }
    device
        .create_image_with_data(
            &ImageDesc::texture("gradient", extent, PixelFormat::Rgba16Float),
            &texels,
        )
        .unwrap()
}

pub fn assert_close(actual: &[Vec4], expected: &[Vec4], tolerance: f32) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            a.abs_diff_eq(*e, tolerance),
            "texel {i}: got {a}, expected {e}"
        );
    }
}

/// Copies its input and records every input handle it was given.
pub struct StubStage {
    name: String,
    shader: &'static str,
    params: ParamSet,
    pass: Option<FullscreenPass>,
    reject_width: Option<u32>,
    pub seen: Rc<RefCell<Vec<ImageHandle>>>,
    pub loads: Rc<Cell<usize>>,
}

impl StubStage {
    pub fn identity(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            shader: shader::COPY,
            params: ParamSet::new([Param::new("gain", 1., 0.0..=2.)]),
            pass: None,
            reject_width: None,
            seen: Default::default(),
            loads: Default::default(),
        }
    }

    /// Its effect does not exist on any device.
    pub fn missing(name: &str) -> Self {
        Self {
            shader: "test/missing",
            ..Self::identity(name)
        }
    }

    /// Fails to resize to any extent `width` texels wide.
    pub fn rejecting_width(mut self, width: u32) -> Self {
        self.reject_width = Some(width);
        self
    }
}

impl Stage for StubStage {
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
        self.loads.set(self.loads.get() + 1);
        let desc = EffectDesc::new(self.shader);
        self.pass = Some(FullscreenPass::create(device, &self.name, &desc, ctx)?);
        Ok(())
    }

    fn resize(
        &mut self,
        device: &mut dyn RenderDevice,
        extent: Extent,
    ) -> Result<(), DeviceError> {
        if self.reject_width == Some(extent.width) {
            return Err(DeviceError::InvalidImage(format!(
                "{} cannot be {extent}",
                self.name
            )));
        }
        self.pass.resize_pass(device, extent)
    }

    fn render(
        &mut self,
        device: &mut dyn RenderDevice,
        inputs: &FrameInputs,
    ) -> Result<(), DeviceError> {
        self.seen.borrow_mut().push(inputs.color);
        let pass = self.pass.as_ref().ok_or(DeviceError::UnknownEffect)?;
        let mut bindings = Bindings::new();
        bindings
            .image(binding::COLOR, inputs.color)
            .sampler(binding::SAMPLER, Filter::Point);
        pass.execute(device, &bindings)
    }

    fn pass(&self) -> Option<&FullscreenPass> {
        self.pass.as_ref()
    }

    fn unload(&mut self, device: &mut dyn RenderDevice) {
        self.pass.release_pass(device);
    }
}

/// Records the widgets it is asked to draw and applies queued edits.
#[derive(Default)]
pub struct ScriptedUi {
    pub panels: Vec<String>,
    pub widgets: Vec<String>,
    pub slider_edits: Vec<(String, f32)>,
    pub file_edits: Vec<(String, String)>,
}

impl ScriptedUi {
    pub fn with_slider(mut self, label: &str, value: f32) -> Self {
        self.slider_edits.push((label.to_owned(), value));
        self
    }

    pub fn with_file(mut self, label: &str, path: &str) -> Self {
        self.file_edits.push((label.to_owned(), path.to_owned()));
        self
    }
}

impl ParameterUi for ScriptedUi {
    fn panel(
        &mut self,
        title: &str,
        contents: &mut dyn FnMut(&mut dyn ParameterUi) -> bool,
    ) -> bool {
        self.panels.push(title.to_owned());
        contents(self)
    }

    fn slider(&mut self, label: &str, value: &mut f32, _range: RangeInclusive<f32>) -> bool {
        self.widgets.push(label.to_owned());
        let Some(index) = self.slider_edits.iter().position(|(l, _)| l == label) else {
            return false;
        };
        *value = self.slider_edits.remove(index).1;
        true
    }

    fn checkbox(&mut self, label: &str, _value: &mut bool) -> bool {
        self.widgets.push(label.to_owned());
        false
    }

    fn file_input(&mut self, label: &str, path: &mut String) -> bool {
        self.widgets.push(label.to_owned());
        let Some(index) = self.file_edits.iter().position(|(l, _)| l == label) else {
            return false;
        };
        *path = self.file_edits.remove(index).1;
        true
    }
}

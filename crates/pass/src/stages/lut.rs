use std::path::{Path, PathBuf};

use glam::Vec4;

use crate::{
    effects::{binding, shader},
    stage::param_sliders,
    Bindings, DeviceError, EffectDesc, Extent, Filter, FrameInputs, FullscreenPass, ImageDesc,
    ImageHandle, LoadContext, Param, ParamSet, ParameterUi, PassSlotExt, PixelFormat,
    RenderDevice, Stage,
};

/// Color grading through a 3D lookup table stored as an `N*N x N` strip:
/// blue selects one of `N` horizontal `N x N` tiles, red runs along x inside a
/// tile and green along y.
pub struct Lut {
    name: String,
    params: ParamSet,
    source: Option<PathBuf>,
    table: Option<LutTable>,
    path_input: String,
    pending: Option<PathBuf>,
    pass: Option<FullscreenPass>,
}

struct LutTable {
    image: ImageHandle,
    size: u32,
}

impl Lut {
    pub const NAME: &'static str = "lut";
    pub const IDENTITY_SIZE: u32 = 16;

    pub fn new() -> Self {
        Self::named(Self::NAME)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: ParamSet::new([Param::new(binding::AMOUNT, 0., 0.0..=1.)]),
            source: None,
            table: None,
            path_input: String::new(),
            pending: None,
            pass: None,
        }
    }

    /// Grades with the table at `path` instead of the identity table.
    pub fn with_table(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.path_input = path.display().to_string();
        self.source = Some(path);
        self
    }

    pub fn with_amount(mut self, amount: f32) -> Self {
        self.params.set(binding::AMOUNT, amount);
        self
    }

    pub fn amount(&self) -> f32 {
        self.params.value(binding::AMOUNT)
    }

    pub fn table_source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Swaps the table before the next frame. A table that fails to load is
    /// reported and the current one stays bound.
    pub fn request_table(&mut self, path: impl Into<PathBuf>) {
        self.pending = Some(path.into());
    }

    fn acquire_table(
        device: &mut dyn RenderDevice,
        source: Option<&Path>,
    ) -> Result<LutTable, DeviceError> {
        let image = match source {
            Some(path) => device.load_image(path)?,
            None => {
                let size = Self::IDENTITY_SIZE;
                let desc = ImageDesc::texture(
                    "Identity LUT",
                    Extent::new(size * size, size),
                    PixelFormat::Rgba8Unorm,
                );
                device.create_image_with_data(&desc, &identity_table(size))?
            }
        };

        let extent = device.image_extent(image).ok_or(DeviceError::UnknownImage)?;
        if extent.height < 2 || extent.width != extent.height * extent.height {
            device.destroy_image(image);
            return Err(DeviceError::InvalidImage(format!(
                "LUT strip must be N*N x N texels, got {extent}"
            )));
        }
        Ok(LutTable {
            image,
            size: extent.height,
        })
    }

    fn apply_pending(&mut self, device: &mut dyn RenderDevice) {
        let Some(path) = self.pending.take() else {
            return;
        };
        match Self::acquire_table(device, Some(&path)) {
            Ok(table) => {
                log::info!("{}: loaded LUT {}", self.name, path.display());
                if let Some(old) = self.table.replace(table) {
                    device.destroy_image(old.image);
                }
                self.source = Some(path);
            }
            Err(err) => log::error!("{}: keeping current LUT: {err}", self.name),
        }
    }
}

impl Default for Lut {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity table in strip layout: every texel maps to its own color.
pub fn identity_table(size: u32) -> Vec<Vec4> {
    let max = (size - 1) as f32;
    let mut texels = Vec::with_capacity((size * size * size) as usize);
    for y in 0..size {
        for x in 0..size * size {
            let (slice, red) = (x / size, x % size);
            texels.push(Vec4::new(
                red as f32 / max,
                y as f32 / max,
                slice as f32 / max,
                1.,
            ));
        }
    }
    texels
}

impl Stage for Lut {
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
        let desc = EffectDesc::new(shader::LUT);
        let pass = FullscreenPass::create(device, &self.name, &desc, ctx)?;
        match Self::acquire_table(device, self.source.as_deref()) {
            Ok(table) => {
                self.table = Some(table);
                self.pass = Some(pass);
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
        self.apply_pending(device);
        let (Some(pass), Some(table)) = (&self.pass, &self.table) else {
            return Err(DeviceError::UnknownEffect);
        };

        // The table is always read with bilinear filtering, otherwise grading
        // bands at tile resolution.
        let mut bindings = Bindings::new();
        bindings
            .image(binding::COLOR, inputs.color)
            .image(binding::LUT, table.image)
            .sampler(binding::SAMPLER, Filter::Linear)
            .float(binding::LUT_SIZE, table.size as f32)
            .float(binding::AMOUNT, self.amount());
        pass.execute(device, &bindings)
    }

    fn ui(&mut self, ui: &mut dyn ParameterUi) -> bool {
        let Self {
            name,
            params,
            path_input,
            pending,
            ..
        } = self;
        ui.panel(name, &mut |ui: &mut dyn ParameterUi| {
            let mut changed = param_sliders(ui, params);
            if ui.file_input("LUT texture", path_input) {
                let path = path_input.trim();
                if !path.is_empty() {
                    *pending = Some(PathBuf::from(path));
                    changed = true;
                }
            }
            changed
        })
    }

    fn pass(&self) -> Option<&FullscreenPass> {
        self.pass.as_ref()
    }

    fn unload(&mut self, device: &mut dyn RenderDevice) {
        if let Some(table) = self.table.take() {
            device.destroy_image(table.image);
        }
        self.pass.release_pass(device);
    }
}

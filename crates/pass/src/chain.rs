use crate::{
    config::{ChainConfig, ParamOverride},
    error::{ChainError, ConfigError},
    registry::StageRegistry,
    stages::{FilmGrain, Glitch, Lut},
    Extent, FrameInputs, FullscreenPass, ImageHandle, LoadContext, ParameterUi, RenderDevice,
    Stage,
};

/// An ordered list of stages where stage `i` reads the output of stage `i - 1`
/// and the first stage reads the G-buffer color.
///
/// The chain does not own the device. Call [`Chain::unload`] with the same
/// device before dropping a loaded chain, otherwise its images leak.
pub struct Chain {
    stages: Vec<Box<dyn Stage>>,
    registry: StageRegistry,
    ctx: Option<LoadContext>,
}

impl Chain {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self, ChainError> {
        if stages.is_empty() {
            return Err(ChainError::Empty);
        }
        let mut registry = StageRegistry::new();
        for stage in &stages {
            if !registry.insert(stage.name()) {
                return Err(ChainError::DuplicateStage(stage.name().to_owned()));
            }
        }
        Ok(Self {
            stages,
            registry,
            ctx: None,
        })
    }

    pub fn from_config(config: &ChainConfig) -> Result<Self, ChainError> {
        Self::new(config.build_stages())
    }

    /// The unloaded default chain with every parameter at zero.
    pub fn default_chain() -> Self {
        let stages = Self::default_stages();
        let mut registry = StageRegistry::new();
        for stage in &stages {
            registry.insert(stage.name());
        }
        Self {
            stages,
            registry,
            ctx: None,
        }
    }

    /// LUT, then film grain, then glitch.
    pub fn default_stages() -> Vec<Box<dyn Stage>> {
        vec![
            Box::new(Lut::new()),
            Box::new(FilmGrain::new()),
            Box::new(Glitch::new()),
        ]
    }

    /// Loads every stage in chain order.
    ///
    /// Only the viewport, format and sampler of `config` are used. Its
    /// `[[stage]]` list is applied when the chain is built, by
    /// [`Chain::from_config`].
    ///
    /// On failure the stages loaded so far are released again and the chain
    /// stays unloaded; later stages are never attempted.
    pub fn load(
        &mut self,
        device: &mut dyn RenderDevice,
        config: &ChainConfig,
    ) -> Result<(), ChainError> {
        self.load_with(device, config.load_context())
    }

    pub fn load_with(
        &mut self,
        device: &mut dyn RenderDevice,
        ctx: LoadContext,
    ) -> Result<(), ChainError> {
        if self.is_loaded() {
            self.unload(device);
        }

        for i in 0..self.stages.len() {
            let stage = &mut self.stages[i];
            log::debug!("Loading stage `{}` at {}", stage.name(), ctx.extent);
            if let Err(source) = stage.load(device, &ctx) {
                let name = stage.name().to_owned();
                log::error!("Stage `{name}` failed to load: {source}");
                for loaded in self.stages[..i].iter_mut().rev() {
                    loaded.unload(device);
                }
                return Err(ChainError::Load { stage: name, source });
            }
        }

        log::info!(
            "Loaded chain [{}] at {}",
            self.names().collect::<Vec<_>>().join(" -> "),
            ctx.extent
        );
        self.ctx = Some(ctx);
        Ok(())
    }

    /// Reallocates every stage output. Empty extents (a minimized window) are
    /// ignored.
    ///
    /// Either every stage ends up at `extent` or none does: on failure the
    /// stages already resized go back to the previous extent, and if even that
    /// fails the whole chain is unloaded.
    pub fn resize(
        &mut self,
        device: &mut dyn RenderDevice,
        extent: Extent,
    ) -> Result<(), ChainError> {
        let previous = self.ctx.ok_or(ChainError::NotLoaded)?.extent;
        if extent.is_empty() || previous == extent {
            return Ok(());
        }

        for i in 0..self.stages.len() {
            let Err(source) = self.stages[i].resize(device, extent) else {
                continue;
            };
            let stage = self.stages[i].name().to_owned();
            log::error!("Stage `{stage}` failed to resize to {extent}: {source}");

            let mut restored = true;
            for resized in &mut self.stages[..i] {
                if let Err(err) = resized.resize(device, previous) {
                    log::error!("Stage `{}` failed to restore {previous}: {err}", resized.name());
                    restored = false;
                    break;
                }
            }
            if !restored {
                self.unload(device);
            }
            return Err(ChainError::Resize { stage, source });
        }

        if let Some(ctx) = &mut self.ctx {
            ctx.extent = extent;
        }
        log::debug!("Resized chain to {extent}");
        Ok(())
    }

    /// Runs every stage once and returns the final image.
    ///
    /// All inputs must be live images at the chain extent, and `color` must be
    /// an RGBA format. Nothing is rendered if a check fails.
    pub fn render_frame(
        &mut self,
        device: &mut dyn RenderDevice,
        inputs: &FrameInputs,
    ) -> Result<ImageHandle, ChainError> {
        let ctx = self.ctx.ok_or(ChainError::NotLoaded)?;
        check_inputs(device, inputs, ctx.extent)?;

        let mut color = inputs.color;
        for stage in &mut self.stages {
            stage
                .render(device, &inputs.with_color(color))
                .map_err(|source| ChainError::Render {
                    stage: stage.name().to_owned(),
                    source,
                })?;
            color = stage.output().ok_or(ChainError::NotLoaded)?;
        }
        Ok(color)
    }

    /// Like [`Chain::render_frame`], but recoverable input errors yield the
    /// unprocessed color instead.
    pub fn render_or_passthrough(
        &mut self,
        device: &mut dyn RenderDevice,
        inputs: &FrameInputs,
    ) -> Result<ImageHandle, ChainError> {
        match self.render_frame(device, inputs) {
            Err(err) if err.is_recoverable() => {
                log::warn!("Skipping postprocess for this frame: {err}");
                Ok(inputs.color)
            }
            result => result,
        }
    }

    /// Draws every stage's panel in chain order. Returns whether any
    /// parameter changed.
    pub fn render_ui(&mut self, ui: &mut dyn ParameterUi) -> bool {
        let mut changed = false;
        for stage in &mut self.stages {
            changed |= stage.ui(ui);
        }
        changed
    }

    /// The last stage's output. `None` until the chain is loaded.
    pub fn output(&self) -> Option<ImageHandle> {
        self.ctx?;
        self.stages.last()?.output()
    }

    pub fn unload(&mut self, device: &mut dyn RenderDevice) {
        for stage in self.stages.iter_mut().rev() {
            stage.unload(device);
        }
        self.ctx = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.ctx.is_some()
    }

    pub fn extent(&self) -> Option<Extent> {
        self.ctx.map(|ctx| ctx.extent)
    }

    pub fn stage(&self, name: &str) -> Option<&dyn Stage> {
        let index = self.registry.position(name)?;
        Some(self.stages[index].as_ref())
    }

    pub fn stage_mut(&mut self, name: &str) -> Option<&mut dyn Stage> {
        let index = self.registry.position(name)?;
        Some(self.stages[index].as_mut())
    }

    pub fn pass(&self, name: &str) -> Option<&FullscreenPass> {
        self.stage(name)?.pass()
    }

    pub fn stages(&self) -> impl Iterator<Item = &dyn Stage> {
        self.stages.iter().map(|stage| &**stage as &dyn Stage)
    }

    /// Stage names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|stage| stage.name())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn apply_override(&mut self, param: &ParamOverride) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownParameter {
            stage: param.stage.clone(),
            param: param.param.clone(),
        };
        let stage = self.stage_mut(&param.stage).ok_or_else(unknown)?;
        if !stage.params_mut().set(&param.param, param.value) {
            return Err(unknown());
        }
        Ok(())
    }
}

fn check_inputs(
    device: &dyn RenderDevice,
    inputs: &FrameInputs,
    expected: Extent,
) -> Result<(), ChainError> {
    for (input, image) in inputs.named_images() {
        let Some(image) = image else {
            continue;
        };
        let (actual, format) = device
            .image_info(image)
            .ok_or(ChainError::MissingInput(input))?;
        if actual != expected {
            return Err(ChainError::ExtentMismatch {
                input,
                expected,
                actual,
            });
        }
        if input == "color" && !format.is_rgba() {
            return Err(ChainError::FormatMismatch { input, format });
        }
    }
    Ok(())
}

use pass::{
    effects::binding, Bindings, DeviceError, EffectDesc, EffectHandle, Extent, FrameInputs,
    ImageDesc, ImageHandle, PixelFormat, RenderDevice,
};

pub const SCENE_SHADER: &str = "scene/raymarch";

const ATTACHMENT_COUNT: usize = 5;

const ATTACHMENTS: [(&str, PixelFormat); ATTACHMENT_COUNT] = [
    ("G-Buffer Color", PixelFormat::Rgba16Float),
    ("G-Buffer Depth", PixelFormat::R32Float),
    ("G-Buffer Normal", PixelFormat::Rgba16Float),
    ("G-Buffer Position", PixelFormat::Rgba16Float),
    ("G-Buffer Motion", PixelFormat::Rgba16Float),
];

/// Ray-marched stand-in for a deferred renderer: color, linear depth, world
/// normal, world position and motion, regenerated every frame.
///
/// Each attachment is its own effect, selected by the `ATTACHMENT` define.
/// Motion holds the uv offset to where the surface was one 60 Hz frame
/// earlier in `xy`.
pub struct GBuffer {
    effects: [EffectHandle; ATTACHMENT_COUNT],
    targets: [ImageHandle; ATTACHMENT_COUNT],
    extent: Extent,
}

impl GBuffer {
    pub fn new(device: &mut dyn RenderDevice, extent: Extent) -> Result<Self, DeviceError> {
        let mut effects = Vec::with_capacity(ATTACHMENTS.len());
        for index in 0..ATTACHMENTS.len() {
            let desc = EffectDesc::new(SCENE_SHADER).with_define("ATTACHMENT", index.to_string());
            match device.create_effect(&desc) {
                Ok(effect) => effects.push(effect),
                Err(err) => {
                    effects.into_iter().for_each(|effect| device.destroy_effect(effect));
                    return Err(err);
                }
            }
        }

        let targets = match create_targets(device, extent) {
            Ok(targets) => targets,
            Err(err) => {
                effects.into_iter().for_each(|effect| device.destroy_effect(effect));
                return Err(err);
            }
        };
        let Ok(effects) = <[EffectHandle; ATTACHMENT_COUNT]>::try_from(effects) else {
            return Err(DeviceError::UnknownEffect);
        };

        Ok(Self {
            effects,
            targets,
            extent,
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Reallocates every attachment. Empty or unchanged extents are ignored.
    pub fn resize(
        &mut self,
        device: &mut dyn RenderDevice,
        extent: Extent,
    ) -> Result<(), DeviceError> {
        if extent.is_empty() || extent == self.extent {
            return Ok(());
        }
        let targets = create_targets(device, extent)?;
        for target in std::mem::replace(&mut self.targets, targets) {
            device.destroy_image(target);
        }
        self.extent = extent;
        Ok(())
    }

    pub fn render(
        &self,
        device: &mut dyn RenderDevice,
        time: f32,
    ) -> Result<FrameInputs, DeviceError> {
        let mut bindings = Bindings::new();
        bindings
            .vec2(binding::RESOLUTION, self.extent.as_vec2())
            .float(binding::TIME, time);
        for (&effect, &target) in self.effects.iter().zip(&self.targets) {
            device.execute(effect, &bindings, target)?;
        }

        let [color, depth, normal, position, motion] = self.targets;
        Ok(FrameInputs {
            depth: Some(depth),
            normal: Some(normal),
            position: Some(position),
            motion: Some(motion),
            ..FrameInputs::new(time, color)
        })
    }

    pub fn release(self, device: &mut dyn RenderDevice) {
        for target in self.targets {
            device.destroy_image(target);
        }
        for effect in self.effects {
            device.destroy_effect(effect);
        }
    }
}

fn create_targets(
    device: &mut dyn RenderDevice,
    extent: Extent,
) -> Result<[ImageHandle; ATTACHMENT_COUNT], DeviceError> {
    let mut targets = Vec::with_capacity(ATTACHMENTS.len());
    for (label, format) in ATTACHMENTS {
        match device.create_image(&ImageDesc::render_target(label, extent, format)) {
            Ok(image) => targets.push(image),
            Err(err) => {
                targets.into_iter().for_each(|image| device.destroy_image(image));
                return Err(err);
            }
        }
    }
    targets.try_into().map_err(|_| DeviceError::UnknownImage)
}

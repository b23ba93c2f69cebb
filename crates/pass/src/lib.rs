//! Postprocess chain: an ordered list of full-screen stages rendered through
//! an abstract [`RenderDevice`].

mod chain;
mod config;
mod device;
pub mod effects;
mod error;
mod param;
mod registry;
pub mod software;
mod stage;
pub mod stages;
mod ui;

pub use chain::Chain;
pub use config::{ChainConfig, ParamOverride, StageConfig, DEFAULT_CONFIG_FILE};
pub use device::{
    Bindings, Define, EffectDesc, EffectHandle, Extent, Filter, ImageDesc, ImageHandle,
    ImageUsage, ParamValue, PixelFormat, RenderDevice,
};
pub use error::{ChainError, ConfigError, DeviceError};
pub use param::{Param, ParamSet};
pub use registry::StageRegistry;
pub use software::SoftwareDevice;
pub use stage::{
    param_panel, param_sliders, FrameInputs, FullscreenPass, LoadContext, PassSlotExt, Stage,
};
pub use ui::{NoUi, ParameterUi};

//! Names shared between the stages and the effect implementations.
//!
//! Shader names resolve to `<shader_dir>/<name>.wgsl` on the GPU and to a
//! kernel of the same name on the software device. Binding names match the
//! WGSL global and uniform member names.

pub mod shader {
    pub const COPY: &str = "postfx/copy";
    pub const LUT: &str = "postfx/lut";
    pub const FILM_GRAIN: &str = "postfx/film_grain";
    pub const GLITCH: &str = "postfx/glitch";
    pub const FXAA: &str = "postfx/fxaa";
}

pub mod binding {
    pub const COLOR: &str = "color_tex";
    pub const LUT: &str = "lut_tex";
    pub const SAMPLER: &str = "tex_sampler";

    pub const RESOLUTION: &str = "resolution";
    pub const TIME: &str = "time";
    pub const STRENGTH: &str = "strength";
    pub const AMOUNT: &str = "amount";
    pub const LUT_SIZE: &str = "lut_size";
    pub const RCP_FRAME: &str = "rcp_frame";
}

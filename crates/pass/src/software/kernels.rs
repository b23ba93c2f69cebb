use glam::{vec2, Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

use super::KernelContext;
use crate::{
    effects::{binding, shader},
    ParamValue,
};

pub type KernelFn = fn(&KernelContext<'_>, Vec2) -> Vec4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec4,
}

impl UniformKind {
    pub fn accepts(self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (UniformKind::Float, ParamValue::Float(_))
                | (UniformKind::Vec2, ParamValue::Vec2(_))
                | (UniformKind::Vec4, ParamValue::Vec4(_))
        )
    }
}

/// A per-texel shading function and the inputs it declares.
#[derive(Clone, Copy)]
pub struct Kernel {
    pub uniforms: &'static [(&'static str, UniformKind)],
    pub textures: &'static [&'static str],
    pub func: KernelFn,
}

pub(super) fn builtin() -> [(&'static str, Kernel); 5] {
    [
        (
            shader::COPY,
            Kernel {
                uniforms: &[],
                textures: &[binding::COLOR],
                func: copy,
            },
        ),
        (
            shader::LUT,
            Kernel {
                uniforms: &[
                    (binding::LUT_SIZE, UniformKind::Float),
                    (binding::AMOUNT, UniformKind::Float),
                ],
                textures: &[binding::COLOR, binding::LUT],
                func: lut,
            },
        ),
        (
            shader::FILM_GRAIN,
            Kernel {
                uniforms: &[
                    (binding::RESOLUTION, UniformKind::Vec2),
                    (binding::STRENGTH, UniformKind::Float),
                    (binding::TIME, UniformKind::Float),
                ],
                textures: &[binding::COLOR],
                func: film_grain,
            },
        ),
        (
            shader::GLITCH,
            Kernel {
                uniforms: &[
                    (binding::RESOLUTION, UniformKind::Vec2),
                    (binding::STRENGTH, UniformKind::Float),
                    (binding::TIME, UniformKind::Float),
                ],
                textures: &[binding::COLOR],
                func: glitch,
            },
        ),
        (
            shader::FXAA,
            Kernel {
                uniforms: &[
                    (binding::RESOLUTION, UniformKind::Vec2),
                    (binding::RCP_FRAME, UniformKind::Vec2),
                ],
                textures: &[binding::COLOR],
                func: fxaa,
            },
        ),
    ]
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// `fract(sin(dot(p, (12.9898, 78.233))) * 43758.5453)`, as in the WGSL effects.
pub fn hash(p: Vec2) -> f32 {
    fract(p.dot(vec2(12.9898, 78.233)).sin() * 43758.5453)
}

fn copy(ctx: &KernelContext<'_>, uv: Vec2) -> Vec4 {
    ctx.sample(binding::COLOR, uv)
}

fn lut(ctx: &KernelContext<'_>, uv: Vec2) -> Vec4 {
    let color = ctx.sample(binding::COLOR, uv);
    let size = ctx.float(binding::LUT_SIZE).max(2.);
    let amount = ctx.float(binding::AMOUNT);
    let max = size - 1.;

    let c = color.xyz().clamp(Vec3::ZERO, Vec3::ONE);
    let blue = c.z * max;
    let slice = blue.floor();
    let next = (slice + 1.).min(max);

    // Texel centers of the red/green position inside a tile.
    let tile = c.xy() * max + 0.5;
    let lookup = |slice: f32| {
        let texel = vec2(slice * size + tile.x, tile.y);
        ctx.sample(binding::LUT, texel / vec2(size * size, size))
            .xyz()
    };
    let graded = lookup(slice).lerp(lookup(next), blue - slice);
    color.xyz().lerp(graded, amount).extend(color.w)
}

fn film_grain(ctx: &KernelContext<'_>, uv: Vec2) -> Vec4 {
    let color = ctx.sample(binding::COLOR, uv);
    let strength = ctx.float(binding::STRENGTH);
    let seed = uv * ctx.vec2(binding::RESOLUTION)
        + fract(ctx.float(binding::TIME)) * vec2(97., 131.);
    let grain = (hash(seed) - 0.5) * strength * 0.01;
    (color.xyz() + grain).extend(color.w)
}

fn glitch(ctx: &KernelContext<'_>, uv: Vec2) -> Vec4 {
    let strength = ctx.float(binding::STRENGTH);
    if strength <= 0. {
        return ctx.sample(binding::COLOR, uv);
    }

    let block = (uv.y * 24.).floor();
    let tick = (ctx.float(binding::TIME) * 12.).floor();
    let mut uv = uv;
    if hash(vec2(block, tick)) > 1. - strength * 0.5 {
        uv.x += (hash(vec2(tick, block)) - 0.5) * 0.2 * strength;
    }

    let split = vec2(0.01 * strength, 0.);
    let center = ctx.sample(binding::COLOR, uv);
    Vec4::new(
        ctx.sample(binding::COLOR, uv + split).x,
        center.y,
        ctx.sample(binding::COLOR, uv - split).z,
        center.w,
    )
}

const LUMA: Vec3 = Vec3::new(0.299, 0.587, 0.114);
const REDUCE_MUL: f32 = 1. / 8.;
const REDUCE_MIN: f32 = 1. / 128.;
const SPAN_MAX: f32 = 8.;

fn fxaa(ctx: &KernelContext<'_>, uv: Vec2) -> Vec4 {
    let resolution = ctx.vec2(binding::RESOLUTION).max(Vec2::ONE);
    let step = ctx.vec2(binding::RCP_FRAME) * 10. / resolution;
    let luma = |offset: Vec2| ctx.sample(binding::COLOR, uv + offset * step).xyz().dot(LUMA);

    let center = ctx.sample(binding::COLOR, uv);
    let luma_m = center.xyz().dot(LUMA);
    let luma_nw = luma(vec2(-1., -1.));
    let luma_ne = luma(vec2(1., -1.));
    let luma_sw = luma(vec2(-1., 1.));
    let luma_se = luma(vec2(1., 1.));

    let luma_min = luma_m.min(luma_nw.min(luma_ne).min(luma_sw.min(luma_se)));
    let luma_max = luma_m.max(luma_nw.max(luma_ne).max(luma_sw.max(luma_se)));

    let dir = vec2(
        -((luma_nw + luma_ne) - (luma_sw + luma_se)),
        (luma_nw + luma_sw) - (luma_ne + luma_se),
    );
    let reduce = ((luma_nw + luma_ne + luma_sw + luma_se) * 0.25 * REDUCE_MUL).max(REDUCE_MIN);
    let scale = 1. / (dir.x.abs().min(dir.y.abs()) + reduce);
    let dir = (dir * scale).clamp(Vec2::splat(-SPAN_MAX), Vec2::splat(SPAN_MAX)) * step;

    let sample = |t: f32| ctx.sample(binding::COLOR, uv + dir * t).xyz();
    let rgb_a = 0.5 * (sample(1. / 3. - 0.5) + sample(2. / 3. - 0.5));
    let rgb_b = rgb_a * 0.5 + 0.25 * (sample(-0.5) + sample(0.5));

    let luma_b = rgb_b.dot(LUMA);
    let rgb = if luma_b < luma_min || luma_b > luma_max {
        rgb_a
    } else {
        rgb_b
    };
    rgb.extend(center.w)
}

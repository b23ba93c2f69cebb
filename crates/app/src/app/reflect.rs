use std::num::NonZeroU64;

use naga::{AddressSpace, ScalarKind, TypeInner, VectorSize};
use pass::ParamValue;

#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    #[error("{0}")]
    Parse(String),
    #[error("`{0}` must be declared in bind group 0")]
    BindGroup(String),
    #[error("uniform member `{0}` must be an f32, vec2<f32> or vec4<f32>")]
    Member(String),
    #[error("effects take at most one uniform block")]
    MultipleUniforms,
    #[error("unsupported resource `{0}`")]
    Resource(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Float,
    Vec2,
    Vec4,
}

impl MemberKind {
    pub fn accepts(self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (MemberKind::Float, ParamValue::Float(_))
                | (MemberKind::Vec2, ParamValue::Vec2(_))
                | (MemberKind::Vec4, ParamValue::Vec4(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub kind: MemberKind,
}

impl UniformMember {
    /// Writes `value` at this member's offset. Values of another kind are
    /// ignored.
    pub fn write(&self, data: &mut [u8], value: &ParamValue) {
        let floats = match (self.kind, value) {
            (MemberKind::Float, ParamValue::Float(v)) => vec![*v],
            (MemberKind::Vec2, ParamValue::Vec2(v)) => v.to_array().to_vec(),
            (MemberKind::Vec4, ParamValue::Vec4(v)) => v.to_array().to_vec(),
            _ => return,
        };
        let bytes: &[u8] = bytemuck::cast_slice(&floats);
        let offset = self.offset as usize;
        if let Some(slot) = data.get_mut(offset..offset + bytes.len()) {
            slot.copy_from_slice(bytes);
        }
    }
}

/// The single `var<uniform>` struct of an effect.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlock {
    pub binding: u32,
    pub size: u32,
    pub members: Vec<UniformMember>,
}

impl UniformBlock {
    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|member| member.name == name)
    }
}

/// Names and binding slots of everything an effect declares in group 0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectLayout {
    pub textures: Vec<(String, u32)>,
    pub samplers: Vec<(String, u32)>,
    pub uniforms: Option<UniformBlock>,
}

impl EffectLayout {
    pub fn reflect(source: &str) -> Result<Self, ReflectError> {
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|err| ReflectError::Parse(err.emit_to_string(source)))?;
        Self::from_module(&module)
    }

    fn from_module(module: &naga::Module) -> Result<Self, ReflectError> {
        let mut layout = Self::default();
        for (_, var) in module.global_variables.iter() {
            let Some(binding) = &var.binding else {
                continue;
            };
            let name = var.name.clone().unwrap_or_default();
            if binding.group != 0 {
                return Err(ReflectError::BindGroup(name));
            }

            match (var.space, &module.types[var.ty].inner) {
                (AddressSpace::Handle, TypeInner::Image { .. }) => {
                    layout.textures.push((name, binding.binding))
                }
                (AddressSpace::Handle, TypeInner::Sampler { comparison: false }) => {
                    layout.samplers.push((name, binding.binding))
                }
                (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                    if layout.uniforms.is_some() {
                        return Err(ReflectError::MultipleUniforms);
                    }
                    let members = members
                        .iter()
                        .map(|member| {
                            let name = member.name.clone().unwrap_or_default();
                            let kind = member_kind(&module.types[member.ty].inner)
                                .ok_or_else(|| ReflectError::Member(name.clone()))?;
                            Ok(UniformMember {
                                name,
                                offset: member.offset,
                                kind,
                            })
                        })
                        .collect::<Result<Vec<_>, ReflectError>>()?;
                    layout.uniforms = Some(UniformBlock {
                        binding: binding.binding,
                        size: *span,
                        members,
                    });
                }
                _ => return Err(ReflectError::Resource(name)),
            }
        }
        Ok(layout)
    }

    pub fn texture(&self, name: &str) -> Option<u32> {
        find(&self.textures, name)
    }

    pub fn sampler(&self, name: &str) -> Option<u32> {
        find(&self.samplers, name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.texture(name).is_some()
            || self.sampler(name).is_some()
            || self
                .uniforms
                .as_ref()
                .is_some_and(|block| block.member(name).is_some())
    }

    pub fn bind_group_layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        let textures = self.textures.iter().map(|&(_, binding)| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        let samplers = self.samplers.iter().map(|&(_, binding)| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        let uniforms = self.uniforms.iter().map(|block| wgpu::BindGroupLayoutEntry {
            binding: block.binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(block.size as u64),
            },
            count: None,
        });
        textures.chain(samplers).chain(uniforms).collect()
    }
}

fn find(entries: &[(String, u32)], name: &str) -> Option<u32> {
    entries
        .iter()
        .find(|(entry, _)| entry == name)
        .map(|&(_, binding)| binding)
}

fn member_kind(inner: &TypeInner) -> Option<MemberKind> {
    match *inner {
        TypeInner::Scalar {
            kind: ScalarKind::Float,
            width: 4,
        } => Some(MemberKind::Float),
        TypeInner::Vector {
            size: VectorSize::Bi,
            kind: ScalarKind::Float,
            width: 4,
        } => Some(MemberKind::Vec2),
        TypeInner::Vector {
            size: VectorSize::Quad,
            kind: ScalarKind::Float,
            width: 4,
        } => Some(MemberKind::Vec4),
        _ => None,
    }
}

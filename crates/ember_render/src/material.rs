//! Materials: a program plus named parameters bound on use

use std::collections::BTreeMap;

use ember_math::{Mat4, Vec2, Vec3, Vec4};

use crate::device::GraphicsDevice;
use crate::resource::{ProgramId, TextureId, TextureTarget};
use crate::shader::UniformValue;

/// Material parameter value
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaterialParam {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    /// Texture bound to `unit`; the sampler uniform receives the unit index
    Texture {
        texture: TextureId,
        unit: u32,
        target: TextureTarget,
    },
}

impl MaterialParam {
    fn uniform(&self) -> UniformValue {
        match *self {
            Self::Float(v) => UniformValue::Float(v),
            Self::Int(v) => UniformValue::Int(v),
            Self::Vec2(v) => UniformValue::Vec2(v),
            Self::Vec3(v) => UniformValue::Vec3(v),
            Self::Vec4(v) => UniformValue::Vec4(v),
            Self::Mat4(v) => UniformValue::Mat4(v),
            Self::Texture { unit, .. } => UniformValue::Int(unit as i32),
        }
    }
}

/// Shader program with its parameter set
#[derive(Clone, Debug)]
pub struct Material {
    name: String,
    program: ProgramId,
    params: BTreeMap<String, MaterialParam>,
}

impl Material {
    pub fn new(name: impl Into<String>, program: ProgramId) -> Self {
        Self {
            name: name.into(),
            program,
            params: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Set or replace a parameter
    pub fn set_parameter(&mut self, name: &str, value: MaterialParam) {
        match self.params.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.params.insert(name.to_string(), value);
            }
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&MaterialParam> {
        self.params.get(name)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &MaterialParam)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Activate the program and bind every parameter
    pub fn use_material(&self, device: &mut dyn GraphicsDevice) {
        device.use_program(Some(self.program));
        for (name, param) in &self.params {
            if let MaterialParam::Texture { texture, unit, target } = *param {
                device.bind_texture(unit, Some(texture), target);
            }
            device.set_uniform(self.program, name, param.uniform());
        }
    }

    /// Unbind this material's textures and deactivate the program
    pub fn stop_using(&self, device: &mut dyn GraphicsDevice) {
        for param in self.params.values() {
            if let MaterialParam::Texture { unit, target, .. } = *param {
                device.bind_texture(unit, None, target);
            }
        }
        device.use_program(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{DeviceCommand, HeadlessDevice};

    #[test]
    fn test_set_parameter_replaces() {
        let mut material = Material::new("m", ProgramId(1));
        material.set_parameter("roughness", MaterialParam::Float(0.2));
        material.set_parameter("roughness", MaterialParam::Float(0.8));

        assert_eq!(material.parameter("roughness"), Some(&MaterialParam::Float(0.8)));
        assert_eq!(material.parameters().count(), 1);
    }

    #[test]
    fn test_use_binds_textures_and_uniforms() {
        let mut device = HeadlessDevice::new();
        let program = device
            .compile_program("scene", &crate::shader::scene_sources())
            .unwrap();
        let mut material = Material::new("brick", program);
        material.set_parameter("color", MaterialParam::Vec4(Vec4::ONE));
        material.set_parameter(
            "albedo",
            MaterialParam::Texture {
                texture: TextureId(7),
                unit: 3,
                target: TextureTarget::Texture2D,
            },
        );

        material.use_material(&mut device);
        assert_eq!(device.uniform(program, "albedo"), Some(UniformValue::Int(3)));
        assert_eq!(device.uniform(program, "color"), Some(UniformValue::Vec4(Vec4::ONE)));
        assert_eq!(device.bound_texture(3), Some((TextureId(7), TextureTarget::Texture2D)));

        material.stop_using(&mut device);
        assert_eq!(device.bound_texture(3), None);
        assert_eq!(device.commands().last(), Some(&DeviceCommand::UseProgram(None)));
    }
}

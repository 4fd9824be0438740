//! Shader sources, uniform values and the built-in GLSL programs
//!
//! The composite program blends two textures per [`BlendMode`](crate::pass::BlendMode);
//! its switch is generated from each mode's GLSL expression so the integer
//! codes used on the CPU and in the shader cannot drift apart.

use std::fs;
use std::path::{Path, PathBuf};

use ember_math::{Mat4, Vec2, Vec3, Vec4};

use crate::error::{RenderError, Result};
use crate::light::{MAX_LIGHTS, SHADOW_NEAR_PLANE};
use crate::pass::BlendMode;
use crate::shadow::{MAX_CASCADE_SLOTS, MAX_POINT_SHADOW_LAYERS, MAX_SPOT_SLOTS};

/// Value that can be written to a shader uniform
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

/// Source text for one program
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
    pub geometry: Option<String>,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            geometry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: impl Into<String>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }

    /// Read vertex and fragment sources from disk
    ///
    /// A missing file is a fatal [`RenderError::ShaderFile`].
    pub fn from_files(vertex: &Path, fragment: &Path) -> Result<Self> {
        Ok(Self::new(read_source(vertex)?, read_source(fragment)?))
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| RenderError::ShaderFile {
        path: PathBuf::from(path),
        source,
    })
}

/// Program names the headless device and the renderer agree on
pub mod names {
    pub const COMPOSITE: &str = "composite";
    pub const BLIT: &str = "blit";
    pub const SCENE: &str = "scene";
    pub const SHADOW_DIRECTIONAL: &str = "shadow_directional";
    pub const SHADOW_POINT: &str = "shadow_point";
    pub const SHADOW_SPOT: &str = "shadow_spot";
}

const FULLSCREEN_VS: &str = r#"#version 450 core
out vec2 vUv;
void main() {
    vec2 pos = vec2((gl_VertexID << 1) & 2, gl_VertexID & 2);
    vUv = pos;
    gl_Position = vec4(pos * 2.0 - 1.0, 0.0, 1.0);
}
"#;

const BLIT_FS: &str = r#"#version 450 core
in vec2 vUv;
out vec4 fragColor;
uniform sampler2D source;
void main() {
    fragColor = texture(source, vUv);
}
"#;

const SCENE_VS: &str = r#"#version 450 core
layout(location = 0) in vec3 aPosition;
layout(location = 1) in vec3 aNormal;
uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;
out vec3 vWorldPos;
out vec3 vNormal;
void main() {
    vec4 world = model * vec4(aPosition, 1.0);
    vWorldPos = world.xyz;
    vNormal = mat3(transpose(inverse(model))) * aNormal;
    gl_Position = projection * view * world;
}
"#;

/// Scene lighting and shadow lookup; array sizes are prepended as defines
///
/// The `Lights` block mirrors [`GpuLightBuffer`](crate::light::GpuLightBuffer)
/// byte for byte under std430: `count` plus three words of padding, so the
/// `kinds` array starts at offset 16.
const SCENE_FS_BODY: &str = r#"
in vec3 vWorldPos;
in vec3 vNormal;
out vec4 fragColor;

layout(std430, binding = 0) readonly buffer Lights {
    uint count;
    uint _pad0[3];
    uint kinds[MAX_LIGHTS];
    vec4 positions[MAX_LIGHTS];
    vec4 directions[MAX_LIGHTS];
    vec4 colors[MAX_LIGHTS];
    vec4 params[MAX_LIGHTS];
    uint shadow[MAX_LIGHTS];
} lights;

uniform vec4 color;
uniform vec3 viewPos;
uniform mat4 view;

uniform int cascadeCount;
uniform mat4 cascadeMatrices[MAX_CASCADE_SLOTS];
uniform sampler2D cascadeMaps[MAX_CASCADE_SLOTS];
uniform int cascadeLightIndex[MAX_CASCADE_SLOTS];
uniform float cascadeSplits[MAX_CASCADE_SLOTS];

uniform int spotCount;
uniform mat4 spotMatrices[MAX_SPOT_SLOTS];
uniform sampler2D spotMaps[MAX_SPOT_SLOTS];
uniform int spotLightIndex[MAX_SPOT_SLOTS];

uniform int pointLayerCount;
uniform int pointLightIndex[MAX_POINT_SHADOWS];
uniform samplerCubeArray pointShadowMaps;

const float SHADOW_BIAS = 0.005;

float projectedShadow(sampler2D map, mat4 lightSpace) {
    vec4 clip = lightSpace * vec4(vWorldPos, 1.0);
    vec3 coords = clip.xyz / clip.w * 0.5 + 0.5;
    if (coords.z > 1.0 || any(lessThan(coords.xy, vec2(0.0))) || any(greaterThan(coords.xy, vec2(1.0)))) {
        return 0.0;
    }
    float closest = texture(map, coords.xy).r;
    return coords.z - SHADOW_BIAS > closest ? 1.0 : 0.0;
}

// Cascades of one light are bound nearest first
float directionalShadow(int light, float viewDepth) {
    for (int c = 0; c < cascadeCount; ++c) {
        if (cascadeLightIndex[c] == light && viewDepth <= cascadeSplits[c]) {
            return projectedShadow(cascadeMaps[c], cascadeMatrices[c]);
        }
    }
    return 0.0;
}

float spotShadow(int light) {
    for (int s = 0; s < spotCount; ++s) {
        if (spotLightIndex[s] == light) {
            return projectedShadow(spotMaps[s], spotMatrices[s]);
        }
    }
    return 0.0;
}

float pointShadow(int light, vec3 lightPos, float farPlane) {
    for (int layer = 0; layer < pointLayerCount; ++layer) {
        if (pointLightIndex[layer] == light) {
            vec3 toFrag = vWorldPos - lightPos;
            float closest = texture(pointShadowMaps, vec4(toFrag, float(layer))).r;
            return length(toFrag) / farPlane - SHADOW_BIAS > closest ? 1.0 : 0.0;
        }
    }
    return 0.0;
}

void main() {
    vec3 n = normalize(vNormal);
    vec3 v = normalize(viewPos - vWorldPos);
    float viewDepth = -(view * vec4(vWorldPos, 1.0)).z;
    vec3 lit = vec3(0.05);

    for (uint i = 0u; i < lights.count; ++i) {
        uint kind = lights.kinds[i];
        vec4 p = lights.params[i];
        bool casts = lights.shadow[i] != 0u;
        int index = int(i);
        vec3 l;
        float attenuation = 1.0;
        float shadowed = 0.0;

        if (kind == 0u) {
            l = -normalize(lights.directions[i].xyz);
            if (casts) {
                shadowed = directionalShadow(index, viewDepth);
            }
        } else {
            vec3 toLight = lights.positions[i].xyz - vWorldPos;
            float dist = length(toLight);
            l = toLight / max(dist, 1e-4);
            float falloff = clamp(1.0 - dist / max(p.y, 1e-4), 0.0, 1.0);
            attenuation = falloff * falloff;
            if (kind == 2u) {
                float theta = dot(-l, normalize(lights.directions[i].xyz));
                attenuation *= clamp((theta - p.w) / max(p.z - p.w, 1e-4), 0.0, 1.0);
                if (casts) {
                    shadowed = spotShadow(index);
                }
            } else if (casts) {
                shadowed = pointShadow(index, lights.positions[i].xyz, max(p.y, SHADOW_NEAR * 2.0));
            }
        }

        float diffuse = max(dot(n, l), 0.0);
        float specular = diffuse > 0.0 ? pow(max(dot(n, normalize(l + v)), 0.0), 32.0) * 0.25 : 0.0;
        lit += lights.colors[i].rgb * p.x * attenuation * (1.0 - shadowed) * (diffuse + specular);
    }
    fragColor = vec4(color.rgb * lit, color.a);
}
"#;

const SHADOW_DEPTH_VS: &str = r#"#version 450 core
layout(location = 0) in vec3 aPosition;
uniform mat4 model;
uniform mat4 lightSpaceMatrix;
void main() {
    gl_Position = lightSpaceMatrix * model * vec4(aPosition, 1.0);
}
"#;

const SHADOW_DEPTH_FS: &str = r#"#version 450 core
void main() {}
"#;

const SHADOW_POINT_VS: &str = r#"#version 450 core
layout(location = 0) in vec3 aPosition;
uniform mat4 model;
void main() {
    gl_Position = model * vec4(aPosition, 1.0);
}
"#;

const SHADOW_POINT_GS: &str = r#"#version 450 core
layout(triangles) in;
layout(triangle_strip, max_vertices = 18) out;
uniform mat4 shadowMatrices[6];
uniform int layer;
out vec4 fragPos;
void main() {
    for (int face = 0; face < 6; ++face) {
        gl_Layer = layer * 6 + face;
        for (int i = 0; i < 3; ++i) {
            fragPos = gl_in[i].gl_Position;
            gl_Position = shadowMatrices[face] * fragPos;
            EmitVertex();
        }
        EndPrimitive();
    }
}
"#;

const SHADOW_POINT_FS: &str = r#"#version 450 core
in vec4 fragPos;
uniform vec3 lightPos;
uniform float farPlane;
void main() {
    gl_FragDepth = length(fragPos.xyz - lightPos) / farPlane;
}
"#;

/// Full-screen copy of the texture on unit 0
pub fn blit_sources() -> ShaderSources {
    ShaderSources::new(FULLSCREEN_VS, BLIT_FS)
}

/// Default lit scene program
///
/// Reads the light buffer and samples every shadow map written by
/// [`ShadowManager::bind_shadow_maps`](crate::shadow::ShadowManager::bind_shadow_maps).
pub fn scene_sources() -> ShaderSources {
    let fragment = format!(
        "#version 450 core\n\
         #define MAX_LIGHTS {}\n\
         #define MAX_CASCADE_SLOTS {}\n\
         #define MAX_SPOT_SLOTS {}\n\
         #define MAX_POINT_SHADOWS {}\n\
         #define SHADOW_NEAR {:.3}\n{}",
        MAX_LIGHTS,
        MAX_CASCADE_SLOTS,
        MAX_SPOT_SLOTS,
        MAX_POINT_SHADOW_LAYERS,
        SHADOW_NEAR_PLANE,
        SCENE_FS_BODY
    );
    ShaderSources::new(SCENE_VS, fragment)
}

pub fn shadow_directional_sources() -> ShaderSources {
    ShaderSources::new(SHADOW_DEPTH_VS, SHADOW_DEPTH_FS)
}

pub fn shadow_spot_sources() -> ShaderSources {
    ShaderSources::new(SHADOW_DEPTH_VS, SHADOW_DEPTH_FS)
}

pub fn shadow_point_sources() -> ShaderSources {
    ShaderSources::new(SHADOW_POINT_VS, SHADOW_POINT_FS).with_geometry(SHADOW_POINT_GS)
}

/// Composite program blending `texA` (destination) with `texB` (source)
pub fn composite_sources() -> ShaderSources {
    let mut fragment = String::from(
        "#version 450 core\n\
         in vec2 vUv;\n\
         out vec4 fragColor;\n\
         uniform sampler2D texA;\n\
         uniform sampler2D texB;\n\
         uniform int blendMode;\n\
         void main() {\n\
         \x20   vec4 dst = texture(texA, vUv);\n\
         \x20   vec4 src = texture(texB, vUv);\n\
         \x20   vec3 rgb = src.rgb;\n\
         \x20   switch (blendMode) {\n",
    );

    for mode in BlendMode::ALL {
        fragment.push_str(&format!(
            "        case {}: rgb = {}; break;\n",
            mode.code(),
            mode.glsl_expression()
        ));
    }

    fragment.push_str(
        "    }\n\
         \x20   float alpha = src.a + dst.a * (1.0 - src.a);\n\
         \x20   fragColor = vec4(rgb, alpha);\n\
         }\n",
    );

    ShaderSources::new(FULLSCREEN_VS, fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_covers_every_mode() {
        let sources = composite_sources();
        for mode in BlendMode::ALL {
            assert!(sources.fragment.contains(&format!("case {}:", mode.code())));
        }
        assert!(sources.fragment.contains("uniform int blendMode;"));
    }

    #[test]
    fn test_missing_shader_file() {
        let err = ShaderSources::from_files(
            Path::new("/nonexistent/ember/scene.vert"),
            Path::new("/nonexistent/ember/scene.frag"),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::ShaderFile { .. }));
    }

    #[test]
    fn test_scene_program_sizes_match_rust_limits() {
        let fragment = scene_sources().fragment;
        assert!(fragment.starts_with("#version 450 core\n"));
        assert!(fragment.contains(&format!("#define MAX_LIGHTS {}\n", MAX_LIGHTS)));
        assert!(fragment.contains(&format!("#define MAX_CASCADE_SLOTS {}\n", MAX_CASCADE_SLOTS)));
        assert!(fragment.contains(&format!("#define MAX_SPOT_SLOTS {}\n", MAX_SPOT_SLOTS)));
        assert!(fragment.contains(&format!("#define MAX_POINT_SHADOWS {}\n", MAX_POINT_SHADOW_LAYERS)));
        assert!(fragment.contains("#define SHADOW_NEAR 0.100\n"));
    }

    #[test]
    fn test_light_block_pads_count_to_sixteen_bytes() {
        let fragment = scene_sources().fragment;
        let block = &fragment[fragment.find("buffer Lights").unwrap()..];
        let count = block.find("uint count;").unwrap();
        let pad = block.find("uint _pad0[3];").unwrap();
        let kinds = block.find("uint kinds[MAX_LIGHTS];").unwrap();
        assert!(count < pad && pad < kinds);
    }

    #[test]
    fn test_point_shadow_has_geometry_stage() {
        assert!(shadow_point_sources().geometry.is_some());
        assert!(shadow_directional_sources().geometry.is_none());
    }
}

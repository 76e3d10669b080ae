//! Scripted content: resources queued for loading and per-category draw
//! scenes.

use geobridge_core::types::{FaceMode, FilterMode, GpuType, RawAttribute, RawDrawBase, WrapMode};

/// A texture the engine will offer to the host's load callback.
#[derive(Debug, Clone)]
pub struct TextureSpec {
    pub width: u32,
    pub height: u32,
    pub components: u32,
    pub gpu_type: u32,
    pub filter_mode: u32,
    pub wrap_mode: u32,
    pub data: Vec<u8>,
    /// Report a null data pointer with the declared size.
    pub null_buffer: bool,
}

impl TextureSpec {
    pub fn new(width: u32, height: u32, components: u32, gpu_type: GpuType, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            components,
            gpu_type: gpu_type.into(),
            filter_mode: FilterMode::Linear.into(),
            wrap_mode: WrapMode::Repeat.into(),
            data,
            null_buffer: false,
        }
    }

    /// `width × height` RGBA8 filled with one byte value.
    pub fn rgba(width: u32, height: u32, fill: u8) -> Self {
        let len = (width * height * 4) as usize;
        Self::new(width, height, 4, GpuType::UnsignedByte, vec![fill; len])
    }

    pub fn with_filter(mut self, mode: FilterMode) -> Self {
        self.filter_mode = mode.into();
        self
    }

    pub fn with_wrap(mut self, mode: WrapMode) -> Self {
        self.wrap_mode = mode.into();
        self
    }

    /// Raw enum values, including ones the host does not know.
    pub fn with_raw_type(mut self, gpu_type: u32) -> Self {
        self.gpu_type = gpu_type;
        self
    }

    pub fn with_null_buffer(mut self) -> Self {
        self.null_buffer = true;
        self
    }
}

/// A mesh the engine will offer to the host's load callback.
#[derive(Debug, Clone)]
pub struct MeshSpec {
    pub face_mode: u32,
    pub vertices: Vec<u8>,
    pub vertex_count: u32,
    /// Native-endian index bytes of width `index_width`.
    pub indices: Vec<u8>,
    pub index_count: u32,
    pub index_width: u32,
    pub attributes: [RawAttribute; 4],
}

impl MeshSpec {
    pub fn new(face_mode: FaceMode, vertices: Vec<u8>, vertex_count: u32) -> Self {
        Self {
            face_mode: face_mode.into(),
            vertices,
            vertex_count,
            indices: Vec::new(),
            index_count: 0,
            index_width: 2,
            attributes: [RawAttribute::default(); 4],
        }
    }

    /// Unit quad: four float3 positions, two triangles.
    pub fn quad() -> Self {
        let positions: [f32; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
        let vertices = positions.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self::new(FaceMode::Triangles, vertices, 4)
            .with_indices_u16(&[0, 1, 2, 0, 2, 3])
            .with_attribute(
                0,
                RawAttribute {
                    offset: 0,
                    stride: 12,
                    components: 3,
                    gpu_type: GpuType::Float.into(),
                    enable: true,
                    normalized: false,
                },
            )
    }

    pub fn with_indices_u8(mut self, indices: &[u8]) -> Self {
        self.indices = indices.to_vec();
        self.index_count = indices.len() as u32;
        self.index_width = 1;
        self
    }

    pub fn with_indices_u16(mut self, indices: &[u16]) -> Self {
        self.indices = indices.iter().flat_map(|i| i.to_ne_bytes()).collect();
        self.index_count = indices.len() as u32;
        self.index_width = 2;
        self
    }

    pub fn with_indices_u32(mut self, indices: &[u32]) -> Self {
        self.indices = indices.iter().flat_map(|i| i.to_ne_bytes()).collect();
        self.index_count = indices.len() as u32;
        self.index_width = 4;
        self
    }

    pub fn without_indices(mut self) -> Self {
        self.indices.clear();
        self.index_count = 0;
        self
    }

    pub fn with_attribute(mut self, slot: usize, attribute: RawAttribute) -> Self {
        if let Some(a) = self.attributes.get_mut(slot) {
            *a = attribute;
        }
        self
    }
}

/// One draw task of a scripted scene. Resources are referenced by the name
/// they were queued under; a name that is not loaded yields a null handle.
#[derive(Debug, Clone)]
pub struct SceneTask {
    pub mesh: String,
    pub tex_color: Option<String>,
    pub tex_mask: Option<String>,
    pub detail: RawDrawBase,
}

impl SceneTask {
    pub fn new(mesh: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            tex_color: None,
            tex_mask: None,
            detail: default_detail(),
        }
    }

    pub fn with_color_texture(mut self, name: impl Into<String>) -> Self {
        self.tex_color = Some(name.into());
        self
    }

    pub fn with_mask_texture(mut self, name: impl Into<String>) -> Self {
        self.tex_mask = Some(name.into());
        self
    }

    pub fn with_color(mut self, rgba: [f32; 4]) -> Self {
        self.detail.color = rgba;
        self
    }

    pub fn with_center(mut self, center: [f32; 3]) -> Self {
        self.detail.center = center;
        self
    }

    pub fn with_flat_shading(mut self) -> Self {
        self.detail.flat_shading = 1;
        self
    }
}

fn default_detail() -> RawDrawBase {
    let mut mv = [0.0f32; 16];
    let mut uvm = [0.0f32; 9];
    for i in 0..4 {
        mv[i * 5] = 1.0;
    }
    for i in 0..3 {
        uvm[i * 4] = 1.0;
    }
    RawDrawBase {
        mv,
        uvm,
        color: [1.0; 4],
        uv_clip: [0.0, 0.0, 1.0, 1.0],
        center: [0.0; 3],
        external_uv: 0,
        flat_shading: 0,
        _pad: [0; 2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_fill() {
        let spec = TextureSpec::rgba(2, 2, 0xff);
        assert_eq!(spec.data.len(), 16);
        assert!(spec.data.iter().all(|&b| b == 0xff));
        assert_eq!(spec.gpu_type, 0x1401);
    }

    #[test]
    fn test_quad_layout() {
        let quad = MeshSpec::quad();
        assert_eq!(quad.vertices.len(), 48);
        assert_eq!(quad.index_count, 6);
        assert_eq!(quad.indices.len(), 12);
        assert!(quad.attributes[0].enable);
        assert!(!quad.attributes[1].enable);
    }

    #[test]
    fn test_default_detail_is_identity() {
        let task = SceneTask::new("m");
        assert_eq!(task.detail.mv[0], 1.0);
        assert_eq!(task.detail.mv[5], 1.0);
        assert_eq!(task.detail.mv[1], 0.0);
        assert_eq!(task.detail.uvm[8], 1.0);
    }
}

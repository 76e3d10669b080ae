//! Resource loader: engine-owned texture and mesh buffers → host data.
//!
//! The engine's buffers are only valid while its load callback runs, so
//! every byte is copied into host-owned storage before `load` returns.

use geobridge_core::error::{BridgeError, Result};
use geobridge_core::types::{FaceMode, FilterMode, GpuType, RawBuffer, WrapMode};
use geobridge_core::{Boundary, NativeHandle};

/// Number of vertex attribute slots a mesh reports.
pub const ATTRIBUTE_SLOTS: u32 = 4;

/// Decoded texture. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub components: u32,
    pub gpu_type: GpuType,
    pub filter_mode: FilterMode,
    pub wrap_mode: WrapMode,
    pub data: Vec<u8>,
}

impl Texture {
    /// Query sequence: resolution, sample type, filter, wrap, buffer.
    pub fn load(boundary: &Boundary, resource: NativeHandle) -> Result<Self> {
        let (width, height, components) = boundary.call(|e| e.texture_get_resolution(resource))?;
        let gpu_type = boundary.call(|e| e.texture_get_type(resource))?;
        let gpu_type = GpuType::try_from(gpu_type)?;
        let filter_mode = boundary.call(|e| e.texture_get_filter_mode(resource))?;
        let filter_mode = FilterMode::try_from(filter_mode)?;
        let wrap_mode = boundary.call(|e| e.texture_get_wrap_mode(resource))?;
        let wrap_mode = WrapMode::try_from(wrap_mode)?;
        let raw = boundary.call(|e| e.texture_get_buffer(resource))?;
        // SAFETY: the buffer belongs to the resource being loaded and stays
        // valid for the rest of the load callback.
        let data = unsafe { copy_buffer("texture", raw)? };
        Ok(Self {
            width,
            height,
            components,
            gpu_type,
            filter_mode,
            wrap_mode,
            data,
        })
    }

    /// Bytes reported to the engine as memory cost.
    pub fn memory_cost(&self) -> usize {
        self.data.len()
    }
}

/// One vertex attribute slot. Disabled slots carry no sample type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexAttribute {
    pub offset: u32,
    pub stride: u32,
    pub components: u32,
    pub gpu_type: Option<GpuType>,
    pub enabled: bool,
    pub normalized: bool,
}

/// Decoded mesh with 16-bit indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub face_mode: FaceMode,
    pub attributes: [VertexAttribute; ATTRIBUTE_SLOTS as usize],
    pub vertices: Vec<u8>,
    pub indices: Vec<u16>,
    pub vertex_count: u32,
    pub index_count: u32,
}

impl Mesh {
    /// Query sequence: face mode, indices, vertices, four attributes.
    pub fn load(boundary: &Boundary, resource: NativeHandle) -> Result<Self> {
        let face_mode = FaceMode::try_from(boundary.call(|e| e.mesh_get_face_mode(resource))?)?;

        let raw_indices = boundary.call(|e| e.mesh_get_indices(resource))?;
        // SAFETY: see `Texture::load`.
        let index_bytes = unsafe { copy_buffer("index", raw_indices)? };
        let indices = widen_indices(&index_bytes, raw_indices.count)?;

        let raw_vertices = boundary.call(|e| e.mesh_get_vertices(resource))?;
        let vertices = unsafe { copy_buffer("vertex", raw_vertices)? };

        let mut attributes = [VertexAttribute::default(); ATTRIBUTE_SLOTS as usize];
        for (slot, attribute) in (0..ATTRIBUTE_SLOTS).zip(attributes.iter_mut()) {
            let raw = boundary.call(|e| e.mesh_get_attribute(resource, slot))?;
            let gpu_type = match (raw.enable, raw.gpu_type) {
                (false, _) | (true, 0) => None,
                (true, value) => Some(GpuType::try_from(value)?),
            };
            *attribute = VertexAttribute {
                offset: raw.offset,
                stride: raw.stride,
                components: raw.components,
                gpu_type,
                enabled: raw.enable,
                normalized: raw.normalized,
            };
        }

        Ok(Self {
            face_mode,
            attributes,
            vertices,
            indices,
            vertex_count: raw_vertices.count,
            index_count: raw_indices.count,
        })
    }

    /// Vertex bytes plus index bytes at 16 bits each.
    pub fn memory_cost(&self) -> usize {
        self.vertices.len() + self.indices.len() * std::mem::size_of::<u16>()
    }
}

/// Copy an engine buffer into a host-owned vector. A zero-length buffer
/// is valid whatever its pointer; a null pointer with a length is not.
///
/// # Safety
///
/// `raw.data` must be null or valid for reads of `raw.size` bytes.
pub unsafe fn copy_buffer(what: &'static str, raw: RawBuffer) -> Result<Vec<u8>> {
    if raw.size == 0 {
        return Ok(Vec::new());
    }
    if raw.data.is_null() {
        return Err(BridgeError::InvalidBuffer { what, len: raw.size });
    }
    Ok(std::slice::from_raw_parts(raw.data, raw.size as usize).to_vec())
}

/// Widen native-endian indices of width `bytes.len() / count` to u16.
pub fn widen_indices(bytes: &[u8], count: u32) -> Result<Vec<u16>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let len = bytes.len() as u32;
    if len % count != 0 {
        return Err(BridgeError::InvalidBuffer { what: "index", len });
    }
    match len / count {
        1 => Ok(bytes.iter().map(|&i| u16::from(i)).collect()),
        2 => Ok(bytes
            .chunks_exact(2)
            .map(bytemuck::pod_read_unaligned::<u16>)
            .collect()),
        4 => bytes
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<u32>)
            .map(|i| u16::try_from(i).map_err(|_| BridgeError::IndexOverflow { value: i }))
            .collect(),
        _ => Err(BridgeError::InvalidBuffer { what: "index", len }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_count_indices_are_empty() {
        assert_eq!(widen_indices(&[], 0).unwrap(), Vec::<u16>::new());
    }

    #[test]
    fn test_widen_u8_indices() {
        assert_eq!(widen_indices(&[0, 1, 255], 3).unwrap(), vec![0, 1, 255]);
    }

    #[test]
    fn test_u16_indices_pass_through() {
        let bytes: Vec<u8> = [7u16, 65535].iter().flat_map(|i| i.to_ne_bytes()).collect();
        assert_eq!(widen_indices(&bytes, 2).unwrap(), vec![7, 65535]);
    }

    #[test]
    fn test_u32_indices_narrow_or_fail() {
        let ok: Vec<u8> = [1u32, 2, 3].iter().flat_map(|i| i.to_ne_bytes()).collect();
        assert_eq!(widen_indices(&ok, 3).unwrap(), vec![1, 2, 3]);
        let big: Vec<u8> = [70_000u32].iter().flat_map(|i| i.to_ne_bytes()).collect();
        assert_eq!(
            widen_indices(&big, 1),
            Err(BridgeError::IndexOverflow { value: 70_000 })
        );
    }

    #[test]
    fn test_odd_index_width_rejected() {
        assert!(widen_indices(&[0; 6], 2).is_err());
        assert!(widen_indices(&[0; 5], 2).is_err());
    }

    #[test]
    fn test_copy_buffer_null_with_length() {
        let raw = RawBuffer {
            data: std::ptr::null(),
            size: 16,
            count: 0,
        };
        assert_eq!(
            unsafe { copy_buffer("texture", raw) },
            Err(BridgeError::InvalidBuffer {
                what: "texture",
                len: 16
            })
        );
        assert!(unsafe { copy_buffer("texture", RawBuffer::empty()) }
            .unwrap()
            .is_empty());
    }

    // ── loading through an engine ───────────────────────────────

    use std::sync::Arc;

    use geobridge_core::types::RawAttribute;
    use geobridge_sim::{MeshSpec, SimEngine, TextureSpec};

    fn engine() -> (Arc<SimEngine>, Boundary, NativeHandle) {
        let sim = Arc::new(SimEngine::new());
        let boundary = Boundary::new(sim.clone());
        let map = boundary.call_handle("map", |e| e.map_create("")).unwrap();
        (sim, boundary, map)
    }

    #[test]
    fn test_texture_load_copies_every_byte() {
        let (sim, boundary, map) = engine();
        let res = sim.queue_texture(map, "h1", TextureSpec::rgba(2, 2, 0xff)).unwrap();
        let texture = Texture::load(&boundary, res).unwrap();
        assert_eq!((texture.width, texture.height, texture.components), (2, 2, 4));
        assert_eq!(texture.gpu_type, GpuType::UnsignedByte);
        assert_eq!(texture.data, vec![0xff; 16]);
        assert_eq!(texture.memory_cost(), 16);
    }

    #[test]
    fn test_texture_with_unknown_type_fails() {
        let (sim, boundary, map) = engine();
        let spec = TextureSpec::rgba(1, 1, 0).with_raw_type(0x9999);
        let res = sim.queue_texture(map, "bad", spec).unwrap();
        assert_eq!(
            Texture::load(&boundary, res),
            Err(BridgeError::UnknownEnum {
                kind: "gpu type",
                value: 0x9999
            })
        );
    }

    #[test]
    fn test_texture_null_buffer_is_invalid() {
        let (sim, boundary, map) = engine();
        let res = sim
            .queue_texture(map, "null", TextureSpec::rgba(2, 2, 0).with_null_buffer())
            .unwrap();
        assert!(matches!(
            Texture::load(&boundary, res),
            Err(BridgeError::InvalidBuffer { what: "texture", len: 16 })
        ));
    }

    #[test]
    fn test_boundary_error_aborts_load() {
        let (sim, boundary, map) = engine();
        let res = sim.queue_texture(map, "t", TextureSpec::rgba(1, 1, 0)).unwrap();
        sim.inject_error("texture_get_filter_mode", -15, "range error");
        assert_eq!(
            Texture::load(&boundary, res),
            Err(BridgeError::Boundary {
                code: -15,
                message: "range error".into()
            })
        );
        assert!(boundary.check().is_ok());
    }

    #[test]
    fn test_mesh_load_quad() {
        let (sim, boundary, map) = engine();
        let res = sim.queue_mesh(map, "quad", MeshSpec::quad()).unwrap();
        let mesh = Mesh::load(&boundary, res).unwrap();
        assert_eq!(mesh.face_mode, FaceMode::Triangles);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertex_count, 4);
        assert_eq!(mesh.vertices.len(), 48);
        assert_eq!(mesh.attributes[0].gpu_type, Some(GpuType::Float));
        assert_eq!(mesh.attributes[1].gpu_type, None);
        assert_eq!(mesh.memory_cost(), 48 + 12);
    }

    #[test]
    fn test_mesh_without_indices() {
        let (sim, boundary, map) = engine();
        let res = sim
            .queue_mesh(map, "points", MeshSpec::quad().without_indices())
            .unwrap();
        let mesh = Mesh::load(&boundary, res).unwrap();
        assert!(mesh.indices.is_empty());
        assert_eq!(mesh.index_count, 0);
    }

    #[test]
    fn test_mesh_u32_indices_are_narrowed() {
        let (sim, boundary, map) = engine();
        let spec = MeshSpec::quad().with_indices_u32(&[3, 2, 1]);
        let res = sim.queue_mesh(map, "wide", spec).unwrap();
        assert_eq!(Mesh::load(&boundary, res).unwrap().indices, vec![3, 2, 1]);
    }

    #[test]
    fn test_enabled_attribute_with_zero_type_has_no_type() {
        let (sim, boundary, map) = engine();
        let spec = MeshSpec::quad().with_attribute(
            2,
            RawAttribute {
                enable: true,
                ..RawAttribute::default()
            },
        );
        let res = sim.queue_mesh(map, "m", spec).unwrap();
        let mesh = Mesh::load(&boundary, res).unwrap();
        assert!(mesh.attributes[2].enabled);
        assert_eq!(mesh.attributes[2].gpu_type, None);
    }
}

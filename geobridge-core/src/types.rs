//! Wire-level types shared with the engine.
//!
//! The enums carry the engine's numeric values (GL-compatible), the raw
//! structs mirror the C layout of the blocks the engine exposes by pointer.
//! Raw structs derive `bytemuck::Pod` so they can be copied out of engine
//! memory without interpreting any byte as a Rust `bool`.

use bytemuck::{Pod, Zeroable};

use crate::error::{BridgeError, Result};

macro_rules! engine_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident = $value:expr,)+ }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl TryFrom<u32> for $name {
            type Error = BridgeError;

            fn try_from(value: u32) -> Result<Self> {
                $(
                    if value == $value {
                        return Ok(Self::$variant);
                    }
                )+
                Err(BridgeError::UnknownEnum { kind: $kind, value })
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value as u32
            }
        }
    };
}

engine_enum! {
    /// Component sample type (OpenGL values).
    GpuType, "gpu type" {
        Byte = 0x1400,
        UnsignedByte = 0x1401,
        Short = 0x1402,
        UnsignedShort = 0x1403,
        Int = 0x1404,
        UnsignedInt = 0x1405,
        Float = 0x1406,
    }
}

impl GpuType {
    /// Size of one component in bytes.
    pub const fn size(self) -> u32 {
        match self {
            GpuType::Byte | GpuType::UnsignedByte => 1,
            GpuType::Short | GpuType::UnsignedShort => 2,
            GpuType::Int | GpuType::UnsignedInt | GpuType::Float => 4,
        }
    }
}

engine_enum! {
    FilterMode, "filter mode" {
        Nearest = 0x2600,
        Linear = 0x2601,
        NearestMipmapNearest = 0x2700,
        LinearMipmapNearest = 0x2701,
        NearestMipmapLinear = 0x2702,
        LinearMipmapLinear = 0x2703,
    }
}

engine_enum! {
    WrapMode, "wrap mode" {
        Repeat = 0x2901,
        ClampToEdge = 0x812F,
        ClampToBorder = 0x812D,
        MirroredRepeat = 0x8370,
        MirrorClampToEdge = 0x8743,
    }
}

engine_enum! {
    /// Primitive topology of a mesh.
    FaceMode, "face mode" {
        Points = 0x0000,
        Lines = 0x0001,
        LineStrip = 0x0003,
        Triangles = 0x0004,
        TriangleStrip = 0x0005,
        TriangleFan = 0x0006,
    }
}

engine_enum! {
    /// Spatial reference systems understood by the engine's converter.
    Srs, "srs" {
        Physical = 0,
        Navigation = 1,
        Public = 2,
        Search = 3,
        Custom1 = 4,
        Custom2 = 5,
    }
}

/// Engine log masks. Each severity has four verbosity steps; a sink or the
/// global mask receives every level whose bits intersect it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LogMask(pub u32);

impl LogMask {
    pub const ALL: LogMask = LogMask(0xfffff);
    pub const NONE: LogMask = LogMask(0x00000);
    pub const DEBUG: LogMask = LogMask(0x0000f);
    pub const INFO1: LogMask = LogMask(0x000f0);
    pub const INFO2: LogMask = LogMask(0x00070);
    pub const INFO3: LogMask = LogMask(0x00030);
    pub const INFO4: LogMask = LogMask(0x00010);
    pub const WARN1: LogMask = LogMask(0x00f00);
    pub const WARN2: LogMask = LogMask(0x00700);
    pub const WARN3: LogMask = LogMask(0x00300);
    pub const WARN4: LogMask = LogMask(0x00100);
    pub const ERR1: LogMask = LogMask(0x0f000);
    pub const ERR2: LogMask = LogMask(0x07000);
    pub const ERR3: LogMask = LogMask(0x03000);
    pub const ERR4: LogMask = LogMask(0x01000);
    pub const FATAL: LogMask = LogMask(0xf0000);
    pub const DEFAULT: LogMask = LogMask(Self::INFO3.0 | Self::WARN2.0 | Self::ERR2.0);
    pub const VERBOSE: LogMask = LogMask(Self::INFO2.0 | Self::WARN2.0 | Self::ERR2.0);

    #[inline]
    pub const fn intersects(self, other: LogMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for LogMask {
    type Output = LogMask;

    fn bitor(self, rhs: LogMask) -> LogMask {
        LogMask(self.0 | rhs.0)
    }
}

// ───────────────────────────────────────────────────────────────────
// Raw blocks read by pointer
// ───────────────────────────────────────────────────────────────────

/// Camera block of a draw list, C layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RawCameraBase {
    pub view: [f64; 16],
    pub proj: [f64; 16],
    pub eye: [f64; 3],
    pub near: f64,
    pub far: f64,
    pub aspect: f64,
    pub fov: f64,
    pub map_projected: u8,
    pub _pad: [u8; 7],
}

/// Per-task draw parameters, C layout.
///
/// 148 bytes: model-view (16), uv matrix (9), color (4), uv clip (4),
/// center (3), two flag bytes and padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RawDrawBase {
    pub mv: [f32; 16],
    pub uvm: [f32; 9],
    pub color: [f32; 4],
    pub uv_clip: [f32; 4],
    pub center: [f32; 3],
    pub external_uv: u8,
    pub flat_shading: u8,
    pub _pad: [u8; 2],
}

/// One vertex attribute slot as reported by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawAttribute {
    pub offset: u32,
    pub stride: u32,
    pub components: u32,
    pub gpu_type: u32,
    pub enable: bool,
    pub normalized: bool,
}

/// Pointer + length pair describing engine-owned bytes. Valid only for the
/// duration of the callback that produced it.
#[derive(Clone, Copy, Debug)]
pub struct RawBuffer {
    pub data: *const u8,
    /// Total size in bytes.
    pub size: u32,
    /// Element count (vertices or indices); zero for textures.
    pub count: u32,
}

impl RawBuffer {
    pub const fn empty() -> Self {
        Self {
            data: std::ptr::null(),
            size: 0,
            count: 0,
        }
    }
}

/// Combined record for one draw task: parameter block plus the three
/// resource user-data pointers (null when absent).
#[derive(Clone, Copy, Debug)]
pub struct DrawRecord {
    pub detail: *const RawDrawBase,
    pub mesh: *mut std::ffi::c_void,
    pub tex_color: *mut std::ffi::c_void,
    pub tex_mask: *mut std::ffi::c_void,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_layout_sizes() {
        assert_eq!(std::mem::size_of::<RawDrawBase>(), 148);
        assert_eq!(std::mem::size_of::<RawCameraBase>(), 320);
    }

    #[test]
    fn test_gpu_type_round_trip() {
        assert_eq!(GpuType::try_from(0x1401).unwrap(), GpuType::UnsignedByte);
        assert_eq!(u32::from(GpuType::Float), 0x1406);
        assert_eq!(GpuType::UnsignedShort.size(), 2);
    }

    #[test]
    fn test_unknown_enum_value() {
        let err = FaceMode::try_from(0x0002).unwrap_err();
        assert_eq!(
            err,
            BridgeError::UnknownEnum {
                kind: "face mode",
                value: 2
            }
        );
    }

    #[test]
    fn test_log_mask_bands() {
        assert!(LogMask::DEFAULT.intersects(LogMask::WARN2));
        assert!(!LogMask::DEFAULT.intersects(LogMask::DEBUG));
        assert_eq!((LogMask::ERR1 | LogMask::FATAL).0, 0xff000);
    }
}

//! Camera and coordinate math for the simulated engine.
//!
//! Matrices are column-major, `m[column * 4 + row]`. The body is a sphere
//! of the major radius; navigation coordinates are (longitude, latitude,
//! height) in degrees and meters.

use serde::{Deserialize, Serialize};

pub type Vec3 = [f64; 3];
pub type Mat4 = [f64; 16];

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn scale(a: Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn length(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

pub fn normalize(a: Vec3) -> Vec3 {
    let l = length(a);
    if l < 1e-12 {
        return a;
    }
    scale(a, 1.0 / l)
}

#[rustfmt::skip]
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let f = normalize(sub(target, eye));
    let s = normalize(cross(f, up));
    let u = cross(s, f);
    [
        s[0], u[0], -f[0], 0.0,
        s[1], u[1], -f[1], 0.0,
        s[2], u[2], -f[2], 0.0,
        -dot(s, eye), -dot(u, eye), dot(f, eye), 1.0,
    ]
}

pub fn perspective(fovy_degrees: f64, aspect: f64, near: f64, far: f64) -> Mat4 {
    let f = 1.0 / (fovy_degrees.to_radians() * 0.5).tan();
    let mut m = [0.0; 16];
    m[0] = f / aspect;
    m[5] = f;
    m[10] = (far + near) / (near - far);
    m[11] = -1.0;
    m[14] = 2.0 * far * near / (near - far);
    m
}

/// Eye position encoded in a rigid view matrix.
pub fn eye_from_view(view: &Mat4) -> Vec3 {
    // eye = -Rᵀ t
    let t = [view[12], view[13], view[14]];
    let r0 = [view[0], view[4], view[8]];
    let r1 = [view[1], view[5], view[9]];
    let r2 = [view[2], view[6], view[10]];
    [
        -(r0[0] * t[0] + r1[0] * t[1] + r2[0] * t[2]),
        -(r0[1] * t[0] + r1[1] * t[1] + r2[1] * t[2]),
        -(r0[2] * t[0] + r1[2] * t[1] + r2[2] * t[2]),
    ]
}

pub fn nav_to_phys(nav: Vec3, radius: f64) -> Vec3 {
    let (lon, lat) = (nav[0].to_radians(), nav[1].to_radians());
    let r = radius + nav[2];
    [r * lat.cos() * lon.cos(), r * lat.cos() * lon.sin(), r * lat.sin()]
}

pub fn phys_to_nav(phys: Vec3, radius: f64) -> Vec3 {
    let r = length(phys);
    if r < 1e-9 {
        return [0.0, 0.0, -radius];
    }
    [
        phys[1].atan2(phys[0]).to_degrees(),
        (phys[2] / r).clamp(-1.0, 1.0).asin().to_degrees(),
        r - radius,
    ]
}

/// View extents, as fractions of the major radius, between which camera
/// rotation normalization fades in.
const NORMALIZATION_EXTENT_LOW: f64 = 0.031_357_792_41;
const NORMALIZATION_EXTENT_HIGH: f64 = 0.203_825_650_67;
/// Pitch reached when fully normalized: looking straight down.
const NORMALIZED_PITCH: f64 = -90.0;

fn smootherstep(x: f64) -> f64 {
    x * x * x * (x * (x * 6.0 - 15.0) + 10.0)
}

fn interpolate(a: f64, b: f64, f: f64) -> f64 {
    a + (b - a) * f
}

/// Navigation position: where the camera looks and from how far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub point: Vec3,
    /// Yaw, pitch, roll in degrees; pitch -90 looks straight down.
    pub rotation: Vec3,
    pub view_extent: f64,
    pub fov: f64,
    pub subjective: bool,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            point: [14.42, 50.08, 0.0],
            rotation: [0.0, -60.0, 0.0],
            view_extent: 20_000.0,
            fov: 45.0,
            subjective: false,
        }
    }
}

impl Position {
    /// `obj|subj,lon,lat,fix,height,yaw,pitch,roll,extent,fov`
    pub fn to_url(&self) -> String {
        format!(
            "{},{},{},fix,{},{},{},{},{},{}",
            if self.subjective { "subj" } else { "obj" },
            self.point[0],
            self.point[1],
            self.point[2],
            self.rotation[0],
            self.rotation[1],
            self.rotation[2],
            self.view_extent,
            self.fov
        )
    }

    pub fn from_url(url: &str) -> Option<Self> {
        let parts: Vec<&str> = url.split(',').map(str::trim).collect();
        if parts.len() != 10 {
            return None;
        }
        let subjective = match parts[0] {
            "obj" => false,
            "subj" => true,
            _ => return None,
        };
        if parts[3] != "fix" && parts[3] != "float" {
            return None;
        }
        let n = |i: usize| parts[i].parse::<f64>().ok();
        Some(Self {
            point: [n(1)?, n(2)?, n(4)?],
            rotation: [n(5)?, n(6)?, n(7)?],
            view_extent: n(8)?,
            fov: n(9)?,
            subjective,
        })
    }

    /// Rotation after normalization: the wider the view extent, the closer
    /// pitch is pulled to straight down and yaw to north. Subjective
    /// positions are left alone.
    pub fn rotation_limited(&self, major_radius: f64) -> Vec3 {
        let mut rotation = self.rotation;
        if self.subjective || !(self.view_extent > 0.0) {
            return rotation;
        }
        let current = self.view_extent.log2();
        let low = (NORMALIZATION_EXTENT_LOW * major_radius).log2();
        let high = (NORMALIZATION_EXTENT_HIGH * major_radius).log2();
        let f = smootherstep(((current - low) / (high - low)).clamp(0.0, 1.0));
        rotation[1] = interpolate(rotation[1], NORMALIZED_PITCH, f);
        rotation[0] = interpolate(rotation[0], 0.0, f);
        rotation
    }

    /// Camera eye, target and up in physical coordinates.
    pub fn camera(&self, radius: f64) -> (Vec3, Vec3, Vec3) {
        let target = nav_to_phys(self.point, radius);
        let up_n = normalize(target);
        let mut east = cross([0.0, 0.0, 1.0], up_n);
        if length(east) < 1e-9 {
            east = [0.0, 1.0, 0.0];
        }
        let east = normalize(east);
        let north = cross(up_n, east);
        let (yaw, pitch) = (self.rotation[0].to_radians(), self.rotation[1].to_radians());
        let heading = add(scale(east, yaw.sin()), scale(north, yaw.cos()));
        let forward = add(scale(heading, pitch.cos()), scale(up_n, pitch.sin()));
        let up = add(scale(heading, -pitch.sin()), scale(up_n, pitch.cos()));
        let distance = if self.subjective { 1e-5 } else { self.view_extent };
        let eye = sub(target, scale(forward, distance));
        (eye, target, up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (0..3).all(|i| (a[i] - b[i]).abs() < 1e-6)
    }

    #[test]
    fn test_nav_phys_round_trip() {
        let nav = [14.42, 50.08, 300.0];
        let back = phys_to_nav(nav_to_phys(nav, 6_378_137.0), 6_378_137.0);
        assert!(close(nav, back));
    }

    #[test]
    fn test_look_at_recovers_eye() {
        let eye = [10.0, -4.0, 3.0];
        let view = look_at(eye, [0.0; 3], [0.0, 0.0, 1.0]);
        assert!(close(eye_from_view(&view), eye));
    }

    #[test]
    fn test_position_url() {
        let pos = Position::default();
        let parsed = Position::from_url(&pos.to_url()).unwrap();
        assert_eq!(parsed, pos);
        assert!(Position::from_url("obj,1,2").is_none());
        assert!(Position::from_url("xyz,1,2,fix,0,0,0,0,1,45").is_none());
    }

    #[test]
    fn test_rotation_limited_by_extent() {
        let mut pos = Position {
            rotation: [30.0, -45.0, 0.0],
            ..Position::default()
        };
        // Close views keep their rotation.
        pos.view_extent = 1_000.0;
        assert!(close(pos.rotation_limited(6_378_137.0), [30.0, -45.0, 0.0]));
        // Continental views look straight down, north up.
        pos.view_extent = 5_000_000.0;
        assert!(close(pos.rotation_limited(6_378_137.0), [0.0, -90.0, 0.0]));
        // In between, partially.
        pos.view_extent = 600_000.0;
        let [yaw, pitch, _] = pos.rotation_limited(6_378_137.0);
        assert!(yaw > 0.0 && yaw < 30.0);
        assert!(pitch < -45.0 && pitch > -90.0);
        pos.subjective = true;
        assert_eq!(pos.rotation_limited(6_378_137.0), pos.rotation);
    }

    #[test]
    fn test_camera_looks_at_target() {
        let pos = Position::default();
        let (eye, target, _) = pos.camera(6_378_137.0);
        assert!((length(sub(target, eye)) - pos.view_extent).abs() < 1e-3);
    }
}

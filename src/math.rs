//! Math types for PetalSonic AL

pub use glam::Vec3;

/// Listener orientation as an OpenAL-style forward/up vector pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub forward: Vec3,
    pub up: Vec3,
}

impl Orientation {
    pub fn new(forward: Vec3, up: Vec3) -> Self {
        Self { forward, up }
    }

    /// Unit vector pointing to the listener's right, or `Vec3::X` when the pair is degenerate.
    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).try_normalize().unwrap_or(Vec3::X)
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            forward: -Vec3::Z,
            up: Vec3::Y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_orientation_faces_negative_z() {
        let orientation = Orientation::default();
        assert_eq!(orientation.right(), Vec3::X);
    }

    #[test]
    fn degenerate_orientation_falls_back_to_x() {
        let orientation = Orientation::new(Vec3::Y, Vec3::Y);
        assert_eq!(orientation.right(), Vec3::X);
    }
}

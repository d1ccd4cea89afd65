use glam::Vec3;

/// Local bone axis a Pole or LookAt aims at its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Up,
    Down,
    Front,
    Back,
    Left,
    Right,
}

impl Side {
    /// Unit axis in the bone's rest frame.
    pub fn axis(self) -> Vec3 {
        match self {
            Side::Up => Vec3::Y,
            Side::Down => Vec3::NEG_Y,
            Side::Front => Vec3::NEG_Z,
            Side::Back => Vec3::Z,
            Side::Left => Vec3::NEG_X,
            Side::Right => Vec3::X,
        }
    }

    /// True for the four sides perpendicular to the bone.
    pub fn is_lateral(self) -> bool {
        !matches!(self, Side::Up | Side::Down)
    }
}

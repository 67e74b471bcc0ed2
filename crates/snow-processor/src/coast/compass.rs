//! Discretized 8-connectivity directions and per-cell classes.

use serde::{Deserialize, Serialize};

/// Grid step per direction, counter-clockwise from east. Positive y is north.
const STEP_X: [i32; 8] = [1, 1, 0, -1, -1, -1, 0, 1];
const STEP_Y: [i32; 8] = [0, 1, 1, 1, 0, -1, -1, -1];

/// cos(45°): diagonal steps contribute by arc length, not by step count.
pub const DIAGONAL_WEIGHT: f32 = 0.7071;

/// Sums shorter than this are treated as cancelled out.
const ZERO_SUM_EPSILON: f32 = 1e-4;

/// One of the 8 compass directions, indexed counter-clockwise from east.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Compass {
    East = 0,
    NorthEast = 1,
    North = 2,
    NorthWest = 3,
    West = 4,
    SouthWest = 5,
    South = 6,
    SouthEast = 7,
}

impl Compass {
    pub const ALL: [Compass; 8] = [
        Compass::East,
        Compass::NorthEast,
        Compass::North,
        Compass::NorthWest,
        Compass::West,
        Compass::SouthWest,
        Compass::South,
        Compass::SouthEast,
    ];

    /// Direction for an index in [0, 8).
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Grid step `(dx, dy)` for this direction.
    pub fn step(self) -> (i32, i32) {
        (STEP_X[self.index()], STEP_Y[self.index()])
    }

    pub fn is_diagonal(self) -> bool {
        self.index() & 1 == 1
    }

    /// Weight of this direction's unit vector in the normal estimate.
    pub fn weight(self) -> f32 {
        if self.is_diagonal() {
            DIAGONAL_WEIGHT
        } else {
            1.0
        }
    }

    pub fn opposite(self) -> Self {
        Self::ALL[(self.index() + 4) % 8]
    }

    /// Round a summed direction vector to the nearest compass direction.
    ///
    /// Returns `None` when the contributions cancel out.
    pub fn from_vector(sum_x: f32, sum_y: f32) -> Option<Self> {
        if sum_x.abs() < ZERO_SUM_EPSILON && sum_y.abs() < ZERO_SUM_EPSILON {
            return None;
        }
        let mut angle = (sum_y as f64).atan2(sum_x as f64).to_degrees();
        if angle < 0.0 {
            angle += 360.0;
        }
        let index = (angle / 45.0).round() as usize % 8;
        Self::from_index(index)
    }

    pub fn name(self) -> &'static str {
        match self {
            Compass::East => "E",
            Compass::NorthEast => "NE",
            Compass::North => "N",
            Compass::NorthWest => "NW",
            Compass::West => "W",
            Compass::SouthWest => "SW",
            Compass::South => "S",
            Compass::SouthEast => "SE",
        }
    }
}

/// Coarse classification of a raster cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    Water,
    Land,
    Coast,
}

/// Stored classification; coast cells carry the direction towards land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellClass {
    Water,
    Land,
    Coast(Compass),
}

impl CellClass {
    pub fn kind(self) -> CellKind {
        match self {
            CellClass::Water => CellKind::Water,
            CellClass::Land => CellKind::Land,
            CellClass::Coast(_) => CellKind::Coast,
        }
    }
}

/// Coastline normal of a coast cell, pointing from the water towards land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoastNormal {
    pub step_x: i32,
    pub step_y: i32,
    pub direction: Compass,
}

impl From<Compass> for CoastNormal {
    fn from(direction: Compass) -> Self {
        let (step_x, step_y) = direction.step();
        Self {
            step_x,
            step_y,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_match_indices() {
        assert_eq!(Compass::East.step(), (1, 0));
        assert_eq!(Compass::NorthEast.step(), (1, 1));
        assert_eq!(Compass::North.step(), (0, 1));
        assert_eq!(Compass::West.step(), (-1, 0));
        assert_eq!(Compass::SouthEast.step(), (1, -1));
        assert_eq!(Compass::from_index(8), None);
    }

    #[test]
    fn test_opposite() {
        for dir in Compass::ALL {
            let (dx, dy) = dir.step();
            let (ox, oy) = dir.opposite().step();
            assert_eq!((dx + ox, dy + oy), (0, 0));
        }
    }

    #[test]
    fn test_from_vector_axis_and_diagonal() {
        for dir in Compass::ALL {
            let (dx, dy) = dir.step();
            let w = dir.weight();
            assert_eq!(Compass::from_vector(w * dx as f32, w * dy as f32), Some(dir));
        }
    }

    #[test]
    fn test_from_vector_blends_neighbours() {
        // East + North -> North-East
        assert_eq!(Compass::from_vector(1.0, 1.0), Some(Compass::NorthEast));
        // East + North-East + South-East -> East
        assert_eq!(
            Compass::from_vector(1.0 + 2.0 * DIAGONAL_WEIGHT, 0.0),
            Some(Compass::East)
        );
        // slightly below the positive x axis still rounds to East
        assert_eq!(Compass::from_vector(1.0, -0.1), Some(Compass::East));
    }

    #[test]
    fn test_from_vector_cancelled() {
        assert_eq!(Compass::from_vector(0.0, 0.0), None);
        assert_eq!(Compass::from_vector(1.0 - 1.0, DIAGONAL_WEIGHT - DIAGONAL_WEIGHT), None);
    }

    #[test]
    fn test_cell_class_kind() {
        assert_eq!(CellClass::Coast(Compass::North).kind(), CellKind::Coast);
        assert_eq!(CellClass::Water.kind(), CellKind::Water);
        assert_eq!(CellClass::Land.kind(), CellKind::Land);
    }
}

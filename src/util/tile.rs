use serde::{Deserialize, Serialize};
use std::ops::Add;

/// Cardinal movement/facing direction on the tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Expansion order used by BFS and blast geometry
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// The two directions at right angles to this one
    #[inline]
    pub fn perpendicular(self) -> [Direction; 2] {
        match self {
            Direction::Up | Direction::Down => [Direction::Left, Direction::Right],
            Direction::Left | Direction::Right => [Direction::Up, Direction::Down],
        }
    }
}

/// Integer tile coordinate. May lie outside the grid; bounds are checked by `Grid`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbouring tile in `dir`
    #[inline]
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Tile `distance` steps away in `dir`
    #[inline]
    pub fn offset(self, dir: Direction, distance: i32) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: self.x + dx * distance,
            y: self.y + dy * distance,
        }
    }

    #[inline]
    pub fn manhattan(self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Four cardinal neighbours in `Direction::ALL` order
    pub fn neighbors(self) -> [(Direction, TilePos); 4] {
        Direction::ALL.map(|dir| (dir, self.step(dir)))
    }

    /// Direction of a single cardinal step from `self` to `other`, if adjacent
    pub fn direction_to(self, other: TilePos) -> Option<Direction> {
        Direction::ALL.into_iter().find(|&dir| self.step(dir) == other)
    }
}

impl Add<Direction> for TilePos {
    type Output = TilePos;

    fn add(self, rhs: Direction) -> TilePos {
        self.step(rhs)
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_and_opposite() {
        let p = TilePos::new(3, 3);
        for dir in Direction::ALL {
            assert_eq!(p.step(dir).step(dir.opposite()), p);
        }
    }

    #[test]
    fn test_offset() {
        let p = TilePos::new(5, 5);
        assert_eq!(p.offset(Direction::Left, 3), TilePos::new(2, 5));
        assert_eq!(p.offset(Direction::Down, 2), TilePos::new(5, 7));
    }

    #[test]
    fn test_manhattan() {
        assert_eq!(TilePos::new(1, 1).manhattan(TilePos::new(4, 3)), 5);
        assert_eq!(TilePos::new(4, 3).manhattan(TilePos::new(1, 1)), 5);
    }

    #[test]
    fn test_perpendicular() {
        let [a, b] = Direction::Up.perpendicular();
        assert_eq!((a, b), (Direction::Left, Direction::Right));
        let [a, b] = Direction::Right.perpendicular();
        assert_eq!((a, b), (Direction::Up, Direction::Down));
    }

    #[test]
    fn test_direction_to() {
        let p = TilePos::new(2, 2);
        assert_eq!(p.direction_to(TilePos::new(2, 1)), Some(Direction::Up));
        assert_eq!(p.direction_to(TilePos::new(3, 3)), None);
    }
}

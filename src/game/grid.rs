//! Grid & tile model
//!
//! A fixed-size tile array plus the hidden-powerup overlay revealed when a
//! block is destroyed. Bounds never change during a match; the border ring is
//! always `Tile::Wall`.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::util::tile::TilePos;

/// Tile kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Empty,
    /// Permanent, stops every effect
    Wall,
    /// Destructible, may hide a powerup
    Block,
    PowerupFlamethrower,
    PowerupRaygun,
    PowerupShield,
}

/// Powerup kind as it lies on the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerupKind {
    Flamethrower,
    Raygun,
    Shield,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 3] = [
        PowerupKind::Flamethrower,
        PowerupKind::Raygun,
        PowerupKind::Shield,
    ];

    pub fn tile(self) -> Tile {
        match self {
            PowerupKind::Flamethrower => Tile::PowerupFlamethrower,
            PowerupKind::Raygun => Tile::PowerupRaygun,
            PowerupKind::Shield => Tile::PowerupShield,
        }
    }
}

impl Tile {
    /// Walls and blocks stop movement
    #[inline]
    pub fn is_solid(self) -> bool {
        matches!(self, Tile::Wall | Tile::Block)
    }

    #[inline]
    pub fn powerup(self) -> Option<PowerupKind> {
        match self {
            Tile::PowerupFlamethrower => Some(PowerupKind::Flamethrower),
            Tile::PowerupRaygun => Some(PowerupKind::Raygun),
            Tile::PowerupShield => Some(PowerupKind::Shield),
            _ => None,
        }
    }

    #[inline]
    pub fn is_powerup(self) -> bool {
        self.powerup().is_some()
    }
}

/// Static per-match tile array with hidden powerup overlay
#[derive(Debug, Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    hidden: FxHashMap<TilePos, PowerupKind>,
}

impl Grid {
    /// Empty interior surrounded by a wall border
    pub fn bordered(width: i32, height: i32) -> Self {
        let mut grid = Self {
            width,
            height,
            tiles: vec![Tile::Empty; (width * height) as usize],
            hidden: FxHashMap::default(),
        };
        for pos in grid.positions().collect::<Vec<_>>() {
            if grid.is_border(pos) {
                grid.set(pos, Tile::Wall);
            }
        }
        grid
    }

    /// Build from a flat row-major tile array supplied by the map generator.
    /// Returns `None` if the dimensions don't match or the border isn't walled.
    pub fn from_tiles(
        width: i32,
        height: i32,
        tiles: Vec<Tile>,
        hidden: FxHashMap<TilePos, PowerupKind>,
    ) -> Option<Self> {
        if width <= 0 || height <= 0 || tiles.len() != (width * height) as usize {
            return None;
        }
        let grid = Self {
            width,
            height,
            tiles,
            hidden,
        };
        let walled = grid
            .positions()
            .filter(|&p| grid.is_border(p))
            .all(|p| grid.get(p) == Tile::Wall);
        walled.then_some(grid)
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[inline]
    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    #[inline]
    pub fn index(&self, pos: TilePos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    #[inline]
    pub fn pos_of(&self, index: usize) -> TilePos {
        let i = index as i32;
        TilePos::new(i % self.width, i / self.width)
    }

    /// Tile at `pos`; anything outside the grid reads as Wall
    #[inline]
    pub fn get(&self, pos: TilePos) -> Tile {
        self.index(pos).map_or(Tile::Wall, |i| self.tiles[i])
    }

    /// Raw write. Room code must go through `GameState::apply_tile_change`.
    pub(crate) fn set(&mut self, pos: TilePos, tile: Tile) {
        if let Some(i) = self.index(pos) {
            self.tiles[i] = tile;
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| TilePos::new(x, y)))
    }

    pub fn is_border(&self, pos: TilePos) -> bool {
        pos.x == 0 || pos.y == 0 || pos.x == self.width - 1 || pos.y == self.height - 1
    }

    /// Ring index: 0 for the border, 1 for the ring inside it, ...
    pub fn ring_of(&self, pos: TilePos) -> i32 {
        pos.x
            .min(pos.y)
            .min(self.width - 1 - pos.x)
            .min(self.height - 1 - pos.y)
    }

    pub fn count(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|&&t| t == tile).count()
    }

    pub fn block_count(&self) -> usize {
        self.count(Tile::Block)
    }

    pub fn powerup_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_powerup()).count()
    }

    pub fn hide_powerup(&mut self, pos: TilePos, kind: PowerupKind) {
        self.hidden.insert(pos, kind);
    }

    pub fn hidden_powerup(&self, pos: TilePos) -> Option<PowerupKind> {
        self.hidden.get(&pos).copied()
    }

    /// Remove and return what a destroyed block at `pos` leaves behind
    pub(crate) fn take_revealed(&mut self, pos: TilePos) -> Tile {
        self.hidden
            .remove(&pos)
            .map_or(Tile::Empty, PowerupKind::tile)
    }

    /// Build a grid from ASCII rows: `#` wall, `B` block, `.` empty,
    /// `F`/`R`/`S` powerups, `f`/`r`/`s` a block hiding that powerup.
    pub fn parse(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.first().map_or(0, |r| r.len()) as i32;
        let mut tiles = Vec::with_capacity((width * height) as usize);
        let mut hidden = FxHashMap::default();
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let pos = TilePos::new(x as i32, y as i32);
                let tile = match c {
                    '#' => Tile::Wall,
                    'B' => Tile::Block,
                    'F' => Tile::PowerupFlamethrower,
                    'R' => Tile::PowerupRaygun,
                    'S' => Tile::PowerupShield,
                    'f' | 'r' | 's' => {
                        let kind = match c {
                            'f' => PowerupKind::Flamethrower,
                            'r' => PowerupKind::Raygun,
                            _ => PowerupKind::Shield,
                        };
                        hidden.insert(pos, kind);
                        Tile::Block
                    }
                    _ => Tile::Empty,
                };
                tiles.push(tile);
            }
        }
        Self {
            width,
            height,
            tiles,
            hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bordered_grid() {
        let grid = Grid::bordered(7, 5);
        assert_eq!(grid.len(), 35);
        assert_eq!(grid.get(TilePos::new(0, 0)), Tile::Wall);
        assert_eq!(grid.get(TilePos::new(6, 4)), Tile::Wall);
        assert_eq!(grid.get(TilePos::new(3, 2)), Tile::Empty);
        assert_eq!(grid.count(Tile::Wall), 2 * 7 + 2 * 3);
    }

    #[test]
    fn test_out_of_bounds_reads_as_wall() {
        let grid = Grid::bordered(5, 5);
        assert_eq!(grid.get(TilePos::new(-1, 2)), Tile::Wall);
        assert_eq!(grid.get(TilePos::new(2, 5)), Tile::Wall);
        assert!(grid.index(TilePos::new(5, 0)).is_none());
    }

    #[test]
    fn test_from_tiles_rejects_open_border() {
        let tiles = vec![Tile::Empty; 9];
        assert!(Grid::from_tiles(3, 3, tiles, FxHashMap::default()).is_none());

        let grid = Grid::bordered(5, 5);
        let rebuilt = Grid::from_tiles(5, 5, grid.tiles().to_vec(), FxHashMap::default());
        assert!(rebuilt.is_some());
    }

    #[test]
    fn test_index_roundtrip() {
        let grid = Grid::bordered(9, 7);
        let pos = TilePos::new(4, 3);
        let idx = grid.index(pos).unwrap();
        assert_eq!(grid.pos_of(idx), pos);
    }

    #[test]
    fn test_ring_of() {
        let grid = Grid::bordered(9, 7);
        assert_eq!(grid.ring_of(TilePos::new(0, 3)), 0);
        assert_eq!(grid.ring_of(TilePos::new(1, 1)), 1);
        assert_eq!(grid.ring_of(TilePos::new(4, 3)), 3);
    }

    #[test]
    fn test_parse_and_reveal() {
        let mut grid = Grid::parse(&["#####", "#.Bs#", "#####"]);
        assert_eq!(grid.get(TilePos::new(2, 1)), Tile::Block);
        assert_eq!(grid.get(TilePos::new(3, 1)), Tile::Block);
        assert_eq!(grid.hidden_powerup(TilePos::new(3, 1)), Some(PowerupKind::Shield));

        assert_eq!(grid.take_revealed(TilePos::new(3, 1)), Tile::PowerupShield);
        assert_eq!(grid.take_revealed(TilePos::new(3, 1)), Tile::Empty);
        assert_eq!(grid.take_revealed(TilePos::new(2, 1)), Tile::Empty);
    }

    #[test]
    fn test_tile_predicates() {
        assert!(Tile::Wall.is_solid());
        assert!(Tile::Block.is_solid());
        assert!(!Tile::PowerupRaygun.is_solid());
        assert_eq!(Tile::PowerupShield.powerup(), Some(PowerupKind::Shield));
        assert_eq!(Tile::Empty.powerup(), None);
    }
}

//! Blast geometry
//!
//! Pure functions computing which tiles a bomb or weapon discharge affects and
//! which blocks it destroys. Nothing here mutates the grid.

use smallvec::SmallVec;

use crate::game::constants::weapon::FLAMETHROWER_RANGE;
use crate::game::grid::{Grid, Tile};
use crate::game::state::WeaponKind;
use crate::util::tile::{Direction, TilePos};

/// Affected tiles of one detonation or discharge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blast {
    pub origin: TilePos,
    /// Every affected tile, origin first when included, no duplicates
    pub tiles: Vec<TilePos>,
    /// Blocks hit (subset of `tiles`)
    pub destroyed: SmallVec<[TilePos; 4]>,
}

impl Blast {
    fn new(origin: TilePos, include_origin: bool) -> Self {
        let mut tiles = Vec::with_capacity(16);
        if include_origin {
            tiles.push(origin);
        }
        Self {
            origin,
            tiles,
            destroyed: SmallVec::new(),
        }
    }

    fn add(&mut self, pos: TilePos) {
        if !self.tiles.contains(&pos) {
            self.tiles.push(pos);
        }
    }

    fn destroy(&mut self, pos: TilePos) {
        self.add(pos);
        if !self.destroyed.contains(&pos) {
            self.destroyed.push(pos);
        }
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        self.tiles.contains(&pos)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Which arms of the cross to expand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arms {
    /// All four directions, origin included
    All,
    /// One direction, origin excluded (a directional shot)
    Single(Direction),
}

impl Arms {
    fn directions(self) -> SmallVec<[Direction; 4]> {
        match self {
            Arms::All => SmallVec::from_slice(&Direction::ALL),
            Arms::Single(dir) => SmallVec::from_slice(&[dir]),
        }
    }

    fn includes_origin(self) -> bool {
        matches!(self, Arms::All)
    }
}

#[derive(Debug, Clone, Copy)]
struct ArmStyle {
    /// `None` runs to the map edge
    range: Option<u32>,
    /// Keep going after destroying a block
    pierce_blocks: bool,
    /// One-tile perpendicular spread at every arm tile
    spread: bool,
}

fn expand_arm(grid: &Grid, origin: TilePos, dir: Direction, style: ArmStyle, blast: &mut Blast) {
    let mut distance: i32 = 1;
    loop {
        if style.range.is_some_and(|r| distance > r as i32) {
            break;
        }
        let pos = origin.offset(dir, distance);
        if !grid.in_bounds(pos) {
            break;
        }
        match grid.get(pos) {
            Tile::Wall => break,
            Tile::Block => {
                blast.destroy(pos);
                if !style.pierce_blocks {
                    break;
                }
            }
            _ => {
                blast.add(pos);
                if style.spread {
                    spread_sideways(grid, pos, dir, blast);
                }
            }
        }
        distance += 1;
    }
}

fn spread_sideways(grid: &Grid, pos: TilePos, dir: Direction, blast: &mut Blast) {
    for side in dir.perpendicular() {
        let p = pos.step(side);
        match grid.get(p) {
            Tile::Wall => {}
            Tile::Block => blast.destroy(p),
            _ => blast.add(p),
        }
    }
}

/// Standard bomb: cross of `power` tiles, walls stop, first block is destroyed and stops
pub fn bomb_blast(grid: &Grid, origin: TilePos, power: u32) -> Blast {
    let style = ArmStyle {
        range: Some(power),
        pierce_blocks: false,
        spread: false,
    };
    let mut blast = Blast::new(origin, true);
    for dir in Direction::ALL {
        expand_arm(grid, origin, dir, style, &mut blast);
    }
    blast
}

/// Flamethrower: standard expansion at fixed range plus a one-tile side spread
pub fn flamethrower_blast(grid: &Grid, origin: TilePos, arms: Arms) -> Blast {
    let style = ArmStyle {
        range: Some(FLAMETHROWER_RANGE),
        pierce_blocks: false,
        spread: true,
    };
    let mut blast = Blast::new(origin, arms.includes_origin());
    for dir in arms.directions() {
        expand_arm(grid, origin, dir, style, &mut blast);
    }
    blast
}

/// Raygun: to the map edge, stopped only by walls, destroys every block it crosses
pub fn raygun_blast(grid: &Grid, origin: TilePos, arms: Arms) -> Blast {
    let style = ArmStyle {
        range: None,
        pierce_blocks: true,
        spread: false,
    };
    let mut blast = Blast::new(origin, arms.includes_origin());
    for dir in arms.directions() {
        expand_arm(grid, origin, dir, style, &mut blast);
    }
    blast
}

/// Directional discharge of `weapon` from `origin` towards `dir`
pub fn weapon_shot(grid: &Grid, origin: TilePos, weapon: WeaponKind, dir: Direction) -> Blast {
    match weapon {
        WeaponKind::Flamethrower => flamethrower_blast(grid, origin, Arms::Single(dir)),
        WeaponKind::Raygun => raygun_blast(grid, origin, Arms::Single(dir)),
    }
}

//! Map generation
//!
//! Classic layout: walled border, a pillar on every even interior coordinate,
//! destructible blocks scattered over the rest with a share of them hiding
//! powerups. Spawn corners and their neighbours stay clear.

use rand::Rng;

use crate::game::constants::map::{BLOCK_DENSITY, HIDDEN_POWERUP_CHANCE, MAX_COMBATANTS};
use crate::game::grid::{Grid, PowerupKind, Tile};
use crate::game::state::spawn_position;
use crate::util::tile::TilePos;

/// Generate a fresh grid and hidden-powerup overlay
pub fn generate<R: Rng>(width: i32, height: i32, rng: &mut R) -> Grid {
    let mut grid = Grid::bordered(width, height);

    let reserved: Vec<TilePos> = (0..MAX_COMBATANTS as u8)
        .map(|slot| spawn_position(width, height, slot))
        .flat_map(|spawn| {
            std::iter::once(spawn).chain(spawn.neighbors().into_iter().map(|(_, n)| n))
        })
        .collect();

    for pos in grid.positions().collect::<Vec<_>>() {
        if grid.is_border(pos) {
            continue;
        }
        if pos.x % 2 == 0 && pos.y % 2 == 0 {
            grid.set(pos, Tile::Wall);
            continue;
        }
        if reserved.contains(&pos) || !rng.gen_bool(BLOCK_DENSITY) {
            continue;
        }
        grid.set(pos, Tile::Block);
        if rng.gen_bool(HIDDEN_POWERUP_CHANCE) {
            let kind = PowerupKind::ALL[rng.gen_range(0..PowerupKind::ALL.len())];
            grid.hide_powerup(pos, kind);
        }
    }

    grid
}

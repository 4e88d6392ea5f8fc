//! Hazard (danger) map builder
//!
//! Rebuilt from scratch whenever a bot needs it: every live bomb stamps its
//! blast tiles with its detonation time, keeping the earliest stamp per tile.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::game::grid::Grid;
use crate::game::state::{Bomb, Millis};
use crate::game::systems::blast::{bomb_blast, Blast};
use crate::util::tile::TilePos;

/// Earliest unsafe timestamp per tile
#[derive(Debug, Clone)]
pub struct HazardMap {
    width: i32,
    height: i32,
    cells: Vec<Option<Millis>>,
}

impl HazardMap {
    pub fn empty(grid: &Grid) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            cells: vec![None; grid.len()],
        }
    }

    /// Stamp every bomb's blast. With `chain` enabled, bombs caught in an
    /// earlier blast use the earlier time.
    pub fn build(grid: &Grid, bombs: &[Bomb], chain: bool) -> Self {
        let blasts: Vec<Blast> = bombs
            .iter()
            .map(|b| bomb_blast(grid, b.position, b.power))
            .collect();
        let times = if chain {
            chain_times(bombs, &blasts)
        } else {
            bombs.iter().map(|b| b.detonate_at).collect()
        };

        let mut map = Self::empty(grid);
        for (blast, at) in blasts.iter().zip(times) {
            map.stamp(&blast.tiles, at);
        }
        map
    }

    /// Lower each tile's stamp to `at` where it is earlier
    pub fn stamp(&mut self, tiles: &[TilePos], at: Millis) {
        for &pos in tiles {
            if let Some(i) = self.index(pos) {
                let cell = &mut self.cells[i];
                *cell = Some(cell.map_or(at, |t| t.min(at)));
            }
        }
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        (pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    pub fn get(&self, pos: TilePos) -> Option<Millis> {
        self.index(pos).and_then(|i| self.cells[i])
    }

    #[inline]
    pub fn is_hazardous(&self, pos: TilePos) -> bool {
        self.get(pos).is_some()
    }

    #[inline]
    pub fn is_safe(&self, pos: TilePos) -> bool {
        !self.is_hazardous(pos)
    }

    pub fn hazardous_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

/// Effective detonation time of every bomb once chain reactions are accounted for.
pub fn effective_detonation_times(grid: &Grid, bombs: &[Bomb]) -> Vec<Millis> {
    let blasts: Vec<Blast> = bombs
        .iter()
        .map(|b| bomb_blast(grid, b.position, b.power))
        .collect();
    chain_times(bombs, &blasts)
}

// Fixed point: each pass can only lower times, so at most one pass per bomb
// changes anything.
fn chain_times(bombs: &[Bomb], blasts: &[Blast]) -> Vec<Millis> {
    let mut by_position: FxHashMap<TilePos, SmallVec<[usize; 2]>> = FxHashMap::default();
    for (i, bomb) in bombs.iter().enumerate() {
        by_position.entry(bomb.position).or_default().push(i);
    }

    let mut times: Vec<Millis> = bombs.iter().map(|b| b.detonate_at).collect();
    for _ in 0..=bombs.len() {
        let mut tightened = false;
        for (i, blast) in blasts.iter().enumerate() {
            for pos in &blast.tiles {
                let Some(caught) = by_position.get(pos) else {
                    continue;
                };
                for &j in caught {
                    if times[i] < times[j] {
                        times[j] = times[i];
                        tightened = true;
                    }
                }
            }
        }
        if !tightened {
            break;
        }
    }
    times
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use uuid::Uuid;

    fn bomb(id: u64, x: i32, y: i32, at: Millis) -> Bomb {
        Bomb {
            id,
            position: TilePos::new(x, y),
            owner: Uuid::nil(),
            detonate_at: at,
            power: 2,
        }
    }

    #[test]
    fn test_no_bombs_no_hazard() {
        let grid = Grid::bordered(9, 9);
        let map = HazardMap::build(&grid, &[], true);
        assert_eq!(map.hazardous_count(), 0);
    }

    #[test]
    fn test_single_bomb_stamps_blast() {
        let grid = Grid::bordered(9, 9);
        let map = HazardMap::build(&grid, &[bomb(1, 4, 4, 3000)], false);

        assert_eq!(map.hazardous_count(), 9);
        assert_eq!(map.get(TilePos::new(4, 6)), Some(3000));
        assert!(map.is_safe(TilePos::new(5, 5)));
    }

    #[test]
    fn test_overlap_keeps_earliest() {
        let grid = Grid::bordered(11, 9);
        let bombs = [bomb(1, 2, 4, 5000), bomb(2, 6, 4, 2000)];
        let map = HazardMap::build(&grid, &bombs, false);
        assert_eq!(map.get(TilePos::new(4, 4)), Some(2000));
        assert_eq!(map.get(TilePos::new(2, 4)), Some(5000));
    }

    #[test]
    fn test_chain_lowers_caught_bomb() {
        let grid = Grid::bordered(13, 5);
        // 1 catches 2, 2 catches 3, 3 is out of 1's reach
        let bombs = [bomb(1, 1, 2, 1000), bomb(2, 3, 2, 5000), bomb(3, 5, 2, 9000)];

        let times = effective_detonation_times(&grid, &bombs);
        assert_eq!(times, vec![1000, 1000, 1000]);

        let without_chain = HazardMap::build(&grid, &bombs, false);
        let with_chain = HazardMap::build(&grid, &bombs, true);
        assert_eq!(without_chain.get(TilePos::new(7, 2)), Some(9000));
        assert_eq!(with_chain.get(TilePos::new(7, 2)), Some(1000));
    }

    #[test]
    fn test_chain_cycle_terminates() {
        let grid = Grid::bordered(9, 5);
        let bombs = [bomb(1, 2, 2, 4000), bomb(2, 3, 2, 3000), bomb(3, 4, 2, 2000)];
        let times = effective_detonation_times(&grid, &bombs);
        assert_eq!(times, vec![2000, 2000, 2000]);
    }

    #[test]
    fn test_monotonic_under_bomb_addition() {
        let grid = Grid::parse(&[
            "###########",
            "#...B.....#",
            "#.#.#.#.#.#",
            "#....B....#",
            "#.#.#.#.#.#",
            "#.....B...#",
            "###########",
        ]);
        let open: Vec<TilePos> = grid.positions().filter(|&p| !grid.get(p).is_solid()).collect();

        for chain in [false, true] {
            let mut rng = StdRng::seed_from_u64(7);
            let mut bombs = Vec::new();
            let mut before = HazardMap::build(&grid, &bombs, chain);
            for id in 0..12 {
                let pos = open[rng.gen_range(0..open.len())];
                if bombs.iter().any(|b: &Bomb| b.position == pos) {
                    continue;
                }
                bombs.push(bomb(id, pos.x, pos.y, rng.gen_range(500..6000)));
                let after = HazardMap::build(&grid, &bombs, chain);

                for p in grid.positions() {
                    if let Some(t) = before.get(p) {
                        let now = after.get(p).expect("hazard removed by adding a bomb");
                        assert!(now <= t);
                    }
                }
                before = after;
            }
        }
    }
}

//! BFS / pathfinding service
//!
//! One generic breadth-first primitive plus a flood-fill variant. Walls,
//! blocks and bomb tiles are impassable; the start tile is always explored so
//! a combatant standing on its own bomb can still route away from it.

use std::collections::VecDeque;

use bitvec::prelude::*;

use crate::game::grid::Grid;
use crate::game::state::Bomb;
use crate::util::tile::{Direction, TilePos};

/// Passability predicate: solid tiles plus a bomb-occupancy mask
#[derive(Debug, Clone)]
pub struct Passability<'a> {
    grid: &'a Grid,
    blocked: BitVec,
}

impl<'a> Passability<'a> {
    /// Only terrain blocks
    pub fn terrain(grid: &'a Grid) -> Self {
        Self {
            grid,
            blocked: bitvec![0; grid.len()],
        }
    }

    /// Terrain plus every live bomb
    pub fn with_bombs(grid: &'a Grid, bombs: &[Bomb]) -> Self {
        let mut pass = Self::terrain(grid);
        for bomb in bombs {
            pass.set_blocked(bomb.position, true);
        }
        pass
    }

    /// Treat `pos` as free of bombs (e.g. a hypothetical bomb being evaluated)
    pub fn without(mut self, pos: TilePos) -> Self {
        self.set_blocked(pos, false);
        self
    }

    /// Treat `pos` as occupied
    pub fn with_blocked(mut self, pos: TilePos) -> Self {
        self.set_blocked(pos, true);
        self
    }

    fn set_blocked(&mut self, pos: TilePos, value: bool) {
        if let Some(i) = self.grid.index(pos) {
            self.blocked.set(i, value);
        }
    }

    pub fn grid(&self) -> &Grid {
        self.grid
    }

    #[inline]
    pub fn is_passable(&self, pos: TilePos) -> bool {
        match self.grid.index(pos) {
            Some(i) => !self.grid.get(pos).is_solid() && !self.blocked[i],
            None => false,
        }
    }
}

/// Result of a successful search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// `None` when the start tile itself satisfies the goal
    pub first_step: Option<Direction>,
    pub target: TilePos,
    pub distance: u32,
}

/// Shortest first step from `start` towards the nearest tile matching `goal`.
///
/// Ties between equally short routes follow `Direction::ALL` expansion order;
/// callers should not depend on which one wins.
pub fn bfs_first_step<F>(start: TilePos, pass: &Passability<'_>, goal: F) -> Option<Route>
where
    F: Fn(TilePos) -> bool,
{
    let grid = pass.grid;
    let start_idx = grid.index(start)?;
    if goal(start) {
        return Some(Route {
            first_step: None,
            target: start,
            distance: 0,
        });
    }

    let mut visited = bitvec![0; grid.len()];
    visited.set(start_idx, true);

    let mut queue: VecDeque<(TilePos, Direction, u32)> = VecDeque::new();
    for (dir, next) in start.neighbors() {
        if let Some(i) = grid.index(next) {
            if pass.is_passable(next) && !visited[i] {
                visited.set(i, true);
                queue.push_back((next, dir, 1));
            }
        }
    }

    while let Some((pos, first, dist)) = queue.pop_front() {
        if goal(pos) {
            return Some(Route {
                first_step: Some(first),
                target: pos,
                distance: dist,
            });
        }
        for (_, next) in pos.neighbors() {
            if let Some(i) = grid.index(next) {
                if !visited[i] && pass.is_passable(next) {
                    visited.set(i, true);
                    queue.push_back((next, first, dist + 1));
                }
            }
        }
    }

    None
}

/// Distance from the flood start to every reachable tile
#[derive(Debug, Clone)]
pub struct DistanceMap {
    width: i32,
    distances: Vec<Option<u32>>,
}

impl DistanceMap {
    pub fn get(&self, pos: TilePos) -> Option<u32> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width {
            return None;
        }
        let i = (pos.y * self.width + pos.x) as usize;
        self.distances.get(i).copied().flatten()
    }

    pub fn is_reachable(&self, pos: TilePos) -> bool {
        self.get(pos).is_some()
    }

    /// Every reachable tile with its distance
    pub fn reachable(&self) -> impl Iterator<Item = (TilePos, u32)> + '_ {
        let width = self.width;
        self.distances.iter().enumerate().filter_map(move |(i, d)| {
            d.map(|d| (TilePos::new(i as i32 % width, i as i32 / width), d))
        })
    }

    pub fn reachable_count(&self) -> usize {
        self.distances.iter().filter(|d| d.is_some()).count()
    }
}

/// Flood fill from `start`, optionally stopping at `max_depth` steps
pub fn flood_fill(start: TilePos, pass: &Passability<'_>, max_depth: Option<u32>) -> DistanceMap {
    let grid = pass.grid;
    let mut distances = vec![None; grid.len()];
    let mut queue = VecDeque::new();

    if let Some(i) = grid.index(start) {
        distances[i] = Some(0);
        queue.push_back((start, 0u32));
    }

    while let Some((pos, dist)) = queue.pop_front() {
        if max_depth.is_some_and(|max| dist >= max) {
            continue;
        }
        for (_, next) in pos.neighbors() {
            if let Some(i) = grid.index(next) {
                if distances[i].is_none() && pass.is_passable(next) {
                    distances[i] = Some(dist + 1);
                    queue.push_back((next, dist + 1));
                }
            }
        }
    }

    DistanceMap {
        width: grid.width(),
        distances,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::Tile;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use uuid::Uuid;

    fn bomb_at(pos: TilePos) -> Bomb {
        Bomb {
            id: 1,
            position: pos,
            owner: Uuid::nil(),
            detonate_at: 3000,
            power: 2,
        }
    }

    #[test]
    fn test_first_step_towards_goal() {
        let grid = Grid::parse(&[
            "#######",
            "#.....#",
            "#.###.#",
            "#.....#",
            "#######",
        ]);
        let pass = Passability::terrain(&grid);
        let goal = TilePos::new(5, 1);
        let route = bfs_first_step(TilePos::new(1, 1), &pass, |p| p == goal).unwrap();

        assert_eq!(route.first_step, Some(Direction::Right));
        assert_eq!(route.distance, 4);
        assert_eq!(route.target, goal);
    }

    #[test]
    fn test_goal_at_start() {
        let grid = Grid::bordered(5, 5);
        let pass = Passability::terrain(&grid);
        let route = bfs_first_step(TilePos::new(2, 2), &pass, |_| true).unwrap();
        assert_eq!(route.first_step, None);
        assert_eq!(route.distance, 0);
    }

    #[test]
    fn test_no_path_when_walled_off() {
        let grid = Grid::parse(&[
            "#######",
            "#.#...#",
            "#B#...#",
            "#######",
        ]);
        let pass = Passability::terrain(&grid);
        let route = bfs_first_step(TilePos::new(1, 1), &pass, |p| p == TilePos::new(4, 1));
        assert!(route.is_none());
    }

    #[test]
    fn test_bombs_block_but_start_is_explored() {
        let grid = Grid::parse(&[
            "#####",
            "#...#",
            "#####",
        ]);
        let bombs = vec![bomb_at(TilePos::new(1, 1)), bomb_at(TilePos::new(3, 1))];
        let pass = Passability::with_bombs(&grid, &bombs);

        // Standing on a bomb, can still leave it
        let route = bfs_first_step(TilePos::new(1, 1), &pass, |p| p == TilePos::new(2, 1)).unwrap();
        assert_eq!(route.first_step, Some(Direction::Right));

        // Other bomb is impassable
        assert!(bfs_first_step(TilePos::new(2, 1), &pass, |p| p.x == 3).is_none());

        let pass = pass.without(TilePos::new(3, 1));
        assert!(bfs_first_step(TilePos::new(2, 1), &pass, |p| p.x == 3).is_some());
    }

    #[test]
    fn test_flood_fill_distances() {
        let grid = Grid::bordered(6, 4);
        let pass = Passability::terrain(&grid);
        let map = flood_fill(TilePos::new(1, 1), &pass, None);

        assert_eq!(map.get(TilePos::new(1, 1)), Some(0));
        assert_eq!(map.get(TilePos::new(4, 2)), Some(4));
        assert_eq!(map.get(TilePos::new(0, 0)), None);
        assert_eq!(map.reachable_count(), 8);
    }

    #[test]
    fn test_flood_fill_depth_limit() {
        let grid = Grid::bordered(9, 3);
        let pass = Passability::terrain(&grid);
        let map = flood_fill(TilePos::new(1, 1), &pass, Some(2));
        assert_eq!(map.reachable_count(), 3);
        assert!(!map.is_reachable(TilePos::new(4, 1)));
    }

    #[test]
    fn test_bfs_matches_flood_fill() {
        for seed in 0..16u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut grid = Grid::bordered(11, 9);
            for pos in grid.positions().collect::<Vec<_>>() {
                if !grid.is_border(pos) && rng.gen_bool(0.3) {
                    grid.set(pos, Tile::Block);
                }
            }
            let start = TilePos::new(1, 1);
            grid.set(start, Tile::Empty);
            let goal = TilePos::new(9, 7);
            grid.set(goal, Tile::Empty);

            let pass = Passability::terrain(&grid);
            let from_start = flood_fill(start, &pass, None);
            let route = bfs_first_step(start, &pass, |p| p == goal);

            match (route, from_start.get(goal)) {
                (None, None) => {}
                (Some(route), Some(dist)) => {
                    assert_eq!(route.distance, dist, "seed {}", seed);
                    let step = start.step(route.first_step.unwrap());
                    let from_step = flood_fill(step, &pass, None);
                    assert_eq!(from_step.get(goal), Some(dist - 1), "seed {}", seed);
                }
                (route, dist) => panic!("seed {}: route {:?} vs distance {:?}", seed, route, dist),
            }
        }
    }
}

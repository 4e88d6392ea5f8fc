pub mod constants;
pub mod events;
pub mod grid;
pub mod state;
pub mod systems;
pub mod game_loop;
pub mod mapgen;
pub mod match_result;

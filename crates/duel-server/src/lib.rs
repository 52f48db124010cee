pub mod bots;
pub mod config;
pub mod game_loop;

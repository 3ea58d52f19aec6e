pub mod aggregator;
pub mod amount;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod leaderboard;
pub mod models;
pub mod parser;
pub mod projector;
pub mod ranker;
pub mod refresh;
pub mod subgraph;

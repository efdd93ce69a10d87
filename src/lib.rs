pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod images;
pub mod memory;
pub mod products;
pub mod state;
pub mod storage;
pub mod users;

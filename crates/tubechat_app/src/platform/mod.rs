pub mod app;
pub mod commands;
pub mod config;
pub mod effects;
pub mod projects;
pub mod render;
pub mod threads;

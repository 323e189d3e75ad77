// src/lib.rs

pub mod storage;
pub mod token;
pub mod auth;
pub mod service;
pub mod app_state;
pub mod config;
pub mod error;
pub mod logging;

// src/lib.rs

//! Transcript Sync Library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;

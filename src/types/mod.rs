// src/types/mod.rs

pub mod date;

pub use date::CairnDate;

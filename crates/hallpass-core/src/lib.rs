pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod service;
pub mod storage;
pub mod timeslot;

pub use error::{HallpassError, Result};

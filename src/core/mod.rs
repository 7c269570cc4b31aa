// src/core/mod.rs

mod sse;

pub use sse::{SseDecoder, SseFrame};

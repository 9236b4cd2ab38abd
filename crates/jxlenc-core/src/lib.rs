//! Core types and utilities for the JPEG XL encoder
//!
//! This crate provides the fundamental data structures shared by the rest of
//! the workspace: the planar image model, encoding options, the error
//! taxonomy, and the per-encode buffer pool.

pub mod buffer_pool;
pub mod cancel;
pub mod consts;
pub mod error;
pub mod image;
pub mod options;
pub mod types;

pub use buffer_pool::BufferPool;
pub use cancel::CancelToken;
pub use error::{Error, FrameError, OptionsError, Result};
pub use image::*;
pub use options::*;
pub use types::*;

//! Per-encode scratch buffer pool
//!
//! Channel planes, DCT block buffers and token vectors are recycled within a
//! single encode. The pool is owned by the per-encode context and dropped
//! when the encode completes or fails, so no scratch memory outlives a call.

use std::sync::Mutex;

const MAX_POOLED_PLANES: usize = 8;
const MAX_POOLED_BLOCKS: usize = 16;

/// Reusable buffer pool scoped to one encode
pub struct BufferPool {
    plane_f32: Mutex<Vec<Vec<f32>>>,
    plane_i32: Mutex<Vec<Vec<i32>>>,
    block_f32: Mutex<Vec<[f32; 64]>>,
    /// High-water mark of bytes handed out, for the encode statistics
    peak_bytes: Mutex<usize>,
    live_bytes: Mutex<usize>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            plane_f32: Mutex::new(Vec::new()),
            plane_i32: Mutex::new(Vec::new()),
            block_f32: Mutex::new(Vec::new()),
            peak_bytes: Mutex::new(0),
            live_bytes: Mutex::new(0),
        }
    }

    fn track_alloc(&self, bytes: usize) {
        let mut live = self.live_bytes.lock().unwrap();
        *live += bytes;
        let mut peak = self.peak_bytes.lock().unwrap();
        if *live > *peak {
            *peak = *live;
        }
    }

    fn track_free(&self, bytes: usize) {
        let mut live = self.live_bytes.lock().unwrap();
        *live = live.saturating_sub(bytes);
    }

    /// Get an f32 plane of exactly `len` elements, zero-filled
    pub fn plane_f32(&self, len: usize) -> Vec<f32> {
        self.track_alloc(len * 4);
        let mut pool = self.plane_f32.lock().unwrap();
        match pool.pop() {
            Some(mut buf) => {
                buf.clear();
                buf.resize(len, 0.0);
                buf
            }
            None => vec![0.0; len],
        }
    }

    pub fn return_plane_f32(&self, buf: Vec<f32>) {
        self.track_free(buf.len() * 4);
        let mut pool = self.plane_f32.lock().unwrap();
        if pool.len() < MAX_POOLED_PLANES {
            pool.push(buf);
        }
    }

    /// Get an i32 plane of exactly `len` elements, zero-filled
    pub fn plane_i32(&self, len: usize) -> Vec<i32> {
        self.track_alloc(len * 4);
        let mut pool = self.plane_i32.lock().unwrap();
        match pool.pop() {
            Some(mut buf) => {
                buf.clear();
                buf.resize(len, 0);
                buf
            }
            None => vec![0; len],
        }
    }

    pub fn return_plane_i32(&self, buf: Vec<i32>) {
        self.track_free(buf.len() * 4);
        let mut pool = self.plane_i32.lock().unwrap();
        if pool.len() < MAX_POOLED_PLANES {
            pool.push(buf);
        }
    }

    /// Get a zeroed 8x8 block buffer
    pub fn block_f32(&self) -> [f32; 64] {
        let mut pool = self.block_f32.lock().unwrap();
        match pool.pop() {
            Some(mut buf) => {
                buf.fill(0.0);
                buf
            }
            None => [0.0; 64],
        }
    }

    pub fn return_block_f32(&self, buf: [f32; 64]) {
        let mut pool = self.block_f32.lock().unwrap();
        if pool.len() < MAX_POOLED_BLOCKS {
            pool.push(buf);
        }
    }

    /// Peak scratch usage in bytes observed so far
    pub fn peak_bytes(&self) -> usize {
        *self.peak_bytes.lock().unwrap()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

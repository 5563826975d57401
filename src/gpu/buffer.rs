//! GPU buffer management
//!
//! `GpuBuffer` wraps a wgpu buffer and provides methods for
//! transferring data between CPU and GPU.

use std::sync::mpsc;

use super::get_gpu_context;
use crate::config::runtime_config;
use crate::error::{EmberError, Result};

/// A buffer of f32 elements that lives on the GPU
///
/// This is analogous to a `Vec<f32>` but the data lives in GPU memory.
/// We need to explicitly copy data to/from the CPU.
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    /// Size in number of f32 elements
    len: usize,
}

fn no_context() -> EmberError {
    EmberError::DeviceError("GPU not available".to_string())
}

// wgpu rejects zero-sized bindings
fn byte_size(len: usize) -> u64 {
    (len.max(1) * std::mem::size_of::<f32>()) as u64
}

impl GpuBuffer {
    /// Create a new GPU buffer from CPU data
    ///
    /// # Errors
    /// `DeviceError` if no GPU context is available
    pub fn from_slice(data: &[f32]) -> Result<Self> {
        let buffer = Self::empty(data.len())?;
        if !data.is_empty() {
            let ctx = get_gpu_context().ok_or_else(no_context)?;
            ctx.queue()
                .write_buffer(&buffer.buffer, 0, bytemuck::cast_slice(data));
        }
        Ok(buffer)
    }

    /// Allocate an uninitialized output buffer of `len` elements
    ///
    /// # Errors
    /// `DeviceError` if no GPU context is available
    pub fn empty(len: usize) -> Result<Self> {
        let ctx = get_gpu_context().ok_or_else(no_context)?;
        let buffer = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Tensor Buffer"),
            size: byte_size(len),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(GpuBuffer { buffer, len })
    }

    /// Copy data from GPU back to CPU
    ///
    /// Blocks until queued work touching this buffer is done, bounded by
    /// `EMBER_GPU_SYNC_TIMEOUT`.
    ///
    /// # Errors
    /// `DeviceError` on timeout or a failed map
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        if self.len == 0 {
            return Ok(Vec::new());
        }
        let ctx = get_gpu_context().ok_or_else(no_context)?;
        let size = byte_size(self.len);

        // STORAGE buffers can't be mapped directly
        let staging_buffer = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read Buffer Encoder"),
            });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging_buffer, 0, size);
        ctx.queue().submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            // receiver outlives the poll below
            let _ = sender.send(result);
        });

        ctx.wait(runtime_config().sync_timeout)?;

        receiver
            .recv()
            .map_err(|_| EmberError::DeviceError("map_async result channel closed".to_string()))?
            .map_err(|e| EmberError::DeviceError(format!("Failed to map buffer: {e}")))?;

        let data = buffer_slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data)[..self.len].to_vec();
        drop(data);
        staging_buffer.unmap();

        Ok(result)
    }

    /// Get the underlying wgpu buffer (for use in compute passes)
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Get the number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer").field("len", &self.len).finish()
    }
}

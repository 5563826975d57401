//! GPU runtime for elementwise kernels using wgpu
//!
//! The key components are:
//! - `GpuContext`: the device, queue, and compiled kernel cache
//! - `GpuBuffer`: tensor data on the GPU
//! - `kernels`: WGSL generation and launch for [`crate::backend::Kernel`]

mod buffer;
mod context;
pub mod kernels;

pub use buffer::GpuBuffer;
pub use context::GpuContext;
pub use kernels::{DeviceArg, launch};

use crate::config::runtime_config;
use std::sync::OnceLock;
use tracing::{info, warn};

// Global GPU context - initialized lazily on first use
static GPU_CONTEXT: OnceLock<Option<GpuContext>> = OnceLock::new();

/// Get the global GPU context, initializing it if necessary
/// Returns None if GPU is not available or disabled by configuration
pub fn get_gpu_context() -> Option<&'static GpuContext> {
    GPU_CONTEXT
        .get_or_init(|| {
            if !runtime_config().gpu_enabled {
                info!("GPU disabled by EMBER_DISABLE_GPU");
                return None;
            }
            match GpuContext::new() {
                Ok(ctx) => {
                    info!(adapter = ctx.device_name(), "GPU initialized");
                    Some(ctx)
                }
                Err(e) => {
                    warn!("GPU initialization failed: {e}. Falling back to CPU.");
                    None
                }
            }
        })
        .as_ref()
}

/// Check if GPU is available
pub fn is_gpu_available() -> bool {
    get_gpu_context().is_some()
}

/// Number of distinct kernel pipelines compiled so far
pub fn compiled_kernel_count() -> usize {
    get_gpu_context().map_or(0, GpuContext::cached_kernels)
}

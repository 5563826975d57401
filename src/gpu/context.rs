//! GPU context management
//!
//! The `GpuContext` holds the wgpu device and queue, which are needed
//! for all GPU operations, plus the cache of compiled elementwise kernels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;
use wgpu::PipelineCompilationOptions;

use crate::config::runtime_config;
use crate::error::{EmberError, Result};

/// Manages the GPU device, queue, and compiled compute pipelines
pub struct GpuContext {
    /// The GPU device - represents the actual hardware
    device: wgpu::Device,
    /// Command queue - where we submit work to the GPU
    queue: wgpu::Queue,
    /// Adapter info for debugging
    adapter_info: wgpu::AdapterInfo,
    /// Compiled pipelines keyed by kernel name and argument signature
    pipelines: Mutex<HashMap<String, Arc<wgpu::ComputePipeline>>>,
}

impl GpuContext {
    /// Initialize the GPU context
    ///
    /// This does two things:
    /// 1. Finds a suitable GPU adapter
    /// 2. Creates a device and queue
    ///
    /// Kernels are compiled lazily on first launch.
    ///
    /// # Errors
    /// No adapter is present, or the device request is refused.
    pub fn new() -> std::result::Result<Self, String> {
        // wgpu is async, but the rest of the crate is synchronous
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> std::result::Result<Self, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None, // compute only
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| format!("No suitable GPU adapter found: {e}"))?;

        let adapter_info = adapter.get_info();

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("Ember GPU Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        };

        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .map_err(|e| format!("Failed to create device: {e}"))?;

        Ok(Self {
            device,
            queue,
            adapter_info,
            pipelines: Mutex::new(HashMap::new()),
        })
    }

    /// Get the GPU device name for display
    pub fn device_name(&self) -> &str {
        &self.adapter_info.name
    }

    /// Get a reference to the wgpu device
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get a reference to the command queue
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Number of compiled kernel pipelines held in the cache
    pub fn cached_kernels(&self) -> usize {
        self.pipelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Fetch a compiled pipeline, compiling `source` on a cache miss
    pub(crate) fn pipeline(
        &self,
        key: &str,
        source: impl FnOnce() -> String,
    ) -> Arc<wgpu::ComputePipeline> {
        let mut cache = self
            .pipelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pipeline) = cache.get(key) {
            return Arc::clone(pipeline);
        }

        debug!(kernel = key, "compiling elementwise kernel");
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(key),
                source: wgpu::ShaderSource::Wgsl(source().into()),
            });
        let pipeline = Arc::new(self.device.create_compute_pipeline(
            &wgpu::ComputePipelineDescriptor {
                label: Some(key),
                layout: None, // Auto-generate layout from shader
                module: &shader,
                entry_point: Some("main"),
                compilation_options: PipelineCompilationOptions::default(),
                cache: None,
            },
        ));
        cache.insert(key.to_string(), Arc::clone(&pipeline));
        pipeline
    }

    /// Block until submitted work completes, bounded by the configured timeout
    ///
    /// # Errors
    /// `DeviceError` if the device does not finish in time.
    pub fn sync(&self) -> Result<()> {
        self.wait(runtime_config().sync_timeout)
    }

    pub(crate) fn wait(&self, timeout: Duration) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(timeout),
            })
            .map(|_| ())
            .map_err(|e| EmberError::DeviceError(format!("GPU sync failed: {e:?}")))
    }
}

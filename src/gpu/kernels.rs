//! GPU kernel execution
//!
//! Each [`Kernel`] is compiled into a WGSL compute shader the first time it
//! is launched with a given mix of buffer and scalar arguments. Bindings are
//! laid out as:
//! - 0: `LaunchParams` uniform
//! - 1: output buffer
//! - 2: packed scalar arguments (only when the launch has any)
//! - then one read-only buffer per tensor argument, in parameter order

use std::fmt::Write as _;

use tracing::trace;
use wgpu::util::DeviceExt;

use super::{GpuBuffer, get_gpu_context};
use crate::backend::Kernel;
use crate::config::runtime_config;
use crate::error::{EmberError, Result};

/// Max workgroups per dispatch dimension (WebGPU default limit)
const MAX_GROUPS_PER_DIM: u32 = 65_535;

/// Parameters shared by every elementwise launch
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LaunchParams {
    pub len: u32,
    /// Invocations per dispatch row
    pub row: u32,
    pub _padding: [u32; 2], // Align to 16 bytes
}

/// A kernel argument resident on the device
#[derive(Clone, Copy, Debug)]
pub enum DeviceArg<'a> {
    Buffer(&'a GpuBuffer),
    Scalar(f32),
}

// Rust `powf` semantics for negative bases and zero, which WGSL `pow` leaves undefined
const POWF_HELPER: &str = "fn powf(x: f32, y: f32) -> f32 {
    if (y == 0.0) { return 1.0; }
    if (x == 0.0) {
        if (y < 0.0) { return bitcast<f32>(0x7f800000u); }
        return 0.0;
    }
    let m = pow(abs(x), y);
    if (x > 0.0) { return m; }
    if (floor(y) != y) { return bitcast<f32>(0x7fc00000u); }
    if (floor(y * 0.5) != y * 0.5) { return -m; }
    return m;
}
";

fn signature(args: &[DeviceArg<'_>]) -> String {
    args.iter()
        .map(|a| match a {
            DeviceArg::Buffer(_) => 'a',
            DeviceArg::Scalar(_) => 's',
        })
        .collect()
}

/// Generate the WGSL for `kernel` with the given argument signature
///
/// `signature` has one character per parameter: `a` for a buffer, `s` for
/// a scalar.
pub fn shader_source(kernel: &Kernel, signature: &str, workgroup_size: u32) -> String {
    let mut src = String::new();
    let has_scalars = signature.contains('s');

    src.push_str("struct LaunchParams {\n    len: u32,\n    row: u32,\n    pad0: u32,\n    pad1: u32,\n}\n\n");
    src.push_str("@group(0) @binding(0) var<uniform> launch: LaunchParams;\n");
    src.push_str("@group(0) @binding(1) var<storage, read_write> dst: array<f32>;\n");
    let mut binding = 2;
    if has_scalars {
        src.push_str("@group(0) @binding(2) var<storage, read> scalars: array<f32>;\n");
        binding += 1;
    }
    for (param, kind) in kernel.params.iter().zip(signature.chars()) {
        if kind == 'a' {
            let _ = writeln!(
                src,
                "@group(0) @binding({binding}) var<storage, read> in_{param}: array<f32>;"
            );
            binding += 1;
        }
    }
    src.push('\n');
    if kernel.device.contains("powf(") {
        src.push_str(POWF_HELPER);
        src.push('\n');
    }

    let _ = writeln!(src, "@compute @workgroup_size({workgroup_size})");
    src.push_str("fn main(@builtin(global_invocation_id) gid: vec3<u32>) {\n");
    src.push_str("    let i = gid.x + gid.y * launch.row;\n");
    src.push_str("    if (i >= launch.len) { return; }\n");
    let mut scalar = 0;
    for (param, kind) in kernel.params.iter().zip(signature.chars()) {
        if kind == 'a' {
            let _ = writeln!(src, "    let {param} = in_{param}[i];");
        } else {
            let _ = writeln!(src, "    let {param} = scalars[{scalar}];");
            scalar += 1;
        }
    }
    let _ = writeln!(src, "    dst[i] = ({});", kernel.device);
    src.push_str("}\n");
    src
}

/// Workgroup grid covering `len` invocations: `(x, y, invocations per row)`
pub fn dispatch_size(len: usize, workgroup_size: u32) -> (u32, u32, u32) {
    let groups = len.div_ceil(workgroup_size as usize).max(1) as u32;
    let x = groups.min(MAX_GROUPS_PER_DIM);
    let y = groups.div_ceil(x);
    (x, y, x * workgroup_size)
}

/// Launch `kernel` over `len` elements
///
/// Work is submitted but not awaited; reading the result back is the sync
/// point.
///
/// # Errors
/// `DeviceError` if no GPU is available, `KernelArity` on a wrong argument
/// count.
pub fn launch(kernel: &Kernel, args: &[DeviceArg<'_>], len: usize) -> Result<GpuBuffer> {
    if args.len() != kernel.arity() {
        return Err(EmberError::KernelArity {
            kernel: kernel.name,
            expected: kernel.arity(),
            actual: args.len(),
        });
    }
    let ctx = get_gpu_context()
        .ok_or_else(|| EmberError::DeviceError("GPU not available".to_string()))?;
    let result = GpuBuffer::empty(len)?;
    if len == 0 {
        return Ok(result);
    }

    let workgroup_size = runtime_config().workgroup_size;
    let sig = signature(args);
    let key = format!("{}:{sig}:{workgroup_size}", kernel.name);
    let pipeline = ctx.pipeline(&key, || shader_source(kernel, &sig, workgroup_size));

    let (groups_x, groups_y, row) = dispatch_size(len, workgroup_size);
    let params = LaunchParams {
        len: len as u32,
        row,
        _padding: [0; 2],
    };
    let params_buffer = ctx
        .device()
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Launch Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

    let scalars: Vec<f32> = args
        .iter()
        .filter_map(|a| match a {
            DeviceArg::Scalar(v) => Some(*v),
            DeviceArg::Buffer(_) => None,
        })
        .collect();
    let scalar_buffer = (!scalars.is_empty()).then(|| {
        ctx.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Kernel Scalars"),
                contents: bytemuck::cast_slice(&scalars),
                usage: wgpu::BufferUsages::STORAGE,
            })
    });

    let mut entries = vec![
        wgpu::BindGroupEntry {
            binding: 0,
            resource: params_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
            binding: 1,
            resource: result.buffer().as_entire_binding(),
        },
    ];
    if let Some(buffer) = &scalar_buffer {
        entries.push(wgpu::BindGroupEntry {
            binding: 2,
            resource: buffer.as_entire_binding(),
        });
    }
    for arg in args {
        if let DeviceArg::Buffer(buffer) = arg {
            entries.push(wgpu::BindGroupEntry {
                binding: entries.len() as u32,
                resource: buffer.buffer().as_entire_binding(),
            });
        }
    }

    let bind_group_layout = pipeline.get_bind_group_layout(0);
    let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(kernel.name),
        layout: &bind_group_layout,
        entries: &entries,
    });

    let mut encoder = ctx
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Elementwise Encoder"),
        });
    {
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Elementwise Pass"),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&pipeline);
        compute_pass.set_bind_group(0, &bind_group, &[]);
        compute_pass.dispatch_workgroups(groups_x, groups_y, 1);
    }
    ctx.queue().submit(Some(encoder.finish()));
    trace!(kernel = kernel.name, len, groups_x, groups_y, "device launch");

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::kernel;

    const POW_BWD: Kernel = kernel!("pow_bwd", |x, gy, value|
        host: value * x.powf(value - 1.0) * gy,
        device: "value * powf(x, value - 1.0) * gy");

    #[test]
    fn test_shader_binds_scalars_separately() {
        let src = shader_source(&POW_BWD, "aas", 64);
        assert!(src.contains("@binding(2) var<storage, read> scalars"));
        assert!(src.contains("@binding(3) var<storage, read> in_x"));
        assert!(src.contains("@binding(4) var<storage, read> in_gy"));
        assert!(src.contains("let value = scalars[0];"));
        assert!(src.contains("@workgroup_size(64)"));
        assert!(src.contains("fn powf("));
    }

    #[test]
    fn test_shader_without_scalars() {
        const ADD: Kernel = kernel!("add", |x0, x1| host: x0 + x1, device: "x0 + x1");
        let src = shader_source(&ADD, "aa", 256);
        assert!(!src.contains("scalars"));
        assert!(src.contains("@binding(2) var<storage, read> in_x0"));
        assert!(src.contains("dst[i] = (x0 + x1);"));
        assert!(!src.contains("fn powf("));
    }

    #[test]
    fn test_dispatch_size_spills_into_second_dimension() {
        assert_eq!(dispatch_size(1, 256), (1, 1, 256));
        assert_eq!(dispatch_size(1000, 256), (4, 1, 1024));
        let (x, y, row) = dispatch_size(70_000 * 256, 256);
        assert_eq!(x, MAX_GROUPS_PER_DIM);
        assert_eq!(y, 2);
        assert!((x as usize * y as usize) * 256 >= 70_000 * 256);
        assert_eq!(row, MAX_GROUPS_PER_DIM * 256);
    }
}

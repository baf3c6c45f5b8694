//! GPU tessellation of bundled edge tubes (wgpu compute)
//!
//! Enabled with the `gpu` feature. [`SplineCompute`] implements
//! [`crate::mesh::MeshKernel`] with the same math as the CPU kernel, so the
//! two are interchangeable behind the trait.
//!
//! ```rust,ignore
//! use graphdome::gpu::SplineCompute;
//! use graphdome::mesh::MeshKernel;
//!
//! let kernel = SplineCompute::new()?;
//! let vertices = kernel.compute(scene.batch(RenderGroup::Default), &scene.uniforms());
//! ```

mod compute;
mod shaders;

pub use compute::{GpuError, SplineCompute};
pub use shaders::spline_mesh_shader;

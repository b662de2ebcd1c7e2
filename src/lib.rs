// SPDX-License-Identifier: LGPL-3.0-or-later OR MPL-2.0
// This file is a part of `airhockey-hardware`.
//
// `airhockey-hardware` is free software: you can redistribute it and/or modify it under the
// terms of either:
//
// * GNU Lesser General Public License as published by the Free Software Foundation, either
//   version 3 of the License, or (at your option) any later version.
// * Mozilla Public License as published by the Mozilla Foundation, version 2.
//
// `airhockey-hardware` is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR
// PURPOSE. See the GNU Lesser General Public License or the Mozilla Public License for more
// details.
//
// You should have received a copy of the GNU Lesser General Public License and the Mozilla
// Public License along with `airhockey-hardware`. If not, see <https://www.gnu.org/licenses/>.

//! Shader program management and render-state lifecycle for drawing an air hockey table.
//!
//! This crate compiles and links a pair of shaders, binds a fixed set of 2D vertices to the
//! program's position attribute, and clears (and optionally draws) every frame. It does not
//! talk to a GPU itself.
//!
//! To use, implement the [`GpuContext`] trait on a type that represents an active driver
//! context, or use the one in `airhockey-glow`. Create a [`RenderPipeline`] with a
//! [`ShaderSource`] and a [`PipelineConfig`], then forward the three surface callbacks to
//! it: [`on_surface_created`], [`on_surface_changed`] and [`on_draw_frame`].
//!
//! The pipeline is a thin executor around [`lifecycle::transition`], a pure function that
//! maps a state and a surface event to the next state and a list of effects. The
//! [`headless`] module provides a software context for running the whole thing without a
//! GPU.
//!
//! Everything here is meant to be used from a single thread. GPU objects are owned through
//! [`Shader`], [`Program`] and [`VertexBuffer`] handles that must be explicitly released or,
//! once their context is gone, abandoned.
//!
//! [`on_surface_created`]: RenderPipeline::on_surface_created
//! [`on_surface_changed`]: RenderPipeline::on_surface_changed
//! [`on_draw_frame`]: RenderPipeline::on_draw_frame

#![forbid(unsafe_code, rust_2018_idioms)]

pub use piet;

mod config;
mod error;
mod geometry;
mod gpu_backend;
mod pipeline;
mod resources;
mod shader;
mod source;

pub mod headless;
pub mod lifecycle;

pub use self::config::{Diagnostics, PipelineConfig, COLOR_UNIFORM, POSITION_ATTRIBUTE};
pub use self::error::{Error, ErrorKind, GeometryError, SourceError};
pub use self::geometry::{
    DrawCommand, GeometryBuffer, Position, VertexRange, POSITION_COMPONENT_COUNT,
};
pub use self::gpu_backend::{AttributeLayout, GpuContext, Primitive, ShaderStage, Viewport};
pub use self::pipeline::RenderPipeline;
pub use self::resources::{AttributeLocation, Program, Shader, UniformLocation, VertexBuffer};
pub use self::shader::{ProgramLinker, ProgramValidator, ShaderCompiler};
pub use self::source::{
    DirectorySources, ShaderSource, StaticSources, DEFAULT_FRAGMENT_SHADER,
    DEFAULT_VERTEX_SHADER,
};

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

//! Defines the GPU backend for airhockey-hardware.

use std::error::Error;
use std::fmt;

/// The backend for the GPU renderer.
///
/// Every method is a synchronous round-trip to the driver. Implementations wrap a single
/// driver context and are expected to be used from one thread only; none of the
/// implementations in this repository are `Sync`.
pub trait GpuContext {
    /// The type associated with a compiled shader stage.
    type Shader: Copy + fmt::Debug + PartialEq;

    /// The type associated with a linked shader program.
    type Program: Copy + fmt::Debug + PartialEq;

    /// The type associated with a resolved uniform slot.
    type UniformLocation: Clone + fmt::Debug;

    /// The type associated with a GPU vertex buffer.
    ///
    /// Contains the vertex data and any layout data the backend needs to feed it into
    /// attributes.
    type VertexBuffer;

    /// The error type associated with this GPU context.
    type Error: Error + Send + Sync + 'static;

    /// Create a new, empty shader object for the given stage.
    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, Self::Error>;

    /// Delete a shader object.
    fn delete_shader(&self, shader: Self::Shader);

    /// Replace the source code held by a shader object.
    fn shader_source(&self, shader: Self::Shader, source: &str);

    /// Compile the source code held by a shader object.
    fn compile_shader(&self, shader: Self::Shader);

    /// Whether the last compilation of this shader succeeded.
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;

    /// Get the driver's information log for a shader.
    fn shader_info_log(&self, shader: Self::Shader) -> String;

    /// Create a new, empty program object.
    fn create_program(&self) -> Result<Self::Program, Self::Error>;

    /// Delete a program object.
    fn delete_program(&self, program: Self::Program);

    /// Attach a shader to a program.
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);

    /// Detach a shader from a program.
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);

    /// Link the shaders attached to a program.
    fn link_program(&self, program: Self::Program);

    /// Whether the last link of this program succeeded.
    fn program_link_status(&self, program: Self::Program) -> bool;

    /// Validate a program against the current driver state and return the result.
    fn validate_program(&self, program: Self::Program) -> bool;

    /// Get the driver's information log for a program.
    fn program_info_log(&self, program: Self::Program) -> String;

    /// Make a program current, or unbind the current program.
    fn use_program(&self, program: Option<Self::Program>);

    /// Look up the location of a vertex attribute by name.
    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32>;

    /// Look up the location of a uniform by name.
    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;

    /// Create a new vertex buffer holding `data`.
    ///
    /// The bytes are already in the platform's native scalar order.
    fn create_vertex_buffer(&self, data: &[u8]) -> Result<Self::VertexBuffer, Self::Error>;

    /// Delete a vertex buffer.
    fn delete_vertex_buffer(&self, buffer: Self::VertexBuffer);

    /// Tell the driver where the attribute at `location` reads its data from.
    fn vertex_attribute_pointer(
        &self,
        buffer: &Self::VertexBuffer,
        location: u32,
        layout: AttributeLayout,
    );

    /// Enable the attribute array at `location`.
    fn enable_vertex_attribute(&self, buffer: &Self::VertexBuffer, location: u32);

    /// Write a color into a `vec4` uniform of the current program.
    fn uniform_color(&self, location: &Self::UniformLocation, color: piet::Color);

    /// Set the color used when clearing the color buffer.
    fn set_clear_color(&self, color: piet::Color);

    /// Clear the color buffer.
    fn clear(&self);

    /// Set the viewport.
    fn viewport(&self, viewport: Viewport);

    /// Draw a range of vertices from `buffer` with the current program.
    fn draw_arrays(
        &self,
        buffer: &Self::VertexBuffer,
        primitive: Primitive,
        first: u32,
        count: u32,
    );
}

impl<C: GpuContext + ?Sized> GpuContext for &C {
    type Shader = C::Shader;
    type Program = C::Program;
    type UniformLocation = C::UniformLocation;
    type VertexBuffer = C::VertexBuffer;
    type Error = C::Error;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, Self::Error> {
        (**self).create_shader(stage)
    }

    fn delete_shader(&self, shader: Self::Shader) {
        (**self).delete_shader(shader)
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        (**self).shader_source(shader, source)
    }

    fn compile_shader(&self, shader: Self::Shader) {
        (**self).compile_shader(shader)
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        (**self).shader_compile_status(shader)
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        (**self).shader_info_log(shader)
    }

    fn create_program(&self) -> Result<Self::Program, Self::Error> {
        (**self).create_program()
    }

    fn delete_program(&self, program: Self::Program) {
        (**self).delete_program(program)
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        (**self).attach_shader(program, shader)
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        (**self).detach_shader(program, shader)
    }

    fn link_program(&self, program: Self::Program) {
        (**self).link_program(program)
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        (**self).program_link_status(program)
    }

    fn validate_program(&self, program: Self::Program) -> bool {
        (**self).validate_program(program)
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        (**self).program_info_log(program)
    }

    fn use_program(&self, program: Option<Self::Program>) {
        (**self).use_program(program)
    }

    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        (**self).attribute_location(program, name)
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        (**self).uniform_location(program, name)
    }

    fn create_vertex_buffer(&self, data: &[u8]) -> Result<Self::VertexBuffer, Self::Error> {
        (**self).create_vertex_buffer(data)
    }

    fn delete_vertex_buffer(&self, buffer: Self::VertexBuffer) {
        (**self).delete_vertex_buffer(buffer)
    }

    fn vertex_attribute_pointer(
        &self,
        buffer: &Self::VertexBuffer,
        location: u32,
        layout: AttributeLayout,
    ) {
        (**self).vertex_attribute_pointer(buffer, location, layout)
    }

    fn enable_vertex_attribute(&self, buffer: &Self::VertexBuffer, location: u32) {
        (**self).enable_vertex_attribute(buffer, location)
    }

    fn uniform_color(&self, location: &Self::UniformLocation, color: piet::Color) {
        (**self).uniform_color(location, color)
    }

    fn set_clear_color(&self, color: piet::Color) {
        (**self).set_clear_color(color)
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn viewport(&self, viewport: Viewport) {
        (**self).viewport(viewport)
    }

    fn draw_arrays(
        &self,
        buffer: &Self::VertexBuffer,
        primitive: Primitive,
        first: u32,
        count: u32,
    ) {
        (**self).draw_arrays(buffer, primitive, first, count)
    }
}

/// One of the two programmable pipeline stages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShaderStage {
    /// The stage that runs once per vertex.
    Vertex,

    /// The stage that runs once per fragment.
    Fragment,
}

impl ShaderStage {
    /// Both stages, in the order they are attached to a program.
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    /// A lowercase name for this stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Describes how a vertex attribute reads `f32` components out of a vertex buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AttributeLayout {
    /// The number of components per vertex.
    pub components: u32,

    /// The distance in bytes between the starts of two consecutive records.
    pub stride: u32,

    /// The offset in bytes of the first record.
    pub offset: u32,
}

/// The kind of primitive to assemble vertices into.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Primitive {
    /// Every three vertices form a triangle.
    Triangles,

    /// Every two vertices form a line segment.
    Lines,

    /// Every vertex is a point.
    Points,
}

/// The rectangle of the surface that clip space is mapped onto, in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// The left edge.
    pub x: i32,

    /// The bottom edge.
    pub y: i32,

    /// The width.
    pub width: u32,

    /// The height.
    pub height: u32,
}

impl Viewport {
    /// A viewport that covers a whole surface of the given size.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

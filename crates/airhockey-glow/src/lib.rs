// SPDX-License-Identifier: LGPL-3.0-or-later OR MPL-2.0
// This file is a part of `airhockey-glow`.
//
// `airhockey-glow` is free software: you can redistribute it and/or modify it under the
// terms of either:
//
// * GNU Lesser General Public License as published by the Free Software Foundation, either
//   version 3 of the License, or (at your option) any later version.
// * Mozilla Public License as published by the Mozilla Foundation, version 2.
//
// `airhockey-glow` is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR
// PURPOSE. See the GNU Lesser General Public License or the Mozilla Public License for more
// details.
//
// You should have received a copy of the GNU Lesser General Public License and the Mozilla
// Public License along with `airhockey-glow`. If not, see <https://www.gnu.org/licenses/>.

//! An OpenGL backend for `airhockey-hardware` that uses the [`glow`] crate.
//!
//! Shader sources are written without a `#version` line. [`GlContext`] prepends the right
//! header for the context it wraps: GLSL 3.30 core on desktop, GLSL ES 3.00 otherwise.
//!
//! [`glow`]: https://crates.io/crates/glow

use airhockey_hardware::piet::Color;
use airhockey_hardware::{AttributeLayout, Primitive, ShaderStage, Viewport};

use glow::HasContext;

use std::fmt;

/// A wrapper around a current `glow` context.
pub struct GlContext<H: HasContext + ?Sized> {
    /// Prepended to every shader source.
    shader_header: &'static str,

    /// The underlying context.
    context: H,
}

impl<H: HasContext + ?Sized> fmt::Debug for GlContext<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlContext")
            .field("shader_header", &self.shader_header)
            .finish_non_exhaustive()
    }
}

impl<H: HasContext> GlContext<H> {
    /// Wrap a `glow` context.
    ///
    /// # Safety
    ///
    /// The context must be current while this object and anything created through it is
    /// used.
    pub unsafe fn new(context: H) -> Result<Self, GlError> {
        let version = context.version();
        tracing::debug!("OpenGL version: {:?}", version);

        let has_supported_version = if version.is_embedded {
            version.major >= 3
        } else {
            version.major >= 4 || (version.major >= 3 && version.minor >= 3)
        };

        if !has_supported_version {
            return Err(GlError(
                "OpenGL version 3.3 (or 3.0 ES) or higher is required".into(),
            ));
        }

        let shader_header = if version.is_embedded {
            "#version 300 es\nprecision mediump float;\n"
        } else {
            // Desktop contexts ignore `gl_PointSize` unless asked not to.
            context.enable(glow::PROGRAM_POINT_SIZE);
            "#version 330 core\n"
        };

        Ok(Self {
            shader_header,
            context,
        })
    }

    /// Unwrap the underlying context.
    pub fn into_inner(self) -> H {
        self.context
    }
}

impl<H: HasContext + ?Sized> GlContext<H> {
    /// Get a reference to the underlying context.
    pub fn context(&self) -> &H {
        &self.context
    }

    fn bind_vertex_buffer(&self, buffer: &GlVertexBuffer<H>) -> CallOnDrop<impl FnMut() + '_> {
        unsafe {
            self.context.bind_vertex_array(Some(buffer.vao));
            self.context.bind_buffer(glow::ARRAY_BUFFER, Some(buffer.vbo));
        }

        CallOnDrop(move || unsafe {
            self.context.bind_buffer(glow::ARRAY_BUFFER, None);
            self.context.bind_vertex_array(None);
        })
    }
}

/// A wrapper around a `glow` vertex buffer.
pub struct GlVertexBuffer<H: HasContext + ?Sized> {
    /// The buffer holding the vertex data.
    vbo: H::Buffer,

    /// The vertex array object recording the attribute layout.
    vao: H::VertexArray,
}

impl<H: HasContext + ?Sized> fmt::Debug for GlVertexBuffer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlVertexBuffer")
            .field("vbo", &self.vbo)
            .field("vao", &self.vao)
            .finish()
    }
}

/// An error reported by the OpenGL driver.
#[derive(Debug)]
pub struct GlError(String);

impl From<String> for GlError {
    fn from(s: String) -> Self {
        GlError(s)
    }
}

impl fmt::Display for GlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gl error: {}", self.0)
    }
}

impl std::error::Error for GlError {}

impl<H: HasContext + ?Sized> airhockey_hardware::GpuContext for GlContext<H> {
    type Shader = H::Shader;
    type Program = H::Program;
    type UniformLocation = H::UniformLocation;
    type VertexBuffer = GlVertexBuffer<H>;
    type Error = GlError;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, Self::Error> {
        let shader_type = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };

        unsafe { self.context.create_shader(shader_type).gl_err() }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe {
            self.context.delete_shader(shader);
        }
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        let source = format!("{}{}", self.shader_header, source);

        unsafe {
            self.context.shader_source(shader, &source);
        }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        unsafe {
            self.context.compile_shader(shader);
        }

        gl_error(&self.context);
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { self.context.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.context.get_shader_info_log(shader) }
    }

    fn create_program(&self) -> Result<Self::Program, Self::Error> {
        unsafe { self.context.create_program().gl_err() }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe {
            self.context.delete_program(program);
        }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe {
            self.context.attach_shader(program, shader);
        }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe {
            self.context.detach_shader(program, shader);
        }
    }

    fn link_program(&self, program: Self::Program) {
        unsafe {
            self.context.link_program(program);
        }

        gl_error(&self.context);
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        unsafe { self.context.get_program_link_status(program) }
    }

    fn validate_program(&self, program: Self::Program) -> bool {
        unsafe {
            self.context.validate_program(program);
            self.context.get_program_validate_status(program)
        }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.context.get_program_info_log(program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe {
            self.context.use_program(program);
        }
    }

    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.context.get_attrib_location(program, name) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.context.get_uniform_location(program, name) }
    }

    fn create_vertex_buffer(&self, data: &[u8]) -> Result<Self::VertexBuffer, Self::Error> {
        unsafe {
            let vbo = self.context.create_buffer().gl_err()?;
            let _delete_vbo = CallOnDrop(|| self.context.delete_buffer(vbo));

            let vao = self.context.create_vertex_array().gl_err()?;
            let buffer = GlVertexBuffer { vbo, vao };

            {
                let _unbind = self.bind_vertex_buffer(&buffer);
                self.context
                    .buffer_data_u8_slice(glow::ARRAY_BUFFER, data, glow::STATIC_DRAW);
            }

            gl_error(&self.context);

            std::mem::forget(_delete_vbo);
            Ok(buffer)
        }
    }

    fn delete_vertex_buffer(&self, buffer: Self::VertexBuffer) {
        unsafe {
            self.context.delete_vertex_array(buffer.vao);
            self.context.delete_buffer(buffer.vbo);
        }
    }

    fn vertex_attribute_pointer(
        &self,
        buffer: &Self::VertexBuffer,
        location: u32,
        layout: AttributeLayout,
    ) {
        let _unbind = self.bind_vertex_buffer(buffer);

        unsafe {
            self.context.vertex_attrib_pointer_f32(
                location,
                layout.components as i32,
                glow::FLOAT,
                false,
                layout.stride as i32,
                layout.offset as i32,
            );
        }

        gl_error(&self.context);
    }

    fn enable_vertex_attribute(&self, buffer: &Self::VertexBuffer, location: u32) {
        let _unbind = self.bind_vertex_buffer(buffer);

        unsafe {
            self.context.enable_vertex_attrib_array(location);
        }
    }

    fn uniform_color(&self, location: &Self::UniformLocation, color: Color) {
        let (r, g, b, a) = color.as_rgba();

        unsafe {
            self.context
                .uniform_4_f32(Some(location), r as f32, g as f32, b as f32, a as f32);
        }
    }

    fn set_clear_color(&self, color: Color) {
        let (r, g, b, a) = color.as_rgba();

        unsafe {
            self.context
                .clear_color(r as f32, g as f32, b as f32, a as f32);
        }
    }

    fn clear(&self) {
        unsafe {
            self.context.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn viewport(&self, viewport: Viewport) {
        unsafe {
            self.context.viewport(
                viewport.x,
                viewport.y,
                viewport.width as i32,
                viewport.height as i32,
            );
        }
    }

    fn draw_arrays(
        &self,
        buffer: &Self::VertexBuffer,
        primitive: Primitive,
        first: u32,
        count: u32,
    ) {
        let mode = match primitive {
            Primitive::Triangles => glow::TRIANGLES,
            Primitive::Lines => glow::LINES,
            Primitive::Points => glow::POINTS,
            _ => {
                tracing::error!("unsupported primitive: {primitive:?}");
                return;
            }
        };

        let _unbind = self.bind_vertex_buffer(buffer);

        unsafe {
            self.context.draw_arrays(mode, first as i32, count as i32);
        }

        gl_error(&self.context);
    }
}

fn gl_error(h: &(impl HasContext + ?Sized)) {
    let err = unsafe { h.get_error() };

    if err != glow::NO_ERROR {
        let error_str = match err {
            glow::INVALID_ENUM => "GL_INVALID_ENUM",
            glow::INVALID_VALUE => "GL_INVALID_VALUE",
            glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
            glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
            glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
            glow::CONTEXT_LOST => "GL_CONTEXT_LOST",
            _ => "Unknown GL error",
        };

        tracing::error!("GL error: {}", error_str)
    }
}

trait ResultExt<T, E> {
    fn gl_err(self) -> Result<T, GlError>;
}

impl<T, E: Into<GlError>> ResultExt<T, E> for Result<T, E> {
    fn gl_err(self) -> Result<T, GlError> {
        self.map_err(Into::into)
    }
}

struct CallOnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for CallOnDrop<F> {
    fn drop(&mut self) {
        (self.0)();
    }
}

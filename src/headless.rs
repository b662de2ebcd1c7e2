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

//! A software [`GpuContext`] that needs no GPU.
//!
//! [`HeadlessContext`] keeps object tables the way a GL driver does, compiles a small
//! subset of GLSL, and models the framebuffer as a single clear color plus a list of draw
//! calls. Every call is logged, and calls that a real driver would reject with an error
//! are recorded in [`errors`](HeadlessContext::errors) instead of being carried out.
//!
//! A fresh `HeadlessContext` stands in for a context recreated after context loss: it
//! knows nothing about objects created in any other instance.

mod glsl;

use super::gpu_backend::{AttributeLayout, GpuContext, Primitive, ShaderStage, Viewport};

use ahash::RandomState;
use hashbrown::HashMap;

use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroU32;

macro_rules! define_names {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
            pub struct $name(NonZeroU32);

            impl $name {
                /// The object's name in its context.
                pub fn name(self) -> u32 {
                    self.0.get()
                }
            }
        )*
    };
}

define_names! {
    /// A shader object in a [`HeadlessContext`].
    HeadlessShader,

    /// A program object in a [`HeadlessContext`].
    HeadlessProgram,

    /// A vertex buffer in a [`HeadlessContext`].
    HeadlessBuffer,
}

/// A uniform slot in a linked [`HeadlessProgram`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HeadlessUniform {
    program: HeadlessProgram,
    index: u32,
}

impl HeadlessUniform {
    /// The program this location was resolved against.
    pub fn program(self) -> HeadlessProgram {
        self.program
    }

    /// The uniform's index in the program.
    pub fn index(self) -> u32 {
        self.index
    }
}

/// The error returned when the context refuses to create an object.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeadlessError {
    /// The configured object limit has been reached.
    ObjectLimit {
        /// The number of live objects allowed.
        limit: usize,
    },
}

impl fmt::Display for HeadlessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadlessError::ObjectLimit { limit } => {
                write!(f, "out of memory: the limit of {limit} live objects was reached")
            }
        }
    }
}

impl std::error::Error for HeadlessError {}

/// A driver call that changed state or fetched a log.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Call {
    /// A shader object was created for a stage.
    CreateShader(ShaderStage),
    /// A shader was flagged for deletion.
    DeleteShader(HeadlessShader),
    /// Source text was attached to a shader.
    ShaderSource(HeadlessShader),
    /// A shader was compiled.
    CompileShader(HeadlessShader),
    /// A shader's info log was fetched.
    ShaderInfoLog(HeadlessShader),
    /// A program object was created.
    CreateProgram,
    /// A program was deleted.
    DeleteProgram(HeadlessProgram),
    /// A shader was attached to a program.
    AttachShader(HeadlessProgram, HeadlessShader),
    /// A shader was detached from a program.
    DetachShader(HeadlessProgram, HeadlessShader),
    /// A program was linked.
    LinkProgram(HeadlessProgram),
    /// A program was validated against the current state.
    ValidateProgram(HeadlessProgram),
    /// A program's info log was fetched.
    ProgramInfoLog(HeadlessProgram),
    /// The current program changed.
    UseProgram(Option<HeadlessProgram>),
    /// A vertex buffer was created and filled.
    CreateVertexBuffer {
        /// The number of bytes uploaded.
        len: usize,
    },
    /// A vertex buffer was deleted.
    DeleteVertexBuffer(HeadlessBuffer),
    /// An attribute was pointed at a vertex buffer.
    VertexAttributePointer {
        /// The attribute index.
        location: u32,
        /// How the attribute reads the buffer.
        layout: AttributeLayout,
    },
    /// An attribute array was enabled.
    EnableVertexAttribute {
        /// The attribute index.
        location: u32,
    },
    /// A color uniform was set.
    UniformColor(HeadlessUniform, piet::Color),
    /// The clear color changed.
    SetClearColor(piet::Color),
    /// The color buffer was cleared.
    Clear,
    /// The viewport changed.
    Viewport(Viewport),
    /// Vertices were drawn from the bound buffer.
    DrawArrays {
        /// How the vertices are assembled.
        primitive: Primitive,
        /// The first vertex drawn.
        first: u32,
        /// The number of vertices drawn.
        count: u32,
    },
}

/// Where an attribute reads its data from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttributeBinding {
    /// The buffer the data lives in.
    pub buffer: HeadlessBuffer,

    /// How the data is laid out.
    pub layout: AttributeLayout,

    /// Whether the attribute array is enabled.
    pub enabled: bool,
}

/// A draw call that reached the framebuffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// The program that was current.
    pub program: HeadlessProgram,

    /// The buffer the vertices came from.
    pub buffer: HeadlessBuffer,

    /// How the vertices were assembled.
    pub primitive: Primitive,

    /// The first vertex.
    pub first: u32,

    /// The number of vertices.
    pub count: u32,

    /// The values of the program's uniforms at the time of the call.
    pub uniforms: Vec<(String, piet::Color)>,
}

impl DrawCall {
    /// The value the named uniform had when this call was made.
    pub fn uniform(&self, name: &str) -> Option<piet::Color> {
        self.uniforms
            .iter()
            .find(|(uniform, _)| uniform == name)
            .map(|&(_, color)| color)
    }
}

struct ShaderObject {
    stage: ShaderStage,
    source: String,
    interface: Option<glsl::Interface>,
    info_log: String,
    attachments: usize,
    delete_pending: bool,
}

struct ProgramObject {
    attached: Vec<HeadlessShader>,
    linked: Option<glsl::Linked>,
    info_log: String,
    uniform_values: HashMap<u32, piet::Color, RandomState>,
}

struct State {
    next_name: u32,
    shaders: HashMap<HeadlessShader, ShaderObject, RandomState>,
    programs: HashMap<HeadlessProgram, ProgramObject, RandomState>,
    buffers: HashMap<HeadlessBuffer, Box<[u8]>, RandomState>,
    attributes: HashMap<u32, AttributeBinding, RandomState>,
    current_program: Option<HeadlessProgram>,
    clear_color: piet::Color,
    color_buffer: Option<piet::Color>,
    viewport: Viewport,
    draw_calls: Vec<DrawCall>,
    calls: Vec<Call>,
    errors: Vec<String>,
}

impl State {
    fn live_objects(&self) -> usize {
        self.shaders.len() + self.programs.len() + self.buffers.len()
    }

    fn error(&mut self, message: String) {
        tracing::trace!("headless driver error: {message}");
        self.errors.push(message);
    }

    fn remove_shader_if_orphaned(&mut self, shader: HeadlessShader) {
        let orphaned = self
            .shaders
            .get(&shader)
            .map_or(false, |object| object.delete_pending && object.attachments == 0);

        if orphaned {
            self.shaders.remove(&shader);
        }
    }
}

/// A [`GpuContext`] implemented in software.
pub struct HeadlessContext {
    state: RefCell<State>,
    object_limit: Option<usize>,
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeadlessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HeadlessContext")
            .field("shaders", &state.shaders.len())
            .field("programs", &state.programs.len())
            .field("buffers", &state.buffers.len())
            .field("object_limit", &self.object_limit)
            .finish_non_exhaustive()
    }
}

impl HeadlessContext {
    /// Create a new, empty context.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                next_name: 1,
                shaders: HashMap::with_hasher(RandomState::new()),
                programs: HashMap::with_hasher(RandomState::new()),
                buffers: HashMap::with_hasher(RandomState::new()),
                attributes: HashMap::with_hasher(RandomState::new()),
                current_program: None,
                clear_color: piet::Color::rgba(0.0, 0.0, 0.0, 0.0),
                color_buffer: None,
                viewport: Viewport::default(),
                draw_calls: Vec::new(),
                calls: Vec::new(),
                errors: Vec::new(),
            }),
            object_limit: None,
        }
    }

    /// Refuse to create objects once `limit` shaders, programs and buffers are alive.
    pub fn with_object_limit(mut self, limit: usize) -> Self {
        self.object_limit = Some(limit);
        self
    }

    /// The number of shader objects that have not been deleted.
    ///
    /// Shaders flagged for deletion while still attached count until they are detached.
    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    /// The number of program objects that have not been deleted.
    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    /// The number of vertex buffers that have not been deleted.
    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Descriptions of the calls a real driver would have rejected.
    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors.clone()
    }

    /// The color the framebuffer was last cleared to, if it has been cleared.
    pub fn color_buffer(&self) -> Option<piet::Color> {
        self.state.borrow().color_buffer
    }

    /// The current viewport.
    pub fn current_viewport(&self) -> Viewport {
        self.state.borrow().viewport
    }

    /// The draw calls made since the framebuffer was last cleared.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state.borrow().draw_calls.clone()
    }

    /// The binding of the attribute at `location`, if one was set.
    pub fn attribute(&self, location: u32) -> Option<AttributeBinding> {
        self.state.borrow().attributes.get(&location).copied()
    }

    /// The contents of a live vertex buffer.
    pub fn buffer_data(&self, buffer: HeadlessBuffer) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).map(|data| data.to_vec())
    }

    /// The program that is current, if any.
    pub fn current_program(&self) -> Option<HeadlessProgram> {
        self.state.borrow().current_program
    }

    fn allocate(&self, state: &mut State) -> Result<NonZeroU32, HeadlessError> {
        if let Some(limit) = self.object_limit {
            if state.live_objects() >= limit {
                return Err(HeadlessError::ObjectLimit { limit });
            }
        }

        let name = NonZeroU32::new(state.next_name).ok_or(HeadlessError::ObjectLimit {
            limit: u32::MAX as usize,
        })?;
        state.next_name = state.next_name.wrapping_add(1);
        Ok(name)
    }

    fn record(&self, call: Call) -> std::cell::RefMut<'_, State> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        state
    }
}

impl GpuContext for HeadlessContext {
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type UniformLocation = HeadlessUniform;
    type VertexBuffer = HeadlessBuffer;
    type Error = HeadlessError;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, Self::Error> {
        let mut state = self.record(Call::CreateShader(stage));
        let shader = HeadlessShader(self.allocate(&mut state)?);

        state.shaders.insert(
            shader,
            ShaderObject {
                stage,
                source: String::new(),
                interface: None,
                info_log: String::new(),
                attachments: 0,
                delete_pending: false,
            },
        );

        Ok(shader)
    }

    fn delete_shader(&self, shader: Self::Shader) {
        let mut state = self.record(Call::DeleteShader(shader));

        match state.shaders.get_mut(&shader) {
            Some(object) if !object.delete_pending => object.delete_pending = true,
            _ => return state.error(format!("delete_shader: unknown shader {}", shader.name())),
        }

        state.remove_shader_if_orphaned(shader);
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        let mut state = self.record(Call::ShaderSource(shader));

        match state.shaders.get_mut(&shader) {
            Some(object) => object.source = source.to_owned(),
            None => state.error(format!("shader_source: unknown shader {}", shader.name())),
        }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        let mut state = self.record(Call::CompileShader(shader));

        let object = match state.shaders.get_mut(&shader) {
            Some(object) => object,
            None => {
                return state.error(format!("compile_shader: unknown shader {}", shader.name()))
            }
        };

        match glsl::compile(object.stage, &object.source) {
            Ok(interface) => {
                object.interface = Some(interface);
                object.info_log.clear();
            }
            Err(err) => {
                object.interface = None;
                object.info_log = format!("{err}\n");
            }
        }
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map_or(false, |object| object.interface.is_some())
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        let state = self.record(Call::ShaderInfoLog(shader));
        state
            .shaders
            .get(&shader)
            .map(|object| object.info_log.clone())
            .unwrap_or_default()
    }

    fn create_program(&self) -> Result<Self::Program, Self::Error> {
        let mut state = self.record(Call::CreateProgram);
        let program = HeadlessProgram(self.allocate(&mut state)?);

        state.programs.insert(
            program,
            ProgramObject {
                attached: Vec::new(),
                linked: None,
                info_log: String::new(),
                uniform_values: HashMap::with_hasher(RandomState::new()),
            },
        );

        Ok(program)
    }

    fn delete_program(&self, program: Self::Program) {
        let mut state = self.record(Call::DeleteProgram(program));

        let object = match state.programs.remove(&program) {
            Some(object) => object,
            None => {
                return state.error(format!("delete_program: unknown program {}", program.name()))
            }
        };

        if state.current_program == Some(program) {
            state.current_program = None;
        }

        for shader in object.attached {
            if let Some(shader_object) = state.shaders.get_mut(&shader) {
                shader_object.attachments -= 1;
            }
            state.remove_shader_if_orphaned(shader);
        }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        let mut state = self.record(Call::AttachShader(program, shader));

        let already_attached = match state.programs.get(&program) {
            Some(object) if state.shaders.contains_key(&shader) => {
                object.attached.contains(&shader)
            }
            _ => {
                return state.error(format!(
                    "attach_shader: unknown program {} or shader {}",
                    program.name(),
                    shader.name()
                ))
            }
        };

        if already_attached {
            return state.error(format!(
                "attach_shader: shader {} is already attached",
                shader.name()
            ));
        }

        if let Some(object) = state.programs.get_mut(&program) {
            object.attached.push(shader);
        }
        if let Some(object) = state.shaders.get_mut(&shader) {
            object.attachments += 1;
        }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        let mut state = self.record(Call::DetachShader(program, shader));

        let detached = state.programs.get_mut(&program).map_or(false, |object| {
            let before = object.attached.len();
            object.attached.retain(|&attached| attached != shader);
            object.attached.len() != before
        });

        if !detached {
            return state.error(format!(
                "detach_shader: shader {} is not attached to program {}",
                shader.name(),
                program.name()
            ));
        }

        if let Some(object) = state.shaders.get_mut(&shader) {
            object.attachments -= 1;
        }
        state.remove_shader_if_orphaned(shader);
    }

    fn link_program(&self, program: Self::Program) {
        let mut state = self.record(Call::LinkProgram(program));
        let state = &mut *state;

        let object = match state.programs.get_mut(&program) {
            Some(object) => object,
            None => {
                return state.error(format!("link_program: unknown program {}", program.name()))
            }
        };

        let mut vertex = Vec::new();
        let mut fragment = Vec::new();
        for shader in &object.attached {
            if let Some(shader_object) = state.shaders.get(shader) {
                match shader_object.stage {
                    ShaderStage::Vertex => vertex.push(shader_object),
                    ShaderStage::Fragment => fragment.push(shader_object),
                }
            }
        }

        object.uniform_values.clear();
        let result = match (vertex.as_slice(), fragment.as_slice()) {
            ([vertex], [fragment]) => match (&vertex.interface, &fragment.interface) {
                (Some(vertex), Some(fragment)) => glsl::link(vertex, fragment),
                _ => Err("error: linking with uncompiled shader\n".to_owned()),
            },
            _ => Err(
                "error: a program needs exactly one vertex and one fragment shader\n".to_owned(),
            ),
        };

        match result {
            Ok(linked) => {
                object.linked = Some(linked);
                object.info_log.clear();
            }
            Err(log) => {
                object.linked = None;
                object.info_log = log;
            }
        }
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map_or(false, |object| object.linked.is_some())
    }

    fn validate_program(&self, program: Self::Program) -> bool {
        let mut state = self.record(Call::ValidateProgram(program));

        match state.programs.get_mut(&program) {
            Some(object) => {
                let valid = object.linked.is_some();
                object.info_log = if valid {
                    "Validation successful.\n".to_owned()
                } else {
                    "error: program is not linked\n".to_owned()
                };
                valid
            }
            None => {
                state.error(format!("validate_program: unknown program {}", program.name()));
                false
            }
        }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        let state = self.record(Call::ProgramInfoLog(program));
        state
            .programs
            .get(&program)
            .map(|object| object.info_log.clone())
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<Self::Program>) {
        let mut state = self.record(Call::UseProgram(program));

        if let Some(program) = program {
            let linked = state
                .programs
                .get(&program)
                .map_or(false, |object| object.linked.is_some());

            if !linked {
                return state.error(format!(
                    "use_program: program {} does not exist or is not linked",
                    program.name()
                ));
            }
        }

        state.current_program = program;
    }

    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        let state = self.state.borrow();
        let linked = state.programs.get(&program)?.linked.as_ref()?;

        linked
            .attributes
            .iter()
            .position(|attribute| attribute.name == name)
            .map(|index| index as u32)
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        let state = self.state.borrow();
        let linked = state.programs.get(&program)?.linked.as_ref()?;

        linked
            .uniforms
            .iter()
            .position(|uniform| uniform.name == name)
            .map(|index| HeadlessUniform {
                program,
                index: index as u32,
            })
    }

    fn create_vertex_buffer(&self, data: &[u8]) -> Result<Self::VertexBuffer, Self::Error> {
        let mut state = self.record(Call::CreateVertexBuffer { len: data.len() });
        let buffer = HeadlessBuffer(self.allocate(&mut state)?);
        state.buffers.insert(buffer, data.into());
        Ok(buffer)
    }

    fn delete_vertex_buffer(&self, buffer: Self::VertexBuffer) {
        let mut state = self.record(Call::DeleteVertexBuffer(buffer));

        if state.buffers.remove(&buffer).is_none() {
            return state.error(format!(
                "delete_vertex_buffer: unknown buffer {}",
                buffer.name()
            ));
        }

        state.attributes.retain(|_, binding| binding.buffer != buffer);
    }

    fn vertex_attribute_pointer(
        &self,
        buffer: &Self::VertexBuffer,
        location: u32,
        layout: AttributeLayout,
    ) {
        let mut state = self.record(Call::VertexAttributePointer { location, layout });

        if !state.buffers.contains_key(buffer) {
            return state.error(format!(
                "vertex_attribute_pointer: unknown buffer {}",
                buffer.name()
            ));
        }

        if !(1..=4).contains(&layout.components) {
            return state.error(format!(
                "vertex_attribute_pointer: {} components",
                layout.components
            ));
        }

        let enabled = state
            .attributes
            .get(&location)
            .map_or(false, |binding| binding.enabled);
        state.attributes.insert(
            location,
            AttributeBinding {
                buffer: *buffer,
                layout,
                enabled,
            },
        );
    }

    fn enable_vertex_attribute(&self, buffer: &Self::VertexBuffer, location: u32) {
        let mut state = self.record(Call::EnableVertexAttribute { location });

        match state.attributes.get_mut(&location) {
            Some(binding) if binding.buffer == *buffer => binding.enabled = true,
            _ => state.error(format!(
                "enable_vertex_attribute: location {location} is not bound to buffer {}",
                buffer.name()
            )),
        }
    }

    fn uniform_color(&self, location: &Self::UniformLocation, color: piet::Color) {
        let mut state = self.record(Call::UniformColor(*location, color));

        if state.current_program != Some(location.program) {
            return state.error(format!(
                "uniform_color: program {} is not current",
                location.program.name()
            ));
        }

        let is_vec4 = state
            .programs
            .get(&location.program)
            .and_then(|object| object.linked.as_ref())
            .and_then(|linked| linked.uniforms.get(location.index as usize))
            .map_or(false, |uniform| uniform.ty == "vec4");

        if !is_vec4 {
            return state.error(format!(
                "uniform_color: uniform {} is not a vec4",
                location.index
            ));
        }

        if let Some(object) = state.programs.get_mut(&location.program) {
            object.uniform_values.insert(location.index, color);
        }
    }

    fn set_clear_color(&self, color: piet::Color) {
        let mut state = self.record(Call::SetClearColor(color));
        state.clear_color = color;
    }

    fn clear(&self) {
        let mut state = self.record(Call::Clear);
        state.color_buffer = Some(state.clear_color);
        state.draw_calls.clear();
    }

    fn viewport(&self, viewport: Viewport) {
        let mut state = self.record(Call::Viewport(viewport));
        state.viewport = viewport;
    }

    fn draw_arrays(
        &self,
        buffer: &Self::VertexBuffer,
        primitive: Primitive,
        first: u32,
        count: u32,
    ) {
        let mut state = self.record(Call::DrawArrays {
            primitive,
            first,
            count,
        });
        let state = &mut *state;

        let program = match state.current_program {
            Some(program) => program,
            None => return state.error("draw_arrays: no current program".to_owned()),
        };

        let len = match state.buffers.get(buffer) {
            Some(data) => data.len() as u64,
            None => {
                return state.error(format!("draw_arrays: unknown buffer {}", buffer.name()))
            }
        };

        let end = u64::from(first) + u64::from(count);
        let overrun = state
            .attributes
            .iter()
            .find(|(_, binding)| {
                let layout = binding.layout;
                let needed = end.saturating_sub(1) * u64::from(layout.stride)
                    + u64::from(layout.offset)
                    + u64::from(layout.components) * 4;

                count > 0 && binding.enabled && binding.buffer == *buffer && needed > len
            })
            .map(|(&location, _)| location);

        if let Some(location) = overrun {
            return state.error(format!(
                "draw_arrays: vertices {first}..{end} overrun attribute {location}"
            ));
        }

        let uniforms = state
            .programs
            .get(&program)
            .and_then(|object| {
                let linked = object.linked.as_ref()?;
                Some(
                    object
                        .uniform_values
                        .iter()
                        .filter_map(|(&index, &color)| {
                            let uniform = linked.uniforms.get(index as usize)?;
                            Some((uniform.name.clone(), color))
                        })
                        .collect(),
                )
            })
            .unwrap_or_default();

        state.draw_calls.push(DrawCall {
            program,
            buffer: *buffer,
            primitive,
            first,
            count,
            uniforms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};

    fn linked_program(ctx: &HeadlessContext) -> HeadlessProgram {
        let vertex = ctx.create_shader(ShaderStage::Vertex).unwrap();
        ctx.shader_source(vertex, DEFAULT_VERTEX_SHADER);
        ctx.compile_shader(vertex);

        let fragment = ctx.create_shader(ShaderStage::Fragment).unwrap();
        ctx.shader_source(fragment, DEFAULT_FRAGMENT_SHADER);
        ctx.compile_shader(fragment);

        let program = ctx.create_program().unwrap();
        ctx.attach_shader(program, vertex);
        ctx.attach_shader(program, fragment);
        ctx.link_program(program);
        assert!(ctx.program_link_status(program));

        ctx.delete_shader(vertex);
        ctx.delete_shader(fragment);
        program
    }

    #[test]
    fn deleting_an_attached_shader_is_deferred() {
        let ctx = HeadlessContext::new();
        let program = linked_program(&ctx);
        assert_eq!(ctx.live_shaders(), 2);

        ctx.delete_program(program);
        assert_eq!(ctx.live_shaders(), 0);
        assert_eq!(ctx.live_programs(), 0);
        assert!(ctx.errors().is_empty());
    }

    #[test]
    fn locations_follow_declaration_order() {
        let ctx = HeadlessContext::new();
        let program = linked_program(&ctx);

        assert_eq!(ctx.attribute_location(program, "a_Position"), Some(0));
        assert_eq!(ctx.attribute_location(program, "a_Missing"), None);
        assert_eq!(
            ctx.uniform_location(program, "u_Color").map(HeadlessUniform::index),
            Some(0)
        );
        assert_eq!(ctx.uniform_location(program, "u_Missing"), None);
    }

    #[test]
    fn object_limit_counts_live_objects() {
        let ctx = HeadlessContext::new().with_object_limit(1);
        let shader = ctx.create_shader(ShaderStage::Vertex).unwrap();
        assert_eq!(
            ctx.create_program(),
            Err(HeadlessError::ObjectLimit { limit: 1 })
        );

        ctx.delete_shader(shader);
        assert!(ctx.create_program().is_ok());
    }

    #[test]
    fn misuse_is_recorded_not_applied() {
        let ctx = HeadlessContext::new();
        let program = ctx.create_program().unwrap();

        ctx.use_program(Some(program));
        assert_eq!(ctx.current_program(), None);

        ctx.delete_program(program);
        ctx.delete_program(program);
        assert_eq!(ctx.errors().len(), 2);
    }

    #[test]
    fn draws_capture_uniforms_and_clears_reset_them() {
        let ctx = HeadlessContext::new();
        let program = linked_program(&ctx);
        let buffer = ctx.create_vertex_buffer(&[0; 16]).unwrap();
        let layout = AttributeLayout {
            components: 2,
            stride: 8,
            offset: 0,
        };

        ctx.use_program(Some(program));
        ctx.vertex_attribute_pointer(&buffer, 0, layout);
        ctx.enable_vertex_attribute(&buffer, 0);
        let color = ctx.uniform_location(program, "u_Color").unwrap();
        ctx.uniform_color(&color, piet::Color::BLUE);

        ctx.draw_arrays(&buffer, Primitive::Lines, 0, 2);
        ctx.draw_arrays(&buffer, Primitive::Points, 1, 2);
        assert_eq!(ctx.errors().len(), 1);

        let draws = ctx.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].uniform("u_Color"), Some(piet::Color::BLUE));

        ctx.set_clear_color(piet::Color::BLACK);
        ctx.clear();
        assert!(ctx.draw_calls().is_empty());
        assert_eq!(ctx.color_buffer(), Some(piet::Color::BLACK));
    }
}

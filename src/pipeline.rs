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

//! The render pipeline that ties everything together.

use super::config::PipelineConfig;
use super::error::Error;
use super::geometry::{DrawCommand, GeometryBuffer};
use super::gpu_backend::{GpuContext, ShaderStage, Viewport};
use super::lifecycle::{transition, Effect, Generation, LifecycleState, SurfaceEvent};
use super::resources::{AttributeLocation, Program, Shader, UniformLocation, VertexBuffer};
use super::shader::{ProgramLinker, ProgramValidator, ShaderCompiler};
use super::source::{ShaderSource, StaticSources};

use std::fmt;
use std::thread::{self, ThreadId};

/// Drives shader programs and render state through the surface lifecycle.
///
/// The surface owner calls [`on_surface_created`], [`on_surface_changed`] and
/// [`on_draw_frame`] in order, one at a time, from the thread that created the pipeline.
/// Every call takes the context to act on; after the surface is recreated the pipeline
/// only ever talks to the new context.
///
/// Compile and link failures never escape these callbacks. They are logged and leave the
/// pipeline without a program, so frames only clear until the next surface creation.
///
/// GPU objects are not released on drop. Call [`release`] while the context is still
/// alive.
///
/// [`on_surface_created`]: RenderPipeline::on_surface_created
/// [`on_surface_changed`]: RenderPipeline::on_surface_changed
/// [`on_draw_frame`]: RenderPipeline::on_draw_frame
/// [`release`]: RenderPipeline::release
pub struct RenderPipeline<C: GpuContext + ?Sized, S = StaticSources> {
    /// The configuration this pipeline was built with.
    config: PipelineConfig,

    /// Where shader source text comes from.
    sources: S,

    /// The vertex data uploaded for every generation.
    geometry: GeometryBuffer,

    compiler: ShaderCompiler,
    linker: ProgramLinker,
    validator: ProgramValidator,

    /// Where we are in the lifecycle.
    state: LifecycleState,

    /// The objects that belong to the current context generation.
    resources: Option<GenerationResources<C>>,

    /// The thread that is allowed to call into this pipeline.
    owner: ThreadId,
}

/// GPU objects and locations for a single context generation.
struct GenerationResources<C: GpuContext + ?Sized> {
    generation: Generation,
    program: Option<Program<C>>,
    vertex_buffer: Option<VertexBuffer<C>>,
    position: AttributeLocation,
    color: UniformLocation<C>,
}

impl<C: GpuContext + ?Sized> GenerationResources<C> {
    fn empty(generation: Generation) -> Self {
        Self {
            generation,
            program: None,
            vertex_buffer: None,
            position: AttributeLocation::INVALID,
            color: UniformLocation::INVALID,
        }
    }

    fn release(self, context: &C) {
        if let Some(program) = self.program {
            context.use_program(None);
            program.release(context);
        }

        if let Some(buffer) = self.vertex_buffer {
            buffer.release(context);
        }
    }

    fn abandon(self) {
        if let Some(program) = self.program {
            program.abandon();
        }

        if let Some(buffer) = self.vertex_buffer {
            buffer.abandon();
        }
    }
}

impl<C: GpuContext + ?Sized, S: fmt::Debug> fmt::Debug for RenderPipeline<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("config", &self.config)
            .field("sources", &self.sources)
            .field("state", &self.state)
            .field("program_valid", &self.is_program_valid())
            .finish_non_exhaustive()
    }
}

impl<C: GpuContext + ?Sized, S: ShaderSource> RenderPipeline<C, S> {
    /// Create a pipeline that draws the air hockey table.
    pub fn new(sources: S, config: PipelineConfig) -> Result<Self, Error> {
        Self::with_geometry(sources, GeometryBuffer::table(), config)
    }

    /// Create a pipeline that draws `geometry`.
    ///
    /// Fails with [`ErrorKind::InvalidInput`](crate::ErrorKind::InvalidInput) if a
    /// configured draw command reaches past the end of the geometry.
    pub fn with_geometry(
        sources: S,
        geometry: GeometryBuffer,
        config: PipelineConfig,
    ) -> Result<Self, Error> {
        check_draw_commands(&geometry, &config.draw_commands)?;

        let diagnostics = config.diagnostics;

        Ok(Self {
            sources,
            geometry,
            compiler: ShaderCompiler::new(diagnostics),
            linker: ProgramLinker::new(diagnostics),
            validator: ProgramValidator::new(diagnostics),
            config,
            state: LifecycleState::Uninitialized,
            resources: None,
            owner: thread::current().id(),
        })
    }

    /// The surface was created, or recreated after the previous context was lost.
    ///
    /// Objects from any earlier context are forgotten without being passed to `context`,
    /// and a new program is built from scratch. Only a failure to obtain shader source is
    /// returned as an error.
    pub fn on_surface_created(&mut self, context: &C) -> Result<(), Error> {
        self.handle_event(context, SurfaceEvent::Created)
    }

    /// The surface changed size.
    pub fn on_surface_changed(&mut self, context: &C, width: u32, height: u32) {
        self.handle_infallible(context, SurfaceEvent::Resized { width, height });
    }

    /// Draw a single frame.
    pub fn on_draw_frame(&mut self, context: &C) {
        self.handle_infallible(context, SurfaceEvent::DrawFrame);
    }

    /// Advance the lifecycle by `event` and carry out its effects against `context`.
    pub fn handle_event(&mut self, context: &C, event: SurfaceEvent) -> Result<(), Error> {
        self.assert_owner_thread();

        let (state, effects) = transition(self.state, event);
        if state != self.state {
            tracing::debug!("lifecycle: {:?} -> {:?}", self.state, state);
        }
        self.state = state;

        for effect in effects {
            self.apply(context, effect)?;
        }

        Ok(())
    }

    fn handle_infallible(&mut self, context: &C, event: SurfaceEvent) {
        if let Err(err) = self.handle_event(context, event) {
            tracing::error!("unexpected failure handling {event:?}: {err}");
        }
    }

    fn apply(&mut self, context: &C, effect: Effect) -> Result<(), Error> {
        match effect {
            Effect::DiscardGeneration { generation } => self.discard_generation(generation),
            Effect::BuildProgram { generation } => return self.build_program(context, generation),
            Effect::SetViewport(viewport) => self.set_viewport(context, viewport),
            Effect::ClearColorBuffer => {
                tracing::trace!("clearing color buffer");
                context.clear();
            }
            Effect::DrawGeometry => self.draw_geometry(context),
        }

        Ok(())
    }

    fn discard_generation(&mut self, generation: Generation) {
        if let Some(resources) = self.resources.take() {
            debug_assert_eq!(resources.generation, generation);
            resources.abandon();
            tracing::debug!("abandoned objects from context generation {generation}");
        }
    }

    fn build_program(&mut self, context: &C, generation: Generation) -> Result<(), Error> {
        // Even a pipeline that fails to build clears to the right color.
        context.set_clear_color(self.config.clear_color);
        self.resources = Some(GenerationResources::empty(generation));

        let vertex_source = self
            .sources
            .shader_source(ShaderStage::Vertex)
            .map_err(Error::source_unavailable)?;
        let fragment_source = self
            .sources
            .shader_source(ShaderStage::Fragment)
            .map_err(Error::source_unavailable)?;

        let program = match self.compile_and_link(context, &vertex_source, &fragment_source) {
            Ok(program) => program,
            Err(err) => {
                if self.config.diagnostics.is_enabled() {
                    tracing::warn!("no usable program for context generation {generation}: {err}");
                } else {
                    tracing::warn!("no usable program");
                }

                return Ok(());
            }
        };

        if self.config.diagnostics.is_enabled() {
            self.validator.validate(context, &program);
        }

        context.use_program(Some(program.handle()));

        let color = UniformLocation::resolve(context, &program, &self.config.color_uniform);
        let position =
            AttributeLocation::resolve(context, &program, &self.config.position_attribute);

        if self.config.diagnostics.is_enabled() {
            if !color.is_valid() {
                tracing::warn!("uniform `{}` not found in program", self.config.color_uniform);
            }

            if !position.is_valid() {
                tracing::warn!(
                    "attribute `{}` not found in program",
                    self.config.position_attribute
                );
            }
        }

        let vertex_buffer = match VertexBuffer::new(context, self.geometry.as_bytes()) {
            Ok(buffer) => Some(buffer),
            Err(err) => {
                if self.config.diagnostics.is_enabled() {
                    tracing::warn!("{}", Error::object_creation("vertex buffer", err));
                } else {
                    tracing::warn!("could not create vertex buffer object");
                }
                None
            }
        };

        if let (Some(buffer), Some(index)) = (&vertex_buffer, position.index()) {
            context.vertex_attribute_pointer(buffer.resource(), index, self.geometry.layout());
            context.enable_vertex_attribute(buffer.resource(), index);
        }

        tracing::debug!("built program for context generation {generation}");

        self.resources = Some(GenerationResources {
            generation,
            program: Some(program),
            vertex_buffer,
            position,
            color,
        });

        Ok(())
    }

    fn compile_and_link(
        &self,
        context: &C,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Program<C>, Error> {
        let vertex = self
            .compiler
            .compile(context, ShaderStage::Vertex, vertex_source);
        let fragment = self
            .compiler
            .compile(context, ShaderStage::Fragment, fragment_source);

        match (vertex, fragment) {
            (Ok(vertex), Ok(fragment)) => self.linker.link(context, vertex, fragment),
            (Ok(shader), Err(err)) | (Err(err), Ok(shader)) => {
                release_shader(context, shader);
                Err(err)
            }
            (Err(err), Err(_)) => Err(err),
        }
    }

    fn set_viewport(&self, context: &C, viewport: Viewport) {
        tracing::trace!("setting viewport to {}x{}", viewport.width, viewport.height);
        context.viewport(viewport);
    }

    fn draw_geometry(&self, context: &C) {
        let commands = &self.config.draw_commands;
        if commands.is_empty() {
            return;
        }

        let resources = match &self.resources {
            Some(resources) => resources,
            None => return,
        };

        let (program, buffer, color) = match (
            &resources.program,
            &resources.vertex_buffer,
            resources.color.get(),
        ) {
            (Some(program), Some(buffer), Some(color)) if resources.position.is_valid() => {
                (program, buffer, color)
            }
            _ => {
                tracing::trace!("skipping {} draw commands", commands.len());
                return;
            }
        };

        context.use_program(Some(program.handle()));

        for command in commands {
            context.uniform_color(color, command.color);
            context.draw_arrays(
                buffer.resource(),
                command.primitive,
                command.range.first,
                command.range.count,
            );
        }
    }

    /// Release the current generation's objects through `context`.
    ///
    /// `context` must be the live context the objects were created in. The pipeline goes
    /// back to its initial state and can be started again with
    /// [`on_surface_created`](RenderPipeline::on_surface_created).
    pub fn release(&mut self, context: &C) {
        self.assert_owner_thread();

        if let Some(resources) = self.resources.take() {
            let generation = resources.generation;
            resources.release(context);
            tracing::debug!("released objects from context generation {generation}");
        }

        self.state = LifecycleState::Uninitialized;
    }

    fn assert_owner_thread(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "RenderPipeline called from a thread other than the one that created it"
        );
    }
}

impl<C: GpuContext + ?Sized, S> RenderPipeline<C, S> {
    /// Where the pipeline is in its lifecycle.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The current context generation, if a surface exists.
    pub fn generation(&self) -> Option<Generation> {
        self.state.generation()
    }

    /// The current program, if the last surface creation produced one.
    pub fn program(&self) -> Option<&Program<C>> {
        self.resources.as_ref()?.program.as_ref()
    }

    /// Whether the current context has a linked program.
    pub fn is_program_valid(&self) -> bool {
        self.program().is_some()
    }

    /// The current vertex buffer, if one was created.
    pub fn vertex_buffer(&self) -> Option<&VertexBuffer<C>> {
        self.resources.as_ref()?.vertex_buffer.as_ref()
    }

    /// The location of the position attribute in the current program.
    pub fn position_location(&self) -> AttributeLocation {
        self.resources
            .as_ref()
            .map_or(AttributeLocation::INVALID, |resources| resources.position)
    }

    /// The location of the color uniform in the current program.
    pub fn color_location(&self) -> UniformLocation<C> {
        self.resources
            .as_ref()
            .map_or(UniformLocation::INVALID, |resources| resources.color.clone())
    }

    /// The geometry drawn by this pipeline.
    pub fn geometry(&self) -> &GeometryBuffer {
        &self.geometry
    }

    /// The configuration this pipeline was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The shader source provider.
    pub fn sources(&self) -> &S {
        &self.sources
    }
}

fn release_shader<C: GpuContext + ?Sized>(context: &C, shader: Shader<C>) {
    tracing::trace!("releasing {} shader after failed build", shader.stage());
    shader.release(context);
}

fn check_draw_commands(geometry: &GeometryBuffer, commands: &[DrawCommand]) -> Result<(), Error> {
    match commands.iter().find(|command| !geometry.contains(command.range)) {
        Some(command) => {
            tracing::error!(
                "draw command {:?} reaches past the {} vertices of the geometry",
                command.range,
                geometry.vertex_count()
            );
            Err(Error::invalid_input(
                "draw command range lies outside the geometry buffer",
            ))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geometry::VertexRange;
    use crate::gpu_backend::Primitive;
    use crate::headless::HeadlessContext;

    fn pipeline(config: PipelineConfig) -> RenderPipeline<HeadlessContext> {
        RenderPipeline::new(StaticSources::default(), config).unwrap()
    }

    #[test]
    fn out_of_range_commands_are_rejected() {
        let config = PipelineConfig::default().with_draw_commands([DrawCommand::new(
            Primitive::Points,
            VertexRange {
                first: 10,
                count: 1,
            },
            piet::Color::WHITE,
        )]);

        let err = RenderPipeline::<HeadlessContext>::new(StaticSources::default(), config)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn nothing_is_resolved_before_creation() {
        let pipeline = pipeline(PipelineConfig::default());
        assert!(!pipeline.is_program_valid());
        assert_eq!(pipeline.position_location().raw(), -1);
        assert!(!pipeline.color_location().is_valid());
        assert_eq!(pipeline.generation(), None);
    }

    #[test]
    fn the_geometry_is_bound_to_the_position_attribute() {
        let ctx = HeadlessContext::new();
        let mut pipeline = pipeline(PipelineConfig::default().with_diagnostics(true));
        pipeline.on_surface_created(&ctx).unwrap();

        let index = pipeline.position_location().index().unwrap();
        let binding = ctx.attribute(index).unwrap();
        assert!(binding.enabled);
        assert_eq!(binding.layout, pipeline.geometry().layout());
        assert_eq!(
            ctx.buffer_data(binding.buffer).as_deref(),
            Some(pipeline.geometry().as_bytes())
        );
    }

    #[test]
    fn release_deletes_everything() {
        let ctx = HeadlessContext::new();
        let mut pipeline = pipeline(PipelineConfig::default());
        pipeline.on_surface_created(&ctx).unwrap();
        assert_eq!(ctx.live_programs(), 1);
        assert_eq!(ctx.live_buffers(), 1);

        pipeline.release(&ctx);
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.live_buffers(), 0);
        assert_eq!(ctx.live_shaders(), 0);
        assert_eq!(pipeline.state(), LifecycleState::Uninitialized);
        assert!(ctx.errors().is_empty());
    }
}

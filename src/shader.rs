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

//! Compiling, linking and validating shader programs.

use super::config::Diagnostics;
use super::error::Error;
use super::gpu_backend::{GpuContext, ShaderStage};
use super::resources::{Program, Shader};

use std::mem;

/// Compiles a single shader stage from source text.
#[derive(Debug, Copy, Clone, Default)]
pub struct ShaderCompiler {
    diagnostics: Diagnostics,
}

impl ShaderCompiler {
    /// Create a new shader compiler.
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// Compile `source` into a shader object for `stage`.
    ///
    /// The source is not checked beforehand; the driver's compile status is the only
    /// judge. On failure the shader object is deleted before returning.
    pub fn compile<C: GpuContext + ?Sized>(
        &self,
        context: &C,
        stage: ShaderStage,
        source: &str,
    ) -> Result<Shader<C>, Error> {
        let shader = context
            .create_shader(stage)
            .map_err(|err| Error::object_creation("shader", err))?;
        let _call_on_drop = CallOnDrop(|| context.delete_shader(shader));

        context.shader_source(shader, source);
        context.compile_shader(shader);

        if !context.shader_compile_status(shader) {
            let info_log = if self.diagnostics.is_enabled() {
                let log = context.shader_info_log(shader);
                tracing::warn!(
                    "Failed to compile {stage} shader:\n{source}\nInfo log:\n{}",
                    log.trim_end()
                );
                Some(log)
            } else {
                None
            };

            return Err(Error::compilation(stage, info_log));
        }

        tracing::trace!("compiled {stage} shader {shader:?}");

        mem::forget(_call_on_drop);
        Ok(Shader::from_raw(shader, stage))
    }
}

/// Links a vertex and a fragment shader into a program.
#[derive(Debug, Copy, Clone, Default)]
pub struct ProgramLinker {
    diagnostics: Diagnostics,
}

impl ProgramLinker {
    /// Create a new program linker.
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// Link `vertex` and `fragment` into a new program.
    ///
    /// The linker takes ownership of both shaders. They are detached and deleted before
    /// this function returns, whether or not linking succeeds; a linked program keeps
    /// working without them.
    pub fn link<C: GpuContext + ?Sized>(
        &self,
        context: &C,
        vertex: Shader<C>,
        fragment: Shader<C>,
    ) -> Result<Program<C>, Error> {
        if vertex.stage() != ShaderStage::Vertex || fragment.stage() != ShaderStage::Fragment {
            vertex.release(context);
            fragment.release(context);
            return Err(Error::invalid_input(
                "a program is linked from one vertex shader and one fragment shader",
            ));
        }

        let vertex = vertex.into_raw();
        let fragment = fragment.into_raw();
        let _delete_shaders = CallOnDrop(|| {
            context.delete_shader(vertex);
            context.delete_shader(fragment);
        });

        let program = context
            .create_program()
            .map_err(|err| Error::object_creation("program", err))?;
        let _delete_program = CallOnDrop(|| context.delete_program(program));

        context.attach_shader(program, vertex);
        context.attach_shader(program, fragment);
        let _detach_shaders = CallOnDrop(|| {
            context.detach_shader(program, vertex);
            context.detach_shader(program, fragment);
        });

        context.link_program(program);

        if !context.program_link_status(program) {
            let info_log = if self.diagnostics.is_enabled() {
                let log = context.program_info_log(program);
                tracing::warn!("Failed to link program:\n{}", log.trim_end());
                Some(log)
            } else {
                None
            };

            return Err(Error::link(info_log));
        }

        tracing::trace!("linked program {program:?}");

        mem::forget(_delete_program);
        Ok(Program::from_raw(program))
    }
}

/// Checks a linked program against the current driver state.
///
/// This only ever produces log output.
#[derive(Debug, Copy, Clone, Default)]
pub struct ProgramValidator {
    diagnostics: Diagnostics,
}

impl ProgramValidator {
    /// Create a new program validator.
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// Validate `program` and return the driver's verdict.
    pub fn validate<C: GpuContext + ?Sized>(&self, context: &C, program: &Program<C>) -> bool {
        let valid = context.validate_program(program.handle());

        if self.diagnostics.is_enabled() {
            let log = context.program_info_log(program.handle());
            tracing::debug!(
                "Results of validating program: {valid}\nLog: {}",
                log.trim_end()
            );
        }

        valid
    }
}

struct CallOnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for CallOnDrop<F> {
    fn drop(&mut self) {
        (self.0)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::headless::{Call, HeadlessContext};
    use crate::source::{DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};

    const BROKEN_SHADER: &str = "void main() { gl_Position = vec4(0.0) }";

    #[test]
    fn compiles_valid_source() {
        let ctx = HeadlessContext::new();
        let compiler = ShaderCompiler::new(Diagnostics::ENABLED);

        let shader = compiler
            .compile(&ctx, ShaderStage::Vertex, DEFAULT_VERTEX_SHADER)
            .unwrap();
        assert_eq!(shader.stage(), ShaderStage::Vertex);
        assert_eq!(ctx.live_shaders(), 1);

        shader.release(&ctx);
        assert_eq!(ctx.live_shaders(), 0);
    }

    #[test]
    fn failed_compile_deletes_the_shader() {
        let ctx = HeadlessContext::new();
        let compiler = ShaderCompiler::new(Diagnostics::ENABLED);

        let err = compiler
            .compile(&ctx, ShaderStage::Vertex, BROKEN_SHADER)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompilationFailed);
        assert!(err.info_log().is_some());
        assert_eq!(ctx.live_shaders(), 0);
        assert!(ctx.errors().is_empty());
    }

    #[test]
    fn disabled_diagnostics_never_fetch_logs() {
        let ctx = HeadlessContext::new();
        let compiler = ShaderCompiler::new(Diagnostics::DISABLED);

        let err = compiler
            .compile(&ctx, ShaderStage::Fragment, "")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompilationFailed);
        assert_eq!(err.info_log(), None);
        assert!(!ctx
            .calls()
            .iter()
            .any(|call| matches!(call, Call::ShaderInfoLog(_))));
    }

    #[test]
    fn object_exhaustion_is_reported() {
        let ctx = HeadlessContext::new().with_object_limit(0);
        let err = ShaderCompiler::default()
            .compile(&ctx, ShaderStage::Vertex, DEFAULT_VERTEX_SHADER)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ObjectCreationFailed);
    }

    #[test]
    fn link_consumes_both_shaders() {
        let ctx = HeadlessContext::new();
        let compiler = ShaderCompiler::new(Diagnostics::ENABLED);
        let linker = ProgramLinker::new(Diagnostics::ENABLED);

        let vertex = compiler
            .compile(&ctx, ShaderStage::Vertex, DEFAULT_VERTEX_SHADER)
            .unwrap();
        let fragment = compiler
            .compile(&ctx, ShaderStage::Fragment, DEFAULT_FRAGMENT_SHADER)
            .unwrap();

        let program = linker.link(&ctx, vertex, fragment).unwrap();
        assert_eq!(ctx.live_programs(), 1);
        assert_eq!(ctx.live_shaders(), 0);

        assert!(ProgramValidator::new(Diagnostics::ENABLED).validate(&ctx, &program));

        program.release(&ctx);
        assert_eq!(ctx.live_programs(), 0);
        assert!(ctx.errors().is_empty());
    }

    #[test]
    fn unlinked_programs_fail_validation() {
        let ctx = HeadlessContext::new();
        let validator = ProgramValidator::new(Diagnostics::ENABLED);
        let unlinked = Program::<HeadlessContext>::from_raw(ctx.create_program().unwrap());

        assert!(!validator.validate(&ctx, &unlinked));
        assert!(!validator.validate(&ctx, &unlinked));
        assert_eq!(ctx.live_programs(), 1);
        assert!(ctx
            .calls()
            .iter()
            .any(|call| matches!(call, Call::ProgramInfoLog(_))));

        unlinked.release(&ctx);
        assert_eq!(ctx.live_programs(), 0);
        assert!(ctx.errors().is_empty());
    }

    #[test]
    fn failed_validation_does_not_touch_a_linked_program() {
        let ctx = HeadlessContext::new();
        let compiler = ShaderCompiler::new(Diagnostics::ENABLED);
        let validator = ProgramValidator::new(Diagnostics::ENABLED);

        let vertex = compiler
            .compile(&ctx, ShaderStage::Vertex, DEFAULT_VERTEX_SHADER)
            .unwrap();
        let fragment = compiler
            .compile(&ctx, ShaderStage::Fragment, DEFAULT_FRAGMENT_SHADER)
            .unwrap();
        let program = ProgramLinker::new(Diagnostics::ENABLED)
            .link(&ctx, vertex, fragment)
            .unwrap();

        let unlinked = Program::<HeadlessContext>::from_raw(ctx.create_program().unwrap());
        assert!(!validator.validate(&ctx, &unlinked));
        unlinked.release(&ctx);

        assert!(validator.validate(&ctx, &program));
        ctx.use_program(Some(program.handle()));
        assert_eq!(ctx.current_program(), Some(program.handle()));
        assert!(ctx.errors().is_empty(), "{:?}", ctx.errors());

        program.release(&ctx);
    }

    #[test]
    fn link_failure_releases_everything() {
        let ctx = HeadlessContext::new();
        let compiler = ShaderCompiler::new(Diagnostics::ENABLED);

        let vertex = compiler
            .compile(
                &ctx,
                ShaderStage::Vertex,
                "in vec4 a_Position;\nvoid main() { gl_Position = a_Position; }",
            )
            .unwrap();
        let fragment = compiler
            .compile(
                &ctx,
                ShaderStage::Fragment,
                "in vec4 v_Color;\nout vec4 o_Color;\nvoid main() { o_Color = v_Color; }",
            )
            .unwrap();

        let err = ProgramLinker::new(Diagnostics::ENABLED)
            .link(&ctx, vertex, fragment)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LinkFailed);
        assert!(err.info_log().map_or(false, |log| log.contains("v_Color")));
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.live_shaders(), 0);
        assert!(ctx.errors().is_empty());
    }

    #[test]
    fn swapped_stages_are_rejected_before_the_driver() {
        let ctx = HeadlessContext::new();
        let compiler = ShaderCompiler::default();

        let vertex = compiler
            .compile(&ctx, ShaderStage::Vertex, DEFAULT_VERTEX_SHADER)
            .unwrap();
        let fragment = compiler
            .compile(&ctx, ShaderStage::Fragment, DEFAULT_FRAGMENT_SHADER)
            .unwrap();

        let err = ProgramLinker::default()
            .link(&ctx, fragment, vertex)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(ctx.live_shaders(), 0);
        assert!(!ctx
            .calls()
            .iter()
            .any(|call| matches!(call, Call::CreateProgram)));
    }
}

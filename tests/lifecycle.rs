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

//! Drives the pipeline through the surface lifecycle with a headless context.

mod util;

use airhockey_hardware::headless::{Call, HeadlessContext};
use airhockey_hardware::lifecycle::LifecycleState;
use airhockey_hardware::{
    DirectorySources, ErrorKind, PipelineConfig, RenderPipeline, ShaderStage, Viewport,
    DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER,
};
use piet::Color;

use std::fs;

use util::{init_tracing, pipeline, MissingStage};

#[test]
fn table_renders_only_the_clear_color() {
    let ctx = HeadlessContext::new();
    let mut pipeline = pipeline(PipelineConfig::default());

    assert_eq!(pipeline.geometry().as_floats().len(), 20);

    pipeline.on_surface_created(&ctx).unwrap();
    assert!(pipeline.is_program_valid());
    assert!(pipeline.position_location().raw() >= 0);
    assert!(pipeline.color_location().is_valid());

    pipeline.on_surface_changed(&ctx, 1080, 1920);
    pipeline.on_draw_frame(&ctx);

    assert_eq!(ctx.color_buffer(), Some(Color::rgba(1.0, 0.0, 0.0, 0.0)));
    assert!(ctx.draw_calls().is_empty());
    assert_eq!(ctx.current_viewport(), Viewport::full(1080, 1920));
    assert_eq!(ctx.live_shaders(), 0);
    assert_eq!(ctx.live_programs(), 1);
    assert_eq!(ctx.live_buffers(), 1);
    assert!(ctx.errors().is_empty(), "{:?}", ctx.errors());
}

#[test]
fn build_follows_compile_link_validate_bind() {
    let ctx = HeadlessContext::new();
    let mut pipeline = pipeline(PipelineConfig::default());
    pipeline.on_surface_created(&ctx).unwrap();

    let calls = ctx.calls();
    let position = |wanted: fn(&Call) -> bool| calls.iter().position(wanted).unwrap();

    let clear_color = position(|call| matches!(call, Call::SetClearColor(_)));
    let vertex = position(|call| matches!(call, Call::CreateShader(ShaderStage::Vertex)));
    let fragment = position(|call| matches!(call, Call::CreateShader(ShaderStage::Fragment)));
    let link = position(|call| matches!(call, Call::LinkProgram(_)));
    let validate = position(|call| matches!(call, Call::ValidateProgram(_)));
    let use_program = position(|call| matches!(call, Call::UseProgram(Some(_))));
    let pointer = position(|call| matches!(call, Call::VertexAttributePointer { .. }));
    let enable = position(|call| matches!(call, Call::EnableVertexAttribute { .. }));

    assert!(clear_color < vertex);
    assert!(vertex < fragment);
    assert!(fragment < link);
    assert!(link < validate);
    assert!(validate < use_program);
    assert!(use_program < pointer);
    assert!(pointer < enable);

    // Vertex first, then fragment.
    let attached: Vec<_> = calls
        .iter()
        .filter_map(|call| match call {
            Call::AttachShader(_, shader) => Some(*shader),
            _ => None,
        })
        .collect();
    assert_eq!(attached.len(), 2);
    assert!(attached[0].name() < attached[1].name());
}

#[test]
fn context_loss_rebuilds_without_touching_old_objects() {
    let first = HeadlessContext::new();
    let mut pipeline = pipeline(PipelineConfig::default());

    pipeline.on_surface_created(&first).unwrap();
    pipeline.on_surface_changed(&first, 640, 480);
    pipeline.on_draw_frame(&first);
    let first_calls = first.calls().len();
    assert_eq!(pipeline.generation(), Some(1));

    let second = HeadlessContext::new();
    pipeline.on_surface_created(&second).unwrap();
    pipeline.on_surface_changed(&second, 480, 640);
    pipeline.on_draw_frame(&second);

    // The lost context never hears from the pipeline again.
    assert_eq!(first.calls().len(), first_calls);
    assert_eq!(first.live_programs(), 1);

    assert_eq!(pipeline.generation(), Some(2));
    assert!(pipeline.is_program_valid());
    assert!(second.errors().is_empty(), "{:?}", second.errors());
    assert!(!second.calls().iter().any(|call| matches!(
        call,
        Call::DeleteProgram(_) | Call::DeleteVertexBuffer(_)
    )));
    assert_eq!(second.live_programs(), 1);
    assert_eq!(second.live_buffers(), 1);
    assert_eq!(second.color_buffer(), Some(Color::rgba(1.0, 0.0, 0.0, 0.0)));
    assert_eq!(second.current_viewport(), Viewport::full(480, 640));
}

#[test]
fn resizing_is_idempotent() {
    let once = HeadlessContext::new();
    let twice = HeadlessContext::new();
    let mut a = pipeline(PipelineConfig::default());
    let mut b = pipeline(PipelineConfig::default());

    a.on_surface_created(&once).unwrap();
    a.on_surface_changed(&once, 800, 600);

    b.on_surface_created(&twice).unwrap();
    b.on_surface_changed(&twice, 800, 600);
    b.on_surface_changed(&twice, 800, 600);

    assert_eq!(once.current_viewport(), twice.current_viewport());
    assert_eq!(a.state(), b.state());
    assert_eq!(
        a.state(),
        LifecycleState::ViewportSet {
            generation: 1,
            viewport: Viewport::full(800, 600),
        }
    );
}

#[test]
fn resizing_leaves_the_program_alone() {
    let ctx = HeadlessContext::new();
    let mut pipeline = pipeline(PipelineConfig::default());
    pipeline.on_surface_created(&ctx).unwrap();
    let before = ctx.calls().len();

    pipeline.on_surface_changed(&ctx, 10, 20);

    assert_eq!(
        &ctx.calls()[before..],
        &[Call::Viewport(Viewport::full(10, 20))]
    );
}

#[test]
fn callbacks_before_creation_do_nothing() {
    let ctx = HeadlessContext::new();
    let mut pipeline = pipeline(PipelineConfig::default());

    pipeline.on_surface_changed(&ctx, 100, 100);
    pipeline.on_draw_frame(&ctx);

    assert!(ctx.calls().is_empty());
    assert_eq!(pipeline.state(), LifecycleState::Uninitialized);
}

#[test]
fn missing_source_is_fatal() {
    init_tracing();
    let ctx = HeadlessContext::new();
    let mut pipeline: RenderPipeline<HeadlessContext, _> = RenderPipeline::new(
        MissingStage(ShaderStage::Fragment),
        PipelineConfig::default(),
    )
    .unwrap();

    let err = pipeline.on_surface_created(&ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(err.to_string().contains("fragment shader source not found"));
    assert!(!pipeline.is_program_valid());
    assert_eq!(ctx.live_shaders(), 0);

    // The surface still shows the clear color.
    pipeline.on_draw_frame(&ctx);
    assert_eq!(ctx.color_buffer(), Some(Color::rgba(1.0, 0.0, 0.0, 0.0)));
}

#[test]
fn shaders_load_from_a_directory() {
    init_tracing();
    let dir = std::env::temp_dir().join(format!("airhockey-lifecycle-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join(DirectorySources::VERTEX_FILE),
        DEFAULT_VERTEX_SHADER.replace('\n', "\r\n"),
    )
    .unwrap();
    fs::write(dir.join(DirectorySources::FRAGMENT_FILE), DEFAULT_FRAGMENT_SHADER).unwrap();

    let ctx = HeadlessContext::new();
    let mut pipeline: RenderPipeline<HeadlessContext, _> =
        RenderPipeline::new(DirectorySources::new(&dir), PipelineConfig::default()).unwrap();
    pipeline.on_surface_created(&ctx).unwrap();
    assert!(pipeline.is_program_valid());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn release_then_recreate() {
    let ctx = HeadlessContext::new();
    let mut pipeline = pipeline(PipelineConfig::default());

    pipeline.on_surface_created(&ctx).unwrap();
    pipeline.release(&ctx);
    assert_eq!(ctx.live_programs(), 0);
    assert_eq!(ctx.live_buffers(), 0);
    assert_eq!(ctx.current_program(), None);

    pipeline.on_surface_created(&ctx).unwrap();
    assert!(pipeline.is_program_valid());
    assert!(ctx.errors().is_empty(), "{:?}", ctx.errors());
}

#[cfg(debug_assertions)]
#[test]
fn calls_from_another_thread_are_rejected() {
    let mut pipeline = pipeline(PipelineConfig::default());

    let result = std::thread::spawn(move || {
        let ctx = HeadlessContext::new();
        let _ = pipeline.on_surface_created(&ctx);
    })
    .join();

    assert!(result.is_err());
}

#[test]
fn calls_from_the_creating_thread_are_accepted() {
    let result = std::thread::spawn(|| {
        let ctx = HeadlessContext::new();
        let mut pipeline = pipeline(PipelineConfig::default());
        pipeline.on_surface_created(&ctx).unwrap();
        pipeline.on_draw_frame(&ctx);
        pipeline.is_program_valid()
    })
    .join();

    assert!(result.unwrap());
}

#[test]
fn resuming_a_kept_context_only_resizes() {
    let ctx = HeadlessContext::new();
    let mut pipeline = pipeline(PipelineConfig::default());

    pipeline.on_surface_created(&ctx).unwrap();
    pipeline.on_surface_changed(&ctx, 800, 600);
    let generation = pipeline.generation();
    let program = pipeline.program().map(|program| program.handle());

    // Suspended and resumed with the same context.
    pipeline.on_surface_changed(&ctx, 800, 600);
    pipeline.on_draw_frame(&ctx);

    assert_eq!(pipeline.generation(), generation);
    assert_eq!(pipeline.program().map(|program| program.handle()), program);
    assert_eq!(ctx.live_programs(), 1);
    assert_eq!(ctx.live_buffers(), 1);

    // Closed.
    pipeline.release(&ctx);
    assert_eq!(ctx.live_programs(), 0);
    assert_eq!(ctx.live_buffers(), 0);
    assert!(ctx.errors().is_empty(), "{:?}", ctx.errors());
}

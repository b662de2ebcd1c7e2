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

//! Shared setup for the integration tests.

#![allow(dead_code)]

use airhockey_hardware::headless::HeadlessContext;
use airhockey_hardware::{
    PipelineConfig, RenderPipeline, ShaderSource, ShaderStage, SourceError, StaticSources,
};

use std::io;
use std::sync::{Arc, Mutex};

/// A vertex shader that never ends its statement.
pub const BROKEN_VERTEX_SHADER: &str =
    "in vec4 a_Position;\nvoid main() {\n    gl_Position = a_Position\n}\n";

/// Route log output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Log output collected by [`capture_logs`].
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` and return everything it logged on this thread.
pub fn capture_logs(f: impl FnOnce()) -> String {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, f);

    let bytes = logs.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

/// A pipeline over the default shaders with diagnostics on.
pub fn pipeline(config: PipelineConfig) -> RenderPipeline<HeadlessContext> {
    init_tracing();
    RenderPipeline::new(StaticSources::default(), config.with_diagnostics(true))
        .expect("valid configuration")
}

/// A source provider that has nothing for one stage.
#[derive(Debug)]
pub struct MissingStage(pub ShaderStage);

impl ShaderSource for MissingStage {
    fn shader_source(&self, stage: ShaderStage) -> Result<String, SourceError> {
        if stage == self.0 {
            return Err(SourceError::NotFound {
                stage,
                location: "res/raw".into(),
            });
        }

        StaticSources::default().shader_source(stage)
    }
}

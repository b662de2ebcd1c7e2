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

//! Clears the window to red and draws the air hockey table.
//!
//! Run with `--clear-only` to skip the draw calls.

use airhockey_hardware::{DrawCommand, PipelineConfig, RenderPipeline, StaticSources};

use std::error::Error;

mod util;

struct Table {
    pipeline: RenderPipeline<util::Context>,
}

impl util::SurfaceCallbacks for Table {
    fn surface_created(&mut self, context: &util::Context) {
        if let Err(err) = self.pipeline.on_surface_created(context) {
            tracing::error!("failed to set up the surface: {err}");
        }
    }

    fn surface_changed(&mut self, context: &util::Context, width: u32, height: u32) {
        self.pipeline.on_surface_changed(context, width, height);
    }

    fn draw_frame(&mut self, context: &util::Context) {
        self.pipeline.on_draw_frame(context);
    }

    fn surface_destroyed(&mut self, context: &util::Context) {
        self.pipeline.release(context);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    util::init();

    let mut config = PipelineConfig::default();
    if !std::env::args().any(|arg| arg == "--clear-only") {
        config = config.with_draw_commands(DrawCommand::table_scene());
    }

    let pipeline = RenderPipeline::new(StaticSources::default(), config)?;
    util::run(Table { pipeline })
}

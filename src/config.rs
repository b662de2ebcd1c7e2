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

//! Construction-time configuration for the render pipeline.

use super::geometry::DrawCommand;

use std::borrow::Cow;

/// The name of the position attribute in the default shaders.
pub const POSITION_ATTRIBUTE: &str = "a_Position";

/// The name of the color uniform in the default shaders.
pub const COLOR_UNIFORM: &str = "u_Color";

/// Whether diagnostic output is produced.
///
/// While disabled, shader sources, information logs and validation results are never
/// fetched from the driver or formatted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostics {
    enabled: bool,
}

impl Diagnostics {
    /// Diagnostics are produced.
    pub const ENABLED: Diagnostics = Diagnostics { enabled: true };

    /// Diagnostics are not produced.
    pub const DISABLED: Diagnostics = Diagnostics { enabled: false };

    /// Enabled for debug builds, disabled for release builds.
    pub const fn from_build() -> Self {
        Diagnostics {
            enabled: cfg!(debug_assertions),
        }
    }

    /// Whether diagnostics are enabled.
    pub const fn is_enabled(self) -> bool {
        self.enabled
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::from_build()
    }
}

impl From<bool> for Diagnostics {
    fn from(enabled: bool) -> Self {
        Diagnostics { enabled }
    }
}

/// Configuration for a [`RenderPipeline`](crate::RenderPipeline).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Whether diagnostic output is produced.
    pub diagnostics: Diagnostics,

    /// The color the color buffer is cleared to every frame.
    pub clear_color: piet::Color,

    /// The name of the attribute the geometry is bound to.
    pub position_attribute: Cow<'static, str>,

    /// The name of the `vec4` uniform that colors the geometry.
    pub color_uniform: Cow<'static, str>,

    /// The draw calls issued after clearing every frame.
    ///
    /// Empty by default, so frames only clear.
    pub draw_commands: Vec<DrawCommand>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            diagnostics: Diagnostics::default(),
            clear_color: piet::Color::rgba(1.0, 0.0, 0.0, 0.0),
            position_attribute: Cow::Borrowed(POSITION_ATTRIBUTE),
            color_uniform: Cow::Borrowed(COLOR_UNIFORM),
            draw_commands: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Set whether diagnostic output is produced.
    pub fn with_diagnostics(mut self, diagnostics: impl Into<Diagnostics>) -> Self {
        self.diagnostics = diagnostics.into();
        self
    }

    /// Set the clear color.
    pub fn with_clear_color(mut self, color: piet::Color) -> Self {
        self.clear_color = color;
        self
    }

    /// Set the name of the position attribute.
    pub fn with_position_attribute(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.position_attribute = name.into();
        self
    }

    /// Set the name of the color uniform.
    pub fn with_color_uniform(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.color_uniform = name.into();
        self
    }

    /// Set the draw calls issued every frame.
    pub fn with_draw_commands(mut self, commands: impl IntoIterator<Item = DrawCommand>) -> Self {
        self.draw_commands = commands.into_iter().collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_clear_to_transparent_red() {
        let config = PipelineConfig::default();
        assert_eq!(config.clear_color.as_rgba(), (1.0, 0.0, 0.0, 0.0));
        assert_eq!(config.position_attribute, "a_Position");
        assert_eq!(config.color_uniform, "u_Color");
        assert!(config.draw_commands.is_empty());
        assert_eq!(config.diagnostics.is_enabled(), cfg!(debug_assertions));
    }

    #[test]
    fn builders_override_fields() {
        let config = PipelineConfig::default()
            .with_diagnostics(false)
            .with_clear_color(piet::Color::BLACK)
            .with_position_attribute("aPosition")
            .with_draw_commands(DrawCommand::table_scene());

        assert_eq!(config.diagnostics, Diagnostics::DISABLED);
        assert_eq!(config.clear_color, piet::Color::BLACK);
        assert_eq!(config.position_attribute, "aPosition");
        assert_eq!(config.draw_commands.len(), 4);
    }
}

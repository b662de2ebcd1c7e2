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

//! Where shader source text comes from.

use super::error::SourceError;
use super::gpu_backend::ShaderStage;

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// The default pass-through vertex shader.
///
/// Sources carry no `#version` line; backends prepend the header their context needs.
pub const DEFAULT_VERTEX_SHADER: &str = include_str!("../shaders/simple_vertex_shader.glsl");

/// The default single-color fragment shader.
pub const DEFAULT_FRAGMENT_SHADER: &str = include_str!("../shaders/simple_fragment_shader.glsl");

/// Provides the source text for each shader stage.
pub trait ShaderSource {
    /// Get the source text for `stage`.
    fn shader_source(&self, stage: ShaderStage) -> Result<String, SourceError>;
}

impl<S: ShaderSource + ?Sized> ShaderSource for &S {
    fn shader_source(&self, stage: ShaderStage) -> Result<String, SourceError> {
        (**self).shader_source(stage)
    }
}

impl<S: ShaderSource + ?Sized> ShaderSource for Box<S> {
    fn shader_source(&self, stage: ShaderStage) -> Result<String, SourceError> {
        (**self).shader_source(stage)
    }
}

/// Shader sources held in memory.
#[derive(Debug, Clone)]
pub struct StaticSources {
    vertex: Cow<'static, str>,
    fragment: Cow<'static, str>,
}

impl StaticSources {
    /// Create a new set of sources.
    pub fn new(
        vertex: impl Into<Cow<'static, str>>,
        fragment: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

impl Default for StaticSources {
    fn default() -> Self {
        Self::new(DEFAULT_VERTEX_SHADER, DEFAULT_FRAGMENT_SHADER)
    }
}

impl ShaderSource for StaticSources {
    fn shader_source(&self, stage: ShaderStage) -> Result<String, SourceError> {
        let source = match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        };

        Ok(source.clone().into_owned())
    }
}

/// Shader sources read from a directory on every request.
#[derive(Debug, Clone)]
pub struct DirectorySources {
    root: PathBuf,
}

impl DirectorySources {
    /// The file the vertex shader is read from.
    pub const VERTEX_FILE: &'static str = "simple_vertex_shader.glsl";

    /// The file the fragment shader is read from.
    pub const FRAGMENT_FILE: &'static str = "simple_fragment_shader.glsl";

    /// Read sources from the files in `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory sources are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file the source for `stage` is read from.
    pub fn path(&self, stage: ShaderStage) -> PathBuf {
        let file = match stage {
            ShaderStage::Vertex => Self::VERTEX_FILE,
            ShaderStage::Fragment => Self::FRAGMENT_FILE,
        };

        self.root.join(file)
    }
}

impl ShaderSource for DirectorySources {
    fn shader_source(&self, stage: ShaderStage) -> Result<String, SourceError> {
        let path = self.path(stage);
        let read_error = |source: io::Error| {
            if source.kind() == io::ErrorKind::NotFound {
                SourceError::NotFound {
                    stage,
                    location: path.display().to_string(),
                }
            } else {
                SourceError::Read { stage, source }
            }
        };

        let file = File::open(&path).map_err(read_error)?;

        // Every line ending, including a missing final one, becomes a single '\n'.
        let mut body = String::new();
        for line in BufReader::new(file).lines() {
            body.push_str(&line.map_err(read_error)?);
            body.push('\n');
        }

        tracing::debug!("read {stage} shader source from {}", path.display());

        Ok(body)
    }
}

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

//! Error types.

use super::gpu_backend::ShaderStage;

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::io;

/// The category of an [`Error`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The driver refused to allocate a shader, program or buffer object.
    ///
    /// This usually means the context is exhausted or no longer valid.
    ObjectCreationFailed,

    /// The driver rejected a shader's source code.
    CompilationFailed,

    /// The driver could not link the attached stages into a program.
    LinkFailed,

    /// An operation was called with arguments that break its contract.
    InvalidInput,

    /// The shader source provider could not produce source text.
    SourceUnavailable,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ObjectCreationFailed => "object creation failed",
            ErrorKind::CompilationFailed => "compilation failed",
            ErrorKind::LinkFailed => "link failed",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::SourceUnavailable => "shader source unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error type for shader and program management.
pub struct Error {
    kind: ErrorKind,

    /// What was being done when the error occurred.
    context: Cow<'static, str>,

    /// The driver's information log, only captured while diagnostics are enabled.
    info_log: Option<String>,

    /// The underlying error, if any.
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    fn new(kind: ErrorKind, context: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            context: context.into(),
            info_log: None,
            source: None,
        }
    }

    pub(crate) fn object_creation(
        object: &'static str,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(
                ErrorKind::ObjectCreationFailed,
                format!("could not create {object} object"),
            )
        }
    }

    pub(crate) fn compilation(stage: ShaderStage, info_log: Option<String>) -> Self {
        let context = match stage {
            ShaderStage::Vertex => "vertex shader failed to compile",
            ShaderStage::Fragment => "fragment shader failed to compile",
        };

        Self {
            info_log,
            ..Self::new(ErrorKind::CompilationFailed, context)
        }
    }

    pub(crate) fn link(info_log: Option<String>) -> Self {
        Self {
            info_log,
            ..Self::new(ErrorKind::LinkFailed, "program failed to link")
        }
    }

    pub(crate) fn invalid_input(context: &'static str) -> Self {
        Self::new(ErrorKind::InvalidInput, context)
    }

    pub(crate) fn source_unavailable(source: SourceError) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(ErrorKind::SourceUnavailable, "could not load shader source")
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The driver's information log for the failed object.
    ///
    /// This is only captured while diagnostics are enabled.
    pub fn info_log(&self) -> Option<&str> {
        self.info_log.as_deref()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("context", &self.context)
            .field("info_log", &self.info_log)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.context)?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(log) = &self.info_log {
            write!(f, "\n{}", log.trim_end())?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn StdError + 'static))
    }
}

/// An error produced by a [`ShaderSource`](crate::ShaderSource).
#[derive(Debug)]
#[non_exhaustive]
pub enum SourceError {
    /// There is no source for the stage.
    NotFound {
        /// The stage whose source was requested.
        stage: ShaderStage,

        /// Where the source was looked for.
        location: String,
    },

    /// The source exists but could not be read.
    Read {
        /// The stage whose source was requested.
        stage: ShaderStage,

        /// The underlying I/O error.
        source: io::Error,
    },
}

impl SourceError {
    /// The stage whose source was requested.
    pub fn stage(&self) -> ShaderStage {
        match self {
            SourceError::NotFound { stage, .. } | SourceError::Read { stage, .. } => *stage,
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::NotFound { stage, location } => {
                write!(f, "{stage} shader source not found at {location}")
            }
            SourceError::Read { stage, .. } => write!(f, "could not read {stage} shader source"),
        }
    }
}

impl StdError for SourceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SourceError::NotFound { .. } => None,
            SourceError::Read { source, .. } => Some(source),
        }
    }
}

/// An error produced when building a [`GeometryBuffer`](crate::GeometryBuffer).
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GeometryError {
    /// The number of scalars does not divide into two-component positions.
    OddLength {
        /// The number of scalars that were provided.
        len: usize,
    },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::OddLength { len } => {
                write!(f, "{len} scalars cannot be grouped into (x, y) positions")
            }
        }
    }
}

impl StdError for GeometryError {}

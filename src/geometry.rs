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

//! The vertex data drawn by the pipeline.

use super::error::GeometryError;
use super::gpu_backend::{AttributeLayout, Primitive};

use std::mem;

/// The number of components in a position.
pub const POSITION_COMPONENT_COUNT: u32 = 2;

const BYTES_PER_FLOAT: u32 = mem::size_of::<f32>() as u32;

/// The table, its center line and both mallets, as (x, y) pairs.
#[rustfmt::skip]
const TABLE_VERTICES: [f32; 20] = [
    // First triangle
    0.0, 0.0,
    9.0, 14.0,
    0.0, 14.0,

    // Second triangle
    0.0, 0.0,
    0.0, 14.0,
    9.0, 14.0,

    // Center line
    0.0, 7.0,
    9.0, 7.0,

    // Mallets
    4.5, 2.0,
    4.5, 12.0,
];

/// The position type used by the GPU renderer.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Position {
    /// The horizontal coordinate.
    pub x: f32,

    /// The vertical coordinate.
    pub y: f32,
}

/// A contiguous run of vertices inside a [`GeometryBuffer`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexRange {
    /// The index of the first vertex.
    pub first: u32,

    /// The number of vertices.
    pub count: u32,
}

impl VertexRange {
    /// The two triangles that make up the table.
    pub const TABLE: VertexRange = VertexRange { first: 0, count: 6 };

    /// The line splitting the table in half.
    pub const CENTER_LINE: VertexRange = VertexRange { first: 6, count: 2 };

    /// The first mallet.
    pub const FIRST_MALLET: VertexRange = VertexRange { first: 8, count: 1 };

    /// The second mallet.
    pub const SECOND_MALLET: VertexRange = VertexRange { first: 9, count: 1 };

    /// The index one past the last vertex.
    pub fn end(self) -> u32 {
        self.first.saturating_add(self.count)
    }
}

/// An immutable set of interleaved 2D positions.
///
/// The scalars are stored in the platform's native byte order, so the bytes can be handed
/// to the driver without a copy or conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryBuffer {
    data: Box<[f32]>,
}

impl GeometryBuffer {
    /// Create a buffer from a flat list of scalars.
    ///
    /// Fails if the scalars do not group into (x, y) pairs.
    pub fn new(data: impl Into<Box<[f32]>>) -> Result<Self, GeometryError> {
        let data = data.into();

        if data.len() % POSITION_COMPONENT_COUNT as usize != 0 {
            return Err(GeometryError::OddLength { len: data.len() });
        }

        Ok(Self { data })
    }

    /// The air hockey table: two triangles, a center line and two mallets.
    pub fn table() -> Self {
        Self {
            data: Box::new(TABLE_VERTICES),
        }
    }

    /// The raw scalars.
    pub fn as_floats(&self) -> &[f32] {
        &self.data
    }

    /// The scalars grouped into positions.
    pub fn positions(&self) -> &[Position] {
        bytemuck::cast_slice(&self.data)
    }

    /// The scalars as native-order bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// The number of vertices.
    pub fn vertex_count(&self) -> u32 {
        (self.data.len() / POSITION_COMPONENT_COUNT as usize) as u32
    }

    /// Whether `range` lies within this buffer.
    pub fn contains(&self, range: VertexRange) -> bool {
        range.first.checked_add(range.count).map_or(false, |end| end <= self.vertex_count())
    }

    /// How the position attribute reads this buffer: tightly packed pairs from offset zero.
    pub fn layout(&self) -> AttributeLayout {
        AttributeLayout {
            components: POSITION_COMPONENT_COUNT,
            stride: POSITION_COMPONENT_COUNT * BYTES_PER_FLOAT,
            offset: 0,
        }
    }
}

/// A draw call issued against the bound geometry after the frame is cleared.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawCommand {
    /// How the vertices are assembled.
    pub primitive: Primitive,

    /// The vertices to draw.
    pub range: VertexRange,

    /// The color written to the color uniform before drawing.
    pub color: piet::Color,
}

impl DrawCommand {
    /// Create a new draw command.
    pub fn new(primitive: Primitive, range: VertexRange, color: piet::Color) -> Self {
        Self {
            primitive,
            range,
            color,
        }
    }

    /// The commands that draw every part of [`GeometryBuffer::table`].
    ///
    /// A white table, a red center line, a blue mallet and a red mallet.
    pub fn table_scene() -> [DrawCommand; 4] {
        [
            DrawCommand::new(Primitive::Triangles, VertexRange::TABLE, piet::Color::WHITE),
            DrawCommand::new(Primitive::Lines, VertexRange::CENTER_LINE, piet::Color::RED),
            DrawCommand::new(Primitive::Points, VertexRange::FIRST_MALLET, piet::Color::BLUE),
            DrawCommand::new(Primitive::Points, VertexRange::SECOND_MALLET, piet::Color::RED),
        ]
    }
}

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

//! Defines useful resource wrappers.
//!
//! GPU objects are released by explicit driver calls, so these wrappers do not implement
//! `Drop`. Each one is consumed by exactly one of `release`, which deletes the object
//! through the context that created it, or `abandon`, which forgets it without touching
//! the driver. The latter is for objects whose context has already been lost.

use super::gpu_backend::{GpuContext, ShaderStage};

use std::fmt;

macro_rules! define_resource_wrappers {
    ($($(#[$meta:meta])* $name:ident($res:ident) => $delete:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[must_use = "GPU objects must be released or abandoned"]
            pub struct $name<C: GpuContext + ?Sized> {
                resource: C::$res,
            }

            impl<C: GpuContext + ?Sized> fmt::Debug for $name<C> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_struct(stringify!($name))
                        .finish_non_exhaustive()
                }
            }

            impl<C: GpuContext + ?Sized> $name<C> {
                pub(crate) fn from_raw(resource: C::$res) -> Self {
                    Self { resource }
                }

                /// Get the underlying driver handle.
                pub fn resource(&self) -> &C::$res {
                    &self.resource
                }

                /// Delete the object through the context that created it.
                pub fn release(self, context: &C) {
                    context.$delete(self.resource);
                }

                /// Forget the object without calling into the driver.
                ///
                /// Use this when the context that owned the object has been lost.
                pub fn abandon(self) {}
            }
        )*
    };
}

define_resource_wrappers! {
    /// A linked shader program.
    Program(Program) => delete_program,

    /// Vertex data uploaded to the GPU.
    VertexBuffer(VertexBuffer) => delete_vertex_buffer,
}

impl<C: GpuContext + ?Sized> Program<C> {
    /// Get a copy of the underlying driver handle.
    pub fn handle(&self) -> C::Program {
        self.resource
    }
}

impl<C: GpuContext + ?Sized> VertexBuffer<C> {
    pub(crate) fn new(context: &C, data: &[u8]) -> Result<Self, C::Error> {
        let resource = context.create_vertex_buffer(data)?;
        Ok(Self::from_raw(resource))
    }
}

/// A successfully compiled shader stage.
#[must_use = "GPU objects must be released or abandoned"]
pub struct Shader<C: GpuContext + ?Sized> {
    resource: C::Shader,
    stage: ShaderStage,
}

impl<C: GpuContext + ?Sized> fmt::Debug for Shader<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("resource", &self.resource)
            .field("stage", &self.stage)
            .finish()
    }
}

impl<C: GpuContext + ?Sized> Shader<C> {
    pub(crate) fn from_raw(resource: C::Shader, stage: ShaderStage) -> Self {
        Self { resource, stage }
    }

    /// The stage this shader was compiled for.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Get a copy of the underlying driver handle.
    pub fn handle(&self) -> C::Shader {
        self.resource
    }

    /// Delete the shader through the context that created it.
    pub fn release(self, context: &C) {
        context.delete_shader(self.resource);
    }

    /// Forget the shader without calling into the driver.
    pub fn abandon(self) {}

    /// Take the raw handle; the caller becomes responsible for deleting it.
    pub(crate) fn into_raw(self) -> C::Shader {
        self.resource
    }
}

/// The slot through which per-vertex data is fed into a linked program.
///
/// Only valid for the program it was resolved against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct AttributeLocation(Option<u32>);

impl AttributeLocation {
    /// The location of a name the program does not contain.
    pub const INVALID: AttributeLocation = AttributeLocation(None);

    /// Resolve an attribute by name.
    pub fn resolve<C: GpuContext + ?Sized>(context: &C, program: &Program<C>, name: &str) -> Self {
        AttributeLocation(context.attribute_location(program.handle(), name))
    }

    /// The location as the driver reports it, with `-1` meaning unresolved.
    pub fn raw(self) -> i32 {
        self.0.map_or(-1, |index| index as i32)
    }

    /// The attribute index, if resolved.
    pub fn index(self) -> Option<u32> {
        self.0
    }

    /// Whether the name was found in the program.
    pub fn is_valid(self) -> bool {
        self.0.is_some()
    }
}

/// The slot through which a constant value is fed into a linked program.
///
/// Only valid for the program it was resolved against.
pub struct UniformLocation<C: GpuContext + ?Sized>(Option<C::UniformLocation>);

impl<C: GpuContext + ?Sized> UniformLocation<C> {
    /// The location of a name the program does not contain.
    pub const INVALID: UniformLocation<C> = UniformLocation(None);

    /// Resolve a uniform by name.
    pub fn resolve(context: &C, program: &Program<C>, name: &str) -> Self {
        UniformLocation(context.uniform_location(program.handle(), name))
    }

    /// The driver's location, if resolved.
    pub fn get(&self) -> Option<&C::UniformLocation> {
        self.0.as_ref()
    }

    /// Whether the name was found in the program.
    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }
}

impl<C: GpuContext + ?Sized> Clone for UniformLocation<C> {
    fn clone(&self) -> Self {
        UniformLocation(self.0.clone())
    }
}

impl<C: GpuContext + ?Sized> fmt::Debug for UniformLocation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UniformLocation").field(&self.0).finish()
    }
}

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

//! The render lifecycle as a pure state machine.
//!
//! [`transition`] never touches a driver. It maps the current state and a surface event to
//! the next state plus the list of [`Effect`]s the caller must carry out, in order. The
//! [`RenderPipeline`](crate::RenderPipeline) is the caller that executes them against a
//! real context.

use super::gpu_backend::Viewport;

use arrayvec::ArrayVec;

/// Identifies one driver context.
///
/// A new generation starts every time the surface is created, because the previous
/// context, and every object in it, may be gone.
pub type Generation = u64;

/// Where the pipeline is in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// No surface has been created yet.
    #[default]
    Uninitialized,

    /// A surface exists and its program has been built, successfully or not.
    SurfaceReady {
        /// The current context generation.
        generation: Generation,
    },

    /// A surface exists and has been given a size.
    ViewportSet {
        /// The current context generation.
        generation: Generation,

        /// The viewport last applied.
        viewport: Viewport,
    },
}

impl LifecycleState {
    /// The current context generation, if a surface exists.
    pub fn generation(self) -> Option<Generation> {
        match self {
            LifecycleState::Uninitialized => None,
            LifecycleState::SurfaceReady { generation }
            | LifecycleState::ViewportSet { generation, .. } => Some(generation),
        }
    }

    /// The viewport last applied in this generation.
    pub fn viewport(self) -> Option<Viewport> {
        match self {
            LifecycleState::ViewportSet { viewport, .. } => Some(viewport),
            _ => None,
        }
    }
}

/// A callback from the surface that drives the pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SurfaceEvent {
    /// The surface was created, or recreated after the context was lost.
    Created,

    /// The surface changed size, in pixels.
    Resized {
        /// The new width.
        width: u32,

        /// The new height.
        height: u32,
    },

    /// The display wants a new frame.
    DrawFrame,
}

/// Work the caller must carry out after a transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Forget every object from `generation` without calling into the driver.
    DiscardGeneration {
        /// The generation whose objects are no longer valid.
        generation: Generation,
    },

    /// Compile, link and bind a fresh program for `generation`.
    BuildProgram {
        /// The generation the new objects belong to.
        generation: Generation,
    },

    /// Apply a viewport.
    SetViewport(Viewport),

    /// Clear the color buffer to the configured clear color.
    ClearColorBuffer,

    /// Issue the configured draw commands.
    DrawGeometry,
}

/// The effects of a single transition.
pub type Effects = ArrayVec<Effect, 2>;

/// Advance the lifecycle by one event.
pub fn transition(state: LifecycleState, event: SurfaceEvent) -> (LifecycleState, Effects) {
    let mut effects = Effects::new();

    let next = match (state.generation(), event) {
        (None, SurfaceEvent::Created) => {
            effects.push(Effect::BuildProgram { generation: 1 });
            LifecycleState::SurfaceReady { generation: 1 }
        }

        (Some(old), SurfaceEvent::Created) => {
            let generation = old.wrapping_add(1);
            effects.push(Effect::DiscardGeneration { generation: old });
            effects.push(Effect::BuildProgram { generation });
            LifecycleState::SurfaceReady { generation }
        }

        (Some(generation), SurfaceEvent::Resized { width, height }) => {
            let viewport = Viewport::full(width, height);
            effects.push(Effect::SetViewport(viewport));
            LifecycleState::ViewportSet {
                generation,
                viewport,
            }
        }

        (Some(_), SurfaceEvent::DrawFrame) => {
            effects.push(Effect::ClearColorBuffer);
            effects.push(Effect::DrawGeometry);
            state
        }

        // Nothing to size or draw before a surface exists.
        (None, SurfaceEvent::Resized { .. } | SurfaceEvent::DrawFrame) => state,
    };

    (next, effects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: &[SurfaceEvent]) -> (LifecycleState, Vec<Effect>) {
        let mut state = LifecycleState::default();
        let mut all = Vec::new();

        for &event in events {
            let (next, effects) = transition(state, event);
            state = next;
            all.extend(effects);
        }

        (state, all)
    }

    #[test]
    fn first_creation_builds_generation_one() {
        let (state, effects) = transition(LifecycleState::Uninitialized, SurfaceEvent::Created);
        assert_eq!(state, LifecycleState::SurfaceReady { generation: 1 });
        assert_eq!(effects.as_slice(), &[Effect::BuildProgram { generation: 1 }]);
    }

    #[test]
    fn recreation_discards_before_rebuilding() {
        let (state, effects) = run(&[
            SurfaceEvent::Created,
            SurfaceEvent::Resized {
                width: 640,
                height: 480,
            },
            SurfaceEvent::Created,
        ]);

        assert_eq!(state, LifecycleState::SurfaceReady { generation: 2 });
        assert_eq!(
            effects,
            [
                Effect::BuildProgram { generation: 1 },
                Effect::SetViewport(Viewport::full(640, 480)),
                Effect::DiscardGeneration { generation: 1 },
                Effect::BuildProgram { generation: 2 },
            ]
        );
    }

    #[test]
    fn resizing_sets_a_full_viewport() {
        let (state, effects) = run(&[
            SurfaceEvent::Created,
            SurfaceEvent::Resized {
                width: 1080,
                height: 1920,
            },
        ]);

        assert_eq!(state.viewport(), Some(Viewport::full(1080, 1920)));
        assert_eq!(state.generation(), Some(1));
        assert_eq!(effects.last(), Some(&Effect::SetViewport(Viewport::full(1080, 1920))));
    }

    #[test]
    fn resizing_twice_is_idempotent() {
        let resize = SurfaceEvent::Resized {
            width: 320,
            height: 200,
        };
        let (once, _) = run(&[SurfaceEvent::Created, resize]);
        let (twice, _) = run(&[SurfaceEvent::Created, resize, resize]);
        assert_eq!(once, twice);
    }

    #[test]
    fn frames_clear_then_draw_without_changing_state() {
        let (ready, _) = run(&[SurfaceEvent::Created]);
        let (state, effects) = transition(ready, SurfaceEvent::DrawFrame);
        assert_eq!(state, ready);
        assert_eq!(
            effects.as_slice(),
            &[Effect::ClearColorBuffer, Effect::DrawGeometry]
        );
    }

    #[test]
    fn nothing_happens_before_creation() {
        let (state, effects) = run(&[
            SurfaceEvent::DrawFrame,
            SurfaceEvent::Resized {
                width: 1,
                height: 1,
            },
        ]);
        assert_eq!(state, LifecycleState::Uninitialized);
        assert!(effects.is_empty());
    }
}

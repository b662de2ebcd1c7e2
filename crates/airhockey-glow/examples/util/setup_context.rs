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

// Opens a window with glutin and forwards its surface events to the pipeline callbacks.

use airhockey_glow::GlContext;

use glutin::config::{Config, ConfigTemplateBuilder};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, NotCurrentContext, PossiblyCurrentContext, Version,
};
use glutin::display::{Display, GetGlDisplay};
use glutin::prelude::*;

use glutin::surface::{Surface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};

use raw_window_handle::HasRawWindowHandle;

use std::error::Error;
use std::mem;
use std::num::NonZeroU32;

use winit::event::{Event, WindowEvent};
use winit::event_loop::{EventLoop, EventLoopWindowTarget};
use winit::window::{Window, WindowBuilder};

pub(crate) type Context = GlContext<glow::Context>;

/// The three callbacks a surface delivers.
pub(crate) trait SurfaceCallbacks: 'static {
    /// The surface and its context were created.
    fn surface_created(&mut self, context: &Context);

    /// The surface changed size.
    fn surface_changed(&mut self, context: &Context, width: u32, height: u32);

    /// Time to draw a frame.
    fn draw_frame(&mut self, context: &Context);

    /// The window is closing while its context is still current.
    fn surface_destroyed(&mut self, context: &Context);
}

pub(crate) fn init() {
    tracing_subscriber::fmt::init();
}

struct GlutinSetup {
    display: Display,
    config: Config,
    context: ContextType,
    window: Option<Window>,
}

#[derive(Default)]
enum ContextType {
    NotCurrent(NotCurrentContext),
    Current {
        context: PossiblyCurrentContext,
        window: Window,
        surface: Surface<WindowSurface>,
    },
    #[default]
    Hole,
}

fn make_window_builder() -> WindowBuilder {
    WindowBuilder::new().with_title("airhockey-glow example")
}

impl GlutinSetup {
    fn new<T>(event_loop: &EventLoopWindowTarget<T>) -> Result<Self, Box<dyn Error>> {
        // Start building a window.
        let window = if cfg!(windows) {
            Some(make_window_builder())
        } else {
            None
        };

        let display = DisplayBuilder::new().with_window_builder(window);

        let (window, gl_config) =
            display.build(event_loop, ConfigTemplateBuilder::new(), |configs| {
                configs
                    .reduce(|accum, config| {
                        if config.num_samples() > accum.num_samples() {
                            config
                        } else {
                            accum
                        }
                    })
                    .unwrap()
            })?;

        tracing::info!("Config: {:?}", &gl_config);
        tracing::info!("Api: {:?}", gl_config.api());

        // Try to build a several different contexts.
        let window_handle = window.as_ref().map(|w| w.raw_window_handle());
        let contexts = [
            ContextAttributesBuilder::new().build(window_handle),
            ContextAttributesBuilder::new()
                .with_context_api(ContextApi::Gles(None))
                .build(window_handle),
            ContextAttributesBuilder::new()
                .with_context_api(ContextApi::Gles(Some(Version::new(3, 0))))
                .build(window_handle),
        ];

        let display = gl_config.display();
        let gl_handler = (|| {
            for context in &contexts {
                if let Ok(gl_context) = unsafe { display.create_context(&gl_config, context) } {
                    return Ok(gl_context);
                }
            }

            Err(Box::<dyn Error>::from("Could not create a context"))
        })()?;

        Ok(Self {
            display,
            config: gl_config,
            context: ContextType::NotCurrent(gl_handler),
            window,
        })
    }

    fn make_current<T>(&mut self, window_target: &EventLoopWindowTarget<T>) {
        let window = self.window.take().unwrap_or_else(|| {
            let window_builder = make_window_builder();
            glutin_winit::finalize_window(window_target, window_builder, &self.config).unwrap()
        });

        let attrs = window.build_surface_attributes(<_>::default());
        let gl_surface = unsafe {
            self.display
                .create_window_surface(&self.config, &attrs)
                .unwrap()
        };

        let gl_context = match mem::take(&mut self.context) {
            ContextType::NotCurrent(context) => context.make_current(&gl_surface).unwrap(),
            _ => panic!("Invalid state!"),
        };

        if let Err(res) = gl_surface
            .set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::new(1).unwrap()))
        {
            tracing::warn!("Error setting vsync: {res:?}");
        }

        self.context = ContextType::Current {
            context: gl_context,
            window,
            surface: gl_surface,
        };
    }

    fn load_gl(&self) -> glow::Context {
        unsafe {
            glow::Context::from_loader_function_cstr(|s| {
                self.display.get_proc_address(s) as *const _
            })
        }
    }

    fn run<T>(
        mut self,
        evl: EventLoop<T>,
        mut callbacks: impl SurfaceCallbacks,
    ) -> Result<(), Box<dyn Error>> {
        let mut renderer: Option<Context> = None;

        evl.run(move |event, window_target, control_flow| {
            control_flow.set_wait();

            match event {
                Event::Resumed => {
                    self.make_current(window_target);

                    // The GL context and its objects survive a suspend.
                    if renderer.is_none() {
                        // SAFETY: The context was just made current.
                        let context = match unsafe { GlContext::new(self.load_gl()) } {
                            Ok(context) => context,
                            Err(err) => {
                                tracing::error!("{err}");
                                control_flow.set_exit();
                                return;
                            }
                        };

                        callbacks.surface_created(&context);
                        renderer = Some(context);
                    }

                    if let (ContextType::Current { window, .. }, Some(renderer)) =
                        (&self.context, &renderer)
                    {
                        let size = window.inner_size();
                        callbacks.surface_changed(renderer, size.width, size.height);
                    }
                }
                Event::Suspended => {
                    let gl_context = match mem::take(&mut self.context) {
                        ContextType::Current { context, .. } => context,
                        _ => panic!("Invalid state!"),
                    };
                    self.context = ContextType::NotCurrent(gl_context.make_not_current().unwrap());
                }
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::Resized(size) => {
                        if size.width != 0 && size.height != 0 {
                            if let (
                                ContextType::Current {
                                    context, surface, ..
                                },
                                Some(renderer),
                            ) = (&self.context, &renderer)
                            {
                                surface.resize(
                                    context,
                                    NonZeroU32::new(size.width).unwrap(),
                                    NonZeroU32::new(size.height).unwrap(),
                                );
                                callbacks.surface_changed(renderer, size.width, size.height);
                            }
                        }
                    }
                    WindowEvent::CloseRequested => {
                        if let (ContextType::Current { .. }, Some(renderer)) =
                            (&self.context, renderer.take())
                        {
                            callbacks.surface_destroyed(&renderer);
                        }

                        control_flow.set_exit();
                    }
                    _ => (),
                },
                Event::RedrawEventsCleared => {
                    if let (
                        ContextType::Current {
                            context: gl_context,
                            window,
                            surface: gl_surface,
                        },
                        Some(renderer),
                    ) = (&self.context, &renderer)
                    {
                        callbacks.draw_frame(renderer);

                        window.request_redraw();
                        gl_surface.swap_buffers(gl_context).unwrap();
                    }
                }
                _ => (),
            }
        })
    }
}

/// Open a window and drive `callbacks` from its surface until it is closed.
pub(crate) fn run(callbacks: impl SurfaceCallbacks) -> Result<(), Box<dyn Error>> {
    let event_loop = EventLoop::new();
    GlutinSetup::new(&event_loop)?.run(event_loop, callbacks)
}

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tilestep::{
    DrawStrategy, Engine, InputAction, InputHandle, LoopError, RedrawRequester,
};
use tracing::{debug, error, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use super::bootstrap::AppWiring;
use super::gameplay::region_at;
use super::surface::PixelsSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UserEvent {
    Redraw,
}

/// Forwards scheduler redraw requests onto the winit thread.
struct ProxyRedraw(EventLoopProxy<UserEvent>);

impl RedrawRequester for ProxyRedraw {
    fn request_redraw(&self) {
        if self.0.send_event(UserEvent::Redraw).is_err() {
            debug!("redraw_request_after_loop_closed");
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize draw surface: {0}")]
    CreateSurface(#[source] pixels::Error),
    #[error(transparent)]
    Loop(#[from] LoopError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = run_app(app) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run_app(app: AppWiring) -> Result<(), AppError> {
    let AppWiring {
        config,
        textures,
        states,
        input,
    } = app;

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event()
        .build()
        .map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut surface = PixelsSurface::new(Arc::clone(&window), textures.atlas, textures.images)
        .map_err(AppError::CreateSurface)?;

    event_loop.set_control_flow(ControlFlow::Wait);

    let mut engine = Engine::new(config.loop_config.clone(), states);
    let proxy = event_loop.create_proxy();
    engine.start(DrawStrategy::HostRedraw(Box::new(ProxyRedraw(proxy))))?;

    let mut cursor: Option<(f64, f64)> = None;

    event_loop
        .run(move |event, window_target| match event {
            Event::UserEvent(UserEvent::Redraw) => {
                window.request_redraw();
            }
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(err) = surface.resize(new_size.width, new_size.height) {
                        warn!(error = %err, "surface_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::Focused(false) => {
                    input.update(|state| state.release_all());
                }
                WindowEvent::CursorMoved { position, .. } => {
                    cursor = Some((position.x, position.y));
                    input.update(|state| {
                        state.set_entered_region(region_at(position.x, position.y))
                    });
                }
                WindowEvent::CursorLeft { .. } => {
                    cursor = None;
                    input.update(|state| state.set_entered_region(None));
                }
                WindowEvent::MouseInput {
                    state: button_state,
                    button: MouseButton::Left,
                    ..
                } => {
                    apply_mouse_button(&input, cursor, button_state == ElementState::Pressed);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    let pressed = event.state == ElementState::Pressed;
                    let action = apply_key(&input, event.physical_key, pressed, Instant::now());
                    if pressed && action == Some(InputAction::Quit) {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    if let Err(err) = engine.draw_frame(&mut surface) {
                        warn!(error = %err, "surface_draw_failed");
                        window_target.exit();
                    }
                }
                _ => {}
            },
            Event::LoopExiting => {
                let stats = engine.stats().snapshot();
                if engine.is_running() {
                    if let Err(err) = engine.stop() {
                        warn!(error = %err, "loop_stop_failed");
                    }
                }
                info!(fps = stats.fps, tps = stats.tps, "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn action_for_key(key: PhysicalKey) -> Option<InputAction> {
    match key {
        PhysicalKey::Code(KeyCode::KeyW) | PhysicalKey::Code(KeyCode::ArrowUp) => {
            Some(InputAction::MoveUp)
        }
        PhysicalKey::Code(KeyCode::KeyS) | PhysicalKey::Code(KeyCode::ArrowDown) => {
            Some(InputAction::MoveDown)
        }
        PhysicalKey::Code(KeyCode::KeyA) | PhysicalKey::Code(KeyCode::ArrowLeft) => {
            Some(InputAction::MoveLeft)
        }
        PhysicalKey::Code(KeyCode::KeyD) | PhysicalKey::Code(KeyCode::ArrowRight) => {
            Some(InputAction::MoveRight)
        }
        PhysicalKey::Code(KeyCode::Space) => Some(InputAction::Primary),
        PhysicalKey::Code(KeyCode::Escape) => Some(InputAction::Quit),
        _ => None,
    }
}

fn apply_key(
    input: &InputHandle,
    key: PhysicalKey,
    pressed: bool,
    now: Instant,
) -> Option<InputAction> {
    let action = action_for_key(key)?;
    input.update(|state| state.set_down(action, pressed, now));
    Some(action)
}

fn apply_mouse_button(input: &InputHandle, cursor: Option<(f64, f64)>, pressed: bool) {
    input.update(|state| {
        if pressed {
            if let Some((x, y)) = cursor {
                state.record_click(x, y);
            }
        }
        state.set_mouse_down(pressed);
    });
}

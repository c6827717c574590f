use anyhow::{Context, Result};
use std::{process::ExitCode, sync::Arc, time::Duration};
use winit::{
	dpi::{PhysicalPosition, PhysicalSize},
	event::{ElementState, Event, KeyEvent, WindowEvent},
	event_loop::{EventLoop, EventLoopWindowTarget},
	keyboard::{Key, NamedKey},
	platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
	window::{Window, WindowBuilder},
};

use crate::{
	declare_widgets, to_wgpu_color, DeviceContext, DrawData, FrameHost, FrameLoop, FrameOutcome,
	FrameTimer, Gui, LoopState, SwapChainDesc, WgpuApi, WidgetState,
};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

pub struct AppConfig {
	pub title: String,
	pub width: u32,
	pub height: u32,
	pub x: i32,
	pub y: i32,
	pub close_on_escape: bool,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			title: "Dear egui wgpu".to_string(),
			width: 1280,
			height: 800,
			x: 100,
			y: 100,
			close_on_escape: false,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
	Exit,
	/// A lone system-menu key. Swallowed so it never activates a window menu.
	SystemMenu,
	Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
	Exit,
	Resize(PhysicalSize<u32>),
	ResizeToInnerSize,
	Key,
	Ignore,
}

/// What the host does with a window event once the UI has seen it. Only
/// keyboard input can be claimed by the UI; see [`classify_key`].
pub fn route_window_event(event: &WindowEvent) -> WindowAction {
	match event {
		WindowEvent::CloseRequested | WindowEvent::Destroyed => WindowAction::Exit,
		WindowEvent::Resized(physical_size) => WindowAction::Resize(*physical_size),
		WindowEvent::ScaleFactorChanged { .. } => WindowAction::ResizeToInnerSize,
		WindowEvent::KeyboardInput { .. } => WindowAction::Key,
		_ => WindowAction::Ignore,
	}
}

pub fn classify_key(
	key: &Key,
	state: ElementState,
	gui_captured_event: bool,
	close_on_escape: bool,
) -> KeyAction {
	if gui_captured_event || state != ElementState::Pressed {
		return KeyAction::Ignore;
	}
	match key {
		Key::Named(NamedKey::Escape) if close_on_escape => KeyAction::Exit,
		Key::Named(NamedKey::Alt | NamedKey::F10) => KeyAction::SystemMenu,
		_ => KeyAction::Ignore,
	}
}

/// The size to rebuild the render target at, or `None` while the window is
/// minimized.
pub fn resize_target(size: PhysicalSize<u32>, minimized: bool) -> Option<(u32, u32)> {
	if minimized || size.width == 0 || size.height == 0 {
		return None;
	}
	Some((size.width, size.height))
}

pub fn exit_status<T>(outcome: &Result<T>) -> u8 {
	match outcome {
		Ok(_) => EXIT_SUCCESS,
		Err(_) => EXIT_FAILURE,
	}
}

pub fn run(config: AppConfig) -> ExitCode {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	log::info!("App started");

	let outcome = run_app(config);
	match &outcome {
		Ok(frames) => log::info!("App exited after {frames} frames"),
		Err(error) => log::error!("Application error: {error:?}"),
	}
	ExitCode::from(exit_status(&outcome))
}

fn run_app(config: AppConfig) -> Result<u64> {
	let mut host = Host::new(config)?;
	let mut widgets = WidgetState::default();
	let outcome = FrameLoop::new().run(&mut host, &mut widgets);
	host.shutdown();
	outcome
}

pub fn create_window(event_loop: &EventLoop<()>, config: &AppConfig) -> Result<Arc<Window>> {
	let window = WindowBuilder::new()
		.with_title(config.title.as_str())
		.with_inner_size(PhysicalSize::new(config.width, config.height))
		.with_position(PhysicalPosition::new(config.x, config.y))
		.with_visible(false)
		.build(event_loop)
		.context("Failed to create winit window!")?;
	Ok(Arc::new(window))
}

/// The event loop plus everything the window's events act upon.
struct Host {
	event_loop: EventLoop<()>,
	session: Session,
}

struct Session {
	window: Arc<Window>,
	device: DeviceContext<WgpuApi>,
	gui: Gui,
	timer: FrameTimer,
	close_on_escape: bool,
}

impl Host {
	fn new(config: AppConfig) -> Result<Self> {
		let event_loop = EventLoop::new().context("Failed to create the event loop!")?;
		let window = create_window(&event_loop, &config)?;

		let mut device = DeviceContext::new(WgpuApi::new());
		device
			.create(&window, &SwapChainDesc::default())
			.context("Failed to create the graphics device!")?;

		window.set_visible(true);

		let format = device
			.surface_format()
			.context("The graphics device has no swap chain!")?;
		let gui = device
			.device()
			.map(|render_device| Gui::new(&window, render_device, format))
			.context("The graphics device is missing!")?;

		Ok(Self {
			event_loop,
			session: Session {
				window,
				device,
				gui,
				timer: FrameTimer::default(),
				close_on_escape: config.close_on_escape,
			},
		})
	}

	/// Tears down in reverse order of creation.
	fn shutdown(self) {
		let Self {
			event_loop,
			session,
		} = self;
		let Session {
			window,
			mut device,
			gui,
			..
		} = session;

		gui.shutdown();
		device.teardown();
		drop(window);
		drop(event_loop);
	}
}

impl FrameHost for Host {
	type DrawData = DrawData;

	fn pump_messages(&mut self) -> LoopState {
		let Host {
			event_loop,
			session,
		} = self;

		match event_loop.pump_events(Some(Duration::ZERO), |event, elwt| {
			session.handle_event(event, elwt)
		}) {
			PumpStatus::Continue => LoopState::Running,
			PumpStatus::Exit(code) => {
				log::debug!("Event loop exited with code {code}");
				LoopState::Done
			}
		}
	}

	fn begin_frame(&mut self) {
		self.session.timer.tick();
		self.session.gui.begin_frame(&self.session.window);
	}

	fn declare_widgets(&mut self, state: &mut WidgetState) {
		declare_widgets(self.session.gui.context(), state, &self.session.timer);
	}

	fn end_frame(&mut self) -> DrawData {
		self.session.gui.end_frame(&self.session.window)
	}

	fn render(&mut self, draw_data: DrawData, clear_color: [f32; 4]) -> Result<FrameOutcome> {
		let Session { device, gui, .. } = &mut self.session;
		let mut paint = gui.paint(&draw_data);
		device.render_frame(to_wgpu_color(clear_color), &mut paint)
	}
}

impl Session {
	fn handle_event(&mut self, event: Event<()>, elwt: &EventLoopWindowTarget<()>) {
		match event {
			Event::WindowEvent { window_id, event } if window_id == self.window.id() => {
				self.handle_window_event(event, elwt)
			}
			Event::LoopExiting => log::debug!("Event loop exiting"),
			_ => {}
		}
	}

	fn handle_window_event(&mut self, event: WindowEvent, elwt: &EventLoopWindowTarget<()>) {
		let gui_captured_event = self.gui.handle_window_event(&self.window, &event).consumed;

		match route_window_event(&event) {
			WindowAction::Exit => elwt.exit(),
			WindowAction::Resize(physical_size) => self.resize(physical_size),
			WindowAction::ResizeToInnerSize => self.resize(self.window.inner_size()),
			WindowAction::Key => {
				if let WindowEvent::KeyboardInput { event, .. } = &event {
					self.handle_key(event, gui_captured_event, elwt);
				}
			}
			WindowAction::Ignore => {}
		}
	}

	fn handle_key(
		&mut self,
		event: &KeyEvent,
		gui_captured_event: bool,
		elwt: &EventLoopWindowTarget<()>,
	) {
		match classify_key(
			&event.logical_key,
			event.state,
			gui_captured_event,
			self.close_on_escape,
		) {
			KeyAction::Exit => elwt.exit(),
			KeyAction::SystemMenu => log::trace!("Swallowed system menu key"),
			KeyAction::Ignore => {}
		}
	}

	fn resize(&mut self, physical_size: PhysicalSize<u32>) {
		let minimized = self.window.is_minimized().unwrap_or(false);
		let Some((width, height)) = resize_target(physical_size, minimized) else {
			log::debug!("Skipping render target resize while minimized");
			return;
		};
		if let Err(error) = self.device.resize_render_target(width, height) {
			log::error!("Failed to resize the render target: {error:?}");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::tests::FakeApi;
	use anyhow::anyhow;
	use winit::keyboard::SmolStr;

	#[test]
	fn default_config_matches_the_demo_window() {
		let config = AppConfig::default();
		assert_eq!((config.width, config.height), (1280, 800));
		assert_eq!((config.x, config.y), (100, 100));
		assert!(!config.close_on_escape);
	}

	fn pressed(key: &Key, close_on_escape: bool) -> KeyAction {
		classify_key(key, ElementState::Pressed, false, close_on_escape)
	}

	#[test]
	fn escape_exits_only_when_configured() {
		let escape = Key::Named(NamedKey::Escape);
		assert_eq!(pressed(&escape, true), KeyAction::Exit);
		assert_eq!(pressed(&escape, false), KeyAction::Ignore);
	}

	#[test]
	fn system_menu_keys_are_swallowed() {
		assert_eq!(pressed(&Key::Named(NamedKey::Alt), true), KeyAction::SystemMenu);
		assert_eq!(pressed(&Key::Named(NamedKey::F10), false), KeyAction::SystemMenu);
		assert_eq!(
			pressed(&Key::Character(SmolStr::new("a")), true),
			KeyAction::Ignore
		);
	}

	#[test]
	fn keys_claimed_by_the_ui_never_reach_the_host() {
		let escape = Key::Named(NamedKey::Escape);
		let alt = Key::Named(NamedKey::Alt);
		assert_eq!(
			classify_key(&escape, ElementState::Pressed, true, true),
			KeyAction::Ignore
		);
		assert_eq!(
			classify_key(&alt, ElementState::Pressed, true, false),
			KeyAction::Ignore
		);
	}

	#[test]
	fn key_releases_are_ignored() {
		let escape = Key::Named(NamedKey::Escape);
		assert_eq!(
			classify_key(&escape, ElementState::Released, false, true),
			KeyAction::Ignore
		);
	}

	#[test]
	fn close_and_resize_are_routed_to_the_host() {
		assert_eq!(
			route_window_event(&WindowEvent::CloseRequested),
			WindowAction::Exit
		);
		assert_eq!(route_window_event(&WindowEvent::Destroyed), WindowAction::Exit);
		assert_eq!(
			route_window_event(&WindowEvent::Resized(PhysicalSize::new(640, 480))),
			WindowAction::Resize(PhysicalSize::new(640, 480))
		);
		assert_eq!(
			route_window_event(&WindowEvent::Focused(true)),
			WindowAction::Ignore
		);
	}

	#[test]
	fn minimized_windows_skip_resizing() {
		assert_eq!(resize_target(PhysicalSize::new(800, 600), true), None);
		assert_eq!(resize_target(PhysicalSize::new(0, 0), false), None);
		assert_eq!(resize_target(PhysicalSize::new(0, 600), false), None);
		assert_eq!(
			resize_target(PhysicalSize::new(800, 600), false),
			Some((800, 600))
		);
	}

	#[test]
	fn device_failure_exits_with_failure_and_releases_everything() {
		let mut device = DeviceContext::new(FakeApi {
			fail_create: true,
			..Default::default()
		});
		let outcome = device.create(&(), &SwapChainDesc::default());

		assert_eq!(exit_status(&outcome), EXIT_FAILURE);
		assert!(device.swap_chain().is_none());
		assert!(device.target_view().is_none());
	}

	#[test]
	fn clean_runs_exit_with_success() {
		assert_eq!(exit_status(&Ok(42u64)), EXIT_SUCCESS);
		assert_eq!(exit_status::<()>(&Err(anyhow!("lost"))), EXIT_FAILURE);
	}
}

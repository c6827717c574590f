use crate::RenderPassContents;
use egui::{ClippedPrimitive, Context as GuiContext, FullOutput, TexturesDelta, ViewportId};
use egui_wgpu::{Renderer, ScreenDescriptor};
use egui_winit::{EventResponse, State};
use wgpu::{CommandBuffer, CommandEncoder, Device, Queue, RenderPass, TextureFormat};
use winit::{event::WindowEvent, window::Window};

/// Everything one UI frame produced, ready to be handed to the renderer.
pub struct DrawData {
    pub paint_jobs: Vec<ClippedPrimitive>,
    pub textures_delta: TexturesDelta,
    pub screen_descriptor: ScreenDescriptor,
}

/// The egui context together with its winit platform adapter and its wgpu
/// renderer adapter.
pub struct Gui {
    context: GuiContext,
    state: State,
    renderer: Renderer,
}

impl Gui {
    pub fn new(window: &Window, device: &Device, output_format: TextureFormat) -> Self {
        let context = GuiContext::default();
        context.set_visuals(egui::Visuals::dark());

        let state = State::new(
            context.clone(),
            ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            Some(device.limits().max_texture_dimension_2d as usize),
        );

        let depth_format = None;
        let renderer = Renderer::new(device, output_format, depth_format, 1);

        Self {
            context,
            state,
            renderer,
        }
    }

    pub fn context(&self) -> &GuiContext {
        &self.context
    }

    /// Gives the UI first refusal on a window event.
    pub fn handle_window_event(&mut self, window: &Window, event: &WindowEvent) -> EventResponse {
        self.state.on_window_event(window, event)
    }

    pub fn begin_frame(&mut self, window: &Window) {
        let gui_input = self.state.take_egui_input(window);
        self.context.begin_frame(gui_input);
    }

    pub fn end_frame(&mut self, window: &Window) -> DrawData {
        let FullOutput {
            platform_output,
            textures_delta,
            shapes,
            pixels_per_point,
            ..
        } = self.context.end_frame();

        self.state.handle_platform_output(window, platform_output);

        let paint_jobs = self.context.tessellate(shapes, pixels_per_point);
        DrawData {
            paint_jobs,
            textures_delta,
            screen_descriptor: create_screen_descriptor(window, pixels_per_point),
        }
    }

    pub fn paint<'a>(&'a mut self, draw_data: &'a DrawData) -> GuiPaint<'a> {
        GuiPaint {
            renderer: &mut self.renderer,
            draw_data,
        }
    }

    /// Drops the renderer adapter, then the platform adapter, then the
    /// context.
    pub fn shutdown(self) {
        let Self {
            context,
            state,
            renderer,
        } = self;
        drop(renderer);
        drop(state);
        drop(context);
        log::info!("GUI shut down");
    }
}

/// One frame's draw data bound to the renderer that records it.
pub struct GuiPaint<'a> {
    renderer: &'a mut Renderer,
    draw_data: &'a DrawData,
}

impl RenderPassContents for GuiPaint<'_> {
    fn upload_textures(&mut self, device: &Device, queue: &Queue) {
        for (id, image_delta) in &self.draw_data.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }
    }

    fn prepare(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
    ) -> Vec<CommandBuffer> {
        let DrawData {
            paint_jobs,
            screen_descriptor,
            ..
        } = self.draw_data;

        self.renderer
            .update_buffers(device, queue, encoder, paint_jobs, screen_descriptor)
    }

    fn paint<'rp>(&'rp self, render_pass: &mut RenderPass<'rp>) {
        self.renderer.render(
            render_pass,
            &self.draw_data.paint_jobs,
            &self.draw_data.screen_descriptor,
        );
    }

    fn finish(&mut self) {
        for id in &self.draw_data.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}

pub fn create_screen_descriptor(window: &Window, pixels_per_point: f32) -> ScreenDescriptor {
    let window_size = window.inner_size();
    ScreenDescriptor {
        size_in_pixels: [window_size.width, window_size.height],
        pixels_per_point,
    }
}

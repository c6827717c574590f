use crate::{DeviceContext, GraphicsApi, SwapChainDesc};
use anyhow::{Context, Result};
use std::sync::Arc;
use wgpu::{
    CommandBuffer, CommandEncoder, Device, Queue, RenderPass, Surface, SurfaceConfiguration,
    TextureFormat, TextureViewDescriptor,
};
use winit::window::Window;

/// Something recorded into the frame's single render pass.
pub trait RenderPassContents {
    /// Applies texture changes. Runs every frame, whether or not a back
    /// buffer could be acquired.
    fn upload_textures(&mut self, _device: &Device, _queue: &Queue) {}

    /// Uploads whatever the pass needs before it begins.
    fn prepare(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
    ) -> Vec<CommandBuffer>;

    fn paint<'rp>(&'rp self, render_pass: &mut RenderPass<'rp>);

    /// Called once the frame has been submitted or skipped.
    fn finish(&mut self) {}
}

/// One frame's work, split around acquiring the back buffer.
pub trait FrameWork {
    type BackBuffer;

    fn upload_textures(&mut self);

    fn acquire(&mut self) -> Result<Self::BackBuffer, wgpu::SurfaceError>;

    fn reconfigure(&mut self);

    fn draw(&mut self, back_buffer: Self::BackBuffer);

    fn finish(&mut self);
}

/// Uploads textures, then draws into the back buffer if one is available.
/// Outdated or lost surfaces are reconfigured and the frame is skipped.
pub fn run_frame_work(work: &mut impl FrameWork) -> Result<FrameOutcome> {
    work.upload_textures();

    let outcome = match work.acquire() {
        Ok(back_buffer) => {
            work.draw(back_buffer);
            FrameOutcome::Presented
        }
        Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
            log::warn!("Surface outdated, reconfiguring");
            work.reconfigure();
            FrameOutcome::Skipped
        }
        Err(wgpu::SurfaceError::Timeout) => {
            log::warn!("Timed out acquiring the next back buffer");
            FrameOutcome::Skipped
        }
        Err(error) => {
            work.finish();
            return Err(error).context("Failed to acquire the next back buffer!");
        }
    };

    work.finish();
    Ok(outcome)
}

pub struct SwapChain {
    pub surface: Surface<'static>,
    pub config: SurfaceConfiguration,
}

/// The render target bound to the swap chain's back buffer.
///
/// wgpu hands out a fresh back buffer texture every frame, so this records
/// how the surface was configured when the target was built; `id` changes
/// every time the target is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    Skipped,
}

pub struct WgpuApi {
    instance: wgpu::Instance,
    next_target_id: u64,
}

impl Default for WgpuApi {
    fn default() -> Self {
        Self::new()
    }
}

impl WgpuApi {
    pub fn new() -> Self {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: Self::backends(),
            ..Default::default()
        });
        Self {
            instance,
            next_target_id: 0,
        }
    }

    fn backends() -> wgpu::Backends {
        wgpu::util::backend_bits_from_env().unwrap_or_else(wgpu::Backends::all)
    }

    fn required_features() -> wgpu::Features {
        wgpu::Features::empty()
    }

    fn device_descriptor(limits: wgpu::Limits) -> wgpu::DeviceDescriptor<'static> {
        wgpu::DeviceDescriptor {
            label: Some("Render Device"),
            required_features: Self::required_features(),
            required_limits: limits,
        }
    }

    async fn create_async(
        &mut self,
        window: &Arc<Window>,
        desc: &SwapChainDesc,
    ) -> Result<(Device, Queue, SwapChain)> {
        let surface = self
            .instance
            .create_surface(window.clone())
            .context("Failed to create a window surface!")?;

        let adapter = self
            .instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No hardware graphics adapter is available!")?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = Self::request_device(&adapter).await?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = select_surface_format(&capabilities.formats, desc.format)
            .context("The surface reports no supported formats!")?;
        if format != desc.format {
            log::info!("Surface format {:?} unavailable, using {format:?}", desc.format);
        }

        let window_size = window.inner_size();
        let width = if desc.width == 0 { window_size.width } else { desc.width };
        let height = if desc.height == 0 { window_size.height } else { desc.height };

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if desc.vsync {
                wgpu::PresentMode::Fifo
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            desired_maximum_frame_latency: desc.buffer_count,
            alpha_mode: capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        Ok((device, queue, SwapChain { surface, config }))
    }

    /// Asks for the full default limits first and settles for the downlevel
    /// set when the adapter cannot provide them.
    async fn request_device(adapter: &wgpu::Adapter) -> Result<(Device, Queue)> {
        log::debug!("WGPU Adapter Features: {:#?}", adapter.features());

        let preferred = wgpu::Limits::default().using_resolution(adapter.limits());
        match adapter
            .request_device(&Self::device_descriptor(preferred), None)
            .await
        {
            Ok(device) => Ok(device),
            Err(error) => {
                log::warn!("Default device limits unavailable ({error}), retrying with downlevel limits");
                let fallback = wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits());
                adapter
                    .request_device(&Self::device_descriptor(fallback), None)
                    .await
                    .context("Failed to request a device!")
            }
        }
    }
}

impl GraphicsApi for WgpuApi {
    type Window = Arc<Window>;
    type Device = Device;
    type Context = Queue;
    type SwapChain = SwapChain;
    type TargetView = RenderTarget;

    fn create_device_and_swap_chain(
        &mut self,
        window: &Arc<Window>,
        desc: &SwapChainDesc,
    ) -> Result<(Device, Queue, SwapChain)> {
        pollster::block_on(self.create_async(window, desc))
    }

    fn create_target_view(&mut self, _device: &Device, swap_chain: &SwapChain) -> Result<RenderTarget> {
        self.next_target_id += 1;
        Ok(RenderTarget {
            id: self.next_target_id,
            width: swap_chain.config.width,
            height: swap_chain.config.height,
            format: swap_chain.config.format,
        })
    }

    fn resize_buffers(
        &mut self,
        device: &Device,
        swap_chain: &mut SwapChain,
        width: u32,
        height: u32,
    ) -> Result<()> {
        swap_chain.config.width = width;
        swap_chain.config.height = height;
        swap_chain.surface.configure(device, &swap_chain.config);
        Ok(())
    }
}

impl DeviceContext<WgpuApi> {
    pub fn surface_format(&self) -> Option<TextureFormat> {
        self.swap_chain().map(|swap_chain| swap_chain.config.format)
    }

    /// Clears the render target, records `contents` into the same pass,
    /// submits and presents.
    pub fn render_frame(
        &mut self,
        clear_color: wgpu::Color,
        contents: &mut impl RenderPassContents,
    ) -> Result<FrameOutcome> {
        let (Some(device), Some(queue), Some(swap_chain), Some(target)) = (
            self.device(),
            self.context(),
            self.swap_chain(),
            self.target_view(),
        ) else {
            return Ok(FrameOutcome::Skipped);
        };

        run_frame_work(&mut WgpuFrame {
            device,
            queue,
            swap_chain,
            target,
            clear_color,
            contents,
        })
    }
}

struct WgpuFrame<'a, C> {
    device: &'a Device,
    queue: &'a Queue,
    swap_chain: &'a SwapChain,
    target: &'a RenderTarget,
    clear_color: wgpu::Color,
    contents: &'a mut C,
}

impl<C: RenderPassContents> FrameWork for WgpuFrame<'_, C> {
    type BackBuffer = wgpu::SurfaceTexture;

    fn upload_textures(&mut self) {
        self.contents.upload_textures(self.device, self.queue);
    }

    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.swap_chain.surface.get_current_texture()
    }

    fn reconfigure(&mut self) {
        self.swap_chain
            .surface
            .configure(self.device, &self.swap_chain.config);
    }

    fn draw(&mut self, surface_texture: wgpu::SurfaceTexture) {
        let view = surface_texture.texture.create_view(&TextureViewDescriptor {
            format: Some(self.target.format),
            ..Default::default()
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let prepared = self.contents.prepare(self.device, self.queue, &mut encoder);

        {
            encoder.insert_debug_marker("Render GUI");
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.contents.paint(&mut render_pass);
        }

        self.queue
            .submit(prepared.into_iter().chain(std::iter::once(encoder.finish())));
        surface_texture.present();
    }

    fn finish(&mut self) {
        self.contents.finish();
    }
}

/// Picks `preferred` when the surface supports it, then its channel-swapped
/// twin, then any non-sRGB format, then whatever comes first.
pub fn select_surface_format(
    formats: &[TextureFormat],
    preferred: TextureFormat,
) -> Option<TextureFormat> {
    let swapped = match preferred {
        TextureFormat::Rgba8Unorm => Some(TextureFormat::Bgra8Unorm),
        TextureFormat::Bgra8Unorm => Some(TextureFormat::Rgba8Unorm),
        _ => None,
    };

    formats
        .iter()
        .copied()
        .find(|format| *format == preferred)
        .or_else(|| swapped.filter(|format| formats.contains(format)))
        .or_else(|| formats.iter().copied().find(|format| !format.is_srgb()))
        .or_else(|| formats.first().copied())
}

pub fn to_wgpu_color([r, g, b, a]: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: a as f64,
    }
}

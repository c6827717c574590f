use anyhow::{bail, ensure, Result};

/// Swap chain parameters shared by every graphics backend.
///
/// A `width`/`height` of zero means "size the buffers from the window's
/// client area".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapChainDesc {
    pub buffer_count: u32,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub vsync: bool,
}

impl Default for SwapChainDesc {
    fn default() -> Self {
        Self {
            buffer_count: 2,
            width: 0,
            height: 0,
            format: wgpu::TextureFormat::Rgba8Unorm,
            vsync: true,
        }
    }
}

/// The platform graphics calls the device context is built from.
pub trait GraphicsApi {
    type Window: ?Sized;
    type Device;
    type Context;
    type SwapChain;
    type TargetView;

    fn create_device_and_swap_chain(
        &mut self,
        window: &Self::Window,
        desc: &SwapChainDesc,
    ) -> Result<(Self::Device, Self::Context, Self::SwapChain)>;

    fn create_target_view(
        &mut self,
        device: &Self::Device,
        swap_chain: &Self::SwapChain,
    ) -> Result<Self::TargetView>;

    fn resize_buffers(
        &mut self,
        device: &Self::Device,
        swap_chain: &mut Self::SwapChain,
        width: u32,
        height: u32,
    ) -> Result<()>;
}

/// Owns the device, its command context, the swap chain and the render target
/// view bound to the swap chain's back buffer.
pub struct DeviceContext<A: GraphicsApi> {
    api: A,
    device: Option<A::Device>,
    context: Option<A::Context>,
    swap_chain: Option<A::SwapChain>,
    target_view: Option<A::TargetView>,
}

impl<A: GraphicsApi> DeviceContext<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            device: None,
            context: None,
            swap_chain: None,
            target_view: None,
        }
    }

    /// Creates the device and swap chain, then the initial render target view.
    ///
    /// On failure everything created so far is released before the error is
    /// returned.
    pub fn create(&mut self, window: &A::Window, desc: &SwapChainDesc) -> Result<()> {
        if self.device.is_some() {
            bail!("The graphics device has already been created");
        }

        let (device, context, swap_chain) =
            match self.api.create_device_and_swap_chain(window, desc) {
                Ok(created) => created,
                Err(error) => {
                    self.teardown();
                    return Err(error);
                }
            };
        self.device = Some(device);
        self.context = Some(context);
        self.swap_chain = Some(swap_chain);

        if let Err(error) = self.create_target_view() {
            self.teardown();
            return Err(error);
        }

        log::info!("Graphics device created");
        Ok(())
    }

    /// Rebuilds the render target view after resizing the swap chain buffers.
    pub fn resize_render_target(&mut self, width: u32, height: u32) -> Result<()> {
        ensure!(
            width > 0 && height > 0,
            "Cannot resize the render target to ({width}, {height})"
        );

        let (Some(device), Some(swap_chain)) = (self.device.as_ref(), self.swap_chain.as_mut())
        else {
            bail!("Cannot resize the render target without a device");
        };

        log::info!("Resizing render target to: ({width}, {height})");
        self.target_view = None;
        self.api.resize_buffers(device, swap_chain, width, height)?;
        self.create_target_view()
    }

    /// Releases the view, swap chain, context and device, in that order.
    /// Safe to call any number of times.
    pub fn teardown(&mut self) {
        if self.target_view.take().is_some() {
            log::debug!("Released render target view");
        }
        if self.swap_chain.take().is_some() {
            log::debug!("Released swap chain");
        }
        if self.context.take().is_some() {
            log::debug!("Released device context");
        }
        if self.device.take().is_some() {
            log::info!("Released graphics device");
        }
    }

    pub fn is_created(&self) -> bool {
        self.device.is_some()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn device(&self) -> Option<&A::Device> {
        self.device.as_ref()
    }

    pub fn context(&self) -> Option<&A::Context> {
        self.context.as_ref()
    }

    pub fn swap_chain(&self) -> Option<&A::SwapChain> {
        self.swap_chain.as_ref()
    }

    pub fn target_view(&self) -> Option<&A::TargetView> {
        self.target_view.as_ref()
    }

    fn create_target_view(&mut self) -> Result<()> {
        let (Some(device), Some(swap_chain)) = (self.device.as_ref(), self.swap_chain.as_ref())
        else {
            bail!("Cannot create a render target view without a swap chain");
        };
        self.target_view = Some(self.api.create_target_view(device, swap_chain)?);
        Ok(())
    }
}

impl<A: GraphicsApi> Drop for DeviceContext<A> {
    fn drop(&mut self) {
        self.teardown();
    }
}

pub mod app;
pub mod device;
pub mod frame;
pub mod gui;
pub mod render;
pub mod widgets;

pub use self::{app::*, device::*, frame::*, gui::*, render::*, widgets::*};

use crate::FrameTimer;
use egui::{Context as GuiContext, Rect, Slider, Window};

/// Values the example widgets edit, kept between frames.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState {
    pub show_demo_window: bool,
    pub show_another_window: bool,
    pub value: f32,
    pub counter: i32,
    pub clear_color: [f32; 4],
}

impl Default for WidgetState {
    fn default() -> Self {
        Self {
            show_demo_window: true,
            show_another_window: false,
            value: 0.0,
            counter: 0,
            clear_color: [0.45, 0.55, 0.60, 1.00],
        }
    }
}

impl WidgetState {
    /// Background color with its alpha multiplied into the color channels.
    pub fn premultiplied_clear_color(&self) -> [f32; 4] {
        let [r, g, b, a] = self.clear_color;
        [r * a, g * a, b * a, a]
    }

    pub fn count_click(&mut self, clicked: bool) {
        if clicked {
            self.counter = self.counter.saturating_add(1);
        }
    }
}

/// Where this frame's buttons ended up on screen.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct WidgetRects {
    pub counter_button: Option<Rect>,
    pub close_button: Option<Rect>,
}

pub fn declare_widgets(
    context: &GuiContext,
    state: &mut WidgetState,
    timer: &FrameTimer,
) -> WidgetRects {
    let mut rects = WidgetRects::default();

    if state.show_demo_window {
        demo_window(context, &mut state.show_demo_window);
    }

    Window::new("Hello, world!").show(context, |ui| {
        ui.label("This is some text.");

        ui.checkbox(&mut state.show_demo_window, "Demo Window");
        ui.checkbox(&mut state.show_another_window, "Another Window");

        ui.add(Slider::new(&mut state.value, 0.0..=1.0).text("float"));

        ui.horizontal(|ui| {
            let [r, g, b, _] = state.clear_color;
            let mut rgb = [r, g, b];
            if ui.color_edit_button_rgb(&mut rgb).changed() {
                state.clear_color[..3].copy_from_slice(&rgb);
            }
            ui.label("clear color");
        });

        ui.horizontal(|ui| {
            let button = ui.button("Button");
            rects.counter_button = Some(button.rect);
            state.count_click(button.clicked());
            ui.label(format!("counter = {}", state.counter));
        });

        ui.label(format!(
            "Application average {:.3} ms/frame ({:.1} FPS)",
            timer.milliseconds_per_frame(),
            timer.frames_per_second()
        ));
    });

    if state.show_another_window {
        let mut open = true;
        let mut close_requested = false;
        Window::new("Another Window").open(&mut open).show(context, |ui| {
            ui.label("Hello from another window!");
            let button = ui.button("Close Me");
            rects.close_button = Some(button.rect);
            close_requested = button.clicked();
        });
        state.show_another_window = open && !close_requested;
    }

    rects
}

/// The library's own settings, inspection and memory panels.
fn demo_window(context: &GuiContext, open: &mut bool) {
    Window::new("egui Demo")
        .open(open)
        .vscroll(true)
        .default_width(360.0)
        .show(context, |ui| {
            ui.collapsing("Settings", |ui| context.settings_ui(ui));
            ui.collapsing("Inspection", |ui| context.inspection_ui(ui));
            ui.collapsing("Memory", |ui| context.memory_ui(ui));
        });
}

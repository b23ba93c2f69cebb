use std::ops::RangeInclusive;

use pass::ParameterUi;

/// Draws each stage panel as its own egui window.
pub struct EguiPanels<'a> {
    ctx: &'a egui::Context,
}

impl<'a> EguiPanels<'a> {
    pub fn new(ctx: &'a egui::Context) -> Self {
        Self { ctx }
    }
}

impl ParameterUi for EguiPanels<'_> {
    fn panel(
        &mut self,
        title: &str,
        contents: &mut dyn FnMut(&mut dyn ParameterUi) -> bool,
    ) -> bool {
        egui::Window::new(title)
            .resizable(false)
            .default_width(220.)
            .show(self.ctx, |ui| contents(&mut PanelUi { ui }))
            .and_then(|response| response.inner)
            .unwrap_or(false)
    }

    fn slider(&mut self, label: &str, value: &mut f32, range: RangeInclusive<f32>) -> bool {
        self.panel(label, &mut |ui: &mut dyn ParameterUi| ui.slider(label, value, range.clone()))
    }

    fn checkbox(&mut self, label: &str, value: &mut bool) -> bool {
        self.panel(label, &mut |ui: &mut dyn ParameterUi| ui.checkbox(label, value))
    }

    fn file_input(&mut self, label: &str, path: &mut String) -> bool {
        self.panel(label, &mut |ui: &mut dyn ParameterUi| ui.file_input(label, path))
    }
}

/// Widgets inside an open window. Nested panels become collapsing headers.
struct PanelUi<'a> {
    ui: &'a mut egui::Ui,
}

impl ParameterUi for PanelUi<'_> {
    fn panel(
        &mut self,
        title: &str,
        contents: &mut dyn FnMut(&mut dyn ParameterUi) -> bool,
    ) -> bool {
        self.ui
            .collapsing(title, |ui| contents(&mut PanelUi { ui }))
            .body_returned
            .unwrap_or(false)
    }

    fn slider(&mut self, label: &str, value: &mut f32, range: RangeInclusive<f32>) -> bool {
        self.ui
            .add(egui::Slider::new(value, range).text(label))
            .changed()
    }

    fn checkbox(&mut self, label: &str, value: &mut bool) -> bool {
        self.ui.checkbox(value, label).changed()
    }

    fn file_input(&mut self, label: &str, path: &mut String) -> bool {
        self.ui
            .horizontal(|ui| {
                ui.label(label);
                let edit = ui.text_edit_singleline(path);
                let submitted = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                ui.button("Load").clicked() || submitted
            })
            .inner
    }
}

use std::ops::RangeInclusive;

/// Widgets a stage uses to expose its parameters.
///
/// Each method reports whether the user changed something this frame.
pub trait ParameterUi {
    fn panel(&mut self, title: &str, contents: &mut dyn FnMut(&mut dyn ParameterUi) -> bool)
        -> bool;

    fn slider(&mut self, label: &str, value: &mut f32, range: RangeInclusive<f32>) -> bool;

    fn checkbox(&mut self, label: &str, value: &mut bool) -> bool;

    /// Editable path with a load action. Returns `true` when the user asks to
    /// load the current contents of `path`.
    fn file_input(&mut self, label: &str, path: &mut String) -> bool;
}

/// A UI that draws nothing and never edits anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUi;

impl ParameterUi for NoUi {
    fn panel(
        &mut self,
        _title: &str,
        contents: &mut dyn FnMut(&mut dyn ParameterUi) -> bool,
    ) -> bool {
        contents(self)
    }

    fn slider(&mut self, _label: &str, _value: &mut f32, _range: RangeInclusive<f32>) -> bool {
        false
    }

    fn checkbox(&mut self, _label: &str, _value: &mut bool) -> bool {
        false
    }

    fn file_input(&mut self, _label: &str, _path: &mut String) -> bool {
        false
    }
}

use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub value: f32,
    pub default: f32,
    pub range: RangeInclusive<f32>,
}

impl Param {
    pub fn new(name: &'static str, default: f32, range: RangeInclusive<f32>) -> Self {
        Self {
            name,
            value: default,
            default,
            range,
        }
    }
}

/// Adjustable scalar parameters of one stage.
///
/// Values are stored as given. Keeping them inside `range` is left to
/// whatever edits them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    params: Vec<Param>,
}

impl ParamSet {
    pub fn new(params: impl IntoIterator<Item = Param>) -> Self {
        let mut set = Self::default();
        for param in params {
            set.push(param);
        }
        set
    }

    fn push(&mut self, param: Param) {
        debug_assert!(
            self.find(param.name).is_none(),
            "duplicate parameter {}",
            param.name
        );
        self.params.push(param);
    }

    fn find(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.find(name).map(|param| param.value)
    }

    /// Returns the current value. Panics on a name the stage never declared.
    pub fn value(&self, name: &str) -> f32 {
        match self.get(name) {
            Some(value) => value,
            None => panic!("unknown parameter {name}"),
        }
    }

    /// Sets `name` to `value`. Returns `false` if there is no such parameter.
    pub fn set(&mut self, name: &str, value: f32) -> bool {
        match self.params.iter_mut().find(|param| param.name == name) {
            Some(param) => {
                param.value = value;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        for param in &mut self.params {
            param.value = param.default;
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.params.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Param> {
        self.params.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

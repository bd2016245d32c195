#[derive(Clone, Debug, PartialEq)]
pub struct Percentage {
    num_of_steps: usize,
    completed_steps: usize,
}

impl Percentage {
    pub fn new(num_of_steps: usize) -> Self {
        Self {
            num_of_steps,
            completed_steps: 0,
        }
    }

    pub fn increment(&mut self) {
        self.completed_steps = (self.completed_steps + 1).min(self.num_of_steps);
    }

    pub fn value(&self) -> f32 {
        self.completed_steps as f32 / self.num_of_steps as f32
    }
}

/// One step of a build, as reported to whoever drives the [`crate::Builder`].
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub message: String,
    pub percentage: Percentage,
}

use std::time::Instant;

/// Rolling average over the last few frame times.
pub struct FpsCounter {
    cache: [f64; Self::LEN],
    head: usize,
    filled: usize,
    inst: Instant,
}

impl FpsCounter {
    const LEN: usize = 8;

    pub fn new() -> Self {
        Self {
            cache: [0.; Self::LEN],
            head: 0,
            filled: 0,
            inst: Instant::now(),
        }
    }

    /// Records a frame boundary and returns the average frame time in seconds.
    pub fn record(&mut self) -> f64 {
        self.cache[self.head] = self.inst.elapsed().as_secs_f64();
        self.head = (self.head + 1) % Self::LEN;
        self.filled = (self.filled + 1).min(Self::LEN);
        self.inst = Instant::now();
        self.frame_time()
    }

    pub fn frame_time(&self) -> f64 {
        if self.filled == 0 {
            return 0.;
        }
        self.cache[..self.filled].iter().sum::<f64>() / self.filled as f64
    }

    pub fn fps(&self) -> f64 {
        match self.frame_time() {
            t if t > 0. => 1. / t,
            _ => 0.,
        }
    }
}

//! Rolling noise-floor estimator.
//!
//! Fixed-capacity ring of block energies. Pushing into a full window
//! overwrites the oldest entry, so the window always describes the most
//! recent quiet period. The session only pushes while the gate is OFF.

/// Lower bound on the reported standard deviation.
pub const MIN_STD: f64 = 1e-6;

/// Mean and standard deviation of the window, in dB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseStatistics {
    pub mean: f64,
    pub std: f64,
}

/// Bounded FIFO window of energy samples.
#[derive(Debug, Clone)]
pub struct NoiseWindow {
    data: Vec<f64>,
    write_pos: usize,
    count: usize,
}

impl NoiseWindow {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            write_pos: 0,
            count: 0,
        }
    }

    /// Append a sample, evicting the oldest if the window is full.
    pub fn push(&mut self, sample: f64) {
        let capacity = self.capacity();
        self.data[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.count = 0;
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let capacity = self.capacity();
        let start = (self.write_pos + capacity - self.count) % capacity;
        (0..self.count).map(move |i| self.data[(start + i) % capacity])
    }

    /// Population mean and standard deviation, std floored at [`MIN_STD`].
    pub fn statistics(&self) -> NoiseStatistics {
        if self.count == 0 {
            return NoiseStatistics {
                mean: 0.0,
                std: MIN_STD,
            };
        }
        let n = self.count as f64;
        let mean = self.iter().sum::<f64>() / n;
        let variance = self.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
        NoiseStatistics {
            mean,
            std: variance.sqrt().max(MIN_STD),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fills_then_evicts_oldest() {
        let mut w = NoiseWindow::new(3);
        assert!(w.is_empty());
        w.push(1.0);
        w.push(2.0);
        assert_eq!(w.len(), 2);
        assert!(!w.is_full());

        w.push(3.0);
        assert!(w.is_full());
        w.push(4.0);
        w.push(5.0);
        assert_eq!(w.len(), 3);
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_statistics() {
        let mut w = NoiseWindow::new(4);
        for x in [2.0, 4.0, 4.0, 6.0] {
            w.push(x);
        }
        let stats = w.statistics();
        assert_relative_eq!(stats.mean, 4.0);
        assert_relative_eq!(stats.std, 2f64.sqrt());
    }

    #[test]
    fn test_constant_window_std_is_floored() {
        let mut w = NoiseWindow::new(8);
        for _ in 0..8 {
            w.push(-60.0);
        }
        let stats = w.statistics();
        assert_relative_eq!(stats.mean, -60.0);
        assert_eq!(stats.std, MIN_STD);
    }

    #[test]
    fn test_empty_and_clear() {
        let mut w = NoiseWindow::new(2);
        assert_eq!(w.statistics().std, MIN_STD);
        w.push(1.0);
        w.push(2.0);
        w.push(3.0);
        w.clear();
        assert!(w.is_empty());
        w.push(7.0);
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![7.0]);
    }
}

/// Simple Moving Average over a fixed trailing window.
///
/// The value at index `i` is the arithmetic mean of the `window` values ending
/// at `i`. Positions with fewer than `window` values behind them are `None`;
/// they are never zero-filled or back-filled, so a crossover can't be read off
/// fabricated leading values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmaIndicator {
    pub window: usize,
}

impl SmaIndicator {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// One output per input, oldest first. A zero window yields all `None`.
    pub fn compute(&self, values: &[f64]) -> Vec<Option<f64>> {
        let mut out = vec![None; values.len()];
        if self.window == 0 || self.window > values.len() {
            return out;
        }

        let divisor = self.window as f64;
        for (i, slice) in values.windows(self.window).enumerate() {
            out[i + self.window - 1] = Some(slice.iter().sum::<f64>() / divisor);
        }
        out
    }
}

/// Fixed-point exponential moving average for ADC readings.
///
/// The accumulator holds the average scaled by `2^SHIFT`; each sample moves
/// it by `1/2^SHIFT` of the difference, giving a ~128-sample time constant.
pub struct EmaFilter {
    acc: i32,
}

impl EmaFilter {
    pub const SHIFT: u32 = 7;

    pub const fn new() -> Self {
        Self { acc: 0 }
    }

    /// Feed one raw sample and return the smoothed value.
    ///
    /// An empty accumulator is seeded from the sample first, so the first
    /// reading comes back unchanged instead of ramping up from zero.
    pub fn filter(&mut self, raw: u16) -> i32 {
        let x = raw as i32;
        if self.acc == 0 {
            self.acc = x << Self::SHIFT;
        }
        self.acc = x + self.acc - (self.acc >> Self::SHIFT);
        self.acc >> Self::SHIFT
    }

    pub fn reset(&mut self) {
        self.acc = 0;
    }
}

impl Default for EmaFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_passes_through() {
        let mut f = EmaFilter::new();
        assert_eq!(f.filter(1234), 1234);
        assert_eq!(f.filter(1234), 1234);
    }

    #[test]
    fn step_moves_by_one_128th() {
        let mut f = EmaFilter::new();
        assert_eq!(f.filter(1000), 1000);
        // acc = 1128 + 128000 - 1000
        assert_eq!(f.filter(1128), 1001);
        assert_eq!(f.acc, 128128);
    }

    #[test]
    fn converges_to_constant_input() {
        let mut f = EmaFilter::new();
        f.filter(4000);
        let mut out = 0;
        for _ in 0..2000 {
            out = f.filter(100);
        }
        assert!((out - 100).abs() <= 1, "out = {out}");
    }

    #[test]
    fn zero_accumulator_reseeds() {
        let mut f = EmaFilter::new();
        assert_eq!(f.filter(0), 0);
        assert_eq!(f.filter(500), 500);

        f.reset();
        assert_eq!(f.filter(42), 42);
    }
}

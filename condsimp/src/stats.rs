//! Statistics collected while simplifying a trace.

use std::{
    cmp, fmt,
    ops::{Add, AddAssign},
    time::Duration,
};

pub trait MetricsUnit: Copy + Default + PartialOrd + Add<Output = Self> + AddAssign {
    fn as_f64(&self) -> f64;
    fn display(&self, f: &mut fmt::Formatter) -> fmt::Result;
    fn display_f64(x: f64, f: &mut fmt::Formatter) -> fmt::Result;
}

impl MetricsUnit for Duration {
    fn as_f64(&self) -> f64 {
        self.as_secs_f64()
    }

    fn display(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display_f64(x: f64, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", Duration::from_secs_f64(x.max(0.0)))
    }
}

impl MetricsUnit for usize {
    fn as_f64(&self) -> f64 {
        *self as f64
    }

    fn display(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }

    fn display_f64(x: f64, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.02}", x)
    }
}

/// Metrics over a series of samples, each one keyed by the line it came from. The mean and
/// standard deviation are kept up to date as samples are added.
#[derive(Debug, Clone)]
pub struct LineMetrics<T: MetricsUnit> {
    total: T,
    count: usize,
    mean: f64,
    max: Option<(usize, T)>,

    /// The sum of the squared distances of every sample to the mean, that is,
    /// `variance * (n - 1)`.
    sum_of_squared_distances: f64,
}

impl<T: MetricsUnit> Default for LineMetrics<T> {
    fn default() -> Self {
        Self {
            total: T::default(),
            count: 0,
            mean: 0.0,
            max: None,
            sum_of_squared_distances: 0.0,
        }
    }
}

impl<T: MetricsUnit> LineMetrics<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, line: usize, value: T) {
        let old_mean = self.mean;

        self.total += value;
        self.count += 1;
        self.mean = self.total.as_f64() / self.count as f64;

        // Welford's online algorithm
        let x = value.as_f64();
        self.sum_of_squared_distances += (x - self.mean) * (x - old_mean);

        match &mut self.max {
            // On ties, the first line is kept
            Some(max) if value > max.1 => *max = (line, value),
            Some(_) => (),
            None => self.max = Some((line, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn total(&self) -> T {
        self.total
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// The line with the largest sample, and that sample.
    pub fn max(&self) -> Option<(usize, T)> {
        self.max
    }

    pub fn standard_deviation(&self) -> f64 {
        let count = cmp::max(2, self.count) - 1;
        (self.sum_of_squared_distances / count as f64).sqrt()
    }
}

struct DisplayF64<T>(f64, std::marker::PhantomData<T>);

impl<T: MetricsUnit> fmt::Display for DisplayF64<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        T::display_f64(self.0, f)
    }
}

struct DisplayUnit<T: MetricsUnit>(T);

impl<T: MetricsUnit> fmt::Display for DisplayUnit<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.display(f)
    }
}

impl<T: MetricsUnit> fmt::Display for LineMetrics<T> {
    /// With the alternate flag, prints the total instead of the mean and standard deviation.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mean = DisplayF64::<T>(self.mean, std::marker::PhantomData);
        if f.alternate() {
            write!(f, "{} ({} * {})", DisplayUnit(self.total), mean, self.count)
        } else {
            let deviation = DisplayF64::<T>(self.standard_deviation(), std::marker::PhantomData);
            write!(f, "{} ± {}", mean, deviation)
        }
    }
}

/// The time spent on each phase of processing a single line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineMeasurement {
    pub parsing: Duration,
    pub simplifying: Duration,
    pub proving: Duration,
    pub total: Duration,
}

/// Statistics for a whole run.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub lines: usize,
    pub tokens: usize,
    pub size_before: LineMetrics<usize>,
    pub size_after: LineMetrics<usize>,
    pub parsing: LineMetrics<Duration>,
    pub simplifying: LineMetrics<Duration>,
    pub proving: LineMetrics<Duration>,
    pub total: LineMetrics<Duration>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(
        &mut self,
        line: usize,
        num_tokens: usize,
        sizes: (usize, usize),
        measurement: LineMeasurement,
    ) {
        self.lines += 1;
        self.tokens += num_tokens;
        self.size_before.add_sample(line, sizes.0);
        self.size_after.add_sample(line, sizes.1);
        self.parsing.add_sample(line, measurement.parsing);
        self.simplifying.add_sample(line, measurement.simplifying);
        self.proving.add_sample(line, measurement.proving);
        self.total.add_sample(line, measurement.total);
    }

    /// The ratio between the total size after and before simplification, or `None` if no
    /// conditions were processed.
    pub fn reduction_ratio(&self) -> Option<f64> {
        let before = self.size_before.total();
        (before > 0).then(|| self.size_after.total() as f64 / before as f64)
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "lines:             {}", self.lines)?;
        writeln!(f, "tokens:            {}", self.tokens)?;
        if self.size_before.is_empty() {
            return Ok(());
        }
        writeln!(f, "size before:       {:#}", self.size_before)?;
        writeln!(f, "size after:        {:#}", self.size_after)?;
        if let Some(ratio) = self.reduction_ratio() {
            writeln!(f, "size ratio:        {:.04}", ratio)?;
        }
        writeln!(f, "parsing:           {:#}", self.parsing)?;
        writeln!(f, "simplifying:       {:#}", self.simplifying)?;
        writeln!(f, "proving:           {:#}", self.proving)?;
        writeln!(f, "total:             {:#}", self.total)?;
        writeln!(f, "    per line:      {}", self.total)?;
        if let Some((line, time)) = self.total.max() {
            writeln!(f, "slowest line:      {} ({:?})", line, time)?;
        }
        if let Some((line, size)) = self.size_before.max() {
            writeln!(f, "largest condition: {} (line {})", size, line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_metrics() {
        let mut m = LineMetrics::new();
        assert!(m.is_empty());
        assert_eq!(m.max(), None);

        for (line, value) in [(1, 2usize), (2, 4), (3, 4), (4, 4), (5, 5), (6, 5), (7, 7), (8, 9)] {
            m.add_sample(line, value);
        }
        assert_eq!(m.count(), 8);
        assert_eq!(m.total(), 40);
        assert!((m.mean() - 5.0).abs() < 1e-9);

        // The sample variance of this series is 32 / 7
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((m.standard_deviation() - expected).abs() < 1e-9);
        assert_eq!(m.max(), Some((8, 9)));
    }

    #[test]
    fn test_ties_keep_first_line() {
        let mut m = LineMetrics::new();
        m.add_sample(3, Duration::from_millis(10));
        m.add_sample(4, Duration::from_millis(10));
        assert_eq!(m.max(), Some((3, Duration::from_millis(10))));
    }

    #[test]
    fn test_stats() {
        let mut stats = Stats::new();
        assert_eq!(stats.reduction_ratio(), None);

        stats.add_line(1, 5, (5, 3), LineMeasurement::default());
        stats.add_line(2, 7, (7, 1), LineMeasurement::default());
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.tokens, 12);
        assert_eq!(stats.size_before.total(), 12);
        assert_eq!(stats.size_after.total(), 4);
        assert!((stats.reduction_ratio().unwrap() - 4.0 / 12.0).abs() < 1e-9);
        assert_eq!(format!("{:#}", stats.size_after), "4 (2.00 * 2)");
    }
}

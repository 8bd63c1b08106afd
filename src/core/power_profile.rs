use crate::core::units::{watt_days_to_kilowatt_hours, DAYS_PER_YEAR};
use csv::WriterBuilder;
use std::f64::consts::PI;
use std::io::Write;
use thiserror::Error;
use tracing::info;

/// Annual thermal demand per metre of borehole, in W/m, for days 1..=365.
///
/// value(d) = A - B cos(2πd/365)
pub fn annual_curve(coefficient_a: f64, coefficient_b: f64) -> Vec<f64> {
    (1..=DAYS_PER_YEAR)
        .map(|day| coefficient_a - (2. * PI / DAYS_PER_YEAR as f64 * day as f64).cos() * coefficient_b)
        .collect()
}

#[derive(Clone, Copy, Debug, Error, PartialEq)]
#[error("No powerprofile entry for time step {step} (profile covers steps 1 to {len})")]
pub struct PowerProfileError {
    pub step: usize,
    pub len: usize,
}

/// Aggregate heat extraction/injection over the simulated horizon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProfileEnergySummary {
    /// Integral of the positive part of the profile, in kWh/m
    pub q_in: f64,
    /// Integral of the negative part of the profile, in kWh/m
    pub q_out: f64,
    /// |Q_out / Q_in|, NaN when Q_in is zero
    pub eta: f64,
}

/// The annual curve tiled over every simulated year. Entries are addressed by the
/// absolute (1-based) time step rather than the day of the year.
#[derive(Clone, Debug)]
pub struct PowerProfile {
    values: Vec<f64>,
    summary: ProfileEnergySummary,
}

impl PowerProfile {
    pub fn tile(years: u32, coefficient_a: f64, coefficient_b: f64) -> Self {
        let annual = annual_curve(coefficient_a, coefficient_b);
        let values: Vec<f64> = annual
            .iter()
            .copied()
            .cycle()
            .take(annual.len() * years as usize)
            .collect();

        let positive: Vec<f64> = values.iter().map(|value| value.max(0.)).collect();
        let negative: Vec<f64> = values.iter().map(|value| value.min(0.)).collect();

        // days are sampled at unit spacing
        let q_in = simpson(&positive, 1.);
        let q_out = simpson(&negative, 1.);
        let eta = if q_in != 0. {
            (q_out / q_in).abs()
        } else {
            f64::NAN
        };

        let summary = ProfileEnergySummary {
            q_in: watt_days_to_kilowatt_hours(q_in),
            q_out: watt_days_to_kilowatt_hours(q_out),
            eta,
        };

        info!("Q_in  = {:.0} kWh m⁻¹", summary.q_in);
        info!("Q_out = {:.0} kWh m⁻¹", summary.q_out);
        info!("eta   = {:.2}", summary.eta);

        Self { values, summary }
    }

    /// Demand in W/m for the given 1-based time step.
    pub fn demand_at(&self, step: usize) -> Result<f64, PowerProfileError> {
        step.checked_sub(1)
            .and_then(|idx| self.values.get(idx))
            .copied()
            .ok_or(PowerProfileError {
                step,
                len: self.values.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn summary(&self) -> ProfileEnergySummary {
        self.summary
    }

    /// Write the tiled profile as a `day,power` table.
    pub fn write_csv(&self, writer: impl Write) -> anyhow::Result<()> {
        let mut writer = WriterBuilder::new().from_writer(writer);
        writer.write_record(["day", "power"])?;
        for (idx, power) in self.values.iter().enumerate() {
            writer.write_record([(idx + 1).to_string(), power.to_string()])?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Composite Simpson's rule over equally spaced samples.
///
/// With an odd number of intervals the result averages the two ways of closing the
/// final interval with the trapezoidal rule (Simpson on the first N-1 points plus a
/// trapezoid on the last interval, and a trapezoid on the first interval plus Simpson
/// on the last N-1 points).
fn simpson(samples: &[f64], dx: f64) -> f64 {
    fn basic(samples: &[f64], dx: f64) -> f64 {
        // samples.len() is odd here
        let last = samples.len() - 1;
        let interior: f64 = samples[1..last]
            .iter()
            .enumerate()
            .map(|(idx, value)| if idx % 2 == 0 { 4. * value } else { 2. * value })
            .sum();
        dx / 3. * (samples[0] + interior + samples[last])
    }

    match samples.len() {
        0 | 1 => 0.,
        2 => 0.5 * dx * (samples[0] + samples[1]),
        n if n % 2 == 1 => basic(samples, dx),
        n => {
            let closing_last = basic(&samples[..n - 1], dx)
                + 0.5 * dx * (samples[n - 2] + samples[n - 1]);
            let closing_first = 0.5 * dx * (samples[0] + samples[1]) + basic(&samples[1..], dx);
            0.5 * (closing_last + closing_first)
        }
    }
}

//! Refrigeration Unit Simulation
//!
//! Generates synthetic freezer telemetry for exercising FrostGuard.
//! Simulates a sequence of operating conditions:
//! - Normal cooling (steady state)
//! - High power draw (compressor overload)
//! - High superheat (refrigerant starvation)
//! - Poor cooling (door-open heat load)
//! - Vibration fault (fan/compressor mount)
//! - Recovery
//!
//! # Usage
//! ```bash
//! ./simulation --samples 2000 --format json | ./frostguard --stdin
//! ./simulation --samples 2000 --format csv > telemetry.csv
//! ```

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::io::{self, Write};
use std::time::Instant;

use frostguard::acquisition::parse_timestamp;
use frostguard::types::{Sample, RAW_CHANNELS};

// ============================================================================
// Unit Constants
// ============================================================================

/// Cabinet setpoint (°C)
const BASE_TEMP: f64 = -18.0;
/// Evaporator temperature at steady state (°C)
const BASE_EVAP: f64 = -26.0;
/// Steady-state power draw (W)
const BASE_POWER: f64 = 520.0;
/// Fan speed (RPM)
const BASE_FAN: f64 = 1200.0;
/// Compressor speed (RPM)
const BASE_COMP: f64 = 1800.0;
/// Vibration level (g RMS)
const BASE_VIB: f64 = 0.25;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "frostguard-simulation")]
#[command(about = "Synthetic refrigeration telemetry for FrostGuard testing")]
#[command(version = "1.0")]
struct Args {
    /// Number of samples to generate
    #[arg(short = 'n', long, default_value = "2000", value_parser = clap::value_parser!(u32).range(2..=1_000_000))]
    samples: u32,

    /// Seconds between samples (at most one day)
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=86_400))]
    interval_secs: u32,

    /// Time compression factor (0 = as fast as possible)
    #[arg(short, long, default_value = "0")]
    speed: u32,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Timestamp of the first sample (RFC 3339)
    #[arg(long, default_value = "2025-01-01T00:00:00Z")]
    start: String,

    /// Fraction of samples with one channel blanked out
    #[arg(long, default_value = "0.0")]
    missing_rate: f64,

    /// Suppress mission log (only output sensor data)
    #[arg(short, long)]
    quiet: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// Simulation Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Steady-state cooling (0-40%)
    NormalCooling,
    /// Compressor overload, power above 900 W (40-52%)
    HighPower,
    /// Refrigerant starvation, superheat above 12 °C (52-64%)
    HighSuperheat,
    /// Repeated door openings, temperature jumps (64-76%)
    PoorCooling,
    /// Loose mount, vibration above 1.5 g (76-88%)
    VibrationFault,
    /// Return to normal (88-100%)
    Recovery,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::NormalCooling => "Normal Cooling (Steady State)",
            Phase::HighPower => "High Power (Compressor Overload)",
            Phase::HighSuperheat => "High Superheat (Refrigerant Starvation)",
            Phase::PoorCooling => "Poor Cooling (Door-Open Heat Load)",
            Phase::VibrationFault => "Vibration Fault (Loose Mount)",
            Phase::Recovery => "Recovery (Return to Normal)",
        }
    }

    fn expectation(&self) -> &'static str {
        match self {
            Phase::NormalCooling => "Expected: NORMAL risk, default commands",
            Phase::HighPower => "Expected: power anomalies, compressor REDUCED",
            Phase::HighSuperheat => "Expected: temperature anomalies, EEV OPEN",
            Phase::PoorCooling => "Expected: temperature anomalies, fan HIGH",
            Phase::VibrationFault => "Expected: vibration anomalies, safety throttle",
            Phase::Recovery => "Expected: anomalies clearing",
        }
    }

    fn from_progress(progress: f64) -> Self {
        match progress {
            p if p < 0.40 => Phase::NormalCooling,
            p if p < 0.52 => Phase::HighPower,
            p if p < 0.64 => Phase::HighSuperheat,
            p if p < 0.76 => Phase::PoorCooling,
            p if p < 0.88 => Phase::VibrationFault,
            _ => Phase::Recovery,
        }
    }

    fn is_fault(&self) -> bool {
        !matches!(self, Phase::NormalCooling | Phase::Recovery)
    }
}

// ============================================================================
// Simulation State
// ============================================================================

struct SimulationState {
    rng: StdRng,
    current_phase: Phase,
    index: u32,
    total: u32,
    start: DateTime<Utc>,
    interval: Duration,
    missing_rate: f64,

    // Current readings
    temperature: f64,
    evap_temp: f64,
    power: f64,
    fan: f64,
    compressor: f64,
    vibration: f64,

    // Statistics
    fault_samples: u64,
    blanked_samples: u64,

    noise: Normal<f64>,
}

impl SimulationState {
    fn new(args: &Args, start: DateTime<Utc>) -> Result<Self, Box<dyn std::error::Error>> {
        let rng = match args.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            rng,
            current_phase: Phase::NormalCooling,
            index: 0,
            total: args.samples,
            start,
            interval: Duration::seconds(i64::from(args.interval_secs)),
            missing_rate: args.missing_rate.clamp(0.0, 1.0),
            temperature: BASE_TEMP,
            evap_temp: BASE_EVAP,
            power: BASE_POWER,
            fan: BASE_FAN,
            compressor: BASE_COMP,
            vibration: BASE_VIB,
            fault_samples: 0,
            blanked_samples: 0,
            noise: Normal::new(0.0, 1.0)?,
        })
    }

    /// Timestamp of sample `index`, or an error if it leaves chrono's range.
    fn timestamp_at(&self, index: u32) -> Result<DateTime<Utc>, String> {
        i32::try_from(index)
            .ok()
            .and_then(|i| self.interval.checked_mul(i))
            .and_then(|offset| self.start.checked_add_signed(offset))
            .ok_or_else(|| format!("Timestamp of sample {index} is out of range"))
    }

    fn progress(&self) -> f64 {
        f64::from(self.index) / f64::from(self.total)
    }

    /// Progress through the current phase window, 0..1
    fn phase_progress(&self, from: f64, to: f64) -> f64 {
        ((self.progress() - from) / (to - from)).clamp(0.0, 1.0)
    }

    fn update_phase(&mut self) -> bool {
        let new_phase = Phase::from_progress(self.progress());
        if new_phase != self.current_phase {
            self.current_phase = new_phase;
            true
        } else {
            false
        }
    }

    fn n(&mut self, sigma: f64) -> f64 {
        self.noise.sample(&mut self.rng) * sigma
    }

    /// Update readings based on current phase
    fn update_readings(&mut self) {
        let steady_temp = BASE_TEMP + self.n(0.15);
        self.evap_temp = BASE_EVAP + self.n(0.2);
        self.power = BASE_POWER + self.n(12.0);
        self.fan = BASE_FAN + self.n(15.0);
        self.compressor = BASE_COMP + self.n(20.0);
        self.vibration = (BASE_VIB + self.n(0.03)).max(0.0);

        match self.current_phase {
            Phase::NormalCooling => {
                self.temperature = steady_temp;
            }

            Phase::HighPower => {
                let severity = self.phase_progress(0.40, 0.52);
                self.temperature = steady_temp;
                self.power = 940.0 + 160.0 * severity + self.n(25.0);
                self.compressor = 2050.0 + 150.0 * severity + self.n(20.0);
            }

            Phase::HighSuperheat => {
                let severity = self.phase_progress(0.52, 0.64);
                self.temperature = steady_temp + 1.5 * severity;
                self.evap_temp = BASE_EVAP - 6.0 - 4.0 * severity + self.n(0.3);
                self.power = BASE_POWER - 60.0 + self.n(12.0);
            }

            Phase::PoorCooling => {
                // Door opens every 40 samples; three quick temperature jumps,
                // then the unit pulls back down.
                let cycle = self.index % 40;
                if cycle < 3 {
                    self.temperature += 3.5 + self.n(0.3).abs();
                } else {
                    self.temperature = (self.temperature - 1.2).max(steady_temp);
                }
                self.fan = BASE_FAN + 150.0 + self.n(15.0);
                self.power = BASE_POWER + 120.0 + self.n(15.0);
            }

            Phase::VibrationFault => {
                let severity = self.phase_progress(0.76, 0.88);
                self.temperature = (self.temperature - 1.2).max(steady_temp);
                self.vibration = 1.6 + 0.9 * severity + self.n(0.1).abs();
                self.fan = BASE_FAN + self.n(60.0);
            }

            Phase::Recovery => {
                self.temperature = (self.temperature - 0.8).max(steady_temp);
            }
        }

        if self.current_phase.is_fault() {
            self.fault_samples += 1;
        }
    }

    /// Generate one sample
    fn generate_sample(&mut self) -> Result<Sample, String> {
        let timestamp = self.timestamp_at(self.index)?;
        self.update_readings();
        self.index += 1;

        let mut sample = Sample::complete(
            timestamp,
            round_to(self.temperature, 2),
            round_to(self.evap_temp, 2),
            round_to(self.power, 1),
            round_to(self.fan, 0),
            round_to(self.compressor, 0),
            round_to(self.vibration, 3),
        );

        if self.missing_rate > 0.0 && self.rng.gen::<f64>() < self.missing_rate {
            self.blanked_samples += 1;
            match self.rng.gen_range(0..RAW_CHANNELS.len()) {
                0 => sample.temperature = None,
                1 => sample.evap_temp = None,
                2 => sample.power_watts = None,
                3 => sample.fan_rpm = None,
                4 => sample.compressor_rpm = None,
                _ => sample.vibration = None,
            }
        }
        Ok(sample)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn csv_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ============================================================================
// Logging Utilities
// ============================================================================

fn log_mission(ts: DateTime<Utc>, message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[{}] {}", ts.format("%H:%M:%S"), message);
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let start = parse_timestamp(&args.start)
        .ok_or_else(|| format!("Cannot parse --start '{}'", args.start))?;

    let mut state = SimulationState::new(&args, start)?;
    let sample_interval_real = (args.speed > 0).then(|| {
        std::time::Duration::from_secs_f64(f64::from(args.interval_secs) / f64::from(args.speed))
    });

    // Mission briefing
    log_mission(start, &"=".repeat(70), args.quiet);
    log_mission(start, "REFRIGERATION UNIT SIMULATION v1.0", args.quiet);
    log_mission(start, "FrostGuard Test Data Generator", args.quiet);
    log_mission(start, &"=".repeat(70), args.quiet);
    log_mission(start, &format!("  Setpoint: {BASE_TEMP:.1} °C | Evap: {BASE_EVAP:.1} °C"), args.quiet);
    log_mission(start, &format!("  Power: {BASE_POWER:.0} W | Fan: {BASE_FAN:.0} RPM | Compressor: {BASE_COMP:.0} RPM"), args.quiet);
    log_mission(start, &format!("  Samples: {} every {}s", args.samples, args.interval_secs), args.quiet);
    if let Some(seed) = args.seed {
        log_mission(start, &format!("  Random seed: {seed}"), args.quiet);
    }
    log_mission(start, "", args.quiet);
    log_mission(start, "SCENARIO PHASES:", args.quiet);
    log_mission(start, "  0-40%:   Normal Cooling", args.quiet);
    log_mission(start, "  40-52%:  High Power", args.quiet);
    log_mission(start, "  52-64%:  High Superheat", args.quiet);
    log_mission(start, "  64-76%:  Poor Cooling", args.quiet);
    log_mission(start, "  76-88%:  Vibration Fault", args.quiet);
    log_mission(start, "  88-100%: Recovery", args.quiet);
    log_mission(start, &"=".repeat(70), args.quiet);

    let started = Instant::now();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.format == Format::Csv {
        writeln!(out, "timestamp,{}", RAW_CHANNELS.join(","))?;
    }

    while state.index < state.total {
        let loop_start = Instant::now();
        let now = state.timestamp_at(state.index)?;

        if state.update_phase() {
            log_mission(now, &format!(">>> PHASE: {}", state.current_phase.name()), args.quiet);
            log_mission(now, &format!("    {}", state.current_phase.expectation()), args.quiet);
        }

        let sample = state.generate_sample()?;
        match args.format {
            Format::Json => writeln!(out, "{}", serde_json::to_string(&sample)?)?,
            Format::Csv => writeln!(
                out,
                "{},{},{},{},{},{},{}",
                sample.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                csv_cell(sample.temperature),
                csv_cell(sample.evap_temp),
                csv_cell(sample.power_watts),
                csv_cell(sample.fan_rpm),
                csv_cell(sample.compressor_rpm),
                csv_cell(sample.vibration),
            )?,
        }

        if let Some(interval) = sample_interval_real {
            out.flush()?;
            let elapsed = loop_start.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }
    out.flush()?;
    drop(out);

    let end = state.timestamp_at(state.index)?;
    log_mission(end, &"=".repeat(70), args.quiet);
    log_mission(end, "SIMULATION COMPLETE", args.quiet);
    log_mission(end, &format!("Total samples: {}", state.index), args.quiet);
    log_mission(end, &format!("Fault-phase samples: {}", state.fault_samples), args.quiet);
    log_mission(end, &format!("Samples with a blanked channel: {}", state.blanked_samples), args.quiet);
    log_mission(end, &format!("Real time: {:.1}s", started.elapsed().as_secs_f64()), args.quiet);
    log_mission(end, &"=".repeat(70), args.quiet);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["simulation", "--seed", "7", "--samples", "100", "--quiet"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    fn start() -> DateTime<Utc> {
        parse_timestamp("2025-01-01T00:00:00Z").expect("valid start")
    }

    #[test]
    fn test_interval_is_capped_at_one_day() {
        assert!(Args::try_parse_from(["simulation", "--interval-secs", "86400"]).is_ok());
        assert!(Args::try_parse_from(["simulation", "--interval-secs", "86401"]).is_err());
        assert!(Args::try_parse_from(["simulation", "--interval-secs", "0"]).is_err());
    }

    #[test]
    fn test_timestamp_past_chrono_range_is_an_error() {
        let state = SimulationState::new(&args(&[]), DateTime::<Utc>::MAX_UTC).expect("state");
        assert_eq!(state.timestamp_at(0), Ok(DateTime::<Utc>::MAX_UTC));
        assert!(state.timestamp_at(1).is_err());
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let a_args = args(&["--interval-secs", "10"]);
        let mut a = SimulationState::new(&a_args, start()).expect("state");
        let mut b = SimulationState::new(&a_args, start()).expect("state");
        for _ in 0..50 {
            let sa = a.generate_sample().expect("sample");
            let sb = b.generate_sample().expect("sample");
            assert_eq!(sa, sb);
        }
        assert_eq!(a.timestamp_at(1), Ok(start() + Duration::seconds(10)));
    }

    #[test]
    fn test_fault_phases_cross_control_thresholds() {
        let run_args = args(&[]);
        let mut state = SimulationState::new(&run_args, start()).expect("state");
        let mut peak_power: f64 = 0.0;
        let mut peak_vibration: f64 = 0.0;
        while state.index < state.total {
            state.update_phase();
            let phase = state.current_phase;
            let sample = state.generate_sample().expect("sample");
            match phase {
                Phase::HighPower => peak_power = peak_power.max(sample.power_watts.unwrap_or(0.0)),
                Phase::VibrationFault => {
                    peak_vibration = peak_vibration.max(sample.vibration.unwrap_or(0.0));
                }
                _ => {}
            }
        }
        assert!(peak_power > 900.0, "peak power {peak_power}");
        assert!(peak_vibration > 1.5, "peak vibration {peak_vibration}");
    }
}

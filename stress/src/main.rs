use std::{
    fmt::Write as _,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, ValueEnum};
use hdrhistogram::Histogram;
use tracing_subscriber::EnvFilter;

use eventrate::{
    EventStatistics, EventStatisticsOptions, SanitizeThreshold, WindowSizeSeconds,
    clock::{Clock, ManualClock, SystemClock},
};

type Statistics = EventStatistics<Arc<dyn Clock>>;

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Workload {
    /// Every worker records the same name.
    Hot,
    /// Names drawn uniformly from a fixed key space.
    Uniform,
    /// The key space is renamed every `--churn-ms`, so earlier names stop recurring.
    Churn,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "eventrate-stress",
    about = "Load test for eventrate: concurrent recording, periodic reporting and sweeping"
)]
struct Args {
    #[arg(long, value_enum, default_value_t = Workload::Churn)]
    workload: Workload,

    #[arg(long, default_value_t = 8)]
    threads: usize,

    #[arg(long, default_value_t = 30)]
    duration_s: u64,

    #[arg(long, default_value_t = 60)]
    window_s: u64,

    #[arg(long, default_value_t = 10)]
    sanitize_threshold: u64,

    #[arg(long, default_value_t = 1_000)]
    key_space: u64,

    #[arg(long, default_value_t = 2_000)]
    churn_ms: u64,

    /// Fraction of worker operations that query a single name instead of recording.
    #[arg(long, default_value_t = 0.1)]
    read_fraction: f64,

    /// How often the reporter calls `get_all_statistics` and samples `names_held`.
    #[arg(long, default_value_t = 500)]
    report_every_ms: u64,

    /// Drive a manual clock instead of the wall clock, advancing it by this many minutes
    /// per report. Makes window expiry and sweeps visible in short runs.
    #[arg(long)]
    simulate_minutes_per_report: Option<u64>,

    #[arg(long, default_value_t = 100)]
    sample_every: u64,

    /// Print every name's rate when the run finishes.
    #[arg(long)]
    print_statistics: bool,
}

/// splitmix64, seeded per worker.
struct Rng(u64);

impl Rng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn chance(&mut self, probability: f64) -> bool {
        (self.next_u64() >> 11) as f64 / ((1u64 << 53) as f64) < probability
    }
}

fn latency_histogram() -> Histogram<u64> {
    Histogram::new_with_bounds(1, 60_000_000, 3).unwrap()
}

/// Writes the next event name into `buf`.
fn next_name(args: &Args, started: Instant, rng: &mut Rng, buf: &mut String) {
    buf.clear();
    let key_space = args.key_space.max(1);

    let _ = match args.workload {
        Workload::Hot => write!(buf, "hot"),
        Workload::Uniform => write!(buf, "event_{}", rng.next_u64() % key_space),
        Workload::Churn => {
            let generation = started.elapsed().as_millis() as u64 / args.churn_ms.max(1);
            write!(buf, "gen{generation}_event_{}", rng.next_u64() % key_space)
        }
    };
}

struct WorkerReport {
    recorded: u64,
    queried: u64,
    record_latency: Histogram<u64>,
    query_latency: Histogram<u64>,
}

fn run_worker(
    args: &Args,
    stats: &Statistics,
    stop: &AtomicBool,
    started: Instant,
    seed: u64,
) -> WorkerReport {
    let mut rng = Rng(seed);
    let mut name = String::new();
    let mut report = WorkerReport {
        recorded: 0,
        queried: 0,
        record_latency: latency_histogram(),
        query_latency: latency_histogram(),
    };

    let mut op = 0_u64;
    while !stop.load(Ordering::Relaxed) {
        op = op.wrapping_add(1);
        next_name(args, started, &mut rng, &mut name);

        let query = rng.chance(args.read_fraction);
        let t0 = (args.sample_every <= 1 || op % args.sample_every == 0).then(Instant::now);

        if query {
            std::hint::black_box(stats.get_statistic_by_name(&name));
            report.queried += 1;
        } else {
            stats.inc_event(&name);
            report.recorded += 1;
        }

        if let Some(t0) = t0 {
            let us = (t0.elapsed().as_micros() as u64).max(1);
            let histogram = if query {
                &mut report.query_latency
            } else {
                &mut report.record_latency
            };
            let _ = histogram.record(us);
        }
    }

    report
}

struct Sample {
    at: Duration,
    names_held: usize,
    names_reporting: usize,
    total_rate: f64,
}

/// Reports every name, then reads how many buckets the store still holds. The report's
/// trims are what make stale buckets count toward the next sweep.
fn take_sample(stats: &Statistics, started: Instant) -> Sample {
    let all = stats.get_all_statistics();
    Sample {
        at: started.elapsed(),
        names_held: stats.len(),
        names_reporting: all.len(),
        total_rate: all.values().sum(),
    }
}

fn run_reporter(
    args: &Args,
    stats: &Statistics,
    manual_clock: Option<&ManualClock>,
    stop: &AtomicBool,
    started: Instant,
) -> Vec<Sample> {
    let mut samples = Vec::new();
    let every = Duration::from_millis(args.report_every_ms.max(1));

    while !stop.load(Ordering::Relaxed) {
        thread::sleep(every);

        if let (Some(clock), Some(minutes)) = (manual_clock, args.simulate_minutes_per_report) {
            clock.advance_minutes(minutes);
        }

        let sample = take_sample(stats, started);
        tracing::info!(
            at_ms = sample.at.as_millis() as u64,
            names_held = sample.names_held,
            names_reporting = sample.names_reporting,
            total_rate_per_min = sample.total_rate,
            "stress.report"
        );

        samples.push(sample);
    }

    samples
}

fn print_latency(label: &str, histogram: &Histogram<u64>) {
    if histogram.is_empty() {
        println!("{label}: no samples");
        return;
    }

    println!(
        "{label}: samples={} p50={}us p99={}us p999={}us max={}us",
        histogram.len(),
        histogram.value_at_quantile(0.50),
        histogram.value_at_quantile(0.99),
        histogram.value_at_quantile(0.999),
        histogram.max()
    );
}

fn run(args: Args) {
    let manual_clock = args.simulate_minutes_per_report.map(|_| ManualClock::new());
    let clock: Arc<dyn Clock> = match &manual_clock {
        Some(clock) => Arc::new(clock.clone()),
        None => Arc::new(SystemClock),
    };

    let options = EventStatisticsOptions {
        window_size_seconds: WindowSizeSeconds::try_from(args.window_s).unwrap(),
        sanitize_threshold: SanitizeThreshold::try_from(args.sanitize_threshold).unwrap(),
    };
    let stats: Statistics = EventStatistics::with_options(clock, options);
    let stop = AtomicBool::new(false);
    let started = Instant::now();

    let (workers, samples) = thread::scope(|scope| {
        let workers: Vec<_> = (0..args.threads)
            .map(|t| {
                let (args, stats, stop) = (&args, &stats, &stop);
                scope.spawn(move || run_worker(args, stats, stop, started, t as u64 + 1))
            })
            .collect();

        let reporter =
            scope.spawn(|| run_reporter(&args, &stats, manual_clock.as_ref(), &stop, started));

        thread::sleep(Duration::from_secs(args.duration_s));
        stop.store(true, Ordering::Relaxed);

        let workers: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        (workers, reporter.join().unwrap())
    });

    let elapsed = started.elapsed();
    let mut record_latency = latency_histogram();
    let mut query_latency = latency_histogram();
    let (mut recorded, mut queried) = (0, 0);
    for worker in &workers {
        recorded += worker.recorded;
        queried += worker.queried;
        record_latency.add(&worker.record_latency).unwrap();
        query_latency.add(&worker.query_latency).unwrap();
    }

    println!(
        "workload={:?} threads={} window_s={} sanitize_threshold={} key_space={} simulated={}",
        args.workload,
        args.threads,
        args.window_s,
        args.sanitize_threshold,
        args.key_space,
        manual_clock.is_some()
    );
    println!(
        "elapsed_s={:.3} recorded={} queried={} ops_per_s={:.0}",
        elapsed.as_secs_f64(),
        recorded,
        queried,
        (recorded + queried) as f64 / elapsed.as_secs_f64()
    );
    print_latency("inc_event", &record_latency);
    print_latency("get_statistic_by_name", &query_latency);

    let peak_held = samples.iter().map(|s| s.names_held).max().unwrap_or(0);
    let shrinks = samples
        .windows(2)
        .filter(|pair| pair[1].names_held < pair[0].names_held)
        .count();
    println!(
        "reports={} peak_names_held={} final_names_held={} times_names_held_shrank={}",
        samples.len(),
        peak_held,
        stats.len(),
        shrinks
    );
    if let Some(last) = samples.last() {
        println!(
            "last_report: names_reporting={} total_rate_per_min={:.3}",
            last.names_reporting, last.total_rate
        );
    }

    if args.print_statistics {
        stats.print_statistics();
    }
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    run(Args::parse());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(std::iter::once("eventrate-stress").chain(extra.iter().copied()))
    }

    fn manual_statistics(threshold: u64) -> (ManualClock, Statistics) {
        let clock = ManualClock::new();
        let stats = EventStatistics::with_options(
            Arc::new(clock.clone()) as Arc<dyn Clock>,
            EventStatisticsOptions {
                sanitize_threshold: SanitizeThreshold::try_from(threshold).unwrap(),
                ..Default::default()
            },
        );
        (clock, stats)
    }

    #[test]
    fn churn_names_carry_their_generation() {
        let args = args(&["--workload", "churn", "--key-space", "4", "--churn-ms", "3600000"]);
        let mut rng = Rng(7);
        let mut name = String::new();

        for _ in 0..32 {
            next_name(&args, Instant::now(), &mut rng, &mut name);
            let index: u64 = name.strip_prefix("gen0_event_").unwrap().parse().unwrap();
            assert!(index < 4);
        }
    }

    #[test]
    fn churn_moves_to_a_new_generation() {
        let args = args(&["--workload", "churn", "--churn-ms", "1"]);
        let started = Instant::now() - Duration::from_millis(5);
        let mut name = String::new();

        next_name(&args, started, &mut Rng(1), &mut name);
        assert!(!name.starts_with("gen0_"), "{name}");
    }

    #[test]
    fn hot_workload_uses_one_name() {
        let args = args(&["--workload", "hot"]);
        let mut rng = Rng(3);
        let mut name = String::new();

        for _ in 0..8 {
            next_name(&args, Instant::now(), &mut rng, &mut name);
            assert_eq!(name, "hot");
        }
    }

    #[test]
    fn chance_respects_extremes() {
        let mut rng = Rng(11);
        for _ in 0..1_000 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn samples_show_stale_names_being_reclaimed() {
        let (clock, stats) = manual_statistics(1);
        let started = Instant::now();

        for name in ["gen0_event_0", "gen0_event_1", "gen0_event_2"] {
            stats.inc_event(name);
        }

        let live = take_sample(&stats, started);
        assert_eq!(live.names_held, 3);
        assert_eq!(live.names_reporting, 3);
        assert!((live.total_rate - 3.0 / 60.0).abs() < 1e-9);

        clock.advance_minutes(120);

        // The report empties every bucket; the sweep it triggers runs on the next one.
        let expired = take_sample(&stats, started);
        assert_eq!(expired.names_reporting, 0);
        assert_eq!(expired.names_held, 3);

        let reclaimed = take_sample(&stats, started);
        assert_eq!(reclaimed.names_held, 0);
        assert_eq!(reclaimed.total_rate, 0.0);
    }
}

use std::time::Instant;

use agl_core::classifier::Classifier;
use agl_core::config::EngineConfig;
use agl_core::dom::memory::{synthetic_page, MemoryDocument};
use agl_core::dom::Document;
use agl_core::profile::SiteProfile;
use agl_core::scheduler::ManualScheduler;
use agl_core::sweep::Sweeper;

pub struct PerfBudgetOptions {
    pub blocks: usize,
    pub iterations: usize,
}

const BUDGET_CLASSIFY_P99_US: f64 = 50.0;
const HOSTNAME: &str = "news.example";

pub fn run_perf_budget(opts: PerfBudgetOptions) -> Result<(), String> {
    if opts.iterations == 0 {
        return Err("At least one iteration is required".to_string());
    }

    println!("Performance Budget Check");
    println!("==================================================");

    let config = EngineConfig::default();
    let profile = SiteProfile::for_hostname(HOSTNAME);
    let sweeper = Sweeper::new(
        profile.catalog(config.aggressiveness),
        Classifier::new(config.min_ad_size_px),
        config.slow_sweep_ms,
    );
    let clock = ManualScheduler::new();
    println!(
        "Profile {} with {} patterns, {} content blocks",
        profile.name,
        sweeper.catalog().len(),
        opts.blocks
    );

    println!("Warming up...");
    for _ in 0..3 {
        sweeper.run(&synthetic_page(HOSTNAME, opts.blocks), &clock);
    }

    println!("Measuring sweep latency...");
    let (sweeps, hidden) = measure_sweeps(&sweeper, &clock, &opts);
    let sweep_p50 = percentile(&sweeps, 0.50);
    let sweep_p99 = percentile(&sweeps, 0.99);

    let resweep_ms = {
        let doc = synthetic_page(HOSTNAME, opts.blocks);
        sweeper.run(&doc, &clock);
        let start = Instant::now();
        sweeper.run(&doc, &clock);
        start.elapsed().as_secs_f64() * 1000.0
    };

    println!("Measuring classifier latency...");
    let classify = measure_classify(&synthetic_page(HOSTNAME, opts.blocks))?;
    let classify_p99 = percentile(&classify, 0.99);

    let mut passed = true;
    println!();
    println!("Results");
    println!("--------------------------------------------------");
    println!("  Hidden per sweep: {hidden}");
    println!("  Sweep P50:        {sweep_p50:.2} ms");
    passed &= report_budget("Sweep P99 Latency", sweep_p99, config.slow_sweep_ms, "ms");
    passed &= report_budget("Re-sweep Latency", resweep_ms, config.slow_sweep_ms, "ms");
    passed &= report_budget("Classify P99 Latency", classify_p99, BUDGET_CLASSIFY_P99_US, "μs");

    println!();
    println!("==================================================");

    if passed {
        println!("✓ All performance budgets passed");
        Ok(())
    } else {
        Err("Performance budget exceeded".to_string())
    }
}

fn report_budget(name: &str, actual: f64, limit: f64, unit: &str) -> bool {
    let passed = actual <= limit;
    let status = if passed { "✓" } else { "✗" };
    println!("{} {}: {:.2} {} (limit: {:.2} {})", status, name, actual, unit, limit, unit);
    passed
}

fn measure_sweeps(sweeper: &Sweeper, clock: &ManualScheduler, opts: &PerfBudgetOptions) -> (Vec<f64>, usize) {
    let mut latencies = Vec::with_capacity(opts.iterations);
    let mut hidden = 0;
    for _ in 0..opts.iterations {
        let doc = synthetic_page(HOSTNAME, opts.blocks);
        let start = Instant::now();
        let report = sweeper.run(&doc, clock);
        latencies.push(start.elapsed().as_secs_f64() * 1000.0);
        hidden = report.hidden;
    }
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    (latencies, hidden)
}

fn measure_classify(doc: &MemoryDocument) -> Result<Vec<f64>, String> {
    let elements = doc.query_all("*").map_err(|e| format!("Query failed: {}", e))?;
    let classifier = Classifier::default();
    let mut latencies = Vec::with_capacity(elements.len() * 10);
    for _ in 0..10 {
        for element in &elements {
            let start = Instant::now();
            let _ = classifier.classify(element);
            latencies.push(start.elapsed().as_secs_f64() * 1_000_000.0);
        }
    }
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Ok(latencies)
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * p).ceil() as usize;
    let idx = idx.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&sorted, 0.5), 5.0);
        assert_eq!(percentile(&sorted, 0.99), 10.0);
        assert_eq!(percentile(&[], 0.99), 0.0);
    }
}

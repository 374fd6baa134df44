//! Retry chain example
//!
//! Drives an in-memory scheduler with a manual clock through a job that fails
//! three times before it recovers, and prints every firing.
//!
//! Run with: RUST_LOG=debug cargo run --example retry_chain

use std::sync::Arc;

use chrono::{TimeDelta, TimeZone, Utc};
use retry_trigger::clock::ManualClock;
use retry_trigger::{
    InMemoryScheduler, JobDetail, JobExecutionError, JobKey, MaxRetries, RetryConfig,
    RetryJobListener, RetryPolicy, SimpleTrigger, TriggerKey,
};
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r##"{
    "fallbackPolicy": "standard",
    "policies": {
        "standard": { "backoffBaseIntervalMs": 300000, "powerBase": 2.0, "maxRetries": 4 }
    },
    "misfireThresholdMs": 60000
}"##;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    println!("=== Retry Chain Example ===\n");

    let config = RetryConfig::from_json_str(CONFIG)?;
    let t0 = Utc
        .with_ymd_and_hms(2024, 1, 1, 2, 0, 0)
        .single()
        .ok_or("invalid start time")?;
    let clock = ManualClock::new(t0);

    let scheduler = InMemoryScheduler::from_config(Arc::new(clock.clone()), &config);
    let listener = RetryJobListener::exponential(Arc::new(clock.clone())).with_config(&config)?;
    scheduler.add_listener(Arc::new(listener));

    // this job asks for faster retries than the configured fallback
    let policy = RetryPolicy::new()
        .backoff_base_interval(TimeDelta::minutes(2))
        .power_base(3.0)
        .max_retries(MaxRetries::Limited(5));
    let job = JobDetail::new(JobKey::new("import", "nightly"))
        .with_description("import partner feed")
        .with_retry_policy(&policy)?;
    let trigger = SimpleTrigger::new(TriggerKey::new("import-daily", "nightly"), t0, TimeDelta::days(1))
        .for_job(job.key.clone())
        .with_clock(Arc::new(clock.clone()));
    scheduler.schedule_job(job, Box::new(trigger))?;

    let mut failures_left = 4;
    while let Some(next) = scheduler.next_fire_time() {
        if next >= t0 + TimeDelta::days(1) {
            break;
        }
        clock.set(next);

        for fired in scheduler.run_due(|_, _| {
            if failures_left > 0 {
                failures_left -= 1;
                Err(JobExecutionError::new("partner feed unavailable"))
            } else {
                Ok(())
            }
        }) {
            println!(
                "   {} fired {} (retry: {}) -> {:?}",
                fired.trigger_key,
                fired.fire_time.format("%H:%M"),
                fired.is_retry,
                fired.outcome
            );
        }
    }

    println!("\n   Next regular run: {:?}", scheduler.next_fire_time());
    println!("\n=== Example completed ===");
    Ok(())
}

//! Alarm example: page someone when logged errors come too fast.
//!
//! Ordinary `tracing` events are forwarded into a broadcaster. An alarm
//! listening there fires once when errors exceed 20 per minute, then stays
//! quiet for the rest of its cooldown no matter how many errors follow.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_triage::{
    BroadcastLayer, Broadcaster, Frequency, MessageAlarm, MessageKind, Rate, Scales, TracingSink,
};

fn main() {
    let scales = Arc::new(Scales::standard());
    let broadcaster = Arc::new(Broadcaster::new("service", Arc::clone(&scales)));

    let alarm = MessageAlarm::builder(|rate: Rate| {
        println!(">>> ALARM: errors arriving at {}", rate);
        Ok(())
    })
    .with_trigger_rate(Rate::per_minute(20.0))
    .with_maximum_trigger_frequency(Frequency::every(Duration::from_secs(600)))
    .with_scales(Arc::clone(&scales))
    .build()
    .expect("standard scales rank every built-in kind");
    broadcaster.add_listener(Arc::new(alarm));

    // Re-log only problems and worse, under the sink target
    let minimum = scales
        .severity_of(&MessageKind::Problem)
        .expect("standard scales rank problems");
    broadcaster.add_listener(Arc::new(
        TracingSink::new(&scales)
            .expect("standard scales rank every level")
            .with_minimum_severity(minimum),
    ));

    tracing_subscriber::registry()
        .with(
            BroadcastLayer::builder(Arc::clone(&broadcaster))
                .build()
                .expect("standard scales rank every level"),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Error Rate Alarm Example ===\n");

    info!("Service started");
    for request in 1..=50 {
        if request % 2 == 0 {
            error!(request, "Upstream timed out");
        } else {
            info!(request, "Request served");
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    println!("\n=== Example Complete ===");
    println!("Notice: the alarm fired once although 25 errors were logged.");
}

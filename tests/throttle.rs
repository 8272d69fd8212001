//! Integration tests for per-call-site frequency throttling.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_triage::infrastructure::mocks::MockClock;
use tracing_triage::{
    Broadcaster, CodeContext, DeliveryRecord, Frequency, FrequencyThrottle, Message, MessageKind,
    MessageList, Metrics, Repeater, Scales, ShardedStorage, ThrottleKey, Transceiver,
};

type Throttle = FrequencyThrottle<Arc<ShardedStorage<ThrottleKey, DeliveryRecord>>>;

struct Fixture {
    clock: Arc<MockClock>,
    scales: Arc<Scales>,
    upstream: Broadcaster,
    repeater: Arc<Repeater<Throttle>>,
    list: Arc<MessageList>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(MockClock::new(Instant::now()));
    let scales = Arc::new(Scales::standard());
    let throttle = FrequencyThrottle::new(Arc::new(ShardedStorage::new()), clock.clone());
    let repeater = Arc::new(Repeater::with_handler(
        Broadcaster::new("throttled", Arc::clone(&scales)),
        throttle,
    ));
    let list = Arc::new(MessageList::new(Arc::clone(&scales)));
    repeater.broadcaster().add_listener(list.clone());

    let upstream = Broadcaster::new("service", Arc::clone(&scales));
    repeater.listen_to(&upstream);

    Fixture {
        clock,
        scales,
        upstream,
        repeater,
        list,
    }
}

impl Fixture {
    fn send(&self, text: &str, argument: u32, frequency: Frequency) {
        let message = Message::builder(MessageKind::Warning, text)
            .argument(argument)
            .maximum_frequency(frequency)
            .build(&self.scales)
            .unwrap();
        self.upstream.transmit(message).unwrap();
    }
}

#[test]
fn test_one_message_per_cycle() {
    let fixture = fixture();

    for i in 0..10 {
        fixture.send("Queue depth $", i, Frequency::every_minute());
        fixture.clock.advance(Duration::from_secs(5));
    }
    fixture.clock.advance(Duration::from_secs(10));
    fixture.send("Queue depth $", 99, Frequency::every_minute());

    assert_eq!(fixture.list.formatted(), vec!["Queue depth 0", "Queue depth 99"]);
    assert_eq!(fixture.repeater.handler().metrics().messages_throttled(), 9);
}

#[test]
fn test_call_sites_throttle_independently() {
    let fixture = fixture();

    for i in 0..5 {
        for context in ["db::pool:10", "db::pool:42"] {
            let message = Message::builder(MessageKind::Problem, "Cannot reach $")
                .argument(i)
                .maximum_frequency(Frequency::every_minute())
                .context(CodeContext::new(context))
                .build(&fixture.scales)
                .unwrap();
            fixture.upstream.transmit(message).unwrap();
        }
    }

    assert_eq!(fixture.list.len(), 2);
    assert_eq!(fixture.repeater.handler().len(), 2);
}

#[test]
fn test_unthrottled_messages_pass() {
    let fixture = fixture();

    for _ in 0..5 {
        fixture.upstream.warning("Plain warning", &[]).unwrap();
    }

    assert_eq!(fixture.list.len(), 5);
    assert!(fixture.repeater.handler().is_empty());
}

#[test]
fn test_once_never_repeats() {
    let fixture = fixture();

    fixture.send("Deprecated option $", 1, Frequency::once());
    fixture.clock.advance(Duration::from_secs(365 * 24 * 60 * 60));
    fixture.send("Deprecated option $", 2, Frequency::once());

    assert_eq!(fixture.list.formatted(), vec!["Deprecated option 1"]);
}

#[test]
fn test_parsed_frequency_and_shared_metrics() {
    let clock = Arc::new(MockClock::new(Instant::now()));
    let metrics = Metrics::new();
    let throttle = FrequencyThrottle::new(Arc::new(ShardedStorage::new()), clock.clone())
        .with_metrics(metrics.clone());
    let scales = Arc::new(Scales::standard());
    let repeater = Arc::new(Repeater::with_handler(
        Broadcaster::new("throttled", Arc::clone(&scales)),
        throttle,
    ));
    let upstream = Broadcaster::new("service", Arc::clone(&scales)).with_metrics(metrics.clone());
    repeater.listen_to(&upstream);

    let frequency: Frequency = "30s".parse().unwrap();
    for _ in 0..4 {
        let message = Message::builder(MessageKind::Glitch, "Cache miss storm")
            .maximum_frequency(frequency)
            .build(&scales)
            .unwrap();
        upstream.transmit(message).unwrap();
        clock.advance(Duration::from_secs(10));
    }

    // Forwarded at 0s and 30s
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.messages_throttled, 2);
    assert_eq!(snapshot.messages_transmitted, 4);
}

#[test]
fn test_purge_restarts_keys() {
    let fixture = fixture();

    fixture.send("Slow query", 1, Frequency::every(Duration::from_secs(3600)));
    fixture.clock.advance(Duration::from_secs(600));
    fixture.repeater.handler().purge_older_than(Duration::from_secs(300));
    fixture.send("Slow query", 2, Frequency::every(Duration::from_secs(3600)));

    assert_eq!(fixture.list.len(), 2);
}

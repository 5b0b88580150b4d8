use std::time::Duration;

use ocd_bridge::bus::{Bus, LocalBus, Message, Subscription};
use ocd_bridge::driver::{MemoryDriver, MemorySettings};
use pretty_assertions::assert_eq;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn settings() -> MemorySettings {
    MemorySettings {
        interface: "bench/memory".to_string(),
        openocd: "bench/openocd".to_string(),
        tick_ms: 1,
    }
}

fn send(bus: &LocalBus, topic: &str, payload: &str) {
    bus.publish(Message::new(topic, payload.to_string())).unwrap();
}

fn answer(bus: &LocalBus, payload: &str) {
    bus.publish(Message::retained(
        "bench/openocd/atts/memory/map",
        payload.to_string(),
    ))
    .unwrap();
}

fn drain(subscription: &mut Subscription) -> Vec<String> {
    std::iter::from_fn(|| subscription.try_recv())
        .map(|m| String::from_utf8_lossy(&m.payload).into_owned())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn watched_cell_is_polled_at_its_rate() {
    let bus = LocalBus::new();
    let token = CancellationToken::new();
    let driver = MemoryDriver::new(bus.clone(), &settings());
    let mut reads = bus.subscribe("bench/openocd/cmds/readMemory").unwrap();

    let script = async {
        send(
            &bus,
            "bench/memory/cmds/watch",
            r#"{"addr": "0x20000000", "width": 4, "pollTime": 100}"#,
        );

        sleep(Duration::from_millis(150)).await;
        assert_eq!(
            drain(&mut reads),
            vec![r#"{"addr":"0x20000000","width":4}"#]
        );

        answer(&bus, r#"{"addr": "0x20000000", "value": "0x2a", "width": 4}"#);
        sleep(Duration::from_millis(5)).await;
        let map = bus.retained("bench/memory/atts/map").unwrap();
        assert_eq!(
            map.payload,
            r#"{"regs":[{"addr":"0x20000000","value":"0x2a","width":4}]}"#
        );

        sleep(Duration::from_millis(100)).await;
        assert_eq!(drain(&mut reads).len(), 1);

        send(
            &bus,
            "bench/memory/cmds/watch",
            r#"{"addr": "0x20000000", "width": 4, "pollTime": 0}"#,
        );
        sleep(Duration::from_millis(500)).await;
        assert!(drain(&mut reads).is_empty());

        token.cancel();
    };

    let (result, ()) = tokio::join!(driver.run(token.clone()), script);
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unsolicited_updates_are_dropped() {
    let bus = LocalBus::new();
    let token = CancellationToken::new();
    let driver = MemoryDriver::new(bus.clone(), &settings());

    let script = async {
        answer(&bus, r#"{"addr": "0x30000000", "value": "0x1", "width": 4}"#);
        sleep(Duration::from_millis(5)).await;

        assert!(bus.retained("bench/memory/atts/map").is_none());

        token.cancel();
    };

    let (result, ()) = tokio::join!(driver.run(token.clone()), script);
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn each_read_admits_one_update() {
    let bus = LocalBus::new();
    let token = CancellationToken::new();
    let driver = MemoryDriver::new(bus.clone(), &settings());
    let mut maps = bus.subscribe("bench/memory/atts/map").unwrap();

    let script = async {
        send(
            &bus,
            "bench/memory/cmds/read",
            r#"{"addr": "0x20000004", "width": 2}"#,
        );
        sleep(Duration::from_millis(5)).await;

        answer(&bus, r#"{"addr": "0x20000004", "value": "0x10", "width": 2}"#);
        answer(&bus, r#"{"addr": "0x20000004", "value": "0x11", "width": 2}"#);
        sleep(Duration::from_millis(5)).await;

        assert_eq!(
            drain(&mut maps),
            vec![r#"{"regs":[{"addr":"0x20000004","value":"0x10","width":2}]}"#]
        );

        token.cancel();
    };

    let (result, ()) = tokio::join!(driver.run(token.clone()), script);
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn write_is_forwarded_and_read_back_value_admitted() {
    let bus = LocalBus::new();
    let token = CancellationToken::new();
    let driver = MemoryDriver::new(bus.clone(), &settings());
    let mut writes = bus.subscribe("bench/openocd/cmds/writeMemory").unwrap();

    let script = async {
        send(
            &bus,
            "bench/memory/cmds/write",
            r#"{"addr": "0x20000008", "value": "0xff", "width": 1}"#,
        );
        sleep(Duration::from_millis(5)).await;

        assert_eq!(
            drain(&mut writes),
            vec![r#"{"addr":"0x20000008","value":"0xff","width":1}"#]
        );

        answer(&bus, r#"{"addr": "0x20000008", "value": "0xff", "width": 1}"#);
        sleep(Duration::from_millis(5)).await;

        assert!(bus.retained("bench/memory/atts/map").is_some());

        token.cancel();
    };

    let (result, ()) = tokio::join!(driver.run(token.clone()), script);
    result.unwrap();
}

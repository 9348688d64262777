use std::time::Duration;

use super::flag;

#[test]
fn test_flag_starts_false_and_is_shared_with_readers() {
    let writer = flag("wifi_is_connected");
    let reader = writer.reader();
    assert!(!writer.get());
    assert!(!reader.get());

    writer.set(true);
    assert!(reader.get());
    assert!(reader.clone().get());
    assert_eq!(reader.name(), "wifi_is_connected");
}

#[tokio::test]
async fn test_wait_for_returns_immediately_when_already_set() {
    let writer = flag("mqtt_is_connected");
    writer.set(true);
    assert!(writer.reader().wait_for(true).await);
}

#[tokio::test]
async fn test_wait_for_suspends_until_writer_sets_value() {
    let writer = flag("mqtt_is_connected");
    let reader = writer.reader();

    let waiter = tokio::spawn(async move { reader.wait_for(true).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    writer.set(true);
    assert!(waiter.await.unwrap());
}

#[tokio::test]
async fn test_wait_for_gives_up_when_writer_is_dropped() {
    let writer = flag("mqtt_is_connected");
    let reader = writer.reader();
    drop(writer);
    assert!(!reader.wait_for(true).await);
}

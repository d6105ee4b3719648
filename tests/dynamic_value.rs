//! Integration tests for dynamic values behind a flag set.

use dynflag::core::validators::in_range;
use dynflag::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

#[test]
fn test_set_and_get() {
    let flags = FlagSet::new("foobar");
    let value = flags
        .add_dynamic("some_int_1", 13371337i64, "Use it or lose it")
        .unwrap();
    assert_eq!(value.get(), 13371337, "value must be default after create");

    flags.set("some_int_1", "77007700\n").unwrap();
    assert_eq!(value.get(), 77007700, "value must be set after update");
}

#[test]
fn test_is_marked_dynamic() {
    let flags = FlagSet::new("foobar");
    flags
        .add_dynamic("some_int_1", 13371337i64, "Use it or lose it")
        .unwrap();

    let flag = flags.lookup("some_int_1").unwrap();
    assert!(flags.is_dynamic(&flag));
}

#[test]
fn test_mutator_with_padded_input() {
    let flags = FlagSet::new("foobar");
    let value = flags
        .add_dynamic("int_2x", 0i64, "...")
        .unwrap()
        .with_value_mutator(|v| 2 * v);

    flags.set("int_2x", "  \t42\n").unwrap();
    assert_eq!(value.get(), 84);
}

#[test]
fn test_validator_range() {
    let flags = FlagSet::new("foobar");
    let value = flags
        .add_dynamic("some_int_1", 13371337i64, "Use it or lose it")
        .unwrap()
        .with_validator(in_range(0, 2000));

    assert!(flags.set("some_int_1", "300").is_ok());
    assert_eq!(value.get(), 300);

    let err = flags.set("some_int_1", "2001").unwrap_err();
    assert!(matches!(err, FlagError::Validation { ref flag, .. } if flag == "some_int_1"));
    assert_eq!(value.get(), 300);
}

#[test]
fn test_notifier_receives_old_and_new() {
    let (tx, rx) = mpsc::channel();
    let flags = FlagSet::new("foobar");
    let _value = flags
        .add_dynamic("some_int_1", 13371337i64, "Use it or lose it")
        .unwrap()
        .with_notifier(move |old: &i64, new: &i64| {
            tx.send((*old, *new)).unwrap();
        });

    flags.set("some_int_1", "77007700").unwrap();
    assert_eq!(
        rx.recv_timeout(Duration::from_millis(5)).unwrap(),
        (13371337, 77007700)
    );
    assert!(rx.try_recv().is_err(), "notifier must fire exactly once");
}

#[test]
fn test_notifications_follow_set_order() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let flags = FlagSet::new("foobar");
    let _value = flags
        .add_dynamic("level", String::from("info"), "log level")
        .unwrap()
        .with_notifier(move |old: &String, new: &String| {
            seen_clone.lock().push(format!("{}->{}", old, new));
        });

    for level in ["debug", "warn", "error"] {
        flags.set("level", level).unwrap();
    }
    assert_eq!(
        *seen.lock(),
        vec!["info->debug", "debug->warn", "warn->error"]
    );
}

#[test]
fn test_duration_flag() {
    let flags = FlagSet::new("foobar");
    let timeout = flags
        .add_dynamic("timeout", Duration::from_secs(5), "request timeout")
        .unwrap();

    flags.set("timeout", "1m30s\n").unwrap();
    assert_eq!(timeout.get(), Duration::from_secs(90));
    assert!(flags.set("timeout", "soon").is_err());
    assert_eq!(timeout.get(), Duration::from_secs(90));

    let err = flags
        .set("timeout", "94522879700260684295381835.999h")
        .unwrap_err();
    assert!(matches!(err, FlagError::Parse { ref flag, .. } if flag == "timeout"));
    assert_eq!(timeout.get(), Duration::from_secs(90));
}

#[test]
fn test_float_range_rejects_nan() {
    let ratio = DynamicValue::new("ratio", 0.5f64, "sampling ratio").with_validator(in_range(0.0, 1.0));

    assert!(ratio.set("0.25").is_ok());
    let err = ratio.set("NaN").unwrap_err();
    assert!(matches!(err, FlagError::Validation { .. }));
    assert_eq!(ratio.get(), 0.25);
}

proptest! {
    #[test]
    fn prop_whitespace_is_ignored(
        n in any::<i64>(),
        before in "[ \t\r\n]{0,4}",
        after in "[ \t\r\n]{0,4}",
    ) {
        let value = DynamicValue::new("n", 0i64, "");
        value.set(&format!("{}{}{}", before, n, after)).unwrap();
        prop_assert_eq!(value.get(), n);
    }

    #[test]
    fn prop_rejected_values_leave_current(n in -5000i64..5000) {
        let value = DynamicValue::new("n", 1000i64, "").with_validator(in_range(0, 2000));
        let result = value.set(&n.to_string());
        if (0..=2000).contains(&n) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(value.get(), n);
        } else {
            prop_assert!(result.is_err());
            prop_assert_eq!(value.get(), 1000);
        }
    }
}

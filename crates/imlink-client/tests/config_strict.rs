#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use imlink_client::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
device:
  device_id: "d1"
keepalive:
  idle_interval: 60000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
device:
  device_id: "d1"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.connection.addr, "127.0.0.1:23000");
    assert_eq!(cfg.connection.protocol_version, 2);
    assert_eq!(cfg.connection.max_body_bytes, 32 * 1024);
    assert_eq!(cfg.device.platform_id, 2);
    assert_eq!(cfg.keepalive.idle_interval_ms, 60000);
    assert_eq!(cfg.delivery.ack_timeout_ms, 10000);
    assert!(cfg.sync.cursor_file.is_none());
    assert!(cfg.sync.groups.is_empty());
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
connection:
  addr: "im.example.com:23000"
  protocol_version: 1
device:
  platform_id: 1
  device_id: "ios-7"
keepalive:
  idle_interval_ms: 30000
sync:
  cursor_file: "/var/lib/imlink/cursors.json"
  groups: [1001, 1002]
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.connection.protocol_version, 1);
    assert_eq!(cfg.device.platform_id, 1);
    assert_eq!(cfg.sync.groups, vec![1001, 1002]);
    assert!(cfg.sync.cursor_file.is_some());
}

#[test]
fn unsupported_version() {
    let bad = "version: 2\ndevice:\n  device_id: \"d1\"\n";
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn device_is_required() {
    let err = config::load_from_str("version: 1\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_CONFIG");
}

#[test]
fn range_checks() {
    let cases = [
        "keepalive:\n  idle_interval_ms: 1000\n",
        "connection:\n  protocol_version: 3\n",
        "connection:\n  max_body_bytes: 0\n",
        "device:\n  device_id: \"\"\n",
        "delivery:\n  outbound_queue: 0\n",
    ];
    for extra in cases {
        let yaml = if extra.starts_with("device:") {
            format!("version: 1\n{extra}")
        } else {
            format!("version: 1\ndevice:\n  device_id: \"d1\"\n{extra}")
        };
        let err = config::load_from_str(&yaml).expect_err(extra);
        assert_eq!(err.code().as_str(), "BAD_CONFIG", "{extra}");
    }
}

//! Integration tests for `tun-router`.
//!
//! Tests marked `#[ignore]` require root and a real tunnel interface:
//!
//! ```bash
//! sudo cargo test -- --ignored
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tun_router::{
    ErrorKind, LinkState, NetworkOps, ResolvConfPaths, ResolvConfState, Result, Router,
    RouterError, Settings, TunRouter,
};

// ---------------------------------------------------------------------------
// Recording OS boundary
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Recorder {
    calls: RefCell<Vec<String>>,
    failing: RefCell<HashSet<String>>,
}

impl Recorder {
    fn fail(&self, call: &str) {
        self.failing.borrow_mut().insert(call.to_string());
    }

    fn take(&self) -> Vec<String> {
        self.calls.take()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.borrow_mut().push(call.clone());
        if self.failing.borrow().contains(&call) {
            return Err(RouterError::Command {
                command: call,
                output: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

impl NetworkOps for Recorder {
    fn set_link_state(&self, iface: &str, state: LinkState) -> Result<()> {
        self.record(format!("link {iface} {state}"))
    }
    fn add_alias(&self, iface: &str, addr: Ipv4Net) -> Result<()> {
        self.record(format!("add_alias {iface} {addr}"))
    }
    fn del_alias(&self, iface: &str, addr: Ipv4Net) -> Result<()> {
        self.record(format!("del_alias {iface} {addr}"))
    }
    fn add_route(&self, dest: Ipv4Net, via: Ipv4Addr) -> Result<()> {
        self.record(format!("add_route {dest} {via}"))
    }
    fn del_route(&self, dest: Ipv4Net, via: Ipv4Addr) -> Result<()> {
        self.record(format!("del_route {dest} {via}"))
    }
}

fn router(dir: &tempfile::TempDir) -> TunRouter<Recorder> {
    TunRouter::with_ops(
        "tun0",
        Recorder::default(),
        ResolvConfPaths::with_dir(dir.path()),
    )
}

fn settings() -> Settings {
    Settings::new("100.64.0.1/32".parse().unwrap())
        .with_routes([
            "10.0.0.0/8".parse().unwrap(),
            "192.168.0.0/16".parse().unwrap(),
        ])
        .with_dns_server(Ipv4Addr::new(100, 100, 100, 100))
        .with_search_domain("corp.example")
}

// ---------------------------------------------------------------------------
// Tempdir tests (no root required)
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ResolvConfPaths::with_dir(dir.path());
    fs::write(&paths.resolv_conf, "nameserver 192.0.2.53\n").unwrap();

    let mut r = router(&dir);
    r.up().unwrap();
    r.set(&settings()).unwrap();

    assert_eq!(
        r.reconciler().ops().take(),
        vec![
            "link tun0 up",
            "add_alias tun0 100.64.0.1/32",
            "add_route 100.64.0.1/32 100.64.0.1",
            "add_route 10.0.0.0/8 100.64.0.1",
            "add_route 192.168.0.0/16 100.64.0.1",
        ]
    );
    let resolv = fs::read_to_string(&paths.resolv_conf).unwrap();
    assert!(resolv.contains("nameserver 100.100.100.100\n"));
    assert!(resolv.contains("search corp.example\n"));

    r.close();

    assert_eq!(r.reconciler().ops().take(), vec!["link tun0 down"]);
    assert_eq!(
        fs::read_to_string(&paths.resolv_conf).unwrap(),
        "nameserver 192.0.2.53\n"
    );
    assert!(!paths.managed.exists());
    assert_eq!(r.dns().state().unwrap(), ResolvConfState::Unmanaged);
}

#[test]
fn idempotent_set() {
    let dir = tempfile::tempdir().unwrap();
    let mut r = router(&dir);

    r.set(&settings()).unwrap();
    r.reconciler().ops().take();

    r.set(&settings()).unwrap();
    assert!(r.reconciler().ops().take().is_empty());
}

#[test]
fn disabling_dns_restores_resolv_conf() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ResolvConfPaths::with_dir(dir.path());
    fs::write(&paths.resolv_conf, "nameserver 192.0.2.53\n").unwrap();
    let mut r = router(&dir);

    r.set(&settings()).unwrap();
    assert!(matches!(
        r.dns().state().unwrap(),
        ResolvConfState::BackedUp(_)
    ));

    let mut no_dns = settings();
    no_dns.dns_servers.clear();
    r.set(&no_dns).unwrap();

    assert_eq!(
        fs::read_to_string(&paths.resolv_conf).unwrap(),
        "nameserver 192.0.2.53\n"
    );
    assert_eq!(r.dns().state().unwrap(), ResolvConfState::Unmanaged);
}

#[test]
fn route_failures_still_update_dns() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ResolvConfPaths::with_dir(dir.path());
    let mut r = router(&dir);
    r.reconciler().ops().fail("add_route 10.0.0.0/8 100.64.0.1");

    let err = r.set(&settings()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OsOperation);
    assert_eq!(fs::read_link(&paths.resolv_conf).unwrap(), paths.managed);
}

#[test]
fn first_error_wins_across_routes_and_dns() {
    let dir = tempfile::tempdir().unwrap();
    // The managed file's parent is a regular file, so takeover fails.
    fs::write(dir.path().join("blocker"), "").unwrap();
    let mut r = TunRouter::with_ops(
        "tun0",
        Recorder::default(),
        ResolvConfPaths {
            managed: dir.path().join("blocker").join("resolv.tun-router.conf"),
            ..ResolvConfPaths::with_dir(dir.path())
        },
    );
    r.reconciler().ops().fail("add_alias tun0 100.64.0.1/32");

    let err = r.set(&settings()).unwrap_err();
    let RouterError::Partial(failures) = &err else {
        panic!("expected partial failure, got {err:?}");
    };
    assert_eq!(failures.len(), 2);
    assert_eq!(failures.primary().kind(), ErrorKind::OsOperation);
    assert_eq!(failures.all()[1].kind(), ErrorKind::Io);
    assert_eq!(err.kind(), ErrorKind::OsOperation);

    // Remaining route changes still ran.
    assert_eq!(r.reconciler().ops().take().len(), 4);
}

#[test]
fn unsupported_configuration_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ResolvConfPaths::with_dir(dir.path());
    fs::write(&paths.resolv_conf, "nameserver 192.0.2.53\n").unwrap();
    let mut r = router(&dir);

    let mut two = settings();
    two.local_addrs.push("100.64.0.2/32".parse().unwrap());
    let err = r.set(&two).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedConfiguration);
    assert!(r.reconciler().ops().take().is_empty());
    assert_eq!(r.dns().state().unwrap(), ResolvConfState::Unmanaged);
    assert_eq!(
        fs::read_to_string(&paths.resolv_conf).unwrap(),
        "nameserver 192.0.2.53\n"
    );
}

#[test]
fn up_failure_is_returned() {
    let dir = tempfile::tempdir().unwrap();
    let mut r = router(&dir);
    r.reconciler().ops().fail("link tun0 up");

    let err = r.up().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OsOperation);
}

#[test]
fn close_survives_failures() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ResolvConfPaths::with_dir(dir.path());
    fs::write(&paths.resolv_conf, "nameserver 192.0.2.53\n").unwrap();
    let mut r = router(&dir);
    r.set(&settings()).unwrap();

    // Externally repointed: restore must refuse and leave it alone.
    fs::remove_file(&paths.resolv_conf).unwrap();
    fs::write(&paths.resolv_conf, "nameserver 203.0.113.1\n").unwrap();
    r.reconciler().ops().fail("link tun0 down");

    r.close();

    assert_eq!(
        fs::read_to_string(&paths.resolv_conf).unwrap(),
        "nameserver 203.0.113.1\n"
    );
    assert!(matches!(
        r.dns().state().unwrap(),
        ResolvConfState::BackedUp(_)
    ));
}

#[test]
fn close_removes_takeover_of_absent_resolv_conf() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ResolvConfPaths::with_dir(dir.path());
    let mut r = router(&dir);

    r.set(&settings()).unwrap();
    assert_eq!(r.dns().state().unwrap(), ResolvConfState::Managed);

    r.close();

    assert!(fs::symlink_metadata(&paths.resolv_conf).is_err());
    assert!(!paths.managed.exists());
    assert_eq!(r.dns().state().unwrap(), ResolvConfState::Unmanaged);
}

#[test]
fn state_survives_a_new_instance() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ResolvConfPaths::with_dir(dir.path());
    fs::write(&paths.resolv_conf, "nameserver 192.0.2.53\n").unwrap();

    let mut first = router(&dir);
    first.set(&settings()).unwrap();
    drop(first);

    // A fresh process restores the takeover left behind.
    let mut second = router(&dir);
    second.close();
    assert_eq!(
        fs::read_to_string(&paths.resolv_conf).unwrap(),
        "nameserver 192.0.2.53\n"
    );
}

// ---------------------------------------------------------------------------
// Root-only tests
// ---------------------------------------------------------------------------

#[test]
#[ignore = "requires root and an existing tun0 interface"]
fn real_interface_up_and_down() {
    let dir = tempfile::tempdir().unwrap();
    let mut r = TunRouter::with_ops(
        "tun0",
        tun_router::IfconfigOps::new(),
        ResolvConfPaths::with_dir(dir.path()),
    );
    r.up().unwrap();
    r.set(&Settings::new("100.64.0.1/32".parse().unwrap())).unwrap();
    r.close();
}

use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use domainlog::{
    DomainKey, DomainLogModule, HostCapabilities, Level, LogBus, LogEvent, MessageBody,
    PlainRenderer, Session, bridge::TracingBridge, config::Config,
};
use regex::Regex;
use tracing_subscriber::prelude::*;

struct Harness {
    dir: tempfile::TempDir,
    bus: Arc<LogBus>,
    module: DomainLogModule,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config {
            log_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        adjust(&mut config);
        let bus = Arc::new(LogBus::new());
        let module = DomainLogModule::load(
            &config,
            bus.clone(),
            &HostCapabilities::with_renderer(PlainRenderer),
        )
        .expect("module loads");
        Self { dir, bus, module }
    }

    fn log_for(&self, domain: &str, message: &str) {
        let session = Session::new().with_variable("domain_name", domain);
        let body = MessageBody::text(message);
        self.bus
            .dispatch(&LogEvent::new(Level::Info, &body).with_session(&session));
    }

    fn read(&self, domain: &str) -> String {
        read_domain(self.dir.path(), domain)
    }
}

fn read_domain(dir: &Path, domain: &str) -> String {
    fs::read_to_string(dir.join(format!("domain_{domain}.log"))).unwrap_or_default()
}

#[test]
fn full_cache_rejects_unseen_domain_and_keeps_existing_entries() {
    let harness = Harness::new();
    for i in 0..256 {
        harness.log_for(&format!("tenant{i}.example"), "first");
    }
    assert_eq!(harness.module.cache().len(), 256);

    harness.log_for("tenant256.example", "rejected");
    assert_eq!(harness.module.cache().len(), 256);
    assert!(
        !harness
            .dir
            .path()
            .join("domain_tenant256.example.log")
            .exists()
    );

    for i in 0..256 {
        harness.log_for(&format!("tenant{i}.example"), "second");
    }
    for i in 0..256 {
        let contents = harness.read(&format!("tenant{i}.example"));
        assert_eq!(contents.lines().count(), 2, "tenant{i}");
    }

    let metrics = harness.module.router().metrics_snapshot();
    assert_eq!(metrics.dropped_cache_full, 1);
    assert_eq!(metrics.lines_written, 512);
}

#[test]
fn concurrent_writers_for_one_domain_produce_whole_lines() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 100;

    let harness = Harness::new();
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let bus = Arc::clone(&harness.bus);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let session = Session::new()
                    .with_uuid(format!("uuid-{t}"))
                    .with_variable("domain_name", "shared.example");
                barrier.wait();
                for i in 0..PER_THREAD {
                    let body = MessageBody::text(format!("writer {t} message {i}"));
                    bus.dispatch(&LogEvent::new(Level::Info, &body).with_session(&session));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    let pattern = Regex::new(
        r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} \[INFO\] \[unknown:unknown:0\] writer (\d+) message \d+ \[uuid-(\d+)\]$",
    )
    .unwrap();
    let contents = harness.read("shared.example");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    for line in &lines {
        let captures = pattern.captures(line).unwrap_or_else(|| panic!("torn line: {line}"));
        assert_eq!(&captures[1], &captures[2]);
    }

    // Per-writer order is preserved.
    for t in 0..THREADS {
        let order: Vec<usize> = lines
            .iter()
            .filter(|line| line.contains(&format!("[uuid-{t}]")))
            .map(|line| {
                let tail = line.split(" message ").nth(1).unwrap();
                tail.split(' ').next().unwrap().parse().unwrap()
            })
            .collect();
        assert_eq!(order, (0..PER_THREAD).collect::<Vec<_>>());
    }
}

#[test]
fn concurrent_writers_for_distinct_domains_all_succeed() {
    const THREADS: usize = 16;
    const PER_THREAD: usize = 50;

    let harness = Harness::new();
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let bus = Arc::clone(&harness.bus);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    let body = MessageBody::text(format!("line {i} domain=tenant-{t}"));
                    bus.dispatch(&LogEvent::new(Level::Notice, &body));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    assert_eq!(harness.module.cache().len(), THREADS);
    for t in 0..THREADS {
        let contents = harness.read(&format!("tenant-{t}"));
        assert_eq!(contents.lines().count(), PER_THREAD);
        assert!(contents.lines().all(|line| line.contains("[NOTICE]")));
    }
}

#[test]
fn oversized_domain_is_truncated() {
    let harness = Harness::new();
    let long = "d".repeat(300);
    harness.log_for(&long, "hello");

    let truncated = "d".repeat(127);
    assert_eq!(harness.read(&truncated).lines().count(), 1);
    let key = DomainKey::new(&long).unwrap();
    assert!(harness.module.cache().get_or_create(&key).is_ok());
    assert_eq!(harness.module.cache().len(), 1);
}

#[test]
fn events_below_minimum_level_are_not_routed() {
    let harness = Harness::with_config(|config| config.min_level = Level::Warning);
    let session = Session::new().with_variable("domain", "quiet.example");
    for level in [Level::Debug, Level::Info, Level::Warning, Level::Err] {
        let body = MessageBody::text(format!("at {level}"));
        harness
            .bus
            .dispatch(&LogEvent::new(level, &body).with_session(&session));
    }

    let contents = harness.read("quiet.example");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("[WARNING]"));
    assert!(lines[1].contains("[ERR]"));
}

#[test]
fn shutdown_closes_handles_and_ignores_later_events() {
    let harness = Harness::new();
    harness.log_for("a.example", "one");
    harness.log_for("b.example", "one");
    let key = DomainKey::new("a.example").unwrap();
    let entry = harness.module.cache().get_or_create(&key).unwrap();

    let Harness { dir, bus, module } = harness;
    let report = module.shutdown();
    assert_eq!(report.domains, 2);
    assert_eq!(report.closed_handles, 2);
    assert!(!entry.is_open());

    let session = Session::new().with_variable("domain_name", "a.example");
    let body = MessageBody::text("too late");
    bus.dispatch(&LogEvent::new(Level::Info, &body).with_session(&session));
    assert!(entry.write(b"too late\n").is_err());
    assert!(!entry.is_open());
    assert_eq!(read_domain(dir.path(), "a.example").lines().count(), 1);
}

#[test]
fn tracing_events_route_through_the_bridge() {
    let harness = Harness::new();
    let subscriber = tracing_subscriber::registry().with(TracingBridge::new(harness.bus.clone()));

    let line_of_event = tracing::subscriber::with_default(subscriber, || {
        let span = tracing::info_span!(
            target: "switch",
            "call",
            domain_name = "acme.com",
            uuid = "call-7"
        );
        let _guard = span.enter();
        let line = line!() + 1;
        tracing::warn!(target: "switch", codec = "PCMU", "media timeout");
        tracing::info!(target: "switch", "no domain here");
        line
    });
    tracing::subscriber::with_default(
        tracing_subscriber::registry().with(TracingBridge::new(harness.bus.clone())),
        || tracing::error!(target: "switch", "registration failed domain=beta.net"),
    );

    let acme = harness.read("acme.com");
    let lines: Vec<&str> = acme.lines().collect();
    // The cache's own "Created cache entry" diagnostic fires inside the same span and must not
    // land in the file.
    assert_eq!(lines.len(), 2, "{acme}");
    let pattern = Regex::new(&format!(
        r"^\d{{4}}-\d{{2}}-\d{{2}} \d{{2}}:\d{{2}}:\d{{2}} \[WARNING\] \[tests/routing\.rs:routing:{line_of_event}\] media timeout codec=PCMU \[call-7\]$"
    ))
    .unwrap();
    assert!(pattern.is_match(lines[0]), "{}", lines[0]);
    assert!(lines[1].ends_with("] no domain here [call-7]"));

    let beta = harness.read("beta.net");
    assert!(beta.contains("[ERR]"));
    assert!(beta.trim_end().ends_with("registration failed domain=beta.net"));

    let metrics = harness.module.router().metrics_snapshot();
    assert!(metrics.dropped_internal >= 1);
}

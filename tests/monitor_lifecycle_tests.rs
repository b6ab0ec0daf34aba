// Integration tests: monitoring a virtual-clock host end to end
//
// Covers the leak-detection workflow a test harness runs: attach, exercise
// code that schedules timers, inspect the report, detach.

mod common;

use common::{args, init_tracing, Args, FakeTimers};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;
use tempfile::NamedTempFile;
use timeout_monitor::{CallSite, HostObject, MonitorConfig, MonitorError, TimeoutMonitor};

const THIS_FILE: &str = "tests/monitor_lifecycle_tests.rs";

fn attached(first_id: u64) -> (Rc<FakeTimers>, Rc<HostObject<u64, Args>>, TimeoutMonitor<u64, Args>) {
    init_tracing();
    let (timers, host) = FakeTimers::host(first_id);
    let monitor = TimeoutMonitor::attached_to(&host).unwrap();
    (timers, host, monitor)
}

fn assert_site(site: &Option<CallSite>, line: u32) {
    let site = site.as_ref().expect("call site should resolve");
    assert_eq!(site.file, THIS_FILE);
    assert_eq!(site.line, line);
    assert!(site.column >= 1);
}

#[test]
fn test_interval_scenario_from_schedule_to_clear() {
    let (timers, host, monitor) = attached(1000);

    let (id, line) = (host.set_interval(|_| {}, Duration::from_millis(500), args(&["foo", "bar"])).unwrap(), line!());

    assert_eq!(id, 1000);
    let report = monitor.report();
    assert_eq!(report.intervals.len(), 1);
    assert_eq!(report.intervals[0].0, 1000);
    assert_site(&report.intervals[0].1, line);
    assert_eq!(
        *timers.scheduled.borrow(),
        vec![(Duration::from_millis(500), args(&["foo", "bar"]))]
    );

    host.clear_interval(1000).unwrap();

    assert!(monitor.report().intervals.is_empty());
    assert_eq!(*timers.cleared_intervals.borrow(), vec![1000]);
}

#[test]
fn test_interval_ticks_keep_it_outstanding() {
    let (timers, host, monitor) = attached(1);
    let ticks = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&ticks);

    host.set_interval(
        move |args: Args| sink.borrow_mut().push(args),
        Duration::from_millis(100),
        args(&["poll"]),
    )
    .unwrap();
    timers.advance(Duration::from_millis(350));

    assert_eq!(ticks.borrow().len(), 3);
    assert!(ticks.borrow().iter().all(|tick| *tick == args(&["poll"])));
    assert_eq!(monitor.report().intervals.len(), 1);
}

#[test]
fn test_timeout_is_outstanding_until_it_fires() {
    let (timers, host, monitor) = attached(1000);
    let received = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&received);

    let id = host
        .set_timeout(
            move |args: Args| *sink.borrow_mut() = Some(args),
            Duration::from_millis(500),
            args(&["foo", "bar"]),
        )
        .unwrap();

    timers.advance(Duration::from_millis(499));
    assert_eq!(monitor.report().timeout_handles().collect::<Vec<_>>(), vec![&id]);
    assert!(received.borrow().is_none());

    timers.advance(Duration::from_millis(1));
    assert_eq!(*received.borrow(), Some(args(&["foo", "bar"])));
    assert!(monitor.report().is_clean());
}

#[test]
fn test_cleared_timeout_never_fires() {
    let (timers, host, monitor) = attached(1000);
    let fired = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&fired);

    let id = host
        .set_timeout(move |_| *flag.borrow_mut() = true, Duration::from_millis(10), vec![])
        .unwrap();
    host.clear_timeout(id).unwrap();
    timers.advance(Duration::from_secs(1));

    assert!(!*fired.borrow());
    assert_eq!(*timers.cleared_timeouts.borrow(), vec![id]);
    assert!(monitor.report().is_clean());
}

#[test]
fn test_unknown_handles_are_forwarded() {
    let (timers, host, monitor) = attached(1000);
    let id = host.set_interval(|_| {}, Duration::from_millis(5), vec![]).unwrap();

    host.clear_interval(9999).unwrap();
    host.clear_timeout(9999).unwrap();

    assert_eq!(*timers.cleared_intervals.borrow(), vec![9999]);
    assert_eq!(*timers.cleared_timeouts.borrow(), vec![9999]);
    assert_eq!(monitor.report().interval_handles().collect::<Vec<_>>(), vec![&id]);
}

#[test]
fn test_timeout_scheduled_from_a_callback_is_tracked() {
    let (timers, host, monitor) = attached(1);
    let inner_host = Rc::downgrade(&host);
    let follow_up_line = Rc::new(RefCell::new(0));
    let line_sink = Rc::clone(&follow_up_line);

    host.set_timeout(
        move |_| {
            if let Some(host) = inner_host.upgrade() {
                let (_, line) = (host.set_timeout(|_| {}, Duration::from_secs(60), vec![]).unwrap(), line!());
                *line_sink.borrow_mut() = line;
            }
        },
        Duration::from_millis(10),
        vec![],
    )
    .unwrap();

    timers.advance(Duration::from_millis(10));

    let report = monitor.report();
    assert_eq!(report.timeout_handles().collect::<Vec<_>>(), vec![&2]);
    assert_site(&report.timeouts[0].1, *follow_up_line.borrow());
    assert_eq!(timers.pending(), 1);
}

#[test]
fn test_interval_cleared_from_its_own_callback() {
    let (timers, host, monitor) = attached(1);
    let inner_host = Rc::downgrade(&host);
    let ticks = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&ticks);

    host.set_interval(
        move |_| {
            *counter.borrow_mut() += 1;
            if let Some(host) = inner_host.upgrade() {
                host.clear_interval(1).unwrap();
            }
        },
        Duration::from_millis(10),
        vec![],
    )
    .unwrap();
    timers.advance(Duration::from_millis(100));

    assert_eq!(*ticks.borrow(), 1);
    assert!(monitor.report().is_clean());
}

#[test]
fn test_leak_report_names_the_scheduling_line() {
    let (_timers, host, monitor) = attached(1000);

    let (_, line) = (host.set_interval(|_| {}, Duration::from_secs(1), vec![]).unwrap(), line!());
    host.set_timeout(|_| {}, Duration::from_secs(1), vec![]).unwrap();

    let report = monitor.report();
    assert!(!report.is_clean());
    assert_eq!(report.outstanding(), 2);

    let text = report.to_string();
    assert!(text.starts_with("Outstanding timers: 1 interval(s), 1 timeout(s)"));
    assert!(text.contains(&format!("{THIS_FILE}:{line}:")));

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["intervals"][0][0], 1000);
    assert_eq!(json["intervals"][0][1]["file"], THIS_FILE);
    assert_eq!(json["intervals"][0][1]["line"], line);
    assert_eq!(json["timeouts"][0][0], 1001);
}

#[test]
fn test_detach_stops_tracking_but_timers_keep_working() {
    let (timers, host, mut monitor) = attached(1);
    host.set_interval(|_| {}, Duration::from_millis(10), vec![]).unwrap();
    monitor.detach().unwrap();

    let fired = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&fired);
    host.set_timeout(move |_| *flag.borrow_mut() = true, Duration::from_millis(5), vec![])
        .unwrap();
    timers.advance(Duration::from_millis(5));

    assert!(*fired.borrow());
    assert!(monitor.report().is_clean());
    assert_eq!(monitor.detach(), Err(MonitorError::NotAttached));
}

#[test]
fn test_timeout_scheduled_before_detach_fires_after_it() {
    let (timers, host, mut monitor) = attached(1);
    let fired = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&fired);
    host.set_timeout(move |_| *flag.borrow_mut() = true, Duration::from_millis(5), vec![])
        .unwrap();

    monitor.detach().unwrap();
    monitor.attach(&host).unwrap();
    timers.advance(Duration::from_millis(5));

    assert!(*fired.borrow());
    assert!(monitor.report().is_clean());
}

#[test]
fn test_monitor_configured_from_file() {
    init_tracing();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "track_call_sites = false").unwrap();
    file.flush().unwrap();

    let config = MonitorConfig::from_file(file.path()).unwrap();
    let (_timers, host) = FakeTimers::host(1000);
    let mut monitor = TimeoutMonitor::with_config(config);
    monitor.attach(&host).unwrap();

    host.set_interval(|_| {}, Duration::from_millis(1), vec![]).unwrap();

    assert_eq!(monitor.report().intervals, vec![(1000, None)]);
}

#[test]
fn test_fixed_root_keeps_package_relative_caller_paths() {
    init_tracing();
    let (_timers, host) = FakeTimers::host(1);
    let root = std::env::temp_dir().join("elsewhere");
    let mut monitor = TimeoutMonitor::with_config(MonitorConfig::default().with_root(root));
    monitor.attach(&host).unwrap();

    let (_, line) = (host.set_timeout(|_| {}, Duration::from_millis(1), vec![]).unwrap(), line!());

    assert_site(&monitor.report().timeouts[0].1, line);
}

//! Console driver tests
//!
//! A whole session on a fake console: drawing, input dispatch through the
//! main loop, resize handling and shutdown.

use std::sync::Arc;
use std::time::Duration;

use ansi_console::app::{DriverConfig, ResolvedConfig};
use ansi_console::console::FakeConsole;
use ansi_console::core::{Attribute, Color, Size};
use ansi_console::input::records::{vk, ButtonState, MouseEventFlags};
use ansi_console::input::{KeyCode, KeyEvent, MouseEventRecord, MouseFlags, RawInputRecord};
use ansi_console::mainloop::{FakeMainLoopDriver, MainLoop};
use ansi_console::{ConsoleDriver, ConsoleEvent};
use parking_lot::Mutex;

const LEFT: ButtonState = ButtonState::FROM_LEFT_1ST_BUTTON_PRESSED;

struct Harness {
    driver: ConsoleDriver,
    console: Arc<FakeConsole>,
    fake: FakeMainLoopDriver,
    main_loop: MainLoop,
    events: Arc<Mutex<Vec<ConsoleEvent>>>,
}

fn harness(config: ResolvedConfig) -> Harness {
    let console = Arc::new(FakeConsole::new(40, 10));
    let driver = ConsoleDriver::with_port(console.clone(), config);
    let fake = FakeMainLoopDriver::with_sink(driver.input_sink());
    let main_loop = driver.init_with_driver(Box::new(fake.clone()));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    driver.set_event_handler(move |event| sink.lock().push(event));
    Harness {
        driver,
        console,
        fake,
        main_loop,
        events,
    }
}

fn plain_config() -> ResolvedConfig {
    DriverConfig::default().resolve_with(|_| None)
}

fn mouse(x: i32, y: i32, buttons: ButtonState, flags: MouseEventFlags) -> RawInputRecord {
    RawInputRecord::Mouse(MouseEventRecord::new(x, y, buttons, flags))
}

fn mouse_flags(events: &[ConsoleEvent]) -> Vec<MouseFlags> {
    events
        .iter()
        .filter_map(|event| match event {
            ConsoleEvent::Mouse(mouse) => Some(mouse.flags),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn test_first_refresh_paints_whole_screen() {
    let h = harness(plain_config());
    h.driver.move_cursor(0, 0);
    h.driver.add_str("hello");
    h.driver.refresh();

    let output = h.console.output();
    assert!(output.starts_with("\x1b[1;1H"));
    assert!(output.contains("hello"));
    // 16-color mode on a plain terminal
    assert!(output.contains("\x1b[37m\x1b[40m"));
    assert!(!output.contains("38;2"));
}

#[test]
fn test_incremental_refresh_writes_only_changes() {
    let h = harness(plain_config());
    h.driver.refresh();
    h.console.take_writes();

    h.driver.set_attribute(Attribute::new(Color::YELLOW, Color::BLUE));
    h.driver.move_cursor(10, 4);
    h.driver.add_str("ok");
    h.driver.refresh();

    let output = h.console.output();
    assert!(output.starts_with("\x1b[5;11H\x1b[33m\x1b[44mok"));
    assert!(output.contains("\x1b[5;13H"));
}

#[test]
fn test_rich_terminal_uses_true_color() {
    let config = DriverConfig::default().resolve_with(|name| (name == "WT_SESSION").then(|| "1".to_string()));
    let h = harness(config);
    assert!(h.console.writes()[0].contains("\x1b[?1049h"));

    h.driver.add_str("x");
    h.driver.refresh();
    assert!(h.console.output().contains("\x1b[38;2;"));
}

#[test]
fn test_end_restores_terminal_and_stops_output() {
    let config = ResolvedConfig {
        use_alternate_screen: true,
        ..plain_config()
    };
    let h = harness(config);
    h.driver.end();
    assert!(h.console.is_cleaned_up());
    assert!(h.console.output().contains("\x1b[?1049l"));

    let written = h.console.writes().len();
    h.driver.add_str("late");
    h.driver.refresh();
    assert_eq!(h.console.writes().len(), written);
}

#[test]
fn test_degraded_driver_never_writes() {
    let console = Arc::new(FakeConsole::new(0, 0));
    let driver = ConsoleDriver::with_port(console.clone(), plain_config());
    let _main_loop = driver.init();

    assert!(driver.is_degraded());
    assert_eq!(driver.size(), Size::new(80, 25));
    driver.add_str("nothing");
    driver.refresh();
    assert!(console.writes().is_empty());
}

// ============================================================================
// Input
// ============================================================================

#[test]
fn test_send_keys_with_ctrl() {
    let h = harness(plain_config());
    h.driver.send_keys('c', vk::KEY_A + 2, false, false, true);

    let events = h.events.lock().clone();
    assert_eq!(
        events,
        vec![
            ConsoleEvent::Key(KeyEvent::down(KeyCode::NULL | KeyCode::CTRL_MASK)),
            ConsoleEvent::Key(KeyEvent::down(KeyCode::CTRL_MASK | KeyCode::C)),
            ConsoleEvent::Key(KeyEvent::up(KeyCode::CTRL_MASK | KeyCode::C)),
        ]
    );
}

#[test]
fn test_click_through_main_loop() {
    let h = harness(plain_config());
    h.fake.push_input(mouse(3, 3, LEFT, MouseEventFlags::empty()));
    h.fake.push_input(mouse(3, 3, ButtonState::empty(), MouseEventFlags::empty()));
    h.fake.push_input(mouse(3, 3, ButtonState::empty(), MouseEventFlags::MOUSE_MOVED));
    h.main_loop.run_iteration();

    assert_eq!(
        mouse_flags(&h.events.lock()),
        vec![
            MouseFlags::BUTTON1_PRESSED,
            MouseFlags::BUTTON1_RELEASED,
            MouseFlags::BUTTON1_CLICKED
        ]
    );
}

#[test]
fn test_double_click_latch_expires() {
    let config = ResolvedConfig {
        double_click_latch: Duration::from_millis(1),
        ..plain_config()
    };
    let h = harness(config);
    h.fake.push_input(mouse(1, 1, LEFT, MouseEventFlags::empty()));
    h.fake.push_input(mouse(1, 1, ButtonState::empty(), MouseEventFlags::empty()));
    h.fake.push_input(mouse(1, 1, LEFT, MouseEventFlags::DOUBLE_CLICK));
    h.main_loop.run_iteration();
    assert_eq!(h.main_loop.timeouts_len(), 1);

    std::thread::sleep(Duration::from_millis(10));
    h.main_loop.run_iteration();
    assert_eq!(h.main_loop.timeouts_len(), 0);

    h.fake.push_input(mouse(1, 1, LEFT, MouseEventFlags::empty()));
    h.main_loop.run_iteration();
    let flags = mouse_flags(&h.events.lock());
    assert_eq!(flags[2], MouseFlags::BUTTON1_DOUBLE_CLICKED);
    assert_eq!(flags[3], MouseFlags::BUTTON1_PRESSED);
}

#[test]
fn test_triple_click_within_latch() {
    let h = harness(plain_config());
    h.fake.push_input(mouse(1, 1, LEFT, MouseEventFlags::empty()));
    h.fake.push_input(mouse(1, 1, ButtonState::empty(), MouseEventFlags::empty()));
    h.fake.push_input(mouse(1, 1, LEFT, MouseEventFlags::DOUBLE_CLICK));
    h.fake.push_input(mouse(1, 1, LEFT, MouseEventFlags::empty()));
    h.main_loop.run_iteration();

    let flags = mouse_flags(&h.events.lock());
    assert_eq!(flags.last(), Some(&MouseFlags::BUTTON1_TRIPLE_CLICKED));
}

#[test]
fn test_focus_is_forwarded() {
    let h = harness(plain_config());
    h.fake.push_input(RawInputRecord::Focus(false));
    h.main_loop.run_iteration();
    assert_eq!(*h.events.lock(), vec![ConsoleEvent::Focus(false)]);
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn test_resize_record_rebuilds_grid() {
    let h = harness(plain_config());
    h.driver.refresh();
    h.console.take_writes();

    h.fake.push_input(RawInputRecord::Resize(Size::new(30, 8)));
    h.main_loop.run_iteration();

    assert_eq!(h.driver.size(), Size::new(30, 8));
    assert_eq!(*h.events.lock(), vec![ConsoleEvent::Resized(Size::new(30, 8))]);
    assert!(h.driver.with_grid(|grid| grid.has_dirty_cells()));

    h.driver.refresh();
    let output = h.console.output();
    assert!(output.contains("\x1b[8;1H"));
    assert!(!output.contains("\x1b[9;1H"));
}

#[test]
fn test_polling_ignores_resize_records() {
    let config = ResolvedConfig {
        resize: ansi_console::mainloop::ResizeStrategy::polling(),
        ..plain_config()
    };
    let h = harness(config);
    h.fake.push_input(RawInputRecord::Resize(Size::new(30, 8)));
    h.main_loop.run_iteration();

    assert_eq!(h.driver.size(), Size::new(40, 10));
    assert!(h.events.lock().is_empty());
}

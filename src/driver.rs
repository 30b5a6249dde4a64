//! Console Driver
//!
//! One terminal session: the port, the cell grid and cursor, the key and
//! mouse decoders and the consumer's event handler. The driver is a cheap
//! cloneable handle; clones share the session.
//!
//! Without a usable console the driver runs degraded: the grid still works
//! at 80x25 but nothing is rendered.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use unicode_width::UnicodeWidthChar;

use crate::app::{DriverConfig, ResolvedConfig};
use crate::console::{ConsolePort, CursorVisibility};
use crate::core::{Attribute, Grid, Size};
use crate::input::key::packet_to_virtual_key;
use crate::input::mouse::GestureRule;
use crate::input::records::vk;
use crate::input::{
    ControlKeyState, KeyDecoder, KeyEvent, KeyEventRecord, MouseEvent, MouseFlags, MouseGestureTracker,
    MouseEventRecord, RawInputRecord,
};
use crate::mainloop::{AnsiMainLoopDriver, FakeMainLoopDriver, InputSink, MainLoop, MainLoopDriver, TimeoutToken};
use crate::renderer::ScreenRenderer;

/// Size used when the console cannot report one
pub const DEFAULT_SIZE: Size = Size::new(80, 25);

/// A normalized event delivered to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resized(Size),
    Focus(bool),
}

type EventHandler = Box<dyn FnMut(ConsoleEvent) + Send>;

struct Screen {
    grid: Grid,
    cursor_col: i32,
    cursor_row: i32,
    /// Visibility to restore once the cursor is back on screen
    cached_visibility: Option<CursorVisibility>,
    current_attribute: Attribute,
    force_16_colors: bool,
}

#[derive(Default)]
struct InputState {
    keys: KeyDecoder,
    mouse: MouseGestureTracker,
    continuous_press: Option<TimeoutToken>,
    latch_reset: Option<TimeoutToken>,
}

struct DriverCore {
    port: Mutex<Option<Arc<dyn ConsolePort>>>,
    config: ResolvedConfig,
    screen: Mutex<Screen>,
    input: Mutex<InputState>,
    handler: Mutex<Option<EventHandler>>,
    renderer: Mutex<ScreenRenderer>,
}

/// Handle to one console session
#[derive(Clone)]
pub struct ConsoleDriver {
    core: Arc<DriverCore>,
}

impl ConsoleDriver {
    /// Open the process's terminal, or run degraded if there is none
    pub fn new(config: &DriverConfig) -> Self {
        let resolved = config.resolve();
        #[cfg(unix)]
        let port: Option<Arc<dyn ConsolePort>> = match crate::console::UnixConsole::open() {
            Ok(console) => Some(Arc::new(console)),
            Err(e) => {
                warn!(error = %e, "console unavailable, running without output");
                None
            }
        };
        #[cfg(not(unix))]
        let port: Option<Arc<dyn ConsolePort>> = {
            warn!("no console port for this platform, running without output");
            None
        };
        Self::from_parts(port, resolved)
    }

    pub fn with_port(port: Arc<dyn ConsolePort>, config: ResolvedConfig) -> Self {
        Self::from_parts(Some(port), config)
    }

    /// A session with no console
    pub fn degraded(config: ResolvedConfig) -> Self {
        Self::from_parts(None, config)
    }

    fn from_parts(port: Option<Arc<dyn ConsolePort>>, config: ResolvedConfig) -> Self {
        Self {
            core: Arc::new(DriverCore {
                port: Mutex::new(port),
                config,
                screen: Mutex::new(Screen {
                    grid: Grid::new(DEFAULT_SIZE.cols, DEFAULT_SIZE.rows),
                    cursor_col: 0,
                    cursor_row: 0,
                    cached_visibility: None,
                    current_attribute: Attribute::default(),
                    force_16_colors: config.force_16_colors,
                }),
                input: Mutex::new(InputState::default()),
                handler: Mutex::new(None),
                renderer: Mutex::new(ScreenRenderer::new()),
            }),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.core.config
    }

    pub fn port(&self) -> Option<Arc<dyn ConsolePort>> {
        self.core.port.lock().clone()
    }

    pub fn is_degraded(&self) -> bool {
        self.core.port.lock().is_none()
    }

    /// Start the session and create its main loop
    pub fn init(&self) -> MainLoop {
        self.start_session();
        let driver: Box<dyn MainLoopDriver> = match self.port() {
            Some(port) => Box::new(AnsiMainLoopDriver::new(port, self.input_sink(), self.core.config.resize)),
            None => Box::new(FakeMainLoopDriver::with_sink(self.input_sink())),
        };
        MainLoop::new(driver)
    }

    /// Start the session on a caller-supplied main loop driver
    pub fn init_with_driver(&self, driver: Box<dyn MainLoopDriver>) -> MainLoop {
        self.start_session();
        MainLoop::new(driver)
    }

    fn start_session(&self) {
        let size = match self.port() {
            Some(port) => match port.window_size() {
                Ok(ws) if !ws.size().is_empty() => {
                    if self.core.config.use_alternate_screen {
                        port.write(crate::renderer::ansi::ENTER_ALTERNATE_SCREEN);
                    }
                    ws.size()
                }
                Ok(_) => {
                    warn!("console reported an empty window, running without output");
                    *self.core.port.lock() = None;
                    DEFAULT_SIZE
                }
                Err(e) => {
                    warn!(error = %e, "console window size unavailable, running without output");
                    *self.core.port.lock() = None;
                    DEFAULT_SIZE
                }
            },
            None => DEFAULT_SIZE,
        };

        {
            let mut screen = self.core.screen.lock();
            screen.current_attribute = Attribute::default();
            screen.grid = Grid::new(size.cols, size.rows);
        }
        if let Some(port) = self.port() {
            port.capture_initial_cursor_visibility();
        }
        debug!(cols = size.cols, rows = size.rows, degraded = self.is_degraded(), "console session started");
    }

    /// End the session and give the terminal back
    pub fn end(&self) {
        let port = self.core.port.lock().take();
        if let Some(port) = port {
            if self.core.config.use_alternate_screen {
                port.write(crate::renderer::ansi::LEAVE_ALTERNATE_SCREEN);
            }
            port.cleanup();
        }
        debug!("console session ended");
    }

    /// The sink a main loop driver feeds this session's input into
    pub fn input_sink(&self) -> Arc<dyn InputSink> {
        Arc::new(self.clone())
    }

    /// Install the consumer of normalized events, replacing any previous one
    pub fn set_event_handler<F>(&self, handler: F)
    where
        F: FnMut(ConsoleEvent) + Send + 'static,
    {
        *self.core.handler.lock() = Some(Box::new(handler));
    }

    fn dispatch(&self, event: ConsoleEvent) {
        // The handler may call back into the driver, so it runs unlocked.
        let handler = self.core.handler.lock().take();
        if let Some(mut handler) = handler {
            handler(event);
            let mut slot = self.core.handler.lock();
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
    }

    // ========================================================================
    // Screen
    // ========================================================================

    pub fn cols(&self) -> usize {
        self.core.screen.lock().grid.cols()
    }

    pub fn rows(&self) -> usize {
        self.core.screen.lock().grid.rows()
    }

    pub fn size(&self) -> Size {
        let screen = self.core.screen.lock();
        Size::new(screen.grid.cols(), screen.grid.rows())
    }

    /// Run `f` with the grid
    pub fn with_grid<R>(&self, f: impl FnOnce(&mut Grid) -> R) -> R {
        f(&mut self.core.screen.lock().grid)
    }

    /// Move the drawing cursor; may be placed off screen
    pub fn move_cursor(&self, col: i32, row: i32) {
        let mut screen = self.core.screen.lock();
        screen.cursor_col = col;
        screen.cursor_row = row;
    }

    pub fn cursor_position(&self) -> (i32, i32) {
        let screen = self.core.screen.lock();
        (screen.cursor_col, screen.cursor_row)
    }

    pub fn attribute(&self) -> Attribute {
        self.core.screen.lock().current_attribute
    }

    pub fn set_attribute(&self, attribute: Attribute) {
        self.core.screen.lock().current_attribute = attribute;
    }

    /// Put a rune at the cursor with the current attribute and advance
    pub fn add_rune(&self, rune: char) {
        let mut screen = self.core.screen.lock();
        let (col, row) = (screen.cursor_col, screen.cursor_row);
        if col < 0 || row < 0 {
            screen.cursor_col += 1;
            return;
        }
        let attribute = screen.current_attribute;
        screen.grid.add_rune(col as usize, row as usize, rune, attribute);
        screen.cursor_col += rune.width().unwrap_or(1) as i32;
    }

    pub fn add_str(&self, text: &str) {
        for rune in text.chars() {
            self.add_rune(rune);
        }
    }

    /// Fill a rectangle with the current attribute
    pub fn fill_rect(&self, left: usize, top: usize, width: usize, height: usize, rune: char) {
        let mut screen = self.core.screen.lock();
        let attribute = screen.current_attribute;
        screen.grid.fill(left, top, width, height, rune, attribute);
    }

    pub fn clear_contents(&self) {
        self.core.screen.lock().grid.clear_contents();
    }

    pub fn force_16_colors(&self) -> bool {
        self.core.screen.lock().force_16_colors
    }

    /// Switch color mode; the next render repaints everything
    pub fn set_force_16_colors(&self, force: bool) {
        let mut screen = self.core.screen.lock();
        if screen.force_16_colors != force {
            screen.force_16_colors = force;
            screen.grid.mark_all_dirty();
        }
    }

    /// Only Basic Multilingual Plane characters render reliably
    pub fn is_rune_supported(&self, rune: char) -> bool {
        (rune as u32) <= 0xFFFF && !rune.is_control()
    }

    /// Write the grid's dirty cells to the console
    pub fn update_screen(&self) {
        let Some(port) = self.port() else {
            return;
        };
        let mut screen = self.core.screen.lock();
        let cursor = (screen.cursor_col.max(0) as usize, screen.cursor_row.max(0) as usize);
        let force_16_colors = screen.force_16_colors;
        let stats = self
            .core
            .renderer
            .lock()
            .render(&mut screen.grid, force_16_colors, cursor, |text| port.write(text));
        trace!(
            rows = stats.rows_written,
            cells = stats.cells_written,
            colors = stats.color_changes,
            writes = stats.writes,
            "screen updated"
        );
    }

    /// Place the console cursor at the drawing cursor, hiding it while it
    /// is off screen
    pub fn update_cursor(&self) {
        let Some(port) = self.port() else {
            return;
        };
        let mut screen = self.core.screen.lock();
        let (col, row) = (screen.cursor_col, screen.cursor_row);
        let cols = screen.grid.cols() as i32;
        let rows = screen.grid.rows() as i32;

        if col < 0 || row < 0 || col > cols || row > rows {
            if let Some(current) = port.cursor_visibility() {
                if current != CursorVisibility::Invisible || screen.cached_visibility.is_none() {
                    screen.cached_visibility = Some(current);
                }
            }
            port.set_cursor_visibility(CursorVisibility::Invisible);
            return;
        }

        port.set_cursor_position(col as usize, row as usize);
        port.set_cursor_visibility(screen.cached_visibility.unwrap_or(CursorVisibility::Default));
    }

    /// Render and place the cursor
    pub fn refresh(&self) {
        self.update_screen();
        self.update_cursor();
    }

    pub fn cursor_visibility(&self) -> Option<CursorVisibility> {
        match self.port() {
            Some(port) => port.cursor_visibility(),
            None => self.core.screen.lock().cached_visibility,
        }
    }

    /// Returns whether the console applied the request
    pub fn set_cursor_visibility(&self, visibility: CursorVisibility) -> bool {
        self.core.screen.lock().cached_visibility = Some(visibility);
        match self.port() {
            Some(port) => port.set_cursor_visibility(visibility),
            None => visibility == CursorVisibility::Invisible,
        }
    }

    pub fn ensure_cursor_visibility(&self) -> bool {
        self.port().map(|port| port.ensure_cursor_visibility()).unwrap_or(false)
    }

    /// Repaint everything on the next render and re-emit the cursor state
    pub fn resize_screen(&self) {
        self.core.screen.lock().grid.mark_all_dirty();
        if let Some(port) = self.port() {
            port.force_refresh_cursor_visibility();
        }
    }

    fn apply_resize(&self, size: Size) {
        {
            let mut screen = self.core.screen.lock();
            screen.grid.resize(size.cols, size.rows);
        }
        self.resize_screen();
        debug!(cols = size.cols, rows = size.rows, "screen resized");
        self.dispatch(ConsoleEvent::Resized(size));
    }

    // ========================================================================
    // Input
    // ========================================================================

    fn process_key(&self, record: &KeyEventRecord) {
        let record = if record.virtual_key_code == vk::PACKET {
            packet_to_virtual_key(record)
        } else {
            *record
        };
        let event = self.core.input.lock().keys.decode(&record);
        debug!(
            down = record.key_down,
            vk = record.virtual_key_code,
            ch = ?record.unicode_char,
            state = record.control_key_state.bits(),
            key = ?event.map(|e| e.code.to_string()),
            "key record"
        );
        if let Some(event) = event {
            self.dispatch(ConsoleEvent::Key(event));
        }
    }

    fn process_mouse(&self, record: &MouseEventRecord, main_loop: &MainLoop) {
        let outcome = self.core.input.lock().mouse.process(record);
        debug!(
            x = outcome.event.x,
            y = outcome.event.y,
            flags = outcome.event.flags.bits(),
            rule = ?outcome.rule,
            "mouse event"
        );

        if outcome.schedule_latch_reset {
            self.schedule_latch_reset(main_loop);
        }
        if matches!(
            outcome.rule,
            GestureRule::Release | GestureRule::ConfirmClick | GestureRule::ImplicitRelease
        ) {
            self.stop_continuous_press(main_loop);
        }
        if let Some(flags) = outcome.start_continuous_press {
            if self.core.config.want_continuous_button_pressed {
                self.start_continuous_press(flags, main_loop);
            }
        }
        self.dispatch(ConsoleEvent::Mouse(outcome.event));
    }

    fn schedule_latch_reset(&self, main_loop: &MainLoop) {
        let core: Weak<DriverCore> = Arc::downgrade(&self.core);
        let token = main_loop.add_timeout(self.core.config.double_click_latch, move |_| {
            if let Some(core) = core.upgrade() {
                let mut input = core.input.lock();
                input.mouse.clear_double_click();
                input.latch_reset = None;
            }
            false
        });
        let previous = self.core.input.lock().latch_reset.replace(token);
        if let Some(previous) = previous {
            main_loop.remove_timeout(previous);
        }
    }

    fn stop_continuous_press(&self, main_loop: &MainLoop) {
        let token = self.core.input.lock().continuous_press.take();
        if let Some(token) = token {
            main_loop.remove_timeout(token);
        }
    }

    fn start_continuous_press(&self, flags: MouseFlags, main_loop: &MainLoop) {
        self.stop_continuous_press(main_loop);
        let core: Weak<DriverCore> = Arc::downgrade(&self.core);
        let token = main_loop.add_timeout(self.core.config.continuous_press_interval, move |_| {
            let Some(core) = core.upgrade() else {
                return false;
            };
            let event = {
                let mut input = core.input.lock();
                let event = input.mouse.continuous_press_event(flags);
                if event.is_none() {
                    input.continuous_press = None;
                }
                event
            };
            match event {
                Some(event) => {
                    ConsoleDriver { core }.dispatch(ConsoleEvent::Mouse(event));
                    true
                }
                None => false,
            }
        });
        self.core.input.lock().continuous_press = Some(token);
    }

    /// Feed synthetic key records for one keystroke
    ///
    /// A modifier key-down is sent first when any modifier is held, then the
    /// key's down and up records.
    pub fn send_keys(&self, ch: char, virtual_key: u16, shift: bool, alt: bool, ctrl: bool) {
        let mut state = ControlKeyState::empty();
        let mut modifier_key = 0;
        if shift {
            state |= ControlKeyState::SHIFT_PRESSED;
            modifier_key = vk::SHIFT;
        }
        if alt {
            state |= ControlKeyState::LEFT_ALT_PRESSED | ControlKeyState::RIGHT_ALT_PRESSED;
            modifier_key = vk::MENU;
        }
        if ctrl {
            state |= ControlKeyState::LEFT_CTRL_PRESSED | ControlKeyState::RIGHT_CTRL_PRESSED;
            modifier_key = vk::CONTROL;
        }

        if shift || alt || ctrl {
            self.process_key(&KeyEventRecord::new(true, modifier_key, '\0', state));
        }
        let down = KeyEventRecord::new(true, virtual_key, ch, state);
        self.process_key(&down);
        self.process_key(&down.released());
    }
}

impl InputSink for ConsoleDriver {
    fn process_input(&self, record: RawInputRecord, main_loop: &MainLoop) {
        match record {
            RawInputRecord::Key(key) => self.process_key(&key),
            RawInputRecord::Mouse(mouse) => self.process_mouse(&mouse, main_loop),
            RawInputRecord::Focus(focused) => self.dispatch(ConsoleEvent::Focus(focused)),
            RawInputRecord::Resize(size) => {
                if self.core.config.resize.accepts_resize_records() {
                    self.apply_resize(size);
                }
            }
        }
    }

    fn window_size_changed(&self, size: Size, _main_loop: &MainLoop) {
        self.apply_resize(size);
    }

    fn known_size(&self) -> Size {
        self.size()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::console::FakeConsole;
    use crate::core::Color;
    use crate::input::records::{ButtonState, MouseEventFlags};
    use crate::input::KeyCode;
    use crate::mainloop::{ManualClock, ResizeStrategy};

    struct Session {
        driver: ConsoleDriver,
        console: Arc<FakeConsole>,
        main_loop: MainLoop,
        clock: Arc<ManualClock>,
        fake: FakeMainLoopDriver,
        events: Arc<Mutex<Vec<ConsoleEvent>>>,
    }

    fn session_with(config: ResolvedConfig) -> Session {
        let console = Arc::new(FakeConsole::new(20, 5));
        let driver = ConsoleDriver::with_port(console.clone(), config);
        let fake = FakeMainLoopDriver::with_sink(driver.input_sink());
        let clock = Arc::new(ManualClock::new());
        driver.start_session();
        let main_loop = MainLoop::with_clock(Box::new(fake.clone()), clock.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        driver.set_event_handler(move |event| sink.lock().push(event));
        console.take_writes();
        Session {
            driver,
            console,
            main_loop,
            clock,
            fake,
            events,
        }
    }

    fn session() -> Session {
        session_with(ResolvedConfig::default())
    }

    fn mouse(x: i32, y: i32, buttons: ButtonState, flags: MouseEventFlags) -> RawInputRecord {
        RawInputRecord::Mouse(MouseEventRecord::new(x, y, buttons, flags))
    }

    const LEFT: ButtonState = ButtonState::FROM_LEFT_1ST_BUTTON_PRESSED;
    const RIGHT: ButtonState = ButtonState::RIGHTMOST_BUTTON_PRESSED;

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    #[test]
    fn test_init_sizes_grid_from_console() {
        let s = session();
        assert_eq!(s.driver.size(), Size::new(20, 5));
        assert!(!s.driver.is_degraded());
    }

    #[test]
    fn test_window_size_failure_degrades() {
        let console = Arc::new(FakeConsole::new(20, 5));
        console.set_fail_window_size(true);
        let driver = ConsoleDriver::with_port(console.clone(), ResolvedConfig::default());
        let _main_loop = driver.init();
        assert!(driver.is_degraded());
        assert_eq!(driver.size(), DEFAULT_SIZE);

        driver.add_str("hi");
        driver.refresh();
        assert!(console.writes().is_empty());
    }

    #[test]
    fn test_alternate_screen_enter_and_leave() {
        let console = Arc::new(FakeConsole::new(20, 5));
        let config = ResolvedConfig {
            use_alternate_screen: true,
            ..ResolvedConfig::default()
        };
        let driver = ConsoleDriver::with_port(console.clone(), config);
        driver.start_session();
        assert_eq!(console.writes()[0], "\x1b[?1049h");

        driver.end();
        assert!(console.output().contains("\x1b[?1049l"));
        assert!(console.is_cleaned_up());
        assert!(driver.is_degraded());
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    #[test]
    fn test_add_str_advances_cursor() {
        let s = session();
        s.driver.move_cursor(2, 1);
        s.driver.add_str("ab");
        assert_eq!(s.driver.cursor_position(), (4, 1));
        s.driver.with_grid(|grid| {
            assert_eq!(grid.cell(2, 1).unwrap().rune, 'a');
            assert_eq!(grid.cell(3, 1).unwrap().rune, 'b');
        });
    }

    #[test]
    fn test_wide_rune_advances_two() {
        let s = session();
        s.driver.move_cursor(0, 0);
        s.driver.add_rune('日');
        assert_eq!(s.driver.cursor_position(), (2, 0));
    }

    #[test]
    fn test_refresh_renders_and_places_cursor() {
        let s = session();
        s.driver.update_screen();
        s.console.take_writes();

        s.driver.set_attribute(Attribute::new(Color::RED, Color::BLACK));
        s.driver.move_cursor(3, 2);
        s.driver.add_rune('x');
        s.driver.refresh();

        let output = s.console.output();
        assert!(output.contains("\x1b[3;4H"));
        assert!(output.contains('x'));
        assert!(output.ends_with("\x1b[?25h\x1b[0 q"));
    }

    #[test]
    fn test_update_screen_degraded_is_noop() {
        let driver = ConsoleDriver::degraded(ResolvedConfig::default());
        driver.add_str("abc");
        driver.update_screen();
        assert!(driver.with_grid(|grid| grid.has_dirty_cells()));
    }

    #[test]
    fn test_force_16_colors_repaints() {
        let s = session();
        s.driver.update_screen();
        assert!(!s.driver.with_grid(|grid| grid.has_dirty_cells()));

        let force = !s.driver.force_16_colors();
        s.driver.set_force_16_colors(force);
        assert!(s.driver.with_grid(|grid| grid.has_dirty_cells()));
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    #[test]
    fn test_cursor_off_screen_is_hidden_then_restored() {
        let s = session();
        s.driver.set_cursor_visibility(CursorVisibility::Box);
        s.console.take_writes();

        s.driver.move_cursor(-1, 0);
        s.driver.update_cursor();
        s.driver.update_cursor();
        assert_eq!(s.console.take_writes(), vec!["\x1b[?25l".to_string()]);

        s.driver.move_cursor(1, 1);
        s.driver.update_cursor();
        assert_eq!(
            s.console.take_writes(),
            vec!["\x1b[2;2H".to_string(), "\x1b[?25h\x1b[1 q".to_string()]
        );
    }

    #[test]
    fn test_cursor_at_grid_edge_is_visible() {
        let s = session();
        s.driver.move_cursor(20, 5);
        s.driver.update_cursor();
        assert_eq!(s.console.writes()[0], "\x1b[6;21H");
    }

    #[test]
    fn test_cursor_visibility_degraded_uses_cache() {
        let driver = ConsoleDriver::degraded(ResolvedConfig::default());
        assert_eq!(driver.cursor_visibility(), None);
        assert!(driver.set_cursor_visibility(CursorVisibility::Invisible));
        assert_eq!(driver.cursor_visibility(), Some(CursorVisibility::Invisible));
        assert!(!driver.set_cursor_visibility(CursorVisibility::Box));
    }

    // ========================================================================
    // Input
    // ========================================================================

    #[test]
    fn test_key_records_are_decoded() {
        let s = session();
        s.fake.push_input(RawInputRecord::Key(KeyEventRecord::new(
            true,
            vk::KEY_A,
            'a',
            ControlKeyState::LEFT_CTRL_PRESSED,
        )));
        s.main_loop.run_iteration();
        assert_eq!(
            *s.events.lock(),
            vec![ConsoleEvent::Key(KeyEvent::down(KeyCode::CTRL_MASK | KeyCode::A))]
        );
    }

    #[test]
    fn test_packet_records_are_translated() {
        let s = session();
        s.fake.push_input(RawInputRecord::Key(KeyEventRecord::new(
            true,
            vk::PACKET,
            'q',
            ControlKeyState::empty(),
        )));
        s.main_loop.run_iteration();
        assert_eq!(
            *s.events.lock(),
            vec![ConsoleEvent::Key(KeyEvent::down(KeyCode::Q))]
        );
    }

    #[test]
    fn test_send_keys_with_modifier() {
        let s = session();
        s.driver.send_keys('\u{1}', vk::KEY_A, false, false, true);
        let events = s.events.lock().clone();
        assert_eq!(
            events,
            vec![
                ConsoleEvent::Key(KeyEvent::down(KeyCode::NULL | KeyCode::CTRL_MASK)),
                ConsoleEvent::Key(KeyEvent::down(KeyCode::CTRL_MASK | KeyCode::A)),
                ConsoleEvent::Key(KeyEvent::up(KeyCode::CTRL_MASK | KeyCode::A)),
            ]
        );
    }

    #[test]
    fn test_send_keys_plain() {
        let s = session();
        s.driver.send_keys('x', vk::KEY_A + 23, false, false, false);
        assert_eq!(s.events.lock().len(), 2);
    }

    #[test]
    fn test_focus_is_forwarded() {
        let s = session();
        s.fake.push_input(RawInputRecord::Focus(false));
        s.main_loop.run_iteration();
        assert_eq!(*s.events.lock(), vec![ConsoleEvent::Focus(false)]);
    }

    #[test]
    fn test_resize_record_resizes_grid() {
        let s = session();
        s.console.take_writes();
        s.fake.push_input(RawInputRecord::Resize(Size::new(30, 10)));
        s.main_loop.run_iteration();
        assert_eq!(s.driver.size(), Size::new(30, 10));
        assert_eq!(*s.events.lock(), vec![ConsoleEvent::Resized(Size::new(30, 10))]);
        assert!(s.driver.with_grid(|grid| grid.has_dirty_cells()));
    }

    #[test]
    fn test_resize_record_ignored_when_polling() {
        let s = session_with(ResolvedConfig {
            resize: ResizeStrategy::polling(),
            ..ResolvedConfig::default()
        });
        s.fake.push_input(RawInputRecord::Resize(Size::new(30, 10)));
        s.main_loop.run_iteration();
        assert_eq!(s.driver.size(), Size::new(20, 5));
        assert!(s.events.lock().is_empty());
    }

    #[test]
    fn test_double_click_latch_resets_after_timer() {
        let s = session();
        s.fake.push_input(mouse(1, 1, LEFT, MouseEventFlags::empty()));
        s.fake.push_input(mouse(1, 1, ButtonState::empty(), MouseEventFlags::empty()));
        s.fake.push_input(mouse(1, 1, LEFT, MouseEventFlags::DOUBLE_CLICK));
        s.main_loop.run_iteration();
        assert_eq!(s.main_loop.timeouts_len(), 1);

        s.clock.advance(Duration::from_millis(301));
        s.main_loop.run_iteration();
        assert_eq!(s.main_loop.timeouts_len(), 0);
        let phase = s.driver.core.input.lock().mouse.phase();
        assert_eq!(phase, crate::input::mouse::GesturePhase::Idle);
    }

    #[test]
    fn test_continuous_press_reemits_while_held() {
        let s = session_with(ResolvedConfig {
            want_continuous_button_pressed: true,
            ..ResolvedConfig::default()
        });
        s.fake.push_input(mouse(4, 2, LEFT, MouseEventFlags::empty()));
        s.main_loop.run_iteration();
        assert_eq!(s.events.lock().len(), 1);

        s.clock.advance(Duration::from_millis(101));
        s.main_loop.run_iteration();
        s.clock.advance(Duration::from_millis(101));
        s.main_loop.run_iteration();
        {
            let events = s.events.lock();
            assert_eq!(events.len(), 3);
            assert_eq!(
                events[2],
                ConsoleEvent::Mouse(MouseEvent {
                    x: 4,
                    y: 2,
                    flags: MouseFlags::BUTTON1_PRESSED
                })
            );
        }

        s.fake.push_input(mouse(4, 2, ButtonState::empty(), MouseEventFlags::empty()));
        s.main_loop.run_iteration();
        s.clock.advance(Duration::from_millis(101));
        s.main_loop.run_iteration();
        assert_eq!(s.events.lock().len(), 4);
        assert_eq!(s.main_loop.timeouts_len(), 0);
    }

    #[test]
    fn test_new_press_replaces_continuous_press() {
        let s = session_with(ResolvedConfig {
            want_continuous_button_pressed: true,
            ..ResolvedConfig::default()
        });
        s.fake.push_input(mouse(4, 2, LEFT, MouseEventFlags::empty()));
        s.fake.push_input(mouse(4, 2, ButtonState::empty(), MouseEventFlags::empty()));
        s.fake.push_input(mouse(6, 3, RIGHT, MouseEventFlags::empty()));
        s.main_loop.run_iteration();
        assert_eq!(s.events.lock().len(), 3);
        assert_eq!(s.main_loop.timeouts_len(), 1);

        s.clock.advance(Duration::from_millis(101));
        s.main_loop.run_iteration();
        let events = s.events.lock();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[3],
            ConsoleEvent::Mouse(MouseEvent {
                x: 6,
                y: 3,
                flags: MouseFlags::BUTTON3_PRESSED
            })
        );
    }

    #[test]
    fn test_release_cancels_continuous_press() {
        let s = session_with(ResolvedConfig {
            want_continuous_button_pressed: true,
            ..ResolvedConfig::default()
        });
        s.fake.push_input(mouse(4, 2, LEFT, MouseEventFlags::empty()));
        s.main_loop.run_iteration();
        assert_eq!(s.main_loop.timeouts_len(), 1);

        s.fake.push_input(mouse(4, 2, ButtonState::empty(), MouseEventFlags::empty()));
        s.main_loop.run_iteration();
        assert_eq!(s.main_loop.timeouts_len(), 0);
        assert!(s.driver.core.input.lock().continuous_press.is_none());
    }

    #[test]
    fn test_continuous_press_disabled_by_default() {
        let s = session();
        s.fake.push_input(mouse(4, 2, LEFT, MouseEventFlags::empty()));
        s.main_loop.run_iteration();
        assert_eq!(s.main_loop.timeouts_len(), 0);
    }

    #[test]
    fn test_is_rune_supported() {
        let driver = ConsoleDriver::degraded(ResolvedConfig::default());
        assert!(driver.is_rune_supported('a'));
        assert!(driver.is_rune_supported('日'));
        assert!(!driver.is_rune_supported('😀'));
        assert!(!driver.is_rune_supported('\u{7}'));
    }
}

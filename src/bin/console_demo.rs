//! Console Demo
//!
//! Opens the terminal, then echoes every decoded key, mouse, focus and
//! resize event into the screen. Quit with `q`, Escape or Ctrl+C.

use std::collections::VecDeque;
use std::io;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ansi_console::app::DriverConfig;
use ansi_console::core::{Attribute, Color};
use ansi_console::input::KeyCode;
use ansi_console::mainloop::ResizeStrategy;
use ansi_console::{ConsoleDriver, ConsoleEvent};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Events kept on screen
const HISTORY: usize = 200;

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let mut config = DriverConfig::load_or_default();
    let mut show_help = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                i += 1;
                if i < args.len() {
                    match DriverConfig::load(std::path::Path::new(&args[i])) {
                        Ok(loaded) => config = loaded,
                        Err(e) => {
                            eprintln!("Error reading config '{}': {}", args[i], e);
                            return ExitCode::FAILURE;
                        },
                    }
                }
            },
            "--16" => config.force_16_colors = Some(true),
            "--poll-resize" => config.resize = ResizeStrategy::polling(),
            "--continuous" => config.want_continuous_button_pressed = true,
            "-h" | "--help" => show_help = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                show_help = true;
            },
        }
        i += 1;
    }

    if show_help {
        print_help();
        return ExitCode::SUCCESS;
    }

    let driver = ConsoleDriver::new(&config);
    let main_loop = driver.init();
    if driver.is_degraded() {
        drop(main_loop);
        eprintln!("console-demo needs an interactive terminal");
        return ExitCode::FAILURE;
    }

    let quit = Arc::new(AtomicBool::new(false));
    let mut history: VecDeque<String> = VecDeque::with_capacity(HISTORY);
    draw(&driver, &history);

    {
        let handler_driver = driver.clone();
        let quit = Arc::clone(&quit);
        driver.set_event_handler(move |event| {
            if is_quit(&event) {
                quit.store(true, Ordering::SeqCst);
                return;
            }
            if history.len() == HISTORY {
                history.pop_front();
            }
            history.push_back(describe(&event));
            draw(&handler_driver, &history);
        });
    }

    main_loop.add_timeout(Duration::from_millis(50), move |ml| {
        if quit.load(Ordering::SeqCst) {
            ml.stop();
            return false;
        }
        true
    });

    main_loop.run();
    drop(main_loop);
    driver.end();
    ExitCode::SUCCESS
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let file = std::env::var("ANSI_CONSOLE_LOG")
        .ok()
        .and_then(|path| std::fs::File::create(path).ok());

    let (file_layer, stderr_layer) = match file {
        Some(file) => (
            Some(fmt::layer().with_ansi(false).with_writer(std::sync::Mutex::new(file))),
            None,
        ),
        None => (None, Some(fmt::layer().with_writer(io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

fn is_quit(event: &ConsoleEvent) -> bool {
    match event {
        ConsoleEvent::Key(key) if key.is_down => {
            key.code == KeyCode::Q
                || key.code == KeyCode::ESC
                || key.code == (KeyCode::CTRL_MASK | KeyCode::C)
        },
        _ => false,
    }
}

fn describe(event: &ConsoleEvent) -> String {
    match event {
        ConsoleEvent::Key(key) => {
            format!("key {:<4} {}", if key.is_down { "down" } else { "up" }, key.code)
        },
        ConsoleEvent::Mouse(mouse) => {
            format!("mouse ({}, {}) {:?}", mouse.x, mouse.y, mouse.flags)
        },
        ConsoleEvent::Resized(size) => format!("resized to {}x{}", size.cols, size.rows),
        ConsoleEvent::Focus(focused) => format!("focus {}", if *focused { "in" } else { "out" }),
    }
}

fn draw(driver: &ConsoleDriver, history: &VecDeque<String>) {
    let size = driver.size();
    let title = Attribute::new(Color::BLACK, Color::CYAN);
    let body = Attribute::default();

    driver.set_attribute(title);
    driver.fill_rect(0, 0, size.cols, 1, ' ');
    driver.move_cursor(0, 0);
    driver.add_str(" console-demo  q / Esc / Ctrl+C to quit");

    driver.set_attribute(body);
    driver.fill_rect(0, 1, size.cols, size.rows.saturating_sub(1), ' ');
    let visible = size.rows.saturating_sub(1);
    for (row, line) in history.iter().rev().take(visible).rev().enumerate() {
        driver.move_cursor(0, row as i32 + 1);
        driver.add_str(line);
    }

    let last_row = history.len().min(visible) as i32;
    driver.move_cursor(0, last_row + 1);
    driver.refresh();
}

fn print_help() {
    println!("console-demo: echo decoded console events");
    println!();
    println!("Usage: console-demo [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config FILE   Load driver configuration from a JSON file");
    println!("      --16            Restrict output to 16 colors");
    println!("      --poll-resize   Detect window resizes by polling");
    println!("      --continuous    Repeat press events while a button is held");
    println!("  -h, --help          Show this help");
    println!();
    println!("Environment:");
    println!("  RUST_LOG            Log filter (default: warn)");
    println!("  ANSI_CONSOLE_LOG    Write logs to this file instead of stderr");
}

use core::fmt::Arguments;
use std::cell::Cell;
use rppal_wiegand::{error, RppalWiegandLog, RppalWiegandTool};
use termion::color;

struct RppalWiegandLogger {
    color: Cell<bool>,
}

impl RppalWiegandLogger {
    fn new() -> RppalWiegandLogger {
        RppalWiegandLogger {
            color: Cell::new(true),
        }
    }
}

impl RppalWiegandLog for RppalWiegandLogger {
    fn output(self: &Self, args: Arguments) {
        println!("{}", args);
    }
    fn warning(self: &Self, args: Arguments) {
        if self.color.get() {
            eprintln!(
                "{}warning: {}{}",
                color::Fg(color::Yellow),
                args,
                color::Fg(color::Reset)
            );
        } else {
            eprintln!("warning: {}", args);
        }
    }
    fn set_color(self: &Self, enabled: bool) {
        self.color.set(enabled);
    }
    fn error(self: &Self, args: Arguments) {
        if self.color.get() {
            eprintln!(
                "{}error: {}{}",
                color::Fg(color::Red),
                args,
                color::Fg(color::Reset)
            );
        } else {
            eprintln!("error: {}", args);
        }
    }
}

fn main() {
    let logger = RppalWiegandLogger::new();

    if let Err(error) = RppalWiegandTool::new(&logger).run(std::env::args_os()) {
        error!(logger, "{}", error);
        std::process::exit(1);
    }
}

use core::fmt;

use log::Log;
use log::{Level, LevelFilter};
use log::{Metadata, Record};
use spin::Mutex;

/// 控制台输出，由平台在初始化日志时提供
pub type Sink = fn(fmt::Arguments);

static SINK: Mutex<Option<Sink>> = Mutex::new(None);

struct Logger;

impl Log for Logger {
    fn enabled(&self, _: &Metadata) -> bool {
        true // 级别由`log::max_level`过滤
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(sink) = *SINK.lock() else {
            return;
        };

        use Level::*;
        let color = match record.level() {
            Error => 31,
            Warn => 93,
            Info => 34,
            Debug => 32,
            Trace => 90,
        };

        sink(format_args!(
            "\u{1B}[{}m[{:<5}] [storage] {}\u{1B}[0m\n",
            color,
            record.level(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

/// 安装日志；级别取自编译期的`LOG`环境变量，缺省为关闭
pub fn init(sink: Sink) -> Result<(), log::SetLoggerError> {
    static LOGGER: Logger = Logger;
    *SINK.lock() = Some(sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level(option_env!("LOG")));

    Ok(())
}

fn max_level(env: Option<&str>) -> LevelFilter {
    env.and_then(|s| s.parse().ok())
        .unwrap_or(LevelFilter::Off)
}

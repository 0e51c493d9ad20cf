use chrono::{NaiveDate, NaiveTime};

/// A line typed at the console prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Doctor(usize),
    Tests,
    Reschedule(i64),
    Cancel(Option<i64>),
    CancelTests(String),
    Export,
    Size,
    Cleanup(i64),
    Clear,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "\
Type your message and press enter. Other commands:
  /doctor N         book the Nth doctor from the last list
  /tests            book the last recommended tests
  /reschedule ID    move an existing appointment
  /cancel ID        cancel an appointment
  /cancel-tests ID  cancel a test booking
  /export           print the stored session as JSON
  /size             print the stored session size
  /cleanup DAYS     drop records older than DAYS
  /clear            start a fresh session
  /quit             leave";

pub fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Say(line.to_string()));
    }

    let mut parts = line.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    let command = match name {
        "/doctor" => match arg.parse::<usize>() {
            Ok(n) if n > 0 => Command::Doctor(n),
            _ => Command::Unknown(line.to_string()),
        },
        "/tests" => Command::Tests,
        "/reschedule" => match arg.parse() {
            Ok(id) => Command::Reschedule(id),
            Err(_) => Command::Unknown(line.to_string()),
        },
        // Unparseable ids go through so the controller reports them.
        "/cancel" => Command::Cancel(arg.parse().ok()),
        "/cancel-tests" => Command::CancelTests(arg.to_string()),
        "/export" => Command::Export,
        "/size" => Command::Size,
        "/cleanup" => Command::Cleanup(arg.parse().unwrap_or(30)),
        "/clear" => Command::Clear,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

pub fn parse_time(input: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M").ok()
}

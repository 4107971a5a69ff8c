use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};

/// `YYYYMMDDHHMM`, e.g. `202307241038`.
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M";

/// A version label derived from the current local time.
///
/// Two labels generated within the same minute collide.
pub fn gen_version() -> String {
    gen_version_at(&Local::now())
}

pub fn gen_version_at<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format(VERSION_FORMAT).to_string()
}

/// A version label scoped to one table, e.g. `202307241038_person`.
pub fn gen_version_for(name: &str) -> String {
    format!("{}_{name}", gen_version())
}

pub mod browser;
pub mod sink;

pub use browser::{ChromiumPage, ChromiumSession, ChromiumSessionFactory};
pub use sink::{AnySink, HttpSink, StdoutSink};

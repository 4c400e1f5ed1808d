//! Robots.txt handling module
//!
//! The gate is optional (`scheduler.respect-robots`). When enabled the
//! scheduler fetches `/robots.txt` once, refuses disallowed URLs and widens
//! its request spacing to the advertised crawl delay.

mod parser;

pub use parser::RobotsPolicy;

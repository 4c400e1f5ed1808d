//! Robots.txt rules for the harvested origin
//!
//! Allow/deny matching is delegated to the `robotstxt` crate; `Crawl-delay`
//! is not covered by it and is read here by record group.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Robots.txt rules fetched once per run
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// Raw robots.txt body; empty means everything is allowed
    content: String,
}

impl RobotsPolicy {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Policy used when robots.txt is missing or could not be fetched
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Builds the policy from a robots.txt response
    ///
    /// Only a 2xx body is treated as rules; any other status allows everything.
    pub fn from_response(status: u16, body: &str) -> Self {
        if (200..300).contains(&status) {
            Self::from_content(body)
        } else {
            Self::allow_all()
        }
    }

    /// Checks an absolute URL for the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// `Crawl-delay` for the user agent, falling back to the `*` group
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let agent = user_agent.to_lowercase();
        let mut specific = None;
        let mut wildcard = None;

        // Agents named by the group currently being read
        let mut group: Vec<String> = Vec::new();
        let mut in_rules = false;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if in_rules {
                        group.clear();
                        in_rules = false;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    in_rules = true;
                    let Some(delay) = parse_delay(value) else {
                        continue;
                    };
                    if group.iter().any(|name| name != "*" && agent.contains(name.as_str())) {
                        specific.get_or_insert(delay);
                    } else if group.iter().any(|name| name == "*") {
                        wildcard.get_or_insert(delay);
                    }
                }
                _ => in_rules = true,
            }
        }

        specific.or(wildcard)
    }
}

fn parse_delay(value: &str) -> Option<Duration> {
    let seconds: f64 = value.parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

use serde::Deserialize;

/// Main configuration structure for Sumi-Harvest
///
/// Every section is optional in the TOML file; missing sections fall back to
/// defaults that target the original catalog site.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub scheduler: SchedulerConfig,
    pub delays: DelayConfig,
    pub output: OutputConfig,
    pub selectors: SelectorConfig,
    #[serde(rename = "identity")]
    pub identities: Vec<IdentityProfile>,
}

/// Target site layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Origin every relative link is resolved against
    pub base_url: String,

    /// Catalog page path; `{page}` is replaced by the zero-based page index
    pub catalog_path: String,

    /// Category assigned when a detail page lists none
    pub default_category: String,

    /// Image path used when a detail page has no cover
    pub placeholder_image: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.fanmtl.com".to_string(),
            catalog_path: "/list/all/all-newstime-{page}.html".to_string(),
            default_category: "Fantasy".to_string(),
            placeholder_image: "/static/picture/placeholder-158.jpg".to_string(),
        }
    }
}

/// Request scheduler behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Outbound request budget; the minimum spacing is `1 / requests_per_second`
    pub requests_per_second: f64,

    /// Retries after the first attempt before an error is surfaced
    pub max_retries: u32,

    /// First backoff delay (milliseconds)
    pub base_retry_delay_ms: u64,

    /// Wall-clock bound for a single transport call (seconds)
    pub request_timeout_secs: u64,

    /// Capacity of the channel feeding the scheduler task
    pub queue_capacity: usize,

    /// Fetch robots.txt and honour its rules and crawl delay
    pub respect_robots: bool,

    /// Agent token matched against robots.txt groups
    pub robots_user_agent: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            max_retries: 3,
            base_retry_delay_ms: 2000,
            request_timeout_secs: 10,
            queue_capacity: 64,
            respect_robots: false,
            robots_user_agent: "sumi-harvest".to_string(),
        }
    }
}

/// Randomized delay inserted by the stages between successive fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DelayConfig {
    pub min_item_delay_ms: u64,
    pub max_item_delay_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            min_item_delay_ms: 50,
            max_item_delay_ms: 500,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root directory of the checkpoint records
    pub data_dir: String,

    /// Directory for the daily-rotated diagnostic log
    pub log_dir: String,

    /// Path to the SQLite run ledger
    pub ledger_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            log_dir: "./logs".to_string(),
            ledger_path: "./data/ledger.db".to_string(),
        }
    }
}

/// CSS selectors used by the site extractor
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SelectorConfig {
    pub novel_item: String,
    pub novel_link: String,
    pub novel_stats: String,
    pub novel_status: String,
    pub pagination_link: String,
    pub novel_id: String,
    pub title: String,
    pub author: String,
    pub cover: String,
    pub summary: String,
    pub categories: String,
    pub tags: String,
    pub detail_status: String,
    pub chapter_title: String,
    pub chapter_content: String,
    pub chapter_noise: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            novel_item: ".novel-item".to_string(),
            novel_link: "a[href]".to_string(),
            novel_stats: ".novel-stats span".to_string(),
            novel_status: ".novel-stats:last-child .status".to_string(),
            pagination_link: ".pagination li a[href]".to_string(),
            novel_id: "article#novel[data-novelid]".to_string(),
            title: ".novel-title".to_string(),
            author: ".author span:last-child".to_string(),
            cover: ".novel-cover img[data-src]".to_string(),
            summary: ".summary .content".to_string(),
            categories: ".categories ul:first-child li a".to_string(),
            tags: ".tags .content li a".to_string(),
            detail_status: ".header-stats strong".to_string(),
            chapter_title: "h2".to_string(),
            chapter_content: ".chapter-content".to_string(),
            chapter_noise: "script, div[align=\"center\"]".to_string(),
        }
    }
}

/// One client identity the scheduler can present
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IdentityProfile {
    pub user_agent: String,

    #[serde(default = "default_accept")]
    pub accept: String,
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8".to_string()
}

impl IdentityProfile {
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            accept: default_accept(),
        }
    }
}

/// Mobile browser identities used when the config lists none
pub fn default_identities() -> Vec<IdentityProfile> {
    [
        "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
        "Mozilla/5.0 (iPad; CPU OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
        "Mozilla/5.0 (Linux; Android 10; SM-A205U) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/95.0.4638.50 Mobile Safari/537.36",
        "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/95.0.4638.50 Mobile Safari/537.36",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/95.0.4638.50 Mobile/15E148 Safari/604.1",
    ]
    .iter()
    .map(|ua| IdentityProfile::new(ua))
    .collect()
}

impl Config {
    /// Identities to rotate through, falling back to the built-in set
    pub fn identity_profiles(&self) -> Vec<IdentityProfile> {
        if self.identities.is_empty() {
            default_identities()
        } else {
            self.identities.clone()
        }
    }
}

//! Trace configuration with glob-based action filtering

use serde::{Deserialize, Serialize};

/// Which diagnostics a context emits.
///
/// Action names are filtered with glob patterns:
/// - `*` matches any run of characters (including none)
/// - `?` matches exactly one character
/// - anything else matches literally
///
/// With no include patterns every action passes the include stage; exclude
/// patterns are applied afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Master switch. When off, nothing is traced or recorded.
    pub enabled: bool,
    /// If non-empty, only actions matching one of these are traced
    pub include_patterns: Vec<String>,
    /// Actions matching any of these are never traced
    pub exclude_patterns: Vec<String>,
    /// Trace the JSON rendering of each committed snapshot
    pub trace_state: bool,
    /// Entries kept in the in-memory trace log; `0` keeps none
    pub log_capacity: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            trace_state: true,
            log_capacity: 0,
        }
    }
}

impl TraceConfig {
    /// Enabled config from comma-separated pattern lists.
    ///
    /// ```
    /// use condux_core::debug::TraceConfig;
    ///
    /// let config = TraceConfig::new(Some("todo*, reset"), Some("todoTick"));
    /// assert!(config.should_trace("todoAdd"));
    /// assert!(config.should_trace("reset"));
    /// assert!(!config.should_trace("todoTick"));
    /// assert!(!config.should_trace("login"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            enabled: true,
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude.map(split_patterns).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Trace everything, keep no in-memory log.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Trace nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Add an include pattern.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include_patterns.push(pattern.into());
        self
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Toggle state tracing.
    pub fn trace_state(mut self, on: bool) -> Self {
        self.trace_state = on;
        self
    }

    /// Keep the last `capacity` events in memory.
    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Whether an action called `name` is traced.
    pub fn should_trace(&self, name: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let included = self.include_patterns.is_empty()
            || self.include_patterns.iter().any(|p| glob_match(p, name));
        included && !self.exclude_patterns.iter().any(|p| glob_match(p, name))
    }

    /// Whether committed snapshots are traced.
    pub fn should_trace_state(&self) -> bool {
        self.enabled && self.trace_state
    }
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Glob match supporting `*` and `?`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position after the last `*` and the text index it is currently covering
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p + 1, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((after_star, covered)) => {
                    p = after_star;
                    t = covered + 1;
                    backtrack = Some((after_star, covered + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

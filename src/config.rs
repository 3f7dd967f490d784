//! Analyzer configuration
//!
//! Loaded by the command-line front end from a JSON file; every field has a
//! default so partial documents are accepted.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Host-provided globals. They are bound to an unknown value, so calling
    /// them is an opaque call and reading them yields Top.
    pub externals: Vec<String>,

    /// Property names that register a callback when a closure is assigned
    /// to them.
    pub callback_properties: Vec<String>,

    /// Register closures passed to opaque calls as callbacks.
    pub escaping_closures_are_callbacks: bool,

    /// Scheduler round cap.
    pub max_rounds: usize,

    /// Cap on abstract iterations of a single loop.
    pub max_loop_iterations: usize,

    /// Nesting depth of distinct activations; deeper calls abort the
    /// analysis with `AnalysisDivergedError`.
    pub max_call_depth: usize,

    /// Classify every program-declared global, not only captured bindings.
    pub report_globals: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            externals: [
                "console",
                "Math",
                "JSON",
                "Date",
                "window",
                "document",
                "setTimeout",
                "setInterval",
                "random",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            callback_properties: [
                "onevent",
                "onload",
                "onclick",
                "onmessage",
                "onerror",
                "onchange",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            escaping_closures_are_callbacks: true,
            max_rounds: 1000,
            max_loop_iterations: 100_000,
            max_call_depth: 32,
            report_globals: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    /// Add host globals on top of the current list
    pub fn with_externals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.externals.contains(&name) {
                self.externals.push(name);
            }
        }
        self
    }

    pub fn is_external(&self, name: &str) -> bool {
        self.externals.iter().any(|e| e == name)
    }

    pub fn is_callback_property(&self, name: &str) -> bool {
        self.callback_properties.iter().any(|p| p == name)
    }
}

//! Loader environment handed to the capture target

use std::path::Path;

use crate::memory::SegmentId;

/// Dynamic loader search path variable
pub const LIBRARY_PATH_ENV_VAR: &str = "LD_LIBRARY_PATH";

/// Dynamic loader preload list variable
pub const PRELOAD_ENV_VAR: &str = "LD_PRELOAD";

/// Variable the shim reads the channel header id from, in decimal
pub const CHANNEL_ENV_VAR: &str = "FRAMECAST_CHANNEL_SHM";

/// Environment variables injected into the target, in a fixed order
///
/// Passed to the child explicitly; the recorder's own environment is never
/// modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionEnvironment {
    vars: Vec<(String, String)>,
}

impl InjectionEnvironment {
    /// Compose the loader path, preload list and channel id variables
    pub fn new<'a>(
        shim_dir: &Path,
        shim_names: impl IntoIterator<Item = &'a str>,
        channel_id: SegmentId,
    ) -> Self {
        let preload = shim_names.into_iter().collect::<Vec<_>>().join(" ");
        Self {
            vars: vec![
                (
                    LIBRARY_PATH_ENV_VAR.to_string(),
                    shim_dir.to_string_lossy().into_owned(),
                ),
                (PRELOAD_ENV_VAR.to_string(), preload),
                (CHANNEL_ENV_VAR.to_string(), channel_id.to_string()),
            ],
        }
    }

    /// Add or replace a variable
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.vars.push((name, value)),
        }
        self
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Get the variables in order
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Prefix `command` with the variables as shell assignments
    ///
    /// This is the command a user runs by hand when the target is not
    /// started automatically.
    pub fn render_command(&self, command: &str) -> String {
        let mut rendered = String::new();
        for (key, value) in self.vars() {
            rendered.push_str(key);
            rendered.push('=');
            rendered.push_str(&quote(value));
            rendered.push(' ');
        }
        rendered.push_str(command);
        rendered
    }
}

/// Double-quote a value for a POSIX shell unless it is a plain number
fn quote(value: &str) -> String {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

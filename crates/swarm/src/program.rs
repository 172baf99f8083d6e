use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A program invocation that is executed on a worker.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct TaskDefinition {
    pub args: Vec<String>,

    /// Human readable label used in logs.
    #[serde(default)]
    pub name: Option<String>,
}

impl TaskDefinition {
    pub fn new<S: Into<String>>(args: impl IntoIterator<Item = S>) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Renders the arguments as a single command line that can be passed to a remote shell.
    /// Empty arguments are kept, so that positional parameters of scripts are not shifted.
    pub fn command_line(&self) -> String {
        self.args
            .iter()
            .map(|arg| quote_arg(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Display for TaskDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => f.write_str(&self.command_line()),
        }
    }
}

fn quote_arg(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '@' | ',')
        });
    if is_plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

//! Turning raw command text into a subcommand name plus arguments.

use std::{collections::BTreeMap, str::FromStr};

use ocean_common::{ChannelId, UserId};

use crate::error::ArgError;

/// Slash-command trigger the plugin answers to.
pub const TRIGGER: &str = "/do";

/// One command request from a user in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    /// Whitespace-separated tokens after the trigger.
    pub raw_args: Vec<String>,
}

impl CommandInvocation {
    pub fn new(
        user_id: impl Into<UserId>,
        channel_id: impl Into<ChannelId>,
        raw_args: Vec<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            raw_args,
        }
    }

    /// Build from the full command text, e.g. `"/do droplets"`. The trigger
    /// is optional.
    pub fn from_text(
        user_id: impl Into<UserId>,
        channel_id: impl Into<ChannelId>,
        text: &str,
    ) -> Self {
        Self::new(user_id, channel_id, tokenize(text))
    }
}

/// Split on whitespace and drop a leading trigger.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = text.split_whitespace().peekable();
    if tokens.peek().is_some_and(|t| t.eq_ignore_ascii_case(TRIGGER)) {
        tokens.next();
    }
    tokens.map(str::to_string).collect()
}

/// Positional arguments and `--flag` / `--key=value` options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    positional: Vec<String>,
    flags: BTreeMap<String, Option<String>>,
}

impl Args {
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut args = Self::default();
        let mut only_positional = false;
        for token in tokens.iter().map(AsRef::as_ref) {
            if only_positional {
                args.positional.push(token.to_string());
                continue;
            }
            if token == "--" {
                only_positional = true;
                continue;
            }
            match token.strip_prefix("--").filter(|rest| !rest.is_empty()) {
                Some(flag) => {
                    let (name, value) = match flag.split_once('=') {
                        Some((name, value)) => (name, Some(value.to_string())),
                        None => (flag, None),
                    };
                    args.flags.insert(name.to_ascii_lowercase(), value);
                },
                None => args.positional.push(token.to_string()),
            }
        }
        args
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    /// Positional argument `index`, or [`ArgError::Missing`] naming it.
    pub fn require(&self, index: usize, name: &'static str) -> Result<&str, ArgError> {
        self.get(index).ok_or(ArgError::Missing { name })
    }

    /// Positional argument `index` parsed as `T`.
    pub fn require_parsed<T>(&self, index: usize, name: &'static str) -> Result<T, ArgError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.require(index, name)?;
        raw.parse()
            .map_err(|e: T::Err| ArgError::invalid(name, raw, e.to_string()))
    }

    /// Everything from positional `index` on, joined by single spaces.
    pub fn rest_from(&self, index: usize) -> Option<String> {
        (index < self.positional.len()).then(|| self.positional[index..].join(" "))
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).and_then(|v| v.as_deref())
    }
}

/// A subcommand name and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Args,
}

impl ParsedCommand {
    /// `None` when there are no tokens at all.
    pub fn parse(raw_args: &[String]) -> Option<Self> {
        let (name, rest) = raw_args.split_first()?;
        Some(Self {
            name: name.to_ascii_lowercase(),
            args: Args::parse(rest),
        })
    }
}

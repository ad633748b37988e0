//! `ocean run`: a line-oriented host for the plugin.
//!
//! Each stdin line is `<user> <channel> /do <args...>`. Responses and
//! channel notifications go to stdout. Lines starting with `:` are host
//! directives (`:reload`, `:status`).

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    ocean_commands::CommandInvocation,
    ocean_common::{ChannelOutbound, ResponseKind},
    ocean_config::PluginConfig,
    ocean_plugin::Plugin,
    tokio::io::{AsyncBufReadExt, BufReader},
    tracing::{info, warn},
};

/// Prints channel posts as `[channel] text`.
struct StdoutOutbound;

#[async_trait]
impl ChannelOutbound for StdoutOutbound {
    async fn post_text(&self, channel_id: &str, text: &str) -> ocean_common::Result<()> {
        println!("[{channel_id}] {text}");
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Command(CommandInvocation),
    Reload,
    Status,
    Blank,
    Invalid(String),
}

fn parse_line(line: &str) -> Line {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Line::Blank;
    }
    if let Some(directive) = line.strip_prefix(':') {
        return match directive.trim() {
            "reload" => Line::Reload,
            "status" => Line::Status,
            other => Line::Invalid(format!("unknown directive ':{other}'")),
        };
    }
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(user), Some(channel)) => {
            let text = parts.collect::<Vec<_>>().join(" ");
            Line::Command(CommandInvocation::from_text(user, channel, &text))
        },
        _ => Line::Invalid("expected `<user> <channel> /do <args...>`".into()),
    }
}

fn print_response(invocation: &CommandInvocation, kind: ResponseKind, text: &str) {
    match kind {
        ResponseKind::InChannel => println!("[{}] {text}", invocation.channel_id),
        ResponseKind::Ephemeral => println!("@{}: {text}", invocation.user_id),
    }
}

pub async fn run(config: PluginConfig, config_path: Option<PathBuf>) -> Result<()> {
    let plugin = Plugin::activate(config, Arc::new(StdoutOutbound)).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                None
            },
        };
        let Some(line) = line else {
            break;
        };
        match parse_line(&line) {
            Line::Command(invocation) => {
                let response = plugin.handle_command(&invocation).await;
                print_response(&invocation, response.kind, &response.text);
            },
            Line::Reload => match config_path.as_deref() {
                Some(path) => match plugin.reload_config(path) {
                    Ok(warnings) => eprintln!(
                        "reloaded {} ({} warning(s))",
                        path.display(),
                        warnings.len()
                    ),
                    Err(e) => eprintln!("reload failed: {e}"),
                },
                None => eprintln!("no config file to reload"),
            },
            Line::Status => {
                let status = plugin.scheduler_status();
                for job in &status.jobs {
                    eprintln!(
                        "{}: running={} runs={} skipped={} last={:?}",
                        job.name,
                        job.running,
                        job.state.runs,
                        job.state.skipped,
                        job.state.last_status
                    );
                }
            },
            Line::Blank => {},
            Line::Invalid(reason) => warn!(line = %line, "{reason}"),
        }
    }

    plugin.deactivate().await;
    Ok(())
}

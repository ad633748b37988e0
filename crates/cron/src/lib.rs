//! Recurring background jobs.
//!
//! A [`Scheduler`] owns a set of named jobs, each with a [`JobSchedule`]
//! (fixed interval or cron expression) and an action that returns the
//! notifications to post. Notifications go to every channel in the
//! subscription store. A job never overlaps itself, and a failing or
//! panicking job only affects its own tick.

pub mod error;
pub mod parse;
pub mod schedule;
pub mod service;
pub mod types;

pub use {
    error::{Error, Result},
    parse::{parse_duration_ms, parse_schedule},
    schedule::{compute_following_run, compute_next_run},
    service::Scheduler,
    types::{JobActionFn, JobInfo, JobSchedule, JobState, Notification, RunStatus, SchedulerStatus},
};

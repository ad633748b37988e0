//! Chat command surface for the `/do` trigger.
//!
//! [`CommandRouter`] turns a [`CommandInvocation`] into exactly one
//! [`CommandResponse`]. Built-in subcommands (help, token management,
//! subscriptions) run locally; everything else is looked up in the
//! [`HandlerRegistry`] and executed with a client bound to the caller's
//! stored token.

pub mod error;
pub mod handler;
mod handlers;
pub mod invocation;
pub mod router;
pub mod table;

pub use {
    error::ArgError,
    handler::{CommandHandler, FnHandler, HandlerRegistry},
    invocation::{Args, CommandInvocation, ParsedCommand, TRIGGER, tokenize},
    router::{AUTH_FAILED_MESSAGE, CommandResponse, CommandRouter, MISSING_TOKEN_MESSAGE},
    table::Table,
};

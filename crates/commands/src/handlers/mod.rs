//! Cloud-backed subcommands. Each is a thin call into [`ocean_cloud::CloudClient`]
//! plus formatting.

mod account;
mod databases;
mod domains;
mod droplets;
mod keys;

use crate::handler::{FnHandler, HandlerRegistry};

pub(crate) fn register_all(registry: &mut HandlerRegistry) {
    let handlers = [
        FnHandler::new(
            "account",
            "account",
            "Show the account the token belongs to",
            account::show,
        ),
        FnHandler::new("droplets", "droplets", "List droplets", droplets::list),
        FnHandler::new(
            "create-droplet",
            "create-droplet <name> <region> <size> <image>",
            "Create a droplet",
            droplets::create,
        ),
        FnHandler::new(
            "delete-droplet",
            "delete-droplet <id>",
            "Delete a droplet",
            droplets::delete,
        ),
        FnHandler::new(
            "databases",
            "databases",
            "List database clusters",
            databases::list_clusters,
        ),
        FnHandler::new(
            "db-backups",
            "db-backups <cluster id>",
            "List backups of a database cluster",
            databases::list_backups,
        ),
        FnHandler::new(
            "db-users",
            "db-users <cluster id>",
            "List users of a database cluster",
            databases::list_users,
        ),
        FnHandler::new(
            "db-add-user",
            "db-add-user <cluster id> <name>",
            "Add a user to a database cluster",
            databases::add_user,
        ),
        FnHandler::new(
            "db-delete-user",
            "db-delete-user <cluster id> <name>",
            "Remove a user from a database cluster",
            databases::delete_user,
        ),
        FnHandler::new(
            "db-list",
            "db-list <cluster id>",
            "List databases in a cluster",
            databases::list_databases,
        ),
        FnHandler::new("domains", "domains", "List domains", domains::list),
        FnHandler::new(
            "create-domain",
            "create-domain <name> [ip address]",
            "Create a domain",
            domains::create,
        ),
        FnHandler::new(
            "delete-domain",
            "delete-domain <name>",
            "Delete a domain",
            domains::delete,
        ),
        FnHandler::new("keys", "keys", "List SSH keys", keys::list),
        FnHandler::new("get-key", "get-key <id>", "Show one SSH key", keys::get),
        FnHandler::new(
            "create-key",
            "create-key <name> <public key>",
            "Upload an SSH public key",
            keys::create,
        ),
        FnHandler::new(
            "delete-key",
            "delete-key <id>",
            "Delete an SSH key",
            keys::delete,
        ),
    ];
    for handler in handlers {
        registry.register(Box::new(handler));
    }
}

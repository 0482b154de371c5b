//! Command-line client for the warden directory service.
//!
//! Success output goes to stdout, errors to stderr; the exit code is
//! nonzero on any RPC or validation failure. Mutating subcommands
//! authenticate with the global `--entity`/`--secret` pair and cache the
//! resulting token on disk.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use warden_client::{FsTokenStore, WardenClient};
use warden_proto::EntityMeta;

#[derive(Parser, Debug)]
#[command(name = "warden-ctl")]
#[command(version, about = "Manage entities and groups on a warden server")]
struct Cli {
    /// Server hostname
    #[arg(long, env = "WARDEN_SERVER", default_value = "localhost", global = true)]
    server: String,

    /// Server port
    #[arg(long, env = "WARDEN_PORT", default_value = "1729", global = true)]
    port: u16,

    /// Service name reported to the server
    #[arg(long = "service-id", default_value = "", global = true)]
    service_id: String,

    /// Client name reported to the server
    #[arg(long = "client-id", default_value = "warden-ctl", global = true)]
    client_id: String,

    /// Entity to authenticate as
    #[arg(long, env = "WARDEN_ENTITY", global = true)]
    entity: Option<String>,

    /// Secret for the authenticating entity
    #[arg(long, env = "WARDEN_SECRET", global = true)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ping the server and print the reply
    Ping,

    /// Verify the requesting entity's credentials
    Auth,

    /// Create a new entity
    CreateEntity {
        /// ID of the entity to create
        #[arg(long = "ID")]
        id: String,
        /// Initial secret; empty creates an account that cannot log in
        #[arg(long = "initial-secret", default_value = "")]
        initial_secret: String,
        /// Explicit number; negative auto-assigns
        #[arg(long, default_value = "-1")]
        number: i32,
    },

    /// Destroy an entity
    DestroyEntity {
        /// ID of the entity to destroy
        #[arg(long = "ID")]
        id: String,
    },

    /// Lock an entity against authentication
    LockEntity {
        /// ID of the entity to lock
        #[arg(long = "ID")]
        id: String,
    },

    /// Unlock an entity
    UnlockEntity {
        /// ID of the entity to unlock
        #[arg(long = "ID")]
        id: String,
    },

    /// Update an entity's descriptive metadata
    UpdateEntityMeta {
        /// ID of the entity to update
        #[arg(long = "ID")]
        id: String,
        /// Display name
        #[arg(long)]
        display_name: Option<String>,
        /// Legal name
        #[arg(long)]
        legal_name: Option<String>,
        /// Login shell
        #[arg(long)]
        shell: Option<String>,
        /// Home directory
        #[arg(long)]
        home: Option<String>,
        /// Location
        #[arg(long)]
        location: Option<String>,
    },

    /// Search entities by substring
    SearchEntities {
        /// Expression matched against IDs and names
        expression: String,
    },

    /// Search groups by substring
    SearchGroups {
        /// Expression matched against names and display names
        expression: String,
    },

    /// Create a new group
    CreateGroup {
        /// Name of the group to create
        #[arg(long)]
        group: String,
        /// Display name
        #[arg(long, default_value = "")]
        display_name: String,
        /// Group whose members may manage this one
        #[arg(long, default_value = "")]
        managed_by: String,
        /// Explicit number; negative auto-assigns
        #[arg(long, default_value = "-1")]
        number: i32,
    },

    /// Destroy a group
    DestroyGroup {
        /// Name of the group to destroy
        #[arg(long)]
        group: String,
    },

    /// Add an existing entity to an existing group
    AddEntityToGroup {
        /// ID of the entity to add to the group
        #[arg(long = "ID")]
        id: String,
        /// Name of the group to add to
        #[arg(long)]
        group: String,
    },

    /// Remove an entity from a group
    RemoveEntityFromGroup {
        /// ID of the entity to remove from the group
        #[arg(long = "ID")]
        id: String,
        /// Name of the group to remove from
        #[arg(long)]
        group: String,
    },

    /// List a group's effective members
    ListGroupMembers {
        /// Name of the group to list
        #[arg(long)]
        group: String,
    },

    /// Apply an expansion rule to a group
    UpdateGroupExpansion {
        /// Name of the group to modify
        #[arg(long)]
        group: String,
        /// Rule in OP:target form (INCLUDE, EXCLUDE, or DROP)
        #[arg(long)]
        rule: String,
    },
}

/// Obtain a token with the global credential flags.
async fn requestor_token(cli: &Cli, client: &mut WardenClient) -> Result<String> {
    let entity = cli
        .entity
        .as_deref()
        .ok_or_else(|| anyhow!("--entity is required for this operation"))?;
    let secret = cli
        .secret
        .as_deref()
        .ok_or_else(|| anyhow!("--secret is required for this operation"))?;
    Ok(client.get_token(entity, secret).await?)
}

async fn run(cli: Cli) -> Result<()> {
    let mut client = WardenClient::connect(&cli.server, cli.port, &cli.service_id, &cli.client_id)
        .await?
        .with_token_store(Box::new(FsTokenStore::new()?));

    match &cli.command {
        Command::Ping => {
            let msg = client.ping().await?;
            println!("{msg}");
        }

        Command::Auth => {
            let entity = cli
                .entity
                .as_deref()
                .ok_or_else(|| anyhow!("--entity is required"))?;
            let secret = cli
                .secret
                .as_deref()
                .ok_or_else(|| anyhow!("--secret is required"))?;
            let msg = client.auth_entity(entity, secret).await?;
            println!("{msg}");
        }

        Command::CreateEntity { id, initial_secret, number } => {
            let token = requestor_token(&cli, &mut client).await?;
            let msg = client.entity_create(&token, id, initial_secret, *number).await?;
            println!("{msg}");
        }

        Command::DestroyEntity { id } => {
            let token = requestor_token(&cli, &mut client).await?;
            let msg = client.entity_destroy(&token, id).await?;
            println!("{msg}");
        }

        Command::LockEntity { id } => {
            let token = requestor_token(&cli, &mut client).await?;
            let msg = client.entity_lock(&token, id).await?;
            println!("{msg}");
        }

        Command::UnlockEntity { id } => {
            let token = requestor_token(&cli, &mut client).await?;
            let msg = client.entity_unlock(&token, id).await?;
            println!("{msg}");
        }

        Command::UpdateEntityMeta {
            id,
            display_name,
            legal_name,
            shell,
            home,
            location,
        } => {
            let token = requestor_token(&cli, &mut client).await?;
            let meta = EntityMeta {
                display_name: display_name.clone(),
                legal_name: legal_name.clone(),
                shell: shell.clone(),
                home: home.clone(),
                location: location.clone(),
                groups: Vec::new(),
            };
            let msg = client.entity_update(&token, id, meta).await?;
            println!("{msg}");
        }

        Command::SearchEntities { expression } => {
            for entity in client.entity_search(expression).await? {
                let name = entity.meta.display_name.unwrap_or_default();
                println!("{}\t{}\t{}", entity.number, entity.id, name);
            }
        }

        Command::SearchGroups { expression } => {
            for group in client.group_search(expression).await? {
                let name = group.display_name.unwrap_or_default();
                println!("{}\t{}\t{}", group.number, group.name, name);
            }
        }

        Command::CreateGroup {
            group,
            display_name,
            managed_by,
            number,
        } => {
            let token = requestor_token(&cli, &mut client).await?;
            let msg = client
                .group_create(&token, group, display_name, managed_by, *number)
                .await?;
            println!("{msg}");
        }

        Command::DestroyGroup { group } => {
            let token = requestor_token(&cli, &mut client).await?;
            let msg = client.group_destroy(&token, group).await?;
            println!("{msg}");
        }

        Command::AddEntityToGroup { id, group } => {
            let token = requestor_token(&cli, &mut client).await?;
            let msg = client.group_add_member(&token, group, id).await?;
            println!("{msg}");
        }

        Command::RemoveEntityFromGroup { id, group } => {
            let token = requestor_token(&cli, &mut client).await?;
            let msg = client.group_del_member(&token, group, id).await?;
            println!("{msg}");
        }

        Command::ListGroupMembers { group } => {
            for entity in client.group_list_members(group).await? {
                println!("{}\t{}", entity.number, entity.id);
            }
        }

        Command::UpdateGroupExpansion { group, rule } => {
            let token = requestor_token(&cli, &mut client).await?;
            let msg = client.group_update_expansion(&token, group, rule).await?;
            println!("{msg}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

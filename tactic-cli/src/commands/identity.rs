use crate::app::{password, App};
use anyhow::{bail, Result};
use bitcoin::Network;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::{Confirm, Password};

#[derive(Subcommand)]
pub enum IdentityCommands {
    /// Create a new signing identity
    New {
        /// Identity name
        name: String,
        /// Bitcoin network the keys are derived for (regtest, signet, testnet, bitcoin)
        #[arg(short, long, default_value = "regtest")]
        network: String,
    },
    /// Import an identity from a mnemonic
    Import {
        /// Identity name
        name: String,
        #[arg(short, long, default_value = "regtest")]
        network: String,
        /// Mnemonic phrase (will prompt if not provided)
        #[arg(short, long)]
        mnemonic: Option<String>,
    },
    /// List local identities
    List,
    /// Show one identity
    Show {
        /// Identity name
        name: String,
    },
    /// Delete an identity
    Delete {
        /// Identity name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_identity_command(cmd: IdentityCommands, app: &App) -> Result<()> {
    match cmd {
        IdentityCommands::New { name, network } => {
            let network = parse_network(&network)?;
            let password = password("Choose a password", true)?;

            let (signer, mnemonic) = app.keystore.create_identity(&name, &password, network)?;

            println!("Identity '{}' created.", name);
            println!();
            println!("IMPORTANT: Save your mnemonic phrase securely!");
            println!("Mnemonic: {}", mnemonic);
            println!();
            println!("Address: {}", signer.address());
        }

        IdentityCommands::Import {
            name,
            network,
            mnemonic,
        } => {
            let network = parse_network(&network)?;
            let mnemonic = match mnemonic {
                Some(m) => m,
                None => Password::new()
                    .with_prompt("Enter mnemonic phrase")
                    .interact()?,
            };
            let password = password("Choose a password", true)?;

            let signer = app
                .keystore
                .import_identity(&name, &mnemonic, &password, network)?;

            println!("Identity '{}' imported.", name);
            println!("Address: {}", signer.address());
        }

        IdentityCommands::List => {
            let identities = app.keystore.list_identities()?;

            if identities.is_empty() {
                println!("No identities found.");
                println!("Create one with: tactic identity new <name>");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Address", "Network", "Created"]);

            for identity in identities {
                table.add_row(vec![
                    identity.name.clone(),
                    identity.address.to_string(),
                    identity.network.to_string(),
                    identity.created_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }

            println!("{}", table);
        }

        IdentityCommands::Show { name } => {
            let identity = app.keystore.identity(&name)?;

            println!("Identity Information:");
            println!("  Name: {}", identity.name);
            println!("  Address: {}", identity.address);
            println!("  Network: {}", identity.network);
            println!("  Created: {}", identity.created_at.format("%Y-%m-%d %H:%M:%S"));
        }

        IdentityCommands::Delete { name, force } => {
            if !force {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Delete identity '{}'? Its keys cannot be recovered without the mnemonic",
                        name
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            app.keystore.delete_identity(&name)?;
            println!("Identity '{}' deleted.", name);
        }
    }

    Ok(())
}

fn parse_network(network: &str) -> Result<Network> {
    match network.to_lowercase().as_str() {
        "regtest" => Ok(Network::Regtest),
        "signet" => Ok(Network::Signet),
        "testnet" => Ok(Network::Testnet),
        "bitcoin" | "mainnet" => Ok(Network::Bitcoin),
        other => bail!("Unknown network '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_network() {
        assert_eq!(parse_network("Regtest").unwrap(), Network::Regtest);
        assert_eq!(parse_network("mainnet").unwrap(), Network::Bitcoin);
        assert!(parse_network("mutinynet").is_err());
    }
}

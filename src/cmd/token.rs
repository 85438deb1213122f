use std::time::Duration;

use anyhow::Result;
use clap::Subcommand;

use crate::config::ConfigArgs;
use crate::display::{self, DisplayStyle};
use crate::now::current_timestamp;

use super::open_authorizer;

#[derive(Subcommand)]
pub enum TokenCommand {
    /// Issue a token for one or more groups and print it.
    Create {
        /// Group granted by the token, repeat for several groups.
        #[arg(short, long = "group", required = true)]
        groups: Vec<String>,

        /// Token lifetime, e.g. `30m`, `12h`, `7days`. Default: `auth.default_ttl_secs`.
        #[arg(short, long, value_parser = humantime::parse_duration)]
        ttl: Option<Duration>,

        /// Audience of the token. Default: the audience of this service.
        #[arg(short, long)]
        audience: Option<String>,

        #[arg(short, long)]
        note: Option<String>,

        /// Print token and claims as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List token records, newest first.
    List {
        #[arg(short, long, default_value = "table")]
        output: DisplayStyle,
    },

    /// Revoke a token by id.
    Revoke { id: String },

    /// Print the bootstrap public and admin tokens, issuing them if needed.
    Bootstrap,
}

impl TokenCommand {
    pub fn run(&self, config: &ConfigArgs) -> Result<()> {
        let auth = open_authorizer(config)?;
        let tokens = &auth.tokens;

        match self {
            Self::Create {
                groups,
                ttl,
                audience,
                note,
                json,
            } => {
                let ttl = ttl.unwrap_or(tokens.default_ttl());
                let issued = tokens.create_token_at(
                    groups,
                    ttl,
                    audience.as_deref(),
                    note.clone(),
                    current_timestamp(),
                )?;
                if *json {
                    return display::pretty_json(issued);
                }
                eprintln!(
                    "Token '{}' expires at {}",
                    issued.info.id,
                    display::format_time(issued.info.expires_at)
                );
                println!("{}", issued.token);
            }
            Self::List { output } => {
                let records = tokens.list_tokens()?;
                display::display_list(&records, *output)?;
            }
            Self::Revoke { id } => {
                tokens.revoke_token(id)?;
                eprintln!("Token '{id}' revoked");
            }
            Self::Bootstrap => {
                println!("public: {}", auth.bootstrap.public);
                println!("admin:  {}", auth.bootstrap.admin);
            }
        }
        Ok(())
    }
}

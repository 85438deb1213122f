use anyhow::Result;
use clap::Subcommand;

use crate::config::ConfigArgs;
use crate::display::{self, DisplayStyle};

use super::open_authorizer;

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Create a group.
    Create {
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// List all groups.
    List {
        #[arg(short, long, default_value = "table")]
        output: DisplayStyle,
    },

    /// Show one group.
    Get {
        name: String,

        #[arg(short, long, default_value = "table")]
        output: DisplayStyle,
    },

    /// Delete a group no live token refers to.
    Delete { name: String },
}

impl GroupCommand {
    pub fn run(&self, config: &ConfigArgs) -> Result<()> {
        let auth = open_authorizer(config)?;
        let registry = &auth.registry;

        match self {
            Self::Create { name, description } => {
                let group = registry.create_group(name, description.clone())?;
                eprintln!("Group '{}' created", group.name);
            }
            Self::List { output } => {
                let groups = registry.list_groups()?;
                display::display_list(&groups, *output)?;
            }
            Self::Get { name, output } => {
                let group = registry.get_group(name)?;
                display::display_list(&[group], *output)?;
            }
            Self::Delete { name } => {
                registry.delete_group(name)?;
                eprintln!("Group '{name}' deleted");
            }
        }
        Ok(())
    }
}

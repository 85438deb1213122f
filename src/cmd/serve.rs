use anyhow::Result;
use clap::Args;

use crate::config::ConfigArgs;
use crate::display;
use crate::server::config::ServerConfig;
use crate::server::RestfulServer;

/// Run the authorizing REST service.
#[derive(Args)]
pub struct ServeArgs {
    /// Print server configuration (JSON) and exit.
    #[arg(long)]
    pub print_config: bool,
}

impl ServeArgs {
    pub async fn run(&self, config: &ConfigArgs) -> Result<()> {
        let cfg: ServerConfig = config.load("server")?;
        if self.print_config {
            return display::pretty_json(cfg);
        }

        cfg.logs.init("server")?;
        let srv = RestfulServer::build(&cfg)?;
        srv.run().await
    }
}

use anyhow::Result;
use clap::Args;

use crate::config::ConfigArgs;
use crate::display;
use crate::proxy::config::ProxyConfig;
use crate::proxy::ProxyServer;

/// Run the pass-through proxy in front of the authorizing service.
#[derive(Args)]
pub struct ProxyArgs {
    /// Print proxy configuration (JSON) and exit.
    #[arg(long)]
    pub print_config: bool,
}

impl ProxyArgs {
    pub async fn run(&self, config: &ConfigArgs) -> Result<()> {
        let cfg: ProxyConfig = config.load("proxy")?;
        if self.print_config {
            return display::pretty_json(cfg);
        }

        cfg.logs.init("proxy")?;
        let srv = ProxyServer::build(&cfg)?;
        srv.run().await
    }
}

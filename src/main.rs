use std::process;

use clap::Parser;
use groupgate::cmd::App;
use log::error;

#[tokio::main]
async fn main() {
    let app = App::parse();
    if let Err(e) = app.run().await {
        error!("Error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

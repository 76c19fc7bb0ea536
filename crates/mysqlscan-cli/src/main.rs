//! mysqlscan - list the MySQL servers running on this host.

use anyhow::Result;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    mysqlscan_cli::run().await
}

use clap::Parser;

/// Command-line configuration for a single broker instance.
#[derive(Debug, Parser)]
#[command(name = "meshbus", about = "Distributed publish-subscribe broker")]
pub struct Config {
    /// Host identity this broker advertises to peers.
    #[arg(long)]
    pub host: String,

    /// TCP port this broker listens on and advertises to peers.
    #[arg(long)]
    pub port: u16,

    /// Path to the CSV peer manifest (`ip,port` rows, header skipped).
    #[arg(long, default_value = "peers.csv")]
    pub peers: String,

    /// Path to the SQLite file backing the durable topic store.
    #[arg(long)]
    pub db: Option<String>,
}

impl Config {
    pub fn db_path(&self) -> String {
        self.db
            .clone()
            .unwrap_or_else(|| format!("{}_{}.db", self.host, self.port))
    }
}

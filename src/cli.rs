use std::path::PathBuf;

use clap::Parser as ClapParser;

use crate::app::ServeOptions;

#[derive(ClapParser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Sets the port for the server to use (default 3000)
    #[arg(short, long, value_name = "PORT", env = "SOUNDWAVE_PORT")]
    pub port: Option<u16>,

    /// Sets the app directory to serve (default www/)
    #[arg(short, long, value_name = "DIRECTORY", env = "SOUNDWAVE_ROOT")]
    pub root: Option<PathBuf>,
}

impl From<Cli> for ServeOptions {
    fn from(cli: Cli) -> Self {
        ServeOptions {
            port: cli.port,
            root: cli.root,
        }
    }
}

use anyhow::{Context, Result};
use env_logger::Env;
use log::info;
use std::io;

use rdsh::client::Client;
use rdsh::config::{self, Mode};
use rdsh::server::Server;
use rdsh::{local, PROMPT};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let Some(cfg) = config::parse_args(std::env::args().skip(1))? else {
        println!("{}", config::USAGE);
        return Ok(());
    };
    let prompt = atty::is(atty::Stream::Stdin).then_some(PROMPT);

    match cfg.mode {
        Mode::Local => {
            let code = local::run(io::stdin().lock(), &mut io::stdout(), prompt)?;
            info!("local shell finished, last status {}", code);
        }
        Mode::Server => {
            let server = Server::bind((cfg.address(), cfg.port))
                .with_context(|| format!("cannot listen on {}:{}", cfg.address(), cfg.port))?;
            info!("listening on {}", server.local_addr()?);
            server.run()?;
        }
        Mode::Client => {
            let mut client = Client::connect((cfg.address(), cfg.port))
                .with_context(|| format!("cannot connect to {}:{}", cfg.address(), cfg.port))?;
            client.run(io::stdin().lock(), &mut io::stdout(), prompt)?;
        }
    }
    Ok(())
}

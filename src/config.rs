use std::env;

use anyhow::{anyhow, bail, Result};

use crate::protocol::{DEFAULT_CLIENT_ADDR, DEFAULT_PORT, DEFAULT_SERVER_IFACE};

pub const USAGE: &str = "usage: rdsh [-c | -s] [-i ADDR] [-p PORT] [-h]
    -c        connect to a server as a client
    -s        run as a server
    -i ADDR   server interface (-s) or server address (-c)
    -p PORT   port, default $RDSH_PORT or 1234
    -h        show this help
  with neither -c nor -s the shell runs locally";

/// Environment override for the default port.
pub const PORT_ENV: &str = "RDSH_PORT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode { Local, Client, Server }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub addr: Option<String>,
    pub port: u16,
}

impl Config {
    /// Address to bind (server) or connect to (client).
    pub fn address(&self) -> &str {
        match (&self.addr, self.mode) {
            (Some(a), _) => a,
            (None, Mode::Server) => DEFAULT_SERVER_IFACE,
            (None, _) => DEFAULT_CLIENT_ADDR,
        }
    }
}

fn parse_port(v: &str) -> Result<u16> {
    v.parse().map_err(|_| anyhow!("invalid port: {}", v))
}

/// Parse the arguments after the program name. `Ok(None)` means help was
/// requested.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Option<Config>> {
    let mut args = args.into_iter();
    let mut mode = Mode::Local;
    let mut addr: Option<String> = None;
    let mut port: Option<u16> = None;
    while let Some(a) = args.next() {
        match a.as_str() {
            "-c" | "-s" => {
                let m = if a == "-c" { Mode::Client } else { Mode::Server };
                if mode != Mode::Local && mode != m { bail!("-c and -s cannot be combined"); }
                mode = m;
            }
            "-i" => { addr = Some(args.next().ok_or_else(|| anyhow!("missing value after -i"))?); }
            "-p" => { let v = args.next().ok_or_else(|| anyhow!("missing value after -p"))?; port = Some(parse_port(&v)?); }
            "-h" | "--help" => return Ok(None),
            other => bail!("unknown arg: {}", other),
        }
    }
    if mode == Mode::Local && (addr.is_some() || port.is_some()) {
        bail!("-i/-p only apply with -c or -s");
    }
    let port = match port {
        Some(p) => p,
        None => match env::var(PORT_ENV) {
            Ok(v) => parse_port(&v)?,
            Err(_) => DEFAULT_PORT,
        },
    };
    Ok(Some(Config { mode, addr, port }))
}

use std::{
    env,
    io::{self, Read, Write},
    net::{TcpListener, TcpStream},
    path::PathBuf,
    time::Duration,
};

use anyhow::Context;
use hangar_app::HangarApp;
use hangar_core::UserId;
use hangar_esi::{AggregatorConfig, EsiConfig, config::DEFAULT_ESI_BASE_URL};
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("hangar/", env!("CARGO_PKG_VERSION"));

/// Who the command runs for and where their data lives.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) user_id: UserId,
    pub(crate) db: PathBuf,
}

impl Session {
    pub(crate) async fn open_app(&self) -> anyhow::Result<HangarApp> {
        let esi = load_esi_config()?;
        let aggregator = load_aggregator_config()?;
        log::debug!("opening {} with {:?}", self.db.display(), esi);

        HangarApp::connect(&self.db, &esi, aggregator)
            .await
            .with_context(|| format!("failed to open hangar database {}", self.db.display()))
    }
}

pub(crate) fn load_esi_config() -> anyhow::Result<EsiConfig> {
    Ok(EsiConfig {
        client_id: required_env("CCP_CLIENT_ID")?,
        client_secret: required_env("CCP_SECRET_KEY")?,
        callback_url: required_env("CCP_REDIRECT_URI")?,
        user_agent: env::var("HANGAR_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.into()),
        esi_base_url: env::var("HANGAR_ESI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_ESI_BASE_URL.into()),
    })
}

pub(crate) fn load_aggregator_config() -> anyhow::Result<AggregatorConfig> {
    let mut config = AggregatorConfig::default();
    if let Ok(raw) = env::var("HANGAR_FETCH_TIMEOUT_SECS") {
        let secs = raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("HANGAR_FETCH_TIMEOUT_SECS is not a number of seconds: {raw}"))?;
        config.fetch_timeout = Duration::from_secs(secs);
    }
    Ok(config)
}

/// Query parameters the SSO redirect carried back to us.
#[derive(Debug)]
pub(crate) struct Callback {
    pub(crate) code: String,
    pub(crate) state: String,
}

/// Serves exactly one request on the callback address and returns its
/// `code` and `state`.
pub(crate) fn wait_for_callback(callback_url: &str) -> anyhow::Result<Callback> {
    let parsed = Url::parse(callback_url).context("invalid callback URL")?;
    if parsed.scheme() != "http" {
        anyhow::bail!("callback URL must use http for local callback server");
    }

    let host = parsed
        .host_str()
        .context("callback URL must include host")?;
    let port = parsed
        .port_or_known_default()
        .context("callback URL must include a valid port")?;

    let bind_addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&bind_addr)
        .with_context(|| format!("failed to bind callback listener on {bind_addr}"))?;

    let (mut stream, peer) = listener.accept().context("failed to accept callback")?;
    log::debug!("callback connection from {peer}");
    let request = read_http_request(&mut stream).context("failed to read callback request")?;
    let target = request
        .lines()
        .next()
        .and_then(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("GET"), Some(target)) => Some(target.to_owned()),
                _ => None,
            }
        });
    let Some(target) = target else {
        write_http_response(&mut stream, 405, "Method Not Allowed", "Only GET is supported.")?;
        anyhow::bail!("callback request must be GET");
    };

    let target_url = parsed
        .join(&target)
        .context("invalid callback request target")?;
    if target_url.path() != parsed.path() {
        write_http_response(&mut stream, 404, "Not Found", "Unexpected callback path.")?;
        anyhow::bail!("callback path does not match {callback_url}");
    }

    match parse_callback(&target_url) {
        Ok(callback) => {
            write_http_response(
                &mut stream,
                200,
                "OK",
                "Authorization received. You can close this tab.",
            )?;
            Ok(callback)
        }
        Err(error) => {
            write_http_response(&mut stream, 400, "Bad Request", &error.to_string())?;
            Err(error)
        }
    }
}

fn parse_callback(url: &Url) -> anyhow::Result<Callback> {
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.trim().to_owned()),
            "state" => state = Some(value.trim().to_owned()),
            "error" => anyhow::bail!("authorization was declined: {value}"),
            _ => {}
        }
    }

    match (code, state) {
        (Some(code), Some(state)) => Ok(Callback { code, state }),
        _ => anyhow::bail!("callback query is missing code and/or state"),
    }
}

fn required_env(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("missing required env var `{name}`"))
}

fn read_http_request(stream: &mut TcpStream) -> Result<String, io::Error> {
    let mut buffer = [0_u8; 8192];
    let size = stream.read(&mut buffer)?;
    String::from_utf8(buffer[..size].to_vec())
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error.to_string()))
}

fn write_http_response(
    stream: &mut TcpStream,
    code: u16,
    reason: &str,
    body: &str,
) -> anyhow::Result<()> {
    let response = format!(
        "HTTP/1.1 {code} {reason}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );
    stream
        .write_all(response.as_bytes())
        .and_then(|()| stream.flush())
        .context("failed writing callback response")
}

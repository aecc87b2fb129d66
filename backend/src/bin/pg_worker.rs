//! Privilege-dropping helper for the embedded PostgreSQL used by the
//! integration tests.
//!
//! When tests run as root, `pg_embedded_setup_unpriv` re-executes cluster
//! lifecycle steps through this binary as `pg-worker <setup|start|stop>
//! <payload.json>`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

use color_eyre::eyre::{Context, Report, Result, bail, eyre};
use pg_embedded_setup_unpriv::worker::WorkerPayload;
use postgresql_embedded::PostgreSQL;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Setup,
    Start,
    Stop,
}

impl FromStr for Lifecycle {
    type Err = Report;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "setup" => Ok(Self::Setup),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(eyre!(
                "unknown lifecycle step '{other}'; expected setup, start or stop"
            )),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    step: Lifecycle,
    payload: PathBuf,
}

impl Invocation {
    fn from_args(args: impl IntoIterator<Item = OsString>) -> Result<Self> {
        let mut args = args.into_iter().skip(1);
        let step = args
            .next()
            .ok_or_else(|| eyre!("missing lifecycle step"))?
            .to_string_lossy()
            .parse()?;
        let payload = args
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| eyre!("missing payload path"))?;
        if let Some(extra) = args.next() {
            bail!("unexpected argument: {}", extra.to_string_lossy());
        }
        Ok(Self { step, payload })
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let invocation = Invocation::from_args(std::env::args_os())?;
    let raw = std::fs::read(&invocation.payload)
        .with_context(|| format!("reading payload {}", invocation.payload.display()))?;
    let payload: WorkerPayload =
        serde_json::from_slice(&raw).wrap_err("payload is not a worker payload")?;
    let settings = payload
        .settings
        .into_settings()
        .map_err(|err| Report::new(err).wrap_err("rebuilding PostgreSQL settings"))?;

    for (key, value) in payload.environment {
        // SAFETY: single-threaded at this point; no runtime has started yet.
        match value {
            Some(value) => unsafe { std::env::set_var(&key, value.expose()) },
            None => unsafe { std::env::remove_var(&key) },
        }
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("building worker runtime")?;
    let mut postgres = PostgreSQL::new(settings);
    let step = invocation.step;
    runtime
        .block_on(async move {
            match step {
                Lifecycle::Setup => postgres.setup().await,
                Lifecycle::Start => postgres.start().await,
                Lifecycle::Stop => postgres.stop().await,
            }
        })
        .with_context(|| format!("PostgreSQL {step:?} failed"))
}

mod cli;
mod config;
mod error;
mod report;
mod sip;

use anyhow::{bail, Context, Result};
use chrono::Local;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::ProbeConfig;
use sip::SipClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = cli::parse_args();
    if args.help {
        cli::print_help();
        return Ok(());
    }

    let config = ProbeConfig::from_env().context("failed to load configuration")?;
    config.validate()?;
    if args.validate {
        println!("Configuration OK");
        return Ok(());
    }

    let run_register = !args.call_only;
    let run_call = !args.register_only;

    let started = Local::now();
    let mut report_text = report::render_header(&config, started);
    print!("{}", report_text);

    let client = SipClient::new(&config).await?;
    info!("probe bound to {}", client.local_addr());

    let mut next_cseq = 1;
    let mut failed = false;

    if run_register {
        let outcome = client.register().await.context("REGISTER probe failed")?;
        next_cseq = outcome.last_cseq + 1;
        let section = report::render_register_report(&outcome);
        print!("{}", section);
        report_text.push_str(&section);
        if !outcome.succeeded() {
            warn!("registration did not succeed; skipping call probe");
            failed = true;
        }
    }

    if run_call && !failed {
        let callee_uri = match config.callee_uri() {
            Some(uri) => uri,
            None => {
                if args.call_only {
                    bail!("SIP_CALLEE must be set for the call probe");
                }
                info!("SIP_CALLEE not set; skipping call probe");
                String::new()
            }
        };
        if !callee_uri.is_empty() {
            if args.call_only {
                // the call probe registers the caller first
                let registration = client
                    .register()
                    .await
                    .context("pre-call REGISTER failed")?;
                if !registration.succeeded() {
                    bail!(
                        "pre-call registration rejected with status {}",
                        registration.final_status
                    );
                }
                next_cseq = registration.last_cseq + 1;
            }
            let outcome = client
                .call_setup(&callee_uri, next_cseq)
                .await
                .context("INVITE probe failed")?;
            let section = report::render_call_report(&outcome);
            print!("{}", section);
            report_text.push_str(&section);
        }
    }

    let output = args.output.or_else(|| config.results_path.clone());
    if let Some(path) = output {
        report::save_results(&path, &report_text)?;
        println!("Results saved to: {}", path);
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

//! License generator CLI.
//!
//! Every command loads the signing key from `--key`, generating and
//! persisting a new one when the file does not exist yet. License keys are
//! printed alone on stdout; human readable summaries go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use offline_license::entitlement;
use offline_license::issuance::LicenseIssuer;
use offline_license::keys::{self, IssuerKey, KeyOrigin};
use offline_license::verification::LicenseVerifier;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Issue and inspect signed license keys
#[derive(Debug, Parser)]
#[command(name = "license-gen", version, about, long_about = None)]
struct Cli {
    /// Path to the PEM encoded private signing key
    #[arg(
        short,
        long,
        global = true,
        env = "LICENSE_SIGNING_KEY_PATH",
        default_value = "private.key"
    )]
    key: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the public key to embed in verifying deployments
    Keygen,
    /// Issue a three seat trial license valid on any domain
    Trial {
        company: String,
        email: String,
        /// Validity in days
        days: u32,
    },
    /// Issue a permanent license
    Permanent {
        company: String,
        email: String,
        /// Licensed domain, or `*`
        domain: String,
        max_users: u32,
        /// Validity in months
        months: u32,
    },
    /// Verify a license key against a public key
    Verify {
        license_key: String,
        /// Path to the PEM encoded public key
        #[arg(short, long)]
        public_key: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Keygen => {
            let key = signing_key(&cli.key)?;
            let public_key = keys::public_key_pem(&key)?;
            eprintln!("Public key (embed in verifying deployments):");
            println!("{}", public_key.trim_end());
        }
        Command::Trial {
            company,
            email,
            days,
        } => {
            let issuer = LicenseIssuer::new(signing_key(&cli.key)?);
            let license_key = issuer
                .issue_trial(&company, &email, days)
                .context("failed to generate trial license")?;

            eprintln!("Trial license generated:");
            eprintln!("  Company:  {company}");
            eprintln!("  Email:    {email}");
            eprintln!("  Duration: {days} days");
            println!("{license_key}");
        }
        Command::Permanent {
            company,
            email,
            domain,
            max_users,
            months,
        } => {
            let issuer = LicenseIssuer::new(signing_key(&cli.key)?);
            let license_key = issuer
                .issue_permanent(&company, &email, &domain, max_users, months)
                .context("failed to generate permanent license")?;

            eprintln!("Permanent license generated:");
            eprintln!("  Company:   {company}");
            eprintln!("  Email:     {email}");
            eprintln!("  Domain:    {domain}");
            eprintln!("  Max users: {max_users}");
            eprintln!("  Duration:  {months} months");
            println!("{license_key}");
        }
        Command::Verify {
            license_key,
            public_key,
        } => {
            let pem = std::fs::read_to_string(&public_key)
                .with_context(|| format!("failed to read {}", public_key.display()))?;
            let verifier = LicenseVerifier::new(&pem)?;
            let license = verifier.verify(&license_key)?;
            let now = chrono::Utc::now();

            println!("Company:      {}", license.company_name);
            println!("Email:        {}", license.email);
            println!("Type:         {}", license.license_type);
            println!("Domain:       {}", license.domain);
            println!("Max users:    {}", license.max_users);
            println!("Version:      {}", license.version);
            println!("Issued:       {}", license.issue_date.to_rfc3339());
            println!("Expires:      {}", license.expiry_date.to_rfc3339());
            println!("Status:       {:?}", entitlement::status(&license, now));
            println!("Days left:    {}", entitlement::days_remaining(&license, now));
        }
    }
    Ok(())
}

fn signing_key(path: &Path) -> anyhow::Result<IssuerKey> {
    let (key, origin) = keys::load_or_generate(path)
        .with_context(|| format!("unusable signing key {}", path.display()))?;
    if origin == KeyOrigin::Generated {
        eprintln!("New signing key generated and saved to {}", path.display());
    }
    Ok(key)
}

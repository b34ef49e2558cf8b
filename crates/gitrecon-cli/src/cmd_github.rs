use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::args::{GitHubArgs, GlobalArgs};
use crate::util;
use gitrecon::decoy::GitDecoyPusher;
use gitrecon::dispatch::{Dispatch, JsonLinesSink};
use gitrecon::git_binary::{Credentials, Git};
use gitrecon::github;
use gitrecon::harvest::{HarvestMode, Harvester};
use gitrecon::oracle::OracleOptions;
use gitrecon::recon::{Recon, ReconOptions};
use gitrecon::traversal::Traversal;

/// The inputs of a `github` run, read up front so that bad input files fail before any requests.
struct Inputs {
    users: Vec<String>,
    emails: Vec<String>,
    repos: Vec<String>,
}

impl Inputs {
    fn is_empty(&self) -> bool {
        self.users.is_empty() && self.emails.is_empty() && self.repos.is_empty()
    }
}

pub fn run(global_args: &GlobalArgs, args: &GitHubArgs) -> Result<()> {
    let inputs = &args.inputs;
    let inputs = Inputs {
        users: util::inline_or_file(&inputs.users, inputs.fusers.as_deref())?,
        emails: util::inline_or_file(&inputs.emails, inputs.femails.as_deref())?,
        repos: util::inline_or_file(&inputs.repos, inputs.frepos.as_deref())?,
    };
    if !args.rate && inputs.is_empty() {
        bail!("No users, emails, or repositories specified");
    }
    if args.token.trim().is_empty() {
        bail!("A GitHub personal access token is required");
    }

    let token = SecretString::new(args.token.trim().to_owned());
    let client = github::ClientBuilder::new()
        .base_url(args.api_url.clone())
        .context("Failed to set GitHub API URL")?
        .ignore_certs(args.ignore_certs)
        .personal_access_token(token.clone())
        .build()
        .context("Failed to initialize GitHub client")?;

    let runtime = util::runtime()?;
    runtime.block_on(util::until_interrupted(async {
        if args.rate {
            return report_rate_limits(global_args, &client).await;
        }

        let me = client
            .get_authenticated_user()
            .await
            .context("Invalid token")?;
        info!("Authenticated as {}", me.login);

        let output = util::get_writer_for_file_or_stdout(global_args.output.as_ref())
            .context("Failed to get output writer")?;
        let dispatch = Dispatch::new(Box::new(JsonLinesSink::new(output))).with_self_login(&me.login);

        let git = Git::new(Credentials::Basic {
            username: me.login.clone(),
            password: token,
        })
        .ignore_certs(args.ignore_certs);
        let git = Arc::new(git);
        let harvester = Harvester::new(Arc::clone(&git), HarvestMode::Clone, args.threads as usize)
            .with_progress(global_args.use_progress());
        let pusher = Arc::new(GitDecoyPusher::new(git));
        let options = ReconOptions {
            forks: args.forks,
            pulls: args.pulls,
            max_pulls: (args.max_pulls > 0).then_some(args.max_pulls),
            members: args.members,
            contributors: args.contributors,
            search: args.search,
            oracle: OracleOptions {
                settle: Duration::from_secs(args.settle_secs),
                ..Default::default()
            },
        };
        let recon = Recon::new(Traversal::new(client), harvester, pusher, options, &dispatch);

        if !inputs.emails.is_empty() {
            info!("Analyzing {} emails", inputs.emails.len());
            recon.analyse_emails(&inputs.emails).await?;
        }
        if !inputs.users.is_empty() {
            info!("Analyzing {} users", inputs.users.len());
            recon.analyse_users(&inputs.users).await?;
        }
        if !inputs.repos.is_empty() {
            info!("Analyzing {} repositories", inputs.repos.len());
            recon.analyse_repo_urls(&inputs.repos).await?;
        }
        if recon.traversal().is_global_rate_limit_exceeded() {
            warn!("The global rate limit was exceeded; results are incomplete");
        }
        Ok(())
    }))
}

/// Print the token's rate limits as a single JSON object.
async fn report_rate_limits(global_args: &GlobalArgs, client: &github::Client) -> Result<()> {
    let limits = client
        .get_rate_limit()
        .await
        .context("Failed to get rate limits")?;
    let mut output = util::get_writer_for_file_or_stdout(global_args.output.as_ref())
        .context("Failed to get output writer")?;
    serde_json::to_writer_pretty(&mut output, &limits)?;
    writeln!(output)?;
    Ok(())
}

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

use crate::args::{GitArgs, GlobalArgs};
use crate::util;
use gitrecon::dispatch::{Dispatch, JsonLinesSink};
use gitrecon::git_binary::{Credentials, Git};
use gitrecon::harvest::{HarvestMode, Harvester};
use gitrecon::record::{ReconRecord, RepositoryRecord};

pub fn run(global_args: &GlobalArgs, args: &GitArgs) -> Result<()> {
    let locations = util::inline_or_file(&args.inputs.repos, args.inputs.frepos.as_deref())?;
    if locations.is_empty() {
        bail!("No repositories specified");
    }

    let credentials = credentials(args)?;
    let mode = if args.local {
        HarvestMode::Local
    } else {
        HarvestMode::Clone
    };
    let git = Git::new(credentials).ignore_certs(args.ignore_certs);
    let harvester = Harvester::new(Arc::new(git), mode, args.threads as usize)
        .with_progress(global_args.use_progress());

    let output = util::get_writer_for_file_or_stdout(global_args.output.as_ref())
        .context("Failed to get output writer")?;
    let dispatch = Dispatch::new(Box::new(JsonLinesSink::new(output)));

    info!("Harvesting {} repositories", locations.len());
    let runtime = util::runtime()?;
    runtime.block_on(util::until_interrupted(async {
        let mut results = harvester
            .harvest(locations)
            .context("Failed to start repository harvester")?;
        while let Some(result) = results.recv().await {
            let record = match result.result {
                Ok(metadata) => ReconRecord::for_repository(RepositoryRecord {
                    metadata,
                    ..RepositoryRecord::at_location(&result.location)
                }),
                Err(e) => {
                    let verb = match mode {
                        HarvestMode::Clone => "clone",
                        HarvestMode::Local => "open",
                    };
                    let mut record =
                        ReconRecord::for_repository(RepositoryRecord::at_location(&result.location));
                    record.push_error(format!("failed to {verb} '{}': {e}", result.location));
                    record
                }
            };
            dispatch
                .emit(record)
                .context("Failed to write output record")?;
        }
        Ok(())
    }))
}

/// The credentials `git` should use with remotes, prompting for a password or passphrase if asked
/// to.
fn credentials(args: &GitArgs) -> Result<Credentials> {
    if let Some(key_path) = &args.ssh {
        let passphrase = if args.prompt_password {
            Some(prompt(&format!("Passphrase for '{}'", key_path.display()))?)
        } else {
            None
        };
        return Ok(Credentials::SshKey {
            key_path: key_path.clone(),
            passphrase: passphrase.map(SecretString::new),
        });
    }
    let Some(username) = &args.username else {
        if args.prompt_password {
            bail!("A username (--username) or a key (--ssh) is required with --pass");
        }
        return Ok(Credentials::Anonymous);
    };
    let password = match (&args.token, args.prompt_password) {
        (Some(token), _) => token.clone(),
        (None, true) => prompt(&format!("Password for '{username}'"))?,
        (None, false) => bail!("A token (--token) or a password (--pass) is required with --username"),
    };
    Ok(Credentials::Basic {
        username: username.clone(),
        password: SecretString::new(password),
    })
}

fn prompt(message: &str) -> Result<String> {
    dialoguer::Password::new()
        .with_prompt(message)
        .interact()
        .context("Failed to read password")
}

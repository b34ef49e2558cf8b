use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tempfile::TempDir;
use tracing::{debug, debug_span};

#[derive(Debug)]
pub enum GitError {
    IOError(std::io::Error),
    GitError {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        status: ExitStatus,
    },
}

impl From<std::io::Error> for GitError {
    fn from(err: std::io::Error) -> GitError {
        GitError::IOError(err)
    }
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::IOError(e) => write!(f, "git execution failed: {e}"),
            GitError::GitError { stderr, status, .. } => write!(
                f,
                "git execution failed (code={status}): {}",
                String::from_utf8_lossy(stderr).trim()
            ),
        }
    }
}

impl std::error::Error for GitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitError::IOError(e) => Some(e),
            GitError::GitError { .. } => None,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Credentials
// -------------------------------------------------------------------------------------------------
/// How `git` should authenticate to remotes.
pub enum Credentials {
    /// No credentials; rely on whatever the remote allows anonymously
    Anonymous,

    /// HTTP basic authentication, e.g., a GitHub login and personal access token
    Basic {
        username: String,
        password: SecretString,
    },

    /// Authenticate over SSH with the given private key
    ///
    /// A passphrase is handed to `ssh` through `SSH_ASKPASS`, which needs OpenSSH 8.4 or later.
    SshKey {
        key_path: PathBuf,
        passphrase: Option<SecretString>,
    },
}

const USERNAME_VAR: &str = "GITRECON_GIT_USERNAME";
const PASSWORD_VAR: &str = "GITRECON_GIT_PASSWORD";
const PASSPHRASE_VAR: &str = "GITRECON_SSH_PASSPHRASE";

const ASKPASS_SCRIPT: &str = "#!/bin/sh\nprintf '%s\\n' \"$GITRECON_SSH_PASSPHRASE\"\n";

/// A `git` invocation, with the helper files that must outlive it.
struct GitCommand {
    cmd: Command,
    _askpass: Option<TempDir>,
}

/// Runs the `git` binary, isolated from any system or user configuration.
pub struct Git {
    credentials: Credentials,
    ignore_certs: bool,
}

impl Git {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            ignore_certs: false,
        }
    }

    /// Skip TLS certificate verification when talking to HTTPS remotes.
    pub fn ignore_certs(mut self, ignore_certs: bool) -> Self {
        self.ignore_certs = ignore_certs;
        self
    }

    fn git(&self) -> Result<GitCommand, GitError> {
        let mut cmd = Command::new("git");
        let mut askpass = None;
        cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");
        cmd.env("GIT_CONFIG_NOSYSTEM", "1");
        cmd.env("GIT_CONFIG_SYSTEM", "/dev/null");
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        if self.ignore_certs {
            cmd.args(["-c", "http.sslVerify=false"]);
        }
        match &self.credentials {
            Credentials::Anonymous => {}
            Credentials::Basic { username, password } => {
                // The secret must never appear in the argument list.
                cmd.args([
                    "-c",
                    "credential.helper=",
                    "-c",
                    r#"credential.helper=!_creds() { echo username="$GITRECON_GIT_USERNAME"; echo password="$GITRECON_GIT_PASSWORD"; }; _creds"#,
                ]);
                cmd.env(USERNAME_VAR, username);
                cmd.env(PASSWORD_VAR, password.expose_secret());
            }
            Credentials::SshKey { key_path, passphrase } => {
                cmd.env("GIT_SSH_COMMAND", ssh_command(key_path));
                if let Some(passphrase) = passphrase {
                    let dir = write_askpass_script()?;
                    cmd.env("SSH_ASKPASS", dir.path().join("askpass"));
                    cmd.env("SSH_ASKPASS_REQUIRE", "force");
                    cmd.env(PASSPHRASE_VAR, passphrase.expose_secret());
                    askpass = Some(dir);
                }
            }
        }
        cmd.stdin(Stdio::null());
        Ok(GitCommand {
            cmd,
            _askpass: askpass,
        })
    }

    fn run(&self, mut git: GitCommand) -> Result<(), GitError> {
        let cmd = &mut git.cmd;
        // Only the arguments: the environment carries credentials.
        debug!("Running git {:?}", cmd.get_args().collect::<Vec<_>>());
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(GitError::GitError {
                stdout: output.stdout,
                stderr: output.stderr,
                status: output.status,
            });
        }
        Ok(())
    }

    /// Create a bare clone of `repo_url` at `output_dir`, which must be empty or not exist.
    pub fn create_bare_clone(&self, repo_url: &str, output_dir: &Path) -> Result<(), GitError> {
        let _span = debug_span!("git_clone", "{repo_url} {}", output_dir.display()).entered();
        debug!("Attempting to create bare clone of {} at {}", repo_url, output_dir.display());

        let mut git = self.git()?;
        git.cmd
            .arg("clone")
            .arg("--bare")
            .arg("--quiet")
            .arg(repo_url)
            .arg(output_dir);
        self.run(git)
    }

    /// Push `refspec` from the repository at `git_dir` to `remote_url`.
    pub fn push(&self, git_dir: &Path, remote_url: &str, refspec: &str) -> Result<(), GitError> {
        let _span = debug_span!("git_push", "{remote_url} {}", git_dir.display()).entered();
        debug!("Attempting to push {refspec} from {} to {remote_url}", git_dir.display());

        let mut git = self.git()?;
        git.cmd
            .arg("--git-dir")
            .arg(git_dir)
            .arg("push")
            .arg("--quiet")
            .arg(remote_url)
            .arg(refspec);
        self.run(git)
    }
}

impl Default for Git {
    /// Equivalent to `Git::new(Credentials::Anonymous)`
    fn default() -> Self {
        Self::new(Credentials::Anonymous)
    }
}

/// Write an executable `askpass` script that prints the passphrase from the environment.
fn write_askpass_script() -> std::io::Result<TempDir> {
    let dir = tempfile::Builder::new().prefix("gitrecon-askpass").tempdir()?;
    let path = dir.path().join("askpass");
    std::fs::write(&path, ASKPASS_SCRIPT)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(dir)
}

/// Build a `GIT_SSH_COMMAND` value that uses only the given key.
fn ssh_command(key_path: &Path) -> String {
    let quoted = key_path.display().to_string().replace('\'', r"'\''");
    format!("ssh -i '{quoted}' -o IdentitiesOnly=yes")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ssh_command_quotes_path() {
        assert_eq!(
            ssh_command(Path::new("/home/me/.ssh/id_ed25519")),
            "ssh -i '/home/me/.ssh/id_ed25519' -o IdentitiesOnly=yes"
        );
        assert_eq!(
            ssh_command(Path::new("/tmp/it's a key")),
            r"ssh -i '/tmp/it'\''s a key' -o IdentitiesOnly=yes"
        );
    }

    #[test]
    fn basic_credentials_stay_out_of_arguments() {
        let git = Git::new(Credentials::Basic {
            username: "octocat".into(),
            password: SecretString::new("hunter2".into()),
        });
        let git = git.git().unwrap();
        let cmd = &git.cmd;
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.iter().all(|a| !a.contains("hunter2")));
        let envs: Vec<(String, String)> = cmd
            .get_envs()
            .filter_map(|(k, v)| Some((k.to_string_lossy().into_owned(), v?.to_string_lossy().into_owned())))
            .collect();
        assert!(envs.contains(&(PASSWORD_VAR.to_string(), "hunter2".to_string())));
        assert!(envs.contains(&(USERNAME_VAR.to_string(), "octocat".to_string())));
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn env_of(cmd: &Command, name: &str) -> Option<String> {
        cmd.get_envs()
            .find(|(k, _)| *k == name)
            .and_then(|(_, v)| v.map(|v| v.to_string_lossy().into_owned()))
    }

    #[test]
    fn ignore_certs_disables_tls_verification() {
        let git = Git::default().ignore_certs(true).git().unwrap();
        assert_eq!(args_of(&git.cmd), vec!["-c", "http.sslVerify=false"]);

        let git = Git::default().git().unwrap();
        assert!(args_of(&git.cmd).is_empty());
    }

    #[test]
    fn ssh_passphrase_goes_through_askpass() {
        let git = Git::new(Credentials::SshKey {
            key_path: PathBuf::from("/home/me/.ssh/id_ed25519"),
            passphrase: Some(SecretString::new("correct horse".into())),
        });
        let git = git.git().unwrap();
        assert!(args_of(&git.cmd).iter().all(|a| !a.contains("correct horse")));
        assert_eq!(env_of(&git.cmd, PASSPHRASE_VAR).as_deref(), Some("correct horse"));
        assert_eq!(env_of(&git.cmd, "SSH_ASKPASS_REQUIRE").as_deref(), Some("force"));

        let script = PathBuf::from(env_of(&git.cmd, "SSH_ASKPASS").unwrap());
        assert_eq!(std::fs::read_to_string(&script).unwrap(), ASKPASS_SCRIPT);
        drop(git);
        assert!(!script.exists());
    }

    #[test]
    fn ssh_key_without_passphrase_needs_no_askpass() {
        let git = Git::new(Credentials::SshKey {
            key_path: PathBuf::from("/home/me/.ssh/id_ed25519"),
            passphrase: None,
        });
        let git = git.git().unwrap();
        assert!(env_of(&git.cmd, "SSH_ASKPASS").is_none());
        assert!(env_of(&git.cmd, "GIT_SSH_COMMAND").is_some());
    }

    #[test]
    fn clone_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let git = Git::default();
        let res = git.create_bare_clone(
            &tmp.path().join("does-not-exist").display().to_string(),
            &tmp.path().join("out"),
        );
        assert!(res.is_err());
    }
}

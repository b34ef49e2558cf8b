use clap::{crate_description, ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use url::Url;

// -----------------------------------------------------------------------------
// command-line args
// -----------------------------------------------------------------------------
#[derive(Parser, Debug)]
#[command(
    name("gitrecon"),
    bin_name("gitrecon"),

    author,   // retrieved from Cargo.toml `authors`
    version,  // retrieved from Cargo.toml `version`
    about,    // retrieved from Cargo.toml `description`

    long_about = concat!(
        crate_description!(),
        "\n\n",
        "Results are written as JSON Lines: one object per repository, user, or error.",
    ),
)]
#[deny(missing_docs)]
/// Extract commit authorship metadata from Git repositories and correlate it with GitHub accounts
pub struct CommandLineArgs {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

impl CommandLineArgs {
    pub fn parse_args() -> Self {
        let mut args = <Self as Parser>::parse();

        // If `NO_COLOR` is set in the environment, disable colored output
        //
        // https://no-color.org/
        if std::env::var("NO_COLOR").is_ok() {
            args.global_args.color = Mode::Never
        }

        args
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract author and committer identities from Git repositories
    ///
    /// The history of every branch of each repository is walked, and the distinct (email, name)
    /// pairs of commit authors and committers are reported. Tags are not walked.
    ///
    /// Repositories are cloned with the `git` binary on the PATH into temporary directories that
    /// are removed afterwards, unless `--local` is given, in which case the locations are opened
    /// in place. The `git` binary is invoked without any system-wide or user-specific
    /// configuration.
    #[command(display_order = 1)]
    Git(GitArgs),

    /// Enumerate GitHub accounts and repositories, and correlate emails with accounts
    ///
    /// A personal access token is required. Its login is redacted from all output.
    ///
    /// Emails are resolved to accounts by pushing commits authored with them to a temporary
    /// private repository owned by the token's user, which is deleted afterwards. The token
    /// therefore needs the permissions to create, push to, and delete repositories.
    #[command(display_order = 2, name = "github")]
    GitHub(GitHubArgs),
}

// -----------------------------------------------------------------------------
// global options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Global Options")]
pub struct GlobalArgs {
    /// Enable verbose output
    ///
    /// This can be repeated up to 3 times to enable successively more output.
    #[arg(global=true, long, short, action=ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error feedback messages
    ///
    /// This silences WARNING, INFO, DEBUG, and TRACE messages and disables progress bars.
    /// This overrides any provided verbosity and progress reporting options.
    #[arg(global=true, long, short, conflicts_with="verbose")]
    pub quiet: bool,

    /// Enable or disable colored output
    ///
    /// When this is "auto", colors are enabled when stderr is a tty.
    ///
    /// If the `NO_COLOR` environment variable is set, it takes precedence and is equivalent to `--color=never`.
    #[arg(global=true, long, default_value_t=Mode::Auto, value_name="MODE")]
    pub color: Mode,

    /// Enable or disable progress bars
    ///
    /// When this is "auto", progress bars are enabled when stderr is a tty.
    #[arg(global=true, long, default_value_t=Mode::Auto, value_name="MODE")]
    pub progress: Mode,

    /// Append output to the specified file instead of writing it to stdout
    #[arg(global=true, long, short, value_name="FILE")]
    pub output: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn use_color(&self) -> bool {
        match self.color {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => std::io::stderr().is_terminal(),
        }
    }

    pub fn use_progress(&self) -> bool {
        if self.quiet {
            return false;
        }
        match self.progress {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => std::io::stderr().is_terminal(),
        }
    }
}

/// A generic auto/never/always mode value
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Mode {
    Auto,
    Never,
    Always,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Auto => "auto",
            Mode::Never => "never",
            Mode::Always => "always",
        };
        write!(f, "{s}")
    }
}

// -----------------------------------------------------------------------------
// `git` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct GitArgs {
    #[command(flatten)]
    pub inputs: GitInputArgs,

    /// Open the repositories in place instead of cloning them
    #[arg(long)]
    pub local: bool,

    /// Authenticate to remotes over HTTP with this username
    #[arg(long, short, value_name = "NAME", conflicts_with = "ssh")]
    pub username: Option<String>,

    /// Authenticate to remotes over HTTP with this token as the password
    #[arg(
        long,
        short,
        value_name = "TOKEN",
        env = "GITRECON_GIT_TOKEN",
        hide_env_values = true,
        requires = "username"
    )]
    pub token: Option<String>,

    /// Prompt for a password to authenticate to remotes over HTTP, or with `--ssh`, for the
    /// passphrase of the private key
    #[arg(long = "pass", short = 'p', conflicts_with = "token")]
    pub prompt_password: bool,

    /// Authenticate to remotes over SSH with the private key at this path
    #[arg(long, value_name = "KEY")]
    pub ssh: Option<PathBuf>,

    /// Ignore validation of TLS certificates when cloning
    #[arg(long)]
    pub ignore_certs: bool,

    /// Harvest this many repositories in parallel
    #[arg(long, value_name = "N", default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub threads: u32,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct GitInputArgs {
    /// Harvest the specified repository URLs or paths
    ///
    /// Values are comma-separated, and this option can be repeated.
    #[arg(long, value_name = "URL", value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Harvest the repository URLs or paths listed in this file, one per line
    #[arg(long, value_name = "FILE")]
    pub frepos: Option<PathBuf>,
}

// -----------------------------------------------------------------------------
// `github` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct GitHubArgs {
    /// Use this personal access token for GitHub API access
    #[arg(long, short, value_name = "TOKEN", env = "GITRECON_GITHUB_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Print the token's current rate limits and exit
    #[arg(long)]
    pub rate: bool,

    #[command(flatten)]
    pub inputs: GitHubInputArgs,

    /// Search commits and pull requests by each user login or email
    #[arg(long, help_heading = "Analysis Options")]
    pub search: bool,

    /// Include forked repositories of users and organizations
    #[arg(long, help_heading = "Analysis Options")]
    pub forks: bool,

    /// Harvest identities from the commits of open pull requests
    #[arg(long, help_heading = "Analysis Options")]
    pub pulls: bool,

    /// List at most this many pull requests per repository; 0 means no limit
    #[arg(long, value_name = "N", default_value_t = 0, help_heading = "Analysis Options")]
    pub max_pulls: usize,

    /// Fully analyze the members of organizations
    #[arg(long, help_heading = "Analysis Options")]
    pub members: bool,

    /// Resolve the emails found in each repository to GitHub accounts
    #[arg(long, help_heading = "Analysis Options")]
    pub contributors: bool,

    /// Use the specified URL for GitHub API access
    ///
    /// If accessing a GitHub Enterprise Server instance, this value should be the entire base URL
    /// including the `api/v3` portion, e.g., `https://github.example.com/api/v3`.
    #[arg(
        long,
        value_name = "URL",
        default_value = "https://api.github.com",
        help_heading = "Connection Options"
    )]
    pub api_url: Url,

    /// Ignore validation of TLS certificates, both for API access and for cloning and pushing
    #[arg(long, help_heading = "Connection Options")]
    pub ignore_certs: bool,

    /// Harvest this many repositories in parallel
    #[arg(long, value_name = "N", default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..), help_heading = "Connection Options")]
    pub threads: u32,

    /// Wait this many seconds after pushing a decoy repository before reading its contributors
    #[arg(long, value_name = "SECONDS", default_value_t = 2, help_heading = "Connection Options")]
    pub settle_secs: u64,
}

#[derive(Args, Debug)]
#[command(next_help_heading = "Input Options")]
pub struct GitHubInputArgs {
    /// Analyze the specified users and organizations
    ///
    /// Values are comma-separated, and this option can be repeated.
    #[arg(long, value_name = "LOGIN", value_delimiter = ',', conflicts_with = "fusers")]
    pub users: Vec<String>,

    /// Analyze the users and organizations listed in this file, one per line
    #[arg(long, value_name = "FILE")]
    pub fusers: Option<PathBuf>,

    /// Resolve the specified emails to GitHub accounts
    ///
    /// Values are comma-separated, and this option can be repeated.
    #[arg(long, value_name = "EMAIL", value_delimiter = ',', conflicts_with = "femails")]
    pub emails: Vec<String>,

    /// Resolve the emails listed in this file, one per line
    #[arg(long, value_name = "FILE")]
    pub femails: Option<PathBuf>,

    /// Analyze the specified repository URLs
    ///
    /// Values are comma-separated, and this option can be repeated.
    #[arg(long, value_name = "URL", value_delimiter = ',', conflicts_with = "frepos")]
    pub repos: Vec<String>,

    /// Analyze the repository URLs listed in this file, one per line
    #[arg(long, value_name = "FILE")]
    pub frepos: Option<PathBuf>,
}

//! CLI interface for tsend - send Microsoft Teams messages from the terminal.

use std::env;
use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use env_logger::fmt::WriteStyle;
use log::{LevelFilter, debug};
use serde::Serialize;
use tsend_core::composer::{is_image, validate_file, validate_files};
use tsend_core::paths::write_default_config;
use tsend_core::{
    APP_NAME, AppConfig, AppPaths, FileOptions, REPO_URL, SendOptions, check_generated_files,
    generate_schema, write_generated_files,
};

fn main() -> anyhow::Result<()> {
    try_main()
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {}", ctx.paths);

    match cli.command {
        Command::Text {
            chat,
            message,
            send,
        } => handle_send(
            &ctx,
            &SendRequest {
                chat,
                payload: Payload::Text { message },
                options: send.options(),
            },
        ),
        Command::Message {
            chat,
            message,
            image,
            send,
        } => handle_send(
            &ctx,
            &SendRequest {
                chat,
                payload: Payload::Message { message, image },
                options: send.options(),
            },
        ),
        Command::Files {
            chat,
            paths,
            caption,
            no_embed,
            send,
        } => handle_send(
            &ctx,
            &SendRequest {
                chat,
                payload: Payload::Files {
                    paths,
                    files: FileOptions {
                        caption,
                        embed_images: !no_embed,
                    },
                },
                options: send.options(),
            },
        ),
        Command::Normalize { labels } => handle_normalize(&ctx, &labels),
        Command::Alias { name, chat } => handle_alias(&ctx, &name, &chat),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "tsend",
    author,
    version,
    about = "Send Microsoft Teams messages, images and files through the desktop client",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

/// Common CLI options shared across all subcommands.
#[derive(Debug, Clone, Args)]
pub struct CommonOpts {
    /// Override the config file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
    /// Reduce output to only errors.
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    pub quiet: bool,
    /// Increase logging verbosity (stackable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,
    /// Enable trace logging.
    #[arg(long, global = true)]
    pub trace: bool,
    /// Output machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,
    /// Disable ANSI colors in output.
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    pub no_color: bool,
    /// Control color output.
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    pub color: ColorOption,
    /// Print what would happen without touching the desktop or disk.
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
    /// Assume "yes" for interactive prompts.
    #[arg(short = 'y', long = "yes", global = true)]
    pub assume_yes: bool,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
    /// Detect terminal capabilities automatically.
    Auto,
    /// Always emit ANSI color codes.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

/// Options shared by the send commands.
#[derive(Debug, Clone, Args)]
struct SendArgs {
    /// Chat list section to search first (e.g. "Favorites", "Chats").
    #[arg(short, long, value_name = "SECTION")]
    section: Option<String>,
    /// Leave the chat filter box open after opening the chat.
    #[arg(long)]
    keep_filter: bool,
    /// Milliseconds to wait after clicking send (defaults to timing.wait_after_send_ms).
    #[arg(long, value_name = "MS")]
    wait_ms: Option<u64>,
}

impl SendArgs {
    fn options(self) -> SendOptions {
        SendOptions {
            section: self.section,
            close_filter: !self.keep_filter,
            wait_after_send: self.wait_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a plain text message. Usage: tsend text <chat> <message>.
    Text {
        /// Chat name as shown in the Teams chat list.
        chat: String,
        /// Message text. Newlines become line breaks.
        message: String,
        #[command(flatten)]
        send: SendArgs,
    },
    /// Send a message with an optional inline image.
    Message {
        /// Chat name as shown in the Teams chat list.
        chat: String,
        /// Message text.
        message: String,
        /// Image pasted below the text.
        #[arg(short, long, value_name = "PATH")]
        image: Option<PathBuf>,
        #[command(flatten)]
        send: SendArgs,
    },
    /// Send one or more files.
    Files {
        /// Chat name as shown in the Teams chat list.
        chat: String,
        /// Files to send.
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
        /// Text typed before the attachments.
        #[arg(short, long)]
        caption: Option<String>,
        /// Attach images as files instead of pasting them inline.
        #[arg(long)]
        no_embed: bool,
        #[command(flatten)]
        send: SendArgs,
    },
    /// Show how chat list labels normalize with the current aliases.
    Normalize {
        /// Raw labels, e.g. "Chat: Alice Available 10:30 AM".
        #[arg(required = true)]
        labels: Vec<String>,
    },
    /// Map a chat list label fragment to a canonical chat name (written to config.toml).
    Alias {
        /// Label fragment, matched case-insensitively.
        name: String,
        /// Canonical chat name.
        chat: String,
    },
    /// Create config directories and default files.
    Init(InitCommand),
    /// Inspect and manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists.
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration.
    Show,
    /// Print the resolved config file path.
    Path,
    /// Print all resolved paths.
    Paths,
    /// Print the JSON schema.
    Schema,
    /// Write the JSON schema and an example config to a directory.
    Generate {
        /// Output directory.
        #[arg(long, value_name = "DIR", default_value = ".")]
        out: PathBuf,
        /// Only check that existing files are up to date.
        #[arg(long)]
        check: bool,
    },
    /// Regenerate the default configuration file.
    Reset,
}

// ─── Runtime ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;
        let config = AppConfig::load(&paths, common.dry_run)?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        builder.filter_level(self.effective_log_level());

        if let Some(log_file) = self.paths.log_file(&self.config) {
            if !self.common.dry_run {
                self.paths.ensure_log_dir(&self.config)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .with_context(|| format!("opening log file {}", log_file.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
            builder.write_style(WriteStyle::Never);
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            if disable_color {
                builder.write_style(WriteStyle::Never);
            } else if force_color {
                builder.write_style(WriteStyle::Always);
            } else {
                builder.write_style(WriteStyle::Auto);
            }
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    const fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self.config.logging.level.to_filter(),
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

// ─── Sending ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct SendRequest {
    chat: String,
    payload: Payload,
    options: SendOptions,
}

#[derive(Debug)]
enum Payload {
    Text {
        message: String,
    },
    Message {
        message: String,
        image: Option<PathBuf>,
    },
    Files {
        paths: Vec<PathBuf>,
        files: FileOptions,
    },
}

/// What a send would do, printed by `--dry-run`.
#[derive(Debug, Serialize)]
struct SendPlan<'a> {
    chat: &'a str,
    section: Option<&'a str>,
    message: Option<&'a str>,
    inline_images: Vec<PathBuf>,
    attachments: Vec<PathBuf>,
    close_filter: bool,
    wait_after_send_ms: u64,
    minimize_after_send: bool,
}

impl SendRequest {
    fn plan<'a>(&'a self, config: &AppConfig) -> Result<SendPlan<'a>> {
        let (message, inline_images, attachments) = match &self.payload {
            Payload::Text { message } => (Some(message.as_str()), Vec::new(), Vec::new()),
            Payload::Message { message, image } => {
                let images = image.as_deref().map(validate_file).transpose()?;
                (Some(message.as_str()), images.into_iter().collect(), Vec::new())
            }
            Payload::Files { paths, files } => {
                let (images, others): (Vec<PathBuf>, Vec<PathBuf>) = validate_files(paths)?
                    .into_iter()
                    .partition(|path| files.embed_images && is_image(path));
                (files.caption.as_deref(), images, others)
            }
        };
        Ok(SendPlan {
            chat: &self.chat,
            section: self.options.section.as_deref(),
            message,
            inline_images,
            attachments,
            close_filter: self.options.close_filter,
            wait_after_send_ms: self
                .options
                .wait_after_send
                .unwrap_or_else(|| config.timing.wait_after_send())
                .as_millis() as u64,
            minimize_after_send: config.automation.minimize_after_send,
        })
    }
}

fn handle_send(ctx: &RuntimeContext, request: &SendRequest) -> Result<()> {
    if ctx.common.dry_run {
        let plan = request.plan(&ctx.config)?;
        if ctx.common.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("serializing send plan")?
            );
        } else {
            print_plan(&plan);
        }
        return Ok(());
    }
    send(ctx, request)?;
    if ctx.common.json {
        println!("{}", serde_json::json!({ "sent": true, "chat": request.chat }));
    } else if !ctx.common.quiet {
        println!("sent to {}", request.chat);
    }
    Ok(())
}

#[cfg(windows)]
fn send(ctx: &RuntimeContext, request: &SendRequest) -> Result<()> {
    use tsend_core::TeamsDriver;
    use tsend_core::desktop::windows::{UiaDesktop, WinClipboard};

    let desktop = UiaDesktop::new()?;
    let driver = TeamsDriver::new(desktop, WinClipboard, ctx.config.clone());
    let session = driver.connect()?;
    let chat = request.chat.as_str();
    match &request.payload {
        Payload::Text { message } => driver.send_text(&session, message, chat, &request.options)?,
        Payload::Message { message, image } => {
            driver.send_message(&session, message, chat, image.as_deref(), &request.options)?;
        }
        Payload::Files { paths, files } => {
            driver.send_files(&session, paths, chat, files, &request.options)?;
        }
    }
    Ok(())
}

#[cfg(not(windows))]
fn send(_ctx: &RuntimeContext, request: &SendRequest) -> Result<()> {
    Err(anyhow!(
        "cannot send to '{}': {APP_NAME} drives the Microsoft Teams desktop client and only runs on Windows (try --dry-run)",
        request.chat
    ))
}

fn print_plan(plan: &SendPlan<'_>) {
    println!("dry-run: would send to '{}'", plan.chat);
    match plan.section {
        Some(section) => println!("  section:      {section} (searched first)"),
        None => println!("  section:      any"),
    }
    if let Some(message) = plan.message.filter(|m| !m.is_empty()) {
        println!("  message:      {message}");
    }
    for image in &plan.inline_images {
        println!("  inline image: {}", image.display());
    }
    for file in &plan.attachments {
        println!("  attachment:   {}", file.display());
    }
    println!("  close filter: {}", plan.close_filter);
    println!("  wait after:   {} ms", plan.wait_after_send_ms);
    if plan.minimize_after_send {
        println!("  then minimize all windows");
    }
}

// ─── Offline commands ────────────────────────────────────────────────

fn handle_normalize(ctx: &RuntimeContext, labels: &[String]) -> Result<()> {
    let normalizer = tsend_core::NameNormalizer::new(ctx.config.alias_table());
    let rows: Vec<(&str, String)> = labels
        .iter()
        .map(|raw| (raw.as_str(), normalizer.normalize(raw)))
        .collect();

    if ctx.common.json {
        let json: Vec<serde_json::Value> = rows
            .iter()
            .map(|(raw, normalized)| serde_json::json!({ "raw": raw, "normalized": normalized }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        for (raw, normalized) in rows {
            if normalized.is_empty() {
                println!("{raw:?} -> (skipped)");
            } else {
                println!("{raw:?} -> {normalized:?}");
            }
        }
    }
    Ok(())
}

fn handle_alias(ctx: &RuntimeContext, name: &str, chat: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("alias name must not be empty"));
    }
    if ctx.common.dry_run {
        log::info!(
            "dry-run: would add alias '{name}' = '{chat}' to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }
    AppConfig::add_alias(&ctx.paths.config_file, name, chat)?;
    println!("alias '{name}' -> '{chat}' saved to {}", ctx.paths.config_file.display());
    Ok(())
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }
    if ctx.common.dry_run {
        log::info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }
    write_default_config(&ctx.paths.config_file)
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ctx.config)
                        .context("serializing config to JSON")?
                );
            } else {
                println!("{:#?}", ctx.config);
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Paths => {
            let log_file = ctx.paths.log_file(&ctx.config);
            if ctx.common.json {
                let paths = serde_json::json!({
                    "config": ctx.paths.config_file,
                    "state": ctx.paths.state_dir,
                    "log": log_file,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&paths).context("serializing paths to JSON")?
                );
            } else {
                println!("config: {}", ctx.paths.config_file.display());
                println!("state:  {}", ctx.paths.state_dir.display());
                if let Some(log_file) = log_file {
                    println!("log:    {}", log_file.display());
                }
            }
            Ok(())
        }
        ConfigCommand::Schema => {
            println!("{}", generate_schema(APP_NAME, REPO_URL)?);
            Ok(())
        }
        ConfigCommand::Generate { out, check } => {
            if check {
                return check_generated_files(&out, APP_NAME, REPO_URL);
            }
            if ctx.common.dry_run {
                log::info!("dry-run: would write schema and example config to {}", out.display());
                return Ok(());
            }
            write_generated_files(&out, APP_NAME, REPO_URL)
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                log::info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn files_command_parses_flags() {
        let cli = Cli::try_parse_from([
            "tsend", "files", "Bob", "a.pdf", "b.png", "--caption", "fyi", "--no-embed",
            "--section", "Chats", "--wait-ms", "0",
        ])
        .expect("parse");
        match cli.command {
            Command::Files {
                chat,
                paths,
                caption,
                no_embed,
                send,
            } => {
                assert_eq!(chat, "Bob");
                assert_eq!(paths.len(), 2);
                assert_eq!(caption.as_deref(), Some("fyi"));
                assert!(no_embed);
                let options = send.options();
                assert_eq!(options.section.as_deref(), Some("Chats"));
                assert!(options.close_filter);
                assert_eq!(options.wait_after_send, Some(Duration::ZERO));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn plan_splits_images_from_attachments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let png = dir.path().join("shot.png");
        let txt = dir.path().join("notes.txt");
        std::fs::write(&png, b"not really a png").expect("write");
        std::fs::write(&txt, b"notes").expect("write");

        let request = SendRequest {
            chat: "Bob".to_string(),
            payload: Payload::Files {
                paths: vec![png.clone(), txt.clone()],
                files: FileOptions::default(),
            },
            options: SendOptions::default(),
        };
        let plan = request.plan(&AppConfig::default()).expect("plan");
        assert_eq!(plan.inline_images, vec![png]);
        assert_eq!(plan.attachments, vec![txt]);
        assert_eq!(plan.wait_after_send_ms, 3_000);
    }

    #[test]
    fn plan_rejects_missing_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let request = SendRequest {
            chat: "Bob".to_string(),
            payload: Payload::Message {
                message: "look".to_string(),
                image: Some(dir.path().join("missing.png")),
            },
            options: SendOptions::default(),
        };
        let err = request.plan(&AppConfig::default()).expect_err("missing image");
        assert!(err.to_string().contains("file not found"));
    }
}

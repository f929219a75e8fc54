use chrono::Utc;
use futures::StreamExt;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{ui, AiCommand, DisplayArgs};
use crate::analysis::{discover_current_repo, discover_repos, scan_repos, ScanOptions};
use crate::config::{config_path, detect_author_name, Config, LlmConfig};
use crate::error::{Error, Result};
use crate::llm::prompts::{build_briefing_prompt, build_query_prompt, build_standup_prompt};
use crate::llm::{get_provider, list_providers, ProviderKind, TextBackend};
use crate::types::{RepoStatus, WorkItem};
use crate::worklist::WorkList;

const NO_DIRECTORIES: &str = "No directories configured. Run `wip config init` to get started.";
const NO_PROVIDER: &str = "No LLM provider configured. Run `wip config init` to set one up.";
const NO_CONFIG: &str = "No config found. Run `wip config init` to create one.";

fn require_directories(config: &Config) -> Result<()> {
    if config.directories.is_empty() {
        return Err(Error::ConfigMissing(NO_DIRECTORIES.to_string()));
    }
    Ok(())
}

async fn scan(config: &Config, paths: Vec<PathBuf>) -> Vec<RepoStatus> {
    scan_repos(paths, ScanOptions::from_config(config)).await
}

/// Discover, scan and render. Zero discovered repositories is not an error.
pub async fn run_briefing(display: DisplayArgs) -> Result<()> {
    let config = Config::load()?;
    require_directories(&config)?;

    let paths = discover_repos(&config.directories, config.scan_depth);
    if paths.is_empty() && !display.json {
        println!("No git repos found in configured directories.");
        return Ok(());
    }

    let repos = scan(&config, paths).await;
    let worklist = WorkList::default();
    let items = worklist.list(false);
    let mut out = io::stdout().lock();

    if display.json {
        ui::render_json(&mut out, &repos, &items)?;
        return Ok(());
    }

    let repo_items: HashMap<String, Vec<WorkItem>> = repos
        .iter()
        .filter_map(|repo| {
            let linked = worklist.list_for_repo(Path::new(&repo.path), false);
            (!linked.is_empty()).then(|| (repo.path.clone(), linked))
        })
        .collect();

    ui::render_briefing(&mut out, &repos, display.verbose, &repo_items, Utc::now())?;
    Ok(())
}

pub fn add(description: &str, repo: Option<PathBuf>) -> Result<()> {
    let repo = repo.or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|cwd| discover_current_repo(&cwd))
    });
    let item = WorkList::default().add(description, repo.as_deref())?;

    let label = item
        .repo
        .as_deref()
        .and_then(|path| Path::new(path).file_name())
        .map(|name| format!(" ({})", name.to_string_lossy()))
        .unwrap_or_default();
    println!("Added #{}: {}{}", item.id, item.description, label);
    Ok(())
}

pub fn done(id: u64) -> Result<()> {
    let item = WorkList::default().complete(id)?;
    println!("Done #{}: {}", item.id, item.description);
    Ok(())
}

pub fn list(all: bool) -> Result<()> {
    let items = WorkList::default().list(all);
    if items.is_empty() {
        println!("{}", if all { "No items found." } else { "No items." });
        return Ok(());
    }
    ui::render_worklist(&mut io::stdout().lock(), &items, Utc::now())?;
    Ok(())
}

pub fn config_init() -> Result<()> {
    let base = Config::load().unwrap_or_else(|e| {
        warn!("ignoring unreadable config: {}", e);
        Config::default()
    });
    let cwd = std::env::current_dir()?;
    let mut input = io::stdin().lock();
    let mut out = io::stdout();

    let config = prompt_config(&mut input, &mut out, base, &cwd, &detect_author_name())?;
    config.save()?;
    writeln!(out, "\nConfig saved to {}", config_path().display())?;
    Ok(())
}

/// Ask for directories, author and an optional backend. Settings that are
/// not asked about are carried over from `base`.
pub fn prompt_config<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    base: Config,
    cwd: &Path,
    detected_author: &str,
) -> Result<Config> {
    writeln!(out, "Setting up wip configuration...\n")?;

    let default_dirs = if base.directories.is_empty() {
        cwd.display().to_string()
    } else {
        base.directories.join(", ")
    };
    let answer = ask(
        input,
        out,
        "Which directories should wip scan? (comma-separated)",
        &default_dirs,
    )?;
    let directories = answer
        .split(',')
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .map(str::to_string)
        .collect();

    let question = if detected_author.is_empty() {
        "What is your git author name?".to_string()
    } else {
        format!("What is your git author name? (detected: {})", detected_author)
    };
    let default_author = if base.author.is_empty() {
        detected_author.to_string()
    } else {
        base.author.clone()
    };
    let author = ask(input, out, &question, &default_author)?;

    writeln!(out)?;
    let llm = if confirm(input, out, "Set up an LLM provider? (enables AI features)")? {
        writeln!(out, "Available providers: {}", list_providers().join(", "))?;
        let provider: ProviderKind = ask(input, out, "Provider", ProviderKind::Anthropic.name())?.parse()?;
        let model = ask(input, out, "Model (leave empty for provider default)", "")?;
        let api_key_env = ask(input, out, "Env var for API key", provider.api_key_env())?;
        LlmConfig {
            provider: provider.name().to_string(),
            model,
            api_key_env,
        }
    } else {
        base.llm.clone()
    };

    Ok(Config {
        directories,
        author,
        llm,
        ..base
    })
}

/// One line of input; blank or end of input takes `default`.
fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str, default: &str) -> io::Result<String> {
    if default.is_empty() {
        write!(out, "{}: ", question)?;
    } else {
        write!(out, "{} [{}]: ", question, default)?;
    }
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> io::Result<bool> {
    let answer = ask(input, out, &format!("{} [y/N]", question), "")?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

pub fn config_show() -> Result<()> {
    let path = config_path();
    if !path.exists() {
        return Err(Error::ConfigMissing(NO_CONFIG.to_string()));
    }
    let config = Config::load_from(&path)?;

    let mut out = io::stdout().lock();
    writeln!(out, "Config: {}\n", path.display())?;
    write!(out, "{}", toml::to_string(&config)?)?;
    Ok(())
}

/// Scan, assemble the prompt and stream the backend's answer to stdout.
pub async fn ai(command: AiCommand, api_key: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    if config.llm.is_unset() {
        return Err(Error::ConfigMissing(NO_PROVIDER.to_string()));
    }
    let backend = get_provider(
        &config.llm.provider,
        api_key,
        &config.llm.model,
        Some(config.llm.api_key_env.as_str()),
    )?;
    require_directories(&config)?;

    let paths = discover_repos(&config.directories, config.scan_depth);
    let repos = scan(&config, paths).await;
    let items = WorkList::default().list(false);

    let (system, user) = match command {
        AiCommand::Briefing => build_briefing_prompt(&repos, &items),
        AiCommand::Standup => build_standup_prompt(&repos, &items),
        AiCommand::Ask { query } => build_query_prompt(&query, &repos, &items),
    };
    debug!(
        provider = %backend.kind(),
        model = backend.model(),
        "sending {} byte prompt",
        user.len()
    );

    stream_to_stdout(backend.as_ref(), system, &user).await
}

/// Print each fragment as soon as it arrives.
async fn stream_to_stdout(backend: &dyn TextBackend, system: &str, user: &str) -> Result<()> {
    let mut fragments = backend.respond_streaming(system, user).await?;
    let mut stdout = io::stdout();
    while let Some(fragment) = fragments.next().await {
        stdout.write_all(fragment?.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

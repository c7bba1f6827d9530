use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::parse_deadline;
use crate::present::Renderer;
use crate::refresh::Ticker;
use crate::reorder::DragController;
use crate::store::{TaskStore, ValidationError};
use crate::theme::{self, Theme};
use crate::view::FilterState;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "done", "delete", "move", "list", "info", "clear", "theme", "watch", "config",
        "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Every user gesture, reduced to one discrete command. The dispatcher
/// consumes these one at a time on the calling thread; nothing mutates the
/// store except through dispatch.
#[derive(Debug, Clone)]
pub enum Command {
    Add {
        text: String,
        category: String,
        priority: String,
        deadline: Option<DateTime<Utc>>,
    },
    Toggle {
        id: String,
    },
    Delete {
        id: String,
    },
    Move {
        source: String,
        target: String,
    },
    List {
        filter: FilterState,
    },
    Info {
        id: String,
    },
    Clear,
    Theme {
        value: Option<Theme>,
    },
    Watch {
        filter: FilterState,
    },
    Show,
    Help,
    Version,
}

/// Asked before anything irreversible runs. The CLI wires stdin in; tests
/// substitute a canned answer.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool>;
}

pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool> {
        let mut out = io::stdout().lock();
        write!(out, "{prompt} ")?;
        out.flush()?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("failed reading confirmation answer")?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}

#[instrument(skip(cfg, inv, now))]
pub fn parse_command(cfg: &Config, inv: &Invocation, now: DateTime<Utc>) -> anyhow::Result<Command> {
    match inv.command.as_str() {
        "add" => parse_add(cfg, &inv.args, now),
        "done" => Ok(Command::Toggle {
            id: single_id_arg("done", &inv.args)?,
        }),
        "delete" => Ok(Command::Delete {
            id: single_id_arg("delete", &inv.args)?,
        }),
        "move" => {
            let [source, target] = inv.args.as_slice() else {
                return Err(anyhow!("move takes exactly two ids: move <task> <before>"));
            };
            Ok(Command::Move {
                source: source.clone(),
                target: target.clone(),
            })
        }
        "list" => Ok(Command::List {
            filter: FilterState::parse(&inv.args)?,
        }),
        "info" => Ok(Command::Info {
            id: single_id_arg("info", &inv.args)?,
        }),
        "clear" => Ok(Command::Clear),
        "theme" => {
            let value = match inv.args.as_slice() {
                [] => None,
                [raw] => Some(
                    Theme::parse(raw)
                        .ok_or_else(|| anyhow!("unknown theme '{raw}' (expected light or dark)"))?,
                ),
                _ => return Err(anyhow!("theme takes at most one value")),
            };
            Ok(Command::Theme { value })
        }
        "watch" => Ok(Command::Watch {
            filter: FilterState::parse(&inv.args)?,
        }),
        "config" => Ok(Command::Show),
        "help" => Ok(Command::Help),
        "version" => Ok(Command::Version),
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn parse_add(cfg: &Config, args: &[String], now: DateTime<Utc>) -> anyhow::Result<Command> {
    let categories = cfg.categories();
    let mut category: Option<String> = None;
    let mut priority = "normal".to_string();
    let mut deadline: Option<DateTime<Utc>> = None;
    let mut text_terms: Vec<&str> = Vec::new();

    for arg in args {
        if let Some(value) = arg.strip_prefix("category:") {
            if !categories.iter().any(|c| c == value) {
                return Err(anyhow!(
                    "unknown category '{}' (configured: {})",
                    value,
                    categories.join(", ")
                ));
            }
            category = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("priority:") {
            priority = value.to_string();
        } else if let Some(value) = arg.strip_prefix("deadline:") {
            deadline = Some(
                parse_deadline(value, now)
                    .with_context(|| format!("invalid deadline '{value}'"))?,
            );
        } else {
            text_terms.push(arg);
        }
    }

    let category = category
        .or_else(|| categories.first().cloned())
        .ok_or_else(|| anyhow!("no categories configured"))?;

    Ok(Command::Add {
        text: text_terms.join(" "),
        category,
        priority,
        deadline,
    })
}

fn single_id_arg(command: &str, args: &[String]) -> anyhow::Result<String> {
    let [id] = args else {
        return Err(anyhow!("{command} takes exactly one task id"));
    };
    Ok(id.clone())
}

#[instrument(skip(store, cfg, renderer, confirm, command, now))]
pub fn dispatch(
    store: &mut TaskStore,
    cfg: &Config,
    renderer: &mut Renderer,
    confirm: &mut dyn Confirm,
    command: Command,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Add {
            text,
            category,
            priority,
            deadline,
        } => cmd_add(store, &text, &category, &priority, deadline, now),
        Command::Toggle { id } => cmd_toggle(store, &id),
        Command::Delete { id } => cmd_delete(store, &id),
        Command::Move { source, target } => cmd_move(store, &source, &target),
        Command::List { filter } => cmd_list(store, renderer, &filter, now),
        Command::Info { id } => cmd_info(store, renderer, &id),
        Command::Clear => cmd_clear(store, confirm),
        Command::Theme { value } => cmd_theme(store, value),
        Command::Watch { filter } => cmd_watch(store, cfg, renderer, &filter),
        Command::Show => cmd_show(cfg),
        Command::Help => cmd_help(),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[instrument(skip(store, text, category, priority, deadline, now))]
fn cmd_add(
    store: &mut TaskStore,
    text: &str,
    category: &str,
    priority: &str,
    deadline: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    match store.add(text, category, priority, deadline, now) {
        Ok(task) => {
            println!("Created task {}.", short_id(&task.id.to_string()));
            Ok(())
        }
        Err(err) if err.downcast_ref::<ValidationError>().is_some() => {
            // Recoverable: report and leave the store untouched.
            warn!(error = %err, "rejected add");
            println!("{err}");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[instrument(skip(store, id_token))]
fn cmd_toggle(store: &mut TaskStore, id_token: &str) -> anyhow::Result<()> {
    info!("command done");

    let id = store.resolve_id(id_token)?;
    if store.toggle_done(id)? {
        let state = store
            .get(id)
            .map(|t| if t.done { "done" } else { "open" })
            .unwrap_or("gone");
        println!("Task {} is now {}.", short_id(&id.to_string()), state);
    }
    Ok(())
}

#[instrument(skip(store, id_token))]
fn cmd_delete(store: &mut TaskStore, id_token: &str) -> anyhow::Result<()> {
    info!("command delete");

    let id = store.resolve_id(id_token)?;
    if store.delete(id)? {
        println!("Deleted task {}.", short_id(&id.to_string()));
    }
    Ok(())
}

/// A CLI move walks the same gesture state machine a pointer-driven front end
/// would, so there is exactly one reorder code path.
#[instrument(skip(store, source_token, target_token))]
fn cmd_move(store: &mut TaskStore, source_token: &str, target_token: &str) -> anyhow::Result<()> {
    info!("command move");

    let source = store.resolve_id(source_token)?;
    let target = store.resolve_id(target_token)?;

    let mut drag = DragController::new();
    drag.gesture_start(source);
    drag.gesture_over(target);
    let Some(reorder) = drag.drop_on(target) else {
        debug!("gesture produced no reorder");
        return Ok(());
    };

    if store.move_before(reorder.source, reorder.target)? {
        println!(
            "Moved task {} before {}.",
            short_id(&reorder.source.to_string()),
            short_id(&reorder.target.to_string())
        );
    }
    Ok(())
}

#[instrument(skip(store, renderer, filter, now))]
fn cmd_list(
    store: &TaskStore,
    renderer: &mut Renderer,
    filter: &FilterState,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    let visible = filter.visible(store.tasks());
    renderer.print_task_list(&visible, store.tasks(), now)
}

#[instrument(skip(store, renderer, id_token))]
fn cmd_info(store: &TaskStore, renderer: &mut Renderer, id_token: &str) -> anyhow::Result<()> {
    info!("command info");

    let id = store.resolve_id(id_token)?;
    match store.get(id) {
        Some(task) => renderer.print_task_info(task),
        None => Ok(()),
    }
}

#[instrument(skip(store, confirm))]
fn cmd_clear(store: &mut TaskStore, confirm: &mut dyn Confirm) -> anyhow::Result<()> {
    info!("command clear");

    if !confirm.confirm("Delete all tasks? (y/N)")? {
        info!("clear declined");
        println!("Nothing deleted.");
        return Ok(());
    }

    store.clear_all()?;
    println!("All tasks deleted.");
    Ok(())
}

#[instrument(skip(store, value))]
fn cmd_theme(store: &TaskStore, value: Option<Theme>) -> anyhow::Result<()> {
    info!("command theme");

    match value {
        None => {
            println!("{}", theme::load(&store.data_dir));
            Ok(())
        }
        Some(theme) => {
            theme::save(&store.data_dir, theme)?;
            println!("Theme set to {theme}.");
            Ok(())
        }
    }
}

#[instrument(skip(store, cfg, renderer, filter))]
fn cmd_watch(
    store: &TaskStore,
    cfg: &Config,
    renderer: &mut Renderer,
    filter: &FilterState,
) -> anyhow::Result<()> {
    info!("command watch");

    let interval = cfg.refresh_interval()?;
    let (ticker, _stop) = Ticker::new(interval);

    cmd_list(store, renderer, filter, Utc::now())?;
    ticker.run(|| {
        // State is unchanged; only the clock moved under the deadline flags.
        cmd_list(store, renderer, filter, Utc::now())
    })
}

#[instrument(skip(cfg))]
fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let sorted: BTreeMap<String, String> = cfg
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for (key, value) in sorted {
        println!("{key}={value}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "\
usage: tally [flags] <command> [args]

commands:
  add <text> [category:C] [priority:low|normal|high] [deadline:EXPR]
  done <id>            toggle a task between open and done
  delete <id>          remove a task
  move <id> <before>   place a task immediately before another
  list [status:all|active|done] [category:C] [search terms]
  info <id>            show one task in full
  clear                delete every task (asks first)
  theme [light|dark]   show or set the stored theme
  watch [filters]      re-render periodically as deadlines age
  config               print effective configuration
  help, version

ids may be abbreviated to any unique prefix.
deadline expressions: now, today, tomorrow, YYYY-MM-DD[THH:MM], +Nd/+Nh/+Nm"
    );
    Ok(())
}

fn short_id(full: &str) -> String {
    full.chars().take(8).collect()
}

use crate::{
    app::{MoveDirection, PackageStatus, Session},
    backup::RestoredFile,
};
use anyhow::{bail, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct GlobalOptions {
    format: OutputFormat,
    verbose: bool,
    yes: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    ModsList(ModsListOptions),
    Order,
    Activate(Vec<String>),
    Deactivate(Vec<String>),
    Move { id: String, direction: MoveDirection },
    Save,
    Install(Vec<PathBuf>),
    Delete(Vec<String>),
    Restore,
    Launch,
    Paths,
    SetGameRoot(PathBuf),
    SetScript(PathBuf),
    SetStandardList(PathBuf),
    Help,
    Version,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ModsListOptions {
    filter: Option<String>,
    active_only: bool,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, tokens) = parse_global_options(&args)?;
    let command = parse_command(&tokens)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("Packsmith v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        command => {
            let mut session = Session::initialize()?;
            session.set_echo_logs(global.verbose);
            run_command(&mut session, command, &global)
        }
    }
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut format = OutputFormat::Text;
    let mut verbose = false;
    let mut yes = false;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            format = parse_format(value)?;
            continue;
        }
        match arg.as_str() {
            "--format" => {
                let Some(value) = iter.next() else {
                    bail!("--format requires a value (text or json)");
                };
                format = parse_format(value)?;
            }
            "-v" | "--verbose" => verbose = true,
            "-y" | "--yes" => yes = true,
            _ => tokens.push(arg.to_string()),
        }
    }

    Ok((
        GlobalOptions {
            format,
            verbose,
            yes,
        },
        tokens,
    ))
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    match OutputFormat::parse(value) {
        Some(format) => Ok(format),
        None => bail!("Unknown format: {value} (use 'text' or 'json')"),
    }
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::ModsList(ModsListOptions::default()));
    };
    let rest = tokens.get(1..).unwrap_or(&[]);
    let command = match head.as_str() {
        "--help" | "-h" | "help" => CliCommand::Help,
        "--version" | "-V" | "version" => CliCommand::Version,
        "mods" => CliCommand::ModsList(parse_mods_list(rest)?),
        "order" => CliCommand::Order,
        "activate" => CliCommand::Activate(require_values(rest, "activate")?),
        "deactivate" => CliCommand::Deactivate(require_values(rest, "deactivate")?),
        "move" => {
            let [id, direction] = rest else {
                bail!("move requires <id> <up|down>");
            };
            let direction = match direction.as_str() {
                "up" => MoveDirection::Up,
                "down" => MoveDirection::Down,
                other => bail!("Unknown direction: {other} (use 'up' or 'down')"),
            };
            CliCommand::Move {
                id: id.to_string(),
                direction,
            }
        }
        "save" => CliCommand::Save,
        "install" => CliCommand::Install(
            require_values(rest, "install")?
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        ),
        "delete" => CliCommand::Delete(require_values(rest, "delete")?),
        "restore" => CliCommand::Restore,
        "launch" => CliCommand::Launch,
        "paths" => CliCommand::Paths,
        "config" => parse_config(rest)?,
        other => bail!("Unknown command: {other} (see --help)"),
    };
    Ok(command)
}

fn parse_config(args: &[String]) -> Result<CliCommand> {
    let [key, value] = args else {
        bail!("config requires <key> <value>");
    };
    let value = PathBuf::from(value);
    match key.as_str() {
        "set-game-root" => Ok(CliCommand::SetGameRoot(value)),
        "set-script" => Ok(CliCommand::SetScript(value)),
        "set-standard-list" => Ok(CliCommand::SetStandardList(value)),
        _ => bail!("Unknown config key: {key}"),
    }
}

fn require_values(args: &[String], command: &str) -> Result<Vec<String>> {
    if args.is_empty() {
        bail!("{command} requires one or more values");
    }
    Ok(args.to_vec())
}

fn parse_mods_list(args: &[String]) -> Result<ModsListOptions> {
    let mut options = ModsListOptions::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "list" => {}
            "--active" => options.active_only = true,
            "--filter" => {
                let Some(value) = iter.next() else {
                    bail!("--filter requires a value");
                };
                options.filter = Some(value.to_string());
            }
            value if value.starts_with("--filter=") => {
                options.filter = Some(value.trim_start_matches("--filter=").to_string());
            }
            other => bail!("Unknown mods option: {other}"),
        }
    }
    Ok(options)
}

fn run_command(session: &mut Session, command: CliCommand, global: &GlobalOptions) -> Result<()> {
    let format = global.format;
    match command {
        CliCommand::ModsList(options) => list_mods(session, &options, format),
        CliCommand::Order => list_order(session, format),
        CliCommand::Activate(ids) => {
            for id in ids {
                if session.activate(&id)? {
                    println!("Activated {id}");
                } else {
                    println!("{id} already active");
                }
            }
            Ok(())
        }
        CliCommand::Deactivate(ids) => {
            for id in ids {
                if session.deactivate(&id)? {
                    println!("Deactivated {id}");
                } else {
                    println!("{id} was not active");
                }
            }
            Ok(())
        }
        CliCommand::Move { id, direction } => {
            if session.move_package(&id, direction)? {
                list_order(session, format)
            } else {
                println!("{id} is already at the edge of the order");
                Ok(())
            }
        }
        CliCommand::Save => {
            let report = session.save()?;
            print_value(format, &report, || {
                println!(
                    "Saved {} active mod(s) to {}",
                    report.active,
                    report.script_path.display()
                );
            })
        }
        CliCommand::Install(paths) => {
            let reports = session.install(&paths)?;
            let items: Vec<InstallItem> = reports
                .into_iter()
                .map(|(source, report)| InstallItem {
                    source: source.display().to_string(),
                    installed: report.installed,
                    skipped: report.skipped,
                    unrecognized: report.unrecognized,
                })
                .collect();
            print_value(format, &items, || {
                for item in &items {
                    if item.unrecognized {
                        println!("{}: not a .pack, .zip or .7z file", item.source);
                    } else if item.installed.is_empty() {
                        println!("{}: nothing installed", item.source);
                    } else {
                        println!("{}: installed {}", item.source, item.installed.join(", "));
                    }
                    if !item.skipped.is_empty() {
                        println!("  already present: {}", item.skipped.join(", "));
                    }
                }
            })
        }
        CliCommand::Delete(ids) => {
            if session.app_config.confirm_mod_delete && !global.yes {
                bail!("delete removes files from the game folder; pass --yes to confirm");
            }
            for id in ids {
                let report = session.delete(&id)?;
                if report.removed.is_empty() {
                    println!("{id}: nothing to remove");
                } else {
                    println!("Removed {}", report.removed.join(", "));
                }
            }
            Ok(())
        }
        CliCommand::Restore => {
            let restored = session.restore_last_backup()?;
            println!(
                "Restored backup (script: {}, order: {})",
                restored_label(restored.script),
                restored_label(restored.order)
            );
            Ok(())
        }
        CliCommand::Launch => {
            session.launch()?;
            println!("Game started");
            Ok(())
        }
        CliCommand::Paths => list_paths(session, format),
        CliCommand::SetGameRoot(path) => {
            session.set_game_root(path)?;
            list_paths(session, format)
        }
        CliCommand::SetScript(path) => {
            session.set_script_path(path)?;
            list_paths(session, format)
        }
        CliCommand::SetStandardList(path) => {
            session.set_standard_list(path)?;
            println!("Standard packs: {}", session.registry.len());
            Ok(())
        }
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

#[derive(Serialize)]
struct InstallItem {
    source: String,
    installed: Vec<String>,
    skipped: Vec<String>,
    unrecognized: bool,
}

fn list_mods(session: &Session, options: &ModsListOptions, format: OutputFormat) -> Result<()> {
    let filter = options.filter.as_deref().map(str::to_lowercase);
    let items: Vec<PackageStatus> = session
        .statuses()
        .into_iter()
        .filter(|item| !options.active_only || item.active)
        .filter(|item| match &filter {
            Some(filter) => item.id.to_lowercase().contains(filter.as_str()),
            None => true,
        })
        .collect();

    print_value(format, &items, || {
        if items.is_empty() {
            println!("No mods found");
        }
        for item in &items {
            let marker = if item.active { "[x]" } else { "[ ]" };
            let position = item
                .position
                .map(|value| format!("{value:>3}"))
                .unwrap_or_else(|| "  -".to_string());
            println!("{marker} {position}  {}", item.id);
        }
    })
}

fn list_order(session: &Session, format: OutputFormat) -> Result<()> {
    print_value(format, &session.order, || {
        for (index, id) in session.order.ids().iter().enumerate() {
            println!("{:>3}. {id}", index + 1);
        }
    })
}

#[derive(Serialize)]
struct PathsOutput {
    game_root: Option<String>,
    content_dir: Option<String>,
    script_path: Option<String>,
    executable: Option<String>,
    data_dir: String,
    store_path: String,
    standard_list: String,
}

fn list_paths(session: &Session, format: OutputFormat) -> Result<()> {
    let paths = session.paths.as_ref();
    let output = PathsOutput {
        game_root: paths.map(|paths| path_string(&paths.game_root)),
        content_dir: paths.map(|paths| path_string(&paths.content_dir)),
        script_path: paths.map(|paths| path_string(&paths.script_path)),
        executable: paths.map(|paths| path_string(&paths.executable)),
        data_dir: path_string(session.data_dir()),
        store_path: path_string(session.store_path()),
        standard_list: path_string(&session.config.standard_list_path()),
    };

    print_value(format, &output, || {
        let unset = || "(not set)".to_string();
        println!("Game root: {}", output.game_root.clone().unwrap_or_else(unset));
        println!("Content dir: {}", output.content_dir.clone().unwrap_or_else(unset));
        println!("Script: {}", output.script_path.clone().unwrap_or_else(unset));
        println!("Executable: {}", output.executable.clone().unwrap_or_else(unset));
        println!("Data dir: {}", output.data_dir);
        println!("Active order: {}", output.store_path);
        println!("Standard list: {}", output.standard_list);
    })
}

fn print_value<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce()) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(),
    }
    Ok(())
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}

fn restored_label(file: RestoredFile) -> &'static str {
    match file {
        RestoredFile::Written => "restored",
        RestoredFile::Removed => "removed",
        RestoredFile::Absent => "absent",
    }
}

fn print_help() {
    println!("Packsmith v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  packsmith [mods list]             List installed mods");
    println!("      --active                      Only active mods");
    println!("      --filter <text>               Name contains text");
    println!("  packsmith order                   Show the active order");
    println!("  packsmith activate <id>...        Append mods to the active order");
    println!("  packsmith deactivate <id>...      Remove mods from the active order");
    println!("  packsmith move <id> <up|down>     Move a mod within the active order");
    println!("  packsmith save                    Write the active order to user.script.txt");
    println!("  packsmith install <path>...       Install .pack files or .zip/.7z bundles");
    println!("  packsmith delete <id>...          Delete mods from the data folder");
    println!("  packsmith restore                 Restore the last backup");
    println!("  packsmith launch                  Start the game");
    println!("  packsmith paths                   Show resolved paths");
    println!("  packsmith config set-game-root <dir>");
    println!("  packsmith config set-script <file>");
    println!("  packsmith config set-standard-list <file>");
    println!();
    println!("Global options:");
    println!("  --format <json|text>              Output format");
    println!("  -y, --yes                         Confirm destructive commands");
    println!("  -v, --verbose                     Echo log entries to stderr");
    println!("  -h, --help                        Show help");
    println!("  -V, --version                     Show version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn global_options_are_stripped() {
        let (global, tokens) =
            parse_global_options(&args(&["--format", "json", "mods", "-v", "--active"])).unwrap();
        assert_eq!(global.format, OutputFormat::Json);
        assert!(global.verbose);
        assert!(!global.yes);
        assert_eq!(tokens, args(&["mods", "--active"]));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(parse_global_options(&args(&["--format", "xml", "mods"])).is_err());
        assert!(parse_global_options(&args(&["--format=yaml"])).is_err());
        assert!(parse_global_options(&args(&["--format"])).is_err());
        let (global, tokens) = parse_global_options(&args(&["--format=text", "order"])).unwrap();
        assert_eq!(global.format, OutputFormat::Text);
        assert_eq!(tokens, args(&["order"]));
    }

    #[test]
    fn no_arguments_lists_mods() {
        assert_eq!(
            parse_command(&[]).unwrap(),
            CliCommand::ModsList(ModsListOptions::default())
        );
    }

    #[test]
    fn parses_move_and_config() {
        assert_eq!(
            parse_command(&args(&["move", "a.pack", "down"])).unwrap(),
            CliCommand::Move {
                id: "a.pack".to_string(),
                direction: MoveDirection::Down,
            }
        );
        assert_eq!(
            parse_command(&args(&["config", "set-game-root", "/games/wh2"])).unwrap(),
            CliCommand::SetGameRoot(PathBuf::from("/games/wh2"))
        );
        assert!(parse_command(&args(&["move", "a.pack", "left"])).is_err());
    }

    #[test]
    fn value_commands_need_values() {
        assert!(parse_command(&args(&["activate"])).is_err());
        assert_eq!(
            parse_command(&args(&["install", "a.pack", "b.zip"])).unwrap(),
            CliCommand::Install(vec![PathBuf::from("a.pack"), PathBuf::from("b.zip")])
        );
    }

    #[test]
    fn mods_filter_forms() {
        let options = parse_mods_list(&args(&["list", "--filter=abc"])).unwrap();
        assert_eq!(options.filter.as_deref(), Some("abc"));
        assert!(parse_mods_list(&args(&["--filter"])).is_err());
    }
}

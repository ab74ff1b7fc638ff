mod init;
pub use init::cmd_init;

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::host::PathHost;
use crate::io::lock::{DataLock, LockMode};
use crate::io::poller::Session;
use crate::io::recovery;
use crate::model::config::Config;
use crate::model::item::{DraftKind, ItemDraft, ItemPatch};
use crate::ops::{check, search, tree};
use crate::store::Store;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Resolved data directory and config for one invocation
pub struct Context {
    pub data_dir: PathBuf,
    pub config: Config,
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(command: Commands, ctx: &Context) -> CmdResult {
    match command {
        // Init is handled in main.rs before the config is read
        Commands::Init(args) => cmd_init(args, &ctx.data_dir),

        // Read commands
        Commands::List(args) => cmd_list(args, ctx),
        Commands::Show(args) => cmd_show(args, ctx),
        Commands::Export(args) => cmd_export(args, ctx),
        Commands::Status => cmd_status(ctx),
        Commands::Check => cmd_check(ctx),
        Commands::Search(args) => cmd_search(args, ctx),
        Commands::Folders(args) => cmd_folders(args, ctx),

        // Write commands
        Commands::Add(args) => cmd_add(args, ctx),
        Commands::Edit(args) => cmd_edit(args, ctx),
        Commands::Mv(args) => cmd_mv(args, ctx),
        Commands::Rm(args) => cmd_rm(args, ctx),
        Commands::Toggle(args) => cmd_toggle(args, ctx),
        Commands::Import(args) => cmd_import(args, ctx),
        Commands::Attach(args) => cmd_attach(args, ctx),

        // Long-running / maintenance
        Commands::Watch(args) => cmd_watch(args, ctx),
        Commands::Recovery(args) => cmd_recovery(args, ctx),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_store(ctx: &Context) -> Store {
    let host = PathHost::new(&ctx.data_dir, true);
    Store::open(&ctx.data_dir, &ctx.config, Box::new(host))
}

/// Take the data directory lock: exclusive for a read-modify-write, shared
/// for commands that only read (opening can still refresh the cache).
fn lock_data_dir(ctx: &Context, mode: LockMode) -> Result<DataLock, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&ctx.data_dir)
        .map_err(|e| format!("cannot create {}: {}", ctx.data_dir.display(), e))?;
    let lock = match mode {
        LockMode::Shared => DataLock::shared(&ctx.data_dir)?,
        LockMode::Exclusive => DataLock::exclusive(&ctx.data_dir)?,
    };
    Ok(lock)
}

/// Print pending storage notices as warnings on stderr
fn report_notices(store: &mut Store) {
    for notice in store.take_notices() {
        eprintln!("warning: {}", notice.message);
    }
}

/// "-" means stdin, minus the final line ending; anything else is taken
/// literally
fn text_arg(value: String) -> Result<String, std::io::Error> {
    if value == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        return Ok(buf);
    }
    Ok(value)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid timestamp '{}' (expected ISO-8601)", s))
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, ctx: &Context) -> CmdResult {
    let _lock = lock_data_dir(ctx, LockMode::Shared)?;
    let mut store = open_store(ctx);
    report_notices(&mut store);
    let items = store.items();

    if let Some(ref folder_id) = args.folder {
        match tree::find(items, folder_id) {
            Some(f) if f.is_folder() => {}
            Some(_) => return Err(format!("{} is not a folder", folder_id).into()),
            None => return Err(format!("item not found: {}", folder_id).into()),
        }
    }
    let parent = args.folder.as_deref();

    if ctx.json {
        return print_json(&tree_to_json(items, parent));
    }
    let lines = format_tree(items, parent, args.all);
    if lines.is_empty() {
        println!("(empty)");
    }
    for line in lines {
        println!("{}", line);
    }
    if store.needs_file() {
        eprintln!("hint: no data file attached; run `sc attach <path>` to keep one in sync");
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, ctx: &Context) -> CmdResult {
    let _lock = lock_data_dir(ctx, LockMode::Shared)?;
    let mut store = open_store(ctx);
    report_notices(&mut store);
    let item = store
        .get(&args.id)
        .ok_or_else(|| format!("item not found: {}", args.id))?;

    if ctx.json {
        return print_json(item);
    }
    for line in format_item_detail(item, store.items()) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_export(args: ExportArgs, ctx: &Context) -> CmdResult {
    let _lock = lock_data_dir(ctx, LockMode::Shared)?;
    let mut store = open_store(ctx);
    report_notices(&mut store);
    let json = store.export_json()?;
    match args.out {
        Some(path) => {
            std::fs::write(&path, format!("{}\n", json))
                .map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
            eprintln!("exported {} item(s) to {}", store.items().len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_status(ctx: &Context) -> CmdResult {
    let _lock = lock_data_dir(ctx, LockMode::Shared)?;
    let mut store = open_store(ctx);
    report_notices(&mut store);

    let status = StatusJson {
        data_dir: ctx.data_dir.display().to_string(),
        cache: store.cache_path().display().to_string(),
        items: store.items().len(),
        attached: store.is_attached(),
        file: store.file_location().map(|p| p.display().to_string()),
        file_modified: store.last_modified().map(system_time_to_string),
        needs_file: store.needs_file(),
        poll_interval_ms: store.config().file.poll_interval_ms,
    };
    if ctx.json {
        return print_json(&status);
    }

    println!("data dir: {}", status.data_dir);
    println!("cache:    {}", status.cache);
    match &status.file {
        Some(file) => {
            println!("file:     {}", file);
            if let Some(ref modified) = status.file_modified {
                println!("modified: {}", modified);
            }
        }
        None if status.needs_file => println!("file:     none (run `sc attach <path>`)"),
        None => println!("file:     disabled"),
    }
    println!("items:    {}", status.items);
    if let Some(summary) = recovery::recovery_summary(&ctx.data_dir) {
        println!(
            "recovery: {} entr{} (see `sc recovery`)",
            summary.entry_count,
            if summary.entry_count == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}

fn cmd_check(ctx: &Context) -> CmdResult {
    let _lock = lock_data_dir(ctx, LockMode::Shared)?;
    let mut store = open_store(ctx);
    report_notices(&mut store);
    let result = check::check_items(store.items());

    if ctx.json {
        return print_json(&result);
    }
    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            match err {
                check::CheckError::DuplicateId { item_id, count } => {
                    println!("  {} is used by {} items", item_id, count);
                }
                check::CheckError::FolderLoop { folder_id, title } => {
                    println!("  folder \"{}\" ({}) is inside itself", title, folder_id);
                }
            }
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            println!();
        }
        println!("Warnings:");
        for warn in &result.warnings {
            match warn {
                check::CheckWarning::DanglingParent { item_id, parent_id } => {
                    println!("  {} has missing parent {} (shown at root)", item_id, parent_id);
                }
                check::CheckWarning::ParentNotFolder { item_id, parent_id } => {
                    println!(
                        "  {} has parent {} which is not a folder (shown at root)",
                        item_id, parent_id
                    );
                }
                check::CheckWarning::EmptyField { item_id, field } => {
                    println!("  {} has an empty {}", item_id, field);
                }
            }
        }
    }
    if result.valid {
        println!("✓ collection is valid");
    } else {
        println!("✗ collection has errors");
    }
    Ok(())
}

fn cmd_search(args: SearchArgs, ctx: &Context) -> CmdResult {
    let _lock = lock_data_dir(ctx, LockMode::Shared)?;
    let mut store = open_store(ctx);
    report_notices(&mut store);
    let re = search::build_matcher(&args.pattern)?;
    let hits = search::search_items(store.items(), &re);

    if ctx.json {
        let json: Vec<SearchHitJson> = hits
            .iter()
            .filter_map(|hit| {
                store.get(&hit.item_id).map(|item| SearchHitJson {
                    id: item.id.clone(),
                    title: item.title.clone(),
                    field: serde_json::to_value(hit.field)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default(),
                })
            })
            .collect();
        return print_json(&json);
    }

    // One line per item, even when several fields match
    let mut seen = HashSet::new();
    for hit in &hits {
        if seen.insert(hit.item_id.as_str())
            && let Some(item) = store.get(&hit.item_id)
        {
            println!("{}", format_item_line(item));
        }
    }
    Ok(())
}

fn cmd_folders(args: FoldersArgs, ctx: &Context) -> CmdResult {
    let _lock = lock_data_dir(ctx, LockMode::Shared)?;
    let mut store = open_store(ctx);
    report_notices(&mut store);
    let options = tree::folder_options(store.items(), args.exclude.as_deref());

    if ctx.json {
        return print_json(&options);
    }
    for option in options {
        match option.value {
            Some(id) => println!("{}  {}", option.label, id),
            None => println!("{}", option.label),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add(args: AddCmd, ctx: &Context) -> CmdResult {
    let draft = match args.kind {
        AddKind::Link(a) => ItemDraft {
            title: a.title,
            parent_id: a.parent,
            kind: DraftKind::Link { url: a.url },
        },
        AddKind::Snippet(a) => ItemDraft {
            title: a.title,
            parent_id: a.parent,
            kind: DraftKind::Snippet {
                content: text_arg(a.content)?,
                url: a.url,
            },
        },
        AddKind::Folder(a) => ItemDraft {
            title: a.title,
            parent_id: a.parent,
            kind: DraftKind::Folder {
                is_open: Some(!a.closed),
            },
        },
    };

    let _lock = lock_data_dir(ctx, LockMode::Exclusive)?;
    let mut store = open_store(ctx);
    if let Some(ref parent) = draft.parent_id {
        check_parent(&store, parent)?;
    }
    let item = store.add_item(draft)?;
    report_notices(&mut store);

    if ctx.json {
        return print_json(&item);
    }
    println!("{}", format_item_line(&item));
    Ok(())
}

/// The CLI only offers existing folders as parents
fn check_parent(store: &Store, parent: &str) -> CmdResult {
    match store.get(parent) {
        Some(p) if p.is_folder() => Ok(()),
        Some(_) => Err(format!("{} is not a folder", parent).into()),
        None => Err(format!("folder not found: {}", parent).into()),
    }
}

fn cmd_edit(args: EditArgs, ctx: &Context) -> CmdResult {
    let patch = ItemPatch {
        title: args.title,
        url: if args.clear_url {
            Some(String::new())
        } else {
            args.url
        },
        content: args.content.map(text_arg).transpose()?,
        ..Default::default()
    };
    if patch.is_empty() {
        return Err("nothing to change (use --title, --url, --content or --clear-url)".into());
    }

    let _lock = lock_data_dir(ctx, LockMode::Exclusive)?;
    let mut store = open_store(ctx);
    let item = store.update_item(&args.id, patch)?;
    report_notices(&mut store);

    if ctx.json {
        return print_json(&item);
    }
    println!("{}", format_item_line(&item));
    Ok(())
}

fn cmd_mv(args: MvArgs, ctx: &Context) -> CmdResult {
    let parent = if args.root { None } else { args.parent };

    let _lock = lock_data_dir(ctx, LockMode::Exclusive)?;
    let mut store = open_store(ctx);
    if let Some(ref p) = parent {
        check_parent(&store, p)?;
    }
    let patch = ItemPatch {
        parent_id: Some(parent),
        ..Default::default()
    };
    let item = store.update_item(&args.id, patch)?;
    report_notices(&mut store);

    if ctx.json {
        return print_json(&item);
    }
    let destination = item
        .parent_id
        .as_deref()
        .and_then(|p| store.get(p))
        .map(|p| p.title.clone())
        .unwrap_or_else(|| "Root".to_string());
    println!("{} -> {}", format_item_line(&item), destination);
    Ok(())
}

fn cmd_rm(args: RmArgs, ctx: &Context) -> CmdResult {
    let _lock = lock_data_dir(ctx, LockMode::Exclusive)?;
    let mut store = open_store(ctx);
    let removed = store.delete_item(&args.id);
    report_notices(&mut store);

    if removed.is_empty() {
        return Err(format!("item not found: {}", args.id).into());
    }
    if ctx.json {
        return print_json(&DeleteJson {
            removed: removed.into_iter().map(|i| i.id).collect(),
        });
    }
    println!(
        "deleted {} item(s); see `sc recovery` to restore",
        removed.len()
    );
    Ok(())
}

fn cmd_toggle(args: ToggleArgs, ctx: &Context) -> CmdResult {
    let _lock = lock_data_dir(ctx, LockMode::Exclusive)?;
    let mut store = open_store(ctx);
    let is_open = store
        .toggle_folder(&args.id)
        .ok_or_else(|| format!("folder not found: {}", args.id))?;
    report_notices(&mut store);

    if ctx.json {
        return print_json(&serde_json::json!({ "id": args.id, "isOpen": is_open }));
    }
    println!("{} {}", args.id, if is_open { "opened" } else { "closed" });
    Ok(())
}

fn cmd_import(args: ImportArgs, ctx: &Context) -> CmdResult {
    let text = match args.file {
        Some(ref path) if path != Path::new("-") => std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?,
        _ => text_arg("-".to_string())?,
    };

    let _lock = lock_data_dir(ctx, LockMode::Exclusive)?;
    let mut store = open_store(ctx);
    let result = store.import_json(&text)?;
    report_notices(&mut store);

    if ctx.json {
        return print_json(&ImportJson {
            imported: result.items,
            remapped: result
                .remapped
                .into_iter()
                .map(|(from, to)| RemapJson { from, to })
                .collect(),
        });
    }
    println!("imported {} item(s)", result.items.len());
    for (from, to) in &result.remapped {
        println!("  id {} was taken, now {}", from, to);
    }
    Ok(())
}

fn cmd_attach(args: AttachArgs, ctx: &Context) -> CmdResult {
    let _lock = lock_data_dir(ctx, LockMode::Exclusive)?;
    let host = PathHost::new(&ctx.data_dir, true).with_target(&args.path);
    let mut store = Store::open(&ctx.data_dir, &ctx.config, Box::new(host));

    if let Some(existing) = store.file_location() {
        report_notices(&mut store);
        println!("already attached to {}", existing.display());
        return Ok(());
    }
    if !store.pick_file()? {
        report_notices(&mut store);
        return Err("external data files are disabled (see [file] enabled in config.toml)".into());
    }
    report_notices(&mut store);

    let location = store
        .file_location()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    if ctx.json {
        return print_json(&serde_json::json!({
            "file": location,
            "items": store.items().len(),
        }));
    }
    println!("attached {} ({} item(s))", location, store.items().len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

fn cmd_watch(args: WatchArgs, ctx: &Context) -> CmdResult {
    let store = {
        let _lock = lock_data_dir(ctx, LockMode::Shared)?;
        open_store(ctx)
    };
    let session = Session::start_locked(store);
    {
        let mut store = session.lock();
        report_notices(&mut store);
        if !store.is_attached() {
            return Err("no data file attached (run `sc attach <path>`)".into());
        }
        if !ctx.json {
            eprintln!(
                "watching {} every {} ms",
                store
                    .file_location()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                store.config().file.poll_interval_ms
            );
        }
    }

    let wait = Duration::from_millis(ctx.config.file.poll_interval_ms.max(1) * 4 + 1000);
    let mut tick = 0u64;
    while args.ticks.is_none_or(|limit| tick < limit) {
        let Some(outcome) = session.next_event(wait) else {
            continue;
        };
        tick += 1;
        report_notices(&mut session.lock());

        if ctx.json {
            println!(
                "{}",
                serde_json::to_string(&WatchEventJson {
                    tick,
                    outcome: &outcome,
                })?
            );
        } else if let Some(line) = format_poll_outcome(&outcome) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

fn cmd_recovery(args: RecoveryCmd, ctx: &Context) -> CmdResult {
    match args.action {
        Some(RecoveryAction::Path) => {
            println!("{}", recovery::recovery_log_path(&ctx.data_dir).display());
            Ok(())
        }
        Some(RecoveryAction::Prune(prune)) => {
            let before = prune.before.as_deref().map(parse_timestamp).transpose()?;
            let removed = recovery::prune_recovery(&ctx.data_dir, before, prune.all)?;
            if ctx.json {
                return print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("pruned {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
            Ok(())
        }
        None => {
            let since = args.since.as_deref().map(parse_timestamp).transpose()?;
            let limit = args.limit.unwrap_or(10);
            let entries = recovery::read_recovery_entries(&ctx.data_dir, Some(limit), since);
            if ctx.json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("recovery log is empty");
            }
            for entry in entries {
                print!("{}", entry.to_display());
                println!();
            }
            Ok(())
        }
    }
}

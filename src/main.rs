use anyhow::{Context, Result};
use cloudcfg::cli::{parse_args, Args, GlobalOpts};
use cloudcfg::config::{self, Config};
use cloudcfg::error_helpers::{hint_for, is_permission_denied, mountlist_missing_error, permission_error};
use cloudcfg::logger;
use cloudcfg::mountlist::{Mountlist, MountlistError};
use cloudcfg::preview::PreviewFormatter;
use cloudcfg::probe::Interaction;
use cloudcfg::sink::LogSink;
use cloudcfg::status::StatusReport;
use cloudcfg::token::{TokenError, TokenStore};
use cloudcfg::variant::{Service, Variant};
use colored::*;
use std::path::PathBuf;
use tracing::debug;

struct Session {
    config: Config,
    cloud_dir: PathBuf,
    mountlist: PathBuf,
    use_color: bool,
}

fn main() -> Result<()> {
    let (opts, args) = parse_args();

    let config = config::load_config()?;
    config::validate_config(&config).context("Invalid ~/.cloudcfg/config.toml")?;

    let log_guard =
        logger::init_logging(opts.debug || config.debug_logging(), &config::app_dir()?)?;
    if let Some(path) = &log_guard.log_path {
        debug!(path = %path.display(), "Debug log enabled");
    }

    let ctx = resolve(opts, config);
    debug!(cloud_dir = %ctx.cloud_dir.display(), mountlist = %ctx.mountlist.display(), "Resolved paths");

    match args {
        Args::Detect => detect(&ctx),
        Args::Apply {
            variant,
            dry_run,
            unified,
            context,
        } => {
            if dry_run {
                preview(&ctx, variant, unified, context)
            } else {
                apply(&ctx, variant)
            }
        }
        Args::Status { json } => status(&ctx, json),
        Args::TokenSave { service, code } => token_save(&ctx, service, &code),
        Args::TokenShow { service } => token_show(&ctx, service),
        Args::TokenLoad { service, file } => {
            let code = TokenStore::read_code_file(&file, &printer(ctx.use_color))
                .map_err(token_error)?;
            token_save(&ctx, service, &code)
        }
        Args::TokenPurge { service } => token_purge(&ctx, service),
        Args::Config { reset } => show_config(&ctx, reset),
    }
}

fn resolve(opts: GlobalOpts, config: Config) -> Session {
    let (cloud_dir, mountlist) = match opts.cloud_dir {
        Some(dir) => {
            let mountlist = dir.join(config.mountlist_name());
            (dir, mountlist)
        }
        None => (config.cloud_dir(), config.mountlist_path()),
    };
    let use_color = !opts.no_color && PreviewFormatter::should_use_color();
    Session {
        config,
        cloud_dir,
        mountlist,
        use_color,
    }
}

/// Operator log lines on stdout, errors in red
fn printer(use_color: bool) -> impl LogSink {
    move |line: &str| {
        if use_color && line.contains("ERROR") {
            println!("{}", line.red());
        } else {
            println!("{}", line);
        }
    }
}

fn mountlist(ctx: &Session) -> Mountlist {
    Mountlist::new(&ctx.mountlist).with_options(ctx.config.update_options())
}

fn detect(ctx: &Session) -> Result<()> {
    let mountlist = mountlist(ctx);
    let variant = mountlist.detect_variant();
    if !ctx.mountlist.is_file() {
        eprintln!("warning: {} not found, assuming 68k", ctx.mountlist.display());
        let backup = &mountlist.paths().backup;
        if backup.is_file() {
            eprintln!(
                "warning: backup from an interrupted update at {}; rename it back to {}",
                backup.display(),
                ctx.mountlist.display()
            );
        }
    }

    if ctx.use_color {
        println!("{} ({})", variant.as_str().cyan().bold(), variant.cpu_label());
    } else {
        println!("{} ({})", variant, variant.cpu_label());
    }
    Ok(())
}

fn preview(ctx: &Session, variant: Variant, unified: bool, context: usize) -> Result<()> {
    let preview = mountlist(ctx)
        .preview(variant)
        .map_err(mountlist_error)?;
    let file = ctx.mountlist.display().to_string();

    if unified {
        if preview.is_noop() {
            println!("No changes would be made.");
        } else {
            print!("{}", PreviewFormatter::format_unified(&file, &preview, context));
        }
    } else {
        print!("{}", PreviewFormatter::format_preview(&file, &preview, ctx.use_color));
    }
    Ok(())
}

fn apply(ctx: &Session, variant: Variant) -> Result<()> {
    let applied = mountlist(ctx)
        .apply_variant(variant, &printer(ctx.use_color))
        .map_err(mountlist_error)?;

    for warning in &applied.warnings {
        eprintln!("warning: {}", warning);
    }

    let summary = format!(
        "{} handler declaration{} now select {} ({})",
        applied.rewritten,
        if applied.rewritten == 1 { "" } else { "s" },
        applied.variant,
        applied.variant.cpu_label()
    );
    if ctx.use_color {
        println!("\n{}", summary.green());
    } else {
        println!("\n{}", summary);
    }
    Ok(())
}

fn mountlist_error(err: MountlistError) -> anyhow::Error {
    match &err {
        MountlistError::SourceMissing { path } => anyhow::anyhow!(mountlist_missing_error(path)),
        MountlistError::StaleBackup { path } => anyhow::anyhow!(
            "{}\n\nInspect '{}' and delete it, or set stale_backup = \"clear\" in ~/.cloudcfg/config.toml",
            err,
            path.display()
        ),
        MountlistError::SourceUnreadable { path, source } if is_permission_denied(source) => {
            anyhow::anyhow!(permission_error(path, "reading"))
        }
        MountlistError::StagingWriteFailed { path, source } if is_permission_denied(source) => {
            anyhow::anyhow!(permission_error(path, "writing"))
        }
        MountlistError::SourceUnreadable { path, source }
        | MountlistError::StagingWriteFailed { path, source } => with_hint(&err, hint_for(source, path)),
        MountlistError::ReplaceFailed { path, source, .. } => with_hint(&err, hint_for(source, path)),
    }
}

fn with_hint(err: &MountlistError, hint: Option<String>) -> anyhow::Error {
    match hint {
        Some(hint) => anyhow::anyhow!("{}\nhint: {}", err, hint),
        None => anyhow::anyhow!("{}", err),
    }
}

fn token_error(err: TokenError) -> anyhow::Error {
    if let TokenError::Write { path, source } = &err {
        if is_permission_denied(source) {
            return anyhow::anyhow!(permission_error(path, "writing"));
        }
    }
    anyhow::Error::new(err)
}

fn status(ctx: &Session, json: bool) -> Result<()> {
    let report = StatusReport::gather(&ctx.cloud_dir, &ctx.mountlist, Interaction::Suppressed)?;
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.format_text(ctx.use_color));
    }
    Ok(())
}

fn token_save(ctx: &Session, service: Service, code: &str) -> Result<()> {
    let store = TokenStore::new(&ctx.cloud_dir);
    store
        .save_client_code(service, code, &printer(ctx.use_color))
        .map_err(token_error)?;
    Ok(())
}

fn token_show(ctx: &Session, service: Service) -> Result<()> {
    let store = TokenStore::new(&ctx.cloud_dir);
    match store.load_client_code(service).map_err(token_error)? {
        Some(code) => println!("{}", code),
        None => println!("No client code stored for {}", service),
    }
    Ok(())
}

fn token_purge(ctx: &Session, service: Service) -> Result<()> {
    let store = TokenStore::new(&ctx.cloud_dir);
    let removed = store
        .purge(service, &printer(ctx.use_color))
        .map_err(token_error)?;
    for path in removed {
        debug!(path = %path.display(), "Removed session token");
    }
    Ok(())
}

fn show_config(ctx: &Session, reset: bool) -> Result<()> {
    let path = config::config_file_path()?;
    if reset {
        config::save_default_config_to(&path)?;
        println!("Restored default configuration: {}", path.display());
        return Ok(());
    }

    println!("Configuration file: {}\n", path.display());
    println!("{}", toml::to_string_pretty(&ctx.config)?);
    println!("Cloud directory: {}", ctx.cloud_dir.display());
    println!("Mountlist: {}", ctx.mountlist.display());
    Ok(())
}

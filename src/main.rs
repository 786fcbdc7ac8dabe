use attache::{
    cli::{
        Cli, Command, GetArgs, HistoryAction, RescanAction, RootAction,
        StatusArgs, SuggestArgs,
    },
    data_dir::DataDir,
    doc_id::DocumentId,
    document_db::{DocumentDb, DocumentRecord, FileKind, RootConfig},
    error::{self, Error},
    history_db::{self, HistoryDb, SelectionEvent},
    indexer::{IndexReport, Indexer},
    ranker::{self, RankRequest},
    scheduler::{self, RescanConfig},
    vector_db::VectorDb,
    walker,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ATTACHE_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let documents = DocumentDb::open(&data_dir.index_db())?;
    let progress = !cli.quiet;

    match cli.command {
        Command::Root { action } => match action {
            RootAction::Add {
                path,
                name,
                excludes,
            } => {
                let vectors = VectorDb::open(&data_dir.vectors_db())?;
                root_add(&documents, &vectors, &path, &name, excludes, progress)?;
            }
            RootAction::Remove { name } => {
                let vectors = VectorDb::open(&data_dir.vectors_db())?;
                root_remove(&documents, &vectors, &name)?;
            }
            RootAction::List { json } => {
                root_list(&documents, json)?;
            }
        },
        Command::Sync => {
            let vectors = VectorDb::open(&data_dir.vectors_db())?;
            let report = Indexer::new(&documents, &vectors)
                .with_progress(progress)
                .sync()?;
            print_report(&report);
        }
        Command::Rebuild => {
            let vectors = VectorDb::open(&data_dir.vectors_db())?;
            let report = Indexer::new(&documents, &vectors)
                .with_progress(progress)
                .rebuild()?;
            print_report(&report);
        }
        Command::Suggest(args) => {
            let vectors = VectorDb::open(&data_dir.vectors_db())?;
            let history = HistoryDb::open(&data_dir.history_db())?;
            cmd_suggest(&documents, &vectors, &history, &args)?;
        }
        Command::History { action } => {
            let history = HistoryDb::open(&data_dir.history_db())?;
            match action {
                HistoryAction::Add {
                    reference,
                    site,
                    url,
                    title,
                    context,
                } => {
                    let (doc_id, record) =
                        resolve_reference(&documents, &reference)?;
                    let entry = history.append(
                        SelectionEvent {
                            doc_id,
                            site: site.clone(),
                            page_url: url,
                            page_title: title,
                            context,
                        },
                        history_db::now_epoch_secs(),
                    )?;
                    println!(
                        "Recorded selection of {}:{} for '{site}' (entry {})",
                        record.root, record.relative_path, entry.seq
                    );
                }
                HistoryAction::List { site, json } => {
                    history_list(&history, &site, json)?;
                }
            }
        }
        Command::Rescan { action } => {
            rescan_action(&documents, action)?;
        }
        Command::Get(args) => {
            cmd_get(&documents, &args)?;
        }
        Command::Status(args) => {
            cmd_status(&documents, &data_dir, &args)?;
        }
        Command::Watch => {
            let vectors = VectorDb::open(&data_dir.vectors_db())?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_time()
                .build()?;
            runtime.block_on(scheduler::watch(&documents, &vectors))?;
        }
        Command::Completions(_) => unreachable!("handled above"),
    }

    Ok(())
}

fn root_add(
    documents: &DocumentDb,
    vectors: &VectorDb,
    path: &std::path::Path,
    name: &str,
    excludes: Vec<String>,
    progress: bool,
) -> error::Result<()> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "directory does not exist: {}",
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(Error::Config(format!(
            "path is not a directory: {}",
            path.display()
        )));
    }

    let abs_path = path.canonicalize().map_err(|e| {
        Error::Config(format!("cannot resolve path {}: {e}", path.display()))
    })?;

    if documents.get_root(name)?.is_some() {
        return Err(Error::Config(format!("root '{name}' already exists")));
    }

    // Reject bad patterns up front rather than at the first sync.
    walker::build_excludes(&excludes)?;

    documents.set_root(&RootConfig {
        name: name.to_string(),
        path: abs_path.to_string_lossy().into_owned(),
        excludes,
    })?;
    println!("Added root '{name}' -> {}", abs_path.display());

    let report = Indexer::new(documents, vectors)
        .with_progress(progress)
        .sync()?;
    print_report(&report);
    Ok(())
}

fn root_remove(
    documents: &DocumentDb,
    vectors: &VectorDb,
    name: &str,
) -> error::Result<()> {
    if documents.get_root(name)?.is_none() {
        return Err(Error::NotFound {
            kind: "root",
            name: name.to_string(),
        });
    }

    documents.remove_root(name)?;

    // The next pass sees the root's documents as deleted and rebuilds the
    // model over what remains.
    let report = Indexer::new(documents, vectors).sync()?;
    println!(
        "Removed root '{name}' ({} document(s) dropped)",
        report.deleted
    );
    Ok(())
}

fn root_list(documents: &DocumentDb, json: bool) -> error::Result<()> {
    let roots = documents.list_roots()?;

    if json {
        println!("{}", serde_json::to_string(&roots)?);
    } else if roots.is_empty() {
        println!("No roots registered.");
    } else {
        for root in &roots {
            if root.excludes.is_empty() {
                println!("{}\t{}", root.name, root.path);
            } else {
                println!(
                    "{}\t{}\t(excludes: {})",
                    root.name,
                    root.path,
                    root.excludes.join(", ")
                );
            }
        }
    }
    Ok(())
}

fn print_report(report: &IndexReport) {
    if report.is_noop() {
        println!(
            "Index is current ({} document(s), nothing changed).",
            report.total_indexed
        );
    } else {
        println!(
            "Indexed {} document(s): {} added/modified, {} unchanged, {} deleted.",
            report.total_indexed,
            report.added_or_modified,
            report.unchanged,
            report.deleted
        );
    }
}

fn cmd_suggest(
    documents: &DocumentDb,
    vectors: &VectorDb,
    history: &HistoryDb,
    args: &SuggestArgs,
) -> error::Result<()> {
    let kind = match args.kind.as_deref() {
        Some(raw) => Some(raw.parse::<FileKind>()?),
        None => None,
    };

    let request = RankRequest {
        context: &args.context,
        site: args.site.as_deref(),
        kind,
        count: args.count,
    };
    let outcome = ranker::rank(&request, documents, vectors, history, None)?;

    if args.json {
        ranker::format_json(&outcome)?;
    } else {
        ranker::format_human(&outcome);
    }
    Ok(())
}

fn history_list(
    history: &HistoryDb,
    site: &str,
    json: bool,
) -> error::Result<()> {
    let entries = history.list_for_site(site)?;

    if json {
        println!("{}", serde_json::to_string(&entries)?);
    } else if entries.is_empty() {
        println!("No history for '{site}'.");
    } else {
        for entry in &entries {
            println!(
                "{}\t{}\t{}\t{}",
                entry.seq, entry.timestamp, entry.page_url, entry.context
            );
        }
        println!("\n{} entr(ies)", entries.len());
    }
    Ok(())
}

fn rescan_action(
    documents: &DocumentDb,
    action: RescanAction,
) -> error::Result<()> {
    match action {
        RescanAction::Enable => {
            let mut config = RescanConfig::load(documents)?;
            config.enabled = true;
            config.save(documents)?;
            println!("Automatic rescans enabled.");
        }
        RescanAction::Disable => {
            let mut config = RescanConfig::load(documents)?;
            config.enabled = false;
            config.save(documents)?;
            println!("Automatic rescans disabled.");
        }
        RescanAction::Interval { secs } => {
            if secs == 0 {
                return Err(Error::Config(
                    "interval must be at least 1 second".into(),
                ));
            }
            let mut config = RescanConfig::load(documents)?;
            config.interval_secs = secs;
            config.save(documents)?;
            println!("Rescan interval set to {secs}s.");
        }
        RescanAction::Show { json } => {
            let config = RescanConfig::load(documents)?;
            if json {
                println!("{}", serde_json::to_string(&config)?);
            } else {
                println!(
                    "enabled: {}\ninterval: {}s\nlast scan: {}",
                    config.enabled,
                    config.interval_secs,
                    if config.last_scan == 0 {
                        "never".to_string()
                    } else {
                        config.last_scan.to_string()
                    }
                );
            }
        }
    }
    Ok(())
}

fn resolve_reference(
    documents: &DocumentDb,
    reference: &str,
) -> error::Result<(u64, DocumentRecord)> {
    let records = documents.list_records()?;

    if reference.starts_with('#') {
        for (id, record) in &records {
            let did = DocumentId::new(&record.root, &record.relative_path);
            if did.matches_short(reference) {
                return Ok((*id, record.clone()));
            }
        }
    } else if let Some((root, path)) = reference.split_once(':') {
        for (id, record) in &records {
            if record.root == root && record.relative_path == path {
                return Ok((*id, record.clone()));
            }
        }
    } else {
        for (id, record) in &records {
            if record.relative_path == reference {
                return Ok((*id, record.clone()));
            }
        }
    }

    Err(Error::NotFound {
        kind: "document",
        name: reference.to_string(),
    })
}

fn cmd_get(documents: &DocumentDb, args: &GetArgs) -> error::Result<()> {
    let (doc_id, record) = resolve_reference(documents, &args.reference)?;
    let id = DocumentId::new(&record.root, &record.relative_path);

    if args.json {
        let preview = (!args.meta).then_some(record.preview.as_str());
        println!(
            "{}",
            serde_json::json!({
                "id": id.to_string(),
                "root": record.root,
                "path": record.relative_path,
                "display_name": record.display_name,
                "kind": record.kind,
                "size": record.size,
                "mtime": record.mtime,
                "preview": preview,
            })
        );
    } else if args.meta {
        println!("id: {id}");
        println!("root: {}", record.root);
        println!("path: {}", record.relative_path);
        println!("kind: {}", record.kind);
        println!("size: {}", record.size);
        println!("mtime: {}", record.mtime);
    } else {
        tracing::debug!(doc_id, "printing preview");
        println!("{}", record.preview);
    }
    Ok(())
}

fn cmd_status(
    documents: &DocumentDb,
    data_dir: &DataDir,
    args: &StatusArgs,
) -> error::Result<()> {
    let roots = documents.list_roots()?;
    let doc_count = documents.record_count()?;
    let vocabulary = documents.load_vocabulary()?;
    let history = HistoryDb::open(&data_dir.history_db())?;
    let history_count = history.entry_count()?;
    let rescan = RescanConfig::load(documents)?;

    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "data_dir": data_dir.root().display().to_string(),
                "roots": roots.len(),
                "documents": doc_count,
                "vocabulary_terms": vocabulary.as_ref().map(|v| v.len()),
                "vocabulary_version": vocabulary.as_ref().map(|v| v.version()),
                "history_entries": history_count,
                "rescan": rescan,
            })
        );
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Roots: {}", roots.len());
        for root in &roots {
            println!("  {}: {}", root.name, root.path);
        }
        println!("Documents: {doc_count}");
        match &vocabulary {
            Some(v) => println!(
                "Vocabulary: {} term(s), version {:016x}",
                v.len(),
                v.version()
            ),
            None => println!("Vocabulary: not built yet"),
        }
        println!("History entries: {history_count}");
        println!(
            "Rescan: {} every {}s",
            if rescan.enabled { "enabled" } else { "disabled" },
            rescan.interval_secs
        );
    }
    Ok(())
}

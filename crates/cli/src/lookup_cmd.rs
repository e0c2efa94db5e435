use anyhow::{Result, bail};
use clap::ValueEnum;
use eduadmin_selector::{Candidate, EntitySource, RemoteListSource, Resolver, Toolbar};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::context::AppContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityKind {
    Course,
    Project,
    QuestionBank,
    Student,
}

/// Typed in `browse` to clear the search.
const RESET_COMMAND: &str = ":reset";

/// Run a generic lookup against the source for `kind`.
macro_rules! with_source {
    ($ctx:expr, $kind:expr, $run:ident ( $($arg:expr),* )) => {{
        let client = $ctx.client.clone();
        let settings = &$ctx.config.selector;
        match $kind {
            EntityKind::Course => $run(RemoteListSource::courses(client, settings), $($arg),*).await,
            EntityKind::Project => $run(RemoteListSource::projects(client, settings), $($arg),*).await,
            EntityKind::QuestionBank => {
                $run(RemoteListSource::question_banks(client, settings), $($arg),*).await
            }
            EntityKind::Student => $run(RemoteListSource::students(client, settings), $($arg),*).await,
        }
    }};
}

fn require_scope(kind: EntityKind, course: Option<&str>) -> Result<()> {
    if kind == EntityKind::QuestionBank && course.is_none() {
        bail!("Question banks belong to a course; pass --course <id>");
    }
    Ok(())
}

pub async fn search(ctx: &AppContext, kind: EntityKind, keyword: &str, course: Option<&str>) -> Result<()> {
    require_scope(kind, course)?;
    with_source!(ctx, kind, search_with(keyword, course))
}

pub async fn resolve(ctx: &AppContext, kind: EntityKind, id: &str, course: Option<&str>) -> Result<()> {
    with_source!(ctx, kind, resolve_with(id, course))
}

pub async fn browse(ctx: &AppContext, kind: EntityKind, course: Option<&str>) -> Result<()> {
    require_scope(kind, course)?;
    let debounce = ctx.config.toolbar.debounce();
    with_source!(ctx, kind, browse_with(course, debounce))
}

async fn search_with<S: EntitySource>(source: S, keyword: &str, course: Option<&str>) -> Result<()> {
    let resolver = Resolver::new(source);
    resolver.set_parent_scope(course).await;
    resolver.set_search_text(keyword).await;
    resolver.open().await;
    print_rows(&resolver.visible_candidates());
    Ok(())
}

async fn resolve_with<S: EntitySource>(source: S, id: &str, course: Option<&str>) -> Result<()> {
    let resolver = Resolver::new(source);
    resolver.set_parent_scope(course).await;
    resolver.set_value(Some(id)).await;
    match resolver.state().selected_entity {
        Some(entity) => print_rows(std::slice::from_ref(&entity)),
        None => println!("{id}\t(not resolved)"),
    }
    Ok(())
}

async fn browse_with<S: EntitySource>(source: S, course: Option<&str>, debounce: Duration) -> Result<()> {
    let resolver = Resolver::new(source);
    resolver.set_parent_scope(course).await;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let reset_tx = tx.clone();
    let mut toolbar = Toolbar::new()
        .on_search(debounce, move |keyword| {
            let _ = tx.send(keyword);
        })
        .on_reset(move || {
            let _ = reset_tx.send(String::new());
        });

    resolver.open().await;
    print_rows(&resolver.visible_candidates());
    eprintln!("Type to search, {RESET_COMMAND} to clear, Ctrl-D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == RESET_COMMAND => toolbar.reset(),
                Some(line) => toolbar.input_changed(line.trim()),
                None => break,
            },
            Some(keyword) = rx.recv() => {
                resolver.set_search_text(&keyword).await;
                println!("-- {:?}", keyword);
                print_rows(&resolver.visible_candidates());
            }
        }
    }
    resolver.unmount();
    Ok(())
}

fn print_rows<E: Candidate>(rows: &[E]) {
    if rows.is_empty() {
        println!("No matches.");
        return;
    }
    for row in rows {
        match row.detail() {
            Some(detail) => println!("{}\t{}\t{}", row.id(), row.display_name(), detail),
            None => println!("{}\t{}", row.id(), row.display_name()),
        }
    }
}

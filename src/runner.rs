//! Sequential task execution with `make`-style timestamp semantics.
//!
//! The runner walks prerequisites depth-first. File tasks only execute when
//! the file is missing or older than a prerequisite; directory tasks create
//! their path if absent; phony tasks always run their actions. Prerequisite
//! lists are snapshotted per node visit and each `invoke` gets a fresh memo
//! map, so graph surgery performed by one top-level invocation (`cross`) is
//! observed by the next (`compile`).

use std::collections::HashMap;
use std::fs;
use std::time::{Instant, SystemTime};

use camino::Utf8Path;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::RunError;
use crate::io;
use crate::registry::{Action, Invocation, TaskKind, TaskRegistry};
use crate::session::Session;

/// Timestamp of a task. `None` is "early": directories and absent phony
/// results never force dependents stale on their own.
type Stamp = Option<SystemTime>;

pub(crate) fn invoke(session: &mut Session, key: &str) -> Result<(), RunError> {
    check_cycles(&session.registry)?;

    let s = Instant::now();
    let bar = ProgressBar::new(session.registry.len() as u64).with_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos} {msg}")
            .expect("Error setting progress bar template")
            .progress_chars("#>-"),
    );

    let mut memo = HashMap::new();
    let result = run_node(session, key, &mut memo, &bar);
    bar.finish_and_clear();
    result?;

    eprintln!("Invoked {} {}", style(key).blue(), io::as_overhead(s));
    Ok(())
}

/// Reject graphs with dependency cycles before traversing. Prerequisites
/// pointing at plain files (unregistered keys) are leaves by definition and
/// don't participate.
fn check_cycles(registry: &TaskRegistry) -> Result<(), RunError> {
    let mut graph: DiGraph<(), ()> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for key in registry.keys() {
        indices.insert(key, graph.add_node(()));
    }

    for (key, node) in registry.iter() {
        for prereq in node.prereqs() {
            if let Some(&from) = indices.get(prereq.as_ref()) {
                graph.add_edge(from, indices[key], ());
            }
        }
    }

    toposort(&graph, None)
        .map(|_| ())
        .map_err(|_| RunError::Cycle)
}

fn run_node(
    session: &mut Session,
    key: &str,
    memo: &mut HashMap<Box<str>, Stamp>,
    bar: &ProgressBar,
) -> Result<Stamp, RunError> {
    if let Some(stamp) = memo.get(key) {
        return Ok(*stamp);
    }

    let Some(node) = session.registry.get(key) else {
        // Not a task: either a plain source file, or a mistake.
        return match io::mtime(Utf8Path::new(key)) {
            Some(time) => {
                memo.insert(key.into(), Some(time));
                Ok(Some(time))
            }
            None => Err(RunError::UnknownTask(key.into())),
        };
    };

    // Snapshot before running anything; actions may mutate the registry.
    let kind = node.kind();
    let prereqs: Vec<Box<str>> = node.prereqs().to_vec();
    let actions: Vec<Action> = node.actions.clone();

    let mut newest: Stamp = None;
    for prereq in &prereqs {
        newest = newest.max(run_node(session, prereq, memo, bar)?);
    }

    let stamp = match kind {
        TaskKind::Directory => {
            let path = Utf8Path::new(key);
            if !path.exists() {
                tracing::debug!("mkdir {key}");
                fs::create_dir_all(path)?;
            }
            None
        }
        TaskKind::File => {
            let path = Utf8Path::new(key);
            let current = io::mtime(path);

            if current.is_none() || current < newest {
                execute(session, key, &prereqs, &actions, bar)?;
            }

            io::mtime(path).or(newest)
        }
        TaskKind::Phony => {
            execute(session, key, &prereqs, &actions, bar)?;

            if prereqs.is_empty() {
                Some(SystemTime::now())
            } else {
                newest
            }
        }
    };

    memo.insert(key.into(), stamp);
    Ok(stamp)
}

fn execute(
    session: &mut Session,
    key: &str,
    prereqs: &[Box<str>],
    actions: &[Action],
    bar: &ProgressBar,
) -> Result<(), RunError> {
    if actions.is_empty() {
        return Ok(());
    }

    bar.set_message(key.to_owned());
    tracing::debug!("run {key}");

    let inv = Invocation {
        key: key.into(),
        prereqs: prereqs.to_vec(),
    };

    for action in actions {
        action
            .call(session, &inv)
            .map_err(|err| RunError::Task(key.into(), err))?;
    }

    bar.inc(1);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::TaskKind;
    use crate::testutil::utf8;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_unknown_task_is_an_error() {
        let mut session = Session::new("3.2.0");
        let err = session.invoke("no-such-task").unwrap_err();
        assert!(matches!(err, RunError::UnknownTask(_)));
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut session = Session::new("3.2.0");
        session.registry.register("a", TaskKind::Phony).prereq("b");
        session.registry.register("b", TaskKind::Phony).prereq("a");

        let err = session.invoke("a").unwrap_err();
        assert!(matches!(err, RunError::Cycle));
    }

    #[test]
    fn test_existing_source_file_counts_as_built() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8(dir.path());
        let source = root.join("input.c");
        std::fs::write(&source, "int main;").unwrap();

        let mut session = Session::new("3.2.0");
        session
            .registry
            .register("all", TaskKind::Phony)
            .prereq(source.as_str());

        session.invoke("all").unwrap();
    }

    #[test]
    fn test_fresh_file_task_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8(dir.path());

        let source = root.join("input.c");
        let output = root.join("output.o");
        std::fs::write(&source, "int main;").unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let target = output.clone();

        let mut session = Session::new("3.2.0");
        session
            .registry
            .register(output.as_str(), TaskKind::File)
            .prereq(source.as_str())
            .action(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::fs::write(&target, "obj")?;
                Ok(())
            });

        session.invoke(output.as_str()).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Second invocation: output is newer than the source, nothing runs.
        session.invoke(output.as_str()).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_action_is_wrapped_with_the_task_key() {
        let mut session = Session::new("3.2.0");
        session
            .registry
            .register("boom", TaskKind::Phony)
            .action(|_, _| anyhow::bail!("kaputt"));

        let err = session.invoke("boom").unwrap_err();
        match err {
            RunError::Task(key, source) => {
                assert_eq!(key.as_ref(), "boom");
                assert!(source.to_string().contains("kaputt"));
            }
            other => panic!("expected task error, got {other:?}"),
        }
    }

    #[test]
    fn test_directory_task_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8(dir.path());
        let target = root.join("deep/nested/dir");

        let mut session = Session::new("3.2.0");
        session
            .registry
            .register(target.as_str(), TaskKind::Directory);

        session.invoke(target.as_str()).unwrap();
        assert!(target.is_dir());
        session.invoke(target.as_str()).unwrap();
    }
}

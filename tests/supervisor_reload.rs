use std::error::Error;
use std::fs;
use std::path::PathBuf;

use tempfile::{tempdir, TempDir};

use watchcron::config::DaemonSection;
use watchcron::daemon::Supervisor;

type TestResult = Result<(), Box<dyn Error>>;

struct Sandbox {
    root: TempDir,
    spool: PathBuf,
    sysd: PathBuf,
}

fn sandbox() -> Result<Sandbox, Box<dyn Error>> {
    let root = tempdir()?;
    let spool = root.path().join("spool");
    let sysd = root.path().join("sysd");
    fs::create_dir(&spool)?;
    fs::create_dir(&sysd)?;
    Ok(Sandbox { root, spool, sysd })
}

fn supervisor(sandbox: &Sandbox) -> Result<Supervisor, Box<dyn Error>> {
    let settings = DaemonSection {
        user_table_dir: sandbox.spool.clone(),
        system_table_dir: sandbox.sysd.clone(),
        allow_file: sandbox.root.path().join("allow"),
        deny_file: sandbox.root.path().join("deny"),
        pid_file: sandbox.root.path().join("pid"),
        ..Default::default()
    };
    Ok(Supervisor::new(settings)?)
}

#[test]
fn reload_registers_every_rule_path() -> TestResult {
    let sandbox = sandbox()?;
    let watched_a = tempdir()?;
    let watched_b = tempdir()?;

    fs::write(
        sandbox.spool.join("alice"),
        format!(
            "{} IN_CREATE echo a\n{} IN_MODIFY echo b\n",
            watched_a.path().display(),
            watched_b.path().display()
        ),
    )?;

    let mut sup = supervisor(&sandbox)?;
    sup.reload_tables();

    let paths = sup.watched_paths();
    assert!(paths.contains(&watched_a.path().to_path_buf()));
    assert!(paths.contains(&watched_b.path().to_path_buf()));
    Ok(())
}

#[test]
fn reload_swaps_out_removed_rules() -> TestResult {
    let sandbox = sandbox()?;
    let watched_a = tempdir()?;
    let watched_b = tempdir()?;

    let table_path = sandbox.spool.join("alice");
    fs::write(
        &table_path,
        format!("{} IN_CREATE echo a\n", watched_a.path().display()),
    )?;

    let mut sup = supervisor(&sandbox)?;
    sup.reload_tables();
    assert!(sup.watched_paths().contains(&watched_a.path().to_path_buf()));

    // Replace the rule: the new path appears, the old one disappears.
    fs::write(
        &table_path,
        format!("{} IN_CREATE echo b\n", watched_b.path().display()),
    )?;
    sup.reload_tables();

    let paths = sup.watched_paths();
    assert!(paths.contains(&watched_b.path().to_path_buf()));
    assert!(!paths.contains(&watched_a.path().to_path_buf()));
    Ok(())
}

#[test]
fn one_broken_table_does_not_block_the_rest() -> TestResult {
    let sandbox = sandbox()?;
    let watched = tempdir()?;

    fs::write(sandbox.spool.join("bob"), "this is not a rule line\n")?;
    fs::write(
        sandbox.spool.join("alice"),
        format!("{} IN_CREATE echo a\n", watched.path().display()),
    )?;

    let mut sup = supervisor(&sandbox)?;
    sup.reload_tables();

    assert!(sup.watched_paths().contains(&watched.path().to_path_buf()));
    Ok(())
}

#[test]
fn system_tables_are_loaded_alongside_user_tables() -> TestResult {
    let sandbox = sandbox()?;
    let watched_user = tempdir()?;
    let watched_sys = tempdir()?;

    fs::write(
        sandbox.spool.join("alice"),
        format!("{} IN_CREATE echo u\n", watched_user.path().display()),
    )?;
    fs::write(
        sandbox.sysd.join("backups"),
        format!("{} IN_CLOSE_WRITE echo s\n", watched_sys.path().display()),
    )?;

    let mut sup = supervisor(&sandbox)?;
    sup.reload_tables();

    let paths = sup.watched_paths();
    assert!(paths.contains(&watched_user.path().to_path_buf()));
    assert!(paths.contains(&watched_sys.path().to_path_buf()));
    Ok(())
}

#[test]
fn unwatchable_rule_is_skipped_not_fatal() -> TestResult {
    let sandbox = sandbox()?;
    let watched = tempdir()?;

    fs::write(
        sandbox.spool.join("alice"),
        format!(
            "/no/such/path/here IN_CREATE echo a\n{} IN_CREATE echo b\n",
            watched.path().display()
        ),
    )?;

    let mut sup = supervisor(&sandbox)?;
    sup.reload_tables();

    let paths = sup.watched_paths();
    assert!(paths.contains(&watched.path().to_path_buf()));
    assert!(!paths.contains(&PathBuf::from("/no/such/path/here")));
    Ok(())
}

use predicates::prelude::*;
use std::fs;
use assert_cmd::Command;
use tempfile::tempdir;

#[test]
fn test_apply_patch_cli_add_and_update() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let file = "cli_test.txt";
    let absolute_path = tmp.path().join(file);

    // 1) Add a file
    let add_patch = format!(
        r#"*** Begin Patch
*** Add File: {file}
+hello
*** End Patch"#
    );
    Command::cargo_bin("apply_patch")?
        .arg(add_patch)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("Applied patch: added 1, updated 0, deleted 0.\n");
    assert_eq!(fs::read_to_string(&absolute_path)?, "hello");

    // 2) Update the file
    let update_patch = format!(
        r#"*** Begin Patch
*** Update File: {file}
@@
-hello
+world
*** End Patch"#
    );
    Command::cargo_bin("apply_patch")?
        .arg(update_patch)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("Applied patch: added 0, updated 1, deleted 0.\n");
    assert_eq!(fs::read_to_string(&absolute_path)?, "world");

    Ok(())
}

#[test]
fn test_apply_patch_cli_stdin_add_and_update() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let file = "cli_test_stdin.txt";
    let absolute_path = tmp.path().join(file);

    let add_patch = format!(
        r#"*** Begin Patch
*** Add File: {file}
+hello
*** End Patch"#
    );
    Command::cargo_bin("apply_patch")?
        .current_dir(tmp.path())
        .write_stdin(add_patch)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&absolute_path)?, "hello");

    Ok(())
}

#[test]
fn test_apply_patch_cli_reports_errors() -> anyhow::Result<()> {
    let tmp = tempdir()?;

    Command::cargo_bin("apply_patch")?
        .arg("*** Begin Patch\n*** Delete File: missing.txt\n*** End Patch")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Delete file 'missing.txt' not found"));

    Ok(())
}

#[test]
fn test_apply_patch_cli_rejects_extra_arguments() -> anyhow::Result<()> {
    let tmp = tempdir()?;

    Command::cargo_bin("apply_patch")?
        .args(["one", "two"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .code(2);

    Ok(())
}

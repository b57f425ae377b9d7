use std::fs;
use std::path::Path;

use anyhow::Result;
use assert_cmd::Command;
use tempfile::TempDir;

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, content)?;
    Ok(())
}

fn chartship_cmd(root: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("chartship")?;
    cmd.current_dir(root);
    for var in [
        "GITHUB_REPOSITORY_OWNER",
        "GITHUB_REPOSITORY",
        "GITHUB_REF_NAME",
        "GITHUB_SHA",
        "GITHUB_TOKEN",
        "GH_TOKEN",
        "COMMIT_MESSAGE",
        "CHART_NAME",
        "ARTIFACT_NAME",
        "CHART_VERSION",
        "ARTIFACT_VERSION",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "info");
    Ok(cmd)
}

fn chart_fixture() -> Result<TempDir> {
    let td = TempDir::new()?;
    write_file(
        &td.path().join("charts/api/Chart.yaml"),
        "apiVersion: v2\nname: api\nversion: 1.2.0\n",
    )?;
    write_file(
        &td.path().join("charts/web/Chart.yaml"),
        "apiVersion: v2\nname: web\nversion: \"0.3.1\"\n",
    )?;
    write_file(&td.path().join("charts/web/values.yaml"), "replicas: 1\n")?;
    Ok(td)
}

#[test]
fn charts_snapshot() -> Result<()> {
    let td = chart_fixture()?;
    let output = chartship_cmd(td.path())?
        .args([
            "charts",
            "charts/web/values.yaml",
            "charts/api/Chart.yaml",
            "charts/web/Chart.yaml",
            "README.md",
        ])
        .output()?;
    assert!(
        output.status.success(),
        "status: {:?}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout)?;
    insta::assert_snapshot!(stdout, @r###"charts={"directories":["web","api"],"versions":{"api":"1.2.0","web":"0.3.1"}}
"###);
    Ok(())
}

#[test]
fn charts_key_comes_from_config_file() -> Result<()> {
    let td = chart_fixture()?;
    write_file(
        &td.path().join(".chartship.toml"),
        "output_key = \"chart_info\"\n",
    )?;
    let output = chartship_cmd(td.path())?
        .args(["charts", "charts/api/templates/deploy.yaml"])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    insta::assert_snapshot!(stdout, @r###"chart_info={"directories":["api"],"versions":{"api":"1.2.0"}}
"###);
    Ok(())
}

#[test]
fn charts_cli_key_overrides_config_file() -> Result<()> {
    let td = chart_fixture()?;
    write_file(
        &td.path().join(".chartship.toml"),
        "output_key = \"chart_info\"\n",
    )?;
    let output = chartship_cmd(td.path())?
        .args(["charts", "--key", "summary", "charts/web/values.yaml"])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("summary={"), "stdout: {}", stdout);
    Ok(())
}

#[test]
fn charts_fail_on_missing_descriptor() -> Result<()> {
    let td = chart_fixture()?;
    let output = chartship_cmd(td.path())?
        .args(["charts", "charts/ghost/values.yaml"])
        .output()?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read"), "stderr: {}", stderr);
    Ok(())
}

#[test]
fn publish_without_token_is_fatal() -> Result<()> {
    let td = TempDir::new()?;
    let output = chartship_cmd(td.path())?
        .env("GITHUB_REPOSITORY", "acme/charts")
        .env("GITHUB_SHA", "deadbeef")
        .env("CHART_NAME", "mychart")
        .env("CHART_VERSION", "1.2.0")
        .args(["publish"])
        .output()?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("missing GITHUB_TOKEN and/or GH_TOKEN variable/s"),
        "stderr: {}",
        stderr
    );
    assert!(stderr.contains("authentication failed"), "stderr: {}", stderr);
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn malformed_config_file_is_fatal() -> Result<()> {
    let td = TempDir::new()?;
    write_file(&td.path().join(".chartship.toml"), "retries = \"lots\"\n")?;
    let mut cmd = chartship_cmd(td.path())?;
    cmd.args(["charts"]);
    cmd.assert().failure();
    Ok(())
}

#[test]
fn publish_without_owner_is_fatal() -> Result<()> {
    let td = TempDir::new()?;
    let output = chartship_cmd(td.path())?
        .env("GITHUB_TOKEN", "t0ken")
        .env("GITHUB_REPOSITORY", "charts")
        .env("GITHUB_SHA", "deadbeef")
        .env("CHART_NAME", "mychart")
        .env("CHART_VERSION", "1.2.0")
        .args(["publish"])
        .output()?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("missing owner: set GITHUB_REPOSITORY_OWNER"),
        "stderr: {}",
        stderr
    );
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn publish_without_repository_is_fatal() -> Result<()> {
    let td = TempDir::new()?;
    let output = chartship_cmd(td.path())?
        .env("GITHUB_TOKEN", "t0ken")
        .env("GITHUB_REPOSITORY_OWNER", "acme")
        .env("CHART_NAME", "mychart")
        .env("CHART_VERSION", "1.2.0")
        .args(["publish"])
        .output()?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("missing repo: set GITHUB_REPOSITORY"),
        "stderr: {}",
        stderr
    );
    Ok(())
}

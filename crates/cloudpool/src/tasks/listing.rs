use std::path::{Path, PathBuf};

use anyhow::Context;
use bstr::ByteSlice;
use serde_json::{Map, Value};
use tokio::process::Command;

const DOCKERFILE: &str = "Dockerfile";

/// Git URLs of repositories whose dominant language is Python.
///
/// The listing is a JSON array of objects with per-language line counts, ordered from the
/// largest count. The second key of an entry names its dominant language.
pub fn list_repositories(loc_file: &Path) -> crate::Result<Vec<String>> {
    let content = std::fs::read_to_string(loc_file)
        .with_context(|| format!("Cannot read repository listing {}", loc_file.display()))?;
    let entries: Vec<Map<String, Value>> = serde_json::from_str(&content)?;

    let mut repositories = Vec::new();
    for entry in entries {
        if entry.keys().nth(1).map(|key| key.as_str()) != Some("Python") {
            continue;
        }
        match entry.get("git_url").and_then(|url| url.as_str()) {
            Some(url) => repositories.push(url.to_string()),
            None => {
                return Err(
                    anyhow::anyhow!("Repository entry without `git_url`: {entry:?}").into(),
                );
            }
        }
    }
    log::debug!("Found {} Python repositories", repositories.len());
    Ok(repositories)
}

/// Sorted names of recipes in a bioconda recipes checkout.
pub fn list_recipes(recipes_dir: &Path) -> crate::Result<Vec<String>> {
    let path = recipes_dir.join("recipes");
    let mut recipes = Vec::new();
    for entry in std::fs::read_dir(&path)
        .with_context(|| format!("Cannot list recipes in {}", path.display()))?
    {
        recipes.push(entry?.file_name().to_string_lossy().into_owned());
    }
    recipes.sort();
    Ok(recipes)
}

/// `(package, version)` pairs of all Dockerfiles stored as `<package>/<version>/Dockerfile`.
pub fn list_dockerfiles(containers_dir: &Path) -> crate::Result<Vec<(String, String)>> {
    let mut directories = Vec::new();
    collect_dockerfile_dirs(containers_dir, &mut directories)
        .with_context(|| format!("Cannot list Dockerfiles in {}", containers_dir.display()))?;

    let mut dockerfiles: Vec<(String, String)> = directories
        .into_iter()
        .filter_map(|directory| {
            // Dockerfiles in the root or directly below it do not belong to a package version
            let parent = directory.parent()?;
            if directory.as_path() == containers_dir || parent == containers_dir {
                return None;
            }
            Some((file_name(parent)?, file_name(&directory)?))
        })
        .collect();
    dockerfiles.sort();
    Ok(dockerfiles)
}

fn collect_dockerfile_dirs(directory: &Path, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_dockerfile_dirs(&entry.path(), found)?;
        } else if entry.file_name() == DOCKERFILE {
            found.push(directory.to_path_buf());
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Names of nf-core pipelines, printed one per line by a listing script.
pub async fn list_pipelines(shell: &Path, scripts_dir: &Path) -> crate::Result<Vec<String>> {
    let script = scripts_dir.join("list-pipelines.sh");
    let output = Command::new(shell)
        .arg("-i")
        .arg(&script)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Cannot run {}", script.display()))?;
    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} failed with exit code {}: {}",
            script.display(),
            output.status.code().unwrap_or(-1),
            output.stderr.to_str_lossy().trim()
        )
        .into());
    }
    Ok(parse_lines(&output.stdout))
}

fn parse_lines(output: &[u8]) -> Vec<String> {
    output
        .lines()
        .map(|line| line.to_str_lossy().trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

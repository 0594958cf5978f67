//! Project descriptor detection from lock files and package.json.
//!
//! Best-effort: a missing or malformed manifest yields `unknown`/empty
//! values rather than an error.

use std::fs;
use std::path::Path;

use log::debug;
use serde_json::{Map, Value};

use crate::model::{PackageManager, ProjectDescriptor, ProjectType, WorkspaceType};

const MANIFEST: &str = "package.json";

pub fn detect(dir: &Path) -> ProjectDescriptor {
    let manifest = read_manifest(dir);
    let project_type = detect_project_type(manifest.as_ref());
    ProjectDescriptor {
        package_manager: detect_package_manager(dir),
        project_type,
        workspace_type: detect_workspace_type(dir, manifest.as_ref()),
        has_docker: dir.join("docker-compose.yml").exists() || dir.join("Dockerfile").exists(),
        has_env_example: dir.join(".env.example").exists(),
        ports: project_type.common_ports(),
        node_version: manifest
            .as_ref()
            .and_then(|pkg| pkg.pointer("/engines/node"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Script names declared in package.json, sorted by name.
pub fn available_scripts(dir: &Path) -> Vec<String> {
    read_manifest(dir)
        .as_ref()
        .and_then(|pkg| pkg.get("scripts"))
        .and_then(Value::as_object)
        .map(|scripts| scripts.keys().cloned().collect())
        .unwrap_or_default()
}

fn read_manifest(dir: &Path) -> Option<Value> {
    let path = dir.join(MANIFEST);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<Value>(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!("Ignoring unreadable {}: {}", path.display(), err);
            None
        }
    }
}

fn detect_package_manager(dir: &Path) -> PackageManager {
    if dir.join("pnpm-lock.yaml").exists() {
        PackageManager::Pnpm
    } else if dir.join("yarn.lock").exists() {
        PackageManager::Yarn
    } else if dir.join("bun.lockb").exists() {
        PackageManager::Bun
    } else {
        PackageManager::Npm
    }
}

fn detect_project_type(manifest: Option<&Value>) -> ProjectType {
    let Some(pkg) = manifest else {
        return ProjectType::Unknown;
    };

    let mut deps = Map::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(entries) = pkg.get(section).and_then(Value::as_object) {
            deps.extend(entries.clone());
        }
    }

    // Framework packages before the build tools and libraries they pull in
    const PRIORITY: &[(&str, ProjectType)] = &[
        ("@angular/core", ProjectType::Angular),
        ("next", ProjectType::Next),
        ("@nestjs/core", ProjectType::Nest),
        ("nuxt", ProjectType::Nuxt),
        ("vue", ProjectType::Vue),
        ("vite", ProjectType::Vite),
        ("react", ProjectType::React),
    ];
    PRIORITY
        .iter()
        .find(|(package, _)| deps.contains_key(*package))
        .map(|(_, kind)| *kind)
        .unwrap_or(ProjectType::Unknown)
}

fn detect_workspace_type(dir: &Path, manifest: Option<&Value>) -> WorkspaceType {
    if dir.join("nx.json").exists() {
        WorkspaceType::Nx
    } else if dir.join("turbo.json").exists() {
        WorkspaceType::Turbo
    } else if dir.join("lerna.json").exists() {
        WorkspaceType::Lerna
    } else if manifest.is_some_and(|pkg| pkg.get("workspaces").is_some()) {
        WorkspaceType::Workspaces
    } else {
        WorkspaceType::None
    }
}

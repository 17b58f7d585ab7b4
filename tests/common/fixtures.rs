//! Git remotes and resource factories for integration tests
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use git2::build::TreeUpdateBuilder;
use git2::{BranchType, FileMode, Repository, RepositoryInitOptions, Signature, Sort};
use gitops_promoter::config::Settings;
use gitops_promoter::types::{
    CopyOperation, Environment, EnvironmentSpec, LocalObjectReference, ObjectMeta, Promotion,
    PromotionSpec, Source, Strategy, SUCCEEDED_REASON,
};
use std::path::{Path, PathBuf};

pub const NAMESPACE: &str = "default";

/// A bare repository standing in for a hosted environment remote
#[derive(Debug, Clone)]
pub struct BareRemote {
    pub path: PathBuf,
}

impl BareRemote {
    /// Init a bare repo at `path` with one commit on master holding `files`
    pub fn seeded<P: AsRef<str>, C: AsRef<str>>(path: &Path, files: &[(P, C)]) -> Self {
        let mut opts = RepositoryInitOptions::new();
        opts.bare(true).initial_head("master");
        let repo = Repository::init_opts(path, &opts).unwrap();
        let empty = repo.treebuilder(None).unwrap().write().unwrap();
        let tree = repo.find_tree(empty).unwrap();
        let sig = signature();
        repo.commit(Some("refs/heads/master"), &sig, &sig, "seed", &tree, &[])
            .unwrap();

        let remote = Self {
            path: path.to_path_buf(),
        };
        if !files.is_empty() {
            remote.commit_files("master", files, &[], "seed files");
        }
        remote
    }

    /// Clone URL
    pub fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn open(&self) -> Repository {
        Repository::open_bare(&self.path).unwrap()
    }

    /// Commit file upserts and removals directly onto `branch`
    pub fn commit_files<P: AsRef<str>, C: AsRef<str>>(
        &self,
        branch: &str,
        upserts: &[(P, C)],
        removals: &[String],
        message: &str,
    ) -> String {
        let repo = self.open();
        let parent = repo
            .find_branch(branch, BranchType::Local)
            .unwrap()
            .get()
            .peel_to_commit()
            .unwrap();

        let mut update = TreeUpdateBuilder::new();
        for (path, content) in upserts {
            let blob = repo.blob(content.as_ref().as_bytes()).unwrap();
            update.upsert(path.as_ref(), blob, FileMode::Blob);
        }
        for path in removals {
            update.remove(path.as_str());
        }
        let tree_id = update.create_updated(&repo, &parent.tree().unwrap()).unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let sig = signature();
        repo.commit(
            Some(&format!("refs/heads/{branch}")),
            &sig,
            &sig,
            message,
            &tree,
            &[&parent],
        )
        .unwrap()
        .to_string()
    }

    /// Full hash of the tip of `branch`
    pub fn head(&self, branch: &str) -> String {
        self.open()
            .find_branch(branch, BranchType::Local)
            .unwrap()
            .get()
            .peel_to_commit()
            .unwrap()
            .id()
            .to_string()
    }

    /// Content of `path` at the tip of `branch`, `None` if absent
    pub fn read_file(&self, branch: &str, path: &str) -> Option<String> {
        let repo = self.open();
        let commit = repo
            .find_branch(branch, BranchType::Local)
            .ok()?
            .get()
            .peel_to_commit()
            .unwrap();
        let entry = commit.tree().unwrap().get_path(Path::new(path)).ok()?;
        let blob = repo.find_blob(entry.id()).ok()?;
        Some(String::from_utf8_lossy(blob.content()).into_owned())
    }

    /// Messages of commits on `branch` not on `base`, oldest first
    pub fn commits_since(&self, branch: &str, base: &str) -> Vec<String> {
        let repo = self.open();
        let mut walk = repo.revwalk().unwrap();
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE).unwrap();
        walk.push_ref(&format!("refs/heads/{branch}")).unwrap();
        walk.hide_ref(&format!("refs/heads/{base}")).unwrap();
        walk.map(|oid| {
            let commit = repo.find_commit(oid.unwrap()).unwrap();
            commit.message().unwrap_or_default().to_string()
        })
        .collect()
    }

    /// Local branch names, sorted
    pub fn branches(&self) -> Vec<String> {
        let repo = self.open();
        let mut names: Vec<String> = repo
            .branches(Some(BranchType::Local))
            .unwrap()
            .map(|b| b.unwrap().0.name().unwrap().unwrap().to_string())
            .collect();
        names.sort();
        names
    }

    /// Author of the tip of `branch` as (name, email)
    pub fn tip_author(&self, branch: &str) -> (String, String) {
        let repo = self.open();
        let commit = repo
            .find_branch(branch, BranchType::Local)
            .unwrap()
            .get()
            .peel_to_commit()
            .unwrap();
        let author = commit.author();
        (
            author.name().unwrap().to_string(),
            author.email().unwrap().to_string(),
        )
    }
}

fn signature() -> Signature<'static> {
    Signature::now("Fixture", "fixture@example.com").unwrap()
}

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: name.to_string(),
        namespace: NAMESPACE.to_string(),
        generation: 1,
    }
}

/// An Environment pointing at `remote`, not yet checked
pub fn make_environment(name: &str, remote: &BareRemote, path: &str) -> Environment {
    Environment {
        metadata: meta(name),
        spec: EnvironmentSpec {
            path: path.to_string(),
            source: Source {
                url: remote.url(),
                reference: None,
                secret_ref: None,
            },
            api_token_secret_ref: None,
            git_provider: Some("github".to_string()),
        },
        status: Default::default(),
    }
}

/// An Environment already marked Ready
pub fn make_ready_environment(name: &str, remote: &BareRemote, path: &str) -> Environment {
    let mut env = make_environment(name, remote, path);
    env.status.observed_generation = 1;
    env.mark_ready(SUCCEEDED_REASON, "ready", &remote.head("master"));
    env
}

/// A Promotion from `source` to `target` with `(name, source, target)` copy operations
pub fn make_promotion(
    name: &str,
    source: &str,
    target: &str,
    operations: &[(&str, &str, &str)],
) -> Promotion {
    Promotion {
        metadata: meta(name),
        spec: PromotionSpec {
            source_environment_ref: LocalObjectReference {
                name: source.to_string(),
            },
            target_environment_ref: LocalObjectReference {
                name: target.to_string(),
            },
            copy: operations
                .iter()
                .map(|(name, source, target)| CopyOperation {
                    name: (*name).to_string(),
                    source: (*source).to_string(),
                    target: (*target).to_string(),
                })
                .collect(),
            strategy: Strategy::PullRequest,
        },
        status: Default::default(),
    }
}

/// Default settings with workspaces under `workdir`
pub fn test_settings(workdir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.controller.workdir = Some(workdir.to_path_buf());
    settings
}

/// Entries directly under `dir` (0 when it does not exist)
pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}

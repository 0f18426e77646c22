use git2::{BranchType, Repository, Status, StatusOptions};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitContext {
    pub is_git_repo: bool,
    pub branch: Option<String>,
    pub commit_hash: Option<String>,
    pub is_dirty: Option<bool>,
    pub staged_files: usize,
    pub unstaged_files: usize,
    pub remote_branch: Option<String>,
    pub commits_ahead: usize,
    pub commits_behind: usize,
}

const STAGED: Status = Status::INDEX_NEW
    .union(Status::INDEX_MODIFIED)
    .union(Status::INDEX_DELETED)
    .union(Status::INDEX_RENAMED)
    .union(Status::INDEX_TYPECHANGE);

const UNSTAGED: Status = Status::WT_MODIFIED
    .union(Status::WT_DELETED)
    .union(Status::WT_RENAMED)
    .union(Status::WT_TYPECHANGE);

/// Snapshot the repository containing `project_dir`.
///
/// Each query degrades on its own: an unborn HEAD leaves `branch`/`commitHash`
/// null, a branch without upstream leaves `remoteBranch` null and ahead/behind 0.
pub fn collect(project_dir: &Path) -> GitContext {
    let repo = match Repository::discover(project_dir) {
        Ok(r) => r,
        Err(_) => return GitContext::default(),
    };

    let mut ctx = GitContext {
        is_git_repo: true,
        ..GitContext::default()
    };

    let head = repo.head().ok();
    ctx.branch = head
        .as_ref()
        .and_then(|h| h.shorthand())
        .map(String::from);
    ctx.commit_hash = head
        .as_ref()
        .and_then(|h| h.peel_to_commit().ok())
        .and_then(|c| c.as_object().short_id().ok())
        .and_then(|buf| buf.as_str().map(String::from));

    let mut opts = StatusOptions::new();
    opts.include_untracked(true).include_ignored(false);
    if let Ok(statuses) = repo.statuses(Some(&mut opts)) {
        ctx.is_dirty = Some(!statuses.is_empty());
        for entry in statuses.iter() {
            let status = entry.status();
            if status.intersects(STAGED) {
                ctx.staged_files += 1;
            }
            if status.intersects(UNSTAGED) {
                ctx.unstaged_files += 1;
            }
        }
    }

    if let Some((remote, ahead, behind)) = upstream_tracking(&repo, head.as_ref()) {
        ctx.remote_branch = Some(remote);
        ctx.commits_ahead = ahead;
        ctx.commits_behind = behind;
    }

    ctx
}

fn upstream_tracking(
    repo: &Repository,
    head: Option<&git2::Reference<'_>>,
) -> Option<(String, usize, usize)> {
    let head = head.filter(|h| h.is_branch())?;
    let local = repo
        .find_branch(head.shorthand()?, BranchType::Local)
        .ok()?;
    let upstream = local.upstream().ok()?;
    let name = upstream.name().ok().flatten()?.to_string();

    let (ahead, behind) = match (local.get().target(), upstream.get().target()) {
        (Some(l), Some(u)) => repo.graph_ahead_behind(l, u).unwrap_or((0, 0)),
        _ => (0, 0),
    };
    Some((name, ahead, behind))
}

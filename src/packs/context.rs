//! Context Pack builder (spec §4.6).

use crate::cache::HotCache;
use crate::config::BudgetProfile;
use crate::git::{RepoState, Repository};
use crate::hashing::sha256_fields;
use crate::keywords::extract_keywords;
use crate::store::ContinuityStore;
use crate::store::models::{FileSummaryEntry, SearchCacheEntry};
use crate::summary::build_file_summary;
use std::path::Path;

const SEARCH_CACHE_TTL_SECS: i64 = 60;
const SEARCH_TOP_N: usize = 24;
const SUMMARY_SEPARATOR: &str = "\n\n---\n\n";

/// Build the Context Pack: keyword-ranked file search, summarized within
/// budget. `now` is a unix-epoch-seconds timestamp supplied by the caller
/// so the search-cache TTL check is deterministic for tests.
#[allow(clippy::too_many_arguments)]
pub async fn build_context_pack(
    repo: &Repository,
    repo_state: &RepoState,
    prompt: &str,
    budget: BudgetProfile,
    store: &dyn ContinuityStore,
    hot: &HotCache,
    now: i64,
) -> String {
    let keywords = extract_keywords(prompt);
    if keywords.is_empty() {
        return "No relevant files identified.".to_string();
    }

    let repo_root = repo.root().display().to_string();
    let search_hits = search_relevant_files(
        repo,
        &repo_root,
        &repo_state.head_commit,
        &keywords,
        store,
        hot,
        now,
    )
    .await;

    let mut candidates: Vec<String> = Vec::new();
    for f in repo_state.changed_files.iter().take(4) {
        if !candidates.contains(f) {
            candidates.push(f.clone());
        }
    }
    for f in &search_hits {
        if candidates.len() >= budget.max_context_files {
            break;
        }
        if !candidates.contains(f) {
            candidates.push(f.clone());
        }
    }
    candidates.truncate(budget.max_context_files);

    let mut out = String::new();
    for candidate in &candidates {
        let Some(summary) =
            summarize_candidate(repo.root(), &repo_root, candidate, budget.max_file_read_bytes, store, hot).await
        else {
            continue;
        };
        let addition_len = if out.is_empty() {
            summary.len()
        } else {
            SUMMARY_SEPARATOR.len() + summary.len()
        };
        if out.len() + addition_len > budget.max_context_summary_bytes {
            break;
        }
        if !out.is_empty() {
            out.push_str(SUMMARY_SEPARATOR);
        }
        out.push_str(&summary);
    }

    if out.is_empty() {
        "No relevant files identified.".to_string()
    } else {
        out
    }
}

async fn search_relevant_files(
    repo: &Repository,
    repo_root: &str,
    head_commit: &str,
    keywords: &[String],
    store: &dyn ContinuityStore,
    hot: &HotCache,
    now: i64,
) -> Vec<String> {
    let query = keywords.join(",");
    let key = sha256_fields(&[repo_root, head_commit, &query]);

    if let Some(entry) = hot.get_search(&key).or_else(|| store.get_search_cache(&key)) {
        if now - entry.updated_at <= SEARCH_CACHE_TTL_SECS {
            return entry.result_files;
        }
    }

    let all_files = crate::git::probe::list_files(repo).await;
    let mut scored: Vec<(i32, String)> = all_files
        .into_iter()
        .filter_map(|path| {
            let lower = path.to_lowercase();
            let mut score = 0;
            if keywords.iter().any(|kw| lower.contains(kw.as_str())) {
                score += 3;
            }
            let basename = lower.rsplit('/').next().unwrap_or(&lower);
            if keywords.iter().any(|kw| basename.contains(kw.as_str())) {
                score += 4;
            }
            (score > 0).then_some((score, path))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    let result_files: Vec<String> = scored.into_iter().take(SEARCH_TOP_N).map(|(_, p)| p).collect();

    let entry = SearchCacheEntry {
        key: key.clone(),
        repo_root: repo_root.to_string(),
        query,
        commit_hash: head_commit.to_string(),
        scope: "repo".to_string(),
        result_files: result_files.clone(),
        updated_at: now,
    };
    hot.put_search(entry.clone());
    store.upsert_search_cache(&entry);

    result_files
}

async fn summarize_candidate(
    repo_root_path: &Path,
    repo_root: &str,
    relative_path: &str,
    max_file_read_bytes: usize,
    store: &dyn ContinuityStore,
    hot: &HotCache,
) -> Option<String> {
    let full_path = repo_root_path.join(relative_path);
    let repo_root = repo_root.to_string();
    let relative_path = relative_path.to_string();

    smol::unblock(move || {
        let metadata = std::fs::metadata(&full_path).ok()?;
        if !metadata.is_file() || metadata.len() as usize > max_file_read_bytes {
            return None;
        }
        let contents = std::fs::read_to_string(&full_path).ok()?;
        let content_hash = crate::hashing::sha256_hex(&contents);
        let key = crate::hashing::sha256_fields(&[&repo_root, &relative_path, &content_hash]);

        if let Some(cached) = hot
            .get_file_summary(&key)
            .or_else(|| store.get_file_summary(&key))
        {
            if cached.content_hash == content_hash {
                return Some(cached.summary);
            }
        }

        let summary = build_file_summary(&relative_path, &contents);
        let entry = FileSummaryEntry {
            key,
            repo_root,
            file_path: relative_path,
            content_hash,
            summary: summary.clone(),
            updated_at: 0,
        };
        hot.put_file_summary(entry.clone());
        store.upsert_file_summary(&entry);
        Some(summary)
    })
    .await
}

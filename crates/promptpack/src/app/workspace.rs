//! Single state container tying the tree, selection, content, and estimates together.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::app::content::{ContentCache, ContentView, FetchTicket, HydrationJob, HydrationResult};
use crate::app::content::{RemoteContentSource, is_binary_path};
use crate::app::export::{ExportError, ExportInput, ExportOptions, Exporter};
use crate::app::search::{SearchResult, search};
use crate::app::selection::{SelectionManager, SelectionState};
use crate::app::suggest::{SuggestionAdvisor, validate_suggestions};
use crate::app::tokens::{Debouncer, TokenEstimate, TokenEstimator};
use crate::app::tree::PathTree;
use crate::domain::errors::Notice;
use crate::domain::model::{
    ExportArtifact, LocalRecord, RemoteTreeListing, RepoIdentity, SourceContext,
};
use crate::infra::config::Config;

/// The loaded source and the tree built from it. Replaced as a whole on every load.
#[derive(Debug)]
pub struct Snapshot {
    pub source: SourceContext,
    pub tree: Arc<PathTree>,
}

/// What a load did to the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub files: usize,
    pub warnings: usize,
    /// Whether the source identity matched the previous one, so selection and expansion were kept.
    pub same_source: bool,
    /// Selected paths dropped because they no longer exist.
    pub dropped_selections: usize,
}

pub struct Workspace {
    snapshot: Option<Arc<Snapshot>>,
    selection: SelectionManager,
    expanded: BTreeSet<String>,
    search: Option<SearchResult>,
    cache: ContentCache,
    failures: HashMap<String, String>,
    generation: u64,
    estimator: TokenEstimator,
    debouncer: Debouncer,
    estimate: TokenEstimate,
    exporter: Exporter,
}

impl Workspace {
    pub fn new(estimator: TokenEstimator, debounce: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            snapshot: None,
            selection: SelectionManager::new(),
            expanded: BTreeSet::new(),
            search: None,
            cache: ContentCache::new(),
            failures: HashMap::new(),
            generation: 0,
            estimate: TokenEstimate {
                budget: estimator.token_budget(),
                ..TokenEstimate::default()
            },
            estimator,
            debouncer: Debouncer::new(debounce),
            exporter: Exporter::new()?,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            TokenEstimator::from_config(config),
            Duration::from_millis(config.tokens.debounce_ms),
        )
    }

    pub fn source(&self) -> Option<&SourceContext> {
        self.snapshot.as_deref().map(|snapshot| &snapshot.source)
    }

    pub fn tree(&self) -> Option<&PathTree> {
        self.snapshot.as_deref().map(|snapshot| snapshot.tree.as_ref())
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn expanded(&self) -> &BTreeSet<String> {
        &self.expanded
    }

    pub fn search_result(&self) -> Option<&SearchResult> {
        self.search.as_ref()
    }

    /// Last computed token estimate.
    pub fn token_estimate(&self) -> TokenEstimate {
        self.estimate
    }

    pub fn content_view(&self) -> Option<ContentView<'_>> {
        self.snapshot
            .as_deref()
            .map(|snapshot| ContentView::new(&snapshot.tree, &self.cache))
    }

    /// Load records produced by the local scanner.
    pub fn load_local(
        &mut self,
        label: impl Into<String>,
        records: Vec<LocalRecord>,
        uploaded_at: OffsetDateTime,
    ) -> Result<LoadSummary, Notice> {
        if records.is_empty() {
            return Err(Notice::NoMatchingFiles);
        }
        let source = SourceContext::Local {
            label: label.into(),
            uploaded_at,
        };
        let tree = PathTree::from_local(records);
        self.install(source, tree)
    }

    /// Load a remote tree listing. Content is fetched later, on demand.
    pub fn load_github(
        &mut self,
        repo: RepoIdentity,
        listing: RemoteTreeListing,
    ) -> Result<LoadSummary, Notice> {
        let head_commit_at = listing.head_commit_time();
        let truncated = listing.truncated;
        if truncated {
            tracing::warn!(repo = %repo, "remote listing was truncated upstream");
        }
        let tree = PathTree::from_remote(listing.entries);
        if tree.file_count() == 0 {
            return Err(Notice::NoMatchingFiles);
        }
        let source = SourceContext::GitHub {
            repo,
            head_commit_at,
            truncated,
        };
        self.install(source, tree)
    }

    fn install(&mut self, source: SourceContext, tree: PathTree) -> Result<LoadSummary, Notice> {
        let same_source = self
            .source()
            .is_some_and(|current| current.identity() == source.identity());

        let dropped_selections = if same_source {
            let dropped = self.selection.retain_existing(&tree);
            self.expanded
                .retain(|path| tree.find_node(path).is_some_and(|node| node.is_dir()));
            dropped
        } else {
            let dropped = self.selection.len();
            self.selection.deselect_all();
            self.expanded.clear();
            self.search = None;
            self.cache.clear();
            self.estimator.clear_cache();
            dropped
        };

        let summary = LoadSummary {
            files: tree.file_count(),
            warnings: tree.warnings().len(),
            same_source,
            dropped_selections,
        };

        self.failures.clear();
        self.generation += 1;
        self.snapshot = Some(Arc::new(Snapshot {
            source,
            tree: Arc::new(tree),
        }));

        self.refresh_search();
        self.recompute_estimate();

        tracing::debug!(
            files = summary.files,
            warnings = summary.warnings,
            same_source,
            generation = self.generation,
            "workspace rebuilt"
        );
        Ok(summary)
    }

    /// Aggregated checkbox state for a node, `None` when the path is unknown.
    pub fn selection_state(&self, path: &str) -> Option<SelectionState> {
        let node = self.tree()?.find_node(path)?;
        Some(self.selection.state(node))
    }

    /// Select or deselect a file or every file under a directory. Returns `false` for unknown
    /// paths.
    pub fn toggle(&mut self, path: &str, make_selected: bool, now: Instant) -> bool {
        let Some(snapshot) = self.snapshot.clone() else {
            return false;
        };
        let found = self.selection.toggle_path(&snapshot.tree, path, make_selected);
        if found {
            self.debouncer.mark(now);
        }
        found
    }

    pub fn select_all(&mut self, now: Instant) {
        if let Some(snapshot) = self.snapshot.clone() {
            self.selection.select_all(&snapshot.tree);
            self.debouncer.mark(now);
        }
    }

    pub fn deselect_all(&mut self, now: Instant) {
        self.selection.deselect_all();
        self.debouncer.mark(now);
    }

    /// Select the files currently visible: search matches when a query is active, else all.
    pub fn select_visible(&mut self, now: Instant) -> usize {
        let Some(snapshot) = self.snapshot.clone() else {
            return 0;
        };
        let added = match &self.search {
            Some(result) => {
                let view = ContentView::new(&snapshot.tree, &self.cache);
                let visible: Vec<&str> = result.visible_files(view).collect();
                self.selection.select_visible(&snapshot.tree, visible)
            }
            None => {
                let files = snapshot.tree.all_files();
                self.selection
                    .select_visible(&snapshot.tree, files.iter().map(String::as_str))
            }
        };
        self.debouncer.mark(now);
        added
    }

    pub fn deselect_visible(&mut self, now: Instant) -> usize {
        let Some(snapshot) = self.snapshot.clone() else {
            return 0;
        };
        let removed = match &self.search {
            Some(result) => {
                let view = ContentView::new(&snapshot.tree, &self.cache);
                let visible: Vec<&str> = result.visible_files(view).collect();
                self.selection.deselect_visible(visible)
            }
            None => {
                let removed = self.selection.len();
                self.selection.deselect_all();
                removed
            }
        };
        self.debouncer.mark(now);
        removed
    }

    /// Replace the selection wholesale, keeping only paths present in the tree.
    pub fn replace_selection<'a>(
        &mut self,
        paths: impl IntoIterator<Item = &'a str>,
        now: Instant,
    ) -> usize {
        let Some(snapshot) = self.snapshot.clone() else {
            return 0;
        };
        let kept = self.selection.replace(&snapshot.tree, paths);
        self.debouncer.mark(now);
        kept
    }

    pub fn set_expanded(&mut self, path: &str, expanded: bool) {
        if expanded {
            self.expanded.insert(path.to_owned());
        } else {
            self.expanded.remove(path);
        }
    }

    /// Apply a search query. A blank query clears filtering and leaves expansion alone.
    pub fn set_search(&mut self, query: &str) -> Option<&SearchResult> {
        let result = self
            .content_view()
            .and_then(|view| search(view, query));
        if let Some(result) = &result {
            self.expanded.extend(result.expand.iter().cloned());
        }
        self.search = result;
        self.search.as_ref()
    }

    fn refresh_search(&mut self) {
        if let Some(query) = self.search.as_ref().map(|result| result.query.clone()) {
            self.set_search(&query);
        }
    }

    /// Detach the fetches needed to hydrate every selected remote file. `None` for local
    /// sources or when everything is already cached.
    pub fn begin_hydration(&self) -> Option<HydrationJob> {
        let snapshot = self.snapshot.as_ref()?;
        let repo = snapshot.source.repo()?.clone();
        let view = ContentView::new(&snapshot.tree, &self.cache);

        let paths: Vec<String> = self
            .selection
            .iter()
            .filter(|path| !is_binary_path(path))
            .filter_map(|path| snapshot.tree.find_file(path))
            .filter(|file| view.text(file).is_none())
            .map(|file| file.path.clone())
            .collect();
        if paths.is_empty() {
            return None;
        }

        Some(HydrationJob {
            ticket: self.current_ticket(&snapshot.source),
            repo,
            tree: Arc::clone(&snapshot.tree),
            paths,
        })
    }

    /// Merge a finished hydration. Results from a superseded source state are discarded.
    pub fn apply_hydration(&mut self, result: HydrationResult, now: Instant) -> bool {
        let current = self
            .source()
            .map(|source| self.current_ticket(source));
        if result.ticket.is_none() || result.ticket != current {
            tracing::warn!(
                fetched = result.fetched.len(),
                "discarding hydration results for a superseded source"
            );
            return false;
        }

        for (path, content) in result.fetched {
            self.failures.remove(&path);
            self.cache.insert(path, content);
        }
        self.failures.extend(result.failures);
        self.refresh_search();
        self.debouncer.mark(now);
        true
    }

    /// Fetch missing remote content for the selection and apply it in one step.
    pub fn hydrate(&mut self, source: &dyn RemoteContentSource, now: Instant) -> bool {
        match self.begin_hydration() {
            Some(job) => {
                let result = job.run(source);
                self.apply_hydration(result, now)
            }
            None => false,
        }
    }

    fn current_ticket(&self, source: &SourceContext) -> FetchTicket {
        FetchTicket {
            identity: source.identity(),
            generation: self.generation,
        }
    }

    /// Recompute the estimate if the selection has been quiet long enough.
    pub fn poll_token_estimate(&mut self, now: Instant) -> Option<TokenEstimate> {
        if self.debouncer.fire(now) {
            Some(self.recompute_estimate())
        } else {
            None
        }
    }

    fn recompute_estimate(&mut self) -> TokenEstimate {
        self.estimate = match self.snapshot.as_deref() {
            Some(snapshot) => self.estimator.estimate(
                ContentView::new(&snapshot.tree, &self.cache),
                self.selection.iter(),
            ),
            None => TokenEstimate {
                budget: self.estimator.token_budget(),
                ..TokenEstimate::default()
            },
        };
        self.estimate
    }

    /// Render the selection. Remote content is hydrated first when a source is given.
    pub fn export(
        &mut self,
        options: &ExportOptions,
        remote: Option<&dyn RemoteContentSource>,
    ) -> Result<ExportArtifact, ExportError> {
        if self.selection.is_empty() {
            return Err(Notice::NoFilesSelected.into());
        }
        let Some(snapshot) = self.snapshot.clone() else {
            return Err(Notice::NoFilesSelected.into());
        };

        if let Some(remote) = remote {
            self.hydrate(remote, Instant::now());
        }
        let tokens = self.recompute_estimate();

        let input = ExportInput {
            source: &snapshot.source,
            selection: &self.selection,
            view: ContentView::new(&snapshot.tree, &self.cache),
            failures: &self.failures,
            tokens,
        };
        let artifact = self.exporter.render(&input, options)?;
        tracing::debug!(
            format = options.format.as_str(),
            files = artifact.file_count,
            "export rendered"
        );
        Ok(artifact)
    }

    /// Ask the advisor for a selection and apply it. The selection is untouched on any notice.
    pub fn apply_suggestions(
        &mut self,
        advisor: &dyn SuggestionAdvisor,
        now: Instant,
    ) -> Result<usize, Notice> {
        let Some(snapshot) = self.snapshot.clone() else {
            return Err(Notice::AdvisorySuggestionEmpty);
        };
        let tree_text = crate::app::suggest::advisor_tree_text(&snapshot.tree);
        let raw = advisor
            .suggest(&tree_text)
            .map_err(|err| Notice::AdvisorySuggestionFailed(format!("{err:#}")))?;
        let accepted = validate_suggestions(&snapshot.tree, raw)?;
        Ok(self.replace_selection(accepted.iter().map(String::as_str), now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use time::macros::datetime;

    use crate::app::content::{FetchError, RemoteContent};
    use crate::app::export::ExportFormat;
    use crate::domain::model::RemoteRecord;

    struct FakeRemote {
        calls: AtomicUsize,
    }

    impl FakeRemote {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RemoteContentSource for FakeRemote {
        fn fetch(&self, _repo: &RepoIdentity, path: &str) -> Result<RemoteContent, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path == "y.ts" {
                return Err(FetchError::Other("HTTP 500".into()));
            }
            Ok(RemoteContent {
                text: format!("export const {} = 1;", path.trim_end_matches(".ts")),
                byte_size: 20,
            })
        }
    }

    fn record(path: &str, content: &str) -> LocalRecord {
        LocalRecord {
            path: path.into(),
            line_count: content.lines().count(),
            content: content.into(),
            byte_size: content.len() as u64,
        }
    }

    fn workspace() -> Workspace {
        Workspace::new(TokenEstimator::new(None), Duration::from_millis(50)).unwrap()
    }

    fn listing(paths: &[&str]) -> RemoteTreeListing {
        RemoteTreeListing {
            entries: paths
                .iter()
                .map(|path| RemoteRecord::file(*path, 40, format!("sha-{path}")))
                .collect(),
            truncated: false,
            head_commit_at: Some("2024-06-01T10:00:00Z".into()),
        }
    }

    fn export_options(format: ExportFormat) -> ExportOptions {
        ExportOptions {
            format,
            minify: false,
            now: datetime!(2024-06-01 12:00 UTC),
        }
    }

    const UPLOADED: OffsetDateTime = datetime!(2024-06-01 11:59 UTC);

    #[test]
    fn empty_local_load_is_a_notice() {
        let mut ws = workspace();
        assert_eq!(
            ws.load_local("demo", Vec::new(), UPLOADED),
            Err(Notice::NoMatchingFiles)
        );
        assert!(ws.tree().is_none());
    }

    #[test]
    fn reload_with_same_identity_keeps_selection_and_expansion() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_local("demo", vec![record("src/a.rs", "a"), record("src/b.rs", "b")], UPLOADED)
            .unwrap();
        ws.toggle("src", true, now);
        ws.set_expanded("src", true);

        let summary = ws
            .load_local("demo", vec![record("src/a.rs", "a2")], UPLOADED)
            .unwrap();
        assert!(summary.same_source);
        assert_eq!(summary.dropped_selections, 1);
        assert_eq!(ws.selection().iter().collect::<Vec<_>>(), vec!["src/a.rs"]);
        assert!(ws.expanded().contains("src"));
    }

    #[test]
    fn loading_a_different_source_resets_state() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_local("one", vec![record("src/a.rs", "needle")], UPLOADED)
            .unwrap();
        ws.select_all(now);
        ws.set_search("needle");
        assert!(ws.expanded().contains("src"));

        let summary = ws
            .load_local("two", vec![record("src/a.rs", "needle")], UPLOADED)
            .unwrap();
        assert!(!summary.same_source);
        assert!(ws.selection().is_empty());
        assert!(ws.expanded().is_empty());
        assert!(ws.search_result().is_none());
    }

    #[test]
    fn remote_branch_change_is_a_new_identity() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_github(RepoIdentity::new("o", "r", "main"), listing(&["a.ts"]))
            .unwrap();
        ws.select_all(now);

        ws.load_github(RepoIdentity::new("o", "r", "dev"), listing(&["a.ts"]))
            .unwrap();
        assert!(ws.selection().is_empty());
    }

    #[test]
    fn selection_state_aggregates_directories() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_local("demo", vec![record("src/a.rs", ""), record("src/b.rs", "")], UPLOADED)
            .unwrap();
        ws.toggle("src/a.rs", true, now);
        assert_eq!(ws.selection_state("src"), Some(SelectionState::Partial));
        ws.toggle("src/b.rs", true, now);
        assert_eq!(ws.selection_state("src"), Some(SelectionState::Full));
        assert_eq!(ws.selection_state("missing"), None);
    }

    #[test]
    fn search_expansion_is_a_union_and_blank_query_keeps_it() {
        let mut ws = workspace();
        ws.load_local("demo", vec![record("a/b/c.ts", ""), record("x/y.ts", "")], UPLOADED)
            .unwrap();
        ws.set_expanded("x", true);

        let result = ws.set_search("c.ts").unwrap();
        assert!(result.is_match("a/b/c.ts"));
        assert!(ws.expanded().is_superset(&BTreeSet::from([
            "a".to_string(),
            "a/b".to_string(),
            "x".to_string()
        ])));

        assert!(ws.set_search("").is_none());
        assert!(ws.expanded().contains("a/b"));
    }

    #[test]
    fn select_visible_is_limited_to_search_matches() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_local("demo", vec![record("src/a.rs", ""), record("docs/b.md", "")], UPLOADED)
            .unwrap();
        ws.set_search("a.rs");
        assert_eq!(ws.select_visible(now), 1);
        assert_eq!(ws.selection().iter().collect::<Vec<_>>(), vec!["src/a.rs"]);
        assert_eq!(ws.deselect_visible(now), 1);
        assert!(ws.selection().is_empty());
    }

    #[test]
    fn token_estimate_waits_for_quiet_window() {
        let mut ws = workspace();
        let start = Instant::now();
        ws.load_local("demo", vec![record("a.rs", &"x".repeat(40))], UPLOADED)
            .unwrap();
        ws.toggle("a.rs", true, start);

        assert!(ws.poll_token_estimate(start + Duration::from_millis(10)).is_none());
        let estimate = ws
            .poll_token_estimate(start + Duration::from_millis(60))
            .unwrap();
        assert_eq!(estimate.total, 10);
        assert_eq!(ws.token_estimate().total, 10);
    }

    #[test]
    fn remote_export_isolates_failed_fetches() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_github(RepoIdentity::new("o", "r", "main"), listing(&["x.ts", "y.ts"]))
            .unwrap();
        ws.select_all(now);

        let remote = FakeRemote::new();
        let artifact = ws
            .export(&export_options(ExportFormat::FullCode), Some(&remote))
            .unwrap();
        assert!(artifact.text.contains("// x.ts\nexport const x = 1;"));
        assert!(artifact.text.contains("// y.ts\n// [error loading content: HTTP 500]"));

        ws.export(&export_options(ExportFormat::FullCode), Some(&remote))
            .unwrap();
        // x.ts is cached, only the failed file is retried on the next export.
        assert_eq!(remote.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn hydration_for_a_superseded_source_is_discarded() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_github(RepoIdentity::new("o", "r", "main"), listing(&["x.ts"]))
            .unwrap();
        ws.select_all(now);
        let job = ws.begin_hydration().unwrap();

        ws.load_github(RepoIdentity::new("o", "other", "main"), listing(&["x.ts"]))
            .unwrap();
        let result = job.run(&FakeRemote::new());
        assert!(!ws.apply_hydration(result, now));

        let view = ws.content_view().unwrap();
        let file = view.tree.find_file("x.ts").unwrap();
        assert!(view.text(file).is_none());
    }

    #[test]
    fn hydration_survives_a_selection_change() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_github(RepoIdentity::new("o", "r", "main"), listing(&["x.ts"]))
            .unwrap();
        ws.select_all(now);
        let job = ws.begin_hydration().unwrap();
        ws.deselect_all(now);

        assert!(ws.apply_hydration(job.run(&FakeRemote::new()), now));
        assert!(ws.begin_hydration().is_none());
    }

    #[test]
    fn fetched_content_joins_the_active_search() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_github(RepoIdentity::new("o", "r", "main"), listing(&["x.ts", "y.ts"]))
            .unwrap();
        ws.toggle("x.ts", true, now);
        assert!(ws.set_search("const").unwrap().matches.is_empty());

        assert!(ws.hydrate(&FakeRemote::new(), now));
        assert!(ws.search_result().unwrap().matches.contains("x.ts"));

        ws.deselect_all(now);
        assert_eq!(ws.select_visible(now), 1);
        assert_eq!(ws.selection().iter().collect::<Vec<_>>(), vec!["x.ts"]);
    }

    #[test]
    fn export_without_selection_is_a_notice() {
        let mut ws = workspace();
        ws.load_local("demo", vec![record("a.rs", "")], UPLOADED).unwrap();
        let err = ws
            .export(&export_options(ExportFormat::PathList), None)
            .unwrap_err();
        assert!(matches!(err, ExportError::Notice(Notice::NoFilesSelected)));
    }

    #[test]
    fn exports_are_deterministic_across_calls() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_local(
            "demo",
            vec![record("src/b.png", ""), record("src/a.ts", &"x".repeat(40))],
            UPLOADED,
        )
        .unwrap();
        ws.select_all(now);
        for format in [
            ExportFormat::FullCode,
            ExportFormat::PathList,
            ExportFormat::Markdown,
            ExportFormat::Tree,
        ] {
            let first = ws.export(&export_options(format), None).unwrap();
            let second = ws.export(&export_options(format), None).unwrap();
            assert_eq!(first.text, second.text);
        }
    }

    struct FixedAdvisor(anyhow::Result<Vec<String>>);

    impl SuggestionAdvisor for FixedAdvisor {
        fn suggest(&self, _tree_text: &str) -> anyhow::Result<Vec<String>> {
            match &self.0 {
                Ok(paths) => Ok(paths.clone()),
                Err(err) => Err(anyhow::anyhow!("{err}")),
            }
        }
    }

    #[test]
    fn suggestions_replace_selection_with_valid_paths_only() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_local("demo", vec![record("src/a.rs", ""), record("src/b.rs", "")], UPLOADED)
            .unwrap();
        ws.toggle("src/b.rs", true, now);

        let advisor = FixedAdvisor(Ok(vec!["src/a.rs".into(), "ghost.rs".into()]));
        assert_eq!(ws.apply_suggestions(&advisor, now), Ok(1));
        assert_eq!(ws.selection().iter().collect::<Vec<_>>(), vec!["src/a.rs"]);
    }

    #[test]
    fn rejected_suggestions_leave_selection_untouched() {
        let mut ws = workspace();
        let now = Instant::now();
        ws.load_local("demo", vec![record("src/a.rs", "")], UPLOADED).unwrap();
        ws.toggle("src/a.rs", true, now);

        let invalid = FixedAdvisor(Ok(vec!["ghost.rs".into()]));
        assert_eq!(
            ws.apply_suggestions(&invalid, now),
            Err(Notice::AdvisorySuggestionInvalid { returned: 1 })
        );
        let failing = FixedAdvisor(Err(anyhow::anyhow!("rate limited")));
        assert!(matches!(
            ws.apply_suggestions(&failing, now),
            Err(Notice::AdvisorySuggestionFailed(_))
        ));
        assert_eq!(ws.selection().len(), 1);
    }
}

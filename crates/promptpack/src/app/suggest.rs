//! Validation of AI-proposed selections.

use std::collections::BTreeSet;

use crate::app::export::render_tree;
use crate::app::selection::SelectionManager;
use crate::app::tree::PathTree;
use crate::domain::errors::Notice;

/// Black-box service proposing relevant paths for a rendered project tree.
pub trait SuggestionAdvisor {
    fn suggest(&self, tree_text: &str) -> anyhow::Result<Vec<String>>;
}

/// Tree text of the whole project, handed to the advisor as its only input.
pub fn advisor_tree_text(tree: &PathTree) -> String {
    let mut everything = SelectionManager::new();
    everything.select_all(tree);
    render_tree(tree, &everything)
}

/// Keep suggested paths that name files in the tree, in the order given, without duplicates.
pub fn validate_suggestions(tree: &PathTree, raw: Vec<String>) -> Result<Vec<String>, Notice> {
    let candidates: Vec<String> = raw
        .into_iter()
        .map(|path| normalize(&path))
        .filter(|path| !path.is_empty())
        .collect();
    if candidates.is_empty() {
        return Err(Notice::AdvisorySuggestionEmpty);
    }

    let mut seen = BTreeSet::new();
    let mut accepted = Vec::new();
    for path in &candidates {
        if !tree.contains_file(path) {
            tracing::debug!(path, "discarding unknown suggested path");
            continue;
        }
        if seen.insert(path.as_str()) {
            accepted.push(path.clone());
        }
    }

    if accepted.is_empty() {
        return Err(Notice::AdvisorySuggestionInvalid {
            returned: candidates.len(),
        });
    }
    Ok(accepted)
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_matches('`');
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    trimmed.trim_start_matches('/').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::model::LocalRecord;

    fn tree() -> PathTree {
        PathTree::from_local(["src/main.rs", "src/lib.rs", "README.md"].map(|path| LocalRecord {
            path: path.into(),
            line_count: 0,
            content: String::new(),
            byte_size: 0,
        }))
    }

    #[test]
    fn keeps_known_paths_in_order() {
        let accepted = validate_suggestions(
            &tree(),
            vec![
                "./src/lib.rs".into(),
                "nope.rs".into(),
                " `README.md` ".into(),
                "src/lib.rs".into(),
            ],
        )
        .unwrap();
        assert_eq!(accepted, vec!["src/lib.rs", "README.md"]);
    }

    #[test]
    fn directories_are_not_valid_suggestions() {
        assert_eq!(
            validate_suggestions(&tree(), vec!["src".into()]),
            Err(Notice::AdvisorySuggestionInvalid { returned: 1 })
        );
    }

    #[test]
    fn blank_response_is_empty() {
        assert_eq!(
            validate_suggestions(&tree(), vec!["  ".into()]),
            Err(Notice::AdvisorySuggestionEmpty)
        );
        assert_eq!(
            validate_suggestions(&tree(), Vec::new()),
            Err(Notice::AdvisorySuggestionEmpty)
        );
    }

    #[test]
    fn advisor_sees_the_full_tree() {
        let text = advisor_tree_text(&tree());
        assert!(text.contains("main.rs"));
        assert!(text.contains("README.md"));
    }
}

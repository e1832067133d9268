use searchindex::persist::{
    load_any, load_searchindex, parse_searchindex, render_searchindex, save_searchindex, save_snapshot, IndexPaths,
    MetaFile, SNAPSHOT_VERSION,
};
use searchindex::{Language, SearchIndex, Searcher};
use std::sync::Arc;
use tempfile::tempdir;

const FIXTURE: &str = include_str!("fixtures/megatron_searchindex.js");

fn megatron() -> SearchIndex {
    parse_searchindex(FIXTURE).unwrap()
}

#[test]
fn every_posting_points_at_a_document() {
    let idx = megatron();
    assert!(idx.validate().is_ok());
    let n = idx.num_docs() as u32;
    for (_, postings) in idx.terms().chain(idx.title_terms()) {
        assert!(postings.iter().all(|d| d < n));
    }
}

#[test]
fn lookup_known_and_unknown_terms() {
    let idx = megatron();
    assert_eq!(idx.lookup("megatron").as_slice(), &[0, 3, 4]);
    assert!(idx.lookup("nonexistent_token_xyz").is_empty());
    assert_eq!(idx.title_lookup("megatron").as_slice(), &[1, 2]);
    // present with an empty posting list after the generator pruned it
    assert!(idx.lookup("For").is_empty());
}

#[test]
fn titles_are_defined_for_every_document() {
    let idx = megatron();
    assert_eq!(idx.num_docs(), 5);
    for d in 0..idx.num_docs() as u32 {
        assert!(idx.title(d).is_some());
        assert!(idx.docname(d).is_some());
    }
    assert_eq!(idx.title(1), Some("Welcome to Megatron\u{2019}s documentation!"));
    assert_eq!(idx.filename(2), Some("megatron_commands.rst"));
    assert_eq!(idx.title(5), None);
    assert_eq!(idx.env_version().get("sphinx"), Some(&55));
}

#[test]
fn repeated_lookups_are_identical() {
    let idx = megatron();
    let first = idx.lookup("slack").clone();
    let second = idx.lookup("slack").clone();
    assert_eq!(first, second);
    assert_eq!(first.as_slice(), &[0, 1, 3]);
}

#[test]
fn rendering_reproduces_the_artifact() {
    let idx = megatron();
    assert_eq!(render_searchindex(&idx).unwrap(), FIXTURE);
}

#[test]
fn query_ranks_title_hits_first() {
    let searcher = Searcher::new(Arc::new(megatron()), Language::English);
    let hits = searcher.query("Megatron commands");
    let names: Vec<&str> = hits.iter().map(|h| h.docname.as_str()).collect();
    assert_eq!(names, vec!["megatron_commands", "index", "slack_app_configuration"]);
    assert_eq!(hits[0].score, 15);
    assert_eq!(hits[2].score, 5);
}

#[test]
fn query_stems_and_excludes() {
    let searcher = Searcher::new(Arc::new(megatron()), Language::English);
    let hits = searcher.query("verification");
    let names: Vec<&str> = hits.iter().map(|h| h.docname.as_str()).collect();
    assert_eq!(names, vec!["environment_setup", "slack_app_configuration"]);

    let hits = searcher.query("slack -pause");
    let names: Vec<&str> = hits.iter().map(|h| h.docname.as_str()).collect();
    assert_eq!(names, vec!["slack_app_configuration", "environment_setup", "quickstart", "index"]);
}

#[test]
fn partial_matches_score_lower() {
    let searcher = Searcher::new(Arc::new(megatron()), Language::English);
    let hits = searcher.query("verification_token");
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.score == 2));
    assert_eq!(hits[0].docname, "environment_setup");
}

#[test]
fn words_indexed_as_written_are_found_by_exact_match() {
    let searcher = Searcher::new(Arc::new(megatron()), Language::English);
    for word in ["Using", "AWS"] {
        let hits = searcher.query(word);
        assert_eq!(hits.len(), 1, "{word}");
        assert_eq!(hits[0].docname, "environment_setup");
        assert_eq!(hits[0].score, 5);
    }
}

#[test]
fn unknown_and_stopword_queries_are_empty() {
    let searcher = Searcher::new(Arc::new(megatron()), Language::English);
    assert!(searcher.query("nonexistent_token_xyz").is_empty());
    assert!(searcher.query("the and of").is_empty());
    assert!(searcher.query("").is_empty());
}

#[test]
fn snapshot_and_js_round_trip_on_disk() {
    let dir = tempdir().unwrap();
    let idx = megatron();

    let js = dir.path().join("html/searchindex.js");
    save_searchindex(&js, &idx).unwrap();
    assert_eq!(load_searchindex(&js).unwrap(), idx);

    let paths = IndexPaths::new(dir.path().join("compiled"));
    let meta = MetaFile {
        num_docs: idx.num_docs() as u32,
        num_terms: idx.num_terms() as u32,
        created_at: "2024-01-01T00:00:00Z".into(),
        version: SNAPSHOT_VERSION,
        source: Some(js.display().to_string()),
    };
    save_snapshot(&paths, &idx, &meta).unwrap();
    assert_eq!(load_any(dir.path().join("compiled")).unwrap(), idx);
    assert_eq!(load_any(&js).unwrap(), idx);
}

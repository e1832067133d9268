use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use searchindex::persist::load_any;
use searchindex::{DocId, Language, SearchResult, Searcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

/// Characters of page text shown around the first query hit.
const SUMMARY_CHARS: usize = 240;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Deserialize)]
pub struct LookupParams {
    #[serde(default)]
    pub title: bool,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    /// Lowercased query words for the client to highlight.
    pub highlight: Vec<String>,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: i32,
    pub title: String,
    pub docname: String,
    pub filename: String,
    pub anchor: String,
    pub description: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Serialize)]
pub struct LookupResponse {
    pub term: String,
    pub docs: Vec<DocId>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub num_docs: usize,
    pub num_terms: usize,
    pub num_title_terms: usize,
    pub num_objects: usize,
    pub envversion: BTreeMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `searchindex.js` file or compiled snapshot directory.
    pub index: String,
    pub language: Language,
    /// Directory of page sources (`<filename>.txt`) used for result snippets.
    pub sources: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(index: impl Into<String>) -> Self {
        Self { index: index.into(), language: Language::English, sources: None }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub searcher: Arc<Searcher>,
    pub sources: Option<PathBuf>,
}

pub fn build_app(config: ServerConfig) -> Result<Router> {
    // The index is loaded once and shared read-only by every request.
    let index = load_any(&config.index)?;
    tracing::info!(index = %config.index, num_docs = index.num_docs(), num_terms = index.num_terms(), "index loaded");
    let searcher = Arc::new(Searcher::new(Arc::new(index), config.language));
    let app_state = AppState { searcher, sources: config.sources };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/lookup/:term", get(lookup_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/stats", get(stats_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let parsed = state.searcher.parse(&params.q);
    let results = state.searcher.run(&parsed);
    let total_hits = results.len();
    let k = params.k.clamp(1, 100);

    let hits = results
        .into_iter()
        .take(k)
        .map(|r| {
            let snippet = state.sources.as_ref().and_then(|dir| summary_for(dir, &r, &parsed.highlight));
            into_hit(r, snippet)
        })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits, took_s = elapsed.as_secs_f64(), "search");
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, highlight: parsed.highlight, results: hits })
}

pub async fn lookup_handler(
    State(state): State<AppState>,
    Path(term): Path<String>,
    Query(params): Query<LookupParams>,
) -> Json<LookupResponse> {
    let index = state.searcher.index();
    let postings = if params.title { index.title_lookup(&term) } else { index.lookup(&term) };
    Json(LookupResponse { term, docs: postings.as_slice().to_vec() })
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<u32>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let index = state.searcher.index();
    match (index.docname(doc_id), index.title(doc_id)) {
        (Some(docname), Some(title)) => Ok(Json(serde_json::json!({
            "doc_id": doc_id,
            "docname": docname,
            "filename": index.filename(doc_id),
            "title": title,
        }))),
        _ => Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))),
    }
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let index = state.searcher.index();
    Json(StatsResponse {
        num_docs: index.num_docs(),
        num_terms: index.num_terms(),
        num_title_terms: index.title_terms().count(),
        num_objects: index.objects().count(),
        envversion: index.env_version().clone(),
    })
}

fn into_hit(r: SearchResult, snippet: Option<String>) -> SearchHit {
    SearchHit {
        doc_id: r.doc_id,
        score: r.score,
        title: r.title,
        docname: r.docname,
        filename: r.filename,
        anchor: r.anchor,
        description: r.description,
        snippet,
    }
}

fn summary_for(dir: &std::path::Path, hit: &SearchResult, hl_terms: &[String]) -> Option<String> {
    let name = if hit.filename.is_empty() { &hit.docname } else { &hit.filename };
    let text = std::fs::read_to_string(dir.join(format!("{name}.txt"))).ok()?;
    make_summary(&text, hl_terms)
}

/// Excerpt of `text` around the first occurrence of any highlight term, with
/// the terms wrapped in `<em>`.
pub fn make_summary(text: &str, hl_terms: &[String]) -> Option<String> {
    if text.trim().is_empty() { return None; }
    let lower = text.to_lowercase();
    let first = hl_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .filter_map(|t| lower.find(t.as_str()))
        .min()
        .map(|byte| lower[..byte].chars().count())
        .unwrap_or(0);
    let total = text.chars().count();
    let start = first.saturating_sub(SUMMARY_CHARS / 2);
    let mut excerpt: String = text.chars().skip(start).take(SUMMARY_CHARS).collect();
    if start > 0 { excerpt.insert_str(0, "..."); }
    if start + SUMMARY_CHARS < total { excerpt.push_str("..."); }
    Some(highlight_terms(&excerpt, hl_terms))
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() { continue; }
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() else {
            continue;
        };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}

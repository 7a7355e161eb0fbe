// Retrieval module
// Query rewriting, single-document context selection and answer generation

mod prompts;

#[cfg(test)]
mod tests;

use tracing::{debug, info, warn};

use crate::Result;
use crate::database::{ScoredPoint, VectorIndex};
use crate::embeddings::Embedder;
use crate::llm::LanguageModel;

/// Number of neighbours fetched when no limit is configured
pub const DEFAULT_SEARCH_LIMIT: usize = 3;

/// Rephrase `query` into something closer to how the documentation words it.
///
/// Never fails: a blank query, an LLM error or a blank completion all fall
/// back to the original text.
#[inline]
pub fn rewrite_query(llm: &dyn LanguageModel, query: &str) -> String {
    if query.trim().is_empty() {
        debug!("Blank query, skipping rewrite");
        return query.to_string();
    }

    match llm.generate(&prompts::rewrite_prompt(query)) {
        Ok(text) => {
            let rewritten = text.trim();
            if rewritten.is_empty() {
                warn!("Query rewrite returned nothing, using original query");
                query.to_string()
            } else {
                debug!("Rewrote {:?} as {:?}", query, rewritten);
                rewritten.to_string()
            }
        }
        Err(e) => {
            warn!(
                "Query rewrite failed ({:?}), using original query: {}",
                e.kind(),
                e
            );
            query.to_string()
        }
    }
}

/// Content of the best-matching document for `query`, or an empty string
/// when the collection has no hits.
///
/// Up to `limit` neighbours are fetched but only the top one is used. Ties
/// on score go to the lowest id. When every fetched hit shares the top score
/// the tie may continue past the page, so the fetch is widened until the
/// page ends below that score or the collection is exhausted.
#[inline]
pub async fn select_context(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    collection: &str,
    query: &str,
    limit: usize,
) -> Result<String> {
    let vector = embedder.embed(query)?;
    let mut fetch = limit.max(1);
    let mut hits = index.query_points(collection, &vector, fetch).await?;
    while hits.len() == fetch && tie_fills_page(&hits) {
        fetch = fetch.saturating_mul(2);
        debug!("Top score tied across the page, widening search to {}", fetch);
        hits = index.query_points(collection, &vector, fetch).await?;
    }

    let best = hits.into_iter().reduce(|best, hit| {
        if hit.score > best.score || (hit.score == best.score && hit.id < best.id) {
            hit
        } else {
            best
        }
    });

    match best {
        Some(hit) => {
            info!(
                "Selected {} (id {}, score {:.4}) as context",
                hit.payload.name, hit.id, hit.score
            );
            Ok(hit.payload.content)
        }
        None => {
            info!("No documents matched, answering without context");
            Ok(String::new())
        }
    }
}

fn tie_fills_page(hits: &[ScoredPoint]) -> bool {
    match hits.first() {
        Some(first) => hits.len() > 1 && hits.iter().all(|hit| hit.score == first.score),
        None => false,
    }
}

/// Ask the model to answer `query` from `context`, returning trimmed text
#[inline]
pub fn generate_answer(
    llm: &dyn LanguageModel,
    query: &str,
    rewritten: &str,
    context: &str,
) -> Result<String> {
    let prompt = prompts::answer_prompt(query, rewritten, context);
    debug!("Answer prompt is {} bytes", prompt.len());
    let answer = llm.generate(&prompt)?;
    Ok(answer.trim().to_string())
}

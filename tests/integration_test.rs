use std::sync::Arc;

use tempfile::TempDir;

use knowledge_core::core::context::CoreContext;
use knowledge_core::mcp::handlers;

fn ctx() -> (TempDir, Arc<CoreContext>) {
    let dir = TempDir::new().expect("create temp dir");
    let ctx = Arc::new(CoreContext::new_at(dir.path()).expect("init CoreContext"));
    (dir, ctx)
}

#[tokio::test]
async fn ingest_then_search_finds_the_item() {
    let (_guard, ctx) = ctx();

    let ingest_args = serde_json::json!({
        "title": "Rust Ownership",
        "content": "Ownership is Rust's central feature. Each value has a variable \
            that's called its owner. There can only be one owner at a time. \
            When the owner goes out of scope, the value is dropped.",
        "source_type": "document"
    });
    let resp = handlers::ingest_item::handle(ctx.clone(), &ingest_args).await;
    assert!(!resp.is_error, "ingest failed: {:?}", resp.content);

    let search_args = serde_json::json!({ "query": "ownership variable scope" });
    let resp = handlers::search::handle(ctx.clone(), &search_args).await;
    assert!(!resp.is_error, "search failed: {:?}", resp.content);

    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).expect("valid JSON");
    let total = parsed.get("total").and_then(|v| v.as_u64()).unwrap_or(0);
    assert!(total >= 1, "expected at least one match, got: {total}");

    let first_title = parsed["results"][0]["item"]["title"].as_str().unwrap_or_default();
    assert_eq!(first_title, "Rust Ownership");
}

#[tokio::test]
async fn update_item_re_indexes_new_content() {
    let (_guard, ctx) = ctx();

    let ingest_args = serde_json::json!({
        "title": "Borrow Checker",
        "content": "The borrow checker enforces Rust's reference rules at compile time.",
        "source_type": "document"
    });
    let resp = handlers::ingest_item::handle(ctx.clone(), &ingest_args).await;
    assert!(!resp.is_error);
    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).unwrap();
    let id = parsed["id"].as_str().expect("ingest returns an id").to_string();

    let update_args = serde_json::json!({
        "id": id,
        "title": "Borrow Checker",
        "content": "Lifetimes describe how long references remain valid in Rust."
    });
    let resp = handlers::update_item::handle(ctx.clone(), &update_args).await;
    assert!(!resp.is_error, "update failed: {:?}", resp.content);

    let search_args = serde_json::json!({ "query": "lifetimes references valid" });
    let resp = handlers::search::handle(ctx.clone(), &search_args).await;
    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).unwrap();
    let total = parsed["total"].as_u64().unwrap_or(0);
    assert!(total >= 1, "expected the re-indexed content to match, got: {total}");
}

#[tokio::test]
async fn delete_item_removes_it_from_search() {
    let (_guard, ctx) = ctx();

    let ingest_args = serde_json::json!({
        "title": "Temporary Note",
        "content": "This note about zebras and giraffes will be deleted shortly.",
        "source_type": "document"
    });
    let resp = handlers::ingest_item::handle(ctx.clone(), &ingest_args).await;
    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).unwrap();
    let id = parsed["id"].as_str().unwrap().to_string();

    let delete_args = serde_json::json!({ "id": id });
    let resp = handlers::delete_item::handle(ctx.clone(), &delete_args).await;
    assert!(!resp.is_error, "delete failed: {:?}", resp.content);

    let get_args = serde_json::json!({ "id": id });
    let resp = handlers::get_item::handle(ctx.clone(), &get_args).await;
    assert!(!resp.is_error);
    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).unwrap();
    assert!(parsed["item"].is_null(), "item should be gone after delete");
}

#[tokio::test]
async fn list_items_counts_ingested_rows() {
    let (_guard, ctx) = ctx();

    for title in ["First Item", "Second Item"] {
        let args = serde_json::json!({
            "title": title,
            "content": format!("Body text for {title}."),
            "source_type": "document"
        });
        let resp = handlers::ingest_item::handle(ctx.clone(), &args).await;
        assert!(!resp.is_error);
    }

    let resp = handlers::list_items::handle(ctx.clone(), &serde_json::json!({})).await;
    assert!(!resp.is_error, "list_items failed: {:?}", resp.content);
    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).unwrap();
    let count = parsed["count"].as_u64().unwrap_or(0);
    assert_eq!(count, 2);
}

#[tokio::test]
async fn stats_reflects_ingested_rows() {
    let (_guard, ctx) = ctx();

    let args = serde_json::json!({
        "title": "Counted Item",
        "content": "Just enough content to produce at least one chunk.",
        "source_type": "document"
    });
    let resp = handlers::ingest_item::handle(ctx.clone(), &args).await;
    assert!(!resp.is_error);

    let resp = handlers::stats::handle(ctx.clone(), &serde_json::json!({})).await;
    assert!(!resp.is_error);
    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).unwrap();
    assert_eq!(parsed["items"].as_i64(), Some(1));
    assert!(parsed["chunks"].as_i64().unwrap_or(0) >= 1);
}

/// S6 — late chunking recovery: an item with chunk rows wiped out-of-band
/// (simulating a historical ingest where chunking failed) still turns up
/// non-empty `matched_chunks` on search, and the regenerated chunks are
/// persisted for subsequent reads.
#[tokio::test]
async fn late_chunking_recovers_search_for_a_dechunked_item() {
    let (_guard, ctx) = ctx();

    let body = "zorblax ".repeat(500) + "the rare marker token appears exactly once here.";
    let ingest_args = serde_json::json!({
        "title": "Large Orphaned Item",
        "content": body,
        "source_type": "document"
    });
    let resp = handlers::ingest_item::handle(ctx.clone(), &ingest_args).await;
    assert!(!resp.is_error, "ingest failed: {:?}", resp.content);
    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).unwrap();
    let id = parsed["id"].as_str().unwrap().to_string();

    // Simulate a historical ingest where chunking failed: wipe chunk rows and
    // both index projections out-of-band, leaving the item content intact.
    ctx.store.save_chunks(&id, &[]).expect("clear chunk rows");
    let resp = handlers::rebuild_index::handle(ctx.clone(), &serde_json::json!({})).await;
    assert!(!resp.is_error, "rebuild failed: {:?}", resp.content);
    assert!(ctx.store.get_chunks_for_item(&id).unwrap().is_empty());

    let search_args = serde_json::json!({ "query": "rare marker token" });
    let resp = handlers::search::handle(ctx.clone(), &search_args).await;
    assert!(!resp.is_error, "search failed: {:?}", resp.content);
    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).unwrap();
    let results = parsed["results"].as_array().cloned().unwrap_or_default();
    assert!(!results.is_empty(), "expected the orphaned item to resurface via fallback + late chunking");
    let matched = results[0]["matched_chunks"].as_array().cloned().unwrap_or_default();
    assert!(!matched.is_empty(), "late chunking should have produced matched_chunks");

    // The regenerated chunks must now be persisted.
    assert!(!ctx.store.get_chunks_for_item(&id).unwrap().is_empty());
}

#[tokio::test]
async fn rebuild_index_recovers_search_after_ingest() {
    let (_guard, ctx) = ctx();

    let args = serde_json::json!({
        "title": "Rebuildable Item",
        "content": "Content that should remain searchable after a full index rebuild.",
        "source_type": "document"
    });
    let resp = handlers::ingest_item::handle(ctx.clone(), &args).await;
    assert!(!resp.is_error);

    let resp = handlers::rebuild_index::handle(ctx.clone(), &serde_json::json!({})).await;
    assert!(!resp.is_error, "rebuild failed: {:?}", resp.content);

    let search_args = serde_json::json!({ "query": "rebuildable remain searchable" });
    let resp = handlers::search::handle(ctx.clone(), &search_args).await;
    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).unwrap();
    assert!(parsed["total"].as_u64().unwrap_or(0) >= 1);
}

/// S5 — overflow budgeting: many large items all matching the same token
/// must never blow the per-result or running-total content budgets, and no
/// error is ever raised even though not every matching item fits.
#[tokio::test]
async fn overflow_budgeting_caps_total_and_per_result_content() {
    let (_guard, ctx) = ctx();

    for i in 0..20 {
        let paragraph = format!(
            "Lorem ipsum dolor sit amet, consectetur adipiscing elit, item number {i}, \
             the shared search token appears right here in every item. "
        );
        let content = paragraph.repeat(40); // several thousand chars, multiple chunks
        let args = serde_json::json!({
            "title": format!("Bulk Item {i}"),
            "content": content,
            "source_type": "document"
        });
        let resp = handlers::ingest_item::handle(ctx.clone(), &args).await;
        assert!(!resp.is_error, "ingest {i} failed: {:?}", resp.content);
    }

    let search_args = serde_json::json!({ "query": "shared search token", "max_results": 50 });
    let resp = handlers::search::handle(ctx.clone(), &search_args).await;
    assert!(!resp.is_error, "search failed: {:?}", resp.content);
    let parsed: serde_json::Value = serde_json::from_str(&resp.content[0].text).unwrap();

    let results = parsed["results"].as_array().cloned().unwrap_or_default();
    assert!(!results.is_empty(), "expected at least some results to survive budgeting");

    let mut total_content = 0usize;
    for r in &results {
        let item_len = r["item"]["content"].as_str().unwrap_or_default().chars().count();
        assert!(item_len <= 2000, "item content must be truncated to CONTENT_TRUNCATION_THRESHOLD");

        let matched = r["matched_chunks"].as_array().cloned().unwrap_or_default();
        assert!(matched.len() <= 5, "matched_chunks must be capped at MAX_MATCHED_CHUNKS");
        let context = r["context_chunks"].as_array().cloned().unwrap_or_default();
        assert!(context.len() <= 3, "context_chunks must be capped at MAX_CONTEXT_CHUNKS");

        let mut result_content = item_len;
        for c in matched.iter().chain(context.iter()) {
            let chunk_len = c["content"].as_str().unwrap_or_default().chars().count();
            assert!(chunk_len <= 1500, "chunk content must be truncated to MAX_CHUNK_CONTENT_SIZE");
            result_content += chunk_len;
        }
        assert!(result_content <= 30_000, "single result must stay under MAX_RESULT_CONTENT_SIZE");
        total_content += result_content;
    }
    assert!(total_content <= 100_000, "running total must stay under MAX_TOTAL_CONTENT_SIZE, got {total_content}");
}

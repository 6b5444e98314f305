//! Tool catalog: static name/description/JSON-schema entries for every
//! operation the core exposes.

use serde_json::Value;

#[derive(Clone, Debug)]
pub struct ToolCatalogEntry {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_catalog() -> Vec<ToolCatalogEntry> {
    vec![
        ToolCatalogEntry {
            name: "ingest_item",
            title: "Ingest Item",
            description: "Store a new item (title + extracted content), chunk it, and index it for search.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "content": {"type": "string"},
                    "source_type": {"type": "string", "enum": ["document", "pdf", "code", "web"]},
                    "source_path": {"type": "string"}
                },
                "required": ["title", "content", "source_type"]
            }),
        },
        ToolCatalogEntry {
            name: "update_item",
            title: "Update Item",
            description: "Replace an item's title/content, re-chunk it, and refresh both indices.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "title": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["id", "title", "content"]
            }),
        },
        ToolCatalogEntry {
            name: "delete_item",
            title: "Delete Item",
            description: "Delete an item; cascades to its chunks and removes it from both indices.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"}
                },
                "required": ["id"]
            }),
        },
        ToolCatalogEntry {
            name: "get_item",
            title: "Get Item",
            description: "Fetch a single item by id, with its categories and tags.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"}
                },
                "required": ["id"]
            }),
        },
        ToolCatalogEntry {
            name: "list_items",
            title: "List Items",
            description: "Filter and paginate items by category/tag at the database layer.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "category": {"type": "string"},
                    "tag": {"type": "string"},
                    "limit": {"type": "integer", "minimum": 0},
                    "offset": {"type": "integer", "minimum": 0}
                }
            }),
        },
        ToolCatalogEntry {
            name: "search",
            title: "Search",
            description: "Two-phase chunk-aware search: retrieves matching chunks, aggregates into items with context, applies result budgets.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "max_results": {"type": "integer", "minimum": 0},
                    "min_relevance": {"type": "number", "minimum": 0, "maximum": 1},
                    "include_categories": {"type": "array", "items": {"type": "string"}},
                    "include_tags": {"type": "array", "items": {"type": "string"}},
                    "include_source_types": {"type": "array", "items": {"type": "string"}},
                    "sort_by": {"type": "string", "enum": ["relevance", "date", "title"]},
                    "group_by_category": {"type": "boolean"},
                    "include_highlights": {"type": "boolean"}
                },
                "required": ["query"]
            }),
        },
        ToolCatalogEntry {
            name: "rebuild_index",
            title: "Rebuild Index",
            description: "Reload all chunks from the store and rebuild both the inverted and vector indices from scratch.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolCatalogEntry {
            name: "stats",
            title: "Stats",
            description: "Row counts for items, chunks, categories, tags, and relationships.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

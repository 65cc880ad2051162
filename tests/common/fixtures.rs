//! Canned provider response bodies shaped like the real APIs.
#![allow(dead_code)]

use serde_json::{Value, json};

// =============================================================================
// OpenRouter
// =============================================================================

/// A `/chat/completions` response.
#[must_use]
pub fn openrouter_completion(id: &str, content: &str, prompt_tokens: u64, completion_tokens: u64) -> Value {
    json!({
        "id": id,
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens
        }
    })
}

/// A `/generation` response with a settled bill.
#[must_use]
pub fn openrouter_generation(total_cost: f64) -> Value {
    json!({
        "data": {
            "id": "gen-1",
            "tokens_prompt": 12,
            "tokens_completion": 30,
            "native_tokens_prompt": 14,
            "native_tokens_completion": 33,
            "total_cost": total_cost,
            "model_pricing": {"prompt": "0.000005", "completion": "0.000015"},
            "latency": 812.0,
            "finish_reason": "stop"
        }
    })
}

/// A `/models` listing with one vision model and one text model.
#[must_use]
pub fn openrouter_models() -> Value {
    json!({
        "data": [
            {
                "id": "openai/gpt-4o",
                "name": "OpenAI: GPT-4o",
                "context_length": 128_000,
                "pricing": {"prompt": "0.0000025", "completion": "0.00001"},
                "architecture": {"input_modalities": ["text", "image"]}
            },
            {
                "id": "meta-llama/llama-3-8b-instruct",
                "name": "Meta: Llama 3 8B Instruct",
                "context_length": 8192,
                "pricing": {"prompt": "0.00000006", "completion": "0.00000006"},
                "architecture": {"input_modalities": ["text"]}
            }
        ]
    })
}

// =============================================================================
// Ollama
// =============================================================================

#[must_use]
pub fn ollama_generate(response: &str) -> Value {
    json!({
        "model": "llama3",
        "created_at": "2026-01-01T00:00:00Z",
        "response": response,
        "done": true,
        "done_reason": "stop"
    })
}

#[must_use]
pub fn ollama_chat(content: &str) -> Value {
    json!({
        "model": "llava",
        "created_at": "2026-01-01T00:00:00Z",
        "message": {"role": "assistant", "content": content},
        "done": true,
        "done_reason": "stop"
    })
}

#[must_use]
pub fn ollama_tags(names: &[&str]) -> Value {
    let models: Vec<Value> = names
        .iter()
        .map(|name| json!({"name": name, "size": 4_000_000_000_u64}))
        .collect();
    json!({ "models": models })
}

#[must_use]
pub fn ollama_show(families: &[&str]) -> Value {
    json!({
        "details": {"format": "gguf", "families": families}
    })
}

// =============================================================================
// Search providers
// =============================================================================

#[must_use]
pub fn tavily_results(urls: &[&str]) -> Value {
    let results: Vec<Value> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| json!({"title": format!("Tavily {i}"), "url": url, "content": format!("tavily snippet {i}"), "score": 0.9}))
        .collect();
    json!({ "query": "q", "results": results })
}

#[must_use]
pub fn perplexity_results(urls: &[&str]) -> Value {
    let results: Vec<Value> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| json!({"title": format!("Perplexity {i}"), "url": url, "snippet": format!("perplexity snippet {i}")}))
        .collect();
    json!({ "results": results })
}

#[must_use]
pub fn brave_results(urls: &[&str]) -> Value {
    let results: Vec<Value> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| json!({"title": format!("Brave {i}"), "url": url, "description": format!("brave snippet {i}")}))
        .collect();
    json!({ "type": "search", "web": { "results": results } })
}

/// Exa answers under `documents` on some API versions.
#[must_use]
pub fn exa_documents(urls: &[&str]) -> Value {
    let documents: Vec<Value> = urls
        .iter()
        .map(|url| json!({"url": url, "text": "exa text"}))
        .collect();
    json!({ "documents": documents })
}

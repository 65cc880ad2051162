//! Compare command implementation.
//!
//! Sends one prompt to up to four models at once, prints the settled slots
//! and, unless told otherwise, waits for confirmed hosted costs before
//! saving the run as a session.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cli::args::{CompareArgs, ModelSpec, OutputFormat};
use crate::cli::context::AppContext;
use crate::cli::input;
use crate::core::comparison::{ComparisonOrchestrator, ProgressCallback, no_progress};
use crate::core::models::{
    ComparisonSlot, MAX_SLOTS, ModelInfo, SessionResponse, SlotState, SlotUpdateData,
};
use crate::core::provider::ChatBackend;
use crate::error::{LmcError, Result};
use crate::providers::ChatClient;
use crate::render;
use crate::util::env::stdout_is_tty;
use crate::util::format::format_latency;
use crate::util::image::encode_images;

/// Execute the compare command.
///
/// # Errors
///
/// Returns an error for missing prompt input, bad images or slots, failed
/// augmentation, or a store that cannot be written.
pub async fn execute(ctx: &AppContext, args: &CompareArgs) -> Result<()> {
    let user_prompt = resolve_prompt(ctx, args)?;
    let system_prompt = ctx.system_prompt(&args.prompt_args)?;
    let images = encode_images(&args.prompt_args.images)?;

    let openrouter = ctx.openrouter()?;
    let ollama: Arc<dyn ChatClient> = Arc::new(ctx.ollama()?);
    let mut clients: Vec<Arc<dyn ChatClient>> = vec![ollama];
    if let Some(client) = &openrouter {
        clients.push(Arc::clone(client) as Arc<dyn ChatClient>);
    }

    let mut slots = build_slots(&args.models)?;
    if !images.is_empty() {
        let catalog = model_catalog(&clients, &slots).await;
        apply_catalog(&mut slots, &catalog);
    }

    let reconciler = openrouter.clone().map(|client| ctx.reconciler(client));
    let mut orchestrator = ComparisonOrchestrator::new()
        .with_augmenter(ctx.augmenter(&args.prompt_args)?)
        .with_images(images)
        .with_temperature(ctx.temperature(&args.prompt_args))
        .with_max_tokens(ctx.max_tokens(&args.prompt_args));
    for client in clients {
        orchestrator = orchestrator.with_chat_client(client);
    }
    if let Some(reconciler) = &reconciler {
        orchestrator = orchestrator.with_reconciler(Arc::clone(reconciler));
    }

    let on_progress = progress_printer(ctx.format());
    let slots = tokio::select! {
        settled = orchestrator.run(slots, &system_prompt, &user_prompt, on_progress) => settled?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Comparison cancelled");
            if let Some(reconciler) = &reconciler {
                reconciler.shutdown();
            }
            eprintln!("Cancelled.");
            return Ok(());
        }
    };

    if let Some(reconciler) = &reconciler {
        if args.no_wait {
            tracing::debug!(pending = reconciler.pending(), "Not waiting for confirmed costs");
        } else {
            tokio::select! {
                () = reconciler.wait_all() => {}
                _ = tokio::signal::ctrl_c() => reconciler.shutdown(),
            }
        }
    }

    let output = render::render_comparison(&slots, ctx.format(), ctx.pretty(), ctx.no_color())?;
    print!("{output}");

    if !args.no_save {
        let responses = session_responses(&slots);
        if responses.is_empty() {
            tracing::debug!("No successful slots, session not saved");
        } else {
            let mut store = ctx.session_store()?;
            store.create(&system_prompt, &user_prompt, responses)?;
        }
    }
    Ok(())
}

fn resolve_prompt(ctx: &AppContext, args: &CompareArgs) -> Result<String> {
    if let Some(id) = args.saved {
        let store = ctx.user_prompt_store()?;
        let prompt = store.get(id).ok_or_else(|| LmcError::NotFound {
            what: "user prompt".to_string(),
            id: id.to_string(),
        })?;
        return input::non_blank(prompt.content.clone(), "prompt");
    }
    input::text_from(args.prompt.as_deref(), args.prompt_file.as_deref(), "prompt")
}

/// One slot per model spec, numbered from 1.
///
/// # Errors
///
/// `InvalidSlots` for more than four models.
pub fn build_slots(models: &[ModelSpec]) -> Result<Vec<ComparisonSlot>> {
    if models.len() > usize::from(MAX_SLOTS) {
        return Err(LmcError::InvalidSlots(format!(
            "at most {MAX_SLOTS} models can be compared, got {}",
            models.len()
        )));
    }
    Ok(models
        .iter()
        .zip(1..=MAX_SLOTS)
        .map(|(spec, idx)| ComparisonSlot::new(idx, spec.backend, &spec.model_id))
        .collect())
}

/// Model listings for the backends the slots use. A backend whose listing
/// fails is left out and its slots keep an unknown vision flag.
async fn model_catalog(
    clients: &[Arc<dyn ChatClient>],
    slots: &[ComparisonSlot],
) -> HashMap<(ChatBackend, String), ModelInfo> {
    let mut catalog = HashMap::new();
    for client in clients {
        let backend = client.backend();
        if !slots.iter().any(|s| s.backend == backend) {
            continue;
        }
        match client.list_models().await {
            Ok(models) => {
                for model in models {
                    catalog.insert((backend, model.id.clone()), model);
                }
            }
            Err(err) => {
                tracing::warn!(backend = %backend, error = %err, "Could not list models for vision check");
            }
        }
    }
    catalog
}

/// Copy display names and vision support from the listing.
pub fn apply_catalog(
    slots: &mut [ComparisonSlot],
    catalog: &HashMap<(ChatBackend, String), ModelInfo>,
) {
    for slot in slots {
        if let Some(model) = catalog.get(&(slot.backend, slot.model_id.clone())) {
            slot.model_name.clone_from(&model.name);
            slot.vision = Some(model.supports_vision);
        }
    }
}

/// Session entries for the successful slots, with their latest cost.
#[must_use]
pub fn session_responses(slots: &[ComparisonSlot]) -> Vec<SessionResponse> {
    slots
        .iter()
        .filter(|s| s.state == SlotState::Success)
        .filter_map(|slot| {
            slot.response.as_ref().map(|response| SessionResponse {
                model: slot.model_name.clone(),
                content: response.content.clone(),
                cost: Some(response.cost.get()),
            })
        })
        .collect()
}

/// Slot transitions on stderr, for interactive human output only.
fn progress_printer(format: OutputFormat) -> ProgressCallback {
    if format != OutputFormat::Human || !stdout_is_tty() {
        return no_progress();
    }
    Arc::new(|update| match update.data {
        SlotUpdateData::Loading => eprintln!("[{}] waiting...", update.slot_index),
        SlotUpdateData::Success { cost, .. } => {
            let latency = cost.latency_ms.map(format_latency).unwrap_or_default();
            eprintln!("[{}] done {latency}", update.slot_index);
        }
        SlotUpdateData::Error { kind, .. } => {
            eprintln!("[{}] failed ({})", update.slot_index, kind.label());
        }
        SlotUpdateData::CostUpdated { .. } => {
            eprintln!("[{}] cost confirmed", update.slot_index);
        }
    })
}
